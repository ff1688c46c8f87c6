//! Decoding of base64-encoded `multipart/form-data` request bodies.

mod decoder;
pub mod types;

pub use decoder::{decode_form, extract_boundary, parse_parts};
pub use types::{FormPart, MultipartError, ParsedForm};
