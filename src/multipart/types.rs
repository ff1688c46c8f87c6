//! Parsed form values and decoding errors.

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while decoding a multipart body.
#[derive(Debug, Error)]
pub enum MultipartError {
    /// The content type did not declare a usable `boundary=` parameter.
    #[error("Content-Type does not declare a multipart boundary")]
    MissingBoundary,
    /// The request body was not valid base64.
    #[error("body is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    /// A part's header region was not valid UTF-8.
    #[error("headers of part {part} are not valid UTF-8: {source}")]
    InvalidHeaderEncoding {
        /// Zero-based index of the offending segment.
        part: usize,
        /// Underlying UTF-8 error.
        #[source]
        source: std::str::Utf8Error,
    },
    /// A part's header region carried no `name="..."` attribute.
    #[error("part {part} has no name attribute")]
    MissingName {
        /// Zero-based index of the offending segment.
        part: usize,
    },
    /// A text field's value was not valid UTF-8.
    #[error("field '{name}' is not valid UTF-8: {source}")]
    InvalidFieldEncoding {
        /// Declared name of the field.
        name: String,
        /// Underlying UTF-8 error.
        #[source]
        source: std::str::Utf8Error,
    },
}

/// A single named segment of a multipart body, borrowed from the decoded bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormPart<'a> {
    /// Value of the part's `name="..."` attribute.
    pub name: &'a str,
    /// Whether the part declared a `filename="..."` attribute.
    pub is_file: bool,
    /// Raw content with a single trailing CRLF removed.
    pub content: &'a [u8],
}

/// Text fields and the uploaded file extracted from a multipart body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedForm {
    /// Text fields keyed by name. Later parts overwrite earlier ones.
    pub fields: BTreeMap<String, String>,
    /// Bytes of the last file-bearing part, if any.
    pub file_payload: Option<Vec<u8>>,
}

impl ParsedForm {
    /// Look up a text field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Fold a parsed part into the form, applying last-one-wins semantics.
    pub(crate) fn absorb(&mut self, part: FormPart<'_>) -> Result<(), MultipartError> {
        if part.is_file {
            self.file_payload = Some(part.content.to_vec());
            return Ok(());
        }

        let value = std::str::from_utf8(part.content).map_err(|source| {
            MultipartError::InvalidFieldEncoding {
                name: part.name.to_string(),
                source,
            }
        })?;
        self.fields.insert(part.name.to_string(), value.to_string());
        Ok(())
    }
}
