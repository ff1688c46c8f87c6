//! Search index integration for labeled images.

pub mod client;
pub mod types;

pub use client::{OpenSearchIndex, SearchIndex};
pub use types::{LabelRecord, SearchError};
