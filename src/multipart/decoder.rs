//! Byte-level scanner over `multipart/form-data` bodies.
//!
//! The body is cut at every occurrence of `--<boundary>`. Segments lacking a
//! `Content-Disposition: form-data;` header are preamble, epilogue, or terminator residue and are
//! skipped. The delimiter is matched anywhere, not only at line starts, so a file payload that
//! itself contains `--<boundary>` is truncated at that point.

use crate::multipart::types::{FormPart, MultipartError, ParsedForm};
use base64::{Engine, engine::general_purpose::STANDARD};
use bstr::ByteSlice;

const BOUNDARY_PARAM: &str = "boundary=";
const DISPOSITION_MARKER: &[u8] = b"Content-Disposition: form-data;";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const NAME_ATTR: &str = "name=\"";
const FILENAME_ATTR: &str = "filename=\"";
const CRLF: &[u8] = b"\r\n";

/// Decode a base64 multipart body into its text fields and file payload.
///
/// The boundary is read from `content_type`. Text fields are decoded as strict UTF-8; the file
/// payload is kept as raw bytes. When several parts share a name, or several parts carry a file,
/// the last one wins.
pub fn decode_form(content_type: &str, body_base64: &str) -> Result<ParsedForm, MultipartError> {
    let boundary = extract_boundary(content_type)?;
    let body = decode_body(body_base64)?;

    let mut form = ParsedForm::default();
    for part in parse_parts(&body, boundary)? {
        form.absorb(part)?;
    }

    tracing::debug!(
        fields = form.fields.len(),
        file_bytes = form.file_payload.as_ref().map(Vec::len),
        "Decoded multipart body"
    );
    Ok(form)
}

/// Return everything after the last `boundary=` in the content type.
pub fn extract_boundary(content_type: &str) -> Result<&str, MultipartError> {
    let start = content_type
        .rfind(BOUNDARY_PARAM)
        .ok_or(MultipartError::MissingBoundary)?;
    let boundary = &content_type[start + BOUNDARY_PARAM.len()..];
    if boundary.is_empty() {
        return Err(MultipartError::MissingBoundary);
    }
    Ok(boundary)
}

/// Split a decoded body into named parts, in body order.
pub fn parse_parts<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<FormPart<'a>>, MultipartError> {
    let delimiter = format!("--{boundary}");
    Segments::new(body, delimiter.as_bytes())
        .enumerate()
        .filter(|(_, segment)| segment.contains_str(DISPOSITION_MARKER))
        .map(|(index, segment)| parse_segment(index, segment))
        .collect()
}

fn decode_body(body_base64: &str) -> Result<Vec<u8>, MultipartError> {
    let compact: Vec<u8> = body_base64
        .bytes()
        .filter(|byte| !byte.is_ascii_whitespace())
        .collect();
    Ok(STANDARD.decode(compact)?)
}

fn parse_segment(index: usize, segment: &[u8]) -> Result<FormPart<'_>, MultipartError> {
    let (header, content) = match segment.find(HEADER_TERMINATOR) {
        Some(split) => (
            &segment[..split],
            &segment[split + HEADER_TERMINATOR.len()..],
        ),
        None => (segment, &segment[segment.len()..]),
    };

    let header = std::str::from_utf8(header)
        .map_err(|source| MultipartError::InvalidHeaderEncoding { part: index, source })?;
    let name = quoted_attribute(header, NAME_ATTR).ok_or(MultipartError::MissingName { part: index })?;

    Ok(FormPart {
        name,
        is_file: header.contains(FILENAME_ATTR),
        content: content.strip_suffix(CRLF).unwrap_or(content),
    })
}

/// Text between the first `attr` and the next double quote.
fn quoted_attribute<'a>(header: &'a str, attr: &str) -> Option<&'a str> {
    let start = header.find(attr)? + attr.len();
    let rest = &header[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

/// Iterator over the byte ranges between delimiter occurrences.
struct Segments<'a, 'd> {
    body: &'a [u8],
    delimiter: &'d [u8],
    offset: Option<usize>,
}

impl<'a, 'd> Segments<'a, 'd> {
    fn new(body: &'a [u8], delimiter: &'d [u8]) -> Self {
        Self {
            body,
            delimiter,
            offset: Some(0),
        }
    }
}

impl<'a> Iterator for Segments<'a, '_> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.offset?;
        let rest = &self.body[start..];
        match rest.find(self.delimiter) {
            Some(found) => {
                self.offset = Some(start + found + self.delimiter.len());
                Some(&rest[..found])
            }
            None => {
                self.offset = None;
                Some(rest)
            }
        }
    }
}
