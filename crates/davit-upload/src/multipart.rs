//! Multipart protocol pieces: `UploadId` extraction and the completion
//! manifest.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::UploadError;

/// One uploaded part, identified by its 1-based number and the `ETag` the
/// store returned for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// 1-based part number.
    pub part_number: u32,
    /// `ETag` header value exactly as returned by the part upload.
    pub etag: String,
}

/// Extract the `UploadId` element from an initiate-multipart response.
///
/// # Errors
///
/// Returns [`UploadError::MalformedResponse`] when the body is not valid
/// XML or carries no non-empty `UploadId` element.
pub fn parse_upload_id(xml: &str) -> Result<String, UploadError> {
    let mut reader = Reader::from_str(xml);
    let mut inside_upload_id = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) if element.name().as_ref() == b"UploadId" => {
                inside_upload_id = true;
            }
            Ok(Event::End(element)) if element.name().as_ref() == b"UploadId" => {
                inside_upload_id = false;
            }
            Ok(Event::Text(text)) if inside_upload_id => {
                let decoded = reader.decoder().decode(text.as_ref()).map_err(|_| {
                    UploadError::MalformedResponse {
                        operation: "initiate_multipart",
                        reason: "upload id is not valid text",
                    }
                })?;
                let trimmed = decoded.trim();
                if !trimmed.is_empty() {
                    return Ok(trimmed.to_string());
                }
            }
            Ok(Event::Eof) => {
                return Err(UploadError::MalformedResponse {
                    operation: "initiate_multipart",
                    reason: "missing UploadId element",
                });
            }
            Ok(_) => {}
            Err(_) => {
                return Err(UploadError::MalformedResponse {
                    operation: "initiate_multipart",
                    reason: "invalid xml",
                });
            }
        }
    }
}

/// Render the completion manifest. Parts must already be in ascending
/// `PartNumber` order; the store rejects anything else.
#[must_use]
pub fn completion_manifest(parts: &[CompletedPart]) -> String {
    let mut body = String::from("<CompleteMultipartUpload>");
    for part in parts {
        body.push_str(&format!(
            "<Part><PartNumber>{}</PartNumber><ETag>{}</ETag></Part>",
            part.part_number,
            xml_escape(&part.etag)
        ));
    }
    body.push_str("</CompleteMultipartUpload>");
    body
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
