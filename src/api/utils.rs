//! API utility functions
//!
//! Pure, stateless helpers for request parsing and file responses.

use crate::api::error::ApiError;

/// Parses and validates Content-Type header for application/json
///
/// Accepts `application/json` with or without a charset parameter; rejects
/// look-alikes such as `application/jsonp` or `text/json`.
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type.parse().map_err(|_| {
        ApiError::InvalidPayload(format!("invalid Content-Type: {}", content_type))
    })?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

/// Media type for a served artifact, by extension
pub fn content_type_for(file_name: &str) -> mime::Mime {
    mime_guess::from_path(file_name).first_or_octet_stream()
}

/// `Content-Disposition` forcing a download. Served names are already
/// restricted to a safe ASCII set, so no escaping is needed.
pub fn attachment_disposition(file_name: &str) -> String {
    format!("attachment; filename=\"{file_name}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_type_valid() {
        assert!(parse_content_type("application/json").is_ok());
        assert!(parse_content_type("application/json; charset=utf-8").is_ok());
        assert!(parse_content_type("application/json; charset=UTF-8").is_ok());
    }

    #[test]
    fn test_parse_content_type_invalid() {
        assert!(parse_content_type("application/jsonp").is_err());
        assert!(parse_content_type("text/json").is_err());
        assert!(parse_content_type("multipart/form-data; boundary=x").is_err());
        assert!(parse_content_type("invalid").is_err());
        assert!(parse_content_type("").is_err());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("media_1_a.mp4").essence_str(), "video/mp4");
        assert_eq!(content_type_for("media_1_a.WEBM").essence_str(), "video/webm");
        assert_eq!(content_type_for("job_x_clip.mkv").essence_str(), "video/x-matroska");
        assert_eq!(content_type_for("job_x_1234abcd_clip.mov").essence_str(), "video/quicktime");
        assert_eq!(content_type_for("thumb.jpg"), mime::IMAGE_JPEG);
        assert_eq!(content_type_for("noext"), mime::APPLICATION_OCTET_STREAM);
    }

    #[test]
    fn test_attachment_disposition() {
        assert_eq!(
            attachment_disposition("media_1_a.mp4"),
            "attachment; filename=\"media_1_a.mp4\""
        );
    }
}
