//! DTOs for the link creation endpoint.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to create a short link.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    /// The original URL to shorten.
    #[validate(url(message = "longUrl must be a valid URL"))]
    pub long_url: String,

    /// Optional vanity code. Length and characters are checked by the service.
    #[serde(default)]
    pub custom_short_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkResponse {
    pub short_url: String,
    pub short_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_camel_case() {
        let request: CreateLinkRequest = serde_json::from_str(
            r#"{"longUrl":"https://example.com","customShortCode":"dup"}"#,
        )
        .unwrap();

        assert_eq!(request.long_url, "https://example.com");
        assert_eq!(request.custom_short_code.as_deref(), Some("dup"));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_malformed_url_fails_validation() {
        let request: CreateLinkRequest =
            serde_json::from_str(r#"{"longUrl":"not a url"}"#).unwrap();

        assert!(request.validate().is_err());
    }

    #[test]
    fn test_response_uses_camel_case() {
        let response = CreateLinkResponse {
            short_url: "http://localhost:3000/1".into(),
            short_code: "1".into(),
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["shortUrl"], "http://localhost:3000/1");
        assert_eq!(value["shortCode"], "1");
    }
}
