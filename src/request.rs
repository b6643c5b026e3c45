//! Inbound request validation.
//!
//! hyper does the HTTP/1.1 framing. This module enforces what the responder
//! additionally requires: a POST with an explicit, bounded `Content-Length`
//! whose body arrives in full.

use crate::error::ConnectionError;
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, Method, Request};
use http_body_util::BodyExt;
use hyper::body::Body;

/// Largest request body the responder will buffer.
pub const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

/// A fully read request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub target: String,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Body as text for logging; invalid UTF-8 is replaced.
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Declared body length. It must be present, all digits, consistent across
/// repeated headers and at most [`MAX_BODY_BYTES`].
pub fn declared_length(headers: &HeaderMap) -> Result<u64, ConnectionError> {
    let mut declared: Option<u64> = None;

    for value in headers.get_all(CONTENT_LENGTH) {
        let text = value
            .to_str()
            .map_err(|_| ConnectionError::Malformed("content-length is not ascii".to_string()))?
            .trim();
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConnectionError::Malformed(format!(
                "invalid content-length: {text:?}"
            )));
        }
        let length: u64 = text
            .parse()
            .map_err(|_| ConnectionError::Malformed(format!("invalid content-length: {text:?}")))?;
        match declared {
            Some(prev) if prev != length => {
                return Err(ConnectionError::Malformed(
                    "conflicting content-length headers".to_string(),
                ));
            }
            _ => declared = Some(length),
        }
    }

    let length =
        declared.ok_or_else(|| ConnectionError::Malformed("missing content-length".to_string()))?;
    if length > MAX_BODY_BYTES {
        return Err(ConnectionError::Malformed(format!(
            "content-length {length} exceeds limit of {MAX_BODY_BYTES} bytes"
        )));
    }
    Ok(length)
}

/// Validate and collect a request, rejecting any method other than
/// `expected` before the body is touched.
pub async fn read_request<B>(
    request: Request<B>,
    expected: &Method,
) -> Result<InboundRequest, ConnectionError>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    if request.method() != expected {
        return Err(ConnectionError::MethodNotAllowed(request.method().to_string()));
    }
    let declared = declared_length(request.headers())?;

    let (parts, body) = request.into_parts();
    let body = body
        .collect()
        .await
        .map_err(|e| ConnectionError::Malformed(format!("body not received in full: {e}")))?
        .to_bytes();

    if body.len() as u64 != declared {
        return Err(ConnectionError::Malformed(format!(
            "body ended after {} of {} bytes",
            body.len(),
            declared
        )));
    }

    Ok(InboundRequest {
        method: parts.method,
        target: parts.uri.to_string(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    fn post(length: Option<&str>, body: &'static str) -> Request<Full<Bytes>> {
        let mut builder = Request::builder().method(Method::POST).uri("/soap");
        if let Some(length) = length {
            builder = builder.header(CONTENT_LENGTH, length);
        }
        builder.body(Full::new(Bytes::from_static(body.as_bytes()))).unwrap()
    }

    #[tokio::test]
    async fn test_reads_post_with_body() {
        let request = read_request(post(Some("7"), "<ping/>"), &Method::POST)
            .await
            .unwrap();

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.target(), "/soap");
        assert_eq!(request.body, Bytes::from_static(b"<ping/>"));
        assert_eq!(request.body_text(), "<ping/>");
    }

    #[tokio::test]
    async fn test_zero_length_body() {
        let request = read_request(post(Some("0"), ""), &Method::POST).await.unwrap();
        assert!(request.body.is_empty());
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let err = read_request(post(None, ""), &Method::POST).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Malformed(ref m) if m.contains("missing")));
    }

    #[tokio::test]
    async fn test_short_body() {
        let err = read_request(post(Some("20"), "short"), &Method::POST)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Malformed(ref m) if m.contains("5 of 20")));
    }

    #[tokio::test]
    async fn test_rejects_other_methods_before_length() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/index")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let err = read_request(request, &Method::POST).await.unwrap_err();
        assert!(matches!(err, ConnectionError::MethodNotAllowed(ref m) if m == "GET"));
    }

    #[test]
    fn test_content_length_must_be_digits() {
        for bad in ["+5", "-1", " ", "0x10", "ten", "1.0", "5 5"] {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_LENGTH, bad.parse().unwrap());
            assert!(
                matches!(declared_length(&headers), Err(ConnectionError::Malformed(_))),
                "{bad:?} should be rejected"
            );
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, "0042".parse().unwrap());
        assert_eq!(declared_length(&headers).unwrap(), 42);
    }

    #[test]
    fn test_conflicting_content_length() {
        let mut headers = HeaderMap::new();
        headers.append(CONTENT_LENGTH, "1".parse().unwrap());
        headers.append(CONTENT_LENGTH, "2".parse().unwrap());
        let err = declared_length(&headers).unwrap_err();
        assert!(matches!(err, ConnectionError::Malformed(ref m) if m.contains("conflicting")));

        let mut headers = HeaderMap::new();
        headers.append(CONTENT_LENGTH, "3".parse().unwrap());
        headers.append(CONTENT_LENGTH, "3".parse().unwrap());
        assert_eq!(declared_length(&headers).unwrap(), 3);
    }

    #[test]
    fn test_oversized_body_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, MAX_BODY_BYTES.to_string().parse().unwrap());
        assert_eq!(declared_length(&headers).unwrap(), MAX_BODY_BYTES);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, (MAX_BODY_BYTES + 1).to_string().parse().unwrap());
        let err = declared_length(&headers).unwrap_err();
        assert!(matches!(err, ConnectionError::Malformed(ref m) if m.contains("exceeds limit")));
    }
}
