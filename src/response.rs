//! Outbound responses.

use crate::error::ConnectionError;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, ALLOW, CONTENT_TYPE};
use http::{Response, StatusCode};
use http_body_util::Full;

/// Content type of every canned response.
pub const XML_CONTENT_TYPE: &str = "application/xml";

/// Value of the standalone `charset` header.
pub const CHARSET: &str = "UTF-8";

/// Name of the standalone charset header.
pub const CHARSET_HEADER: &str = "charset";

/// A response ready to hand to hyper.
#[derive(Debug, Clone)]
pub struct OutboundResponse {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
}

impl OutboundResponse {
    /// The configured response: `Content-Type: application/xml` and a
    /// separate `charset: UTF-8` header, as existing clients expect.
    pub fn canned(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: vec![
                (CONTENT_TYPE, HeaderValue::from_static(XML_CONTENT_TYPE)),
                (
                    HeaderName::from_static(CHARSET_HEADER),
                    HeaderValue::from_static(CHARSET),
                ),
            ],
            body: body.into(),
        }
    }

    /// Reply to a request using a method other than POST.
    pub fn method_not_allowed() -> Self {
        Self {
            status: StatusCode::METHOD_NOT_ALLOWED,
            headers: vec![(ALLOW, HeaderValue::from_static("POST"))],
            body: Bytes::new(),
        }
    }

    /// Build the `http::Response`. hyper adds `Content-Length` from the
    /// full body.
    pub fn into_http(self) -> Result<Response<Full<Bytes>>, ConnectionError> {
        let mut builder = Response::builder().status(self.status);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        Ok(builder.body(Full::new(self.body))?)
    }
}
