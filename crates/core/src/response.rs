//! Buffered responses and the snapshots stored from them.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::{Origin, Url};

use crate::Error;
use crate::request::{Request, RequestMode};

/// Visibility class of a response, relative to the application origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response; headers and body are fully visible.
    Basic,
    /// Cross-origin response permitted by CORS.
    Cors,
    /// Cross-origin no-cors response whose validity cannot be checked.
    Opaque,
}

impl ResponseType {
    /// Type a fetch of `request` yields once it lands on `final_url`.
    ///
    /// Navigations and responses from the application origin are `basic`.
    /// Anything cross-origin is `cors` for CORS-mode requests and `opaque`
    /// otherwise, so a tile server on another origin never produces a
    /// storable response.
    pub fn for_request(request: &Request, final_url: &Url, app_origin: &Origin) -> Self {
        if request.mode == RequestMode::Navigate || final_url.origin() == *app_origin {
            ResponseType::Basic
        } else if request.mode == RequestMode::Cors {
            ResponseType::Cors
        } else {
            ResponseType::Opaque
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ResponseType::Basic),
            "cors" => Ok(ResponseType::Cors),
            "opaque" => Ok(ResponseType::Opaque),
            other => Err(Error::CorruptEntry(format!("unknown response type: {other}"))),
        }
    }
}

/// A fully buffered response.
///
/// Bodies are immutable `Bytes`, so a response can be handed to the caller
/// and written to a partition without either side consuming the other's copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    pub response_type: ResponseType,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(url: Url, status: u16, response_type: ResponseType, body: impl Into<Bytes>) -> Self {
        Self { url, status, response_type, headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Status 200 with a basic response type.
    ///
    /// Opaque and CORS responses are never persisted.
    pub fn is_storable(&self) -> bool {
        self.status == 200 && self.response_type == ResponseType::Basic
    }

    /// Split into two independent copies: one for the caller, one to store.
    pub fn duplicate(self) -> (Response, Response) {
        let copy = Response {
            url: self.url.clone(),
            status: self.status,
            response_type: self.response_type,
            headers: self.headers.clone(),
            body: Bytes::copy_from_slice(&self.body),
        };
        (self, copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, response_type: ResponseType) -> Response {
        Response::new(Url::parse("https://example.org/a.png").unwrap(), status, response_type, &b"png"[..])
    }

    #[test]
    fn test_is_storable() {
        assert!(response(200, ResponseType::Basic).is_storable());
        assert!(!response(200, ResponseType::Opaque).is_storable());
        assert!(!response(200, ResponseType::Cors).is_storable());
        assert!(!response(204, ResponseType::Basic).is_storable());
        assert!(!response(404, ResponseType::Basic).is_storable());
    }

    #[test]
    fn test_duplicate_produces_equal_copies() {
        let original = response(200, ResponseType::Basic).with_header("Content-Type", "image/png");
        let (returned, stored) = original.clone().duplicate();
        assert_eq!(returned, original);
        assert_eq!(stored, original);
        assert_ne!(returned.body.as_ptr(), stored.body.as_ptr());
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let r = response(200, ResponseType::Basic).with_header("Content-Type", "text/css");
        assert_eq!(r.content_type(), Some("text/css"));
        assert_eq!(r.header("CONTENT-TYPE"), Some("text/css"));
        assert_eq!(r.header("etag"), None);
    }

    #[test]
    fn test_response_type_for_request() {
        let app = Url::parse("https://maps.example.com").unwrap().origin();
        let tile = Request::parse("https://tile.example.org/1/0/0.png").unwrap();
        let proxied = Request::parse("https://maps.example.com/tiles/1/0/0.png").unwrap();

        assert_eq!(ResponseType::for_request(&tile, &tile.url, &app), ResponseType::Opaque);
        let cors = tile.clone().with_mode(RequestMode::Cors);
        assert_eq!(ResponseType::for_request(&cors, &cors.url, &app), ResponseType::Cors);
        assert_eq!(ResponseType::for_request(&proxied, &proxied.url, &app), ResponseType::Basic);

        let page = Request::parse("https://elsewhere.net/").unwrap().with_mode(RequestMode::Navigate);
        assert_eq!(ResponseType::for_request(&page, &page.url, &app), ResponseType::Basic);
    }

    #[test]
    fn test_response_type_round_trip_names() {
        assert_eq!("opaque".parse::<ResponseType>().unwrap(), ResponseType::Opaque);
        assert!("error".parse::<ResponseType>().is_err());
    }
}
