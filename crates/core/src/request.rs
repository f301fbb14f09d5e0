//! Intercepted request descriptors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::cache::hash::compute_request_key;

/// How the request was issued by the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// A full-document navigation.
    Navigate,
    SameOrigin,
    #[default]
    NoCors,
    Cors,
}

impl FromStr for RequestMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "navigate" => Ok(RequestMode::Navigate),
            "same-origin" => Ok(RequestMode::SameOrigin),
            "no-cors" => Ok(RequestMode::NoCors),
            "cors" => Ok(RequestMode::Cors),
            other => Err(Error::InvalidInput(format!("unknown request mode: {other}"))),
        }
    }
}

/// The kind of resource the request is for.
///
/// `Empty` covers fetches that are not sub-resource loads (`fetch()`,
/// beacons, and so on).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    #[default]
    #[serde(rename = "")]
    Empty,
    Document,
    Image,
    Script,
    Style,
    Font,
    Manifest,
    Worker,
}

impl Destination {
    pub fn is_empty(self) -> bool {
        self == Destination::Empty
    }
}

impl FromStr for Destination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Destination::Empty),
            "document" => Ok(Destination::Document),
            "image" => Ok(Destination::Image),
            "script" => Ok(Destination::Script),
            "style" => Ok(Destination::Style),
            "font" => Ok(Destination::Font),
            "manifest" => Ok(Destination::Manifest),
            "worker" => Ok(Destination::Worker),
            other => Err(Error::InvalidInput(format!("unknown request destination: {other}"))),
        }
    }
}

/// Stable key addressing a cache entry: method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity(String);

impl RequestIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request routed through the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub method: String,
    pub mode: RequestMode,
    pub destination: Destination,
}

impl Request {
    /// A plain `GET` with no-cors mode and an empty destination.
    pub fn get(mut url: Url) -> Self {
        url.set_fragment(None);
        Self { url, method: "GET".to_string(), mode: RequestMode::default(), destination: Destination::default() }
    }

    /// Parse and build a `GET` request.
    pub fn parse(url: &str) -> Result<Self, Error> {
        let url = Url::parse(url.trim()).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::get(url))
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_ascii_uppercase();
        self
    }

    /// Only `GET` requests are looked up in or written to a partition.
    pub fn is_cacheable_method(&self) -> bool {
        self.method == "GET"
    }

    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity(compute_request_key(&self.method, self.url.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_strips_fragment() {
        let request = Request::parse("https://example.org/app.js#v2").unwrap();
        assert_eq!(request.url.as_str(), "https://example.org/app.js");
        assert_eq!(request.method, "GET");
    }

    #[test]
    fn test_identity_depends_on_method() {
        let get = Request::parse("https://example.org/a").unwrap();
        let head = get.clone().with_method("head");
        assert_eq!(head.method, "HEAD");
        assert_ne!(get.identity(), head.identity());
        assert!(!head.is_cacheable_method());
    }

    #[test]
    fn test_identity_ignores_mode_and_destination() {
        let plain = Request::parse("https://example.org/a").unwrap();
        let navigate = plain.clone().with_mode(RequestMode::Navigate).with_destination(Destination::Document);
        assert_eq!(plain.identity(), navigate.identity());
    }

    #[test]
    fn test_parse_mode_and_destination() {
        assert_eq!("navigate".parse::<RequestMode>().unwrap(), RequestMode::Navigate);
        assert_eq!("".parse::<Destination>().unwrap(), Destination::Empty);
        assert_eq!("image".parse::<Destination>().unwrap(), Destination::Image);
        assert!("websocket".parse::<RequestMode>().is_err());
    }

    #[test]
    fn test_destination_serde_empty() {
        let json = serde_json::to_string(&Destination::Empty).unwrap();
        assert_eq!(json, "\"\"");
        let back: Destination = serde_json::from_str("\"style\"").unwrap();
        assert_eq!(back, Destination::Style);
    }

    #[test]
    fn test_parse_invalid_url() {
        assert!(matches!(Request::parse("not a url"), Err(Error::InvalidUrl(_))));
    }
}
