//! In-process [`Network`] double for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tilecache_core::{Error, Request, Response, ResponseType};
use url::Url;

use super::Network;

/// Origin the scripted application is served from.
pub(crate) const APP_ORIGIN: &str = "https://maps.example.com";

enum Route {
    /// `None` assigns the type a real client would for the request.
    Respond { status: u16, response_type: Option<ResponseType>, body: &'static [u8] },
    Fail(&'static str),
}

/// Answers from a fixed route table and records every URL it was asked for.
#[derive(Default)]
pub(crate) struct ScriptedNetwork {
    routes: HashMap<String, Route>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(mut self, url: &str, status: u16, response_type: ResponseType, body: &'static [u8]) -> Self {
        self.routes
            .insert(url.to_string(), Route::Respond { status, response_type: Some(response_type), body });
        self
    }

    /// A 200 whose type follows the request's mode and origin.
    pub(crate) fn ok(mut self, url: &str, body: &'static [u8]) -> Self {
        self.routes
            .insert(url.to_string(), Route::Respond { status: 200, response_type: None, body });
        self
    }

    pub(crate) fn fail(mut self, url: &str, message: &'static str) -> Self {
        self.routes.insert(url.to_string(), Route::Fail(message));
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.lock().unwrap().push(request.url.to_string());

        match self.routes.get(request.url.as_str()) {
            Some(Route::Respond { status, response_type, body }) => {
                let response_type = match response_type {
                    Some(response_type) => *response_type,
                    None => {
                        let origin = Url::parse(APP_ORIGIN).map_err(|e| Error::InvalidUrl(e.to_string()))?;
                        ResponseType::for_request(request, &request.url, &origin.origin())
                    }
                };
                Ok(Response::new(request.url.clone(), *status, response_type, *body)
                    .with_header("content-type", "application/octet-stream"))
            }
            Some(Route::Fail(message)) => Err(Error::Network(message.to_string())),
            None => Err(Error::Network(format!("no route to {}", request.url))),
        }
    }
}
