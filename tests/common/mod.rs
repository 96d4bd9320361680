#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use navo_query::app::ports::{HttpClientPort, HttpRequest, HttpResponse, TransportError};
use navo_query::{Config, VoClient};

type Responder =
    Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync>;

/// In-memory HTTP port: answers with a closure and records every request.
pub struct FakeHttp {
    responder: Responder,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeHttp {
    pub fn new(
        responder: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClientPort for FakeHttp {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(request)
    }
}

/// Final URL the way a real client would report it.
pub fn full_url(request: &HttpRequest) -> String {
    if request.query.is_empty() {
        return request.url.clone();
    }
    let query: Vec<String> = request
        .query
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    format!("{}?{}", request.url, query.join("&"))
}

pub fn reply(request: &HttpRequest, status: u16, body: &str) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse {
        status,
        url: full_url(request),
        content_type: "text/xml".to_string(),
        body: body.as_bytes().to_vec(),
    })
}

pub fn param<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Defaults with retries that do not sleep.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.http.retry_backoff_ms = 0;
    config
}

pub fn client(http: Arc<FakeHttp>) -> VoClient {
    VoClient::with_http(http, test_config())
}

pub const CONE_M82: &str = include_str!("../resources/cone_m82.xml");
pub const SIA_RESULT: &str = include_str!("../resources/sia_result.xml");
pub const SSA_RESULT: &str = include_str!("../resources/ssa_result.xml");
pub const REGISTRY_CONE: &str = include_str!("../resources/registry_cone.xml");
pub const TAP_RESULT: &str = include_str!("../resources/tap_result.xml");
pub const TAP_ERROR: &str = include_str!("../resources/tap_error.xml");
pub const SESAME_M82: &str = include_str!("../resources/sesame_m82.xml");
