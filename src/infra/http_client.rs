use crate::app::ports::{HttpClientPort, HttpMethod, HttpRequest, HttpResponse, TransportError};
use crate::error::Result;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::trace;

/// `HttpClientPort` backed by a shared `reqwest::Client`.
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(user_agent: &str) -> Result<Self> {
        // reqwest handles gzip/deflate decompression with those features enabled
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn execute(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url).query(&request.query),
            HttpMethod::Post => self
                .client
                .post(&request.url)
                .query(&request.query)
                .form(&request.form),
        };

        let resp = builder.timeout(request.timeout).send().await.map_err(classify)?;
        let status = resp.status().as_u16();
        let url = resp.url().to_string();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = resp.bytes().await.map_err(classify)?.to_vec();
        trace!(status, bytes = body.len(), "response received");

        Ok(HttpResponse {
            status,
            url,
            content_type,
            body,
        })
    }
}
