use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::app::ports::{HttpClientPort, HttpRequest, HttpResponse, TransportError};
use crate::error::{Result, VoError};
use crate::observability::metrics::requests;

/// Gateway-style statuses that usually clear up on their own
const RETRYABLE_STATUS: [u16; 3] = [502, 503, 504];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// Total number of tries; must be at least 1
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, attempts: u32) -> Self {
        Self {
            timeout,
            attempts,
            backoff: Duration::from_secs(2),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Backoff plus up to a quarter of it in random jitter
    fn delay(&self) -> Duration {
        let base = self.backoff.as_millis() as u64;
        if base == 0 {
            return Duration::ZERO;
        }
        let jitter = rand::thread_rng().gen_range(0..=base / 4);
        Duration::from_millis(base + jitter)
    }
}

enum Failure {
    Timeout,
    Connect(String),
    Status(HttpResponse),
}

/// Issue `request`, retrying timeouts, connection failures and gateway errors
/// until the policy's attempts are used up.
///
/// Other transport failures are returned immediately. When a retryable HTTP
/// status persists, the last response is handed back so the caller can still
/// look at its body (VO services often explain themselves in a VOTABLE).
#[instrument(skip(http, request, policy), fields(method = %request.method, url = %request.url))]
pub async fn try_query(
    http: &dyn HttpClientPort,
    request: HttpRequest,
    policy: &RetryPolicy,
    service: &str,
) -> Result<HttpResponse> {
    if policy.attempts == 0 {
        return Err(VoError::invalid("retry policy needs at least one attempt"));
    }
    let request = request.with_timeout(policy.timeout);
    let mut last_failure: Option<Failure> = None;

    for attempt in 1..=policy.attempts {
        if attempt > 1 {
            requests::retried();
            let delay = policy.delay();
            if !delay.is_zero() {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "waiting before retry");
                tokio::time::sleep(delay).await;
            }
        }

        requests::attempted(service);
        let started = Instant::now();
        let outcome = http.execute(&request).await;
        requests::duration(started.elapsed().as_secs_f64());
        match outcome {
            Ok(resp) if RETRYABLE_STATUS.contains(&resp.status) => {
                warn!(attempt, status = resp.status, "service unavailable, will retry");
                last_failure = Some(Failure::Status(resp));
            }
            Ok(resp) => {
                requests::success(service);
                requests::payload_bytes(resp.body.len());
                debug!(attempt, status = resp.status, url = %resp.url, "query completed");
                return Ok(resp);
            }
            Err(TransportError::Timeout) => {
                requests::timeout(service);
                warn!(attempt, attempts = policy.attempts, "query timed out");
                last_failure = Some(Failure::Timeout);
            }
            Err(TransportError::Connect(message)) => {
                requests::connect_error(service);
                warn!(attempt, attempts = policy.attempts, error = %message, "connection failed");
                last_failure = Some(Failure::Connect(message));
            }
            Err(TransportError::Other(message)) => {
                return Err(VoError::Transport {
                    url: request.url.clone(),
                    message,
                });
            }
        }
    }

    requests::exhausted();
    match last_failure {
        Some(Failure::Status(resp)) => Ok(resp),
        Some(Failure::Timeout) => Err(VoError::Timeout {
            url: request.url.clone(),
            attempts: policy.attempts,
        }),
        Some(Failure::Connect(message)) => Err(VoError::Connection {
            url: request.url.clone(),
            attempts: policy.attempts,
            message,
        }),
        None => Err(VoError::Transport {
            url: request.url.clone(),
            message: "no attempt was made".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<std::result::Result<HttpResponse, TransportError>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<std::result::Result<HttpResponse, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpClientPort for Scripted {
        async fn execute(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TransportError::Other("script exhausted".into())))
        }
    }

    fn ok(status: u16, body: &str) -> std::result::Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            url: "http://svc.example/q".into(),
            content_type: "text/xml".into(),
            body: body.as_bytes().to_vec(),
        })
    }

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(5), attempts).with_backoff(Duration::ZERO)
    }

    fn request() -> HttpRequest {
        HttpRequest::get("http://svc.example/q", vec![])
    }

    #[tokio::test]
    async fn returns_first_success() {
        let http = Scripted::new(vec![ok(200, "<VOTABLE/>")]);
        let resp = try_query(&http, request(), &policy(3), "test").await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test]
    async fn retries_timeouts_then_succeeds() {
        let http = Scripted::new(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Connect("refused".into())),
            ok(200, "done"),
        ]);
        let resp = try_query(&http, request(), &policy(3), "test").await.unwrap();
        assert_eq!(resp.text_lossy(), "done");
        assert_eq!(http.calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_timeouts_report_attempts() {
        let http = Scripted::new(vec![Err(TransportError::Timeout), Err(TransportError::Timeout)]);
        let err = try_query(&http, request(), &policy(2), "test").await.unwrap_err();
        match err {
            VoError::Timeout { attempts, url } => {
                assert_eq!(attempts, 2);
                assert_eq!(url, "http://svc.example/q");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_connection_failures_keep_message() {
        let http = Scripted::new(vec![Err(TransportError::Connect("dns".into()))]);
        let err = try_query(&http, request(), &policy(1), "test").await.unwrap_err();
        assert!(matches!(err, VoError::Connection { ref message, .. } if message == "dns"));
    }

    #[tokio::test]
    async fn other_transport_errors_are_not_retried() {
        let http = Scripted::new(vec![Err(TransportError::Other("bad url".into())), ok(200, "")]);
        let err = try_query(&http, request(), &policy(3), "test").await.unwrap_err();
        assert!(matches!(err, VoError::Transport { .. }));
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test]
    async fn gateway_errors_are_retried_and_last_response_returned() {
        let http = Scripted::new(vec![ok(503, "busy"), ok(503, "still busy")]);
        let resp = try_query(&http, request(), &policy(2), "test").await.unwrap();
        assert_eq!(resp.status, 503);
        assert_eq!(resp.text_lossy(), "still busy");
        assert_eq!(http.calls(), 2);
    }

    #[tokio::test]
    async fn client_errors_are_returned_without_retry() {
        let http = Scripted::new(vec![ok(400, "<VOTABLE/>"), ok(200, "")]);
        let resp = try_query(&http, request(), &policy(3), "test").await.unwrap();
        assert_eq!(resp.status, 400);
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test]
    async fn zero_attempts_is_invalid() {
        let http = Scripted::new(vec![]);
        let err = try_query(&http, request(), &policy(0), "test").await.unwrap_err();
        assert!(matches!(err, VoError::InvalidInput(_)));
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn policy_timeout_is_applied_to_request() {
        let http = Scripted::new(vec![ok(200, "")]);
        let policy = RetryPolicy::new(Duration::from_secs(42), 1).with_backoff(Duration::ZERO);
        try_query(&http, request(), &policy, "test").await.unwrap();
        assert_eq!(http.seen.lock().unwrap()[0].timeout, Duration::from_secs(42));
    }

    #[test]
    fn every_attempt_records_its_duration() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let http = Scripted::new(vec![Err(TransportError::Timeout), ok(503, "busy"), ok(200, "done")]);
        ::metrics::with_local_recorder(&recorder, || {
            runtime.block_on(try_query(&http, request(), &policy(3), "test")).unwrap();
        });

        let rendered = handle.render();
        assert!(rendered.contains("navo_request_duration_seconds_count 3"), "{rendered}");
        assert!(rendered.contains("navo_payload_bytes_count 1"), "{rendered}");
    }
}
