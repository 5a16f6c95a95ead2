/// HTTP transport backed by reqwest
use crate::transport::{Connection, Method, Request, Response};
use async_trait::async_trait;
use docrelay_core::{ClientConfig, Error, Result, RetryPolicy};
use std::time::Duration;
use tracing::{debug, warn};

/// [`Connection`] that talks to a server over HTTP.
///
/// Requests are scoped to `<endpoint>/_db/<database>`. A request that could
/// not be connected is retried according to the configured [`RetryPolicy`].
/// Any other transport failure (timeout, reset, truncated response) may have
/// reached the server, so it is only retried for idempotent methods. Any
/// status the server answers with is handed back untouched.
#[derive(Debug, Clone)]
pub struct HttpConnection {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpConnection {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate().map_err(Error::InvalidArgument)?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Connection(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = format!(
            "{}/_db/{}",
            config.endpoint.trim_end_matches('/'),
            config.database
        );

        Ok(Self {
            client,
            base_url,
            retry: config.retry,
        })
    }

    /// Root URL all request paths are resolved against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send_once(&self, request: &Request) -> std::result::Result<Response, Failure> {
        let method = match request.method() {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, self.url(request.path()))
            .query(request.query());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Failure::delivered(map_reqwest_error(e)))?;

        Ok(Response::new(status, body))
    }

    /// Delay before resend number `retry`, or `None` to give up
    fn retry_delay(&self, failure: &Failure, method: Method, retry: u32) -> Option<Duration> {
        if !failure.error.is_retryable() {
            return None;
        }
        let resend = match failure.delivery {
            Delivery::NotSent => true,
            Delivery::Unknown => self.retry.resend_idempotent && method.is_idempotent(),
        };
        if resend {
            self.retry.next_backoff(retry)
        } else {
            None
        }
    }
}

/// How far a failed attempt got
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// No connection was made, the server never saw the request
    NotSent,
    /// The request may have been received and applied
    Unknown,
}

#[derive(Debug)]
struct Failure {
    error: Error,
    delivery: Delivery,
}

impl Failure {
    fn delivered(error: Error) -> Self {
        Self {
            error,
            delivery: Delivery::Unknown,
        }
    }
}

fn classify(err: reqwest::Error) -> Failure {
    let delivery = if err.is_connect() {
        Delivery::NotSent
    } else {
        Delivery::Unknown
    };
    Failure {
        error: map_reqwest_error(err),
        delivery,
    }
}

#[async_trait]
impl Connection for HttpConnection {
    async fn execute(&self, request: Request) -> Result<Response> {
        let mut retry = 0;
        loop {
            debug!(
                method = %request.method(),
                path = request.path(),
                retry,
                "Sending request"
            );

            let failure = match self.send_once(&request).await {
                Ok(response) => return Ok(response),
                Err(failure) => failure,
            };
            match self.retry_delay(&failure, request.method(), retry) {
                Some(backoff) => {
                    warn!(
                        "{} {} failed ({}), retrying in {:?}",
                        request.method(),
                        request.path(),
                        failure.error,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    retry += 1;
                }
                None => return Err(failure.error),
            }
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout(err.to_string())
    } else if err.is_connect() || err.is_request() {
        Error::Connection(err.to_string())
    } else if err.is_decode() || err.is_body() {
        Error::decode(format!("failed to read response body: {}", err), None)
    } else {
        Error::Connection(err.to_string())
    }
}
