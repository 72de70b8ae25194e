use std::sync::Arc;
use std::time::Duration;

use chunkferry_notify::Notifier;
use chunkferry_protocol::ApiResponse;
use futures_util::stream::BoxStream;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use reqwest::{RequestBuilder, Response};
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::{debug, info, warn};

use crate::credential::CredentialProvider;
use crate::request::{Body, Request};
use crate::sse::{self, SseEvent};
use crate::TransportError;

/// Error bodies are cut to this many characters before they land in an error.
const MAX_ERROR_BODY: usize = 256;

/// Transport settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Backend root, e.g. `http://127.0.0.1:8080`. Paths are appended verbatim.
    pub base_url: String,
    /// Whole-request timeout for envelope calls and part uploads.
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".into(),
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for the backend API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    credentials: Arc<dyn CredentialProvider>,
    notifier: Arc<dyn Notifier>,
}

impl HttpTransport {
    pub fn new(
        config: TransportConfig,
        credentials: Arc<dyn CredentialProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            credentials,
            notifier,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a backend path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends `req` and returns the envelope's `data`, which may be absent.
    pub async fn send<T: DeserializeOwned>(&self, req: Request) -> Result<Option<T>, TransportError> {
        let path = req.path.clone();
        let notify = req.notify;
        debug!(method = %req.method, path = %path, "sending request");

        let builder = self.build(req)?;
        let resp = builder.send().await.inspect_err(|e| {
            warn!(path = %path, error = %e, "request failed before a response arrived");
        })?;
        self.unwrap_envelope(&path, notify, resp).await
    }

    /// Like [`send`](Self::send) but treats missing `data` as malformed.
    pub async fn fetch<T: DeserializeOwned>(&self, req: Request) -> Result<T, TransportError> {
        let path = req.path.clone();
        self.send(req)
            .await?
            .ok_or_else(|| TransportError::Decode(format!("{path}: response carried no data")))
    }

    /// Sends `req` and discards whatever `data` comes back.
    pub async fn execute(&self, req: Request) -> Result<(), TransportError> {
        self.send::<IgnoredAny>(req).await.map(|_| ())
    }

    /// `PUT`s raw bytes to an absolute URL (a pre-signed object-store URL).
    ///
    /// No credential and no envelope: the URL carries its own authorization
    /// and the object store answers with a bare status.
    pub async fn put_bytes(&self, url: &str, bytes: Vec<u8>) -> Result<(), TransportError> {
        let len = bytes.len();
        let resp = self
            .http
            .put(url)
            .timeout(self.timeout)
            .body(bytes)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "pre-signed upload rejected");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }
        debug!(bytes = len, "pre-signed upload accepted");
        Ok(())
    }

    /// Opens a server-sent event stream at `path`.
    ///
    /// The stream has no overall timeout; it ends when the server closes it.
    pub async fn subscribe(
        &self,
        path: &str,
    ) -> Result<BoxStream<'static, Result<SseEvent, TransportError>>, TransportError> {
        let builder = self
            .http
            .get(self.url(path))
            .header(ACCEPT, "text/event-stream");
        let resp = self.authorize(builder)?.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        info!(path, "subscribed to server events");
        Ok(sse::events(resp.bytes_stream()))
    }

    fn build(&self, req: Request) -> Result<RequestBuilder, TransportError> {
        let headers = req.header_map()?;
        let mut builder = self
            .http
            .request(req.method, self.url(&req.path))
            .timeout(self.timeout)
            .headers(headers);

        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        builder = match req.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::Form(form) => builder.multipart(form.into_multipart()?),
        };

        self.authorize(builder)
    }

    /// Request interceptor: attaches the current credential verbatim.
    fn authorize(&self, builder: RequestBuilder) -> Result<RequestBuilder, TransportError> {
        match self.credentials.credential() {
            Some(credential) if !credential.is_empty() => {
                let mut value = HeaderValue::from_str(&credential)
                    .map_err(|_| TransportError::InvalidHeader("authorization".into()))?;
                value.set_sensitive(true);
                Ok(builder.header(AUTHORIZATION, value))
            }
            _ => Ok(builder),
        }
    }

    /// Response interceptor: unwraps the envelope and notifies on
    /// application failures unless the request was [`quiet`](Request::quiet).
    async fn unwrap_envelope<T: DeserializeOwned>(
        &self,
        path: &str,
        notify: bool,
        resp: Response,
    ) -> Result<Option<T>, TransportError> {
        let status = resp.status();
        let body = resp.bytes().await?;

        if !status.is_success() {
            warn!(path, status = status.as_u16(), "unexpected HTTP status");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate(&String::from_utf8_lossy(&body)),
            });
        }

        let envelope: ApiResponse<T> = serde_json::from_slice(&body).map_err(|e| {
            warn!(path, error = %e, "response is not a valid envelope");
            TransportError::Decode(format!("{path}: {e}"))
        })?;

        if !envelope.is_success() {
            let message = envelope.message().to_string();
            warn!(path, code = envelope.code, message = %message, "application error");
            if notify {
                self.notifier.error("Request failed", Some(message.as_str()));
            }
            return Err(TransportError::Application {
                code: envelope.code,
                message,
                notified: notify,
            });
        }

        Ok(envelope.data)
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}
