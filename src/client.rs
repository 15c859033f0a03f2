use futures::Stream;
use futures::future;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use std::env;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};
use crate::model::{ChatModel, FragmentStream};
use crate::observability::{CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::sse::process_sse;
use crate::types::{ApiErrorBody, GenerateContentRequest, GenerateContentResponse, Message};

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const API_KEY_VARIABLES: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Client for the Gemini `streamGenerateContent` API.
#[derive(Debug, Clone)]
pub struct Gemini {
    api_key: String,
    client: ReqwestClient,
    base_url: Url,
    model: String,
    connect_timeout: Duration,
}

impl Gemini {
    /// Create a new client for `model`.
    ///
    /// The API key can be provided directly or read from the GEMINI_API_KEY or GOOGLE_API_KEY
    /// environment variables.
    pub fn new(model: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        Self::with_options(model, api_key, None, None)
    }

    /// Create a new client with custom settings.
    ///
    /// Only connecting is bounded by `connect_timeout`; a reply may stream for as long as the
    /// server keeps sending.
    pub fn with_options(
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: Option<String>,
        connect_timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => API_KEY_VARIABLES
                .iter()
                .find_map(|var| env::var(var).ok().filter(|key| !key.is_empty()))
                .ok_or_else(|| {
                    Error::authentication(
                        "API key not provided and neither GEMINI_API_KEY nor GOOGLE_API_KEY is set",
                    )
                })?,
        };

        let mut base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base_url = Url::parse(&base_url)?;

        let connect_timeout = connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            api_key,
            client,
            base_url,
            model: model.into(),
            connect_timeout,
        })
    }

    /// The model this client targets.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The URL streamed replies are requested from.
    pub fn endpoint(&self) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("models/{}:streamGenerateContent", self.model))?;
        url.query_pairs_mut().append_pair("alt", "sse");
        Ok(url)
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let api_key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| Error::authentication("API key contains invalid header characters"))?;
        headers.insert("x-goog-api-key", api_key);
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        error_from_body(status_code, error_body, retry_after)
    }

    /// Send `request` and stream the raw response chunks.
    pub async fn stream_raw(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<impl Stream<Item = Result<GenerateContentResponse>> + Send + use<>> {
        let url = self.endpoint()?;
        tracing::debug!(model = %self.model, %url, turns = request.contents.len(), "streaming reply");
        CLIENT_REQUESTS.click();

        let response = self
            .client
            .post(url)
            .headers(self.default_headers()?)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {e}"),
                        Some(self.connect_timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        Ok(process_sse(response.bytes_stream()))
    }
}

#[async_trait::async_trait]
impl ChatModel for Gemini {
    fn name(&self) -> &str {
        &self.model
    }

    async fn stream(&self, history: &[Message]) -> Result<FragmentStream> {
        let request = GenerateContentRequest::from_history(history);
        let chunks = self.stream_raw(&request).await?;
        Ok(Box::pin(
            chunks.filter_map(|chunk| future::ready(chunk_to_fragment(chunk))),
        ))
    }
}

/// The reply fragment carried by one response chunk.  Chunks without text yield `None`.
fn chunk_to_fragment(chunk: Result<GenerateContentResponse>) -> Option<Result<String>> {
    match chunk {
        Ok(chunk) => match chunk.block_reason() {
            Some(reason) => Some(Err(Error::bad_request(format!(
                "prompt blocked by the model: {reason}"
            )))),
            None => chunk.text().map(Ok),
        },
        Err(err) => Some(Err(err)),
    }
}

/// Map an HTTP error response body onto the error taxonomy.
fn error_from_body(status_code: u16, body: String, retry_after: Option<u64>) -> Error {
    match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) => error_from_status(
            status_code,
            parsed.error.status,
            parsed.error.message.unwrap_or(body),
            retry_after,
        ),
        Err(_) => error_from_status(status_code, None, body, retry_after),
    }
}

/// Map an HTTP status (or an in-stream error code) onto the error taxonomy.
pub(crate) fn error_from_status(
    status_code: u16,
    status: Option<String>,
    message: String,
    retry_after: Option<u64>,
) -> Error {
    match status_code {
        400 => Error::bad_request(message),
        401 => Error::authentication(message),
        403 => Error::permission(message),
        404 => Error::not_found(message),
        408 => Error::timeout(message, None),
        429 => Error::rate_limit(message, retry_after),
        500 => Error::internal_server(message),
        502..=504 => Error::service_unavailable(message, retry_after),
        _ => Error::api(status_code, status, message),
    }
}
