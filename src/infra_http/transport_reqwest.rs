use crate::domain_model::*;
use crate::domain_port::*;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use std::time::Duration;

pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                url.trim_start_matches('/')
            )
        }
    }

    fn build(&self, request: ApiRequest) -> Result<reqwest::Request, TransportError> {
        let url = self.resolve(&request.url);
        let mut headers = request.headers;
        let builder = match request.body {
            Some(RequestBody::Json(value)) => self
                .client
                .request(request.method, &url)
                .headers(headers)
                .json(&value),
            Some(RequestBody::Bytes { content_type, data }) => {
                // The body's own type wins over a caller-supplied header.
                headers.remove(CONTENT_TYPE);
                self.client
                    .request(request.method, &url)
                    .headers(headers)
                    .header(CONTENT_TYPE, content_type)
                    .body(data)
            }
            None => self.client.request(request.method, &url).headers(headers),
        };
        Ok(builder.build()?)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_builder() {
            TransportError::InvalidRequest(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let request = self.build(request)?;
        let url = request.url().clone();

        let response = self.client.execute(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        tracing::trace!(%url, %status, len = body.len(), "response received");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
