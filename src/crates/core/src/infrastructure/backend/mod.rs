//! Backend HTTP client
//!
//! Opens the two streaming endpoints and hands the response body back as a byte
//! stream; framing and session logic live elsewhere.

use crate::infrastructure::config::StreamConfig;
use crate::infrastructure::exploration::HttpExplorationRecorder;
use crate::util::errors::{LocalBookError, LocalBookResult};
use localbook_core_types::{ChatQuery, VisualStreamRequest};
use localbook_stream_adapters::{byte_stream, ByteStream, FramingDialect};
use log::{debug, error};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde::Serialize;

const EVENT_STREAM_MIME_TYPE: &str = "text/event-stream";

/// Streaming endpoints and the framing each one speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEndpoint {
    Answer,
    Visual,
}

impl StreamEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            StreamEndpoint::Answer => "chat/query/stream",
            StreamEndpoint::Visual => "visual/smart/stream",
        }
    }

    pub fn dialect(self) -> FramingDialect {
        match self {
            StreamEndpoint::Answer => FramingDialect::DATA_LINES,
            StreamEndpoint::Visual => FramingDialect::EVENT_STREAM,
        }
    }
}

#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    config: StreamConfig,
}

impl BackendClient {
    pub fn new(config: StreamConfig) -> LocalBookResult<Self> {
        // No overall request timeout: streams are long-lived and bounded by the
        // session driver instead.
        let client = reqwest::Client::builder()
            .user_agent(concat!("localbook-core/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn exploration_recorder(&self) -> HttpExplorationRecorder {
        HttpExplorationRecorder::new(
            self.client.clone(),
            self.config.endpoint(HttpExplorationRecorder::PATH),
        )
    }

    pub async fn open_answer_stream(&self, query: &ChatQuery) -> LocalBookResult<ByteStream> {
        self.open_stream(StreamEndpoint::Answer, query).await
    }

    pub async fn open_visual_stream(
        &self,
        request: &VisualStreamRequest,
    ) -> LocalBookResult<ByteStream> {
        self.open_stream(StreamEndpoint::Visual, request).await
    }

    async fn open_stream<B: Serialize + ?Sized>(
        &self,
        endpoint: StreamEndpoint,
        body: &B,
    ) -> LocalBookResult<ByteStream> {
        let url = self.config.endpoint(endpoint.path());
        debug!("Opening stream: endpoint={:?}, url={}", endpoint, url);

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, EVENT_STREAM_MIME_TYPE)
            .header(CACHE_CONTROL, "no-cache")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                "Stream request rejected: endpoint={:?}, status={}, body={}",
                endpoint, status, body
            );
            return Err(LocalBookError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(byte_stream(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_use_their_own_framing() {
        assert_eq!(StreamEndpoint::Answer.dialect(), FramingDialect::DATA_LINES);
        assert_eq!(StreamEndpoint::Visual.dialect(), FramingDialect::EVENT_STREAM);
        assert_eq!(StreamEndpoint::Visual.path(), "visual/smart/stream");
    }
}
