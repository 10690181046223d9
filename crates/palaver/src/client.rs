use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::classify;
use crate::error::{ChatError, Result};
use crate::stream::{ChatStream, EventSink, StreamBridge, StreamHandle};
use crate::types::{ChatChunk, ChatRequest, ChatResponse};

/// Raw frame source handed to the streaming bridge
type FrameStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Typed client for an OpenAI-style chat completion API
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl ChatClient {
    /// Create a new client pointing at the given base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ChatError::Config(format!("invalid base URL: {e}")))?;

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: None,
        })
    }

    /// Set the API key sent as a bearer token
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the chat completions URL
    fn completions_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    /// Serialize and send one request body over the transport
    async fn send_body(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        let mut builder = self.http.post(self.completions_url()).json(request);

        if let Some(key) = &self.api_key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", key.expose_secret()));
        }

        builder.send().await.map_err(|e| {
            tracing::error!(error = %e, "chat completion request failed");
            ChatError::Transport(e)
        })
    }

    /// Send a non-streaming completion request, suspending until exactly one
    /// outcome arrives.
    ///
    /// The body is classified error-envelope first regardless of HTTP
    /// status; the service may report logical errors inside a 2xx body.
    pub async fn create(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let request = ChatRequest {
            stream: false,
            ..request.clone()
        };

        let response = self.send_body(&request).await?;
        let status = response.status();
        let body = response.bytes().await?;

        classify::classify(status, &body)
    }

    /// Send a streaming completion request, pull mode
    ///
    /// Returns a single-consumption stream of typed events that ends when
    /// the server signals completion; dropping it cancels the session.
    pub async fn create_stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        let frames = self.open_stream(request).await?;

        let (sink, rx) = EventSink::channel();
        let bridge = StreamBridge::new(sink);
        let cancel = bridge.cancellation_token();
        tokio::spawn(bridge.run(frames));

        Ok(ChatStream::new(rx, cancel))
    }

    /// Send a streaming completion request, callback mode
    ///
    /// `on_event` fires for each typed event in order on the driver task;
    /// `on_complete` fires exactly once when the server ends the stream.
    pub async fn create_stream_with(
        &self,
        request: &ChatRequest,
        on_event: impl FnMut(Result<ChatChunk>) + Send + 'static,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Result<StreamHandle> {
        let frames = self.open_stream(request).await?;

        let sink = EventSink::callback(Box::new(on_event), Box::new(on_complete));
        let bridge = StreamBridge::new(sink);
        let cancel = bridge.cancellation_token();
        tokio::spawn(bridge.run(frames));

        Ok(StreamHandle::new(cancel))
    }

    /// Issue the streaming request and adapt the transport byte stream
    ///
    /// A non-success response carries a single error body, not SSE; it is
    /// classified here instead of being fed to the bridge.
    async fn open_stream(&self, request: &ChatRequest) -> Result<FrameStream> {
        let request = ChatRequest {
            stream: true,
            ..request.clone()
        };

        let response = self.send_body(&request).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.bytes().await?;
            return Err(classify::classify_error(status, &body));
        }

        let frames = response
            .bytes_stream()
            .map(|result| result.map_err(ChatError::Transport));

        Ok(Box::pin(frames))
    }
}
