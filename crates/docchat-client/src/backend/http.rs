//! reqwest implementation of [`ChatBackend`].

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};

use docchat_common::{ClientError, ConversationId};
use docchat_config::{ClientConfig, ServerConfig};

use super::{ByteStream, ChatBackend, ChatRequest};
use crate::collaborators::CredentialProvider;
use crate::protocol::HistoryResponse;

const EVENT_STREAM: &str = "text/event-stream";

pub struct HttpBackend {
    server: ServerConfig,
    credentials: Arc<dyn CredentialProvider>,
    http: reqwest::Client,
}

impl HttpBackend {
    /// Only a connect timeout is set: a reply may stream for as long as
    /// the backend keeps it open.
    pub fn new(
        server: ServerConfig,
        client: &ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(client.connect_timeout())
            .build()
            .map_err(|e| ClientError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            server,
            credentials,
            http,
        })
    }

    fn bearer(&self) -> Result<String, ClientError> {
        self.credentials
            .credential()
            .map(|token| format!("Bearer {token}"))
            .ok_or_else(|| ClientError::Unauthorized("no credential available".into()))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = ClientError::from_status(status.as_u16(), &body);
        warn!(status = status.as_u16(), error = %err, "Backend returned an error status");
        Err(err)
    }
}

fn network_error(e: reqwest::Error) -> ClientError {
    ClientError::Network(e.to_string())
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn open_reply_stream(&self, request: ChatRequest) -> Result<ByteStream, ClientError> {
        let auth = self.bearer()?;

        let ChatRequest {
            conversation_id,
            prompt,
            task,
            files,
        } = request;

        debug!(
            conversation_id = %conversation_id,
            task = %task,
            files = files.len(),
            "Submitting message"
        );

        let mut form = Form::new()
            .text("prompt", prompt)
            .text("session_id", conversation_id.as_str().to_string())
            .text("task", task);

        for mut file in files {
            let bytes = file.take_payload().unwrap_or_default();
            let part = Part::bytes(bytes)
                .file_name(file.name.clone())
                .mime_str(&file.mime_type)
                .map_err(|e| ClientError::Protocol(format!("bad MIME type for {}: {e}", file.name)))?;
            form = form.part("files", part);
        }

        let response = self
            .http
            .post(self.server.chat_url())
            .header("Authorization", auth)
            .header("Accept", EVENT_STREAM)
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;

        let response = Self::check_status(response).await?;

        let stream = response
            .bytes_stream()
            .map(|item| item.map(|bytes| bytes.to_vec()).map_err(network_error))
            .boxed();
        Ok(stream)
    }

    async fn fetch_history(&self, id: &ConversationId) -> Result<HistoryResponse, ClientError> {
        let auth = self.bearer()?;
        let url = self.server.history_url(id.as_str());

        debug!(conversation_id = %id, "Fetching history");

        let response = self
            .http
            .get(url)
            .header("Authorization", auth)
            .send()
            .await
            .map_err(network_error)?;

        let response = Self::check_status(response).await?;

        response
            .json::<HistoryResponse>()
            .await
            .map_err(|e| ClientError::Protocol(format!("invalid history response: {e}")))
    }
}
