use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};
use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::stream::{LineBuffer, parse_record};
use crate::tui::AppEvent;

#[derive(Serialize)]
struct ChatRequest<'a> {
    // The backend resolves the model itself; the body carries the message only.
    message: &'a str,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    models: Vec<ModelEntry>,
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        // Connect timeout only: an established stream stays open as long
        // as the backend keeps it open.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Issue the chat request and forward classified stream events to the
    /// app's event channel from a background task.
    ///
    /// Every exit path of the task ends with `AppEvent::StreamClosed`; a
    /// transport or decode failure surfaces as a `StreamEvent::Error`
    /// first. The caller guards against concurrent requests before
    /// calling this.
    pub fn spawn_chat(&self, message: String, tx: UnboundedSender<AppEvent>) {
        let client = self.clone();
        tokio::spawn(async move {
            debug!(len = message.len(), "chat request started");
            if let Err(err) = client.run_stream(&message, &tx).await {
                warn!(%err, "chat request failed");
                let _ = tx.send(AppEvent::Stream(crate::stream::StreamEvent::Error(
                    err.to_string(),
                )));
            }
            let _ = tx.send(AppEvent::StreamClosed);
            debug!("chat request finished");
        });
    }

    async fn run_stream(&self, message: &str, tx: &UnboundedSender<AppEvent>) -> Result<()> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { message })
            .send()
            .await?
            .error_for_status()?;

        let mut body = response.bytes_stream();
        let mut lines = LineBuffer::default();

        'read: while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for line in lines.push(&chunk) {
                let Some(event) = parse_record(&line) else {
                    continue;
                };
                let terminal = event.is_terminal();
                if tx.send(AppEvent::Stream(event)).is_err() {
                    // Receiver is gone, the app is shutting down
                    break 'read;
                }
                if terminal {
                    break 'read;
                }
            }
        }

        // End of stream without a done record is normal termination
        Ok(())
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/models", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to list models: {}", response.status()));
        }

        let models_response: ModelsResponse = response.json().await?;
        let model_names: Vec<String> = models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect();

        Ok(model_names)
    }
}
