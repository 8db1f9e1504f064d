//! Push side of the gate: an owner-scoped stream of completion events.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use medassist_core::job_events::CompletionEvent;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::SourceError;

/// Events for one owner's room. The stream ending means the connection
/// is gone and the caller should reconnect.
pub type PushSubscription = BoxStream<'static, Result<CompletionEvent, SourceError>>;

/// Opens a completion-event subscription for an owner.
#[async_trait]
pub trait PushSource: Send + Sync {
    async fn connect(&self, owner_id: &str) -> Result<PushSubscription, SourceError>;
}

/// Subscribes over the API's WebSocket endpoint (`/api/v1/ws?owner_id=`).
pub struct WsPushSource {
    api_base: String,
}

impl WsPushSource {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
        }
    }

    /// Derive the socket URL: `http` maps to `ws`, `https` to `wss`.
    pub fn ws_url(&self, owner_id: &str) -> Result<String, SourceError> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .map_err(|e| SourceError::Url(format!("{}: {e}", self.api_base)))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(SourceError::Url(format!("unsupported scheme {other}"))),
        };
        url.set_scheme(scheme)
            .map_err(|()| SourceError::Url(format!("cannot use scheme {scheme}")))?;

        let path = format!("{}/api/v1/ws", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.query_pairs_mut().clear().append_pair("owner_id", owner_id);
        Ok(url.to_string())
    }
}

#[async_trait]
impl PushSource for WsPushSource {
    async fn connect(&self, owner_id: &str) -> Result<PushSubscription, SourceError> {
        let url = self.ws_url(owner_id)?;
        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| SourceError::Push(format!("Failed to connect to {url}: {e}")))?;

        tracing::debug!(%url, "Push subscription open");

        let events = ws_stream.filter_map(|frame| {
            futures::future::ready(match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<CompletionEvent>(&text) {
                    Ok(event) => Some(Ok(event)),
                    Err(e) => {
                        tracing::trace!(error = %e, "Ignoring unrecognised push frame");
                        None
                    }
                },
                Ok(_) => None,
                Err(e) => Some(Err(SourceError::Push(e.to_string()))),
            })
        });

        Ok(events.boxed())
    }
}
