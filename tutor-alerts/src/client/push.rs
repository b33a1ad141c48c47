//! Client-side push channel.
//!
//! A [`PushTransport`] opens a [`PushSubscription`] on a room. The in-process
//! [`RoomHub`] serves embedded clients and tests; [`WsPushTransport`] joins a
//! room on a remote server over WebSocket.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::notification::{DEFAULT_ROOM_CAPACITY, DeliveryEvent, PushSubscription, Room, RoomHub};
use crate::{Error, Result};

/// Opens push subscriptions.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn connect(&self, room: Room) -> Result<PushSubscription>;
}

#[async_trait]
impl PushTransport for RoomHub {
    async fn connect(&self, room: Room) -> Result<PushSubscription> {
        Ok(self.subscribe(room))
    }
}

/// WebSocket push client for `GET /api/notifications/ws?room=...`.
#[derive(Debug, Clone)]
pub struct WsPushTransport {
    endpoint: Url,
}

impl WsPushTransport {
    /// `base_url` is the server root, e.g. `http://localhost:12580`.
    /// `https` roots connect over `wss`.
    pub fn new(base_url: &Url) -> Result<Self> {
        super::tls::install_rustls_provider();
        let mut endpoint = base_url.clone();
        let scheme = match base_url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::config(format!(
                    "unsupported push scheme '{}'",
                    other
                )));
            }
        };
        endpoint
            .set_scheme(scheme)
            .map_err(|_| Error::config(format!("cannot derive push url from {}", base_url)))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| Error::config(format!("{} cannot be a base url", base_url)))?
            .pop_if_empty()
            .extend(["api", "notifications", "ws"]);
        endpoint.set_query(None);

        Ok(Self { endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn room_url(&self, room: &Room) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("room", &room.to_string());
        url
    }
}

#[async_trait]
impl PushTransport for WsPushTransport {
    async fn connect(&self, room: Room) -> Result<PushSubscription> {
        let url = self.room_url(&room);
        let (mut stream, _) = connect_async(url.as_str()).await?;
        info!(room = %room, "Connected to push endpoint");

        let (tx, rx) = mpsc::channel(DEFAULT_ROOM_CAPACITY);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task_room = room.clone();

        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    _ = token.cancelled() => break,
                    frame = stream.next() => frame,
                };

                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<DeliveryEvent>(text.as_str()) {
                            Ok(event) => {
                                if tx.send(event.into()).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(room = %task_room, "Ignoring malformed push frame: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        warn!(room = %task_room, "Push endpoint closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(room = %task_room, "Push connection error: {}", e);
                        break;
                    }
                }
            }

            let _ = stream.close(None).await;
        });

        Ok(PushSubscription::new(room, rx, cancel))
    }
}
