//! Realtime stream transport
//!
//! A connector turns a one-time stream URL into a channel of
//! [`StreamEvent`]s. Dropping the receiver closes the underlying connection.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, trace};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{Error, Result};

/// Buffered frames per connection
const CHANNEL_CAPACITY: usize = 64;

/// Something that happened on an open stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text frame
    Text(String),
    /// Orderly close, with the peer's reason if it gave one
    Closed { reason: Option<String> },
    /// The connection failed
    Error(String),
}

/// Opens realtime connections
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Open `url` and return its event stream.
    ///
    /// Returning `Ok` means the connection is open.
    async fn connect(&self, url: &str) -> Result<mpsc::Receiver<StreamEvent>>;
}

/// WebSocket connector over tokio-tungstenite
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StreamConnector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<mpsc::Receiver<StreamEvent>> {
        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| Error::stream(e))?;
        let (mut sink, mut stream) = ws.split();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        debug!(target: "Realtime/Socket", "Receiver dropped, closing socket");
                        let _ = sink.close().await;
                        break;
                    }
                    message = stream.next() => {
                        let event = match message {
                            Some(Ok(Message::Text(text))) => StreamEvent::Text(text.as_str().to_owned()),
                            Some(Ok(Message::Close(frame))) => StreamEvent::Closed {
                                reason: frame
                                    .map(|f| f.reason.as_str().to_owned())
                                    .filter(|r| !r.is_empty()),
                            },
                            Some(Ok(other)) => {
                                trace!(target: "Realtime/Socket", "Ignoring non-text frame: {:?}", other);
                                continue;
                            }
                            Some(Err(e)) => StreamEvent::Error(e.to_string()),
                            None => StreamEvent::Closed { reason: None },
                        };

                        let terminal = !matches!(event, StreamEvent::Text(_));
                        if tx.send(event).await.is_err() || terminal {
                            break;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}
