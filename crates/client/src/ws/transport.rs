//! Transport seam between the connection manager and the real socket.
//!
//! [`WsClient`](super::WsClient) only ever talks to a [`Transport`] obtained
//! from a [`Connector`], so tests can stand in a scripted fake while
//! production uses tokio-tungstenite.

use std::cell::Cell;
use std::rc::Rc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use memeshare_shared::CLOSE_ABNORMAL;

/// An event surfaced by a live transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete inbound text frame.
    Message(String),
    /// The transport closed. `code` is the close code when one was received,
    /// [`CLOSE_ABNORMAL`] otherwise.
    Closed { code: u16, reason: String },
}

/// A live duplex connection.
pub trait Transport {
    /// Queue one text frame for sending.
    fn send(&self, text: String) -> anyhow::Result<()>;
    /// Close with the given code. Idempotent.
    fn close(&self, code: u16, reason: &str);
    /// Whether the underlying socket is still open.
    fn is_open(&self) -> bool;
}

/// Dials one transport per call.
#[async_trait(?Send)]
pub trait Connector {
    async fn connect(
        &self,
        url: &str,
    ) -> anyhow::Result<(Rc<dyn Transport>, UnboundedReceiver<TransportEvent>)>;
}

enum WriterCommand {
    Text(String),
    Close { code: u16, reason: String },
}

/// Production transport over tokio-tungstenite.
///
/// Writes go through an unbounded channel to a dedicated writer task so
/// `send` stays synchronous; a reader task forwards frames and the close
/// event to the connection manager.
struct TungsteniteTransport {
    writer: UnboundedSender<WriterCommand>,
    open: Rc<Cell<bool>>,
}

impl Transport for TungsteniteTransport {
    fn send(&self, text: String) -> anyhow::Result<()> {
        if !self.open.get() {
            bail!("socket is closed");
        }
        self.writer
            .unbounded_send(WriterCommand::Text(text))
            .context("writer task is gone")
    }

    fn close(&self, code: u16, reason: &str) {
        if !self.open.get() {
            return;
        }
        self.open.set(false);
        let _ = self.writer.unbounded_send(WriterCommand::Close {
            code,
            reason: reason.to_string(),
        });
    }

    fn is_open(&self) -> bool {
        self.open.get()
    }
}

/// Dials real WebSocket connections. Must be used from inside a
/// [`tokio::task::LocalSet`].
#[derive(Debug, Default)]
pub struct TungsteniteConnector;

#[async_trait(?Send)]
impl Connector for TungsteniteConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> anyhow::Result<(Rc<dyn Transport>, UnboundedReceiver<TransportEvent>)> {
        let (socket, _response) = tokio_tungstenite::connect_async(url)
            .await
            .context("WebSocket handshake failed")?;
        debug!(%url, "WebSocket open");

        let (mut sink, mut stream) = socket.split();
        let (event_tx, event_rx) = unbounded();
        let (writer_tx, mut writer_rx) = unbounded();
        let open = Rc::new(Cell::new(true));

        tokio::task::spawn_local(async move {
            while let Some(command) = writer_rx.next().await {
                match command {
                    WriterCommand::Text(text) => {
                        if let Err(err) = sink.send(Message::Text(text.into())).await {
                            debug!(%err, "write failed, stopping writer");
                            break;
                        }
                    }
                    WriterCommand::Close { code, reason } => {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        };
                        let _ = sink.send(Message::Close(Some(frame))).await;
                        break;
                    }
                }
            }
        });

        let open_reader = open.clone();
        tokio::task::spawn_local(async move {
            loop {
                match stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        trace!(len = text.len(), "frame received");
                        if event_tx
                            .unbounded_send(TransportEvent::Message(text.as_str().to_owned()))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        open_reader.set(false);
                        let (code, reason) = match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.as_str().to_owned()),
                            None => (CLOSE_ABNORMAL, String::new()),
                        };
                        let _ = event_tx.unbounded_send(TransportEvent::Closed { code, reason });
                        break;
                    }
                    // tungstenite answers pings itself; binary frames are not
                    // part of this protocol
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        open_reader.set(false);
                        let _ = event_tx.unbounded_send(TransportEvent::Closed {
                            code: CLOSE_ABNORMAL,
                            reason: err.to_string(),
                        });
                        break;
                    }
                    None => {
                        open_reader.set(false);
                        let _ = event_tx.unbounded_send(TransportEvent::Closed {
                            code: CLOSE_ABNORMAL,
                            reason: "stream ended".to_string(),
                        });
                        break;
                    }
                }
            }
        });

        let transport = Rc::new(TungsteniteTransport {
            writer: writer_tx,
            open,
        });
        Ok((transport, event_rx))
    }
}
