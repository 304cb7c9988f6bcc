//! Scripted transport for exercising the connection manager end to end
//! without a network.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::bail;
use async_trait::async_trait;
use chrono::Utc;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};

use memeshare_client::ws::{Connector, Transport, TransportEvent};
use memeshare_client::ClientConfig;
use memeshare_shared::{Meme, StoredUser};

/// Observable state of the fake network.
#[derive(Default)]
pub struct FakeNet {
    /// Dials that fail before any succeed.
    pub fail_next: u32,
    /// URLs dialed, in order.
    pub dials: Vec<String>,
    /// When each dial happened.
    pub dial_times: Vec<tokio::time::Instant>,
    /// Transports handed out by successful dials, in order.
    pub transports: Vec<Rc<FakeTransport>>,
}

pub struct FakeConnector {
    net: Rc<RefCell<FakeNet>>,
}

impl FakeConnector {
    pub fn new() -> (Rc<Self>, Rc<RefCell<FakeNet>>) {
        let net = Rc::new(RefCell::new(FakeNet::default()));
        (Rc::new(Self { net: net.clone() }), net)
    }
}

#[async_trait(?Send)]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> anyhow::Result<(Rc<dyn Transport>, UnboundedReceiver<TransportEvent>)> {
        let mut net = self.net.borrow_mut();
        net.dials.push(url.to_string());
        net.dial_times.push(tokio::time::Instant::now());
        if net.fail_next > 0 {
            net.fail_next -= 1;
            bail!("connection refused");
        }
        let (event_tx, event_rx) = unbounded();
        let transport = Rc::new(FakeTransport {
            sent: RefCell::new(Vec::new()),
            open: Cell::new(true),
            closed_with: RefCell::new(None),
            events: event_tx,
        });
        net.transports.push(transport.clone());
        Ok((transport as Rc<dyn Transport>, event_rx))
    }
}

pub struct FakeTransport {
    /// Frames the client wrote.
    pub sent: RefCell<Vec<String>>,
    pub open: Cell<bool>,
    /// Close code/reason the client sent, if it closed this side.
    pub closed_with: RefCell<Option<(u16, String)>>,
    events: UnboundedSender<TransportEvent>,
}

impl FakeTransport {
    /// Deliver a raw inbound frame.
    pub fn emit_text(&self, text: impl Into<String>) {
        let _ = self
            .events
            .unbounded_send(TransportEvent::Message(text.into()));
    }

    pub fn emit_json(&self, value: serde_json::Value) {
        self.emit_text(value.to_string());
    }

    /// Server-side close.
    pub fn server_close(&self, code: u16, reason: &str) {
        self.open.set(false);
        let _ = self.events.unbounded_send(TransportEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }

    /// `type` fields of everything the client sent, in order.
    pub fn sent_types(&self) -> Vec<String> {
        self.sent
            .borrow()
            .iter()
            .map(|frame| {
                let value: serde_json::Value = serde_json::from_str(frame).unwrap();
                value["type"].as_str().unwrap().to_string()
            })
            .collect()
    }
}

impl Transport for FakeTransport {
    fn send(&self, text: String) -> anyhow::Result<()> {
        if !self.open.get() {
            bail!("socket is closed");
        }
        self.sent.borrow_mut().push(text);
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) {
        if !self.open.get() {
            return;
        }
        self.open.set(false);
        *self.closed_with.borrow_mut() = Some((code, reason.to_string()));
    }

    fn is_open(&self) -> bool {
        self.open.get()
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        ws_url: "ws://test.local/ws".to_string(),
        api_url: "http://test.local/api".to_string(),
        ..ClientConfig::default()
    }
}

pub fn alice() -> StoredUser {
    StoredUser {
        user_id: "u1".to_string(),
        username: "alice".to_string(),
        profile_picture_url: None,
    }
}

pub fn meme(id: &str, like_count: u32) -> Meme {
    Meme {
        id: id.to_string(),
        title: format!("meme {id}"),
        image_url: format!("https://cdn.test.local/{id}.png"),
        uploader: "bob".to_string(),
        like_count,
        save_count: 0,
        comment_count: 0,
        comments: Vec::new(),
        created_at: Utc::now(),
    }
}

/// The transport of the most recent successful dial.
pub fn latest(net: &Rc<RefCell<FakeNet>>) -> Rc<FakeTransport> {
    net.borrow().transports.last().cloned().expect("no transport yet")
}

pub fn dial_count(net: &Rc<RefCell<FakeNet>>) -> usize {
    net.borrow().dials.len()
}

/// Let spawned tasks run without advancing the clock.
pub async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}
