// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Session with a single curtain controller.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::directory::BondedDevice;
use super::protocol::{Command, LineCodec};
use super::transport::Connector;
use crate::error::{Error, Result};

/// Reply timeout used by the controller firmware.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(1000);

const EVENT_CHANNEL_SIZE: usize = 32;

/// Events emitted by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Link established.
    Connected { device: String },
    /// Line received that no query was waiting for.
    Line(String),
    /// Link closed, locally or by the remote.
    Disconnected,
    /// Error occurred on the link.
    Error(String),
}

/// State of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connecting => "Connecting",
            SessionState::Connected => "Connected",
            SessionState::Disconnecting => "Disconnecting",
        }
    }
}

type ReplySlot = Arc<Mutex<Option<oneshot::Sender<String>>>>;

/// The inbound-line subscription: a reader task plus the reply slot it fills.
struct Subscription {
    reader: JoinHandle<()>,
    reply: ReplySlot,
}

/// Connection lifecycle and line traffic for one bonded device.
pub struct DeviceSession<C: Connector> {
    connector: C,
    device: BondedDevice,
    codec: LineCodec,
    response_timeout: Duration,
    state: Arc<RwLock<SessionState>>,
    writer: Option<WriteHalf<C::Stream>>,
    subscription: Option<Subscription>,
    event_tx: mpsc::Sender<SessionEvent>,
    event_rx: Option<mpsc::Receiver<SessionEvent>>,
}

impl<C: Connector> DeviceSession<C> {
    /// Create a disconnected session.
    pub fn new(
        connector: C,
        device: BondedDevice,
        codec: LineCodec,
        response_timeout: Duration,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);

        Self {
            connector,
            device,
            codec,
            response_timeout,
            state: Arc::new(RwLock::new(SessionState::Disconnected)),
            writer: None,
            subscription: None,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.event_rx.take()
    }

    pub fn device(&self) -> &BondedDevice {
        &self.device
    }

    pub fn codec(&self) -> &LineCodec {
        &self.codec
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Dropping session event: {}", e);
        }
    }

    /// Open the link. Does nothing if already connected.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            debug!("Already connected to {}", self.device.name);
            return Ok(());
        }

        // A link dropped by the remote leaves its subscription behind.
        self.release_subscription();
        self.writer = None;

        self.set_state(SessionState::Connecting);
        info!("Connecting to {} ({})", self.device.name, self.device.address);

        let stream = match self.connector.connect(&self.device).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to connect to {}: {}", self.device.name, e);
                self.set_state(SessionState::Disconnected);
                return Err(e);
            }
        };

        let (reader, writer) = tokio::io::split(stream);
        self.writer = Some(writer);
        self.set_state(SessionState::Connected);
        self.install_subscription(reader)?;

        info!("Connected to {}", self.device.name);
        self.emit(SessionEvent::Connected {
            device: self.device.name.clone(),
        });
        Ok(())
    }

    /// Close the link, releasing the subscription first.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.state() == SessionState::Disconnected && self.writer.is_none() {
            return Ok(());
        }

        self.set_state(SessionState::Disconnecting);
        info!("Disconnecting from {}", self.device.name);

        self.release_subscription();
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                warn!("Error closing link: {}", e);
            }
        }

        self.set_state(SessionState::Disconnected);
        self.emit(SessionEvent::Disconnected);
        Ok(())
    }

    /// Start the reader task for the inbound half of the link.
    fn install_subscription(&mut self, reader: ReadHalf<C::Stream>) -> Result<()> {
        if self.subscription.is_some() {
            return Err(Error::SubscriptionActive);
        }

        let reply: ReplySlot = Arc::new(Mutex::new(None));
        let task = tokio::spawn(read_lines(
            reader,
            self.codec.delimiter(),
            reply.clone(),
            self.state.clone(),
            self.event_tx.clone(),
        ));

        self.subscription = Some(Subscription { reader: task, reply });
        Ok(())
    }

    /// Stop the reader task and drop any pending reply waiter.
    pub fn release_subscription(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            debug!("Releasing data subscription");
            subscription.reply.lock().take();
            subscription.reader.abort();
        }
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    /// Write a command frame. Fire-and-forget.
    pub async fn send(&mut self, command: &Command) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let writer = self.writer.as_mut().ok_or(Error::NotConnected)?;

        let frame = self.codec.encode(command);
        debug!("Sending: {}", frame);
        writer.write_all(frame.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Send a command and wait for the next inbound line.
    ///
    /// Returns `Ok(None)` when nothing arrives within the response timeout;
    /// the waiter is released and later lines go to the event stream.
    pub async fn query(&mut self, command: &Command) -> Result<Option<String>> {
        let reply = match &self.subscription {
            Some(subscription) => subscription.reply.clone(),
            None => return Err(Error::NotConnected),
        };

        // Armed before the write: the reply can land before send() returns.
        let (tx, rx) = oneshot::channel();
        *reply.lock() = Some(tx);

        if let Err(e) = self.send(command).await {
            reply.lock().take();
            return Err(e);
        }

        match tokio::time::timeout(self.response_timeout, rx).await {
            Ok(Ok(line)) => Ok(Some(line)),
            Ok(Err(_)) => {
                debug!("Subscription released while waiting for reply");
                Ok(None)
            }
            Err(_) => {
                reply.lock().take();
                debug!(
                    "No reply to {:?} within {:?}",
                    command.opcode, self.response_timeout
                );
                Ok(None)
            }
        }
    }
}

impl<C: Connector> Drop for DeviceSession<C> {
    fn drop(&mut self) {
        self.release_subscription();
    }
}

/// Read delimited lines until EOF, handing each to the reply waiter or the
/// event stream.
async fn read_lines<R>(
    reader: ReadHalf<R>,
    delimiter: u8,
    reply: ReplySlot,
    state: Arc<RwLock<SessionState>>,
    event_tx: mpsc::Sender<SessionEvent>,
) where
    R: tokio::io::AsyncRead,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();

        match reader.read_until(delimiter, &mut buf).await {
            Ok(0) => {
                info!("Connection closed by remote");
                *state.write() = SessionState::Disconnected;
                let _ = event_tx.try_send(SessionEvent::Disconnected);
                break;
            }
            Ok(_) => {
                let raw = String::from_utf8_lossy(&buf);
                let line = raw
                    .trim_end_matches(delimiter as char)
                    .trim_end_matches('\r');
                if line.is_empty() {
                    continue;
                }
                debug!("Received: {}", line);

                let waiter = reply.lock().take();
                match waiter {
                    Some(tx) => {
                        if let Err(line) = tx.send(line.to_string()) {
                            warn!("Reply waiter gone, forwarding line: {}", line);
                            let _ = event_tx.try_send(SessionEvent::Line(line));
                        }
                    }
                    None => {
                        if let Err(e) = event_tx.try_send(SessionEvent::Line(line.to_string())) {
                            warn!("Dropping inbound line: {}", e);
                        }
                    }
                }
            }
            Err(e) => {
                error!("Read error: {}", e);
                *state.write() = SessionState::Disconnected;
                let _ = event_tx.try_send(SessionEvent::Error(e.to_string()));
                let _ = event_tx.try_send(SessionEvent::Disconnected);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluer::Address;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, DuplexStream};

    use crate::bluetooth::protocol::Opcode;

    /// Hands out in-memory links and keeps the device ends for the test.
    struct LoopbackConnector {
        connects: AtomicUsize,
        peers: mpsc::UnboundedSender<DuplexStream>,
    }

    impl Connector for LoopbackConnector {
        type Stream = DuplexStream;

        async fn connect(&self, _device: &BondedDevice) -> Result<DuplexStream> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let (local, remote) = tokio::io::duplex(1024);
            let _ = self.peers.send(remote);
            Ok(local)
        }
    }

    /// Refuses every connection attempt.
    struct RefusingConnector;

    impl Connector for RefusingConnector {
        type Stream = DuplexStream;

        async fn connect(&self, _device: &BondedDevice) -> Result<DuplexStream> {
            Err(Error::Io {
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "host is down"),
            })
        }
    }

    fn test_device() -> BondedDevice {
        BondedDevice {
            name: "SmartCurtain".to_string(),
            address: Address::new([0x98, 0xd3, 0x31, 0x00, 0x00, 0x01]),
            serial_port: true,
        }
    }

    fn session() -> (DeviceSession<LoopbackConnector>, mpsc::UnboundedReceiver<DuplexStream>) {
        let (peers, peer_rx) = mpsc::unbounded_channel();
        let connector = LoopbackConnector {
            connects: AtomicUsize::new(0),
            peers,
        };
        let session = DeviceSession::new(
            connector,
            test_device(),
            LineCodec::default(),
            Duration::from_millis(100),
        );
        (session, peer_rx)
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (mut session, _peers) = session();

        session.connect().await.unwrap();
        session.connect().await.unwrap();

        assert_eq!(session.connector.connects.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Connected);
        assert!(session.has_subscription());
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let (mut session, _peers) = session();

        let err = session.send(&Command::new(Opcode::Open)).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));

        let err = session.query(&Command::new(Opcode::QueryLed)).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn test_send_writes_hex_frame() {
        let (mut session, mut peers) = session();
        session.connect().await.unwrap();
        let mut device = peers.recv().await.unwrap();

        session
            .send(&Command::with_payload(Opcode::SetMotorSpeed, 150))
            .await
            .unwrap();

        let mut buf = [0u8; 6];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"260096");
    }

    #[tokio::test]
    async fn test_disconnect_releases_and_closes() {
        let (mut session, mut peers) = session();
        let mut events = session.take_event_receiver().unwrap();
        session.connect().await.unwrap();
        let mut device = peers.recv().await.unwrap();

        session.disconnect().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.has_subscription());

        let mut buf = Vec::new();
        let n = tokio::time::timeout(Duration::from_secs(1), device.read_to_end(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);

        assert_eq!(
            events.recv().await,
            Some(SessionEvent::Connected {
                device: "SmartCurtain".to_string()
            })
        );
        assert_eq!(events.recv().await, Some(SessionEvent::Disconnected));
    }

    #[tokio::test]
    async fn test_reconnect_after_disconnect() {
        let (mut session, _peers) = session();

        session.connect().await.unwrap();
        session.disconnect().await.unwrap();
        session.connect().await.unwrap();

        assert_eq!(session.connector.connects.load(Ordering::SeqCst), 2);
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_install_twice_is_rejected() {
        let (mut session, _peers) = session();
        session.connect().await.unwrap();

        let (_local, remote) = tokio::io::duplex(64);
        let (reader, _writer) = tokio::io::split(remote);
        assert!(matches!(
            session.install_subscription(reader),
            Err(Error::SubscriptionActive)
        ));
    }

    #[tokio::test]
    async fn test_failed_connect_returns_to_disconnected() {
        let mut session = DeviceSession::new(
            RefusingConnector,
            test_device(),
            LineCodec::default(),
            Duration::from_millis(100),
        );
        let mut events = session.take_event_receiver().unwrap();

        let err = session.connect().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Io { ref source } if source.kind() == io::ErrorKind::ConnectionRefused
        ));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.state().as_str(), "Disconnected");
        assert!(!session.has_subscription());

        let err = session.send(&Command::new(Opcode::Open)).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_event_channel_drops_lines_and_keeps_reading() {
        let (mut session, mut peers) = session();
        session.connect().await.unwrap();
        let mut device = peers.recv().await.unwrap();

        // Nobody drains the events: the Connected event plus 31 lines fill it.
        for i in 0..40 {
            device
                .write_all(format!("adc_value={}\n", i).as_bytes())
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 2];
            device.read_exact(&mut buf).await.unwrap();
            device.write_all(b"led_state=1\n").await.unwrap();
            device
        });
        let reply = session.query(&Command::new(Opcode::QueryLed)).await.unwrap();
        assert_eq!(reply.as_deref(), Some("led_state=1"));
        let _device = responder.await.unwrap();

        let mut events = session.take_event_receiver().unwrap();
        assert!(matches!(events.try_recv(), Ok(SessionEvent::Connected { .. })));
        let mut lines = Vec::new();
        while let Ok(SessionEvent::Line(line)) = events.try_recv() {
            lines.push(line);
        }
        assert_eq!(lines.len(), EVENT_CHANNEL_SIZE - 1);
        assert_eq!(lines.first().map(String::as_str), Some("adc_value=0"));
        assert_eq!(lines.last().map(String::as_str), Some("adc_value=30"));
    }
}
