//! Socket.IO connector and transport
//!
//! Each opened transport spawns one connection task on the ambient tokio runtime. The task
//! owns the WebSocket, answers Engine.IO pings, and reports lifecycle and application events
//! to the core through the shared event channel, tagged with the transport's handle.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use multichat_core::{
    ClientConfig, Connector, EventSender, HandleId, Outbound, Transport, TransportError,
    TransportErrorKind, TransportEvent, TransportEventKind, WireCodec,
};

use crate::config::SocketIoConfig;
use crate::error::SocketIoError;
use crate::packet::{connect_error_message, EnginePacket, Handshake, SocketPacket};

// ----------------------------------------------------------------------------
// Connector
// ----------------------------------------------------------------------------

pub struct SocketIoConnector {
    codec: WireCodec,
    config: SocketIoConfig,
}

impl SocketIoConnector {
    pub fn new(client: &ClientConfig, config: SocketIoConfig) -> Self {
        Self {
            codec: WireCodec::from_config(client),
            config,
        }
    }
}

impl Connector for SocketIoConnector {
    fn open(
        &self,
        address: &Url,
        handle: HandleId,
        events: EventSender,
    ) -> Result<Box<dyn Transport>, TransportError> {
        let endpoint = self
            .config
            .endpoint(address)
            .map_err(|e| e.into_transport_error(address))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SocketIoError::NoRuntime.into_transport_error(address))?;

        let (outgoing, commands) = mpsc::unbounded_channel();
        let connection = Connection::new(handle, self.codec.clone(), events);
        let heartbeat = self.config.heartbeat_timeout;

        info!("Opening Socket.IO transport {} to {}", handle, endpoint);
        runtime.spawn(run_connection(endpoint, connection, commands, heartbeat));

        Ok(Box::new(SocketIoTransport {
            handle,
            codec: self.codec.clone(),
            outgoing,
            closed: false,
        }))
    }
}

// ----------------------------------------------------------------------------
// Transport
// ----------------------------------------------------------------------------

#[derive(Debug)]
enum Outgoing {
    Frame(String),
    Close,
}

/// Handle to a running connection task
pub struct SocketIoTransport {
    handle: HandleId,
    codec: WireCodec,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    closed: bool,
}

impl Transport for SocketIoTransport {
    fn handle(&self) -> HandleId {
        self.handle
    }

    fn emit(&mut self, message: Outbound) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ChannelClosed);
        }
        let (name, payload) = self.codec.encode(&message);
        let frame = SocketPacket::Event { name, payload }.to_frame();
        self.outgoing
            .send(Outgoing::Frame(frame))
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.outgoing.send(Outgoing::Close).is_err() {
            debug!("Connection task for {} already finished", self.handle);
        }
    }
}

impl Drop for SocketIoTransport {
    fn drop(&mut self) {
        self.close();
    }
}

// ----------------------------------------------------------------------------
// Connection Protocol State
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum FrameOutcome {
    Continue,
    Reply(String),
    Closed,
}

/// Engine.IO / Socket.IO session state for one connection, independent of the socket
struct Connection {
    handle: HandleId,
    codec: WireCodec,
    events: EventSender,
    handshake: Option<Handshake>,
    acknowledged: bool,
    finished: bool,
}

impl Connection {
    fn new(handle: HandleId, codec: WireCodec, events: EventSender) -> Self {
        Self {
            handle,
            codec,
            events,
            handshake: None,
            acknowledged: false,
            finished: false,
        }
    }

    fn handle_frame(&mut self, frame: &str) -> FrameOutcome {
        let packet = match EnginePacket::parse(frame) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Skipping frame on {}: {}", self.handle, e);
                return FrameOutcome::Continue;
            }
        };

        match packet {
            EnginePacket::Open(data) => {
                match Handshake::parse(&data) {
                    Ok(handshake) => {
                        debug!("Engine.IO session {} on {}", handshake.sid, self.handle);
                        self.handshake = Some(handshake);
                    }
                    Err(e) => debug!("Unreadable handshake on {}: {}", self.handle, e),
                }
                FrameOutcome::Reply(SocketPacket::Connect(None).to_frame())
            }
            EnginePacket::Ping(data) => FrameOutcome::Reply(EnginePacket::Pong(data).encode()),
            EnginePacket::Close => {
                self.lost("transport close");
                FrameOutcome::Closed
            }
            EnginePacket::Message(data) => self.handle_packet(&data),
            EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {
                FrameOutcome::Continue
            }
        }
    }

    fn handle_packet(&mut self, data: &str) -> FrameOutcome {
        let packet = match SocketPacket::parse(data) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Skipping packet on {}: {}", self.handle, e);
                return FrameOutcome::Continue;
            }
        };

        match packet {
            SocketPacket::Connect(_) => {
                if !self.acknowledged {
                    self.acknowledged = true;
                    self.send(TransportEventKind::Connected);
                }
                FrameOutcome::Continue
            }
            SocketPacket::Disconnect => {
                self.lost("io server disconnect");
                FrameOutcome::Closed
            }
            SocketPacket::Event { name, payload } => {
                if let Some(kind) = self.codec.decode(&name, payload) {
                    self.send(kind);
                }
                FrameOutcome::Continue
            }
            SocketPacket::ConnectError(payload) => {
                let message = connect_error_message(&payload);
                self.finish(TransportEventKind::Error {
                    kind: TransportErrorKind::Connect,
                    message,
                });
                FrameOutcome::Closed
            }
            SocketPacket::Ack(_) => FrameOutcome::Continue,
        }
    }

    /// The connection ended without a local close: a connect error before the server
    /// acknowledged us, a disconnect after
    fn lost(&mut self, reason: &str) {
        let kind = if self.acknowledged {
            TransportEventKind::Disconnected {
                reason: reason.to_string(),
            }
        } else {
            TransportEventKind::Error {
                kind: TransportErrorKind::Connect,
                message: reason.to_string(),
            }
        };
        self.finish(kind);
    }

    /// The socket itself failed
    fn fail(&mut self, error: SocketIoError) {
        self.lost(&error.to_string());
    }

    /// Report the terminal event; only the first one is delivered
    fn finish(&mut self, kind: TransportEventKind) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.send(kind);
    }

    /// Closed locally: nothing more is reported
    fn close(&mut self) {
        self.finished = true;
    }

    fn send(&self, kind: TransportEventKind) {
        if self.events.send(TransportEvent::new(self.handle, kind)).is_err() {
            debug!("Event receiver for {} is gone", self.handle);
        }
    }

    fn heartbeat_deadline(&self) -> Option<Instant> {
        self.handshake
            .as_ref()
            .and_then(|handshake| Instant::now().checked_add(handshake.heartbeat_window()))
    }
}

// ----------------------------------------------------------------------------
// Connection Task
// ----------------------------------------------------------------------------

async fn run_connection(
    endpoint: Url,
    mut connection: Connection,
    mut commands: mpsc::UnboundedReceiver<Outgoing>,
    heartbeat: bool,
) {
    let connecting = connect_async(endpoint.as_str());
    tokio::pin!(connecting);

    let socket = loop {
        tokio::select! {
            result = &mut connecting => match result {
                Ok((socket, _)) => break socket,
                Err(e) => {
                    warn!("WebSocket connect to {} failed: {}", endpoint, e);
                    connection.fail(e.into());
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(Outgoing::Frame(frame)) => {
                    debug!(
                        "Dropping frame on {} before the socket opened: {}",
                        connection.handle, frame
                    );
                }
                Some(Outgoing::Close) | None => {
                    debug!("Transport {} closed before the socket opened", connection.handle);
                    connection.close();
                    return;
                }
            },
        }
    };

    debug!("WebSocket open for {}", connection.handle);
    let (mut sink, mut stream) = socket.split();
    let mut deadline: Option<Instant> = None;

    loop {
        let heartbeat_expired = async move {
            match deadline {
                Some(at) if heartbeat => sleep_until(at).await,
                _ => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let outcome = connection.handle_frame(&text);
                    deadline = connection.heartbeat_deadline();
                    match outcome {
                        FrameOutcome::Continue => {}
                        FrameOutcome::Reply(reply) => {
                            if let Err(e) = sink.send(WsMessage::Text(reply)).await {
                                connection.fail(e.into());
                                return;
                            }
                        }
                        FrameOutcome::Closed => {
                            if let Err(e) = sink.close().await {
                                debug!("Closing socket for {} failed: {}", connection.handle, e);
                            }
                            return;
                        }
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    connection.lost("transport close");
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error on {}: {}", connection.handle, e);
                    connection.fail(e.into());
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(Outgoing::Frame(frame)) => {
                    if let Err(e) = sink.send(WsMessage::Text(frame)).await {
                        connection.fail(e.into());
                        return;
                    }
                }
                Some(Outgoing::Close) | None => {
                    connection.close();
                    let goodbye = SocketPacket::Disconnect.to_frame();
                    if let Err(e) = sink.send(WsMessage::Text(goodbye)).await {
                        debug!("Could not say goodbye on {}: {}", connection.handle, e);
                    }
                    if let Err(e) = sink.close().await {
                        debug!("Closing socket for {} failed: {}", connection.handle, e);
                    }
                    info!("Transport {} closed", connection.handle);
                    return;
                }
            },
            _ = heartbeat_expired => {
                warn!("No ping from server on {}", connection.handle);
                connection.lost("ping timeout");
                return;
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use multichat_core::{create_event_channel, EventReceiver, UserId};

    fn connection() -> (Connection, EventReceiver) {
        let (tx, rx) = create_event_channel();
        let codec = WireCodec::from_config(&ClientConfig::default());
        (Connection::new(HandleId::new(7), codec, tx), rx)
    }

    fn drain(rx: &mut EventReceiver) -> Vec<TransportEventKind> {
        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.handle, HandleId::new(7));
            kinds.push(event.kind);
        }
        kinds
    }

    #[test]
    fn test_open_is_answered_with_connect() {
        let (mut conn, mut rx) = connection();
        let outcome = conn.handle_frame(
            r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#,
        );

        assert_eq!(outcome, FrameOutcome::Reply("40".to_string()));
        assert!(conn.heartbeat_deadline().is_some());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_oversized_heartbeat_is_accepted() {
        let (mut conn, mut rx) = connection();
        let outcome = conn.handle_frame(
            r#"0{"sid":"s1","upgrades":[],"pingInterval":18446744073709551615,"pingTimeout":20000}"#,
        );

        assert_eq!(outcome, FrameOutcome::Reply("40".to_string()));
        // Either far in the future or no deadline at all
        if let Some(deadline) = conn.heartbeat_deadline() {
            assert!(deadline > Instant::now());
        }
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_ping_is_answered_with_pong() {
        let (mut conn, _rx) = connection();
        assert_eq!(conn.handle_frame("2"), FrameOutcome::Reply("3".to_string()));
    }

    #[test]
    fn test_ack_reports_connected_once() {
        let (mut conn, mut rx) = connection();
        conn.handle_frame(r#"40{"sid":"a"}"#);
        conn.handle_frame(r#"40{"sid":"b"}"#);

        assert_eq!(drain(&mut rx), vec![TransportEventKind::Connected]);
    }

    #[test]
    fn test_application_events_are_decoded() {
        let (mut conn, mut rx) = connection();
        conn.handle_frame("40");
        conn.handle_frame(r#"42["update_client",{"list":["alice","bob"]}]"#);
        conn.handle_frame(r#"42["typing",{"from":"bob"}]"#);
        conn.handle_frame(r#"42["im",{"from":"bob","to":"alice","text":"hey"}]"#);

        let kinds = drain(&mut rx);
        assert_eq!(kinds.len(), 3);
        assert_eq!(
            kinds[1],
            TransportEventKind::RosterUpdate(vec![UserId::from("alice"), UserId::from("bob")])
        );
        let TransportEventKind::Message(message) = &kinds[2] else {
            panic!("expected a message");
        };
        assert_eq!(message.text, "hey");
    }

    #[test]
    fn test_malformed_frames_are_skipped() {
        let (mut conn, mut rx) = connection();
        assert_eq!(conn.handle_frame(""), FrameOutcome::Continue);
        assert_eq!(conn.handle_frame("x"), FrameOutcome::Continue);
        assert_eq!(conn.handle_frame("42[broken"), FrameOutcome::Continue);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_connect_error_packet() {
        let (mut conn, mut rx) = connection();
        let outcome = conn.handle_frame(r#"44{"message":"Not authorized"}"#);

        assert_eq!(outcome, FrameOutcome::Closed);
        assert_eq!(
            drain(&mut rx),
            vec![TransportEventKind::Error {
                kind: TransportErrorKind::Connect,
                message: "Not authorized".to_string(),
            }]
        );
    }

    #[test]
    fn test_loss_before_ack_is_connect_error() {
        let (mut conn, mut rx) = connection();
        conn.lost("Connection refused");

        assert!(matches!(
            drain(&mut rx).as_slice(),
            [TransportEventKind::Error { kind: TransportErrorKind::Connect, .. }]
        ));
    }

    #[test]
    fn test_socket_failure_before_ack_is_connect_error() {
        let (mut conn, mut rx) = connection();
        conn.fail(tokio_tungstenite::tungstenite::Error::ConnectionClosed.into());

        match drain(&mut rx).as_slice() {
            [TransportEventKind::Error { kind: TransportErrorKind::Connect, message }] => {
                assert!(message.starts_with("WebSocket error"), "{}", message);
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_loss_after_ack_is_disconnect() {
        let (mut conn, mut rx) = connection();
        conn.handle_frame("40");
        conn.handle_frame("41");
        conn.lost("transport close");

        assert_eq!(
            drain(&mut rx),
            vec![
                TransportEventKind::Connected,
                TransportEventKind::Disconnected {
                    reason: "io server disconnect".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_local_close_reports_nothing() {
        let (mut conn, mut rx) = connection();
        conn.handle_frame("40");
        conn.close();
        conn.lost("transport close");

        assert_eq!(drain(&mut rx), vec![TransportEventKind::Connected]);
    }

    #[test]
    fn test_emit_after_close_fails() {
        let (outgoing, mut commands) = mpsc::unbounded_channel();
        let mut transport = SocketIoTransport {
            handle: HandleId::new(1),
            codec: WireCodec::from_config(&ClientConfig::default()),
            outgoing,
            closed: false,
        };

        transport
            .emit(Outbound::Identify(UserId::from("alice")))
            .unwrap();
        transport.close();
        transport.close();

        assert!(matches!(
            commands.try_recv(),
            Ok(Outgoing::Frame(frame)) if frame == r#"42["identify","alice"]"#
        ));
        assert!(matches!(commands.try_recv(), Ok(Outgoing::Close)));
        assert!(commands.try_recv().is_err());
        assert_eq!(
            transport.emit(Outbound::Identify(UserId::from("alice"))),
            Err(TransportError::ChannelClosed)
        );
    }
}
