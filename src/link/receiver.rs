//! Receive loop for robot datagrams
//!
//! Each datagram goes through the same steps:
//!
//! ```text
//! recv_from ──► decode ──► protocol / id check ──► registry update
//!                                                      │
//!                        sink.emit ◄── telemetry handler ◄┘
//! ```
//!
//! A bad datagram is dropped at the step that rejects it. Nothing that
//! arrives from the network can stop the loop, including the per-datagram
//! errors some platforms report on receive (ICMP resets, oversized
//! datagrams). Only the running flag or a real socket failure does.

use crate::core::types::LogicalRobotId;
use crate::error::{Error, Result};
use crate::link::messages::MessageKind;
use crate::link::registry::RobotRegistry;
use crate::link::telemetry::{self, EventSink, GuiEvent};
use crate::link::wire::WireCodec;
use crate::transport::{self, DatagramSocket};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Why a datagram was discarded before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Not valid UTF-8 JSON, or a required envelope field is missing
    Malformed,
    /// `protocol` differs from ours
    ForeignProtocol(String),
    /// `robot_id` outside the fleet range
    RobotIdOutOfRange(i64),
}

/// What happened to one datagram
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Dropped(DropReason),
    /// Valid envelope of a type that carries no telemetry
    Unclassified(LogicalRobotId),
    /// Event handed to the sink
    Forwarded(GuiEvent),
    /// Event built but the sink refused it
    SinkFailed(GuiEvent),
}

/// Owns the receive side of the robot socket
pub struct Dispatcher {
    socket: Arc<dyn DatagramSocket>,
    registry: Arc<RobotRegistry>,
    codec: WireCodec,
    sink: Arc<dyn EventSink>,
    frame_size: usize,
    read_timeout: Duration,
    running: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(
        socket: Arc<dyn DatagramSocket>,
        registry: Arc<RobotRegistry>,
        codec: WireCodec,
        sink: Arc<dyn EventSink>,
        frame_size: usize,
        read_timeout: Duration,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            socket,
            registry,
            codec,
            sink,
            frame_size,
            read_timeout,
            running,
        }
    }

    /// Run until the running flag clears or the socket fails
    ///
    /// The flag is checked after every datagram and every read timeout, so
    /// shutdown is observed within one timeout.
    pub fn run(&self) -> Result<()> {
        if let Err(e) = self.socket.set_read_timeout(Some(self.read_timeout)) {
            log::warn!("Failed to set read timeout: {}", e);
        }

        let mut buffer = vec![0u8; self.frame_size];
        log::info!(
            "Robot receive loop started (frame size {} bytes)",
            self.frame_size
        );

        while self.running.load(Ordering::Relaxed) {
            match self.socket.recv_from(&mut buffer) {
                Ok((len, from)) => {
                    self.process(&buffer[..len], from, Utc::now());
                }
                Err(e) if transport::is_timeout(&e) => continue,
                Err(e) if transport::is_datagram_error(&e) => {
                    log::debug!("Ignoring receive error: {}", e);
                    continue;
                }
                Err(e) => {
                    log::error!("Robot socket failed, stopping receive loop: {}", e);
                    return Err(Error::Io(e));
                }
            }
        }

        log::info!("Robot receive loop stopped");
        Ok(())
    }

    /// Handle one datagram received from `from` at `now`
    pub fn process(&self, raw: &[u8], from: SocketAddr, now: DateTime<Utc>) -> DispatchOutcome {
        let envelope = match self.codec.decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::debug!("Dropping datagram from {}: {}", from, e);
                return DispatchOutcome::Dropped(DropReason::Malformed);
            }
        };

        if envelope.protocol != self.codec.protocol_id() {
            log::debug!(
                "Dropping datagram from {}: protocol {:?}",
                from,
                envelope.protocol
            );
            return DispatchOutcome::Dropped(DropReason::ForeignProtocol(envelope.protocol));
        }

        let Some(robot_id) = LogicalRobotId::new(envelope.robot_id) else {
            log::debug!(
                "Dropping datagram from {}: robot id {} out of range",
                from,
                envelope.robot_id
            );
            return DispatchOutcome::Dropped(DropReason::RobotIdOutOfRange(envelope.robot_id));
        };

        self.registry.update(robot_id, from.ip(), now);

        let Some(event) = telemetry::handle(robot_id, &envelope) else {
            match &envelope.message_type {
                MessageKind::Unknown(name) => {
                    log::debug!("Unknown message type {:?} from robot {}", name, robot_id)
                }
                MessageKind::Known(ty) => {
                    log::debug!("Ignoring {} message from robot {}", ty.wire_name(), robot_id)
                }
            }
            return DispatchOutcome::Unclassified(robot_id);
        };

        log::trace!("{} from robot {}", event.name(), robot_id);
        match self.sink.emit(event.clone()) {
            Ok(()) => DispatchOutcome::Forwarded(event),
            Err(e) => {
                log::warn!("Dropped {} from robot {}: {}", event.name(), robot_id, e);
                DispatchOutcome::SinkFailed(event)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::telemetry::RecordingSink;
    use crate::transport::MockSocket;
    use std::net::IpAddr;
    use std::thread;
    use std::time::Instant;

    const PROTOCOL: &str = "robot-net/1.0";

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn id(n: i64) -> LogicalRobotId {
        LogicalRobotId::new(n).unwrap()
    }

    fn heartbeat(protocol: &str, robot_id: i64) -> Vec<u8> {
        format!(
            r#"{{"protocol":"{}","robot_id":{},"message_type":"heartbeat","payload":{{"state":0,"rssi":-55}}}}"#,
            protocol, robot_id
        )
        .into_bytes()
    }

    struct Fixture {
        socket: MockSocket,
        registry: Arc<RobotRegistry>,
        sink: Arc<RecordingSink>,
        running: Arc<AtomicBool>,
        dispatcher: Dispatcher,
    }

    fn fixture() -> Fixture {
        let socket = MockSocket::new(addr("0.0.0.0:8000"));
        let registry = Arc::new(RobotRegistry::new());
        let sink = Arc::new(RecordingSink::new());
        let running = Arc::new(AtomicBool::new(true));
        let dispatcher = Dispatcher::new(
            Arc::new(socket.clone()),
            Arc::clone(&registry),
            WireCodec::new(PROTOCOL),
            sink.clone(),
            2048,
            Duration::from_millis(10),
            Arc::clone(&running),
        );
        Fixture {
            socket,
            registry,
            sink,
            running,
            dispatcher,
        }
    }

    #[test]
    fn test_heartbeat_is_forwarded_and_registers_robot() {
        let f = fixture();
        let outcome = f
            .dispatcher
            .process(&heartbeat(PROTOCOL, 2), addr("10.0.0.2:8000"), Utc::now());

        assert!(matches!(outcome, DispatchOutcome::Forwarded(GuiEvent::Heartbeat(_))));
        assert_eq!(f.registry.resolve(id(2)).unwrap(), ip("10.0.0.2"));
        assert_eq!(f.sink.events().len(), 1);
        assert_eq!(f.sink.events()[0].robot_id(), id(2));
    }

    #[test]
    fn test_foreign_protocol_has_no_effect() {
        let f = fixture();
        let outcome = f
            .dispatcher
            .process(&heartbeat("other/2.0", 1), addr("10.0.0.1:8000"), Utc::now());

        assert_eq!(
            outcome,
            DispatchOutcome::Dropped(DropReason::ForeignProtocol("other/2.0".into()))
        );
        assert!(f.registry.is_empty());
        assert!(f.sink.events().is_empty());
    }

    #[test]
    fn test_out_of_range_robot_id_is_dropped() {
        let f = fixture();
        for bad in [0, 5, -1] {
            let outcome = f
                .dispatcher
                .process(&heartbeat(PROTOCOL, bad), addr("10.0.0.9:8000"), Utc::now());
            assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::RobotIdOutOfRange(bad)));
        }
        assert!(f.registry.is_empty());
        assert!(f.sink.events().is_empty());
    }

    #[test]
    fn test_malformed_datagrams_are_dropped() {
        let f = fixture();
        for raw in [
            &b"\xff\xfe"[..],
            b"not json",
            b"[1,2,3]",
            br#"{"robot_id":1,"message_type":"heartbeat"}"#,
        ] {
            let outcome = f.dispatcher.process(raw, addr("10.0.0.1:8000"), Utc::now());
            assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::Malformed));
        }
        assert!(f.registry.is_empty());
    }

    #[test]
    fn test_unknown_type_still_updates_registry() {
        let f = fixture();
        let raw = br#"{"protocol":"robot-net/1.0","robot_id":4,"message_type":"debug"}"#;
        let outcome = f.dispatcher.process(raw, addr("10.0.0.4:8000"), Utc::now());

        assert_eq!(outcome, DispatchOutcome::Unclassified(id(4)));
        assert_eq!(f.registry.resolve(id(4)).unwrap(), ip("10.0.0.4"));
        assert!(f.sink.events().is_empty());
    }

    #[test]
    fn test_sink_failure_is_not_fatal() {
        let f = fixture();
        f.sink.set_unavailable(true);
        let outcome = f
            .dispatcher
            .process(&heartbeat(PROTOCOL, 1), addr("10.0.0.1:8000"), Utc::now());
        assert!(matches!(outcome, DispatchOutcome::SinkFailed(_)));

        f.sink.set_unavailable(false);
        let outcome = f
            .dispatcher
            .process(&heartbeat(PROTOCOL, 1), addr("10.0.0.1:8000"), Utc::now());
        assert!(matches!(outcome, DispatchOutcome::Forwarded(_)));
    }

    #[test]
    fn test_run_processes_datagrams_until_stopped() {
        let f = fixture();
        f.socket.inject(b"garbage", addr("10.0.0.1:8000"));
        f.socket.inject(&heartbeat(PROTOCOL, 1), addr("10.0.0.1:8000"));
        f.socket.inject(&heartbeat(PROTOCOL, 3), addr("10.0.0.3:8000"));

        let Fixture {
            socket,
            sink,
            running,
            dispatcher,
            ..
        } = f;
        let handle = thread::spawn(move || dispatcher.run());

        let deadline = Instant::now() + Duration::from_secs(2);
        while sink.events().len() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(sink.events().len(), 2);
        assert_eq!(socket.pending(), 0);

        running.store(false, Ordering::Relaxed);
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_run_survives_reset_from_unreachable_robot() {
        let f = fixture();
        f.socket.inject_error(std::io::ErrorKind::ConnectionReset);
        f.socket.inject_error(std::io::ErrorKind::ConnectionRefused);
        f.socket.inject(&heartbeat(PROTOCOL, 2), addr("10.0.0.2:8000"));

        let Fixture {
            socket,
            sink,
            running,
            dispatcher,
            ..
        } = f;
        let handle = thread::spawn(move || dispatcher.run());

        let deadline = Instant::now() + Duration::from_secs(2);
        while sink.events().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(sink.events().len(), 1);
        assert_eq!(socket.pending(), 0);
        assert!(!handle.is_finished());

        running.store(false, Ordering::Relaxed);
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_run_ends_on_socket_error() {
        let f = fixture();
        f.socket.close();
        assert!(matches!(f.dispatcher.run(), Err(Error::Io(_))));
    }
}
