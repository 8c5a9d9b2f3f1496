//! Command sender: destination resolution and fan-out
//!
//! | Selector | Behaviour |
//! |----------|-----------|
//! | `Robot(id)` | Resolve via registry, one datagram; unknown address is reported |
//! | `All` | Encode once, one datagram per registry id with an address |
//! | `None` | No datagram; encoded message logged at debug |
//! | `Error` | No datagram; encoded message logged at warn |
//!
//! A failure for one robot (no address, socket error) is recorded in the
//! [`SendReport`] and never stops sends to the other robots. Nothing is
//! retried or queued.

use crate::core::codes::MessageMode;
use crate::core::types::{DestinationSelector, LogicalRobotId};
use crate::error::{Error, Result};
use crate::link::messages::OutboundCommand;
use crate::link::registry::RobotRegistry;
use crate::link::wire::WireCodec;
use crate::transport::DatagramSocket;
use std::net::SocketAddr;
use std::sync::Arc;

/// A message that was built but deliberately not sent
#[derive(Debug)]
pub struct Diagnostic {
    /// Always `Error::Selector`
    pub reason: Error,
    /// The encoded message
    pub message: String,
}

/// Result of one `send` call
#[derive(Debug)]
pub struct SendReport {
    pub selector: DestinationSelector,
    /// Robots a datagram was handed to the socket for
    pub delivered: Vec<(LogicalRobotId, SocketAddr)>,
    /// Robots skipped, with `Error::AddressUnknown` or `Error::Io`
    pub skipped: Vec<(LogicalRobotId, Error)>,
    /// Set for the NONE and ERR selectors
    pub diagnostic: Option<Diagnostic>,
}

impl SendReport {
    fn new(selector: DestinationSelector) -> Self {
        Self {
            selector,
            delivered: Vec::new(),
            skipped: Vec::new(),
            diagnostic: None,
        }
    }

    pub fn datagrams_sent(&self) -> usize {
        self.delivered.len()
    }
}

/// Resolves destinations and writes datagrams
pub struct CommandSender {
    socket: Arc<dyn DatagramSocket>,
    registry: Arc<RobotRegistry>,
    codec: WireCodec,
    /// Port robots listen on
    robot_port: u16,
}

impl CommandSender {
    pub fn new(
        socket: Arc<dyn DatagramSocket>,
        registry: Arc<RobotRegistry>,
        codec: WireCodec,
        robot_port: u16,
    ) -> Self {
        Self {
            socket,
            registry,
            codec,
            robot_port,
        }
    }

    /// Encode `command` and send it to `selector`
    ///
    /// Only an encoding failure is returned as `Err`; per-robot problems are in
    /// the report.
    pub fn send(
        &self,
        selector: DestinationSelector,
        command: &OutboundCommand,
        mode: MessageMode,
    ) -> Result<SendReport> {
        let bytes = match self.codec.encode(command, mode, None) {
            Ok(bytes) => bytes,
            Err(e) => {
                // Well-formed commands always encode; this is a bug upstream
                log::error!("Failed to encode {} for {}: {}", command, selector, e);
                return Err(e);
            }
        };

        let mut report = SendReport::new(selector);

        match selector {
            DestinationSelector::All => {
                for id in self.registry.known_ids() {
                    self.send_to_robot(id, &bytes, &mut report);
                }
                log::debug!(
                    "Sent {} to {} robots ({} skipped)",
                    command,
                    report.delivered.len(),
                    report.skipped.len()
                );
            }
            DestinationSelector::Robot(id) => {
                self.send_to_robot(id, &bytes, &mut report);
            }
            DestinationSelector::None => {
                let message = String::from_utf8_lossy(&bytes).into_owned();
                log::debug!(
                    "Destination is NONE, not sending {}:\n{}",
                    command,
                    message
                );
                report.diagnostic = Some(Diagnostic {
                    reason: Error::Selector(selector),
                    message,
                });
            }
            DestinationSelector::Error => {
                let message = String::from_utf8_lossy(&bytes).into_owned();
                log::warn!(
                    "Destination is ERR, not sending {}:\n{}",
                    command,
                    message
                );
                report.diagnostic = Some(Diagnostic {
                    reason: Error::Selector(selector),
                    message,
                });
            }
        }

        Ok(report)
    }

    fn send_to_robot(&self, id: LogicalRobotId, bytes: &[u8], report: &mut SendReport) {
        let ip = match self.registry.resolve(id) {
            Ok(ip) => ip,
            Err(e) => {
                log::debug!("No IP known for robot {}", id);
                report.skipped.push((id, e));
                return;
            }
        };

        let target = SocketAddr::new(ip, self.robot_port);
        match self.socket.send_to(bytes, target) {
            Ok(_) => {
                log::trace!("Sent {} bytes to robot {} at {}", bytes.len(), id, target);
                report.delivered.push((id, target));
            }
            Err(e) => {
                log::warn!("Failed to send to robot {} at {}: {}", id, target, e);
                report.skipped.push((id, Error::Io(e)));
            }
        }
    }
}
