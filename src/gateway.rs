//! Gateway instance: socket, registry, selected destination and receive thread
//!
//! ```text
//! start ──► handle_intent* ──► shutdown
//! ```
//!
//! Every piece of mutable state belongs to one `Gateway`, so several
//! gateways (or tests) can run side by side in one process.

use crate::config::{GatewayConfig, RobotProfile};
use crate::core::codes::MessageMode;
use crate::core::types::{DestinationSelector, LogicalRobotId};
use crate::error::{Error, Result};
use crate::intent::{IntentTranslator, OperatorIntent, Translation};
use crate::link::messages::OutboundCommand;
use crate::link::receiver::Dispatcher;
use crate::link::registry::RobotRegistry;
use crate::link::sender::{CommandSender, SendReport};
use crate::link::telemetry::EventSink;
use crate::link::wire::WireCodec;
use crate::transport::DatagramSocket;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::net::UdpSocket;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Name of the receive thread
pub const RX_THREAD_NAME: &str = "robot-link-rx";

/// Longest wait for the receive thread on shutdown
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of one operator intent
#[derive(Debug)]
pub enum IntentOutcome {
    /// The selected destination changed
    Selected(DestinationSelector),
    /// A command was sent (or deliberately not sent, see the report)
    Sent(SendReport),
}

/// Robot gateway
pub struct Gateway {
    registry: Arc<RobotRegistry>,
    translator: Mutex<IntentTranslator>,
    sender: CommandSender,
    profiles: BTreeMap<LogicalRobotId, RobotProfile>,
    running: Arc<AtomicBool>,
    rx_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Gateway {
    /// Bind the robot socket and start the receive thread
    pub fn start(config: &GatewayConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        let bind_addr = config.network.bind_addr()?;
        let socket = UdpSocket::bind(bind_addr)?;
        log::info!("Robot link listening on UDP {}", socket.local_addr()?);
        Self::with_socket(Arc::new(socket), config, sink)
    }

    /// Start on an already created socket
    pub fn with_socket(
        socket: Arc<dyn DatagramSocket>,
        config: &GatewayConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(RobotRegistry::new());
        let mut profiles = BTreeMap::new();
        for profile in &config.robots {
            let id = LogicalRobotId::new(profile.id)
                .ok_or_else(|| Error::Config(format!("robot id {} out of range", profile.id)))?;
            match profile.address {
                Some(address) => registry.seed(id, address),
                None => registry.register(id),
            }
            profiles.insert(id, profile.clone());
        }
        log::info!(
            "Roster: {}",
            profiles
                .iter()
                .map(|(id, p)| format!("{}={}", id, p.name))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let codec = WireCodec::new(config.network.protocol_id.clone());
        let sender = CommandSender::new(
            Arc::clone(&socket),
            Arc::clone(&registry),
            codec.clone(),
            config.network.robot_port()?,
        );

        let running = Arc::new(AtomicBool::new(true));
        let dispatcher = Dispatcher::new(
            socket,
            Arc::clone(&registry),
            codec,
            sink,
            config.network.frame_size,
            config.network.read_timeout(),
            Arc::clone(&running),
        );

        let rx_thread = thread::Builder::new()
            .name(RX_THREAD_NAME.into())
            .spawn(move || {
                if let Err(e) = dispatcher.run() {
                    log::error!("Receive thread error: {}", e);
                }
            })?;

        Ok(Self {
            registry,
            translator: Mutex::new(IntentTranslator::new()),
            sender,
            profiles,
            running,
            rx_thread: Mutex::new(Some(rx_thread)),
        })
    }

    /// Validate and execute one operator intent
    ///
    /// A rejected intent returns `Error::Validation` and sends nothing.
    pub fn handle_intent(&self, intent: &OperatorIntent) -> Result<IntentOutcome> {
        let translation = self.translator.lock().translate(intent)?;
        match translation {
            Translation::Selected(selector) => Ok(IntentOutcome::Selected(selector)),
            Translation::Send {
                destination,
                command,
                mode,
            } => self
                .send_command(destination, command, mode)
                .map(IntentOutcome::Sent),
        }
    }

    /// Send a command directly, bypassing the intent grammar
    ///
    /// Motor commands to a single robot run at that robot's configured speed.
    pub fn send_command(
        &self,
        destination: DestinationSelector,
        command: OutboundCommand,
        mode: MessageMode,
    ) -> Result<SendReport> {
        let command = match destination {
            DestinationSelector::Robot(id) => match self.profiles.get(&id) {
                Some(profile) => command.with_speed(profile.motor_speed),
                None => command,
            },
            _ => command,
        };
        self.sender.send(destination, &command, mode)
    }

    /// Currently selected destination
    pub fn selected(&self) -> DestinationSelector {
        self.translator.lock().selected()
    }

    pub fn registry(&self) -> &Arc<RobotRegistry> {
        &self.registry
    }

    /// Configured profile of a robot
    pub fn profile(&self, id: LogicalRobotId) -> Option<&RobotProfile> {
        self.profiles.get(&id)
    }

    /// Whether the receive thread is still running
    pub fn is_running(&self) -> bool {
        self.rx_thread
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the receive thread
    ///
    /// Waits at most two seconds; a thread still blocked after that is
    /// detached. Calling this more than once is harmless.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Relaxed);

        let Some(handle) = self.rx_thread.lock().take() else {
            return;
        };

        let join_start = Instant::now();
        while !handle.is_finished() && join_start.elapsed() < JOIN_TIMEOUT {
            thread::sleep(Duration::from_millis(10));
        }

        if handle.is_finished() {
            if let Err(e) = handle.join() {
                log::error!("Receive thread panicked: {:?}", e);
            }
            log::info!("Robot link stopped");
        } else {
            log::warn!(
                "Receive thread did not stop within {:?}, detaching",
                JOIN_TIMEOUT
            );
        }
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}
