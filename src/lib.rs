//! robot-link - UDP gateway between an operator console and mobile robots
//!
//! The console sends operator intents over the TCP bridge; the gateway
//! translates them into robot-net datagrams, tracks which address belongs to
//! which robot, and relays robot telemetry back to every console.
//!
//! ```text
//! console ──TCP──► bridge ──► intent ──► sender ──UDP──► robot
//! console ◄──TCP── bridge ◄── telemetry ◄── receiver ◄──UDP── robot
//! ```

pub mod bridge;
pub mod config;
pub mod core;
pub mod error;
pub mod gateway;
pub mod intent;
pub mod link;
pub mod transport;

// Re-export commonly used types
pub use config::GatewayConfig;
pub use crate::core::{DestinationSelector, LogicalRobotId};
pub use error::{Error, Result};
pub use gateway::{Gateway, IntentOutcome};
pub use intent::{IntentKind, OperatorIntent};
