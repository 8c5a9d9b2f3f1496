//! Operator console bridge over TCP

pub mod framing;
pub mod queue;
pub mod server;

pub use queue::EventQueue;
pub use server::BridgeServer;
