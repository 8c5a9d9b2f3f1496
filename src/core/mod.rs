//! Core identity types and wire protocol codes

pub mod codes;
pub mod types;

pub use codes::{
    CommandType, ConfigProperty, DestinationCheckpoint, Direction, MessageMode, MessageType, Motor,
    NavigationType, RoutePolicy,
};
pub use types::{DestinationSelector, LogicalRobotId};
