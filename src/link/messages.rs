//! Message types exchanged with robots.
//!
//! - Outbound commands (gateway → robot): [`OutboundCommand`]
//! - Inbound envelopes (robot → gateway): [`InboundEnvelope`]

use crate::core::codes::{
    CommandType, ConfigProperty, DestinationCheckpoint, Direction, MessageType, Motor,
    NavigationType, RoutePolicy,
};
use serde_json::{Map, Value};
use std::fmt;

/// Symbolic property values accepted by lights and horn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchValue {
    On,
    Off,
    Play,
    Stop,
}

impl SwitchValue {
    /// Parse "ON" / "OFF" / "PLAY" / "STOP", case-insensitive
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "ON" => Some(SwitchValue::On),
            "OFF" => Some(SwitchValue::Off),
            "PLAY" => Some(SwitchValue::Play),
            "STOP" => Some(SwitchValue::Stop),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SwitchValue::On => "ON",
            SwitchValue::Off => "OFF",
            SwitchValue::Play => "PLAY",
            SwitchValue::Stop => "STOP",
        }
    }
}

/// New value for a `SetProperty` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyValue {
    /// Numeric level, 0-100
    Level(u8),
    /// Symbolic value, sent as its upper-case name
    Switch(SwitchValue),
}

/// Destination of a `Move` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveTarget {
    pub x: i32,
    pub y: i32,
    pub checkpoint: DestinationCheckpoint,
}

/// Command sent to a robot
///
/// Built once per outbound call and dropped after encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundCommand {
    /// Reset the board, or clear an error / emergency-stop state
    Reset,

    /// Stop every running task immediately
    EmergencyStop,

    SetProperty {
        property: ConfigProperty,
        value: PropertyValue,
    },

    GetProperty { property: ConfigProperty },

    /// Drive motors directly
    ///
    /// - `motors`: `None` drives the left/right drive motors; an explicit
    ///   empty list asks the robot to drive as a car
    /// - `speed`: 0-100 PWM ratio
    /// - `angle`: on-spot rotation, -360..=360 degrees
    /// - `duration_ms`: 0 keeps running until the next command
    MotorControl {
        motors: Option<Vec<Motor>>,
        direction: Direction,
        speed: u8,
        angle: i32,
        duration_ms: u32,
    },

    Move {
        target: MoveTarget,
        navigation_type: NavigationType,
        route_policy: RoutePolicy,
    },
}

impl OutboundCommand {
    /// Drive command as issued by the operator console: car-style, no rotation,
    /// continuous
    pub fn drive(direction: Direction, speed: u8) -> Self {
        OutboundCommand::MotorControl {
            motors: Some(Vec::new()),
            direction,
            speed,
            angle: 0,
            duration_ms: 0,
        }
    }

    /// Command code carried in `payload.command`
    pub fn command_type(&self) -> CommandType {
        match self {
            OutboundCommand::Reset => CommandType::Reset,
            OutboundCommand::EmergencyStop => CommandType::EmergencyStop,
            OutboundCommand::SetProperty { .. } => CommandType::SetProperty,
            OutboundCommand::GetProperty { .. } => CommandType::GetProperty,
            OutboundCommand::MotorControl { .. } => CommandType::MotorControl,
            OutboundCommand::Move { .. } => CommandType::Move,
        }
    }

    /// Replace the speed of a motor command; other commands are returned unchanged
    pub fn with_speed(self, new_speed: u8) -> Self {
        match self {
            OutboundCommand::MotorControl {
                motors,
                direction,
                angle,
                duration_ms,
                ..
            } => OutboundCommand::MotorControl {
                motors,
                direction,
                speed: new_speed,
                angle,
                duration_ms,
            },
            other => other,
        }
    }
}

impl fmt::Display for OutboundCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundCommand::Reset => write!(f, "reset"),
            OutboundCommand::EmergencyStop => write!(f, "emergency stop"),
            OutboundCommand::SetProperty { property, value } => {
                write!(f, "set {:?} = {:?}", property, value)
            }
            OutboundCommand::GetProperty { property } => write!(f, "get {:?}", property),
            OutboundCommand::MotorControl {
                direction, speed, ..
            } => write!(f, "motor control {:?} @ {}", direction, speed),
            OutboundCommand::Move { target, .. } => {
                write!(f, "move to ({}, {}) {:?}", target.x, target.y, target.checkpoint)
            }
        }
    }
}

/// Inbound message type
///
/// Names outside the protocol are kept so they can be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Known(MessageType),
    Unknown(String),
}

impl MessageKind {
    pub fn from_wire_name(name: &str) -> Self {
        match MessageType::from_wire_name(name) {
            Some(ty) => MessageKind::Known(ty),
            None => MessageKind::Unknown(name.to_string()),
        }
    }
}

/// Decoded robot → gateway envelope
///
/// The payload is left uninterpreted; each telemetry handler reads the fields
/// it needs.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEnvelope {
    pub protocol: String,
    /// Raw robot id; range-checked by the dispatcher, not the decoder
    pub robot_id: i64,
    pub message_type: MessageKind,
    /// Opaque correlation id, `Null` when absent
    pub request_id: Value,
    /// Free-form on inbound messages
    pub mode: Value,
    /// Robot clock, in whatever form the robot sends it; `Null` when absent
    pub timestamp: Value,
    pub payload: Map<String, Value>,
}

impl InboundEnvelope {
    /// Payload field, `Null` when absent
    pub fn field(&self, key: &str) -> Value {
        self.payload.get(key).cloned().unwrap_or(Value::Null)
    }
}
