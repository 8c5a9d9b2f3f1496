//! Telemetry handlers and GUI-facing events.
//!
//! Each inbound message type has one handler that reads the payload fields it
//! cares about and produces a normalized [`GuiEvent`]:
//!
//! | Inbound type | GUI event | Fields |
//! |--------------|-----------|--------|
//! | heartbeat | `robot_heartbeat` | robot_id, state, rssi, timestamp |
//! | event | `robot_event` | robot_id, every payload field |
//! | feedback | `robot_feedback` | robot_id, request_id, status, error |
//! | error | `robot_error` | robot_id, severity, error |
//!
//! Missing payload fields are forwarded as `null`. `timestamp` and
//! `request_id` are passed through exactly as the robot sent them.

use crate::core::codes::MessageType;
use crate::core::types::LogicalRobotId;
use crate::error::{Error, Result};
use crate::link::messages::{InboundEnvelope, MessageKind};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};

/// Event forwarded to operator consoles
///
/// Serializes as `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum GuiEvent {
    #[serde(rename = "robot_heartbeat")]
    Heartbeat(HeartbeatEvent),
    #[serde(rename = "robot_event")]
    Event(RobotEvent),
    #[serde(rename = "robot_feedback")]
    Feedback(FeedbackEvent),
    #[serde(rename = "robot_error")]
    Error(ErrorEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeartbeatEvent {
    pub robot_id: LogicalRobotId,
    pub state: Value,
    pub rssi: Value,
    pub timestamp: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotEvent {
    pub robot_id: LogicalRobotId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackEvent {
    pub robot_id: LogicalRobotId,
    pub request_id: Value,
    pub status: Value,
    pub error: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEvent {
    pub robot_id: LogicalRobotId,
    pub severity: Value,
    pub error: Value,
}

impl GuiEvent {
    /// Event name as seen by the console
    pub fn name(&self) -> &'static str {
        match self {
            GuiEvent::Heartbeat(_) => "robot_heartbeat",
            GuiEvent::Event(_) => "robot_event",
            GuiEvent::Feedback(_) => "robot_feedback",
            GuiEvent::Error(_) => "robot_error",
        }
    }

    pub fn robot_id(&self) -> LogicalRobotId {
        match self {
            GuiEvent::Heartbeat(e) => e.robot_id,
            GuiEvent::Event(e) => e.robot_id,
            GuiEvent::Feedback(e) => e.robot_id,
            GuiEvent::Error(e) => e.robot_id,
        }
    }
}

/// Destination for GUI events
///
/// Called from the receive thread; implementations must not block for long.
pub trait EventSink: Send + Sync {
    /// Forward one event. An error means the event was dropped.
    fn emit(&self, event: GuiEvent) -> Result<()>;
}

/// Run the handler for the envelope's message type
///
/// Returns `None` for types that carry no telemetry (commands, resets, unknown).
pub fn handle(robot_id: LogicalRobotId, envelope: &InboundEnvelope) -> Option<GuiEvent> {
    match &envelope.message_type {
        MessageKind::Known(MessageType::Heartbeat) => Some(heartbeat(robot_id, envelope)),
        MessageKind::Known(MessageType::Event) => Some(event(robot_id, envelope)),
        MessageKind::Known(MessageType::Feedback) => Some(feedback(robot_id, envelope)),
        MessageKind::Known(MessageType::Error) => Some(error(robot_id, envelope)),
        MessageKind::Known(_) | MessageKind::Unknown(_) => None,
    }
}

fn heartbeat(robot_id: LogicalRobotId, envelope: &InboundEnvelope) -> GuiEvent {
    GuiEvent::Heartbeat(HeartbeatEvent {
        robot_id,
        state: envelope.field("state"),
        rssi: envelope.field("rssi"),
        timestamp: envelope.timestamp.clone(),
    })
}

fn event(robot_id: LogicalRobotId, envelope: &InboundEnvelope) -> GuiEvent {
    let mut fields = envelope.payload.clone();
    // The envelope's id is authoritative
    fields.remove("robot_id");
    GuiEvent::Event(RobotEvent { robot_id, fields })
}

fn feedback(robot_id: LogicalRobotId, envelope: &InboundEnvelope) -> GuiEvent {
    GuiEvent::Feedback(FeedbackEvent {
        robot_id,
        request_id: envelope.request_id.clone(),
        status: envelope.field("status"),
        error: envelope.field("error"),
    })
}

fn error(robot_id: LogicalRobotId, envelope: &InboundEnvelope) -> GuiEvent {
    GuiEvent::Error(ErrorEvent {
        robot_id,
        severity: envelope.field("severity"),
        error: envelope.field("error"),
    })
}

/// Sink that keeps every event in memory
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<GuiEvent>>,
    unavailable: Mutex<bool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far
    pub fn events(&self) -> Vec<GuiEvent> {
        self.events.lock().clone()
    }

    /// Make later `emit` calls fail, as a stopped bridge would
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock() = unavailable;
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: GuiEvent) -> Result<()> {
        if *self.unavailable.lock() {
            return Err(Error::SinkUnavailable("recording sink disabled".into()));
        }
        self.events.lock().push(event);
        Ok(())
    }
}
