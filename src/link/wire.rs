//! robot-net JSON wire codec
//!
//! # Envelope
//!
//! Every datagram carries exactly one JSON object:
//!
//! ```text
//! {
//!   "protocol":     "robot-net/1.0",              configured protocol identifier
//!   "message_type": 0,                            code outbound, name inbound ("heartbeat", ...)
//!   "robot_id":     2,                            inbound only, 1..=4
//!   "request_id":   "a7",                         hex string
//!   "mode":         0,                            manual=0 / auto=1 outbound, free-form inbound
//!   "timestamp":    "2026-02-09T14:30:05.123456Z",
//!   "payload":      { "command": 2, ... }
//! }
//! ```
//!
//! Enum-valued fields are always sent as integer codes so that the wire stays
//! compact and survives renames.
//!
//! # Request ids
//!
//! Outbound request ids are one random byte, hex encoded. With more than a
//! handful of requests outstanding, ids collide; they are meant for loose
//! correlation by the console, not for matching responses. Widening them
//! changes wire compatibility with deployed robots.
//!
//! # Error Handling
//!
//! - **Malformed datagram**: `Error::Decode`, the caller drops it
//! - **Invalid command field**: `Error::Encoding`, nothing is produced

use crate::core::codes::{CommandType, MessageMode, MessageType, Motor};
use crate::error::{Error, Result};
use crate::link::messages::{InboundEnvelope, MessageKind, OutboundCommand, PropertyValue};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

/// Highest speed / property level accepted on the wire
const MAX_LEVEL: u8 = 100;

/// On-spot rotation limit in degrees
const MAX_ANGLE: i32 = 360;

/// Encoder/decoder bound to one protocol identifier
#[derive(Debug, Clone)]
pub struct WireCodec {
    protocol_id: String,
}

/// Outbound envelope as parsed back from the wire
///
/// Used by robot-side tooling and tests; the gateway itself never receives
/// commands.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEnvelope {
    pub protocol: String,
    pub message_type: MessageType,
    pub request_id: String,
    pub mode: MessageMode,
    pub timestamp: DateTime<Utc>,
    pub command: CommandType,
    pub payload: Map<String, Value>,
}

impl WireCodec {
    pub fn new(protocol_id: impl Into<String>) -> Self {
        Self {
            protocol_id: protocol_id.into(),
        }
    }

    pub fn protocol_id(&self) -> &str {
        &self.protocol_id
    }

    /// Encode a command into a datagram
    ///
    /// `request_id` defaults to one random byte.
    pub fn encode(
        &self,
        command: &OutboundCommand,
        mode: MessageMode,
        request_id: Option<u8>,
    ) -> Result<Vec<u8>> {
        let request_id = request_id.unwrap_or_else(rand::random::<u8>);
        self.encode_at(command, mode, request_id, Utc::now())
    }

    /// Encode with an explicit request id and timestamp
    pub fn encode_at(
        &self,
        command: &OutboundCommand,
        mode: MessageMode,
        request_id: u8,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<u8>> {
        // Build the payload first so a bad command produces no bytes at all
        let payload = command_payload(command)?;

        let envelope = json!({
            "protocol": self.protocol_id,
            "message_type": MessageType::Command.code(),
            "request_id": hex_byte(request_id),
            "mode": mode.code(),
            "timestamp": format_timestamp(timestamp),
            "payload": payload,
        });

        serde_json::to_vec(&envelope).map_err(|e| Error::Encoding(e.to_string()))
    }

    /// Decode an inbound datagram
    ///
    /// Checks only the envelope shape: protocol and robot id must be present.
    /// Whether the protocol matches and the id is in range is the dispatcher's
    /// decision.
    pub fn decode(&self, raw: &[u8]) -> Result<InboundEnvelope> {
        let mut object = parse_object(raw)?;

        let protocol = match object.remove("protocol") {
            Some(Value::String(s)) => s,
            Some(_) => return Err(Error::Decode("protocol is not a string".into())),
            None => return Err(Error::Decode("missing protocol".into())),
        };

        let robot_id = match object.get("robot_id") {
            Some(v) => v
                .as_i64()
                .ok_or_else(|| Error::Decode(format!("robot_id is not an integer: {}", v)))?,
            None => return Err(Error::Decode("missing robot_id".into())),
        };

        let message_type = match object.get("message_type") {
            Some(Value::String(name)) => MessageKind::from_wire_name(name),
            Some(other) => MessageKind::Unknown(other.to_string()),
            None => MessageKind::Unknown(String::new()),
        };

        // Forwarded untouched: firmware sends integers here, the gateway strings
        let request_id = object.remove("request_id").unwrap_or(Value::Null);
        let timestamp = object.remove("timestamp").unwrap_or(Value::Null);

        let payload = match object.remove("payload") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        Ok(InboundEnvelope {
            protocol,
            robot_id,
            message_type,
            request_id,
            mode: object.remove("mode").unwrap_or(Value::Null),
            timestamp,
            payload,
        })
    }

    /// Parse an outbound command envelope back from its bytes
    pub fn decode_command(&self, raw: &[u8]) -> Result<CommandEnvelope> {
        let mut object = parse_object(raw)?;

        let protocol = match object.remove("protocol") {
            Some(Value::String(s)) => s,
            _ => return Err(Error::Decode("missing protocol".into())),
        };

        let message_type = code_field(&object, "message_type")
            .and_then(|c| u8::try_from(c).ok())
            .and_then(MessageType::from_code)
            .ok_or_else(|| Error::Decode("invalid message_type".into()))?;

        let mode = code_field(&object, "mode")
            .and_then(|c| u8::try_from(c).ok())
            .and_then(MessageMode::from_code)
            .ok_or_else(|| Error::Decode("invalid mode".into()))?;

        let request_id = match object.remove("request_id") {
            Some(Value::String(s)) => s,
            _ => return Err(Error::Decode("missing request_id".into())),
        };

        let timestamp = object
            .get("timestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Decode("missing timestamp".into()))
            .and_then(parse_timestamp)?;

        let payload = match object.remove("payload") {
            Some(Value::Object(map)) => map,
            _ => return Err(Error::Decode("missing payload".into())),
        };

        let command = payload
            .get("command")
            .and_then(Value::as_u64)
            .and_then(|c| u8::try_from(c).ok())
            .and_then(CommandType::from_code)
            .ok_or_else(|| Error::Decode("invalid payload.command".into()))?;

        Ok(CommandEnvelope {
            protocol,
            message_type,
            request_id,
            mode,
            timestamp,
            command,
            payload,
        })
    }
}

/// Build the `payload` object for a command
fn command_payload(command: &OutboundCommand) -> Result<Value> {
    let code = command.command_type().code();

    let payload = match command {
        OutboundCommand::Reset => json!({ "command": code, "reset": "reset" }),

        OutboundCommand::EmergencyStop => json!({ "command": code, "stop": "stop" }),

        OutboundCommand::SetProperty { property, value } => {
            let new_value = match value {
                PropertyValue::Level(level) => {
                    check_level("property value", *level)?;
                    json!(level)
                }
                PropertyValue::Switch(switch) => json!(switch.as_str()),
            };
            json!({ "command": code, "prop": property.code(), "new_value": new_value })
        }

        OutboundCommand::GetProperty { property } => {
            json!({ "command": code, "prop": property.code() })
        }

        OutboundCommand::MotorControl {
            motors,
            direction,
            speed,
            angle,
            duration_ms,
        } => {
            check_level("speed", *speed)?;
            if !(-MAX_ANGLE..=MAX_ANGLE).contains(angle) {
                return Err(Error::Encoding(format!(
                    "angle {} outside [-{}, {}]",
                    angle, MAX_ANGLE, MAX_ANGLE
                )));
            }

            let mut motor_ids: Vec<i8> = match motors {
                None => Motor::DRIVE.iter().map(|m| m.code()).collect(),
                Some(list) => {
                    if list.contains(&Motor::EndMot) {
                        return Err(Error::Encoding(
                            "END_MOT is appended automatically, not part of the list".into(),
                        ));
                    }
                    list.iter().map(|m| m.code()).collect()
                }
            };
            motor_ids.push(Motor::EndMot.code());

            json!({
                "command": code,
                "motor_id": motor_ids,
                "direction": direction.code(),
                "speed": speed,
                "angle": angle,
                "duration_ms": duration_ms,
            })
        }

        OutboundCommand::Move {
            target,
            navigation_type,
            route_policy,
        } => json!({
            "command": code,
            "destination_x": target.x,
            "destination_y": target.y,
            "destination_checkpoint": target.checkpoint.code(),
            "navigation_type": navigation_type.code(),
            "route_policy": route_policy.code(),
        }),
    };

    Ok(payload)
}

fn check_level(field: &str, level: u8) -> Result<()> {
    if level > MAX_LEVEL {
        return Err(Error::Encoding(format!(
            "{} {} above {}",
            field, level, MAX_LEVEL
        )));
    }
    Ok(())
}

fn parse_object(raw: &[u8]) -> Result<Map<String, Value>> {
    let text = std::str::from_utf8(raw).map_err(|e| Error::Decode(format!("not UTF-8: {}", e)))?;
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::Decode(format!(
            "expected JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(Error::Decode(format!("invalid JSON: {}", e))),
    }
}

fn code_field(object: &Map<String, Value>, key: &str) -> Option<u64> {
    object.get(key).and_then(Value::as_u64)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Lower-case hex of one byte
pub fn hex_byte(byte: u8) -> String {
    format!("{:02x}", byte)
}

/// UTC timestamp with microsecond precision and `Z` suffix
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a wire timestamp back into UTC
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Decode(format!("invalid timestamp {}: {}", text, e)))
}
