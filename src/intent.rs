//! Operator intent translation
//!
//! The console sends `{endpoint, mode, cmd, argc}` triples. Accepted grammar:
//!
//! | Endpoint | mode | cmd | argc | Result |
//! |----------|------|-----|------|--------|
//! | control_settings | settings | destination_robot | integer -2..=4 | select destination |
//! | command | manual, auto | stop | - | emergency stop |
//! | command | manual, auto | reset | - | reset |
//! | command | manual, auto | drive | forward, reverse, left, right, stop | motor control |
//! | set_property | - | speed, lights, horn | integer 0..=100 | set property |
//! | set_property | - | lights, horn | ON, OFF, PLAY, STOP | set property |
//! | get_property | - | speed, lights, horn | - | get property |
//!
//! Anything else is rejected with [`Error::Validation`] and changes nothing.

use crate::core::codes::{ConfigProperty, Direction, MessageMode};
use crate::core::types::DestinationSelector;
use crate::error::{Error, Result};
use crate::link::messages::{OutboundCommand, PropertyValue, SwitchValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Properties the console may read or write
const CONSOLE_PROPERTIES: [ConfigProperty; 3] = [
    ConfigProperty::Speed,
    ConfigProperty::Lights,
    ConfigProperty::Horn,
];

/// Speed put in drive commands; the gateway replaces it with the robot's
/// configured motor speed for single-robot sends
pub const DEFAULT_DRIVE_SPEED: u8 = 100;

/// Console endpoint an intent arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    ControlSettings,
    Command,
    SetProperty,
    GetProperty,
}

/// One operator intent as sent by the console
///
/// Fields are kept as raw JSON so that a wrongly typed field is a validation
/// error rather than a parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorIntent {
    pub endpoint: IntentKind,
    #[serde(default)]
    pub mode: Value,
    #[serde(default)]
    pub cmd: Value,
    #[serde(default)]
    pub argc: Value,
}

impl OperatorIntent {
    pub fn new(endpoint: IntentKind, mode: &str, cmd: &str, argc: Value) -> Self {
        Self {
            endpoint,
            mode: Value::String(mode.to_string()),
            cmd: Value::String(cmd.to_string()),
            argc,
        }
    }

    fn mode_str(&self) -> Option<&str> {
        self.mode.as_str()
    }

    fn cmd_str(&self) -> Option<&str> {
        self.cmd.as_str()
    }
}

/// Accepted intent
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// The selected destination changed
    Selected(DestinationSelector),
    /// A command to hand to the sender
    Send {
        destination: DestinationSelector,
        command: OutboundCommand,
        mode: MessageMode,
    },
}

/// Validates intents and tracks the selected destination
#[derive(Debug, Default)]
pub struct IntentTranslator {
    selected: DestinationSelector,
}

impl IntentTranslator {
    /// New translator with no destination selected
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> DestinationSelector {
        self.selected
    }

    /// Validate `intent` and translate it
    ///
    /// Only a valid destination-select intent changes translator state.
    pub fn translate(&mut self, intent: &OperatorIntent) -> Result<Translation> {
        let result = match intent.endpoint {
            IntentKind::ControlSettings => self.control_settings(intent),
            IntentKind::Command => self.command(intent),
            IntentKind::SetProperty => self.set_property(intent),
            IntentKind::GetProperty => self.get_property(intent),
        };
        if let Err(e) = &result {
            log::debug!("Rejected {:?} intent: {}", intent.endpoint, e);
        }
        result
    }

    fn control_settings(&mut self, intent: &OperatorIntent) -> Result<Translation> {
        if intent.mode_str() != Some("settings") {
            return Err(invalid("control settings mode", &intent.mode));
        }
        if intent.cmd_str() != Some("destination_robot") {
            return Err(invalid("control settings cmd", &intent.cmd));
        }
        let code = intent
            .argc
            .as_i64()
            .filter(|code| (-2..=4).contains(code))
            .ok_or_else(|| invalid("destination", &intent.argc))?;

        self.selected = DestinationSelector::from_int(code);
        log::info!("Destination robot set to {}", self.selected);
        Ok(Translation::Selected(self.selected))
    }

    fn command(&self, intent: &OperatorIntent) -> Result<Translation> {
        let mode = intent
            .mode_str()
            .and_then(MessageMode::from_operator)
            .ok_or_else(|| invalid("command mode", &intent.mode))?;

        let command = match intent.cmd_str() {
            Some("stop") => OutboundCommand::EmergencyStop,
            Some("reset") => OutboundCommand::Reset,
            Some("drive") => {
                let direction = intent
                    .argc
                    .as_str()
                    .and_then(Direction::from_operator)
                    .ok_or_else(|| invalid("drive direction", &intent.argc))?;
                OutboundCommand::drive(direction, DEFAULT_DRIVE_SPEED)
            }
            _ => return Err(invalid("command", &intent.cmd)),
        };

        Ok(self.send(command, mode))
    }

    fn set_property(&self, intent: &OperatorIntent) -> Result<Translation> {
        let property = console_property(intent)?;
        let value = match &intent.argc {
            Value::Number(n) => n
                .as_i64()
                .filter(|v| (0..=100).contains(v))
                .map(|v| PropertyValue::Level(v as u8)),
            Value::String(s) if !property.is_numeric() => {
                SwitchValue::from_name(s).map(PropertyValue::Switch)
            }
            _ => None,
        }
        .ok_or_else(|| invalid("property value", &intent.argc))?;

        Ok(self.send(OutboundCommand::SetProperty { property, value }, property_mode(intent)))
    }

    fn get_property(&self, intent: &OperatorIntent) -> Result<Translation> {
        let property = console_property(intent)?;
        Ok(self.send(OutboundCommand::GetProperty { property }, property_mode(intent)))
    }

    fn send(&self, command: OutboundCommand, mode: MessageMode) -> Translation {
        Translation::Send {
            destination: self.selected,
            command,
            mode,
        }
    }
}

fn console_property(intent: &OperatorIntent) -> Result<ConfigProperty> {
    intent
        .cmd_str()
        .and_then(ConfigProperty::from_name)
        .filter(|p| CONSOLE_PROPERTIES.contains(p))
        .ok_or_else(|| invalid("property", &intent.cmd))
}

/// Property intents carry no meaningful mode; "auto" is honoured, anything else is manual
fn property_mode(intent: &OperatorIntent) -> MessageMode {
    intent
        .mode_str()
        .and_then(MessageMode::from_operator)
        .unwrap_or_default()
}

fn invalid(what: &str, got: &Value) -> Error {
    Error::Validation(format!("invalid {}: {}", what, got))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LogicalRobotId;
    use serde_json::json;

    fn select(translator: &mut IntentTranslator, argc: Value) -> Result<Translation> {
        translator.translate(&OperatorIntent::new(
            IntentKind::ControlSettings,
            "settings",
            "destination_robot",
            argc,
        ))
    }

    #[test]
    fn test_initial_selection_is_none() {
        assert_eq!(IntentTranslator::new().selected(), DestinationSelector::None);
    }

    #[test]
    fn test_destination_select() {
        let mut t = IntentTranslator::new();
        for code in -2..=4 {
            let result = select(&mut t, json!(code)).unwrap();
            assert_eq!(result, Translation::Selected(DestinationSelector::from_int(code)));
            assert_eq!(t.selected().code(), code);
        }
    }

    #[test]
    fn test_invalid_destination_keeps_selection() {
        let mut t = IntentTranslator::new();
        select(&mut t, json!(2)).unwrap();

        for bad in [json!(5), json!(-3), json!("2"), json!(2.5), json!(true), Value::Null] {
            assert!(matches!(select(&mut t, bad), Err(Error::Validation(_))));
        }
        let wrong_mode = OperatorIntent::new(
            IntentKind::ControlSettings,
            "manual",
            "destination_robot",
            json!(1),
        );
        assert!(t.translate(&wrong_mode).is_err());
        assert_eq!(
            t.selected(),
            DestinationSelector::Robot(LogicalRobotId::new(2).unwrap())
        );
    }

    #[test]
    fn test_drive_directions() {
        let mut t = IntentTranslator::new();
        let cases = [
            ("forward", Direction::Forward),
            ("reverse", Direction::Backward),
            ("left", Direction::Left),
            ("right", Direction::Right),
            ("stop", Direction::Stop),
        ];
        for (word, direction) in cases {
            let intent = OperatorIntent::new(IntentKind::Command, "manual", "drive", json!(word));
            match t.translate(&intent).unwrap() {
                Translation::Send { command, mode, .. } => {
                    assert_eq!(mode, MessageMode::Manual);
                    assert_eq!(command, OutboundCommand::drive(direction, DEFAULT_DRIVE_SPEED));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_invalid_drive_is_rejected() {
        let mut t = IntentTranslator::new();
        for argc in [json!("sideways"), json!(1), Value::Null] {
            let intent = OperatorIntent::new(IntentKind::Command, "manual", "drive", argc);
            assert!(matches!(t.translate(&intent), Err(Error::Validation(_))));
        }
    }

    #[test]
    fn test_stop_and_reset_follow_mode_and_selection() {
        let mut t = IntentTranslator::new();
        select(&mut t, json!(0)).unwrap();

        let stop = OperatorIntent::new(IntentKind::Command, "auto", "stop", Value::Null);
        assert_eq!(
            t.translate(&stop).unwrap(),
            Translation::Send {
                destination: DestinationSelector::All,
                command: OutboundCommand::EmergencyStop,
                mode: MessageMode::Auto,
            }
        );

        let reset = OperatorIntent::new(IntentKind::Command, "manual", "reset", Value::Null);
        assert!(matches!(
            t.translate(&reset).unwrap(),
            Translation::Send {
                command: OutboundCommand::Reset,
                ..
            }
        ));
    }

    #[test]
    fn test_command_requires_known_mode() {
        let mut t = IntentTranslator::new();
        for mode in ["settings", "MANUAL", ""] {
            let intent = OperatorIntent::new(IntentKind::Command, mode, "stop", Value::Null);
            assert!(t.translate(&intent).is_err(), "{}", mode);
        }
        let unknown = OperatorIntent::new(IntentKind::Command, "manual", "dance", Value::Null);
        assert!(t.translate(&unknown).is_err());
    }

    #[test]
    fn test_set_property_values() {
        let mut t = IntentTranslator::new();
        let ok = [
            ("speed", json!(0), PropertyValue::Level(0)),
            ("speed", json!(100), PropertyValue::Level(100)),
            ("lights", json!(40), PropertyValue::Level(40)),
            ("lights", json!("on"), PropertyValue::Switch(SwitchValue::On)),
            ("horn", json!("PLAY"), PropertyValue::Switch(SwitchValue::Play)),
        ];
        for (cmd, argc, value) in ok {
            let intent = OperatorIntent::new(IntentKind::SetProperty, "manual", cmd, argc);
            match t.translate(&intent).unwrap() {
                Translation::Send {
                    command: OutboundCommand::SetProperty { value: got, .. },
                    ..
                } => assert_eq!(got, value),
                other => panic!("unexpected {:?}", other),
            }
        }

        let bad = [
            ("speed", json!(101)),
            ("speed", json!(-1)),
            ("speed", json!("ON")),
            ("lights", json!("DIM")),
            ("radar", json!(1)),
            ("horn", json!(12.5)),
        ];
        for (cmd, argc) in bad {
            let intent = OperatorIntent::new(IntentKind::SetProperty, "manual", cmd, argc.clone());
            assert!(t.translate(&intent).is_err(), "{} {}", cmd, argc);
        }
    }

    #[test]
    fn test_get_property() {
        let mut t = IntentTranslator::new();
        let intent = OperatorIntent::new(IntentKind::GetProperty, "", "speed", Value::Null);
        assert_eq!(
            t.translate(&intent).unwrap(),
            Translation::Send {
                destination: DestinationSelector::None,
                command: OutboundCommand::GetProperty {
                    property: ConfigProperty::Speed
                },
                mode: MessageMode::Manual,
            }
        );

        let unknown = OperatorIntent::new(IntentKind::GetProperty, "", "screen", Value::Null);
        assert!(t.translate(&unknown).is_err());
    }

    #[test]
    fn test_intent_from_console_json() {
        let intent: OperatorIntent = serde_json::from_str(
            r#"{"endpoint":"set_property","mode":"manual","cmd":"horn","argc":"STOP"}"#,
        )
        .unwrap();
        assert_eq!(intent.endpoint, IntentKind::SetProperty);

        let bare: OperatorIntent = serde_json::from_str(r#"{"endpoint":"command"}"#).unwrap();
        assert_eq!(bare.argc, Value::Null);
        assert!(IntentTranslator::new().translate(&bare).is_err());
    }
}
