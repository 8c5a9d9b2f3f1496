//! Integer codes of the robot-net wire protocol.
//!
//! Every enum carries an explicit discriminant. The wire always carries the
//! code, never the variant name, so renaming a variant never changes the
//! protocol.

/// Implements `code()` and `from_code()` for a field-less enum with explicit discriminants
macro_rules! wire_code {
    ($name:ident : $repr:ty { $($variant:ident),+ $(,)? }) => {
        impl $name {
            /// Wire code of this variant
            #[inline]
            pub fn code(self) -> $repr {
                self as $repr
            }

            /// Look up a variant by wire code
            pub fn from_code(code: $repr) -> Option<Self> {
                $(
                    if code == $name::$variant as $repr {
                        return Some($name::$variant);
                    }
                )+
                None
            }
        }
    };
}

/// Envelope mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageMode {
    #[default]
    Manual = 0,
    Auto = 1,
}

wire_code!(MessageMode: u8 { Manual, Auto });

impl MessageMode {
    /// Parse the operator console mode word ("manual" / "auto")
    pub fn from_operator(word: &str) -> Option<Self> {
        match word {
            "manual" => Some(MessageMode::Manual),
            "auto" => Some(MessageMode::Auto),
            _ => None,
        }
    }
}

/// Envelope message type (outbound messages use the integer code)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Command = 0,
    Feedback = 1,
    Event = 2,
    Error = 3,
    Heartbeat = 4,
    Reset = 5,
}

wire_code!(MessageType: u8 { Command, Feedback, Event, Error, Heartbeat, Reset });

impl MessageType {
    /// Name used for this type by inbound robot messages
    pub fn wire_name(self) -> &'static str {
        match self {
            MessageType::Command => "command",
            MessageType::Feedback => "feedback",
            MessageType::Event => "event",
            MessageType::Error => "error",
            MessageType::Heartbeat => "heartbeat",
            MessageType::Reset => "reset",
        }
    }

    /// Parse an inbound message type name
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "command" => Some(MessageType::Command),
            "feedback" => Some(MessageType::Feedback),
            "event" => Some(MessageType::Event),
            "error" => Some(MessageType::Error),
            "heartbeat" => Some(MessageType::Heartbeat),
            "reset" => Some(MessageType::Reset),
            _ => None,
        }
    }
}

/// Command kind carried in `payload.command`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    GetProperty = 0,
    SetProperty = 1,
    MotorControl = 2,
    Move = 3,
    EmergencyStop = 4,
    Reset = 5,
}

wire_code!(CommandType: u8 { GetProperty, SetProperty, MotorControl, Move, EmergencyStop, Reset });

/// Robot configuration property
///
/// Codes 7 and 8 (lights, horn) are only understood by newer firmware; 9 is unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigProperty {
    Speed = 0,
    Feedback = 1,
    Debug = 2,
    NavigationType = 3,
    RoutePolicy = 4,
    Radar = 5,
    Screen = 6,
    Lights = 7,
    Horn = 8,
    ObstacleCleaner = 10,
    ObjectLoader = 11,
    ObjectUnloader = 12,
    ObjectCompacter = 13,
}

wire_code!(ConfigProperty: u8 {
    Speed, Feedback, Debug, NavigationType, RoutePolicy, Radar, Screen, Lights, Horn,
    ObstacleCleaner, ObjectLoader, ObjectUnloader, ObjectCompacter,
});

impl ConfigProperty {
    /// Parse a property name ("speed", "navigation_type", ...), case-insensitive
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "speed" => Some(ConfigProperty::Speed),
            "feedback" => Some(ConfigProperty::Feedback),
            "debug" => Some(ConfigProperty::Debug),
            "navigation_type" => Some(ConfigProperty::NavigationType),
            "route_policy" => Some(ConfigProperty::RoutePolicy),
            "radar" => Some(ConfigProperty::Radar),
            "screen" => Some(ConfigProperty::Screen),
            "lights" => Some(ConfigProperty::Lights),
            "horn" => Some(ConfigProperty::Horn),
            "obstacle_cleaner" => Some(ConfigProperty::ObstacleCleaner),
            "object_loader" => Some(ConfigProperty::ObjectLoader),
            "object_unloader" => Some(ConfigProperty::ObjectUnloader),
            "object_compacter" => Some(ConfigProperty::ObjectCompacter),
            _ => None,
        }
    }

    /// Whether the property takes a 0-100 level only (no symbolic values)
    pub fn is_numeric(self) -> bool {
        !matches!(self, ConfigProperty::Lights | ConfigProperty::Horn)
    }
}

/// Drive direction
///
/// `Stop` halts the selected motors; it is not the emergency stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Forward = 0,
    Backward = 1,
    Left = 2,
    Right = 3,
    #[default]
    Stop = 4,
}

wire_code!(Direction: u8 { Forward, Backward, Left, Right, Stop });

impl Direction {
    /// Parse the operator console drive word
    pub fn from_operator(word: &str) -> Option<Self> {
        match word {
            "forward" => Some(Direction::Forward),
            "reverse" | "backward" => Some(Direction::Backward),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            "stop" => Some(Direction::Stop),
            _ => None,
        }
    }
}

/// Motor identifiers. `EndMot` terminates a motor list on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motor {
    EndMot = -1,
    Res = 0,
    Mot1 = 1,
    Mot2 = 2,
    Mot3 = 3,
    Mot4 = 4,
    Mot5 = 5,
    Mot6 = 6,
}

wire_code!(Motor: i8 { EndMot, Res, Mot1, Mot2, Mot3, Mot4, Mot5, Mot6 });

impl Motor {
    /// Left and right drive motors
    pub const DRIVE: [Motor; 2] = [Motor::Mot1, Motor::Mot2];
}

/// Named checkpoint for checkpoint navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DestinationCheckpoint {
    #[default]
    Home = 0,
    Load = 1,
    Base = 2,
}

wire_code!(DestinationCheckpoint: u8 { Home, Load, Base });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationType {
    #[default]
    Manual = 0,
    Checkpoint = 1,
    Grid = 2,
    FreeMove = 3,
}

wire_code!(NavigationType: u8 { Manual, Checkpoint, Grid, FreeMove });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutePolicy {
    #[default]
    Shortest = 0,
    Safest = 1,
    Fast = 2,
}

wire_code!(RoutePolicy: u8 { Shortest, Safest, Fast });
