//! Robot identity and destination selection.
//!
//! - [`LogicalRobotId`]: stable robot identity, independent of its network address
//! - [`DestinationSelector`]: resolved target of an outbound command

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable integer identity of a robot (1..=4 in the reference deployment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct LogicalRobotId(u8);

impl LogicalRobotId {
    /// Lowest accepted robot id
    pub const MIN: i64 = 1;
    /// Highest accepted robot id
    pub const MAX: i64 = 4;

    /// Create an id, returning `None` outside `[MIN, MAX]`
    pub fn new(value: i64) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    /// All ids of the deployment, ascending
    pub fn all() -> impl Iterator<Item = LogicalRobotId> {
        (Self::MIN..=Self::MAX).map(|v| Self(v as u8))
    }

    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for LogicalRobotId {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| {
            format!(
                "robot id {} outside [{}, {}]",
                value,
                Self::MIN,
                Self::MAX
            )
        })
    }
}

impl From<LogicalRobotId> for i64 {
    fn from(id: LogicalRobotId) -> Self {
        id.0 as i64
    }
}

impl fmt::Display for LogicalRobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Target of an outbound command
///
/// `Error` and `None` are sentinels distinct from any robot: `Error` means the
/// selector could not be parsed, `None` means no destination has been chosen.
/// Parsing never fails; bad input yields `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DestinationSelector {
    Error,
    #[default]
    None,
    All,
    Robot(LogicalRobotId),
}

impl DestinationSelector {
    /// Integer code used by the operator console (-2..=4)
    pub fn code(self) -> i64 {
        match self {
            DestinationSelector::Error => -2,
            DestinationSelector::None => -1,
            DestinationSelector::All => 0,
            DestinationSelector::Robot(id) => id.get() as i64,
        }
    }

    /// Parse an integer code
    pub fn from_int(value: i64) -> Self {
        match value {
            -2 => DestinationSelector::Error,
            -1 => DestinationSelector::None,
            0 => DestinationSelector::All,
            v => LogicalRobotId::new(v)
                .map(DestinationSelector::Robot)
                .unwrap_or(DestinationSelector::Error),
        }
    }

    /// Parse a JSON value: an integer, or a string holding an integer
    pub fn from_value(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::from_int)
                .unwrap_or(DestinationSelector::Error),
            serde_json::Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Self::from_int)
                .unwrap_or(DestinationSelector::Error),
            _ => DestinationSelector::Error,
        }
    }

    /// Parse a selector name ("ALL", "NONE", "ERR", "ROBOT1".."ROBOT4"), case-insensitive
    pub fn from_name(name: &str) -> Self {
        let upper = name.trim().to_ascii_uppercase();
        match upper.as_str() {
            "ERR" | "ERROR" => DestinationSelector::Error,
            "NONE" => DestinationSelector::None,
            "ALL" => DestinationSelector::All,
            other => other
                .strip_prefix("ROBOT")
                .and_then(|n| n.parse::<i64>().ok())
                .and_then(LogicalRobotId::new)
                .map(DestinationSelector::Robot)
                .unwrap_or(DestinationSelector::Error),
        }
    }
}

impl fmt::Display for DestinationSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationSelector::Error => write!(f, "ERR"),
            DestinationSelector::None => write!(f, "NONE"),
            DestinationSelector::All => write!(f, "ALL"),
            DestinationSelector::Robot(id) => write!(f, "ROBOT{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_int_in_range() {
        assert_eq!(DestinationSelector::from_int(-2), DestinationSelector::Error);
        assert_eq!(DestinationSelector::from_int(-1), DestinationSelector::None);
        assert_eq!(DestinationSelector::from_int(0), DestinationSelector::All);
        for i in 1..=4 {
            let selector = DestinationSelector::from_int(i);
            assert_eq!(selector.code(), i);
            assert!(matches!(selector, DestinationSelector::Robot(_)));
        }
    }

    #[test]
    fn test_from_int_out_of_range() {
        for i in [-100, -3, 5, 6, 255, i64::MAX, i64::MIN] {
            assert_eq!(DestinationSelector::from_int(i), DestinationSelector::Error);
        }
    }

    #[test]
    fn test_from_value() {
        assert_eq!(
            DestinationSelector::from_value(&json!(2)).code(),
            2,
            "integer argument"
        );
        assert_eq!(DestinationSelector::from_value(&json!("3")).code(), 3);
        assert_eq!(
            DestinationSelector::from_value(&json!("two")),
            DestinationSelector::Error
        );
        assert_eq!(
            DestinationSelector::from_value(&json!(1.5)),
            DestinationSelector::Error
        );
        assert_eq!(
            DestinationSelector::from_value(&json!(null)),
            DestinationSelector::Error
        );
    }

    #[test]
    fn test_from_name() {
        assert_eq!(DestinationSelector::from_name("all"), DestinationSelector::All);
        assert_eq!(DestinationSelector::from_name("NONE"), DestinationSelector::None);
        assert_eq!(DestinationSelector::from_name("Robot4").code(), 4);
        assert_eq!(DestinationSelector::from_name("robot9"), DestinationSelector::Error);
        assert_eq!(DestinationSelector::from_name(""), DestinationSelector::Error);
    }

    #[test]
    fn test_robot_id_serde() {
        let id = LogicalRobotId::new(3).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "3");
        assert!(serde_json::from_str::<LogicalRobotId>("7").is_err());
        assert_eq!(DestinationSelector::Robot(id).to_string(), "ROBOT3");
    }
}
