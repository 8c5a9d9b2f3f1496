//! Configuration for the robot-link gateway
//!
//! Loads configuration from a TOML file. Every field has a default, so an
//! empty file (or no file at all) yields a working local setup.

use crate::core::types::LogicalRobotId;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Top-level gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default = "default_robots")]
    pub robots: Vec<RobotProfile>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Robot-facing UDP settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// UDP bind address for robot traffic
    ///
    /// Examples:
    /// - `0.0.0.0:8000` - All interfaces on port 8000
    /// - `127.0.0.1:8000` - Localhost only
    #[serde(default = "default_udp_bind")]
    pub bind_address: String,

    /// Protocol identifier every envelope must carry
    #[serde(default = "default_protocol_id")]
    pub protocol_id: String,

    /// Receive buffer size; longer datagrams are truncated by the socket
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,

    /// Receive timeout, bounds how long shutdown waits for the receive loop
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Port robots listen on (defaults to the bind port)
    #[serde(default)]
    pub robot_port: Option<u16>,
}

/// Operator console bridge settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// TCP bind address for operator consoles
    #[serde(default = "default_bridge_bind")]
    pub bind_address: String,

    /// GUI event queue depth between the receive thread and the publisher
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// One robot of the fleet
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RobotProfile {
    /// Logical robot id (1..=4)
    pub id: i64,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Known address before discovery (optional; learned from traffic otherwise)
    #[serde(default)]
    pub address: Option<IpAddr>,

    /// Motor speed (0-100) used for drive commands to this robot
    #[serde(default = "default_motor_speed")]
    pub motor_speed: u8,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_udp_bind() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_protocol_id() -> String {
    "robot-net/1.0".to_string()
}
fn default_frame_size() -> usize {
    2048
}
fn default_read_timeout_ms() -> u64 {
    1000
}
fn default_bridge_bind() -> String {
    "0.0.0.0:5555".to_string()
}
fn default_queue_capacity() -> usize {
    1024
}
fn default_motor_speed() -> u8 {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_robots() -> Vec<RobotProfile> {
    ["Beta", "Charlie", "Delta", "Mario"]
        .iter()
        .zip(LogicalRobotId::MIN..)
        .map(|(name, id)| RobotProfile {
            id,
            name: name.to_string(),
            address: None,
            motor_speed: default_motor_speed(),
        })
        .collect()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_udp_bind(),
            protocol_id: default_protocol_id(),
            frame_size: default_frame_size(),
            read_timeout_ms: default_read_timeout_ms(),
            robot_port: None,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bridge_bind(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            bridge: BridgeConfig::default(),
            robots: default_robots(),
            logging: LoggingConfig::default(),
        }
    }
}

impl NetworkConfig {
    /// Parsed UDP bind address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind_address.parse().map_err(|e| {
            Error::Config(format!("Invalid bind address {}: {}", self.bind_address, e))
        })
    }

    /// Port outbound datagrams are sent to
    pub fn robot_port(&self) -> Result<u16> {
        match self.robot_port {
            Some(port) => Ok(port),
            None => Ok(self.bind_addr()?.port()),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text and validate it
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: GatewayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges and uniqueness that serde cannot express
    pub fn validate(&self) -> Result<()> {
        self.network.bind_addr()?;
        if self.network.frame_size == 0 {
            return Err(Error::Config("frame_size must be positive".into()));
        }
        if self.network.read_timeout_ms == 0 {
            return Err(Error::Config("read_timeout_ms must be positive".into()));
        }
        if self.bridge.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be positive".into()));
        }

        let mut seen = HashSet::new();
        for robot in &self.robots {
            if LogicalRobotId::new(robot.id).is_none() {
                return Err(Error::Config(format!(
                    "Robot id {} outside [{}, {}]",
                    robot.id,
                    LogicalRobotId::MIN,
                    LogicalRobotId::MAX
                )));
            }
            if !seen.insert(robot.id) {
                return Err(Error::Config(format!("Duplicate robot id {}", robot.id)));
            }
            if robot.motor_speed > 100 {
                return Err(Error::Config(format!(
                    "Robot {} motor_speed {} above 100",
                    robot.id, robot.motor_speed
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.network.bind_address, "0.0.0.0:8000");
        assert_eq!(config.network.protocol_id, "robot-net/1.0");
        assert_eq!(config.network.frame_size, 2048);
        assert_eq!(config.network.robot_port().unwrap(), 8000);
        assert_eq!(config.robots.len(), 4);
        assert_eq!(config.robots[3].name, "Mario");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = GatewayConfig::from_toml("").unwrap();
        assert_eq!(config.bridge.bind_address, "0.0.0.0:5555");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.network.read_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[network]
bind_address = "127.0.0.1:9000"
protocol_id = "robot-net/1.1"
robot_port = 8000

[[robots]]
id = 2
name = "Charlie"
address = "192.168.1.101"
motor_speed = 60

[logging]
level = "debug"
"#;

        let config = GatewayConfig::from_toml(toml_content).unwrap();
        assert_eq!(config.network.protocol_id, "robot-net/1.1");
        assert_eq!(config.network.robot_port().unwrap(), 8000);
        assert_eq!(config.robots.len(), 1);
        let charlie = &config.robots[0];
        assert_eq!(charlie.id, 2);
        assert_eq!(charlie.motor_speed, 60);
        assert_eq!(charlie.address, Some("192.168.1.101".parse().unwrap()));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_bad_robots() {
        let out_of_range = "[[robots]]\nid = 5\n";
        assert!(GatewayConfig::from_toml(out_of_range).is_err());

        let duplicate = "[[robots]]\nid = 1\n[[robots]]\nid = 1\n";
        assert!(GatewayConfig::from_toml(duplicate).is_err());

        let too_fast = "[[robots]]\nid = 1\nmotor_speed = 150\n";
        assert!(GatewayConfig::from_toml(too_fast).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_network() {
        assert!(GatewayConfig::from_toml("[network]\nbind_address = \"nowhere\"\n").is_err());
        assert!(GatewayConfig::from_toml("[network]\nframe_size = 0\n").is_err());
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = GatewayConfig::from_toml(include_str!("../robot-link.toml")).unwrap();
        assert_eq!(config.robots.len(), 4);
        assert!(config.robots.iter().all(|r| r.address.is_none()));
    }
}
