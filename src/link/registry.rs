//! Robot address registry
//!
//! Maps each logical robot id to the address it was last heard from. Robots
//! are not bound to an IP: when a robot's network interface restarts it comes
//! back with a new address and the same id ("re-homing").
//!
//! # Access discipline
//!
//! Only the receive thread writes; senders read. A fan-out send reads
//! [`RobotRegistry::known_ids`] and then resolves each id separately, so an
//! address may change between the two reads. That is harmless: the send goes
//! to whichever address is current, or is skipped if there is none.
//!
//! Entries are never removed. Liveness is left to callers comparing
//! `last_seen` against their own threshold.

use crate::core::types::LogicalRobotId;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Registry entry for one robot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryEntry {
    /// Last source address; `None` for roster robots never heard from
    pub address: Option<IpAddr>,
    /// Time of the last address change
    pub last_seen: Option<DateTime<Utc>>,
}

/// What an [`RobotRegistry::update`] call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryUpdate {
    /// First address ever seen for this id
    Discovered,
    /// Same robot, new address
    Rehomed { previous: IpAddr },
    /// Address already known; nothing changed
    Unchanged,
}

/// Logical id → address table
#[derive(Debug, Default)]
pub struct RobotRegistry {
    entries: RwLock<BTreeMap<LogicalRobotId, RegistryEntry>>,
}

impl RobotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a roster robot with no address yet (no-op if already present)
    pub fn register(&self, id: LogicalRobotId) {
        self.entries.write().entry(id).or_default();
    }

    /// Add a robot with an address known in advance
    pub fn seed(&self, id: LogicalRobotId, address: IpAddr) {
        self.entries.write().insert(
            id,
            RegistryEntry {
                address: Some(address),
                last_seen: None,
            },
        );
    }

    /// Address currently bound to `id`
    pub fn resolve(&self, id: LogicalRobotId) -> Result<IpAddr> {
        self.entries
            .read()
            .get(&id)
            .and_then(|entry| entry.address)
            .ok_or(Error::AddressUnknown(id))
    }

    /// Snapshot of one entry
    pub fn entry(&self, id: LogicalRobotId) -> Option<RegistryEntry> {
        self.entries.read().get(&id).copied()
    }

    /// Every id in the registry, ascending (including roster ids without address)
    pub fn known_ids(&self) -> Vec<LogicalRobotId> {
        self.entries.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Record that `id` was heard from `address` at `seen_at`
    ///
    /// `last_seen` moves only when the address changes: repeated datagrams from
    /// the same address are not churn.
    pub fn update(
        &self,
        id: LogicalRobotId,
        address: IpAddr,
        seen_at: DateTime<Utc>,
    ) -> RegistryUpdate {
        // Fast path: heartbeats from a known address only need the read lock
        let unchanged = self
            .entries
            .read()
            .get(&id)
            .is_some_and(|entry| entry.address == Some(address));
        if unchanged {
            return RegistryUpdate::Unchanged;
        }

        let mut entries = self.entries.write();
        let entry = entries.entry(id).or_default();
        match entry.address {
            None => {
                entry.address = Some(address);
                log::info!("New robot discovered: ID{} at {}", id, address);
                RegistryUpdate::Discovered
            }
            Some(previous) if previous != address => {
                entry.address = Some(address);
                entry.last_seen = Some(seen_at);
                log::info!("Robot ID{} re-homed: {} -> {}", id, previous, address);
                RegistryUpdate::Rehomed { previous }
            }
            Some(_) => RegistryUpdate::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn id(n: i64) -> LogicalRobotId {
        LogicalRobotId::new(n).unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = RobotRegistry::new();
        assert!(matches!(registry.resolve(id(1)), Err(Error::AddressUnknown(_))));

        registry.register(id(1));
        assert!(matches!(registry.resolve(id(1)), Err(Error::AddressUnknown(_))));
        assert_eq!(registry.known_ids(), vec![id(1)]);
    }

    #[test]
    fn test_discovery_then_rehoming() {
        let registry = RobotRegistry::new();
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(5);

        assert_eq!(
            registry.update(id(3), ip("10.0.0.3"), t1),
            RegistryUpdate::Discovered
        );
        let first = registry.entry(id(3)).unwrap();
        assert_eq!(first.address, Some(ip("10.0.0.3")));
        assert_eq!(first.last_seen, None);

        assert_eq!(
            registry.update(id(3), ip("10.0.0.33"), t2),
            RegistryUpdate::Rehomed {
                previous: ip("10.0.0.3")
            }
        );
        let second = registry.entry(id(3)).unwrap();
        assert_eq!(second.address, Some(ip("10.0.0.33")));
        assert_eq!(second.last_seen, Some(t2));
        assert_eq!(registry.resolve(id(3)).unwrap(), ip("10.0.0.33"));
    }

    #[test]
    fn test_repeated_updates_are_idempotent() {
        let registry = RobotRegistry::new();
        let t0 = Utc::now();
        registry.update(id(2), ip("10.0.0.2"), t0);
        registry.update(id(2), ip("10.0.0.20"), t0 + Duration::seconds(1));
        let after_change = registry.entry(id(2)).unwrap();

        for n in 2..10 {
            assert_eq!(
                registry.update(id(2), ip("10.0.0.20"), t0 + Duration::seconds(n)),
                RegistryUpdate::Unchanged
            );
        }
        assert_eq!(registry.entry(id(2)).unwrap(), after_change);
    }

    #[test]
    fn test_seeded_entry_counts_as_known() {
        let registry = RobotRegistry::new();
        registry.seed(id(4), ip("192.168.1.103"));
        assert_eq!(registry.resolve(id(4)).unwrap(), ip("192.168.1.103"));
        assert_eq!(
            registry.update(id(4), ip("192.168.1.103"), Utc::now()),
            RegistryUpdate::Unchanged
        );
    }

    #[test]
    fn test_roster_entry_is_discovered_on_first_datagram() {
        let registry = RobotRegistry::new();
        registry.register(id(1));
        assert_eq!(
            registry.update(id(1), ip("10.0.0.1"), Utc::now()),
            RegistryUpdate::Discovered
        );
        assert_eq!(registry.len(), 1);
    }
}
