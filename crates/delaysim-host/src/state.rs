//! Bridge-ID state file.
//!
//! `brctl` bridges are created as `br<id>` with a random id. The id is
//! remembered per interface in a small JSON file so that teardown, IRQ
//! output and repeated setups address the same bridge.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::HostError;

pub const DEFAULT_STATE_FILE: &str = ".delay_state.json";
const BRIDGE_ID_MIN: u32 = 10;
const BRIDGE_ID_MAX: u32 = 100_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStore {
    path: PathBuf,
    entries: BTreeMap<String, u32>,
}

/// Picks a fresh bridge id for interfaces that have none yet.
pub fn generate_bridge_id<R: Rng>(rng: &mut R) -> u32 {
    rng.random_range(BRIDGE_ID_MIN..=BRIDGE_ID_MAX)
}

impl StateStore {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Reads the state file; a missing file is an empty state.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, HostError> {
        let path = path.into();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::empty(path));
            }
            Err(source) => return Err(HostError::Io { path, source }),
        };
        let entries = serde_json::from_str(&text).map_err(|source| HostError::CorruptState {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, interface: &str) -> Option<u32> {
        self.entries.get(interface).copied()
    }

    /// Gives `bridge_id` to every interface that has no id recorded.
    pub fn assign(&mut self, interfaces: &[String], bridge_id: u32) {
        for iface in interfaces {
            self.entries.entry(iface.clone()).or_insert(bridge_id);
        }
    }

    /// The one bridge id shared by all of `interfaces`.
    pub fn bridge_id(&self, interfaces: &[String]) -> Result<u32, HostError> {
        let ids: BTreeSet<u32> = interfaces.iter().filter_map(|i| self.get(i)).collect();
        let ids: Vec<u32> = ids.into_iter().collect();
        match ids.as_slice() {
            [id] => Ok(*id),
            [] => Err(HostError::MissingBridgeId(interfaces.to_vec())),
            _ => Err(HostError::ConflictingBridgeIds {
                ids: ids.clone(),
                state_file: self.path.clone(),
            }),
        }
    }

    pub fn release(&mut self, interfaces: &[String]) {
        for iface in interfaces {
            self.entries.remove(iface);
        }
    }

    pub fn save(&self) -> Result<(), HostError> {
        let json = serde_json::to_string(&self.entries).map_err(HostError::StateEncode)?;
        std::fs::write(&self.path, json).map_err(|source| HostError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
