//! Declarative testbed configuration.
//!
//! The file enumerates kernel tweaks plus one or more interface groups. Each
//! group is bridged together, gets netem delay on every transmit queue, and
//! maps its `tx`/`rx` interrupts onto explicit CPU cores.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_QUEUE_COUNT: u32 = 8;
pub const DEFAULT_DELAY: &str = "10ms";
pub const MAX_QUEUE_COUNT: u32 = 64;
pub const MAX_CORE: u32 = 63;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigInput {
    /// Kept in document order; tweaks are written in the order listed.
    pub kernel_tweaks: toml::Table,
    pub interface_groups: Vec<GroupInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroupInput {
    pub name: String,
    pub delay: Option<String>,
    pub jitter: Option<String>,
    pub loss_percent: Option<f32>,
    pub queue_count: Option<u32>,
    pub members: Vec<MemberInput>,
}

/// Only `tx` and `rx` core assignments are allowed under a member. A
/// missing direction leaves those interrupts unpinned.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberInput {
    pub name: String,
    pub tx: Option<u32>,
    pub rx: Option<u32>,
}

/// Value written into a `/proc/sys` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SysctlValue {
    Int(i64),
    Text(String),
}

impl SysctlValue {
    fn from_toml(key: &str, value: toml::Value) -> Result<Self, ConfigError> {
        match value {
            toml::Value::Integer(v) => Ok(SysctlValue::Int(v)),
            toml::Value::String(s) => Ok(SysctlValue::Text(s)),
            other => Err(ConfigError::InvalidTweak {
                key: key.to_string(),
                reason: format!("value must be a string or integer, got {}", other.type_str()),
            }),
        }
    }
}

impl fmt::Display for SysctlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SysctlValue::Int(v) => write!(f, "{v}"),
            SysctlValue::Text(s) => f.write_str(s),
        }
    }
}

/// A validated tc time value such as `10ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcTime(String);

impl TcTime {
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let s = input.trim();
        let digits_end = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (number, unit) = s.split_at(digits_end);
        let number_ok = !number.is_empty() && number.parse::<f64>().is_ok();
        let unit_ok = matches!(unit, "us" | "ms" | "s");
        if !number_ok || !unit_ok {
            return Err(ConfigError::InvalidTime(input.to_string()));
        }
        Ok(TcTime(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Tx,
    Rx,
}

impl Direction {
    pub fn suffix(self) -> &'static str {
        match self {
            Direction::Tx => "tx",
            Direction::Rx => "rx",
        }
    }
}

/// One `<iface>-<tx|rx>` interrupt key and the first core it is pinned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreAssignment {
    pub interface: String,
    pub direction: Direction,
    pub core: u32,
}

impl CoreAssignment {
    /// The name the NIC driver uses for these queues in `/proc/interrupts`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.interface, self.direction.suffix())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceGroup {
    pub name: String,
    pub interfaces: Vec<String>,
    pub delay: TcTime,
    pub jitter: Option<TcTime>,
    pub loss_percent: Option<f32>,
    pub queue_count: u32,
    /// Ordered by member, `tx` before `rx`.
    pub core_mapping: Vec<CoreAssignment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KernelTweak {
    pub key: String,
    pub value: SysctlValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub kernel_tweaks: Vec<KernelTweak>,
    pub interface_groups: Vec<InterfaceGroup>,
}

impl ConfigInput {
    pub fn resolve(self) -> Result<Config, ConfigError> {
        if self.interface_groups.is_empty() {
            return Err(ConfigError::NoGroups);
        }

        let mut kernel_tweaks = Vec::with_capacity(self.kernel_tweaks.len());
        for (key, value) in self.kernel_tweaks {
            validate_sysctl_key(&key)?;
            let value = SysctlValue::from_toml(&key, value)?;
            kernel_tweaks.push(KernelTweak { key, value });
        }

        let mut seen = HashSet::new();
        // interface -> owning group; an interface can only sit in one bridge
        let mut owners: HashMap<String, String> = HashMap::new();
        let mut groups = Vec::with_capacity(self.interface_groups.len());
        for group in self.interface_groups {
            let resolved = group.resolve()?;
            if !seen.insert(resolved.name.clone()) {
                return Err(ConfigError::DuplicateGroup(resolved.name));
            }
            for iface in &resolved.interfaces {
                if let Some(owner) = owners.insert(iface.clone(), resolved.name.clone()) {
                    return Err(ConfigError::InvalidGroup {
                        group: resolved.name.clone(),
                        reason: format!("interface {iface:?} already belongs to group {owner:?}"),
                    });
                }
            }
            groups.push(resolved);
        }

        Ok(Config {
            kernel_tweaks,
            interface_groups: groups,
        })
    }
}

impl GroupInput {
    fn resolve(self) -> Result<InterfaceGroup, ConfigError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::InvalidGroup {
                group: self.name,
                reason: "group name must not be empty".into(),
            });
        }
        let invalid = |reason: String| ConfigError::InvalidGroup {
            group: name.clone(),
            reason,
        };

        if self.members.len() < 2 {
            return Err(invalid(format!(
                "a bridge needs at least two members, found {}",
                self.members.len()
            )));
        }

        let queue_count = self.queue_count.unwrap_or(DEFAULT_QUEUE_COUNT);
        if !(1..=MAX_QUEUE_COUNT).contains(&queue_count) {
            return Err(invalid(format!(
                "queue_count must be between 1 and {MAX_QUEUE_COUNT}, got {queue_count}"
            )));
        }

        if let Some(loss) = self.loss_percent {
            if !(0.0..=100.0).contains(&loss) {
                return Err(invalid(format!(
                    "loss_percent must be between 0 and 100, got {loss}"
                )));
            }
        }

        let delay = TcTime::parse(self.delay.as_deref().unwrap_or(DEFAULT_DELAY))?;
        let jitter = self.jitter.as_deref().map(TcTime::parse).transpose()?;

        let mut interfaces = Vec::with_capacity(self.members.len());
        let mut core_mapping = Vec::with_capacity(self.members.len() * 2);
        for member in self.members {
            let iface = member.name.trim().to_string();
            if iface.is_empty() {
                return Err(invalid("member interface name must not be empty".into()));
            }
            if interfaces.contains(&iface) {
                return Err(invalid(format!("member {iface:?} is listed twice")));
            }
            let directions = [(Direction::Tx, member.tx), (Direction::Rx, member.rx)];
            for (direction, core) in directions
                .into_iter()
                .filter_map(|(dir, core)| core.map(|c| (dir, c)))
            {
                if core > MAX_CORE {
                    return Err(invalid(format!(
                        "member {iface:?} {} core {core} exceeds {MAX_CORE}",
                        direction.suffix()
                    )));
                }
                core_mapping.push(CoreAssignment {
                    interface: iface.clone(),
                    direction,
                    core,
                });
            }
            interfaces.push(iface);
        }

        Ok(InterfaceGroup {
            name,
            interfaces,
            delay,
            jitter,
            loss_percent: self.loss_percent,
            queue_count,
            core_mapping,
        })
    }
}

fn validate_sysctl_key(key: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidTweak {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.split('.').any(|seg| seg.is_empty()) {
        return Err(invalid("empty path segment"));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid("only [A-Za-z0-9_-] segments separated by '.' are allowed"));
    }
    Ok(())
}

impl Config {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let parsed: ConfigInput = toml::from_str(input)?;
        parsed.resolve()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_toml_str(&text)
    }
}

impl InterfaceGroup {
    /// Replaces the configured delay, e.g. from a command-line override.
    pub fn with_delay(mut self, delay: TcTime) -> Self {
        self.delay = delay;
        self
    }
}
