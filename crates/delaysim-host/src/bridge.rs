//! L2 bridge between the physical interfaces of a group.
//!
//! Uses `ifconfig` for link state and `brctl` (bridge-utils) for the bridge
//! itself. The bridge is named `br<id>` where the id comes from the state
//! file so that a later teardown finds the same device.

use crate::exec::{Action, Executor, Runner};

pub fn bridge_name(bridge_id: u32) -> String {
    format!("br{bridge_id}")
}

/// Brings a physical interface up without an address, in promiscuous mode.
pub fn interface_up(interface: &str) -> Action {
    Action::run("ifconfig", &[interface, "0.0.0.0", "promisc", "up"])
}

pub fn link_up(interface: &str) -> Action {
    Action::run("ifconfig", &[interface, "up"])
}

pub fn interface_down(interface: &str) -> Action {
    Action::run("ifconfig", &[interface, "down"])
}

pub fn add_bridge(bridge: &str) -> Action {
    Action::run("brctl", &["addbr", bridge])
}

pub fn add_member(bridge: &str, interface: &str) -> Action {
    Action::run("brctl", &["addif", bridge, interface])
}

pub fn delete_bridge(bridge: &str) -> Action {
    Action::run("brctl", &["delbr", bridge])
}

/// Returns true when `ifconfig <bridge>` succeeds, i.e. the device exists.
pub fn bridge_exists<E: Executor>(runner: &Runner<E>, bridge: &str) -> bool {
    runner.probe("ifconfig", &[bridge])
}
