//! Interrupt affinity planning.
//!
//! NIC drivers register one IRQ per hardware queue and name them after the
//! interface and direction (`enp6s0-tx-0`, `enp6s0-tx-1`, ...). Each queue of
//! a `<iface>-<dir>` key is pinned to consecutive cores starting at the core
//! given in the configuration.

use std::path::{Path, PathBuf};

use crate::config::CoreAssignment;
use crate::error::HostError;
use crate::exec::Action;

pub const PROC_INTERRUPTS: &str = "/proc/interrupts";

/// What to do with the planned affinities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqMode {
    /// Log the proposed IRQ to core mapping.
    Propose,
    /// Display the masks currently in effect.
    ShowExisting,
    /// Write the new masks.
    Configure,
}

/// One IRQ and the core it should be serviced on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrqPin {
    pub key: String,
    /// Position of this IRQ among those matching `key`.
    pub queue_index: u32,
    pub irq: u32,
    pub core: u32,
    pub mask: String,
}

impl IrqPin {
    pub fn affinity_path(&self) -> PathBuf {
        smp_affinity_path(self.irq)
    }

    pub fn configure(&self) -> Action {
        Action::write(self.affinity_path(), self.mask.clone())
    }
}

pub fn smp_affinity_path(irq: u32) -> PathBuf {
    Path::new("/proc/irq")
        .join(irq.to_string())
        .join("smp_affinity")
}

/// Formats a single-core mask the way `/proc/irq/*/smp_affinity` prints it:
/// two comma-separated 32-bit hex words, most significant first.
pub fn corenum_to_bitmask(core: u32) -> Result<String, HostError> {
    if core >= 64 {
        return Err(HostError::CoreOutOfRange(core));
    }
    let mask = 1u64 << core;
    Ok(format!("{:08x},{:08x}", mask >> 32, mask & 0xffff_ffff))
}

/// Builds the affinity plan from the contents of `/proc/interrupts`.
///
/// A line is attributed to the first mapping key that appears in it as a
/// whole token or as the prefix of a `<key>-<n>` token.
pub fn plan_irq_affinity(
    interrupts: &str,
    mapping: &[CoreAssignment],
) -> Result<Vec<IrqPin>, HostError> {
    let keys: Vec<String> = mapping.iter().map(CoreAssignment::key).collect();
    let mut counters = vec![0u32; keys.len()];
    let mut plan = Vec::new();

    for line in interrupts.lines() {
        let Some(idx) = keys.iter().position(|key| line_names_key(line, key)) else {
            continue;
        };

        let irq = line
            .split_once(':')
            .and_then(|(field, _)| field.trim().parse::<u32>().ok())
            .ok_or_else(|| HostError::MalformedInterrupts(line.trim().to_string()))?;

        let queue_index = counters[idx];
        let core = mapping[idx].core + queue_index;
        plan.push(IrqPin {
            key: keys[idx].clone(),
            queue_index,
            irq,
            core,
            mask: corenum_to_bitmask(core)?,
        });
        counters[idx] += 1;
    }

    Ok(plan)
}

fn line_names_key(line: &str, key: &str) -> bool {
    line.split_whitespace().any(|token| {
        token == key
            || token
                .strip_prefix(key)
                .is_some_and(|rest| rest.starts_with('-'))
    })
}
