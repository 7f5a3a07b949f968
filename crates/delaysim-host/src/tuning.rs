//! Host performance tuning: irqbalance, CPU frequency governor and sysctl.

use std::path::PathBuf;

use crate::config::KernelTweak;
use crate::exec::Action;

const PROC_SYS: &str = "/proc/sys";

/// irqbalance rewrites affinity masks behind our back, so it has to go.
pub fn kill_irqbalance() -> Action {
    Action::run("killall", &["irqbalance"])
}

/// Pins every CPU to the `performance` governor (cpufrequtils).
pub fn cpu_performance_governor() -> Action {
    Action::run("cpufreq-set", &["-r", "-g", "performance"])
}

/// Maps a dotted sysctl name onto its `/proc/sys` path.
pub fn sysctl_path(key: &str) -> PathBuf {
    key.split('.').fold(PathBuf::from(PROC_SYS), |path, seg| path.join(seg))
}

pub fn sysctl_write(tweak: &KernelTweak) -> Action {
    Action::write(sysctl_path(&tweak.key), tweak.value.to_string())
}
