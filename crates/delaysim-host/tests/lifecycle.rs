//! End-to-end group lifecycle against the recording executor.
//!
//! These tests check the exact sequence of host commands a setup, teardown
//! or IRQ pass would issue, without touching the machine.

mod common;

use common::unique_temp_path;
use delaysim_host::config::Config;
use delaysim_host::irq::smp_affinity_path;
use delaysim_host::{DelaySim, IrqMode, Outcome, RecordingExecutor, Runner, StateStore, TcTime};

const CONFIG: &str = r#"
    [kernel_tweaks]
    "net.core.rmem_max" = 16777216
    "net.core.netdev_max_backlog" = 250000

    [[interface_groups]]
    name = "wan"
    delay = "40ms"
    queue_count = 2

    [[interface_groups.members]]
    name = "enp7s0"
    tx = 30
    rx = 10

    [[interface_groups.members]]
    name = "enp6s0"
    tx = 10
    rx = 30
"#;

const INTERRUPTS: &str = "\
           CPU0       CPU1
 60:          1          0   PCI-MSI 524288-edge      enp7s0-tx-0
 61:          1          0   PCI-MSI 524289-edge      enp7s0-tx-1
 62:          1          0   PCI-MSI 524290-edge      enp7s0-rx-0
 70:          1          0   PCI-MSI 526336-edge      enp6s0-tx-0
 71:          1          0   PCI-MSI 526337-edge      enp6s0-rx-0
";

fn config() -> Config {
    Config::from_toml_str(CONFIG).expect("valid config")
}

#[test]
fn setup_issues_commands_in_order() {
    let cfg = config();
    let state_path = unique_temp_path("setup");
    let mut state = StateStore::empty(&state_path);
    let rec = RecordingExecutor::new();
    let runner = Runner::new(&rec, false);

    let mut sim = DelaySim::new(
        cfg.interface_groups[0].clone(),
        &cfg.kernel_tweaks,
        &mut state,
        &runner,
        4242,
    );
    assert_eq!(sim.initial_setup(false).unwrap(), Outcome::Applied);

    assert_eq!(
        rec.command_lines(),
        vec![
            "killall irqbalance",
            "ifconfig enp7s0 0.0.0.0 promisc up",
            "ifconfig enp6s0 0.0.0.0 promisc up",
            "brctl addbr br4242",
            "brctl addif br4242 enp7s0",
            "brctl addif br4242 enp6s0",
            "ifconfig br4242 up",
            "cpufreq-set -r -g performance",
            "echo '16777216' > /proc/sys/net/core/rmem_max",
            "echo '250000' > /proc/sys/net/core/netdev_max_backlog",
            "tc qdisc add dev enp7s0 parent :1 netem delay 40ms limit 100000",
            "tc qdisc add dev enp7s0 parent :2 netem delay 40ms limit 100000",
            "tc qdisc add dev enp6s0 parent :1 netem delay 40ms limit 100000",
            "tc qdisc add dev enp6s0 parent :2 netem delay 40ms limit 100000",
        ]
    );

    let saved = StateStore::load(&state_path).unwrap();
    assert_eq!(saved.get("enp7s0"), Some(4242));
    assert_eq!(saved.get("enp6s0"), Some(4242));
    let _ = std::fs::remove_file(&state_path);
}

#[test]
fn first_qdisc_failure_stops_queue_installation() {
    let cfg = config();
    let state_path = unique_temp_path("qdisc_fail");
    let mut state = StateStore::empty(&state_path);
    let rec = RecordingExecutor::new();
    rec.fail_when("tc qdisc add dev enp7s0 parent :2");
    let runner = Runner::new(&rec, false);

    let mut sim = DelaySim::new(
        cfg.interface_groups[0].clone(),
        &cfg.kernel_tweaks,
        &mut state,
        &runner,
        99,
    );
    assert_eq!(sim.initial_setup(false).unwrap(), Outcome::Applied);

    let tc: Vec<String> = rec
        .command_lines()
        .into_iter()
        .filter(|l| l.starts_with("tc "))
        .collect();
    assert_eq!(tc.len(), 2);
    assert!(tc[1].contains("enp7s0 parent :2"));
    assert!(state_path.exists());
    let _ = std::fs::remove_file(&state_path);
}

#[test]
fn teardown_reuses_recorded_bridge_and_releases_state() {
    let cfg = config();
    let state_path = unique_temp_path("teardown");
    let mut seeded = StateStore::empty(&state_path);
    seeded.assign(&cfg.interface_groups[0].interfaces, 777);
    seeded.save().unwrap();

    let mut state = StateStore::load(&state_path).unwrap();
    let rec = RecordingExecutor::new();
    rec.set_probe("ifconfig br777", true);
    rec.fail_when("parent :2");
    let runner = Runner::new(&rec, false);

    let mut sim = DelaySim::new(
        cfg.interface_groups[0].clone(),
        &cfg.kernel_tweaks,
        &mut state,
        &runner,
        12345,
    );
    assert_eq!(sim.bridge().unwrap(), "br777");
    assert_eq!(sim.teardown(false).unwrap(), Outcome::Applied);

    assert_eq!(
        rec.command_lines(),
        vec![
            "ifconfig enp7s0 down",
            "ifconfig enp6s0 down",
            "tc qdisc del dev enp7s0 parent :1 netem delay 40ms limit 1000000",
            "tc qdisc del dev enp7s0 parent :2 netem delay 40ms limit 1000000",
            "tc qdisc del dev enp6s0 parent :1 netem delay 40ms limit 1000000",
            "tc qdisc del dev enp6s0 parent :2 netem delay 40ms limit 1000000",
            "ifconfig br777 down",
            "brctl delbr br777",
        ]
    );

    let saved = StateStore::load(&state_path).unwrap();
    assert!(saved.get("enp7s0").is_none());
    let _ = std::fs::remove_file(&state_path);
}

#[test]
fn forced_teardown_runs_without_bridge() {
    let cfg = config();
    let mut state = StateStore::empty(unique_temp_path("forced"));
    let rec = RecordingExecutor::new();
    let runner = Runner::new(&rec, true);

    let mut sim = DelaySim::new(
        cfg.interface_groups[0].clone(),
        &cfg.kernel_tweaks,
        &mut state,
        &runner,
        31,
    );
    assert_eq!(sim.teardown(true).unwrap(), Outcome::Applied);
    // show-only: printed, never executed
    assert!(rec.actions().is_empty());
    assert!(!state.path().exists());
    assert_eq!(state.get("enp7s0"), Some(31));
}

#[test]
fn show_only_setup_touches_nothing() {
    let cfg = config();
    let mut state = StateStore::empty(unique_temp_path("show"));
    let rec = RecordingExecutor::new();
    let runner = Runner::new(&rec, true);

    let mut sim = DelaySim::new(
        cfg.interface_groups[0].clone(),
        &cfg.kernel_tweaks,
        &mut state,
        &runner,
        50,
    );
    assert_eq!(sim.initial_setup(false).unwrap(), Outcome::Applied);
    assert!(rec.actions().is_empty());
    assert!(!state.path().exists());
}

#[test]
fn delay_override_reaches_netem() {
    let cfg = config();
    let group = cfg.interface_groups[0]
        .clone()
        .with_delay(TcTime::parse("5ms").unwrap());
    let mut state = StateStore::empty(unique_temp_path("override"));
    let rec = RecordingExecutor::new();
    let runner = Runner::new(&rec, false);

    let mut sim = DelaySim::new(group, &[], &mut state, &runner, 60);
    sim.initial_setup(false).unwrap();
    assert!(rec
        .command_lines()
        .iter()
        .filter(|l| l.starts_with("tc "))
        .all(|l| l.contains("delay 5ms ")));
    let _ = std::fs::remove_file(state.path());
}

#[test]
fn irq_configure_writes_masks() {
    let cfg = config();
    let mut state = StateStore::empty(unique_temp_path("irq"));
    let rec = RecordingExecutor::new();
    rec.set_file("/proc/interrupts", INTERRUPTS);
    let runner = Runner::new(&rec, false);

    let sim = DelaySim::new(
        cfg.interface_groups[0].clone(),
        &cfg.kernel_tweaks,
        &mut state,
        &runner,
        1,
    );
    let plan = sim.process_irq(IrqMode::Configure).unwrap();
    assert_eq!(plan.len(), 5);

    assert_eq!(
        rec.file(smp_affinity_path(60)).as_deref(),
        Some("00000000,40000000")
    );
    assert_eq!(
        rec.file(smp_affinity_path(61)).as_deref(),
        Some("00000000,80000000")
    );
    assert_eq!(
        rec.file(smp_affinity_path(62)).as_deref(),
        Some("00000000,00000400")
    );
    assert_eq!(
        rec.file(smp_affinity_path(70)).as_deref(),
        Some("00000000,00000400")
    );
    assert_eq!(
        rec.file(smp_affinity_path(71)).as_deref(),
        Some("00000000,40000000")
    );
}

#[test]
fn irq_propose_and_show_do_not_write() {
    let cfg = config();
    let mut state = StateStore::empty(unique_temp_path("irq_show"));
    let rec = RecordingExecutor::new();
    rec.set_file("/proc/interrupts", INTERRUPTS);
    rec.set_file(smp_affinity_path(60), "ffffffff,ffffffff\n");
    let runner = Runner::new(&rec, false);

    let sim = DelaySim::new(
        cfg.interface_groups[0].clone(),
        &cfg.kernel_tweaks,
        &mut state,
        &runner,
        1,
    );
    sim.process_irq(IrqMode::Propose).unwrap();
    sim.process_irq(IrqMode::ShowExisting).unwrap();
    assert!(rec.actions().is_empty());
}
