//! delaysim
//!
//! Configures a Linux host to sit between two network segments and add
//! artificial delay:
//!
//! - Bridges the physical interfaces of each configured group (`brctl`)
//! - Installs `tc netem` delay on every hardware transmit queue
//! - Pins NIC queue interrupts to explicit CPU cores
//! - Applies the CPU governor and kernel sysctl tweaks from the config file
//!
//! With `--show` nothing is executed; the commands are printed instead.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rand::Rng;
use tracing_subscriber::EnvFilter;

use delaysim_host::state::{generate_bridge_id, DEFAULT_STATE_FILE};
use delaysim_host::{
    Config, DelaySim, Executor, IrqMode, Runner, StateStore, SystemExecutor, TcTime,
};

/// Configures the Linux OS to process delay-simulator parameters.
#[derive(Parser, Debug)]
#[command(name = "delaysim", about = "Configures the Linux OS to process delay-simulator parameters")]
struct Cli {
    /// Show information only - do not execute.
    #[arg(short, long)]
    show: bool,

    /// Increase verbosity.
    #[arg(short, long)]
    verbose: bool,

    /// Force operation.
    #[arg(short, long)]
    force: bool,

    /// TOML config file.
    #[arg(short = 'y', long, default_value = "delay.toml")]
    config: PathBuf,

    /// Bridge-ID state file. No need to edit manually.
    #[arg(short = 'a', long, default_value = DEFAULT_STATE_FILE)]
    state: PathBuf,

    /// Configure static IRQ values.
    #[arg(short, long)]
    irq: bool,

    /// Output proposed and existing IRQ values.
    #[arg(short, long)]
    output: bool,

    /// Delay value (as used by tc), overriding every group's configured delay.
    #[arg(short, long)]
    delay: Option<String>,

    /// Run setup.
    #[arg(short = 'c', long, conflicts_with = "teardown")]
    setup: bool,

    /// Teardown setup (rebooting will do the same).
    #[arg(short, long)]
    teardown: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = Config::load(&cli.config)?;
    let mut state = StateStore::load(&cli.state)
        .with_context(|| format!("loading state file {}", cli.state.display()))?;
    let runner = Runner::new(SystemExecutor, cli.show);

    tracing::debug!(
        config = %cli.config.display(),
        groups = config.interface_groups.len(),
        show = cli.show,
        force = cli.force,
        "delaysim starting"
    );

    run_with(cli, &config, &mut state, &runner, &mut rand::rng())
}

/// Walks every group in file order: setup or teardown, then IRQ output, then
/// IRQ configuration.
fn run_with<E: Executor, R: Rng>(
    cli: &Cli,
    config: &Config,
    state: &mut StateStore,
    runner: &Runner<E>,
    rng: &mut R,
) -> anyhow::Result<()> {
    let delay_override = cli
        .delay
        .as_deref()
        .map(TcTime::parse)
        .transpose()
        .context("invalid --delay")?;

    for group in &config.interface_groups {
        let mut group = group.clone();
        if let Some(delay) = &delay_override {
            group = group.with_delay(delay.clone());
        }
        let name = group.name.clone();
        let _span = tracing::info_span!("group", name = %name).entered();

        let mut sim = DelaySim::new(
            group,
            &config.kernel_tweaks,
            state,
            runner,
            generate_bridge_id(rng),
        );

        if cli.setup {
            sim.initial_setup(cli.force)
                .with_context(|| format!("setting up group {name}"))?;
        } else if cli.teardown {
            sim.teardown(cli.force)
                .with_context(|| format!("tearing down group {name}"))?;
        }

        if cli.output {
            sim.process_irq(IrqMode::Propose)?;
            sim.process_irq(IrqMode::ShowExisting)?;
        }

        if cli.irq && !cli.teardown {
            sim.process_irq(IrqMode::Configure)
                .with_context(|| format!("configuring IRQ affinity for group {name}"))?;
        }
    }

    Ok(())
}
