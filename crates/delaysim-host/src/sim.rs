//! Per-group orchestration of setup, teardown and IRQ pinning.

use std::path::Path;

use crate::bridge;
use crate::config::{InterfaceGroup, KernelTweak};
use crate::error::HostError;
use crate::exec::{Executor, Runner};
use crate::irq::{self, IrqMode, IrqPin};
use crate::netem::{self, NetemConfig};
use crate::state::StateStore;
use crate::tuning;

/// Whether a setup or teardown actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// The host was already in the requested state and `force` was not set.
    Skipped,
}

/// Drives one interface group through its lifecycle.
pub struct DelaySim<'a, E> {
    group: InterfaceGroup,
    kernel_tweaks: &'a [KernelTweak],
    state: &'a mut StateStore,
    runner: &'a Runner<E>,
    netem: NetemConfig,
}

impl<'a, E: Executor> DelaySim<'a, E> {
    /// Interfaces of `group` that have no bridge recorded yet are given
    /// `candidate_bridge_id`.
    pub fn new(
        group: InterfaceGroup,
        kernel_tweaks: &'a [KernelTweak],
        state: &'a mut StateStore,
        runner: &'a Runner<E>,
        candidate_bridge_id: u32,
    ) -> Self {
        tracing::debug!(
            group = %group.name,
            bridge_id = candidate_bridge_id,
            interfaces = %group.interfaces.join(","),
            "generating bridge IDs"
        );
        state.assign(&group.interfaces, candidate_bridge_id);
        let netem = NetemConfig::for_group(&group);
        Self {
            group,
            kernel_tweaks,
            state,
            runner,
            netem,
        }
    }

    pub fn group(&self) -> &InterfaceGroup {
        &self.group
    }

    pub fn bridge(&self) -> Result<String, HostError> {
        let id = self.state.bridge_id(&self.group.interfaces)?;
        Ok(bridge::bridge_name(id))
    }

    pub fn is_setup_done(&self) -> Result<bool, HostError> {
        Ok(bridge::bridge_exists(self.runner, &self.bridge()?))
    }

    fn announce_show_only(&self) {
        if self.runner.show_only() {
            tracing::info!("showing configuration only, performing no actual config");
        }
    }

    pub fn initial_setup(&mut self, force: bool) -> Result<Outcome, HostError> {
        let bridge = self.bridge()?;
        if self.is_setup_done()? {
            tracing::info!(%bridge, "bridge interface detected, assuming initial setup is complete");
            if !force {
                return Ok(Outcome::Skipped);
            }
            tracing::warn!("force enabled, proceeding anyway");
        }
        self.announce_show_only();

        tracing::info!("killing irqbalance");
        if let Err(e) = self.runner.apply(&tuning::kill_irqbalance()) {
            tracing::warn!(error = %e, "unable to kill irqbalance, perhaps it is not running");
        }

        tracing::info!("bringing up hw interfaces");
        for iface in &self.group.interfaces {
            self.runner.apply(&bridge::interface_up(iface))?;
        }

        tracing::info!(%bridge, "creating and configuring bridge");
        self.runner.apply(&bridge::add_bridge(&bridge))?;
        for iface in &self.group.interfaces {
            self.runner.apply(&bridge::add_member(&bridge, iface))?;
        }
        self.runner.apply(&bridge::link_up(&bridge))?;

        tracing::info!("tuning CPU");
        self.runner.apply(&tuning::cpu_performance_governor())?;

        tracing::info!(count = self.kernel_tweaks.len(), "tuning kernel values");
        for tweak in self.kernel_tweaks {
            self.runner.apply(&tuning::sysctl_write(tweak))?;
        }

        tracing::info!(
            delay = %self.netem.delay,
            queues = self.group.queue_count,
            "adding netem delay queues"
        );
        'queues: for iface in &self.group.interfaces {
            for queue in 1..=self.group.queue_count {
                if let Err(e) = self
                    .runner
                    .apply(&netem::add_queue(iface, queue, &self.netem))
                {
                    tracing::warn!(
                        interface = %iface,
                        queue,
                        error = %e,
                        "unable to add tc configuration, does it already exist?"
                    );
                    break 'queues;
                }
            }
        }

        if !self.runner.show_only() {
            self.state.save()?;
        }
        tracing::info!(group = %self.group.name, "all configured");
        Ok(Outcome::Applied)
    }

    pub fn teardown(&mut self, force: bool) -> Result<Outcome, HostError> {
        let bridge = self.bridge()?;
        if !self.is_setup_done()? {
            tracing::warn!(%bridge, "bridge interface is not detected");
            if !force {
                return Ok(Outcome::Skipped);
            }
            tracing::warn!("force enabled, proceeding anyway");
        }
        self.announce_show_only();

        tracing::info!("bringing down hw interfaces");
        for iface in &self.group.interfaces {
            self.runner.apply(&bridge::interface_down(iface))?;
        }

        tracing::info!("removing netem delay queues");
        for iface in &self.group.interfaces {
            for queue in 1..=self.group.queue_count {
                if let Err(e) = self
                    .runner
                    .apply(&netem::delete_queue(iface, queue, &self.netem))
                {
                    tracing::warn!(
                        interface = %iface,
                        queue,
                        error = %e,
                        "unable to remove tc configuration, possibly it never existed"
                    );
                }
            }
        }

        tracing::info!(%bridge, "removing bridge interface");
        self.runner.apply(&bridge::interface_down(&bridge))?;
        self.runner.apply(&bridge::delete_bridge(&bridge))?;

        if !self.runner.show_only() {
            self.state.release(&self.group.interfaces);
            self.state.save()?;
        }
        tracing::info!(group = %self.group.name, "torn down");
        Ok(Outcome::Applied)
    }

    /// Plans IRQ affinity from `/proc/interrupts` and acts on it per `mode`.
    pub fn process_irq(&self, mode: IrqMode) -> Result<Vec<IrqPin>, HostError> {
        let interrupts = self
            .runner
            .read_to_string(Path::new(irq::PROC_INTERRUPTS))?;
        let plan = irq::plan_irq_affinity(&interrupts, &self.group.core_mapping)?;

        match mode {
            IrqMode::Configure => {
                tracing::info!(irqs = plan.len(), "configuring IRQ values");
                for pin in &plan {
                    self.runner.apply(&pin.configure())?;
                }
            }
            IrqMode::Propose => {
                tracing::info!("displaying proposed new IRQ mappings");
                for pin in &plan {
                    tracing::info!(
                        interface = %format!("{}-{}", pin.key, pin.queue_index),
                        irq = pin.irq,
                        core = pin.core,
                        mask = %pin.mask,
                        "proposed IRQ affinity"
                    );
                }
            }
            IrqMode::ShowExisting => {
                tracing::info!("displaying existing IRQ mappings");
                for pin in &plan {
                    match self.runner.read_to_string(&pin.affinity_path()) {
                        Ok(current) => tracing::info!(
                            interface = %format!("{}-{}", pin.key, pin.queue_index),
                            irq = pin.irq,
                            mask = %current.trim(),
                            "existing IRQ affinity"
                        ),
                        Err(e) => tracing::warn!(
                            irq = pin.irq,
                            error = %e,
                            "unable to read existing IRQ affinity"
                        ),
                    }
                }
            }
        }

        Ok(plan)
    }
}
