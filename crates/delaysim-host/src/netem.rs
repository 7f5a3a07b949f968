//! Transmit-queue netem qdiscs: one per hardware queue, added on setup and
//! removed on teardown.

use crate::config::{InterfaceGroup, TcTime};
use crate::exec::Action;

/// Queue limit used when installing netem on a transmit queue.
pub const SETUP_LIMIT: u32 = 100_000;
/// Limit passed on removal. `tc` only matches on parent and kind when
/// deleting, so this does not have to equal [`SETUP_LIMIT`].
pub const TEARDOWN_LIMIT: u32 = 1_000_000;

/// netem parameters installed on each hardware transmit queue.
///
/// Every interface of a group gets one netem qdisc per queue, attached to the
/// multiqueue root as `parent :<n>` for `n` in `1..=queue_count`.
#[derive(Debug, Clone, PartialEq)]
pub struct NetemConfig {
    pub delay: TcTime,
    pub jitter: Option<TcTime>,
    pub loss_percent: Option<f32>,
    pub limit: Option<u32>,
}

impl NetemConfig {
    pub fn for_group(group: &InterfaceGroup) -> Self {
        Self {
            delay: group.delay.clone(),
            jitter: group.jitter.clone(),
            loss_percent: group.loss_percent,
            limit: None,
        }
    }

    fn with_limit(&self, limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..self.clone()
        }
    }
}

/// `tc qdisc add dev <iface> parent :<queue> netem ...`
pub fn add_queue(interface: &str, queue: u32, config: &NetemConfig) -> Action {
    qdisc_action("add", interface, queue, &config.with_limit(SETUP_LIMIT))
}

/// `tc qdisc del dev <iface> parent :<queue> netem ...`
pub fn delete_queue(interface: &str, queue: u32, config: &NetemConfig) -> Action {
    qdisc_action("del", interface, queue, &config.with_limit(TEARDOWN_LIMIT))
}

fn qdisc_action(verb: &str, interface: &str, queue: u32, config: &NetemConfig) -> Action {
    let mut args: Vec<String> = vec![
        "qdisc".into(),
        verb.into(),
        "dev".into(),
        interface.into(),
        "parent".into(),
        format!(":{queue}"),
        "netem".into(),
    ];
    append_netem_params(config, &mut args);

    Action::Run {
        program: "tc".into(),
        args,
    }
}

/// Appends delay, jitter, loss and limit in the order `tc` prints them back.
fn append_netem_params(config: &NetemConfig, args: &mut Vec<String>) {
    args.push("delay".into());
    args.push(config.delay.to_string());
    if let Some(jitter) = &config.jitter {
        args.push(jitter.to_string());
    }

    if let Some(loss) = config.loss_percent {
        if loss > 0.0 {
            args.push("loss".into());
            args.push(format!("{loss}%"));
        }
    }

    if let Some(limit) = config.limit {
        args.push("limit".into());
        args.push(limit.to_string());
    }
}
