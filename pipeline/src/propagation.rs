//! Staggered notification of downstream nodes after a successful commit.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::bus::{Trigger, TriggerBus};
use crate::ids::NodeId;

/// Trigger every node of `targets` in order, the i-th after `i * stagger`.
///
/// One task publishes the whole schedule, so a later target is never
/// notified before an earlier one.
pub fn schedule(
    bus: TriggerBus,
    source: NodeId,
    targets: Vec<NodeId>,
    stagger: Duration,
) -> JoinHandle<()> {
    debug!(
        "Scheduling {} triggers from {source} (stagger {stagger:?})",
        targets.len()
    );

    tokio::spawn(async move {
        let start = Instant::now();
        for (i, target) in targets.into_iter().enumerate() {
            if i > 0 && !stagger.is_zero() {
                tokio::time::sleep_until(start + stagger * i as u32).await;
            }
            bus.publish(Trigger::new(&source, target)).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn test_targets_are_staggered_in_order() {
        let bus = TriggerBus::new();
        let mut b = bus.register("b").await;
        let mut c = bus.register("c").await;
        let start = Instant::now();

        schedule(
            bus.clone(),
            "a".into(),
            vec!["b".into(), "c".into()],
            Duration::from_millis(500),
        )
        .await
        .unwrap();

        assert_eq!(b.try_recv(), Some(Trigger::new("a", "b")));
        assert_eq!(c.try_recv(), Some(Trigger::new("a", "c")));
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_missing_listener_does_not_stop_schedule() {
        let bus = TriggerBus::new();
        let mut c = bus.register("c").await;

        schedule(bus.clone(), "a".into(), vec!["b".into(), "c".into()], Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(c.try_recv(), Some(Trigger::new("a", "c")));
    }
}
