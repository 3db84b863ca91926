//! Per-node task that discovers input, runs its stage and commits the result.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::TriggerListener;
use crate::discovery::{Discovery, StageInput, discover};
use crate::graph::{GraphStore, OutputWriter};
use crate::ids::NodeId;
use crate::payload::StageConfig;
use crate::stages::Stage;

/// Identity of a run. A run is skipped when its key matches the last
/// completed one.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RunKey {
    source: NodeId,
    revision: u64,
    config_revision: u64,
}

/// Outcome of one discovery pass.
enum Step {
    /// A run finished or was discarded; discover again.
    Ran,
    /// Input already processed.
    UpToDate,
    /// A previous commit has not landed yet; retry on the next poll.
    Busy,
    /// No usable input.
    Waiting,
    /// Node removed or writer revoked.
    Gone,
}

/// Drives one processing node.
pub struct StageRunner {
    store: GraphStore,
    stage: Arc<dyn Stage>,
    writer: OutputWriter,
    listener: TriggerListener,
    poll_interval: Duration,
    last_run: Option<RunKey>,
}

impl StageRunner {
    pub fn new(
        store: GraphStore,
        stage: Arc<dyn Stage>,
        writer: OutputWriter,
        listener: TriggerListener,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            stage,
            writer,
            listener,
            poll_interval,
            last_run: None,
        }
    }

    fn node_id(&self) -> &NodeId {
        self.writer.node_id()
    }

    /// Spawn the runner loop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Discover on mount, then on every trigger, and on each poll tick
    /// while waiting for input.
    pub async fn run(mut self) {
        info!("Mounted {} runner on {}", self.stage.kind(), self.node_id());
        let mut retry = false;

        loop {
            let poll = match self.step().await {
                Step::Ran => continue,
                Step::UpToDate => {
                    retry = false;
                    false
                }
                Step::Busy => {
                    retry = true;
                    true
                }
                Step::Waiting => true,
                Step::Gone => break,
            };
            let poll = poll || retry;

            tokio::select! {
                trigger = self.listener.recv() => match trigger {
                    Some(trigger) => debug!(
                        "{} triggered by {}",
                        self.node_id(),
                        trigger.source_node_id
                    ),
                    None => break,
                },
                _ = tokio::time::sleep(self.poll_interval), if poll => {
                    debug!("Polling input of {}", self.node_id());
                }
            }
        }

        info!("Runner on {} stopped", self.node_id());
    }

    async fn step(&mut self) -> Step {
        let Some(node) = self.store.node(self.node_id()).await else {
            return Step::Gone;
        };

        match discover(&self.store, &node.id, self.stage.accepts()).await {
            Discovery::Waiting(reason) => {
                if node.waiting.as_ref() != Some(&reason) {
                    debug!("{} waiting: {reason}", node.id);
                    if self.writer.set_waiting(Some(reason)).await.is_err() {
                        return Step::Gone;
                    }
                }
                Step::Waiting
            }
            Discovery::Ready(input) => {
                if node.waiting.is_some() && self.writer.set_waiting(None).await.is_err() {
                    return Step::Gone;
                }
                let key = RunKey {
                    source: input.source.clone(),
                    revision: input.revision,
                    config_revision: node.config_revision,
                };
                if self.last_run.as_ref() == Some(&key) {
                    return Step::UpToDate;
                }
                self.execute(input, key, node.config).await
            }
        }
    }

    async fn execute(&mut self, input: StageInput, key: RunKey, config: StageConfig) -> Step {
        match self.writer.begin().await {
            Ok(transition) if transition.is_moved() => {}
            Ok(_) => {
                debug!("{} still processing, deferring run", self.node_id());
                return Step::Busy;
            }
            Err(_) => return Step::Gone,
        }

        info!(
            "Running {} on {} (input revision {} from {})",
            self.stage.kind(),
            self.node_id(),
            key.revision,
            key.source
        );

        let result = {
            let process = self.stage.process(input, &config);
            tokio::pin!(process);
            loop {
                tokio::select! {
                    result = &mut process => break result,
                    Some(trigger) = self.listener.recv() => debug!(
                        "Ignoring trigger from {} while {} is processing",
                        trigger.source_node_id,
                        self.writer.node_id()
                    ),
                }
            }
        };

        match self.store.node(self.node_id()).await {
            None => return Step::Gone,
            Some(node) if node.config_revision != key.config_revision => {
                debug!("Discarding run of {}: configuration changed", node.id);
                return Step::Ran;
            }
            Some(_) => {}
        }

        let committed = match result {
            Ok(output) => {
                debug!(
                    "{} produced {} {} items",
                    self.node_id(),
                    output.len(),
                    output.kind()
                );
                self.writer.commit_output(output).await
            }
            Err(failure) => {
                warn!("Stage {} failed: {}", self.node_id(), failure.detail());
                self.writer.commit_failure(failure.detail()).await
            }
        };
        if committed.is_err() {
            return Step::Gone;
        }

        self.last_run = Some(key);
        Step::Ran
    }
}
