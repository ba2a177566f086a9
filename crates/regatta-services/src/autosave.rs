//! Debounced persistence for plan edits.
//!
//! Edits are buffered per key (latest wins) and written once the editor has
//! been idle for the configured window. `shutdown` always writes whatever is
//! still buffered; dropping the autosaver without calling it lets the
//! background task flush on its own as long as the runtime is alive.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::strategy::{StrategyKey, StrategyPlanFields, StrategyStore};
use crate::supabase::SupabaseError;

pub const DEFAULT_IDLE_WINDOW_MS: u64 = 1500;

/// Destination for flushed plans
pub trait PlanSink: Send + Sync + 'static {
    type Error: Display + Send;

    fn persist_plan(
        &self,
        key: &StrategyKey,
        plan: &StrategyPlanFields,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

impl PlanSink for StrategyStore {
    type Error = SupabaseError;

    async fn persist_plan(
        &self,
        key: &StrategyKey,
        plan: &StrategyPlanFields,
    ) -> Result<(), SupabaseError> {
        self.save_plan(key, plan).await.map(|_| ())
    }
}

enum Command {
    Edit(StrategyKey, StrategyPlanFields),
    Flush(oneshot::Sender<()>),
}

/// Handle to the background autosave task
pub struct PlanAutosaver {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl PlanAutosaver {
    /// Start the background task. Must be called inside a tokio runtime.
    pub fn spawn<S: PlanSink>(sink: Arc<S>, idle_window: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(sink, rx, idle_window));
        Self { tx, task }
    }

    /// Buffer an edit. Returns false if the background task is gone.
    pub fn record(&self, key: StrategyKey, plan: StrategyPlanFields) -> bool {
        self.tx.send(Command::Edit(key, plan)).is_ok()
    }

    /// Write everything buffered now, without waiting for the idle window
    pub async fn flush_now(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Stop accepting edits and wait for the final flush
    pub async fn shutdown(self) {
        let Self { tx, task } = self;
        drop(tx);
        if let Err(e) = task.await {
            tracing::error!("Autosave task ended abnormally: {}", e);
        }
    }
}

async fn run<S: PlanSink>(
    sink: Arc<S>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    idle_window: Duration,
) {
    let mut pending: BTreeMap<StrategyKey, StrategyPlanFields> = BTreeMap::new();

    loop {
        let command = if pending.is_empty() {
            rx.recv().await
        } else {
            tokio::select! {
                command = rx.recv() => command,
                _ = tokio::time::sleep(idle_window) => {
                    flush(sink.as_ref(), &mut pending).await;
                    continue;
                }
            }
        };

        match command {
            Some(Command::Edit(key, plan)) => {
                pending.insert(key, plan);
            }
            Some(Command::Flush(done)) => {
                flush(sink.as_ref(), &mut pending).await;
                let _ = done.send(());
            }
            None => break,
        }
    }

    flush(sink.as_ref(), &mut pending).await;
    tracing::debug!("Autosave task stopped");
}

async fn flush<S: PlanSink>(sink: &S, pending: &mut BTreeMap<StrategyKey, StrategyPlanFields>) {
    for (key, plan) in std::mem::take(pending) {
        match sink.persist_plan(&key, &plan).await {
            Ok(()) => tracing::debug!("Saved plan {}/{}", key.entity_id, key.phase),
            Err(e) => tracing::error!(
                "Failed to save plan {}/{}, edit lost: {}",
                key.entity_id,
                key.phase,
                e
            ),
        }
    }
}
