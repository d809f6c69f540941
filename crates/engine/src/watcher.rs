//! Debounced balance recomputation.
//!
//! A [`BalanceWatcher`] listens to the engine's change feed. A burst of
//! changes to balance-relevant tables restarts a quiet window; once the
//! window elapses the balances are recomputed and published. A newer
//! recomputation aborts an older one that is still running, so the latest
//! published report always reflects the latest settled burst.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle, time};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{BalanceReport, ChangeSubscription, Engine, ResultEngine, Session, Table};

const DEFAULT_WINDOW: Duration = Duration::from_millis(300);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebouncePolicy {
    pub window: Duration,
}

impl Default for DebouncePolicy {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

impl DebouncePolicy {
    pub fn from_millis(millis: u64) -> Self {
        Self {
            window: Duration::from_millis(millis),
        }
    }
}

/// Waits until `subscription` has been quiet for `window`.
///
/// Returns `false` if the feed closed first.
pub(crate) async fn settle(subscription: &mut ChangeSubscription, window: Duration) -> bool {
    loop {
        match time::timeout(window, subscription.recv()).await {
            Ok(Some(_)) => {}
            Ok(None) => return false,
            Err(_) => return true,
        }
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct BalanceWatcher {
    receiver: watch::Receiver<Option<BalanceReport>>,
    _task: AbortOnDrop,
}

impl BalanceWatcher {
    /// Starts watching. The first report is computed right away.
    pub fn spawn(engine: Arc<Engine>, session: Session, policy: DebouncePolicy) -> Self {
        let (sender, receiver) = watch::channel(None);
        let subscription = engine
            .subscribe()
            .only(Table::ALL.into_iter().filter(|t| t.affects_balances()));
        let account_id = session.account_id();
        let compute = move || {
            let engine = engine.clone();
            let session = session.clone();
            async move { engine.compute_balances(&session).await }
        };
        let task = tokio::spawn(run(
            subscription,
            policy,
            account_id,
            compute,
            Arc::new(sender),
        ));
        Self {
            receiver,
            _task: AbortOnDrop(task),
        }
    }

    /// The most recent report, `None` until the first computation finishes.
    pub fn latest(&self) -> Option<BalanceReport> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next published report. `None` once the watcher stopped.
    pub async fn changed(&mut self) -> Option<BalanceReport> {
        self.receiver.changed().await.ok()?;
        self.receiver.borrow_and_update().clone()
    }
}

async fn run<F, Fut>(
    mut subscription: ChangeSubscription,
    policy: DebouncePolicy,
    account_id: Uuid,
    compute: F,
    sender: Arc<watch::Sender<Option<BalanceReport>>>,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = ResultEngine<BalanceReport>> + Send + 'static,
{
    let mut in_flight = recompute(compute(), account_id, sender.clone());
    loop {
        if subscription.recv().await.is_none() || !settle(&mut subscription, policy.window).await
        {
            break;
        }
        debug!(account = %account_id, "changes settled, recomputing balances");
        // Replacing drops the older task, which aborts it.
        in_flight = recompute(compute(), account_id, sender.clone());
    }
    drop(in_flight);
    info!(account = %account_id, "balance watcher stopped");
}

fn recompute(
    computation: impl Future<Output = ResultEngine<BalanceReport>> + Send + 'static,
    account_id: Uuid,
    sender: Arc<watch::Sender<Option<BalanceReport>>>,
) -> AbortOnDrop {
    AbortOnDrop(tokio::spawn(async move {
        match computation.await {
            Ok(report) => {
                debug!(account = %account_id, net = %report.summary.net, "balances recomputed");
                sender.send_replace(Some(report));
            }
            Err(err) => {
                error!(account = %account_id, %err, "balance recompute failed");
            }
        }
    }))
}
