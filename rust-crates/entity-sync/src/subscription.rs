use crate::transport::SubscriptionEvent;
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};
use tokio::{
    sync::{
        mpsc,
        oneshot,
    },
    task::JoinHandle,
};
use tracing::debug;

/// Owns a live subscription. Cancelling is idempotent, and once `cancel`
/// returns the callback will not be invoked again. Dropping the handle
/// cancels it.
///
/// The callback must not cancel its own handle.
pub struct SubscriptionHandle {
    cancelled: Arc<Mutex<bool>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub(crate) fn spawn<F>(mut stream: mpsc::Receiver<SubscriptionEvent>, mut on_event: F) -> Self
    where
        F: FnMut(SubscriptionEvent) + Send + 'static,
    {
        let cancelled = Arc::new(Mutex::new(false));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let gate = cancelled.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    event = stream.recv() => {
                        let Some(event) = event else {
                            debug!("subscription stream ended");
                            break;
                        };
                        if !deliver(&gate, &mut on_event, event) {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            cancelled,
            shutdown: Mutex::new(Some(shutdown_tx)),
            task: Some(task),
        }
    }

    pub fn cancel(&self) {
        let mut cancelled = lock(&self.cancelled);
        if *cancelled {
            return;
        }
        *cancelled = true;
        drop(cancelled);

        if let Some(shutdown) = lock(&self.shutdown).take() {
            let _ = shutdown.send(());
        }
        debug!("subscription cancelled");
    }

    pub fn is_active(&self) -> bool {
        !*lock(&self.cancelled) && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancels and waits for the forwarding task, which releases the
    /// underlying stream.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn deliver<F>(gate: &Mutex<bool>, on_event: &mut F, event: SubscriptionEvent) -> bool
where
    F: FnMut(SubscriptionEvent),
{
    let cancelled = lock(gate);
    if *cancelled {
        return false;
    }
    on_event(event);
    true
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
