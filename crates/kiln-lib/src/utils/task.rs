use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A spawned task paired with a cancellation signal, so its owner can stop it
/// and wait for it instead of leaving it detached.
pub struct SupervisedTask {
    name: &'static str,
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SupervisedTask {
    /// Spawn `f` on the runtime. The receiver it gets flips to `true` once
    /// [`cancel`](Self::cancel) is called.
    pub fn spawn<F, Fut>(name: &'static str, f: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel, rx) = watch::channel(false);
        let handle = tokio::spawn(f(rx));
        Self {
            name,
            cancel,
            handle,
        }
    }

    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            log::warn!("Task {} ended abnormally: {}", self.name, e);
        }
    }

    /// Wait up to `grace` for a natural finish, then cancel and wait.
    pub async fn join_within(mut self, grace: Duration) {
        if tokio::time::timeout(grace, &mut self.handle).await.is_ok() {
            return;
        }
        log::debug!("Task {} still running after {:?}, cancelling", self.name, grace);
        self.cancel();
        self.join().await;
    }
}
