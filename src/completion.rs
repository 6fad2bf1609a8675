use tokio::sync::watch;

/// A one-shot "finished" flag that any number of tasks can await.
///
/// Completing twice is a no-op, waiting on an already completed flag returns at once.
#[derive(Debug, Clone)]
pub(crate) struct Completion {
    sender: std::sync::Arc<watch::Sender<bool>>,
}

impl Completion {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: std::sync::Arc::new(sender),
        }
    }

    /// Returns `true` if this call was the one that completed the flag.
    pub fn complete(&self) -> bool {
        self.sender.send_if_modified(|done| {
            if *done {
                false
            } else {
                *done = true;
                true
            }
        })
    }

    pub fn is_complete(&self) -> bool {
        *self.sender.borrow()
    }

    pub async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        while !*receiver.borrow_and_update() {
            // The sender lives as long as `self`, so this never errors while we wait.
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}
