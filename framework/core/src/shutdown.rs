use std::sync::Arc;

use tokio::sync::watch;

/// Run-wide stop signal.
///
/// Cloning the handle is cheap and every clone raises the same signal. Once raised, the signal
/// stays raised for the rest of the run so late listeners still observe it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: Arc::new(watch::channel(false).0),
        }
    }

    pub fn shutdown(&self) {
        let changed = self.sender.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        });

        if !changed {
            log::trace!("Shutdown signal was already raised");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: watch::Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// Point in time check if the shutdown signal has been raised. If this returns true then no
    /// new work should be started.
    pub fn should_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait for the shutdown signal. Returns immediately if it has already been raised, and also
    /// if every [ShutdownHandle] has been dropped. Safe to race against other futures.
    pub async fn wait_for_shutdown(&mut self) {
        if self.receiver.wait_for(|stopped| *stopped).await.is_err() {
            log::trace!("Shutdown handle dropped, treating as shutdown");
        }
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn listener_sees_signal_raised_before_it_was_created() {
        let handle = ShutdownHandle::new();
        handle.shutdown();

        let listener = handle.new_listener();
        assert!(listener.should_shutdown());
        assert!(handle.is_shutdown());
    }

    #[test]
    fn repeated_shutdown_is_harmless() {
        let handle = ShutdownHandle::new();
        let listener = handle.new_listener();
        assert!(!listener.should_shutdown());

        handle.shutdown();
        handle.shutdown();
        assert!(listener.should_shutdown());
    }

    #[tokio::test]
    async fn wait_for_shutdown_wakes_on_signal() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.shutdown();
        });

        tokio::time::timeout(Duration::from_secs(5), listener.wait_for_shutdown())
            .await
            .expect("listener should wake up");
    }
}
