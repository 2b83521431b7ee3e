use std::future::Future;
use std::time::Duration;

use dirstress_core::prelude::{ShutdownHandle, ShutdownSignalError};

#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            shutdown_handle,
        }
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// Note that the future will be cancelled if the runner is shutdown, in which case a
    /// [ShutdownSignalError] is returned. You do not need to do anything special to handle this,
    /// the runner expects it.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(anyhow::anyhow!(ShutdownSignalError::default()))
                },
            }
        })
    }

    /// Run async code in place without racing the shutdown signal.
    ///
    /// Use this for clean-up work, such as releasing a connection, that must still happen while
    /// the run is stopping. The future should bound its own run time.
    pub fn execute_to_completion<T>(&self, fut: impl Future<Output = T>) -> T {
        self.runtime.block_on(fut)
    }

    /// Sleep for `duration`, waking early with a [ShutdownSignalError] if the run is stopped.
    pub fn sleep(&self, duration: Duration) -> anyhow::Result<()> {
        if duration.is_zero() {
            return Ok(());
        }

        self.execute_in_place(async move {
            tokio::time::sleep(duration).await;
            Ok(())
        })
    }

    /// Submit async code to be run in the background.
    ///
    /// Note that the future will not be cancelled if the runner is shutdown. It is also not guaranteed
    /// that the runner will wait for the future to complete before shutting down.
    ///
    /// In VU behaviour hooks, you should use [Executor::execute_in_place] instead to ensure that
    /// your future completes before the behaviour completes and is scheduled again.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }
}
