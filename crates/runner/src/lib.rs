//! A concurrent application runner that manages long-running processes with
//! graceful shutdown.
//!
//! Processes run until one fails or a shutdown signal arrives; then the
//! shared cancellation token is cancelled, remaining processes get a drain
//! window to reach a terminal state, and closers run with their own timeout.
//!
//! # Example
//!
//! ```no_run
//! use fieldgate_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Runner::new()
//!         .with_process("ticker", |ctx| async move {
//!             loop {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => break,
//!                     _ = tokio::time::sleep(Duration::from_secs(1)) => {
//!                         tracing::info!("tick");
//!                     }
//!                 }
//!             }
//!             Ok(())
//!         })
//!         .with_closer(|| async move {
//!             tracing::info!("flushing");
//!             Ok(())
//!         })
//!         .run()
//!         .await
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type BoxedFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A named long-running process driven by the shared cancellation token.
pub type Process = Box<dyn FnOnce(CancellationToken) -> BoxedFuture + Send>;

/// A cleanup function executed after all processes have stopped.
pub type Closer = Box<dyn FnOnce() -> BoxedFuture + Send>;

pub struct Runner {
    processes: Vec<(String, Process)>,
    closers: Vec<Closer>,
    drain_timeout: Duration,
    closer_timeout: Duration,
    shutdown_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            drain_timeout: Duration::from_secs(20),
            closer_timeout: Duration::from_secs(10),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Add a named process. Processes run concurrently; the first failure
    /// cancels all of them.
    pub fn with_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.processes
            .push((name.into(), Box::new(|token| Box::pin(process(token)))));
        self
    }

    /// Add a cleanup function. Closers run after every process has stopped,
    /// regardless of how it stopped.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    /// How long cancelled processes get to reach a terminal state before
    /// being aborted.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Use an externally controlled cancellation token.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = token;
        self
    }

    /// Run all processes until completion, failure, or a shutdown signal,
    /// then drain and clean up. Returns the first process error, if any.
    pub async fn run(self) -> anyhow::Result<()> {
        let token = self.shutdown_token;
        let mut join_set = JoinSet::new();

        for (name, process) in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move {
                let result = process(process_token).await;
                (name, result)
            });
        }

        spawn_signal_watchers(token.clone());

        // Wait until every process stops; the first failure or an external
        // cancellation triggers the rest to wind down.
        let mut first_error = None;
        loop {
            let joined = tokio::select! {
                _ = token.cancelled() => break,
                joined = join_set.join_next() => match joined {
                    Some(joined) => joined,
                    None => break,
                },
            };
            match joined {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "process completed");
                }
                Ok((name, Err(err))) => {
                    error!(process = %name, error = %format!("{:#}", err), "process failed");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                    token.cancel();
                }
                Err(err) => {
                    error!(error = %err, "process panicked");
                    if first_error.is_none() {
                        first_error = Some(anyhow::anyhow!("process panicked: {}", err));
                    }
                    token.cancel();
                }
            }

            if token.is_cancelled() {
                break;
            }
        }
        token.cancel();

        // Drain: cancelled processes stop accepting work and finish what is
        // in flight; anything still running after the window is aborted.
        let drained = tokio::time::timeout(self.drain_timeout, async {
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((name, Ok(()))) => debug!(process = %name, "process drained"),
                    Ok((name, Err(err))) => {
                        warn!(process = %name, error = %format!("{:#}", err), "process failed during drain");
                    }
                    Err(err) => warn!(error = %err, "process panicked during drain"),
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                drain_timeout_secs = self.drain_timeout.as_secs(),
                "drain window elapsed, aborting remaining processes"
            );
            join_set.shutdown().await;
        }

        if !self.closers.is_empty() {
            info!(closer_count = self.closers.len(), "running closers");
            if tokio::time::timeout(self.closer_timeout, run_closers(self.closers))
                .await
                .is_err()
            {
                error!(
                    closer_timeout_secs = self.closer_timeout.as_secs(),
                    "closers timed out"
                );
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                info!("all processes stopped cleanly");
                Ok(())
            }
        }
    }
}

fn spawn_signal_watchers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received interrupt signal");
                ctrl_c_token.cancel();
            }
            Err(err) => error!(error = %err, "failed to install interrupt handler"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM");
                token.cancel();
            }
            Err(err) => error!(error = %err, "failed to install SIGTERM handler"),
        }
    });
}

async fn run_closers(closers: Vec<Closer>) {
    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(closer());
    }
    while let Some(joined) = closer_set.join_next().await {
        match joined {
            Ok(Ok(())) => debug!("closer completed"),
            Ok(Err(err)) => error!(error = %format!("{:#}", err), "closer failed"),
            Err(err) => error!(error = %err, "closer panicked"),
        }
    }
}
