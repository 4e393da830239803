//! Termination signals and task draining.

use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

/// Resolve on the first SIGINT or SIGTERM.
pub async fn signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(?err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

/// Report a task that ended abnormally.
pub fn log_join(joined: Result<(), JoinError>, kind: &'static str) {
    if let Err(err) = joined {
        if err.is_panic() {
            error!(kind, ?err, "task panicked");
        }
    }
}

/// Wait up to `window` for `tasks` to finish, then abort the rest.
///
/// Returns the number of aborted tasks.
pub async fn drain(mut tasks: JoinSet<()>, window: Duration) -> usize {
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            joined = tasks.join_next() => match joined {
                Some(joined) => log_join(joined, "drained"),
                None => return 0,
            },
            _ = &mut deadline => {
                let remaining = tasks.len();
                warn!(remaining, "drain window elapsed, aborting tasks");
                tasks.abort_all();
                return remaining;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_waits_for_quick_tasks() {
        let mut tasks = JoinSet::new();
        for delay in [1, 5, 10] {
            tasks.spawn(tokio::time::sleep(Duration::from_millis(delay)));
        }
        assert_eq!(drain(tasks, Duration::from_secs(5)).await, 0);
    }

    #[tokio::test]
    async fn test_drain_aborts_slow_tasks() {
        let mut tasks = JoinSet::new();
        tasks.spawn(tokio::time::sleep(Duration::from_millis(1)));
        tasks.spawn(tokio::time::sleep(Duration::from_secs(60)));
        assert_eq!(drain(tasks, Duration::from_millis(50)).await, 1);
    }
}
