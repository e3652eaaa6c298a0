//! Fixed-size worker pool over a bounded channel

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Runs `workers` tasks that drain `rx` through `handler`
///
/// Returns once the channel is closed and empty, or once `cancel` fires. A
/// worker that is mid-item when cancellation arrives finishes that item
/// before exiting.
pub async fn run_pool<T, F, Fut>(
    workers: usize,
    rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
    handler: F,
) where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let rx = Arc::new(Mutex::new(rx));
    let handler = Arc::new(handler);
    let mut tasks = JoinSet::new();

    for worker_id in 0..workers.max(1) {
        let rx = rx.clone();
        let handler = handler.clone();
        let cancel = cancel.clone();

        tasks.spawn(async move {
            loop {
                let item = {
                    let mut rx = rx.lock().await;
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        item = rx.recv() => item,
                    }
                };

                match item {
                    Some(item) => handler(item).await,
                    None => break,
                }
            }
            tracing::trace!("Worker {} exiting", worker_id);
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Ingest worker failed: {}", e);
        }
    }
}
