//! Delivery loop: feeds inbound messages to the producer.
//!
//! Messages are processed on Tokio tasks with at most `workers` in flight.
//! With more than one worker, responses can leave in a different order than
//! their requests arrived.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use common::types::Message;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::producer::MultimapProducer;

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    failed: AtomicU64,
    responses: AtomicU64,
}

/// Totals for one [`Route::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteStats {
    pub processed: u64,
    pub failed: u64,
    pub responses: u64,
}

pub struct Route {
    producer: Arc<MultimapProducer>,
    workers: usize,
}

impl Route {
    pub fn new(producer: Arc<MultimapProducer>, workers: usize) -> Self {
        Self { producer, workers: workers.max(1) }
    }

    /// Drain `inbound` until every sender is dropped, then wait for in-flight
    /// messages. Failed messages are logged and counted; they never stop the
    /// route.
    pub async fn run(&self, mut inbound: mpsc::Receiver<Message>) -> RouteStats {
        let permits = Arc::new(Semaphore::new(self.workers));
        let counters = Arc::new(Counters::default());
        let mut tasks = JoinSet::new();

        info!(multimap = %self.producer.multimap_name(), workers = self.workers, "route started");
        while let Some(message) = inbound.recv().await {
            let permit = match permits.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };
            let producer = self.producer.clone();
            let task_counters = counters.clone();
            tasks.spawn(async move {
                let _permit = permit;
                match producer.process(message).await {
                    Ok(resp) => {
                        task_counters.processed.fetch_add(1, Ordering::Relaxed);
                        if resp.is_some() {
                            task_counters.responses.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Err(_) => {
                        // already logged by the producer
                        task_counters.failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
            // reap finished tasks so the set does not grow with the stream
            while let Some(res) = tasks.try_join_next() {
                reap(res, &counters);
            }
        }

        while let Some(res) = tasks.join_next().await {
            reap(res, &counters);
        }

        let stats = RouteStats {
            processed: counters.processed.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            responses: counters.responses.load(Ordering::Relaxed),
        };
        info!(processed = stats.processed, failed = stats.failed, responses = stats.responses, "route finished");
        stats
    }
}

/// A task that died without reporting is a failed message.
fn reap(res: Result<(), JoinError>, counters: &Counters) {
    if let Err(e) = res {
        warn!(error = %e, "route task panicked");
        counters.failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Read newline-delimited JSON messages from `reader` into `tx`.
/// Blank lines are skipped; lines that do not parse are logged and skipped.
/// Returns the number of messages forwarded.
pub async fn read_json_lines<R>(reader: R, tx: mpsc::Sender<Message>) -> anyhow::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0u64;
    let mut line_no = 0u64;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match Message::from_json_line(&line) {
            Ok(message) => {
                if tx.send(message).await.is_err() {
                    debug!(line_no, "route closed; stop reading");
                    break;
                }
                forwarded += 1;
            }
            Err(e) => warn!(line_no, error = %e, "skipping malformed message"),
        }
    }
    Ok(forwarded)
}
