//! Fixed-size worker pool fed by one shared FIFO queue.
//!
//! The accept loop pushes every accepted connection onto an unbounded
//! queue and goes straight back to `accept()`. [`WORKER_COUNT`] long-lived
//! workers pull from the queue one connection at a time and run the
//! [`ConnectionHandler`] to completion before taking the next one.
//!
//! Nothing is shared between workers except the queue and the
//! [`PoolStats`] counters.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info_span};

use crate::error::PixwireError;
use crate::handler::ConnectionHandler;

/// Number of workers. A deployment constant, not a runtime setting.
pub const WORKER_COUNT: usize = 4;

/// An accepted connection waiting for a worker.
#[derive(Debug)]
pub struct Incoming<S> {
    pub stream: S,
    pub peer: SocketAddr,
}

type Queue<S> = Arc<Mutex<mpsc::UnboundedReceiver<Incoming<S>>>>;

// ── PoolStats ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct WorkerGauge {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    served: AtomicU64,
}

/// Live counters for the pool.
///
/// `in_flight` per worker must never exceed 1; `peak` records the
/// highest value ever observed so tests can assert on it afterwards.
#[derive(Debug)]
pub struct PoolStats {
    workers: Vec<WorkerGauge>,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl PoolStats {
    fn new(workers: usize) -> Self {
        Self {
            workers: (0..workers).map(|_| WorkerGauge::default()).collect(),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Connections worker `id` is processing right now.
    pub fn in_flight(&self, id: usize) -> usize {
        self.workers[id].in_flight.load(Ordering::SeqCst)
    }

    /// Highest concurrent load worker `id` has ever had.
    pub fn peak(&self, id: usize) -> usize {
        self.workers[id].peak.load(Ordering::SeqCst)
    }

    /// Highest per-worker peak across the pool.
    pub fn max_peak(&self) -> usize {
        (0..self.workers.len()).map(|id| self.peak(id)).max().unwrap_or(0)
    }

    /// Connections worker `id` has finished, successfully or not.
    pub fn served(&self, id: usize) -> u64 {
        self.workers[id].served.load(Ordering::SeqCst)
    }

    /// Requests answered with a response frame.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Connections closed because of an error.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    fn enter(&self, id: usize) {
        let gauge = &self.workers[id];
        let now = gauge.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        gauge.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self, id: usize, ok: bool) {
        let gauge = &self.workers[id];
        gauge.in_flight.fetch_sub(1, Ordering::SeqCst);
        gauge.served.fetch_add(1, Ordering::SeqCst);
        if ok {
            self.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ── WorkerPool ───────────────────────────────────────────────────

pub struct WorkerPool<S> {
    queue: mpsc::UnboundedSender<Incoming<S>>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<PoolStats>,
}

impl<S> WorkerPool<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Spawn [`WORKER_COUNT`] workers that share `handler`.
    pub fn start(handler: ConnectionHandler) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue: Queue<S> = Arc::new(Mutex::new(rx));
        let stats = Arc::new(PoolStats::new(WORKER_COUNT));

        let workers = (0..WORKER_COUNT)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&queue),
                    handler.clone(),
                    Arc::clone(&stats),
                ))
            })
            .collect();

        Self {
            queue: tx,
            workers,
            stats,
        }
    }

    /// Hand a connection to the next free worker. Never blocks.
    pub fn dispatch(&self, stream: S, peer: SocketAddr) -> Result<(), PixwireError> {
        self.queue.send(Incoming { stream, peer })?;
        Ok(())
    }

    pub fn stats(&self) -> Arc<PoolStats> {
        Arc::clone(&self.stats)
    }

    /// Close the queue and wait for every worker to drain it.
    pub async fn shutdown(self) {
        drop(self.queue);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("worker task ended abnormally: {e}");
            }
        }
    }
}

async fn worker_loop<S>(
    id: usize,
    queue: Queue<S>,
    handler: ConnectionHandler,
    stats: Arc<PoolStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    debug!(worker = id, "worker started");
    loop {
        // Only one idle worker waits on the channel at a time; the rest
        // queue up on the mutex, which keeps hand-out in FIFO order.
        let next = queue.lock().await.recv().await;
        let Some(Incoming { stream, peer }) = next else {
            break;
        };

        let span = info_span!("connection", worker = id, %peer);
        stats.enter(id);
        let outcome = AssertUnwindSafe(handler.handle(stream))
            .catch_unwind()
            .instrument(span)
            .await;
        let ok = match outcome {
            Ok(Ok(_)) => true,
            Ok(Err(_)) => false,
            Err(_) => {
                error!(worker = id, %peer, "handler panicked; worker continues");
                false
            }
        };
        stats.exit(id, ok);
    }
    debug!(worker = id, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ImageBuffer;
    use crate::format::{ImageCodec, ImageFormat, RasterCodec};
    use crate::frame::{MAX_FRAME_SIZE, read_frame, write_frame};
    use crate::handler::HandlerConfig;
    use tokio::io::DuplexStream;

    fn pool() -> WorkerPool<DuplexStream> {
        let handler =
            ConnectionHandler::new(Arc::new(RasterCodec::default()), HandlerConfig::default());
        WorkerPool::start(handler)
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    #[tokio::test]
    async fn serves_queued_connections() {
        let pool = pool();
        let image = RasterCodec::default()
            .encode(&ImageBuffer::filled(3, 3, [9, 9, 9, 9]).unwrap(), ImageFormat::Png.into())
            .unwrap();

        let mut clients = Vec::new();
        for _ in 0..10 {
            let (client, server) = tokio::io::duplex(16 * 1024);
            pool.dispatch(server, peer()).unwrap();
            clients.push(client);
        }

        for mut client in clients {
            write_frame(&mut client, b"blur:1").await.unwrap();
            write_frame(&mut client, &image).await.unwrap();
            let reply = read_frame(&mut client, MAX_FRAME_SIZE).await.unwrap();
            assert!(!reply.is_empty());
        }

        let stats = pool.stats();
        pool.shutdown().await;
        assert_eq!(stats.completed(), 10);
        assert_eq!(stats.failed(), 0);
        assert!(stats.max_peak() <= 1);
        let served: u64 = (0..stats.worker_count()).map(|id| stats.served(id)).sum();
        assert_eq!(served, 10);
    }

    #[tokio::test]
    async fn failures_do_not_stop_workers() {
        let pool = pool();

        for _ in 0..WORKER_COUNT * 2 {
            let (mut client, server) = tokio::io::duplex(1024);
            pool.dispatch(server, peer()).unwrap();
            write_frame(&mut client, b"nonsense").await.unwrap();
        }

        let (mut client, server) = tokio::io::duplex(16 * 1024);
        pool.dispatch(server, peer()).unwrap();
        let image = RasterCodec::default()
            .encode(&ImageBuffer::filled(1, 1, [0; 4]).unwrap(), ImageFormat::Png.into())
            .unwrap();
        write_frame(&mut client, b"contrast:2").await.unwrap();
        write_frame(&mut client, &image).await.unwrap();
        assert!(read_frame(&mut client, MAX_FRAME_SIZE).await.is_ok());

        let stats = pool.stats();
        pool.shutdown().await;
        assert_eq!(stats.failed(), (WORKER_COUNT * 2) as u64);
        assert_eq!(stats.completed(), 1);
    }
}
