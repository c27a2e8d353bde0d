//! Worker pool sobre tokio que consume la cola y entrega travelers.
//!
//! Cada entrega corre en `spawn_blocking` (el core y el executor SSH son
//! síncronos). Un semáforo limita las entregas simultáneas. El pool se
//! detiene cuando la fuente se cierra o cuando pasa `idle_timeout` sin
//! payloads nuevos y sin entregas en vuelo.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pipeflow_core::{deliver, PipelineError, QueueTransport, Result, TravelOutcome, TravelerContext};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

/// Cola respaldada por un canal mpsc sin límite.
#[derive(Clone)]
pub struct ChannelQueue {
    sender: UnboundedSender<String>,
}

impl ChannelQueue {
    /// Crea la cola y el receptor que consume el `WorkerPool`.
    pub fn unbounded() -> (Self, UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl QueueTransport for ChannelQueue {
    fn enqueue(&self, payload: String) -> Result<()> {
        self.sender
            .send(payload)
            .map_err(|_| PipelineError::Queue("channel closed".into()))
    }
}

/// Origen de payloads para el pool.
#[async_trait]
pub trait DeliverySource: Send {
    /// `None` cuando la fuente quedó cerrada definitivamente.
    async fn next_delivery(&mut self) -> Option<String>;
}

#[async_trait]
impl DeliverySource for UnboundedReceiver<String> {
    async fn next_delivery(&mut self) -> Option<String> {
        self.recv().await
    }
}

#[derive(Debug, Default)]
pub struct WorkerReport {
    pub delivered: usize,
    pub continued: usize,
    pub finished_branches: usize,
    pub failures: Vec<PipelineError>,
}

pub struct WorkerPool {
    ctx: TravelerContext,
    workers: usize,
    idle_timeout: Duration,
}

impl WorkerPool {
    pub fn new(ctx: TravelerContext, workers: usize, idle_timeout: Duration) -> Self {
        Self { ctx,
               workers: workers.max(1),
               idle_timeout }
    }

    fn record(report: &mut WorkerReport, joined: std::result::Result<Result<TravelOutcome>, JoinError>) {
        match joined {
            Ok(Ok(TravelOutcome::Finished { pipeline_closed })) => {
                report.finished_branches += 1;
                if pipeline_closed {
                    info!("worker: pipeline closed");
                }
            }
            Ok(Ok(TravelOutcome::Continued { continuations })) => {
                report.continued += 1;
                debug!("worker: {} continuation(s) enqueued", continuations.len());
            }
            // Sin reintentos: la falla queda en el log y en el reporte.
            Ok(Err(e)) => {
                warn!("worker: delivery failed err={e}");
                report.failures.push(e);
            }
            Err(e) => {
                warn!("worker: delivery task aborted err={e}");
                report.failures.push(PipelineError::Internal(format!("delivery task: {e}")));
            }
        }
    }

    /// Consume `source` hasta que se cierre o quede ociosa.
    pub async fn run<S: DeliverySource>(&self, source: &mut S) -> WorkerReport {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks: JoinSet<Result<TravelOutcome>> = JoinSet::new();
        let mut report = WorkerReport::default();

        loop {
            match tokio::time::timeout(self.idle_timeout, source.next_delivery()).await {
                Ok(Some(payload)) => {
                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(p) => p,
                        Err(e) => {
                            warn!("worker: semaphore closed err={e}");
                            break;
                        }
                    };
                    let ctx = self.ctx.clone();
                    report.delivered += 1;
                    tasks.spawn_blocking(move || {
                             let _permit = permit;
                             deliver(&ctx, &payload)
                         });
                }
                Ok(None) => break,
                Err(_) if tasks.is_empty() => {
                    debug!("worker: idle for {:?}, stopping", self.idle_timeout);
                    break;
                }
                // Hay entregas en vuelo que pueden encolar más trabajo.
                Err(_) => {
                    if let Some(joined) = tasks.join_next().await {
                        Self::record(&mut report, joined);
                    }
                }
            }
        }
        while let Some(joined) = tasks.join_next().await {
            Self::record(&mut report, joined);
        }
        info!("worker: done delivered={} continued={} finished={} failures={}",
              report.delivered,
              report.continued,
              report.finished_branches,
              report.failures.len());
        report
    }
}
