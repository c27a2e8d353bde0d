//! Implementación del Traveler.
//!
//! Cada entrega de la cola procesa exactamente un pipe: lo ejecuta, resuelve
//! sus sucesores y produce una continuación independiente por cada uno. Sin
//! sucesores resolubles la rama termina.

use log::{debug, info};

use super::{TravelerContext, TravelerSnapshot};
use crate::bag::Bag;
use crate::errors::{PipelineError, Result};
use crate::model::{Entity, EntityKind, EntityRef, Stream};
use crate::pipe::{Pipe, PipeIdentifier};
use crate::progress::TravelerProgress;

/// Resultado de procesar un pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TravelOutcome {
    /// La rama terminó. `pipeline_closed` es `true` sólo si esta rama
    /// escribió el `PipelineEnded` del linaje.
    Finished { pipeline_closed: bool },
    /// Se encolaron continuaciones, una por sucesor, en este orden.
    Continued { continuations: Vec<PipeIdentifier> },
}

/// Unidad de traversal que cruza la cola entre pasos.
pub struct Traveler {
    ctx: TravelerContext,
    pub bag: Bag,
    previous_pipes: Vec<Box<dyn Pipe>>,
    next_pipe: Option<Box<dyn Pipe>>,
    progress: TravelerProgress,
    stream: Stream,
}

impl Traveler {
    /// Crea un Traveler para el Stream con Bag vacío y una fila de progreso
    /// nueva. Esa fila es la única del linaje, incluidas todas sus ramas.
    pub fn new(ctx: TravelerContext, stream: Stream) -> Result<Self> {
        let progress = ctx.ledger.create(stream.id)?;
        info!("traveler:new stream={} progress={}", stream.id, progress.id);
        Ok(Self { ctx,
                  bag: Bag::new(),
                  previous_pipes: Vec::new(),
                  next_pipe: None,
                  progress,
                  stream })
    }

    pub fn progress(&self) -> &TravelerProgress {
        &self.progress
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    pub fn previous_pipes(&self) -> Vec<PipeIdentifier> {
        self.previous_pipes.iter().map(|p| p.identifier()).collect()
    }

    pub fn next_pipe(&self) -> Option<PipeIdentifier> {
        self.next_pipe.as_ref().map(|p| p.identifier())
    }

    /// Manda al Traveler por un pipe.
    pub fn travel(&mut self, mut pipe: Box<dyn Pipe>) -> Result<TravelOutcome> {
        let current = pipe.identifier();
        pipe.set_stream(&self.stream);
        self.ctx.ledger.start_of_pipe(&self.progress, &current)?;

        let successors = pipe.flow_through(&mut self.bag)?;
        let pipes = self.resolve(successors)?;
        self.next_pipe = None;

        if pipes.is_empty() {
            self.ctx.ledger.end_of_branch(&self.progress, &current)?;
            let closed = self.ctx.ledger.end_of_pipeline(&self.progress)?.is_some();
            info!("traveler:finished progress={} pipe={} pipeline_closed={}",
                  self.progress.id, current, closed);
            return Ok(TravelOutcome::Finished { pipeline_closed: closed });
        }

        self.previous_pipes.push(pipe);

        // Cada continuación es un valor inmutable armado antes de tocar la
        // cola; un error de serialización sale aquí sin haber encolado nada.
        let mut bag = self.bag.clone();
        bag.prepare_for_transport()?;
        let history = self.previous_pipes();
        let mut continuations = Vec::with_capacity(pipes.len());
        for next in &pipes {
            let snapshot = TravelerSnapshot::new(bag.clone(),
                                                 history.clone(),
                                                 next.identifier(),
                                                 self.progress.reference());
            continuations.push((next.identifier(), snapshot.encode()?));
        }

        let mut dispatched = Vec::with_capacity(continuations.len());
        for (next, payload) in continuations {
            self.ctx.ledger.end_of_pipe(&self.progress, &current, &next)?;
            self.ctx.queue.enqueue(payload)?;
            debug!("traveler:dispatched progress={} from={} next={}", self.progress.id, current, next);
            dispatched.push(next);
        }
        Ok(TravelOutcome::Continued { continuations: dispatched })
    }

    /// Fija el próximo pipe y encola el Traveler. Es el punto de entrada del
    /// disparador externo que arranca una corrida.
    pub fn queue_travel(&mut self, next: Box<dyn Pipe>) -> Result<PipeIdentifier> {
        let id = next.identifier();
        self.next_pipe = Some(next);
        let payload = self.snapshot()?.encode()?;
        self.ctx.queue.enqueue(payload)?;
        debug!("traveler:queued progress={} next={}", self.progress.id, id);
        Ok(id)
    }

    /// Punto de entrada de la entrega: procesa el próximo pipe guardado.
    pub fn resume(&mut self) -> Result<TravelOutcome> {
        let pipe = self.next_pipe.take().ok_or(PipelineError::MissingNextPipe)?;
        self.travel(pipe)
    }

    /// Representación transportable del estado actual.
    pub fn snapshot(&self) -> Result<TravelerSnapshot> {
        let next = self.next_pipe().ok_or(PipelineError::MissingNextPipe)?;
        let mut bag = self.bag.clone();
        bag.prepare_for_transport()?;
        Ok(TravelerSnapshot::new(bag, self.previous_pipes(), next, self.progress.reference()))
    }

    /// Inverso de `snapshot`: rehidrata el Bag, reconstruye cada pipe con el
    /// factory y relee la fila de progreso del ledger.
    pub fn restore(ctx: TravelerContext, snapshot: TravelerSnapshot) -> Result<Self> {
        snapshot.validate()?;
        let TravelerSnapshot { mut bag,
                               previous_pipes,
                               next_pipe,
                               progress,
                               .. } = snapshot;

        bag.restore_after_transport(ctx.store.as_ref())?;
        let previous_pipes = previous_pipes.iter()
                                           .map(|id| ctx.factory.make_from_identifier(id))
                                           .collect::<Result<Vec<_>>>()?;
        let next_pipe = ctx.factory.make_from_identifier(&next_pipe)?;
        let progress = ctx.ledger.load(progress.id).map_err(PipelineError::into_dangling)?;
        let stream = match ctx.store
                              .load(&EntityRef::new(EntityKind::Stream, progress.stream_id))
                              .map_err(PipelineError::into_dangling)?
        {
            Entity::Stream(s) => s,
            other => return Err(PipelineError::Internal(format!("expected stream, got {}", other.kind()))),
        };

        Ok(Self { ctx,
                  bag,
                  previous_pipes,
                  next_pipe: Some(next_pipe),
                  progress,
                  stream })
    }

    fn resolve(&self, successors: Vec<Entity>) -> Result<Vec<Box<dyn Pipe>>> {
        let mut pipes = Vec::with_capacity(successors.len());
        for entity in successors {
            let reference = entity.reference();
            match self.ctx.factory.make(entity)? {
                Some(pipe) => pipes.push(pipe),
                None => debug!("traveler:dropped successor {reference} (no pipe registered)"),
            }
        }
        Ok(pipes)
    }
}

/// Handler de entrega de la cola: decodifica, restaura y reanuda.
pub fn deliver(ctx: &TravelerContext, payload: &str) -> Result<TravelOutcome> {
    let snapshot = TravelerSnapshot::decode(payload)?;
    let mut traveler = Traveler::restore(ctx.clone(), snapshot)?;
    traveler.resume()
}
