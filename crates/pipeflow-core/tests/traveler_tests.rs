use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pipeflow_core::{drain, entry_codes, Action, Bag, BagValue, Entity, EntityKind, EntityStore, Host,
                    InMemoryEntityStore, InMemoryProgressLedger, InMemoryQueue, Pipe, PipeFactory, PipeIdentifier,
                    PipelineError, ProgressEntryKind, ProgressLedger, Stream, TravelOutcome, Traveler, TravelerContext,
                    TravelerSnapshot};
use serde_json::json;

/// Pipe de prueba sobre Actions: anota su visita en el Bag y devuelve los
/// sucesores de `action.next` cargados del store.
struct VisitPipe {
    action: Action,
    store: Arc<dyn EntityStore>,
    runs: Arc<AtomicUsize>,
    stream: Option<Stream>,
}

impl Pipe for VisitPipe {
    fn identifier(&self) -> PipeIdentifier {
        PipeIdentifier::new(EntityKind::Action, self.action.id)
    }

    fn set_stream(&mut self, stream: &Stream) {
        self.stream = Some(stream.clone());
    }

    fn flow_through(&mut self, bag: &mut Bag) -> pipeflow_core::Result<Vec<Entity>> {
        assert!(self.stream.is_some(), "stream must be bound before flow_through");
        self.runs.fetch_add(1, Ordering::SeqCst);
        bag.put(format!("visited.{}", self.action.id), true);
        bag.put("last_action", Entity::Action(self.action.clone()));
        self.action
            .next
            .iter()
            .map(|r| self.store.load(r))
            .collect()
    }
}

struct Harness {
    store: Arc<InMemoryEntityStore>,
    ledger: Arc<InMemoryProgressLedger>,
    queue: Arc<InMemoryQueue>,
    runs: Arc<AtomicUsize>,
    ctx: TravelerContext,
    stream: Stream,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryEntityStore::new());
    let ledger = Arc::new(InMemoryProgressLedger::new());
    let queue = Arc::new(InMemoryQueue::new());
    let runs = Arc::new(AtomicUsize::new(0));

    let dyn_store: Arc<dyn EntityStore> = store.clone();
    let mut factory = PipeFactory::new(Arc::clone(&dyn_store));
    let pipe_store = Arc::clone(&dyn_store);
    let pipe_runs = Arc::clone(&runs);
    factory.register(EntityKind::Action, move |entity| match entity {
               Entity::Action(action) => Ok(Box::new(VisitPipe { action,
                                                                 store: Arc::clone(&pipe_store),
                                                                 runs: Arc::clone(&pipe_runs),
                                                                 stream: None }) as Box<dyn Pipe>),
               other => Err(PipelineError::Internal(format!("unexpected {}", other.kind()))),
           });

    let stream = Stream::new("deploy");
    store.save(Entity::Stream(stream.clone())).unwrap();

    let ctx = TravelerContext::new(dyn_store, ledger.clone(), Arc::new(factory), queue.clone());
    Harness { store,
              ledger,
              queue,
              runs,
              ctx,
              stream }
}

impl Harness {
    fn save_action(&self, action: Action) -> Action {
        self.store.save(Entity::Action(action.clone())).unwrap();
        action
    }

    fn pipe(&self, action: &Action) -> Box<dyn Pipe> {
        self.ctx
            .factory
            .make(Entity::Action(action.clone()))
            .unwrap()
            .expect("action pipe registered")
    }

    fn codes(&self, traveler: &Traveler) -> Vec<&'static str> {
        entry_codes(&self.ledger.list(traveler.progress().id).unwrap())
    }
}

#[test]
fn terminal_step_records_one_pipeline_end_and_enqueues_nothing() {
    let h = harness();
    let leaf = h.save_action(Action::new(h.stream.id));
    let mut traveler = Traveler::new(h.ctx.clone(), h.stream.clone()).unwrap();

    let outcome = traveler.travel(h.pipe(&leaf)).unwrap();

    assert_eq!(outcome, TravelOutcome::Finished { pipeline_closed: true });
    assert!(h.queue.is_empty().unwrap());
    let entries = h.ledger.list(traveler.progress().id).unwrap();
    let ends = entries.iter()
                      .filter(|e| e.kind == ProgressEntryKind::PipelineEnded)
                      .count();
    assert_eq!(ends, 1);
    assert_eq!(h.codes(&traveler), vec!["I", "S", "B", "C"]);
}

#[test]
fn fan_out_enqueues_one_independent_continuation_per_successor() {
    let h = harness();
    let b = h.save_action(Action::new(h.stream.id));
    let c = h.save_action(Action::new(h.stream.id));
    let d = h.save_action(Action::new(h.stream.id));
    let a = h.save_action(Action::new(h.stream.id).then(Entity::Action(b.clone()).reference())
                                                  .then(Entity::Action(c.clone()).reference())
                                                  .then(Entity::Action(d.clone()).reference()));
    let mut traveler = Traveler::new(h.ctx.clone(), h.stream.clone()).unwrap();
    traveler.bag.put("release", "v2");

    let outcome = traveler.travel(h.pipe(&a)).unwrap();

    let expected: Vec<PipeIdentifier> = [&b, &c, &d].iter()
                                                    .map(|x| PipeIdentifier::new(EntityKind::Action, x.id))
                                                    .collect();
    assert_eq!(outcome, TravelOutcome::Continued { continuations: expected.clone() });

    let snapshots = h.queue.peek_snapshots().unwrap();
    assert_eq!(snapshots.len(), 3);
    let first = &snapshots[0];
    for snap in &snapshots {
        assert_eq!(snap.bag, first.bag);
        assert_eq!(snap.previous_pipes, vec![PipeIdentifier::new(EntityKind::Action, a.id)]);
        assert_eq!(snap.progress, traveler.progress().reference());
    }
    let nexts: Vec<PipeIdentifier> = snapshots.iter().map(|s| s.next_pipe).collect();
    assert_eq!(nexts, expected);

    // Las entidades del Bag viajan como referencias en tránsito.
    assert!(matches!(first.bag.get("last_action").and_then(BagValue::in_transit), Some(r) if r.id == a.id));
    assert_eq!(first.bag.get("release").and_then(BagValue::as_str), Some("v2"));
    assert_eq!(h.codes(&traveler), vec!["I", "S", "E", "E", "E"]);
}

#[test]
fn unregistered_successor_is_dropped_while_siblings_continue() {
    let h = harness();
    let host = Host::new("10.1.1.1");
    h.store.save(Entity::Host(host.clone())).unwrap();
    let b = h.save_action(Action::new(h.stream.id));
    let a = h.save_action(Action::new(h.stream.id).then(Entity::Host(host).reference())
                                                  .then(Entity::Action(b.clone()).reference()));
    let mut traveler = Traveler::new(h.ctx.clone(), h.stream.clone()).unwrap();

    let outcome = traveler.travel(h.pipe(&a)).unwrap();

    assert_eq!(outcome,
               TravelOutcome::Continued { continuations: vec![PipeIdentifier::new(EntityKind::Action, b.id)] });
    assert_eq!(h.queue.len().unwrap(), 1);
}

#[test]
fn only_unregistered_successors_terminate_the_branch() {
    let h = harness();
    let host = Host::new("10.1.1.2");
    h.store.save(Entity::Host(host.clone())).unwrap();
    let a = h.save_action(Action::new(h.stream.id).then(Entity::Host(host).reference()));
    let mut traveler = Traveler::new(h.ctx.clone(), h.stream.clone()).unwrap();

    let outcome = traveler.travel(h.pipe(&a)).unwrap();

    assert_eq!(outcome, TravelOutcome::Finished { pipeline_closed: true });
    assert!(h.queue.is_empty().unwrap());
}

#[test]
fn queued_run_drains_to_completion_with_growing_history() {
    let h = harness();
    let d = h.save_action(Action::new(h.stream.id));
    let b = h.save_action(Action::new(h.stream.id).then(Entity::Action(d.clone()).reference()));
    let c = h.save_action(Action::new(h.stream.id));
    let a = h.save_action(Action::new(h.stream.id).then(Entity::Action(b.clone()).reference())
                                                  .then(Entity::Action(c.clone()).reference()));

    let mut traveler = Traveler::new(h.ctx.clone(), h.stream.clone()).unwrap();
    traveler.queue_travel(h.pipe(&a)).unwrap();

    // Primera entrega: a -> (b, c).
    let first = h.queue.pop().unwrap().unwrap();
    pipeflow_core::deliver(&h.ctx, &first).unwrap();
    let pending = h.queue.peek_snapshots().unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|s| s.previous_pipes.len() == 1));

    let report = drain(&h.ctx, &h.queue, 100).unwrap();
    assert_eq!(report.delivered, 3); // b, c, d
    assert_eq!(report.finished_branches, 2); // c, d
    assert!(report.failures.is_empty());
    assert_eq!(h.runs.load(Ordering::SeqCst), 4);

    let entries = h.ledger.list(traveler.progress().id).unwrap();
    let closes = entries.iter()
                        .filter(|e| e.kind == ProgressEntryKind::PipelineEnded)
                        .count();
    let branch_ends = entries.iter()
                             .filter(|e| matches!(e.kind, ProgressEntryKind::BranchEnded { .. }))
                             .count();
    assert_eq!(closes, 1, "completion is recorded once per lineage");
    assert_eq!(branch_ends, 2);
}

#[test]
fn restore_reloads_progress_and_rebuilds_pipes() {
    let h = harness();
    let b = h.save_action(Action::new(h.stream.id));
    let a = h.save_action(Action::new(h.stream.id).then(Entity::Action(b.clone()).reference()));
    let mut traveler = Traveler::new(h.ctx.clone(), h.stream.clone()).unwrap();
    traveler.bag.put("ticket", json!({"id": 42}));
    traveler.travel(h.pipe(&a)).unwrap();

    let snapshot = h.queue.peek_snapshots().unwrap().remove(0);
    let restored = Traveler::restore(h.ctx.clone(), snapshot).unwrap();

    assert_eq!(restored.progress(), traveler.progress());
    assert_eq!(restored.stream(), &h.stream);
    assert_eq!(restored.previous_pipes(), vec![PipeIdentifier::new(EntityKind::Action, a.id)]);
    assert_eq!(restored.next_pipe(), Some(PipeIdentifier::new(EntityKind::Action, b.id)));
    assert_eq!(restored.bag, traveler.bag);
}

#[test]
fn delivery_of_deleted_next_pipe_fails_with_dangling_identifier() {
    let h = harness();
    let b = h.save_action(Action::new(h.stream.id));
    let a = h.save_action(Action::new(h.stream.id).then(Entity::Action(b.clone()).reference()));
    let mut traveler = Traveler::new(h.ctx.clone(), h.stream.clone()).unwrap();
    traveler.travel(h.pipe(&a)).unwrap();

    let b_ref = Entity::Action(b).reference();
    h.store.delete(&b_ref).unwrap();

    let payload = h.queue.pop().unwrap().unwrap();
    let err = pipeflow_core::deliver(&h.ctx, &payload).unwrap_err();
    assert_eq!(err, PipelineError::DanglingIdentifier(b_ref));
}

#[test]
fn redelivering_a_snapshot_runs_the_step_twice() {
    // Comportamiento actual: no hay de-duplicación de entregas.
    let h = harness();
    let c = h.save_action(Action::new(h.stream.id));
    let b = h.save_action(Action::new(h.stream.id).then(Entity::Action(c.clone()).reference()));
    let a = h.save_action(Action::new(h.stream.id).then(Entity::Action(b.clone()).reference()));
    let mut traveler = Traveler::new(h.ctx.clone(), h.stream.clone()).unwrap();
    traveler.travel(h.pipe(&a)).unwrap();

    let payload = h.queue.pop().unwrap().unwrap();
    pipeflow_core::deliver(&h.ctx, &payload).unwrap();
    pipeflow_core::deliver(&h.ctx, &payload).unwrap();

    let b_id = PipeIdentifier::new(EntityKind::Action, b.id);
    let entries = h.ledger.list(traveler.progress().id).unwrap();
    let b_starts = entries.iter()
                          .filter(|e| e.kind == ProgressEntryKind::PipeStarted { pipe: b_id })
                          .count();
    let b_ends = entries.iter()
                        .filter(|e| matches!(e.kind, ProgressEntryKind::PipeEnded { pipe, .. } if pipe == b_id))
                        .count();
    assert_eq!(b_starts, 2);
    assert_eq!(b_ends, 2);
    assert_eq!(h.runs.load(Ordering::SeqCst), 3); // a una vez, b dos veces
    assert_eq!(h.queue.len().unwrap(), 2); // dos continuaciones hacia c
}

#[test]
fn untransportable_bag_entry_fails_before_enqueue() {
    let h = harness();
    let b = h.save_action(Action::new(h.stream.id));
    let a = h.save_action(Action::new(h.stream.id).then(Entity::Action(b.clone()).reference()));
    let mut traveler = Traveler::new(h.ctx.clone(), h.stream.clone()).unwrap();
    traveler.bag.put("socket", BagValue::handle(Arc::new(7_u32)));

    let err = traveler.travel(h.pipe(&a)).unwrap_err();

    assert!(matches!(err, PipelineError::TransportSerialization(_)));
    assert!(h.queue.is_empty().unwrap());
    assert_eq!(h.codes(&traveler), vec!["I", "S"]);
}

#[test]
fn resume_without_next_pipe_is_an_error() {
    let h = harness();
    let mut traveler = Traveler::new(h.ctx.clone(), h.stream.clone()).unwrap();
    assert_eq!(traveler.resume().unwrap_err(), PipelineError::MissingNextPipe);
    assert_eq!(traveler.snapshot().unwrap_err(), PipelineError::MissingNextPipe);
}

#[test]
fn snapshot_of_queued_traveler_carries_references_only() {
    let h = harness();
    let a = h.save_action(Action::new(h.stream.id));
    let mut traveler = Traveler::new(h.ctx.clone(), h.stream.clone()).unwrap();
    traveler.bag.put("stream", Entity::Stream(h.stream.clone()));
    traveler.queue_travel(h.pipe(&a)).unwrap();

    let snapshot: TravelerSnapshot = traveler.snapshot().unwrap();
    assert_eq!(snapshot.next_pipe, PipeIdentifier::new(EntityKind::Action, a.id));
    assert!(snapshot.previous_pipes.is_empty());
    assert!(matches!(snapshot.bag.get("stream"), Some(BagValue::Transported(_))));
    // El Traveler en sí no cambia su Bag al tomar el snapshot.
    assert!(matches!(traveler.bag.get("stream"), Some(BagValue::Entity(_))));
}
