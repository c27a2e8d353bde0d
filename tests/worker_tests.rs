use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pipeflow::{ChannelQueue, Fixture, FixtureCommand, WorkerPool};
use pipeflow_core::{entry_codes, Action, Bag, Entity, EntityKind, EntityStore, InMemoryEntityStore,
                    InMemoryProgressLedger, Pipe, PipeFactory, PipeIdentifier, PipelineError, ProgressEntryKind,
                    ProgressLedger, QueueTransport, Stream, TravelOutcome, Traveler, TravelerContext};

struct CountingPipe {
    action: Action,
    store: Arc<dyn EntityStore>,
    runs: Arc<AtomicUsize>,
}

impl Pipe for CountingPipe {
    fn identifier(&self) -> PipeIdentifier {
        PipeIdentifier::new(EntityKind::Action, self.action.id)
    }

    fn set_stream(&mut self, _stream: &Stream) {}

    fn flow_through(&mut self, bag: &mut Bag) -> pipeflow_core::Result<Vec<Entity>> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        bag.put(format!("visited.{}", self.action.id), true);
        self.action.next.iter().map(|r| self.store.load(r)).collect()
    }
}

struct Setup {
    store: Arc<InMemoryEntityStore>,
    ledger: Arc<InMemoryProgressLedger>,
    runs: Arc<AtomicUsize>,
    ctx: TravelerContext,
    receiver: tokio::sync::mpsc::UnboundedReceiver<String>,
}

fn setup() -> Setup {
    let store = Arc::new(InMemoryEntityStore::new());
    let ledger = Arc::new(InMemoryProgressLedger::new());
    let runs = Arc::new(AtomicUsize::new(0));
    let (queue, receiver) = ChannelQueue::unbounded();

    let dyn_store: Arc<dyn EntityStore> = store.clone();
    let mut factory = PipeFactory::new(dyn_store.clone());
    let (pipe_store, pipe_runs) = (dyn_store.clone(), runs.clone());
    factory.register(EntityKind::Action, move |entity| match entity {
               Entity::Action(action) => Ok(Box::new(CountingPipe { action,
                                                                    store: pipe_store.clone(),
                                                                    runs: pipe_runs.clone() })
                                            as Box<dyn Pipe>),
               other => Err(PipelineError::Internal(format!("unexpected {}", other.kind()))),
           });
    let ctx = TravelerContext::new(dyn_store, ledger.clone(), Arc::new(factory), Arc::new(queue));
    Setup { store,
            ledger,
            runs,
            ctx,
            receiver }
}

/// a -> (b, c), b -> d
fn diamond(s: &Setup) -> (Stream, Action) {
    let stream = Stream::new("pool");
    s.store.save(Entity::Stream(stream.clone())).unwrap();
    let d = Action::new(stream.id);
    let c = Action::new(stream.id);
    let b = Action::new(stream.id).then(Entity::Action(d.clone()).reference());
    let a = Action::new(stream.id).then(Entity::Action(b.clone()).reference())
                                  .then(Entity::Action(c.clone()).reference());
    for action in [&a, &b, &c, &d] {
        s.store.save(Entity::Action(action.clone())).unwrap();
    }
    (stream, a)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pool_drains_fan_out_until_idle() {
    let mut s = setup();
    let (stream, a) = diamond(&s);

    let mut traveler = Traveler::new(s.ctx.clone(), stream).unwrap();
    let pipe = s.ctx.factory.make(Entity::Action(a)).unwrap().unwrap();
    let outcome = traveler.travel(pipe).unwrap();
    assert!(matches!(outcome, TravelOutcome::Continued { ref continuations } if continuations.len() == 2));

    let pool = WorkerPool::new(s.ctx.clone(), 4, Duration::from_millis(200));
    let report = pool.run(&mut s.receiver).await;

    assert_eq!(report.delivered, 3);
    assert_eq!(report.continued, 1);
    assert_eq!(report.finished_branches, 2);
    assert!(report.failures.is_empty());
    assert_eq!(s.runs.load(Ordering::SeqCst), 4);

    let entries = s.ledger.list(traveler.progress().id).unwrap();
    let closes = entries.iter().filter(|e| e.kind == ProgressEntryKind::PipelineEnded).count();
    assert_eq!(closes, 1);
    assert_eq!(entry_codes(&entries).iter().filter(|c| **c == "B").count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn launched_fixture_crosses_the_queue_before_its_first_step() {
    let mut s = setup();
    let (stream, a) = diamond(&s);
    // El diamante ya está en el store; el fixture sólo apunta a la entrada.
    let fixture = Fixture { stream,
                            entities: Vec::new(),
                            commands: Vec::new(),
                            entry: Entity::Action(a).reference() };

    let progress = fixture.launch(&s.ctx).unwrap();
    assert_eq!(s.runs.load(Ordering::SeqCst), 0);
    assert_eq!(entry_codes(&s.ledger.list(progress.id).unwrap()), vec!["I"]);

    let report = WorkerPool::new(s.ctx.clone(), 2, Duration::from_millis(200)).run(&mut s.receiver).await;
    assert_eq!(report.delivered, 4);
    assert_eq!(report.continued, 2);
    assert_eq!(report.finished_branches, 2);
    assert!(report.failures.is_empty());
    assert_eq!(s.runs.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn idle_pool_stops_without_deliveries() {
    let mut s = setup();
    let pool = WorkerPool::new(s.ctx.clone(), 2, Duration::from_millis(30));
    let report = pool.run(&mut s.receiver).await;
    assert_eq!(report.delivered, 0);
    assert!(report.failures.is_empty());
}

#[test]
fn failed_delivery_is_counted_and_not_retried() {
    let mut s = setup();
    s.ctx.queue.enqueue("{not a snapshot".to_string()).unwrap();
    let pool = WorkerPool::new(s.ctx.clone(), 1, Duration::from_millis(30));
    let report = tokio_test::block_on(pool.run(&mut s.receiver));
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0], PipelineError::TransportSerialization(_)));
    assert_eq!(s.runs.load(Ordering::SeqCst), 0);
}

#[test]
fn channel_queue_fails_once_receiver_is_gone() {
    let (queue, receiver) = ChannelQueue::unbounded();
    drop(receiver);
    assert!(matches!(queue.enqueue("x".into()), Err(PipelineError::Queue(_))));
}

#[test]
fn fixture_seeds_store_and_resolves_entry() {
    let store = InMemoryEntityStore::new();
    let stream = Stream::new("fixture");
    let action = Action::new(stream.id);
    let fixture = Fixture { stream: stream.clone(),
                            entities: vec![Entity::Action(action.clone())],
                            commands: vec![FixtureCommand { action_id: action.id,
                                                            command: "ls".into() },
                                           FixtureCommand { action_id: action.id,
                                                            command: "pwd".into() }],
                            entry: Entity::Action(action.clone()).reference() };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flow.json");
    std::fs::write(&path, serde_json::to_string_pretty(&fixture).unwrap()).unwrap();

    let loaded = Fixture::from_path(&path).unwrap();
    let entry = loaded.seed(&store).unwrap();
    assert_eq!(entry, Entity::Action(action.clone()));
    let commands: Vec<_> = store.commands_for(action.id).unwrap().into_iter().map(|c| c.command).collect();
    assert_eq!(commands, vec!["ls", "pwd"]);
    assert!(matches!(store.load(&Entity::Stream(stream).reference()), Ok(Entity::Stream(_))));
}

#[test]
fn missing_fixture_file_is_an_error() {
    let err = Fixture::from_path(std::path::Path::new("/nonexistent/flow.json")).unwrap_err();
    assert!(matches!(err, PipelineError::Internal(_)));
}

#[test]
fn bundled_demo_fixture_parses_and_seeds() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/deploy.json");
    let fixture = Fixture::from_path(&path).unwrap();
    let store = InMemoryEntityStore::new();
    let entry = fixture.seed(&store).unwrap();
    let Entity::Action(action) = entry else { panic!("entry must be an action") };
    assert_eq!(action.next.len(), 2);
    let bundle = store.load_action_bundle(action.id).unwrap();
    assert!(bundle.host.is_some());
    assert!(bundle.auth.is_some());
    assert_eq!(bundle.commands.len(), 2);
}
