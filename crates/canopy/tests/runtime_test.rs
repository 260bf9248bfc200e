//! Integration tests driving workflow trees through the runner.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use canopy::worker::{from_stream, from_try_stream};
use canopy::{
  Action, ChannelObserver, EventHandler, RenderContext, RenderingAndSnapshot, RuntimeConfig,
  RuntimeError, Sink, SinkError, Snapshot, SnapshotError, Worker, WorkerStream,
  Workflow, WorkflowEvent, WorkflowHandle, WorkflowRunner, launch_workflow,
};
use canopy_snapshot::TreeSnapshot;
use futures::StreamExt;
use futures::stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

type Log = Arc<Mutex<Vec<String>>>;

async fn next<W: Workflow>(handle: &mut WorkflowHandle<W>) -> RenderingAndSnapshot<W::Rendering> {
  tokio::time::timeout(Duration::from_secs(5), handle.next_rendering())
    .await
    .expect("timed out waiting for a rendering")
    .expect("runner stopped")
}

fn increment(by: i32) -> Action<i32, String> {
  Action::new("increment", move |count| {
    *count += by;
    None
  })
}

/// Starts at its props and follows changes to them.
#[derive(Clone)]
struct Counter;

struct CounterRendering {
  count: i32,
  sink: Sink<i32, String>,
  on_add: EventHandler<i32>,
}

impl Workflow for Counter {
  type Props = i32;
  type State = i32;
  type Output = String;
  type Rendering = CounterRendering;

  fn initial_state(&self, props: &i32) -> i32 {
    *props
  }

  fn restore_state(&self, _props: &i32, snapshot: &Snapshot) -> Result<i32, SnapshotError> {
    snapshot.parse(|r| r.read_i32())
  }

  fn on_props_changed(&self, old: &i32, new: &i32, state: &mut i32) {
    *state += new - old;
  }

  fn render(
    &self,
    _props: &i32,
    state: &i32,
    ctx: &mut RenderContext<'_, Self>,
  ) -> Result<CounterRendering, RuntimeError> {
    Ok(CounterRendering {
      count: *state,
      sink: ctx.action_sink(),
      on_add: ctx.on_event(increment),
    })
  }

  fn snapshot_state(&self, state: &i32) -> Snapshot {
    Snapshot::of_i32(*state)
  }
}

/// A keyed child that records its teardown.
#[derive(Clone)]
struct Item {
  teardowns: Log,
}

struct ItemRendering {
  key: String,
  count: i32,
  sink: Sink<i32, String>,
}

impl Workflow for Item {
  type Props = String;
  type State = i32;
  type Output = String;
  type Rendering = ItemRendering;

  fn initial_state(&self, _props: &String) -> i32 {
    0
  }

  fn restore_state(&self, _props: &String, snapshot: &Snapshot) -> Result<i32, SnapshotError> {
    snapshot.parse(|r| r.read_i32())
  }

  fn render(
    &self,
    props: &String,
    state: &i32,
    ctx: &mut RenderContext<'_, Self>,
  ) -> Result<ItemRendering, RuntimeError> {
    let teardowns = self.teardowns.clone();
    let key = props.clone();
    ctx.on_teardown(move || teardowns.lock().unwrap().push(key));
    Ok(ItemRendering {
      key: props.clone(),
      count: *state,
      sink: ctx.action_sink(),
    })
  }

  fn snapshot_state(&self, state: &i32) -> Snapshot {
    Snapshot::of_i32(*state)
  }
}

/// Renders one `Item` per key in its props and collects their outputs.
#[derive(Clone)]
struct List {
  item: Item,
}

struct ListRendering {
  items: Vec<ItemRendering>,
  received: Vec<String>,
}

impl Workflow for List {
  type Props = Vec<&'static str>;
  type State = Vec<String>;
  type Output = String;
  type Rendering = ListRendering;

  fn initial_state(&self, _props: &Vec<&'static str>) -> Vec<String> {
    Vec::new()
  }

  fn render(
    &self,
    props: &Vec<&'static str>,
    state: &Vec<String>,
    ctx: &mut RenderContext<'_, Self>,
  ) -> Result<ListRendering, RuntimeError> {
    let items = props
      .iter()
      .map(|key| {
        ctx.render_keyed_child(&self.item, key.to_string(), key, |output: String| {
          Action::new("child_output", move |received: &mut Vec<String>| {
            received.push(output.clone());
            Some(output)
          })
        })
      })
      .collect::<Result<Vec<_>, _>>()?;
    Ok(ListRendering {
      items,
      received: state.clone(),
    })
  }
}

fn list(teardowns: &Log) -> List {
  List {
    item: Item {
      teardowns: teardowns.clone(),
    },
  }
}

fn counts(rendering: &ListRendering) -> Vec<(&str, i32)> {
  rendering
    .items
    .iter()
    .map(|item| (item.key.as_str(), item.count))
    .collect()
}

#[tokio::test]
async fn test_second_send_in_one_generation_is_rejected() {
  let cancel = CancellationToken::new();
  let (mut handle, task) = launch_workflow(Counter, 0, None, RuntimeConfig::default(), cancel.clone());

  let first = next(&mut handle).await.rendering;
  assert_eq!(first.count, 0);
  first.sink.send(increment(1)).unwrap();
  let err = first.sink.send(increment(10)).unwrap_err();
  assert!(matches!(err, SinkError::AlreadyDelivered { .. }));

  let second = next(&mut handle).await.rendering;
  assert_eq!(second.count, 1);
  assert!(matches!(
    first.sink.send(increment(1)),
    Err(SinkError::Stale { .. })
  ));

  second.on_add.handle(2).unwrap();
  assert_eq!(next(&mut handle).await.rendering.count, 3);

  cancel.cancel();
  task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_outputs_follow_their_rendering() {
  let cancel = CancellationToken::new();
  let (mut handle, task) = launch_workflow(Counter, 7, None, RuntimeConfig::default(), cancel.clone());

  let first = next(&mut handle).await.rendering;
  first
    .sink
    .send(Action::new("report", |count: &mut i32| Some(format!("count={}", count))))
    .unwrap();

  assert_eq!(next(&mut handle).await.rendering.count, 7);
  assert_eq!(handle.next_output().await.as_deref(), Some("count=7"));

  cancel.cancel();
  task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_props_changes_reach_state() {
  let cancel = CancellationToken::new();
  let (mut handle, task) = launch_workflow(Counter, 1, None, RuntimeConfig::default(), cancel.clone());

  next(&mut handle).await.rendering.sink.send(increment(10)).unwrap();
  assert_eq!(next(&mut handle).await.rendering.count, 11);

  handle.send_props(5).await.unwrap();
  assert_eq!(next(&mut handle).await.rendering.count, 15);

  cancel.cancel();
  task.await.unwrap().unwrap();
}

#[derive(Clone)]
struct Eager;

impl Workflow for Eager {
  type Props = ();
  type State = ();
  type Output = ();
  type Rendering = Result<(), SinkError>;

  fn initial_state(&self, _props: &()) {}

  fn render(
    &self,
    _props: &(),
    _state: &(),
    ctx: &mut RenderContext<'_, Self>,
  ) -> Result<Result<(), SinkError>, RuntimeError> {
    Ok(ctx.action_sink().send(Action::noop()))
  }
}

#[tokio::test]
async fn test_sink_rejects_sends_during_render() {
  let cancel = CancellationToken::new();
  let (mut handle, task) = launch_workflow(Eager, (), None, RuntimeConfig::default(), cancel.clone());

  let rendering = next(&mut handle).await.rendering;
  assert_eq!(
    rendering,
    Err(SinkError::RenderInProgress {
      action: "noop".to_string()
    })
  );

  cancel.cancel();
  task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_children_keep_state_and_tear_down_once() {
  let teardowns = Log::default();
  let cancel = CancellationToken::new();
  let (mut handle, task) = launch_workflow(
    list(&teardowns),
    vec!["a", "b"],
    None,
    RuntimeConfig::default(),
    cancel.clone(),
  );

  let first = next(&mut handle).await.rendering;
  first.items[0].sink.send(increment(5)).unwrap();
  let second = next(&mut handle).await.rendering;
  assert_eq!(counts(&second), vec![("a", 5), ("b", 0)]);

  handle.send_props(vec!["b"]).await.unwrap();
  let third = next(&mut handle).await.rendering;
  assert_eq!(counts(&third), vec![("b", 0)]);
  assert_eq!(*teardowns.lock().unwrap(), vec!["a"]);
  assert!(matches!(
    second.items[0].sink.send(increment(1)),
    Err(SinkError::Closed { .. })
  ));

  handle.send_props(vec!["b", "a"]).await.unwrap();
  let fourth = next(&mut handle).await.rendering;
  assert_eq!(counts(&fourth), vec![("b", 0), ("a", 0)]);
  assert_eq!(*teardowns.lock().unwrap(), vec!["a"]);

  cancel.cancel();
  task.await.unwrap().unwrap();
  assert_eq!(*teardowns.lock().unwrap(), vec!["a", "b", "a"]);
}

#[tokio::test]
async fn test_child_output_becomes_parent_action() {
  let teardowns = Log::default();
  let cancel = CancellationToken::new();
  let (mut handle, task) = launch_workflow(
    list(&teardowns),
    vec!["a", "b"],
    None,
    RuntimeConfig::default(),
    cancel.clone(),
  );

  let first = next(&mut handle).await.rendering;
  first.items[1]
    .sink
    .send(Action::emit_output("from b".to_string()))
    .unwrap();

  let second = next(&mut handle).await.rendering;
  assert_eq!(second.received, vec!["from b"]);
  assert_eq!(handle.next_output().await.as_deref(), Some("from b"));

  cancel.cancel();
  task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_snapshot_restores_child_topology_and_state() {
  let teardowns = Log::default();
  let cancel = CancellationToken::new();
  let (mut handle, task) = launch_workflow(
    list(&teardowns),
    vec!["a", "b"],
    None,
    RuntimeConfig::default(),
    cancel.clone(),
  );

  next(&mut handle).await.rendering.items[0]
    .sink
    .send(increment(2))
    .unwrap();
  next(&mut handle).await.rendering.items[1]
    .sink
    .send(increment(3))
    .unwrap();
  next(&mut handle).await;
  handle.send_props(vec!["b", "c"]).await.unwrap();
  next(&mut handle).await.rendering.items[1]
    .sink
    .send(increment(4))
    .unwrap();
  let last = next(&mut handle).await;
  assert_eq!(counts(&last.rendering), vec![("b", 3), ("c", 4)]);
  cancel.cancel();
  task.await.unwrap().unwrap();

  let tree = TreeSnapshot::parse_recursive(&last.snapshot).unwrap();
  assert_eq!(tree.node_count(), 3);

  let cancel = CancellationToken::new();
  let (mut handle, task) = launch_workflow(
    list(&teardowns),
    vec!["b", "c"],
    Some(last.snapshot.clone()),
    RuntimeConfig::default(),
    cancel.clone(),
  );
  let restored = next(&mut handle).await;
  assert_eq!(counts(&restored.rendering), vec![("b", 3), ("c", 4)]);
  assert_eq!(restored.snapshot, last.snapshot);

  cancel.cancel();
  task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unclaimed_child_snapshots_are_dropped() {
  let teardowns = Log::default();
  let cancel = CancellationToken::new();
  let (mut handle, task) = launch_workflow(
    list(&teardowns),
    vec!["a"],
    None,
    RuntimeConfig::default(),
    cancel.clone(),
  );
  next(&mut handle).await.rendering.items[0]
    .sink
    .send(increment(9))
    .unwrap();
  let saved = next(&mut handle).await.snapshot;
  cancel.cancel();
  task.await.unwrap().unwrap();

  // "a" is not rendered by the first pass, so its snapshot is discarded.
  let cancel = CancellationToken::new();
  let (mut handle, task) = launch_workflow(
    list(&teardowns),
    Vec::new(),
    Some(saved),
    RuntimeConfig::default(),
    cancel.clone(),
  );
  next(&mut handle).await;
  handle.send_props(vec!["a"]).await.unwrap();
  assert_eq!(counts(&next(&mut handle).await.rendering), vec![("a", 0)]);

  cancel.cancel();
  task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_corrupt_snapshot_starts_fresh() {
  let (observer, mut events) = ChannelObserver::channel();
  let config = RuntimeConfig::default().with_observer(observer);
  let cancel = CancellationToken::new();
  let garbage = Snapshot::of_bytes(vec![0xff, 0xff, 0xff, 0xff, 1]);
  let (mut handle, task) = launch_workflow(Counter, 3, Some(garbage), config, cancel.clone());

  assert_eq!(next(&mut handle).await.rendering.count, 3);
  cancel.cancel();
  task.await.unwrap().unwrap();

  let mut failures = 0;
  while let Ok(event) = events.try_recv() {
    if matches!(event, WorkflowEvent::SnapshotRestoreFailed { .. }) {
      failures += 1;
    }
  }
  assert_eq!(failures, 1);
}

#[tokio::test]
async fn test_unreadable_local_state_starts_fresh() {
  let cancel = CancellationToken::new();
  let truncated = TreeSnapshot::new(Snapshot::of_bytes(vec![0, 1]), Vec::new()).encode();
  let (mut handle, task) = launch_workflow(
    Counter,
    4,
    Some(truncated),
    RuntimeConfig::default(),
    cancel.clone(),
  );

  assert_eq!(next(&mut handle).await.rendering.count, 4);
  cancel.cancel();
  task.await.unwrap().unwrap();
}

#[derive(Clone)]
struct Twins {
  item: Item,
}

impl Workflow for Twins {
  type Props = ();
  type State = ();
  type Output = String;
  type Rendering = ();

  fn initial_state(&self, _props: &()) {}

  fn render(&self, _props: &(), _state: &(), ctx: &mut RenderContext<'_, Self>) -> Result<(), RuntimeError> {
    ctx.render_keyed_child(&self.item, "x".to_string(), "x", Action::emit_output)?;
    ctx.render_keyed_child(&self.item, "x".to_string(), "x", Action::emit_output)?;
    Ok(())
  }
}

#[tokio::test]
async fn test_duplicate_child_key_fails_the_tree() {
  let teardowns = Log::default();
  let twins = Twins {
    item: Item {
      teardowns: teardowns.clone(),
    },
  };
  let (_handle, task) = launch_workflow(
    twins,
    (),
    None,
    RuntimeConfig::default(),
    CancellationToken::new(),
  );

  let err = task.await.unwrap().unwrap_err();
  assert!(matches!(err, RuntimeError::DuplicateChild { key, .. } if key == "x"));
  // The child staged before the failure is still torn down.
  assert_eq!(*teardowns.lock().unwrap(), vec!["x"]);
}

/// Two leaf types written under the same snapshot name.
#[derive(Clone)]
struct LeafA;

#[derive(Clone)]
struct LeafB;

macro_rules! leaf {
  ($leaf:ty) => {
    impl Workflow for $leaf {
      type Props = ();
      type State = ();
      type Output = String;
      type Rendering = ();

      fn type_name() -> &'static str {
        "Leaf"
      }

      fn initial_state(&self, _props: &()) {}

      fn render(&self, _props: &(), _state: &(), _ctx: &mut RenderContext<'_, Self>) -> Result<(), RuntimeError> {
        Ok(())
      }
    }
  };
}

leaf!(LeafA);
leaf!(LeafB);

#[derive(Clone)]
struct SameNamedSiblings;

impl Workflow for SameNamedSiblings {
  type Props = ();
  type State = ();
  type Output = String;
  type Rendering = ();

  fn initial_state(&self, _props: &()) {}

  fn render(&self, _props: &(), _state: &(), ctx: &mut RenderContext<'_, Self>) -> Result<(), RuntimeError> {
    ctx.render_child(&LeafA, (), Action::emit_output)?;
    ctx.render_child(&LeafB, (), Action::emit_output)?;
    Ok(())
  }
}

#[tokio::test]
async fn test_siblings_with_the_same_snapshot_id_are_rejected() {
  let (_handle, task) = launch_workflow(
    SameNamedSiblings,
    (),
    None,
    RuntimeConfig::default(),
    CancellationToken::new(),
  );

  let err = task.await.unwrap().unwrap_err();
  assert!(
    matches!(err, RuntimeError::DuplicateChild { ref workflow, ref key } if workflow == "Leaf" && key.is_empty()),
    "{:?}",
    err
  );
}

#[tokio::test]
async fn test_failing_action_cancels_the_tree() {
  let teardowns = Log::default();
  let (mut handle, task) = launch_workflow(
    list(&teardowns),
    vec!["a", "b"],
    None,
    RuntimeConfig::default(),
    CancellationToken::new(),
  );

  next(&mut handle).await.rendering.items[1]
    .sink
    .send(Action::try_new("explode", |_| Err("kaboom".into())))
    .unwrap();

  let err = task.await.unwrap().unwrap_err();
  assert!(matches!(err, RuntimeError::Action { ref action, .. } if action == "explode"));
  assert_eq!(*teardowns.lock().unwrap(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_props_closed_before_first_value() {
  let (runner, handle) = WorkflowRunner::new(Counter, RuntimeConfig::default());
  drop(handle);

  let err = runner.start(CancellationToken::new()).await.unwrap_err();
  assert!(matches!(err, RuntimeError::PropsClosed));
}

#[tokio::test]
async fn test_cancel_before_first_props_is_clean() {
  let (runner, _handle) = WorkflowRunner::new(Counter, RuntimeConfig::default());
  let cancel = CancellationToken::new();
  cancel.cancel();

  runner.start(cancel).await.unwrap();
}

#[tokio::test]
async fn test_closed_props_keep_tree_running() {
  let cancel = CancellationToken::new();
  let (runner, handle) = WorkflowRunner::new(Counter, RuntimeConfig::default());
  let task = tokio::spawn(runner.start(cancel.clone()));
  let (props, mut renderings, _outputs) = handle.into_parts();

  props.send(2).await.unwrap();
  drop(props);
  let first = renderings.recv().await.unwrap().rendering;

  first.sink.send(increment(1)).unwrap();
  let second = tokio::time::timeout(Duration::from_secs(5), renderings.recv())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(second.rendering.count, 3);

  cancel.cancel();
  task.await.unwrap().unwrap();
}

/// Records every worker event in its state.
#[derive(Clone)]
struct Numbers;

impl Workflow for Numbers {
  type Props = ();
  type State = Vec<String>;
  type Output = ();
  type Rendering = Vec<String>;

  fn initial_state(&self, _props: &()) -> Vec<String> {
    Vec::new()
  }

  fn render(
    &self,
    _props: &(),
    state: &Vec<String>,
    ctx: &mut RenderContext<'_, Self>,
  ) -> Result<Vec<String>, RuntimeError> {
    ctx.run_worker_until_finished(from_stream(stream::iter([1, 2])), "numbers", |event| {
      Some(Action::new("record", move |log: &mut Vec<String>| {
        log.push(format!("{:?}", event));
        None
      }))
    })?;
    Ok(state.clone())
  }
}

#[tokio::test]
async fn test_worker_outputs_then_finishes_once() {
  let cancel = CancellationToken::new();
  let (mut handle, task) = launch_workflow(Numbers, (), None, RuntimeConfig::default(), cancel.clone());

  let mut rendering = next(&mut handle).await.rendering;
  while rendering.len() < 3 {
    rendering = next(&mut handle).await.rendering;
  }
  assert_eq!(rendering, vec!["Output(1)", "Output(2)", "Finished"]);

  let quiet = tokio::time::timeout(Duration::from_millis(100), handle.next_rendering()).await;
  assert!(quiet.is_err(), "tombstoned worker must not wake the tree");

  cancel.cancel();
  task.await.unwrap().unwrap();
}

#[derive(Clone)]
struct Failing;

impl Workflow for Failing {
  type Props = ();
  type State = ();
  type Output = ();
  type Rendering = ();

  fn initial_state(&self, _props: &()) {}

  fn render(&self, _props: &(), _state: &(), ctx: &mut RenderContext<'_, Self>) -> Result<(), RuntimeError> {
    ctx.run_worker(
      from_try_stream(stream::iter([Err::<(), _>("no route to host")])),
      "",
      |()| Action::noop(),
    )
  }
}

#[tokio::test]
async fn test_worker_error_fails_the_tree() {
  let (mut handle, task) = launch_workflow(
    Failing,
    (),
    None,
    RuntimeConfig::default(),
    CancellationToken::new(),
  );
  next(&mut handle).await;

  let err = task.await.unwrap().unwrap_err();
  assert!(matches!(err, RuntimeError::Worker { .. }));
}

struct DropSignal(u32, mpsc::UnboundedSender<u32>);

impl Drop for DropSignal {
  fn drop(&mut self) {
    let _ = self.1.send(self.0);
  }
}

struct PendingWorker {
  request: u32,
  starts: Arc<AtomicUsize>,
  stopped: mpsc::UnboundedSender<u32>,
}

impl Worker for PendingWorker {
  type Output = u32;

  fn run(&mut self) -> WorkerStream<u32> {
    self.starts.fetch_add(1, Ordering::SeqCst);
    let guard = DropSignal(self.request, self.stopped.clone());
    stream::once(async move {
      let _guard = guard;
      std::future::pending::<()>().await;
      Ok(0)
    })
    .boxed()
  }

  fn does_same_work_as(&self, other: &Self) -> bool {
    self.request == other.request
  }
}

/// Runs a pending worker for the request in its props.
#[derive(Clone)]
struct Watcher {
  starts: Arc<AtomicUsize>,
  stopped: mpsc::UnboundedSender<u32>,
}

impl Workflow for Watcher {
  type Props = u32;
  type State = ();
  type Output = ();
  type Rendering = ();

  fn initial_state(&self, _props: &u32) {}

  fn render(&self, props: &u32, _state: &(), ctx: &mut RenderContext<'_, Self>) -> Result<(), RuntimeError> {
    let pending = PendingWorker {
      request: *props,
      starts: self.starts.clone(),
      stopped: self.stopped.clone(),
    };
    ctx.run_worker(pending, "pending", |_| Action::noop())
  }
}

#[tokio::test]
async fn test_equivalent_workers_are_not_restarted() {
  let starts = Arc::new(AtomicUsize::new(0));
  let (stopped, mut stopped_rx) = mpsc::unbounded_channel();
  let watcher = Watcher {
    starts: starts.clone(),
    stopped,
  };
  let cancel = CancellationToken::new();
  let (mut handle, task) = launch_workflow(watcher, 1, None, RuntimeConfig::default(), cancel.clone());

  next(&mut handle).await;
  handle.send_props(1).await.unwrap();
  next(&mut handle).await;
  assert_eq!(starts.load(Ordering::SeqCst), 1);

  handle.send_props(2).await.unwrap();
  next(&mut handle).await;
  assert_eq!(starts.load(Ordering::SeqCst), 2);
  assert_eq!(stopped_rx.recv().await, Some(1));

  cancel.cancel();
  task.await.unwrap().unwrap();
  assert_eq!(stopped_rx.recv().await, Some(2));
  assert!(stopped_rx.try_recv().is_err());
}

#[derive(Clone)]
struct Greeter {
  effects: mpsc::UnboundedSender<&'static str>,
}

impl Workflow for Greeter {
  type Props = u32;
  type State = ();
  type Output = ();
  type Rendering = u32;

  fn initial_state(&self, _props: &u32) {}

  fn render(&self, props: &u32, _state: &(), ctx: &mut RenderContext<'_, Self>) -> Result<u32, RuntimeError> {
    let effects = self.effects.clone();
    ctx.run_side_effect("greet", async move {
      let _ = effects.send("hello");
    })?;
    Ok(*props)
  }
}

#[tokio::test]
async fn test_side_effect_runs_once_while_requested() {
  let (effects, mut effects_rx) = mpsc::unbounded_channel();
  let cancel = CancellationToken::new();
  let (mut handle, task) = launch_workflow(Greeter { effects }, 1, None, RuntimeConfig::default(), cancel.clone());

  for props in 2..5 {
    next(&mut handle).await;
    handle.send_props(props).await.unwrap();
  }
  assert_eq!(next(&mut handle).await.rendering, 4);

  cancel.cancel();
  task.await.unwrap().unwrap();
  assert_eq!(effects_rx.recv().await, Some("hello"));
  assert!(effects_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_observer_sees_lifecycle() {
  let (observer, mut events) = ChannelObserver::channel();
  let config = RuntimeConfig::default().with_observer(observer);
  let teardowns = Log::default();
  let cancel = CancellationToken::new();
  let (mut handle, task) = launch_workflow(list(&teardowns), vec!["a"], None, config, cancel.clone());

  next(&mut handle).await;
  cancel.cancel();
  task.await.unwrap().unwrap();

  let mut seen = Vec::new();
  while let Ok(event) = events.try_recv() {
    seen.push(event);
  }
  assert!(matches!(seen.first(), Some(WorkflowEvent::RuntimeStarted { .. })));
  assert!(matches!(seen.last(), Some(WorkflowEvent::RuntimeStopped { error: None, .. })));

  let started: Vec<_> = seen
    .iter()
    .filter_map(|event| match event {
      WorkflowEvent::WorkflowStarted { parent_id, key, .. } => Some((*parent_id, key.as_str())),
      _ => None,
    })
    .collect();
  assert_eq!(started, vec![(None, ""), (Some(0), "a")]);

  let stopped = seen
    .iter()
    .filter(|event| matches!(event, WorkflowEvent::WorkflowStopped { .. }))
    .count();
  assert_eq!(stopped, 2);
}
