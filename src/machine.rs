use std::sync::Arc;

use log::{debug, error, trace};

use crate::chart::StateChart;
use crate::context::ContextStack;
use crate::error::{HsmError, HsmResult};
use crate::observer::Observer;
use crate::state::{Node, StateId};
use crate::transition::TransitionPath;

type UnhandledFn<C, E> = Box<dyn FnMut(&MachineView<'_, C, E>, &E) + Send>;
type BoxedObserver<C, E> = Box<dyn Observer<C, E> + Send>;

/// Read-only look at a machine, handed to state callbacks and observers.
pub struct MachineView<'a, C, E> {
  debug_name: &'a str,
  chart: &'a StateChart<C, E>,
  current: Option<Node>,
}

impl<'a, C, E> MachineView<'a, C, E> {
  pub(crate) fn new(debug_name: &'a str, chart: &'a StateChart<C, E>, current: Option<Node>) -> Self {
    Self { debug_name, chart, current }
  }

  pub fn debug_name(&self) -> &'a str {
    self.debug_name
  }

  pub fn chart(&self) -> &'a StateChart<C, E> {
    self.chart
  }

  /// `None` until the machine has been started.
  pub fn current(&self) -> Option<Node> {
    self.current
  }

  pub fn current_state(&self) -> Option<StateId> {
    self.current.and_then(Node::state_id)
  }

  pub fn current_name(&self) -> &'a str {
    match self.current {
      Some(node) => self.chart.node_name(node),
      None => "<not started>",
    }
  }

  /// Started, and neither terminated nor failed.
  pub fn is_running(&self) -> bool {
    matches!(self.current, Some(Node::State(_)) | Some(Node::Top))
  }

  /// Whether `node` is the current node or one of its ancestors (including [`Node::Top`]).
  pub fn is_in_state(&self, node: impl Into<Node>) -> bool {
    let wanted = node.into();
    let mut test = match self.current {
      Some(current) => current,
      None => return false,
    };
    loop {
      if test == wanted {
        return true;
      }
      test = match test {
        Node::State(id) => match self.chart.parent(id) {
          Some(parent) => parent,
          None => return false,
        },
        _ => return false,
      };
    }
  }
}

/// One running instance of a [`StateChart`].
///
/// The machine owns the current state and the stack of state contexts; the chart itself is
/// shared.  All processing is synchronous: `process_event` runs every resulting exit, enter and
/// init before returning, and callbacks must not feed events back into the same machine.
pub struct StateMachine<C, E> {
  pub(crate) debug_name: &'static str,
  pub(crate) chart: Arc<StateChart<C, E>>,
  pub(crate) current: Option<Node>,
  pub(crate) stack: ContextStack<C>,
  pub(crate) on_unhandled_event: Option<UnhandledFn<C, E>>,
  pub(crate) observer: Option<BoxedObserver<C, E>>,
}

impl<C, E> StateMachine<C, E> {
  pub fn new(debug_name: &'static str, chart: Arc<StateChart<C, E>>) -> Self {
    Self {
      debug_name,
      chart,
      current: None,
      stack: ContextStack::new(),
      on_unhandled_event: None,
      observer: None,
    }
  }

  pub fn with_observer(mut self, observer: impl Observer<C, E> + Send + 'static) -> Self {
    self.observer = Some(Box::new(observer));
    self
  }

  /// Swap in a new observer (or none), returning the previous one so it can be restored.
  pub fn set_observer(&mut self, observer: Option<BoxedObserver<C, E>>) -> Option<BoxedObserver<C, E>> {
    std::mem::replace(&mut self.observer, observer)
  }

  /// Called whenever no active state handles an event.
  pub fn set_unhandled_handler<F>(&mut self, handler: F)
      where F: FnMut(&MachineView<'_, C, E>, &E) + Send + 'static {
    self.on_unhandled_event = Some(Box::new(handler));
  }

  /// Enter every state from the top down to `first`, then follow initial states.
  ///
  /// `context` is the machine-wide context: root states receive it as their parent context, and
  /// any state that doesn't make its own shares it.
  pub fn start(&mut self, first: StateId, context: C) -> HsmResult<()> {
    if self.current.is_some() {
      return Err(HsmError::AlreadyStarted);
    }
    let chart = Arc::clone(&self.chart);
    chart.node(first)?;
    debug!("{}: Starting in [{}]", self.debug_name, chart.node_name(Node::State(first)));

    self.stack.push(Some(context))?;
    self.current = Some(Node::Top);
    let result = self.run_start(&chart, first);
    if result.is_err() {
      self.release_contexts(&chart);
    }
    self.fail_on_error(result)
  }

  fn run_start(&mut self, chart: &StateChart<C, E>, first: StateId) -> HsmResult<()> {
    // first needn't be a root: walk up to the top, then enter back down to it
    let mut path = TransitionPath::new();
    let mut track = Some(first);
    while let Some(id) = track {
      path.push(id)?;
      track = chart.node(id)?.parent;
    }
    while let Some(id) = path.pop() {
      self.enter(chart, id, None)?;
    }
    // statecharts run enter *then* init
    self.init(chart, None)
  }

  /// Exit every active state, innermost first, and release every context still held,
  /// the machine-wide one included.
  ///
  /// A running machine ends up terminated.  A machine that already terminated or failed keeps
  /// its pseudo-state and only has its leftover contexts released.  Stopping a machine that was
  /// never started does nothing.
  pub fn stop(&mut self) -> HsmResult<()> {
    if self.current.is_none() {
      return Ok(());
    }
    let chart = Arc::clone(&self.chart);
    let mut result = Ok(());
    if self.is_running() {
      debug!("{}: Stopping in [{}]", self.debug_name, self.current_name());
      result = self.exit_to_top(&chart);
      if result.is_ok() {
        self.current = Some(Node::Terminated);
      }
    }
    self.release_contexts(&chart);
    self.fail_on_error(result)
  }

  /// Pop every remaining level, reporting each owned context as it goes.
  fn release_contexts(&mut self, chart: &StateChart<C, E>) {
    let view = MachineView::new(self.debug_name, chart, self.current);
    while !self.stack.is_empty() {
      if let Some(context) = self.stack.pop() {
        if let Some(observer) = self.observer.as_mut() {
          observer.on_context_popped(&view, &context);
        }
      }
    }
  }

  fn exit_to_top(&mut self, chart: &StateChart<C, E>) -> HsmResult<()> {
    while let Some(Node::State(_)) = self.current {
      self.exit(chart, None)?;
    }
    Ok(())
  }

  pub fn view(&self) -> MachineView<'_, C, E> {
    MachineView::new(self.debug_name, &self.chart, self.current)
  }

  pub fn debug_name(&self) -> &'static str {
    self.debug_name
  }

  pub fn chart(&self) -> &Arc<StateChart<C, E>> {
    &self.chart
  }

  pub fn current(&self) -> Option<Node> {
    self.current
  }

  pub fn current_name(&self) -> &str {
    match self.current {
      Some(node) => self.chart.node_name(node),
      None => "<not started>",
    }
  }

  pub fn is_running(&self) -> bool {
    self.view().is_running()
  }

  pub fn is_in_state(&self, node: impl Into<Node>) -> bool {
    self.view().is_in_state(node)
  }

  /// Context of the innermost state that owns one.
  ///
  /// A machine that terminated or failed on an event keeps the contexts it had until
  /// [`stop`](Self::stop) releases them.
  pub fn context(&self) -> Option<&C> {
    self.stack.top()
  }

  pub fn context_mut(&mut self) -> Option<&mut C> {
    self.stack.top_mut()
  }

  pub fn contexts(&self) -> &ContextStack<C> {
    &self.stack
  }

  pub(crate) fn enter(&mut self, chart: &StateChart<C, E>, id: StateId, event: Option<&E>) -> HsmResult<()> {
    let node = chart.node(id)?;
    self.current = Some(Node::State(id));
    let view = MachineView::new(self.debug_name, chart, self.current);
    trace!("{}: Entering [{}]...", self.debug_name, node.name);

    let parent = self.stack.top_mut().ok_or(HsmError::NotStarted)?;
    let context = node.state.on_enter(&view, parent, event);
    self.stack.push(context)?;

    if let Some(observer) = self.observer.as_mut() {
      observer.on_entered(&view, event);
    }
    Ok(())
  }

  /// Exit the current state; the machine moves to its parent.
  pub(crate) fn exit(&mut self, chart: &StateChart<C, E>, event: Option<&E>) -> HsmResult<()> {
    let id = match self.current {
      Some(Node::State(id)) => id,
      Some(other) => return Err(HsmError::RanOffTop(chart.node_name(other).to_string())),
      None => return Err(HsmError::NotStarted),
    };
    let node = chart.node(id)?;
    let view = MachineView::new(self.debug_name, chart, self.current);
    trace!("{}: Exiting [{}]...", self.debug_name, node.name);

    if let Some(observer) = self.observer.as_mut() {
      observer.on_exiting(&view, event);
    }
    if let Some(context) = self.stack.top_mut() {
      node.state.on_exit(&view, context, event);
    }
    if let Some(context) = self.stack.pop() {
      if let Some(observer) = self.observer.as_mut() {
        observer.on_context_popped(&view, &context);
      }
    }
    self.current = Some(Node::from_parent(node.parent));
    Ok(())
  }

  /// Follow initial states down from the current state until reaching one without.
  pub(crate) fn init(&mut self, chart: &StateChart<C, E>, event: Option<&E>) -> HsmResult<()> {
    while let Some(Node::State(id)) = self.current {
      let node = chart.node(id)?;
      let Some(initial) = node.initial else { break };
      let child = chart.node(initial)?;
      if child.parent != Some(id) {
        return Err(HsmError::MalformedInitial {
          state: node.name.clone(),
          initial: child.name.clone(),
        });
      }
      trace!("{}: [{}] init => [{}]", self.debug_name, node.name, child.name);
      if let Some(observer) = self.observer.as_mut() {
        let view = MachineView::new(self.debug_name, chart, self.current);
        observer.on_init(&view, initial);
      }
      self.enter(chart, initial, event)?;
    }
    Ok(())
  }

  /// Any error reaching here means the chart is broken: park the machine in [`Node::Error`].
  pub(crate) fn fail_on_error(&mut self, result: HsmResult<()>) -> HsmResult<()> {
    if let Err(err) = &result {
      error!("{}: {}", self.debug_name, err);
      self.current = Some(Node::Error);
    }
    result
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;
  use std::thread;

  use crate::fn_state::FnState;
  use crate::observer::Trace;
  use crate::state::Transition;

  use super::*;

  /// Each context carries the name of the state that created it.
  #[derive(Debug, Clone, PartialEq)]
  struct Tagged {
    owner: &'static str,
    seen: Vec<&'static str>,
  }

  impl Tagged {
    fn new(owner: &'static str) -> Self {
      Self { owner, seen: vec![] }
    }
  }

  fn owning(owner: &'static str) -> FnState<Tagged, char> {
    FnState::new().on_enter(move |_, _, _| Some(Tagged::new(owner)))
  }

  /// Records which context each level handed to it, then lets the event bubble.
  fn recording(name: &'static str) -> FnState<Tagged, char> {
    FnState::new().on_event(move |_, ctx: &mut Tagged, _| {
      ctx.seen.push(name);
      Err(crate::state::NotHandled::UnknownEvent)
    })
  }

  fn init_chain() -> (Arc<StateChart<(), char>>, [StateId; 3]) {
    let mut chart = StateChart::new();
    let i0 = chart.add_root("I0", FnState::new()).unwrap();
    let i1 = chart.add_child(i0, "I1", FnState::new()).unwrap();
    let i2 = chart.add_child(i1, "I2", FnState::new()).unwrap();
    chart.set_initial(i0, i1).unwrap();
    chart.set_initial(i1, i2).unwrap();
    (Arc::new(chart), [i0, i1, i2])
  }

  #[test]
  fn test_start_enters_then_inits_down_the_initial_chain() {
    let (chart, [i0, i1, i2]) = init_chain();
    let trace = Trace::new();
    let mut machine = StateMachine::new("InitSequence", chart).with_observer(trace.clone());

    assert!(!machine.is_running());
    machine.start(i0, ()).unwrap();

    assert_eq!(trace.tokens(), vec![
      "I0-ENTRY", "I0-INIT", "I1-ENTRY", "I1-INIT", "I2-ENTRY",
    ]);
    assert!(machine.is_running());
    assert_eq!(machine.current(), Some(Node::State(i2)));
    assert!(machine.is_in_state(i0));
    assert!(machine.is_in_state(i1));
    assert!(machine.is_in_state(Node::Top));
    assert_eq!(machine.contexts().depth(), 4);
  }

  #[test]
  fn test_start_from_inner_state_enters_its_ancestors_first() {
    let (chart, [i0, i1, i2]) = init_chain();
    let trace = Trace::new();
    let mut machine = StateMachine::new("InnerStart", chart).with_observer(trace.clone());

    machine.start(i1, ()).unwrap();
    assert_eq!(trace.tokens(), vec!["I0-ENTRY", "I1-ENTRY", "I1-INIT", "I2-ENTRY"]);
    assert_eq!(machine.current(), Some(Node::State(i2)));
    assert!(machine.is_in_state(i0));
  }

  #[test]
  fn test_start_twice_is_refused() {
    let (chart, [i0, ..]) = init_chain();
    let trace = Trace::new();
    let mut machine = StateMachine::new("Twice", chart).with_observer(trace.clone());
    machine.start(i0, ()).unwrap();
    trace.take();

    assert_eq!(machine.start(i0, ()), Err(HsmError::AlreadyStarted));
    assert!(trace.tokens().is_empty());
    assert!(machine.is_running());
  }

  #[test]
  fn test_start_with_unknown_state_leaves_machine_untouched() {
    let (chart, _) = init_chain();
    let mut machine = StateMachine::new("Unknown", chart);
    let bogus = StateId(42);

    assert_eq!(machine.start(bogus, ()), Err(HsmError::UnknownState(bogus)));
    assert_eq!(machine.current(), None);
    assert!(machine.contexts().is_empty());
  }

  #[test]
  fn test_initial_that_is_not_a_child_forces_error() {
    let mut chart: StateChart<(), char> = StateChart::new();
    let a = chart.add_root("a", FnState::new()).unwrap();
    let b = chart.add_child(a, "b", FnState::new()).unwrap();
    let c = chart.add_child(b, "c", FnState::new()).unwrap();
    chart.set_initial(a, c).unwrap();

    let trace = Trace::new();
    let mut machine = StateMachine::new("Malformed", Arc::new(chart)).with_observer(trace.clone());
    let result = machine.start(a, ());

    assert_eq!(result, Err(HsmError::MalformedInitial {
      state: String::from("a"),
      initial: String::from("c"),
    }));
    assert_eq!(trace.tokens(), vec!["a-ENTRY"]);
    assert_eq!(machine.current(), Some(Node::Error));
    assert!(!machine.is_running());
    assert!(machine.is_in_state(Node::Error));
    assert!(!machine.is_in_state(a));
    assert!(machine.contexts().is_empty());
    assert_eq!(trace.contexts_popped(), 1);

    // safe no-op from here on
    assert_eq!(machine.process_event(&'x'), Ok(false));
    assert_eq!(trace.tokens(), vec!["a-ENTRY"]);
  }

  #[test]
  fn test_state_without_enter_shares_nearest_owning_context() {
    let mut chart: StateChart<Tagged, char> = StateChart::new();
    let outer = chart.add_root("outer", owning("outer").on_event(|_, ctx: &mut Tagged, _| {
      ctx.seen.push("outer");
      Err(crate::state::NotHandled::UnknownEvent)
    })).unwrap();
    let middle = chart.add_child(outer, "middle", recording("middle")).unwrap();
    let inner = chart.add_child(middle, "inner", recording("inner")).unwrap();
    chart.set_initial(outer, middle).unwrap();
    chart.set_initial(middle, inner).unwrap();

    let mut machine = StateMachine::new("Sharing", Arc::new(chart));
    machine.start(outer, Tagged::new("machine")).unwrap();

    assert_eq!(machine.contexts().depth(), 4);
    assert_eq!(machine.contexts().unique_count(), 2);
    assert_eq!(machine.process_event(&'z'), Ok(false));

    // all three levels handled the event with the context created by `outer`
    let ctx = machine.context().unwrap();
    assert_eq!(ctx.owner, "outer");
    assert_eq!(ctx.seen, vec!["inner", "middle", "outer"]);
  }

  #[test]
  fn test_context_popped_fires_once_per_owning_state() {
    let mut chart: StateChart<Tagged, char> = StateChart::new();
    let home = chart.add_root("home", FnState::new()).unwrap();
    let owner = chart.add_child(home, "owner", owning("owner")).unwrap();
    let sharer = chart.add_child(owner, "sharer", FnState::new()).unwrap();
    let away = chart.add_child(home, "away", FnState::new()).unwrap();
    chart.set_initial(home, owner).unwrap();
    chart.set_initial(owner, sharer).unwrap();
    let chart = Arc::new(chart);

    let trace = Trace::new();
    let mut machine = StateMachine::new("Popping", chart.clone()).with_observer(trace.clone());
    machine.start(home, Tagged::new("machine")).unwrap();
    assert_eq!(machine.context().unwrap().owner, "owner");

    let result = machine.transition(&chart, sharer, away, &'t');
    assert_eq!(result, Ok(()));
    assert_eq!(machine.current(), Some(Node::State(away)));
    assert_eq!(trace.contexts_popped(), 1);
    assert_eq!(machine.context().unwrap().owner, "machine");
  }

  #[test]
  fn test_stop_exits_everything_and_terminates() {
    let (chart, [i0, i1, _]) = init_chain();
    let trace = Trace::new();
    let mut machine = StateMachine::new("Stop", chart).with_observer(trace.clone());
    machine.start(i0, ()).unwrap();
    trace.take();

    machine.stop().unwrap();
    assert_eq!(trace.tokens(), vec!["I2-EXIT", "I1-EXIT", "I0-EXIT"]);
    assert_eq!(machine.current(), Some(Node::Terminated));
    assert!(!machine.is_running());
    assert!(!machine.is_in_state(i1));
    assert!(machine.contexts().is_empty());

    // stopping again changes nothing
    machine.stop().unwrap();
    assert_eq!(trace.tokens().len(), 3);
  }

  #[test]
  fn test_failed_start_releases_contexts_already_pushed() {
    let mut chart: StateChart<Tagged, char> = StateChart::new();
    let a = chart.add_root("a", owning("a")).unwrap();
    let b = chart.add_child(a, "b", FnState::new()).unwrap();
    let c = chart.add_child(b, "c", FnState::new()).unwrap();
    chart.set_initial(a, c).unwrap();

    let trace = Trace::new();
    let mut machine = StateMachine::new("FailedStart", Arc::new(chart)).with_observer(trace.clone());
    assert!(machine.start(a, Tagged::new("machine")).is_err());

    assert_eq!(machine.current(), Some(Node::Error));
    assert_eq!(machine.contexts().depth(), 0);
    assert_eq!(machine.context(), None);
    assert_eq!(trace.contexts_popped(), 2);
  }

  #[test]
  fn test_stop_reports_every_released_context() {
    let mut chart: StateChart<Tagged, char> = StateChart::new();
    let outer = chart.add_root("outer", owning("outer")).unwrap();
    let middle = chart.add_child(outer, "middle", owning("middle")).unwrap();
    let inner = chart.add_child(middle, "inner", FnState::new()).unwrap();
    chart.set_initial(outer, middle).unwrap();
    chart.set_initial(middle, inner).unwrap();

    let trace = Trace::new();
    let mut machine = StateMachine::new("StopContexts", Arc::new(chart)).with_observer(trace.clone());
    machine.start(outer, Tagged::new("machine")).unwrap();
    assert_eq!(machine.contexts().unique_count(), 3);

    machine.stop().unwrap();
    assert_eq!(trace.contexts_popped(), 3);
    assert!(machine.contexts().is_empty());
    assert_eq!(machine.context(), None);
  }

  #[test]
  fn test_stop_after_terminate_releases_leftover_contexts() {
    let mut chart: StateChart<Tagged, char> = StateChart::new();
    let only = chart.add_root("only", owning("only").on_event(|_, _, event: &char| match event {
      'q' => Ok(Transition::Terminate),
      _ => Err(crate::state::NotHandled::UnknownEvent),
    })).unwrap();

    let trace = Trace::new();
    let mut machine = StateMachine::new("TerminateThenStop", Arc::new(chart)).with_observer(trace.clone());
    machine.start(only, Tagged::new("machine")).unwrap();
    trace.take();

    assert_eq!(machine.process_event(&'q'), Ok(true));
    assert_eq!(machine.current(), Some(Node::Terminated));
    assert_eq!(machine.context().unwrap().owner, "only");
    assert_eq!(trace.contexts_popped(), 0);

    // no exits for a terminated machine, only the contexts go
    machine.stop().unwrap();
    assert!(trace.tokens().is_empty());
    assert_eq!(trace.contexts_popped(), 2);
    assert!(machine.contexts().is_empty());
    assert_eq!(machine.current(), Some(Node::Terminated));
    assert!(!machine.is_in_state(only));
  }

  #[test]
  fn test_set_observer_swaps_and_returns_previous() {
    let (chart, [i0, ..]) = init_chain();
    let first = Trace::new();
    let second = Trace::new();
    let mut machine = StateMachine::new("Swap", chart).with_observer(first.clone());
    machine.start(i0, ()).unwrap();

    let previous = machine.set_observer(Some(Box::new(second.clone())));
    assert!(previous.is_some());
    machine.stop().unwrap();
    assert_eq!(first.tokens().len(), 5);
    assert_eq!(second.tokens(), vec!["I2-EXIT", "I1-EXIT", "I0-EXIT"]);

    assert!(machine.set_observer(None).is_some());
    assert!(machine.set_observer(None).is_none());
  }

  #[test]
  fn test_started_machine_moves_to_another_thread() {
    let mut chart: StateChart<u32, u32> = StateChart::new();
    let even = chart.add_root("even", FnState::new().on_event(|_, total: &mut u32, n: &u32| {
      if n % 2 == 0 {
        *total += *n;
        Ok(Transition::None)
      } else {
        Err(crate::state::NotHandled::UnknownEvent)
      }
    })).unwrap();

    let trace = Trace::new();
    let odd = Arc::new(Mutex::new(vec![]));
    let odd_seen = Arc::clone(&odd);
    let mut machine = StateMachine::new("Mover", Arc::new(chart)).with_observer(trace.clone());
    machine.set_unhandled_handler(move |_, n| odd_seen.lock().unwrap().push(*n));
    machine.start(even, 0).unwrap();
    trace.take();

    let machine = thread::spawn(move || {
      for n in 1..=4u32 {
        machine.process_event(&n).unwrap();
      }
      machine
    }).join().unwrap();

    assert_eq!(machine.context(), Some(&6));
    assert_eq!(*odd.lock().unwrap(), vec![1, 3]);
    assert_eq!(trace.tokens(), vec!["EVT-1", "EVT-3"]);
  }

  #[test]
  fn test_queries_do_not_change_the_machine() {
    let (chart, [i0, i1, i2]) = init_chain();
    let mut machine = StateMachine::new("Queries", chart);
    machine.start(i0, ()).unwrap();

    for _ in 0..3 {
      assert!(machine.is_running());
      assert!(machine.is_in_state(i1));
      assert!(!machine.is_in_state(Node::Error));
    }
    assert_eq!(machine.current(), Some(Node::State(i2)));
    assert_eq!(machine.current_name(), "I2");
    assert_eq!(machine.contexts().depth(), 4);
  }

  #[test]
  fn test_machines_share_a_chart_across_threads() {
    let mut chart: StateChart<u32, u32> = StateChart::new();
    let counting = chart.add_root("counting", FnState::new().on_event(|_, total: &mut u32, n: &u32| {
      *total += *n;
      Ok(Transition::None)
    })).unwrap();
    let chart = Arc::new(chart);
    let totals = Arc::new(Mutex::new(vec![]));

    let handles: Vec<_> = (1..=4u32).map(|step| {
      let chart = Arc::clone(&chart);
      let totals = Arc::clone(&totals);
      thread::spawn(move || {
        let mut machine = StateMachine::new("Counter", chart);
        machine.start(counting, 0).unwrap();
        for _ in 0..10 {
          machine.process_event(&step).unwrap();
        }
        totals.lock().unwrap().push(*machine.context().unwrap());
      })
    }).collect();
    for handle in handles {
      handle.join().unwrap();
    }

    let mut totals = totals.lock().unwrap().clone();
    totals.sort();
    assert_eq!(totals, vec![10, 20, 30, 40]);
  }
}
