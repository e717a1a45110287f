use log::{debug, trace};

use crate::chart::{StateChart, MAX_DEPTH};
use crate::error::{HsmError, HsmResult};
use crate::machine::StateMachine;
use crate::state::{Node, StateId};

/// Fixed-capacity record of the states to enter, filled from the target upwards and drained
/// from the outermost state down.
pub(crate) struct TransitionPath {
  states: [Option<StateId>; MAX_DEPTH],
  len: usize,
}

impl TransitionPath {
  pub(crate) fn new() -> Self {
    Self { states: [None; MAX_DEPTH], len: 0 }
  }

  pub(crate) fn push(&mut self, state: StateId) -> HsmResult<()> {
    if self.len >= MAX_DEPTH {
      return Err(HsmError::PathOverflow(MAX_DEPTH));
    }
    self.states[self.len] = Some(state);
    self.len += 1;
    Ok(())
  }

  pub(crate) fn pop(&mut self) -> Option<StateId> {
    if self.len == 0 {
      return None;
    }
    self.len -= 1;
    self.states[self.len].take()
  }

  pub(crate) fn len(&self) -> usize {
    self.len
  }
}

impl<C, E> StateMachine<C, E> {
  /// Move from the current state to `target` on behalf of `source`, the state whose handler
  /// picked the target.
  ///
  /// Transitions are internal: the least common ancestor of source and target is neither exited
  /// nor entered, even when the target is an ancestor of the source.  The one exception is a
  /// state targeting itself, which is exited and re-entered.  Initial states are not followed
  /// here; see [`init`](Self::init).
  pub(crate) fn transition(
    &mut self,
    chart: &StateChart<C, E>,
    source: StateId,
    target: StateId,
    event: &E) -> HsmResult<()> {
    chart.node(target)?;
    debug!(
      "{}: [{}] => [{}] (via [{}])",
      self.debug_name,
      self.current_name(),
      chart.node_name(Node::State(target)),
      chart.node_name(Node::State(source)));

    // source handled the event, and events only bubble upwards, so source is the current state
    // or one of its ancestors: bring current up to it first
    while self.position(chart)? != Some(source) {
      self.exit(chart, Some(event))?;
    }

    if source == target {
      self.exit(chart, Some(event))?;
      return self.enter(chart, target, Some(event));
    }

    let mut path = TransitionPath::new();
    let mut track = Some(target);
    let target_depth = chart.position_depth(track)?;
    if chart.position_depth(self.position(chart)?)? > target_depth {
      // exit up to the target's level
      while chart.position_depth(self.position(chart)?)? > target_depth {
        self.exit(chart, Some(event))?;
      }
    } else {
      // record the target's path up to the current level
      let current_depth = chart.position_depth(self.position(chart)?)?;
      while chart.position_depth(track)? > current_depth {
        track = self.record(chart, &mut path, track)?;
      }
      // if the two meet here the source is an ancestor of the target: an external transition
      // would exit and re-enter it, an internal one leaves it alone
    }

    // go up together, exiting current and recording target, until both sit on the same node
    while self.position(chart)? != track {
      self.exit(chart, Some(event))?;
      track = self.record(chart, &mut path, track)?;
    }

    // then enter the recorded path, outermost first
    trace!("{}: [{}] entering {} states", self.debug_name, self.current_name(), path.len());
    while let Some(id) = path.pop() {
      self.enter(chart, id, Some(event))?;
    }
    Ok(())
  }

  /// Current position in the tree, with `None` standing for the top.
  fn position(&self, chart: &StateChart<C, E>) -> HsmResult<Option<StateId>> {
    match self.current {
      Some(Node::State(id)) => Ok(Some(id)),
      Some(Node::Top) => Ok(None),
      Some(other) => Err(HsmError::RanOffTop(chart.node_name(other).to_string())),
      None => Err(HsmError::NotStarted),
    }
  }

  /// Add `track` to the path and step up to its parent.
  fn record(
    &self,
    chart: &StateChart<C, E>,
    path: &mut TransitionPath,
    track: Option<StateId>) -> HsmResult<Option<StateId>> {
    let id = track.ok_or_else(|| HsmError::RanOffTop(String::from("Top")))?;
    path.push(id)?;
    Ok(chart.node(id)?.parent)
  }
}
