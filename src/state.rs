use std::fmt;

use thiserror::Error;

use crate::machine::MachineView;

/// Handle to a state stored in a [`StateChart`](crate::StateChart).
///
/// Ids are only meaningful for the chart that issued them.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct StateId(pub(crate) usize);

impl StateId {
  pub fn index(self) -> usize {
    self.0
  }
}

impl fmt::Display for StateId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Anything the machine can be "in": a chart state or one of the shared pseudo-states.
///
/// `Top` is the implicit root above every chart state; it never handles events and is never
/// entered or exited.  `Terminated` and `Error` have no parent, so once the machine lands on
/// one of them it is the only node it is in.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Node {
  Top,
  State(StateId),
  Terminated,
  Error,
}

impl Node {
  pub(crate) fn from_parent(parent: Option<StateId>) -> Self {
    parent.map_or(Node::Top, Node::State)
  }

  pub fn state_id(self) -> Option<StateId> {
    match self {
      Node::State(id) => Some(id),
      _ => None,
    }
  }

  pub fn is_pseudo(self) -> bool {
    !matches!(self, Node::State(_))
  }
}

impl From<StateId> for Node {
  fn from(id: StateId) -> Self {
    Node::State(id)
  }
}

/// Behaviour attached to one state of a chart.
///
/// A state is shared by every machine running the chart, so all callbacks take `&self`; per
/// instance data belongs in the context.  Every method has a do-nothing default: a state that
/// only groups children can implement none of them.
pub trait State {
  type Context;
  type Event;

  /// Called after the machine has moved into this state.
  ///
  /// `parent` is the context of the enclosing state (the machine-level context for root
  /// states).  Returning `Some` gives this state its own context for as long as it is active;
  /// returning `None` shares the parent's.  `event` is `None` while the machine is starting.
  fn on_enter(
    &self,
    machine: &MachineView<'_, Self::Context, Self::Event>,
    parent: &mut Self::Context,
    event: Option<&Self::Event>) -> Option<Self::Context> {
    None
  }

  /// Called just before the machine leaves this state, with the state's own context.
  fn on_exit(
    &self,
    machine: &MachineView<'_, Self::Context, Self::Event>,
    context: &mut Self::Context,
    event: Option<&Self::Event>) {}

  #[must_use]
  fn handle(
    &self,
    machine: &MachineView<'_, Self::Context, Self::Event>,
    context: &mut Self::Context,
    event: &Self::Event) -> HandleResult {
    Err(NotHandled::UnknownEvent)
  }
}

pub type HandleResult = Result<Transition, NotHandled>;

/// What a state decided to do with an event it accepted.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Transition {
  /// Consumed; no structural change.
  None,
  MoveTo(StateId),
  /// Deliberately stop the machine.
  Terminate,
}

#[derive(Error, Debug)]
pub enum NotHandled {
  /// Let the enclosing state have a go at the event.
  #[error("unknown event")]
  UnknownEvent,

  /// The state failed while handling the event; the machine moves to [`Node::Error`].
  #[error("internal error: {0}")]
  InternalError(anyhow::Error),
}
