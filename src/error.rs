use thiserror::Error;

use crate::state::StateId;

/// Failures reported by chart construction and by the machine itself.
///
/// Everything past `NotStarted` is a defect in the chart rather than a runtime condition; once
/// the machine reports one of those it has already moved to [`Node::Error`](crate::Node::Error).
#[derive(Error, PartialEq, Eq, Clone, Debug)]
pub enum HsmError {
  #[error("machine already started")]
  AlreadyStarted,

  #[error("machine not started")]
  NotStarted,

  #[error("unknown state {0:?}")]
  UnknownState(StateId),

  #[error("state {name} would sit at depth {depth}, deeper than the maximum of {max}")]
  TooDeep { name: String, depth: usize, max: usize },

  #[error("malformed statechart: initial state {initial} of {state} is not its child")]
  MalformedInitial { state: String, initial: String },

  #[error("malformed statechart: jumped past top while leaving {0}")]
  RanOffTop(String),

  #[error("transition path exceeds {0} states")]
  PathOverflow(usize),

  #[error("context stack exceeds {0} levels")]
  ContextOverflow(usize),
}

pub type HsmResult<T> = Result<T, HsmError>;
