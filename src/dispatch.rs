use std::sync::Arc;

use log::{debug, error};

use crate::error::HsmResult;
use crate::machine::{MachineView, StateMachine};
use crate::state::{NotHandled, Node, StateId, Transition};

/// Where bubbling an event stopped.
enum Disposition {
  Unhandled,
  Handled,
  MoveTo { source: StateId, target: StateId },
  Terminate,
  Failed(anyhow::Error),
}

impl<C, E> StateMachine<C, E> {
  /// Offer `event` to the current state, then to each enclosing state in turn, until one of
  /// them does something with it.
  ///
  /// Returns `Ok(true)` once some state dealt with the event (including by terminating the
  /// machine or reporting an internal error), and `Ok(false)` if nobody did or the machine isn't
  /// running.  An `Err` means the resulting transition found the chart malformed; the machine
  /// is then in [`Node::Error`].
  pub fn process_event(&mut self, event: &E) -> HsmResult<bool> {
    let leaf = match self.current {
      Some(Node::State(id)) => id,
      _ => return Ok(false),
    };
    let chart = Arc::clone(&self.chart);

    match self.bubble(leaf, event) {
      Disposition::Handled => Ok(true),
      Disposition::Unhandled => {
        debug!("{}: [{}] Unhandled event!", self.debug_name, self.current_name());
        let view = MachineView::new(self.debug_name, &chart, self.current);
        if let Some(handler) = self.on_unhandled_event.as_mut() {
          handler(&view, event);
        }
        if let Some(observer) = self.observer.as_mut() {
          observer.on_unhandled_event(&view, event);
        }
        Ok(false)
      },
      Disposition::Terminate => {
        debug!("{}: [{}] => [Terminated]", self.debug_name, self.current_name());
        self.current = Some(Node::Terminated);
        Ok(true)
      },
      Disposition::Failed(err) => {
        error!("{}: [{}] Internal error handling event: {}", self.debug_name, self.current_name(), err);
        self.current = Some(Node::Error);
        Ok(true)
      },
      Disposition::MoveTo { source, target } => {
        let result = self
            .transition(&chart, source, target, event)
            .and_then(|()| self.init(&chart, Some(event)));
        self.fail_on_error(result)?;
        Ok(true)
      },
    }
  }

  /// Walk from `leaf` to the top, pairing each state with the context of its level.
  fn bubble(&mut self, leaf: StateId, event: &E) -> Disposition {
    let chart = Arc::clone(&self.chart);
    let view = MachineView::new(self.debug_name, &chart, self.current);
    let mut levels = self.stack.levels();
    let mut handler = Some(leaf);

    while let Some(id) = handler {
      let Ok(node) = chart.node(id) else { break };
      let Some(context) = levels.next().and_then(|index| self.stack.get_mut(index)) else { break };
      match node.state.handle(&view, context, event) {
        Ok(Transition::None) => return Disposition::Handled,
        Ok(Transition::MoveTo(target)) => return Disposition::MoveTo { source: id, target },
        Ok(Transition::Terminate) => return Disposition::Terminate,
        Err(NotHandled::InternalError(err)) => return Disposition::Failed(err),
        Err(NotHandled::UnknownEvent) => handler = node.parent,
      }
    }
    Disposition::Unhandled
  }
}
