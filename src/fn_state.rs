use crate::machine::MachineView;
use crate::state::{HandleResult, NotHandled, State};

type EventFn<C, E> = Box<dyn Fn(&MachineView<'_, C, E>, &mut C, &E) -> HandleResult + Send + Sync>;
type EnterFn<C, E> = Box<dyn Fn(&MachineView<'_, C, E>, &mut C, Option<&E>) -> Option<C> + Send + Sync>;
type ExitFn<C, E> = Box<dyn Fn(&MachineView<'_, C, E>, &mut C, Option<&E>) + Send + Sync>;

/// A [`State`] assembled from closures.
///
/// Any callback left out keeps the trait's default, so `FnState::new()` on its own is a state
/// that does nothing but group its children.
pub struct FnState<C, E> {
  on_event: Option<EventFn<C, E>>,
  on_enter: Option<EnterFn<C, E>>,
  on_exit: Option<ExitFn<C, E>>,
}

impl<C, E> Default for FnState<C, E> {
  fn default() -> Self {
    Self::new()
  }
}

impl<C, E> FnState<C, E> {
  pub fn new() -> Self {
    Self { on_event: None, on_enter: None, on_exit: None }
  }

  pub fn on_event<F>(mut self, handler: F) -> Self
      where F: Fn(&MachineView<'_, C, E>, &mut C, &E) -> HandleResult + Send + Sync + 'static {
    self.on_event = Some(Box::new(handler));
    self
  }

  pub fn on_enter<F>(mut self, action: F) -> Self
      where F: Fn(&MachineView<'_, C, E>, &mut C, Option<&E>) -> Option<C> + Send + Sync + 'static {
    self.on_enter = Some(Box::new(action));
    self
  }

  pub fn on_exit<F>(mut self, action: F) -> Self
      where F: Fn(&MachineView<'_, C, E>, &mut C, Option<&E>) + Send + Sync + 'static {
    self.on_exit = Some(Box::new(action));
    self
  }
}

impl<C, E> State for FnState<C, E> {
  type Context = C;
  type Event = E;

  fn on_enter(&self, machine: &MachineView<'_, C, E>, parent: &mut C, event: Option<&E>) -> Option<C> {
    self.on_enter.as_ref().and_then(|action| action(machine, parent, event))
  }

  fn on_exit(&self, machine: &MachineView<'_, C, E>, context: &mut C, event: Option<&E>) {
    if let Some(action) = &self.on_exit {
      action(machine, context, event);
    }
  }

  fn handle(&self, machine: &MachineView<'_, C, E>, context: &mut C, event: &E) -> HandleResult {
    match &self.on_event {
      Some(handler) => handler(machine, context, event),
      None => Err(NotHandled::UnknownEvent),
    }
  }
}
