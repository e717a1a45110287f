use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::machine::MachineView;
use crate::state::StateId;

/// Hooks for listening in on a machine's internal processing.
///
/// Only things user code can't work out from the machine's public interface get a hook: there
/// is none for reaching `Error`, for instance, since `process_event` and `is_running` already
/// say so.  Each machine carries at most one observer.
pub trait Observer<C, E> {
  /// About to enter `next` because it is the initial state of the current state.
  fn on_init(&mut self, machine: &MachineView<'_, C, E>, next: StateId) {}

  /// The current state has just been entered and its context pushed.
  fn on_entered(&mut self, machine: &MachineView<'_, C, E>, event: Option<&E>) {}

  /// The current state is about to be exited.
  fn on_exiting(&mut self, machine: &MachineView<'_, C, E>, event: Option<&E>) {}

  fn on_unhandled_event(&mut self, machine: &MachineView<'_, C, E>, event: &E) {}

  /// A state that owned its context has been exited; `context` is dropped right after this.
  fn on_context_popped(&mut self, machine: &MachineView<'_, C, E>, context: &C) {}
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum TraceEntry {
  Init(String),
  Entry(String),
  Exit(String),
  Unhandled(String),
}

impl fmt::Display for TraceEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TraceEntry::Init(name) => write!(f, "{}-INIT", name),
      TraceEntry::Entry(name) => write!(f, "{}-ENTRY", name),
      TraceEntry::Exit(name) => write!(f, "{}-EXIT", name),
      TraceEntry::Unhandled(event) => write!(f, "EVT-{}", event),
    }
  }
}

/// Observer recording the sequence of inits, entries, exits and unhandled events.
///
/// Clones share the same record, so keep one handle and give another to the machine.  The record
/// is behind a mutex so a machine carrying a `Trace` can still move between threads.
#[derive(Clone, Default, Debug)]
pub struct Trace {
  inner: Arc<Mutex<TraceRecord>>,
}

#[derive(Default, Debug)]
struct TraceRecord {
  entries: Vec<TraceEntry>,
  contexts_popped: usize,
}

impl Trace {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn entries(&self) -> Vec<TraceEntry> {
    self.lock().entries.clone()
  }

  /// Entries rendered as `s1-ENTRY`, `s1-EXIT`, `s1-INIT` and `EVT-x`.
  pub fn tokens(&self) -> Vec<String> {
    self.lock().entries.iter().map(|e| e.to_string()).collect()
  }

  pub fn contexts_popped(&self) -> usize {
    self.lock().contexts_popped
  }

  /// Hand back everything recorded so far and start over.
  pub fn take(&self) -> Vec<TraceEntry> {
    std::mem::take(&mut self.lock().entries)
  }

  fn record(&self, entry: TraceEntry) {
    self.lock().entries.push(entry);
  }

  fn lock(&self) -> MutexGuard<'_, TraceRecord> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<C, E: fmt::Display> Observer<C, E> for Trace {
  fn on_init(&mut self, machine: &MachineView<'_, C, E>, _next: StateId) {
    self.record(TraceEntry::Init(machine.current_name().to_string()));
  }

  fn on_entered(&mut self, machine: &MachineView<'_, C, E>, _event: Option<&E>) {
    self.record(TraceEntry::Entry(machine.current_name().to_string()));
  }

  fn on_exiting(&mut self, machine: &MachineView<'_, C, E>, _event: Option<&E>) {
    self.record(TraceEntry::Exit(machine.current_name().to_string()));
  }

  fn on_unhandled_event(&mut self, _machine: &MachineView<'_, C, E>, event: &E) {
    self.record(TraceEntry::Unhandled(event.to_string()));
  }

  fn on_context_popped(&mut self, _machine: &MachineView<'_, C, E>, _context: &C) {
    self.lock().contexts_popped += 1;
  }
}
