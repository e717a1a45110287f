//! Miro Samek's classic hierarchical state machine test, extended with a guarded `h` event.
//!
//! ```text
//! s0 => s1
//!   s1 => s11
//!     s11
//!     s12
//!   s2 => s21
//!     s21 => s211
//!       s211
//! ```
//!
//! Events are single characters; anything outside `a`..`i` goes unhandled.

use crate::chart::StateChart;
use crate::descriptor::StateMachineDescriptor;
use crate::error::HsmResult;
use crate::machine::MachineView;
use crate::state::{HandleResult, NotHandled, State, StateId, Transition};

use super::move_to;

/// Events fed to the machine by the default run: every transition kind plus two unhandled events.
pub const DEFAULT_EVENTS: &str = "aeeahhghix";

/// Machine-wide context shared by every state.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct SamekContext {
  pub foo: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SamekState {
  S0,
  S1,
  S11,
  S12,
  S2,
  S21,
  S211,
}

impl State for SamekState {
  type Context = SamekContext;
  type Event = char;

  fn handle(&self, machine: &MachineView<'_, SamekContext, char>, context: &mut SamekContext, event: &char) -> HandleResult {
    match (self, event) {
      (SamekState::S0, 'e') => move_to(machine, "s211"),
      (SamekState::S0, 'i') => move_to(machine, "s12"),

      (SamekState::S1, 'a') => move_to(machine, "s1"),
      (SamekState::S1, 'b') => move_to(machine, "s11"),
      (SamekState::S1, 'c') => move_to(machine, "s2"),
      (SamekState::S1, 'd') => move_to(machine, "s0"),
      (SamekState::S1, 'f') => move_to(machine, "s211"),

      (SamekState::S11, 'g') => move_to(machine, "s211"),
      (SamekState::S11, 'h') if context.foo => {
        context.foo = false;
        Ok(Transition::None)
      },

      (SamekState::S12, 'e') => move_to(machine, "s211"),
      (SamekState::S12, 'i') => move_to(machine, "s12"),

      (SamekState::S2, 'c') => move_to(machine, "s1"),
      (SamekState::S2, 'f') => move_to(machine, "s11"),

      (SamekState::S21, 'b') => move_to(machine, "s211"),
      (SamekState::S21, 'h') if !context.foo => {
        context.foo = true;
        move_to(machine, "s21")
      },

      (SamekState::S211, 'd') => move_to(machine, "s21"),
      (SamekState::S211, 'g') => move_to(machine, "s0"),

      _ => Err(NotHandled::UnknownEvent),
    }
  }
}

/// Build the chart, returning it with `s0`, the state to start in.
pub fn chart() -> HsmResult<(StateChart<SamekContext, char>, StateId)> {
  let mut chart = StateChart::new();
  let s0 = chart.add_root("s0", SamekState::S0)?;
  let s1 = chart.add_child(s0, "s1", SamekState::S1)?;
  let s11 = chart.add_child(s1, "s11", SamekState::S11)?;
  chart.add_child(s1, "s12", SamekState::S12)?;
  let s2 = chart.add_child(s0, "s2", SamekState::S2)?;
  let s21 = chart.add_child(s2, "s21", SamekState::S21)?;
  let s211 = chart.add_child(s21, "s211", SamekState::S211)?;

  chart.set_initial(s0, s1)?;
  chart.set_initial(s1, s11)?;
  chart.set_initial(s2, s21)?;
  chart.set_initial(s21, s211)?;
  Ok((chart, s0))
}

pub struct SamekPlus;

impl StateMachineDescriptor for SamekPlus {
  type Context = SamekContext;
  type Event = char;

  fn debug_name(&self) -> &'static str {
    "SamekPlus"
  }

  fn chart(&self) -> HsmResult<(StateChart<SamekContext, char>, StateId)> {
    chart()
  }
}
