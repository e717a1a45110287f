//! Small charts used by the binaries and as end-to-end fixtures.

use anyhow::anyhow;

use crate::machine::MachineView;
use crate::state::{HandleResult, NotHandled, Transition};

pub mod samek_plus;
pub mod watch;

/// Move to the state called `name`, failing the machine if the chart has no such state.
fn move_to<C, E>(machine: &MachineView<'_, C, E>, name: &str) -> HandleResult {
  match machine.chart().find_state(name) {
    Some(id) => Ok(Transition::MoveTo(id)),
    None => Err(NotHandled::InternalError(anyhow!("no state named {}", name))),
  }
}
