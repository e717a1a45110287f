//! A stopwatch.
//!
//! ```text
//! Active => Stopped
//!   Stopped
//!   Running
//! ```
//!
//! Entering `Active` clears the time, so resetting is just `Active` targeting itself.  Ticks only
//! count while `Running`; everywhere else they go unhandled.

use crate::chart::StateChart;
use crate::descriptor::StateMachineDescriptor;
use crate::error::HsmResult;
use crate::fn_state::FnState;
use crate::state::{NotHandled, StateId, Transition};

use super::move_to;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WatchEvent {
  Reset,
  Toggle,
  Tick(u32),
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Watch {
  pub elapsed: u32,
}

impl Watch {
  pub fn reset(&mut self) {
    self.elapsed = 0;
  }

  pub fn tick(&mut self, time: u32) {
    self.elapsed += time;
  }
}

pub fn chart() -> HsmResult<(StateChart<Watch, WatchEvent>, StateId)> {
  let mut chart = StateChart::new();
  let active = chart.add_root("Active", FnState::new()
      .on_enter(|_, watch: &mut Watch, _| {
        watch.reset();
        None
      })
      .on_event(|machine, _, event: &WatchEvent| match event {
        WatchEvent::Reset => move_to(machine, "Active"),
        _ => Err(NotHandled::UnknownEvent),
      }))?;
  let stopped = chart.add_child(active, "Stopped", FnState::new()
      .on_event(|machine, _, event: &WatchEvent| match event {
        WatchEvent::Toggle => move_to(machine, "Running"),
        _ => Err(NotHandled::UnknownEvent),
      }))?;
  chart.add_child(active, "Running", FnState::new()
      .on_event(|machine, watch: &mut Watch, event: &WatchEvent| match event {
        WatchEvent::Toggle => move_to(machine, "Stopped"),
        WatchEvent::Tick(time) => {
          watch.tick(*time);
          Ok(Transition::None)
        },
        _ => Err(NotHandled::UnknownEvent),
      }))?;
  chart.set_initial(active, stopped)?;
  Ok((chart, active))
}

#[derive(Default)]
pub struct WatchMachine {
  pub watch: Watch,
}

impl StateMachineDescriptor for WatchMachine {
  type Context = Watch;
  type Event = WatchEvent;

  fn debug_name(&self) -> &'static str {
    "Watch"
  }

  fn chart(&self) -> HsmResult<(StateChart<Watch, WatchEvent>, StateId)> {
    chart()
  }

  fn into_context(self) -> Watch {
    self.watch
  }
}
