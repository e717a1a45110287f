use std::sync::Arc;

use crate::chart::StateChart;
use crate::error::HsmResult;
use crate::machine::StateMachine;
use crate::state::StateId;

/// Everything needed to bring up one kind of machine: its name, its chart and where it starts.
pub trait StateMachineDescriptor {
  type Context: Default;
  type Event;

  fn debug_name(&self) -> &'static str;

  /// Build the chart, returning it along with the state to start in.
  fn chart(&self) -> HsmResult<(StateChart<Self::Context, Self::Event>, StateId)>;

  /// Machine-wide context handed to [`StateMachine::start`].
  fn into_context(self) -> Self::Context where Self: Sized { Self::Context::default() }
}

impl<C, E> StateMachine<C, E> {
  /// Build `descriptor`'s chart, check it, and start a machine on it.
  pub fn start_from<D>(descriptor: D) -> HsmResult<Self>
      where D: StateMachineDescriptor<Context = C, Event = E> {
    let (chart, first) = descriptor.chart()?;
    chart.validate()?;
    let mut machine = StateMachine::new(descriptor.debug_name(), Arc::new(chart));
    machine.start(first, descriptor.into_context())?;
    Ok(machine)
  }
}
