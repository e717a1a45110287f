//! Hierarchical state machines in the statechart style.
//!
//! A [`StateChart`] is a static tree of states, each implementing [`State`].  Any number of
//! [`StateMachine`]s can run the same chart; each keeps its own current state and a stack of
//! per state contexts.  Events are offered to the current state first and bubble up through its
//! ancestors until one of them handles it, and transitions exit and enter states up to (but
//! not including) the closest common ancestor of where the machine is and where it is going.
//!
//! ```
//! use std::sync::Arc;
//!
//! use hsm_statechart::{FnState, StateChart, StateMachine, Transition, NotHandled};
//!
//! let mut chart: StateChart<u32, char> = StateChart::new();
//! let idle = chart.add_root("Idle", FnState::new().on_event(|_, count: &mut u32, event: &char| {
//!   match event {
//!     'p' => {
//!       *count += 1;
//!       Ok(Transition::None)
//!     },
//!     _ => Err(NotHandled::UnknownEvent),
//!   }
//! })).unwrap();
//!
//! let mut machine = StateMachine::new("Counter", Arc::new(chart));
//! machine.start(idle, 0).unwrap();
//! assert_eq!(machine.process_event(&'p'), Ok(true));
//! assert_eq!(machine.process_event(&'q'), Ok(false));
//! assert_eq!(machine.context(), Some(&1));
//! ```

pub mod chart;
mod chart_printer;
pub mod context;
pub mod descriptor;
mod dispatch;
pub mod error;
pub mod fn_state;
pub mod machine;
pub mod observer;
pub mod samples;
pub mod state;
mod transition;

pub use chart::{StateChart, MAX_DEPTH};
pub use context::ContextStack;
pub use descriptor::StateMachineDescriptor;
pub use error::{HsmError, HsmResult};
pub use fn_state::FnState;
pub use machine::{MachineView, StateMachine};
pub use observer::{Observer, Trace, TraceEntry};
pub use state::{HandleResult, Node, NotHandled, State, StateId, Transition};
