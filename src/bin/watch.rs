//! Stopwatch driven from stdin, one line per button press:
//!
//! * `1`: reset
//! * `2`: start/stop
//! * anything else: one tick of time

use std::io::{self, BufRead};

use clap::Parser;
use log::debug;

use hsm_statechart::samples::watch::{WatchEvent, WatchMachine};
use hsm_statechart::StateMachine;

#[derive(Parser, Debug)]
#[clap(name = "watch")]
struct Opts {
  /// Time added by each tick.
  #[clap(short, long, default_value = "1")]
  tick: u32,
}

fn main() -> anyhow::Result<()> {
  env_logger::init();
  let opts: Opts = Opts::parse();

  println!("Stop watch. Keys:\n\t'1': reset button\n\t'2': generic toggle button");
  let mut machine = StateMachine::start_from(WatchMachine::default())?;

  let stdin = io::stdin();
  for line in stdin.lock().lines() {
    if !machine.is_running() {
      break;
    }
    let event = match line?.trim() {
      "1" => WatchEvent::Reset,
      "2" => WatchEvent::Toggle,
      _ => WatchEvent::Tick(opts.tick),
    };
    let handled = machine.process_event(&event)?;
    debug!("{:?} handled: {}", event, handled);
    let elapsed = machine.context().map_or(0, |w| w.elapsed);
    println!("[{}] {}", machine.current_name(), elapsed);
  }
  Ok(())
}
