//! Run the extended Samek chart over a string of single character events, printing what the
//! machine did after each one.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::info;

use hsm_statechart::samples::samek_plus::{self, SamekContext, DEFAULT_EVENTS};
use hsm_statechart::{StateMachine, Trace};

#[derive(Parser, Debug)]
#[clap(name = "samek_plus")]
struct Opts {
  /// Events to send, one per character.
  #[clap(short, long, default_value = DEFAULT_EVENTS)]
  events: String,

  #[clap(long)]
  print_chart: bool,

  /// Save the full trace as JSON.
  #[clap(long)]
  trace_out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
  env_logger::init();
  let opts: Opts = Opts::parse();

  let (chart, s0) = samek_plus::chart()?;
  chart.validate()?;
  if opts.print_chart {
    println!("{}", chart);
  }

  let trace = Trace::new();
  let mut machine = StateMachine::new("SamekPlus", Arc::new(chart)).with_observer(trace.clone());
  machine.start(s0, SamekContext::default())?;
  let mut recorded = trace.take();
  println!("start => {}", join(&recorded));

  for event in opts.events.chars() {
    if !machine.is_running() {
      info!("Machine stopped in [{}], ignoring the remaining events", machine.current_name());
      break;
    }
    machine.process_event(&event)?;
    let step = trace.take();
    println!("{} => {}", event, join(&step));
    recorded.extend(step);
  }

  if let Some(path) = opts.trace_out {
    let writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer(writer, &recorded)?;
    info!("Saved {} trace entries to {}", recorded.len(), path.display());
  }
  Ok(())
}

fn join(entries: &[hsm_statechart::TraceEntry]) -> String {
  entries.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(" ")
}
