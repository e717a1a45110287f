use std::fmt;

use crate::chart::StateChart;
use crate::state::StateId;

/// # Example output:
///
/// ```text
/// StateChart {
///   Active { => Stopped
///     Stopped
///     Running
///   }
/// }
/// ```
impl<C, E> fmt::Display for StateChart<C, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "StateChart {{")?;
    self.print_children(f, None, 1)?;
    write!(f, "}}")
  }
}

impl<C, E> StateChart<C, E> {
  fn print_children(&self, f: &mut fmt::Formatter<'_>, parent: Option<StateId>, indent: usize) -> fmt::Result {
    for id in self.children(parent) {
      let name = self.name(id).unwrap_or("<unknown>");
      let is_parent = self.children(Some(id)).next().is_some();
      write!(f, "{:width$}{}", "", name, width = indent * 2)?;
      if is_parent {
        write!(f, " {{")?;
      }
      if let Some(initial) = self.initial(id) {
        write!(f, " => {}", self.name(initial).unwrap_or("<unknown>"))?;
      }
      writeln!(f)?;

      if is_parent {
        self.print_children(f, Some(id), indent + 1)?;
        writeln!(f, "{:width$}}}", "", width = indent * 2)?;
      }
    }
    Ok(())
  }
}
