use crate::error::{HsmError, HsmResult};
use crate::state::{Node, State, StateId};

/// Deepest depth a chart state may sit at.  Root states are at depth 1.
///
/// This bounds the transition path buffer and the context stack's presence bits, so charts that
/// would go deeper are rejected as states are added.
pub const MAX_DEPTH: usize = 32;

pub(crate) type BoxedState<C, E> = Box<dyn State<Context = C, Event = E> + Send + Sync>;

/// The static tree of states a machine runs.
///
/// States live in an arena and refer to each other by [`StateId`].  A chart is only ever read
/// once machines are running, so wrap it in an `Arc` to share it between machines (and threads).
pub struct StateChart<C, E> {
  pub(crate) nodes: Vec<StateNode<C, E>>,
}

pub(crate) struct StateNode<C, E> {
  pub(crate) name: String,
  /// `None` when the enclosing state is the implicit top.
  pub(crate) parent: Option<StateId>,
  pub(crate) depth: usize,
  pub(crate) initial: Option<StateId>,
  pub(crate) state: BoxedState<C, E>,
}

impl<C, E> Default for StateChart<C, E> {
  fn default() -> Self {
    Self::new()
  }
}

impl<C, E> StateChart<C, E> {
  pub fn new() -> Self {
    Self { nodes: vec![] }
  }

  pub fn add_root<S>(&mut self, name: impl Into<String>, state: S) -> HsmResult<StateId>
      where S: State<Context = C, Event = E> + Send + Sync + 'static {
    self.add_state(name, None, state)
  }

  pub fn add_child<S>(&mut self, parent: StateId, name: impl Into<String>, state: S) -> HsmResult<StateId>
      where S: State<Context = C, Event = E> + Send + Sync + 'static {
    self.add_state(name, Some(parent), state)
  }

  pub fn add_state<S>(
    &mut self,
    name: impl Into<String>,
    parent: Option<StateId>,
    state: S) -> HsmResult<StateId>
      where S: State<Context = C, Event = E> + Send + Sync + 'static {
    let name = name.into();
    let depth = match parent {
      Some(parent_id) => self.node(parent_id)?.depth + 1,
      None => 1,
    };
    if depth > MAX_DEPTH {
      return Err(HsmError::TooDeep { name, depth, max: MAX_DEPTH });
    }
    let id = StateId(self.nodes.len());
    self.nodes.push(StateNode {
      name,
      parent,
      depth,
      initial: None,
      state: Box::new(state),
    });
    Ok(id)
  }

  /// Designate `initial` as the state entered right after `state`.
  ///
  /// Only the existence of both states is checked here.  An `initial` that isn't a direct child
  /// is caught by [`validate`](Self::validate), or by the machine when it tries to init into it.
  pub fn set_initial(&mut self, state: StateId, initial: StateId) -> HsmResult<()> {
    self.node(initial)?;
    let node = self.nodes.get_mut(state.0).ok_or(HsmError::UnknownState(state))?;
    node.initial = Some(initial);
    Ok(())
  }

  /// Check that every initial link points at a direct child.
  pub fn validate(&self) -> HsmResult<()> {
    for (index, node) in self.nodes.iter().enumerate() {
      if let Some(initial) = node.initial {
        let child = self.node(initial)?;
        if child.parent != Some(StateId(index)) {
          return Err(HsmError::MalformedInitial {
            state: node.name.clone(),
            initial: child.name.clone(),
          });
        }
      }
    }
    Ok(())
  }

  pub(crate) fn node(&self, id: StateId) -> HsmResult<&StateNode<C, E>> {
    self.nodes.get(id.0).ok_or(HsmError::UnknownState(id))
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn contains(&self, id: StateId) -> bool {
    id.0 < self.nodes.len()
  }

  pub fn name(&self, id: StateId) -> Option<&str> {
    self.nodes.get(id.0).map(|n| n.name.as_str())
  }

  /// Names pseudo-states too, for logging and traces.
  pub fn node_name(&self, node: Node) -> &str {
    match node {
      Node::Top => "Top",
      Node::Terminated => "Terminated",
      Node::Error => "Error",
      Node::State(id) => self.name(id).unwrap_or("<unknown>"),
    }
  }

  /// The enclosing node of `id`, which is [`Node::Top`] for root states.
  pub fn parent(&self, id: StateId) -> Option<Node> {
    self.nodes.get(id.0).map(|n| Node::from_parent(n.parent))
  }

  pub fn depth(&self, id: StateId) -> Option<usize> {
    self.nodes.get(id.0).map(|n| n.depth)
  }

  pub fn initial(&self, id: StateId) -> Option<StateId> {
    self.nodes.get(id.0).and_then(|n| n.initial)
  }

  /// First state carrying `name`.  Names are labels, so duplicates are allowed.
  pub fn find_state(&self, name: &str) -> Option<StateId> {
    self.nodes.iter().position(|n| n.name == name).map(StateId)
  }

  /// Direct children of `parent` (`None` for the root states), in insertion order.
  pub fn children(&self, parent: Option<StateId>) -> impl Iterator<Item = StateId> + '_ {
    self.nodes
        .iter()
        .enumerate()
        .filter(move |(_, n)| n.parent == parent)
        .map(|(index, _)| StateId(index))
  }

  /// Depth of a position while walking the tree, counting the top as 0.
  pub(crate) fn position_depth(&self, position: Option<StateId>) -> HsmResult<usize> {
    match position {
      Some(id) => Ok(self.node(id)?.depth),
      None => Ok(0),
    }
  }
}
