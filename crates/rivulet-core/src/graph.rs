#![forbid(unsafe_code)]

//! Arena of stream records and the edges between them.
//!
//! Every stream lives in a [`Graph`] slot addressed by a [`StreamId`]. Slots
//! are never reclaimed: closing a stream marks its record inert and removes it
//! from its parents' dependent lists, but the id stays valid so that handles
//! can still read the last value.
//!
//! # Invariants
//!
//! 1. Edges are mirrored: `a.dependents` contains an edge to `b` iff `a` is
//!    listed in `b.parents` (until `b` is closed, after which only the
//!    `parents` side may remain).
//! 2. The dependent relation is acyclic. [`Graph::reaches`] is consulted before
//!    every link.
//! 3. Each owner record is immediately followed by its end record. End records
//!    have `owner` set and no end record of their own.
//! 4. `Closed` is terminal.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::signal::Update;

/// Type-erased stream value. Shared so a transform can read its input without
/// holding a borrow of the arena.
pub(crate) type Value = Rc<dyn Any>;

/// Type-erased edge transform: parent value in, update for the dependent out.
pub(crate) type Transform = Rc<dyn Fn(&dyn Any) -> Update<Value>>;

/// Stable handle of a stream record inside its runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(usize);

impl StreamId {
    /// Raw arena index.
    #[must_use]
    pub const fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Lifecycle of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StreamState {
    /// Terminated. Accepts no values and notifies nobody.
    Closed = 0,
    /// Created without a value and not yet set.
    Pending = 1,
    /// Holds a value and is at rest.
    Active = 2,
    /// Just received a value; its dependents are being brought up to date.
    Changing = 3,
}

impl StreamState {
    /// Whether the stream has ever held a value.
    #[must_use]
    pub const fn has_value(self) -> bool {
        matches!(self, Self::Active | Self::Changing)
    }
}

/// One outgoing edge: the dependent and how to derive its value.
#[derive(Clone)]
pub(crate) struct Edge {
    pub target: StreamId,
    pub transform: Transform,
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge").field("target", &self.target).finish()
    }
}

#[derive(Debug)]
pub(crate) struct Node {
    pub value: Option<Value>,
    pub state: StreamState,
    /// Recompute on every firing parent instead of waiting for all of them.
    pub immediate: bool,
    pub parents: Vec<StreamId>,
    pub dependents: Vec<Edge>,
    /// End record of this stream. `None` for end records themselves.
    pub end: Option<StreamId>,
    /// Stream terminated by this record. `Some` only for end records.
    pub owner: Option<StreamId>,
}

impl Node {
    fn new(value: Option<Value>) -> Self {
        let state = if value.is_some() {
            StreamState::Active
        } else {
            StreamState::Pending
        };
        Self {
            value,
            state,
            immediate: false,
            parents: Vec::new(),
            dependents: Vec::new(),
            end: None,
            owner: None,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    /// Allocate a stream record together with its end record.
    pub fn insert(&mut self, value: Option<Value>) -> StreamId {
        let id = StreamId(self.nodes.len());
        let end_id = StreamId(id.0 + 1);

        let mut node = Node::new(value);
        node.end = Some(end_id);
        self.nodes.push(node);

        let mut end = Node::new(Some(Rc::new(false)));
        end.owner = Some(id);
        self.nodes.push(end);

        id
    }

    pub fn node(&self, id: StreamId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: StreamId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_closed(&self, id: StreamId) -> bool {
        self.node(id).state == StreamState::Closed
    }

    /// Closed, or the end record of a closed stream. Both ignore writes.
    pub fn is_sealed(&self, id: StreamId) -> bool {
        self.is_closed(id)
            || self
                .node(id)
                .owner
                .is_some_and(|owner| self.is_closed(owner))
    }

    /// Whether `to` is reachable from `from` along dependent edges.
    pub fn reaches(&self, from: StreamId, to: StreamId) -> bool {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if std::mem::replace(&mut seen[id.0], true) {
                continue;
            }
            stack.extend(self.node(id).dependents.iter().map(|edge| edge.target));
        }
        false
    }

    /// Register `dependent` under `parent`. Caller checks for cycles.
    pub fn link(&mut self, parent: StreamId, dependent: StreamId, transform: Transform) {
        self.node_mut(parent).dependents.push(Edge {
            target: dependent,
            transform,
        });
        self.node_mut(dependent).parents.push(parent);
    }

    /// Unlink `id` from its parents, drop its dependents, and mark it closed.
    ///
    /// Returns `false` if it was already closed.
    pub fn detach(&mut self, id: StreamId) -> bool {
        if self.is_closed(id) {
            return false;
        }
        let parents = self.node(id).parents.clone();
        for parent in parents {
            self.node_mut(parent)
                .dependents
                .retain(|edge| edge.target != id);
        }
        let node = self.node_mut(id);
        node.dependents.clear();
        node.state = StreamState::Closed;
        true
    }
}
