#![forbid(unsafe_code)]

//! Diamond-safe propagation.
//!
//! One call to [`Runtime::propagate`] is one *pass*: it brings every stream
//! reachable from the origin up to date after the origin received a value.
//!
//! # Algorithm
//!
//! 1. **Discovery.** Walk dependent edges from the origin, snapshotting each
//!    visited stream's edges. For every reachable dependent count the edges
//!    that reach it inside this pass; that count is its `waiting` value.
//! 2. **Settlement.** A LIFO worklist holds streams that are done for the
//!    pass, either with a new value (*fired*) or without one (skipped,
//!    closed, or all of their inputs skipped). A settled stream decrements
//!    `waiting` on each of its snapshot dependents and, if it fired, marks
//!    them `updating` and records itself as their trigger. A dependent whose
//!    `waiting` reaches zero is ready: it recomputes exactly once through the
//!    edge of its last firing parent, reading that parent's current value,
//!    and then settles.
//! 3. **Immediate streams.** An immediate stream recomputes inside the same
//!    worklist every time one of its parents fires, and relays each new value
//!    to its own immediate dependents. Towards regular dependents it behaves
//!    like any other parent: it settles once, after all of its own parents
//!    settled, and counts as fired if any of its recomputes stored a value.
//!
//! Newly scheduled work is pushed in reverse so that it is processed in
//! registration order, depth first.
//!
//! # Invariants
//!
//! 1. A non-immediate stream recomputes at most once per pass.
//! 2. Every recompute of a non-immediate stream happens after every parent
//!    reachable in this pass settled, so it never observes a half-updated
//!    parent set (no glitches), whether those parents are immediate or not.
//! 3. Streams whose inputs all skipped do not recompute and do not notify.
//! 4. `waiting`/`updating` live in the pass, so they are zero outside of one
//!    and nested passes never disturb each other's counts.
//! 5. No arena borrow is held while a transform runs.
//! 6. A pass never recurses: stack use is flat in the depth of the graph,
//!    immediate chains included.
//! 7. Streams that receive a value stay `Changing` until the pass ends.

use ahash::AHashMap;
use tracing::field;

use crate::error::Result;
use crate::graph::{Edge, StreamId, StreamState, Transform};
use crate::runtime::Runtime;
use crate::signal::Update;

/// Per-dependent bookkeeping for one pass.
#[derive(Default)]
struct Pending {
    /// Parents in this pass that have not settled yet.
    waiting: usize,
    immediate: bool,
    /// At least one settled parent fired.
    updating: bool,
    /// An immediate stream stored a value during this pass.
    fired: bool,
    /// Last firing parent and the edge to recompute through.
    trigger: Option<(StreamId, Transform)>,
}

enum Step {
    /// `id` is done for this pass.
    Settled {
        id: StreamId,
        fired: bool,
        immediate: bool,
    },
    /// `parent` just stored a value; recompute the immediate target now.
    Fire { parent: StreamId, edge: Edge },
    /// `parent` settled; count it off the target's `waiting`.
    Notify {
        parent: StreamId,
        edge: Edge,
        fired: bool,
    },
    /// Every in-pass parent of `id` settled.
    Ready { id: StreamId, pending: Pending },
}

struct Discovery {
    pending: AHashMap<StreamId, Pending>,
    downstream: AHashMap<StreamId, Vec<Edge>>,
}

/// Streams recomputed during a pass, put back to `Active` when it ends.
struct Settling<'a> {
    runtime: &'a Runtime,
    ids: Vec<StreamId>,
}

impl Drop for Settling<'_> {
    fn drop(&mut self) {
        self.runtime.finish_all(&self.ids);
    }
}

impl Runtime {
    /// Run one pass from `origin`, which has just stored a new value.
    pub(crate) fn propagate(&self, origin: StreamId) -> Result<()> {
        self.count_pass();
        let span = tracing::debug_span!(
            "stream.pass",
            origin = %origin,
            depth = self.depth(),
            reached = field::Empty,
            recomputed = field::Empty,
        );
        let _entered = span.enter();

        let Discovery {
            mut pending,
            mut downstream,
        } = self.discover(origin);
        span.record("reached", pending.len() as u64);

        let mut settling = Settling {
            runtime: self,
            ids: Vec::new(),
        };
        let mut recomputed = 0_u64;
        let mut stack = vec![Step::Settled {
            id: origin,
            fired: true,
            immediate: false,
        }];

        while let Some(step) = stack.pop() {
            match step {
                Step::Settled {
                    id,
                    fired,
                    immediate,
                } => {
                    let edges = downstream.remove(&id).unwrap_or_default();
                    let mut next = Vec::with_capacity(edges.len());
                    for edge in edges {
                        let Some(entry) = pending.get(&edge.target) else {
                            continue;
                        };
                        // An immediate parent already relayed each of its values.
                        if fired && !immediate && entry.immediate {
                            next.push(Step::Fire {
                                parent: id,
                                edge: edge.clone(),
                            });
                        }
                        next.push(Step::Notify {
                            parent: id,
                            edge,
                            fired,
                        });
                    }
                    stack.extend(next.into_iter().rev());
                }
                Step::Fire { parent, edge } => {
                    recomputed += 1;
                    if !self.recompute(edge.target, parent, &edge.transform)? {
                        continue;
                    }
                    settling.ids.push(edge.target);
                    if let Some(entry) = pending.get_mut(&edge.target) {
                        entry.fired = true;
                    }
                    let relay: Vec<Step> = downstream
                        .get(&edge.target)
                        .into_iter()
                        .flatten()
                        .filter(|next| pending.get(&next.target).is_some_and(|e| e.immediate))
                        .map(|next| Step::Fire {
                            parent: edge.target,
                            edge: next.clone(),
                        })
                        .collect();
                    stack.extend(relay.into_iter().rev());
                }
                Step::Notify {
                    parent,
                    edge,
                    fired,
                } => {
                    let Some(entry) = pending.get_mut(&edge.target) else {
                        continue;
                    };
                    entry.waiting = entry.waiting.saturating_sub(1);
                    if fired && !entry.immediate {
                        entry.updating = true;
                        entry.trigger = Some((parent, edge.transform));
                    }
                    if entry.waiting > 0 {
                        continue;
                    }
                    if let Some(entry) = pending.remove(&edge.target) {
                        stack.push(if entry.immediate {
                            Step::Settled {
                                id: edge.target,
                                fired: entry.fired,
                                immediate: true,
                            }
                        } else {
                            Step::Ready {
                                id: edge.target,
                                pending: entry,
                            }
                        });
                    }
                }
                Step::Ready { id, pending: entry } => {
                    let fired = match entry.trigger {
                        Some((parent, transform)) if entry.updating => {
                            recomputed += 1;
                            self.recompute(id, parent, &transform)?
                        }
                        _ => false,
                    };
                    if fired {
                        settling.ids.push(id);
                    }
                    stack.push(Step::Settled {
                        id,
                        fired,
                        immediate: false,
                    });
                }
            }
        }

        span.record("recomputed", recomputed);
        Ok(())
    }

    fn discover(&self, origin: StreamId) -> Discovery {
        let graph = self.graph();
        let mut pending: AHashMap<StreamId, Pending> = AHashMap::new();
        let mut downstream: AHashMap<StreamId, Vec<Edge>> = AHashMap::new();
        let mut stack = vec![origin];

        while let Some(id) = stack.pop() {
            if downstream.contains_key(&id) {
                continue;
            }
            let edges = graph.node(id).dependents.clone();
            for edge in &edges {
                let target = graph.node(edge.target);
                if target.state == StreamState::Closed {
                    continue;
                }
                let entry = pending.entry(edge.target).or_default();
                entry.waiting += 1;
                entry.immediate = target.immediate;
                if !downstream.contains_key(&edge.target) {
                    stack.push(edge.target);
                }
            }
            downstream.insert(id, edges);
        }

        Discovery {
            pending,
            downstream,
        }
    }

    /// Recompute `id` through the edge from `parent`.
    ///
    /// Returns whether `id` received a new value.
    fn recompute(&self, id: StreamId, parent: StreamId, transform: &Transform) -> Result<bool> {
        let (input, previous) = {
            let mut graph = self.graph_mut();
            if graph.is_sealed(id) {
                return Ok(false);
            }
            let Some(input) = graph.node(parent).value.clone() else {
                return Ok(false);
            };
            let node = graph.node_mut(id);
            let previous = node.state;
            node.state = StreamState::Changing;
            (input, previous)
        };

        tracing::trace!(stream = %id, parent = %parent, "stream.recompute");
        match transform(&*input) {
            Update::Value(value) => Ok(self.store(id, value)),
            Update::Skip => {
                self.restore(id, previous);
                Ok(false)
            }
            Update::End => {
                self.restore(id, previous);
                self.close(id)?;
                Ok(false)
            }
        }
    }
}
