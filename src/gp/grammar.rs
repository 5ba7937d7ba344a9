//! Grammar trees and their non-deterministic matcher.
//!
//! A grammar is a tree of [`NodeKind`]s stored in an arena. Nodes are
//! addressed by [`NodeId`] and link to their children by index, so genetic
//! operators can rewire subtrees by exchanging edges instead of moving
//! boxed values around.
//!
//! Matching is exhaustive: [`Grammar::parse`] returns every suffix of the
//! input that the grammar can leave behind after consuming some prefix.
//!
//! ```text
//! (cat (word "foo") (opt (word "bar")))
//!
//!   "foobar" -> ["bar", ""]      "foo" -> [""]      "fob" -> []
//! ```

// Partial-credit scores convert counters to floating point
#![allow(clippy::cast_precision_loss)]

use crate::error::{GrammarError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Match cost charged for a literal, independent of its payload length.
pub const LITERAL_SIZE: usize = 16;

/// Stable index of a node inside a [`Grammar`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in its arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// The closed set of grammar node kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Match the first child, then the second child on what remains.
    Join,
    /// Match either child.
    Alternation,
    /// Match the child zero or one times.
    Optional,
    /// Match an exact byte prefix.
    Literal(Vec<u8>),
}

impl NodeKind {
    /// Number of children a node of this kind owns.
    #[must_use]
    pub const fn arity(&self) -> usize {
        match self {
            Self::Join | Self::Alternation => 2,
            Self::Optional => 1,
            Self::Literal(_) => 0,
        }
    }

    /// Symbolic name used in the printed form.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Join => "cat",
            Self::Alternation => "or",
            Self::Optional => "opt",
            Self::Literal(_) => "word",
        }
    }
}

/// Location of a subtree: the root, or one child slot of a parent node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The grammar root.
    Root,
    /// Child `index` of `parent`.
    Child {
        /// Owning node.
        parent: NodeId,
        /// Slot position, 0 or 1.
        index: usize,
    },
}

/// Counters accumulated during a single parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationContext {
    /// Number of literals that matched.
    pub match_count: usize,
    /// Sum of the sizes of every node visited.
    pub comparison_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    kind: NodeKind,
    children: [Option<NodeId>; 2],
}

impl Node {
    const fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: [None, None],
        }
    }
}

/// An arena-backed grammar tree.
///
/// Only slots below a node's arity are live. Mutation may leave stale
/// links above the arity or vacant live slots until
/// [`repair`](crate::gp::repair) restores the invariant. A vacant live
/// slot matches the empty string.
#[derive(Debug, Serialize, Deserialize)]
pub struct Grammar {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Grammar {
    /// Create a grammar consisting of a single node.
    ///
    /// Child slots of the node start out vacant.
    #[must_use]
    pub fn from_kind(kind: NodeKind) -> Self {
        Self {
            nodes: vec![Node::new(kind)],
            root: NodeId(0),
        }
    }

    /// A literal leaf.
    #[must_use]
    pub fn literal(word: impl Into<Vec<u8>>) -> Self {
        Self::from_kind(NodeKind::Literal(word.into()))
    }

    /// `first` followed by `second`.
    #[must_use]
    pub fn join(first: &Self, second: &Self) -> Self {
        Self::with_children(NodeKind::Join, &[first, second])
    }

    /// `first` or `second`.
    #[must_use]
    pub fn alternation(first: &Self, second: &Self) -> Self {
        Self::with_children(NodeKind::Alternation, &[first, second])
    }

    /// `inner`, zero or one times.
    #[must_use]
    pub fn optional(inner: &Self) -> Self {
        Self::with_children(NodeKind::Optional, &[inner])
    }

    fn with_children(kind: NodeKind, children: &[&Self]) -> Self {
        let mut grammar = Self::from_kind(kind);
        let root = grammar.root;
        for (index, child) in children.iter().enumerate() {
            grammar.graft(Slot::Child { parent: root, index }, child);
        }
        grammar
    }

    /// The root node.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Kind of the node `id`.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    /// Occupant of child slot `index` of `id`, live or stale.
    #[must_use]
    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.nodes[id.0].children.get(index).copied().flatten()
    }

    /// Occupant of `slot`.
    #[must_use]
    pub fn get(&self, slot: Slot) -> Option<NodeId> {
        match slot {
            Slot::Root => Some(self.root),
            Slot::Child { parent, index } => self.child(parent, index),
        }
    }

    pub(crate) fn set(&mut self, slot: Slot, id: NodeId) {
        match slot {
            Slot::Root => self.root = id,
            Slot::Child { parent, index } => self.nodes[parent.0].children[index] = Some(id),
        }
    }

    pub(crate) fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.0].kind = kind;
    }

    pub(crate) fn clear_child(&mut self, id: NodeId, index: usize) {
        self.nodes[id.0].children[index] = None;
    }

    /// Append a detached node and return its id.
    pub(crate) fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(kind));
        id
    }

    /// Live child slots of `id`, in order.
    pub(crate) fn live_children(&self, id: NodeId) -> impl Iterator<Item = Option<NodeId>> + '_ {
        let node = &self.nodes[id.0];
        node.children.iter().take(node.kind.arity()).copied()
    }

    /// Match cost of the whole tree.
    ///
    /// One per node, except that an optional node counts its child twice
    /// and a literal costs [`LITERAL_SIZE`].
    #[must_use]
    pub fn size(&self) -> usize {
        self.sizes()[self.root.0]
    }

    fn sizes(&self) -> Vec<usize> {
        fn fill(grammar: &Grammar, id: NodeId, sizes: &mut [usize]) -> usize {
            let children: usize = grammar
                .live_children(id)
                .flatten()
                .map(|child| fill(grammar, child, sizes))
                .sum();
            let size = match grammar.nodes[id.0].kind {
                NodeKind::Literal(_) => LITERAL_SIZE,
                NodeKind::Optional => 1 + 2 * children,
                NodeKind::Join | NodeKind::Alternation => 1 + children,
            };
            sizes[id.0] = size;
            size
        }

        let mut sizes = vec![0; self.nodes.len()];
        fill(self, self.root, &mut sizes);
        sizes
    }

    /// Number of nodes reachable from the root through live slots.
    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            count += 1;
            stack.extend(self.live_children(id).flatten());
        }
        count
    }

    /// Length of the longest root-to-leaf path, counted in nodes.
    #[must_use]
    pub fn depth(&self) -> usize {
        fn depth_of(grammar: &Grammar, id: NodeId) -> usize {
            1 + grammar
                .live_children(id)
                .flatten()
                .map(|child| depth_of(grammar, child))
                .max()
                .unwrap_or(0)
        }
        depth_of(self, self.root)
    }

    /// Every suffix of `input` left after the grammar consumes a prefix.
    ///
    /// Each visited node adds its size to `ctx.comparison_count`; each
    /// literal hit increments `ctx.match_count`. A join parses its second
    /// child once per continuation of its first, so the same suffix may
    /// appear more than once.
    pub fn parse<'a>(&self, input: &'a [u8], ctx: &mut EvaluationContext) -> Vec<&'a [u8]> {
        let sizes = self.sizes();
        self.parse_node(self.root, input, &sizes, ctx)
    }

    fn parse_slot<'a>(
        &self,
        slot: Option<NodeId>,
        input: &'a [u8],
        sizes: &[usize],
        ctx: &mut EvaluationContext,
    ) -> Vec<&'a [u8]> {
        match slot {
            Some(id) => self.parse_node(id, input, sizes, ctx),
            None => vec![input],
        }
    }

    fn parse_node<'a>(
        &self,
        id: NodeId,
        input: &'a [u8],
        sizes: &[usize],
        ctx: &mut EvaluationContext,
    ) -> Vec<&'a [u8]> {
        ctx.comparison_count += sizes[id.0];
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Literal(word) => match input.strip_prefix(word.as_slice()) {
                Some(rest) => {
                    ctx.match_count += 1;
                    vec![rest]
                }
                None => Vec::new(),
            },
            NodeKind::Join => {
                let firsts = self.parse_slot(node.children[0], input, sizes, ctx);
                let mut candidates = Vec::new();
                for rest in firsts {
                    candidates.extend(self.parse_slot(node.children[1], rest, sizes, ctx));
                }
                candidates
            }
            NodeKind::Alternation => {
                let mut candidates = self.parse_slot(node.children[0], input, sizes, ctx);
                candidates.extend(self.parse_slot(node.children[1], input, sizes, ctx));
                candidates
            }
            NodeKind::Optional => {
                let mut candidates = self.parse_slot(node.children[0], input, sizes, ctx);
                candidates.push(input);
                candidates
            }
        }
    }

    /// Whether the grammar can consume all of `input`.
    #[must_use]
    pub fn matches(&self, input: &[u8]) -> bool {
        let mut ctx = EvaluationContext::default();
        self.parse(input, &mut ctx).iter().any(|rest| rest.is_empty())
    }

    /// Score `input`: 1.0 on a full match, otherwise partial credit in
    /// `[0, 1)` that grows with the number of literal hits.
    #[must_use]
    pub fn evaluate(&self, input: &[u8]) -> f64 {
        self.evaluate_with(input).0
    }

    /// Like [`evaluate`](Self::evaluate), also returning the parse counters.
    #[must_use]
    pub fn evaluate_with(&self, input: &[u8]) -> (f64, EvaluationContext) {
        let mut ctx = EvaluationContext::default();
        let candidates = self.parse(input, &mut ctx);
        let score = if candidates.iter().any(|rest| rest.is_empty()) {
            1.0
        } else {
            let hits = ctx.match_count as f64;
            hits / (hits + 1.0)
        };
        (score, ctx)
    }

    /// Deep copy of the subtree rooted at `id` into a fresh, compact arena.
    #[must_use]
    pub fn subtree(&self, id: NodeId) -> Self {
        let mut nodes = Vec::new();
        let root = self.copy_into(id, &mut nodes);
        Self { nodes, root }
    }

    fn copy_into(&self, id: NodeId, nodes: &mut Vec<Node>) -> NodeId {
        let source = &self.nodes[id.0];
        let copy = NodeId(nodes.len());
        nodes.push(Node::new(source.kind.clone()));
        for (index, child) in source.children.iter().enumerate() {
            if let Some(child) = child {
                let child_copy = self.copy_into(*child, nodes);
                nodes[copy.0].children[index] = Some(child_copy);
            }
        }
        copy
    }

    /// Replace the occupant of `slot` with a copy of `donor`.
    ///
    /// The displaced subtree stays in the arena, unreachable, until the
    /// next [`compact`](Self::compact).
    pub(crate) fn graft(&mut self, slot: Slot, donor: &Self) {
        let id = donor.copy_into(donor.root, &mut self.nodes);
        self.set(slot, id);
    }

    /// Drop unreachable nodes from the arena.
    pub fn compact(&mut self) {
        *self = self.subtree(self.root);
    }

    /// Check that a deserialized arena is a well-formed tree.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::PreconditionViolation`] if an index is out of
    /// range or a node is reachable along more than one path.
    pub fn validate(&self) -> Result<()> {
        let len = self.nodes.len();
        if self.root.0 >= len {
            return Err(GrammarError::precondition(format!(
                "root {} outside arena of {len} nodes",
                self.root.0
            )));
        }
        let mut visited = vec![false; len];
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut visited[id.0], true) {
                return Err(GrammarError::precondition(format!(
                    "node {} is shared or part of a cycle",
                    id.0
                )));
            }
            for child in self.nodes[id.0].children.iter().flatten() {
                if child.0 >= len {
                    return Err(GrammarError::precondition(format!(
                        "node {} links to missing node {}",
                        id.0, child.0
                    )));
                }
                stack.push(*child);
            }
        }
        Ok(())
    }

    fn eq_at(&self, id: NodeId, other: &Self, other_id: NodeId) -> bool {
        let kind = self.kind(id);
        if kind != other.kind(other_id) {
            return false;
        }
        self.live_children(id)
            .zip(other.live_children(other_id))
            .all(|pair| match pair {
                (Some(a), Some(b)) => self.eq_at(a, other, b),
                (None, None) => true,
                _ => false,
            })
    }

    fn fmt_slot(&self, slot: Option<NodeId>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(id) = slot else {
            return f.write_str("()");
        };
        let kind = self.kind(id);
        if let NodeKind::Literal(word) = kind {
            return write!(f, "({} \"{}\")", kind.name(), word.escape_ascii());
        }
        write!(f, "({}", kind.name())?;
        for child in self.live_children(id) {
            f.write_str(" ")?;
            self.fmt_slot(child, f)?;
        }
        f.write_str(")")
    }
}

impl Clone for Grammar {
    /// Deep, compacting copy. The copy shares no node with its source.
    fn clone(&self) -> Self {
        self.subtree(self.root)
    }
}

impl PartialEq for Grammar {
    /// Structural equality over live slots, independent of arena layout.
    fn eq(&self, other: &Self) -> bool {
        self.eq_at(self.root, other, other.root)
    }
}

impl Eq for Grammar {}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_slot(Some(self.root), f)
    }
}
