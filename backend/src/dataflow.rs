// dataflow.rs — Scheduled dataflow graph model
//
// Holds the schedule produced by dataflow partitioning: channels (shared
// buffers and FIFO streams) plus node actors with single-block bodies.
// Rewrite passes replace nodes wholesale; the arena keeps replaced nodes as
// tombstones so stale identifiers fail loudly instead of aliasing.
//
// Preconditions: none (types and builders only).
// Postconditions: builder-produced nodes have one body argument per input
//                 and output channel, inputs first.
// Failure modes: `validate` reports malformed nodes as `ScheduleError`.
// Side effects: none.

use std::collections::HashSet;
use std::fmt;

use crate::ir::{ConstValue, ScalarType};

// ── Identifiers ──────────────────────────────────────────────────────────

/// Unique identifier for a channel within a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u32);

/// Unique identifier for a node within a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Unique identifier for a value inside node bodies.
///
/// Allocated schedule-wide so that rebuilding a node never renumbers the
/// values its body already references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyValueId(pub u32);

// ── Channels ─────────────────────────────────────────────────────────────

/// A shared memory buffer with static extents.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferInfo {
    pub elem: ScalarType,
    pub shape: Vec<u64>,
}

/// A FIFO stream channel.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub elem: ScalarType,
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Channel {
    Buffer(BufferInfo),
    Stream(StreamInfo),
}

impl Channel {
    pub fn is_buffer(&self) -> bool {
        matches!(self, Channel::Buffer(_))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Channel::Stream(_))
    }
}

// ── Node bodies ──────────────────────────────────────────────────────────

/// Operations inside a node body.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyOpKind {
    /// Blocking read from the stream named by `operands[0]`.
    StreamRead,
    /// Blocking write of `operands[1]` into the stream named by `operands[0]`.
    StreamWrite,
    /// Constant materialization into `results[0]`.
    Constant(ConstValue),
    /// A computation stage, opaque to schedule rewrites.
    Compute { name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodyOp {
    pub kind: BodyOpKind,
    pub operands: Vec<BodyValueId>,
    pub results: Vec<BodyValueId>,
}

/// A node's single-block body. `args` mirror the node's channel operands,
/// inputs first, then outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeBody {
    pub args: Vec<BodyValueId>,
    pub ops: Vec<BodyOp>,
}

// ── Nodes ────────────────────────────────────────────────────────────────

/// A compile-time parameter attached to a node. Rewrites carry parameters
/// over verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub value: ConstValue,
}

/// One schedule actor: channel operands, parameters, and a body.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub inputs: Vec<ChannelId>,
    pub outputs: Vec<ChannelId>,
    pub params: Vec<Param>,
    /// Per-input history offsets; same length as `inputs`.
    pub input_taps: Vec<u32>,
    /// Dataflow nesting level.
    pub level: u32,
    pub body: NodeBody,
}

// ── Errors ───────────────────────────────────────────────────────────────

/// Well-formedness violations found by `Schedule::validate`.
#[derive(Debug)]
pub enum ScheduleError {
    TapArityMismatch {
        node: NodeId,
        inputs: usize,
        taps: usize,
    },
    BodyArgMismatch {
        node: NodeId,
        expected: usize,
        actual: usize,
    },
    UnknownChannel {
        node: NodeId,
        channel: ChannelId,
    },
    UndefinedBodyValue {
        node: NodeId,
        op_index: usize,
    },
    RedefinedBodyValue {
        node: NodeId,
        op_index: usize,
    },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::TapArityMismatch { node, inputs, taps } => {
                write!(
                    f,
                    "node {}: {} inputs but {} tap offsets",
                    node.0, inputs, taps
                )
            }
            ScheduleError::BodyArgMismatch {
                node,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "node {}: body has {} arguments, expected {} (inputs then outputs)",
                    node.0, actual, expected
                )
            }
            ScheduleError::UnknownChannel { node, channel } => {
                write!(f, "node {}: references unknown channel {}", node.0, channel.0)
            }
            ScheduleError::UndefinedBodyValue { node, op_index } => {
                write!(
                    f,
                    "node {}: body op {} uses a value defined nowhere above it",
                    node.0, op_index
                )
            }
            ScheduleError::RedefinedBodyValue { node, op_index } => {
                write!(f, "node {}: body op {} redefines a value", node.0, op_index)
            }
        }
    }
}

impl std::error::Error for ScheduleError {}

// ── Schedule ─────────────────────────────────────────────────────────────

/// The scheduled dataflow graph.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    /// Channel arena, indexed by `ChannelId`.
    channels: Vec<Channel>,
    /// Channels in declaration order.
    decl_order: Vec<ChannelId>,
    /// Node arena; replaced nodes become `None`.
    nodes: Vec<Option<Node>>,
    /// Live nodes in schedule order.
    node_order: Vec<NodeId>,
    next_body_value: u32,
}

impl Schedule {
    pub fn new() -> Self {
        Schedule::default()
    }

    // ── Construction ────────────────────────────────────────────────

    pub fn add_buffer(&mut self, elem: ScalarType, shape: Vec<u64>) -> ChannelId {
        self.push_channel(Channel::Buffer(BufferInfo { elem, shape }))
    }

    pub fn add_stream(&mut self, elem: ScalarType, depth: u32) -> ChannelId {
        self.push_channel(Channel::Stream(StreamInfo { elem, depth }))
    }

    /// Declare a stream immediately after `after` in declaration order.
    pub fn insert_stream_after(
        &mut self,
        after: ChannelId,
        elem: ScalarType,
        depth: u32,
    ) -> ChannelId {
        let id = ChannelId(self.channels.len() as u32);
        self.channels
            .push(Channel::Stream(StreamInfo { elem, depth }));
        let pos = self
            .decl_order
            .iter()
            .position(|&c| c == after)
            .expect("unknown channel in insert_stream_after");
        self.decl_order.insert(pos + 1, id);
        id
    }

    fn push_channel(&mut self, channel: Channel) -> ChannelId {
        let id = ChannelId(self.channels.len() as u32);
        self.channels.push(channel);
        self.decl_order.push(id);
        id
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        self.node_order.push(id);
        id
    }

    /// Hand out a fresh body value identifier.
    pub fn alloc_body_value(&mut self) -> BodyValueId {
        let id = BodyValueId(self.next_body_value);
        self.next_body_value += 1;
        id
    }

    /// Install `fresh` at `old`'s position in schedule order and tombstone
    /// `old`. Returns the replacement's identifier.
    pub fn replace_node(&mut self, old: NodeId, fresh: Node) -> NodeId {
        let pos = self
            .node_order
            .iter()
            .position(|&n| n == old)
            .expect("replaced node not in schedule order");
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(fresh));
        self.nodes[old.0 as usize] = None;
        self.node_order[pos] = id;
        id
    }

    // ── Lookup ──────────────────────────────────────────────────────

    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id.0 as usize]
    }

    /// The node for `id`, or `None` if it was replaced.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize).and_then(|n| n.as_ref())
    }

    pub fn decl_order(&self) -> &[ChannelId] {
        &self.decl_order
    }

    pub fn node_order(&self) -> &[NodeId] {
        &self.node_order
    }

    /// Buffer channels in declaration order.
    pub fn buffers(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.decl_order
            .iter()
            .copied()
            .filter(|&id| self.channel(id).is_buffer())
    }

    /// Live nodes in schedule order.
    pub fn live_nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.node_order
            .iter()
            .filter_map(|&id| self.nodes[id.0 as usize].as_ref().map(|n| (id, n)))
    }

    /// Nodes listing `channel` among their outputs, in schedule order.
    pub fn producers_of(&self, channel: ChannelId) -> Vec<NodeId> {
        self.live_nodes()
            .filter(|(_, n)| n.outputs.contains(&channel))
            .map(|(id, _)| id)
            .collect()
    }

    /// Nodes listing `channel` among their inputs, in schedule order.
    pub fn consumers_of(&self, channel: ChannelId) -> Vec<NodeId> {
        self.live_nodes()
            .filter(|(_, n)| n.inputs.contains(&channel))
            .map(|(id, _)| id)
            .collect()
    }

    // ── Validation ──────────────────────────────────────────────────

    /// Check node well-formedness: tap arity, body argument alignment,
    /// channel references, and body value definitions.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        for (id, node) in self.live_nodes() {
            if node.input_taps.len() != node.inputs.len() {
                return Err(ScheduleError::TapArityMismatch {
                    node: id,
                    inputs: node.inputs.len(),
                    taps: node.input_taps.len(),
                });
            }
            let expected = node.inputs.len() + node.outputs.len();
            if node.body.args.len() != expected {
                return Err(ScheduleError::BodyArgMismatch {
                    node: id,
                    expected,
                    actual: node.body.args.len(),
                });
            }
            for &ch in node.inputs.iter().chain(node.outputs.iter()) {
                if ch.0 as usize >= self.channels.len() {
                    return Err(ScheduleError::UnknownChannel {
                        node: id,
                        channel: ch,
                    });
                }
            }
            let mut defined: HashSet<BodyValueId> = node.body.args.iter().copied().collect();
            for (op_index, op) in node.body.ops.iter().enumerate() {
                for value in &op.operands {
                    if !defined.contains(value) {
                        return Err(ScheduleError::UndefinedBodyValue { node: id, op_index });
                    }
                }
                for value in &op.results {
                    if !defined.insert(*value) {
                        return Err(ScheduleError::RedefinedBodyValue { node: id, op_index });
                    }
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Schedule ({} channels, {} nodes)",
            self.decl_order.len(),
            self.node_order.len()
        )?;
        for &id in &self.decl_order {
            match self.channel(id) {
                Channel::Buffer(info) => {
                    write!(f, "  chan{}: buffer {}", id.0, info.elem)?;
                    for extent in &info.shape {
                        write!(f, "[{}]", extent)?;
                    }
                    writeln!(f)?;
                }
                Channel::Stream(info) => {
                    writeln!(
                        f,
                        "  chan{}: stream {} depth={}",
                        id.0, info.elem, info.depth
                    )?;
                }
            }
        }
        for (id, node) in self.live_nodes() {
            writeln!(
                f,
                "  node{}: {} in, {} out, level {}",
                id.0,
                node.inputs.len(),
                node.outputs.len(),
                node.level
            )?;
        }
        Ok(())
    }
}

// ── Node builder ─────────────────────────────────────────────────────────

/// Builds a node whose body arguments mirror its channel operands.
///
/// `compute` stages become body operations reading every input argument,
/// which is enough for rewrite passes that treat stage internals as opaque.
pub struct NodeBuilder<'s> {
    schedule: &'s mut Schedule,
    level: u32,
    inputs: Vec<ChannelId>,
    input_taps: Vec<u32>,
    outputs: Vec<ChannelId>,
    params: Vec<Param>,
    compute: Vec<String>,
}

impl<'s> NodeBuilder<'s> {
    pub fn new(schedule: &'s mut Schedule) -> Self {
        NodeBuilder {
            schedule,
            level: 0,
            inputs: Vec::new(),
            input_taps: Vec::new(),
            outputs: Vec::new(),
            params: Vec::new(),
            compute: Vec::new(),
        }
    }

    pub fn level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn input(self, channel: ChannelId) -> Self {
        self.input_tapped(channel, 0)
    }

    pub fn input_tapped(mut self, channel: ChannelId, tap: u32) -> Self {
        self.inputs.push(channel);
        self.input_taps.push(tap);
        self
    }

    pub fn output(mut self, channel: ChannelId) -> Self {
        self.outputs.push(channel);
        self
    }

    pub fn param(mut self, name: &str, value: ConstValue) -> Self {
        self.params.push(Param {
            name: name.into(),
            value,
        });
        self
    }

    pub fn compute(mut self, name: &str) -> Self {
        self.compute.push(name.into());
        self
    }

    pub fn finish(self) -> NodeId {
        let NodeBuilder {
            schedule,
            level,
            inputs,
            input_taps,
            outputs,
            params,
            compute,
        } = self;
        let args: Vec<BodyValueId> = (0..inputs.len() + outputs.len())
            .map(|_| schedule.alloc_body_value())
            .collect();
        let input_args = args[..inputs.len()].to_vec();
        let ops = compute
            .into_iter()
            .map(|name| BodyOp {
                kind: BodyOpKind::Compute { name },
                operands: input_args.clone(),
                results: Vec::new(),
            })
            .collect();
        schedule.add_node(Node {
            inputs,
            outputs,
            params,
            input_taps,
            level,
            body: NodeBody { args, ops },
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
