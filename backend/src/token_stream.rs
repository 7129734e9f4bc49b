// token_stream.rs — Handshake token insertion between buffer-sharing stages
//
// Rewrites the schedule so every shared buffer with at least one producer
// and one consumer also carries a depth-1 `i1` stream: producers write a
// token after finishing, consumers read it before starting. Downstream
// stream lowering then gives inter-stage completion ordering without
// touching the buffer accesses themselves.
//
// Preconditions: `schedule` passes `Schedule::validate`.
// Postconditions: rewritten nodes keep one body argument per channel
//                 operand and their non-token operands in original order.
// Failure modes: malformed schedules, inconsistent producer/consumer
//               membership, and buffer self-loops are rejected; the pass
//               never skips a violating buffer silently.
// Side effects: mutates `schedule` in place; replaced nodes get fresh
//               identifiers and the old ones become tombstones.

use std::fmt;

use crate::dataflow::{BodyOp, BodyOpKind, ChannelId, Node, NodeId, Schedule, ScheduleError};
use crate::ir::{ConstValue, ScalarType};

// ── Errors ───────────────────────────────────────────────────────────────

/// Which side of a buffer a node was claimed to be on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => write!(f, "producer"),
            Role::Consumer => write!(f, "consumer"),
        }
    }
}

/// Hard failures of the insertion pass.
#[derive(Debug)]
pub enum TokenStreamError {
    /// The schedule failed well-formedness validation.
    Malformed(ScheduleError),
    /// A node in a buffer's membership set does not actually reference it.
    InconsistentReference {
        buffer: ChannelId,
        node: NodeId,
        role: Role,
    },
    /// A node both produces and consumes the same buffer; a token here
    /// would deadlock the node against itself.
    SelfLoop { buffer: ChannelId, node: NodeId },
}

impl fmt::Display for TokenStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenStreamError::Malformed(err) => {
                write!(f, "schedule failed validation: {}", err)
            }
            TokenStreamError::InconsistentReference { buffer, node, role } => {
                write!(
                    f,
                    "channel {}: node {} listed as {} but does not reference it",
                    buffer.0, node.0, role
                )
            }
            TokenStreamError::SelfLoop { buffer, node } => {
                write!(
                    f,
                    "channel {}: node {} both produces and consumes it",
                    buffer.0, node.0
                )
            }
        }
    }
}

impl std::error::Error for TokenStreamError {}

// ── Report and certificate ───────────────────────────────────────────────

/// What the pass did, for logging and post-hoc verification.
#[derive(Debug, Clone)]
pub struct TokenStreamReport {
    /// Streams created by the pass, one per rewritten buffer, in buffer
    /// declaration order.
    pub tokens: Vec<ChannelId>,
    pub producers_rewritten: usize,
    pub consumers_rewritten: usize,
}

/// Machine-checkable evidence that the pass postconditions hold.
#[derive(Debug, Clone)]
pub struct TokenStreamCert {
    /// Each producer of a token writes it exactly once, after every
    /// compute stage in its body.
    pub trailing_write_per_producer: bool,
    /// Each consumer of a token reads it exactly once, before every
    /// compute stage in its body.
    pub leading_read_per_consumer: bool,
    /// Every live node keeps one body argument per channel operand.
    pub body_args_aligned: bool,
    pub tokens: Vec<ChannelId>,
}

impl TokenStreamCert {
    pub fn all_pass(&self) -> bool {
        self.trailing_write_per_producer && self.leading_read_per_consumer && self.body_args_aligned
    }

    /// Obligation list for reporting.
    pub fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            (
                "trailing_write_per_producer",
                self.trailing_write_per_producer,
            ),
            ("leading_read_per_consumer", self.leading_read_per_consumer),
            ("body_args_aligned", self.body_args_aligned),
        ]
    }
}

// ── Public entry points ──────────────────────────────────────────────────

/// Insert handshake token streams for every buffer with both producers
/// and consumers.
///
/// Buffers are visited in declaration order. Membership is recomputed per
/// buffer because rewriting for an earlier buffer may have replaced nodes
/// that also touch this one.
pub fn insert_token_streams(
    schedule: &mut Schedule,
) -> Result<TokenStreamReport, TokenStreamError> {
    schedule.validate().map_err(TokenStreamError::Malformed)?;

    let mut report = TokenStreamReport {
        tokens: Vec::new(),
        producers_rewritten: 0,
        consumers_rewritten: 0,
    };

    // Snapshot the buffer worklist up front; streams created below join
    // the declaration order but must not join this loop.
    let buffers: Vec<ChannelId> = schedule.buffers().collect();

    for buffer in buffers {
        let producers = schedule.producers_of(buffer);
        let consumers = schedule.consumers_of(buffer);
        if producers.is_empty() || consumers.is_empty() {
            continue;
        }
        if let Some(&node) = producers.iter().find(|p| consumers.contains(p)) {
            return Err(TokenStreamError::SelfLoop { buffer, node });
        }

        let token = schedule.insert_stream_after(buffer, ScalarType::int(1), 1);
        report.tokens.push(token);

        for node in producers {
            rewrite_producer(schedule, buffer, token, node)?;
            report.producers_rewritten += 1;
        }
        for node in consumers {
            rewrite_consumer(schedule, buffer, token, node)?;
            report.consumers_rewritten += 1;
        }
    }

    Ok(report)
}

/// Re-derive the pass postconditions from the rewritten schedule.
pub fn verify_token_streams(schedule: &Schedule, report: &TokenStreamReport) -> TokenStreamCert {
    let mut trailing_writes = true;
    let mut leading_reads = true;
    for &token in &report.tokens {
        let producers = schedule.producers_of(token);
        let consumers = schedule.consumers_of(token);
        trailing_writes &= !producers.is_empty();
        leading_reads &= !consumers.is_empty();
        for id in producers {
            if let Some(node) = schedule.node(id) {
                trailing_writes &= producer_writes_token_last(node, token);
            }
        }
        for id in consumers {
            if let Some(node) = schedule.node(id) {
                leading_reads &= consumer_reads_token_first(node, token);
            }
        }
    }
    let args_aligned = schedule
        .live_nodes()
        .all(|(_, n)| n.body.args.len() == n.inputs.len() + n.outputs.len());

    TokenStreamCert {
        trailing_write_per_producer: trailing_writes,
        leading_read_per_consumer: leading_reads,
        body_args_aligned: args_aligned,
        tokens: report.tokens.clone(),
    }
}

// ── Rewrites ─────────────────────────────────────────────────────────────

/// Rebuild one producer: the token joins the outputs at the buffer's
/// position, and an unconditional `true` write lands at the body's end.
fn rewrite_producer(
    schedule: &mut Schedule,
    buffer: ChannelId,
    token: ChannelId,
    id: NodeId,
) -> Result<(), TokenStreamError> {
    let node = match schedule.node(id) {
        Some(n) => n.clone(),
        None => {
            return Err(TokenStreamError::InconsistentReference {
                buffer,
                node: id,
                role: Role::Producer,
            })
        }
    };
    let out_idx = match node.outputs.iter().position(|&c| c == buffer) {
        Some(i) => i,
        None => {
            return Err(TokenStreamError::InconsistentReference {
                buffer,
                node: id,
                role: Role::Producer,
            })
        }
    };

    let mut fresh = node;
    fresh.outputs.insert(out_idx, token);
    let token_arg = schedule.alloc_body_value();
    fresh.body.args.insert(fresh.inputs.len() + out_idx, token_arg);

    let flag = schedule.alloc_body_value();
    fresh.body.ops.push(BodyOp {
        kind: BodyOpKind::Constant(ConstValue::Bool(true)),
        operands: Vec::new(),
        results: vec![flag],
    });
    fresh.body.ops.push(BodyOp {
        kind: BodyOpKind::StreamWrite,
        operands: vec![token_arg, flag],
        results: Vec::new(),
    });

    schedule.replace_node(id, fresh);
    Ok(())
}

/// Rebuild one consumer: the token joins the inputs at the buffer's
/// position with a zero tap, and a blocking read opens the body.
fn rewrite_consumer(
    schedule: &mut Schedule,
    buffer: ChannelId,
    token: ChannelId,
    id: NodeId,
) -> Result<(), TokenStreamError> {
    let node = match schedule.node(id) {
        Some(n) => n.clone(),
        None => {
            return Err(TokenStreamError::InconsistentReference {
                buffer,
                node: id,
                role: Role::Consumer,
            })
        }
    };
    let in_idx = match node.inputs.iter().position(|&c| c == buffer) {
        Some(i) => i,
        None => {
            return Err(TokenStreamError::InconsistentReference {
                buffer,
                node: id,
                role: Role::Consumer,
            })
        }
    };

    let mut fresh = node;
    fresh.inputs.insert(in_idx, token);
    fresh.input_taps.insert(in_idx, 0);
    let token_arg = schedule.alloc_body_value();
    fresh.body.args.insert(in_idx, token_arg);
    fresh.body.ops.insert(
        0,
        BodyOp {
            kind: BodyOpKind::StreamRead,
            operands: vec![token_arg],
            results: Vec::new(),
        },
    );

    schedule.replace_node(id, fresh);
    Ok(())
}

// ── Verification helpers ─────────────────────────────────────────────────

fn producer_writes_token_last(node: &Node, token: ChannelId) -> bool {
    let arg = match node.outputs.iter().position(|&c| c == token) {
        Some(idx) => match node.body.args.get(node.inputs.len() + idx) {
            Some(&a) => a,
            None => return false,
        },
        None => return false,
    };
    let mut write_positions = Vec::new();
    let mut last_compute: Option<usize> = None;
    for (i, op) in node.body.ops.iter().enumerate() {
        match &op.kind {
            BodyOpKind::StreamWrite if op.operands.first() == Some(&arg) => {
                write_positions.push(i)
            }
            BodyOpKind::Compute { .. } => last_compute = Some(i),
            _ => {}
        }
    }
    write_positions.len() == 1 && last_compute.map_or(true, |c| write_positions[0] > c)
}

fn consumer_reads_token_first(node: &Node, token: ChannelId) -> bool {
    let arg = match node.inputs.iter().position(|&c| c == token) {
        Some(idx) => match node.body.args.get(idx) {
            Some(&a) => a,
            None => return false,
        },
        None => return false,
    };
    let mut read_positions = Vec::new();
    let mut first_compute: Option<usize> = None;
    for (i, op) in node.body.ops.iter().enumerate() {
        match &op.kind {
            BodyOpKind::StreamRead if op.operands.first() == Some(&arg) => read_positions.push(i),
            BodyOpKind::Compute { .. } if first_compute.is_none() => first_compute = Some(i),
            _ => {}
        }
    }
    read_positions.len() == 1 && first_compute.map_or(true, |c| read_positions[0] < c)
}

// ── Tests ────────────────────────────────────────────────────────────────
