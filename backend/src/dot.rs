// dot.rs — Graphviz DOT output for kernel schedules
//
// Transforms a Schedule into DOT format suitable for rendering with
// `dot`, `neato`, or other Graphviz layout engines.
//
// Preconditions: `schedule` is a fully constructed Schedule.
// Postconditions: returns a valid DOT string representing the schedule.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::Write;

use crate::dataflow::{BodyOpKind, Channel, Node, Schedule};

/// Emit the schedule as a Graphviz DOT string.
///
/// Channels and nodes are walked in declaration and schedule order, so the
/// output is deterministic for a given schedule.
pub fn emit_dot(schedule: &Schedule) -> String {
    let mut buf = String::new();
    writeln!(buf, "digraph khc {{").unwrap();
    writeln!(buf, "    rankdir=LR;").unwrap();
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];").unwrap();
    writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];").unwrap();

    writeln!(buf).unwrap();
    for &id in schedule.decl_order() {
        let attrs = channel_attrs(schedule.channel(id));
        writeln!(buf, "    chan{} [{attrs}];", id.0).unwrap();
    }

    writeln!(buf).unwrap();
    for (id, node) in schedule.live_nodes() {
        let label = node_label(node);
        writeln!(
            buf,
            "    node{} [shape=box, style=filled, fillcolor=lightblue, label=\"{label}\"];",
            id.0
        )
        .unwrap();
    }

    writeln!(buf).unwrap();
    for (id, node) in schedule.live_nodes() {
        for (input, &tap) in node.inputs.iter().zip(node.input_taps.iter()) {
            if tap > 0 {
                writeln!(
                    buf,
                    "    chan{} -> node{} [label=\"tap {}\"];",
                    input.0, id.0, tap
                )
                .unwrap();
            } else {
                writeln!(buf, "    chan{} -> node{};", input.0, id.0).unwrap();
            }
        }
        for output in &node.outputs {
            writeln!(buf, "    node{} -> chan{};", id.0, output.0).unwrap();
        }
    }

    writeln!(buf, "}}").unwrap();
    buf
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Return DOT attributes string for a channel.
fn channel_attrs(channel: &Channel) -> String {
    match channel {
        Channel::Buffer(info) => {
            let mut label = format!("{}", info.elem);
            for extent in &info.shape {
                let _ = write!(label, "[{}]", extent);
            }
            format!("shape=cylinder, style=filled, fillcolor=lightsalmon, label=\"{label}\"")
        }
        Channel::Stream(info) => {
            let label = format!("{} depth={}", info.elem, info.depth);
            format!("shape=diamond, style=filled, fillcolor=lightyellow, label=\"{label}\"")
        }
    }
}

/// Return the node label: its compute stages, or `pass` for a node with none.
fn node_label(node: &Node) -> String {
    let stages: Vec<&str> = node
        .body
        .ops
        .iter()
        .filter_map(|op| match &op.kind {
            BodyOpKind::Compute { name } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    let base = if stages.is_empty() {
        "pass".to_string()
    } else {
        stages.join("+")
    };
    if node.level > 0 {
        format!("{} (L{})", base, node.level)
    } else {
        base
    }
}
