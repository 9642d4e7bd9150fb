//! Text summary builder for CLI output.
//!
//! Formats a snapshot into human-readable lines for text mode.

use crate::model::RcSnapshot;
use crate::tree::Node;

/// Pre-formatted lines for text output.
pub struct TextSummary {
    pub lines: Vec<String>,
}

pub fn build_text_summary(snapshot: &RcSnapshot) -> TextSummary {
    let mut lines = Vec::new();
    let available: Vec<&str> = snapshot.available.iter().map(|a| a.name()).collect();
    lines.push(format!("State: {}", snapshot.state));
    lines.push(format!(
        "Available commands: {}",
        if available.is_empty() {
            "-".to_string()
        } else {
            available.join(", ")
        }
    ));
    lines.push(format!(
        "Run: {} ({})",
        snapshot.run_number, snapshot.run_type
    ));
    lines.push("Tree:".to_string());
    push_node(&mut lines, &snapshot.tree, 1);
    TextSummary { lines }
}

fn push_node(out: &mut Vec<String>, node: &Node, depth: usize) {
    out.push(format!("{}{} [{}]", "  ".repeat(depth), node.name, node.state));
    for child in &node.children {
        push_node(out, child, depth + 1);
    }
}
