use std::collections::HashMap;

use crate::error::LogError;
use crate::model::{
    MergedEvents, MessageId, NodeEvents, Outcome, Receipt, ResultRow, RunAnalysis,
};

/// How to settle two nodes logging a send for the same message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendConflict {
    KeepLast,
    KeepFirst,
    Error,
}

/// Folds per-node events into one view of the run. `nodes` must already be in
/// node-id order; the send conflict policy is applied in that order.
pub fn merge_nodes(
    nodes: Vec<NodeEvents>,
    policy: SendConflict,
) -> Result<MergedEvents, LogError> {
    let mut merged = MergedEvents::default();

    for mut node in nodes {
        if node.unreadable {
            merged.unreadable_logs += 1;
        }
        merged.sent_rows += node.sent_rows;
        merged.received_rows += node.received_rows;
        merged.skipped_rows += node.skipped_rows;

        for id in node.inbound_order.drain(..) {
            if let Some(timestamp) = node.inbound.remove(&id) {
                merged.inbound.entry(id).or_default().push(Receipt {
                    node_id: node.node_id.clone(),
                    timestamp,
                });
            }
        }

        for (id, entry) in node.outbound.iter() {
            if let Some(existing) = merged.outbound.get(id) {
                merged.send_collisions += 1;
                match policy {
                    SendConflict::KeepFirst => continue,
                    SendConflict::Error => {
                        return Err(LogError::DuplicateSend {
                            message_id: id.to_string(),
                            first_node: existing.node_id.clone(),
                            second_node: entry.node_id.clone(),
                        })
                    }
                    SendConflict::KeepLast => {
                        log::debug!(
                            "send of {} by {} replaces send by {}",
                            id,
                            entry.node_id,
                            existing.node_id
                        );
                    }
                }
            }
            merged.outbound.insert(id.clone(), entry.clone());
        }
    }

    Ok(merged)
}

/// Mean of `recv - send` over every receiver, in real arithmetic.
pub fn average_latency(send_timestamp: i64, received: &[i64]) -> Option<f64> {
    if received.is_empty() {
        return None;
    }
    let n = received.len() as i128;
    let sum: i128 = received.iter().map(|&t| t as i128).sum();
    Some((sum - n * send_timestamp as i128) as f64 / n as f64)
}

/// Produces one result row per outbound message, in outbound order. A resolved
/// message with fewer than `expected_receivers` receipts counts as partial.
pub fn correlate(merged: &MergedEvents, expected_receivers: usize) -> RunAnalysis {
    let mut run = RunAnalysis {
        expected_receivers,
        unreadable_logs: merged.unreadable_logs,
        sent_rows: merged.sent_rows,
        received_rows: merged.received_rows,
        skipped_rows: merged.skipped_rows,
        send_collisions: merged.send_collisions,
        ..Default::default()
    };

    for (id, entry) in merged.outbound.iter() {
        let receipts = inbound_for(&merged.inbound, id);
        let received: Vec<i64> = receipts.iter().map(|r| r.timestamp).collect();
        let outcome = match average_latency(entry.timestamp, &received) {
            Some(avg_ms) => {
                run.total_latency += avg_ms;
                run.resolved += 1;
                if receipts.len() < expected_receivers {
                    run.partial += 1;
                }
                Outcome::Latency {
                    avg_ms,
                    receivers: receipts.len(),
                }
            }
            None => {
                run.missing += 1;
                Outcome::Missing
            }
        };
        run.rows.push(ResultRow {
            send_timestamp: entry.timestamp,
            message_id: id.clone(),
            outcome,
            sent_by: entry.node_id.clone(),
            receipts: receipts.to_vec(),
        });
    }

    run
}

fn inbound_for<'a>(
    inbound: &'a HashMap<MessageId, Vec<Receipt>>,
    id: &MessageId,
) -> &'a [Receipt] {
    inbound.get(id).map(Vec::as_slice).unwrap_or(&[])
}
