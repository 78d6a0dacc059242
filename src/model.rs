use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// Anything other than the literal `IN` counts as a send.
    pub fn from_field(s: &str) -> Self {
        if s == "IN" {
            Direction::In
        } else {
            Direction::Out
        }
    }
}

/// `entityId-digest`, the key correlating sends with receives across nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(entity_id: &str, digest: &str) -> Self {
        MessageId(format!("{}-{}", entity_id, digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn deserialize_trimmed_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.trim()
        .parse::<i64>()
        .map_err(|e| serde::de::Error::custom(format!("invalid integer '{}': {}", raw, e)))
}

/// One data row of a node log: `direction,timestamp,entityId,digest,x,y,z`.
#[derive(Debug, Deserialize)]
pub struct EventRow {
    pub direction: String,
    #[serde(deserialize_with = "deserialize_trimmed_i64")]
    pub timestamp: i64,
    pub entity_id: String,
    pub digest: String,
    pub x: String,
    pub y: String,
    pub z: String,
}

impl EventRow {
    pub const COLUMNS: usize = 7;

    pub fn direction(&self) -> Direction {
        Direction::from_field(&self.direction)
    }

    pub fn message_id(&self) -> MessageId {
        MessageId::new(&self.entity_id, &self.digest)
    }
}

/// First row of `config.csv`, kept as written; neither value is validated.
#[derive(Debug, Deserialize)]
pub struct ConfigHeader {
    pub node_count: String,
    pub duration: String,
}

/// Data rows of `config.csv`: `nodeName,nodeId`.
#[derive(Debug, Deserialize)]
pub struct NodeEntry {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Declared node count, if row 1 held an integer.
    pub node_count: Option<usize>,
    pub duration: String,
    /// node id -> node name; sorted so every merge walks nodes in the same order.
    pub nodes: BTreeMap<String, String>,
}

impl RunConfig {
    /// Receivers a fully delivered message reaches: every node but the sender.
    pub fn expected_receivers(&self) -> usize {
        self.node_count
            .unwrap_or(self.nodes.len())
            .saturating_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendEntry {
    pub timestamp: i64,
    pub node_id: String,
}

/// Send timestamps keyed by message, iterated in first-insertion order.
/// Overwriting an existing key keeps its original position.
#[derive(Debug, Clone, Default)]
pub struct SendLedger {
    order: Vec<MessageId>,
    entries: HashMap<MessageId, SendEntry>,
}

impl SendLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: MessageId, entry: SendEntry) -> Option<SendEntry> {
        match self.entries.get_mut(&id) {
            Some(existing) => Some(std::mem::replace(existing, entry)),
            None => {
                self.order.push(id.clone());
                self.entries.insert(id, entry);
                None
            }
        }
    }

    pub fn get(&self, id: &MessageId) -> Option<&SendEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MessageId, &SendEntry)> {
        self.order
            .iter()
            .filter_map(move |id| self.entries.get(id).map(|e| (id, e)))
    }
}

/// Everything one node's log contributed to a run.
#[derive(Debug, Default)]
pub struct NodeEvents {
    pub node_id: String,
    pub inbound: HashMap<MessageId, i64>,
    /// Insertion order of `inbound`, so merged receiver lists are reproducible.
    pub inbound_order: Vec<MessageId>,
    pub outbound: SendLedger,
    pub sent_rows: usize,
    pub received_rows: usize,
    pub skipped_rows: usize,
    pub unreadable: bool,
}

impl NodeEvents {
    pub fn new(node_id: &str) -> Self {
        NodeEvents {
            node_id: node_id.to_string(),
            ..Default::default()
        }
    }

    pub fn unreadable(node_id: &str) -> Self {
        NodeEvents {
            unreadable: true,
            ..NodeEvents::new(node_id)
        }
    }

    pub fn record_inbound(&mut self, id: MessageId, timestamp: i64) {
        self.received_rows += 1;
        if self.inbound.insert(id.clone(), timestamp).is_none() {
            self.inbound_order.push(id);
        }
    }

    pub fn record_outbound(&mut self, id: MessageId, timestamp: i64) {
        self.sent_rows += 1;
        self.outbound.insert(
            id,
            SendEntry {
                timestamp,
                node_id: self.node_id.clone(),
            },
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub node_id: String,
    pub timestamp: i64,
}

/// Per-run union of all node logs.
#[derive(Debug, Default)]
pub struct MergedEvents {
    /// Receipts per message, in node-id order.
    pub inbound: HashMap<MessageId, Vec<Receipt>>,
    pub outbound: SendLedger,
    pub unreadable_logs: usize,
    pub sent_rows: usize,
    pub received_rows: usize,
    pub skipped_rows: usize,
    pub send_collisions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Latency { avg_ms: f64, receivers: usize },
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub send_timestamp: i64,
    pub message_id: MessageId,
    pub outcome: Outcome,
    pub sent_by: String,
    pub receipts: Vec<Receipt>,
}

#[derive(Debug, Default)]
pub struct RunAnalysis {
    pub csv_dir: PathBuf,
    pub rows: Vec<ResultRow>,
    pub total_latency: f64,
    pub resolved: usize,
    pub missing: usize,
    /// Resolved messages that reached fewer than `expected_receivers` nodes.
    pub partial: usize,
    pub expected_receivers: usize,
    pub unreadable_logs: usize,
    pub sent_rows: usize,
    pub received_rows: usize,
    pub skipped_rows: usize,
    pub send_collisions: usize,
}

impl RunAnalysis {
    /// Mean of the per-message averages; `None` when nothing resolved.
    pub fn mean_latency(&self) -> Option<f64> {
        if self.resolved == 0 {
            None
        } else {
            Some(self.total_latency / self.resolved as f64)
        }
    }

    pub fn latencies(&self) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|r| match r.outcome {
                Outcome::Latency { avg_ms, .. } => Some(avg_ms),
                Outcome::Missing => None,
            })
            .collect()
    }

    pub fn receiver_counts(&self) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|r| match r.outcome {
                Outcome::Latency { receivers, .. } => Some(receivers as f64),
                Outcome::Missing => None,
            })
            .collect()
    }
}
