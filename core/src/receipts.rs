/// Read-receipt and reaction normalization
///
/// Pure transforms from the backend's raw per-user maps into derived
/// display state. Empty or absent maps normalize to empty summaries.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Delivery status of an own message, from the sender's perspective.
/// Monotonic: never derived backwards once receipts exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Seen,
}

/// seen_at non-empty ⇒ Seen, else delivered_at non-empty ⇒ Delivered, else Sent.
/// Only meaningful for messages the current user sent; the caller gates on sender.
pub fn delivery_status(
    delivered_at: Option<&BTreeMap<String, String>>,
    seen_at: Option<&BTreeMap<String, String>>,
) -> DeliveryStatus {
    if seen_at.is_some_and(|m| !m.is_empty()) {
        DeliveryStatus::Seen
    } else if delivered_at.is_some_and(|m| !m.is_empty()) {
        DeliveryStatus::Delivered
    } else {
        DeliveryStatus::Sent
    }
}

/// One per-user receipt entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptEntry {
    pub user_id: String,
    /// RFC3339 timestamp as the backend sent it
    pub timestamp: String,
}

/// Normalized view of one delivered_at/seen_at map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptSummary {
    /// Entries sorted by user id
    pub entries: Vec<ReceiptEntry>,
    /// Latest timestamp across all users, used as the summary value
    pub latest: Option<String>,
}

impl ReceiptSummary {
    pub fn from_map(raw: Option<&BTreeMap<String, String>>) -> Self {
        let Some(map) = raw else {
            return Self::default();
        };
        let entries: Vec<ReceiptEntry> = map
            .iter()
            .map(|(user_id, timestamp)| ReceiptEntry {
                user_id: user_id.clone(),
                timestamp: timestamp.clone(),
            })
            .collect();
        // RFC3339 timestamps in a uniform zone compare lexicographically
        let latest = entries.iter().map(|e| e.timestamp.clone()).max();
        Self { entries, latest }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One emoji's aggregate in the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionSummary {
    pub emoji: String,
    pub count: usize,
    pub reacted_by_me: bool,
}

/// Normalized reaction state for one message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionState {
    /// emoji → reacting user ids, as the backend reported them
    pub normalized: BTreeMap<String, Vec<String>>,
    /// Ordered by count descending, ties by emoji code point ascending
    pub summary: Vec<ReactionSummary>,
}

impl ReactionState {
    pub fn derive(raw: Option<&BTreeMap<String, Vec<String>>>, user_id: &str) -> Self {
        let Some(map) = raw else {
            return Self::default();
        };
        let normalized: BTreeMap<String, Vec<String>> = map
            .iter()
            .filter(|(_, users)| !users.is_empty())
            .map(|(emoji, users)| (emoji.clone(), users.clone()))
            .collect();
        let mut summary: Vec<ReactionSummary> = normalized
            .iter()
            .map(|(emoji, users)| ReactionSummary {
                emoji: emoji.clone(),
                count: users.len(),
                reacted_by_me: users.iter().any(|u| u == user_id),
            })
            .collect();
        summary.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.emoji.cmp(&b.emoji)));
        Self { normalized, summary }
    }

    /// Emoji the given state says the current user reacted with, if any
    pub fn my_reaction(&self) -> Option<&str> {
        self.summary
            .iter()
            .find(|entry| entry.reacted_by_me)
            .map(|entry| entry.emoji.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}
