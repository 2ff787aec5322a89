use serde::{Deserialize, Serialize};

use crate::{
    engine::{
        annotation::ResolvedTarget,
        reconcile::{ComparisonPayload, ServerComparedItem},
    },
    item::{RevisionItem, StockCandidate},
    types::{Delta, LocationId, Quantity},
};

/// Comparison line as sent by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireComparedItem {
    #[serde(flatten)]
    pub item: RevisionItem,
    #[serde(default)]
    pub delta: Option<Delta>,
}

/// Accepted comparison response shapes. Aggregate counters are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireComparison {
    Flat {
        items: Vec<WireComparedItem>,
    },
    Partitioned {
        #[serde(default)]
        matched: Vec<WireComparedItem>,
        #[serde(default)]
        mismatched: Vec<WireComparedItem>,
    },
    Bare(Vec<WireComparedItem>),
}

impl From<WireComparison> for ComparisonPayload {
    fn from(value: WireComparison) -> Self {
        let wire = match value {
            WireComparison::Flat { items } | WireComparison::Bare(items) => items,
            WireComparison::Partitioned {
                mut matched,
                mismatched,
            } => {
                matched.extend(mismatched);
                matched
            }
        };
        Self {
            items: wire
                .into_iter()
                .map(|w| ServerComparedItem {
                    item: w.item,
                    delta: w.delta,
                })
                .collect(),
        }
    }
}

/// Either a bare array or an `{ "items": [...] }` envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireList<T> {
    Bare(Vec<T>),
    Wrapped { items: Vec<T> },
}

impl<T> WireList<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(v) | Self::Wrapped { items: v } => v,
        }
    }
}

pub type ItemList = WireList<RevisionItem>;
pub type StockList = WireList<StockCandidate>;

/// Acknowledgement body. An empty body counts as success.
#[derive(Debug, Clone, Deserialize)]
pub struct Ack {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct QuantityBody {
    pub quantity: Quantity,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationBody {
    pub location_id: LocationId,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManualItemBody<'a> {
    pub location_id: LocationId,
    #[serde(flatten)]
    pub item: &'a RevisionItem,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotationBody<'a> {
    pub comment: &'a str,
    pub target: &'a ResolvedTarget,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitioned_payload_is_unioned() {
        let raw = r#"{
            "total": 99,
            "matched": [{"id": 1, "name": "a", "code": "A", "counted": 2, "system": 2, "delta": 0}],
            "mismatched": [{"id": 2, "name": "b", "code": "B", "counted": 1, "system": 4}]
        }"#;
        let wire: WireComparison = serde_json::from_str(raw).expect("parse");
        let payload = ComparisonPayload::from(wire);
        assert_eq!(payload.items.len(), 2);
        assert_eq!(payload.items[0].delta, Some(0));
        assert_eq!(payload.items[1].delta, None);
    }

    #[test]
    fn flat_payload_keeps_order() {
        let raw = r#"{"items": [
            {"id": 5, "name": "e", "code": "E", "counted": 0, "system": 3, "delta": -3},
            {"id": 4, "name": "d", "code": "D", "counted": 1, "system": 1}
        ]}"#;
        let payload = ComparisonPayload::from(serde_json::from_str::<WireComparison>(raw).expect("parse"));
        let ids: Vec<_> = payload.items.iter().map(|i| i.item.id).collect();
        assert_eq!(ids, vec![5, 4]);
    }

    #[test]
    fn ack_defaults_to_success() {
        let ack: Ack = serde_json::from_str("{}").expect("parse");
        assert!(ack.success);
        let nack: Ack = serde_json::from_str(r#"{"success": false, "message": "locked"}"#).expect("parse");
        assert!(!nack.success);
        assert_eq!(nack.message.as_deref(), Some("locked"));
    }
}
