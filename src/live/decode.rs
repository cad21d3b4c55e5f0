//! Maps schema-less documents onto typed entities.
//!
//! A bad record never sinks a whole delivery: it is logged and skipped, and the
//! rest of the batch is still handed to the subscriber.

use crate::errors::DecodeError;
use crate::live::{key::SubscriptionKey, source::Document};
use serde::de::DeserializeOwned;
use tracing::warn;

/// Decodes one document.
///
/// # Errors
/// Returns a `DecodeError` carrying the document id when the body does not fit `T`.
pub fn decode_document<T: DeserializeOwned>(document: Document) -> Result<T, DecodeError> {
    let Document { id, data } = document;
    serde_json::from_value(data).map_err(|source| DecodeError {
        document_id: id,
        source,
    })
}

/// Decodes a batch, dropping (and logging) the documents that fail.
pub fn decode_batch<T: DeserializeOwned>(
    key: &SubscriptionKey,
    documents: Vec<Document>,
) -> Vec<T> {
    let total = documents.len();
    let decoded: Vec<T> = documents
        .into_iter()
        .filter_map(|document| {
            decode_document(document)
                .inspect_err(|e| warn!("Skipping record on {}: {}", key, e))
                .ok()
        })
        .collect();

    if decoded.len() < total {
        warn!(
            "Decoded {} of {} records on {}",
            decoded.len(),
            total,
            key
        );
    }
    decoded
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::live::key::EntityKind;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        name: String,
        budget: f64,
    }

    #[test]
    fn test_decode_document_reports_id() {
        let bad = Document::new("doc-7", json!({"name": "Food"}));
        let err = decode_document::<Row>(bad).unwrap_err();
        assert_eq!(err.document_id, "doc-7");
    }

    #[test]
    fn test_decode_batch_skips_bad_records() {
        let key = SubscriptionKey::new(EntityKind::Categories, "trip1");
        let documents = vec![
            Document::new("1", json!({"name": "Food", "budget": 10.0})),
            Document::new("2", json!({"name": "Bad", "budget": "lots"})),
            Document::new("3", json!({"name": "Fun", "budget": 5.0})),
        ];

        let rows: Vec<Row> = decode_batch(&key, documents);
        assert_eq!(
            rows,
            vec![
                Row {
                    name: "Food".to_string(),
                    budget: 10.0
                },
                Row {
                    name: "Fun".to_string(),
                    budget: 5.0
                },
            ]
        );
    }

    #[test]
    fn test_decode_empty_batch() {
        let key = SubscriptionKey::new(EntityKind::Balances, "trip1");
        let rows: Vec<Row> = decode_batch(&key, Vec::new());
        assert!(rows.is_empty());
    }
}
