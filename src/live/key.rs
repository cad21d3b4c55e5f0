//! Subscription keys and live queries.
//!
//! A [`SubscriptionKey`] names one live query: an entity kind scoped to a trip.
//! Its string form (`cat:trip1`, `user/ana:trip1`) is what shows up in logs.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::Error;

/// Document collection holding trips.
pub const TRIPS: &str = "trips";
/// Document collection holding categories.
pub const CATEGORIES: &str = "categories";
/// Document collection holding spending items.
pub const SPENDING_ITEMS: &str = "spending_items";
/// Document collection holding balance snapshots.
pub const BALANCES: &str = "balances";
/// Document collection holding trip participants.
pub const PARTICIPANTS: &str = "participants";

/// What a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// The trip document itself
    Trip,
    /// All categories of the trip
    Categories,
    /// All spending items of the trip
    SpendingItems,
    /// All balance snapshots of the trip
    Balances,
    /// One participant, keyed individually by user id
    Participant(String),
}

impl EntityKind {
    /// Collection the kind lives in.
    #[must_use]
    pub const fn collection(&self) -> &'static str {
        match self {
            Self::Trip => TRIPS,
            Self::Categories => CATEGORIES,
            Self::SpendingItems => SPENDING_ITEMS,
            Self::Balances => BALANCES,
            Self::Participant(_) => PARTICIPANTS,
        }
    }

    /// Canonical live query for this kind within a trip.
    #[must_use]
    pub fn query(&self, trip_id: &str) -> LiveQuery {
        match self {
            Self::Trip => LiveQuery::collection(TRIPS).where_eq("id", trip_id),
            Self::Categories | Self::SpendingItems | Self::Balances => {
                LiveQuery::collection(self.collection()).where_eq("travel_id", trip_id)
            }
            Self::Participant(user_id) => LiveQuery::collection(PARTICIPANTS)
                .where_eq("travel_id", trip_id)
                .where_eq("user_id", user_id.as_str()),
        }
    }
}

/// Identifies one live query: at most one subscription per key is active.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey {
    /// Entity kind
    pub kind: EntityKind,
    /// Trip the query is scoped to
    pub trip_id: String,
}

impl SubscriptionKey {
    /// Creates a key.
    pub fn new(kind: EntityKind, trip_id: impl Into<String>) -> Self {
        Self {
            kind,
            trip_id: trip_id.into(),
        }
    }

    /// Canonical query for this key.
    #[must_use]
    pub fn query(&self) -> LiveQuery {
        self.kind.query(&self.trip_id)
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EntityKind::Trip => write!(f, "trip:{}", self.trip_id),
            EntityKind::Categories => write!(f, "cat:{}", self.trip_id),
            EntityKind::SpendingItems => write!(f, "items:{}", self.trip_id),
            EntityKind::Balances => write!(f, "bal:{}", self.trip_id),
            EntityKind::Participant(user_id) => write!(f, "user/{user_id}:{}", self.trip_id),
        }
    }
}

impl FromStr for SubscriptionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Validation {
            message: format!("invalid subscription key '{s}'"),
        };

        let (prefix, trip_id) = s.rsplit_once(':').ok_or_else(invalid)?;
        if trip_id.is_empty() {
            return Err(invalid());
        }

        let kind = match prefix {
            "trip" => EntityKind::Trip,
            "cat" => EntityKind::Categories,
            "items" => EntityKind::SpendingItems,
            "bal" => EntityKind::Balances,
            other => match other.strip_prefix("user/") {
                Some(user_id) if !user_id.is_empty() => {
                    EntityKind::Participant(user_id.to_string())
                }
                _ => return Err(invalid()),
            },
        };

        Ok(Self::new(kind, trip_id))
    }
}

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Field equals the value
    Equal,
    /// Field is an array containing the value
    ArrayContains,
}

/// One predicate on a document field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Top-level field name
    pub field: String,
    /// Comparison
    pub op: FilterOp,
    /// Value to compare against
    pub value: Value,
}

impl Filter {
    /// Whether `data` satisfies this predicate. Missing fields never match.
    #[must_use]
    pub fn matches(&self, data: &Value) -> bool {
        let Some(field) = data.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Equal => field == &self.value,
            FilterOp::ArrayContains => field
                .as_array()
                .is_some_and(|values| values.contains(&self.value)),
        }
    }
}

/// A collection plus conjunctive filters, as sent to a data source.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveQuery {
    /// Collection name
    pub collection: String,
    /// All filters must match
    pub filters: Vec<Filter>,
}

impl LiveQuery {
    /// Query over a whole collection.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
        }
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op: FilterOp::Equal,
            value: value.into(),
        });
        self
    }

    /// Adds an array-contains filter.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn where_array_contains(
        mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op: FilterOp::ArrayContains,
            value: value.into(),
        });
        self
    }

    /// Whether a document in this query's collection matches every filter.
    #[must_use]
    pub fn matches(&self, data: &Value) -> bool {
        self.filters.iter().all(|filter| filter.matches(data))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_display_and_parse() {
        let keys = [
            SubscriptionKey::new(EntityKind::Trip, "trip1"),
            SubscriptionKey::new(EntityKind::Categories, "trip1"),
            SubscriptionKey::new(EntityKind::SpendingItems, "trip1"),
            SubscriptionKey::new(EntityKind::Balances, "trip1"),
            SubscriptionKey::new(EntityKind::Participant("ana".to_string()), "trip1"),
        ];
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["trip:trip1", "cat:trip1", "items:trip1", "bal:trip1", "user/ana:trip1"]
        );

        for (key, text) in keys.iter().zip(&rendered) {
            assert_eq!(&text.parse::<SubscriptionKey>().unwrap(), key);
        }
    }

    #[test]
    fn test_key_parse_rejects_garbage() {
        for bad in ["", "cat", "cat:", "dog:trip1", "user/:trip1"] {
            assert!(bad.parse::<SubscriptionKey>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_canonical_queries() {
        let query = EntityKind::Participant("ana".to_string()).query("trip1");
        assert_eq!(query.collection, PARTICIPANTS);
        assert!(query.matches(&json!({"travel_id": "trip1", "user_id": "ana"})));
        assert!(!query.matches(&json!({"travel_id": "trip1", "user_id": "ben"})));
        assert!(!query.matches(&json!({"user_id": "ana"})));

        let trip = EntityKind::Trip.query("trip1");
        assert!(trip.matches(&json!({"id": "trip1", "name": "Lisbon"})));
    }

    #[test]
    fn test_array_contains_filter() {
        let query =
            LiveQuery::collection(SPENDING_ITEMS).where_array_contains("participant_ids", "ana");
        assert!(query.matches(&json!({"participant_ids": ["ben", "ana"]})));
        assert!(!query.matches(&json!({"participant_ids": ["ben"]})));
        assert!(!query.matches(&json!({"participant_ids": "ana"})));
    }
}
