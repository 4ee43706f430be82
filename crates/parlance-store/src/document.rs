//! Paths, filters, queries and field updates understood by every
//! [`DocumentStore`](crate::DocumentStore) implementation.

use std::cmp::Ordering;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, StoreError};

/// The body of a document: a JSON object.
pub type Fields = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Address of a single document: its collection path plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    collection: String,
    id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for DocPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Path to a (possibly nested) field inside a document.
///
/// Segments are kept separate so that map keys containing dots, such as
/// per-user counters keyed by user id, address a single key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Resolve the field inside `fields`, if present.
    pub fn lookup<'a>(&self, fields: &'a Fields) -> Option<&'a Value> {
        let (first, rest) = self.0.split_first()?;
        let mut current = fields.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    // Walk to the parent object of the last segment, creating empty objects
    // on the way.  Fails if an intermediate value is not an object.
    fn parent_mut<'a>(&'a self, fields: &'a mut Fields) -> Option<(&'a mut Fields, &'a str)> {
        let (last, parents) = self.0.split_last()?;
        let mut current = fields;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Fields::new()));
            current = entry.as_object_mut()?;
        }
        Some((current, last.as_str()))
    }
}

impl From<&str> for FieldPath {
    fn from(dotted: &str) -> Self {
        Self(dotted.split('.').map(str::to_string).collect())
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// The field equals the value.
    Eq(FieldPath, Value),
    /// The field is an array containing the value.
    ArrayContains(FieldPath, Value),
}

impl Filter {
    pub fn eq(field: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn array_contains(field: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Filter::ArrayContains(field.into(), value.into())
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Filter::Eq(path, value) => path.lookup(fields) == Some(value),
            Filter::ArrayContains(path, value) => path
                .lookup(fields)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A query over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(FieldPath, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<FieldPath>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|f| f.matches(fields))
    }

    /// Filter, order and truncate documents given in insertion order.
    /// The sort is stable, so ties keep insertion order.
    pub fn apply(&self, docs: Vec<Snapshot>) -> Vec<Snapshot> {
        let mut docs: Vec<Snapshot> = docs.into_iter().filter(|d| self.matches(&d.fields)).collect();

        if let Some((field, direction)) = &self.order_by {
            docs.sort_by(|a, b| {
                let ord = compare_values(field.lookup(&a.fields), field.lookup(&b.fields));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }
}

// Missing < null < bool < number < string; other kinds compare equal.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// A partial modification of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Set(FieldPath, Value),
    /// Add to a numeric field; a missing field counts as zero.
    Increment(FieldPath, i64),
    Remove(FieldPath),
}

impl FieldUpdate {
    pub fn set(field: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        FieldUpdate::Set(field.into(), value.into())
    }

    pub fn increment(field: impl Into<FieldPath>, by: i64) -> Self {
        FieldUpdate::Increment(field.into(), by)
    }

    pub fn remove(field: impl Into<FieldPath>) -> Self {
        FieldUpdate::Remove(field.into())
    }

    pub(crate) fn apply(&self, path: &DocPath, fields: &mut Fields) -> Result<()> {
        let invalid = |reason: String| StoreError::InvalidUpdate {
            path: path.to_string(),
            reason,
        };

        match self {
            FieldUpdate::Set(field, value) => {
                let (parent, key) = field
                    .parent_mut(fields)
                    .ok_or_else(|| invalid(format!("cannot set {field}")))?;
                parent.insert(key.to_string(), value.clone());
            }
            FieldUpdate::Increment(field, by) => {
                let (parent, key) = field
                    .parent_mut(fields)
                    .ok_or_else(|| invalid(format!("cannot increment {field}")))?;
                let current = match parent.get(key) {
                    None | Some(Value::Null) => 0,
                    Some(v) => v
                        .as_i64()
                        .ok_or_else(|| invalid(format!("{field} is not an integer")))?,
                };
                parent.insert(key.to_string(), Value::from(current + by));
            }
            FieldUpdate::Remove(field) => {
                if let Some((parent, key)) = field.parent_mut(fields) {
                    parent.remove(key);
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// A document as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: DocPath,
    pub fields: Fields,
}

impl Snapshot {
    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Decode the document into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|e| {
            StoreError::Malformed {
                path: self.path.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

/// Encode a serializable record into document fields.
pub fn to_fields<T: serde::Serialize>(record: &T) -> Result<Fields> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::Malformed {
            path: String::new(),
            reason: format!("expected an object, got {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn snap(id: &str, value: Value) -> Snapshot {
        Snapshot {
            path: DocPath::new("c", id),
            fields: fields(value),
        }
    }

    #[test]
    fn test_filters() {
        let doc = fields(json!({"status": "pending", "participants": ["a", "b"]}));
        assert!(Filter::eq("status", "pending").matches(&doc));
        assert!(!Filter::eq("status", "accepted").matches(&doc));
        assert!(Filter::array_contains("participants", "b").matches(&doc));
        assert!(!Filter::array_contains("participants", "c").matches(&doc));
        assert!(!Filter::array_contains("status", "pending").matches(&doc));
    }

    #[test]
    fn test_nested_set_and_increment() {
        let path = DocPath::new("c", "1");
        let mut doc = fields(json!({"unread": {"a": 2}}));

        FieldUpdate::increment(FieldPath::new(["unread", "a"]), 1)
            .apply(&path, &mut doc)
            .unwrap();
        FieldUpdate::increment(FieldPath::new(["unread", "b.c"]), 1)
            .apply(&path, &mut doc)
            .unwrap();
        FieldUpdate::set("meta.title", "hi").apply(&path, &mut doc).unwrap();

        assert_eq!(doc["unread"]["a"], json!(3));
        assert_eq!(doc["unread"]["b.c"], json!(1));
        assert_eq!(doc["meta"]["title"], json!("hi"));

        FieldUpdate::remove("meta.title").apply(&path, &mut doc).unwrap();
        assert_eq!(doc["meta"], json!({}));
    }

    #[test]
    fn test_increment_rejects_non_numbers() {
        let path = DocPath::new("c", "1");
        let mut doc = fields(json!({"name": "x"}));
        let err = FieldUpdate::increment("name", 1).apply(&path, &mut doc);
        assert!(matches!(err, Err(StoreError::InvalidUpdate { .. })));
    }

    #[test]
    fn test_query_order_is_stable() {
        let docs = vec![
            snap("late", json!({"t": 30})),
            snap("tie1", json!({"t": 10})),
            snap("tie2", json!({"t": 10})),
            snap("early", json!({"t": 5})),
        ];
        let ids: Vec<String> = Query::collection("c")
            .order_by("t", Direction::Ascending)
            .apply(docs.clone())
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(ids, ["early", "tie1", "tie2", "late"]);

        let newest = Query::collection("c")
            .order_by("t", Direction::Descending)
            .limit(1)
            .apply(docs);
        assert_eq!(newest[0].id(), "late");
    }
}
