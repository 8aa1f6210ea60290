//! Change-event state classification.
//!
//! Given a query specification and a single document mutation, this module
//! computes the ordered bit vector of classifying predicates that the
//! diagram's variables bind to: variable `i` of a truth table over these
//! states is resolved by predicate `i` of [`ORDERED_STATE_LIST`]. The list
//! is closed and its order is stable; a truth-table author and this
//! classifier can only agree because both read the same list.
//!
//! Documents are [`serde_json::Value`]s. The query's selector matcher and
//! sort comparator arrive as caller-supplied closures; compiling them from
//! a MongoDB-style query is the caller's concern, not this crate's.
//!
//! Every predicate is a total function of its input. Inputs that are
//! undefined for an event (no `previous` on an INSERT, no `doc` on a
//! DELETE) map to the default documented on the predicate.

use std::cmp::Ordering;
use std::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Bit;

/// The mutation kind of a change event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

/// One document mutation.
///
/// `doc` is the document after the event (absent on DELETE); `previous` is
/// the document before it (absent on INSERT, and possibly unknown on
/// UPDATE when the feed does not deliver old values).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub operation: Operation,
    /// Primary-key value of the affected document.
    pub id: String,
    pub doc: Option<Value>,
    pub previous: Option<Value>,
}

/// Sort direction of one sort field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

/// One field of the query's sort specification. Nested fields use
/// dot-separated paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

/// Decides whether a document matches the query's selector.
pub type QueryMatcher = Box<dyn Fn(&Value) -> bool>;

/// Orders two documents under the query's sort specification.
pub type SortComparator = Box<dyn Fn(&Value, &Value) -> Ordering>;

/// The compiled query a change event is classified against.
pub struct QueryParams {
    /// Field holding the document identity, usually `"id"` or `"_id"`.
    pub primary_key: String,
    pub sort_fields: Vec<SortField>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub query_matcher: QueryMatcher,
    pub sort_comparator: SortComparator,
}

impl fmt::Debug for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryParams")
            .field("primary_key", &self.primary_key)
            .field("sort_fields", &self.sort_fields)
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

/// Everything a predicate may look at.
pub struct StateInput<'a> {
    pub query_params: &'a QueryParams,
    pub event: &'a ChangeEvent,
    /// The query's result list before the event, in sort order.
    pub previous_results: &'a [Value],
    /// Optional id-to-current-document index kept by the caller.
    pub key_document_map: Option<&'a HashMap<String, Value>>,
}

/// Resolves a dot-separated field path inside a document.
fn field_value<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for key in path.split('.') {
        current = current.get(key)?;
    }
    Some(current)
}

/// Whether `doc`'s primary key equals `id`. Numeric keys compare through
/// their decimal rendering; a document without the key never matches.
fn has_primary_key(params: &QueryParams, doc: &Value, id: &str) -> bool {
    match field_value(doc, &params.primary_key) {
        Some(Value::String(s)) => s == id,
        Some(Value::Number(n)) => n.to_string() == id,
        _ => false,
    }
}

/// The affected document as it looked before the event: the event's own
/// `previous` when present, otherwise the key-document map's entry.
fn previous_doc<'a>(input: &StateInput<'a>) -> Option<&'a Value> {
    input.event.previous.as_ref().or_else(|| {
        input
            .key_document_map
            .and_then(|map| map.get(&input.event.id))
    })
}

/// The event is an INSERT.
pub fn is_insert(input: &StateInput) -> bool {
    input.event.operation == Operation::Insert
}

/// The event is an UPDATE.
pub fn is_update(input: &StateInput) -> bool {
    input.event.operation == Operation::Update
}

/// The event is a DELETE.
pub fn is_delete(input: &StateInput) -> bool {
    input.event.operation == Operation::Delete
}

/// The query carries a limit.
pub fn has_limit(input: &StateInput) -> bool {
    input.query_params.limit.is_some()
}

/// The query limits to exactly one document.
pub fn is_find_one(input: &StateInput) -> bool {
    input.query_params.limit == Some(1)
}

/// The query skips a non-zero number of documents.
pub fn has_skip(input: &StateInput) -> bool {
    input.query_params.skip.map_or(false, |skip| skip > 0)
}

/// The result list was empty before the event.
pub fn was_results_empty(input: &StateInput) -> bool {
    input.previous_results.is_empty()
}

/// The document's pre-event content cannot be recovered: not an INSERT,
/// yet neither the event nor the key-document map carries it.
pub fn previous_unknown(input: &StateInput) -> bool {
    input.event.operation != Operation::Insert && previous_doc(input).is_none()
}

/// The result list already held as many documents as the limit allows.
/// Without a limit this is false.
pub fn was_limit_reached(input: &StateInput) -> bool {
    input
        .query_params
        .limit
        .map_or(false, |limit| input.previous_results.len() as u64 >= limit)
}

/// Some sort field's value differs between `doc` and the pre-event
/// document.
///
/// A field missing on one side while present on the other counts as a
/// difference. When the pre-event document is unavailable the answer is
/// true (nothing proves the sort position unchanged); when the event
/// carries no `doc` (DELETE) the answer is false, the document's fields
/// did not change on its way out.
pub fn sort_params_changed(input: &StateInput) -> bool {
    let Some(doc) = input.event.doc.as_ref() else {
        return false;
    };
    let Some(previous) = previous_doc(input) else {
        return true;
    };
    input
        .query_params
        .sort_fields
        .iter()
        .any(|sort| field_value(doc, &sort.field) != field_value(previous, &sort.field))
}

/// The affected id was present in the previous results.
pub fn was_in_result(input: &StateInput) -> bool {
    input
        .previous_results
        .iter()
        .any(|doc| has_primary_key(input.query_params, doc, &input.event.id))
}

/// The affected id was the first entry of the previous results.
pub fn was_first(input: &StateInput) -> bool {
    input
        .previous_results
        .first()
        .map_or(false, |doc| has_primary_key(input.query_params, doc, &input.event.id))
}

/// The affected id was the last entry of the previous results.
pub fn was_last(input: &StateInput) -> bool {
    input
        .previous_results
        .last()
        .map_or(false, |doc| has_primary_key(input.query_params, doc, &input.event.id))
}

/// Under the current sort, the pre-event document sorts strictly after the
/// last entry of the previous results. False when either side is missing.
pub fn sort_after_last(input: &StateInput) -> bool {
    match (previous_doc(input), input.previous_results.last()) {
        (Some(previous), Some(last)) => {
            (input.query_params.sort_comparator)(previous, last) == Ordering::Greater
        }
        _ => false,
    }
}

/// Under the current sort, the pre-event document sorts strictly before
/// the first entry of the previous results. False when either side is
/// missing.
pub fn sort_before_first(input: &StateInput) -> bool {
    match (previous_doc(input), input.previous_results.first()) {
        (Some(previous), Some(first)) => {
            (input.query_params.sort_comparator)(previous, first) == Ordering::Less
        }
        _ => false,
    }
}

/// The pre-event document matched the selector. False when it is
/// unavailable.
pub fn was_matching(input: &StateInput) -> bool {
    previous_doc(input).map_or(false, |doc| (input.query_params.query_matcher)(doc))
}

/// The post-event document matches the selector. False when the event
/// carries no document (DELETE).
pub fn does_match_now(input: &StateInput) -> bool {
    input
        .event
        .doc
        .as_ref()
        .map_or(false, |doc| (input.query_params.query_matcher)(doc))
}

/// One classifying predicate.
pub type StatePredicate = fn(&StateInput) -> bool;

/// Number of classifying predicates, i.e. the depth of a truth table over
/// them.
pub const STATE_COUNT: usize = 17;

/// The closed, ordered predicate list. Index `i` here is variable `i` of
/// the diagram; reordering this list invalidates every truth table built
/// against it.
pub const ORDERED_STATE_LIST: [(&str, StatePredicate); STATE_COUNT] = [
    ("is_insert", is_insert),
    ("is_update", is_update),
    ("is_delete", is_delete),
    ("has_limit", has_limit),
    ("is_find_one", is_find_one),
    ("has_skip", has_skip),
    ("was_results_empty", was_results_empty),
    ("previous_unknown", previous_unknown),
    ("was_limit_reached", was_limit_reached),
    ("sort_params_changed", sort_params_changed),
    ("was_in_result", was_in_result),
    ("was_first", was_first),
    ("was_last", was_last),
    ("sort_after_last", sort_after_last),
    ("sort_before_first", sort_before_first),
    ("was_matching", was_matching),
    ("does_match_now", does_match_now),
];

/// Evaluates every predicate against `input` and returns the
/// [`STATE_COUNT`]-bit vector in list order. This string is the key space
/// of the truth tables the diagram engine compiles.
pub fn classify_state(input: &StateInput) -> String {
    ORDERED_STATE_LIST
        .iter()
        .map(|(_, predicate)| Bit::from(predicate(input)).as_char())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> QueryParams {
        QueryParams {
            primary_key: "id".to_string(),
            sort_fields: vec![SortField {
                field: "age".to_string(),
                direction: SortDirection::Ascending,
            }],
            skip: None,
            limit: Some(3),
            query_matcher: Box::new(|doc| {
                doc.get("age").and_then(Value::as_u64).map_or(false, |age| age < 100)
            }),
            sort_comparator: Box::new(|a, b| {
                let age = |d: &Value| d.get("age").and_then(Value::as_u64).unwrap_or(0);
                age(a).cmp(&age(b))
            }),
        }
    }

    fn human(id: &str, age: u64) -> Value {
        json!({ "id": id, "age": age })
    }

    fn update(id: &str, doc: Value, previous: Option<Value>) -> ChangeEvent {
        ChangeEvent {
            operation: Operation::Update,
            id: id.to_string(),
            doc: Some(doc),
            previous,
        }
    }

    #[test]
    fn test_classify_state_is_fixed_width() {
        let params = params();
        let event = ChangeEvent {
            operation: Operation::Insert,
            id: "a".to_string(),
            doc: Some(human("a", 10)),
            previous: None,
        };
        let input = StateInput {
            query_params: &params,
            event: &event,
            previous_results: &[],
            key_document_map: None,
        };

        let state = classify_state(&input);
        assert_eq!(state.len(), STATE_COUNT);
        assert!(state.chars().all(|c| c == '0' || c == '1'));
        // INSERT into an empty result set.
        assert!(state.starts_with("100"));
        assert_eq!(&state[6..7], "1");
    }

    #[test]
    fn test_result_membership_predicates() {
        let params = params();
        let results = vec![human("a", 1), human("b", 2), human("c", 3)];
        let event = update("b", human("b", 2), Some(human("b", 2)));
        let input = StateInput {
            query_params: &params,
            event: &event,
            previous_results: &results,
            key_document_map: None,
        };

        assert!(was_in_result(&input));
        assert!(!was_first(&input));
        assert!(!was_last(&input));
        assert!(was_limit_reached(&input));

        let first_event = update("a", human("a", 1), Some(human("a", 1)));
        let first_input = StateInput {
            event: &first_event,
            ..input
        };
        assert!(was_first(&first_input));
    }

    #[test]
    fn test_sort_params_changed_definition() {
        let params = params();
        let results: Vec<Value> = vec![];

        // Same age on both sides: unchanged.
        let same = update("a", human("a", 10), Some(human("a", 10)));
        let input = StateInput {
            query_params: &params,
            event: &same,
            previous_results: &results,
            key_document_map: None,
        };
        assert!(!sort_params_changed(&input));

        // Differing age: changed.
        let moved = update("a", human("a", 20), Some(human("a", 10)));
        assert!(sort_params_changed(&StateInput { event: &moved, ..input }));

        // Unknown previous: changed by definition.
        let unknown = update("a", human("a", 10), None);
        assert!(sort_params_changed(&StateInput { event: &unknown, ..input }));

        // A DELETE carries no doc: unchanged by definition.
        let delete = ChangeEvent {
            operation: Operation::Delete,
            id: "a".to_string(),
            doc: None,
            previous: Some(human("a", 10)),
        };
        assert!(!sort_params_changed(&StateInput { event: &delete, ..input }));
    }

    #[test]
    fn test_sort_position_predicates() {
        let params = params();
        let results = vec![human("a", 10), human("b", 20)];

        let old = ChangeEvent {
            operation: Operation::Update,
            id: "x".to_string(),
            doc: Some(human("x", 99)),
            previous: Some(human("x", 50)),
        };
        let input = StateInput {
            query_params: &params,
            event: &old,
            previous_results: &results,
            key_document_map: None,
        };
        assert!(sort_after_last(&input));
        assert!(!sort_before_first(&input));

        let young = ChangeEvent {
            operation: Operation::Update,
            id: "y".to_string(),
            doc: Some(human("y", 1)),
            previous: Some(human("y", 5)),
        };
        let young_input = StateInput { event: &young, ..input };
        assert!(!sort_after_last(&young_input));
        assert!(sort_before_first(&young_input));
    }

    #[test]
    fn test_previous_falls_back_to_key_document_map() {
        let params = params();
        let mut map = HashMap::new();
        map.insert("a".to_string(), human("a", 150));

        let event = update("a", human("a", 10), None);
        let input = StateInput {
            query_params: &params,
            event: &event,
            previous_results: &[],
            key_document_map: Some(&map),
        };

        assert!(!previous_unknown(&input));
        // age 150 fails the selector, age 10 passes it.
        assert!(!was_matching(&input));
        assert!(does_match_now(&input));
        // 150 vs 10 differs on the sort field.
        assert!(sort_params_changed(&input));
    }

    #[test]
    fn test_matcher_defaults_on_missing_docs() {
        let params = params();
        let delete = ChangeEvent {
            operation: Operation::Delete,
            id: "a".to_string(),
            doc: None,
            previous: None,
        };
        let input = StateInput {
            query_params: &params,
            event: &delete,
            previous_results: &[],
            key_document_map: None,
        };

        assert!(previous_unknown(&input));
        assert!(!was_matching(&input));
        assert!(!does_match_now(&input));
        assert!(!sort_after_last(&input));
        assert!(!sort_before_first(&input));
    }

    #[test]
    fn test_ordered_state_list_is_stable() {
        let names: Vec<&str> = ORDERED_STATE_LIST.iter().map(|(name, _)| *name).collect();
        assert_eq!(names[0], "is_insert");
        assert_eq!(names[9], "sort_params_changed");
        assert_eq!(names[16], "does_match_now");
        assert_eq!(names.len(), STATE_COUNT);
    }
}
