//! In-memory property matching for documents.
//!
//! [`DocumentFilter`] checks documents against a map of constraints (`key` or `key.path` to
//! expected value). It is used for the residual constraints a backend predicate cannot express,
//! and streams its input: the returned [`FilteredDocuments`] iterator pulls one document at a
//! time and stops as soon as `limit` matches have been produced.

use serde_json::{Map, Value};

use crate::document::KeyValueCoding;

/// Filters documents by comparing their values against property constraints.
///
/// Loose comparison is the default: numbers compare by value regardless of representation,
/// numeric strings compare equal to the numbers they spell, booleans compare by truthiness
/// and `null` equals every empty or falsy value. [`DocumentFilter::strict`] requires values
/// to be equal in both type and value.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentFilter {
    strict: bool,
}

impl DocumentFilter {
    /// Creates a filter using loose comparison.
    pub fn new() -> Self {
        DocumentFilter { strict: false }
    }

    /// Creates a filter using strict comparison.
    pub fn strict() -> Self {
        DocumentFilter { strict: true }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Returns a lazy iterator over the documents matching every constraint.
    ///
    /// # Arguments
    ///
    /// * `documents` - The documents to filter, consumed in order
    /// * `constraints` - Expected values by key or dotted key path
    /// * `limit` - Maximum number of documents to yield
    pub fn filter_by_properties<'c, I, D>(
        &self,
        documents: I,
        constraints: &'c Map<String, Value>,
        limit: usize,
    ) -> FilteredDocuments<'c, I::IntoIter>
    where
        I: IntoIterator<Item = D>,
        D: KeyValueCoding,
    {
        FilteredDocuments {
            documents: documents.into_iter(),
            constraints,
            filter: *self,
            limit,
            yielded: 0,
        }
    }

    /// Returns whether `document` satisfies every constraint.
    ///
    /// Evaluation stops at the first failing key. A document whose payload cannot be decoded
    /// does not match.
    pub fn matches<D: KeyValueCoding>(
        &self,
        document: &D,
        constraints: &Map<String, Value>,
    ) -> bool {
        for (key, expected) in constraints {
            let actual = if key.contains('.') {
                document.value_for_key_path(key)
            } else {
                document.value_for_key(key)
            };

            let actual = match actual {
                Ok(value) => value.unwrap_or(Value::Null),
                Err(err) => {
                    tracing::warn!(
                        key = %key,
                        error = %err,
                        "Skipping document with undecodable data"
                    );
                    return false;
                }
            };

            if !self.values_equal(expected, &actual) {
                return false;
            }
        }

        true
    }

    fn values_equal(&self, expected: &Value, actual: &Value) -> bool {
        if self.strict {
            expected == actual
        } else {
            loose_eq(expected, actual)
        }
    }
}

/// Lazy iterator returned by [`DocumentFilter::filter_by_properties`].
///
/// Single pass: once exhausted or once the limit is reached it yields nothing more.
#[derive(Debug)]
pub struct FilteredDocuments<'c, I> {
    documents: I,
    constraints: &'c Map<String, Value>,
    filter: DocumentFilter,
    limit: usize,
    yielded: usize,
}

impl<I, D> Iterator for FilteredDocuments<'_, I>
where
    I: Iterator<Item = D>,
    D: KeyValueCoding,
{
    type Item = D;

    fn next(&mut self) -> Option<Self::Item> {
        if self.yielded >= self.limit {
            return None;
        }

        for document in self.documents.by_ref() {
            if self.filter.matches(&document, self.constraints) {
                self.yielded += 1;
                return Some(document);
            }
        }

        None
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => numeric_string(text),
        _ => None,
    }
}

fn numeric_string(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|number| number.is_finite())
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty() && text != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(object) => !object.is_empty(),
    }
}

/// Loose equality between two JSON values.
pub(crate) fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(flag), other) | (other, Value::Bool(flag)) => *flag == truthy(other),
        (Value::Null, Value::String(text)) | (Value::String(text), Value::Null) => text.is_empty(),
        (Value::Null, other) | (other, Value::Null) => !truthy(other),
        (Value::Number(_), Value::Number(_)) => as_number(left) == as_number(right),
        (Value::Number(number), Value::String(text))
        | (Value::String(text), Value::Number(number)) => {
            match numeric_string(text) {
                Some(parsed) => number.as_f64() == Some(parsed),
                None => number.to_string() == *text,
            }
        }
        (Value::String(a), Value::String(b)) => match (numeric_string(a), numeric_string(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| loose_eq(x, y)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use serde_json::json;
    use std::cell::Cell;

    fn doc(id: &str, data: Value) -> Document {
        Document::with_data("test", id, &data).unwrap()
    }

    fn constraints(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_loose_equality() {
        assert!(loose_eq(&json!(1), &json!(1.0)));
        assert!(loose_eq(&json!(42), &json!("42")));
        assert!(loose_eq(&json!("1e1"), &json!("10")));
        assert!(loose_eq(&json!(true), &json!(1)));
        assert!(loose_eq(&json!(true), &json!("yes")));
        assert!(loose_eq(&json!(false), &json!("0")));
        assert!(loose_eq(&Value::Null, &json!(false)));
        assert!(loose_eq(&Value::Null, &json!("")));
        assert!(loose_eq(&Value::Null, &json!(0)));
        assert!(loose_eq(&json!([1, "2"]), &json!(["1", 2])));
        assert!(loose_eq(&json!({"a": 1}), &json!({"a": "1"})));

        assert!(!loose_eq(&json!("abc"), &json!(0)));
        assert!(!loose_eq(&Value::Null, &json!("a")));
        assert!(!loose_eq(&json!([1]), &json!([1, 2])));
        assert!(!loose_eq(&json!({"a": 1}), &json!({"b": 1})));
    }

    #[test]
    fn test_strict_requires_same_type() {
        let filter = DocumentFilter::strict();
        let documents = vec![doc("a", json!({"age": "42"})), doc("b", json!({"age": 42}))];
        let wanted = constraints(json!({"age": 42}));

        let result: Vec<_> = filter.filter_by_properties(documents, &wanted, usize::MAX).collect();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id(), "b");
    }

    #[test]
    fn test_loose_by_default() {
        let filter = DocumentFilter::default();
        let documents = vec![doc("a", json!({"age": "42"})), doc("b", json!({"age": 42}))];
        let wanted = constraints(json!({"age": 42}));

        let result: Vec<_> = filter.filter_by_properties(documents, &wanted, usize::MAX).collect();

        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_key_paths_and_declared_attributes() {
        let filter = DocumentFilter::new();
        let documents = vec![
            doc("a", json!({"address": {"city": "Vienna"}})),
            doc("b", json!({"address": {"city": "Graz"}})),
        ];
        let wanted = constraints(json!({"address.city": "Graz", "db": "test"}));

        let result: Vec<_> = filter.filter_by_properties(documents, &wanted, usize::MAX).collect();

        assert_eq!(result.iter().map(|d| d.id()).collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_absent_value_compares_as_null() {
        let documents = vec![doc("a", json!({"x": 1})), doc("b", json!({"x": 1, "flag": true}))];
        let wanted = constraints(json!({"flag": null}));

        let strict: Vec<_> = DocumentFilter::strict()
            .filter_by_properties(documents.clone(), &wanted, usize::MAX)
            .collect();
        assert_eq!(strict.iter().map(|d| d.id()).collect::<Vec<_>>(), vec!["a"]);

        let wanted = constraints(json!({"flag": false}));
        let loose: Vec<_> = DocumentFilter::new()
            .filter_by_properties(documents, &wanted, usize::MAX)
            .collect();
        assert_eq!(loose.iter().map(|d| d.id()).collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_undecodable_document_never_matches() {
        let mut broken = Document::new("test", "broken").unwrap();
        broken.set_data_protected(Some("{oops".to_string()));
        let documents = vec![broken, doc("ok", json!({"name": "n"}))];
        let wanted = constraints(json!({"name": "n"}));

        let result: Vec<_> = DocumentFilter::new()
            .filter_by_properties(documents, &wanted, usize::MAX)
            .collect();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id(), "ok");
    }

    #[test]
    fn test_stops_pulling_after_limit() {
        let pulled = Cell::new(0usize);
        let documents = (0..100).map(|i| {
            pulled.set(pulled.get() + 1);
            doc(&format!("doc{i}"), json!({"even": i % 2 == 0}))
        });
        let wanted = constraints(json!({"even": true}));

        let result: Vec<_> = DocumentFilter::strict()
            .filter_by_properties(documents, &wanted, 3)
            .collect();

        assert_eq!(
            result.iter().map(|d| d.id()).collect::<Vec<_>>(),
            vec!["doc0", "doc2", "doc4"]
        );
        assert_eq!(pulled.get(), 5);
    }

    #[test]
    fn test_limit_zero_pulls_nothing() {
        let pulled = Cell::new(0usize);
        let documents = (0..10).map(|i| {
            pulled.set(pulled.get() + 1);
            doc(&format!("doc{i}"), json!({}))
        });
        let wanted = Map::new();

        let result: Vec<_> = DocumentFilter::new()
            .filter_by_properties(documents, &wanted, 0)
            .collect();

        assert!(result.is_empty());
        assert_eq!(pulled.get(), 0);
    }

    #[test]
    fn test_preserves_input_order() {
        let documents = vec![
            doc("z", json!({"k": 1})),
            doc("a", json!({"k": 1})),
            doc("m", json!({"k": 2})),
            doc("b", json!({"k": 1})),
        ];
        let wanted = constraints(json!({"k": 1}));

        let result: Vec<_> = DocumentFilter::new()
            .filter_by_properties(documents, &wanted, usize::MAX)
            .collect();

        assert_eq!(
            result.iter().map(|d| d.id()).collect::<Vec<_>>(),
            vec!["z", "a", "b"]
        );
    }
}
