//! Ordered Keyed Collection Decoder
//!
//! Associative structures inside a keyed archive are not stored as plain
//! dictionaries. They archive as two parallel arrays under reserved field
//! names: `NS.keys` holds references to the key strings and `NS.objects`
//! holds references to the values, paired positionally. Plain sequences use
//! the `NS.objects` array alone.
//!
//! [`KeyedCollection`] resolves both arrays eagerly at construction time, so
//! lookups afterwards never touch the object graph again.

use plist::Value;

use crate::graph::{ArchiveGraph, value_kind};
use crate::{Error, Result};

pub(crate) const KEYS_FIELD: &str = "NS.keys";
pub(crate) const OBJECTS_FIELD: &str = "NS.objects";

/// A decoded ordered-keys/ordered-values associative structure
///
/// Borrows the resolved key strings and values from the [`ArchiveGraph`]
/// that produced it; collections live only as long as one file's decode.
#[derive(Debug)]
pub struct KeyedCollection<'a> {
    keys: Vec<&'a str>,
    values: Vec<&'a Value>,
}

impl<'a> KeyedCollection<'a> {
    /// Decode a keyed collection from an archived object
    ///
    /// Fails if either reserved field is missing or the two resolved
    /// sequences differ in length.
    pub fn decode(graph: &'a ArchiveGraph, value: &'a Value) -> Result<Self> {
        let resolved = graph.follow(value)?;
        let dict = resolved.as_dictionary().ok_or_else(|| {
            Error::Structure(format!(
                "keyed collection is {}, expected a dictionary",
                value_kind(resolved)
            ))
        })?;

        let key_refs = dict
            .get(KEYS_FIELD)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::Structure(format!("keyed collection has no `{KEYS_FIELD}` array"))
            })?;
        let value_refs = dict
            .get(OBJECTS_FIELD)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::Structure(format!("keyed collection has no `{OBJECTS_FIELD}` array"))
            })?;

        if key_refs.len() != value_refs.len() {
            return Err(Error::Structure(format!(
                "keyed collection has {} keys but {} values",
                key_refs.len(),
                value_refs.len()
            )));
        }

        let mut keys = Vec::with_capacity(key_refs.len());
        for reference in key_refs {
            keys.push(graph.string_at(reference)?);
        }
        let mut values = Vec::with_capacity(value_refs.len());
        for reference in value_refs {
            values.push(graph.follow(reference)?);
        }

        Ok(KeyedCollection { keys, values })
    }

    /// Look up a value by exact key match; first match wins
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.keys
            .iter()
            .position(|candidate| *candidate == key)
            .map(|index| self.values[index])
    }

    /// The key sequence, in archive order
    pub fn keys(&self) -> &[&'a str] {
        &self.keys
    }

    /// The resolved value sequence, in archive order
    pub fn values(&self) -> &[&'a Value] {
        &self.values
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the collection has no entries
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Decode the `NS.objects`-only sequence encoding
///
/// Every element is resolved eagerly; elements may be references or direct
/// values. Used for the metadata participant lists and the root message
/// sequence.
pub fn object_list<'a>(graph: &'a ArchiveGraph, value: &'a Value) -> Result<Vec<&'a Value>> {
    let resolved = graph.follow(value)?;
    let dict = resolved.as_dictionary().ok_or_else(|| {
        Error::Structure(format!(
            "object list is {}, expected a dictionary",
            value_kind(resolved)
        ))
    })?;
    let references = dict
        .get(OBJECTS_FIELD)
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Structure(format!("object list has no `{OBJECTS_FIELD}` array")))?;

    references
        .iter()
        .map(|reference| graph.follow(reference))
        .collect()
}

#[cfg(test)]
mod tests {
    use plist::Dictionary;

    use super::*;
    use crate::fixtures::ArchiveBuilder;

    fn collection_graph(pairs: &[(&str, &str)]) -> (ArchiveGraph, Value) {
        let mut builder = ArchiveBuilder::new();
        let pair_refs = pairs
            .iter()
            .map(|(key, value)| {
                let key_ref = builder.push_string(key);
                let value_ref = builder.push_string(value);
                (key_ref, value_ref)
            })
            .collect::<Vec<_>>();
        let collection = builder.push_keyed(pair_refs);
        let graph = ArchiveGraph::from_value(
            builder.build(ArchiveBuilder::uid(0), ArchiveBuilder::uid(0)),
        )
        .unwrap();
        (graph, collection)
    }

    #[test]
    fn lookup_returns_positionally_paired_values() {
        let (graph, reference) = collection_graph(&[("alpha", "1"), ("beta", "2")]);
        let collection = KeyedCollection::decode(&graph, &reference).unwrap();

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get("alpha").unwrap().as_string(), Some("1"));
        assert_eq!(collection.get("beta").unwrap().as_string(), Some("2"));
        assert!(collection.get("gamma").is_none());
    }

    #[test]
    fn first_match_wins_on_duplicate_keys() {
        let (graph, reference) = collection_graph(&[("dup", "first"), ("dup", "second")]);
        let collection = KeyedCollection::decode(&graph, &reference).unwrap();
        assert_eq!(collection.get("dup").unwrap().as_string(), Some("first"));
    }

    #[test]
    fn unequal_lengths_fail_decode() {
        let mut builder = ArchiveBuilder::new();
        let key = builder.push_string("only-key");
        let mut dict = Dictionary::new();
        dict.insert(KEYS_FIELD.to_string(), Value::Array(vec![key]));
        dict.insert(OBJECTS_FIELD.to_string(), Value::Array(Vec::new()));
        let collection = builder.push(Value::Dictionary(dict));

        let graph = ArchiveGraph::from_value(
            builder.build(ArchiveBuilder::uid(0), ArchiveBuilder::uid(0)),
        )
        .unwrap();
        let error = KeyedCollection::decode(&graph, &collection).unwrap_err();
        assert!(matches!(error, Error::Structure(_)));
    }

    #[test]
    fn missing_reserved_field_fails_decode() {
        let mut builder = ArchiveBuilder::new();
        let orphan = builder.push(Value::Dictionary(Dictionary::new()));
        let graph = ArchiveGraph::from_value(
            builder.build(ArchiveBuilder::uid(0), ArchiveBuilder::uid(0)),
        )
        .unwrap();
        assert!(KeyedCollection::decode(&graph, &orphan).is_err());
    }

    #[test]
    fn object_list_resolves_every_element() {
        let mut builder = ArchiveBuilder::new();
        let first = builder.push_string("one");
        let second = builder.push_string("two");
        let list = builder.push_object_list(vec![first, second]);

        let graph = ArchiveGraph::from_value(
            builder.build(ArchiveBuilder::uid(0), ArchiveBuilder::uid(0)),
        )
        .unwrap();
        let elements = object_list(&graph, &list).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].as_string(), Some("one"));
        assert_eq!(elements[1].as_string(), Some("two"));
    }

    #[test]
    fn object_list_rejects_non_sequences() {
        let mut builder = ArchiveBuilder::new();
        let plain = builder.push_string("not a list");
        let graph = ArchiveGraph::from_value(
            builder.build(ArchiveBuilder::uid(0), ArchiveBuilder::uid(0)),
        )
        .unwrap();
        assert!(object_list(&graph, &plain).is_err());
    }
}
