//! Participant identities and the per-file presentity cache

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use plist::Value;

use crate::graph::{ArchiveGraph, uid_index, value_kind};
use crate::metadata::ConversationMetadata;
use crate::{Error, Result};

const ID_FIELD: &str = "ID";
const SERVICE_FIELD: &str = "ServiceName";

/// A resolved participant identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentity {
    /// Normalized identifier (leading `+` stripped)
    pub id: String,
    /// Display name from the metadata map, empty when unknown
    pub name: String,
    /// Messaging service this identity belongs to
    pub service: String,
    /// Whether the owner identifier prefixes this identity
    pub is_owner: bool,
}

impl Presentity {
    /// Decode an archived presentity object
    pub fn decode(
        graph: &ArchiveGraph,
        object: &Value,
        metadata: &ConversationMetadata,
    ) -> Result<Self> {
        let resolved = graph.follow(object)?;
        let dict = resolved.as_dictionary().ok_or_else(|| {
            Error::Structure(format!(
                "presentity is {}, expected a dictionary",
                value_kind(resolved)
            ))
        })?;

        let raw_id = dict
            .get(ID_FIELD)
            .ok_or_else(|| Error::Structure(format!("presentity has no `{ID_FIELD}` field")))?;
        let id = strip_handle_prefix(graph.string_at(raw_id)?).to_string();

        let service = match dict.get(SERVICE_FIELD) {
            Some(value) if !graph.is_null(value) => graph.string_at(value)?.to_string(),
            _ => String::new(),
        };

        let name = metadata.display_name(&id).unwrap_or("").to_string();
        let is_owner = metadata
            .owner_id()
            .is_some_and(|owner| id.starts_with(owner));

        Ok(Presentity {
            id,
            name,
            service,
            is_owner,
        })
    }
}

/// Strip the dialing prefix from an archived identifier
pub fn strip_handle_prefix(id: &str) -> &str {
    id.trim_start_matches('+')
}

/// Per-file cache mapping a UID index to its decoded [`Presentity`]
///
/// Built lazily as messages reference participants, so each distinct
/// identity is decoded from the graph at most once per file.
#[derive(Debug, Default)]
pub struct PresentityCache {
    entries: HashMap<usize, Presentity>,
}

impl PresentityCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the presentity a UID reference designates, decoding on first use
    pub fn fetch(
        &mut self,
        graph: &ArchiveGraph,
        reference: &Value,
        metadata: &ConversationMetadata,
    ) -> Result<&Presentity> {
        let index = uid_index(reference).ok_or_else(|| {
            Error::Structure(format!(
                "expected a UID reference to a presentity, found {}",
                value_kind(reference)
            ))
        })?;

        let entry = match self.entries.entry(index) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let object = graph.resolve(reference)?;
                vacant.insert(Presentity::decode(graph, object, metadata)?)
            },
        };
        Ok(entry)
    }

    /// Number of cached identities
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
