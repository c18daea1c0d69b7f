//! Conversation Metadata Decoder
//!
//! The `metadata` entry point of an archive resolves to a positional object
//! list describing the conversation. Two of its slots matter here: index 4
//! holds the participant display objects and index 6 the participant
//! identifier strings, paired positionally. Display entries may be bare
//! strings or `NS.string` wrappers.
//!
//! The first pairing names the archive owner. Metadata is decoded fresh for
//! every file; nothing carries over between files of the same scan.

use std::collections::HashMap;

use crate::graph::ArchiveGraph;
use crate::keyed::object_list;
use crate::presentity::strip_handle_prefix;
use crate::{Error, Result};

const PARTICIPANTS_INDEX: usize = 4;
const IDENTIFIERS_INDEX: usize = 6;

/// One conversation participant, in metadata order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Normalized identifier (leading `+` stripped)
    pub id: String,
    /// Display name
    pub name: String,
}

/// Participant names and the owner identity of one archive file
#[derive(Debug, Clone, Default)]
pub struct ConversationMetadata {
    participants: Vec<Participant>,
    names_by_id: HashMap<String, String>,
    owner_id: Option<String>,
}

impl ConversationMetadata {
    /// Decode the metadata entry point of an archive
    ///
    /// `named_handles` optionally maps identifiers (raw or normalized) to
    /// display names; a match overrides the name archived in the metadata.
    pub fn decode(graph: &ArchiveGraph, named_handles: &HashMap<String, String>) -> Result<Self> {
        let entries = object_list(graph, graph.metadata()?)?;

        let display_objects = entries.get(PARTICIPANTS_INDEX).ok_or_else(|| {
            Error::Structure(format!(
                "metadata lists {} entries; no participant list at index {PARTICIPANTS_INDEX}",
                entries.len()
            ))
        })?;
        let identifier_objects = entries.get(IDENTIFIERS_INDEX).ok_or_else(|| {
            Error::Structure(format!(
                "metadata lists {} entries; no identifier list at index {IDENTIFIERS_INDEX}",
                entries.len()
            ))
        })?;

        let mut display_names = Vec::new();
        for object in object_list(graph, display_objects)? {
            display_names.push(graph.string_at(object)?.to_string());
        }
        let mut identifiers = Vec::new();
        for object in object_list(graph, identifier_objects)? {
            identifiers.push(graph.string_at(object)?.to_string());
        }

        let mut metadata = ConversationMetadata::default();
        for (display_name, raw_id) in display_names.into_iter().zip(identifiers) {
            let id = strip_handle_prefix(&raw_id).to_string();
            let name = named_handles
                .get(&raw_id)
                .or_else(|| named_handles.get(&id))
                .cloned()
                .unwrap_or(display_name);

            if metadata.owner_id.is_none() {
                metadata.owner_id = Some(id.clone());
            }
            metadata
                .names_by_id
                .entry(id.clone())
                .or_insert_with(|| name.clone());
            metadata.participants.push(Participant { id, name });
        }

        Ok(metadata)
    }

    /// The archive owner's normalized identifier
    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    /// Look up a participant's display name by normalized identifier
    pub fn display_name(&self, id: &str) -> Option<&str> {
        self.names_by_id.get(id).map(String::as_str)
    }

    /// All participants, in metadata order
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Comma-joined participant names with one name excluded
    ///
    /// Order follows the metadata pairing; every occurrence of the excluded
    /// name is dropped.
    pub fn party_excluding(&self, excluded: &str) -> String {
        self.participants
            .iter()
            .filter(|participant| participant.name != excluded)
            .map(|participant| participant.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
