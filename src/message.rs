//! Message Reconstruction
//!
//! The `root` entry point of an archive resolves to a positional object list
//! whose third slot is the conversation's message sequence. Each entry is an
//! archived instant message carrying its timestamp, sender and subject
//! identities, a globally-unique identifier, and a body that is either a
//! flat string or an attributed string with embedded attachment metadata.
//!
//! Decoding normalizes every entry into a [`Message`] record that owns all
//! of its data; the object graph is discarded once a file's decode finishes.
//!
//! ## Threading
//!
//! A message's conversation thread is usually labeled by its sender. The
//! exception is email-style sender identities (the `e:` prefix): there the
//! archive records the counterparty in the `Subject` field, and the thread
//! takes its name and identifier from the subject instead.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, Utc};
use plist::{Dictionary, Value};
use serde::Serialize;

use crate::attachment::resolve_attachment;
use crate::graph::{ArchiveGraph, value_kind};
use crate::keyed::{KEYS_FIELD, KeyedCollection, object_list};
use crate::metadata::ConversationMetadata;
use crate::presentity::{Presentity, PresentityCache};
use crate::{Error, Result};

const ROOT_MESSAGES_INDEX: usize = 2;

const TIME_FIELD: &str = "Time";
const SENDER_FIELD: &str = "Sender";
const SUBJECT_FIELD: &str = "Subject";
const GUID_FIELD: &str = "GUID";
const MESSAGE_TEXT_FIELD: &str = "MessageText";
const ORIGINAL_MESSAGE_FIELD: &str = "OriginalMessage";
const ATTRIBUTED_STRING_FIELD: &str = "NSString";
const ATTRIBUTES_FIELD: &str = "NSAttributes";
const TIME_INTERVAL_FIELD: &str = "NS.time";

const TRANSFER_GUID_ATTRIBUTE: &str = "__kIMFileTransferGUIDAttributeName";
const FILENAME_ATTRIBUTE: &str = "__kIMFilenameAttributeName";

const EMAIL_IDENTITY_PREFIX: &str = "e:";

/// The object-replacement character that marks an attachment in body text
pub const ATTACHMENT_PLACEHOLDER: char = '\u{fffc}';
/// Literal marker substituted for every placeholder occurrence
pub const ATTACHMENT_MARKER: &str = "<att>";

/// 2001-01-01T00:00:00Z, the reference epoch archived time intervals count from
const REFERENCE_EPOCH_UNIX_MILLIS: i64 = 978_307_200_000;

/// An attached file recorded on a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    /// File name as recorded in the archive
    pub file_name: String,
    /// On-disk location, when the backing file could be located
    pub path: Option<PathBuf>,
}

/// One normalized message record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Archive file this message came from
    pub source_file: PathBuf,
    /// Display name of the conversation thread
    pub who: String,
    /// Stable thread identifier
    pub thread_id: String,
    /// Position among the kept messages of the source file
    pub sequence_index: usize,
    /// Absolute send time
    pub timestamp: DateTime<Utc>,
    /// Globally-unique message identifier, verbatim
    pub guid: String,
    /// Whether this is the first kept message of its file
    pub is_first_in_file: bool,
    /// Whether the archive owner sent this message
    pub is_from_owner: bool,
    /// Decoded body, with placeholders rewritten to [`ATTACHMENT_MARKER`]
    pub text: String,
    /// Messaging service the conversation used
    pub service: String,
    /// Comma-joined names of the other conversation parties
    pub party: String,
    /// Attached files, in body order
    pub attachments: Vec<Attachment>,
}

/// Decode every message of one archive file
///
/// A fresh decode context (metadata, presentity cache) is built for the
/// file; nothing persists across calls. With `year` set, messages whose
/// local calendar year differs are skipped without consuming a sequence
/// index, so the first kept message is still first-in-file.
pub fn decode_file(
    path: &Path,
    attachments_root: Option<&Path>,
    year: Option<i32>,
    named_handles: &HashMap<String, String>,
) -> Result<Vec<Message>> {
    let graph = ArchiveGraph::from_file(path)?;
    let metadata = ConversationMetadata::decode(&graph, named_handles)?;
    let mut presentities = PresentityCache::new();

    let root_entries = object_list(&graph, graph.root()?)?;
    let sequence = root_entries.get(ROOT_MESSAGES_INDEX).ok_or_else(|| {
        Error::Structure(format!(
            "archive root lists {} entries; no message sequence at index {ROOT_MESSAGES_INDEX}",
            root_entries.len()
        ))
    })?;
    let entries = object_list(&graph, sequence)?;

    let mut messages = Vec::new();
    for (entry_index, entry) in entries.iter().enumerate() {
        let decoded = decode_entry(
            &graph,
            entry,
            &metadata,
            &mut presentities,
            path,
            attachments_root,
            year,
            messages.len(),
        )
        .map_err(|source| Error::MessageDecode {
            path: path.to_path_buf(),
            index: entry_index,
            source: Box::new(source),
        })?;
        if let Some(message) = decoded {
            messages.push(message);
        }
    }
    Ok(messages)
}

/// Decode one archived message entry; `None` means the year filter dropped it
#[allow(clippy::too_many_arguments)]
fn decode_entry(
    graph: &ArchiveGraph,
    entry: &Value,
    metadata: &ConversationMetadata,
    presentities: &mut PresentityCache,
    path: &Path,
    attachments_root: Option<&Path>,
    year: Option<i32>,
    sequence_index: usize,
) -> Result<Option<Message>> {
    let resolved = graph.follow(entry)?;
    let message = resolved.as_dictionary().ok_or_else(|| {
        Error::Structure(format!(
            "message entry is {}, expected a dictionary",
            value_kind(resolved)
        ))
    })?;

    let time = message
        .get(TIME_FIELD)
        .ok_or_else(|| Error::Structure(format!("`{TIME_FIELD}` field is missing")))?;
    let timestamp = decode_time(graph, time)?;
    if let Some(year) = year
        && timestamp.with_timezone(&Local).year() != year
    {
        return Ok(None);
    }

    let sender_ref = message
        .get(SENDER_FIELD)
        .ok_or_else(|| Error::Structure(format!("`{SENDER_FIELD}` field is missing")))?;
    let sender = presentities.fetch(graph, sender_ref, metadata)?.clone();

    let subject = match message.get(SUBJECT_FIELD) {
        Some(reference) if !graph.is_null(reference) => {
            Some(presentities.fetch(graph, reference, metadata)?.clone())
        },
        _ => None,
    };

    let (who, thread_id) = thread_identity(&sender, subject.as_ref());
    let party = metadata.party_excluding(locally_relevant_name(&sender, subject.as_ref()));

    let guid_ref = message
        .get(GUID_FIELD)
        .ok_or_else(|| Error::Structure(format!("`{GUID_FIELD}` field is missing")))?;
    let guid = graph.string_at(guid_ref)?.to_string();

    let (text, pending) = decode_body(graph, message)?;
    let attachments = pending
        .into_iter()
        .map(|attachment| {
            let path = attachments_root.and_then(|root| {
                resolve_attachment(root, &attachment.transfer_guid, &attachment.file_name)
            });
            Attachment {
                file_name: attachment.file_name,
                path,
            }
        })
        .collect();

    Ok(Some(Message {
        source_file: path.to_path_buf(),
        who,
        thread_id,
        sequence_index,
        timestamp,
        guid,
        is_first_in_file: sequence_index == 0,
        is_from_owner: sender.is_owner,
        text,
        service: sender.service,
        party,
        attachments,
    }))
}

/// Pick the thread's display name and identifier from sender and subject
fn thread_identity(sender: &Presentity, subject: Option<&Presentity>) -> (String, String) {
    match subject {
        Some(subject) if sender.id.starts_with(EMAIL_IDENTITY_PREFIX) => {
            (subject.name.clone(), subject.id.clone())
        },
        _ => (sender.name.clone(), sender.id.clone()),
    }
}

/// The name standing for the local side of the exchange, excluded from `party`
///
/// When a counterparty sends, the subject (when present) is the local
/// account; when the owner sends, the sender itself is.
fn locally_relevant_name<'a>(sender: &'a Presentity, subject: Option<&'a Presentity>) -> &'a str {
    if sender.is_owner {
        &sender.name
    } else {
        subject.map(|subject| subject.name.as_str()).unwrap_or(&sender.name)
    }
}

/// Decode an archived send time into an absolute instant
fn decode_time(graph: &ArchiveGraph, value: &Value) -> Result<DateTime<Utc>> {
    let resolved = graph.follow(value)?;
    let interval = match resolved {
        Value::Dictionary(dict) => {
            let raw = dict.get(TIME_INTERVAL_FIELD).ok_or_else(|| {
                Error::Structure(format!(
                    "`{TIME_FIELD}` object has no `{TIME_INTERVAL_FIELD}` interval"
                ))
            })?;
            real_value(graph.follow(raw)?).ok_or_else(|| {
                Error::Structure(format!("`{TIME_INTERVAL_FIELD}` is not a number"))
            })?
        },
        Value::Date(date) => {
            return Ok(DateTime::<Utc>::from(std::time::SystemTime::from(
                date.to_owned(),
            )));
        },
        other => real_value(other).ok_or_else(|| {
            Error::Structure(format!(
                "`{TIME_FIELD}` resolves to {}, expected a date object",
                value_kind(other)
            ))
        })?,
    };

    let millis = REFERENCE_EPOCH_UNIX_MILLIS + (interval * 1000.0).round() as i64;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        Error::Structure(format!(
            "time interval {interval} is outside the representable range"
        ))
    })
}

fn real_value(value: &Value) -> Option<f64> {
    match value {
        Value::Real(real) => Some(*real),
        Value::Integer(integer) => integer.as_signed().map(|signed| signed as f64),
        _ => None,
    }
}

/// Attachment metadata lifted from an attributed string, pre-location
struct PendingAttachment {
    file_name: String,
    transfer_guid: String,
}

/// Decode the message body and any attachment metadata embedded in it
fn decode_body(
    graph: &ArchiveGraph,
    message: &Dictionary,
) -> Result<(String, Vec<PendingAttachment>)> {
    if let Some(rich) = message.get(MESSAGE_TEXT_FIELD)
        && !graph.is_null(rich)
    {
        let resolved = graph.follow(rich)?;
        let attributed = resolved.as_dictionary().ok_or_else(|| {
            Error::Structure(format!(
                "`{MESSAGE_TEXT_FIELD}` is {}, expected an attributed string",
                value_kind(resolved)
            ))
        })?;

        let mut pending = Vec::new();
        if let Some(attributes) = attributed.get(ATTRIBUTES_FIELD)
            && !graph.is_null(attributes)
        {
            decode_attributes(graph, attributes, &mut pending)?;
        }

        let text_object = attributed.get(ATTRIBUTED_STRING_FIELD).ok_or_else(|| {
            Error::Structure(format!(
                "attributed string has no `{ATTRIBUTED_STRING_FIELD}` field"
            ))
        })?;
        let text = graph.string_at(text_object)?;
        Ok((rewrite_placeholders(text), pending))
    } else if let Some(flat) = message.get(ORIGINAL_MESSAGE_FIELD) {
        Ok((rewrite_placeholders(graph.string_at(flat)?), Vec::new()))
    } else {
        Err(Error::Structure(format!(
            "message has neither `{MESSAGE_TEXT_FIELD}` nor `{ORIGINAL_MESSAGE_FIELD}`"
        )))
    }
}

/// Walk the attribute field: a single run dictionary, or a sequence of runs
fn decode_attributes(
    graph: &ArchiveGraph,
    attributes: &Value,
    pending: &mut Vec<PendingAttachment>,
) -> Result<()> {
    let resolved = graph.follow(attributes)?;
    let dict = resolved.as_dictionary().ok_or_else(|| {
        Error::Structure(format!(
            "`{ATTRIBUTES_FIELD}` is {}, expected a dictionary",
            value_kind(resolved)
        ))
    })?;

    if dict.get(KEYS_FIELD).is_some() {
        collect_attachment(graph, resolved, pending)
    } else {
        for run in object_list(graph, resolved)? {
            collect_attachment(graph, run, pending)?;
        }
        Ok(())
    }
}

/// Lift attachment metadata from one style run, ignoring non-attachment runs
fn collect_attachment(
    graph: &ArchiveGraph,
    run: &Value,
    pending: &mut Vec<PendingAttachment>,
) -> Result<()> {
    let attributes = KeyedCollection::decode(graph, run)?;
    let transfer_guid = attributes.get(TRANSFER_GUID_ATTRIBUTE);
    let file_name = attributes.get(FILENAME_ATTRIBUTE);

    if let (Some(transfer_guid), Some(file_name)) = (transfer_guid, file_name) {
        pending.push(PendingAttachment {
            file_name: graph.string_at(file_name)?.to_string(),
            transfer_guid: graph.string_at(transfer_guid)?.to_string(),
        });
    }
    Ok(())
}

/// Rewrite every attachment placeholder in a body to [`ATTACHMENT_MARKER`]
pub fn rewrite_placeholders(text: &str) -> String {
    text.replace(ATTACHMENT_PLACEHOLDER, ATTACHMENT_MARKER)
}
