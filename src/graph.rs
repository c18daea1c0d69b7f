//! Keyed-Archive Object Graph
//!
//! A keyed archive stores every object in one flat `$objects` array and
//! replaces direct nesting with `CF$UID` back-references into that array.
//! The `$top` dictionary names the two entry points of the graph:
//! `metadata` (conversation participants) and `root` (the message list).
//!
//! [`ArchiveGraph`] owns the object array and resolves references shallowly
//! on demand. Resolution is pure: the same reference always yields the same
//! object, and an index outside the array is a decode error, never a
//! silent default.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use plist::Value;

use crate::{Error, Result};

const OBJECTS_KEY: &str = "$objects";
const TOP_KEY: &str = "$top";
const METADATA_KEY: &str = "metadata";
const ROOT_KEY: &str = "root";
const UID_KEY: &str = "CF$UID";
const NULL_SENTINEL: &str = "$null";
const STRING_WRAPPER_KEY: &str = "NS.string";

/// The flattened object graph of one archive file
#[derive(Debug)]
pub struct ArchiveGraph {
    /// Every archived object, in archive order
    objects: Vec<Value>,
    /// Entry-point reference to the conversation metadata
    metadata_ref: Value,
    /// Entry-point reference to the message list
    root_ref: Value,
}

impl ArchiveGraph {
    /// Parse an archive file from a path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse an archive from any seekable reader
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::from_value(Value::from_reader(reader)?)
    }

    /// Build the graph from an already-parsed property-list value
    ///
    /// The value must be a dictionary carrying an `$objects` array and a
    /// `$top` dictionary with `metadata` and `root` references. Anything
    /// else fails with [`Error::Structure`].
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Dictionary(mut dict) = value else {
            return Err(Error::Structure(
                "archive container is not a dictionary".to_string(),
            ));
        };

        let objects = match dict.remove(OBJECTS_KEY) {
            Some(Value::Array(objects)) => objects,
            Some(other) => {
                return Err(Error::Structure(format!(
                    "`{OBJECTS_KEY}` is {}, expected an array",
                    value_kind(&other)
                )));
            },
            None => {
                return Err(Error::Structure(format!(
                    "archive has no `{OBJECTS_KEY}` array"
                )));
            },
        };

        let top = match dict.remove(TOP_KEY) {
            Some(Value::Dictionary(top)) => top,
            _ => {
                return Err(Error::Structure(format!(
                    "archive has no `{TOP_KEY}` dictionary"
                )));
            },
        };

        let metadata_ref = top.get(METADATA_KEY).cloned().ok_or_else(|| {
            Error::Structure(format!("`{TOP_KEY}` has no `{METADATA_KEY}` reference"))
        })?;
        let root_ref = top
            .get(ROOT_KEY)
            .cloned()
            .ok_or_else(|| Error::Structure(format!("`{TOP_KEY}` has no `{ROOT_KEY}` reference")))?;

        Ok(ArchiveGraph {
            objects,
            metadata_ref,
            root_ref,
        })
    }

    /// All archived objects, in archive order
    pub fn objects(&self) -> &[Value] {
        &self.objects
    }

    /// Number of archived objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the object array is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Resolve the `metadata` entry point
    pub fn metadata(&self) -> Result<&Value> {
        self.resolve(&self.metadata_ref)
    }

    /// Resolve the `root` entry point
    pub fn root(&self) -> Result<&Value> {
        self.resolve(&self.root_ref)
    }

    /// Resolve a UID reference into the object it designates
    ///
    /// The input must be a reference; callers that expect one must treat any
    /// other value as a decode error, which this returns as
    /// [`Error::Structure`]. An index at or past the end of the object array
    /// is [`Error::ReferenceOutOfBounds`].
    pub fn resolve<'a>(&'a self, value: &Value) -> Result<&'a Value> {
        let index = uid_index(value).ok_or_else(|| {
            Error::Structure(format!(
                "expected a UID reference, found {}",
                value_kind(value)
            ))
        })?;
        self.objects.get(index).ok_or(Error::ReferenceOutOfBounds {
            index,
            len: self.objects.len(),
        })
    }

    /// Resolve a value that may or may not be a UID reference
    ///
    /// References are resolved through the object array; every other value
    /// is returned unchanged. Archive fields routinely hold either form.
    pub fn follow<'a>(&'a self, value: &'a Value) -> Result<&'a Value> {
        if uid_index(value).is_some() {
            self.resolve(value)
        } else {
            Ok(value)
        }
    }

    /// Decode a string-valued field
    ///
    /// Accepts a UID reference to (or a direct occurrence of) either a bare
    /// string or the `NS.string` single-field wrapper that mutable strings
    /// archive as.
    pub fn string_at<'a>(&'a self, value: &'a Value) -> Result<&'a str> {
        match self.follow(value)? {
            Value::String(text) => Ok(text),
            Value::Dictionary(dict) => {
                let inner = dict.get(STRING_WRAPPER_KEY).ok_or_else(|| {
                    Error::Structure(format!(
                        "expected a string object, found a dictionary without `{STRING_WRAPPER_KEY}`"
                    ))
                })?;
                match self.follow(inner)? {
                    Value::String(text) => Ok(text),
                    other => Err(Error::Structure(format!(
                        "`{STRING_WRAPPER_KEY}` wraps {}, expected a string",
                        value_kind(other)
                    ))),
                }
            },
            other => Err(Error::Structure(format!(
                "expected a string object, found {}",
                value_kind(other)
            ))),
        }
    }

    /// Whether a value designates the archiver's `$null` sentinel
    ///
    /// Absent object fields are archived as a reference to `$null`, so
    /// callers use this to tell "no subject" apart from a decode failure.
    pub fn is_null(&self, value: &Value) -> bool {
        matches!(self.follow(value), Ok(Value::String(text)) if text == NULL_SENTINEL)
    }
}

/// Extract the object-array index from a UID reference
///
/// Both encodings are accepted: the native `Uid` value produced by binary
/// property lists, and the single-entry `{"CF$UID": n}` dictionary that XML
/// property lists use in its place.
pub fn uid_index(value: &Value) -> Option<usize> {
    match value {
        Value::Uid(uid) => Some(uid.get() as usize),
        Value::Dictionary(dict) if dict.len() == 1 => dict
            .get(UID_KEY)?
            .as_unsigned_integer()
            .map(|index| index as usize),
        _ => None,
    }
}

/// Human-readable name of a value's variant, for error messages
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "an array",
        Value::Dictionary(_) => "a dictionary",
        Value::Boolean(_) => "a boolean",
        Value::Data(_) => "binary data",
        Value::Date(_) => "a date",
        Value::Real(_) => "a real",
        Value::Integer(_) => "an integer",
        Value::String(_) => "a string",
        Value::Uid(_) => "a UID reference",
        _ => "an unknown value",
    }
}
