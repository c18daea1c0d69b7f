//! ichat - A Rust library for decoding Apple Messages archive files
//!
//! This library parses the `.ichat` transcript files written by the Mac
//! Messages application. Each file is a keyed archive: a property-list
//! container holding one conversation's object graph in flattened form.
//!
//! ## Archive structure
//!
//! A keyed archive consists of:
//! - `$objects`: a flat array holding every archived object
//! - `$top`: a dictionary with two entry points, `metadata` and `root`
//! - `CF$UID` back-references: object relationships are expressed as integer
//!   indexes into `$objects` instead of direct nesting
//!
//! Associative structures inside the graph use an ordered-keys/ordered-values
//! encoding (`NS.keys` / `NS.objects` parallel arrays), and plain sequences
//! use `NS.objects` alone. The decoder resolves these back into typed domain
//! objects: conversation participants, timestamps, message bodies and the
//! attached-file metadata embedded in attributed strings.
//!
//! # Example - Collecting messages from an archive tree
//!
//! ```no_run
//! use ichat::MessageSource;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = MessageSource::new("~/Library/Messages/Archive")
//!     .attachments_root("~/Library/Messages/Attachments");
//!
//! let outcome = source.collect_messages(Some(2023))?;
//! for message in &outcome.messages {
//!     println!("[{}] {}: {}", message.timestamp, message.who, message.text);
//! }
//! for failure in &outcome.failures {
//!     eprintln!("skipped {}: {}", failure.path.display(), failure.error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Decoding a single archive file
//!
//! ```no_run
//! use ichat::graph::ArchiveGraph;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = ArchiveGraph::from_file("chat.ichat")?;
//! println!("{} archived objects", graph.len());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod attachment;
pub mod graph;
pub mod keyed;
pub mod message;
pub mod metadata;
pub mod presentity;
pub mod scan;

#[cfg(test)]
pub(crate) mod fixtures;

/// Re-export commonly used types
pub use graph::ArchiveGraph;
pub use keyed::KeyedCollection;
pub use message::{Attachment, Message};
pub use metadata::ConversationMetadata;
pub use presentity::{Presentity, PresentityCache};
pub use scan::{FileFailure, MessageSource, ScanOutcome, collect_messages};

/// Error types for archive decoding
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("property list error: {0}")]
    Plist(#[from] plist::Error),

    #[error("invalid archive structure: {0}")]
    Structure(String),

    #[error("UID reference {index} is out of bounds for {len} archived objects")]
    ReferenceOutOfBounds { index: usize, len: usize },

    #[error("{}: message {index}: {source}", .path.display())]
    MessageDecode {
        path: PathBuf,
        index: usize,
        #[source]
        source: Box<Error>,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
