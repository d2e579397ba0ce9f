//! Wharf Core - Record Types
//!
//! Pure data structures shared by every other crate in the workspace:
//! record identity, schemaless documents, query filters and the error
//! taxonomy. No I/O lives here.

pub mod error;
pub mod filter;
pub mod identity;
pub mod record;

pub use error::{CacheError, ConfigError, StorageError, ValidationError, WharfError, WharfResult};
pub use filter::Filter;
pub use identity::{Collection, RecordId};
pub use record::{is_blank, Document, Fields, Record, ID_FIELD};
