//! Scriptmark core library: the scoring and validation engine behind manual
//! marking of scanned exam scripts.
//!
//! Graders place [`Mark`]s on page images; a [`Candidate`] tallies and
//! collates them into question and part scores and checks them against a
//! [`MarkScheme`]. A [`Session`] ties this to durable storage, navigation and
//! pointer-driven editing. With the `python` feature the crate also builds as
//! the `_scriptmark_core` Python extension module.

pub mod candidate;
pub mod config;
pub mod editing;
pub mod errors;
pub mod export;
pub mod ingest;
pub mod models;
pub mod navigation;
pub mod scheme;
pub mod session;
pub mod store;

#[cfg(feature = "python")]
mod python;

pub use candidate::{Candidate, CheckReport, Collation, Completeness, IncompleteReason};
pub use config::{InputMapping, PointerButton, PressAction, SessionConfig};
pub use editing::{EditOutcome, Press};
pub use errors::{MarkingError, MarkingResult};
pub use export::{ExportGate, ExportTables};
pub use models::{Mark, MarkKind, PageMarks, StrokePoint};
pub use navigation::NavState;
pub use scheme::MarkScheme;
pub use session::Session;
pub use store::MarkStore;
