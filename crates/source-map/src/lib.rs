//! Source position tracking and mapping for the template type-check transpiler.
//!
//! This crate provides the position vocabulary shared by the whole workspace:
//! byte-offset spans, capability-flagged mapping records between a source
//! template and generated type-check code, and the bidirectional offset query
//! surface used to project diagnostics and editor queries between the two
//! coordinate spaces.

mod line_index;
mod mapping;
mod span;

pub use line_index::{LineCol, LineIndex};
pub use mapping::{MappingFlags, SourceMap, SourceMapping};
pub use span::{ByteOffset, Span};
