//! Position identifiers and the intervals they describe.
//!
//! The rendering engine hands out opaque, CFI-like strings to locate points
//! and ranges inside rendered content:
//!
//! ```text
//! epubcfi(/6/4!/4/2,/1:0,/1:11)
//!         │        │    └──── relative end   (path + ":" offset)
//!         │        └───────── relative start (path + ":" offset)
//!         └────────────────── parent path shared by both endpoints
//!
//! epubcfi(/6/4!/4/2/1:42)     point form, zero-width
//! ```
//!
//! This module is the only place that looks inside those strings. Everything
//! else stores them verbatim and works with [`PositionRange`] values produced
//! once at the boundary.

mod overlap;
mod parser;
mod range;

pub use overlap::find_overlap;
pub use parser::{PositionParseError, parse, try_parse};
pub use range::PositionRange;
