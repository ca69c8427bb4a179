#![doc = include_str!("../README.md")]

mod bucket;
pub mod quaternary;
mod table;

pub use quaternary::BuildError;
pub use table::Table;

/// A single table row: an ordered sequence of string cells.
///
/// The empty row is a *hole*: the slot a deleted row leaves behind, or a
/// placeholder inserted as-is via [`Table::insert_holes`]. Holes own no
/// cells, match no predicate, and are skipped by every operation that does
/// not carry `holes` in its name.
pub type Row = Vec<String>;
