//! Pagination module
//!
//! Skip/limit pagination over the graph source.
//!
//! # Overview
//!
//! The source has no keyset cursor, so pages are addressed by offset over a
//! stable ordering (element id). Two fetches with the same offset and limit
//! against an unchanged source return the same nodes. If the source mutates
//! during a run, pages can skip or repeat nodes.

mod cursor;
mod fetcher;

pub use cursor::PaginationCursor;
pub use fetcher::PaginatedFetcher;

#[cfg(test)]
mod tests;
