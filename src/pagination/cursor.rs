//! Offset cursor

/// Monotonic skip/limit cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    offset: u64,
    limit: u64,
}

impl PaginationCursor {
    /// Start at offset 0
    pub fn new(limit: u64) -> Self {
        Self { offset: 0, limit }
    }

    /// Current offset (`SKIP`)
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Page size (`LIMIT`)
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Advance by exactly one page.
    ///
    /// The step is `limit` even when the last page came back short: the next
    /// fetch past the end returns nothing and ends the run.
    pub fn advance(&mut self) {
        self.offset += self.limit;
    }
}
