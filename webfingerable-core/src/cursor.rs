//! Paginated, forward-only reads over a parameterized query.
//!
//! A [`CursorSource`] pulls `page_size` rows at a time using `LIMIT`/`OFFSET`,
//! asking for one extra row as a look-ahead. When the look-ahead row is
//! missing the page was the last one and no further query is issued. An
//! optional quota caps the total number of rows the source will ever yield.
//!
//! The source assumes the underlying rows do not move while it runs; rows
//! that are deleted or reordered between pages may be skipped or repeated.

use crate::data::Database;
use crate::error::{Result, StoreError};
use rusqlite::Row;
use rusqlite::types::Value;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Flowing,
    Paused,
    Ended,
}

pub struct CursorSource<T> {
    db: Database,
    query: String,
    params: Vec<(String, Value)>,
    page_size: usize,
    quota: Option<usize>,
    map_row: fn(&Row<'_>) -> rusqlite::Result<T>,
    buffer: VecDeque<T>,
    offset: usize,
    exhausted: bool,
    state: SourceState,
    pages_fetched: usize,
}

impl<T> CursorSource<T> {
    /// `query` must bind `:limit` and `:offset` in addition to `params`.
    pub fn new(
        db: Database,
        query: impl Into<String>,
        params: Vec<(String, Value)>,
        page_size: usize,
        quota: Option<usize>,
        map_row: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Self> {
        if page_size == 0 {
            return Err(StoreError::InvalidCursor("page size must be at least 1".to_string()));
        }

        let query = query.into();
        if !query.contains(":limit") || !query.contains(":offset") {
            return Err(StoreError::InvalidCursor(
                "query must bind :limit and :offset".to_string(),
            ));
        }
        db.prepare_check(&query)?;

        Ok(Self {
            db,
            query,
            params,
            page_size,
            quota,
            map_row,
            buffer: VecDeque::with_capacity(page_size),
            offset: 0,
            exhausted: false,
            state: SourceState::Flowing,
            pages_fetched: 0,
        })
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == SourceState::Paused
    }

    pub fn is_ended(&self) -> bool {
        self.state == SourceState::Ended
    }

    /// Rows handed out or buffered so far; the next page starts here.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Stop yielding rows until [`resume`](Self::resume). No-op once ended.
    pub fn pause(&mut self) {
        if self.state == SourceState::Flowing {
            self.state = SourceState::Paused;
        }
    }

    /// Returns true if the source was paused and is flowing again.
    pub fn resume(&mut self) -> bool {
        if self.state == SourceState::Paused {
            self.state = SourceState::Flowing;
            true
        } else {
            false
        }
    }

    fn remaining(&self) -> Option<usize> {
        self.quota.map(|quota| quota.saturating_sub(self.offset))
    }

    fn fill(&mut self) -> Result<()> {
        let limit = match self.remaining() {
            Some(0) => {
                self.exhausted = true;
                return Ok(());
            }
            Some(remaining) => remaining.min(self.page_size + 1),
            None => self.page_size + 1,
        };

        let mut rows =
            self.db
                .fetch_page(&self.query, &self.params, limit, self.offset, self.map_row)?;
        self.pages_fetched += 1;

        let has_more = rows.len() > self.page_size;
        rows.truncate(self.page_size);

        debug!(
            "Page {} at offset {}: {} rows (more: {})",
            self.pages_fetched,
            self.offset,
            rows.len(),
            has_more
        );

        self.offset += rows.len();
        self.buffer.extend(rows);

        if !has_more || self.remaining() == Some(0) {
            self.exhausted = true;
        }
        Ok(())
    }
}

/// A paused source yields `None` without ending; check
/// [`is_ended`](CursorSource::is_ended) to tell the two apart. A query
/// failure is yielded once and ends the source.
impl<T> Iterator for CursorSource<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.state != SourceState::Flowing {
                return None;
            }

            if let Some(row) = self.buffer.pop_front() {
                return Some(Ok(row));
            }

            if self.exhausted {
                self.state = SourceState::Ended;
                return None;
            }

            if let Err(e) = self.fill() {
                self.state = SourceState::Ended;
                return Some(Err(e));
            }
        }
    }
}
