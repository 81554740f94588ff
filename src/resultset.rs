//! Lazy resultset cursor over query output
//!
//! A resultset operates in one of two modes, fixed at construction:
//!
//! - **Streaming**: rows come one at a time from a live cursor; large result
//!   sets never get pulled into memory, and repositioning re-touches the
//!   cursor.
//! - **Buffered**: rows are materialized from the source at most once, on
//!   first access, then served from the in-memory list.
//!
//! The resultset is a read-only view: indexed writes always fail.

use crate::connection::Row;
use crate::error::{OrmError, OrmResult};

/// Iteration strategy fixed at construction by the query layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Streaming,
    Buffered,
}

/// Capability contract over a live query result
pub trait RowCursor: Send {
    /// Fetch the next row, `None` once the cursor is exhausted
    fn fetch(&mut self) -> OrmResult<Option<Row>>;

    /// Reposition the cursor to an absolute row index
    fn data_seek(&mut self, position: usize) -> OrmResult<()>;

    /// Total number of rows in the result
    fn num_rows(&mut self) -> OrmResult<usize>;

    /// Drain every remaining row; used once for buffered materialization
    fn fetch_all(&mut self) -> OrmResult<Vec<Row>>;
}

/// Opaque cache descriptor carried through from the finder parameters
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CacheHint {
    pub key: String,
    pub lifetime_secs: Option<u64>,
}

/// Cursor over a query result, streaming or buffered
pub struct Resultset {
    mode: Mode,
    cursor: Option<Box<dyn RowCursor>>,
    rows: Option<Vec<Row>>,
    pointer: Option<usize>,
    count: Option<usize>,
    active_row: Option<Row>,
    is_fresh: bool,
    cache: Option<CacheHint>,
}

impl std::fmt::Debug for Resultset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resultset")
            .field("mode", &self.mode)
            .field("pointer", &self.pointer)
            .field("count", &self.count)
            .field("is_fresh", &self.is_fresh)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Resultset {
    /// Wrap a live cursor; rows are fetched one at a time
    pub fn streaming(cursor: Box<dyn RowCursor>) -> Self {
        Self {
            mode: Mode::Streaming,
            cursor: Some(cursor),
            rows: None,
            pointer: None,
            count: None,
            active_row: None,
            is_fresh: true,
            cache: None,
        }
    }

    /// Wrap a cursor whose rows will be materialized once, on first access
    pub fn buffered(cursor: Box<dyn RowCursor>) -> Self {
        Self {
            mode: Mode::Buffered,
            cursor: Some(cursor),
            rows: None,
            pointer: None,
            count: None,
            active_row: None,
            is_fresh: true,
            cache: None,
        }
    }

    /// Wrap an already-fetched row list
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            mode: Mode::Buffered,
            cursor: None,
            rows: Some(rows),
            pointer: None,
            count: None,
            active_row: None,
            is_fresh: true,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: CacheHint) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Buffered mode only: pull every row from the source, at most once.
    /// The source cursor is released afterwards.
    fn materialize(&mut self) -> OrmResult<()> {
        if self.rows.is_some() {
            return Ok(());
        }
        match self.cursor.take() {
            Some(mut cursor) => {
                let rows = cursor.fetch_all()?;
                tracing::debug!(rows = rows.len(), "resultset materialized");
                self.rows = Some(rows);
            }
            None => self.rows = Some(Vec::new()),
        }
        Ok(())
    }

    fn load_row_at(&mut self, position: usize) -> OrmResult<()> {
        match self.mode {
            Mode::Streaming => {
                let cursor = self
                    .cursor
                    .as_mut()
                    .ok_or_else(|| OrmError::Database("streaming resultset has no cursor".to_string()))?;
                self.active_row = cursor.fetch()?;
            }
            Mode::Buffered => {
                self.materialize()?;
                let rows = self.rows.as_deref().unwrap_or(&[]);
                // Forward-only walk; the buffer is not assumed random-access.
                let mut iter = rows.iter();
                for _ in 0..position {
                    iter.next();
                }
                self.active_row = iter.next().cloned();
            }
        }
        Ok(())
    }

    /// Reposition to the first row
    pub fn rewind(&mut self) -> OrmResult<()> {
        match self.mode {
            Mode::Streaming => {
                // Only re-seek when the cursor was already positioned.
                if self.pointer.is_some() {
                    if let Some(cursor) = self.cursor.as_mut() {
                        cursor.data_seek(0)?;
                    }
                }
            }
            Mode::Buffered => self.materialize()?,
        }
        self.pointer = Some(0);
        self.load_row_at(0)
    }

    /// Advance the pointer one row forward
    pub fn next(&mut self) -> OrmResult<()> {
        let position = match self.pointer {
            Some(p) => p + 1,
            None => 0,
        };
        self.pointer = Some(position);
        self.load_row_at(position)
    }

    /// Whether the pointer currently addresses a row
    pub fn valid(&self) -> bool {
        self.active_row.is_some()
    }

    /// Pointer position of the active row, `None` before the first `rewind`/`next`
    pub fn key(&self) -> Option<usize> {
        self.pointer
    }

    /// The row materialized by the most recent successful positioning
    pub fn current(&self) -> Option<&Row> {
        self.active_row.as_ref()
    }

    /// Move the pointer to an absolute position. A no-op when the pointer
    /// already sits there, avoiding redundant cursor traffic.
    pub fn seek(&mut self, position: usize) -> OrmResult<()> {
        if self.pointer == Some(position) {
            return Ok(());
        }
        if self.mode == Mode::Streaming {
            let cursor = self
                .cursor
                .as_mut()
                .ok_or_else(|| OrmError::Database("streaming resultset has no cursor".to_string()))?;
            cursor.data_seek(position)?;
            self.active_row = cursor.fetch()?;
        } else {
            self.load_row_at(position)?;
        }
        self.pointer = Some(position);
        Ok(())
    }

    /// Number of rows, computed at most once per resultset
    pub fn count(&mut self) -> OrmResult<usize> {
        if let Some(count) = self.count {
            return Ok(count);
        }
        let count = match self.mode {
            Mode::Streaming => match self.cursor.as_mut() {
                Some(cursor) => cursor.num_rows()?,
                None => 0,
            },
            Mode::Buffered => {
                self.materialize()?;
                self.rows.as_ref().map(Vec::len).unwrap_or(0)
            }
        };
        self.count = Some(count);
        Ok(count)
    }

    /// Whether `index` addresses a row within bounds
    pub fn offset_exists(&mut self, index: usize) -> OrmResult<bool> {
        Ok(index < self.count()?)
    }

    /// Random-access read. Reuses the active row when the pointer already
    /// addresses `index`; fails on out-of-bounds indexes.
    pub fn offset_get(&mut self, index: usize) -> OrmResult<Option<Row>> {
        if !self.offset_exists(index)? {
            return Err(OrmError::IndexOutOfRange {
                index,
                count: self.count()?,
            });
        }
        if self.pointer == Some(index) {
            return Ok(self.active_row.clone());
        }
        self.seek(index)?;
        Ok(self.active_row.clone())
    }

    /// The resultset is a read-only view over query output
    pub fn offset_set(&mut self, _index: usize, _row: Row) -> OrmResult<()> {
        Err(OrmError::ImmutableResultset)
    }

    pub fn offset_unset(&mut self, _index: usize) -> OrmResult<()> {
        Err(OrmError::ImmutableResultset)
    }

    /// First row, repositioning only when necessary
    pub fn get_first(&mut self) -> OrmResult<Option<Row>> {
        if self.pointer != Some(0) {
            self.rewind()?;
        }
        Ok(self.active_row.clone())
    }

    /// Last row, `None` for an empty resultset
    pub fn get_last(&mut self) -> OrmResult<Option<Row>> {
        let count = self.count()?;
        if count == 0 {
            return Ok(None);
        }
        self.seek(count - 1)?;
        Ok(self.active_row.clone())
    }

    /// Whether this resultset was just computed rather than served from a cache
    pub fn is_fresh(&self) -> bool {
        self.is_fresh
    }

    pub fn set_is_fresh(&mut self, fresh: bool) {
        self.is_fresh = fresh;
    }

    pub fn get_cache(&self) -> Option<&CacheHint> {
        self.cache.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn row(id: i64) -> Row {
        let mut row = Row::new();
        row.insert("id".to_string(), Value::Int(id));
        row
    }

    /// Cursor over a fixed row list, counting every primitive invocation
    struct CountingCursor {
        rows: Vec<Row>,
        position: usize,
        num_rows_calls: Arc<AtomicUsize>,
        fetch_all_calls: Arc<AtomicUsize>,
        seek_calls: Arc<AtomicUsize>,
    }

    impl CountingCursor {
        fn new(rows: Vec<Row>) -> Self {
            Self {
                rows,
                position: 0,
                num_rows_calls: Arc::new(AtomicUsize::new(0)),
                fetch_all_calls: Arc::new(AtomicUsize::new(0)),
                seek_calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl RowCursor for CountingCursor {
        fn fetch(&mut self) -> OrmResult<Option<Row>> {
            let row = self.rows.get(self.position).cloned();
            if row.is_some() {
                self.position += 1;
            }
            Ok(row)
        }

        fn data_seek(&mut self, position: usize) -> OrmResult<()> {
            self.seek_calls.fetch_add(1, Ordering::SeqCst);
            self.position = position;
            Ok(())
        }

        fn num_rows(&mut self) -> OrmResult<usize> {
            self.num_rows_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.len())
        }

        fn fetch_all(&mut self) -> OrmResult<Vec<Row>> {
            self.fetch_all_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.clone())
        }
    }

    #[test]
    fn test_streaming_iteration() {
        let cursor = CountingCursor::new(vec![row(1), row(2), row(3)]);
        let mut resultset = Resultset::streaming(Box::new(cursor));

        resultset.rewind().unwrap();
        let mut seen = Vec::new();
        while resultset.valid() {
            seen.push(resultset.current().unwrap().get("id").cloned().unwrap());
            resultset.next().unwrap();
        }
        assert_eq!(seen, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_count_memoized_in_streaming_mode() {
        let cursor = CountingCursor::new(vec![row(1), row(2)]);
        let calls = cursor.num_rows_calls.clone();
        let mut resultset = Resultset::streaming(Box::new(cursor));

        assert_eq!(resultset.count().unwrap(), 2);
        assert_eq!(resultset.count().unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_buffered_materializes_once() {
        let cursor = CountingCursor::new(vec![row(1), row(2), row(3)]);
        let calls = cursor.fetch_all_calls.clone();
        let mut resultset = Resultset::buffered(Box::new(cursor));

        resultset.rewind().unwrap();
        resultset.seek(2).unwrap();
        assert_eq!(resultset.count().unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_seek_same_position_is_a_noop() {
        let cursor = CountingCursor::new(vec![row(1), row(2)]);
        let seeks = cursor.seek_calls.clone();
        let mut resultset = Resultset::streaming(Box::new(cursor));

        resultset.seek(1).unwrap();
        let seeks_after_first = seeks.load(Ordering::SeqCst);
        resultset.seek(1).unwrap();
        assert_eq!(seeks.load(Ordering::SeqCst), seeks_after_first);
        assert_eq!(resultset.key(), Some(1));
    }

    #[test]
    fn test_offset_get_out_of_range() {
        let mut resultset = Resultset::from_rows(vec![row(1)]);
        let err = resultset.offset_get(5).unwrap_err();
        assert_eq!(err, OrmError::IndexOutOfRange { index: 5, count: 1 });
    }

    #[test]
    fn test_offset_get_reuses_active_row() {
        let mut resultset = Resultset::from_rows(vec![row(1), row(2)]);
        resultset.seek(1).unwrap();
        let fetched = resultset.offset_get(1).unwrap().unwrap();
        assert_eq!(fetched.get("id"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_resultset_is_immutable() {
        let mut resultset = Resultset::from_rows(vec![row(1)]);
        assert_eq!(resultset.offset_set(0, row(9)).unwrap_err(), OrmError::ImmutableResultset);
        assert_eq!(resultset.offset_unset(0).unwrap_err(), OrmError::ImmutableResultset);
    }

    #[test]
    fn test_get_first_and_last() {
        let mut resultset = Resultset::from_rows(vec![row(1), row(2), row(3)]);
        let first = resultset.get_first().unwrap().unwrap();
        assert_eq!(first.get("id"), Some(&Value::Int(1)));
        let last = resultset.get_last().unwrap().unwrap();
        assert_eq!(last.get("id"), Some(&Value::Int(3)));
        // get_first with the pointer already at 0 does not reposition
        resultset.rewind().unwrap();
        assert!(resultset.get_first().unwrap().is_some());
    }

    #[test]
    fn test_empty_resultset() {
        let mut resultset = Resultset::from_rows(Vec::new());
        resultset.rewind().unwrap();
        assert!(!resultset.valid());
        assert_eq!(resultset.count().unwrap(), 0);
        assert_eq!(resultset.get_last().unwrap(), None);
        assert!(!resultset.offset_exists(0).unwrap());
    }

    #[test]
    fn test_freshness_and_cache_hint() {
        let mut resultset = Resultset::from_rows(vec![row(1)])
            .with_cache(CacheHint { key: "robots-all".to_string(), lifetime_secs: Some(300) });
        assert!(resultset.is_fresh());
        resultset.set_is_fresh(false);
        assert!(!resultset.is_fresh());
        assert_eq!(resultset.get_cache().unwrap().key, "robots-all");
    }
}
