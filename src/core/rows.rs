//! Purpose: Drain executor cursors to completion and convert rows into typed values.
//! Exports: `Row`, `Rows`, `Partial`, `for_each`, `collect_values`, `collect_owned`, `pluck`.
//! Role: Uniform iteration protocol over any cursor an executor hands back.
//! Invariants: A cursor is closed exactly once on every path, including callback failure.
//! Invariants: Deferred, row-processing and close errors are all returned; none is dropped.

use std::error::Error as StdError;
use std::fmt;

use crate::core::error::{Error, ErrorKind};
use crate::core::value::Scan;

/// Read access to the row a cursor is positioned on.
pub trait Row {
    /// Decodes the current row's columns into `targets`, left to right.
    fn scan(&self, targets: &mut [&mut dyn Scan]) -> Result<(), Error>;
}

/// A single-consumer cursor over a query result.
///
/// Not reentrant: callers serialize access, and the iteration helpers here
/// take the cursor by value so they are its only user until it is closed.
pub trait Rows: Row {
    /// Moves to the next row. `false` once the result is exhausted or broken.
    fn advance(&mut self) -> bool;
    /// Reports a fault the cursor ran into, possibly only after the last row.
    fn err(&mut self) -> Result<(), Error>;
    fn close(&mut self) -> Result<(), Error>;
}

/// Values collected before an iteration failed, plus the failure.
#[derive(Debug)]
pub struct Partial<V> {
    pub values: Vec<V>,
    pub error: Error,
}

impl<V> Partial<V> {
    pub fn into_error(self) -> Error {
        self.error
    }

    pub fn into_parts(self) -> (Vec<V>, Error) {
        (self.values, self.error)
    }
}

impl<V> From<Error> for Partial<V> {
    fn from(error: Error) -> Self {
        Self {
            values: Vec::new(),
            error,
        }
    }
}

impl<V> From<Partial<V>> for Error {
    fn from(partial: Partial<V>) -> Self {
        partial.error
    }
}

impl<V> fmt::Display for Partial<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (after {} collected rows)",
            self.error,
            self.values.len()
        )
    }
}

impl<V: fmt::Debug> StdError for Partial<V> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.error)
    }
}

// Closes the cursor if the caller unwinds before `close` runs.
struct Release<R: Rows> {
    rows: R,
    closed: bool,
}

impl<R: Rows> Release<R> {
    fn new(rows: R) -> Self {
        Self {
            rows,
            closed: false,
        }
    }

    fn close(&mut self) -> Result<(), Error> {
        self.closed = true;
        self.rows.close().map_err(|err| {
            Error::new(ErrorKind::Release)
                .with_message("failed to close rows")
                .with_source(err)
        })
    }
}

impl<R: Rows> Drop for Release<R> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.rows.close() {
            tracing::warn!(error = %err, "failed to close rows while unwinding");
        }
    }
}

/// Calls `f` once per row, then closes the cursor.
///
/// Iteration stops at the first deferred cursor error or callback failure.
/// Callback failures come back as `Scan` errors carrying the row number, with
/// the callback's error as their source. A close failure is joined with
/// whatever the loop returned.
pub fn for_each<R, F>(rows: R, mut f: F) -> Result<(), Error>
where
    R: Rows,
    F: FnMut(&R) -> Result<(), Error>,
{
    let mut release = Release::new(rows);
    let drained = drain(&mut release.rows, &mut f);
    let closed = release.close();
    if let Err(err) = &closed {
        tracing::warn!(error = %err, "rows close failed");
    }

    match Error::join(drained.err().into_iter().chain(closed.err())) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn drain<R, F>(rows: &mut R, f: &mut F) -> Result<(), Error>
where
    R: Rows,
    F: FnMut(&R) -> Result<(), Error>,
{
    let mut row = 0u64;
    while rows.advance() {
        rows.err()?;
        row += 1;
        f(&*rows).map_err(|err| {
            Error::new(ErrorKind::Scan)
                .with_message("failed to scan rows")
                .with_row(row)
                .with_source(err)
        })?;
    }
    rows.err()?;
    tracing::debug!(rows = row, "rows drained");
    Ok(())
}

/// Scans every row into a fresh `V` and collects the values.
pub fn collect_values<R, V, F>(rows: R, mut scan: F) -> Result<Vec<V>, Partial<V>>
where
    R: Rows,
    V: Default,
    F: FnMut(&mut V, &R) -> Result<(), Error>,
{
    let mut values = Vec::new();
    let result = for_each(rows, |row| {
        let mut value = V::default();
        scan(&mut value, row)?;
        values.push(value);
        Ok(())
    });
    match result {
        Ok(()) => Ok(values),
        Err(error) => Err(Partial { values, error }),
    }
}

/// Like [`collect_values`], keeping each row in its own heap allocation so
/// the addresses stay stable as the output grows.
pub fn collect_owned<R, V, F>(rows: R, mut scan: F) -> Result<Vec<Box<V>>, Partial<Box<V>>>
where
    R: Rows,
    V: Default,
    F: FnMut(&mut V, &R) -> Result<(), Error>,
{
    let mut values = Vec::new();
    let result = for_each(rows, |row| {
        let mut value = Box::<V>::default();
        scan(&mut *value, row)?;
        values.push(value);
        Ok(())
    });
    match result {
        Ok(()) => Ok(values),
        Err(error) => Err(Partial { values, error }),
    }
}

/// Collects the single column of a query result.
///
/// Takes the query's own result so a failed query passes straight through,
/// with no values, before any cursor exists.
pub fn pluck<R, V>(query: Result<R, Error>) -> Result<Vec<V>, Partial<V>>
where
    R: Rows,
    V: Scan + Default,
{
    let rows = query?;
    collect_values(rows, |value: &mut V, row: &R| {
        let target: &mut dyn Scan = value;
        row.scan(&mut [target])
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::{Row, Rows, collect_owned, collect_values, for_each, pluck};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::value::{Scan, Value};

    #[derive(Default)]
    struct Calls {
        advanced: Cell<usize>,
        scanned: Cell<usize>,
        closed: Cell<usize>,
    }

    struct StubRows {
        data: Vec<Value>,
        pos: usize,
        // Deferred error reported once `advance` has been called this many times.
        fail_after: Option<usize>,
        close_fails: bool,
        calls: Rc<Calls>,
    }

    impl StubRows {
        fn new(data: Vec<Value>) -> (Self, Rc<Calls>) {
            let calls = Rc::new(Calls::default());
            let rows = Self {
                data,
                pos: 0,
                fail_after: None,
                close_fails: false,
                calls: Rc::clone(&calls),
            };
            (rows, calls)
        }
    }

    impl Row for StubRows {
        fn scan(&self, targets: &mut [&mut dyn Scan]) -> Result<(), Error> {
            self.calls.scanned.set(self.calls.scanned.get() + 1);
            let value = &self.data[self.pos - 1];
            for target in targets.iter_mut() {
                target.scan_value(value)?;
            }
            Ok(())
        }
    }

    impl Rows for StubRows {
        fn advance(&mut self) -> bool {
            self.calls.advanced.set(self.calls.advanced.get() + 1);
            if self.pos >= self.data.len() {
                return false;
            }
            self.pos += 1;
            true
        }

        fn err(&mut self) -> Result<(), Error> {
            match self.fail_after {
                Some(limit) if self.calls.advanced.get() >= limit => {
                    Err(Error::new(ErrorKind::Cursor).with_message("connection reset"))
                }
                _ => Ok(()),
            }
        }

        fn close(&mut self) -> Result<(), Error> {
            self.calls.closed.set(self.calls.closed.get() + 1);
            if self.close_fails {
                return Err(Error::new(ErrorKind::Internal).with_message("close failed"));
            }
            Ok(())
        }
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Integer).collect()
    }

    fn scan_int(value: &mut i64, row: &StubRows) -> Result<(), Error> {
        row.scan(&mut [value as &mut dyn Scan])
    }

    #[test]
    fn collects_every_row_and_closes_once() {
        let (rows, calls) = StubRows::new(ints(&[10, 20, 30]));
        let values = collect_values(rows, scan_int).expect("collect");
        assert_eq!(values, vec![10, 20, 30]);
        assert_eq!(calls.closed.get(), 1);
    }

    #[test]
    fn scan_failure_keeps_earlier_rows_and_closes_once() {
        let mut data = ints(&[1, 2]);
        data.push(Value::Text("three".to_string()));
        let (rows, calls) = StubRows::new(data);

        let partial = collect_values(rows, scan_int).expect_err("scan failure");
        assert_eq!(partial.values, vec![1, 2]);
        assert_eq!(partial.error.kind(), ErrorKind::Scan);
        assert_eq!(partial.error.row(), Some(3));
        assert!(partial.error.find(ErrorKind::Usage).is_some());
        assert_eq!(calls.closed.get(), 1);
    }

    #[test]
    fn deferred_error_stops_before_callback() {
        let (mut rows, calls) = StubRows::new(ints(&[1, 2, 3]));
        rows.fail_after = Some(2);

        let mut seen = Vec::new();
        let err = for_each(rows, |row| {
            let mut value = 0i64;
            scan_int(&mut value, row)?;
            seen.push(value);
            Ok(())
        })
        .expect_err("deferred error");

        assert_eq!(seen, vec![1]);
        assert_eq!(err.kind(), ErrorKind::Cursor);
        assert_eq!(err.message(), Some("connection reset"));
        assert_eq!(calls.closed.get(), 1);
    }

    #[test]
    fn deferred_error_after_last_row_is_reported() {
        let (mut rows, calls) = StubRows::new(ints(&[1, 2]));
        rows.fail_after = Some(3);

        let mut count = 0;
        let err = for_each(rows, |_| {
            count += 1;
            Ok(())
        })
        .expect_err("late deferred error");

        assert_eq!(count, 2);
        assert_eq!(err.kind(), ErrorKind::Cursor);
        assert_eq!(calls.closed.get(), 1);
    }

    #[test]
    fn callback_error_is_wrapped_with_row_context() {
        let (rows, calls) = StubRows::new(ints(&[1, 2]));
        let err = for_each(rows, |_| {
            Err(Error::new(ErrorKind::Usage).with_message("rejected"))
        })
        .expect_err("callback error");

        assert_eq!(err.kind(), ErrorKind::Scan);
        assert_eq!(err.row(), Some(1));
        let inner = err.find(ErrorKind::Usage).expect("original error");
        assert_eq!(inner.message(), Some("rejected"));
        assert_eq!(calls.advanced.get(), 1);
        assert_eq!(calls.closed.get(), 1);
    }

    #[test]
    fn close_failure_after_success_is_not_swallowed() {
        let (mut rows, calls) = StubRows::new(ints(&[1]));
        rows.close_fails = true;

        let partial = collect_values(rows, scan_int).expect_err("close failure");
        assert_eq!(partial.values, vec![1]);
        assert_eq!(partial.error.kind(), ErrorKind::Release);
        assert_eq!(calls.closed.get(), 1);
    }

    #[test]
    fn close_failure_is_joined_with_loop_error() {
        let (mut rows, calls) = StubRows::new(ints(&[1, 2]));
        rows.fail_after = Some(1);
        rows.close_fails = true;

        let err = for_each(rows, |_| Ok(())).expect_err("both errors");
        assert_eq!(err.kind(), ErrorKind::Multiple);
        assert_eq!(err.errors().len(), 2);
        assert_eq!(err.errors()[0].kind(), ErrorKind::Cursor);
        assert_eq!(err.errors()[1].kind(), ErrorKind::Release);
        assert_eq!(calls.closed.get(), 1);
    }

    #[test]
    fn empty_result_closes_once() {
        let (rows, calls) = StubRows::new(Vec::new());
        let values = collect_values(rows, scan_int).expect("collect");
        assert!(values.is_empty());
        assert_eq!(calls.scanned.get(), 0);
        assert_eq!(calls.closed.get(), 1);
    }

    #[test]
    fn owned_collection_boxes_each_row() {
        let (rows, calls) = StubRows::new(ints(&[4, 5]));
        let values = collect_owned(rows, scan_int).expect("collect");
        assert_eq!(values, vec![Box::new(4), Box::new(5)]);
        assert_eq!(calls.closed.get(), 1);
    }

    #[test]
    fn owned_scan_failure_keeps_earlier_boxes_and_closes_once() {
        let mut data = ints(&[4, 5]);
        data.push(Value::Null);
        let (rows, calls) = StubRows::new(data);

        let partial = collect_owned(rows, scan_int).expect_err("scan failure");
        assert_eq!(partial.values, vec![Box::new(4), Box::new(5)]);
        assert_eq!(partial.error.kind(), ErrorKind::Scan);
        assert_eq!(partial.error.row(), Some(3));
        assert!(partial.error.find(ErrorKind::Usage).is_some());
        assert_eq!(calls.closed.get(), 1);
    }

    #[test]
    fn pluck_scans_single_column() {
        let (rows, calls) = StubRows::new(vec![
            Value::Text("a".to_string()),
            Value::Text("b".to_string()),
        ]);
        let values: Vec<String> = pluck(Ok(rows)).expect("pluck");
        assert_eq!(values, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(calls.closed.get(), 1);
    }

    #[test]
    fn pluck_passes_upstream_error_through() {
        let (rows, calls) = StubRows::new(ints(&[1]));
        let query: Result<StubRows, Error> =
            Err(Error::new(ErrorKind::Query).with_message("no such table"));

        let partial = pluck::<_, i64>(query).expect_err("upstream error");
        assert!(partial.values.is_empty());
        assert_eq!(partial.error.kind(), ErrorKind::Query);
        assert_eq!(partial.error.message(), Some("no such table"));

        drop(rows);
        assert_eq!(calls.advanced.get(), 0);
        assert_eq!(calls.scanned.get(), 0);
        assert_eq!(calls.closed.get(), 0);
    }

    #[test]
    fn panicking_callback_still_closes() {
        let (rows, calls) = StubRows::new(ints(&[1]));
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = for_each(rows, |_| panic!("boom"));
        }));
        assert!(outcome.is_err());
        assert_eq!(calls.closed.get(), 1);
    }
}
