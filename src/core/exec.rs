// Executor boundary: where flattened fragments meet a driver.
use crate::core::error::Error;
use crate::core::expr::Expr;
use crate::core::rows::Rows;
use crate::core::value::Value;

/// Outcome of a statement that returns no rows.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ExecSummary {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// A driver or connection able to run statements with positional arguments.
///
/// Failures from either call are upstream errors; implementations should
/// report them as [`ErrorKind::Query`](crate::ErrorKind::Query).
pub trait Executor {
    type Rows: Rows;

    fn execute(&self, statement: &str, args: &[Value]) -> Result<ExecSummary, Error>;
    fn query(&self, statement: &str, args: &[Value]) -> Result<Self::Rows, Error>;
}

impl Expr {
    pub fn exec<E: Executor>(&self, db: &E) -> Result<ExecSummary, Error> {
        tracing::debug!(statement = %self.text(), args = self.args().len(), "exec");
        db.execute(self.text(), self.args())
    }

    pub fn query<E: Executor>(&self, db: &E) -> Result<E::Rows, Error> {
        tracing::debug!(statement = %self.text(), args = self.args().len(), "query");
        db.query(self.text(), self.args())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::{ExecSummary, Executor};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::expr::Expr;
    use crate::core::rows::{Row, Rows};
    use crate::core::value::{Scan, Value};

    struct NoRows;

    impl Row for NoRows {
        fn scan(&self, _targets: &mut [&mut dyn Scan]) -> Result<(), Error> {
            Err(Error::new(ErrorKind::Usage).with_message("no current row"))
        }
    }

    impl Rows for NoRows {
        fn advance(&mut self) -> bool {
            false
        }

        fn err(&mut self) -> Result<(), Error> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), Error> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<(String, Vec<Value>)>>,
    }

    impl Executor for Recorder {
        type Rows = NoRows;

        fn execute(&self, statement: &str, args: &[Value]) -> Result<ExecSummary, Error> {
            self.calls
                .borrow_mut()
                .push((statement.to_string(), args.to_vec()));
            Ok(ExecSummary {
                rows_affected: args.len() as u64,
                last_insert_id: None,
            })
        }

        fn query(&self, statement: &str, args: &[Value]) -> Result<NoRows, Error> {
            self.calls
                .borrow_mut()
                .push((statement.to_string(), args.to_vec()));
            Ok(NoRows)
        }
    }

    #[test]
    fn exec_forwards_text_and_args_verbatim() {
        let db = Recorder::default();
        let expr = crate::sql!(
            "DELETE FROM t WHERE id IN (?)",
            Expr::in_list(["a", "b"])
        );

        let summary = expr.exec(&db).expect("exec");
        assert_eq!(summary.rows_affected, 2);

        let calls = db.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "DELETE FROM t WHERE id IN (?, ?)");
        assert_eq!(calls[0].1, vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn query_returns_the_executor_cursor() {
        let db = Recorder::default();
        let mut rows = crate::sql!("SELECT 1").query(&db).expect("query");
        assert!(!rows.advance());
        assert_eq!(db.calls.borrow()[0].1, Vec::<Value>::new());
    }
}
