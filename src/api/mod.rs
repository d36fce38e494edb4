//! Purpose: Define the stable public Rust API boundary for sqlh.
//! Exports: Fragment, cursor, executor, and error types plus the iteration helpers.
//! Role: Public, additive-only surface re-exported from the crate root.
//! Invariants: Callers reach core functionality through this module only.
//! Invariants: Macros (`sql!`, `debug_sql!`) resolve through these re-exports.

pub use crate::core::annotate::{SOURCE_ROOT_ENV, SourceRoot};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::exec::{ExecSummary, Executor};
pub use crate::core::expr::{Arg, Expr, MARKER};
pub use crate::core::rows::{Partial, Row, Rows, collect_owned, collect_values, for_each, pluck};
pub use crate::core::value::{Scan, Value};
