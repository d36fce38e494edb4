//! Purpose: Compose parameterized SQL from nested fragments and drain query cursors safely.
//! Exports: `api` (re-exported at the root) and the `sql!` / `debug_sql!` macros.
//! Role: Thin layer between application code and any driver implementing `Executor`.
//! Invariants: Fragments are flattened eagerly; executors only ever see plain values.
//! Invariants: Cursors handed to the iteration helpers are closed exactly once.
pub mod api;
mod core;

pub use api::*;
