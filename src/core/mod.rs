// Core modules implementing fragment flattening, row iteration, and error modeling.
pub mod annotate;
pub mod error;
pub mod exec;
pub mod expr;
pub mod rows;
pub mod value;
