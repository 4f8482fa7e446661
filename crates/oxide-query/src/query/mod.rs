//! Query building types.
//!
//! [`Q`] filters and aggregate functions.

mod aggregates;
mod filter;

pub use aggregates::{avg, count_all, sum, Aggregate};
pub use filter::{CompareOp, Q};
