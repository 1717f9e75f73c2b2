//! Hybrid hash/sort GROUP BY evaluation core: bounded-memory hash
//! aggregation with LRU spill, spill reconciliation, the group-boundary
//! driver and ROLLUP finalization.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod error;
pub mod exec;
pub mod obs;
pub mod serialize;
pub mod value;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, serializers, or observability helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        config::GroupByConfig,
        exec::{
            AggregateKind, AggregateSpec, GroupByExecutor, GroupBySpec, GroupLimit, KeyOrder,
            Logical, OutputRow, Row, VecRowSource,
        },
        row,
        value::Value,
    };
}
