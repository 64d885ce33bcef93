//! The core of the Quasar graph database: the query planner, the
//! partitioned storage engine with its schema-aware codecs, and the
//! cluster-wide snapshot coordinator.

#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

pub mod cache;
pub mod cnf;
pub mod err;
pub mod exe;
pub mod exp;
pub mod fnc;
pub mod ids;
pub mod key;
pub mod kvs;
pub mod meta;
pub mod plan;
pub mod row;
pub mod rpc;
pub mod store;
pub mod val;
