//! Bulk OID collections with lazy-sort-on-read semantics, matching the
//! fanout-accelerated lookup structures used by the loose object store and
//! pack index.

mod oid_array;
mod oid_map;
mod oid_set;

pub use oid_array::OidArray;
pub use oid_map::OidMap;
pub use oid_set::OidSet;
