//! Small collection helpers shared across the engine: a priority queue (used
//! by the commit-timestamp-ordered ancestry walk), a sorted string list, and
//! a `HashMap` convenience extension.

mod hashmap;
mod prio_queue;
mod string_list;

pub use hashmap::GitHashMapExt;
pub use prio_queue::PriorityQueue;
pub use string_list::{StringList, StringListItem};
