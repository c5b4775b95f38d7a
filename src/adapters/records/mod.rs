//! Service record adapters.

mod memory_source;

pub use memory_source::InMemoryRecordSource;
