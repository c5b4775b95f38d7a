//! Reference data adapters.

mod markdown_loader;

pub use markdown_loader::{load_reference_library, parse_numbered_sections};
