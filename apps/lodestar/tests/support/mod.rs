#![allow(dead_code)]

pub mod builders;
pub mod fixtures;

// Re-export commonly used items
pub use builders::*;
pub use fixtures::*;
