pub mod error;
pub mod frequency;
pub mod month;
pub mod partition;
pub mod selector;
