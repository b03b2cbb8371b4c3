pub mod directory;
pub mod error;
pub mod station;
