pub mod error;
pub mod registry;
pub mod reporter;
pub mod state;
pub mod worker;
