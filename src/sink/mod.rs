pub mod error;
pub mod result_sink;
pub mod signing;
pub mod store;
