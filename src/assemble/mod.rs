pub mod assembler;
pub mod dataset;
pub mod error;
