pub mod command;
pub mod transcriber;
pub mod transform;
