pub mod processor;
pub mod reaper;
