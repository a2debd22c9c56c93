pub mod bootstrap;
pub mod commands;
pub mod completion;
pub mod engine;
