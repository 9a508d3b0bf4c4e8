pub mod buffer;
pub mod engine;
