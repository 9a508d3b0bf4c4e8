pub mod chain;
pub mod registry;
pub mod stages;
