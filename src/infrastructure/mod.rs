// JSON artifacts and the files built on them
pub mod artifact_store;
pub mod memory_store;
pub mod parameter_registry;

// HTTP plumbing and remote commands
pub mod core;
pub mod remote_command;

// Price sources
pub mod market_data;

// SQLite knowledge base
pub mod persistence;
