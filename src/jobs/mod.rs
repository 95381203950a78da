pub mod delivery_processor;
pub mod retention_cleanup;
