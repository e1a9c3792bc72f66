pub mod config_store;
pub mod dependencies;
pub mod packager;
