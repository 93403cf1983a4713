//! HTTP handler modules, one file per route family.

pub mod file_handlers;
pub mod folder_handlers;
pub mod health_handlers;
