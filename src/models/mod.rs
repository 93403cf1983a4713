//! Wire-level data models for the gateway.
//!
//! Everything here is a derived view or a request/response body — nothing is
//! ever persisted. File records are recomputed from the backend listing on
//! every call, and folders exist only as distinct key prefixes.

pub mod file;
pub mod folder;
pub mod preview;
