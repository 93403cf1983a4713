//! Service layer: folder/file semantics over the flat object store.

pub mod gateway_service;
