//! Request/response shapes for folder operations.
//!
//! Folders are not entities anywhere in the system — these are only the
//! bodies of the create call. Folder *existence* is an emergent property of
//! the key listing.

use serde::{Deserialize, Serialize};

/// Body of `POST /folders/create/`.
///
/// The name is optional at the serde level so an absent field reaches the
/// validation path (and its 400) instead of a deserialization rejection.
#[derive(Deserialize, Debug)]
pub struct CreateFolderRequest {
    pub folder_name: Option<String>,
}

/// Response for a created folder.
#[derive(Serialize, Deserialize, Debug)]
pub struct CreateFolderResponse {
    pub folder: String,
}
