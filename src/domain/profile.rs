use serde::{Deserialize, Serialize};

/// Handle the network reports when an account's handle fails verification.
pub const INVALID_HANDLE: &str = "handle.invalid";

/// Author profile after normalization, ready for formatting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub did: String,
    pub display_name: String,
    pub handle: String,
    pub avatar_url: String,
    pub is_muted: bool,
}

impl Profile {
    /// `"{display name} (@{handle})"`
    pub fn author_line(&self) -> String {
        format!("{} (@{})", self.display_name, self.handle)
    }
}
