use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Account label. Stored as its lowercase name in `users.role`.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    Admin,
    Employee,
}

impl Role {
    pub fn from_label(label: &str) -> Option<Self> {
        label.trim().parse().ok()
    }

    pub fn is_admin(&self) -> bool {
        *self == Role::Admin
    }
}
