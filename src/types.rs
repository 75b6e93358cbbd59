/// Shared types used across the codebase
use serde::{Deserialize, Serialize};

/// Billing account category, shared by user profiles and projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Individual,
    Organization,
}

impl Default for AccountType {
    fn default() -> Self {
        AccountType::Individual
    }
}
