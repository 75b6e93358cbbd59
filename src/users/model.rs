use serde::{Deserialize, Serialize};

use crate::types::AccountType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    Free,
    Basic,
    Pro,
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    Expired,
    Trial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub trial_started_at: Option<i64>,
    #[serde(default)]
    pub trial_ends_at: Option<i64>,
    #[serde(default)]
    pub subscription_started_at: Option<i64>,
    #[serde(default)]
    pub subscription_ends_at: Option<i64>,
    #[serde(default)]
    pub auto_renew: bool,
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            plan: SubscriptionPlan::Free,
            status: SubscriptionStatus::Trial,
            trial_started_at: None,
            trial_ends_at: None,
            subscription_started_at: None,
            subscription_ends_at: None,
            auto_renew: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub account_type: AccountType,
    #[serde(default)]
    pub organization_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub photo_url: Option<String>,
    pub email: Option<String>,
    pub subscription: Option<Subscription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Subject id from the credential verifier, doubling as document id.
    pub uuid: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    pub account_type: AccountType,
    #[serde(default)]
    pub organization_name: Option<String>,
    /// Searchable full name, lowercase.
    pub search_name: String,
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub subscription: Subscription,
}
