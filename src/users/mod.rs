pub mod model;
pub mod service;

pub use model::{Subscription, SubscriptionPlan, SubscriptionStatus, User, UserCreate, UserUpdate};
pub use service::{UserError, UserService};
