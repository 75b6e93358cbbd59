use std::sync::Arc;

use crate::aimodels::AiModelService;
use crate::auth::CredentialVerifier;
use crate::projects::service::ProjectService;
use crate::store::DocumentStore;
use crate::users::service::UserService;

/// Explicitly constructed, dependency-injected handles shared by all
/// handlers. Built once in the binary (or by tests over in-memory fakes).
#[derive(Clone)]
pub struct AppState {
    pub projects: Arc<ProjectService>,
    pub users: Arc<UserService>,
    pub aimodels: Arc<AiModelService>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub documents: Arc<dyn DocumentStore>,
}
