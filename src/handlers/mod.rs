pub mod aimodels;
pub mod projects;
pub mod users;
