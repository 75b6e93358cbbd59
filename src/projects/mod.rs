pub mod executor;
pub mod import;
pub mod model;
pub mod service;

pub use executor::{HttpTestExecutor, TestExecutor, TestOutcome};
pub use import::{HttpSchemaFetcher, SchemaFetcher};
pub use model::*;
pub use service::{ImportSource, ProjectError, ProjectService};
