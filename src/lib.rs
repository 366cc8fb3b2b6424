// Shop Workflow Library - fabrication request lifecycle
// Exposes the workflow engine and its collaborators for the CLI and tests

pub mod cli;
pub mod config;
pub mod database;
pub mod observability;
pub mod requests;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use config::{config, ShopConfig};
pub use observability::{create_workflow_span, workflow_metrics, OperationTimer, WorkflowStats};
pub use requests::{
    Action, ActionKind, Actor, CartLineItem, CartService, FabricationRequest, IdentityService,
    NewRequest, ProjectDetails, RequestId, RequestStore, Role, Stage,
};
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflows::{PricingPolicy, WorkflowEngine, WorkflowError};

#[cfg(feature = "database")]
pub use database::SqliteRequestStore;
