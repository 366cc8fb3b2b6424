// Request workflow: stage policy, pricing and the engine that applies them

pub mod errors;
pub mod policy;
pub mod pricing;
pub mod engine;

pub use engine::WorkflowEngine;
pub use errors::WorkflowError;
pub use policy::{Decision, SideEffect};
pub use pricing::PricingPolicy;
