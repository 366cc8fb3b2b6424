// Fabrication Requests - data model and collaborator boundaries
//
// The workflow engine only talks to the traits in `traits`; the in-memory,
// file and database implementations are interchangeable behind them.

pub mod types;
pub mod errors;
pub mod traits;
pub mod memory;
pub mod file_store;
pub mod identity;

pub use errors::{CartError, IdentityError, StoreError};
pub use file_store::{FileCart, JsonFileRequestStore};
pub use identity::StaticDirectory;
pub use memory::{InMemoryCart, InMemoryRequestStore};
pub use traits::{CartService, IdentityService, RequestStore};
pub use types::{
    Action, ActionKind, Actor, CartLineItem, FabricationRequest, NewRequest, PcbSiding,
    ProjectDetails, ProjectType, RequestId, Role, Stage,
};
