// Workflow Engine - atomic stage transitions over the request store
//
// Every mutation is read -> decide -> compare-and-swap. When another writer
// commits first the engine reloads and re-runs the policy against the fresh
// record, so the loser of a race sees the new stage rather than clobbering it.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

use super::errors::WorkflowError;
use super::policy;
use super::pricing::PricingPolicy;
use crate::observability::{create_workflow_span, workflow_metrics, OperationTimer};
use crate::requests::{
    Action, Actor, CartService, FabricationRequest, IdentityService, NewRequest, RequestId,
    RequestStore, Role, Stage, StoreError,
};
use crate::telemetry::generate_correlation_id;

pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

enum Commit {
    Unchanged(FabricationRequest),
    Applied {
        previous: FabricationRequest,
        updated: FabricationRequest,
    },
}

/// Orchestrates request lifecycle transitions
pub struct WorkflowEngine {
    store: Arc<dyn RequestStore>,
    cart: Arc<dyn CartService>,
    identity: Arc<dyn IdentityService>,
    pricing: PricingPolicy,
    max_conflict_retries: u32,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn RequestStore>,
        cart: Arc<dyn CartService>,
        identity: Arc<dyn IdentityService>,
    ) -> Self {
        Self {
            store,
            cart,
            identity,
            pricing: PricingPolicy::default(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    pub fn with_pricing(mut self, pricing: PricingPolicy) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    /// Look up the acting user through the identity collaborator
    pub async fn resolve_actor(&self, user_id: &str) -> Result<Actor, WorkflowError> {
        Ok(self.identity.resolve(user_id).await?)
    }

    /// Record a customer submission as a new UNFULFILLED request
    pub async fn submit(
        &self,
        submission: NewRequest,
        actor: &Actor,
    ) -> Result<FabricationRequest, WorkflowError> {
        if actor.role == Role::Customer
            && !submission
                .customer_email
                .trim()
                .eq_ignore_ascii_case(actor.id.trim())
        {
            return Err(WorkflowError::unauthorized(
                actor.role,
                "submit a request for another customer",
            ));
        }
        submission.validate().map_err(WorkflowError::Validation)?;

        let request = FabricationRequest::from_submission(submission, Utc::now());
        self.store.insert(request.clone()).await?;

        info!(
            request.id = %request.id,
            project_type = %request.project_type(),
            customer = %request.customer_email,
            actor = %actor.id,
            "Fabrication request submitted"
        );
        Ok(request)
    }

    pub async fn get(&self, id: RequestId) -> Result<FabricationRequest, WorkflowError> {
        self.store.get(id).await?.ok_or(WorkflowError::NotFound(id))
    }

    /// Requests currently in `stage`, oldest submission first
    pub async fn list_by_stage(&self, stage: Stage) -> Result<Vec<FabricationRequest>, WorkflowError> {
        let mut requests = self.store.list_by_stage(stage).await?;
        requests.retain(|r| r.status == stage);
        requests.sort_by(|a, b| {
            a.requested_at
                .cmp(&b.requested_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(requests)
    }

    /// Number of requests per stage, in tab order
    pub async fn stage_summary(&self) -> Result<Vec<(Stage, usize)>, WorkflowError> {
        let mut summary = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            summary.push((stage, self.store.list_by_stage(stage).await?.len()));
        }
        Ok(summary)
    }

    /// Resolve `user_id` and apply `action` on their behalf
    pub async fn act_as(
        &self,
        user_id: &str,
        id: RequestId,
        action: Action,
    ) -> Result<FabricationRequest, WorkflowError> {
        let actor = self.resolve_actor(user_id).await?;
        self.apply_action(id, action, &actor).await
    }

    /// Validate `action` against the stage policy and commit it atomically
    pub async fn apply_action(
        &self,
        id: RequestId,
        action: Action,
        actor: &Actor,
    ) -> Result<FabricationRequest, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span("apply_action", &correlation_id);
        let timer = OperationTimer::new("workflow.apply_action");

        let result = self
            .apply_action_inner(id, &action, actor)
            .instrument(span)
            .await;
        timer.finish();

        let metrics = workflow_metrics();
        match &result {
            Ok(_) => metrics.record_applied(),
            Err(e) => {
                metrics.record_rejected(e);
                info!(
                    request.id = %id,
                    action = %action.kind(),
                    actor = %actor.id,
                    error.kind = e.kind(),
                    "Workflow action rejected: {}",
                    e
                );
            }
        }
        result
    }

    async fn apply_action_inner(
        &self,
        id: RequestId,
        action: &Action,
        actor: &Actor,
    ) -> Result<FabricationRequest, WorkflowError> {
        let commit = self
            .commit_with_retry(id, |current| {
                let decision = policy::check(current, action, actor)?;
                if decision.is_noop() {
                    return Ok(None);
                }
                Ok(Some(decision.apply_to(current, Utc::now())))
            })
            .await?;

        match commit {
            Commit::Unchanged(current) => {
                debug!(
                    request.id = %id,
                    action = %action.kind(),
                    stage = %current.status,
                    "Action left request unchanged"
                );
                Ok(current)
            }
            Commit::Applied { previous, updated } => {
                info!(
                    request.id = %id,
                    action = %action.kind(),
                    actor = %actor.id,
                    from = %previous.status,
                    to = %updated.status,
                    assigned_to = ?updated.assigned_to,
                    "Request transitioned"
                );
                if previous.status == Stage::ReadyForPickup && updated.status == Stage::Finished {
                    self.hand_off_to_cart(&previous, &updated).await?;
                }
                Ok(updated)
            }
        }
    }

    /// Replace staff notes; allowed in every stage, never changes status
    pub async fn amend_notes(
        &self,
        id: RequestId,
        notes: Option<String>,
        actor: &Actor,
    ) -> Result<FabricationRequest, WorkflowError> {
        if !actor.is_staff() {
            return Err(WorkflowError::unauthorized(actor.role, "edit technician notes"));
        }
        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let commit = self
            .commit_with_retry(id, |current| {
                if current.technician_notes == notes {
                    return Ok(None);
                }
                let mut updated = current.clone();
                updated.technician_notes = notes.clone();
                updated.updated_at = Utc::now().max(current.requested_at);
                updated.version = current.version + 1;
                Ok(Some(updated))
            })
            .await?;

        Ok(match commit {
            Commit::Unchanged(current) => current,
            Commit::Applied { updated, .. } => {
                info!(request.id = %id, actor = %actor.id, "Technician notes updated");
                updated
            }
        })
    }

    /// Read, plan and compare-and-swap, reloading on version conflicts
    async fn commit_with_retry<F>(&self, id: RequestId, mut plan: F) -> Result<Commit, WorkflowError>
    where
        F: FnMut(&FabricationRequest) -> Result<Option<FabricationRequest>, WorkflowError>,
    {
        let mut attempt: u32 = 0;
        loop {
            let current = self.get(id).await?;
            let Some(updated) = plan(&current)? else {
                return Ok(Commit::Unchanged(current));
            };

            match self
                .store
                .compare_and_swap(current.version, updated.clone())
                .await
            {
                Ok(()) => {
                    return Ok(Commit::Applied {
                        previous: current,
                        updated,
                    })
                }
                Err(StoreError::VersionConflict { expected, found, .. }) => {
                    workflow_metrics().record_conflict();
                    attempt += 1;
                    if attempt > self.max_conflict_retries {
                        return Err(WorkflowError::Conflict {
                            id,
                            attempts: attempt,
                        });
                    }
                    warn!(
                        request.id = %id,
                        expected,
                        found,
                        attempt,
                        "Concurrent update detected, reloading request"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Emit the line item; undo the FINISHED commit if the cart refuses it
    async fn hand_off_to_cart(
        &self,
        previous: &FabricationRequest,
        updated: &FabricationRequest,
    ) -> Result<(), WorkflowError> {
        let item = self.pricing.line_item(updated, updated.updated_at);
        let total_cents = item.total_cents;

        match self.cart.add_line_item(item).await {
            Ok(()) => {
                workflow_metrics().record_cart_handoff();
                info!(request.id = %updated.id, total_cents, "Line item handed to cart");
                Ok(())
            }
            Err(cart_error) => {
                workflow_metrics().record_cart_failure();

                // Notes may have been amended since the FINISHED commit; keep them
                let restore = self
                    .commit_with_retry(updated.id, |current| {
                        if current.status != Stage::Finished {
                            return Ok(None);
                        }
                        let mut restored = current.clone();
                        restored.status = previous.status;
                        restored.assigned_to = previous.assigned_to.clone();
                        restored.cancellation_reason = previous.cancellation_reason.clone();
                        restored.updated_at = previous.updated_at;
                        restored.version = current.version + 1;
                        Ok(Some(restored))
                    })
                    .await;

                match restore {
                    Ok(_) => warn!(
                        request.id = %updated.id,
                        error = %cart_error,
                        "Cart rejected line item, request restored to READY_FOR_PICKUP"
                    ),
                    Err(restore_error) => error!(
                        request.id = %updated.id,
                        error = %cart_error,
                        restore_error = %restore_error,
                        "Cart rejected line item and the request could not be restored"
                    ),
                }
                Err(WorkflowError::Cart(cart_error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::traits::{MockCartService, MockRequestStore};
    use crate::requests::{
        CartError, CartLineItem, InMemoryCart, InMemoryRequestStore, ProjectDetails,
        StaticDirectory,
    };
    use mockall::predicate::*;

    fn submission(email: &str) -> NewRequest {
        NewRequest {
            customer_name: "Ada Student".to_string(),
            customer_email: email.to_string(),
            comments: Some("matte finish".to_string()),
            project_file_name: "hinge.stl".to_string(),
            details: ProjectDetails::Print3d {
                quantity: 2,
                filament_color: "blue".to_string(),
            },
        }
    }

    fn engine_with(
        store: Arc<dyn RequestStore>,
        cart: Arc<dyn CartService>,
    ) -> WorkflowEngine {
        WorkflowEngine::new(store, cart, Arc::new(StaticDirectory::new(["lara", "sam"])))
    }

    fn in_memory() -> (WorkflowEngine, Arc<InMemoryRequestStore>, Arc<InMemoryCart>) {
        let store = Arc::new(InMemoryRequestStore::new());
        let cart = Arc::new(InMemoryCart::new());
        (engine_with(store.clone(), cart.clone()), store, cart)
    }

    async fn ready_for_pickup(engine: &WorkflowEngine) -> FabricationRequest {
        let staff = Actor::staff("lara");
        let request = engine
            .submit(submission("ada@uni.edu"), &Actor::customer("ada@uni.edu"))
            .await
            .unwrap();
        for action in [
            Action::Assign { technician: "lara".to_string() },
            Action::Start,
            Action::MarkReady,
        ] {
            engine.apply_action(request.id, action, &staff).await.unwrap();
        }
        engine.get(request.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_submit_validates_and_scopes_customers() {
        let (engine, store, _) = in_memory();

        let err = engine
            .submit(submission("ada@uni.edu"), &Actor::customer("eve@uni.edu"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthorized { .. }));

        let mut bad = submission("ada@uni.edu");
        bad.project_file_name = " ".to_string();
        let err = engine.submit(bad, &Actor::staff("lara")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        assert!(store.is_empty().await);

        let created = engine
            .submit(submission("ada@uni.edu"), &Actor::staff("lara"))
            .await
            .unwrap();
        assert_eq!(created.status, Stage::Unfulfilled);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_add_to_cart_emits_line_item() {
        let (engine, _, cart) = in_memory();
        let request = ready_for_pickup(&engine).await;

        let finished = engine
            .apply_action(request.id, Action::AddToCart, &Actor::customer("ada@uni.edu"))
            .await
            .unwrap();

        assert_eq!(finished.status, Stage::Finished);
        let items = cart.items().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].request_id, request.id);
        assert_eq!(items[0].total_cents, 1000);
    }

    #[tokio::test]
    async fn test_cart_failure_restores_request() {
        let store = Arc::new(InMemoryRequestStore::new());
        let mut cart = MockCartService::new();
        cart.expect_add_line_item()
            .times(1)
            .returning(|_| Err(CartError::Unavailable("checkout offline".to_string())));
        let engine = engine_with(store.clone(), Arc::new(cart));

        let request = ready_for_pickup(&engine).await;
        let err = engine
            .apply_action(request.id, Action::AddToCart, &Actor::staff("lara"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Cart(_)));

        let stored = engine.get(request.id).await.unwrap();
        assert_eq!(stored.status, Stage::ReadyForPickup);
        assert_eq!(stored.updated_at, request.updated_at);
        assert_eq!(stored.assigned_to, request.assigned_to);
        assert!(stored.version > request.version);
    }

    /// Cart that lets a staff notes edit land before it refuses the item
    struct NotesRacingCart {
        store: Arc<InMemoryRequestStore>,
    }

    #[async_trait::async_trait]
    impl CartService for NotesRacingCart {
        async fn add_line_item(&self, item: CartLineItem) -> Result<(), CartError> {
            let mut current = self.store.get(item.request_id).await.unwrap().unwrap();
            let expected = current.version;
            current.technician_notes = Some("customer called".to_string());
            current.version += 1;
            self.store.compare_and_swap(expected, current).await.unwrap();
            Err(CartError::Unavailable("checkout offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_cart_failure_restores_request_after_concurrent_notes_edit() {
        let store = Arc::new(InMemoryRequestStore::new());
        let cart = Arc::new(NotesRacingCart { store: store.clone() });
        let engine = engine_with(store.clone(), cart);

        let request = ready_for_pickup(&engine).await;
        let err = engine
            .apply_action(request.id, Action::AddToCart, &Actor::customer("ada@uni.edu"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Cart(_)));

        let stored = engine.get(request.id).await.unwrap();
        assert_eq!(stored.status, Stage::ReadyForPickup);
        assert_eq!(stored.updated_at, request.updated_at);
        assert_eq!(stored.assigned_to, request.assigned_to);
        assert_eq!(stored.technician_notes.as_deref(), Some("customer called"));
        assert_eq!(stored.version, request.version + 3);
        stored.check_invariants().unwrap();

        // The request can still be finished once the cart recovers
        let engine = engine_with(store, Arc::new(InMemoryCart::new()));
        let finished = engine
            .apply_action(request.id, Action::AddToCart, &Actor::customer("ada@uni.edu"))
            .await
            .unwrap();
        assert_eq!(finished.status, Stage::Finished);
    }

    #[tokio::test]
    async fn test_persistent_conflicts_give_up() {
        let template = FabricationRequest::from_submission(submission("ada@uni.edu"), Utc::now());
        let id = template.id;

        let mut store = MockRequestStore::new();
        store
            .expect_get()
            .with(eq(id))
            .returning(move |_| Ok(Some(template.clone())));
        store
            .expect_compare_and_swap()
            .times(3)
            .returning(move |expected, _| {
                Err(StoreError::VersionConflict {
                    id,
                    expected,
                    found: expected + 1,
                })
            });
        let mut cart = MockCartService::new();
        cart.expect_add_line_item().never();

        let engine = engine_with(Arc::new(store), Arc::new(cart)).with_max_conflict_retries(2);
        let err = engine
            .apply_action(id, Action::Assign { technician: "lara".to_string() }, &Actor::staff("lara"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_store_not_found_maps_to_workflow_not_found() {
        let (engine, _, _) = in_memory();
        let missing = RequestId::new();
        let err = engine
            .apply_action(missing, Action::Start, &Actor::staff("lara"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_amend_notes_on_terminal_request() {
        let (engine, _, _) = in_memory();
        let request = engine
            .submit(submission("ada@uni.edu"), &Actor::customer("ada@uni.edu"))
            .await
            .unwrap();
        let staff = Actor::staff("sam");
        engine
            .apply_action(request.id, Action::Cancel { reason: Some("duplicate".to_string()) }, &staff)
            .await
            .unwrap();

        let noted = engine
            .amend_notes(request.id, Some("refund issued".to_string()), &staff)
            .await
            .unwrap();
        assert_eq!(noted.status, Stage::Canceled);
        assert_eq!(noted.technician_notes.as_deref(), Some("refund issued"));
        assert_eq!(noted.comments.as_deref(), Some("matte finish"));

        let err = engine
            .amend_notes(request.id, None, &Actor::customer("ada@uni.edu"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_act_as_resolves_roles() {
        let (engine, _, _) = in_memory();
        let request = engine
            .submit(submission("ada@uni.edu"), &Actor::customer("ada@uni.edu"))
            .await
            .unwrap();

        let err = engine
            .act_as("ada@uni.edu", request.id, Action::Assign { technician: "lara".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthorized { .. }));

        let err = engine
            .act_as("mallory", request.id, Action::Start)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Identity(_)));

        let assigned = engine
            .act_as("lara", request.id, Action::Assign { technician: "lara".to_string() })
            .await
            .unwrap();
        assert_eq!(assigned.status, Stage::Assigned);
    }

    #[tokio::test]
    async fn test_stage_summary_counts_every_stage() {
        let (engine, _, _) = in_memory();
        let staff = Actor::staff("lara");
        let first = engine.submit(submission("ada@uni.edu"), &staff).await.unwrap();
        engine.submit(submission("bob@uni.edu"), &staff).await.unwrap();
        engine
            .apply_action(first.id, Action::Assign { technician: "lara".to_string() }, &staff)
            .await
            .unwrap();

        let summary = engine.stage_summary().await.unwrap();
        assert_eq!(summary.len(), 6);
        assert_eq!(summary[0], (Stage::Unfulfilled, 1));
        assert_eq!(summary[1], (Stage::Assigned, 1));
        assert!(summary[2..].iter().all(|(_, count)| *count == 0));
    }
}
