use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ShopConfig;
use crate::requests::{
    Actor, CartService, FabricationRequest, FileCart, IdentityError, JsonFileRequestStore,
    ProjectDetails, RequestStore, StaticDirectory,
};
use crate::workflows::{policy, WorkflowEngine};

pub mod list;
pub mod submit;
pub mod transition;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self, ctx: &AppContext) -> Result<()>;
}

/// Wired-up engine plus the user the command runs as
pub struct AppContext {
    pub engine: WorkflowEngine,
    pub user: Option<String>,
    pub state_dir: PathBuf,
}

impl AppContext {
    pub async fn build(
        config: &ShopConfig,
        state_dir: Option<PathBuf>,
        user: Option<String>,
    ) -> Result<Self> {
        let state_dir = state_dir.unwrap_or_else(|| config.storage.state_dir.clone());
        let store = open_store(config, &state_dir).await?;
        let cart: Arc<dyn CartService> = Arc::new(FileCart::in_dir(&state_dir));
        let identity = Arc::new(StaticDirectory::new(&config.identity.staff));

        let engine = WorkflowEngine::new(store, cart, identity)
            .with_pricing(config.pricing.clone())
            .with_max_conflict_retries(config.workflow.max_conflict_retries);

        Ok(Self {
            engine,
            user,
            state_dir,
        })
    }

    /// Resolve the `--as` user into an actor
    pub async fn actor(&self) -> Result<Actor> {
        let user = self
            .user
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(IdentityError::Anonymous)?;
        Ok(self.engine.resolve_actor(user).await?)
    }
}

#[cfg(feature = "database")]
async fn open_store(config: &ShopConfig, state_dir: &std::path::Path) -> Result<Arc<dyn RequestStore>> {
    if let Some(db_config) = &config.database {
        tracing::info!("Using SQLite request store at {}", db_config.url);
        let store = crate::database::SqliteRequestStore::connect(db_config).await?;
        return Ok(Arc::new(store));
    }
    Ok(Arc::new(JsonFileRequestStore::in_dir(state_dir)))
}

#[cfg(not(feature = "database"))]
async fn open_store(config: &ShopConfig, state_dir: &std::path::Path) -> Result<Arc<dyn RequestStore>> {
    if config.database.is_some() {
        tracing::warn!("Database configured but the database feature is not enabled, using file store");
    }
    Ok(Arc::new(JsonFileRequestStore::in_dir(state_dir)))
}

pub fn show_how_to_get_started() -> Result<()> {
    println!("🛠️  Shop Workflow - fabrication requests from submission to pickup");
    println!();
    println!("Customers:");
    println!("  📤 shop-workflow --as you@uni.edu submit ... print3d --color red");
    println!("  🛒 shop-workflow --as you@uni.edu add-to-cart <ID>");
    println!();
    println!("Staff:");
    println!("  📋 shop-workflow --as <staff> list --stage UNFULFILLED");
    println!("  👷 shop-workflow --as <staff> assign <ID> <TECHNICIAN>");
    println!("  ▶️  shop-workflow --as <staff> advance <ID>");
    println!("  ❌ shop-workflow --as <staff> cancel <ID> --reason \"...\"");
    println!();
    println!("💡 Run 'shop-workflow status' to see how many requests wait in each stage.");
    Ok(())
}

pub(crate) fn describe_details(details: &ProjectDetails) -> String {
    match details {
        ProjectDetails::Print3d {
            quantity,
            filament_color,
        } => format!("{quantity} x {filament_color}"),
        ProjectDetails::Pcb {
            siding,
            silkscreen,
            rubout,
            board_area_sq_in,
        } => {
            let mut text = format!("{siding:?}, {board_area_sq_in} sq in").to_lowercase();
            if *silkscreen {
                text.push_str(", silkscreen");
            }
            if *rubout {
                text.push_str(", rubout");
            }
            text
        }
        ProjectDetails::Laser { material, quantity } => format!("{quantity} x {material}"),
    }
}

/// One table row as listed under a stage tab
pub(crate) fn print_request_row(request: &FabricationRequest) {
    let action = request
        .status
        .primary_action()
        .map(|a| format!("[{}]", a.label()))
        .unwrap_or_default();
    println!(
        "{}  {:<8} {:<24} {:<16} {}  {}",
        request.id,
        request.project_type().to_string(),
        request.customer_email,
        request.assigned_to.as_deref().unwrap_or("-"),
        request.requested_at.format("%Y-%m-%d %H:%M"),
        action
    );
}

pub(crate) fn print_request_detail(request: &FabricationRequest, viewer: Option<&Actor>) {
    println!("📄 Request {}", request.id);
    println!("   Stage:        {}", request.status);
    println!("   Type:         {} ({})", request.project_type(), describe_details(&request.details));
    println!("   Customer:     {} <{}>", request.customer_name, request.customer_email);
    println!("   File:         {}", request.project_file_name);
    println!("   Assigned to:  {}", request.assigned_to.as_deref().unwrap_or("-"));
    println!("   Requested:    {}", request.requested_at.to_rfc3339());
    println!("   Updated:      {}", request.updated_at.to_rfc3339());
    if let Some(comments) = &request.comments {
        println!("   Comments:     {comments}");
    }
    if let Some(reason) = &request.cancellation_reason {
        println!("   Canceled:     {reason}");
    }
    if let Some(viewer) = viewer {
        if viewer.is_staff() {
            if let Some(notes) = &request.technician_notes {
                println!("   Notes:        {notes}");
            }
        }
        let actions = policy::available_actions(request.status, viewer.role);
        if !actions.is_empty() {
            let labels: Vec<&str> = actions.iter().map(|a| a.label()).collect();
            println!("   Actions:      {}", labels.join(", "));
        }
    }
}
