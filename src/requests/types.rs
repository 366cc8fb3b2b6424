// Core types for fabrication requests and the values the workflow hands off

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique, immutable identifier of a fabrication request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Stages of the request lifecycle, in tab order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    /// Submitted by a customer, nobody has picked it up yet
    Unfulfilled,
    /// A technician owns the job
    Assigned,
    /// Fabrication has started
    InProgress,
    /// Finished part is waiting for the customer
    ReadyForPickup,
    /// Fee handed to the cart; terminal
    Finished,
    /// Withdrawn or rejected; terminal tombstone
    Canceled,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Unfulfilled,
        Stage::Assigned,
        Stage::InProgress,
        Stage::ReadyForPickup,
        Stage::Finished,
        Stage::Canceled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Finished | Stage::Canceled)
    }

    /// The single row action rendered for a request in this stage
    pub fn primary_action(&self) -> Option<ActionKind> {
        match self {
            Stage::Unfulfilled => Some(ActionKind::Assign),
            Stage::Assigned => Some(ActionKind::Start),
            Stage::InProgress => Some(ActionKind::MarkReady),
            Stage::ReadyForPickup => Some(ActionKind::AddToCart),
            Stage::Finished | Stage::Canceled => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Unfulfilled => "UNFULFILLED",
            Stage::Assigned => "ASSIGNED",
            Stage::InProgress => "IN_PROGRESS",
            Stage::ReadyForPickup => "READY_FOR_PICKUP",
            Stage::Finished => "FINISHED",
            Stage::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage '{0}'")]
pub struct ParseStageError(pub String);

impl FromStr for Stage {
    type Err = ParseStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == normalized)
            .ok_or_else(|| ParseStageError(s.to_string()))
    }
}

/// Kind of fabrication job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectType {
    Print3d,
    Pcb,
    Laser,
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectType::Print3d => f.write_str("PRINT3D"),
            ProjectType::Pcb => f.write_str("PCB"),
            ProjectType::Laser => f.write_str("LASER"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PcbSiding {
    Single,
    Double,
}

/// Type-specific attributes of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "project_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectDetails {
    Print3d {
        quantity: u32,
        filament_color: String,
    },
    Pcb {
        siding: PcbSiding,
        silkscreen: bool,
        rubout: bool,
        board_area_sq_in: f64,
    },
    Laser {
        material: String,
        quantity: u32,
    },
}

impl ProjectDetails {
    pub fn project_type(&self) -> ProjectType {
        match self {
            ProjectDetails::Print3d { .. } => ProjectType::Print3d,
            ProjectDetails::Pcb { .. } => ProjectType::Pcb,
            ProjectDetails::Laser { .. } => ProjectType::Laser,
        }
    }

    /// Returns a description of the first malformed attribute, if any
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ProjectDetails::Print3d {
                quantity,
                filament_color,
            } => {
                if *quantity == 0 {
                    return Err("print quantity must be at least 1".to_string());
                }
                if filament_color.trim().is_empty() {
                    return Err("filament color is required".to_string());
                }
            }
            ProjectDetails::Pcb {
                board_area_sq_in, ..
            } => {
                if !board_area_sq_in.is_finite() || *board_area_sq_in <= 0.0 {
                    return Err("board area must be a positive number of square inches".to_string());
                }
            }
            ProjectDetails::Laser { material, quantity } => {
                if *quantity == 0 {
                    return Err("laser cut quantity must be at least 1".to_string());
                }
                if material.trim().is_empty() {
                    return Err("laser cut material is required".to_string());
                }
            }
        }
        Ok(())
    }
}

/// One customer fabrication job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FabricationRequest {
    pub id: RequestId,
    pub status: Stage,
    pub assigned_to: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comments: Option<String>,
    pub technician_notes: Option<String>,
    pub project_file_name: String,
    #[serde(flatten)]
    pub details: ProjectDetails,
    pub cancellation_reason: Option<String>,
    /// Store revision, bumped on every committed mutation
    pub version: u64,
}

impl FabricationRequest {
    /// Build a fresh UNFULFILLED record from a submission
    pub fn from_submission(submission: NewRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: RequestId::new(),
            status: Stage::Unfulfilled,
            assigned_to: None,
            customer_name: submission.customer_name.trim().to_string(),
            customer_email: submission.customer_email.trim().to_string(),
            requested_at: now,
            updated_at: now,
            comments: submission.comments.filter(|c| !c.trim().is_empty()),
            technician_notes: None,
            project_file_name: submission.project_file_name.trim().to_string(),
            details: submission.details,
            cancellation_reason: None,
            version: 1,
        }
    }

    pub fn project_type(&self) -> ProjectType {
        self.details.project_type()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn belongs_to(&self, actor: &Actor) -> bool {
        self.customer_email.eq_ignore_ascii_case(actor.id.trim())
    }

    /// Checks the record-level invariants, returning the first violation
    pub fn check_invariants(&self) -> Result<(), String> {
        match (&self.status, &self.assigned_to) {
            (Stage::Unfulfilled, Some(tech)) => {
                return Err(format!("request {} is UNFULFILLED but assigned to {}", self.id, tech));
            }
            (stage, None) if *stage != Stage::Unfulfilled => {
                return Err(format!("request {} is {} without an assignee", self.id, stage));
            }
            _ => {}
        }
        if self.updated_at < self.requested_at {
            return Err(format!("request {} was updated before it was requested", self.id));
        }
        if self.version == 0 {
            return Err(format!("request {} has version 0", self.id));
        }
        self.details.validate()
    }
}

/// Submission payload for a new request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRequest {
    pub customer_name: String,
    pub customer_email: String,
    pub comments: Option<String>,
    pub project_file_name: String,
    pub details: ProjectDetails,
}

impl NewRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.customer_name.trim().is_empty() {
            return Err("customer name is required".to_string());
        }
        if !self.customer_email.contains('@') {
            return Err(format!("'{}' is not an e-mail address", self.customer_email));
        }
        if self.project_file_name.trim().is_empty() {
            return Err("project file name is required".to_string());
        }
        self.details.validate()
    }
}

/// Fee for a finished job, handed to the cart collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub request_id: RequestId,
    pub customer_email: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price_cents: u64,
    pub total_cents: u64,
    pub created_at: DateTime<Utc>,
}

/// Role of whoever invokes a workflow action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Staff,
    Customer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Staff => f.write_str("staff"),
            Role::Customer => f.write_str("customer"),
        }
    }
}

/// Identity plus role of the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn staff(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Staff,
        }
    }

    pub fn customer(email: impl Into<String>) -> Self {
        Self {
            id: email.into(),
            role: Role::Customer,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }
}

/// Workflow actions a caller can request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Assign { technician: String },
    Reassign { technician: String },
    Start,
    MarkReady,
    AddToCart,
    Cancel { reason: Option<String> },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Assign { .. } => ActionKind::Assign,
            Action::Reassign { .. } => ActionKind::Reassign,
            Action::Start => ActionKind::Start,
            Action::MarkReady => ActionKind::MarkReady,
            Action::AddToCart => ActionKind::AddToCart,
            Action::Cancel { .. } => ActionKind::Cancel,
        }
    }
}

/// Payload-free action discriminant, used in errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Assign,
    Reassign,
    Start,
    MarkReady,
    AddToCart,
    Cancel,
}

impl ActionKind {
    /// Button caption shown by the presentation layer
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Assign => "Assign",
            ActionKind::Reassign => "Reassign",
            ActionKind::Start => "Start",
            ActionKind::MarkReady => "Mark ready",
            ActionKind::AddToCart => "Add to cart",
            ActionKind::Cancel => "Cancel",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Assign => "assign",
            ActionKind::Reassign => "reassign",
            ActionKind::Start => "start",
            ActionKind::MarkReady => "mark_ready",
            ActionKind::AddToCart => "add_to_cart",
            ActionKind::Cancel => "cancel",
        };
        f.write_str(name)
    }
}
