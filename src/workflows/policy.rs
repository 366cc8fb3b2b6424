// Stage Policy - pure decisions over (stage, action, actor)
//
// Nothing in here touches storage or the clock; the engine supplies `now`
// when it turns a decision into an updated record.

use chrono::{DateTime, Utc};

use super::errors::WorkflowError;
use crate::requests::{Action, ActionKind, Actor, FabricationRequest, Role, Stage};

/// Change a permitted action makes beyond the status field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    None,
    SetAssignee(String),
    EmitCartLineItem,
    RecordCancellation {
        reason: Option<String>,
        /// Set when nobody owned the request yet
        closed_by: Option<String>,
    },
}

/// Outcome of a successful policy check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub from: Stage,
    pub next: Stage,
    pub effect: SideEffect,
}

impl Decision {
    fn unchanged(stage: Stage) -> Self {
        Self {
            from: stage,
            next: stage,
            effect: SideEffect::None,
        }
    }

    /// True when applying the decision would not change the record
    pub fn is_noop(&self) -> bool {
        self.from == self.next && self.effect == SideEffect::None
    }

    /// Produce the updated record; `updated_at` never precedes `requested_at`
    pub fn apply_to(&self, request: &FabricationRequest, now: DateTime<Utc>) -> FabricationRequest {
        let mut updated = request.clone();
        updated.status = self.next;
        match &self.effect {
            SideEffect::None | SideEffect::EmitCartLineItem => {}
            SideEffect::SetAssignee(technician) => {
                updated.assigned_to = Some(technician.clone());
            }
            SideEffect::RecordCancellation { reason, closed_by } => {
                updated.cancellation_reason = reason.clone();
                if updated.assigned_to.is_none() {
                    updated.assigned_to = closed_by.clone();
                }
            }
        }
        updated.updated_at = now.max(request.requested_at);
        updated.version = request.version + 1;
        updated
    }
}

/// Stage reached by `action` from `stage`, if the table has a row for it
pub fn next_stage(stage: Stage, action: ActionKind) -> Option<Stage> {
    use ActionKind as A;
    use Stage as S;

    match (stage, action) {
        (S::Unfulfilled, A::Assign) => Some(S::Assigned),
        // Only the idempotent re-assign of the current technician
        (S::Assigned, A::Assign) => Some(S::Assigned),
        (S::Assigned | S::InProgress, A::Reassign) => Some(stage),
        (S::Assigned, A::Start) => Some(S::InProgress),
        (S::InProgress, A::MarkReady) => Some(S::ReadyForPickup),
        (S::ReadyForPickup, A::AddToCart) => Some(S::Finished),
        (s, A::Cancel) if !s.is_terminal() => Some(S::Canceled),
        _ => None,
    }
}

pub fn permitted_roles(action: ActionKind) -> &'static [Role] {
    match action {
        ActionKind::AddToCart => &[Role::Staff, Role::Customer],
        ActionKind::Assign
        | ActionKind::Reassign
        | ActionKind::Start
        | ActionKind::MarkReady
        | ActionKind::Cancel => &[Role::Staff],
    }
}

/// Actions a row menu should offer for `stage` to someone with `role`
pub fn available_actions(stage: Stage, role: Role) -> Vec<ActionKind> {
    const ALL: [ActionKind; 6] = [
        ActionKind::Assign,
        ActionKind::Reassign,
        ActionKind::Start,
        ActionKind::MarkReady,
        ActionKind::AddToCart,
        ActionKind::Cancel,
    ];
    ALL.into_iter()
        .filter(|kind| !(stage == Stage::Assigned && *kind == ActionKind::Assign))
        .filter(|kind| next_stage(stage, *kind).is_some())
        .filter(|kind| permitted_roles(*kind).contains(&role))
        .collect()
}

/// Decide whether `actor` may perform `action` on `request`
///
/// Rejections are checked in a fixed order: terminal or missing table row,
/// then role, then payload.
pub fn check(
    request: &FabricationRequest,
    action: &Action,
    actor: &Actor,
) -> Result<Decision, WorkflowError> {
    let stage = request.status;
    let kind = action.kind();

    let invalid = || WorkflowError::InvalidTransition {
        from: stage,
        action: kind,
    };

    if stage.is_terminal() {
        return Err(invalid());
    }
    let next = next_stage(stage, kind).ok_or_else(invalid)?;

    if !permitted_roles(kind).contains(&actor.role) {
        return Err(WorkflowError::unauthorized(actor.role, kind.to_string()));
    }
    if kind == ActionKind::AddToCart && actor.role == Role::Customer && !request.belongs_to(actor) {
        return Err(WorkflowError::unauthorized(
            actor.role,
            "add another customer's request to a cart",
        ));
    }

    let effect = match action {
        Action::Assign { technician } | Action::Reassign { technician } => {
            let technician = technician.trim();
            if technician.is_empty() {
                return Err(WorkflowError::Validation(format!(
                    "{kind} requires a technician"
                )));
            }
            if request.assigned_to.as_deref() == Some(technician) {
                return Ok(Decision::unchanged(stage));
            }
            if kind == ActionKind::Assign && stage == Stage::Assigned {
                // Handing the job to someone else is a reassign
                return Err(invalid());
            }
            SideEffect::SetAssignee(technician.to_string())
        }
        Action::Start | Action::MarkReady => SideEffect::None,
        Action::AddToCart => SideEffect::EmitCartLineItem,
        Action::Cancel { reason } => SideEffect::RecordCancellation {
            reason: reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
            closed_by: request
                .assigned_to
                .is_none()
                .then(|| actor.id.trim().to_string()),
        },
    };

    Ok(Decision {
        from: stage,
        next,
        effect,
    })
}
