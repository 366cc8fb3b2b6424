// Static identity directory backed by the configured staff roster

use async_trait::async_trait;
use std::collections::HashSet;

use super::errors::IdentityError;
use super::traits::IdentityService;
use super::types::Actor;

/// Resolves staff from a fixed roster; e-mail addresses are customers
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    staff: HashSet<String>,
}

impl StaticDirectory {
    pub fn new<I, S>(staff: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            staff: staff
                .into_iter()
                .map(|s| s.as_ref().trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_staff(&self, user_id: &str) -> bool {
        self.staff.contains(&user_id.trim().to_ascii_lowercase())
    }
}

#[async_trait]
impl IdentityService for StaticDirectory {
    async fn resolve(&self, user_id: &str) -> Result<Actor, IdentityError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(IdentityError::Anonymous);
        }
        if self.is_staff(user_id) {
            return Ok(Actor::staff(user_id));
        }
        if user_id.contains('@') {
            return Ok(Actor::customer(user_id));
        }
        Err(IdentityError::UnknownUser(user_id.to_string()))
    }
}
