use serde::Serialize;
use uuid::Uuid;

use crate::engine::EngineError;

/// The user on whose behalf a mutation runs. Every mutation carries one so the
/// audit trail can attribute it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl Actor {
    pub fn new(user_id: Option<Uuid>, email: Option<String>) -> Result<Self, EngineError> {
        let user_id = user_id.ok_or(EngineError::MissingActor)?;
        let email = email.filter(|e| !e.trim().is_empty());
        Ok(Self { user_id, email })
    }
}
