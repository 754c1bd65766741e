use serde::Deserialize;

use crate::error::{ReputationError, Result};
use crate::reputation::pipeline::ScoreRequest;

/// The parts of a GitHub push delivery that identify what to rescore.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    pub repository: EventRepository,
    pub sender: EventUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRepository {
    pub name: String,
    pub owner: EventUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventUser {
    pub login: String,
}

impl PushEvent {
    pub fn from_json(payload: &str) -> Result<PushEvent> {
        serde_json::from_str(payload)
            .map_err(|e| ReputationError::InvalidInput(format!("malformed push payload: {e}")))
    }

    /// A push rescores the contributor who made it.
    pub fn score_request(&self) -> ScoreRequest {
        ScoreRequest::repository(&self.repository.owner.login, &self.repository.name)
            .for_contributor(&self.sender.login)
    }
}
