//! Central permission table for game mutations. Both the realtime hub and
//! the HTTP handlers go through this one function, so the two entry points
//! cannot drift apart.

use crate::models::game::Role;

/// Closed set of score-state-affecting actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    UpdateScore,
    UpdateStatus,
    DeleteGame,
}

pub fn role_allows(role: Role, action: Action) -> bool {
    match action {
        Action::UpdateScore => matches!(role, Role::Creator | Role::Scorer),
        Action::UpdateStatus | Action::DeleteGame => matches!(role, Role::Creator),
    }
}
