use serde::Serialize;
use uuid::Uuid;

use super::enums::roles::Role;

/// Who is acting, as supplied by the identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActorContext {
    pub actor_id: Option<Uuid>,
    pub role: Role,
    pub center_id: Option<Uuid>,
}

impl ActorContext {
    pub fn new(actor_id: Uuid, role: Role, center_id: Option<Uuid>) -> Self {
        Self {
            actor_id: Some(actor_id),
            role,
            center_id,
        }
    }

    pub fn system() -> Self {
        Self {
            actor_id: None,
            role: Role::System,
            center_id: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Staff may only touch appointments of the center they are assigned to.
    pub fn works_at(&self, center_id: Option<Uuid>) -> bool {
        if !self.role.is_staff() {
            return true;
        }
        match (self.center_id, center_id) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(own), Some(target)) => own == target,
        }
    }
}
