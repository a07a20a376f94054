use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::family_members::FamilyMemberEntity;

#[async_trait]
#[automock]
pub trait FamilyMemberRepository {
    async fn find_by_id(&self, member_id: Uuid) -> Result<Option<FamilyMemberEntity>>;
}
