use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::family_members;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = family_members)]
pub struct FamilyMemberEntity {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub full_name: String,
}
