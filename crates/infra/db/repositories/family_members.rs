use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::family_members::FamilyMemberEntity,
        repositories::family_members::FamilyMemberRepository,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::family_members},
};

pub struct FamilyMemberPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl FamilyMemberPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl FamilyMemberRepository for FamilyMemberPostgres {
    async fn find_by_id(&self, member_id: Uuid) -> Result<Option<FamilyMemberEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let member = family_members::table
            .find(member_id)
            .select(FamilyMemberEntity::as_select())
            .first::<FamilyMemberEntity>(&mut conn)
            .optional()?;

        Ok(member)
    }
}
