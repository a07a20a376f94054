use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{entities::vaccines::VaccineEntity, repositories::vaccines::VaccineRepository},
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::vaccines},
};

pub struct VaccinePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl VaccinePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl VaccineRepository for VaccinePostgres {
    async fn find_by_id(&self, vaccine_id: Uuid) -> Result<Option<VaccineEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let vaccine = vaccines::table
            .find(vaccine_id)
            .select(VaccineEntity::as_select())
            .first::<VaccineEntity>(&mut conn)
            .optional()?;

        Ok(vaccine)
    }
}
