use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::vaccine_lots::{InsertVaccineLotEntity, VaccineLotEntity},
        repositories::vaccine_lots::VaccineLotRepository,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::vaccine_lots},
};

pub struct VaccineLotPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl VaccineLotPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl VaccineLotRepository for VaccineLotPostgres {
    async fn find_by_id(&self, lot_id: Uuid) -> Result<Option<VaccineLotEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let lot = vaccine_lots::table
            .find(lot_id)
            .select(VaccineLotEntity::as_select())
            .first::<VaccineLotEntity>(&mut conn)
            .optional()?;

        Ok(lot)
    }

    async fn find_by_lot_number(&self, lot_number: String) -> Result<Option<VaccineLotEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let lot = vaccine_lots::table
            .filter(vaccine_lots::lot_number.eq(lot_number))
            .select(VaccineLotEntity::as_select())
            .first::<VaccineLotEntity>(&mut conn)
            .optional()?;

        Ok(lot)
    }

    async fn create(&self, lot: InsertVaccineLotEntity) -> Result<VaccineLotEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let lot = insert_into(vaccine_lots::table)
            .values(&lot)
            .returning(VaccineLotEntity::as_returning())
            .get_result::<VaccineLotEntity>(&mut conn)?;

        Ok(lot)
    }

    async fn list_all(&self) -> Result<Vec<VaccineLotEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let lots = vaccine_lots::table
            .order(vaccine_lots::expiry_date.asc())
            .select(VaccineLotEntity::as_select())
            .load::<VaccineLotEntity>(&mut conn)?;

        Ok(lots)
    }

    async fn update_status(&self, lot_id: Uuid, status: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(vaccine_lots::table)
            .filter(vaccine_lots::id.eq(lot_id))
            .set((
                vaccine_lots::status.eq(status),
                vaccine_lots::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
