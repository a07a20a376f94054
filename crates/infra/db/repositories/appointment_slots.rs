use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::{PgConnection, QueryResult, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::appointment_slots::{AppointmentSlotEntity, InsertAppointmentSlotEntity},
        repositories::appointment_slots::AppointmentSlotRepository,
        value_objects::slots::SlotCursor,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::appointment_slots},
};

pub struct AppointmentSlotPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl AppointmentSlotPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// Check-and-increment in a single statement; the row lock serializes concurrent callers.
pub(crate) fn reserve_slot(
    conn: &mut PgConnection,
    slot_id: Uuid,
) -> QueryResult<Option<AppointmentSlotEntity>> {
    update(appointment_slots::table)
        .filter(appointment_slots::id.eq(slot_id))
        .filter(appointment_slots::is_available.eq(true))
        .filter(appointment_slots::current_bookings.lt(appointment_slots::max_capacity))
        .set((
            appointment_slots::current_bookings.eq(appointment_slots::current_bookings + 1),
            appointment_slots::is_available
                .eq((appointment_slots::current_bookings + 1).lt(appointment_slots::max_capacity)),
            appointment_slots::updated_at.eq(Utc::now()),
        ))
        .returning(AppointmentSlotEntity::as_returning())
        .get_result::<AppointmentSlotEntity>(conn)
        .optional()
}

pub(crate) fn release_slot(
    conn: &mut PgConnection,
    slot_id: Uuid,
) -> QueryResult<Option<AppointmentSlotEntity>> {
    let released = update(appointment_slots::table)
        .filter(appointment_slots::id.eq(slot_id))
        .filter(appointment_slots::current_bookings.gt(0))
        .set((
            appointment_slots::current_bookings.eq(appointment_slots::current_bookings - 1),
            appointment_slots::is_available
                .eq((appointment_slots::current_bookings - 1).lt(appointment_slots::max_capacity)),
            appointment_slots::updated_at.eq(Utc::now()),
        ))
        .returning(AppointmentSlotEntity::as_returning())
        .get_result::<AppointmentSlotEntity>(conn)
        .optional()?;

    match released {
        Some(slot) => Ok(Some(slot)),
        // already at zero
        None => appointment_slots::table
            .find(slot_id)
            .select(AppointmentSlotEntity::as_select())
            .first::<AppointmentSlotEntity>(conn)
            .optional(),
    }
}

#[async_trait]
impl AppointmentSlotRepository for AppointmentSlotPostgres {
    async fn find_by_id(&self, slot_id: Uuid) -> Result<Option<AppointmentSlotEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let slot = appointment_slots::table
            .find(slot_id)
            .select(AppointmentSlotEntity::as_select())
            .first::<AppointmentSlotEntity>(&mut conn)
            .optional()?;

        Ok(slot)
    }

    async fn try_reserve(&self, slot_id: Uuid) -> Result<Option<AppointmentSlotEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        Ok(reserve_slot(&mut conn, slot_id)?)
    }

    async fn release(&self, slot_id: Uuid) -> Result<Option<AppointmentSlotEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        Ok(release_slot(&mut conn, slot_id)?)
    }

    async fn list_available_page(
        &self,
        center_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        after: Option<SlotCursor>,
        limit: i64,
    ) -> Result<Vec<AppointmentSlotEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut query = appointment_slots::table
            .filter(appointment_slots::center_id.eq(center_id))
            .filter(appointment_slots::slot_date.between(from, to))
            .filter(appointment_slots::is_available.eq(true))
            .filter(appointment_slots::current_bookings.lt(appointment_slots::max_capacity))
            .select(AppointmentSlotEntity::as_select())
            .into_boxed();

        if let Some(cursor) = after {
            query = query.filter(
                appointment_slots::slot_date
                    .gt(cursor.slot_date)
                    .or(appointment_slots::slot_date
                        .eq(cursor.slot_date)
                        .and(appointment_slots::start_time.gt(cursor.start_time)))
                    .or(appointment_slots::slot_date
                        .eq(cursor.slot_date)
                        .and(appointment_slots::start_time.eq(cursor.start_time))
                        .and(appointment_slots::id.gt(cursor.id))),
            );
        }

        let slots = query
            .order((
                appointment_slots::slot_date.asc(),
                appointment_slots::start_time.asc(),
                appointment_slots::id.asc(),
            ))
            .limit(limit)
            .load::<AppointmentSlotEntity>(&mut conn)?;

        Ok(slots)
    }

    async fn list_for_center_on(
        &self,
        center_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AppointmentSlotEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let slots = appointment_slots::table
            .filter(appointment_slots::center_id.eq(center_id))
            .filter(appointment_slots::slot_date.eq(date))
            .order(appointment_slots::start_time.asc())
            .select(AppointmentSlotEntity::as_select())
            .load::<AppointmentSlotEntity>(&mut conn)?;

        Ok(slots)
    }

    async fn create(&self, slot: InsertAppointmentSlotEntity) -> Result<AppointmentSlotEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let slot = insert_into(appointment_slots::table)
            .values(&slot)
            .returning(AppointmentSlotEntity::as_returning())
            .get_result::<AppointmentSlotEntity>(&mut conn)?;

        Ok(slot)
    }
}
