use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::{appointments::AppointmentEntity, screenings::ScreeningEntity},
        repositories::screenings::ScreeningRepository,
        value_objects::screenings::ScreeningDecisionCommand,
    },
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{appointment_histories, appointments, screenings},
    },
};

pub struct ScreeningPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ScreeningPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ScreeningRepository for ScreeningPostgres {
    async fn find_by_appointment_id(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<ScreeningEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let screening = screenings::table
            .filter(screenings::appointment_id.eq(appointment_id))
            .select(ScreeningEntity::as_select())
            .first::<ScreeningEntity>(&mut conn)
            .optional()?;

        Ok(screening)
    }

    async fn record_decision(
        &self,
        command: ScreeningDecisionCommand,
    ) -> Result<Option<(ScreeningEntity, AppointmentEntity)>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let appointment_id = command.screening.appointment_id;

        let decided = conn.transaction::<_, diesel::result::Error, _>(|tx| {
            let Some(mut appointment) = update(appointments::table)
                .filter(appointments::id.eq(appointment_id))
                .filter(appointments::version.eq(command.expected_version))
                .set((
                    appointments::status.eq(&command.final_status),
                    appointments::version.eq(appointments::version + 1),
                    appointments::updated_at.eq(Utc::now()),
                ))
                .returning(AppointmentEntity::as_returning())
                .get_result::<AppointmentEntity>(tx)
                .optional()?
            else {
                return Ok(None);
            };

            if let Some(vaccine_id) = command.switch_vaccine_to {
                appointment = update(appointments::table.find(appointment_id))
                    .set(appointments::vaccine_id.eq(Some(vaccine_id)))
                    .returning(AppointmentEntity::as_returning())
                    .get_result::<AppointmentEntity>(tx)?;
            }

            let screening = insert_into(screenings::table)
                .values(&command.screening)
                .on_conflict(screenings::appointment_id)
                .do_update()
                .set(&command.screening)
                .returning(ScreeningEntity::as_returning())
                .get_result::<ScreeningEntity>(tx)?;

            if !command.histories.is_empty() {
                insert_into(appointment_histories::table)
                    .values(&command.histories)
                    .execute(tx)?;
            }

            Ok(Some((screening, appointment)))
        })?;

        Ok(decided)
    }
}
