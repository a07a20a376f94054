use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::{
    PgConnection, QueryResult,
    dsl::{max, sql},
    insert_into,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    sql_types::Text,
    update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            appointments::AppointmentEntity, vaccination_records::VaccinationRecordEntity,
            vaccine_lots::VaccineLotEntity,
        },
        repositories::vaccination_records::VaccinationRecordRepository,
        value_objects::{
            enums::vaccine_lot_statuses::VaccineLotStatus,
            patients::Patient,
            vaccinations::{RecordVaccinationCommand, RecordVaccinationOutcome},
        },
    },
    infra::db::{
        postgres::{
            postgres_connection::PgPoolSquad,
            schema::{appointment_histories, appointments, vaccination_records, vaccine_lots},
        },
        repositories::appointments::patient_appointments,
    },
};

const APPOINTMENT_CONSTRAINT: &str = "vaccination_records_appointment_id_key";
const CERTIFICATE_CONSTRAINT: &str = "vaccination_records_certificate_number_key";

pub struct VaccinationRecordPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl VaccinationRecordPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

enum RecordTxError {
    Rejected(RecordVaccinationOutcome),
    Db(DieselError),
}

impl From<DieselError> for RecordTxError {
    fn from(err: DieselError) -> Self {
        RecordTxError::Db(err)
    }
}

/// Draws one dose. The status flips to DEPLETED in the same statement when the last dose goes.
fn consume_lot(
    conn: &mut PgConnection,
    lot_id: Uuid,
    today: NaiveDate,
) -> QueryResult<Option<VaccineLotEntity>> {
    update(vaccine_lots::table)
        .filter(vaccine_lots::id.eq(lot_id))
        .filter(vaccine_lots::status.eq(VaccineLotStatus::Available.as_str()))
        .filter(vaccine_lots::remaining_quantity.gt(0))
        .filter(vaccine_lots::expiry_date.ge(today))
        .set((
            vaccine_lots::remaining_quantity.eq(vaccine_lots::remaining_quantity - 1),
            vaccine_lots::status.eq(sql::<Text>(
                "CASE WHEN remaining_quantity <= 1 THEN 'DEPLETED' ELSE 'AVAILABLE' END",
            )),
            vaccine_lots::updated_at.eq(Utc::now()),
        ))
        .returning(VaccineLotEntity::as_returning())
        .get_result::<VaccineLotEntity>(conn)
        .optional()
}

#[async_trait]
impl VaccinationRecordRepository for VaccinationRecordPostgres {
    async fn find_by_appointment_id(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<VaccinationRecordEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let record = vaccination_records::table
            .filter(vaccination_records::appointment_id.eq(appointment_id))
            .select(VaccinationRecordEntity::as_select())
            .first::<VaccinationRecordEntity>(&mut conn)
            .optional()?;

        Ok(record)
    }

    async fn record(&self, command: RecordVaccinationCommand) -> Result<RecordVaccinationOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = conn.transaction::<_, RecordTxError, _>(|tx| {
            let lot = consume_lot(tx, command.record.vaccine_lot_id, command.today)?.ok_or(
                RecordTxError::Rejected(RecordVaccinationOutcome::LotUnavailable),
            )?;

            let record = insert_into(vaccination_records::table)
                .values(&command.record)
                .returning(VaccinationRecordEntity::as_returning())
                .get_result::<VaccinationRecordEntity>(tx)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                        let constraint = info.constraint_name().map(str::to_owned);
                        match constraint.as_deref() {
                            Some(APPOINTMENT_CONSTRAINT) => RecordTxError::Rejected(
                                RecordVaccinationOutcome::DuplicateRecord,
                            ),
                            Some(CERTIFICATE_CONSTRAINT) => RecordTxError::Rejected(
                                RecordVaccinationOutcome::CertificateTaken,
                            ),
                            _ => RecordTxError::Db(DieselError::DatabaseError(
                                DatabaseErrorKind::UniqueViolation,
                                info,
                            )),
                        }
                    }
                    other => RecordTxError::Db(other),
                })?;

            let appointment = update(appointments::table)
                .filter(appointments::id.eq(command.record.appointment_id))
                .filter(appointments::version.eq(command.expected_version))
                .set((
                    appointments::status.eq(&command.final_status),
                    appointments::version.eq(appointments::version + 1),
                    appointments::updated_at.eq(Utc::now()),
                ))
                .returning(AppointmentEntity::as_returning())
                .get_result::<AppointmentEntity>(tx)
                .optional()?
                .ok_or(RecordTxError::Rejected(
                    RecordVaccinationOutcome::StaleAppointment,
                ))?;

            insert_into(appointment_histories::table)
                .values(&command.histories)
                .execute(tx)?;

            Ok(RecordVaccinationOutcome::Recorded {
                record,
                lot,
                appointment,
            })
        });

        match result {
            Ok(outcome) | Err(RecordTxError::Rejected(outcome)) => Ok(outcome),
            Err(RecordTxError::Db(err)) => Err(err.into()),
        }
    }

    async fn max_completed_dose(&self, patient: Patient, vaccine_id: Uuid) -> Result<i32> {
        let Some(query) = patient_appointments(&patient) else {
            return Ok(0);
        };
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let appointment_ids = query
            .select(appointments::id)
            .load::<Uuid>(&mut conn)?;
        if appointment_ids.is_empty() {
            return Ok(0);
        }

        let dose = vaccination_records::table
            .filter(vaccination_records::appointment_id.eq_any(appointment_ids))
            .filter(vaccination_records::vaccine_id.eq(vaccine_id))
            .select(max(vaccination_records::dose_number))
            .get_result::<Option<i32>>(&mut conn)?;

        Ok(dose.unwrap_or(0))
    }
}
