use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::vaccination_records;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, PartialEq)]
#[diesel(table_name = vaccination_records)]
pub struct VaccinationRecordEntity {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub vaccine_id: Uuid,
    pub vaccine_lot_id: Uuid,
    pub nurse_id: Option<Uuid>,
    pub injection_date: NaiveDate,
    pub injection_time: NaiveTime,
    pub injection_site: Option<String>,
    pub dose_number: i32,
    pub dose_amount: Option<f64>,
    pub batch_number: String,
    pub certificate_number: String,
    pub next_dose_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, PartialEq)]
#[diesel(table_name = vaccination_records)]
pub struct InsertVaccinationRecordEntity {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub vaccine_id: Uuid,
    pub vaccine_lot_id: Uuid,
    pub nurse_id: Option<Uuid>,
    pub injection_date: NaiveDate,
    pub injection_time: NaiveTime,
    pub injection_site: Option<String>,
    pub dose_number: i32,
    pub dose_amount: Option<f64>,
    pub batch_number: String,
    pub certificate_number: String,
    pub next_dose_date: Option<NaiveDate>,
    pub notes: Option<String>,
}
