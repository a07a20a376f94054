use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::appointment_histories;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, PartialEq)]
#[diesel(table_name = appointment_histories)]
pub struct AppointmentHistoryEntity {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub old_status: Option<String>,
    pub new_status: String,
    pub changed_by: Option<Uuid>,
    pub changed_by_role: String,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, PartialEq)]
#[diesel(table_name = appointment_histories)]
pub struct InsertAppointmentHistoryEntity {
    pub appointment_id: Uuid,
    pub old_status: Option<String>,
    pub new_status: String,
    pub changed_by: Option<Uuid>,
    pub changed_by_role: String,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}
