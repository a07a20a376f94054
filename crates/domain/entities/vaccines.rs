use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::vaccines;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, PartialEq)]
#[diesel(table_name = vaccines)]
pub struct VaccineEntity {
    pub id: Uuid,
    pub name: String,
    pub price: Option<i64>,
    pub doses_required: i32,
    pub days_between_doses: Option<i32>,
}
