use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::vaccine_lot_statuses::VaccineLotStatus,
    infra::db::postgres::schema::vaccine_lots,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, PartialEq)]
#[diesel(table_name = vaccine_lots)]
pub struct VaccineLotEntity {
    pub id: Uuid,
    pub vaccine_id: Uuid,
    pub lot_number: String,
    pub quantity: i32,
    pub remaining_quantity: i32,
    pub manufacturing_date: Option<NaiveDate>,
    pub expiry_date: NaiveDate,
    pub supplier: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VaccineLotEntity {
    /// Expiry wins over depletion.
    pub fn derived_status(&self, today: NaiveDate) -> VaccineLotStatus {
        derive_lot_status(self.remaining_quantity, self.expiry_date, today)
    }

    pub fn is_usable(&self, today: NaiveDate) -> bool {
        self.status == VaccineLotStatus::Available.as_str()
            && self.remaining_quantity > 0
            && self.expiry_date >= today
    }

    /// The lot after one dose is drawn, or `None` when it cannot be used.
    pub fn consumed(&self, today: NaiveDate) -> Option<Self> {
        if !self.is_usable(today) {
            return None;
        }
        let remaining_quantity = (self.remaining_quantity - 1).max(0);
        Some(Self {
            remaining_quantity,
            status: derive_lot_status(remaining_quantity, self.expiry_date, today)
                .as_str()
                .to_string(),
            updated_at: Utc::now(),
            ..self.clone()
        })
    }
}

pub fn derive_lot_status(
    remaining_quantity: i32,
    expiry_date: NaiveDate,
    today: NaiveDate,
) -> VaccineLotStatus {
    if expiry_date < today {
        VaccineLotStatus::Expired
    } else if remaining_quantity <= 0 {
        VaccineLotStatus::Depleted
    } else {
        VaccineLotStatus::Available
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = vaccine_lots)]
pub struct InsertVaccineLotEntity {
    pub vaccine_id: Uuid,
    pub lot_number: String,
    pub quantity: i32,
    pub remaining_quantity: i32,
    pub manufacturing_date: Option<NaiveDate>,
    pub expiry_date: NaiveDate,
    pub supplier: Option<String>,
    pub status: String,
}
