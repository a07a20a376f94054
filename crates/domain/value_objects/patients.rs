use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::appointments::AppointmentEntity;

pub const PATIENT_REGISTERED: &str = "REGISTERED";
pub const PATIENT_FAMILY_MEMBER: &str = "FAMILY_MEMBER";
pub const PATIENT_GUEST: &str = "GUEST";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestPatient {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

/// The person receiving the vaccine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Patient {
    Registered { user_id: Uuid },
    FamilyMember { member_id: Uuid },
    Guest(GuestPatient),
}

/// Column projection of a [`Patient`] onto the appointments row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientColumns {
    pub patient_kind: String,
    pub patient_user_id: Option<Uuid>,
    pub family_member_id: Option<Uuid>,
    pub guest_full_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub guest_date_of_birth: Option<NaiveDate>,
}

impl Patient {
    pub fn kind(&self) -> &'static str {
        match self {
            Patient::Registered { .. } => PATIENT_REGISTERED,
            Patient::FamilyMember { .. } => PATIENT_FAMILY_MEMBER,
            Patient::Guest(_) => PATIENT_GUEST,
        }
    }

    pub fn columns(&self) -> PatientColumns {
        let mut columns = PatientColumns {
            patient_kind: self.kind().to_string(),
            ..Default::default()
        };
        match self {
            Patient::Registered { user_id } => columns.patient_user_id = Some(*user_id),
            Patient::FamilyMember { member_id } => columns.family_member_id = Some(*member_id),
            Patient::Guest(guest) => {
                columns.guest_full_name = Some(guest.full_name.clone());
                columns.guest_email = guest.email.clone();
                columns.guest_phone = guest.phone.clone();
                columns.guest_date_of_birth = guest.date_of_birth;
            }
        }
        columns
    }

    pub fn from_appointment(appointment: &AppointmentEntity) -> Result<Self> {
        match appointment.patient_kind.as_str() {
            PATIENT_REGISTERED => match appointment.patient_user_id {
                Some(user_id) => Ok(Patient::Registered { user_id }),
                None => bail!("appointment {} is missing patient_user_id", appointment.id),
            },
            PATIENT_FAMILY_MEMBER => match appointment.family_member_id {
                Some(member_id) => Ok(Patient::FamilyMember { member_id }),
                None => bail!("appointment {} is missing family_member_id", appointment.id),
            },
            PATIENT_GUEST => Ok(Patient::Guest(GuestPatient {
                full_name: appointment.guest_full_name.clone().unwrap_or_default(),
                email: appointment.guest_email.clone(),
                phone: appointment.guest_phone.clone(),
                date_of_birth: appointment.guest_date_of_birth,
            })),
            other => bail!("appointment {} has unknown patient kind {}", appointment.id, other),
        }
    }
}
