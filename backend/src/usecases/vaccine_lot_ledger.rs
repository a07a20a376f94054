use std::sync::Arc;

use chrono::NaiveDate;
use crates::domain::{
    entities::vaccine_lots::{InsertVaccineLotEntity, VaccineLotEntity, derive_lot_status},
    repositories::{vaccine_lots::VaccineLotRepository, vaccines::VaccineRepository},
    value_objects::{
        actors::ActorContext,
        enums::{roles::Role, vaccine_lot_statuses::VaccineLotStatus},
        vaccinations::{LotSweepReport, LotWarningDto, LotWarningKind, RegisterLotModel},
    },
};
use tracing::{info, warn};
use uuid::Uuid;

use super::errors::{BookingError, UseCaseResult, storage_failure};

pub struct VaccineLotLedger {
    lot_repository: Arc<dyn VaccineLotRepository + Send + Sync>,
    vaccine_repository: Arc<dyn VaccineRepository + Send + Sync>,
}

impl VaccineLotLedger {
    pub fn new(
        lot_repository: Arc<dyn VaccineLotRepository + Send + Sync>,
        vaccine_repository: Arc<dyn VaccineRepository + Send + Sync>,
    ) -> Self {
        Self {
            lot_repository,
            vaccine_repository,
        }
    }

    /// A lot may be drawn from only while it is AVAILABLE, in date, stocked and of the
    /// vaccine the appointment is for.
    pub fn ensure_usable(
        lot: &VaccineLotEntity,
        vaccine_id: Uuid,
        today: NaiveDate,
    ) -> UseCaseResult<()> {
        if lot.vaccine_id != vaccine_id {
            return Err(BookingError::LotUnavailable(format!(
                "lot {} belongs to another vaccine",
                lot.lot_number
            )));
        }
        if lot.expiry_date < today {
            return Err(BookingError::LotUnavailable(format!(
                "lot {} expired on {}",
                lot.lot_number, lot.expiry_date
            )));
        }
        if lot.remaining_quantity <= 0 {
            return Err(BookingError::LotUnavailable(format!(
                "lot {} is depleted",
                lot.lot_number
            )));
        }
        if lot.status != VaccineLotStatus::Available.as_str() {
            return Err(BookingError::LotUnavailable(format!(
                "lot {} is {}",
                lot.lot_number, lot.status
            )));
        }
        Ok(())
    }

    pub async fn find_lot(&self, lot_id: Uuid) -> UseCaseResult<VaccineLotEntity> {
        self.lot_repository
            .find_by_id(lot_id)
            .await
            .map_err(storage_failure("lots: load lot"))?
            .ok_or(BookingError::NotFound("vaccine lot"))
    }

    pub async fn list_lots(&self) -> UseCaseResult<Vec<VaccineLotEntity>> {
        self.lot_repository
            .list_all()
            .await
            .map_err(storage_failure("lots: list lots"))
    }

    pub async fn register_lot(
        &self,
        actor: &ActorContext,
        model: RegisterLotModel,
        today: NaiveDate,
    ) -> UseCaseResult<VaccineLotEntity> {
        if actor.role != Role::Admin {
            return Err(BookingError::Forbidden(
                "only admins register vaccine lots".to_string(),
            ));
        }
        let lot_number = model.lot_number.trim().to_string();
        if lot_number.is_empty() {
            return Err(BookingError::Validation("lot_number is required".to_string()));
        }
        if model.quantity <= 0 {
            return Err(BookingError::Validation("quantity must be positive".to_string()));
        }
        if let Some(manufactured) = model.manufacturing_date {
            if manufactured > model.expiry_date {
                return Err(BookingError::Validation(
                    "manufacturing_date must not be after expiry_date".to_string(),
                ));
            }
        }

        self.vaccine_repository
            .find_by_id(model.vaccine_id)
            .await
            .map_err(storage_failure("lots: load vaccine"))?
            .ok_or(BookingError::NotFound("vaccine"))?;

        let existing = self
            .lot_repository
            .find_by_lot_number(lot_number.clone())
            .await
            .map_err(storage_failure("lots: check lot number"))?;
        if existing.is_some() {
            return Err(BookingError::Validation(format!(
                "lot number {lot_number} is already registered"
            )));
        }

        let status = derive_lot_status(model.quantity, model.expiry_date, today);
        let lot = self
            .lot_repository
            .create(InsertVaccineLotEntity {
                vaccine_id: model.vaccine_id,
                lot_number,
                quantity: model.quantity,
                remaining_quantity: model.quantity,
                manufacturing_date: model.manufacturing_date,
                expiry_date: model.expiry_date,
                supplier: model.supplier,
                status: status.as_str().to_string(),
            })
            .await
            .map_err(storage_failure("lots: create lot"))?;

        info!(
            lot_id = %lot.id,
            lot_number = %lot.lot_number,
            quantity = lot.quantity,
            "lots: lot registered"
        );
        Ok(lot)
    }

    /// Brings every stored status in line with expiry and stock as of `today`.
    pub async fn sweep_statuses(&self, today: NaiveDate) -> UseCaseResult<LotSweepReport> {
        let lots = self.list_lots().await?;
        let mut report = LotSweepReport {
            scanned: lots.len(),
            ..Default::default()
        };

        for lot in lots {
            let derived = lot.derived_status(today);
            if derived.as_str() == lot.status {
                continue;
            }

            self.lot_repository
                .update_status(lot.id, derived.as_str().to_string())
                .await
                .map_err(storage_failure("lots: update lot status"))?;

            match derived {
                VaccineLotStatus::Expired => report.expired += 1,
                VaccineLotStatus::Depleted => report.depleted += 1,
                VaccineLotStatus::Available => report.restored += 1,
            }
            info!(
                lot_id = %lot.id,
                from = %lot.status,
                to = %derived,
                "lots: status corrected"
            );
        }

        Ok(report)
    }

    pub async fn warnings(
        &self,
        today: NaiveDate,
        expiry_window_days: i64,
        low_stock_threshold: i32,
    ) -> UseCaseResult<Vec<LotWarningDto>> {
        let lots = self.list_lots().await?;
        let mut warnings = Vec::new();

        for lot in lots {
            if lot.derived_status(today) != VaccineLotStatus::Available {
                continue;
            }
            let days_until_expiry = (lot.expiry_date - today).num_days();
            if days_until_expiry <= expiry_window_days {
                warnings.push(LotWarningDto {
                    kind: LotWarningKind::ExpiringSoon,
                    lot: lot.clone().into(),
                    days_until_expiry,
                });
            }
            if lot.remaining_quantity <= low_stock_threshold {
                warnings.push(LotWarningDto {
                    kind: LotWarningKind::LowStock,
                    lot: lot.into(),
                    days_until_expiry,
                });
            }
        }

        if !warnings.is_empty() {
            warn!(warning_count = warnings.len(), "lots: stock warnings raised");
        }
        Ok(warnings)
    }
}
