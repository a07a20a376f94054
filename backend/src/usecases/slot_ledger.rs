use std::{collections::VecDeque, sync::Arc};

use chrono::{Local, NaiveDate};
use crates::domain::{
    entities::appointment_slots::{AppointmentSlotEntity, InsertAppointmentSlotEntity},
    repositories::appointment_slots::AppointmentSlotRepository,
    value_objects::{
        actors::ActorContext,
        enums::roles::Role,
        slots::{AvailableSlotsQuery, CreateSlotModel, SlotCursor},
    },
};
use futures_util::{Stream, StreamExt, TryStreamExt, stream};
use tracing::{info, warn};
use uuid::Uuid;

use super::errors::{BookingError, UseCaseResult, storage_failure};

pub const SLOT_PAGE_SIZE: i64 = 50;
pub const DEFAULT_SLOT_LIMIT: usize = 20;
pub const MAX_SLOT_LIMIT: usize = 100;

struct PageState {
    after: Option<SlotCursor>,
    buffer: VecDeque<AppointmentSlotEntity>,
    exhausted: bool,
}

pub struct SlotPage {
    pub slots: Vec<AppointmentSlotEntity>,
    pub next: Option<SlotCursor>,
}

/// Capacity bookkeeping for appointment slots. Every counter change is a single
/// conditional update in storage, so concurrent callers can never overbook.
pub struct SlotLedger {
    slot_repository: Arc<dyn AppointmentSlotRepository + Send + Sync>,
    page_size: i64,
}

impl SlotLedger {
    pub fn new(slot_repository: Arc<dyn AppointmentSlotRepository + Send + Sync>) -> Self {
        Self {
            slot_repository,
            page_size: SLOT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn find_slot(&self, slot_id: Uuid) -> UseCaseResult<AppointmentSlotEntity> {
        self.slot_repository
            .find_by_id(slot_id)
            .await
            .map_err(storage_failure("slots: load slot"))?
            .ok_or(BookingError::NotFound("slot"))
    }

    pub async fn reserve(&self, slot_id: Uuid) -> UseCaseResult<AppointmentSlotEntity> {
        let reserved = self
            .slot_repository
            .try_reserve(slot_id)
            .await
            .map_err(storage_failure("slots: reserve seat"))?;

        match reserved {
            Some(slot) => {
                info!(
                    %slot_id,
                    current_bookings = slot.current_bookings,
                    max_capacity = slot.max_capacity,
                    "slots: seat reserved"
                );
                Ok(slot)
            }
            None => {
                // Distinguish a missing slot from a full one.
                self.find_slot(slot_id).await?;
                warn!(%slot_id, "slots: reservation rejected, slot full");
                Err(BookingError::SlotFull(slot_id))
            }
        }
    }

    pub async fn release(&self, slot_id: Uuid) -> UseCaseResult<AppointmentSlotEntity> {
        let released = self
            .slot_repository
            .release(slot_id)
            .await
            .map_err(storage_failure("slots: release seat"))?
            .ok_or(BookingError::NotFound("slot"))?;

        info!(
            %slot_id,
            current_bookings = released.current_bookings,
            "slots: seat released"
        );
        Ok(released)
    }

    /// Open slots of a center between `from` and `to`, ordered by date, start time and
    /// id. Pages are pulled lazily as the stream is consumed; slots that already
    /// started are never yielded.
    pub fn find_available(
        &self,
        center_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        after: Option<SlotCursor>,
    ) -> impl Stream<Item = UseCaseResult<AppointmentSlotEntity>> + Send {
        let repository = Arc::clone(&self.slot_repository);
        let page_size = self.page_size;
        let now = Local::now().naive_local();
        let from = from.max(now.date());

        let state = PageState {
            after,
            buffer: VecDeque::new(),
            exhausted: from > to,
        };

        stream::unfold(state, move |mut state| {
            let repository = Arc::clone(&repository);
            async move {
                if state.buffer.is_empty() && !state.exhausted {
                    match repository
                        .list_available_page(center_id, from, to, state.after, page_size)
                        .await
                    {
                        Ok(page) => {
                            state.exhausted = (page.len() as i64) < page_size;
                            state.buffer.extend(page);
                        }
                        Err(err) => {
                            state.exhausted = true;
                            let err = storage_failure("slots: list available page")(err);
                            return Some((Err(err), state));
                        }
                    }
                }

                let slot = state.buffer.pop_front()?;
                state.after = Some(SlotCursor::from(&slot));
                Some((Ok(slot), state))
            }
        })
        .try_filter(move |slot| std::future::ready(slot.starts_at() > now))
    }

    pub async fn available_page(&self, query: AvailableSlotsQuery) -> UseCaseResult<SlotPage> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_SLOT_LIMIT)
            .clamp(1, MAX_SLOT_LIMIT);

        let slots: Vec<AppointmentSlotEntity> = self
            .find_available(query.center_id, query.from, query.to, query.cursor())
            .take(limit)
            .try_collect()
            .await?;

        let next = if slots.len() == limit {
            slots.last().map(SlotCursor::from)
        } else {
            None
        };

        info!(
            center_id = %query.center_id,
            slot_count = slots.len(),
            "slots: available page served"
        );
        Ok(SlotPage { slots, next })
    }

    pub async fn create_slot(
        &self,
        actor: &ActorContext,
        model: CreateSlotModel,
    ) -> UseCaseResult<AppointmentSlotEntity> {
        if actor.role != Role::Admin {
            return Err(BookingError::Forbidden("only admins create slots".to_string()));
        }
        if model.max_capacity <= 0 {
            return Err(BookingError::Validation(
                "max_capacity must be positive".to_string(),
            ));
        }
        if model.end_time <= model.start_time {
            return Err(BookingError::Validation(
                "end_time must be after start_time".to_string(),
            ));
        }
        if model.slot_date.and_time(model.start_time) <= Local::now().naive_local() {
            return Err(BookingError::Validation(
                "slots must start in the future".to_string(),
            ));
        }

        let same_day = self
            .slot_repository
            .list_for_center_on(model.center_id, model.slot_date)
            .await
            .map_err(storage_failure("slots: list center slots"))?;
        let clash = same_day.iter().any(|slot| {
            slot.room_id == model.room_id
                && slot.overlaps(model.slot_date, model.start_time, model.end_time)
        });
        if clash {
            return Err(BookingError::Validation(
                "slot overlaps an existing slot of the same room".to_string(),
            ));
        }

        let slot = self
            .slot_repository
            .create(InsertAppointmentSlotEntity {
                center_id: model.center_id,
                room_id: model.room_id,
                slot_date: model.slot_date,
                start_time: model.start_time,
                end_time: model.end_time,
                max_capacity: model.max_capacity,
                current_bookings: 0,
                is_available: true,
            })
            .await
            .map_err(storage_failure("slots: create slot"))?;

        info!(slot_id = %slot.id, center_id = %slot.center_id, "slots: slot created");
        Ok(slot)
    }
}
