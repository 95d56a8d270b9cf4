// Calendar controller: owns the block collection and the operator's selection
// All mutation of the shared state happens through this type. Locks are
// never held across an await; network calls work on cloned snapshots.

use crate::api::{ApiError, ReservationApi};
use crate::availability::{
    self, find_accommodation, AvailabilityError, AvailabilityOptions, OccupancyPolicy,
    RoomIndexPolicy,
};
use crate::models::{
    Accommodation, AccommodationId, BlockId, DateBlock, DateClassification, GuestPricing,
};
use crate::selection::{BlockForm, Selection, ValidatedBlock, ValidationError};
use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Date {0} is in the past")]
    PastDate(NaiveDate),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("Result discarded: a newer availability request was issued")]
    Superseded,

    #[error("No block form is open")]
    NoSelection,
}

impl From<AvailabilityError> for CalendarError {
    fn from(e: AvailabilityError) -> Self {
        match e {
            AvailabilityError::NotFound(id) => CalendarError::NotFound(format!("accommodation {}", id)),
            AvailabilityError::PastDate(date) => CalendarError::PastDate(date),
            AvailabilityError::Occupancy(e) => CalendarError::Api(e),
        }
    }
}

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

// Local calendar day of the machine running the dashboard
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct CalendarConfig {
    pub occupancy_policy: OccupancyPolicy,
    pub room_index_policy: RoomIndexPolicy,
    pub success_notice_ttl: Duration,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            occupancy_policy: OccupancyPolicy::FailOpen,
            room_index_policy: RoomIndexPolicy::Ignore,
            success_notice_ttl: Duration::from_secs(3),
        }
    }
}

impl CalendarConfig {
    fn availability_options(&self) -> AvailabilityOptions {
        AvailabilityOptions {
            occupancy: self.occupancy_policy,
            room_index: self.room_index_policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

#[derive(Debug, Clone)]
struct RaisedNotice {
    notice: Notice,
    raised_at: Instant,
}

#[derive(Debug, Default)]
pub struct CalendarState {
    pub accommodations: Vec<Accommodation>,
    pub blocks: Vec<DateBlock>,
    pub selection: Option<Selection>,
    notice: Option<RaisedNotice>,
}

impl CalendarState {
    pub fn new(accommodations: Vec<Accommodation>, blocks: Vec<DateBlock>) -> Self {
        Self {
            accommodations,
            blocks,
            ..Default::default()
        }
    }
}

// Result of writing one date of a (possibly multi-date) save
#[derive(Debug)]
pub struct DateOutcome {
    pub date: NaiveDate,
    pub result: Result<Option<DateBlock>, ApiError>,
}

impl DateOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub fn failed_dates(outcomes: &[DateOutcome]) -> Vec<NaiveDate> {
    outcomes
        .iter()
        .filter(|outcome| !outcome.is_success())
        .map(|outcome| outcome.date)
        .collect()
}

pub struct CalendarController<A: ReservationApi> {
    api: A,
    config: CalendarConfig,
    clock: Box<dyn Clock>,
    state: Mutex<CalendarState>,
    generation: AtomicU64,
}

impl<A: ReservationApi> CalendarController<A> {
    pub fn new(api: A, state: CalendarState, config: CalendarConfig) -> Self {
        Self {
            api,
            config,
            clock: Box::new(SystemClock),
            state: Mutex::new(state),
            generation: AtomicU64::new(0),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn accommodations(&self) -> Vec<Accommodation> {
        self.state.lock().accommodations.clone()
    }

    pub fn blocks(&self) -> Vec<DateBlock> {
        self.state.lock().blocks.clone()
    }

    pub fn selection(&self) -> Option<Selection> {
        self.state.lock().selection.clone()
    }

    // Success notices clear themselves; errors stay until dismissed
    pub fn notice(&self) -> Option<Notice> {
        let mut state = self.state.lock();
        let expired = matches!(
            &state.notice,
            Some(RaisedNotice { notice: Notice::Success(_), raised_at })
                if raised_at.elapsed() >= self.config.success_notice_ttl
        );
        if expired {
            state.notice = None;
        }
        state.notice.as_ref().map(|raised| raised.notice.clone())
    }

    pub fn dismiss_notice(&self) {
        self.state.lock().notice = None;
    }

    fn raise(&self, notice: Notice) {
        self.state.lock().notice = Some(RaisedNotice {
            notice,
            raised_at: Instant::now(),
        });
    }

    fn fail<T>(&self, error: CalendarError) -> Result<T, CalendarError> {
        self.raise(Notice::Error(error.to_string()));
        Err(error)
    }

    // Full reload of accommodations and blocks
    pub async fn refresh(&self) -> Result<(), CalendarError> {
        let loaded = futures::try_join!(self.api.fetch_accommodations(), self.api.fetch_blocks());
        match loaded {
            Ok((accommodations, blocks)) => {
                info!(
                    accommodations = accommodations.len(),
                    blocks = blocks.len(),
                    "Calendar refreshed"
                );
                let mut state = self.state.lock();
                state.accommodations = accommodations;
                state.blocks = blocks;
                Ok(())
            }
            Err(e) => self.fail(e.into()),
        }
    }

    pub async fn refresh_blocks(&self) -> Result<(), CalendarError> {
        match self.api.fetch_blocks().await {
            Ok(blocks) => {
                self.state.lock().blocks = blocks;
                Ok(())
            }
            Err(e) => self.fail(e.into()),
        }
    }

    pub fn classify_date(
        &self,
        accommodation_id: AccommodationId,
        date: NaiveDate,
    ) -> DateClassification {
        availability::classify_date(&self.state.lock().blocks, accommodation_id, date)
    }

    pub fn classify_month(
        &self,
        accommodation_id: AccommodationId,
        year: i32,
        month: u32,
    ) -> Vec<(NaiveDate, DateClassification)> {
        availability::classify_month(&self.state.lock().blocks, accommodation_id, year, month)
    }

    pub fn effective_pricing(
        &self,
        accommodation_id: AccommodationId,
        date: NaiveDate,
        room: Option<u32>,
    ) -> Result<GuestPricing, CalendarError> {
        let state = self.state.lock();
        let accommodation = find_accommodation(&state.accommodations, accommodation_id)
            .ok_or_else(|| CalendarError::NotFound(format!("accommodation {}", accommodation_id)))?;
        Ok(match room {
            Some(room) => {
                availability::effective_room_pricing(accommodation, &state.blocks, date, room)
            }
            None => availability::effective_pricing(accommodation, &state.blocks, date),
        })
    }

    /// Free rooms for an accommodation/date.
    ///
    /// Each call takes a new generation token. When a later call was issued
    /// before this one resolved, the result is discarded with `Superseded` and
    /// the selection keeps the newer value.
    pub async fn compute_availability(
        &self,
        accommodation_id: AccommodationId,
        date: NaiveDate,
    ) -> Result<u32, CalendarError> {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (accommodations, blocks) = {
            let state = self.state.lock();
            (state.accommodations.clone(), state.blocks.clone())
        };

        let result = availability::compute_availability(
            &self.api,
            &accommodations,
            &blocks,
            accommodation_id,
            date,
            self.today(),
            self.config.availability_options(),
        )
        .await;

        if self.generation.load(Ordering::SeqCst) != token {
            warn!(accommodation_id, %date, token, "Discarding superseded availability result");
            return Err(CalendarError::Superseded);
        }

        let available = match result {
            Ok(available) => available,
            Err(e) => return self.fail(e.into()),
        };
        let mut state = self.state.lock();
        if let Some(selection) = state.selection.as_mut() {
            if selection.accommodation_id == Some(accommodation_id) {
                selection.available_rooms = Some(available);
            }
        }
        Ok(available)
    }

    pub fn open_form(&self, accommodation_id: Option<AccommodationId>) {
        self.state.lock().selection = Some(Selection::new(accommodation_id));
    }

    pub fn open_block_for_edit(&self, block_id: BlockId) -> Result<(), CalendarError> {
        let mut state = self.state.lock();
        let block = state
            .blocks
            .iter()
            .find(|block| block.id == block_id)
            .ok_or_else(|| CalendarError::NotFound(format!("blocked date {}", block_id)))?;
        if block.date < self.today() {
            return Err(CalendarError::Validation(ValidationError::PastDate(block.date)));
        }
        let selection = Selection::for_block(block);
        state.selection = Some(selection);
        Ok(())
    }

    pub fn select_accommodation(&self, accommodation_id: AccommodationId) -> Result<(), CalendarError> {
        let mut state = self.state.lock();
        let selection = state.selection.as_mut().ok_or(CalendarError::NoSelection)?;
        selection.select_accommodation(accommodation_id)?;
        Ok(())
    }

    pub fn toggle_date(&self, date: NaiveDate) -> Result<bool, CalendarError> {
        let today = self.today();
        let mut state = self.state.lock();
        let selection = state.selection.as_mut().ok_or(CalendarError::NoSelection)?;
        Ok(selection.toggle_date(date, today)?)
    }

    pub fn update_form(&self, edit: impl FnOnce(&mut BlockForm)) -> Result<(), CalendarError> {
        let mut state = self.state.lock();
        let selection = state.selection.as_mut().ok_or(CalendarError::NoSelection)?;
        edit(&mut selection.form);
        Ok(())
    }

    pub fn cancel(&self) {
        self.state.lock().selection = None;
    }

    // Room selector options for the open form
    pub fn room_choices(&self) -> Vec<u32> {
        let state = self.state.lock();
        let Some(selection) = &state.selection else {
            return Vec::new();
        };
        selection
            .accommodation_id
            .and_then(|id| find_accommodation(&state.accommodations, id))
            .map(|accommodation| availability::room_choices(accommodation, selection.available_rooms))
            .unwrap_or_default()
    }

    // Submit the open form; a fully successful save closes it
    pub async fn save_selection(&self) -> Result<Vec<DateOutcome>, CalendarError> {
        let selection = self.selection().ok_or(CalendarError::NoSelection)?;
        let outcomes = self.save_block(&selection).await?;

        if outcomes.iter().all(DateOutcome::is_success) {
            let mut state = self.state.lock();
            if state.selection.as_ref() == Some(&selection) {
                state.selection = None;
            }
        }
        Ok(outcomes)
    }

    /// Validate and write a block for every selected date.
    ///
    /// Validation failures issue no request. Otherwise each date is written
    /// on its own and reported in the returned outcomes; a failure on one
    /// date does not stop the others.
    pub async fn save_block(&self, input: &Selection) -> Result<Vec<DateOutcome>, CalendarError> {
        let validated = {
            let state = self.state.lock();
            input.validate(&state.accommodations, &state.blocks, self.today())
        };
        let validated = match validated {
            Ok(validated) => validated,
            Err(e) => return self.fail(e.into()),
        };

        let outcomes = self.write_dates(&validated).await;
        let failed = failed_dates(&outcomes);
        let succeeded = outcomes.len() - failed.len();

        if succeeded > 0 {
            if let Err(e) = self.refresh_blocks().await {
                warn!(error = %e, "Saved blocks but could not reload the block list");
            }
        }

        if failed.is_empty() {
            info!(
                accommodation_id = validated.accommodation_id,
                dates = succeeded,
                "Blocked dates saved"
            );
            self.raise(Notice::Success(format!("Saved {} date(s)", succeeded)));
        } else {
            let listed: Vec<String> = failed.iter().map(|date| date.to_string()).collect();
            warn!(failed = listed.len(), succeeded, "Blocked dates partially saved");
            self.raise(Notice::Error(format!(
                "Saved {} of {} date(s); failed: {}",
                succeeded,
                outcomes.len(),
                listed.join(", ")
            )));
        }
        Ok(outcomes)
    }

    async fn write_dates(&self, validated: &ValidatedBlock) -> Vec<DateOutcome> {
        let mut outcomes = Vec::with_capacity(validated.dates.len());
        for date in &validated.dates {
            let payload = validated.payload_for(*date);
            let result = match validated.editing {
                Some(id) => self.api.update_block(id, &payload).await,
                None => self.api.create_block(&payload).await,
            };
            if let Err(e) = &result {
                warn!(%date, error = %e, "Failed to save blocked date");
            }
            outcomes.push(DateOutcome {
                date: *date,
                result,
            });
        }
        outcomes
    }

    // Confirmation happens before this is called
    pub async fn remove_block(&self, block_id: BlockId) -> Result<(), CalendarError> {
        if let Err(e) = self.api.delete_block(block_id).await {
            warn!(block_id, error = %e, "Failed to delete blocked date");
            return self.fail(e.into());
        }

        let mut state = self.state.lock();
        state.blocks.retain(|block| block.id != block_id);
        let editing_removed = state
            .selection
            .as_ref()
            .and_then(|selection| selection.editing)
            .map_or(false, |target| target.block_id == block_id);
        if editing_removed {
            state.selection = None;
        }
        drop(state);

        info!(block_id, "Blocked date removed");
        self.raise(Notice::Success("Blocked date removed".to_string()));
        Ok(())
    }
}
