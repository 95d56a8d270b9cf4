// Ephemeral selection state for the block/override form
// Lives from the moment the operator opens the form until cancel or a
// successful save; never persisted.

use crate::models::{Accommodation, AccommodationId, BlockId, DateBlock, RoomScope};
use crate::wire::{format_date, BlockPayload};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Please select an accommodation")]
    MissingAccommodation,

    #[error("Accommodation {0} does not exist")]
    UnknownAccommodation(AccommodationId),

    #[error("Enter a reason or at least one price")]
    EmptyBlock,

    #[error("{field} must not be negative (got {value})")]
    NegativePrice { field: &'static str, value: f64 },

    #[error("Please select at least one date")]
    NoDates,

    #[error("Cannot block or edit past date {0}")]
    PastDate(NaiveDate),

    #[error("Room {room} does not exist (accommodation has {rooms} rooms)")]
    RoomOutOfRange { room: u32, rooms: u32 },

    #[error("The accommodation of an existing block cannot be changed")]
    AccommodationLocked,

    #[error("A block already exists for {date} ({scope:?})")]
    DuplicateBlock { date: NaiveDate, scope: RoomScope },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockForm {
    pub reason: String,
    pub room_scope: RoomScope,
    pub adult_price: Option<f64>,
    pub child_price: Option<f64>,
}

// The existing block an edit session is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditTarget {
    pub block_id: BlockId,
    pub accommodation_id: AccommodationId,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub accommodation_id: Option<AccommodationId>,
    pub dates: BTreeSet<NaiveDate>,
    pub form: BlockForm,
    pub editing: Option<EditTarget>,
    pub available_rooms: Option<u32>,
}

// A form that passed every client-side rule, ready to submit
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBlock {
    pub accommodation_id: AccommodationId,
    pub dates: Vec<NaiveDate>,
    pub room_scope: RoomScope,
    pub reason: Option<String>,
    pub adult_price: Option<f64>,
    pub child_price: Option<f64>,
    pub editing: Option<BlockId>,
}

impl ValidatedBlock {
    pub fn payload_for(&self, date: NaiveDate) -> BlockPayload {
        BlockPayload {
            dates: vec![format_date(date)],
            reason: self.reason.clone(),
            accommodation_id: self.accommodation_id,
            room_number: self.room_scope.room_number(),
            adult_price: self.adult_price,
            child_price: self.child_price,
        }
    }
}

impl Selection {
    pub fn new(accommodation_id: Option<AccommodationId>) -> Self {
        Self {
            accommodation_id,
            ..Default::default()
        }
    }

    // Edit session pre-filled from an existing block; its date is implicit
    pub fn for_block(block: &DateBlock) -> Self {
        Self {
            accommodation_id: Some(block.accommodation_id),
            dates: BTreeSet::from([block.date]),
            form: BlockForm {
                reason: block.reason.clone().unwrap_or_default(),
                room_scope: block.room_scope,
                adult_price: block.adult_price,
                child_price: block.child_price,
            },
            editing: Some(EditTarget {
                block_id: block.id,
                accommodation_id: block.accommodation_id,
                date: block.date,
            }),
            available_rooms: None,
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub fn select_accommodation(
        &mut self,
        accommodation_id: AccommodationId,
    ) -> Result<(), ValidationError> {
        if let Some(target) = &self.editing {
            if target.accommodation_id != accommodation_id {
                return Err(ValidationError::AccommodationLocked);
            }
            return Ok(());
        }

        if self.accommodation_id != Some(accommodation_id) {
            self.accommodation_id = Some(accommodation_id);
            self.form.room_scope = RoomScope::WholeProperty;
            self.available_rooms = None;
        }
        Ok(())
    }

    // Returns whether the date is selected after the toggle
    pub fn toggle_date(&mut self, date: NaiveDate, today: NaiveDate) -> Result<bool, ValidationError> {
        if date < today {
            return Err(ValidationError::PastDate(date));
        }
        if self.dates.remove(&date) {
            Ok(false)
        } else {
            self.dates.insert(date);
            Ok(true)
        }
    }

    pub fn validate(
        &self,
        accommodations: &[Accommodation],
        blocks: &[DateBlock],
        today: NaiveDate,
    ) -> Result<ValidatedBlock, ValidationError> {
        let accommodation_id = self
            .accommodation_id
            .ok_or(ValidationError::MissingAccommodation)?;

        if let Some(target) = &self.editing {
            if target.accommodation_id != accommodation_id {
                return Err(ValidationError::AccommodationLocked);
            }
        }

        let accommodation = accommodations
            .iter()
            .find(|accommodation| accommodation.id == accommodation_id)
            .ok_or(ValidationError::UnknownAccommodation(accommodation_id))?;

        let reason = Some(self.form.reason.trim())
            .filter(|reason| !reason.is_empty())
            .map(str::to_string);
        if reason.is_none() && self.form.adult_price.is_none() && self.form.child_price.is_none() {
            return Err(ValidationError::EmptyBlock);
        }

        for (field, price) in [
            ("adult_price", self.form.adult_price),
            ("child_price", self.form.child_price),
        ] {
            if let Some(value) = price {
                if value < 0.0 || !value.is_finite() {
                    return Err(ValidationError::NegativePrice { field, value });
                }
            }
        }

        let dates: Vec<NaiveDate> = match &self.editing {
            Some(target) => vec![target.date],
            None => self.dates.iter().copied().collect(),
        };
        if dates.is_empty() {
            return Err(ValidationError::NoDates);
        }
        if let Some(past) = dates.iter().find(|date| **date < today) {
            return Err(ValidationError::PastDate(*past));
        }

        // Single-room accommodations are implicitly whole-property
        let room_scope = match self.form.room_scope {
            RoomScope::Room(_) if !accommodation.has_room_selector() => RoomScope::WholeProperty,
            RoomScope::Room(room) if room == 0 || room > accommodation.rooms => {
                return Err(ValidationError::RoomOutOfRange {
                    room,
                    rooms: accommodation.rooms,
                })
            }
            scope => scope,
        };

        // Only two availability blocks on the same scope collide; price
        // overrides may share a date and scope with a block
        let editing = self.editing.map(|target| target.block_id);
        for date in dates.iter().filter(|_| reason.is_some()) {
            let duplicate = blocks.iter().any(|block| {
                block.applies_to(accommodation_id, *date)
                    && block.room_scope == room_scope
                    && block.has_reason()
                    && Some(block.id) != editing
            });
            if duplicate {
                return Err(ValidationError::DuplicateBlock {
                    date: *date,
                    scope: room_scope,
                });
            }
        }

        Ok(ValidatedBlock {
            accommodation_id,
            dates,
            room_scope,
            reason,
            adult_price: self.form.adult_price,
            child_price: self.form.child_price,
            editing,
        })
    }
}
