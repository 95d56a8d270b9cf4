// Availability and pricing aggregation
// Combines room inventory, operator blocks and live booking occupancy into a
// per-date free-room count. Everything except `compute_availability` is pure
// and works on borrowed snapshots of the block collection.

use crate::api::{ApiError, ReservationApi};
use crate::models::{
    Accommodation, AccommodationId, DateBlock, DateClassification, GuestPricing, RoomScope,
};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum AvailabilityError {
    #[error("Accommodation {0} not found")]
    NotFound(AccommodationId),

    #[error("Date {0} is in the past")]
    PastDate(NaiveDate),

    #[error("Occupancy lookup failed: {0}")]
    Occupancy(#[from] ApiError),
}

// What to do when the occupancy service cannot answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyPolicy {
    // Treat unknown occupancy as zero booked rooms; may overstate availability
    FailOpen,
    // Surface the lookup error to the caller
    FailClosed,
}

impl Default for OccupancyPolicy {
    fn default() -> Self {
        OccupancyPolicy::FailOpen
    }
}

// How to treat room blocks whose index exceeds the accommodation's room count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomIndexPolicy {
    Ignore,
    Count,
}

impl Default for RoomIndexPolicy {
    fn default() -> Self {
        RoomIndexPolicy::Ignore
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AvailabilityOptions {
    pub occupancy: OccupancyPolicy,
    pub room_index: RoomIndexPolicy,
}

// Outcome of scanning the blocks for one accommodation/date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTally {
    WholeProperty,
    Rooms(u32),
}

pub fn blocks_for<'a>(
    blocks: &'a [DateBlock],
    accommodation_id: AccommodationId,
    date: NaiveDate,
) -> impl Iterator<Item = &'a DateBlock> + 'a {
    blocks
        .iter()
        .filter(move |block| block.applies_to(accommodation_id, date))
}

pub fn find_accommodation(
    accommodations: &[Accommodation],
    accommodation_id: AccommodationId,
) -> Option<&Accommodation> {
    accommodations
        .iter()
        .find(|accommodation| accommodation.id == accommodation_id)
}

pub fn tally_blocks(
    accommodation: &Accommodation,
    blocks: &[DateBlock],
    date: NaiveDate,
    policy: RoomIndexPolicy,
) -> BlockTally {
    let mut rooms = BTreeSet::new();

    for block in blocks_for(blocks, accommodation.id, date) {
        if block.blocks_whole_property() {
            return BlockTally::WholeProperty;
        }

        if let Some(room) = block.blocked_room() {
            if room > accommodation.rooms && policy == RoomIndexPolicy::Ignore {
                warn!(
                    block_id = block.id,
                    room,
                    rooms = accommodation.rooms,
                    "Ignoring block for a room beyond the current inventory"
                );
                continue;
            }
            // Duplicate blocks for the same room count once
            rooms.insert(room);
        }
    }

    BlockTally::Rooms(rooms.len() as u32)
}

// Never negative, never above `total_rooms`
pub fn available_rooms(total_rooms: u32, blocked_rooms: u32, booked_rooms: u32) -> u32 {
    total_rooms
        .saturating_sub(blocked_rooms)
        .saturating_sub(booked_rooms)
}

pub async fn compute_availability<A>(
    api: &A,
    accommodations: &[Accommodation],
    blocks: &[DateBlock],
    accommodation_id: AccommodationId,
    date: NaiveDate,
    today: NaiveDate,
    options: AvailabilityOptions,
) -> Result<u32, AvailabilityError>
where
    A: ReservationApi + ?Sized,
{
    if date < today {
        return Err(AvailabilityError::PastDate(date));
    }

    let accommodation = find_accommodation(accommodations, accommodation_id)
        .ok_or(AvailabilityError::NotFound(accommodation_id))?;

    let blocked_rooms = match tally_blocks(accommodation, blocks, date, options.room_index) {
        BlockTally::WholeProperty => {
            debug!(accommodation_id, %date, "Whole property blocked");
            return Ok(0);
        }
        BlockTally::Rooms(count) => count,
    };

    let booked_rooms = match api.fetch_occupancy(accommodation_id, date).await {
        Ok(booked) => booked,
        Err(e) => match options.occupancy {
            OccupancyPolicy::FailOpen => {
                warn!(accommodation_id, %date, error = %e, "Occupancy unavailable, assuming no bookings");
                0
            }
            OccupancyPolicy::FailClosed => return Err(AvailabilityError::Occupancy(e)),
        },
    };

    let available = available_rooms(accommodation.rooms, blocked_rooms, booked_rooms);
    debug!(
        accommodation_id,
        %date,
        total = accommodation.rooms,
        blocked = blocked_rooms,
        booked = booked_rooms,
        available,
        "Computed availability"
    );
    Ok(available)
}

pub fn classify_date(
    blocks: &[DateBlock],
    accommodation_id: AccommodationId,
    date: NaiveDate,
) -> DateClassification {
    let mut flags = DateClassification::default();

    for block in blocks_for(blocks, accommodation_id, date) {
        flags.fully_blocked |= block.blocks_whole_property();
        flags.partially_blocked |=
            matches!(block.room_scope, RoomScope::Room(_)) || block.has_reason();
        flags.has_price_override |= block.has_price_override();
        flags.has_reason |= block.has_reason();
    }

    if flags.fully_blocked {
        flags.partially_blocked = false;
    }
    flags
}

// Every day of the month, in order
pub fn classify_month(
    blocks: &[DateBlock],
    accommodation_id: AccommodationId,
    year: i32,
    month: u32,
) -> Vec<(NaiveDate, DateClassification)> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };

    first
        .iter_days()
        .take_while(|date| date.month() == month && date.year() == year)
        .map(|date| (date, classify_date(blocks, accommodation_id, date)))
        .collect()
}

// Latest override (highest id) for the given scope, field by field
fn scoped_override(
    blocks: &[DateBlock],
    accommodation_id: AccommodationId,
    date: NaiveDate,
    scope: RoomScope,
) -> GuestPricing {
    let mut matching: Vec<&DateBlock> = blocks_for(blocks, accommodation_id, date)
        .filter(|block| block.room_scope == scope && block.has_price_override())
        .collect();
    matching.sort_by_key(|block| std::cmp::Reverse(block.id));

    matching
        .into_iter()
        .fold(GuestPricing::default(), |pricing, block| {
            pricing.or(GuestPricing {
                adult: block.adult_price,
                child: block.child_price,
            })
        })
}

// Whole-property override, then accommodation defaults
pub fn effective_pricing(
    accommodation: &Accommodation,
    blocks: &[DateBlock],
    date: NaiveDate,
) -> GuestPricing {
    scoped_override(blocks, accommodation.id, date, RoomScope::WholeProperty)
        .or(accommodation.default_pricing())
}

// Room override, then whole-property override, then accommodation defaults
pub fn effective_room_pricing(
    accommodation: &Accommodation,
    blocks: &[DateBlock],
    date: NaiveDate,
    room: u32,
) -> GuestPricing {
    scoped_override(blocks, accommodation.id, date, RoomScope::Room(room))
        .or(effective_pricing(accommodation, blocks, date))
}

// Options for the room selector; empty hides or disables it
pub fn room_choices(accommodation: &Accommodation, available: Option<u32>) -> Vec<u32> {
    if !accommodation.has_room_selector() || available == Some(0) {
        return Vec::new();
    }
    (1..=accommodation.rooms).collect()
}
