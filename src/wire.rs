// JSON schemas for the booking backend and conversion into domain types
// Records that fail validation are dropped with a warning instead of
// leaking half-parsed values into availability arithmetic.

use crate::models::{Accommodation, AccommodationId, DateBlock, RoomScope};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, PartialEq)]
pub enum WireError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid decimal in {field}: {value}")]
    InvalidDecimal { field: &'static str, value: String },

    #[error("Value out of range for {field}: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}

// Decimal columns come back either as JSON numbers or as strings ("120.00")
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WireDecimal {
    Number(f64),
    Text(String),
}

impl WireDecimal {
    fn parse(&self, field: &'static str) -> Result<Option<f64>, WireError> {
        let value = match self {
            WireDecimal::Number(value) => *value,
            WireDecimal::Text(text) if text.trim().is_empty() => return Ok(None),
            WireDecimal::Text(text) => {
                text.trim()
                    .parse::<f64>()
                    .map_err(|_| WireError::InvalidDecimal {
                        field,
                        value: text.clone(),
                    })?
            }
        };

        if value.is_finite() {
            Ok(Some(value))
        } else {
            Err(WireError::InvalidDecimal {
                field,
                value: value.to_string(),
            })
        }
    }
}

fn parse_decimal(
    value: &Option<WireDecimal>,
    field: &'static str,
) -> Result<Option<f64>, WireError> {
    match value {
        Some(decimal) => decimal.parse(field),
        None => Ok(None),
    }
}

// `blocked_date` is an ISO date-time; only the YYYY-MM-DD prefix matters
pub fn parse_block_date(raw: &str) -> Result<NaiveDate, WireError> {
    let day = raw
        .get(..10)
        .ok_or_else(|| WireError::InvalidDate(raw.to_string()))?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| WireError::InvalidDate(raw.to_string()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

// GET /accommodations
#[derive(Debug, Deserialize, Serialize)]
pub struct AccommodationsResponse {
    #[serde(default)]
    pub data: Vec<AccommodationRecord>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AccommodationRecord {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub rooms: Option<i64>,
    #[serde(default, alias = "defaultAdultPrice")]
    pub default_adult_price: Option<WireDecimal>,
    #[serde(default, alias = "defaultChildPrice")]
    pub default_child_price: Option<WireDecimal>,
}

impl TryFrom<AccommodationRecord> for Accommodation {
    type Error = WireError;

    fn try_from(item: AccommodationRecord) -> Result<Self, Self::Error> {
        let rooms = item.rooms.ok_or(WireError::MissingField("rooms"))?;
        let rooms = u32::try_from(rooms).map_err(|_| WireError::OutOfRange {
            field: "rooms",
            value: rooms,
        })?;

        Ok(Accommodation {
            id: item.id,
            name: item.name,
            kind: item.kind,
            rooms,
            default_adult_price: parse_decimal(&item.default_adult_price, "default_adult_price")?,
            default_child_price: parse_decimal(&item.default_child_price, "default_child_price")?,
        })
    }
}

// GET /blocked-dates
#[derive(Debug, Deserialize, Serialize)]
pub struct BlockedDatesResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<BlockedDateRecord>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockedDateRecord {
    pub id: i64,
    #[serde(default)]
    pub accommodation_id: Option<AccommodationId>,
    pub blocked_date: String,
    #[serde(default)]
    pub room_number: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub adult_price: Option<WireDecimal>,
    #[serde(default)]
    pub child_price: Option<WireDecimal>,
}

impl TryFrom<BlockedDateRecord> for DateBlock {
    type Error = WireError;

    fn try_from(item: BlockedDateRecord) -> Result<Self, Self::Error> {
        let accommodation_id = item
            .accommodation_id
            .ok_or(WireError::MissingField("accommodation_id"))?;

        let room_scope = match item.room_number {
            None => RoomScope::WholeProperty,
            Some(room) if room >= 1 && room <= u32::MAX as i64 => RoomScope::Room(room as u32),
            Some(room) => {
                return Err(WireError::OutOfRange {
                    field: "room_number",
                    value: room,
                })
            }
        };

        Ok(DateBlock {
            id: item.id,
            accommodation_id,
            date: parse_block_date(&item.blocked_date)?,
            room_scope,
            reason: item.reason,
            adult_price: parse_decimal(&item.adult_price, "adult_price")?,
            child_price: parse_decimal(&item.child_price, "child_price")?,
        })
    }
}

// GET /bookings/room-occupancy
#[derive(Debug, Deserialize, Serialize)]
pub struct OccupancyResponse {
    pub total_rooms: Option<i64>,
}

impl OccupancyResponse {
    pub fn booked_rooms(&self) -> Result<u32, WireError> {
        let total = self.total_rooms.ok_or(WireError::MissingField("total_rooms"))?;
        u32::try_from(total).map_err(|_| WireError::OutOfRange {
            field: "total_rooms",
            value: total,
        })
    }
}

// POST /blocked-dates and PUT /blocked-dates/{id}
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BlockPayload {
    pub dates: Vec<String>,
    pub reason: Option<String>,
    pub accommodation_id: AccommodationId,
    pub room_number: Option<u32>,
    pub adult_price: Option<f64>,
    pub child_price: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BlockWriteResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<BlockedDateRecord>,
    #[serde(default)]
    pub message: Option<String>,
}

// DELETE /blocked-dates/{id}
#[derive(Debug, Deserialize, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

// Generic error body the backend sends with non-2xx statuses
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

pub fn decode_accommodations(records: Vec<AccommodationRecord>) -> Vec<Accommodation> {
    records
        .into_iter()
        .filter_map(|record| {
            let id = record.id;
            match Accommodation::try_from(record) {
                Ok(accommodation) => Some(accommodation),
                Err(e) => {
                    warn!(accommodation_id = id, error = %e, "Dropping malformed accommodation");
                    None
                }
            }
        })
        .collect()
}

pub fn decode_blocks(records: Vec<BlockedDateRecord>) -> Vec<DateBlock> {
    records
        .into_iter()
        .filter_map(|record| {
            let id = record.id;
            match DateBlock::try_from(record) {
                Ok(block) => Some(block),
                Err(e) => {
                    warn!(block_id = id, error = %e, "Dropping malformed blocked date");
                    None
                }
            }
        })
        .collect()
}
