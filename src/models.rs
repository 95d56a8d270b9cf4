// Domain types for the calendar availability and pricing engine
// Wire formats live in `wire`; everything here is already validated.

use chrono::NaiveDate;
use serde::Serialize;

pub type AccommodationId = i64;
pub type BlockId = i64;

// A bookable property with a fixed room inventory and fallback pricing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accommodation {
    pub id: AccommodationId,
    pub name: String,
    pub kind: String,
    pub rooms: u32,
    pub default_adult_price: Option<f64>,
    pub default_child_price: Option<f64>,
}

impl Accommodation {
    // Room selection only makes sense for multi-room properties
    pub fn has_room_selector(&self) -> bool {
        self.rooms > 1
    }

    pub fn default_pricing(&self) -> GuestPricing {
        GuestPricing {
            adult: self.default_adult_price,
            child: self.default_child_price,
        }
    }
}

/// Which part of an accommodation a block applies to.
///
/// On the wire a whole-property block carries a null `room_number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RoomScope {
    WholeProperty,
    Room(u32),
}

impl Default for RoomScope {
    fn default() -> Self {
        RoomScope::WholeProperty
    }
}

impl RoomScope {
    pub fn from_room_number(room_number: Option<u32>) -> Self {
        match room_number {
            Some(room) => RoomScope::Room(room),
            None => RoomScope::WholeProperty,
        }
    }

    pub fn room_number(&self) -> Option<u32> {
        match self {
            RoomScope::WholeProperty => None,
            RoomScope::Room(room) => Some(*room),
        }
    }
}

// Operator-created record: an availability block, a price override, or both
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateBlock {
    pub id: BlockId,
    pub accommodation_id: AccommodationId,
    pub date: NaiveDate,
    pub room_scope: RoomScope,
    pub reason: Option<String>,
    pub adult_price: Option<f64>,
    pub child_price: Option<f64>,
}

impl DateBlock {
    pub fn applies_to(&self, accommodation_id: AccommodationId, date: NaiveDate) -> bool {
        self.accommodation_id == accommodation_id && self.date == date
    }

    // A whitespace-only reason counts as no reason
    pub fn has_reason(&self) -> bool {
        self.reason
            .as_deref()
            .map_or(false, |reason| !reason.trim().is_empty())
    }

    pub fn has_price_override(&self) -> bool {
        self.adult_price.is_some() || self.child_price.is_some()
    }

    pub fn blocks_whole_property(&self) -> bool {
        self.room_scope == RoomScope::WholeProperty && self.has_reason()
    }

    pub fn blocked_room(&self) -> Option<u32> {
        if self.has_reason() {
            self.room_scope.room_number()
        } else {
            None
        }
    }
}

// Adult/child price pair; `None` means no price is configured at all
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GuestPricing {
    pub adult: Option<f64>,
    pub child: Option<f64>,
}

impl GuestPricing {
    // Field-wise fallback: keep our value where set, otherwise take `other`'s
    pub fn or(self, other: GuestPricing) -> GuestPricing {
        GuestPricing {
            adult: self.adult.or(other.adult),
            child: self.child.or(other.child),
        }
    }
}

/// Calendar rendering flags for one accommodation/date.
///
/// The flags may overlap in the underlying data; `cell_state` applies the
/// rendering precedence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateClassification {
    pub fully_blocked: bool,
    pub partially_blocked: bool,
    pub has_price_override: bool,
    pub has_reason: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CellState {
    FullyBlocked,
    PartiallyBlocked,
    PriceOverride,
    Default,
}

impl DateClassification {
    pub fn cell_state(&self) -> CellState {
        if self.fully_blocked {
            CellState::FullyBlocked
        } else if self.partially_blocked || self.has_reason {
            CellState::PartiallyBlocked
        } else if self.has_price_override {
            CellState::PriceOverride
        } else {
            CellState::Default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn block(room_scope: RoomScope, reason: Option<&str>, adult_price: Option<f64>) -> DateBlock {
        DateBlock {
            id: 1,
            accommodation_id: 7,
            date: NaiveDate::from_ymd_opt(2099, 6, 1).unwrap(),
            room_scope,
            reason: reason.map(str::to_string),
            adult_price,
            child_price: None,
        }
    }

    #[test_case(Some("maintenance"), true; "text reason")]
    #[test_case(Some("   "), false; "whitespace reason")]
    #[test_case(Some(""), false; "empty reason")]
    #[test_case(None, false; "missing reason")]
    fn test_has_reason(reason: Option<&str>, expected: bool) {
        assert_eq!(block(RoomScope::WholeProperty, reason, None).has_reason(), expected);
    }

    #[test]
    fn test_pricing_only_block_blocks_nothing() {
        let override_only = block(RoomScope::Room(2), None, Some(80.0));
        assert!(override_only.has_price_override());
        assert_eq!(override_only.blocked_room(), None);
        assert!(!override_only.blocks_whole_property());

        let closure = block(RoomScope::WholeProperty, Some("festival"), None);
        assert!(closure.blocks_whole_property());
        assert_eq!(closure.blocked_room(), None);
    }

    #[test]
    fn test_cell_state_precedence() {
        let everything = DateClassification {
            fully_blocked: true,
            partially_blocked: true,
            has_price_override: true,
            has_reason: true,
        };
        assert_eq!(everything.cell_state(), CellState::FullyBlocked);

        let priced_room = DateClassification {
            partially_blocked: true,
            has_price_override: true,
            ..Default::default()
        };
        assert_eq!(priced_room.cell_state(), CellState::PartiallyBlocked);

        let priced = DateClassification {
            has_price_override: true,
            ..Default::default()
        };
        assert_eq!(priced.cell_state(), CellState::PriceOverride);
        assert_eq!(DateClassification::default().cell_state(), CellState::Default);
    }

    #[test]
    fn test_pricing_fallback_is_field_wise() {
        let override_pricing = GuestPricing {
            adult: Some(120.0),
            child: None,
        };
        let defaults = GuestPricing {
            adult: Some(100.0),
            child: Some(50.0),
        };
        assert_eq!(
            override_pricing.or(defaults),
            GuestPricing {
                adult: Some(120.0),
                child: Some(50.0)
            }
        );
    }
}
