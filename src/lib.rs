// Availability and pricing engine behind the resort admin calendar

pub mod api;
pub mod availability;
pub mod calendar;
pub mod models;
pub mod selection;
pub mod wire;

// Re-export key types for convenience
pub use api::{ApiError, ClientConfig, ClientError, HttpReservationApi, ReservationApi};
pub use availability::{AvailabilityError, AvailabilityOptions, OccupancyPolicy, RoomIndexPolicy};
pub use calendar::{
    CalendarConfig, CalendarController, CalendarError, CalendarState, Clock, DateOutcome,
    FixedClock, Notice, SystemClock,
};
pub use models::{
    Accommodation, AccommodationId, BlockId, CellState, DateBlock, DateClassification,
    GuestPricing, RoomScope,
};
pub use selection::{BlockForm, Selection, ValidationError};
