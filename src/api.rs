// Booking backend client: accommodations, blocked dates and room occupancy
// Every call is a single request; there is no retry or caching layer.

use crate::models::{Accommodation, AccommodationId, BlockId, DateBlock};
use crate::wire::{
    decode_accommodations, decode_blocks, format_date, AccommodationsResponse, BlockPayload,
    BlockWriteResponse, BlockedDatesResponse, DeleteResponse, ErrorBody, OccupancyResponse,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("API error: {status_code} - {message}")]
    ApiResponseError { status_code: u16, message: String },

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            api_token: None,
            timeout_ms: 30_000,
        }
    }
}

impl ClientConfig {
    // RESORT_API_BASE_URL, RESORT_API_TIMEOUT_MS, RESORT_API_TOKEN; unset values keep defaults
    pub fn from_env() -> Result<Self, ClientError> {
        let defaults = Self::default();

        let base_url = std::env::var("RESORT_API_BASE_URL").unwrap_or(defaults.base_url);
        let timeout_ms = match std::env::var("RESORT_API_TIMEOUT_MS") {
            Ok(raw) => raw.parse().map_err(|_| {
                ClientError::ConfigError(format!("RESORT_API_TIMEOUT_MS must be a number: {}", raw))
            })?,
            Err(_) => defaults.timeout_ms,
        };
        let api_token = std::env::var("RESORT_API_TOKEN").ok();

        let config = Self {
            base_url,
            api_token,
            timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ClientError::ConfigError(format!(
                "base_url must be an http(s) URL: {}",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ClientError::ConfigError(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// The external read and write interfaces the calendar depends on
#[async_trait]
pub trait ReservationApi: Send + Sync + 'static {
    async fn fetch_accommodations(&self) -> Result<Vec<Accommodation>, ApiError>;

    async fn fetch_blocks(&self) -> Result<Vec<DateBlock>, ApiError>;

    // Rooms reserved by confirmed bookings checking in on `date`
    async fn fetch_occupancy(
        &self,
        accommodation_id: AccommodationId,
        date: NaiveDate,
    ) -> Result<u32, ApiError>;

    // The backend may omit the persisted record; callers re-fetch the list anyway
    async fn create_block(&self, payload: &BlockPayload) -> Result<Option<DateBlock>, ApiError>;

    async fn update_block(
        &self,
        id: BlockId,
        payload: &BlockPayload,
    ) -> Result<Option<DateBlock>, ApiError>;

    async fn delete_block(&self, id: BlockId) -> Result<(), ApiError>;
}

pub struct HttpReservationApi {
    client: Client,
    config: ClientConfig,
}

impl HttpReservationApi {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self {
            client,
            config: ClientConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.config.timeout_ms)
        } else {
            ApiError::NetworkError(e.to_string())
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T, ApiError> {
        let status = response.status();
        let url = response.url().to_string();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ApiError::NotFound(message));
            }
            return Err(ApiError::ApiResponseError {
                status_code: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            warn!(url = %url, error = %e, "Rejecting malformed response body");
            ApiError::MalformedPayload(e.to_string())
        })
    }

    fn persisted_block(response: BlockWriteResponse) -> Result<Option<DateBlock>, ApiError> {
        if !response.success {
            return Err(ApiError::Rejected(
                response.message.unwrap_or_else(|| "block was not saved".to_string()),
            ));
        }
        Ok(response.data.and_then(|record| decode_blocks(vec![record]).pop()))
    }
}

#[async_trait]
impl ReservationApi for HttpReservationApi {
    async fn fetch_accommodations(&self) -> Result<Vec<Accommodation>, ApiError> {
        let response: AccommodationsResponse =
            self.send(self.client.get(self.url("accommodations"))).await?;
        let accommodations = decode_accommodations(response.data);
        debug!(count = accommodations.len(), "Fetched accommodations");
        Ok(accommodations)
    }

    async fn fetch_blocks(&self) -> Result<Vec<DateBlock>, ApiError> {
        let response: BlockedDatesResponse =
            self.send(self.client.get(self.url("blocked-dates"))).await?;
        if !response.success {
            return Err(ApiError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| "failed to load blocked dates".to_string()),
            ));
        }
        let blocks = decode_blocks(response.data);
        debug!(count = blocks.len(), "Fetched blocked dates");
        Ok(blocks)
    }

    async fn fetch_occupancy(
        &self,
        accommodation_id: AccommodationId,
        date: NaiveDate,
    ) -> Result<u32, ApiError> {
        let request = self
            .client
            .get(self.url("bookings/room-occupancy"))
            .query(&[
                ("check_in", format_date(date)),
                ("id", accommodation_id.to_string()),
            ]);
        let response: OccupancyResponse = self.send(request).await?;
        response
            .booked_rooms()
            .map_err(|e| ApiError::MalformedPayload(e.to_string()))
    }

    async fn create_block(&self, payload: &BlockPayload) -> Result<Option<DateBlock>, ApiError> {
        let response: BlockWriteResponse = self
            .send(self.client.post(self.url("blocked-dates")).json(payload))
            .await?;
        Self::persisted_block(response)
    }

    async fn update_block(
        &self,
        id: BlockId,
        payload: &BlockPayload,
    ) -> Result<Option<DateBlock>, ApiError> {
        let response: BlockWriteResponse = self
            .send(
                self.client
                    .put(self.url(&format!("blocked-dates/{}", id)))
                    .json(payload),
            )
            .await?;
        Self::persisted_block(response)
    }

    async fn delete_block(&self, id: BlockId) -> Result<(), ApiError> {
        let response: DeleteResponse = self
            .send(self.client.delete(self.url(&format!("blocked-dates/{}", id))))
            .await?;
        if response.success {
            Ok(())
        } else {
            Err(ApiError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| "block was not deleted".to_string()),
            ))
        }
    }
}

// In-memory backend used by the tests of every module
#[cfg(test)]
pub mod mock_server {
    use super::*;
    use crate::models::RoomScope;
    use crate::wire::parse_block_date;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

    pub struct MockServer {
        accommodations: Mutex<Vec<Accommodation>>,
        blocks: Mutex<Vec<DateBlock>>,
        occupancy: Mutex<HashMap<(AccommodationId, NaiveDate), u32>>,
        occupancy_delay_ms: Mutex<HashMap<AccommodationId, u64>>,
        fail_occupancy: AtomicBool,
        fail_block_list: AtomicBool,
        fail_delete: AtomicBool,
        fail_dates: Mutex<HashSet<NaiveDate>>,
        next_id: AtomicI64,
        pub occupancy_calls: AtomicUsize,
        pub write_calls: AtomicUsize,
        pub delete_calls: AtomicUsize,
        pub written_payloads: Mutex<Vec<BlockPayload>>,
    }

    impl MockServer {
        pub fn new() -> Self {
            Self {
                accommodations: Mutex::new(Vec::new()),
                blocks: Mutex::new(Vec::new()),
                occupancy: Mutex::new(HashMap::new()),
                occupancy_delay_ms: Mutex::new(HashMap::new()),
                fail_occupancy: AtomicBool::new(false),
                fail_block_list: AtomicBool::new(false),
                fail_delete: AtomicBool::new(false),
                fail_dates: Mutex::new(HashSet::new()),
                next_id: AtomicI64::new(100),
                occupancy_calls: AtomicUsize::new(0),
                write_calls: AtomicUsize::new(0),
                delete_calls: AtomicUsize::new(0),
                written_payloads: Mutex::new(Vec::new()),
            }
        }

        pub fn with_accommodation(self, id: AccommodationId, rooms: u32) -> Self {
            self.accommodations.lock().push(Accommodation {
                id,
                name: format!("Accommodation {}", id),
                kind: "villa".to_string(),
                rooms,
                default_adult_price: Some(100.0),
                default_child_price: Some(50.0),
            });
            self
        }

        pub fn add_block(&self, block: DateBlock) {
            self.blocks.lock().push(block);
        }

        pub fn stored_blocks(&self) -> Vec<DateBlock> {
            self.blocks.lock().clone()
        }

        pub fn set_occupancy(&self, accommodation_id: AccommodationId, date: NaiveDate, booked: u32) {
            self.occupancy.lock().insert((accommodation_id, date), booked);
        }

        pub fn set_occupancy_delay(&self, accommodation_id: AccommodationId, delay_ms: u64) {
            self.occupancy_delay_ms.lock().insert(accommodation_id, delay_ms);
        }

        pub fn fail_occupancy(&self, fail: bool) {
            self.fail_occupancy.store(fail, Ordering::SeqCst);
        }

        pub fn fail_block_list(&self, fail: bool) {
            self.fail_block_list.store(fail, Ordering::SeqCst);
        }

        pub fn fail_delete(&self, fail: bool) {
            self.fail_delete.store(fail, Ordering::SeqCst);
        }

        pub fn fail_writes_for(&self, date: NaiveDate) {
            self.fail_dates.lock().insert(date);
        }

        pub fn writes(&self) -> usize {
            self.write_calls.load(Ordering::SeqCst)
        }

        fn record_write(&self, payload: &BlockPayload) -> Result<NaiveDate, ApiError> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            self.written_payloads.lock().push(payload.clone());

            let raw = payload
                .dates
                .first()
                .ok_or_else(|| ApiError::Rejected("dates must not be empty".to_string()))?;
            let date = parse_block_date(raw).map_err(|e| ApiError::Rejected(e.to_string()))?;

            if self.fail_dates.lock().contains(&date) {
                return Err(ApiError::ApiResponseError {
                    status_code: 500,
                    message: "Internal Server Error".to_string(),
                });
            }
            Ok(date)
        }

        fn block_from(id: BlockId, date: NaiveDate, payload: &BlockPayload) -> DateBlock {
            DateBlock {
                id,
                accommodation_id: payload.accommodation_id,
                date,
                room_scope: RoomScope::from_room_number(payload.room_number),
                reason: payload.reason.clone(),
                adult_price: payload.adult_price,
                child_price: payload.child_price,
            }
        }
    }

    #[async_trait]
    impl ReservationApi for MockServer {
        async fn fetch_accommodations(&self) -> Result<Vec<Accommodation>, ApiError> {
            Ok(self.accommodations.lock().clone())
        }

        async fn fetch_blocks(&self) -> Result<Vec<DateBlock>, ApiError> {
            if self.fail_block_list.load(Ordering::SeqCst) {
                return Err(ApiError::NetworkError("Service unavailable".to_string()));
            }
            Ok(self.blocks.lock().clone())
        }

        async fn fetch_occupancy(
            &self,
            accommodation_id: AccommodationId,
            date: NaiveDate,
        ) -> Result<u32, ApiError> {
            self.occupancy_calls.fetch_add(1, Ordering::SeqCst);

            let delay = self
                .occupancy_delay_ms
                .lock()
                .get(&accommodation_id)
                .copied()
                .unwrap_or(0);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            if self.fail_occupancy.load(Ordering::SeqCst) {
                return Err(ApiError::ApiResponseError {
                    status_code: 503,
                    message: "Service temporarily unavailable".to_string(),
                });
            }
            Ok(self
                .occupancy
                .lock()
                .get(&(accommodation_id, date))
                .copied()
                .unwrap_or(0))
        }

        async fn create_block(&self, payload: &BlockPayload) -> Result<Option<DateBlock>, ApiError> {
            let date = self.record_write(payload)?;
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let block = Self::block_from(id, date, payload);
            self.blocks.lock().push(block.clone());
            Ok(Some(block))
        }

        async fn update_block(
            &self,
            id: BlockId,
            payload: &BlockPayload,
        ) -> Result<Option<DateBlock>, ApiError> {
            let date = self.record_write(payload)?;
            let mut blocks = self.blocks.lock();
            let stored = blocks
                .iter_mut()
                .find(|block| block.id == id)
                .ok_or_else(|| ApiError::NotFound(format!("blocked date {}", id)))?;
            *stored = Self::block_from(id, date, payload);
            Ok(Some(stored.clone()))
        }

        async fn delete_block(&self, id: BlockId) -> Result<(), ApiError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(ApiError::NetworkError("Service unavailable".to_string()));
            }
            let mut blocks = self.blocks.lock();
            let before = blocks.len();
            blocks.retain(|block| block.id != id);
            if blocks.len() == before {
                return Err(ApiError::NotFound(format!("blocked date {}", id)));
            }
            Ok(())
        }
    }
}
