//! Event, ticket type and favorite DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::PaginationMeta;
use crate::domain::{EventId, TicketTypeId};
use crate::persistence::models::{Event, EventChanges, TicketType};
use crate::service::{EventDetails, EventInput, Page, TicketTypeInput};

/// A ticket tier in create requests.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TicketTypeRequest {
    /// Tier name.
    pub name: String,
    /// Unit price in kobo; 0 for free events.
    pub price: i64,
    /// Capacity.
    pub quantity: i32,
}

impl From<TicketTypeRequest> for TicketTypeInput {
    fn from(req: TicketTypeRequest) -> Self {
        Self {
            name: req.name,
            price: req.price,
            quantity: req.quantity,
        }
    }
}

/// Request body for `POST /events`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    /// Title.
    #[serde(default)]
    pub title: String,
    /// Long description.
    #[serde(default)]
    pub description: Option<String>,
    /// Venue.
    #[serde(default)]
    pub venue: String,
    /// Category.
    #[serde(default)]
    pub category: Option<String>,
    /// Start time (RFC 3339).
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    /// End time (RFC 3339).
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    /// Free event flag.
    #[serde(default)]
    pub is_free: bool,
    /// Initial ticket tiers.
    #[serde(default)]
    pub ticket_types: Vec<TicketTypeRequest>,
}

impl From<CreateEventRequest> for EventInput {
    fn from(req: CreateEventRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            venue: req.venue,
            category: req.category,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
            is_free: req.is_free,
            ticket_types: req.ticket_types.into_iter().map(Into::into).collect(),
        }
    }
}

/// Request body for `PATCH /events/{id}`. Absent fields are unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateEventRequest {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New venue.
    pub venue: Option<String>,
    /// New category.
    pub category: Option<String>,
    /// New start time.
    pub starts_at: Option<DateTime<Utc>>,
    /// New end time.
    pub ends_at: Option<DateTime<Utc>>,
}

impl From<UpdateEventRequest> for EventChanges {
    fn from(req: UpdateEventRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            venue: req.venue,
            category: req.category,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
        }
    }
}

/// Query string for `GET /events`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventListParams {
    /// Title substring.
    pub q: Option<String>,
    /// Exact category.
    pub category: Option<String>,
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Items per page (max 100).
    pub per_page: Option<u32>,
}

/// Ticket tier as shown to buyers.
#[derive(Debug, Serialize, ToSchema)]
pub struct TicketTypeDto {
    /// Ticket type id.
    pub id: TicketTypeId,
    /// Parent event.
    pub event_id: EventId,
    /// Tier name.
    pub name: String,
    /// Unit price in kobo.
    pub price: i64,
    /// Capacity.
    pub quantity: i32,
    /// Sold so far.
    pub sold: i32,
    /// Still available.
    pub remaining: i32,
}

impl From<TicketType> for TicketTypeDto {
    fn from(tt: TicketType) -> Self {
        Self {
            remaining: tt.remaining(),
            id: tt.id,
            event_id: tt.event_id,
            name: tt.name,
            price: tt.price,
            quantity: tt.quantity,
            sold: tt.sold,
        }
    }
}

/// An event with its ticket tiers.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventDetailResponse {
    /// The event.
    pub event: Event,
    /// Its ticket tiers.
    pub ticket_types: Vec<TicketTypeDto>,
}

impl From<EventDetails> for EventDetailResponse {
    fn from(details: EventDetails) -> Self {
        Self {
            event: details.event,
            ticket_types: details.ticket_types.into_iter().map(Into::into).collect(),
        }
    }
}

/// Paginated event list.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventListResponse {
    /// Events on this page.
    pub data: Vec<Event>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

impl From<Page<Event>> for EventListResponse {
    fn from(page: Page<Event>) -> Self {
        let pagination = PaginationMeta::from(&page);
        Self {
            data: page.items,
            pagination,
        }
    }
}

/// Result of toggling a favorite.
#[derive(Debug, Serialize, ToSchema)]
pub struct FavoriteResponse {
    /// Event id.
    pub event_id: EventId,
    /// Whether the event is now a favorite.
    pub favorited: bool,
    /// Whether this call changed anything.
    pub changed: bool,
}
