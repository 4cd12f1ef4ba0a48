//! Event CRUD, publication, ticket types and favorites.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};

use crate::api::dto::{
    CreateEventRequest, EventDetailResponse, EventListParams, EventListResponse, FavoriteResponse,
    TicketTypeDto, TicketTypeRequest, UpdateEventRequest,
};
use crate::api::extract::Viewer;
use crate::app_state::AppState;
use crate::domain::{EventId, TicketTypeId};
use crate::error::{AppError, ErrorResponse};
use crate::persistence::models::Event;
use crate::service::{AuthUser, EventQuery, PageRequest};

/// `POST /events` — Create a draft event with its ticket tiers.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-organizers and
/// [`AppError::InvalidFields`] with one message per offending field.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Create event",
    description = "Creates a draft event. Free events take only zero-priced ticket types; paid events need a positive price on every tier.",
    security(("bearer" = [])),
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = EventDetailResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Organizer account required", body = ErrorResponse),
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    let details = state.events.create_event(&caller, req.into()).await?;
    Ok((StatusCode::CREATED, Json(EventDetailResponse::from(details))))
}

/// `GET /events` — Browse published events.
///
/// # Errors
///
/// Returns [`AppError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "Events",
    summary = "List published events",
    description = "Published events, soonest first, filtered by title substring and category.",
    params(EventListParams),
    responses(
        (status = 200, description = "Paginated events", body = EventListResponse),
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<EventListParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = EventQuery {
        search: params.q,
        category: params.category,
        page: PageRequest::new(params.page, params.per_page),
    };
    let page = state.events.list_published(query).await?;
    Ok(Json(EventListResponse::from(page)))
}

/// `GET /events/{id}` — Event details with ticket tiers.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] for unknown events and for drafts the
/// caller does not manage.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Get event",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Event details", body = EventDetailResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(id): Path<EventId>,
) -> Result<impl IntoResponse, AppError> {
    let details = state.events.get_event(viewer.as_ref(), id).await?;
    Ok(Json(EventDetailResponse::from(details)))
}

/// `PATCH /events/{id}` — Edit descriptive fields.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] unless the caller owns the event or is
/// an admin, and [`AppError::Conflict`] for cancelled events.
#[utoipa::path(
    patch,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Update event",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Updated event", body = Event),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Not the organizer", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn update_event(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<EventId>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.events.update_event(&caller, id, req.into()).await?))
}

/// `DELETE /events/{id}` — Delete an event without sales.
///
/// # Errors
///
/// Returns [`AppError::Conflict`] once any ticket has been sold or while a
/// payment for the event is pending.
#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Delete event",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the organizer", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Tickets sold or payment in progress", body = ErrorResponse),
    )
)]
pub async fn delete_event(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<EventId>,
) -> Result<impl IntoResponse, AppError> {
    state.events.delete_event(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /events/{id}/publish` — Open an event for sales.
///
/// # Errors
///
/// Returns [`AppError::Conflict`] for cancelled events and
/// [`AppError::InvalidRequest`] for events without ticket types.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/publish",
    tag = "Events",
    summary = "Publish event",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Published event", body = Event),
        (status = 409, description = "Event is cancelled", body = ErrorResponse),
    )
)]
pub async fn publish_event(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<EventId>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.events.publish(&caller, id).await?))
}

/// `POST /events/{id}/cancel` — Cancel an event and void its unused tickets.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] unless the caller manages the event.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/cancel",
    tag = "Events",
    summary = "Cancel event",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Cancelled event", body = Event),
        (status = 403, description = "Not the organizer", body = ErrorResponse),
    )
)]
pub async fn cancel_event(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<EventId>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.events.cancel(&caller, id).await?))
}

/// `POST /events/{id}/ticket-types` — Add a ticket tier.
///
/// # Errors
///
/// Returns [`AppError::InvalidFields`] if the tier breaks the free/paid
/// pricing rule.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/ticket-types",
    tag = "Events",
    summary = "Add ticket type",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    request_body = TicketTypeRequest,
    responses(
        (status = 201, description = "Ticket type created", body = TicketTypeDto),
        (status = 400, description = "Validation failed", body = ErrorResponse),
    )
)]
pub async fn add_ticket_type(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<EventId>,
    Json(req): Json<TicketTypeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tt = state.events.add_ticket_type(&caller, id, req.into()).await?;
    Ok((StatusCode::CREATED, Json(TicketTypeDto::from(tt))))
}

/// `DELETE /ticket-types/{id}` — Remove an unsold ticket tier.
///
/// # Errors
///
/// Returns [`AppError::Conflict`] once the tier has sales.
#[utoipa::path(
    delete,
    path = "/api/v1/ticket-types/{id}",
    tag = "Events",
    summary = "Delete ticket type",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Ticket type UUID"),
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 409, description = "Tickets already sold", body = ErrorResponse),
    )
)]
pub async fn delete_ticket_type(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<TicketTypeId>,
) -> Result<impl IntoResponse, AppError> {
    state.events.delete_ticket_type(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /events/{id}/favorite` — Save an event.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] for events the caller cannot see.
#[utoipa::path(
    put,
    path = "/api/v1/events/{id}/favorite",
    tag = "Events",
    summary = "Favorite event",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Favorite state", body = FavoriteResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn add_favorite(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<EventId>,
) -> Result<impl IntoResponse, AppError> {
    let changed = state.events.add_favorite(&caller, id).await?;
    Ok(Json(FavoriteResponse {
        event_id: id,
        favorited: true,
        changed,
    }))
}

/// `DELETE /events/{id}/favorite` — Forget a saved event.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] without a valid token.
#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}/favorite",
    tag = "Events",
    summary = "Unfavorite event",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Favorite state", body = FavoriteResponse),
    )
)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<EventId>,
) -> Result<impl IntoResponse, AppError> {
    let changed = state.events.remove_favorite(&caller, id).await?;
    Ok(Json(FavoriteResponse {
        event_id: id,
        favorited: false,
        changed,
    }))
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event).get(list_events))
        .route(
            "/events/{id}",
            get(get_event).patch(update_event).delete(delete_event),
        )
        .route("/events/{id}/publish", post(publish_event))
        .route("/events/{id}/cancel", post(cancel_event))
        .route("/events/{id}/ticket-types", post(add_ticket_type))
        .route("/events/{id}/favorite", put(add_favorite).delete(remove_favorite))
        .route("/ticket-types/{id}", delete(delete_ticket_type))
}
