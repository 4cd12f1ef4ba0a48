//! Events, ticket types and favorites.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{Page, PageRequest};
use crate::domain::{EventId, EventStatus, FieldErrors, TicketTypeId};
use crate::error::AppError;
use crate::persistence::Repository;
use crate::persistence::models::{
    Event, EventChanges, EventFilter, NewEvent, NewTicketType, TicketType,
};
use crate::service::AuthUser;

const MAX_TITLE_LEN: usize = 200;

/// A ticket tier submitted by an organizer.
#[derive(Debug, Clone)]
pub struct TicketTypeInput {
    /// Tier name.
    pub name: String,
    /// Unit price in minor units.
    pub price: i64,
    /// Capacity.
    pub quantity: i32,
}

/// A new event with its initial ticket tiers.
#[derive(Debug, Clone, Default)]
pub struct EventInput {
    /// Title.
    pub title: String,
    /// Long description.
    pub description: Option<String>,
    /// Venue.
    pub venue: String,
    /// Category.
    pub category: Option<String>,
    /// Start time; required.
    pub starts_at: Option<DateTime<Utc>>,
    /// End time.
    pub ends_at: Option<DateTime<Utc>>,
    /// Free event flag.
    pub is_free: bool,
    /// Initial tiers; at least one.
    pub ticket_types: Vec<TicketTypeInput>,
}

/// An event together with its ticket tiers.
#[derive(Debug, Clone)]
pub struct EventDetails {
    /// The event.
    pub event: Event,
    /// Its ticket tiers, in creation order.
    pub ticket_types: Vec<TicketType>,
}

/// Public listing query.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Title substring.
    pub search: Option<String>,
    /// Exact category.
    pub category: Option<String>,
    /// Page selection.
    pub page: PageRequest,
}

/// Event management.
#[derive(Debug, Clone)]
pub struct EventService {
    repo: Arc<dyn Repository>,
}

impl EventService {
    /// Creates the service.
    #[must_use]
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Creates a draft event with its ticket types.
    ///
    /// # Errors
    ///
    /// [`AppError::Forbidden`] for non-organizers, [`AppError::InvalidFields`]
    /// listing every invalid field.
    pub async fn create_event(
        &self,
        caller: &AuthUser,
        input: EventInput,
    ) -> Result<EventDetails, AppError> {
        caller.require_organizer()?;

        let mut errors = FieldErrors::new();
        let title = required_text(&mut errors, "title", &input.title);
        if title.chars().count() > MAX_TITLE_LEN {
            errors.add("title", format!("title must be at most {MAX_TITLE_LEN} characters"));
        }
        let venue = required_text(&mut errors, "venue", &input.venue);
        match input.starts_at {
            None => errors.add("starts_at", "start time is required"),
            Some(starts_at) if starts_at <= Utc::now() => {
                errors.add("starts_at", "start time must be in the future");
            }
            Some(_) => {}
        }
        check_end_after_start(&mut errors, input.starts_at, input.ends_at);
        if input.ticket_types.is_empty() {
            errors.add("ticket_types", "at least one ticket type is required");
        }
        for (i, tt) in input.ticket_types.iter().enumerate() {
            check_ticket_type(&mut errors, &format!("ticket_types[{i}]"), tt, input.is_free);
        }
        let Some(starts_at) = input.starts_at.filter(|_| errors.is_empty()) else {
            return Err(errors.into());
        };

        let (event, ticket_types) = self
            .repo
            .create_event(
                NewEvent {
                    organizer_id: caller.id,
                    title,
                    description: non_empty(input.description),
                    venue,
                    category: non_empty(input.category).map(|c| c.to_lowercase()),
                    starts_at,
                    ends_at: input.ends_at,
                    is_free: input.is_free,
                },
                input
                    .ticket_types
                    .into_iter()
                    .map(|tt| NewTicketType {
                        name: tt.name.trim().to_string(),
                        price: tt.price,
                        quantity: tt.quantity,
                    })
                    .collect(),
            )
            .await?;

        tracing::info!(event_id = %event.id, organizer_id = %caller.id, "event created");
        Ok(EventDetails {
            event,
            ticket_types,
        })
    }

    /// Published events, soonest first.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn list_published(&self, query: EventQuery) -> Result<Page<Event>, AppError> {
        let filter = EventFilter {
            search: non_empty(query.search),
            category: non_empty(query.category).map(|c| c.to_lowercase()),
            status: Some(EventStatus::Published),
            organizer_id: None,
            page: query.page.page(),
            per_page: query.page.per_page(),
        };
        let (items, total) = self.repo.list_events(&filter).await?;
        Ok(Page::new(items, total, query.page))
    }

    /// The caller's own events in any state.
    ///
    /// # Errors
    ///
    /// [`AppError::Forbidden`] for non-organizers.
    pub async fn list_own(&self, caller: &AuthUser, page: PageRequest) -> Result<Page<Event>, AppError> {
        caller.require_organizer()?;
        let filter = EventFilter {
            organizer_id: Some(caller.id),
            page: page.page(),
            per_page: page.per_page(),
            ..EventFilter::default()
        };
        let (items, total) = self.repo.list_events(&filter).await?;
        Ok(Page::new(items, total, page))
    }

    /// An event and its ticket types. Drafts are only visible to their
    /// organizer and administrators.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if missing or not visible to the caller.
    pub async fn get_event(
        &self,
        viewer: Option<&AuthUser>,
        id: EventId,
    ) -> Result<EventDetails, AppError> {
        let event = self.visible_event(viewer, id).await?;
        let ticket_types = self.repo.list_ticket_types(id).await?;
        Ok(EventDetails {
            event,
            ticket_types,
        })
    }

    /// Applies descriptive changes.
    ///
    /// # Errors
    ///
    /// [`AppError::Forbidden`] for non-owners, [`AppError::Conflict`] for
    /// cancelled events, [`AppError::InvalidFields`] for bad values.
    pub async fn update_event(
        &self,
        caller: &AuthUser,
        id: EventId,
        changes: EventChanges,
    ) -> Result<Event, AppError> {
        let event = self.managed_event(caller, id).await?;
        if event.status == EventStatus::Cancelled {
            return Err(AppError::Conflict("cancelled events cannot be edited".into()));
        }

        let mut errors = FieldErrors::new();
        let title = changes
            .title
            .map(|t| required_text(&mut errors, "title", &t));
        let venue = changes
            .venue
            .map(|v| required_text(&mut errors, "venue", &v));
        let starts_at = changes.starts_at.unwrap_or(event.starts_at);
        let ends_at = changes.ends_at.or(event.ends_at);
        check_end_after_start(&mut errors, Some(starts_at), ends_at);
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let updated = self
            .repo
            .update_event(
                id,
                EventChanges {
                    title,
                    description: changes.description.map(|d| d.trim().to_string()),
                    venue,
                    category: changes.category.map(|c| c.trim().to_lowercase()),
                    starts_at: changes.starts_at,
                    ends_at: changes.ends_at,
                },
            )
            .await?;
        tracing::info!(event_id = %id, "event updated");
        Ok(updated)
    }

    /// Makes a draft event visible and purchasable. Publishing an already
    /// published event is a no-op.
    ///
    /// # Errors
    ///
    /// [`AppError::Conflict`] for cancelled events,
    /// [`AppError::InvalidRequest`] if the event has no ticket types.
    pub async fn publish(&self, caller: &AuthUser, id: EventId) -> Result<Event, AppError> {
        let event = self.managed_event(caller, id).await?;
        match event.status {
            EventStatus::Published => return Ok(event),
            EventStatus::Cancelled => {
                return Err(AppError::Conflict(
                    "cancelled events cannot be published".into(),
                ));
            }
            EventStatus::Draft => {}
        }
        if self.repo.list_ticket_types(id).await?.is_empty() {
            return Err(AppError::InvalidRequest(
                "add at least one ticket type before publishing".into(),
            ));
        }
        let published = self.repo.set_event_status(id, EventStatus::Published).await?;
        tracing::info!(event_id = %id, "event published");
        Ok(published)
    }

    /// Cancels an event and voids its unused tickets. Cancelling twice is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`AppError::Forbidden`] for non-owners.
    pub async fn cancel(&self, caller: &AuthUser, id: EventId) -> Result<Event, AppError> {
        let event = self.managed_event(caller, id).await?;
        if event.status == EventStatus::Cancelled {
            return Ok(event);
        }
        let (cancelled, tickets) = self.repo.cancel_event(id).await?;
        if tickets > 0 {
            tracing::warn!(event_id = %id, tickets, "event with issued tickets cancelled");
        } else {
            tracing::info!(event_id = %id, "event cancelled");
        }
        Ok(cancelled)
    }

    /// Deletes an event that has sold nothing and has no payment in
    /// progress.
    ///
    /// # Errors
    ///
    /// [`AppError::Conflict`] once any ticket is sold or a buyer is paying.
    pub async fn delete_event(&self, caller: &AuthUser, id: EventId) -> Result<(), AppError> {
        self.managed_event(caller, id).await?;
        self.repo.delete_event(id).await?;
        tracing::info!(event_id = %id, "event deleted");
        Ok(())
    }

    /// Adds a ticket tier.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidFields`] for bad values, [`AppError::Conflict`] for
    /// cancelled events.
    pub async fn add_ticket_type(
        &self,
        caller: &AuthUser,
        event_id: EventId,
        input: TicketTypeInput,
    ) -> Result<TicketType, AppError> {
        let event = self.managed_event(caller, event_id).await?;
        if event.status == EventStatus::Cancelled {
            return Err(AppError::Conflict("event is cancelled".into()));
        }
        let mut errors = FieldErrors::new();
        check_ticket_type(&mut errors, "ticket_type", &input, event.is_free);
        if !errors.is_empty() {
            return Err(errors.into());
        }
        let tt = self
            .repo
            .add_ticket_type(
                event_id,
                NewTicketType {
                    name: input.name.trim().to_string(),
                    price: input.price,
                    quantity: input.quantity,
                },
            )
            .await?;
        tracing::info!(%event_id, ticket_type_id = %tt.id, "ticket type added");
        Ok(tt)
    }

    /// Removes a ticket tier that has sold nothing and is not being paid
    /// for.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`], [`AppError::Forbidden`] for non-owners,
    /// [`AppError::Conflict`] once sold or while a payment includes it.
    pub async fn delete_ticket_type(
        &self,
        caller: &AuthUser,
        id: TicketTypeId,
    ) -> Result<(), AppError> {
        let tt = self
            .repo
            .find_ticket_type(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("ticket type {id}")))?;
        self.managed_event(caller, tt.event_id).await?;
        self.repo.delete_ticket_type(id).await?;
        tracing::info!(ticket_type_id = %id, "ticket type deleted");
        Ok(())
    }

    /// Saves an event to the caller's favorites. Returns `false` if it was
    /// already saved.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if the event is not visible to the caller.
    pub async fn add_favorite(&self, caller: &AuthUser, id: EventId) -> Result<bool, AppError> {
        self.visible_event(Some(caller), id).await?;
        self.repo.add_favorite(caller.id, id).await
    }

    /// Removes an event from the caller's favorites. Returns `false` if it
    /// was not saved.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn remove_favorite(&self, caller: &AuthUser, id: EventId) -> Result<bool, AppError> {
        self.repo.remove_favorite(caller.id, id).await
    }

    /// The caller's favorite events.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn favorites(&self, caller: &AuthUser) -> Result<Vec<Event>, AppError> {
        let events = self.repo.list_favorite_events(caller.id).await?;
        Ok(events
            .into_iter()
            .filter(|e| e.status != EventStatus::Draft || caller.can_manage(e.organizer_id))
            .collect())
    }

    async fn visible_event(&self, viewer: Option<&AuthUser>, id: EventId) -> Result<Event, AppError> {
        let event = self
            .repo
            .find_event(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("event {id}")))?;
        let can_see_draft = viewer.is_some_and(|v| v.can_manage(event.organizer_id));
        if event.status == EventStatus::Draft && !can_see_draft {
            return Err(AppError::not_found(format!("event {id}")));
        }
        Ok(event)
    }

    async fn managed_event(&self, caller: &AuthUser, id: EventId) -> Result<Event, AppError> {
        let event = self.visible_event(Some(caller), id).await?;
        if !caller.can_manage(event.organizer_id) {
            return Err(AppError::Forbidden("only the organizer can manage this event".into()));
        }
        Ok(event)
    }
}

fn required_text(errors: &mut FieldErrors, field: &str, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, format!("{field} is required"));
    }
    trimmed.to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_end_after_start(
    errors: &mut FieldErrors,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
) {
    if let (Some(start), Some(end)) = (starts_at, ends_at)
        && end <= start
    {
        errors.add("ends_at", "end time must be after the start time");
    }
}

fn check_ticket_type(errors: &mut FieldErrors, prefix: &str, tt: &TicketTypeInput, is_free: bool) {
    if tt.name.trim().is_empty() {
        errors.add(format!("{prefix}.name"), "ticket type name is required");
    }
    if tt.quantity <= 0 {
        errors.add(format!("{prefix}.quantity"), "quantity must be at least 1");
    }
    if is_free && tt.price != 0 {
        errors.add(format!("{prefix}.price"), "free events only have free tickets");
    } else if !is_free && tt.price <= 0 {
        errors.add(format!("{prefix}.price"), "price must be greater than zero");
    }
}
