//! OpenAPI document for every REST endpoint.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::handlers::{admin, auth, checkout, events, organizer, system, users};

/// The generated API description served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "tixhub",
        description = "Event ticketing backend: events, checkout settlement, organizer payouts."
    ),
    paths(
        system::health_handler,
        system::fees_handler,
        auth::register,
        auth::login,
        auth::verify_email,
        auth::resend_verification,
        auth::forgot_password,
        auth::reset_password,
        users::me,
        users::update_me,
        users::become_organizer,
        users::my_tickets,
        users::my_favorites,
        events::create_event,
        events::list_events,
        events::get_event,
        events::update_event,
        events::delete_event,
        events::publish_event,
        events::cancel_event,
        events::add_ticket_type,
        events::delete_ticket_type,
        events::add_favorite,
        events::remove_favorite,
        checkout::quote,
        checkout::checkout,
        checkout::verify,
        checkout::get_ticket,
        checkout::check_in,
        organizer::my_events,
        organizer::balance,
        organizer::request_payout,
        organizer::my_payouts,
        admin::list_payouts,
        admin::bulk_process,
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "System", description = "Health and configuration"),
        (name = "Auth", description = "Accounts and sessions"),
        (name = "Users", description = "The caller's profile"),
        (name = "Events", description = "Events, ticket types and favorites"),
        (name = "Checkout", description = "Pricing and payment settlement"),
        (name = "Tickets", description = "Issued tickets and admission"),
        (name = "Organizer", description = "Organizer balance and withdrawals"),
        (name = "Admin", description = "Payout review"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_the_bulk_endpoint() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/admin/payouts/bulk"));
        assert!(doc.paths.paths.contains_key("/config/fees"));
        let has_bearer = doc
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer"));
        assert!(has_bearer);
    }
}
