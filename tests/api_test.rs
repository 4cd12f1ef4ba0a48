//! HTTP-level tests driving the full router over the in-memory backends.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use tixhub::api;
use tixhub::app_state::AppState;
use tixhub::mail::MemoryMailer;
use tixhub::payment::{SandboxGateway, TransactionStatus};
use tixhub::persistence::memory::MemoryRepository;
use tixhub::service::AuthSettings;

const ADMIN: &str = "root@example.com";
const PASSWORD: &str = "correct-horse";

struct TestApp {
    router: Router,
    mailer: MemoryMailer,
    gateway: SandboxGateway,
}

impl TestApp {
    fn new() -> Self {
        let mailer = MemoryMailer::new();
        let gateway = SandboxGateway::new("http://localhost:3000");
        let state = AppState::new(
            Arc::new(MemoryRepository::new()),
            Arc::new(mailer.clone()),
            Arc::new(gateway.clone()),
            AuthSettings {
                jwt_secret: "integration-secret".into(),
                jwt_ttl: Duration::from_secs(600),
                app_base_url: "http://localhost:3000".into(),
                admin_emails: vec![ADMIN.into()],
            },
        );
        Self {
            router: api::build_router().with_state(state),
            mailer,
            gateway,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let Ok(request) = builder.body(body) else {
            panic!("bad request for {uri}");
        };
        let Ok(response) = self.router.clone().oneshot(request).await else {
            panic!("router failed for {uri}");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("unreadable body for {uri}");
        };
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn register_and_login(&self, email: &str) -> String {
        let (status, _) = self
            .send(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({ "email": email, "name": "Test", "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let Some(token) = body["access_token"].as_str() else {
            panic!("no access token: {body}");
        };
        token.to_string()
    }

    async fn verify_email(&self, email: &str) {
        let mails = self.mailer.sent_to(email).await;
        let Some(token) = mails.first().and_then(|m| token_from(&m.html)) else {
            panic!("no verification email for {email}");
        };
        let (status, _) = self
            .send(
                Method::POST,
                "/api/v1/auth/verify-email",
                None,
                Some(json!({ "token": token })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    /// Organizer with a published paid event; returns (token, event id, ticket type id).
    async fn organizer_with_event(&self) -> (String, String, String) {
        let token = self.register_and_login("org@example.com").await;
        self.verify_email("org@example.com").await;
        let (status, _) = self
            .send(
                Method::POST,
                "/api/v1/users/me/organizer",
                Some(&token),
                Some(json!({
                    "bank_name": "First Bank",
                    "account_number": "0123456789",
                    "account_name": "Org Ltd"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let starts_at = chrono::Utc::now() + chrono::Duration::days(10);
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/events",
                Some(&token),
                Some(json!({
                    "title": "Afrobeats Live",
                    "venue": "Tafawa Balewa Square",
                    "category": "music",
                    "starts_at": starts_at.to_rfc3339(),
                    "ticket_types": [{ "name": "Regular", "price": 500000, "quantity": 50 }]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let event_id = body["event"]["id"].as_str().unwrap_or_default().to_string();
        let tt_id = body["ticket_types"][0]["id"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        let (status, _) = self
            .send(
                Method::POST,
                &format!("/api/v1/events/{event_id}/publish"),
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        (token, event_id, tt_id)
    }

    /// Buys `quantity` tickets and settles the payment.
    async fn buy(&self, buyer: &str, event_id: &str, tt_id: &str, quantity: u32, amount: i64) {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/checkout",
                Some(buyer),
                Some(json!({
                    "event_id": event_id,
                    "items": [{ "ticket_type_id": tt_id, "quantity": quantity }],
                    "amount": amount
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let reference = body["reference"].as_str().unwrap_or_default().to_string();
        let (status, body) = self
            .send(
                Method::POST,
                &format!("/api/v1/checkout/{reference}/verify"),
                Some(buyer),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
}

fn token_from(html: &str) -> Option<String> {
    let start = html.find("token=")? + "token=".len();
    let token: String = html
        .get(start..)?
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    (!token.is_empty()).then_some(token)
}

#[tokio::test]
async fn health_and_fee_schedule() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.send(Method::GET, "/config/fees", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processor_rate_bps"], 150);
    assert_eq!(body["processor_fee_cap"], 200_000);
    assert_eq!(body["amount_tolerance"], 100);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/api/v1/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], 2001);

    let (status, _) = app
        .send(Method::GET, "/api/v1/users/me", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/admin/payouts/bulk",
            None,
            Some(json!({ "payout_ids": [], "action": "approve" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_admins_cannot_review_payouts() {
    let app = TestApp::new();
    let token = app.register_and_login("fan@example.com").await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/admin/payouts/bulk",
            Some(&token),
            Some(json!({ "payout_ids": [uuid::Uuid::new_v4()], "action": "approve" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], 2002);
}

#[tokio::test]
async fn validation_errors_list_fields() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "bad", "name": "", "password": "123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1002);
    assert!(body["error"]["details"]["email"].is_string());
    assert!(body["error"]["details"]["password"].is_string());
}

#[tokio::test]
async fn purchase_flow_issues_tickets_and_credits_organizer() {
    let app = TestApp::new();
    let (org, event_id, tt_id) = app.organizer_with_event().await;
    let buyer = app.register_and_login("fan@example.com").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/checkout/quote",
            None,
            Some(json!({
                "event_id": event_id,
                "items": [{ "ticket_type_id": tt_id, "quantity": 2 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["breakdown"]["total_amount"], 1_025_000);

    app.buy(&buyer, &event_id, &tt_id, 2, 1_025_000).await;

    let (status, body) = app
        .send(Method::GET, "/api/v1/users/me/tickets", Some(&buyer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));

    let (status, body) = app
        .send(Method::GET, "/api/v1/organizer/balance", Some(&org), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_earned"], 930_000);
    assert_eq!(body["available"], 930_000);

    let (_, body) = app
        .send(Method::GET, &format!("/api/v1/events/{event_id}"), None, None)
        .await;
    assert_eq!(body["ticket_types"][0]["sold"], 2);
    assert_eq!(body["ticket_types"][0]["remaining"], 48);
}

#[tokio::test]
async fn submitted_amount_outside_tolerance_is_rejected() {
    let app = TestApp::new();
    let (_, event_id, tt_id) = app.organizer_with_event().await;
    let buyer = app.register_and_login("fan@example.com").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/checkout",
            Some(&buyer),
            Some(json!({
                "event_id": event_id,
                "items": [{ "ticket_type_id": tt_id, "quantity": 1 }],
                "amount": 500_000
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1003);
    assert_eq!(body["error"]["details"]["expected"], 517_500);
    assert_eq!(body["error"]["details"]["submitted"], 500_000);
}

#[tokio::test]
async fn gateway_amount_mismatch_fails_the_payment() {
    let app = TestApp::new();
    let (_, event_id, tt_id) = app.organizer_with_event().await;
    let buyer = app.register_and_login("fan@example.com").await;

    let (_, body) = app
        .send(
            Method::POST,
            "/api/v1/checkout",
            Some(&buyer),
            Some(json!({
                "event_id": event_id,
                "items": [{ "ticket_type_id": tt_id, "quantity": 1 }],
                "amount": 517_500
            })),
        )
        .await;
    let reference = body["reference"].as_str().unwrap_or_default().to_string();
    app.gateway
        .set_outcome(&reference, TransactionStatus::Success, 1_000)
        .await;

    let uri = format!("/api/v1/checkout/{reference}/verify");
    let (status, body) = app.send(Method::POST, &uri, Some(&buyer), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1003);

    let (status, _) = app.send(Method::POST, &uri, Some(&buyer), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, tickets) = app
        .send(Method::GET, "/api/v1/users/me/tickets", Some(&buyer), None)
        .await;
    assert_eq!(tickets.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn mixed_status_bulk_batch_changes_nothing() {
    let app = TestApp::new();
    let (org, event_id, tt_id) = app.organizer_with_event().await;
    let buyer = app.register_and_login("fan@example.com").await;
    app.buy(&buyer, &event_id, &tt_id, 2, 1_025_000).await;
    let admin = app.register_and_login(ADMIN).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/organizer/payouts",
                Some(&org),
                Some(json!({ "amount": 100_000 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        ids.push(body["id"].as_str().unwrap_or_default().to_string());
    }

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/admin/payouts/bulk",
            Some(&admin),
            Some(json!({ "payout_ids": [ids[0]], "action": "reject", "note": "duplicate" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["updated"], 1);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/admin/payouts/bulk",
            Some(&admin),
            Some(json!({ "payout_ids": ids, "action": "approve" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1001);

    let (_, pending) = app
        .send(
            Method::GET,
            "/api/v1/admin/payouts?status=pending",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(pending.as_array().map(Vec::len), Some(2));
    let (_, approved) = app
        .send(
            Method::GET,
            "/api/v1/admin/payouts?status=approved",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(approved.as_array().map(Vec::len), Some(0));

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/admin/payouts/bulk",
            Some(&admin),
            Some(json!({ "payout_ids": [ids[1], ids[2]], "action": "approve" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 2);
    assert_eq!(app.mailer.sent_to("org@example.com").await.len(), 4);
}

#[tokio::test]
async fn unknown_bulk_action_is_a_bad_request() {
    let app = TestApp::new();
    let admin = app.register_and_login(ADMIN).await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/admin/payouts/bulk",
            Some(&admin),
            Some(json!({ "payout_ids": [uuid::Uuid::new_v4()], "action": "refund" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1001);
}
