//! Organizer withdrawals and their bulk review by administrators.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;

use crate::domain::{PayoutId, PayoutStatus, UserId};
use crate::error::AppError;
use crate::mail::{Mailer, send_best_effort, templates};
use crate::persistence::Repository;
use crate::persistence::models::{NewPayout, OrganizerBalance, Payout, PayoutFilter, User};
use crate::service::AuthUser;

/// Decision applied to a batch of pending payouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    /// Pay the organizer.
    Approve,
    /// Decline the request.
    Reject,
}

impl BulkAction {
    /// Status the payouts move to.
    #[must_use]
    pub const fn target_status(self) -> PayoutStatus {
        match self {
            Self::Approve => PayoutStatus::Approved,
            Self::Reject => PayoutStatus::Rejected,
        }
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BulkAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            other => Err(AppError::InvalidRequest(format!(
                "action must be 'approve' or 'reject', got '{other}'"
            ))),
        }
    }
}

/// Payout requests and review.
#[derive(Debug, Clone)]
pub struct PayoutService {
    repo: Arc<dyn Repository>,
    mailer: Arc<dyn Mailer>,
}

impl PayoutService {
    /// Creates the service.
    #[must_use]
    pub fn new(repo: Arc<dyn Repository>, mailer: Arc<dyn Mailer>) -> Self {
        Self { repo, mailer }
    }

    /// Earnings and payout totals of the calling organizer.
    ///
    /// # Errors
    ///
    /// [`AppError::Forbidden`] for plain users.
    pub async fn balance(&self, caller: &AuthUser) -> Result<OrganizerBalance, AppError> {
        caller.require_organizer()?;
        self.repo.organizer_balance(caller.id).await
    }

    /// Requests a withdrawal to the organizer's bank account on file.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidRequest`] without bank details, for a
    /// non-positive amount, or when the amount exceeds the available
    /// balance.
    pub async fn request_payout(&self, caller: &AuthUser, amount: i64) -> Result<Payout, AppError> {
        caller.require_organizer()?;
        if amount <= 0 {
            return Err(AppError::InvalidRequest("amount must be positive".into()));
        }
        let user = self.load_user(caller.id).await?;
        let bank = user.bank_account().ok_or_else(|| {
            AppError::InvalidRequest("add bank details before requesting a payout".into())
        })?;

        let payout = self
            .repo
            .create_payout(NewPayout {
                organizer_id: caller.id,
                amount,
                bank,
            })
            .await?;
        tracing::info!(payout_id = %payout.id, organizer_id = %caller.id, amount, "payout requested");
        Ok(payout)
    }

    /// The caller's payouts, newest first.
    ///
    /// # Errors
    ///
    /// [`AppError::Forbidden`] for plain users.
    pub async fn list_own(&self, caller: &AuthUser) -> Result<Vec<Payout>, AppError> {
        caller.require_organizer()?;
        self.repo
            .list_payouts(PayoutFilter {
                organizer_id: Some(caller.id),
                status: None,
            })
            .await
    }

    /// All payouts, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// [`AppError::Forbidden`] for non-admins.
    pub async fn admin_list(
        &self,
        caller: &AuthUser,
        status: Option<PayoutStatus>,
    ) -> Result<Vec<Payout>, AppError> {
        caller.require_admin()?;
        self.repo
            .list_payouts(PayoutFilter {
                organizer_id: None,
                status,
            })
            .await
    }

    /// Approves or rejects a batch of pending payouts, all or nothing,
    /// then notifies each organizer by email.
    ///
    /// # Errors
    ///
    /// [`AppError::Forbidden`] for non-admins, [`AppError::InvalidRequest`]
    /// for an unknown action, an empty or duplicated id list, or when any
    /// payout is not pending, [`AppError::NotFound`] for unknown ids.
    pub async fn bulk_process(
        &self,
        caller: &AuthUser,
        ids: &[PayoutId],
        action: &str,
        note: Option<String>,
    ) -> Result<Vec<Payout>, AppError> {
        caller.require_admin()?;
        let action: BulkAction = action.parse()?;
        if ids.is_empty() {
            return Err(AppError::InvalidRequest("payout_ids must not be empty".into()));
        }
        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(AppError::InvalidRequest(format!("payout {dup} listed twice")));
        }
        let note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let updated = self
            .repo
            .transition_payouts(
                ids,
                PayoutStatus::Pending,
                action.target_status(),
                note,
                Utc::now(),
            )
            .await?;
        tracing::info!(
            admin = %caller.id,
            %action,
            count = updated.len(),
            "payouts processed"
        );

        self.notify(&updated, action).await;
        Ok(updated)
    }

    async fn notify(&self, payouts: &[Payout], action: BulkAction) {
        let mut organizers: HashMap<UserId, Option<User>> = HashMap::new();
        for payout in payouts {
            if !organizers.contains_key(&payout.organizer_id) {
                let user = match self.repo.find_user(payout.organizer_id).await {
                    Ok(user) => user,
                    Err(e) => {
                        tracing::warn!(payout_id = %payout.id, error = %e, "organizer lookup failed");
                        None
                    }
                };
                organizers.insert(payout.organizer_id, user);
            }
            let Some(Some(organizer)) = organizers.get(&payout.organizer_id) else {
                continue;
            };

            let message = match action {
                BulkAction::Approve => templates::payout_approved(
                    &organizer.email,
                    &organizer.name,
                    payout.amount,
                    &format!("{} {}", payout.bank_name, mask(&payout.account_number)),
                ),
                BulkAction::Reject => templates::payout_rejected(
                    &organizer.email,
                    &organizer.name,
                    payout.amount,
                    payout.note.as_deref(),
                ),
            };
            send_best_effort(self.mailer.as_ref(), message).await;
        }
    }

    async fn load_user(&self, id: UserId) -> Result<User, AppError> {
        self.repo
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("account no longer exists".into()))
    }
}

/// `******6789`
fn mask(account_number: &str) -> String {
    let visible = account_number.len().saturating_sub(4);
    account_number
        .char_indices()
        .map(|(i, c)| if i < visible { '*' } else { c })
        .collect()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{PaymentStatus, Role};
    use crate::service::test_support::{Harness, event_input};
    use crate::service::{CartItem, CheckoutOutcome};

    /// An organizer who has sold two tickets (930 000 earned).
    async fn earning_organizer(h: &Harness) -> AuthUser {
        let org = h.organizer("org@example.com").await;
        let Ok(details) = h.events.create_event(&org, event_input(false)).await else {
            panic!("create failed");
        };
        assert!(h.events.publish(&org, details.event.id).await.is_ok());
        let Some(tt) = details.ticket_types.first() else {
            panic!("no ticket type");
        };
        let buyer = h.user("fan@example.com", Role::User).await;
        let items = [CartItem {
            ticket_type_id: tt.id,
            quantity: 2,
        }];
        let Ok(CheckoutOutcome::AwaitingPayment { reference, .. }) = h
            .checkout
            .checkout(&buyer, details.event.id, &items, 1_025_000)
            .await
        else {
            panic!("checkout failed");
        };
        let Ok(settled) = h.checkout.verify(&buyer, &reference).await else {
            panic!("verify failed");
        };
        assert_eq!(settled.payment.status, PaymentStatus::Success);
        org
    }

    #[test]
    fn actions_parse_strictly() {
        assert_eq!("approve".parse::<BulkAction>().ok(), Some(BulkAction::Approve));
        assert_eq!("reject".parse::<BulkAction>().ok(), Some(BulkAction::Reject));
        assert!("APPROVE".parse::<BulkAction>().is_err());
        assert!("delete".parse::<BulkAction>().is_err());
    }

    #[test]
    fn account_numbers_are_masked() {
        assert_eq!(mask("0123456789"), "******6789");
        assert_eq!(mask("12"), "12");
    }

    #[tokio::test]
    async fn payout_request_checks_balance() {
        let h = Harness::new();
        let org = earning_organizer(&h).await;

        assert!(matches!(
            h.payouts.request_payout(&org, 0).await,
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            h.payouts.request_payout(&org, 930_001).await,
            Err(AppError::InvalidRequest(_))
        ));
        let Ok(payout) = h.payouts.request_payout(&org, 900_000).await else {
            panic!("payout failed");
        };
        assert_eq!(payout.status, PayoutStatus::Pending);
        assert_eq!(payout.account_number, "0123456789");

        let Ok(balance) = h.payouts.balance(&org).await else {
            panic!("balance failed");
        };
        assert_eq!(balance.pending, 900_000);
        assert_eq!(balance.available(), 30_000);
    }

    #[tokio::test]
    async fn plain_users_cannot_request_payouts() {
        let h = Harness::new();
        let fan = h.user("fan@example.com", Role::User).await;
        assert!(matches!(
            h.payouts.request_payout(&fan, 100).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn bulk_approve_notifies_organizers() {
        let h = Harness::new();
        let org = earning_organizer(&h).await;
        let admin = h.user("root@example.com", Role::Admin).await;
        let (Ok(a), Ok(b)) = (
            h.payouts.request_payout(&org, 100_000).await,
            h.payouts.request_payout(&org, 200_000).await,
        ) else {
            panic!("payout failed");
        };

        let Ok(updated) = h
            .payouts
            .bulk_process(&admin, &[a.id, b.id], "approve", Some("  paid  ".into()))
            .await
        else {
            panic!("bulk approve failed");
        };
        assert_eq!(updated.len(), 2);
        assert!(updated.iter().all(|p| p.status == PayoutStatus::Approved));
        assert!(updated.iter().all(|p| p.note.as_deref() == Some("paid")));
        assert!(updated.iter().all(|p| p.processed_at.is_some()));

        let approved = h
            .mailer
            .sent_to("org@example.com")
            .await
            .into_iter()
            .filter(|m| m.subject.contains("approved"))
            .count();
        assert_eq!(approved, 2);

        let Ok(balance) = h.payouts.balance(&org).await else {
            panic!("balance failed");
        };
        assert_eq!(balance.withdrawn, 300_000);
        assert_eq!(balance.pending, 0);
    }

    #[tokio::test]
    async fn mixed_batch_changes_nothing() {
        let h = Harness::new();
        let org = earning_organizer(&h).await;
        let admin = h.user("root@example.com", Role::Admin).await;
        let mut ids = Vec::new();
        for amount in [100_000, 100_000, 100_000] {
            let Ok(p) = h.payouts.request_payout(&org, amount).await else {
                panic!("payout failed");
            };
            ids.push(p.id);
        }
        let Some(first) = ids.first().copied() else {
            panic!("no ids");
        };
        assert!(h.payouts.bulk_process(&admin, &[first], "reject", None).await.is_ok());

        let result = h.payouts.bulk_process(&admin, &ids, "approve", None).await;
        let Err(err) = result else {
            panic!("mixed batch must fail");
        };
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let Ok(pending) = h.payouts.admin_list(&admin, Some(PayoutStatus::Pending)).await else {
            panic!("list failed");
        };
        assert_eq!(pending.len(), 2);
        let Ok(approved) = h.payouts.admin_list(&admin, Some(PayoutStatus::Approved)).await else {
            panic!("list failed");
        };
        assert!(approved.is_empty());
    }

    #[tokio::test]
    async fn bulk_rejects_bad_input() {
        let h = Harness::new();
        let org = earning_organizer(&h).await;
        let admin = h.user("root@example.com", Role::Admin).await;
        let Ok(p) = h.payouts.request_payout(&org, 1_000).await else {
            panic!("payout failed");
        };

        assert!(matches!(
            h.payouts.bulk_process(&org, &[p.id], "approve", None).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            h.payouts.bulk_process(&admin, &[p.id], "archive", None).await,
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            h.payouts.bulk_process(&admin, &[], "approve", None).await,
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            h.payouts.bulk_process(&admin, &[p.id, p.id], "approve", None).await,
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            h.payouts
                .bulk_process(&admin, &[p.id, PayoutId::new()], "approve", None)
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn mail_failure_does_not_fail_the_batch() {
        let h = Harness::new();
        let org = earning_organizer(&h).await;
        let admin = h.user("root@example.com", Role::Admin).await;
        let Ok(p) = h.payouts.request_payout(&org, 1_000).await else {
            panic!("payout failed");
        };
        h.mailer.set_failing(true);
        let Ok(updated) = h.payouts.bulk_process(&admin, &[p.id], "reject", None).await else {
            panic!("batch failed");
        };
        assert_eq!(updated.first().map(|p| p.status), Some(PayoutStatus::Rejected));
    }
}
