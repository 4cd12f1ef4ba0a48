//! Roles and lifecycle states stored as text columns.
//!
//! Each enum round-trips through its snake_case string form: serde uses it
//! on the wire, and the persistence layer binds [`as_str`] and decodes rows
//! with `TryFrom<String>`.
//!
//! [`as_str`]: Role::as_str

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error returned when a stored or submitted string names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    /// Enum being parsed (e.g. `"payout status"`).
    pub kind: &'static str,
    /// Offending input.
    pub value: String,
}

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Returns the stored string form.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

text_enum!(
    /// Account role.
    Role, "role" {
        /// Ticket buyer.
        User => "user",
        /// May create events and withdraw settlement proceeds.
        Organizer => "organizer",
        /// Platform administrator.
        Admin => "admin",
    }
);

impl Role {
    /// Returns `true` if this role may create and manage events.
    #[must_use]
    pub const fn can_organize(&self) -> bool {
        matches!(self, Self::Organizer | Self::Admin)
    }

    /// Returns `true` for administrators.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

text_enum!(
    /// Publication state of an event.
    EventStatus, "event status" {
        /// Visible only to its organizer.
        Draft => "draft",
        /// Listed publicly and open for sales.
        Published => "published",
        /// Closed for sales; cannot be re-published.
        Cancelled => "cancelled",
    }
);

text_enum!(
    /// Settlement state of a checkout payment.
    PaymentStatus, "payment status" {
        /// Created, awaiting gateway confirmation.
        Pending => "pending",
        /// Settled; tickets issued.
        Success => "success",
        /// Rejected by the gateway or failed verification.
        Failed => "failed",
    }
);

impl PaymentStatus {
    /// Returns `true` while the payment still holds or owns tickets of
    /// its ticket types (`pending` or `success`).
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Success)
    }
}

text_enum!(
    /// State of an issued ticket.
    TicketStatus, "ticket status" {
        /// Unused, admits entry.
        Valid => "valid",
        /// Checked in at the door.
        Used => "used",
        /// Voided.
        Cancelled => "cancelled",
    }
);

text_enum!(
    /// State of an organizer withdrawal request.
    PayoutStatus, "payout status" {
        /// Awaiting administrator review.
        Pending => "pending",
        /// Approved for transfer.
        Approved => "approved",
        /// Declined; the amount returns to the available balance.
        Rejected => "rejected",
    }
);

text_enum!(
    /// What a one-time emailed token authorizes.
    TokenPurpose, "token purpose" {
        /// Confirms ownership of the account email.
        EmailVerification => "email_verification",
        /// Allows setting a new password.
        PasswordReset => "password_reset",
    }
);
