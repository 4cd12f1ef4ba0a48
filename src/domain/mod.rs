//! Domain layer: identifiers, lifecycle states, and the settlement math.
//!
//! Nothing here touches the database or the network. The fee calculator in
//! [`fees`] is the single source of truth for how a purchase total splits
//! between processor, platform and organizer.

pub mod fees;
pub mod ids;
pub mod order;
pub mod status;
pub mod validation;

pub use fees::{FeeError, FeeSchedule, PaymentBreakdown};
pub use ids::{EventId, PaymentId, PayoutId, TicketId, TicketTypeId, UserId};
pub use order::OrderLine;
pub use status::{EventStatus, PaymentStatus, PayoutStatus, Role, TicketStatus, TokenPurpose};
pub use validation::FieldErrors;
