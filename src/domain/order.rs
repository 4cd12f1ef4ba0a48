//! Checkout line items.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::TicketTypeId;

/// Largest quantity of a single ticket type per order.
pub const MAX_QUANTITY_PER_LINE: u32 = 10;

/// One priced line of an order, frozen at checkout time and stored with the
/// payment so tickets can be issued on settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderLine {
    /// Ticket type being purchased.
    pub ticket_type_id: TicketTypeId,
    /// Ticket type name at checkout time.
    pub name: String,
    /// Unit price in minor units.
    pub unit_price: i64,
    /// Number of tickets.
    pub quantity: u32,
}

impl OrderLine {
    /// `unit_price × quantity`, or `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<i64> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

/// Sum of all line totals, or `None` on overflow.
#[must_use]
pub fn subtotal(lines: &[OrderLine]) -> Option<i64> {
    lines
        .iter()
        .try_fold(0i64, |acc, line| acc.checked_add(line.line_total()?))
}

/// Total number of tickets across all lines.
#[must_use]
pub fn ticket_count(lines: &[OrderLine]) -> u32 {
    lines.iter().map(|l| l.quantity).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: u32) -> OrderLine {
        OrderLine {
            ticket_type_id: TicketTypeId::new(),
            name: "Regular".to_string(),
            unit_price: price,
            quantity,
        }
    }

    #[test]
    fn subtotal_sums_lines() {
        let lines = vec![line(500_000, 2), line(250_000, 1)];
        assert_eq!(subtotal(&lines), Some(1_250_000));
        assert_eq!(ticket_count(&lines), 3);
    }

    #[test]
    fn subtotal_of_nothing_is_zero() {
        assert_eq!(subtotal(&[]), Some(0));
    }

    #[test]
    fn subtotal_overflow_is_none() {
        let lines = vec![line(i64::MAX, 2)];
        assert_eq!(subtotal(&lines), None);
    }
}
