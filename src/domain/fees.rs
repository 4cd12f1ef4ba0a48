//! Settlement breakdown of a ticket purchase.
//!
//! Given a ticket subtotal in minor currency units (kobo), the
//! [`FeeSchedule`] computes the processor fee charged on top of the
//! subtotal and splits the subtotal between the platform and the event
//! organizer:
//!
//! ```text
//! processor_fee = min(round(subtotal × 1.5%) + (subtotal ≥ 250 000 ? 10 000 : 0), 200 000)
//! total_amount  = subtotal + processor_fee
//! platform      = round(subtotal × 7%)
//! organizer     = subtotal − platform
//! ```
//!
//! All arithmetic is integer basis-point math with half-up rounding, so
//! `organizer_amount + platform_amount == subtotal` holds exactly.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Basis-point denominator (`10_000` bps = 100%).
const BPS_DENOMINATOR: i64 = 10_000;

/// Errors raised by fee computation and amount validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeeError {
    /// Amounts are never negative.
    #[error("amount must not be negative: {0}")]
    NegativeAmount(i64),

    /// Intermediate arithmetic exceeded `i64`.
    #[error("amount too large to settle")]
    Overflow,

    /// Client-submitted amount disagrees with the server calculation.
    #[error("amount mismatch: expected {expected}, got {submitted}")]
    AmountMismatch {
        /// Server-calculated amount.
        expected: i64,
        /// Amount submitted by the client or reported by the gateway.
        submitted: i64,
    },
}

/// Business constants governing fees and the platform share.
///
/// Rates are in basis points; amounts in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FeeSchedule {
    /// Processor fee rate (150 bps = 1.5%).
    pub processor_rate_bps: i64,
    /// Subtotal from which the flat surcharge applies.
    pub surcharge_threshold: i64,
    /// Flat surcharge added to the processor fee above the threshold.
    pub surcharge: i64,
    /// Upper bound of the processor fee.
    pub processor_fee_cap: i64,
    /// Platform share of the subtotal (700 bps = 7%).
    pub platform_rate_bps: i64,
    /// Largest accepted difference between submitted and computed amounts.
    pub amount_tolerance: i64,
}

impl FeeSchedule {
    /// The schedule applied to every purchase.
    pub const STANDARD: Self = Self {
        processor_rate_bps: 150,
        surcharge_threshold: 250_000,
        surcharge: 10_000,
        processor_fee_cap: 200_000,
        platform_rate_bps: 700,
        amount_tolerance: 100,
    };

    /// Processor fee charged on top of `subtotal`.
    ///
    /// # Errors
    ///
    /// Returns [`FeeError::NegativeAmount`] for a negative subtotal and
    /// [`FeeError::Overflow`] if the subtotal is too large to price.
    pub fn processor_fee(&self, subtotal: i64) -> Result<i64, FeeError> {
        let mut fee = apply_rate(subtotal, self.processor_rate_bps)?;
        if subtotal >= self.surcharge_threshold {
            fee = fee.checked_add(self.surcharge).ok_or(FeeError::Overflow)?;
        }
        Ok(fee.min(self.processor_fee_cap))
    }

    /// Portion of `subtotal` retained by the platform.
    ///
    /// # Errors
    ///
    /// Same as [`FeeSchedule::processor_fee`].
    pub fn platform_share(&self, subtotal: i64) -> Result<i64, FeeError> {
        apply_rate(subtotal, self.platform_rate_bps)
    }

    /// Full breakdown of a purchase with the given subtotal.
    ///
    /// # Errors
    ///
    /// Same as [`FeeSchedule::processor_fee`].
    pub fn breakdown(&self, subtotal: i64) -> Result<PaymentBreakdown, FeeError> {
        let processor_fee = self.processor_fee(subtotal)?;
        let platform_amount = self.platform_share(subtotal)?;
        let total_amount = subtotal
            .checked_add(processor_fee)
            .ok_or(FeeError::Overflow)?;

        Ok(PaymentBreakdown {
            subtotal,
            processor_fee,
            total_amount,
            organizer_amount: subtotal - platform_amount,
            platform_amount,
        })
    }

    /// Returns `true` if `submitted` is within tolerance of `expected`.
    #[must_use]
    pub fn within_tolerance(&self, expected: i64, submitted: i64) -> bool {
        expected.abs_diff(submitted) <= self.amount_tolerance.unsigned_abs()
    }

    /// Rejects a submitted amount that is outside tolerance of `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`FeeError::AmountMismatch`] when the amounts differ by more
    /// than [`FeeSchedule::amount_tolerance`].
    pub fn ensure_amount_matches(&self, expected: i64, submitted: i64) -> Result<(), FeeError> {
        if self.within_tolerance(expected, submitted) {
            Ok(())
        } else {
            Err(FeeError::AmountMismatch {
                expected,
                submitted,
            })
        }
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// How a purchase total splits between payer, processor, platform and
/// organizer. All fields are minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentBreakdown {
    /// Sum of ticket prices.
    pub subtotal: i64,
    /// Processor fee paid by the buyer on top of the subtotal.
    pub processor_fee: i64,
    /// Amount charged to the buyer.
    pub total_amount: i64,
    /// Organizer proceeds.
    pub organizer_amount: i64,
    /// Platform share.
    pub platform_amount: i64,
}

/// `round(amount × bps / 10 000)`, half-up, for non-negative amounts.
fn apply_rate(amount: i64, bps: i64) -> Result<i64, FeeError> {
    if amount < 0 {
        return Err(FeeError::NegativeAmount(amount));
    }
    amount
        .checked_mul(bps)
        .and_then(|scaled| scaled.checked_add(BPS_DENOMINATOR / 2))
        .map(|scaled| scaled / BPS_DENOMINATOR)
        .ok_or(FeeError::Overflow)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FEES: FeeSchedule = FeeSchedule::STANDARD;

    fn breakdown(subtotal: i64) -> PaymentBreakdown {
        let Ok(b) = FEES.breakdown(subtotal) else {
            panic!("breakdown failed for {subtotal}");
        };
        b
    }

    /// `round(subtotal * 0.015)` computed independently in floating point.
    fn reference_fee(subtotal: i64) -> i64 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let fee = (subtotal as f64 * 0.015).round() as i64;
        fee
    }

    #[test]
    fn zero_subtotal_is_free() {
        let b = breakdown(0);
        assert_eq!(b.processor_fee, 0);
        assert_eq!(b.total_amount, 0);
        assert_eq!(b.organizer_amount, 0);
        assert_eq!(b.platform_amount, 0);
    }

    #[test]
    fn small_purchase_has_percentage_fee_only() {
        // ₦1,000.00
        let b = breakdown(100_000);
        assert_eq!(b.processor_fee, 1_500);
        assert_eq!(b.total_amount, 101_500);
        assert_eq!(b.platform_amount, 7_000);
        assert_eq!(b.organizer_amount, 93_000);
    }

    #[test]
    fn surcharge_starts_at_threshold() {
        assert_eq!(FEES.processor_fee(249_999), Ok(3_750));
        assert_eq!(FEES.processor_fee(250_000), Ok(3_750 + 10_000));
    }

    #[test]
    fn fee_is_capped() {
        // 1.5% of ₦200,000 = 300,000 kobo, capped at 200,000.
        assert_eq!(FEES.processor_fee(20_000_000), Ok(200_000));
        // Just below the cap.
        assert_eq!(FEES.processor_fee(12_600_000), Ok(199_000));
    }

    #[test]
    fn rounding_is_half_up() {
        // 100 × 1.5% = 1.5 → 2
        assert_eq!(FEES.processor_fee(100), Ok(2));
        // 33 × 1.5% = 0.495 → 0
        assert_eq!(FEES.processor_fee(33), Ok(0));
        // 50 × 7% = 3.5 → 4
        assert_eq!(FEES.platform_share(50), Ok(4));
    }

    #[test]
    fn negative_subtotal_rejected() {
        assert_eq!(FEES.breakdown(-1), Err(FeeError::NegativeAmount(-1)));
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(FEES.breakdown(i64::MAX), Err(FeeError::Overflow));
    }

    #[test]
    fn tolerance_boundary() {
        assert!(FEES.within_tolerance(10_000, 10_100));
        assert!(FEES.within_tolerance(10_000, 9_900));
        assert!(!FEES.within_tolerance(10_000, 10_101));
        assert!(!FEES.within_tolerance(10_000, 9_899));
        assert_eq!(
            FEES.ensure_amount_matches(10_000, 10_101),
            Err(FeeError::AmountMismatch {
                expected: 10_000,
                submitted: 10_101
            })
        );
    }

    proptest! {
        #[test]
        fn split_covers_subtotal(subtotal in 0i64..10_000_000_000) {
            let b = breakdown(subtotal);
            prop_assert_eq!(b.organizer_amount + b.platform_amount, subtotal);
            prop_assert!(b.organizer_amount >= 0);
            prop_assert!(b.platform_amount >= 0);
        }

        #[test]
        fn total_is_subtotal_plus_fee(subtotal in 0i64..10_000_000_000) {
            let b = breakdown(subtotal);
            prop_assert_eq!(b.total_amount, b.subtotal + b.processor_fee);
        }

        #[test]
        fn fee_below_threshold(subtotal in 0i64..250_000) {
            prop_assert_eq!(breakdown(subtotal).processor_fee, reference_fee(subtotal));
        }

        #[test]
        fn fee_at_or_above_threshold(subtotal in 250_000i64..100_000_000) {
            let expected = (reference_fee(subtotal) + 10_000).min(200_000);
            prop_assert_eq!(breakdown(subtotal).processor_fee, expected);
        }

        #[test]
        fn tolerance_is_symmetric(expected in 0i64..1_000_000, delta in -300i64..300) {
            let accepted = FEES.within_tolerance(expected, expected + delta);
            prop_assert_eq!(accepted, delta.abs() <= 100);
            prop_assert_eq!(accepted, FEES.within_tolerance(expected + delta, expected));
        }
    }
}
