//! Amortised loan arithmetic for financed purchases.

use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::PaymentDetails;

const MONTHS_PER_YEAR: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FinancingError {
    #[error("financing term must be at least one month")]
    ZeroTerm,
    #[error("interest rate cannot be negative")]
    NegativeRate,
    #[error("down payment cannot be negative")]
    NegativeDownPayment,
    #[error("down payment must be less than the amount")]
    NothingToFinance,
    #[error("financing amounts are too large to compute")]
    Overflow,
}

/// Result of [`calculate_financing`]. Money values are in the transaction
/// currency; `monthly_payment` is rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancingQuote {
    pub financed_amount: Decimal,
    pub monthly_payment: Decimal,
    pub term_months: u32,
    /// Down payment plus every installment.
    pub total_paid: Decimal,
    /// Installments minus the financed amount, never negative.
    pub total_interest: Decimal,
}

/// Computes the financed principal and the fixed monthly installment.
///
/// `annual_rate_percent` is the nominal yearly rate in percent. For a zero
/// rate the principal is split evenly across the term. The principal
/// (`amount - down_payment`) must be positive.
pub fn calculate_financing(
    amount: Decimal,
    down_payment: Decimal,
    term_months: u32,
    annual_rate_percent: Decimal,
) -> Result<FinancingQuote, FinancingError> {
    if term_months == 0 {
        return Err(FinancingError::ZeroTerm);
    }
    if annual_rate_percent.is_sign_negative() && !annual_rate_percent.is_zero() {
        return Err(FinancingError::NegativeRate);
    }
    if down_payment.is_sign_negative() && !down_payment.is_zero() {
        return Err(FinancingError::NegativeDownPayment);
    }

    let principal = amount
        .checked_sub(down_payment)
        .ok_or(FinancingError::Overflow)?;
    if principal <= Decimal::ZERO {
        return Err(FinancingError::NothingToFinance);
    }
    let n = Decimal::from(term_months);

    let monthly_rate = annual_rate_percent
        .checked_div(Decimal::ONE_HUNDRED)
        .and_then(|r| r.checked_div(Decimal::from(MONTHS_PER_YEAR)))
        .ok_or(FinancingError::Overflow)?;

    let raw_payment = if monthly_rate > Decimal::ZERO {
        // P * r * (1 + r)^n / ((1 + r)^n - 1)
        let growth = (Decimal::ONE + monthly_rate)
            .checked_powu(u64::from(term_months))
            .ok_or(FinancingError::Overflow)?;
        let denominator = growth - Decimal::ONE;
        principal
            .checked_mul(monthly_rate)
            .and_then(|v| v.checked_mul(growth))
            .and_then(|v| v.checked_div(denominator))
            .ok_or(FinancingError::Overflow)?
    } else {
        principal.checked_div(n).ok_or(FinancingError::Overflow)?
    };

    let monthly_payment =
        raw_payment.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    let installments = monthly_payment
        .checked_mul(n)
        .ok_or(FinancingError::Overflow)?;
    let total_paid = installments
        .checked_add(down_payment)
        .ok_or(FinancingError::Overflow)?;
    let total_interest = (installments - principal).max(Decimal::ZERO);

    Ok(FinancingQuote {
        financed_amount: principal,
        monthly_payment,
        term_months,
        total_paid,
        total_interest,
    })
}

/// Quotes the financing described by already validated payment details.
/// A missing interest rate counts as zero.
pub fn quote_for(details: &PaymentDetails, amount: Decimal) -> Result<FinancingQuote, FinancingError> {
    calculate_financing(
        amount,
        details.down_payment.unwrap_or(Decimal::ZERO),
        details.financing_term_months.unwrap_or(0),
        details.interest_rate.unwrap_or(Decimal::ZERO),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn standard_auto_loan() {
        let quote = calculate_financing(dec!(30000), dec!(10000), 60, dec!(3.5)).unwrap();
        assert_eq!(quote.financed_amount, dec!(20000));
        assert_eq!(quote.monthly_payment, dec!(363.83));
        assert_eq!(quote.term_months, 60);
        assert_eq!(quote.total_paid, dec!(10000) + dec!(363.83) * dec!(60));
        assert!(quote.total_interest > dec!(1800) && quote.total_interest < dec!(1850));
    }

    #[test]
    fn zero_rate_splits_evenly() {
        let quote = calculate_financing(dec!(12000), dec!(0), 12, dec!(0)).unwrap();
        assert_eq!(quote.financed_amount, dec!(12000));
        assert_eq!(quote.monthly_payment, dec!(1000));
        assert_eq!(quote.total_interest, dec!(0));
    }

    #[test]
    fn zero_rate_rounding_never_reports_negative_interest() {
        let quote = calculate_financing(dec!(10000), dec!(0), 3, dec!(0)).unwrap();
        assert_eq!(quote.monthly_payment, dec!(3333.33));
        assert_eq!(quote.total_interest, dec!(0));
    }

    #[test]
    fn zero_term_is_rejected() {
        assert_eq!(
            calculate_financing(dec!(1000), dec!(100), 0, dec!(5)),
            Err(FinancingError::ZeroTerm)
        );
    }

    #[test]
    fn negative_rate_is_rejected() {
        assert_eq!(
            calculate_financing(dec!(12000), dec!(0), 12, dec!(-5)),
            Err(FinancingError::NegativeRate)
        );
    }

    #[test]
    fn negative_down_payment_is_rejected() {
        assert_eq!(
            calculate_financing(dec!(12000), dec!(-100), 12, dec!(5)),
            Err(FinancingError::NegativeDownPayment)
        );
    }

    #[test]
    fn down_payment_must_leave_a_principal() {
        assert_eq!(
            calculate_financing(dec!(1000), dec!(5000), 12, dec!(5)),
            Err(FinancingError::NothingToFinance)
        );
        assert_eq!(
            calculate_financing(dec!(1000), dec!(1000), 12, dec!(5)),
            Err(FinancingError::NothingToFinance)
        );
    }

    #[test]
    fn quote_for_treats_missing_rate_as_zero() {
        let details = PaymentDetails {
            down_payment: Some(dec!(2000)),
            financing_term_months: Some(10),
            ..Default::default()
        };
        let quote = quote_for(&details, dec!(12000)).unwrap();
        assert_eq!(quote.financed_amount, dec!(10000));
        assert_eq!(quote.monthly_payment, dec!(1000));
    }

    proptest! {
        #[test]
        fn installments_cover_principal(
            amount in 1_000u32..1_000_000,
            down_pct in 1u32..90,
            term in 1u32..=120,
            rate_bp in 0u32..=2500,
        ) {
            let amount = Decimal::from(amount);
            let down = (amount * Decimal::from(down_pct) / dec!(100)).round_dp(2);
            let rate = Decimal::from(rate_bp) / dec!(100);

            let quote = calculate_financing(amount, down, term, rate).unwrap();
            let n = Decimal::from(term);

            prop_assert_eq!(quote.financed_amount, amount - down);
            prop_assert!(quote.monthly_payment > Decimal::ZERO);
            // Rounding to cents moves each installment by at most half a cent.
            prop_assert!(quote.monthly_payment * n >= quote.financed_amount - dec!(0.005) * n);
            prop_assert!(quote.total_interest >= Decimal::ZERO);
            prop_assert_eq!(quote.monthly_payment.scale() <= 2, true);
        }

        #[test]
        fn higher_rate_never_lowers_payment(
            term in 1u32..=84,
            rate_bp in 0u32..2000,
        ) {
            let low = calculate_financing(dec!(25000), dec!(5000), term, Decimal::from(rate_bp) / dec!(100)).unwrap();
            let high = calculate_financing(dec!(25000), dec!(5000), term, Decimal::from(rate_bp + 100) / dec!(100)).unwrap();
            prop_assert!(high.monthly_payment >= low.monthly_payment);
        }
    }
}
