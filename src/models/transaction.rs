use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a sale transaction.
///
/// Only `Pending` has outgoing transitions. `Failed` is persisted as a valid
/// value but no operation produces it.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "failed")]
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("transaction is not pending (status: {from})")]
    NotPending { from: TransactionStatus },
    #[error("only pending transactions can be cancelled (status: {from})")]
    NotCancellable { from: TransactionStatus },
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Status after a successful Complete.
    pub fn complete(self) -> Result<Self, TransitionError> {
        match self {
            Self::Pending => Ok(Self::Completed),
            from => Err(TransitionError::NotPending { from }),
        }
    }

    /// Status after a successful Cancel.
    pub fn cancel(self) -> Result<Self, TransitionError> {
        match self {
            Self::Pending => Ok(Self::Cancelled),
            from => Err(TransitionError::NotCancellable { from }),
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionKind {
    #[sea_orm(string_value = "sale")]
    Sale,
    #[sea_orm(string_value = "purchase")]
    Purchase,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "cash")]
    Cash,
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    #[sea_orm(string_value = "card")]
    Card,
    #[sea_orm(string_value = "financing")]
    Financing,
}

/// Payment information attached to a transaction.
///
/// Every field is optional; which ones are required depends on the
/// [`PaymentMethod`], see [`PaymentDetails::validate_for`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_payment: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financed_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_payment: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financing_term_months: Option<u32>,
    /// Annual rate in percent, e.g. `3.5` for 3.5 %.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_last4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_brand: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentDetailsError {
    #[error("downPayment is required for financing")]
    MissingDownPayment,
    #[error("downPayment must be less than total amount")]
    DownPaymentTooLarge,
    #[error("financingTerms is required for financing")]
    MissingTerm,
    #[error("interestRate cannot be negative")]
    NegativeInterestRate,
    #[error("bankName is required for bank transfer")]
    MissingBankName,
    #[error("cardLast4 must be exactly four digits")]
    InvalidCardLast4,
}

impl PaymentDetails {
    /// Checks the fields `method` depends on against the transaction `amount`.
    pub fn validate_for(&self, method: PaymentMethod, amount: Decimal) -> Result<(), PaymentDetailsError> {
        if let Some(last4) = self.card_last4.as_deref() {
            if last4.len() != 4 || !last4.bytes().all(|b| b.is_ascii_digit()) {
                return Err(PaymentDetailsError::InvalidCardLast4);
            }
        }

        match method {
            PaymentMethod::Financing => {
                let down = self
                    .down_payment
                    .filter(|d| *d > Decimal::ZERO)
                    .ok_or(PaymentDetailsError::MissingDownPayment)?;
                if down >= amount {
                    return Err(PaymentDetailsError::DownPaymentTooLarge);
                }
                if !matches!(self.financing_term_months, Some(n) if n > 0) {
                    return Err(PaymentDetailsError::MissingTerm);
                }
                if matches!(self.interest_rate, Some(r) if r < Decimal::ZERO) {
                    return Err(PaymentDetailsError::NegativeInterestRate);
                }
            }
            PaymentMethod::BankTransfer => {
                let has_bank = self
                    .bank_name
                    .as_deref()
                    .map(|b| !b.trim().is_empty())
                    .unwrap_or(false);
                if !has_bank {
                    return Err(PaymentDetailsError::MissingBankName);
                }
            }
            PaymentMethod::Cash | PaymentMethod::Card => {}
        }

        Ok(())
    }

    /// Overlays every field set in `other` onto `self`.
    pub fn merge(&mut self, other: PaymentDetails) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        overlay!(
            transaction_reference,
            paid_at,
            down_payment,
            financed_amount,
            monthly_payment,
            financing_term_months,
            interest_rate,
            bank_name,
            account_number,
            card_last4,
            card_brand
        );
    }
}
