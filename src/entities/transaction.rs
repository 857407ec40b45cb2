use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::{PaymentDetails, PaymentMethod, TransactionKind, TransactionStatus};

/// The `transactions` table. Payment details are flattened into nullable
/// columns; rows are never deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,

    pub transaction_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub down_payment: Option<Decimal>,
    pub financed_amount: Option<Decimal>,
    pub monthly_payment: Option<Decimal>,
    pub financing_term_months: Option<i32>,
    pub interest_rate: Option<Decimal>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub card_last4: Option<String>,
    pub card_brand: Option<String>,

    pub inspection_id: Option<Uuid>,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vehicle::Entity",
        from = "Column::VehicleId",
        to = "super::vehicle::Column::Id"
    )]
    Vehicle,
}

impl Related<super::vehicle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicle.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.seller_id == user_id || self.buyer_id == user_id
    }

    /// Reassembles the flattened payment columns.
    pub fn payment_details(&self) -> PaymentDetails {
        PaymentDetails {
            transaction_reference: self.transaction_reference.clone(),
            paid_at: self.paid_at,
            down_payment: self.down_payment,
            financed_amount: self.financed_amount,
            monthly_payment: self.monthly_payment,
            financing_term_months: self
                .financing_term_months
                .and_then(|n| u32::try_from(n).ok()),
            interest_rate: self.interest_rate,
            bank_name: self.bank_name.clone(),
            account_number: self.account_number.clone(),
            card_last4: self.card_last4.clone(),
            card_brand: self.card_brand.clone(),
        }
    }
}

impl ActiveModel {
    /// Writes every payment field of `details` into the active model.
    pub fn set_payment_details(&mut self, details: &PaymentDetails) {
        use sea_orm::ActiveValue::Set;

        self.transaction_reference = Set(details.transaction_reference.clone());
        self.paid_at = Set(details.paid_at);
        self.down_payment = Set(details.down_payment);
        self.financed_amount = Set(details.financed_amount);
        self.monthly_payment = Set(details.monthly_payment);
        self.financing_term_months = Set(details
            .financing_term_months
            .and_then(|n| i32::try_from(n).ok()));
        self.interest_rate = Set(details.interest_rate);
        self.bank_name = Set(details.bank_name.clone());
        self.account_number = Set(details.account_number.clone());
        self.card_last4 = Set(details.card_last4.clone());
        self.card_brand = Set(details.card_brand.clone());
    }
}
