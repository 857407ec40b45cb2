use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Listing status of a vehicle. `Sold` is only reached through a completed
/// transaction.
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
pub enum VehicleStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "sold")]
    Sold,
    #[sea_orm(string_value = "archived")]
    Archived,
}

impl VehicleStatus {
    pub fn is_available(self) -> bool {
        self == Self::Active
    }
}
