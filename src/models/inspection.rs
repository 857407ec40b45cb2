use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Lifecycle of a vehicle inspection. `Pending` and `Scheduled` are open;
/// `Completed` and `Cancelled` are final.
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
pub enum InspectionStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("inspection is already {from}")]
pub struct InspectionTransitionError {
    pub from: InspectionStatus,
}

impl InspectionStatus {
    pub const OPEN: [InspectionStatus; 2] = [Self::Pending, Self::Scheduled];

    pub fn is_open(self) -> bool {
        Self::OPEN.contains(&self)
    }

    pub fn complete(self) -> Result<Self, InspectionTransitionError> {
        if self.is_open() {
            Ok(Self::Completed)
        } else {
            Err(InspectionTransitionError { from: self })
        }
    }

    pub fn cancel(self) -> Result<Self, InspectionTransitionError> {
        if self.is_open() {
            Ok(Self::Cancelled)
        } else {
            Err(InspectionTransitionError { from: self })
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VehicleCondition {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueSeverity {
    Critical,
    Major,
    Minor,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InspectionIssue {
    /// mechanical, electrical, body, interior, ...
    #[validate(length(min = 1, message = "issue category is required"))]
    pub category: String,
    pub severity: IssueSeverity,
    #[validate(length(min = 1, message = "issue description is required"))]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Findings recorded by the inspector. Scores run from 0 to 100.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InspectionReport {
    pub overall_condition: VehicleCondition,
    #[validate(range(min = 0, max = 100, message = "mechanicalScore must be between 0 and 100"))]
    pub mechanical_score: i32,
    #[validate(range(min = 0, max = 100, message = "exteriorScore must be between 0 and 100"))]
    pub exterior_score: i32,
    #[validate(range(min = 0, max = 100, message = "interiorScore must be between 0 and 100"))]
    pub interior_score: i32,
    #[serde(default)]
    #[validate]
    pub issues: Vec<InspectionIssue>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[validate(custom = "validate_estimated_repairs")]
    pub estimated_repairs: Decimal,
}

impl InspectionReport {
    pub fn has_critical_issues(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == IssueSeverity::Critical)
    }
}

fn validate_estimated_repairs(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        let mut err = ValidationError::new("estimated_repairs");
        err.message = Some("estimatedRepairs cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn report() -> InspectionReport {
        InspectionReport {
            overall_condition: VehicleCondition::Good,
            mechanical_score: 82,
            exterior_score: 75,
            interior_score: 90,
            issues: vec![InspectionIssue {
                category: "body".into(),
                severity: IssueSeverity::Minor,
                description: "scratch on rear bumper".into(),
                location: Some("rear".into()),
            }],
            recommendations: vec!["touch-up paint".into()],
            estimated_repairs: dec!(150),
        }
    }

    #[test]
    fn open_statuses_transition_once() {
        for open in InspectionStatus::OPEN {
            assert_eq!(open.complete(), Ok(InspectionStatus::Completed));
            assert_eq!(open.cancel(), Ok(InspectionStatus::Cancelled));
        }
        for done in [InspectionStatus::Completed, InspectionStatus::Cancelled] {
            assert!(!done.is_open());
            assert_eq!(done.complete(), Err(InspectionTransitionError { from: done }));
            assert_eq!(done.cancel().unwrap_err().to_string(), format!("inspection is already {}", done));
        }
    }

    #[test]
    fn report_validation() {
        assert!(report().validate().is_ok());

        let mut bad = report();
        bad.mechanical_score = 101;
        bad.estimated_repairs = dec!(-1);
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("mechanical_score"));
        assert!(fields.contains_key("estimated_repairs"));

        let mut bad_issue = report();
        bad_issue.issues[0].description = String::new();
        assert!(bad_issue.validate().is_err());
    }

    #[test]
    fn report_json_shape() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["overallCondition"], "good");
        assert_eq!(json["issues"][0]["severity"], "minor");

        let parsed: InspectionReport = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, report());
        assert!(!parsed.has_critical_issues());
    }
}
