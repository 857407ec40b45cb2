//! Domain types shared by the entities, services and CLI.

pub mod inspection;
pub mod transaction;
pub mod vehicle;

pub use inspection::{
    InspectionIssue, InspectionReport, InspectionStatus, InspectionTransitionError,
    IssueSeverity, VehicleCondition,
};
pub use transaction::{
    PaymentDetails, PaymentDetailsError, PaymentMethod, TransactionKind, TransactionStatus,
    TransitionError,
};
pub use vehicle::VehicleStatus;
