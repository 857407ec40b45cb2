pub mod inspection;
pub mod transaction;
pub mod vehicle;
