pub mod approvals;
pub mod dashboard;
pub mod errors;
pub mod queries;
pub mod timesheets;
