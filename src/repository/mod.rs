pub mod courses;
pub mod policies;
pub mod timesheets;
pub mod users;
