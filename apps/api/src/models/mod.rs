pub mod application;
pub mod job;
pub mod organization;
pub mod user;
