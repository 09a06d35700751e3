pub mod handlers;
pub mod lifecycle;
pub mod queries;
pub mod saved;
