pub mod collection_handlers;
pub mod file_handlers;
pub mod health_handlers;
pub mod session_handlers;
pub mod tag_handlers;
