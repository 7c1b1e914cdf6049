mod entity_service;
mod mark_service;
mod reducer;
mod repository;

pub use entity_service::*;
pub use mark_service::*;
pub use reducer::*;
pub use repository::*;
