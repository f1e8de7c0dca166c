pub mod association;
pub mod entity_service;
pub mod error;
pub mod orchestrator;
pub mod saga;

pub use entity_service::EntityService;
pub use error::ServiceError;
pub use orchestrator::{Attachments, Detailed, Orchestrator};
pub use saga::{Compensation, Saga};
