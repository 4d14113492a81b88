//! Storage Layer
//!
//! Store contracts for users, emergency contacts and emergency-alert
//! preferences, an in-memory repository implementing them, and the
//! fail-open resolvers used by the alert pipeline.

mod models;
mod repository;
mod resolver;
mod store;

pub use models::{
    Channel, ContactUpdate, EmergencyContact, EmergencyPreferences, NewContact, PreferenceUpdate, UserRecord,
    DEFAULT_RELATIONSHIP,
};
pub use repository::InMemoryRepository;
pub use resolver::{ContactResolver, PreferenceResolver};
pub use store::{ContactStore, PreferenceStore, UserStore};

use thiserror::Error;

/// User identifier
pub type UserId = i64;

/// Emergency contact identifier
pub type ContactId = i64;

/// Storage errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("Invalid record: {0}")]
    Invalid(String),
}

impl StoreError {
    pub fn user_not_found(id: UserId) -> Self {
        StoreError::NotFound { entity: "User", id }
    }

    pub fn contact_not_found(id: ContactId) -> Self {
        StoreError::NotFound {
            entity: "Contact",
            id,
        }
    }
}
