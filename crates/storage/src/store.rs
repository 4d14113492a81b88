//! Store contracts

use crate::{
    ContactId, ContactUpdate, EmergencyContact, EmergencyPreferences, NewContact, StoreError, UserId, UserRecord,
};
use async_trait::async_trait;

/// User identity store
#[async_trait]
pub trait UserStore: Send + Sync {
    /// `Ok(None)` when the user does not exist
    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>, StoreError>;

    /// Delete a user together with their contacts and preferences
    async fn delete_user(&self, user_id: UserId) -> Result<(), StoreError>;
}

/// Emergency contact store
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// All contacts of a user, primary first, then in creation order
    async fn get_emergency_contacts(&self, user_id: UserId) -> Result<Vec<EmergencyContact>, StoreError>;

    /// The contact flagged primary, if any
    async fn get_primary_contact(&self, user_id: UserId) -> Result<Option<EmergencyContact>, StoreError>;

    async fn create_contact(&self, user_id: UserId, contact: NewContact) -> Result<EmergencyContact, StoreError>;

    async fn update_contact(
        &self,
        user_id: UserId,
        contact_id: ContactId,
        update: ContactUpdate,
    ) -> Result<EmergencyContact, StoreError>;

    async fn delete_contact(&self, user_id: UserId, contact_id: ContactId) -> Result<(), StoreError>;
}

/// Emergency alert preference store, one row per user
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get_preferences(&self, user_id: UserId) -> Result<Option<EmergencyPreferences>, StoreError>;

    /// Insert or replace the user's row
    async fn upsert_preferences(&self, preferences: EmergencyPreferences)
        -> Result<EmergencyPreferences, StoreError>;

    /// Notification language code, if the user picked one
    async fn get_language(&self, user_id: UserId) -> Result<Option<String>, StoreError>;
}
