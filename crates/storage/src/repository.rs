//! In-memory Repository Implementation

use crate::{
    ContactId, ContactStore, ContactUpdate, EmergencyContact, EmergencyPreferences, NewContact, PreferenceStore,
    StoreError, UserId, UserRecord, UserStore, DEFAULT_RELATIONSHIP,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Repository holding users, contacts and preferences in process memory
pub struct InMemoryRepository {
    users: Mutex<HashMap<UserId, UserRecord>>,
    /// Contacts in creation order
    contacts: Mutex<Vec<EmergencyContact>>,
    preferences: Mutex<HashMap<UserId, EmergencyPreferences>>,
    languages: Mutex<HashMap<UserId, String>>,
    next_contact_id: Mutex<ContactId>,
    /// Simulated outage: every call fails while set
    unavailable: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|e| StoreError::Database(format!("Lock error: {}", e)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl InMemoryRepository {
    pub fn new() -> Self {
        info!("Creating in-memory repository");
        Self {
            users: Mutex::new(HashMap::new()),
            contacts: Mutex::new(Vec::new()),
            preferences: Mutex::new(HashMap::new()),
            languages: Mutex::new(HashMap::new()),
            next_contact_id: Mutex::new(1),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Insert or replace a user
    pub fn upsert_user(&self, user: UserRecord) -> Result<(), StoreError> {
        self.check_available()?;
        lock(&self.users)?.insert(user.id, user);
        Ok(())
    }

    /// Set the notification language of a user
    pub fn set_language(&self, user_id: UserId, language: impl Into<String>) -> Result<(), StoreError> {
        self.check_available()?;
        lock(&self.languages)?.insert(user_id, language.into());
        Ok(())
    }

    /// Make every subsequent call fail with a database error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Database("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    fn next_id(&self) -> Result<ContactId, StoreError> {
        let mut id = lock(&self.next_contact_id)?;
        let next = *id;
        *id += 1;
        Ok(next)
    }

    fn clear_primary(contacts: &mut [EmergencyContact], user_id: UserId, keep: ContactId) {
        for contact in contacts.iter_mut().filter(|c| c.user_id == user_id && c.id != keep) {
            contact.is_primary = false;
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for InMemoryRepository {
    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>, StoreError> {
        self.check_available()?;
        Ok(lock(&self.users)?.get(&user_id).cloned())
    }

    async fn delete_user(&self, user_id: UserId) -> Result<(), StoreError> {
        self.check_available()?;
        if lock(&self.users)?.remove(&user_id).is_none() {
            return Err(StoreError::user_not_found(user_id));
        }
        lock(&self.contacts)?.retain(|c| c.user_id != user_id);
        lock(&self.preferences)?.remove(&user_id);
        lock(&self.languages)?.remove(&user_id);
        info!(user_id, "Deleted user with contacts and preferences");
        Ok(())
    }
}

#[async_trait]
impl ContactStore for InMemoryRepository {
    async fn get_emergency_contacts(&self, user_id: UserId) -> Result<Vec<EmergencyContact>, StoreError> {
        self.check_available()?;
        let mut contacts: Vec<EmergencyContact> = lock(&self.contacts)?
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        // Stable: creation order is kept within each group
        contacts.sort_by_key(|c| !c.is_primary);
        Ok(contacts)
    }

    async fn get_primary_contact(&self, user_id: UserId) -> Result<Option<EmergencyContact>, StoreError> {
        self.check_available()?;
        Ok(lock(&self.contacts)?
            .iter()
            .find(|c| c.user_id == user_id && c.is_primary)
            .cloned())
    }

    async fn create_contact(&self, user_id: UserId, contact: NewContact) -> Result<EmergencyContact, StoreError> {
        self.check_available()?;
        let name = contact.name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::Invalid("contact name is required".to_string()));
        }

        let record = EmergencyContact {
            id: self.next_id()?,
            user_id,
            name,
            phone: non_blank(contact.phone),
            email: non_blank(contact.email),
            relationship: non_blank(contact.relationship).unwrap_or_else(|| DEFAULT_RELATIONSHIP.to_string()),
            is_primary: contact.is_primary,
            notify_on_critical: contact.notify_on_critical.unwrap_or(true),
            created_at: Utc::now(),
        };

        let mut contacts = lock(&self.contacts)?;
        if record.is_primary {
            Self::clear_primary(&mut contacts, user_id, record.id);
        }
        contacts.push(record.clone());
        debug!(user_id, contact_id = record.id, "Created emergency contact");
        Ok(record)
    }

    async fn update_contact(
        &self,
        user_id: UserId,
        contact_id: ContactId,
        update: ContactUpdate,
    ) -> Result<EmergencyContact, StoreError> {
        self.check_available()?;
        let mut contacts = lock(&self.contacts)?;
        let contact = contacts
            .iter_mut()
            .find(|c| c.id == contact_id && c.user_id == user_id)
            .ok_or_else(|| StoreError::contact_not_found(contact_id))?;

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(StoreError::Invalid("contact name is required".to_string()));
            }
            contact.name = name;
        }
        if let Some(phone) = update.phone {
            contact.phone = non_blank(Some(phone));
        }
        if let Some(email) = update.email {
            contact.email = non_blank(Some(email));
        }
        if let Some(relationship) = update.relationship {
            contact.relationship = non_blank(Some(relationship)).unwrap_or_else(|| DEFAULT_RELATIONSHIP.to_string());
        }
        if let Some(notify) = update.notify_on_critical {
            contact.notify_on_critical = notify;
        }
        if let Some(primary) = update.is_primary {
            contact.is_primary = primary;
        }

        let updated = contact.clone();
        if updated.is_primary {
            Self::clear_primary(&mut contacts, user_id, contact_id);
        }
        debug!(user_id, contact_id, "Updated emergency contact");
        Ok(updated)
    }

    async fn delete_contact(&self, user_id: UserId, contact_id: ContactId) -> Result<(), StoreError> {
        self.check_available()?;
        let mut contacts = lock(&self.contacts)?;
        let before = contacts.len();
        contacts.retain(|c| !(c.id == contact_id && c.user_id == user_id));
        if contacts.len() == before {
            return Err(StoreError::contact_not_found(contact_id));
        }
        debug!(user_id, contact_id, "Deleted emergency contact");
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for InMemoryRepository {
    async fn get_preferences(&self, user_id: UserId) -> Result<Option<EmergencyPreferences>, StoreError> {
        self.check_available()?;
        Ok(lock(&self.preferences)?.get(&user_id).cloned())
    }

    async fn upsert_preferences(
        &self,
        preferences: EmergencyPreferences,
    ) -> Result<EmergencyPreferences, StoreError> {
        self.check_available()?;
        lock(&self.preferences)?.insert(preferences.user_id, preferences.clone());
        Ok(preferences)
    }

    async fn get_language(&self, user_id: UserId) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        Ok(lock(&self.languages)?.get(&user_id).cloned())
    }
}
