//! Fail-open resolvers used on the alert path
//!
//! Read failures degrade to defaults: a store outage must never silently
//! disable emergency alerting. Writes propagate their errors.

use crate::{
    ContactStore, EmergencyContact, EmergencyPreferences, PreferenceStore, PreferenceUpdate, StoreError, UserId,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves emergency alert preferences
#[derive(Clone)]
pub struct PreferenceResolver {
    store: Arc<dyn PreferenceStore>,
}

impl PreferenceResolver {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Stored preferences, or the defaults when absent or unreadable
    pub async fn get_preferences(&self, user_id: UserId) -> EmergencyPreferences {
        match self.store.get_preferences(user_id).await {
            Ok(Some(prefs)) => prefs.normalized(),
            Ok(None) => EmergencyPreferences::defaults(user_id),
            Err(e) => {
                warn!(user_id, error = %e, "Preference lookup failed, using defaults");
                EmergencyPreferences::defaults(user_id)
            }
        }
    }

    /// `true` unless the user explicitly disabled detection
    pub async fn is_detection_enabled(&self, user_id: UserId) -> bool {
        self.get_preferences(user_id).await.enable_detection
    }

    /// Merge the present fields of `update` into the stored (or default) row
    pub async fn update_preferences(
        &self,
        user_id: UserId,
        update: &PreferenceUpdate,
    ) -> Result<EmergencyPreferences, StoreError> {
        let mut prefs = self
            .store
            .get_preferences(user_id)
            .await?
            .unwrap_or_else(|| EmergencyPreferences::defaults(user_id));
        prefs.merge(update);
        let saved = self.store.upsert_preferences(prefs).await?;
        info!(user_id, enable_detection = saved.enable_detection, "Updated emergency preferences");
        Ok(saved)
    }

    /// Persist the defaults on first use, otherwise return the stored row
    pub async fn initialize_preferences(&self, user_id: UserId) -> Result<EmergencyPreferences, StoreError> {
        match self.store.get_preferences(user_id).await? {
            Some(existing) => Ok(existing),
            None => {
                debug!(user_id, "Initializing default emergency preferences");
                self.store
                    .upsert_preferences(EmergencyPreferences::defaults(user_id))
                    .await
            }
        }
    }

    /// Notification language, `None` when unset or unreadable
    pub async fn language(&self, user_id: UserId) -> Option<String> {
        match self.store.get_language(user_id).await {
            Ok(language) => language.filter(|l| !l.trim().is_empty()),
            Err(e) => {
                warn!(user_id, error = %e, "Language lookup failed");
                None
            }
        }
    }
}

/// Resolves the contacts eligible for a critical alert
#[derive(Clone)]
pub struct ContactResolver {
    store: Arc<dyn ContactStore>,
}

impl ContactResolver {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self { store }
    }

    /// Contacts to notify: primary first, each id once, opted-out
    /// contacts removed. Lookup failures yield no contacts.
    pub async fn resolve(&self, user_id: UserId) -> Vec<EmergencyContact> {
        let mut contacts = self.store.get_emergency_contacts(user_id).await.unwrap_or_else(|e| {
            warn!(user_id, error = %e, "Contact lookup failed");
            Vec::new()
        });

        match self.store.get_primary_contact(user_id).await {
            Ok(Some(primary)) if !contacts.iter().any(|c| c.id == primary.id) => contacts.insert(0, primary),
            Ok(_) => {}
            Err(e) => warn!(user_id, error = %e, "Primary contact lookup failed"),
        }

        let total = contacts.len();
        contacts.retain(|c| c.notify_on_critical);
        if contacts.len() < total {
            debug!(user_id, opted_out = total - contacts.len(), "Skipping opted-out contacts");
        }
        contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Channel, ContactId, ContactUpdate, InMemoryRepository, NewContact};
    use async_trait::async_trait;

    /// Contact store whose primary lookup returns a contact missing from the list
    struct SplitContacts;

    fn contact(id: ContactId, primary: bool) -> EmergencyContact {
        EmergencyContact {
            id,
            user_id: 1,
            name: format!("C{}", id),
            phone: None,
            email: None,
            relationship: "other".to_string(),
            is_primary: primary,
            notify_on_critical: true,
            created_at: chrono::Utc::now(),
        }
    }

    #[async_trait]
    impl ContactStore for SplitContacts {
        async fn get_emergency_contacts(&self, _: UserId) -> Result<Vec<EmergencyContact>, StoreError> {
            Ok(vec![contact(2, false), contact(3, false)])
        }

        async fn get_primary_contact(&self, _: UserId) -> Result<Option<EmergencyContact>, StoreError> {
            Ok(Some(contact(9, true)))
        }

        async fn create_contact(&self, _: UserId, _: NewContact) -> Result<EmergencyContact, StoreError> {
            Err(StoreError::Database("read only".to_string()))
        }

        async fn update_contact(
            &self,
            _: UserId,
            _: ContactId,
            _: ContactUpdate,
        ) -> Result<EmergencyContact, StoreError> {
            Err(StoreError::Database("read only".to_string()))
        }

        async fn delete_contact(&self, _: UserId, _: ContactId) -> Result<(), StoreError> {
            Err(StoreError::Database("read only".to_string()))
        }
    }

    #[tokio::test]
    async fn test_never_configured_user_gets_defaults() {
        let repo = Arc::new(InMemoryRepository::new());
        let resolver = PreferenceResolver::new(repo);
        assert_eq!(resolver.get_preferences(7).await, EmergencyPreferences::defaults(7));
    }

    #[tokio::test]
    async fn test_read_failure_fails_open() {
        let repo = Arc::new(InMemoryRepository::new());
        let resolver = PreferenceResolver::new(repo.clone());
        resolver
            .update_preferences(
                1,
                &PreferenceUpdate {
                    enable_detection: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!resolver.is_detection_enabled(1).await);

        repo.set_unavailable(true);
        assert!(resolver.is_detection_enabled(1).await);
        assert_eq!(resolver.get_preferences(1).await, EmergencyPreferences::defaults(1));
        assert_eq!(resolver.language(1).await, None);
    }

    #[tokio::test]
    async fn test_update_is_partial_merge() {
        let repo = Arc::new(InMemoryRepository::new());
        let resolver = PreferenceResolver::new(repo);

        let first = PreferenceUpdate {
            alert_methods: Some(vec![Channel::Whatsapp]),
            ..Default::default()
        };
        resolver.update_preferences(1, &first).await.unwrap();

        let second = PreferenceUpdate {
            allow_manual_override: Some(false),
            ..Default::default()
        };
        let prefs = resolver.update_preferences(1, &second).await.unwrap();

        assert_eq!(prefs.alert_methods, vec![Channel::Whatsapp]);
        assert!(!prefs.allow_manual_override);
        assert!(prefs.enable_detection);
        assert!(prefs.require_consent);
    }

    #[tokio::test]
    async fn test_update_propagates_write_errors() {
        let repo = Arc::new(InMemoryRepository::new());
        let resolver = PreferenceResolver::new(repo.clone());
        repo.set_unavailable(true);
        assert!(resolver.update_preferences(1, &PreferenceUpdate::default()).await.is_err());
        assert!(resolver.initialize_preferences(1).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_methods_read_as_defaults() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut prefs = EmergencyPreferences::defaults(3);
        prefs.alert_methods.clear();
        repo.upsert_preferences(prefs).await.unwrap();

        let resolver = PreferenceResolver::new(repo);
        assert_eq!(resolver.get_preferences(3).await.alert_methods, vec![Channel::Sms, Channel::Email]);
    }

    #[tokio::test]
    async fn test_initialize_preferences() {
        let repo = Arc::new(InMemoryRepository::new());
        let resolver = PreferenceResolver::new(repo.clone());

        let created = resolver.initialize_preferences(5).await.unwrap();
        assert_eq!(created, EmergencyPreferences::defaults(5));
        assert!(repo.get_preferences(5).await.unwrap().is_some());

        let update = PreferenceUpdate {
            require_consent: Some(false),
            ..Default::default()
        };
        resolver.update_preferences(5, &update).await.unwrap();
        assert!(!resolver.initialize_preferences(5).await.unwrap().require_consent);
    }

    #[tokio::test]
    async fn test_language_lookup() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.set_language(1, "es").unwrap();
        let resolver = PreferenceResolver::new(repo);
        assert_eq!(resolver.language(1).await.as_deref(), Some("es"));
        assert_eq!(resolver.language(2).await, None);
    }

    #[tokio::test]
    async fn test_resolve_filters_opted_out() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.create_contact(1, NewContact::named("A")).await.unwrap();
        repo.create_contact(1, NewContact::named("B").opted_out()).await.unwrap();
        let primary = repo.create_contact(1, NewContact::named("P").primary()).await.unwrap();

        let contacts = ContactResolver::new(repo).resolve(1).await;
        let names: Vec<_> = contacts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["P", "A"]);
        assert_eq!(contacts[0].id, primary.id);
    }

    #[tokio::test]
    async fn test_resolve_merges_primary_without_duplicates() {
        let contacts = ContactResolver::new(Arc::new(SplitContacts)).resolve(1).await;
        let ids: Vec<_> = contacts.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![9, 2, 3]);

        let repo = Arc::new(InMemoryRepository::new());
        repo.create_contact(1, NewContact::named("P").primary()).await.unwrap();
        assert_eq!(ContactResolver::new(repo).resolve(1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_failure_yields_no_contacts() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.create_contact(1, NewContact::named("A")).await.unwrap();
        repo.set_unavailable(true);
        assert!(ContactResolver::new(repo).resolve(1).await.is_empty());
    }
}
