//! Interfaces to the surrounding CRM, plus a JSON-file implementation.

use crate::core::error::{AppError, Result};
use crate::core::models::{BusinessRecord, EmailStatus, PersistedContact};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Read side of the CRM's business table.
#[async_trait]
pub trait BusinessSource: Send + Sync {
    async fn load_businesses(&self) -> Result<Vec<BusinessRecord>>;
}

/// The CRM's contact table. Writes are upserts keyed by [`PersistedContact::id`].
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn contacts_for_business(&self, business_id: &str) -> Result<Vec<PersistedContact>>;

    /// Business ids that already have a contact verified as valid.
    async fn businesses_with_valid_contact(&self) -> Result<HashSet<String>>;

    /// Up to `limit` contacts with the given status, in stored order.
    async fn contacts_with_status(
        &self,
        status: EmailStatus,
        limit: usize,
    ) -> Result<Vec<PersistedContact>>;

    async fn upsert_contact(&self, contact: &PersistedContact) -> Result<()>;

    /// Makes `contact` the only stored contact for `business_id`: rows with
    /// other ids for that business are removed, and `contact` is upserted.
    async fn replace_business_contact(
        &self,
        business_id: &str,
        contact: &PersistedContact,
    ) -> Result<()>;
}

/// Businesses read from one JSON array file, contacts kept in another.
///
/// The contacts file is rewritten through a temporary sibling and a rename on
/// every write, so a crash never leaves it half written. Writes are serialized
/// by `write_gate` and run on the blocking pool; reads only take the
/// in-memory lock.
pub struct JsonFileStore {
    businesses_path: PathBuf,
    contacts_path: PathBuf,
    contacts: Mutex<Vec<PersistedContact>>,
    write_gate: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    /// Opens the store. A missing contacts file starts empty.
    pub fn open(businesses_path: impl Into<PathBuf>, contacts_path: impl Into<PathBuf>) -> Result<Self> {
        let businesses_path = businesses_path.into();
        let contacts_path = contacts_path.into();
        let contacts = if contacts_path.exists() {
            read_json_array(&contacts_path)?
        } else {
            tracing::debug!("Contacts file {} does not exist yet; starting empty.", contacts_path.display());
            Vec::new()
        };
        tracing::debug!("Loaded {} stored contacts from {}", contacts.len(), contacts_path.display());
        Ok(Self {
            businesses_path,
            contacts_path,
            contacts: Mutex::new(contacts),
            write_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Snapshot of every stored contact.
    pub fn all_contacts(&self) -> Vec<PersistedContact> {
        self.contacts.lock().clone()
    }

    /// Applies `change` in memory and writes the result to disk. On a failed
    /// write the in-memory contacts are restored.
    async fn apply<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<PersistedContact>) + Send,
    {
        let _gate = self.write_gate.lock().await;
        let (previous, snapshot) = {
            let mut contacts = self.contacts.lock();
            let previous = contacts.clone();
            change(&mut contacts);
            (previous, contacts.clone())
        };

        let path = self.contacts_path.clone();
        let written = tokio::task::spawn_blocking(move || write_contacts(&path, &snapshot))
            .await
            .map_err(|e| AppError::Store(format!("contacts writer task failed: {}", e)))
            .and_then(|r| r);

        if let Err(e) = written {
            *self.contacts.lock() = previous;
            return Err(AppError::Store(format!(
                "Failed to write contacts to '{}': {}",
                self.contacts_path.display(),
                e
            )));
        }
        Ok(())
    }
}

fn write_contacts(path: &Path, contacts: &[PersistedContact]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, contacts)?;
        writer.flush()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn upsert_in_place(contacts: &mut Vec<PersistedContact>, contact: &PersistedContact) {
    match contacts.iter_mut().find(|c| c.id == contact.id) {
        Some(existing) => *existing = contact.clone(),
        None => contacts.push(contact.clone()),
    }
}

fn read_json_array<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|e| {
        AppError::Store(format!("Failed to open '{}': {}", path.display(), e))
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        AppError::Store(format!(
            "Failed to parse JSON from '{}'. Expected an array of objects: {}",
            path.display(),
            e
        ))
    })
}

#[async_trait]
impl BusinessSource for JsonFileStore {
    async fn load_businesses(&self) -> Result<Vec<BusinessRecord>> {
        let records: Vec<BusinessRecord> = read_json_array(&self.businesses_path)?;
        tracing::debug!("Loaded {} businesses from {}", records.len(), self.businesses_path.display());
        Ok(records)
    }
}

#[async_trait]
impl ContactStore for JsonFileStore {
    async fn contacts_for_business(&self, business_id: &str) -> Result<Vec<PersistedContact>> {
        Ok(self
            .contacts
            .lock()
            .iter()
            .filter(|c| c.business_id == business_id)
            .cloned()
            .collect())
    }

    async fn businesses_with_valid_contact(&self) -> Result<HashSet<String>> {
        Ok(self
            .contacts
            .lock()
            .iter()
            .filter(|c| c.email_verification_status == EmailStatus::Valid)
            .map(|c| c.business_id.clone())
            .collect())
    }

    async fn contacts_with_status(
        &self,
        status: EmailStatus,
        limit: usize,
    ) -> Result<Vec<PersistedContact>> {
        Ok(self
            .contacts
            .lock()
            .iter()
            .filter(|c| c.email_verification_status == status)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn upsert_contact(&self, contact: &PersistedContact) -> Result<()> {
        self.apply(|contacts| upsert_in_place(contacts, contact)).await
    }

    async fn replace_business_contact(
        &self,
        business_id: &str,
        contact: &PersistedContact,
    ) -> Result<()> {
        self.apply(|contacts| {
            contacts.retain(|c| c.business_id != business_id || c.id == contact.id);
            upsert_in_place(contacts, contact);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{DiscoverySource, Role};
    use chrono::Utc;

    fn contact(id: &str, business_id: &str, status: EmailStatus) -> PersistedContact {
        PersistedContact {
            id: id.into(),
            business_id: business_id.into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            title: "Owner".into(),
            role: Role::Owner,
            email: "jane@oak.com".into(),
            phone: None,
            profile_url: None,
            confidence: 95,
            source: DiscoverySource::PeopleSearch,
            email_verified: status == EmailStatus::Valid,
            email_verification_status: status,
            enriched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_replaces_by_id_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let businesses = dir.path().join("businesses.json");
        let contacts = dir.path().join("contacts.json");
        std::fs::write(&businesses, "[]").unwrap();

        let store = JsonFileStore::open(&businesses, &contacts).unwrap();
        store.upsert_contact(&contact("c1", "b1", EmailStatus::Unknown)).await.unwrap();
        store.upsert_contact(&contact("c1", "b1", EmailStatus::Valid)).await.unwrap();
        store.upsert_contact(&contact("c2", "b2", EmailStatus::Unknown)).await.unwrap();
        assert_eq!(store.all_contacts().len(), 2);

        let reopened = JsonFileStore::open(&businesses, &contacts).unwrap();
        let stored = reopened.all_contacts();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].email_verification_status, EmailStatus::Valid);

        let valid = reopened.businesses_with_valid_contact().await.unwrap();
        assert!(valid.contains("b1"));
        assert!(!valid.contains("b2"));

        let unknown = reopened.contacts_with_status(EmailStatus::Unknown, 10).await.unwrap();
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].id, "c2");
        assert!(!dir.path().join("contacts.json.tmp").exists());
    }

    #[tokio::test]
    async fn loads_businesses_with_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let businesses = dir.path().join("businesses.json");
        std::fs::write(
            &businesses,
            r#"[{"id": "b1", "name": "Oak Street Clinic", "website": "oakstreetclinic.com", "city": "Austin", "state": "TX"},
                {"id": "b2", "name": "No Site Dental"}]"#,
        )
        .unwrap();
        let store = JsonFileStore::open(&businesses, dir.path().join("contacts.json")).unwrap();
        let records = store.load_businesses().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].website, None);
        assert_eq!(records[1].city, "");
    }

    #[tokio::test]
    async fn replacing_drops_other_rows_of_that_business_only() {
        let dir = tempfile::tempdir().unwrap();
        let contacts = dir.path().join("contacts.json");
        let store = JsonFileStore::open(dir.path().join("businesses.json"), &contacts).unwrap();
        store.upsert_contact(&contact("old-1", "b1", EmailStatus::Unknown)).await.unwrap();
        store.upsert_contact(&contact("old-2", "b1", EmailStatus::Invalid)).await.unwrap();
        store.upsert_contact(&contact("other", "b2", EmailStatus::Unknown)).await.unwrap();

        let mut better = contact("new", "b1", EmailStatus::Valid);
        better.email = "jane.doe@oak.com".into();
        store.replace_business_contact("b1", &better).await.unwrap();
        // Replacing with the same id again keeps a single row.
        store.replace_business_contact("b1", &better).await.unwrap();

        let reopened = JsonFileStore::open(dir.path().join("businesses.json"), &contacts).unwrap();
        let for_b1 = reopened.contacts_for_business("b1").await.unwrap();
        assert_eq!(for_b1.len(), 1);
        assert_eq!(for_b1[0].id, "new");
        assert_eq!(for_b1[0].email, "jane.doe@oak.com");
        assert_eq!(reopened.contacts_for_business("b2").await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_upserts_all_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let contacts = dir.path().join("contacts.json");
        let store = std::sync::Arc::new(
            JsonFileStore::open(dir.path().join("businesses.json"), &contacts).unwrap(),
        );

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .upsert_contact(&contact(&format!("c{}", i), &format!("b{}", i), EmailStatus::Unknown))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let reopened = JsonFileStore::open(dir.path().join("businesses.json"), &contacts).unwrap();
        assert_eq!(reopened.all_contacts().len(), 16);
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        let store = JsonFileStore::open(dir.path().join("businesses.json"), blocker.join("contacts.json")).unwrap();

        let result = store.upsert_contact(&contact("c1", "b1", EmailStatus::Unknown)).await;
        assert!(matches!(result, Err(AppError::Store(_))));
        assert!(store.all_contacts().is_empty());
    }

    #[tokio::test]
    async fn malformed_business_file_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let businesses = dir.path().join("businesses.json");
        std::fs::write(&businesses, "{not json").unwrap();
        let store = JsonFileStore::open(&businesses, dir.path().join("contacts.json")).unwrap();
        assert!(matches!(store.load_businesses().await, Err(AppError::Store(_))));
    }
}
