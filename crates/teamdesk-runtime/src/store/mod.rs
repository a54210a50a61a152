//! Document persistence.
//!
//! [`DocumentStore`] is the object-safe backend seam working on raw JSON;
//! [`Store`] layers typed access for [`Document`] types on top of it.

mod filter;
mod memory;
mod postgres;

pub use filter::{Filter, FindOptions, SortOrder};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use teamdesk_core::error::{Result, TeamdeskError};
use teamdesk_core::model::{Document, Page, PageRequest};

/// Boxed future returned by store backends.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A JSON document backend with per-collection uniqueness keys.
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Insert a new document. Fails with `Duplicate` on a unique-key clash.
    fn insert(
        &self,
        collection: &'static str,
        id: Uuid,
        unique_key: Option<String>,
        doc: Value,
    ) -> StoreFuture<'_, ()>;

    /// Overwrite an existing document. Returns false if it does not exist.
    fn replace(
        &self,
        collection: &'static str,
        id: Uuid,
        unique_key: Option<String>,
        doc: Value,
    ) -> StoreFuture<'_, bool>;

    fn get(&self, collection: &'static str, id: Uuid) -> StoreFuture<'_, Option<Value>>;

    fn find(
        &self,
        collection: &'static str,
        filter: Filter,
        options: FindOptions,
    ) -> StoreFuture<'_, Vec<Value>>;

    fn count(&self, collection: &'static str, filter: Filter) -> StoreFuture<'_, u64>;

    /// Delete one document. Returns false if it did not exist.
    fn delete(&self, collection: &'static str, id: Uuid) -> StoreFuture<'_, bool>;

    /// Delete all matching documents and return how many were removed.
    fn delete_many(&self, collection: &'static str, filter: Filter) -> StoreFuture<'_, u64>;

    fn health_check(&self) -> StoreFuture<'_, ()>;
}

/// Typed handle over a shared backend.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn DocumentStore>,
}

impl Store {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self { backend }
    }

    /// A fresh in-memory store.
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn health_check(&self) -> Result<()> {
        self.backend.health_check().await
    }

    pub async fn insert<T: Document>(&self, doc: &T) -> Result<()> {
        let value = serde_json::to_value(doc)?;
        self.backend
            .insert(T::COLLECTION, doc.id(), doc.unique_key(), value)
            .await
    }

    /// Persist changes to an existing document.
    pub async fn save<T: Document>(&self, doc: &T) -> Result<()> {
        let value = serde_json::to_value(doc)?;
        let found = self
            .backend
            .replace(T::COLLECTION, doc.id(), doc.unique_key(), value)
            .await?;
        if found {
            Ok(())
        } else {
            Err(TeamdeskError::not_found(format!(
                "{} {}",
                T::COLLECTION,
                doc.id()
            )))
        }
    }

    pub async fn get<T: Document>(&self, id: Uuid) -> Result<Option<T>> {
        match self.backend.get(T::COLLECTION, id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Fetch a document or fail with `NotFound("<what> not found")`.
    pub async fn require<T: Document>(&self, id: Uuid, what: &str) -> Result<T> {
        self.get(id)
            .await?
            .ok_or_else(|| TeamdeskError::not_found(format!("{} not found", what)))
    }

    pub async fn find<T: Document>(&self, filter: Filter, options: FindOptions) -> Result<Vec<T>> {
        self.backend
            .find(T::COLLECTION, filter, options)
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(TeamdeskError::from))
            .collect()
    }

    pub async fn find_one<T: Document>(&self, filter: Filter) -> Result<Option<T>> {
        let mut found = self.find(filter, FindOptions::new().limit(1)).await?;
        Ok(found.pop())
    }

    pub async fn count<T: Document>(&self, filter: Filter) -> Result<u64> {
        self.backend.count(T::COLLECTION, filter).await
    }

    pub async fn exists<T: Document>(&self, filter: Filter) -> Result<bool> {
        Ok(self.count::<T>(filter).await? > 0)
    }

    pub async fn delete<T: Document>(&self, id: Uuid) -> Result<bool> {
        self.backend.delete(T::COLLECTION, id).await
    }

    pub async fn delete_many<T: Document>(&self, filter: Filter) -> Result<u64> {
        self.backend.delete_many(T::COLLECTION, filter).await
    }

    /// One page of matching documents plus the total count.
    pub async fn page<T: Document>(
        &self,
        filter: Filter,
        sort: FindOptions,
        page: &PageRequest,
    ) -> Result<Page<T>> {
        let total = self.count::<T>(filter.clone()).await?;
        let items = self
            .find(filter, sort.skip(page.offset()).limit(page.limit()))
            .await?;
        Ok(Page {
            items,
            pagination: page.pagination(total),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teamdesk_core::model::{Role, Task, TaskStatus, User};

    #[tokio::test]
    async fn test_typed_roundtrip_and_save() {
        let store = Store::memory();
        let mut task = Task::new("Write docs", Uuid::new_v4(), Uuid::new_v4());
        store.insert(&task).await.unwrap();

        task.status = TaskStatus::Review;
        store.save(&task).await.unwrap();

        let loaded: Task = store.require(task.id, "Task").await.unwrap();
        assert_eq!(loaded.status, TaskStatus::Review);
    }

    #[tokio::test]
    async fn test_save_missing_is_not_found() {
        let store = Store::memory();
        let task = Task::new("ghost", Uuid::new_v4(), Uuid::new_v4());
        let err = store.save(&task).await.unwrap_err();
        assert!(matches!(err, TeamdeskError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_require_message() {
        let store = Store::memory();
        let err = store.require::<Task>(Uuid::new_v4(), "Task").await.unwrap_err();
        assert_eq!(err.to_string(), "Not found: Task not found");
    }

    #[tokio::test]
    async fn test_unique_email() {
        let store = Store::memory();
        store
            .insert(&User::new("A", "a@example.com", "h", Role::Employee))
            .await
            .unwrap();
        let err = store
            .insert(&User::new("B", "A@Example.com", "h", Role::Employee))
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn test_page() {
        let store = Store::memory();
        let assignee = Uuid::new_v4();
        for i in 0..5 {
            store
                .insert(&Task::new(format!("t{}", i), assignee, assignee))
                .await
                .unwrap();
        }
        let page: Page<Task> = store
            .page(
                Filter::eq("assignedTo", assignee),
                FindOptions::new().sort("title", SortOrder::Asc),
                &PageRequest::new(2, 2),
            )
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 5);
        assert_eq!(page.pagination.pages, 3);
        let titles: Vec<_> = page.items.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["t2", "t3"]);
    }
}
