//! Async access for concurrent request handlers.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use roster_core::{
    Availability, AvailabilityInterval, BatchFetch, DefaultTemplate, MemberNumber, PartitionKey,
    Statistics, TimeRange, UnitCode,
};

use crate::{Database, DatabaseOptions, DbError, WriteSummary};

/// Shareable handle that opens a connection per operation.
///
/// Work runs on Tokio's blocking pool, so concurrent writers contend on
/// SQLite's write lock and go through the retry policy.
#[derive(Debug, Clone)]
pub struct Store {
    path: Arc<PathBuf>,
    options: DatabaseOptions,
}

impl Store {
    /// Opens the database once to initialize the schema.
    pub fn open(path: &Path, options: DatabaseOptions) -> Result<Self, DbError> {
        Database::open_with(path, options)?;
        Ok(Self {
            path: Arc::new(path.to_path_buf()),
            options,
        })
    }

    /// A dedicated synchronous connection.
    pub fn database(&self) -> Result<Database, DbError> {
        Database::open_with(&self.path, self.options)
    }

    async fn run<T, F>(&self, operation: F) -> Result<T, DbError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database) -> Result<T, DbError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut db = store.database()?;
            operation(&mut db)
        })
        .await?
    }

    pub async fn set_availabilities(
        &self,
        key: PartitionKey,
        availabilities: Vec<Availability>,
    ) -> Result<WriteSummary, DbError> {
        self.run(move |db| db.set_availabilities(&key, &availabilities))
            .await
    }

    pub async fn replace_availabilities(
        &self,
        key: PartitionKey,
        window: TimeRange,
        availabilities: Vec<Availability>,
    ) -> Result<WriteSummary, DbError> {
        self.run(move |db| db.replace_availabilities(&key, window, &availabilities))
            .await
    }

    pub async fn fetch_member_availabilities(
        &self,
        member: MemberNumber,
        range: TimeRange,
    ) -> Result<Vec<AvailabilityInterval>, DbError> {
        self.run(move |db| db.fetch_member_availabilities(member, range))
            .await
    }

    pub async fn fetch_members_availabilities(
        &self,
        members: Vec<MemberNumber>,
        range: TimeRange,
    ) -> Result<Vec<AvailabilityInterval>, DbError> {
        self.run(move |db| db.fetch_members_availabilities(&members, range))
            .await
    }

    pub async fn fetch_available_at(
        &self,
        instant: DateTime<Utc>,
        members: Option<Vec<MemberNumber>>,
    ) -> Result<Vec<AvailabilityInterval>, DbError> {
        self.run(move |db| db.fetch_available_at(instant, members.as_deref()))
            .await
    }

    /// Statistics using this database as the member directory.
    pub async fn fetch_statistics(
        &self,
        window: TimeRange,
        unit: Option<UnitCode>,
    ) -> Result<Statistics, DbError> {
        self.run(move |db| db.fetch_statistics(window, unit.as_ref(), &*db))
            .await
    }

    pub async fn fetch_default_availabilities(
        &self,
        key: PartitionKey,
    ) -> Result<Option<DefaultTemplate>, DbError> {
        self.run(move |db| db.fetch_default_availabilities(&key))
            .await
    }

    pub async fn set_default_availabilities(&self, template: DefaultTemplate) -> Result<(), DbError> {
        self.run(move |db| db.set_default_availabilities(&template))
            .await
    }

    pub async fn apply_default_availability(
        &self,
        key: PartitionKey,
        target: TimeRange,
    ) -> Result<bool, DbError> {
        self.run(move |db| db.apply_default_availability(&key, target))
            .await
    }
}

impl BatchFetch for Store {
    type Error = DbError;

    fn fetch_batch(
        &self,
        members: Vec<MemberNumber>,
        range: TimeRange,
    ) -> impl Future<Output = Result<Vec<AvailabilityInterval>, DbError>> + Send {
        let store = self.clone();
        async move { store.fetch_members_availabilities(members, range).await }
    }
}
