//! Generic record manager.
//!
//! # Responsibility
//! - Re-expose every repository operation unchanged.
//! - Offer sync methods over [`RecordRepository`] and `*_async` methods over
//!   [`AsyncRecordRepository`].
//!
//! # Invariants
//! - Manager methods never bypass repository contracts.

use crate::model::record::{Record, RecordId};
use crate::query::{Filter, PaginatedList};
use crate::repo::{AsyncRecordRepository, ListQuery, PageRequest, RecordRepository, RepoResult};
use std::marker::PhantomData;

/// Use-case wrapper around one repository.
///
/// Domain types wrap a `Manager` and add their own rules before delegating.
pub struct Manager<R: Record, Repo> {
    repo: Repo,
    _record: PhantomData<R>,
}

impl<R: Record, Repo> Manager<R, Repo> {
    pub fn new(repo: Repo) -> Self {
        Self {
            repo,
            _record: PhantomData,
        }
    }

    pub fn repository(&self) -> &Repo {
        &self.repo
    }
}

impl<R: Record, Repo: RecordRepository<R>> Manager<R, Repo> {
    pub fn exists(&self, filter: &Filter) -> RepoResult<bool> {
        self.repo.exists(filter)
    }

    pub fn get_by_id(&self, id: RecordId) -> RepoResult<Option<R>> {
        self.repo.get_by_id(id)
    }

    pub fn get_models_by_ids(&self, ids: &[RecordId]) -> RepoResult<Vec<R>> {
        self.repo.get_models_by_ids(ids)
    }

    pub fn get(&self, query: &ListQuery) -> RepoResult<Vec<R>> {
        self.repo.get(query)
    }

    pub fn get_paginated(&self, request: &PageRequest) -> RepoResult<PaginatedList<R>> {
        self.repo.get_paginated(request)
    }

    pub fn create(&self, record: R, defer_commit: bool) -> RepoResult<R> {
        self.repo.create(record, defer_commit)
    }

    pub fn update(&self, record: R, defer_commit: bool) -> RepoResult<R> {
        self.repo.update(record, defer_commit)
    }

    pub fn delete(&self, id: RecordId, defer_commit: bool) -> RepoResult<()> {
        self.repo.delete(id, defer_commit)
    }
}

impl<R: Record, Repo: AsyncRecordRepository<R>> Manager<R, Repo> {
    pub async fn exists_async(&self, filter: &Filter) -> RepoResult<bool> {
        self.repo.exists(filter).await
    }

    pub async fn get_by_id_async(&self, id: RecordId) -> RepoResult<Option<R>> {
        self.repo.get_by_id(id).await
    }

    pub async fn get_models_by_ids_async(&self, ids: &[RecordId]) -> RepoResult<Vec<R>> {
        self.repo.get_models_by_ids(ids).await
    }

    pub async fn get_async(&self, query: &ListQuery) -> RepoResult<Vec<R>> {
        self.repo.get(query).await
    }

    pub async fn get_paginated_async(
        &self,
        request: &PageRequest,
    ) -> RepoResult<PaginatedList<R>> {
        self.repo.get_paginated(request).await
    }

    pub async fn create_async(&self, record: R, defer_commit: bool) -> RepoResult<R> {
        self.repo.create(record, defer_commit).await
    }

    pub async fn update_async(&self, record: R, defer_commit: bool) -> RepoResult<R> {
        self.repo.update(record, defer_commit).await
    }

    pub async fn delete_async(&self, id: RecordId, defer_commit: bool) -> RepoResult<()> {
        self.repo.delete(id, defer_commit).await
    }
}
