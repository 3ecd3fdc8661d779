//! Synchronous repository over a rusqlite [`Session`].

use super::{
    by_id_spec, delete_sql, ensure_limit, ensure_valid_id, insert_sql, not_found, page_spec,
    require_id, update_params, update_sql, validated_schema, write_values, ListQuery, PageRequest,
    RecordRepository, RepoError, RepoResult,
};
use crate::db::Session;
use crate::model::record::{Record, RecordId, ValueRow};
use crate::model::schema::Schema;
use crate::model::value::SqlValue;
use crate::query::{build_query, Filter, PaginatedList, QuerySpec};
use crate::util::time::utc_now_micros;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use std::marker::PhantomData;

/// SQLite-backed repository bound to one open session.
pub struct SqlRepository<'s, R: Record> {
    session: &'s Session,
    schema: &'static Schema,
    _record: PhantomData<R>,
}

impl<'s, R: Record> SqlRepository<'s, R> {
    /// Binds a repository to `session` after validating `R::schema()`.
    pub fn try_new(session: &'s Session) -> RepoResult<Self> {
        Ok(Self {
            session,
            schema: validated_schema::<R>()?,
            _record: PhantomData,
        })
    }

    pub fn session(&self) -> &'s Session {
        self.session
    }

    fn fetch(&self, sql: &str, params: &[SqlValue]) -> RepoResult<Vec<R>> {
        let width = self.schema.all_columns().count();
        let mut stmt = self.session.connection().prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            let mut raw = Vec::with_capacity(width);
            for index in 0..width {
                raw.push(SqlValue::from(row.get::<_, Value>(index)?));
            }
            let decoded = ValueRow::decode(self.schema, raw)?;
            records.push(R::from_row(&decoded)?);
        }

        Ok(records)
    }

    fn scalar(&self, sql: &str, params: &[SqlValue]) -> RepoResult<i64> {
        let value = self
            .session
            .connection()
            .query_row(sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(value)
    }

    fn write(&self, sql: &str, params: &[SqlValue]) -> RepoResult<usize> {
        self.session.begin_write()?;
        let changed = self
            .session
            .connection()
            .execute(sql, params_from_iter(params.iter()))?;
        Ok(changed)
    }

    /// Commits unless deferred, then re-reads the stored row.
    fn settle(&self, record: R, id: RecordId, defer_commit: bool) -> RepoResult<R> {
        if defer_commit {
            return Ok(record);
        }
        self.session.commit()?;
        self.get_by_id(id)?.ok_or_else(|| {
            RepoError::Internal(format!(
                "{} {id} missing after commit",
                self.schema.record_name()
            ))
        })
    }
}

impl<R: Record> RecordRepository<R> for SqlRepository<'_, R> {
    fn exists(&self, filter: &Filter) -> RepoResult<bool> {
        let built = build_query(self.schema, &QuerySpec::filtered(filter.clone()))?;
        Ok(self.scalar(&built.exists_sql, &built.params)? != 0)
    }

    fn get_by_id(&self, id: RecordId) -> RepoResult<Option<R>> {
        let built = build_query(self.schema, &by_id_spec(id))?;
        Ok(self.fetch(&built.select_sql, &built.params)?.into_iter().next())
    }

    fn get_models_by_ids(&self, ids: &[RecordId]) -> RepoResult<Vec<R>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let built = build_query(self.schema, &QuerySpec::by_ids(ids))?;
        self.fetch(&built.select_sql, &built.params)
    }

    fn get(&self, query: &ListQuery) -> RepoResult<Vec<R>> {
        ensure_limit(Some(query.limit))?;
        let built = build_query(self.schema, &QuerySpec::filtered(query.filter.clone()))?;
        let (sql, params) = built.paged(query.skip, Some(query.limit));
        self.fetch(&sql, &params)
    }

    fn get_paginated(&self, request: &PageRequest) -> RepoResult<PaginatedList<R>> {
        ensure_limit(request.limit)?;
        let built = build_query(self.schema, &page_spec(request))?;
        let total = self.scalar(&built.count_sql, &built.params)?;
        let (sql, params) = built.paged(request.skip, request.limit);
        let data = self.fetch(&sql, &params)?;
        let total = u64::try_from(total)
            .map_err(|_| RepoError::Internal(format!("negative row count {total}")))?;
        Ok(PaginatedList::new(data, total, request.skip, request.limit))
    }

    fn create(&self, mut record: R, defer_commit: bool) -> RepoResult<R> {
        ensure_valid_id(&record)?;
        let id = record.meta_mut().stamp_created(utc_now_micros());
        self.write(&insert_sql(self.schema), &write_values(&record)?)?;
        self.settle(record, id, defer_commit)
    }

    fn update(&self, mut record: R, defer_commit: bool) -> RepoResult<R> {
        let id = require_id(&record)?;
        let existing = self.get_by_id(id)?.ok_or_else(|| not_found::<R>(id))?;
        let created_on = existing
            .meta()
            .created_on
            .ok_or_else(|| RepoError::Internal(format!("stored {id} has no created_on")))?;
        record.meta_mut().stamp_updated(created_on, utc_now_micros());
        let params = update_params(write_values(&record)?);
        self.write(&update_sql(self.schema), &params)?;
        self.settle(record, id, defer_commit)
    }

    fn delete(&self, id: RecordId, defer_commit: bool) -> RepoResult<()> {
        if self.get_by_id(id)?.is_some() {
            self.write(&delete_sql(self.schema), &[SqlValue::Uuid(id)])?;
        }
        if !defer_commit {
            self.session.commit()?;
        }
        Ok(())
    }
}
