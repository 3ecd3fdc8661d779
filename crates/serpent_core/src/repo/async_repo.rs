//! Asynchronous repository over a sqlx [`AsyncSession`].
//!
//! Mirrors [`super::SqlRepository`] statement for statement; only the I/O
//! boundary differs.

use super::{
    by_id_spec, delete_sql, ensure_limit, ensure_valid_id, insert_sql, not_found, page_spec,
    require_id, update_params, update_sql, validated_schema, write_values, AsyncRecordRepository,
    ListQuery, PageRequest, RepoError, RepoResult,
};
use crate::db::AsyncSession;
use crate::model::record::{Record, RecordId, ValueRow};
use crate::model::schema::{ColumnKind, Schema};
use crate::model::value::SqlValue;
use crate::query::{build_query, Filter, PaginatedList, QuerySpec};
use crate::util::time::utc_now_micros;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::marker::PhantomData;

/// SQLite-backed async repository bound to one open session.
pub struct AsyncSqlRepository<'s, R: Record> {
    session: &'s AsyncSession,
    schema: &'static Schema,
    _record: PhantomData<R>,
}

impl<'s, R: Record> AsyncSqlRepository<'s, R> {
    /// Binds a repository to `session` after validating `R::schema()`.
    pub fn try_new(session: &'s AsyncSession) -> RepoResult<Self> {
        Ok(Self {
            session,
            schema: validated_schema::<R>()?,
            _record: PhantomData,
        })
    }

    pub fn session(&self) -> &'s AsyncSession {
        self.session
    }

    async fn fetch(&self, sql: &str, params: &[SqlValue]) -> RepoResult<Vec<R>> {
        let rows = self.session.fetch_all(sql, params).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let raw = self
                .schema
                .all_columns()
                .enumerate()
                .map(|(index, column)| raw_value(row, index, column.kind))
                .collect::<Result<Vec<_>, sqlx::Error>>()?;
            let decoded = ValueRow::decode(self.schema, raw)?;
            records.push(R::from_row(&decoded)?);
        }
        Ok(records)
    }

    async fn scalar(&self, sql: &str, params: &[SqlValue]) -> RepoResult<i64> {
        let rows = self.session.fetch_all(sql, params).await?;
        let row = rows
            .first()
            .ok_or_else(|| RepoError::Internal(format!("no row returned by `{sql}`")))?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn settle(&self, record: R, id: RecordId, defer_commit: bool) -> RepoResult<R> {
        if defer_commit {
            return Ok(record);
        }
        self.session.commit().await?;
        self.get_by_id(id).await?.ok_or_else(|| {
            RepoError::Internal(format!(
                "{} {id} missing after commit",
                self.schema.record_name()
            ))
        })
    }
}

/// Reads one column as its raw storage class.
fn raw_value(row: &SqliteRow, index: usize, kind: ColumnKind) -> Result<SqlValue, sqlx::Error> {
    let value = match kind {
        ColumnKind::Integer | ColumnKind::Boolean => {
            SqlValue::from(row.try_get::<Option<i64>, _>(index)?)
        }
        ColumnKind::Real => SqlValue::from(row.try_get::<Option<f64>, _>(index)?),
        ColumnKind::Text | ColumnKind::Uuid | ColumnKind::Timestamp => {
            SqlValue::from(row.try_get::<Option<String>, _>(index)?)
        }
    };
    Ok(value)
}

#[async_trait]
impl<R: Record> AsyncRecordRepository<R> for AsyncSqlRepository<'_, R> {
    async fn exists(&self, filter: &Filter) -> RepoResult<bool> {
        let built = build_query(self.schema, &QuerySpec::filtered(filter.clone()))?;
        Ok(self.scalar(&built.exists_sql, &built.params).await? != 0)
    }

    async fn get_by_id(&self, id: RecordId) -> RepoResult<Option<R>> {
        let built = build_query(self.schema, &by_id_spec(id))?;
        Ok(self
            .fetch(&built.select_sql, &built.params)
            .await?
            .into_iter()
            .next())
    }

    async fn get_models_by_ids(&self, ids: &[RecordId]) -> RepoResult<Vec<R>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let built = build_query(self.schema, &QuerySpec::by_ids(ids))?;
        self.fetch(&built.select_sql, &built.params).await
    }

    async fn get(&self, query: &ListQuery) -> RepoResult<Vec<R>> {
        ensure_limit(Some(query.limit))?;
        let built = build_query(self.schema, &QuerySpec::filtered(query.filter.clone()))?;
        let (sql, params) = built.paged(query.skip, Some(query.limit));
        self.fetch(&sql, &params).await
    }

    async fn get_paginated(&self, request: &PageRequest) -> RepoResult<PaginatedList<R>> {
        ensure_limit(request.limit)?;
        let built = build_query(self.schema, &page_spec(request))?;
        let total = self.scalar(&built.count_sql, &built.params).await?;
        let (sql, params) = built.paged(request.skip, request.limit);
        let data = self.fetch(&sql, &params).await?;
        let total = u64::try_from(total)
            .map_err(|_| RepoError::Internal(format!("negative row count {total}")))?;
        Ok(PaginatedList::new(data, total, request.skip, request.limit))
    }

    async fn create(&self, mut record: R, defer_commit: bool) -> RepoResult<R> {
        ensure_valid_id(&record)?;
        let id = record.meta_mut().stamp_created(utc_now_micros());
        let values = write_values(&record)?;
        self.session
            .execute_write(&insert_sql(self.schema), &values)
            .await?;
        self.settle(record, id, defer_commit).await
    }

    async fn update(&self, mut record: R, defer_commit: bool) -> RepoResult<R> {
        let id = require_id(&record)?;
        let existing = self.get_by_id(id).await?.ok_or_else(|| not_found::<R>(id))?;
        let created_on = existing
            .meta()
            .created_on
            .ok_or_else(|| RepoError::Internal(format!("stored {id} has no created_on")))?;
        record.meta_mut().stamp_updated(created_on, utc_now_micros());
        let params = update_params(write_values(&record)?);
        self.session
            .execute_write(&update_sql(self.schema), &params)
            .await?;
        self.settle(record, id, defer_commit).await
    }

    async fn delete(&self, id: RecordId, defer_commit: bool) -> RepoResult<()> {
        if self.get_by_id(id).await?.is_some() {
            self.session
                .execute_write(&delete_sql(self.schema), &[SqlValue::Uuid(id)])
                .await?;
        }
        if !defer_commit {
            self.session.commit().await?;
        }
        Ok(())
    }
}
