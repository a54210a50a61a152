//! PostgreSQL JSONB backend.
//!
//! All collections share `teamdesk_documents`. Filters compile to
//! `jsonb_path_exists` calls in lax mode, so path steps unwrap arrays the same
//! way the in-memory evaluator does. Range filters and sort keys on RFC 3339
//! timestamps go through `timestamptz`, since chrono writes a variable number
//! of fractional digits. Other strings compare lexicographically.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use teamdesk_core::error::{Result, TeamdeskError};

use super::{DocumentStore, Filter, FindOptions, SortOrder, StoreFuture};
use crate::db::Database;

/// Document store over a Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn map_sqlx_error(collection: &str, e: sqlx::Error) -> TeamdeskError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return TeamdeskError::Duplicate {
                collection: collection.to_string(),
                key: db_err.constraint().unwrap_or("primary key").to_string(),
            };
        }
    }
    TeamdeskError::Database(e.to_string())
}

/// `a.b` -> `$."a"."b"`
fn json_path(path: &str) -> String {
    let mut out = String::from("$");
    for key in path.split('.') {
        out.push_str(".\"");
        out.push_str(&escape_jsonpath_string(key));
        out.push('"');
    }
    out
}

fn escape_jsonpath_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_regex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn push_path_exists(qb: &mut QueryBuilder<'_, Postgres>, path: &str, predicate: &str, vars: Value) {
    qb.push("jsonb_path_exists(doc, ");
    qb.push_bind(format!("{}[*] ? ({})", json_path(path), predicate));
    qb.push("::jsonpath, ");
    qb.push_bind(vars);
    qb.push("::jsonb)");
}

/// Text at `path`, cast to `timestamptz` when it looks like a timestamp.
fn push_timestamp_expr(qb: &mut QueryBuilder<'_, Postgres>, path: &str) {
    let segments: Vec<String> = path.split('.').map(str::to_string).collect();
    qb.push("(CASE WHEN doc #>> ");
    qb.push_bind(segments.clone());
    qb.push(r"::text[] ~ '^\d{4}-\d{2}-\d{2}T' THEN (doc #>> ");
    qb.push_bind(segments);
    qb.push("::text[])::timestamptz END)");
}

fn timestamp_bound(value: &Value) -> Option<&str> {
    let s = value.as_str()?;
    s.parse::<DateTime<Utc>>().ok().map(|_| s)
}

fn push_range(qb: &mut QueryBuilder<'_, Postgres>, path: &str, op: &str, value: &Value) {
    match timestamp_bound(value) {
        Some(bound) => {
            push_timestamp_expr(qb, path);
            qb.push(format!(" {} ", op));
            qb.push_bind(bound.to_string());
            qb.push("::timestamptz");
        }
        None => push_path_exists(qb, path, &format!("@ {} $v", op), json!({ "v": value })),
    }
}

fn push_joined(qb: &mut QueryBuilder<'_, Postgres>, parts: &[Filter], op: &str, empty: &str) {
    if parts.is_empty() {
        qb.push(empty);
        return;
    }
    qb.push("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            qb.push(op);
        }
        push_filter(qb, part);
    }
    qb.push(")");
}

/// Append `filter` as a SQL boolean expression.
pub(crate) fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    match filter {
        Filter::All => {
            qb.push("TRUE");
        }
        Filter::Eq(path, value) => {
            push_path_exists(qb, path, "@ == $v", json!({ "v": value }));
        }
        Filter::In(path, values) => {
            if values.is_empty() {
                qb.push("FALSE");
                return;
            }
            let predicate = (0..values.len())
                .map(|i| format!("@ == $v{}", i))
                .collect::<Vec<_>>()
                .join(" || ");
            let vars: serde_json::Map<String, Value> = values
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("v{}", i), v.clone()))
                .collect();
            push_path_exists(qb, path, &predicate, Value::Object(vars));
        }
        Filter::Gte(path, value) => push_range(qb, path, ">=", value),
        Filter::Lte(path, value) => push_range(qb, path, "<=", value),
        Filter::Contains(path, needle) => {
            let pattern = escape_jsonpath_string(&escape_regex(needle));
            let predicate = format!("@ like_regex \"{}\" flag \"i\"", pattern);
            push_path_exists(qb, path, &predicate, json!({}));
        }
        Filter::IsNull(path) => {
            qb.push("NOT ");
            push_path_exists(qb, path, "@ != null", json!({}));
        }
        Filter::And(parts) => push_joined(qb, parts, " AND ", "TRUE"),
        Filter::Or(parts) => push_joined(qb, parts, " OR ", "FALSE"),
        Filter::Not(inner) => {
            qb.push("NOT (");
            push_filter(qb, inner);
            qb.push(")");
        }
    }
}

fn push_scope(qb: &mut QueryBuilder<'_, Postgres>, collection: &str, filter: &Filter) {
    qb.push(" WHERE collection = ");
    qb.push_bind(collection.to_string());
    qb.push(" AND ");
    push_filter(qb, filter);
}

fn push_order(qb: &mut QueryBuilder<'_, Postgres>, options: &FindOptions) {
    qb.push(" ORDER BY ");
    for (path, order) in &options.sort {
        let direction = match order {
            SortOrder::Asc => " ASC NULLS FIRST, ",
            SortOrder::Desc => " DESC NULLS LAST, ",
        };
        push_timestamp_expr(qb, path);
        qb.push(direction);
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        qb.push("doc #> ");
        qb.push_bind(segments);
        qb.push("::text[]");
        qb.push(direction);
    }
    qb.push("created_at ASC");
    if let Some(limit) = options.limit {
        qb.push(" LIMIT ");
        qb.push_bind(limit as i64);
    }
    if let Some(skip) = options.skip {
        qb.push(" OFFSET ");
        qb.push_bind(skip as i64);
    }
}

pub(crate) fn find_query(
    collection: &str,
    filter: &Filter,
    options: &FindOptions,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT doc FROM teamdesk_documents");
    push_scope(&mut qb, collection, filter);
    push_order(&mut qb, options);
    qb
}

impl DocumentStore for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn insert(
        &self,
        collection: &'static str,
        id: Uuid,
        _unique_key: Option<String>,
        doc: Value,
    ) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("INSERT INTO teamdesk_documents (collection, id, doc) VALUES ($1, $2, $3)")
                .bind(collection)
                .bind(id)
                .bind(doc)
                .execute(self.db.primary())
                .await
                .map_err(|e| map_sqlx_error(collection, e))?;
            Ok(())
        })
    }

    fn replace(
        &self,
        collection: &'static str,
        id: Uuid,
        _unique_key: Option<String>,
        doc: Value,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE teamdesk_documents SET doc = $3, updated_at = NOW() \
                 WHERE collection = $1 AND id = $2",
            )
            .bind(collection)
            .bind(id)
            .bind(doc)
            .execute(self.db.primary())
            .await
            .map_err(|e| map_sqlx_error(collection, e))?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn get(&self, collection: &'static str, id: Uuid) -> StoreFuture<'_, Option<Value>> {
        Box::pin(async move {
            sqlx::query_scalar::<_, Value>(
                "SELECT doc FROM teamdesk_documents WHERE collection = $1 AND id = $2",
            )
            .bind(collection)
            .bind(id)
            .fetch_optional(self.db.primary())
            .await
            .map_err(|e| map_sqlx_error(collection, e))
        })
    }

    fn find(
        &self,
        collection: &'static str,
        filter: Filter,
        options: FindOptions,
    ) -> StoreFuture<'_, Vec<Value>> {
        Box::pin(async move {
            let mut qb = find_query(collection, &filter, &options);
            qb.build_query_scalar::<Value>()
                .fetch_all(self.db.primary())
                .await
                .map_err(|e| map_sqlx_error(collection, e))
        })
    }

    fn count(&self, collection: &'static str, filter: Filter) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM teamdesk_documents");
            push_scope(&mut qb, collection, &filter);
            let count = qb
                .build_query_scalar::<i64>()
                .fetch_one(self.db.primary())
                .await
                .map_err(|e| map_sqlx_error(collection, e))?;
            Ok(count.max(0) as u64)
        })
    }

    fn delete(&self, collection: &'static str, id: Uuid) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result =
                sqlx::query("DELETE FROM teamdesk_documents WHERE collection = $1 AND id = $2")
                    .bind(collection)
                    .bind(id)
                    .execute(self.db.primary())
                    .await
                    .map_err(|e| map_sqlx_error(collection, e))?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn delete_many(&self, collection: &'static str, filter: Filter) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let mut qb = QueryBuilder::new("DELETE FROM teamdesk_documents");
            push_scope(&mut qb, collection, &filter);
            let result = qb
                .build()
                .execute(self.db.primary())
                .await
                .map_err(|e| map_sqlx_error(collection, e))?;
            Ok(result.rows_affected())
        })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.db.health_check().await })
    }
}
