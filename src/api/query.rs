//! Generic filtered listing with pagination and name enrichment.
//!
//! Every resource module describes itself with a static [`ListSpec`] (table,
//! natural date column, filterable columns, foreign-key display maps) and gets
//! the same behavior: conjunction of equality and date-range predicates,
//! newest-first ordering, one bounded page, then a denormalization pass that
//! stitches `<field>_name` values onto the serialized rows. The stitched
//! names are display-only; they carry no referential-integrity meaning.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::collections::{BTreeSet, HashMap};

use crate::config::PaginationConfig;
use crate::db::DbPool;

use super::error::ApiError;

/// Open-ended date range defaults, matching the storage format
const DATE_MIN: &str = "1970-01-01";
const DATE_MAX: &str = "2999-12-31";

/// Foreign-key display map: resolve `fk_field` against `ref_table` and attach
/// the referenced display column as `out_field`.
pub struct EnrichSpec {
    pub fk_field: &'static str,
    pub ref_table: &'static str,
    pub ref_column: &'static str,
    pub out_field: &'static str,
    /// Secondary table consulted for ids the primary table cannot resolve
    /// (attendance guards may predate the roster and live in users).
    pub alt: Option<(&'static str, &'static str)>,
    /// Stable sentinel for ids neither table resolves
    pub fallback: &'static str,
}

/// Per-entity descriptor driving [`list_rows`].
pub struct ListSpec {
    pub table: &'static str,
    /// Natural date field: range filter and descending sort key
    pub date_column: &'static str,
    /// (query parameter, column) pairs usable as equality predicates
    pub filters: &'static [(&'static str, &'static str)],
    pub enrich: &'static [EnrichSpec],
}

/// Common list-endpoint query parameters. Unknown parameters are ignored;
/// camelCase aliases match what the mobile client sends.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListQuery {
    #[serde(default, alias = "siteId")]
    pub site_id: Option<String>,
    #[serde(default, alias = "clientId")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl ListQuery {
    fn value_for(&self, param: &str) -> Option<&str> {
        match param {
            "site_id" => self.site_id.as_deref(),
            "client_id" => self.client_id.as_deref(),
            "status" => self.status.as_deref(),
            "role" => self.role.as_deref(),
            _ => None,
        }
    }

    pub fn has_date_range(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }
}

/// Resolve the effective page size: caller's limit bounded by the configured
/// maximum, falling back to the configured default.
pub fn effective_limit(requested: Option<u32>, config: &PaginationConfig) -> i64 {
    let limit = requested.unwrap_or(config.default_limit);
    limit.clamp(1, config.max_limit) as i64
}

/// Run the spec's filtered, ordered, bounded SELECT and return serialized,
/// enriched rows.
pub async fn list_rows<T>(
    pool: &DbPool,
    spec: &ListSpec,
    query: &ListQuery,
    pagination: &PaginationConfig,
) -> Result<Vec<Value>, ApiError>
where
    T: for<'r> FromRow<'r, SqliteRow> + Serialize + Send + Unpin,
{
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM ");
    qb.push(spec.table);

    let mut first = true;
    for (param, column) in spec.filters {
        if let Some(value) = query.value_for(param) {
            qb.push(if first { " WHERE " } else { " AND " });
            first = false;
            qb.push(*column);
            qb.push(" = ");
            qb.push_bind(value.to_string());
        }
    }

    if query.has_date_range() {
        qb.push(if first { " WHERE " } else { " AND " });
        qb.push(spec.date_column);
        qb.push(" BETWEEN ");
        qb.push_bind(query.from.clone().unwrap_or_else(|| DATE_MIN.to_string()));
        qb.push(" AND ");
        qb.push_bind(query.to.clone().unwrap_or_else(|| DATE_MAX.to_string()));
    }

    qb.push(" ORDER BY ");
    qb.push(spec.date_column);
    qb.push(" DESC LIMIT ");
    qb.push_bind(effective_limit(query.limit, pagination));

    let rows: Vec<T> = qb.build_query_as().fetch_all(pool).await?;

    let mut values = rows
        .into_iter()
        .map(|r| serde_json::to_value(r))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            tracing::error!("Failed to serialize rows from {}: {}", spec.table, e);
            ApiError::internal("Failed to serialize response")
        })?;

    enrich(pool, &mut values, spec.enrich).await?;
    Ok(values)
}

/// Attach display names for each enrichment spec: collect the distinct
/// foreign-key values present, batch-fetch the referenced display column once
/// per table, and stitch the result onto every row. Null references stay
/// null; unresolved ones get the spec's fallback string.
pub async fn enrich(
    pool: &DbPool,
    rows: &mut [Value],
    specs: &[EnrichSpec],
) -> Result<(), ApiError> {
    for spec in specs {
        let ids: BTreeSet<String> = rows
            .iter()
            .filter_map(|r| r.get(spec.fk_field).and_then(Value::as_str))
            .map(String::from)
            .collect();

        let mut names: HashMap<String, String> = HashMap::new();
        if !ids.is_empty() {
            lookup_names(pool, spec.ref_table, spec.ref_column, &ids, &mut names).await?;

            if let Some((alt_table, alt_column)) = spec.alt {
                let unresolved: BTreeSet<String> = ids
                    .iter()
                    .filter(|id| !names.contains_key(*id))
                    .cloned()
                    .collect();
                if !unresolved.is_empty() {
                    lookup_names(pool, alt_table, alt_column, &unresolved, &mut names).await?;
                }
            }
        }

        for row in rows.iter_mut() {
            let resolved = match row.get(spec.fk_field).and_then(Value::as_str) {
                Some(id) => Value::String(
                    names
                        .get(id)
                        .cloned()
                        .unwrap_or_else(|| spec.fallback.to_string()),
                ),
                None => Value::Null,
            };
            if let Some(obj) = row.as_object_mut() {
                obj.insert(spec.out_field.to_string(), resolved);
            }
        }
    }
    Ok(())
}

async fn lookup_names(
    pool: &DbPool,
    table: &str,
    column: &str,
    ids: &BTreeSet<String>,
    out: &mut HashMap<String, String>,
) -> Result<(), ApiError> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id, ");
    qb.push(column);
    qb.push(" FROM ");
    qb.push(table);
    qb.push(" WHERE id IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.clone());
    }
    qb.push(")");

    let rows: Vec<(String, String)> = qb.build_query_as().fetch_all(pool).await?;
    for (id, name) in rows {
        out.insert(id, name);
    }
    Ok(())
}

/// Fetch one row by primary key or fail with 404.
pub async fn fetch_by_id<T>(
    pool: &DbPool,
    table: &str,
    id: &str,
    entity: &str,
) -> Result<T, ApiError>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let sql = format!("SELECT * FROM {} WHERE id = ?", table);
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", entity)))
}

/// Delete one row by primary key or fail with 404.
pub async fn delete_by_id(
    pool: &DbPool,
    table: &str,
    id: &str,
    entity: &str,
) -> Result<(), ApiError> {
    let sql = format!("DELETE FROM {} WHERE id = ?", table);
    let result = sqlx::query(&sql).bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("{} not found", entity)));
    }
    Ok(())
}
