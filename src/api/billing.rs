//! Billing endpoints: statement of account, bill CRUD and bulk import.
//!
//! Every bill carries a unique human-readable code. When the caller does not
//! supply one it is derived from the generated id; a collision fails the
//! insert's unique constraint and the caller may retry.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    bill_code_from_id, Bill, CreateBillRequest, Role, SoaResponse, UpdateBillRequest, BILL_STATUSES,
};
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;
use super::query::{self, EnrichSpec, ListQuery};
use super::validation::{validate_date, validate_one_of, validate_required, validate_uuid};
use super::{BulkBody, InsertedResponse, OkResponse};

const SOA_READ: &[Role] = &[Role::Client, Role::Admin, Role::Finance, Role::Cro];
const WRITE: &[Role] = &[Role::Admin, Role::Finance];

const BILL_ENRICH: &[EnrichSpec] = &[EnrichSpec {
    fk_field: "site_id",
    ref_table: "sites",
    ref_column: "name",
    out_field: "site_name",
    alt: None,
    fallback: "Unknown site",
}];

fn validate_bill(req: &CreateBillRequest) -> Result<(), ApiError> {
    validate_uuid(&req.site_id, "site_id").map_err(ApiError::validation)?;
    validate_date(&req.due_date, "due_date").map_err(ApiError::validation)?;
    if req.amount < 0.0 {
        return Err(ApiError::validation("amount cannot be negative"));
    }
    if let Some(status) = &req.status {
        validate_one_of(status, &BILL_STATUSES, "status").map_err(ApiError::validation)?;
    }
    if let Some(code) = &req.code {
        validate_required(code, "code").map_err(ApiError::validation)?;
        if code.len() < 4 || code.len() > 64 {
            return Err(ApiError::validation("code must be 4-64 characters"));
        }
    }
    Ok(())
}

/// Statement of account: bills in the due-date range, oldest first, plus the
/// outstanding total.
pub async fn statement_of_account(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<SoaResponse>, ApiError> {
    user.allow(SOA_READ)?;

    let from = query.from.clone().unwrap_or_else(|| "1970-01-01".to_string());
    let to = query.to.clone().unwrap_or_else(|| "2999-12-31".to_string());

    let rows: Vec<Bill> = match &query.site_id {
        Some(site_id) => {
            sqlx::query_as(
                "SELECT * FROM bills WHERE site_id = ? AND due_date BETWEEN ? AND ? \
                 ORDER BY due_date ASC LIMIT ?",
            )
            .bind(site_id)
            .bind(&from)
            .bind(&to)
            .bind(state.config.pagination.max_limit as i64)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT * FROM bills WHERE due_date BETWEEN ? AND ? ORDER BY due_date ASC LIMIT ?",
            )
            .bind(&from)
            .bind(&to)
            .bind(state.config.pagination.max_limit as i64)
            .fetch_all(&state.db)
            .await?
        }
    };

    // Decimal amounts are summed as f64 at this boundary; very large totals
    // may lose precision.
    let outstanding: f64 = rows
        .iter()
        .filter(|b| b.status == "OUTSTANDING")
        .map(|b| b.amount)
        .sum();

    let mut items = rows
        .into_iter()
        .map(|b| serde_json::to_value(b))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            tracing::error!("Failed to serialize bills: {}", e);
            ApiError::internal("Failed to serialize response")
        })?;
    query::enrich(&state.db, &mut items, BILL_ENRICH).await?;

    Ok(Json(SoaResponse { items, outstanding }))
}

pub async fn get_bill(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Bill>, ApiError> {
    user.allow(SOA_READ)?;
    let bill = query::fetch_by_id::<Bill>(&state.db, "bills", &id, "Bill").await?;
    Ok(Json(bill))
}

pub async fn create_bill(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateBillRequest>,
) -> Result<(StatusCode, Json<Bill>), ApiError> {
    user.allow(WRITE)?;
    validate_bill(&req)?;

    let id = Uuid::new_v4().to_string();
    let code = req.code.clone().unwrap_or_else(|| bill_code_from_id(&id));
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO bills (id, code, site_id, amount, due_date, status, invoice_url, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&code)
    .bind(&req.site_id)
    .bind(req.amount)
    .bind(&req.due_date)
    .bind(req.status.as_deref().unwrap_or("OUTSTANDING"))
    .bind(&req.invoice_url)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| match ApiError::from(e) {
        err if err.code() == super::ErrorCode::Conflict => {
            ApiError::conflict("A bill with this code already exists")
        }
        err => err,
    })?;

    let bill = query::fetch_by_id::<Bill>(&state.db, "bills", &id, "Bill").await?;
    Ok((StatusCode::CREATED, Json(bill)))
}

pub async fn update_bill(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateBillRequest>,
) -> Result<Json<Bill>, ApiError> {
    user.allow(WRITE)?;
    if let Some(due_date) = &req.due_date {
        validate_date(due_date, "due_date").map_err(ApiError::validation)?;
    }
    if let Some(status) = &req.status {
        validate_one_of(status, &BILL_STATUSES, "status").map_err(ApiError::validation)?;
    }
    if let Some(amount) = req.amount {
        if amount < 0.0 {
            return Err(ApiError::validation("amount cannot be negative"));
        }
    }

    let _existing = query::fetch_by_id::<Bill>(&state.db, "bills", &id, "Bill").await?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE bills SET amount = COALESCE(?, amount), due_date = COALESCE(?, due_date), \
         status = COALESCE(?, status), invoice_url = COALESCE(?, invoice_url), updated_at = ? \
         WHERE id = ?",
    )
    .bind(req.amount)
    .bind(&req.due_date)
    .bind(&req.status)
    .bind(&req.invoice_url)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let bill = query::fetch_by_id::<Bill>(&state.db, "bills", &id, "Bill").await?;
    Ok(Json(bill))
}

pub async fn delete_bill(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    user.allow(WRITE)?;
    query::delete_by_id(&state.db, "bills", &id, "Bill").await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn bulk_create_bills(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<BulkBody<CreateBillRequest>>,
) -> Result<(StatusCode, Json<InsertedResponse>), ApiError> {
    user.allow(WRITE)?;
    let items = body.into_items();
    if items.is_empty() {
        return Err(ApiError::bad_request("No items supplied"));
    }
    for item in &items {
        validate_bill(item)?;
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;
    let count = items.len();

    for item in items {
        let id = Uuid::new_v4().to_string();
        let code = item.code.clone().unwrap_or_else(|| bill_code_from_id(&id));
        sqlx::query(
            "INSERT INTO bills (id, code, site_id, amount, due_date, status, invoice_url, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&code)
        .bind(&item.site_id)
        .bind(item.amount)
        .bind(&item.due_date)
        .bind(item.status.as_deref().unwrap_or("OUTSTANDING"))
        .bind(&item.invoice_url)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(InsertedResponse { inserted: count })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::open_test_pool;

    fn finance() -> AuthUser {
        AuthUser {
            id: "fin-1".into(),
            role: "FINANCE".into(),
            name: "Finance".into(),
            email: "finance@x.co".into(),
        }
    }

    fn client() -> AuthUser {
        AuthUser {
            id: "client-1".into(),
            role: "CLIENT".into(),
            name: "Client".into(),
            email: "client@x.co".into(),
        }
    }

    const SITE: &str = "550e8400-e29b-41d4-a716-446655440000";

    async fn test_state() -> Arc<AppState> {
        let state = Arc::new(AppState::new(Config::default(), open_test_pool().await));
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO sites (id, name, strength, rate_per_guard, created_at, updated_at) \
             VALUES (?, 'Alpha Tower', 2, 100.0, ?, ?)",
        )
        .bind(SITE)
        .bind(&now)
        .bind(&now)
        .execute(&state.db)
        .await
        .unwrap();
        state
    }

    fn bill(amount: f64, due: &str, status: Option<&str>) -> CreateBillRequest {
        CreateBillRequest {
            code: None,
            site_id: SITE.into(),
            amount,
            due_date: due.into(),
            status: status.map(String::from),
            invoice_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_bill_generates_code() {
        let state = test_state().await;
        let (status, created) = create_bill(
            State(state.clone()),
            finance(),
            Json(bill(45000.0, "2025-07-01", Some("OUTSTANDING"))),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let re = regex::Regex::new(r"^BILL-[A-F0-9]{8}$").unwrap();
        assert!(re.is_match(&created.0.code), "code: {}", created.0.code);
    }

    #[tokio::test]
    async fn test_duplicate_code_conflicts() {
        let state = test_state().await;
        let mut first = bill(100.0, "2025-07-01", None);
        first.code = Some("BILL-FIXED001".into());
        create_bill(State(state.clone()), finance(), Json(first))
            .await
            .unwrap();

        let mut second = bill(200.0, "2025-08-01", None);
        second.code = Some("BILL-FIXED001".into());
        let err = create_bill(State(state.clone()), finance(), Json(second))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_statement_of_account_totals_outstanding() {
        let state = test_state().await;
        for (amount, due, status) in [
            (1000.0, "2025-05-01", Some("PAID")),
            (2500.0, "2025-06-01", Some("OUTSTANDING")),
            (1500.0, "2025-07-01", Some("OUTSTANDING")),
        ] {
            create_bill(State(state.clone()), finance(), Json(bill(amount, due, status)))
                .await
                .unwrap();
        }

        let soa = statement_of_account(
            State(state.clone()),
            client(),
            Query(ListQuery {
                site_id: Some(SITE.into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(soa.0.items.len(), 3);
        assert_eq!(soa.0.outstanding, 4000.0);
        // Oldest due date first, site name stitched on
        assert_eq!(soa.0.items[0]["due_date"], "2025-05-01");
        assert_eq!(soa.0.items[0]["site_name"], "Alpha Tower");
    }
}
