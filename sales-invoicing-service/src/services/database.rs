//! PostgreSQL-backed record store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, PgConnection};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    CatalogService, Invoice, InvoiceFilter, Payment, PaymentFilter, PipelineHistoryEntry,
    PipelineState, SalesRep, ServiceLineItem,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{InvoiceWrite, RecordStore};

const INVOICE_COLUMNS: &str = "invoice_id, account_id, sales_rep_id, tax_rate, discount_percent, \
     due_date, status, final_total, commission_amount, date_created, date_updated";

const LINE_COLUMNS: &str = "invoice_service_id, invoice_id, service_id, service_name, \
     price_per_unit, quantity, discount_percent, total_price, date_created";

const PAYMENT_COLUMNS: &str = "payment_id, invoice_id, account_id, sales_rep_id, total_paid, \
     payment_method, last_four_payment_method, date_paid, logged_by";

const PIPELINE_COLUMNS: &str = "invoice_id, current_stage, start_date, contacted_at, \
     order_placed_at, payment_not_received_at, payment_received_at, order_packaged_at, \
     order_shipped_at, order_delivered_at, payment_issue_notified_at, \
     payment_issue_escalated_at, updated_at";

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

#[derive(FromRow)]
struct HistoryRow {
    history_id: Uuid,
    invoice_id: Uuid,
    stage: Option<String>,
    action: String,
    note: Option<String>,
    actor_user_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for PipelineHistoryEntry {
    type Error = AppError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            history_id: row.history_id,
            invoice_id: row.invoice_id,
            stage: row.stage.map(|s| s.parse()).transpose()?,
            action: row.action.try_into()?,
            note: row.note,
            actor_user_id: row.actor_user_id,
            created_at: row.created_at,
        })
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[instrument(skip(database_url), fields(service = "sales-invoicing-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(db_error("Failed to connect"))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("Health check failed"))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invoices
    // -------------------------------------------------------------------------

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.invoice_id))]
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO invoices (invoice_id, account_id, sales_rep_id, tax_rate, discount_percent,
                                  due_date, status, final_total, commission_amount, date_created, date_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(invoice.invoice_id)
        .bind(invoice.account_id)
        .bind(invoice.sales_rep_id)
        .bind(invoice.tax_rate)
        .bind(invoice.discount_percent)
        .bind(invoice.due_date)
        .bind(invoice.status.as_str())
        .bind(invoice.final_total)
        .bind(invoice.commission_amount)
        .bind(invoice.date_created)
        .bind(invoice.date_updated)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to create invoice"))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get invoice"))?;

        timer.observe_duration();
        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS} FROM invoices
            WHERE ($1::uuid IS NULL OR sales_rep_id = $1)
              AND ($2::uuid IS NULL OR account_id = $2)
            ORDER BY date_created DESC
            "#
        ))
        .bind(filter.sales_rep_id)
        .bind(filter.account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list invoices"))?;

        timer.observe_duration();
        Ok(invoices)
    }

    #[instrument(skip(self, invoice, write), fields(invoice_id = %invoice.invoice_id))]
    async fn commit_invoice_write(
        &self,
        invoice: &Invoice,
        write: &InvoiceWrite,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["commit_invoice_write"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        apply_write(&mut tx, write).await?;
        let updated = update_invoice(&mut tx, invoice)
            .await
            .map_err(db_error("Failed to update invoice"))?;
        if !updated {
            tx.rollback().await.ok();
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Invoice {} not found",
                invoice.invoice_id
            )));
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_invoice(&self, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        // Dependent rows go with ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM invoices WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::Conflict(anyhow::anyhow!("Invoice still has payments"))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e)),
            })?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Reference data
    // -------------------------------------------------------------------------

    #[instrument(skip(self, service), fields(service_id = %service.service_id))]
    async fn upsert_catalog_service(&self, service: &CatalogService) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO catalog_services (service_id, service_name, price_per_unit)
            VALUES ($1, $2, $3)
            ON CONFLICT (service_id)
            DO UPDATE SET service_name = EXCLUDED.service_name, price_per_unit = EXCLUDED.price_per_unit
            "#,
        )
        .bind(service.service_id)
        .bind(&service.service_name)
        .bind(service.price_per_unit)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to upsert catalog service"))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_catalog_service(
        &self,
        service_id: Uuid,
    ) -> Result<Option<CatalogService>, AppError> {
        sqlx::query_as::<_, CatalogService>(
            "SELECT service_id, service_name, price_per_unit FROM catalog_services WHERE service_id = $1",
        )
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get catalog service"))
    }

    #[instrument(skip(self, rep), fields(user_id = %rep.user_id))]
    async fn upsert_sales_rep(&self, rep: &SalesRep) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO sales_reps (user_id, email, commission_rate, receives_commission)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id)
            DO UPDATE SET email = EXCLUDED.email,
                          commission_rate = EXCLUDED.commission_rate,
                          receives_commission = EXCLUDED.receives_commission
            "#,
        )
        .bind(rep.user_id)
        .bind(&rep.email)
        .bind(rep.commission_rate)
        .bind(rep.receives_commission)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to upsert sales rep"))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_sales_rep(&self, user_id: Uuid) -> Result<Option<SalesRep>, AppError> {
        sqlx::query_as::<_, SalesRep>(
            "SELECT user_id, email, commission_rate, receives_commission FROM sales_reps WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get sales rep"))
    }

    // -------------------------------------------------------------------------
    // Line items
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn list_line_items(&self, invoice_id: Uuid) -> Result<Vec<ServiceLineItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_line_items"])
            .start_timer();

        let lines = sqlx::query_as::<_, ServiceLineItem>(&format!(
            "SELECT {LINE_COLUMNS} FROM invoice_services WHERE invoice_id = $1 ORDER BY date_created"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list line items"))?;

        timer.observe_duration();
        Ok(lines)
    }

    // -------------------------------------------------------------------------
    // Payments
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_id = $1"
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get payment"))
    }

    #[instrument(skip(self))]
    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE ($1::uuid IS NULL OR invoice_id = $1)
              AND ($2::uuid IS NULL OR account_id = $2)
              AND ($3::uuid IS NULL OR sales_rep_id = $3)
            ORDER BY date_paid DESC
            "#
        ))
        .bind(filter.invoice_id)
        .bind(filter.account_id)
        .bind(filter.sales_rep_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list payments"))?;

        timer.observe_duration();
        Ok(payments)
    }

    // -------------------------------------------------------------------------
    // Pipeline
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn get_pipeline(&self, invoice_id: Uuid) -> Result<Option<PipelineState>, AppError> {
        sqlx::query_as::<_, PipelineState>(&format!(
            "SELECT {PIPELINE_COLUMNS} FROM invoice_pipelines WHERE invoice_id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get pipeline"))
    }

    #[instrument(skip(self, state), fields(invoice_id = %state.invoice_id, stage = %state.current_stage))]
    async fn save_pipeline(&self, state: &PipelineState) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["save_pipeline"])
            .start_timer();

        let mut conn = self.pool.acquire().await.map_err(db_error("Failed to acquire connection"))?;
        upsert_pipeline(&mut conn, state)
            .await
            .map_err(db_error("Failed to save pipeline"))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self, state, history), fields(invoice_id = %state.invoice_id, stage = %state.current_stage))]
    async fn save_pipeline_transition(
        &self,
        state: &PipelineState,
        history: &[PipelineHistoryEntry],
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["save_pipeline_transition"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        upsert_pipeline(&mut tx, state)
            .await
            .map_err(db_error("Failed to save pipeline"))?;
        for entry in history {
            insert_history(&mut tx, entry)
                .await
                .map_err(db_error("Failed to append pipeline history"))?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self, entry), fields(invoice_id = %entry.invoice_id, action = entry.action.as_str()))]
    async fn append_history(&self, entry: &PipelineHistoryEntry) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await.map_err(db_error("Failed to acquire connection"))?;
        insert_history(&mut conn, entry)
            .await
            .map_err(db_error("Failed to append pipeline history"))
    }

    #[instrument(skip(self))]
    async fn list_history(
        &self,
        invoice_id: Uuid,
    ) -> Result<Vec<PipelineHistoryEntry>, AppError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT history_id, invoice_id, stage, action, note, actor_user_id, created_at
            FROM invoice_pipeline_history
            WHERE invoice_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list pipeline history"))?;

        rows.into_iter().map(PipelineHistoryEntry::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn add_follower(&self, invoice_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO invoice_pipeline_followers (invoice_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (invoice_id, user_id) DO NOTHING
            "#,
        )
        .bind(invoice_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to follow pipeline"))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn remove_follower(&self, invoice_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM invoice_pipeline_followers WHERE invoice_id = $1 AND user_id = $2",
        )
        .bind(invoice_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to unfollow pipeline"))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_followers(&self, invoice_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM invoice_pipeline_followers WHERE invoice_id = $1 ORDER BY created_at",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list followers"))
    }
}

/// Writes the invoice row; false when it does not exist.
async fn update_invoice(conn: &mut PgConnection, invoice: &Invoice) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE invoices
        SET tax_rate = $2, discount_percent = $3, due_date = $4, status = $5,
            final_total = $6, commission_amount = $7, date_updated = $8
        WHERE invoice_id = $1
        "#,
    )
    .bind(invoice.invoice_id)
    .bind(invoice.tax_rate)
    .bind(invoice.discount_percent)
    .bind(invoice.due_date)
    .bind(invoice.status.as_str())
    .bind(invoice.final_total)
    .bind(invoice.commission_amount)
    .bind(invoice.date_updated)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

async fn apply_write(conn: &mut PgConnection, write: &InvoiceWrite) -> Result<(), AppError> {
    let (result, context) = match write {
        InvoiceWrite::Invoice => return Ok(()),
        InvoiceWrite::InsertLineItem(line) => (
            sqlx::query(
                r#"
                INSERT INTO invoice_services (invoice_service_id, invoice_id, service_id, service_name,
                                              price_per_unit, quantity, discount_percent, total_price, date_created)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(line.invoice_service_id)
            .bind(line.invoice_id)
            .bind(line.service_id)
            .bind(&line.service_name)
            .bind(line.price_per_unit)
            .bind(line.quantity)
            .bind(line.discount_percent)
            .bind(line.total_price)
            .bind(line.date_created)
            .execute(&mut *conn)
            .await,
            "Failed to add line item",
        ),
        InvoiceWrite::UpdateLineItem(line) => (
            sqlx::query(
                r#"
                UPDATE invoice_services
                SET quantity = $2, discount_percent = $3, total_price = $4
                WHERE invoice_service_id = $1
                "#,
            )
            .bind(line.invoice_service_id)
            .bind(line.quantity)
            .bind(line.discount_percent)
            .bind(line.total_price)
            .execute(&mut *conn)
            .await,
            "Failed to update line item",
        ),
        InvoiceWrite::DeleteLineItem(line_id) => (
            sqlx::query("DELETE FROM invoice_services WHERE invoice_service_id = $1")
                .bind(*line_id)
                .execute(&mut *conn)
                .await,
            "Failed to delete line item",
        ),
        InvoiceWrite::InsertPayment(payment) => (
            sqlx::query(
                r#"
                INSERT INTO payments (payment_id, invoice_id, account_id, sales_rep_id, total_paid,
                                      payment_method, last_four_payment_method, date_paid, logged_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(payment.payment_id)
            .bind(payment.invoice_id)
            .bind(payment.account_id)
            .bind(payment.sales_rep_id)
            .bind(payment.total_paid)
            .bind(&payment.payment_method)
            .bind(&payment.last_four_payment_method)
            .bind(payment.date_paid)
            .bind(payment.logged_by)
            .execute(&mut *conn)
            .await,
            "Failed to log payment",
        ),
        InvoiceWrite::UpdatePayment(payment) => (
            sqlx::query(
                r#"
                UPDATE payments
                SET total_paid = $2, payment_method = $3, last_four_payment_method = $4, date_paid = $5
                WHERE payment_id = $1
                "#,
            )
            .bind(payment.payment_id)
            .bind(payment.total_paid)
            .bind(&payment.payment_method)
            .bind(&payment.last_four_payment_method)
            .bind(payment.date_paid)
            .execute(&mut *conn)
            .await,
            "Failed to update payment",
        ),
        InvoiceWrite::DeletePayment(payment_id) => (
            sqlx::query("DELETE FROM payments WHERE payment_id = $1")
                .bind(*payment_id)
                .execute(&mut *conn)
                .await,
            "Failed to delete payment",
        ),
    };

    let result = result.map_err(db_error(context))?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(anyhow::anyhow!("{}: row not found", context)));
    }
    Ok(())
}

async fn upsert_pipeline(conn: &mut PgConnection, state: &PipelineState) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        r#"
        INSERT INTO invoice_pipelines ({PIPELINE_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (invoice_id) DO UPDATE SET
            current_stage = EXCLUDED.current_stage,
            start_date = EXCLUDED.start_date,
            contacted_at = EXCLUDED.contacted_at,
            order_placed_at = EXCLUDED.order_placed_at,
            payment_not_received_at = EXCLUDED.payment_not_received_at,
            payment_received_at = EXCLUDED.payment_received_at,
            order_packaged_at = EXCLUDED.order_packaged_at,
            order_shipped_at = EXCLUDED.order_shipped_at,
            order_delivered_at = EXCLUDED.order_delivered_at,
            payment_issue_notified_at = EXCLUDED.payment_issue_notified_at,
            payment_issue_escalated_at = EXCLUDED.payment_issue_escalated_at,
            updated_at = EXCLUDED.updated_at
        "#
    ))
    .bind(state.invoice_id)
    .bind(state.current_stage.as_str())
    .bind(state.start_date)
    .bind(state.contacted_at)
    .bind(state.order_placed_at)
    .bind(state.payment_not_received_at)
    .bind(state.payment_received_at)
    .bind(state.order_packaged_at)
    .bind(state.order_shipped_at)
    .bind(state.order_delivered_at)
    .bind(state.payment_issue_notified_at)
    .bind(state.payment_issue_escalated_at)
    .bind(state.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_history(
    conn: &mut PgConnection,
    entry: &PipelineHistoryEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO invoice_pipeline_history (history_id, invoice_id, stage, action, note, actor_user_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.history_id)
    .bind(entry.invoice_id)
    .bind(entry.stage.map(|s| s.as_str()))
    .bind(entry.action.as_str())
    .bind(&entry.note)
    .bind(entry.actor_user_id)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    const SCHEMA: &str = include_str!("../../migrations/20260101000000_initial.sql");

    #[test]
    fn test_schema_keeps_full_decimal_precision() {
        assert!(SCHEMA.contains("total_paid"));
        assert!(
            !SCHEMA.contains("NUMERIC("),
            "amount columns must not round or cap stored values"
        );
    }

    #[test]
    fn test_payments_carry_owner_columns() {
        let payments = SCHEMA
            .split("CREATE TABLE IF NOT EXISTS payments")
            .nth(1)
            .and_then(|rest| rest.split(");").next())
            .unwrap();
        assert!(payments.contains("account_id"));
        assert!(payments.contains("sales_rep_id"));
    }
}
