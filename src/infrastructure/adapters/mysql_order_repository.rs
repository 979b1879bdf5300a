use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{Customer, Money, Order, PaymentDetails, PaymentPatch, PaymentStatus, ReferenceField};
use crate::ports::order_repository_port::OrderRepositoryPort;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sqlx::types::Json;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const SELECT_ORDER: &str = r#"
    SELECT id, gateway, amount_minor, currency, customer,
           payment_status, payment_details, paid_at,
           created_at, updated_at
    FROM orders
"#;

/// MySQL order store
#[derive(Clone)]
pub struct MySqlOrderRepository {
    pool: Arc<Pool<MySql>>,
}

impl MySqlOrderRepository {
    pub fn new(pool: Arc<Pool<MySql>>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepositoryPort for MySqlOrderRepository {
    async fn save(&self, order: &Order) -> DomainResult<()> {
        let query = r#"
            INSERT INTO orders (
                id, gateway, amount_minor, currency, customer,
                payment_status, payment_details, paid_at,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        sqlx::query(query)
            .bind(order.id)
            .bind(order.payment_gateway.to_string())
            .bind(order.amount.to_minor())
            .bind(&order.currency)
            .bind(Json(&order.customer))
            .bind(order.status().to_string())
            .bind(Json(&order.payment_details))
            .bind(order.payment_details.paid_at)
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(self.pool.as_ref())
            .await?;

        debug!(order_id = %order.id, "Order saved");
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Order>> {
        let query = format!("{} WHERE id = ?", SELECT_ORDER);

        let result = sqlx::query_as::<_, OrderRow>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        result.map(OrderRow::into_order).transpose()
    }

    async fn find_by_reference(
        &self,
        field: ReferenceField,
        value: &str,
    ) -> DomainResult<Option<Order>> {
        let query = format!(
            "{} WHERE JSON_UNQUOTE(JSON_EXTRACT(payment_details, ?)) = ? LIMIT 1",
            SELECT_ORDER
        );

        let result = sqlx::query_as::<_, OrderRow>(&query)
            .bind(format!("$.{}", field.as_str()))
            .bind(value)
            .fetch_optional(self.pool.as_ref())
            .await?;

        result.map(OrderRow::into_order).transpose()
    }

    async fn set_reference(
        &self,
        id: Uuid,
        field: ReferenceField,
        value: &str,
    ) -> DomainResult<()> {
        let query = r#"
            UPDATE orders
            SET payment_details = JSON_SET(payment_details, ?, ?), updated_at = ?
            WHERE id = ?
        "#;

        let rows_affected = sqlx::query(query)
            .bind(format!("$.{}", field.as_str()))
            .bind(value)
            .bind(chrono::Utc::now())
            .bind(id)
            .execute(self.pool.as_ref())
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(DomainError::OrderNotFound(id.to_string()));
        }

        debug!(order_id = %id, field = %field, "Order reference recorded");
        Ok(())
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        patch: &PaymentPatch,
    ) -> DomainResult<Option<Order>> {
        // status guard and write happen in one statement
        let query = r#"
            UPDATE orders
            SET payment_status = ?,
                paid_at = COALESCE(?, paid_at),
                payment_details = JSON_SET(
                    JSON_MERGE_PATCH(payment_details, ?),
                    '$.diagnostics', CAST(? AS JSON)
                ),
                updated_at = ?
            WHERE id = ? AND payment_status = ?
        "#;

        let rows_affected = sqlx::query(query)
            .bind(patch.status.to_string())
            .bind(patch.paid_at)
            .bind(Json(merge_document(patch)))
            .bind(Json(&patch.diagnostics))
            .bind(patch.updated_at)
            .bind(id)
            .bind(expected.to_string())
            .execute(self.pool.as_ref())
            .await?
            .rows_affected();

        if rows_affected == 0 {
            debug!(order_id = %id, expected = %expected, "Conditional update precondition failed");
            return Ok(None);
        }

        self.find_by_id(id).await
    }
}

/// JSON merge-patch document for `payment_details`
fn merge_document(patch: &PaymentPatch) -> Value {
    let mut doc = Map::new();
    doc.insert("status".to_string(), json!(patch.status));
    if let Some(paid_at) = patch.paid_at {
        doc.insert("paidAt".to_string(), json!(paid_at));
    }
    for (field, value) in &patch.references {
        doc.insert(field.clone(), Value::String(value.clone()));
    }
    Value::Object(doc)
}

/// Database row
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    gateway: String,
    amount_minor: i64,
    currency: String,
    customer: Json<Customer>,
    payment_status: String,
    payment_details: Json<PaymentDetails>,
    paid_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl OrderRow {
    fn into_order(self) -> DomainResult<Order> {
        let mut payment_details = self.payment_details.0;
        // the column is authoritative, the JSON copy is informational
        payment_details.status = self
            .payment_status
            .parse()
            .map_err(|_| DomainError::InternalError(format!("Invalid payment status: {}", self.payment_status)))?;
        payment_details.paid_at = self.paid_at;

        Ok(Order {
            id: self.id,
            payment_gateway: self
                .gateway
                .parse()
                .map_err(|_| DomainError::InternalError(format!("Invalid gateway: {}", self.gateway)))?,
            amount: Money::from_minor(self.amount_minor),
            currency: self.currency,
            customer: self.customer.0,
            payment_details,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Diagnostics;
    use std::collections::BTreeMap;

    #[test]
    fn test_merge_document_omits_missing_paid_at() {
        let patch = PaymentPatch {
            status: PaymentStatus::Failed,
            paid_at: None,
            references: BTreeMap::from([("payuPaymentId".to_string(), "403993715".to_string())]),
            diagnostics: Diagnostics::default(),
            updated_at: chrono::Utc::now(),
        };

        let doc = merge_document(&patch);
        assert_eq!(doc["status"], "failed");
        assert_eq!(doc["payuPaymentId"], "403993715");
        assert!(doc.get("paidAt").is_none());
    }
}
