use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{Order, PaymentPatch, PaymentStatus, ReferenceField};
use crate::ports::order_repository_port::OrderRepositoryPort;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// In-process order store; conditional updates check and write under one write lock
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderRepositoryPort for InMemoryOrderRepository {
    async fn save(&self, order: &Order) -> DomainResult<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(DomainError::ValidationError(format!(
                "Order already exists: {}",
                order.id
            )));
        }
        orders.insert(order.id, order.clone());
        debug!(order_id = %order.id, "Order saved");
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_by_reference(
        &self,
        field: ReferenceField,
        value: &str,
    ) -> DomainResult<Option<Order>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|order| order.reference(field) == Some(value))
            .cloned())
    }

    async fn set_reference(
        &self,
        id: Uuid,
        field: ReferenceField,
        value: &str,
    ) -> DomainResult<()> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| DomainError::OrderNotFound(id.to_string()))?;
        order.set_reference(field, value.to_string());
        Ok(())
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        patch: &PaymentPatch,
    ) -> DomainResult<Option<Order>> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&id) {
            Some(order) if order.status() == expected => {
                order.apply_patch(patch);
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }
}
