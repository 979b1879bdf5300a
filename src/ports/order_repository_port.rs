use crate::domain::errors::DomainResult;
use crate::domain::{Order, PaymentPatch, PaymentStatus, ReferenceField};
use async_trait::async_trait;
use uuid::Uuid;

/// Order store port
#[async_trait]
pub trait OrderRepositoryPort: Send + Sync {
    /// Insert a new order
    async fn save(&self, order: &Order) -> DomainResult<()>;

    /// Find an order by its internal id
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Order>>;

    /// Find the order whose `paymentDetails.<field>` equals `value`
    async fn find_by_reference(
        &self,
        field: ReferenceField,
        value: &str,
    ) -> DomainResult<Option<Order>>;

    /// Record a gateway-assigned reference on an order
    async fn set_reference(&self, id: Uuid, field: ReferenceField, value: &str)
        -> DomainResult<()>;

    /// Apply `patch` only if the stored status still equals `expected`.
    ///
    /// Returns the updated order, or `None` when the precondition no longer holds.
    /// Implementations must check and write in a single atomic step.
    async fn conditional_update(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        patch: &PaymentPatch,
    ) -> DomainResult<Option<Order>>;
}
