use crate::models::OrderCreate;
use crate::scope::MuseumScope;
use async_trait::async_trait;
use queue_worker::{QueueError, ScopedHandler};
use tracing::info;

pub struct OrderHandler;

#[async_trait]
impl<S: MuseumScope> ScopedHandler<OrderCreate, S> for OrderHandler {
    async fn handle(&self, scope: &S, order: &OrderCreate) -> Result<(), QueueError> {
        if order.items.is_empty() {
            return Err(QueueError::permanent(format!(
                "order {} has no items",
                order.order_code
            )));
        }

        scope.services().orders.create_order(order).await?;
        info!(
            order_code = order.order_code,
            user_id = %order.user_id,
            items = order.items.len(),
            total_amount = order.total_amount,
            "Order created"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "OrderHandler"
    }
}
