use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{SubmissionError, ValidationError};
use crate::order::OrderId;
use order_backend::{NewOrder, OrderBackend};

/// Who assigns order identifiers.
#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdAssignment {
    /// The id returned in the 202 body is adopted.
    #[default]
    Backend,
    /// A UUID is generated before submission and sent with the order.
    Client,
}

/// A validated order request: trimmed, non-empty product and positive quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    product: String,
    quantity: u32,
}

impl OrderRequest {
    pub fn new(product: &str, quantity: i64) -> Result<Self, ValidationError> {
        let product = product.trim();
        if product.is_empty() {
            return Err(ValidationError::EmptyProduct);
        }

        if quantity <= 0 {
            return Err(ValidationError::NonPositiveQuantity(quantity));
        }

        let quantity =
            u32::try_from(quantity).map_err(|_| ValidationError::QuantityTooLarge(quantity))?;

        Ok(Self {
            product: product.to_string(),
            quantity,
        })
    }

    /// Validates raw text input, as typed into a form.
    pub fn parse(product: &str, quantity: &str) -> Result<Self, ValidationError> {
        let quantity = quantity.trim();
        if product.trim().is_empty() {
            return Err(ValidationError::EmptyProduct);
        }
        if quantity.is_empty() {
            return Err(ValidationError::MissingQuantity);
        }

        let quantity = quantity
            .parse::<i64>()
            .map_err(|_| ValidationError::UnparseableQuantity(quantity.to_string()))?;

        Self::new(product, quantity)
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    fn to_new_order(&self, id: Option<OrderId>) -> NewOrder {
        NewOrder {
            id,
            product: self.product.clone(),
            quantity: self.quantity,
        }
    }
}

/// Sends the creation request and resolves the id under the given policy.
/// Does not record anything; the caller does that once this succeeds.
pub(crate) async fn submit_order<B: OrderBackend + ?Sized>(
    backend: &B,
    request: &OrderRequest,
    id_assignment: IdAssignment,
) -> Result<OrderId, SubmissionError> {
    let client_id = match id_assignment {
        IdAssignment::Client => Some(OrderId::from(Uuid::new_v4().to_string())),
        IdAssignment::Backend => None,
    };

    debug!(
        "Submitting order: product={}, quantity={}, client_id={client_id:?}",
        request.product(),
        request.quantity()
    );

    let acceptance = backend
        .create_order(&request.to_new_order(client_id.clone()))
        .await?;

    match (client_id, acceptance.order_id()) {
        (Some(client_id), Some(returned)) if returned != client_id => {
            warn!("Backend returned id {returned} for client-assigned order {client_id}, keeping {client_id}");
            Ok(client_id)
        }
        (Some(client_id), _) => Ok(client_id),
        (None, Some(returned)) => Ok(returned),
        (None, None) => Err(SubmissionError::MissingOrderId),
    }
}
