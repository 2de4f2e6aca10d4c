use std::sync::Arc;

use crate::domain::Gateway;
use crate::error::ProcessingError;
use crate::ports::GatewayRepository;

/// Chooses the gateway a new transaction is routed to.
///
/// Policy: among gateways serving the country/currency pair, the most recently
/// created one wins (ties broken by the higher id).
#[derive(Clone)]
pub struct GatewaySelector {
    gateways: Arc<dyn GatewayRepository>,
}

impl GatewaySelector {
    pub fn new(gateways: Arc<dyn GatewayRepository>) -> Self {
        Self { gateways }
    }

    pub async fn select_gateway(&self, country_id: i64, currency: &str) -> Result<Gateway, ProcessingError> {
        let currency = currency.trim().to_ascii_uppercase();
        let candidates = self
            .gateways
            .find_by_country_and_currency(country_id, &currency)
            .await?;

        tracing::debug!(country_id, currency = %currency, candidates = candidates.len(), "Gateway candidates fetched");

        candidates
            .into_iter()
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .ok_or(ProcessingError::NoRoute { country_id, currency })
    }
}
