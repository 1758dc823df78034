use async_trait::async_trait;
use itertools::Itertools;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use url::form_urlencoded::byte_serialize;

use crate::order::BatchedStatus;
use crate::{
    Acceptance, BackendError, NewOrder, OrderBackend, OrderId, StatusLookup, StatusReport,
};

/// JSON field names used in the creation request body. They are chosen by the
/// backend, so both the English and the Portuguese style need to be expressible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFields {
    pub product: String,
    pub quantity: String,
}

impl Default for RequestFields {
    fn default() -> Self {
        Self {
            product: "product".to_string(),
            quantity: "quantity".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Creation endpoint; status endpoints live under `<base_url>/status`.
    pub base_url: Url,
    pub fields: RequestFields,
    pub request_timeout: Duration,
}

impl HttpBackendConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            fields: RequestFields::default(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// `OrderBackend` over the backend's JSON HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self, BackendError> {
        let headers = [(header::ACCEPT, HeaderValue::from_static("application/json"))]
            .into_iter()
            .collect::<HeaderMap>();

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    pub const fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    fn status_base_url(&self) -> Result<Url, BackendError> {
        let mut url = self.config.base_url.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|()| BackendError::InvalidBaseUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .push("status");
        Ok(url)
    }

    pub(crate) fn status_url(&self, order_id: &OrderId) -> Result<Url, BackendError> {
        let mut url = self.status_base_url()?;
        url.path_segments_mut()
            .map_err(|()| BackendError::InvalidBaseUrl(self.config.base_url.clone()))?
            .push(order_id.as_str());
        Ok(url)
    }

    pub(crate) fn batch_status_url(&self, order_ids: &[OrderId]) -> Result<Url, BackendError> {
        let mut url = self.status_base_url()?;
        let ids = order_ids
            .iter()
            .map(|id| byte_serialize(id.as_str().as_bytes()).collect::<String>())
            .join(",");
        url.set_query(Some(&format!("ids={ids}")));
        Ok(url)
    }

    fn request_body(&self, order: &NewOrder) -> serde_json::Value {
        let mut body = serde_json::Map::new();

        if let Some(id) = &order.id {
            body.insert("id".to_string(), serde_json::json!(id.as_str()));
        }
        body.insert(
            self.config.fields.product.clone(),
            serde_json::json!(order.product),
        );
        body.insert(
            self.config.fields.quantity.clone(),
            serde_json::json!(order.quantity),
        );

        serde_json::Value::Object(body)
    }
}

fn parse_acceptance(body: &str) -> Result<Acceptance, BackendError> {
    if body.trim().is_empty() {
        return Ok(Acceptance::without_id());
    }

    serde_json::from_str(body).map_err(|source| BackendError::MalformedBody {
        action: "create order",
        source,
    })
}

#[async_trait]
impl OrderBackend for HttpBackend {
    async fn create_order(&self, order: &NewOrder) -> Result<Acceptance, BackendError> {
        let response = self
            .client
            .post(self.config.base_url.clone())
            .json(&self.request_body(order))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::ACCEPTED {
            match (parse_acceptance(&body), &order.id) {
                (Err(e), Some(client_id)) => {
                    warn!("Order {client_id} accepted with unreadable body ({e}), keeping client id");
                    Ok(Acceptance::without_id())
                }
                (acceptance, _) => acceptance,
            }
        } else if status == StatusCode::BAD_REQUEST {
            Err(BackendError::Rejected { body })
        } else {
            Err(BackendError::UnexpectedStatus {
                action: "create order",
                status,
                body,
            })
        }
    }

    async fn order_status(&self, order_id: &OrderId) -> Result<StatusLookup, BackendError> {
        let response = self.client.get(self.status_url(order_id)?).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(StatusLookup::NotFound);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::UnexpectedStatus {
                action: "get order status",
                status,
                body,
            });
        }

        let report: StatusReport =
            serde_json::from_str(&body).map_err(|source| BackendError::MalformedBody {
                action: "get order status",
                source,
            })?;

        Ok(StatusLookup::Found(report))
    }

    async fn order_statuses(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<(OrderId, StatusLookup)>, BackendError> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get(self.batch_status_url(order_ids)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::UnexpectedStatus {
                action: "get order statuses",
                status,
                body,
            });
        }

        let entries: Vec<BatchedStatus> =
            serde_json::from_str(&body).map_err(|source| BackendError::MalformedBody {
                action: "get order statuses",
                source,
            })?;

        let mut reported: HashMap<OrderId, StatusReport> = entries
            .into_iter()
            .filter_map(|entry| {
                let id = entry.id?;
                Some((OrderId::from(id.trim()), entry.report))
            })
            .collect();

        let lookups = order_ids
            .iter()
            .map(|id| {
                let lookup = reported
                    .remove(id)
                    .map_or(StatusLookup::NotFound, StatusLookup::Found);
                (id.clone(), lookup)
            })
            .collect();

        if !reported.is_empty() {
            debug!(
                "Ignoring {} unrequested entries in batched status response",
                reported.len()
            );
        }

        Ok(lookups)
    }
}
