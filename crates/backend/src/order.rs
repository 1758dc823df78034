use serde::{Deserialize, Deserializer, Serialize};

use crate::OrderId;

/// Reads a scalar JSON value as a string token.
///
/// Backends are not consistent about token types: ids show up as strings or
/// integers, and a status may come back as `null`. Anything that is not a
/// scalar is rejected so the response is treated as malformed.
fn deserialize_token<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;

    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(token)) => Ok(Some(token)),
        Some(serde_json::Value::Number(number)) => Ok(Some(number.to_string())),
        Some(serde_json::Value::Bool(flag)) => Ok(Some(flag.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a scalar token, got {other}"
        ))),
    }
}

/// A validated order as it is sent to the creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Client-generated identifier, only set when the client assigns ids.
    pub id: Option<OrderId>,
    pub product: String,
    pub quantity: u32,
}

/// Body of a 202 response from the creation endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Acceptance {
    #[serde(default, rename = "id", deserialize_with = "deserialize_token")]
    raw_id: Option<String>,
}

impl Acceptance {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            raw_id: Some(id.into()),
        }
    }

    pub const fn without_id() -> Self {
        Self { raw_id: None }
    }

    /// The identifier assigned by the backend, if the body carried a usable one.
    pub fn order_id(&self) -> Option<OrderId> {
        self.raw_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(OrderId::from)
    }
}

/// Status payload of a single order as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StatusBody")]
pub struct StatusReport {
    pub status: Option<String>,
    pub detail: Option<String>,
}

/// Status body as sent. Backends put the failure text under different keys,
/// sometimes several at once; `detail` wins, then `mensagemErro`, `error`,
/// `message`.
#[derive(Debug, Default, Deserialize)]
struct StatusBody {
    #[serde(default, deserialize_with = "deserialize_token")]
    status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    detail: Option<String>,
    #[serde(default, rename = "mensagemErro", deserialize_with = "deserialize_text")]
    mensagem_erro: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    error: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    message: Option<String>,
}

impl From<StatusBody> for StatusReport {
    fn from(body: StatusBody) -> Self {
        let detail = [body.detail, body.mensagem_erro, body.error, body.message]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty());

        Self {
            status: body.status,
            detail,
        }
    }
}

/// Free text is never a reason to reject a body: structured values are kept
/// as their JSON rendering.
fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;

    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

impl StatusReport {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Outcome of looking up one order on the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLookup {
    Found(StatusReport),
    /// The backend answered 404: it does not (or no longer) recognise the id.
    NotFound,
}

/// One element of the batched status response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct BatchedStatus {
    #[serde(default, deserialize_with = "deserialize_token")]
    pub(crate) id: Option<String>,
    #[serde(flatten)]
    pub(crate) report: StatusReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_acceptance_string_id() {
        let acceptance: Acceptance = serde_json::from_value(json!({"id": "abc"})).unwrap();
        assert_eq!(acceptance.order_id(), Some(OrderId::from("abc")));
    }

    #[test]
    fn test_acceptance_numeric_id_is_rendered_as_string() {
        let acceptance: Acceptance = serde_json::from_value(json!({"id": 42})).unwrap();
        assert_eq!(acceptance.order_id(), Some(OrderId::from("42")));
    }

    #[test]
    fn test_acceptance_blank_or_missing_id() {
        let blank: Acceptance = serde_json::from_value(json!({"id": "   "})).unwrap();
        assert_eq!(blank.order_id(), None);

        let missing: Acceptance = serde_json::from_value(json!({"accepted": true})).unwrap();
        assert_eq!(missing.order_id(), None);

        let null: Acceptance = serde_json::from_value(json!({"id": null})).unwrap();
        assert_eq!(null.order_id(), None);
    }

    #[test]
    fn test_acceptance_rejects_structured_id() {
        let result = serde_json::from_value::<Acceptance>(json!({"id": {"value": "abc"}}));
        assert!(result.is_err());
    }

    #[test]
    fn test_status_report_detail_aliases() {
        let report: StatusReport =
            serde_json::from_value(json!({"status": "FALHA", "mensagemErro": "sem estoque"}))
                .unwrap();
        assert_eq!(report.status.as_deref(), Some("FALHA"));
        assert_eq!(report.detail.as_deref(), Some("sem estoque"));

        let report: StatusReport =
            serde_json::from_value(json!({"status": "FAILED", "detail": "out of stock"})).unwrap();
        assert_eq!(report.detail.as_deref(), Some("out of stock"));
    }

    #[test]
    fn test_status_report_with_several_detail_keys() {
        let report: StatusReport = serde_json::from_value(json!({
            "status": "FALHA",
            "mensagemErro": "sem estoque",
            "message": "Pedido falhou"
        }))
        .unwrap();
        assert_eq!(report, StatusReport::new("FALHA").with_detail("sem estoque"));

        let report: StatusReport = serde_json::from_value(json!({
            "status": "FAILED",
            "detail": "out of stock",
            "error": "E42",
            "message": ""
        }))
        .unwrap();
        assert_eq!(report.detail.as_deref(), Some("out of stock"));

        let report: StatusReport = serde_json::from_value(json!({
            "status": "FALHA",
            "mensagemErro": "  ",
            "error": {"code": 7}
        }))
        .unwrap();
        assert_eq!(report.detail.as_deref(), Some(r#"{"code":7}"#));
    }

    #[test]
    fn test_status_report_missing_status() {
        let report: StatusReport = serde_json::from_value(json!({})).unwrap();
        assert_eq!(report, StatusReport::default());
    }

    #[test]
    fn test_batched_status_with_several_detail_keys() {
        let entries: Vec<BatchedStatus> = serde_json::from_value(json!([
            {"id": "a", "status": "FALHA", "mensagemErro": "sem estoque", "message": "Pedido falhou"}
        ]))
        .unwrap();

        assert_eq!(
            entries[0].report,
            StatusReport::new("FALHA").with_detail("sem estoque")
        );
    }

    #[test]
    fn test_batched_status_flattens_report() {
        let entries: Vec<BatchedStatus> = serde_json::from_value(json!([
            {"id": "a", "status": "SUCESSO"},
            {"id": 7, "status": "FALHA", "error": "timeout"}
        ]))
        .unwrap();

        assert_eq!(entries[0].id.as_deref(), Some("a"));
        assert_eq!(entries[0].report, StatusReport::new("SUCESSO"));
        assert_eq!(entries[1].id.as_deref(), Some("7"));
        assert_eq!(
            entries[1].report,
            StatusReport::new("FALHA").with_detail("timeout")
        );
    }
}
