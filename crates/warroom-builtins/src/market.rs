use crate::{str_arg, tool_error};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use warroom_core::{ToolCall, ToolResult, WarroomError, WarroomResult};
use warroom_security::Capability;
use warroom_skills::{Skill, SkillDescriptor};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the market-data and shipping-estimate endpoints.
///
/// Transport and HTTP status failures don't surface as `Err`; they become an
/// `{"error": ...}` object the calling agent can read.
pub struct MarketClient {
    base_url: String,
    client: reqwest::Client,
}

impl MarketClient {
    /// Client against `base_url` (e.g. `http://localhost:8080`).
    pub fn new(base_url: impl Into<String>) -> WarroomResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WarroomError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Spot price and availability for `chip`.
    pub async fn fetch_spot_prices(&self, chip: &str) -> serde_json::Value {
        info!(chip = %chip, "Fetching spot prices");
        match self.get_json("/v1/market/spot", &[("chip", chip)]).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Market API call failed");
                serde_json::json!({ "error": format!("Market API unreachable: {e}") })
            }
        }
    }

    /// Shipping duration and cost from `origin` to `destination`.
    pub async fn estimate_shipping(&self, origin: &str, destination: &str) -> serde_json::Value {
        info!(origin = %origin, dest = %destination, "Estimating shipping");
        match self
            .get_json(
                "/v1/shipping/estimate",
                &[("origin", origin), ("dest", destination)],
            )
            .await
        {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Shipping API call failed");
                serde_json::json!({ "error": format!("Shipping API unreachable: {e}") })
            }
        }
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, reqwest::Error> {
        self.client
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

fn json_result(call: &ToolCall, body: &serde_json::Value) -> WarroomResult<ToolResult> {
    let content = serde_json::to_string(body)?;
    if body.get("error").is_some() {
        Ok(ToolResult::error(&call.id, content))
    } else {
        Ok(ToolResult::success(&call.id, content))
    }
}

/// `fetch_spot_prices`: current spot-market offer for a GPU model.
pub struct FetchSpotPricesSkill {
    descriptor: SkillDescriptor,
    client: Arc<MarketClient>,
}

impl FetchSpotPricesSkill {
    /// Skill over `client`.
    pub fn new(client: Arc<MarketClient>) -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: "fetch_spot_prices".to_string(),
                description: "Check the spot market price and availability of a GPU model."
                    .to_string(),
                parameters_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "chip_type": {"type": "string", "description": "GPU model (default: H100)"}
                    }
                }),
                required_capabilities: vec![Capability::MarketApi],
            },
            client,
        }
    }
}

#[async_trait]
impl Skill for FetchSpotPricesSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> WarroomResult<ToolResult> {
        let chip = str_arg(&call, "chip_type").unwrap_or("H100");
        let body = self.client.fetch_spot_prices(chip).await;
        json_result(&call, &body)
    }
}

/// `estimate_shipping`: quote a shipping route.
pub struct EstimateShippingSkill {
    descriptor: SkillDescriptor,
    client: Arc<MarketClient>,
}

impl EstimateShippingSkill {
    /// Skill over `client`.
    pub fn new(client: Arc<MarketClient>) -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: "estimate_shipping".to_string(),
                description: "Quote shipping duration and cost between two countries."
                    .to_string(),
                parameters_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "origin": {"type": "string", "description": "Origin country code, e.g. TW"},
                        "destination": {"type": "string", "description": "Destination country code (default: US)"}
                    },
                    "required": ["origin"]
                }),
                required_capabilities: vec![Capability::MarketApi],
            },
            client,
        }
    }
}

#[async_trait]
impl Skill for EstimateShippingSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> WarroomResult<ToolResult> {
        let Some(origin) = str_arg(&call, "origin") else {
            return Ok(tool_error(&call, "Missing 'origin'"));
        };
        let destination = str_arg(&call, "destination").unwrap_or("US");
        let body = self.client.estimate_shipping(origin, destination).await;
        json_result(&call, &body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_spot_price_passes_chip_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/market/spot"))
            .and(query_param("chip", "H100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "chip": "H100", "price": 32000, "availability": 250
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MarketClient::new(format!("{}/", server.uri())).unwrap();
        let body = client.fetch_spot_prices("H100").await;
        assert_eq!(body["price"], 32000);
    }

    #[tokio::test]
    async fn test_shipping_defaults_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/shipping/estimate"))
            .and(query_param("origin", "TW"))
            .and(query_param("dest", "US"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "route": "TW-US", "days": 14
            })))
            .mount(&server)
            .await;

        let skill = EstimateShippingSkill::new(Arc::new(MarketClient::new(server.uri()).unwrap()));
        let call = ToolCall::new("estimate_shipping", serde_json::json!({"origin": "TW"}));
        let result = skill.execute(call).await.unwrap();
        assert!(!result.is_error);
        assert_eq!(result.json().unwrap()["days"], 14);
    }

    #[tokio::test]
    async fn test_server_error_becomes_error_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = MarketClient::new(server.uri()).unwrap();
        let body = client.fetch_spot_prices("H100").await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Market API unreachable"));

        let body = client.estimate_shipping("TW", "US").await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Shipping API unreachable"));
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let client = MarketClient::new("http://127.0.0.1:9").unwrap();
        let skill = FetchSpotPricesSkill::new(Arc::new(client));
        let call = ToolCall::new("fetch_spot_prices", serde_json::json!({}));
        let result = skill.execute(call).await.unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("Market API unreachable"));
    }
}
