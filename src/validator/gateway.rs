//! HTTP gateway validator
//!
//! POSTs the workflow text to the platform gateway and parses its JSON
//! verdict. The gateway owns schema checking, cycle detection and template
//! resolution; this client only moves bytes.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::{ValidationResult, WorkflowValidator};
use crate::config::GatewayConfig;
use crate::error::{Result, WeaveError};

#[derive(Serialize)]
struct ValidateRequest<'a> {
    yaml: &'a str,
}

pub struct GatewayValidator {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
}

impl GatewayValidator {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let base = config.url.as_deref().ok_or(WeaveError::GatewayNotConfigured)?;
        let endpoint = Self::endpoint(base, &config.validate_path)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            token: config.token.clone(),
        })
    }

    /// Resolve `path` against the base URL, rejecting non-http(s) schemes
    fn endpoint(base: &str, path: &str) -> Result<Url> {
        let invalid = |reason: String| WeaveError::InvalidGatewayUrl {
            url: base.to_string(),
            reason,
        };

        let base_url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", base_url.scheme())));
        }

        let joined = format!(
            "{}/{}",
            base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| invalid(e.to_string()))
    }

    pub fn endpoint_url(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl WorkflowValidator for GatewayValidator {
    fn name(&self) -> &str {
        "gateway"
    }

    #[instrument(skip(self, yaml), fields(endpoint = %self.endpoint, bytes = yaml.len()))]
    async fn validate(&self, yaml: &str) -> Result<ValidationResult> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&ValidateRequest { yaml });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WeaveError::GatewayStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let result: ValidationResult = serde_json::from_str(&body)?;
        debug!(
            valid = result.valid,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Gateway validation complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> GatewayConfig {
        GatewayConfig {
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn endpoint_joins_base_and_path() {
        let validator = GatewayValidator::new(&config("http://localhost:5000/")).unwrap();
        assert_eq!(
            validator.endpoint_url().as_str(),
            "http://localhost:5000/api/v1/workflows/validate"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let mut cfg = config("https://gw.internal/platform");
        cfg.validate_path = "workflows/validate".into();
        let validator = GatewayValidator::new(&cfg).unwrap();
        assert_eq!(
            validator.endpoint_url().as_str(),
            "https://gw.internal/platform/workflows/validate"
        );
    }

    #[test]
    fn rejects_missing_or_bad_urls() {
        assert!(matches!(
            GatewayValidator::new(&GatewayConfig::default()),
            Err(WeaveError::GatewayNotConfigured)
        ));
        assert!(matches!(
            GatewayValidator::new(&config("not a url")),
            Err(WeaveError::InvalidGatewayUrl { .. })
        ));
        assert!(matches!(
            GatewayValidator::new(&config("ftp://files.example.com")),
            Err(WeaveError::InvalidGatewayUrl { .. })
        ));
    }
}
