//! API-wide settings: CORS, caller API keys and their usage plans.
//!
//! [`ApiPlan`] wraps the per-method [`IntegrationPlan`]s of one API with the
//! data that applies to the API as a whole.

// Internal imports (std, crate)
use std::collections::{BTreeMap, HashSet};

use crate::compiler::const_param;
use crate::route::IntegrationPlan;
use crate::Error;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};

pub const DEFAULT_RATE_LIMIT: u32 = 500;
pub const DEFAULT_BURST_LIMIT: u32 = 750;

/// Headers a CORS preflight allows.
pub const PREFLIGHT_ALLOW_HEADERS: &str = "Authorization,Content-Type";

/// Headers allowed on gateway-generated error responses.
pub const ERROR_ALLOW_HEADERS: &str =
    "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token";

/// Steady-state request rate and burst size of a usage plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Throttle {
    #[serde(alias = "rate_limit")]
    pub rate_limit: u32,
    #[serde(alias = "burst_limit")]
    pub burst_limit: u32,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            burst_limit: DEFAULT_BURST_LIMIT,
        }
    }
}

/// A key callers present to the API, as declared in the configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub name: String,
    /// Falls back to [`Throttle::default`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle: Option<Throttle>,
}

impl ApiKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            throttle: None,
        }
    }
}

/// One usage plan per API key, attached to the deployed stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsagePlan {
    pub name: String,
    pub api_key_name: String,
    pub stage: String,
    pub throttle: Throttle,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsPreflight {
    pub allow_origins: Vec<String>,
    pub allow_headers: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayResponseType {
    #[serde(rename = "DEFAULT_4XX")]
    Default4xx,
    #[serde(rename = "DEFAULT_5XX")]
    Default5xx,
}

/// Headers added to responses the gateway generates itself, so browsers can
/// read its errors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    #[serde(rename = "type")]
    pub response_type: GatewayResponseType,
    /// Header name to quoted literal value
    pub response_headers: BTreeMap<String, String>,
}

/// Everything the provisioning layer needs to create one API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPlan {
    pub name: String,
    pub stage: String,
    pub api_key_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors_preflight: Option<CorsPreflight>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateway_responses: Vec<GatewayResponse>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usage_plans: Vec<UsagePlan>,
    pub methods: Vec<IntegrationPlan>,
}

impl ApiPlan {
    /// Assemble the plan of an API from its already planned methods.
    ///
    /// API key names must be non-blank and unique; a CORS origin, when given,
    /// must be non-blank.
    pub fn new(
        name: impl Into<String>,
        stage: impl Into<String>,
        cors_allow_origin: Option<&str>,
        api_keys: &[ApiKey],
        methods: Vec<IntegrationPlan>,
    ) -> crate::Result<Self> {
        let stage = stage.into();
        if let Some(origin) = cors_allow_origin {
            if origin.trim().is_empty() {
                return Err(Error::config("CORS allow origin must not be blank"));
            }
        }

        Ok(Self {
            name: name.into(),
            api_key_required: !api_keys.is_empty(),
            cors_preflight: cors_allow_origin.map(cors_preflight),
            gateway_responses: cors_allow_origin
                .map(gateway_responses)
                .unwrap_or_default(),
            usage_plans: usage_plans(api_keys, &stage)?,
            stage,
            methods,
        })
    }
}

pub fn cors_preflight(origin: &str) -> CorsPreflight {
    CorsPreflight {
        allow_origins: vec![origin.to_string()],
        allow_headers: vec![PREFLIGHT_ALLOW_HEADERS.to_string()],
    }
}

/// The default 4XX and 5XX responses, carrying CORS headers for `origin`.
pub fn gateway_responses(origin: &str) -> Vec<GatewayResponse> {
    [GatewayResponseType::Default4xx, GatewayResponseType::Default5xx]
        .into_iter()
        .map(|response_type| GatewayResponse {
            response_type,
            response_headers: BTreeMap::from([
                (
                    "Access-Control-Allow-Origin".to_string(),
                    const_param(origin),
                ),
                (
                    "Access-Control-Allow-Headers".to_string(),
                    const_param(ERROR_ALLOW_HEADERS),
                ),
                (
                    "Access-Control-Allow-Methods".to_string(),
                    const_param("OPTIONS"),
                ),
            ]),
        })
        .collect()
}

pub fn usage_plans(api_keys: &[ApiKey], stage: &str) -> crate::Result<Vec<UsagePlan>> {
    let mut seen = HashSet::new();
    let mut plans = Vec::with_capacity(api_keys.len());
    for key in api_keys {
        if key.name.trim().is_empty() {
            return Err(Error::config("API key names must not be blank"));
        }
        if !seen.insert(key.name.as_str()) {
            return Err(Error::config(format!(
                "API key '{}' is declared more than once",
                key.name
            )));
        }
        plans.push(UsagePlan {
            name: key.name.clone(),
            api_key_name: key.name.clone(),
            stage: stage.to_string(),
            throttle: key.throttle.unwrap_or_default(),
        });
    }
    Ok(plans)
}
