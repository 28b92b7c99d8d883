//! Route configuration for gatemap.
//!
//! This module defines the `Config` struct describing one gateway API: its
//! upstream, its authorizer, CORS origin, caller API keys and the routes it
//! exposes. The configuration can
//! be loaded from a YAML or JSON file, or created programmatically.
//!
//! # Examples
//!
//! ```no_run
//! use gatemap_core::config::Config;
//!
//! # #[tokio::main]
//! # async fn main() -> gatemap_core::Result<()> {
//! let config = Config::from_file("routes.yaml").await?;
//! for plan in config.plan_routes("api-key-value")? {
//!     println!("{} {}", plan.http_method, plan.resource_path);
//! }
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::path::Path;

use crate::api::{ApiKey, ApiPlan};
use crate::compiler::{LiteralHeader, DEFAULT_API_KEY_HEADER};
use crate::parameter::ParameterDescriptor;
use crate::route::{HttpMethod, IntegrationPlan, ProxySettings, Route, DEFAULT_PROXY_ROOT};
use crate::Error;

// External imports (alphabetized)
use serde::{Deserialize, Deserializer, Serialize};
use serde_value::Value as SerdeValue;
use tokio::fs;
use url::Url;

/// Configuration for one gateway API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API name
    pub name: String,

    /// Deployment stage name
    #[serde(default = "default_stage")]
    pub stage: String,

    /// Prefix under which proxy routes are mounted
    #[serde(default = "default_proxy_root")]
    pub proxy_root: String,

    /// The upstream service proxy routes forward to
    pub upstream: UpstreamConfig,

    /// Whether methods are protected by the custom authorizer
    #[serde(default)]
    pub authorizer: bool,

    /// Origin allowed by CORS; no CORS handling when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors_allow_origin: Option<String>,

    /// Keys callers must present; every method requires one when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_keys: Vec<ApiKey>,

    /// Routes exposed by the API
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL route paths are appended to
    pub base_url: Url,

    /// Header carrying the upstream API key
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
}

/// A single route, mounted for one or more methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Route template, e.g. `/orders/{id}`
    pub path: String,

    /// Methods the route answers, either one string or a list
    #[serde(deserialize_with = "deserialize_methods")]
    pub methods: Vec<HttpMethod>,

    /// Function to invoke instead of proxying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,

    /// Bucket object served instead of proxying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<BucketConfig>,

    /// Parameters forwarded to the upstream (proxy routes only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Bucket name
    pub name: String,

    /// Object key template, e.g. `/{folder}/{item}`
    pub object_key: String,

    /// Role the gateway assumes to access the bucket
    pub credentials_role: String,
}

impl Config {
    /// Create a new Config with default values
    pub fn new(name: impl Into<String>, upstream_base_url: Url) -> Self {
        Self {
            name: name.into(),
            stage: default_stage(),
            proxy_root: default_proxy_root(),
            upstream: UpstreamConfig {
                base_url: upstream_base_url,
                api_key_header: default_api_key_header(),
            },
            authorizer: false,
            cors_allow_origin: None,
            api_keys: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Load configuration from a file; `.json` files are read as JSON, anything else as YAML
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let config = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        Ok(config)
    }

    /// Save configuration to a file, in the format its extension implies
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            serde_yaml::to_string(self)?
        };
        fs::write(path, content).await?;
        Ok(())
    }

    /// Settings shared by all proxy routes, with `api_key` as the literal key value
    pub fn proxy_settings(&self, api_key: impl Into<String>) -> ProxySettings {
        ProxySettings {
            proxy_root: self.proxy_root.clone(),
            upstream_base_url: self.upstream.base_url.clone(),
            api_key: LiteralHeader::new(self.upstream.api_key_header.clone(), api_key),
            authorizer: self.authorizer,
            api_key_required: !self.api_keys.is_empty(),
        }
    }

    /// Expand every route/method pair into a [`Route`]
    pub fn routes(&self) -> crate::Result<Vec<Route>> {
        let mut routes = Vec::new();
        for route in &self.routes {
            if route.methods.is_empty() {
                return Err(Error::config(format!(
                    "Route '{}' declares no methods",
                    route.path
                )));
            }
            for method in &route.methods {
                routes.push(route.to_route(*method)?);
            }
        }
        Ok(routes)
    }

    /// Plan every route of the API
    pub fn plan_routes(&self, api_key: impl Into<String>) -> crate::Result<Vec<IntegrationPlan>> {
        let settings = self.proxy_settings(api_key);
        let plans = self
            .routes()?
            .iter()
            .map(|route| route.plan(&settings))
            .collect::<crate::Result<Vec<_>>>()?;
        log::info!(
            "Planned {} methods for API '{}' ({})",
            plans.len(),
            self.name,
            self.stage
        );
        Ok(plans)
    }

    /// Plan the whole API: every method plus CORS and usage plans
    pub fn plan_api(&self, api_key: impl Into<String>) -> crate::Result<ApiPlan> {
        ApiPlan::new(
            self.name.clone(),
            self.stage.clone(),
            self.cors_allow_origin.as_deref(),
            &self.api_keys,
            self.plan_routes(api_key)?,
        )
    }
}

impl RouteConfig {
    fn to_route(&self, method: HttpMethod) -> crate::Result<Route> {
        match (&self.function, &self.bucket) {
            (Some(_), Some(_)) => Err(Error::config(format!(
                "Route '{}' cannot target both a function and a bucket",
                self.path
            ))),
            (Some(_), None) | (None, Some(_)) if !self.parameters.is_empty() => {
                Err(Error::config(format!(
                    "Route '{}' does not proxy and cannot declare proxy parameters",
                    self.path
                )))
            }
            (Some(function), None) => {
                Ok(Route::function(self.path.clone(), method, function.clone()))
            }
            (None, Some(bucket)) => Ok(Route::bucket(
                self.path.clone(),
                method,
                bucket.name.clone(),
                bucket.object_key.clone(),
                bucket.credentials_role.clone(),
            )),
            (None, None) => Ok(Route::proxy(
                self.path.clone(),
                method,
                self.parameters.clone(),
            )),
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

fn default_stage() -> String {
    "prod".to_string()
}

fn default_proxy_root() -> String {
    DEFAULT_PROXY_ROOT.to_string()
}

fn default_api_key_header() -> String {
    DEFAULT_API_KEY_HEADER.to_string()
}

/// Helper function to deserialize either a single method or a list of methods
fn deserialize_methods<'de, D>(deserializer: D) -> Result<Vec<HttpMethod>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = SerdeValue::deserialize(deserializer)?;

    let parse = |s: &str| -> Result<HttpMethod, D::Error> {
        s.parse::<HttpMethod>()
            .map_err(<D::Error as serde::de::Error>::custom)
    };
    match value {
        SerdeValue::String(s) => Ok(vec![parse(&s)?]),
        SerdeValue::Seq(seq) => {
            let mut result = Vec::new();
            for item in seq {
                if let SerdeValue::String(s) = item {
                    result.push(parse(&s)?);
                } else {
                    return Err(serde::de::Error::custom(
                        "Expected string or array of strings",
                    ));
                }
            }
            Ok(result)
        }
        _ => Err(serde::de::Error::custom(
            "Expected string or array of strings",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{query_param, username_param};
    use crate::api::Throttle;
    use crate::route::{AuthorizationType, Integration};
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
name: orders
upstream:
  base_url: https://orders.internal.example.com
authorizer: true
routes:
  - path: /orders/{id}
    methods: get
    parameters:
      - { type: querystring, name: expand, required: false }
      - { type: context-to-header, name: username }
  - path: /health
    methods: [GET, HEAD]
    function: health-check
"#;

    #[test]
    fn test_parse_sample() -> crate::Result<()> {
        let config: Config = serde_yaml::from_str(SAMPLE)?;
        assert_eq!(config.stage, "prod");
        assert_eq!(config.proxy_root, "/api");
        assert_eq!(config.upstream.api_key_header, "X-API-Key");
        assert_eq!(config.routes[0].methods, vec![HttpMethod::Get]);
        assert_eq!(
            config.routes[1].methods,
            vec![HttpMethod::Get, HttpMethod::Head]
        );
        assert_eq!(
            config.routes[0].parameters,
            vec![query_param("expand")?.optional(), username_param()]
        );
        Ok(())
    }

    #[test]
    fn test_plan_routes_expands_methods() -> crate::Result<()> {
        let config: Config = serde_yaml::from_str(SAMPLE)?;
        let plans = config.plan_routes("k")?;
        assert_eq!(plans.len(), 3);

        assert_eq!(plans[0].resource_path, "/api/orders/{id}");
        match &plans[0].integration {
            Integration::Http { mappings, .. } => {
                assert_eq!(mappings.accepted["method.request.querystring.expand"], false);
                assert_eq!(mappings.accepted["method.request.path.id"], true);
                assert_eq!(
                    mappings.backend["integration.request.header.X-API-Key"],
                    "'k'"
                );
            }
            other => panic!("unexpected integration {other:?}"),
        }

        assert_eq!(plans[2].http_method, HttpMethod::Head);
        assert_eq!(plans[2].authorization_type, AuthorizationType::Custom);
        Ok(())
    }

    #[test]
    fn test_function_with_parameters_rejected() {
        let yaml = r#"
name: bad
upstream: { base_url: "https://x.example.com" }
routes:
  - path: /f
    methods: POST
    function: f
    parameters: [{ type: querystring, name: q }]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.plan_routes("k"), Err(Error::Config(_))));
    }

    #[test]
    fn test_bucket_with_function_rejected() {
        let yaml = r#"
name: bad
upstream: { base_url: "https://x.example.com" }
routes:
  - path: /files/{key}
    methods: GET
    function: f
    bucket: { name: b, object_key: "/{key}", credentials_role: r }
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.plan_routes("k"), Err(Error::Config(_))));
    }

    #[test]
    fn test_plan_api_with_cors_and_keys() -> crate::Result<()> {
        let yaml = r#"
name: assets
stage: test
upstream: { base_url: "https://x.example.com" }
cors_allow_origin: https://app.example.com
api_keys:
  - name: web
  - name: partner
    throttle: { rate_limit: 10, burst_limit: 20 }
routes:
  - path: /files/{key}
    methods: [GET, PUT]
    bucket:
      name: assets-bucket
      object_key: /{key}
      credentials_role: arn:aws:iam::123456789012:role/assets
"#;
        let config: Config = serde_yaml::from_str(yaml)?;
        let api = config.plan_api("k")?;
        assert_eq!(api.name, "assets");
        assert_eq!(api.stage, "test");
        assert!(api.api_key_required);
        assert!(api.cors_preflight.is_some());
        assert_eq!(api.gateway_responses.len(), 2);
        assert_eq!(api.usage_plans.len(), 2);
        assert_eq!(api.usage_plans[0].throttle, Throttle::default());
        assert_eq!(api.usage_plans[1].throttle.burst_limit, 20);

        assert_eq!(api.methods.len(), 2);
        assert!(api.methods.iter().all(|m| m.api_key_required));
        match &api.methods[1].integration {
            Integration::Aws { path, http_method, .. } => {
                assert_eq!(path, "assets-bucket/{key}");
                assert_eq!(*http_method, HttpMethod::Put);
            }
            other => panic!("unexpected integration {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_invalid_method_rejected() {
        let yaml = r#"
name: bad
upstream: { base_url: "https://x.example.com" }
routes:
  - { path: /f, methods: FETCH }
"#;
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_blank_parameter_name_rejected() {
        let yaml = r#"
name: bad
upstream: { base_url: "https://x.example.com" }
routes:
  - { path: /f, methods: GET, parameters: [{ type: header, name: "" }] }
"#;
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[tokio::test]
    async fn test_config_roundtrip() -> crate::Result<()> {
        let dir = tempdir()?;
        let url = Url::parse("https://orders.internal.example.com").unwrap();
        let mut config = Config::new("orders", url);
        config.routes.push(RouteConfig {
            path: "/orders".to_string(),
            methods: vec![HttpMethod::Get, HttpMethod::Post],
            function: None,
            bucket: None,
            parameters: vec![query_param("q")?],
        });
        config.cors_allow_origin = Some("https://app.example.com".to_string());
        config.api_keys.push(ApiKey::new("web"));

        for file in ["config.yaml", "config.json"] {
            let file_path = dir.path().join(file);
            config.save(&file_path).await?;

            let loaded = Config::from_file(&file_path).await?;
            assert_eq!(loaded.name, "orders");
            assert_eq!(loaded.stage, default_stage());
            assert_eq!(loaded.proxy_root, default_proxy_root());
            assert_eq!(loaded.upstream.base_url, config.upstream.base_url);
            assert!(!loaded.authorizer);
            assert_eq!(loaded.cors_allow_origin, config.cors_allow_origin);
            assert_eq!(loaded.api_keys, config.api_keys);
            assert_eq!(loaded.routes[0].methods, config.routes[0].methods);
            assert_eq!(loaded.routes[0].parameters, config.routes[0].parameters);
        }

        Ok(())
    }
}
