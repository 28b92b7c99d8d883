//! Route planning: turns a route definition into the integration data an
//! API gateway method needs.
//!
//! A route either invokes a function directly, proxies to an upstream HTTP
//! service, or serves objects out of a storage bucket. Proxy routes get their
//! parameter mappings from [`crate::compiler::compile`], with path parameters
//! merged in from the route template. Bucket routes forward path parameters
//! only and carry no literal header.

// Internal imports (std, crate)
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::compiler::{compile, compile_without_literal, CompiledMappingSet, LiteralHeader};
use crate::parameter::ParameterDescriptor;
use crate::path::{extract_path_params, merge_path_params};
use crate::Error;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};
use url::Url;

/// Status codes a proxy route passes through from the upstream.
pub const SUPPORTED_STATUS_CODES: [u16; 23] = [
    200, 201, 202, 204, 400, 401, 403, 404, 405, 406, 408, 409, 412, 413, 422, 425, 428, 429, 500,
    501, 502, 503, 504,
];

pub const DEFAULT_PROXY_ROOT: &str = "/api";

/// Service name of bucket integrations.
pub const BUCKET_SERVICE: &str = "s3";

const CONTENT_TYPE: &str = "Content-Type";
const CONTENT_LENGTH: &str = "Content-Length";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Any,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Any => "ANY",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "ANY" | "*" => Ok(HttpMethod::Any),
            _ => Err(Error::config(format!("Unknown HTTP method '{s}'"))),
        }
    }
}

/// What a route hands the request to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteTarget {
    /// Invoke a compute function with the raw request.
    Function { function_name: String },
    /// Forward to the upstream service with mapped parameters.
    Proxy { parameters: Vec<ParameterDescriptor> },
    /// Read or write `bucket` at `object_key`, assuming `credentials_role`.
    /// Placeholders in the key must be placeholders of the route path.
    Bucket {
        bucket: String,
        object_key: String,
        credentials_role: String,
    },
}

/// Settings shared by every proxy route of one API.
#[derive(Clone, Debug)]
pub struct ProxySettings {
    /// Prefix under which proxy routes are mounted on the gateway
    pub proxy_root: String,
    /// Base URL of the upstream; route paths are appended to it
    pub upstream_base_url: Url,
    /// Constant header sent to the upstream, usually its API key
    pub api_key: LiteralHeader,
    /// Whether methods are protected by the custom authorizer
    pub authorizer: bool,
    /// Whether callers must present one of the API's own keys
    pub api_key_required: bool,
}

impl ProxySettings {
    pub fn new(upstream_base_url: Url, api_key: LiteralHeader) -> Self {
        Self {
            proxy_root: DEFAULT_PROXY_ROOT.to_string(),
            upstream_base_url,
            api_key,
            authorizer: false,
            api_key_required: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub method: HttpMethod,
    pub target: RouteTarget,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationType {
    None,
    Custom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassthroughBehavior {
    WhenNoMatch,
    WhenNoTemplates,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationResponse {
    pub status_code: String,
    pub selection_pattern: String,
    /// `method.response.*` key to the `integration.response.*` value it copies
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub response_parameters: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodResponse {
    pub status_code: String,
    /// Response headers the method declares, with whether they are required
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub response_parameters: BTreeMap<String, bool>,
}

impl MethodResponse {
    fn status(code: u16) -> Self {
        Self {
            status_code: code.to_string(),
            response_parameters: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Integration {
    #[serde(rename = "FUNCTION")]
    Function { function_name: String },
    #[serde(rename = "HTTP")]
    Http {
        uri: String,
        http_method: HttpMethod,
        passthrough_behavior: PassthroughBehavior,
        #[serde(flatten)]
        mappings: CompiledMappingSet,
        integration_responses: Vec<IntegrationResponse>,
    },
    #[serde(rename = "AWS")]
    Aws {
        service: String,
        http_method: HttpMethod,
        /// Bucket name followed by the object key template
        path: String,
        credentials_role: String,
        passthrough_behavior: PassthroughBehavior,
        #[serde(flatten)]
        mappings: CompiledMappingSet,
        integration_responses: Vec<IntegrationResponse>,
    },
}

/// Everything the provisioning layer needs to create one gateway method.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationPlan {
    /// Gateway resource path the method is attached to
    pub resource_path: String,
    pub http_method: HttpMethod,
    pub authorization_type: AuthorizationType,
    pub api_key_required: bool,
    pub integration: Integration,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub method_responses: Vec<MethodResponse>,
}

impl Route {
    pub fn function(
        path: impl Into<String>,
        method: HttpMethod,
        function_name: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            method,
            target: RouteTarget::Function {
                function_name: function_name.into(),
            },
        }
    }

    pub fn proxy(
        path: impl Into<String>,
        method: HttpMethod,
        parameters: Vec<ParameterDescriptor>,
    ) -> Self {
        Self {
            path: path.into(),
            method,
            target: RouteTarget::Proxy { parameters },
        }
    }

    pub fn bucket(
        path: impl Into<String>,
        method: HttpMethod,
        bucket: impl Into<String>,
        object_key: impl Into<String>,
        credentials_role: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            method,
            target: RouteTarget::Bucket {
                bucket: bucket.into(),
                object_key: object_key.into(),
                credentials_role: credentials_role.into(),
            },
        }
    }

    /// Build the integration plan for this route.
    pub fn plan(&self, settings: &ProxySettings) -> crate::Result<IntegrationPlan> {
        if !self.path.starts_with('/') {
            return Err(Error::config(format!(
                "Route path '{}' must start with '/'",
                self.path
            )));
        }

        let authorization_type = if settings.authorizer {
            AuthorizationType::Custom
        } else {
            AuthorizationType::None
        };

        match &self.target {
            RouteTarget::Function { function_name } => Ok(IntegrationPlan {
                resource_path: self.path.clone(),
                http_method: self.method,
                authorization_type,
                api_key_required: settings.api_key_required,
                integration: Integration::Function {
                    function_name: function_name.clone(),
                },
                method_responses: Vec::new(),
            }),
            RouteTarget::Proxy { parameters } => {
                let descriptors = merge_path_params(&self.path, parameters)?;
                let mappings = compile(&descriptors, &settings.api_key)?;
                if mappings.templates.is_some() && !settings.authorizer {
                    return Err(Error::config(format!(
                        "Route {} {} forwards authorizer context but no authorizer is configured",
                        self.method, self.path
                    )));
                }
                log::debug!(
                    "Planned proxy {} {} with {} parameters",
                    self.method,
                    self.path,
                    descriptors.len()
                );
                Ok(IntegrationPlan {
                    resource_path: join_paths(&settings.proxy_root, &self.path),
                    http_method: self.method,
                    authorization_type,
                    api_key_required: settings.api_key_required,
                    integration: Integration::Http {
                        uri: upstream_uri(&settings.upstream_base_url, &self.path),
                        http_method: self.method,
                        passthrough_behavior: PassthroughBehavior::WhenNoMatch,
                        mappings,
                        integration_responses: integration_responses(),
                    },
                    method_responses: SUPPORTED_STATUS_CODES
                        .iter()
                        .map(|code| MethodResponse::status(*code))
                        .collect(),
                })
            }
            RouteTarget::Bucket {
                bucket,
                object_key,
                credentials_role,
            } => {
                let descriptors = extract_path_params(&self.path)?;
                self.check_object_key(object_key, &descriptors)?;
                let mappings = compile_without_literal(&descriptors)?;
                log::debug!(
                    "Planned bucket {} {} on {}{}",
                    self.method,
                    self.path,
                    bucket,
                    object_key
                );
                Ok(IntegrationPlan {
                    resource_path: self.path.clone(),
                    http_method: self.method,
                    authorization_type,
                    api_key_required: settings.api_key_required,
                    integration: Integration::Aws {
                        service: BUCKET_SERVICE.to_string(),
                        http_method: self.method,
                        path: format!("{bucket}{object_key}"),
                        credentials_role: credentials_role.clone(),
                        passthrough_behavior: PassthroughBehavior::WhenNoTemplates,
                        mappings,
                        integration_responses: bucket_integration_responses(),
                    },
                    method_responses: bucket_method_responses(),
                })
            }
        }
    }

    fn check_object_key(
        &self,
        object_key: &str,
        descriptors: &[ParameterDescriptor],
    ) -> crate::Result<()> {
        if !object_key.starts_with('/') {
            return Err(Error::config(format!(
                "Object key '{object_key}' of route {} must start with '/'",
                self.path
            )));
        }
        for param in extract_path_params(object_key)? {
            if !descriptors.iter().any(|d| d.name() == param.name()) {
                return Err(Error::config(format!(
                    "Object key '{object_key}' uses {{{}}}, which route {} does not capture",
                    param.name(),
                    self.path
                )));
            }
        }
        Ok(())
    }
}

/// One integration response per supported status, selected by the upstream
/// status code itself.
pub fn integration_responses() -> Vec<IntegrationResponse> {
    SUPPORTED_STATUS_CODES
        .iter()
        .map(|code| IntegrationResponse {
            status_code: code.to_string(),
            selection_pattern: code.to_string(),
            response_parameters: BTreeMap::new(),
        })
        .collect()
}

fn response_header(name: &str) -> String {
    format!("method.response.header.{name}")
}

fn copied_headers(names: &[&str]) -> BTreeMap<String, String> {
    names
        .iter()
        .map(|name| (response_header(name), format!("integration.response.header.{name}")))
        .collect()
}

/// Bucket responses: redirects and client errors collapse into 400, except
/// 404 which passes through.
pub fn bucket_integration_responses() -> Vec<IntegrationResponse> {
    [
        ("200", "200", &[CONTENT_TYPE, CONTENT_LENGTH][..]),
        ("400", "3??", &[CONTENT_TYPE][..]),
        ("404", "404", &[CONTENT_TYPE][..]),
        ("400", "4??", &[CONTENT_TYPE][..]),
        ("500", "5??", &[CONTENT_TYPE][..]),
    ]
    .into_iter()
    .map(|(status, pattern, headers)| IntegrationResponse {
        status_code: status.to_string(),
        selection_pattern: pattern.to_string(),
        response_parameters: copied_headers(headers),
    })
    .collect()
}

pub fn bucket_method_responses() -> Vec<MethodResponse> {
    [
        (200, &[CONTENT_TYPE, CONTENT_LENGTH][..]),
        (400, &[CONTENT_TYPE][..]),
        (404, &[CONTENT_TYPE][..]),
        (500, &[CONTENT_TYPE][..]),
    ]
    .into_iter()
    .map(|(code, headers)| MethodResponse {
        status_code: code.to_string(),
        response_parameters: headers.iter().map(|h| (response_header(h), true)).collect(),
    })
    .collect()
}

fn join_paths(root: &str, path: &str) -> String {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return path.to_string();
    }
    if root.starts_with('/') {
        format!("{root}{path}")
    } else {
        format!("/{root}{path}")
    }
}

// Placeholders stay literal; the gateway substitutes them from the mappings.
fn upstream_uri(base: &Url, path: &str) -> String {
    format!("{}{}", base.as_str().trim_end_matches('/'), path)
}
