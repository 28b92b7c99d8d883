//! Compiles parameter descriptors into gateway request-parameter mappings.
//!
//! Three independent derivations are offered, each a total function over a
//! descriptor list:
//!
//! - [`accepted_parameters`]: what the method request declares,
//! - [`backend_parameter_map`]: how each declared value reaches the
//!   integration request, plus one literal header,
//! - [`rewrite_templates`]: the body mapping template that forwards
//!   authorizer context fields as headers, which plain parameter mappings
//!   cannot reference.
//!
//! [`compile`] runs all three and checks that no two descriptors collapse
//! onto the same key and that none of them targets the literal header.
//! [`compile_without_literal`] does the same for integrations without one.
//!
//! Keys follow the API Gateway REST reference syntax
//! (`method.request.querystring.q`, `integration.request.header.X-Api-Key`).
//!
//! # Examples
//!
//! ```
//! use gatemap_core::compiler::{compile, LiteralHeader};
//! use gatemap_core::parameter::{multi_value_query_param, username_param};
//!
//! # fn main() -> gatemap_core::Result<()> {
//! let params = vec![multi_value_query_param("tags")?, username_param()];
//! let set = compile(&params, &LiteralHeader::api_key("s3cr3t"))?;
//!
//! assert_eq!(set.accepted["method.request.querystring.tags"], true);
//! assert_eq!(
//!     set.backend["integration.request.multivaluequerystring.tags"],
//!     "method.request.querystring.tags"
//! );
//! assert_eq!(set.backend["integration.request.header.X-API-Key"], "'s3cr3t'");
//! assert!(set.templates.is_some());
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::collections::{BTreeMap, HashMap};

use crate::parameter::{ParameterDescriptor, ParameterKind};
use crate::Error;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};

/// Gateway-facing parameter key to its required flag.
pub type AcceptedParameters = BTreeMap<String, bool>;

/// Upstream-facing parameter key to the gateway key (or quoted literal) it reads.
pub type BackendParameterMap = BTreeMap<String, String>;

/// Content type to mapping template. `None` when no template is needed.
pub type RewriteTemplates = Option<BTreeMap<String, String>>;

pub const METHOD_REQUEST_PREFIX: &str = "method.request";
pub const INTEGRATION_REQUEST_PREFIX: &str = "integration.request";
pub const TEMPLATE_CONTENT_TYPE: &str = "application/json";
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Re-emits the incoming JSON body untouched.
const PASSTHROUGH_BODY_LINE: &str = r#"$input.json("$")"#;

/// A header the integration request always carries with a constant value,
/// such as the upstream's API key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralHeader {
    pub header: String,
    pub value: String,
}

impl LiteralHeader {
    pub fn new(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            value: value.into(),
        }
    }

    /// The literal under the default `X-API-Key` header.
    pub fn api_key(value: impl Into<String>) -> Self {
        Self::new(DEFAULT_API_KEY_HEADER, value)
    }

    fn integration_key(&self) -> String {
        format!("{INTEGRATION_REQUEST_PREFIX}.header.{}", self.header)
    }
}

/// Output of [`compile`]: everything an integration definition needs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledMappingSet {
    pub accepted: AcceptedParameters,
    pub backend: BackendParameterMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates: RewriteTemplates,
}

/// Wrap a value in single quotes so the gateway treats it as a constant.
pub fn const_param(value: &str) -> String {
    format!("'{value}'")
}

/// Scope under which a descriptor is declared on the method request.
/// Multi-value query parameters are declared as plain query strings.
fn declared_scope(kind: ParameterKind) -> Option<&'static str> {
    match kind {
        ParameterKind::QueryString | ParameterKind::MultiValueQueryString => {
            Some(ParameterKind::QueryString.as_str())
        }
        ParameterKind::Path => Some(ParameterKind::Path.as_str()),
        ParameterKind::Header => Some(ParameterKind::Header.as_str()),
        ParameterKind::AuthorizerContextInjection => None,
    }
}

/// Scope under which a descriptor is written on the integration request.
fn integration_scope(kind: ParameterKind) -> Option<&'static str> {
    match kind {
        ParameterKind::QueryString
        | ParameterKind::MultiValueQueryString
        | ParameterKind::Path
        | ParameterKind::Header => Some(kind.as_str()),
        ParameterKind::AuthorizerContextInjection => None,
    }
}

fn method_request_key(param: &ParameterDescriptor) -> Option<String> {
    declared_scope(param.kind())
        .map(|scope| format!("{METHOD_REQUEST_PREFIX}.{scope}.{}", param.name()))
}

fn integration_request_key(param: &ParameterDescriptor) -> Option<String> {
    integration_scope(param.kind())
        .map(|scope| format!("{INTEGRATION_REQUEST_PREFIX}.{scope}.{}", param.name()))
}

/// Parameters the method request must declare, keyed by gateway reference.
/// Authorizer context descriptors are skipped.
pub fn accepted_parameters(params: &[ParameterDescriptor]) -> AcceptedParameters {
    params
        .iter()
        .filter_map(|param| method_request_key(param).map(|key| (key, param.required())))
        .collect()
}

/// Integration request parameter mappings, plus the `literal` header.
///
/// A multi-value query parameter keeps its own scope on the integration side
/// while reading from the plain query string key it was declared under. The
/// literal entry overrides any descriptor mapped to the same header;
/// [`compile`] rejects such a list instead.
pub fn backend_parameter_map(
    params: &[ParameterDescriptor],
    literal: &LiteralHeader,
) -> BackendParameterMap {
    let mut map = forwarded_parameters(params);

    let literal_key = literal.integration_key();
    if let Some(previous) = map.insert(literal_key.clone(), const_param(&literal.value)) {
        log::warn!(
            "Literal header {} replaces mapping from {}",
            literal_key,
            previous
        );
    }
    map
}

/// Body mapping template forwarding authorizer context fields as
/// `authorizer-<name>` headers, in input order.
///
/// Returns `None` when no descriptor needs it.
pub fn rewrite_templates(params: &[ParameterDescriptor]) -> RewriteTemplates {
    let overrides: Vec<String> = params
        .iter()
        .filter(|param| param.is_authorizer_context())
        .map(|param| {
            format!(
                "#set($context.requestOverride.header.authorizer-{name} = $context.authorizer.{name})",
                name = param.name()
            )
        })
        .collect();

    if overrides.is_empty() {
        return None;
    }

    let mut script = String::from(PASSTHROUGH_BODY_LINE);
    for line in &overrides {
        script.push('\n');
        script.push_str(line);
    }
    Some(BTreeMap::from([(TEMPLATE_CONTENT_TYPE.to_string(), script)]))
}

/// Integration request parameter mappings without any literal header.
pub fn forwarded_parameters(params: &[ParameterDescriptor]) -> BackendParameterMap {
    params
        .iter()
        .filter_map(|param| Some((integration_request_key(param)?, method_request_key(param)?)))
        .collect()
}

/// Run the three derivations over `params`.
///
/// Fails with [`Error::InvariantViolation`] when two descriptors would share
/// a method or integration key, when two context fields target the same
/// `authorizer-<name>` header, or when a descriptor maps to the literal
/// header. Header names are compared case-insensitively.
pub fn compile(
    params: &[ParameterDescriptor],
    literal: &LiteralHeader,
) -> crate::Result<CompiledMappingSet> {
    compile_with(params, Some(literal))
}

/// Like [`compile`], for integrations that carry no literal header.
pub fn compile_without_literal(params: &[ParameterDescriptor]) -> crate::Result<CompiledMappingSet> {
    compile_with(params, None)
}

fn compile_with(
    params: &[ParameterDescriptor],
    literal: Option<&LiteralHeader>,
) -> crate::Result<CompiledMappingSet> {
    check_unique_keys(params, "method request", method_request_key)?;
    check_unique_keys(params, "integration request", upstream_target_key)?;
    if let Some(literal) = literal {
        check_literal_header(params, literal)?;
    }

    let set = CompiledMappingSet {
        accepted: accepted_parameters(params),
        backend: match literal {
            Some(literal) => backend_parameter_map(params, literal),
            None => forwarded_parameters(params),
        },
        templates: rewrite_templates(params),
    };

    log::debug!(
        "Compiled {} descriptors into {} accepted, {} backend mappings{}",
        params.len(),
        set.accepted.len(),
        set.backend.len(),
        if set.templates.is_some() {
            " and a request template"
        } else {
            ""
        }
    );
    Ok(set)
}

/// The integration request value a descriptor ends up writing. Context
/// fields write their `authorizer-<name>` header through the template.
fn upstream_target_key(param: &ParameterDescriptor) -> Option<String> {
    match param.kind() {
        ParameterKind::AuthorizerContextInjection => Some(format!(
            "{INTEGRATION_REQUEST_PREFIX}.header.authorizer-{}",
            param.name()
        )),
        ParameterKind::QueryString
        | ParameterKind::MultiValueQueryString
        | ParameterKind::Path
        | ParameterKind::Header => integration_request_key(param),
    }
}

/// HTTP header names are case-insensitive; everything else is compared as is.
fn comparable_key(kind: ParameterKind, key: String) -> String {
    match kind {
        ParameterKind::Header | ParameterKind::AuthorizerContextInjection => {
            key.to_ascii_lowercase()
        }
        ParameterKind::QueryString | ParameterKind::MultiValueQueryString | ParameterKind::Path => {
            key
        }
    }
}

fn check_literal_header(params: &[ParameterDescriptor], literal: &LiteralHeader) -> crate::Result<()> {
    let literal_key = comparable_key(ParameterKind::Header, literal.integration_key());
    for param in params {
        let Some(key) = upstream_target_key(param) else {
            continue;
        };
        if comparable_key(param.kind(), key) == literal_key {
            return Err(Error::invariant(format!(
                "{param} maps to the literal header {}",
                literal.header
            )));
        }
    }
    Ok(())
}

fn check_unique_keys(
    params: &[ParameterDescriptor],
    side: &str,
    key_for: fn(&ParameterDescriptor) -> Option<String>,
) -> crate::Result<()> {
    let mut owners: HashMap<String, &ParameterDescriptor> = HashMap::new();
    for param in params {
        let Some(key) = key_for(param) else {
            continue;
        };
        let key = comparable_key(param.kind(), key);
        if let Some(owner) = owners.get(&key) {
            return Err(Error::invariant(format!(
                "{param} and {owner} both map to {side} key {key}"
            )));
        }
        owners.insert(key, param);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{
        deliverer_id_param, header_param, identity_param, multi_value_query_param, optional,
        path_param, permissions_param, query_param, username_param,
    };

    fn key() -> LiteralHeader {
        LiteralHeader::api_key("secret")
    }

    #[test]
    fn test_accepted_collapses_multi_value_into_querystring() -> crate::Result<()> {
        let params = vec![query_param("q")?, multi_value_query_param("tags")?];
        let accepted = accepted_parameters(&params);
        assert_eq!(
            accepted,
            BTreeMap::from([
                ("method.request.querystring.q".to_string(), true),
                ("method.request.querystring.tags".to_string(), true),
            ])
        );
        Ok(())
    }

    #[test]
    fn test_backend_cross_maps_multi_value() -> crate::Result<()> {
        let params = vec![query_param("q")?, multi_value_query_param("tags")?];
        let backend = backend_parameter_map(&params, &key());
        assert_eq!(
            backend,
            BTreeMap::from([
                (
                    "integration.request.querystring.q".to_string(),
                    "method.request.querystring.q".to_string()
                ),
                (
                    "integration.request.multivaluequerystring.tags".to_string(),
                    "method.request.querystring.tags".to_string()
                ),
                (
                    "integration.request.header.X-API-Key".to_string(),
                    "'secret'".to_string()
                ),
            ])
        );
        Ok(())
    }

    #[test]
    fn test_path_and_header_map_one_to_one() -> crate::Result<()> {
        let params = vec![path_param("id")?, optional(&header_param("If-Match")?)];
        let accepted = accepted_parameters(&params);
        assert_eq!(accepted["method.request.path.id"], true);
        assert_eq!(accepted["method.request.header.If-Match"], false);

        let backend = backend_parameter_map(&params, &key());
        assert_eq!(
            backend["integration.request.path.id"],
            "method.request.path.id"
        );
        assert_eq!(
            backend["integration.request.header.If-Match"],
            "method.request.header.If-Match"
        );
        Ok(())
    }

    #[test]
    fn test_authorizer_context_only_in_template() {
        let params = vec![username_param()];
        assert!(accepted_parameters(&params).is_empty());

        let backend = backend_parameter_map(&params, &key());
        assert_eq!(backend.len(), 1);
        assert!(backend.contains_key("integration.request.header.X-API-Key"));

        let templates = rewrite_templates(&params).expect("template expected");
        assert_eq!(templates.len(), 1);
        let script = &templates[TEMPLATE_CONTENT_TYPE];
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[0], r#"$input.json("$")"#);
        assert_eq!(
            lines[1],
            "#set($context.requestOverride.header.authorizer-username = $context.authorizer.username)"
        );
    }

    #[test]
    fn test_template_lines_follow_input_order() {
        let params = vec![
            permissions_param(),
            identity_param(),
            deliverer_id_param(),
        ];
        let templates = rewrite_templates(&params).expect("template expected");
        let script = &templates[TEMPLATE_CONTENT_TYPE];
        assert_eq!(
            script,
            "$input.json(\"$\")\n\
             #set($context.requestOverride.header.authorizer-permissions = $context.authorizer.permissions)\n\
             #set($context.requestOverride.header.authorizer-principalId = $context.authorizer.principalId)\n\
             #set($context.requestOverride.header.authorizer-delivererId = $context.authorizer.delivererId)"
        );
    }

    #[test]
    fn test_no_context_means_no_templates() -> crate::Result<()> {
        assert_eq!(rewrite_templates(&[query_param("q")?]), None);
        assert_eq!(rewrite_templates(&[]), None);
        Ok(())
    }

    #[test]
    fn test_compile_rejects_descriptor_on_literal_header() -> crate::Result<()> {
        for name in ["X-API-Key", "x-api-key"] {
            let params = vec![header_param(name)?];
            let err = compile(&params, &key()).unwrap_err();
            assert!(matches!(err, Error::InvariantViolation(_)), "{name}: {err}");
        }

        // The standalone derivation still lets the literal win.
        let backend = backend_parameter_map(&[header_param("X-API-Key")?], &key());
        assert_eq!(backend.len(), 1);
        assert_eq!(backend["integration.request.header.X-API-Key"], "'secret'");
        Ok(())
    }

    #[test]
    fn test_compile_rejects_repeated_context_field() {
        let params = vec![username_param(), optional(&username_param())];
        let err = compile(&params, &key()).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert!(err.to_string().contains("authorizer-username"));
    }

    #[test]
    fn test_compile_rejects_header_shadowed_by_context_field() -> crate::Result<()> {
        let params = vec![header_param("Authorizer-Username")?, username_param()];
        assert!(matches!(
            compile(&params, &key()),
            Err(Error::InvariantViolation(_))
        ));
        Ok(())
    }

    #[test]
    fn test_compile_rejects_headers_differing_in_case() -> crate::Result<()> {
        let params = vec![header_param("If-Match")?, header_param("if-match")?];
        assert!(matches!(
            compile(&params, &key()),
            Err(Error::InvariantViolation(_))
        ));
        Ok(())
    }

    #[test]
    fn test_compile_without_literal() -> crate::Result<()> {
        let set = compile_without_literal(&[path_param("key")?])?;
        assert_eq!(
            set.backend,
            BTreeMap::from([(
                "integration.request.path.key".to_string(),
                "method.request.path.key".to_string()
            )])
        );
        assert_eq!(set.backend, forwarded_parameters(&[path_param("key")?]));
        Ok(())
    }

    #[test]
    fn test_custom_literal_header() {
        let literal = LiteralHeader::new("Authorization", "Bearer t");
        let backend = backend_parameter_map(&[], &literal);
        assert_eq!(
            backend["integration.request.header.Authorization"],
            "'Bearer t'"
        );
    }

    #[test]
    fn test_compile_is_deterministic() -> crate::Result<()> {
        let params = vec![
            username_param(),
            path_param("id")?,
            multi_value_query_param("tags")?,
            optional(&query_param("limit")?),
        ];
        let first = compile(&params, &key())?;
        let second = compile(&params.clone(), &key())?;
        assert_eq!(first, second);
        assert_eq!(first.accepted.len(), 3);
        assert_eq!(first.backend.len(), 4);
        Ok(())
    }

    #[test]
    fn test_compile_rejects_colliding_declarations() -> crate::Result<()> {
        let params = vec![query_param("tags")?, multi_value_query_param("tags")?];
        let err = compile(&params, &key()).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert!(err.to_string().contains("method.request.querystring.tags"));
        Ok(())
    }

    #[test]
    fn test_compile_rejects_duplicate_descriptors() -> crate::Result<()> {
        let params = vec![query_param("q")?, optional(&query_param("q")?)];
        assert!(matches!(
            compile(&params, &key()),
            Err(Error::InvariantViolation(_))
        ));
        Ok(())
    }

    #[test]
    fn test_const_param() {
        assert_eq!(const_param("abc"), "'abc'");
        assert_eq!(const_param(""), "''");
    }

    #[test]
    fn test_serialized_set_omits_absent_templates() -> crate::Result<()> {
        let set = compile(&[query_param("q")?], &key())?;
        let json = serde_json::to_value(&set)?;
        assert!(json.get("templates").is_none());
        assert_eq!(json["accepted"]["method.request.querystring.q"], true);
        Ok(())
    }
}
