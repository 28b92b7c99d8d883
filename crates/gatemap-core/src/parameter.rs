//! Parameter descriptors and the catalog of well-known route parameters.
//!
//! A [`ParameterDescriptor`] names one request parameter a proxy route must
//! forward: where it lives on the inbound request ([`ParameterKind`]), what it
//! is called, and whether the gateway should insist on it. Descriptors are
//! immutable; helpers such as [`optional`] return new values.
//!
//! # Examples
//!
//! ```
//! use gatemap_core::parameter::{dedupe, optional, query_param, username_param};
//!
//! # fn main() -> gatemap_core::Result<()> {
//! let params = dedupe(vec![
//!     query_param("limit")?,
//!     optional(&query_param("cursor")?),
//!     username_param(),
//!     query_param("limit")?,
//! ]);
//! assert_eq!(params.len(), 3);
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::collections::HashSet;
use std::fmt;

use crate::Error;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};

/// Where a parameter is read from, and therefore which mapping rule applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParameterKind {
    #[serde(rename = "querystring")]
    QueryString,
    #[serde(rename = "multivaluequerystring")]
    MultiValueQueryString,
    #[serde(rename = "path")]
    Path,
    #[serde(rename = "header")]
    Header,
    /// A field of the custom authorizer's result context, forwarded as an
    /// upstream `authorizer-<name>` header.
    #[serde(rename = "context-to-header")]
    AuthorizerContextInjection,
}

impl ParameterKind {
    /// The scope segment used in gateway parameter references.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::QueryString => "querystring",
            ParameterKind::MultiValueQueryString => "multivaluequerystring",
            ParameterKind::Path => "path",
            ParameterKind::Header => "header",
            ParameterKind::AuthorizerContextInjection => "context-to-header",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request parameter of a proxied route.
///
/// The name is guaranteed non-blank: both [`ParameterDescriptor::new`] and
/// deserialization reject empty or whitespace-only names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDescriptor")]
pub struct ParameterDescriptor {
    #[serde(rename = "type")]
    kind: ParameterKind,
    name: String,
    required: bool,
}

/// Unchecked wire form of a descriptor, `required` defaulting to `true`.
#[derive(Deserialize)]
struct RawDescriptor {
    #[serde(rename = "type")]
    kind: ParameterKind,
    name: String,
    #[serde(default = "default_required")]
    required: bool,
}

fn default_required() -> bool {
    true
}

impl TryFrom<RawDescriptor> for ParameterDescriptor {
    type Error = Error;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        ParameterDescriptor::new(raw.kind, raw.name, raw.required)
    }
}

impl ParameterDescriptor {
    /// Create a descriptor, rejecting blank names.
    pub fn new(
        kind: ParameterKind,
        name: impl Into<String>,
        required: bool,
    ) -> crate::Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::invalid_name(name));
        }
        Ok(Self {
            kind,
            name,
            required,
        })
    }

    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> bool {
        self.required
    }

    /// The `(kind, name)` pair two descriptors must share to be duplicates.
    /// `required` is not part of it.
    pub fn identity(&self) -> (ParameterKind, &str) {
        (self.kind, &self.name)
    }

    /// Return a copy of this descriptor with `required = false`.
    pub fn optional(&self) -> Self {
        Self {
            kind: self.kind,
            name: self.name.clone(),
            required: false,
        }
    }

    pub fn is_authorizer_context(&self) -> bool {
        self.kind == ParameterKind::AuthorizerContextInjection
    }

    // Only for names that are known literals.
    fn well_known(kind: ParameterKind, name: &'static str, required: bool) -> Self {
        Self {
            kind,
            name: name.to_string(),
            required,
        }
    }
}

impl fmt::Display for ParameterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)?;
        if !self.required {
            f.write_str("?")?;
        }
        Ok(())
    }
}

/// Required query string parameter.
pub fn query_param(name: impl Into<String>) -> crate::Result<ParameterDescriptor> {
    ParameterDescriptor::new(ParameterKind::QueryString, name, true)
}

/// Required multi-value query string parameter (e.g. `?tag=a&tag=b`).
pub fn multi_value_query_param(name: impl Into<String>) -> crate::Result<ParameterDescriptor> {
    ParameterDescriptor::new(ParameterKind::MultiValueQueryString, name, true)
}

/// Required path parameter. Usually derived from the route template instead.
pub fn path_param(name: impl Into<String>) -> crate::Result<ParameterDescriptor> {
    ParameterDescriptor::new(ParameterKind::Path, name, true)
}

/// Required request header.
pub fn header_param(name: impl Into<String>) -> crate::Result<ParameterDescriptor> {
    ParameterDescriptor::new(ParameterKind::Header, name, true)
}

/// The authorizer's `principalId`, forwarded as `authorizer-principalId`.
pub fn identity_param() -> ParameterDescriptor {
    ParameterDescriptor::well_known(ParameterKind::AuthorizerContextInjection, "principalId", true)
}

/// The authorizer's `username`, forwarded as `authorizer-username`.
pub fn username_param() -> ParameterDescriptor {
    ParameterDescriptor::well_known(ParameterKind::AuthorizerContextInjection, "username", true)
}

pub fn permissions_param() -> ParameterDescriptor {
    ParameterDescriptor::well_known(ParameterKind::AuthorizerContextInjection, "permissions", false)
}

pub fn deliverer_id_param() -> ParameterDescriptor {
    ParameterDescriptor::well_known(ParameterKind::AuthorizerContextInjection, "delivererId", false)
}

/// Return a copy of `param` that the gateway does not insist on.
pub fn optional(param: &ParameterDescriptor) -> ParameterDescriptor {
    param.optional()
}

/// Remove descriptors whose `(kind, name)` already occurred, keeping the
/// first occurrence and the input order.
///
/// A dropped duplicate that disagrees on `required` is logged, since the
/// first occurrence may be the optional one.
pub fn dedupe(params: Vec<ParameterDescriptor>) -> Vec<ParameterDescriptor> {
    let mut kept: Vec<ParameterDescriptor> = Vec::with_capacity(params.len());
    let mut seen = HashSet::new();

    for param in params {
        if seen.insert((param.kind, param.name.clone())) {
            kept.push(param);
            continue;
        }
        if let Some(first) = kept.iter().find(|p| p.identity() == param.identity()) {
            if first.required != param.required {
                log::warn!(
                    "Duplicate parameter {} with required={} dropped; keeping required={}",
                    param,
                    param.required,
                    first.required
                );
            }
        }
    }
    kept
}
