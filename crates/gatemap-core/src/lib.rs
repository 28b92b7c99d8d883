//! gatemap Core Library
//!
//! This library compiles declarative route parameter lists into the request
//! parameter mappings and mapping templates an API gateway needs for
//! passthrough proxy integrations, and plans the integrations of whole route
//! configurations together with their CORS and API key settings.

pub mod api;
pub mod compiler;
pub mod config;
pub mod error;
pub mod parameter;
pub mod path;
pub mod route;

pub use crate::{
    api::{ApiKey, ApiPlan, Throttle},
    compiler::{
        accepted_parameters, backend_parameter_map, compile, compile_without_literal,
        rewrite_templates, CompiledMappingSet, LiteralHeader,
    },
    config::Config,
    error::{Error, Result},
    parameter::{dedupe, optional, ParameterDescriptor, ParameterKind},
    path::{extract_path_params, merge_path_params},
    route::{HttpMethod, IntegrationPlan, ProxySettings, Route, RouteTarget},
};
