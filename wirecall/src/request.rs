//! Requests and how they become wire requests.
//!
//! This module contains the request side of the pipeline:
//! - [`Request`]: the declarative description of a call
//! - [`Modifier`]: the transformations a request is built from
//! - [`WireRequest`]: the concrete HTTP request the transport sends

mod model;
pub mod modifier;
mod wire;

pub use model::{
    Contents, HttpRequest, Request, body, build_wire_request, cache_policy, configure,
    effective_modifiers, form, header, json, method, path, query, timeout, try_header, url,
};
pub(crate) use model::{fold_modifiers, scope_configuration};
pub use modifier::Modifier;
pub use wire::WireRequest;
