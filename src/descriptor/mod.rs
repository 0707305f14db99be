//! Static service metadata.
//!
//! A [`ServiceDescriptor`] is built once per service definition, validated
//! eagerly, and never mutated afterwards. The dispatcher resolves every
//! invocation against this model.

mod builder;
mod registry;

pub use builder::{MethodBuilder, ServiceBuilder};
pub use registry::DescriptorRegistry;

use crate::error::Error;
use crate::shape::{classify, ReturnShape};
use once_cell::sync::OnceCell;
use std::collections::HashMap;

/// Role a positional argument plays in request assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    /// Substituted into a `{key}` path placeholder.
    Path,
    /// Appended as a `key=value` query pair. An empty key expands a
    /// structured argument's fields into individual pairs.
    Query,
    /// Serialized as the JSON body, or as a multipart field.
    Body,
    /// A multipart field only (never a whole JSON body).
    BodyPart,
    /// Ignored by request assembly.
    None,
}

/// One positional parameter of a method.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    /// Index into the call's argument list.
    pub index: usize,
    pub role: ParamRole,
    /// Path/query name or multipart field name. Empty for whole-object
    /// query binding.
    pub key: String,
}

/// A named-event declaration: every name in `names` decodes to `payload`.
#[derive(Debug, Clone)]
pub struct EventDecl {
    pub names: Vec<String>,
    pub payload: String,
}

/// Immutable metadata for one service method.
#[derive(Debug)]
pub struct MethodDescriptor {
    pub name: String,
    /// Upper-case HTTP verb. Empty only for pass-through defaults.
    pub verb: String,
    /// Path template, concatenated after the service base path. May be empty.
    pub path: String,
    /// Pass-through defaults carry no verb and are never dispatched over HTTP.
    pub passthrough: bool,
    /// Class-level pairs followed by method-level pairs, order preserved.
    /// Duplicate names are all sent.
    pub headers: Vec<(String, String)>,
    pub multipart: bool,
    /// Declared result type, e.g. `async<list<User>>`.
    pub declared_return: String,
    pub event_decls: Vec<EventDecl>,
    pub params: Vec<ParameterDescriptor>,
    shape: OnceCell<Option<ReturnShape>>,
}

impl MethodDescriptor {
    pub(crate) fn new(
        name: String,
        verb: String,
        path: String,
        passthrough: bool,
        headers: Vec<(String, String)>,
        multipart: bool,
        declared_return: String,
        event_decls: Vec<EventDecl>,
        params: Vec<ParameterDescriptor>,
    ) -> Self {
        Self {
            name,
            verb,
            path,
            passthrough,
            headers,
            multipart,
            declared_return,
            event_decls,
            params,
            shape: OnceCell::new(),
        }
    }

    /// The classified return shape, computed on first use and memoized with
    /// the descriptor. An unclassifiable declaration is fatal.
    pub fn shape(&self) -> Result<&ReturnShape, Error> {
        self.shape
            .get_or_init(|| classify(&self.declared_return, &self.event_decls))
            .as_ref()
            .ok_or_else(|| Error::UnsupportedShape {
                declared: self.declared_return.clone(),
            })
    }

    /// Parameters with a given role, in declaration order.
    pub fn params_with_role(&self, role: ParamRole) -> impl Iterator<Item = &ParameterDescriptor> {
        self.params.iter().filter(move |p| p.role == role)
    }
}

/// Immutable metadata for a whole service.
#[derive(Debug)]
pub struct ServiceDescriptor {
    pub name: String,
    /// Prefix concatenated before every method path template.
    pub base_path: String,
    /// Class-level header pairs, order preserved.
    pub headers: Vec<(String, String)>,
    methods: HashMap<String, MethodDescriptor>,
}

impl ServiceDescriptor {
    pub(crate) fn new(
        name: String,
        base_path: String,
        headers: Vec<(String, String)>,
        methods: HashMap<String, MethodDescriptor>,
    ) -> Self {
        Self {
            name,
            base_path,
            headers,
            methods,
        }
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.values()
    }
}
