//! Builder API that service definitions populate directly.
//!
//! Validation happens in `build()`: a method without a verb fails unless it
//! is a pass-through default, and every `{placeholder}` in a path template
//! must bind exactly one path-role parameter. Failing fast here keeps
//! call-time dispatch free of template errors.

use super::{EventDecl, MethodDescriptor, ParamRole, ParameterDescriptor, ServiceDescriptor};
use crate::error::Error;
use std::collections::HashMap;

/// Fluent builder for a [`ServiceDescriptor`].
pub struct ServiceBuilder {
    name: String,
    base_path: String,
    headers: Vec<(String, String)>,
    methods: Vec<MethodBuilder>,
}

impl ServiceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_path: String::new(),
            headers: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn base_path(mut self, prefix: impl Into<String>) -> Self {
        self.base_path = prefix.into();
        self
    }

    /// Class-level header pair, sent with every method of the service.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(self) -> Result<ServiceDescriptor, Error> {
        let mut methods = HashMap::with_capacity(self.methods.len());
        for builder in self.methods {
            let method = builder.build(&self.headers)?;
            methods.insert(method.name.clone(), method);
        }
        Ok(ServiceDescriptor::new(
            self.name,
            self.base_path,
            self.headers,
            methods,
        ))
    }
}

/// Fluent builder for one method of a service.
pub struct MethodBuilder {
    name: String,
    verb: Option<String>,
    path: String,
    passthrough: bool,
    headers: Vec<(String, String)>,
    multipart: bool,
    declared_return: String,
    event_decls: Vec<EventDecl>,
    params: Vec<ParameterDescriptor>,
}

impl MethodBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verb: None,
            path: String::new(),
            passthrough: false,
            headers: Vec::new(),
            multipart: false,
            declared_return: String::new(),
            event_decls: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn verb(mut self, verb: &str, path: impl Into<String>) -> Self {
        self.verb = Some(verb.to_uppercase());
        self.path = path.into();
        self
    }

    pub fn get(self, path: impl Into<String>) -> Self {
        self.verb("GET", path)
    }

    pub fn post(self, path: impl Into<String>) -> Self {
        self.verb("POST", path)
    }

    pub fn put(self, path: impl Into<String>) -> Self {
        self.verb("PUT", path)
    }

    pub fn delete(self, path: impl Into<String>) -> Self {
        self.verb("DELETE", path)
    }

    /// Mark this method as a pass-through default: no verb required, never
    /// dispatched over HTTP.
    pub fn passthrough(mut self) -> Self {
        self.passthrough = true;
        self
    }

    /// Method-level header pair, appended after the class-level pairs.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn multipart(mut self) -> Self {
        self.multipart = true;
        self
    }

    /// Declared result type, e.g. `"User"`, `"list<User>"`,
    /// `"async<stream<Delta>>"`.
    pub fn returns(mut self, declared: impl Into<String>) -> Self {
        self.declared_return = declared.into();
        self
    }

    /// Declare that the stream events named in `names` decode to `payload`.
    /// Multiple declarations merge; a later declaration of the same event
    /// name wins.
    pub fn events<I, S>(mut self, names: I, payload: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_decls.push(EventDecl {
            names: names.into_iter().map(Into::into).collect(),
            payload: payload.into(),
        });
        self
    }

    pub fn param(mut self, index: usize, role: ParamRole, key: impl Into<String>) -> Self {
        self.params.push(ParameterDescriptor {
            index,
            role,
            key: key.into(),
        });
        self
    }

    pub fn path_param(self, index: usize, key: impl Into<String>) -> Self {
        self.param(index, ParamRole::Path, key)
    }

    pub fn query_param(self, index: usize, key: impl Into<String>) -> Self {
        self.param(index, ParamRole::Query, key)
    }

    /// Whole-object query binding: each public field of the argument becomes
    /// its own query pair.
    pub fn query_object(self, index: usize) -> Self {
        self.param(index, ParamRole::Query, "")
    }

    pub fn body(self, index: usize) -> Self {
        self.param(index, ParamRole::Body, "")
    }

    pub fn body_named(self, index: usize, key: impl Into<String>) -> Self {
        self.param(index, ParamRole::Body, key)
    }

    pub fn body_part(self, index: usize, key: impl Into<String>) -> Self {
        self.param(index, ParamRole::BodyPart, key)
    }

    fn build(self, class_headers: &[(String, String)]) -> Result<MethodDescriptor, Error> {
        let verb = match self.verb {
            Some(verb) => verb,
            None if self.passthrough => String::new(),
            None => {
                return Err(Error::MissingVerb {
                    method: self.name,
                })
            }
        };

        for placeholder in placeholders(&self.path) {
            let bound = self
                .params
                .iter()
                .filter(|p| p.role == ParamRole::Path && p.key == placeholder)
                .count();
            if bound != 1 {
                return Err(Error::UnboundPathParam {
                    placeholder: placeholder.to_string(),
                    method: self.name,
                });
            }
        }

        let mut headers = class_headers.to_vec();
        headers.extend(self.headers);

        Ok(MethodDescriptor::new(
            self.name,
            verb,
            self.path,
            self.passthrough,
            headers,
            self.multipart,
            self.declared_return,
            self.event_decls,
            self.params,
        ))
    }
}

/// All `{name}` tokens in a path template, in order.
fn placeholders(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        out.push(&rest[open + 1..open + close]);
        rest = &rest[open + close + 1..];
    }
    out
}
