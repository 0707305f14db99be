//! Return-shape classification.
//!
//! A method's declared result type is a nested-type string such as
//! `"User"`, `"list<User>"`, `"page<User>"`, `"async<stream<Delta>>"`.
//! Classification picks exactly one of twelve categories (sync/async times
//! six kinds) that drives how the response body is read and decoded.
//! Anything that does not classify is a fatal dispatch error at first use.

use crate::descriptor::EventDecl;
use std::collections::HashMap;

/// How a response body must be read and decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// Full text body decoded to a single object.
    Object,
    /// Full text body decoded to a list of elements.
    List,
    /// Full text body decoded to a parametric container.
    Parametric,
    /// Full text body passed through unchanged.
    Text,
    /// Raw bytes passed through unchanged.
    Binary,
    /// Lazy line sequence parsed as server-sent events.
    EventStream,
}

/// The classified return shape of one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnShape {
    pub kind: ShapeKind,
    /// Whether the outermost wrapper marks asynchrony.
    pub asynchronous: bool,
    /// Base payload type: the object type, the container type for
    /// parametric shapes, or the element type for lists and streams.
    pub payload: String,
    /// Container element type, when the shape has one.
    pub element: Option<String>,
    /// Event name to payload type, for named-event streams. Empty for
    /// plain streams.
    pub events: HashMap<String, String>,
}

const ASYNC_MARKER: &str = "async";
const LIST_MARKER: &str = "list";
const STREAM_MARKER: &str = "stream";
const BINARY_MARKERS: [&str; 2] = ["binary", "bytes"];
const TEXT_MARKERS: [&str; 2] = ["text", "string"];
/// Container markers that are recognized but carry no supported decoding.
const UNSUPPORTED_MARKERS: [&str; 2] = ["set", "map"];

fn is_container_marker(token: &str) -> bool {
    token == ASYNC_MARKER
        || token == LIST_MARKER
        || token == STREAM_MARKER
        || UNSUPPORTED_MARKERS.contains(&token)
}

/// Classify a declared result type, or `None` when the declaration has no
/// supported category.
pub fn classify(declared: &str, event_decls: &[EventDecl]) -> Option<ReturnShape> {
    let stripped = declared.replace('>', "");
    let tokens: Vec<&str> = stripped.split('<').map(str::trim).collect();
    if tokens.iter().any(|t| t.is_empty()) {
        return None;
    }

    let asynchronous = tokens[0] == ASYNC_MARKER;
    let inner: &[&str] = if asynchronous { &tokens[1..] } else { &tokens };
    if inner.is_empty() {
        return None;
    }

    let Some(&last) = inner.last() else {
        return None;
    };

    if inner.len() >= 2 {
        let wrapper = inner[inner.len() - 2];
        return match wrapper {
            STREAM_MARKER => Some(ReturnShape {
                kind: ShapeKind::EventStream,
                asynchronous,
                payload: last.to_string(),
                element: Some(last.to_string()),
                events: merge_event_decls(event_decls),
            }),
            LIST_MARKER => Some(ReturnShape {
                kind: ShapeKind::List,
                asynchronous,
                payload: last.to_string(),
                element: Some(last.to_string()),
                events: HashMap::new(),
            }),
            _ if is_container_marker(wrapper) => None,
            container => Some(ReturnShape {
                kind: ShapeKind::Parametric,
                asynchronous,
                payload: container.to_string(),
                element: Some(last.to_string()),
                events: HashMap::new(),
            }),
        };
    }

    if is_container_marker(last) {
        return None;
    }
    let kind = if BINARY_MARKERS.contains(&last) {
        ShapeKind::Binary
    } else if TEXT_MARKERS.contains(&last) {
        ShapeKind::Text
    } else {
        ShapeKind::Object
    };
    Some(ReturnShape {
        kind,
        asynchronous,
        payload: last.to_string(),
        element: None,
        events: HashMap::new(),
    })
}

/// Merge named-event declarations into one map. Declarations are applied in
/// order, so a duplicate event name takes the last declaration's payload.
fn merge_event_decls(decls: &[EventDecl]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for decl in decls {
        for name in &decl.names {
            map.insert(name.clone(), decl.payload.clone());
        }
    }
    map
}
