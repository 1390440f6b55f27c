//! OpenAPI document generated from a `Router`'s route table.
//!
//! Generation is a separate pass over registered routes, request handling
//! only serves its result.

use crate::route::{Router, Segment};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const OPENAPI_VERSION: &str = "3.0.2";

/// Metadata shown in the `info` object of generated document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiInfo {
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub description: String,
    pub version: String,
}

/// Builds OpenAPI document for every route registered in `router`.
///
/// `/items/<item_id>` is written as `/items/{item_id}` with `item_id` listed
/// as a required path parameter. Summary is derived from handler's function
/// name, `read_item` becomes `Read Item`.
pub fn document(router: &Router, info: &ApiInfo) -> Value {
    let mut paths: BTreeMap<String, Map<String, Value>> = BTreeMap::new();

    for (method, route) in router.routes() {
        let metadata = &route.metadata;
        let path = openapi_path(metadata.segments());

        let mut operation = Map::new();
        if let Some(name) = metadata.handler_name().and_then(function_name) {
            operation.insert("summary".into(), Value::String(summary(name)));
            operation.insert(
                "operationId".into(),
                Value::String(format!("{}_{}", name, method.as_str().to_lowercase())),
            );
        }

        let parameters: Vec<Value> = metadata
            .param_names()
            .map(|name| {
                json!({
                    "name": name,
                    "in": "path",
                    "required": true,
                    "schema": { "type": "string" },
                })
            })
            .collect();
        if !parameters.is_empty() {
            operation.insert("parameters".into(), Value::Array(parameters));
        }

        operation.insert(
            "responses".into(),
            json!({ "200": { "description": "Successful Response" } }),
        );

        paths
            .entry(path)
            .or_default()
            .insert(method.as_str().to_lowercase(), Value::Object(operation));
    }

    json!({
        "openapi": OPENAPI_VERSION,
        "info": info,
        "paths": paths,
    })
}

fn openapi_path(segments: &[Segment]) -> String {
    let mut path = String::new();
    for segment in segments {
        path.push('/');
        match segment {
            Segment::Static(s) => path.push_str(s),
            Segment::Param(name) => {
                path.push('{');
                path.push_str(name);
                path.push('}');
            }
        }
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

/// Last path component of a type name, `None` for closures.
fn function_name(type_name: &'static str) -> Option<&'static str> {
    let name = type_name.rsplit("::").next()?;
    if name.is_empty() || name.contains(['{', '<', '(', ' ']) {
        return None;
    }
    Some(name)
}

fn summary(function_name: &str) -> String {
    function_name
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
