//! Tutorial endpoints. Each handler shows one way of taking input from a
//! request; `crate::app` registers them.

use crate::{config::AppConfig, decode::decode_documents, upstream::UpstreamClient};
use anyhow::bail;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{collections::BTreeMap, sync::Arc};
use tour_core::{
    error::HttpError,
    request::{Json, PathParam, QueryPairs, State},
    FromParam,
};

/// Query key read by `decode_query`.
pub const DOCUMENT_KEY: &str = "q";

/// Shared by every handler through `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub upstream: UpstreamClient,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            config: Arc::new(config.clone()),
            upstream: UpstreamClient::new(config),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromParam)]
pub struct ItemId(pub i64);

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Item {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub is_offer: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ItemView {
    pub item_id: i64,
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemUpdated {
    pub item_name: String,
    pub is_now: f64,
    pub item_id: i64,
}

pub fn read_root() -> Json<Value> {
    Json(json!({ "Message": "Hello World!" }))
}

/// Optional `q`, the last occurrence wins when repeated.
pub fn read_item(
    PathParam(ItemId(item_id)): PathParam<ItemId>,
    pairs: QueryPairs,
) -> Json<ItemView> {
    Json(ItemView {
        item_id,
        q: pairs.get_all("q").last().map(str::to_owned),
    })
}

pub fn update_item(
    PathParam(ItemId(item_id)): PathParam<ItemId>,
    Json(item): Json<Item>,
) -> Json<ItemUpdated> {
    Json(ItemUpdated {
        item_name: item.name,
        is_now: item.price,
        item_id,
    })
}

/// Proxies the configured upstream and returns its JSON body unchanged.
pub fn read_uuid(State(state): State<AppState>) -> anyhow::Result<Json<Value>> {
    let value = state.upstream.fetch_json()?;
    Ok(Json(value))
}

/// Echoes every query parameter, values grouped per key.
pub fn read_query(pairs: QueryPairs) -> Json<Value> {
    let mut params: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (key, value) in &pairs.0 {
        params.entry(key.as_str()).or_default().push(value.as_str());
    }
    Json(json!({ "params": params }))
}

/// Decodes every `q` value as a JSON document. The first bad value fails
/// the whole request with 400.
pub fn decode_query(
    State(state): State<AppState>,
    pairs: QueryPairs,
) -> anyhow::Result<Json<Value>> {
    let raw: Vec<&str> = pairs.get_all(DOCUMENT_KEY).collect();
    if raw.is_empty() {
        bail!(HttpError::unprocessable(format!(
            "missing required query parameter `{}`",
            DOCUMENT_KEY
        )));
    }

    let documents = decode_documents(&raw, &state.config.decode_limits).map_err(|e| {
        debug!("rejecting query documents: {}", e);
        HttpError::bad_request(e)
    })?;

    Ok(Json(json!({ "q": documents })))
}
