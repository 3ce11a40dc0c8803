//! JSON responses for the public entry points. Errors become values here, so callers always get
//! a JSON document back.
use crate::find::{find_nbs, find_nbs_multiple};
use crate::mcda::mcda;
use crate::result::TechnologyResult;
use crate::technology::Catalog;
use anyhow::Result;
use log::warn;
use serde_json::{Value, json};

/// The response for a failed request.
///
/// The message holds the whole context chain, outermost first, separated by colons.
pub fn error_response(error: &anyhow::Error) -> Value {
    let message = format!("{error:#}");
    warn!("Request rejected: {message}");
    json!({"error": message})
}

/// The response for one request: an array of records or an error object
pub fn to_response(results: &Result<Vec<TechnologyResult>>) -> Value {
    match results {
        Ok(results) => serde_json::to_value(results)
            .unwrap_or_else(|error| error_response(&anyhow::Error::from(error))),
        Err(error) => error_response(error),
    }
}

/// The response for a batch of requests, where failed requests are `[{"error": msg}]`
pub fn batch_response(batch: &[Result<Vec<TechnologyResult>>]) -> Value {
    Value::Array(
        batch
            .iter()
            .map(|results| match to_response(results) {
                error @ Value::Object(_) => Value::Array(vec![error]),
                value => value,
            })
            .collect(),
    )
}

/// Run a search and return the results, or an error object
pub fn find_response(body: &Value, catalog: &Catalog) -> Value {
    to_response(&find_nbs(body, catalog))
}

/// Run a batch of searches.
///
/// Returns an array with one entry per request. If the body isn't an array, returns a single
/// error object.
pub fn find_multiple_response(body: &Value, catalog: &Catalog) -> Value {
    match find_nbs_multiple(body, catalog) {
        Ok(batch) => batch_response(&batch),
        Err(error) => error_response(&error),
    }
}

/// Score and rank technologies, or return an error object
pub fn mcda_response(body: &Value, catalog: &Catalog) -> Value {
    to_response(&mcda(body, catalog))
}
