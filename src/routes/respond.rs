//! Request decoding and JSON response helpers shared by every route

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE,
};
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use tracing::warn;

use crate::types::{CafeError, Result};

pub type FullBody = Full<Bytes>;

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Body for operations with nothing else to return
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

fn with_body(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<FullBody> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    with_body(status, "application/json", Bytes::from(json))
}

pub fn text_response(status: StatusCode, text: &'static str) -> Response<FullBody> {
    with_body(status, "text/plain; charset=utf-8", Bytes::from_static(text.as_bytes()))
}

pub fn error_response(status: StatusCode, error: &str, code: Option<&str>) -> Response<FullBody> {
    json_response(
        status,
        &ErrorResponse {
            error: error.to_string(),
            code: code.map(|c| c.to_string()),
        },
    )
}

/// Map a service error onto its status. Server-side details stay in the log.
pub fn from_error(err: &CafeError) -> Response<FullBody> {
    if err.is_client_error() {
        return error_response(err.status_code(), &err.to_string(), Some(err.code()));
    }

    warn!(code = err.code(), "Request failed: {}", err);
    let message = match err {
        CafeError::Database(_) => "Database error",
        CafeError::Timeout(_) => "Database did not answer in time",
        _ => "Internal server error",
    };
    error_response(err.status_code(), message, Some(err.code()))
}

/// `200 OK` with the value, or the error response
pub fn respond<T: Serialize>(result: Result<T>) -> Response<FullBody> {
    match result {
        Ok(value) => json_response(StatusCode::OK, &value),
        Err(e) => from_error(&e),
    }
}

/// Like [`respond`], for stored documents rendered through [`public_json`]
pub fn respond_doc<T: Serialize>(result: Result<T>) -> Response<FullBody> {
    respond(result.and_then(|doc| public_json(&doc)))
}

/// Like [`respond_doc`], for lists of documents
pub fn respond_docs<T: Serialize>(result: Result<Vec<T>>) -> Response<FullBody> {
    respond(result.and_then(|docs| docs.iter().map(public_json).collect::<Result<Vec<_>>>()))
}

/// `200 OK` with a [`SuccessResponse`], or the error response
pub fn respond_done(result: Result<()>, message: &str) -> Response<FullBody> {
    respond(result.map(|()| SuccessResponse {
        success: true,
        message: message.to_string(),
    }))
}

pub fn not_found_response(path: &str) -> Response<FullBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": "Not Found", "path": path }),
    )
}

pub fn method_not_allowed(method: &Method, path: &str) -> Response<FullBody> {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &format!("{method} is not supported on {path}"),
        Some("METHOD_NOT_ALLOWED"),
    )
}

/// CORS preflight response
pub fn preflight_response() -> Response<FullBody> {
    let mut response = with_body(StatusCode::OK, "text/plain", Bytes::new());
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    response
}

/// Render a stored document for clients: `_id` becomes an `id` hex string
/// and bookkeeping metadata is dropped.
pub fn public_json<T: Serialize>(doc: &T) -> Result<Value> {
    let mut value = serde_json::to_value(doc)
        .map_err(|e| CafeError::Internal(format!("Failed to render document: {e}")))?;

    if let Value::Object(map) = &mut value {
        map.remove("metadata");
        if let Some(id) = map.remove("_id") {
            let hex = match id {
                Value::Object(mut oid) => oid.remove("$oid").unwrap_or(Value::Null),
                other => other,
            };
            map.insert("id".to_string(), hex);
        }
        for field in map.values_mut() {
            if let Some(rendered) = extended_date(field) {
                *field = Value::String(rendered);
            }
        }
    }
    Ok(value)
}

/// `{"$date": {"$numberLong": "..."}}` as an RFC 3339 string
fn extended_date(value: &Value) -> Option<String> {
    let millis = value
        .get("$date")?
        .get("$numberLong")?
        .as_str()?
        .parse::<i64>()
        .ok()?;
    bson::DateTime::from_millis(millis).try_to_rfc3339_string().ok()
}

/// Decode the request parameters: the query string for `GET` and
/// `DELETE`, the JSON body otherwise. An empty body decodes as `{}`.
pub async fn read_request<T, B>(req: Request<B>) -> Result<T>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Display,
{
    if req.method() == Method::GET || req.method() == Method::DELETE {
        return read_query(req.uri().query());
    }

    let bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|e| CafeError::InvalidArgument(format!("Invalid body: {e}")))?
        .to_bytes();

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_slice(b"{}")
            .map_err(|e| CafeError::InvalidArgument(format!("Invalid JSON: {e}")));
    }
    serde_json::from_slice(&bytes).map_err(|e| CafeError::InvalidArgument(format!("Invalid JSON: {e}")))
}

pub fn read_query<T: DeserializeOwned>(query: Option<&str>) -> Result<T> {
    serde_urlencoded::from_str(query.unwrap_or(""))
        .map_err(|e| CafeError::InvalidArgument(format!("Invalid query string: {e}")))
}
