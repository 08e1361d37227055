//! Localized string lookup
//!
//! - `GET /api/strings/get?si=&culture=` - Strings for an SI, optionally one culture

use hyper::body::Body;
use hyper::{Method, Request, Response};
use serde::Deserialize;
use std::fmt::Display;

use super::respond::{method_not_allowed, not_found_response, read_request, respond_docs, FullBody};
use crate::services::{strings, Context};

#[derive(Debug, Deserialize)]
struct StringsQuery {
    #[serde(default)]
    si: String,
    #[serde(default)]
    culture: Option<String>,
}

pub async fn handle_strings_request<B>(ctx: &Context, endpoint: &str, req: Request<B>) -> Response<FullBody>
where
    B: Body,
    B::Error: Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method.clone(), endpoint) {
        (Method::GET, "get") => respond_docs(
            async {
                let query: StringsQuery = read_request(req).await?;
                strings::get(ctx, &query.si, query.culture.as_deref()).await
            }
            .await,
        ),
        (_, "get") => method_not_allowed(&method, &path),
        _ => not_found_response(&path),
    }
}
