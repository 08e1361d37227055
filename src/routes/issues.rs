//! Issue endpoints
//!
//! ## Endpoints
//!
//! - `PUT /api/issue/raise` - Raise an issue at the caller's point (supervisors)
//! - `GET /api/issue/getAll?token=` - Every issue (generals and heads)
//! - `POST /api/issue/modify` - Close or (un)monitor an issue

use hyper::body::Body;
use hyper::{Method, Request, Response};
use serde::Deserialize;
use std::fmt::Display;

use super::respond::{
    method_not_allowed, not_found_response, read_request, respond_doc, respond_docs, FullBody,
};
use crate::services::{issues, Context};

#[derive(Debug, Deserialize)]
struct TokenQuery {
    #[serde(default)]
    token: String,
}

pub async fn handle_issue_request<B>(ctx: &Context, endpoint: &str, req: Request<B>) -> Response<FullBody>
where
    B: Body,
    B::Error: Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method.clone(), endpoint) {
        (Method::PUT, "raise") => {
            respond_doc(async { issues::raise(ctx, read_request(req).await?).await }.await)
        }
        (Method::GET, "getAll") => respond_docs(
            async {
                let query: TokenQuery = read_request(req).await?;
                issues::get_all(ctx, &query.token).await
            }
            .await,
        ),
        (Method::POST, "modify") => {
            respond_doc(async { issues::modify(ctx, read_request(req).await?).await }.await)
        }
        (_, "raise" | "getAll" | "modify") => method_not_allowed(&method, &path),
        _ => not_found_response(&path),
    }
}
