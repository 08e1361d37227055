//! Loyalty card endpoints
//!
//! ## Endpoints
//!
//! - `PUT /api/card/issue` - Issue the customer's card
//! - `POST /api/card/get` - The customer's card status
//! - `GET /api/card/verify?id=` - Status of a card number
//! - `POST /api/card/retract` - Spend points (any admin)
//! - `POST /api/card/accrue` - Add points (any admin)
//!
//! Lookups of an unknown card answer `404` with `{"valid": false}`.

use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use std::fmt::Display;

use super::respond::{
    from_error, json_response, method_not_allowed, not_found_response, read_request, respond,
    FullBody,
};
use crate::services::cards::{self, CardStatus};
use crate::services::Context;
use crate::types::Result;

fn respond_status(result: Result<CardStatus>) -> Response<FullBody> {
    match result {
        Ok(status) if status.valid => json_response(StatusCode::OK, &status),
        Ok(status) => json_response(StatusCode::NOT_FOUND, &status),
        Err(e) => from_error(&e),
    }
}

pub async fn handle_card_request<B>(ctx: &Context, endpoint: &str, req: Request<B>) -> Response<FullBody>
where
    B: Body,
    B::Error: Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method.clone(), endpoint) {
        (Method::PUT, "issue") => {
            respond(async { cards::issue(ctx, read_request(req).await?).await }.await)
        }
        (Method::POST, "get") => {
            respond_status(async { cards::get(ctx, read_request(req).await?).await }.await)
        }
        (Method::GET, "verify") => {
            respond_status(async { cards::verify(ctx, read_request(req).await?).await }.await)
        }
        (Method::POST, "retract") => {
            respond(async { cards::retract(ctx, read_request(req).await?).await }.await)
        }
        (Method::POST, "accrue") => {
            respond(async { cards::accrue(ctx, read_request(req).await?).await }.await)
        }
        (_, "issue" | "get" | "verify" | "retract" | "accrue") => {
            method_not_allowed(&method, &path)
        }
        _ => not_found_response(&path),
    }
}
