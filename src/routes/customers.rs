//! Customer endpoints
//!
//! - `PUT /api/customer/register` - Create a customer account
//! - `POST /api/customer/login` - Check email and password

use hyper::body::Body;
use hyper::{Method, Request, Response};
use std::fmt::Display;

use super::respond::{method_not_allowed, not_found_response, read_request, respond, FullBody};
use crate::services::{customers, Context};

pub async fn handle_customer_request<B>(ctx: &Context, endpoint: &str, req: Request<B>) -> Response<FullBody>
where
    B: Body,
    B::Error: Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method.clone(), endpoint) {
        (Method::PUT, "register") => {
            respond(async { customers::register(ctx, read_request(req).await?).await }.await)
        }
        (Method::POST, "login") => {
            respond(async { customers::login(ctx, read_request(req).await?).await }.await)
        }
        (_, "register" | "login") => method_not_allowed(&method, &path),
        _ => not_found_response(&path),
    }
}
