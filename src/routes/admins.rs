//! Admin endpoints
//!
//! ## Endpoints
//!
//! - `GET /api/admin/login?token=` - Identify the token holder
//! - `PUT /api/admin/register` - Register a general admin (head only)
//! - `PUT /api/admin/changename` - Rename an admin
//! - `DELETE /api/admin/delete?token1=&token2=` - Delete an admin (head only)
//! - `GET /api/admin/getAll?token=` - Every admin with its token (head only)
//! - `POST /api/admin/rotate` - Replace an admin's token (head only)

use hyper::body::Body;
use hyper::{Method, Request, Response};
use std::fmt::Display;

use super::respond::{method_not_allowed, not_found_response, read_request, respond, FullBody};
use crate::services::{admins, Context};

pub async fn handle_admin_request<B>(ctx: &Context, endpoint: &str, req: Request<B>) -> Response<FullBody>
where
    B: Body,
    B::Error: Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method.clone(), endpoint) {
        (Method::GET, "login") => {
            respond(async { admins::login(ctx, read_request(req).await?).await }.await)
        }
        (Method::PUT, "register") => {
            respond(async { admins::register(ctx, read_request(req).await?).await }.await)
        }
        (Method::PUT, "changename") => {
            respond(async { admins::change_name(ctx, read_request(req).await?).await }.await)
        }
        (Method::DELETE, "delete") => {
            respond(async { admins::delete(ctx, read_request(req).await?).await }.await)
        }
        (Method::GET, "getAll") => {
            respond(async { admins::get_all(ctx, read_request(req).await?).await }.await)
        }
        (Method::POST, "rotate") => {
            respond(async { admins::rotate(ctx, read_request(req).await?).await }.await)
        }
        (_, "login" | "register" | "changename" | "delete" | "getAll" | "rotate") => {
            method_not_allowed(&method, &path)
        }
        _ => not_found_response(&path),
    }
}
