//! Instance configuration endpoints
//!
//! ## Endpoints
//!
//! - `GET /api/instance/load` - The live instance
//! - `PUT /api/instance/flash` - Replace the live instance (head only)
//! - `PUT /api/instance/copy` - Back up an instance (head only)
//! - `POST /api/instance/restore` - Flash a backup (head only)
//! - `DELETE /api/instance/delete?id=&token=` - Delete a backup (head only)
//! - `GET /api/instance/backups?token=` - Every backup (head only)

use hyper::body::Body;
use hyper::{Method, Request, Response};
use std::fmt::Display;

use super::respond::{
    method_not_allowed, not_found_response, read_request, respond_doc, respond_docs, respond_done,
    FullBody,
};
use crate::services::{instance, Context};

pub async fn handle_instance_request<B>(ctx: &Context, endpoint: &str, req: Request<B>) -> Response<FullBody>
where
    B: Body,
    B::Error: Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method.clone(), endpoint) {
        (Method::GET, "load") => respond_doc(instance::load(ctx).await),
        (Method::PUT, "flash") => {
            respond_doc(async { instance::flash(ctx, read_request(req).await?).await }.await)
        }
        (Method::PUT, "copy") => {
            respond_doc(async { instance::copy(ctx, read_request(req).await?).await }.await)
        }
        (Method::POST, "restore") => {
            respond_doc(async { instance::restore(ctx, read_request(req).await?).await }.await)
        }
        (Method::DELETE, "delete") => respond_done(
            async { instance::delete(ctx, read_request(req).await?).await }.await,
            "Backup deleted",
        ),
        (Method::GET, "backups") => {
            respond_docs(async { instance::backups(ctx, read_request(req).await?).await }.await)
        }
        (_, "load" | "flash" | "copy" | "restore" | "delete" | "backups") => {
            method_not_allowed(&method, &path)
        }
        _ => not_found_response(&path),
    }
}
