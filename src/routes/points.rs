//! Point endpoints
//!
//! ## Endpoints
//!
//! - `PUT /api/point/new` - Create a point (head only)
//! - `POST /api/point/update` - Change address or pictures (bound general)
//! - `DELETE /api/point/delete?pid=&token=` - Delete a point (head only)
//! - `POST /api/point/staff` - Hire or fire an admin
//! - `GET /api/point/get?pid=` - One point
//! - `GET /api/point/getAll` - Every point

use hyper::body::Body;
use hyper::{Method, Request, Response};
use serde::Deserialize;
use std::fmt::Display;

use super::respond::{
    method_not_allowed, not_found_response, read_request, respond_doc, respond_docs, respond_done,
    FullBody,
};
use crate::services::{missing_id, points, Context};

#[derive(Debug, Deserialize)]
struct PointQuery {
    #[serde(default = "missing_id")]
    pid: i32,
}

pub async fn handle_point_request<B>(ctx: &Context, endpoint: &str, req: Request<B>) -> Response<FullBody>
where
    B: Body,
    B::Error: Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method.clone(), endpoint) {
        (Method::PUT, "new") => {
            respond_doc(async { points::new_point(ctx, read_request(req).await?).await }.await)
        }
        (Method::POST, "update") => {
            respond_doc(async { points::update(ctx, read_request(req).await?).await }.await)
        }
        (Method::DELETE, "delete") => respond_done(
            async { points::delete(ctx, read_request(req).await?).await }.await,
            "Point deleted",
        ),
        (Method::POST, "staff") => {
            respond_doc(async { points::staff(ctx, read_request(req).await?).await }.await)
        }
        (Method::GET, "get") => respond_doc(
            async {
                let query: PointQuery = read_request(req).await?;
                points::get(ctx, query.pid).await
            }
            .await,
        ),
        (Method::GET, "getAll") => respond_docs(points::get_all(ctx).await),
        (_, "new" | "update" | "delete" | "staff" | "get" | "getAll") => {
            method_not_allowed(&method, &path)
        }
        _ => not_found_response(&path),
    }
}
