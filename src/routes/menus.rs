//! Menu endpoints
//!
//! ## Endpoints
//!
//! - `PUT /api/menu/create` - Create a menu around one existing dish
//! - `POST /api/menu/update` - Add or remove dishes, change texts
//! - `DELETE /api/menu/delete?mid=&token=` - Delete a menu
//! - `GET /api/menu/get?mid=` - One menu
//! - `GET /api/menu/getAll` - Every menu

use hyper::body::Body;
use hyper::{Method, Request, Response};
use serde::Deserialize;
use std::fmt::Display;

use super::respond::{
    method_not_allowed, not_found_response, read_request, respond_doc, respond_docs, respond_done,
    FullBody,
};
use crate::services::{menus, missing_id, Context};

#[derive(Debug, Deserialize)]
struct MenuQuery {
    #[serde(default = "missing_id", alias = "id")]
    mid: i32,
}

pub async fn handle_menu_request<B>(ctx: &Context, endpoint: &str, req: Request<B>) -> Response<FullBody>
where
    B: Body,
    B::Error: Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method.clone(), endpoint) {
        (Method::PUT, "create") => {
            respond_doc(async { menus::create(ctx, read_request(req).await?).await }.await)
        }
        (Method::POST, "update") => {
            respond_doc(async { menus::update(ctx, read_request(req).await?).await }.await)
        }
        (Method::DELETE, "delete") => respond_done(
            async { menus::delete(ctx, read_request(req).await?).await }.await,
            "Menu deleted",
        ),
        (Method::GET, "get") => respond_doc(
            async {
                let query: MenuQuery = read_request(req).await?;
                menus::get(ctx, query.mid).await
            }
            .await,
        ),
        (Method::GET, "getAll") => respond_docs(menus::get_all(ctx).await),
        (_, "create" | "update" | "delete" | "get" | "getAll") => {
            method_not_allowed(&method, &path)
        }
        _ => not_found_response(&path),
    }
}
