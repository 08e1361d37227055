//! Dish endpoints
//!
//! ## Endpoints
//!
//! - `PUT /api/dish/new` - Create a dish
//! - `POST /api/dish/update` - Change price, texts, nutrition or images
//! - `DELETE /api/dish/delete?did=&token=` - Delete a dish
//! - `GET /api/dish/get?did=` - One dish

use hyper::body::Body;
use hyper::{Method, Request, Response};
use serde::Deserialize;
use std::fmt::Display;

use super::respond::{
    method_not_allowed, not_found_response, read_request, respond_doc, respond_done, FullBody,
};
use crate::services::{dishes, missing_id, Context};

#[derive(Debug, Deserialize)]
struct DishQuery {
    #[serde(default = "missing_id")]
    did: i32,
}

pub async fn handle_dish_request<B>(ctx: &Context, endpoint: &str, req: Request<B>) -> Response<FullBody>
where
    B: Body,
    B::Error: Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method.clone(), endpoint) {
        (Method::PUT, "new") => {
            respond_doc(async { dishes::new_dish(ctx, read_request(req).await?).await }.await)
        }
        (Method::POST, "update") => {
            respond_doc(async { dishes::update(ctx, read_request(req).await?).await }.await)
        }
        (Method::DELETE, "delete") => respond_done(
            async { dishes::delete(ctx, read_request(req).await?).await }.await,
            "Dish deleted",
        ),
        (Method::GET, "get") => respond_doc(
            async {
                let query: DishQuery = read_request(req).await?;
                dishes::get(ctx, query.did).await
            }
            .await,
        ),
        (_, "new" | "update" | "delete" | "get") => method_not_allowed(&method, &path),
        _ => not_found_response(&path),
    }
}
