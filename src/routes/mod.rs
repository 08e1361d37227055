//! HTTP routes for OpenCafe
//!
//! Every API path has the shape `/api/{collection}/{operation}`. The
//! collection picks a handler module and the operation is matched there
//! together with the method.

pub mod admins;
pub mod cards;
pub mod customers;
pub mod dishes;
pub mod health;
pub mod instance;
pub mod issues;
pub mod menus;
pub mod points;
pub mod respond;
pub mod strings;

pub use admins::handle_admin_request;
pub use cards::handle_card_request;
pub use customers::handle_customer_request;
pub use dishes::handle_dish_request;
pub use health::{health_check, readiness_check};
pub use instance::handle_instance_request;
pub use issues::handle_issue_request;
pub use menus::handle_menu_request;
pub use points::handle_point_request;
pub use respond::{public_json, FullBody};
pub use strings::handle_strings_request;

use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use std::fmt::Display;

use crate::server::AppState;
use respond::{not_found_response, preflight_response, text_response};

const GREETING: &str = "Welcome to OpenCafe!";

/// Dispatch one request. Never fails: every error becomes a JSON response.
pub async fn route<B>(state: &AppState, req: Request<B>) -> Response<FullBody>
where
    B: Body,
    B::Error: Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method, path.as_str()) {
        (Method::OPTIONS, _) => preflight_response(),
        (Method::GET, "/") => text_response(StatusCode::OK, GREETING),
        (Method::GET, "/health") | (Method::GET, "/healthz") => health_check(state),
        (Method::GET, "/ready") | (Method::GET, "/readyz") => readiness_check(state).await,
        (_, p) if p.starts_with("/api/") => {
            let Some((collection, endpoint)) = p["/api/".len()..].split_once('/') else {
                return not_found_response(&path);
            };
            let ctx = &state.ctx;
            match collection {
                "admin" => handle_admin_request(ctx, endpoint, req).await,
                "point" => handle_point_request(ctx, endpoint, req).await,
                "issue" => handle_issue_request(ctx, endpoint, req).await,
                "dish" => handle_dish_request(ctx, endpoint, req).await,
                "menu" => handle_menu_request(ctx, endpoint, req).await,
                "strings" => handle_strings_request(ctx, endpoint, req).await,
                "instance" => handle_instance_request(ctx, endpoint, req).await,
                "customer" => handle_customer_request(ctx, endpoint, req).await,
                "card" => handle_card_request(ctx, endpoint, req).await,
                _ => not_found_response(&path),
            }
        }
        _ => not_found_response(&path),
    }
}
