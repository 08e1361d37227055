//! End-to-end request flows through the router over in-memory stores

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use serde_json::{json, Value};

use opencafe::auth::Role;
use opencafe::routes::route;
use opencafe::services::admins::create_admin;
use opencafe::{AppState, Args, Context};

struct Harness {
    state: AppState,
}

impl Harness {
    fn new() -> Self {
        Self {
            state: AppState::new(Args::dev_defaults(), Context::in_memory()),
        }
    }

    async fn admin(&self, name: &str, roles: Vec<Role>, bound_to: Option<i32>) -> String {
        let (_, issued) = create_admin(&self.state.ctx, name, roles, bound_to)
            .await
            .unwrap();
        issued.plaintext.to_string()
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = body
            .map(|b| Bytes::from(b.to_string()))
            .unwrap_or_default();
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(body))
            .unwrap();

        let response = route(&self.state, req).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

#[tokio::test]
async fn root_and_health() {
    let h = Harness::new();

    let (status, _) = h.call(Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h.call(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
    assert_eq!(body["backend"], "memory");
    assert_eq!(body["mode"], "development");

    let (status, body) = h.call(Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
}

#[tokio::test]
async fn unknown_paths_and_methods() {
    let h = Harness::new();

    let (status, _) = h.call(Method::GET, "/api/nothing/here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h.call(Method::GET, "/api/admin/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = h.call(Method::POST, "/api/admin/login", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["code"], "METHOD_NOT_ALLOWED");

    let (status, _) = h.call(Method::OPTIONS, "/api/admin/login", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_lifecycle() {
    let h = Harness::new();
    let head = h.admin("Owner", vec![Role::Head], None).await;

    let (status, body) = h
        .call(Method::GET, &format!("/api/admin/login?token={head}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Owner");
    assert!(body.get("token").is_none());

    let (status, body) = h
        .call(
            Method::PUT,
            "/api/admin/register",
            Some(json!({ "token": head, "name": "Bob" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roles"], json!(["general"]));
    let bob = body["token"].as_str().unwrap().to_string();

    // A general cannot register
    let (status, _) = h
        .call(
            Method::PUT,
            "/api/admin/register",
            Some(json!({ "token": bob, "name": "Eve" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = h
        .call(
            Method::PUT,
            "/api/admin/changename",
            Some(json!({ "token1": bob, "token2": bob, "name": "Robert" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Robert");

    let (status, body) = h
        .call(Method::GET, &format!("/api/admin/getAll?token={head}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, _) = h
        .call(Method::GET, &format!("/api/admin/getAll?token={bob}"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = h
        .call(
            Method::DELETE,
            &format!("/api/admin/delete?token1={head}&token2={bob}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h
        .call(Method::GET, &format!("/api/admin/login?token={bob}"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn point_staffing() {
    let h = Harness::new();
    let head = h.admin("Owner", vec![Role::Head], None).await;
    let sup = h.admin("Sup", vec![Role::Supervisor], None).await;

    let (status, body) = h
        .call(
            Method::PUT,
            "/api/point/new",
            Some(json!({ "token": head, "address": "1 Bean St" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let pid = body["pointId"].as_i64().unwrap();
    assert!(body.get("metadata").is_none());

    let (status, body) = h
        .call(
            Method::POST,
            "/api/point/staff",
            Some(json!({ "pid": pid, "token1": head, "token2": sup, "action": "hire" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["supervisors"].as_array().unwrap().len(), 1);

    let (_, me) = h
        .call(Method::GET, &format!("/api/admin/login?token={sup}"), None)
        .await;
    assert_eq!(me["boundTo"].as_i64(), Some(pid));

    let (status, _) = h
        .call(
            Method::POST,
            "/api/point/staff",
            Some(json!({ "pid": pid, "token1": head, "token2": sup, "action": "hire" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = h
        .call(Method::GET, &format!("/api/point/get?pid={pid}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h.call(Method::GET, "/api/point/get", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = h
        .call(
            Method::DELETE,
            &format!("/api/point/delete?pid={pid}&token={head}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, me) = h
        .call(Method::GET, &format!("/api/admin/login?token={sup}"), None)
        .await;
    assert!(me["boundTo"].is_null());
}

#[tokio::test]
async fn customer_card_flow() {
    let h = Harness::new();
    let till = h.admin("Till", vec![Role::Supervisor], Some(1)).await;
    let credentials = json!({ "email": "dana@example.com", "password": "espresso-please" });

    let (status, body) = h
        .call(
            Method::PUT,
            "/api/customer/register",
            Some(json!({
                "username": "dana",
                "email": "Dana@Example.com",
                "password": "espresso-please",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hasCard"], false);

    let (status, body) = h
        .call(Method::POST, "/api/customer/login", Some(credentials.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "dana");

    let (status, body) = h
        .call(Method::PUT, "/api/card/issue", Some(credentials.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    let number = body["id"].as_i64().unwrap();

    let (status, body) = h
        .call(
            Method::POST,
            "/api/card/accrue",
            Some(json!({ "id": number, "token": till, "amount": 40 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 40);

    let (status, body) = h
        .call(
            Method::POST,
            "/api/card/retract",
            Some(json!({ "id": number, "token": till, "toRetract": 15 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 25);

    let (status, _) = h
        .call(
            Method::POST,
            "/api/card/retract",
            Some(json!({ "id": number, "token": till, "toRetract": 100 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = h
        .call(Method::POST, "/api/card/get", Some(credentials))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], number);
    assert_eq!(body["balance"], 25);

    let (status, body) = h
        .call(Method::GET, "/api/card/verify?id=1234567890123456", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["valid"], false);
}

#[tokio::test]
async fn instance_and_catalogue() {
    let h = Harness::new();
    let head = h.admin("Owner", vec![Role::Head], None).await;

    let (status, _) = h.call(Method::GET, "/api/instance/load", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h
        .call(
            Method::PUT,
            "/api/instance/flash",
            Some(json!({
                "token": head,
                "instance": { "cultures": ["en"], "logo": "logo.png", "name": { "en": "Bean There" } },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h.call(Method::GET, "/api/instance/load", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"]["en"], "Bean There");
    assert!(body["id"].is_string());

    let (status, dish) = h
        .call(
            Method::PUT,
            "/api/dish/new",
            Some(json!({
                "token": head,
                "name": "Latte",
                "description": "Milky",
                "price": 350,
                "nutriProfile": {
                    "weight": 250,
                    "calories": 120,
                    "proteins": 6,
                    "fats": 5,
                    "carbohydrates": 10,
                },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let did = dish["dishId"].as_i64().unwrap();

    let (status, menu) = h
        .call(
            Method::PUT,
            "/api/menu/create",
            Some(json!({
                "token": head,
                "name": "Morning",
                "description": "Before noon",
                "firstDish": did,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(menu["dishes"], json!([did]));
}
