use std::time::Duration;

use axum::http::Method;
use butcher_db::{NewCategory, NewProduct};
use rust_decimal::Decimal;
use serde_json::json;
use tower::ServiceExt;

use super::test_support::{
    from_client, multipart_request, request, seed_admin, seed_customer, send, test_app,
    test_app_with, test_app_with_rate_limit, token_for, FilePart, RecordingNotifier, TestApp,
    TEST_PASSWORD,
};
use super::*;

fn dec(value: &serde_json::Value) -> Decimal {
    let text = value.as_str().map_or_else(|| value.to_string(), ToOwned::to_owned);
    text.parse::<Decimal>().expect("decimal value")
}

/// Seeds one category and one product priced at $10 / 900,000 LBP.
async fn seed_product(pool: &sqlx::PgPool) -> i64 {
    let category = butcher_db::create_category(
        pool,
        &NewCategory {
            name: "Beef",
            name_ar: "لحم بقر",
            description: None,
            description_ar: None,
            image: None,
        },
    )
    .await
    .expect("insert category");

    butcher_db::create_product(
        pool,
        &NewProduct {
            category_id: category.id,
            name: "Steak",
            name_ar: "ستيك",
            description: None,
            description_ar: None,
            price_usd: Decimal::new(10, 0),
            price_lbp: Decimal::from(900_000),
            images: &[],
        },
    )
    .await
    .expect("insert product")
    .id
}

/// Polls until the background notification task has produced `count` WhatsApp messages.
async fn wait_for_whatsapp(app: &TestApp, count: usize) -> Vec<String> {
    for _ in 0..100 {
        let bodies = app.notifier.whatsapp_bodies();
        if bodies.len() >= count {
            return bodies;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    app.notifier.whatsapp_bodies()
}

async fn place_order(app: &TestApp, token: &str, product_id: i64) -> serde_json::Value {
    let (status, json) = send(
        &app.router,
        request(
            Method::POST,
            "/api/v1/orders",
            Some(token),
            Some(json!({
                "items": [{ "product_id": product_id, "quantity": 2 }],
                "delivery_applied": true,
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json
}

#[test]
fn api_error_codes_map_to_statuses() {
    let cases = [
        ("validation_error", StatusCode::BAD_REQUEST),
        ("conflict", StatusCode::CONFLICT),
        ("payload_too_large", StatusCode::PAYLOAD_TOO_LARGE),
        ("upstream_error", StatusCode::BAD_GATEWAY),
        ("something_else", StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (code, expected) in cases {
        let response = ApiError::new("req-1", code, "x").into_response();
        assert_eq!(response.status(), expected, "{code}");
    }
}

#[test]
fn double_option_distinguishes_null_from_absent() {
    #[allow(clippy::option_option)]
    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        description: Option<Option<String>>,
    }

    let absent: Patch = serde_json::from_str("{}").expect("absent");
    let null: Patch = serde_json::from_str(r#"{"description":null}"#).expect("null");
    let set: Patch = serde_json::from_str(r#"{"description":"x"}"#).expect("set");
    assert_eq!(absent.description, None);
    assert_eq!(null.description, Some(None));
    assert_eq!(set.description, Some(Some("x".to_owned())));
}

#[sqlx::test(migrations = "../../migrations")]
async fn health_reports_database_ok(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let (status, json) = send(&app.router, request(Method::GET, "/api/v1/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
    assert!(json["meta"]["request_id"].is_string());
}

#[sqlx::test(migrations = "../../migrations")]
async fn register_then_login_issues_working_tokens(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let registration = json!({
        "first_name": "Zeinab",
        "last_name": "Khalil",
        "father_name": "Hassan",
        "email": "Zeinab@Example.com",
        "mobile": "03123456",
        "password": TEST_PASSWORD,
    });

    let (status, json) = send(
        &app.router,
        request(Method::POST, "/api/v1/auth/register", None, Some(registration.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["data"]["user"]["email"], "zeinab@example.com");
    assert_eq!(json["data"]["user"]["role"], "customer");

    let (status, _) = send(
        &app.router,
        request(Method::POST, "/api/v1/auth/register", None, Some(registration)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app.router,
        request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "zeinab@example.com", "password": "wrong@pass1" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = send(
        &app.router,
        request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "zeinab@example.com", "password": TEST_PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = json["data"]["token"].as_str().expect("token").to_owned();

    let (status, json) = send(
        &app.router,
        request(Method::GET, "/api/v1/auth/me", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["first_name"], "Zeinab");
}

#[sqlx::test(migrations = "../../migrations")]
async fn weak_password_is_rejected(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let (status, json) = send(
        &app.router,
        request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "first_name": "A",
                "last_name": "B",
                "father_name": "C",
                "email": "weak@example.com",
                "mobile": "03000001",
                "password": "password",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn protected_routes_require_a_valid_token(pool: sqlx::PgPool) {
    let app = test_app(pool).await;

    let (status, _) = send(&app.router, request(Method::GET, "/api/v1/auth/me", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app.router,
        request(Method::GET, "/api/v1/orders/mine", Some("not-a-jwt"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../migrations")]
async fn customers_cannot_reach_admin_routes(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let customer = seed_customer(&app.state.pool, "c@example.com", "03111111").await;
    let token = token_for(&app.state, &customer);

    let (status, json) = send(
        &app.router,
        request(Method::GET, "/api/v1/orders", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["message"], "admin access required");
}

#[sqlx::test(migrations = "../../migrations")]
async fn banned_customer_is_locked_out(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let admin = seed_admin(&app.state.pool).await;
    let customer = seed_customer(&app.state.pool, "c@example.com", "03111111").await;
    let admin_token = token_for(&app.state, &admin);
    let customer_token = token_for(&app.state, &customer);

    let (status, json) = send(
        &app.router,
        request(
            Method::PUT,
            &format!("/api/v1/users/{}/ban", customer.id),
            Some(&admin_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["is_banned"], true);

    let (status, _) = send(
        &app.router,
        request(Method::GET, "/api/v1/auth/me", Some(&customer_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app.router,
        request(
            Method::PUT,
            &format!("/api/v1/users/{}/ban", admin.id),
            Some(&admin_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../migrations")]
async fn admin_manages_catalog_and_meat_types(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let admin = seed_admin(&app.state.pool).await;
    let token = token_for(&app.state, &admin);

    let (status, json) = send(
        &app.router,
        request(
            Method::POST,
            "/api/v1/categories",
            Some(&token),
            Some(json!({ "name": "Lamb", "name_ar": "غنم" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    let category_id = json["data"]["id"].as_i64().expect("category id");

    let (status, json) = send(
        &app.router,
        request(
            Method::POST,
            "/api/v1/products",
            Some(&token),
            Some(json!({
                "category_id": category_id,
                "name": "Minced meat",
                "name_ar": "لحمة مفرومة",
                "price_usd": "12",
                "price_lbp": "1080000",
                "images": ["http://localhost:5001/uploads/a.jpg"],
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    let product_id = json["data"]["id"].as_i64().expect("product id");
    assert_eq!(json["data"]["category"]["name"], "Lamb");

    for (index, name) in ["Lamb", "Veal", "Mixed"].iter().enumerate() {
        let (status, json) = send(
            &app.router,
            request(
                Method::POST,
                "/api/v1/meat-types",
                Some(&token),
                Some(json!({
                    "product_id": product_id,
                    "name": name,
                    "name_ar": name,
                    "price_usd": 12 + index,
                    "price_lbp": 1_080_000,
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
    }

    let (status, json) = send(
        &app.router,
        request(
            Method::POST,
            "/api/v1/meat-types",
            Some(&token),
            Some(json!({
                "product_id": product_id,
                "name": "Goat",
                "name_ar": "ماعز",
                "price_usd": 14,
                "price_lbp": 1_260_000,
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"]
        .as_str()
        .expect("message")
        .contains("at most 3"));

    let (status, json) = send(
        &app.router,
        request(
            Method::GET,
            &format!("/api/v1/products?category={category_id}"),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let products = json["data"].as_array().expect("products");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["meat_types"].as_array().map(Vec::len), Some(3));

    let (status, json) = send(
        &app.router,
        request(
            Method::PATCH,
            &format!("/api/v1/products/{product_id}/toggle-availability"),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["is_available"], false);

    let (status, _) = send(
        &app.router,
        request(
            Method::DELETE,
            &format!("/api/v1/products/{product_id}"),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app.router,
        request(
            Method::GET,
            &format!("/api/v1/products/{product_id}"),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn quote_prices_each_request_kind(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let product_id = seed_product(&app.state.pool).await;

    let (status, json) = send(
        &app.router,
        request(
            Method::POST,
            "/api/v1/orders/quote",
            None,
            Some(json!({
                "items": [
                    { "product_id": product_id, "quantity": "1.5" },
                    { "product_id": product_id, "amount_usd": 5 },
                    { "product_id": product_id, "amount_lbp": 445000 },
                ],
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");

    let items = json["data"]["items"].as_array().expect("items");
    assert_eq!(dec(&items[0]["amount_usd"]), Decimal::from(15));
    assert_eq!(dec(&items[0]["amount_lbp"]), Decimal::from(1_350_000));
    assert_eq!(dec(&items[0]["quantity"]), Decimal::new(15, 1));
    assert_eq!(dec(&items[1]["amount_lbp"]), Decimal::from(450_000));
    assert!(items[1]["quantity"].is_null());
    assert_eq!(dec(&items[2]["amount_usd"]), Decimal::from(5));

    assert_eq!(dec(&json["data"]["total_usd"]), Decimal::from(25));
    assert_eq!(dec(&json["data"]["total_lbp"]), Decimal::from(2_245_000));
    assert_eq!(json["data"]["delivery_applied"], false);
}

#[sqlx::test(migrations = "../../migrations")]
async fn quote_rejects_amounts_below_minimum(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let product_id = seed_product(&app.state.pool).await;

    let (status, json) = send(
        &app.router,
        request(
            Method::POST,
            "/api/v1/orders/quote",
            None,
            Some(json!({ "items": [{ "product_id": product_id, "amount_lbp": 100000 }] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = json["error"]["message"].as_str().expect("message");
    assert!(message.starts_with("item 1:"), "{message}");
}

#[sqlx::test(migrations = "../../migrations")]
async fn product_order_is_priced_on_the_server(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let product_id = seed_product(&app.state.pool).await;
    let customer = seed_customer(&app.state.pool, "c@example.com", "03111111").await;
    let token = token_for(&app.state, &customer);

    let json = place_order(&app, &token, product_id).await;
    let order = &json["data"];

    // 2 x $10 + 100,000 LBP delivery at 89,000 LBP/USD = $21.12, rounded down.
    assert_eq!(dec(&order["total_usd"]), Decimal::from(21));
    assert_eq!(dec(&order["total_lbp"]), Decimal::from(1_900_000));
    assert_eq!(order["status"], "pending");
    assert_eq!(order["order_type"], "product");
    assert_eq!(order["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(order["items"][0]["product_name"], "Steak");

    let (status, json) = send(
        &app.router,
        request(Method::GET, "/api/v1/orders/mine", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(1));
}

#[sqlx::test(migrations = "../../migrations")]
async fn product_order_needs_items_and_available_products(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let product_id = seed_product(&app.state.pool).await;
    let customer = seed_customer(&app.state.pool, "c@example.com", "03111111").await;
    let token = token_for(&app.state, &customer);

    let (status, _) = send(
        &app.router,
        request(Method::POST, "/api/v1/orders", Some(&token), Some(json!({ "items": [] }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    butcher_db::toggle_product_availability(&app.state.pool, product_id)
        .await
        .expect("toggle");
    let (status, json) = send(
        &app.router,
        request(
            Method::POST,
            "/api/v1/orders",
            Some(&token),
            Some(json!({ "items": [{ "product_id": product_id, "quantity": 1 }] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"]
        .as_str()
        .expect("message")
        .contains("not available"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn custom_order_totals_are_the_delivery_fee(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let customer = seed_customer(&app.state.pool, "c@example.com", "03111111").await;
    let token = token_for(&app.state, &customer);

    let (status, _) = send(
        &app.router,
        request(
            Method::POST,
            "/api/v1/orders",
            Some(&token),
            Some(json!({ "order_type": "custom", "custom_message": "   " })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app.router,
        request(
            Method::POST,
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "order_type": "custom",
                "custom_message": "2kg lamb shoulder, cubed",
                "delivery_applied": true,
                "delivery_info": { "address": "Hamra street", "phone": "03111111" },
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    let order = &json["data"];
    assert_eq!(order["order_type"], "custom");
    assert_eq!(dec(&order["total_lbp"]), Decimal::from(100_000));
    assert_eq!(dec(&order["total_usd"]), Decimal::from(1));
    assert_eq!(order["delivery_info"]["address"], "Hamra street");
    assert_eq!(order["items"].as_array().map(Vec::len), Some(0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn order_is_visible_only_to_owner_and_admin(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let product_id = seed_product(&app.state.pool).await;
    let owner = seed_customer(&app.state.pool, "owner@example.com", "03111111").await;
    let other = seed_customer(&app.state.pool, "other@example.com", "03222222").await;
    let admin = seed_admin(&app.state.pool).await;

    let json = place_order(&app, &token_for(&app.state, &owner), product_id).await;
    let uri = format!("/api/v1/orders/{}", json["data"]["id"]);

    let (status, _) = send(
        &app.router,
        request(Method::GET, &uri, Some(&token_for(&app.state, &other)), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app.router,
        request(Method::GET, &uri, Some(&token_for(&app.state, &admin)), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app.router,
        request(
            Method::GET,
            "/api/v1/orders/999999",
            Some(&token_for(&app.state, &owner)),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn confirming_an_order_notifies_the_customer_once(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let product_id = seed_product(&app.state.pool).await;
    let customer = seed_customer(&app.state.pool, "c@example.com", "03111111").await;
    let admin_token = token_for(&app.state, &seed_admin(&app.state.pool).await);

    let json = place_order(&app, &token_for(&app.state, &customer), product_id).await;
    let order_id = json["data"]["id"].as_i64().expect("order id");
    let status_uri = format!("/api/v1/orders/{order_id}/status");

    let (status, json) = send(
        &app.router,
        request(
            Method::PUT,
            &status_uri,
            Some(&admin_token),
            Some(json!({ "status": "confirmed", "notes": "cut thin" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["status"], "confirmed");
    assert_eq!(json["data"]["notes"], "cut thin");

    let bodies = wait_for_whatsapp(&app, 1).await;
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains(&format!("#{order_id}")));
    assert_eq!(
        app.notifier.email_subjects(),
        vec!["Order Confirmation - Butcher Shop".to_owned()]
    );

    // Re-applying the same status only edits fields and sends nothing.
    let (status, json) = send(
        &app.router,
        request(
            Method::PUT,
            &status_uri,
            Some(&admin_token),
            Some(json!({ "status": "confirmed", "is_delivery_assigned": true })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["is_delivery_assigned"], true);

    let (status, _) = send(
        &app.router,
        request(
            Method::PUT,
            &status_uri,
            Some(&admin_token),
            Some(json!({ "status": "ready" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let bodies = wait_for_whatsapp(&app, 2).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(app.notifier.email_subjects().len(), 1);

    let stored = butcher_db::get_order(&app.state.pool, order_id)
        .await
        .expect("query")
        .expect("order");
    assert!(stored.is_email_sent);
    assert!(stored.is_whatsapp_sent);
}

#[sqlx::test(migrations = "../../migrations")]
async fn invalid_transitions_and_statuses_are_rejected(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let product_id = seed_product(&app.state.pool).await;
    let customer = seed_customer(&app.state.pool, "c@example.com", "03111111").await;
    let admin_token = token_for(&app.state, &seed_admin(&app.state.pool).await);

    let json = place_order(&app, &token_for(&app.state, &customer), product_id).await;
    let status_uri = format!("/api/v1/orders/{}/status", json["data"]["id"]);

    let (status, json) = send(
        &app.router,
        request(
            Method::PUT,
            &status_uri,
            Some(&admin_token),
            Some(json!({ "status": "completed" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"]
        .as_str()
        .expect("message")
        .contains("from pending to completed"));

    let (status, _) = send(
        &app.router,
        request(
            Method::PUT,
            &status_uri,
            Some(&admin_token),
            Some(json!({ "status": "shipped" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        request(Method::GET, "/api/v1/orders?status=shipped", Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
async fn notification_failures_do_not_fail_the_update(pool: sqlx::PgPool) {
    let app = test_app_with(pool, RecordingNotifier::failing()).await;
    let product_id = seed_product(&app.state.pool).await;
    let customer = seed_customer(&app.state.pool, "c@example.com", "03111111").await;
    let admin_token = token_for(&app.state, &seed_admin(&app.state.pool).await);

    let json = place_order(&app, &token_for(&app.state, &customer), product_id).await;
    let order_id = json["data"]["id"].as_i64().expect("order id");

    let (status, json) = send(
        &app.router,
        request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(&admin_token),
            Some(json!({ "status": "confirmed" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "confirmed");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let stored = butcher_db::get_order(&app.state.pool, order_id)
        .await
        .expect("query")
        .expect("order");
    assert!(!stored.is_email_sent);
    assert!(!stored.is_whatsapp_sent);
}

#[sqlx::test(migrations = "../../migrations")]
async fn only_rejected_orders_can_be_deleted(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let product_id = seed_product(&app.state.pool).await;
    let customer = seed_customer(&app.state.pool, "c@example.com", "03111111").await;
    let admin_token = token_for(&app.state, &seed_admin(&app.state.pool).await);

    let json = place_order(&app, &token_for(&app.state, &customer), product_id).await;
    let order_id = json["data"]["id"].as_i64().expect("order id");
    let order_uri = format!("/api/v1/orders/{order_id}");

    let (status, json) = send(
        &app.router,
        request(Method::GET, "/api/v1/orders/pending-count", Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["count"], 1);

    let (status, _) = send(
        &app.router,
        request(Method::DELETE, &order_uri, Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app.router,
        request(
            Method::PUT,
            &format!("{order_uri}/status"),
            Some(&admin_token),
            Some(json!({ "status": "rejected", "rejection_reason": "out of stock" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["rejection_reason"], "out of stock");

    let (status, _) = send(
        &app.router,
        request(Method::DELETE, &order_uri, Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app.router,
        request(Method::DELETE, &order_uri, Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn admin_updates_settings(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let admin_token = token_for(&app.state, &seed_admin(&app.state.pool).await);

    let (status, json) = send(
        &app.router,
        request(
            Method::PUT,
            "/api/v1/settings/exchange-rates",
            Some(&admin_token),
            Some(json!({ "usd_to_lbp": 89500, "lbp_to_usd": 89000 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(dec(&json["data"]["usd_to_lbp"]), Decimal::from(89_500));

    let (status, _) = send(
        &app.router,
        request(
            Method::PUT,
            "/api/v1/settings/exchange-rates",
            Some(&admin_token),
            Some(json!({ "usd_to_lbp": 0, "lbp_to_usd": 89000 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app.router,
        request(
            Method::PUT,
            "/api/v1/settings/delivery-fee",
            Some(&admin_token),
            Some(json!({ "delivery_fee_lbp": 150000 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dec(&json["data"]["delivery_fee_lbp"]), Decimal::from(150_000));

    let (status, json) = send(&app.router, request(Method::GET, "/api/v1/settings", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dec(&json["data"]["delivery_fee_lbp"]), Decimal::from(150_000));
}

fn png(field: &'static str, bytes: Vec<u8>) -> FilePart<'static> {
    FilePart {
        field,
        filename: "cut.png",
        content_type: "image/png",
        bytes,
    }
}

fn stored_upload_count(app: &TestApp) -> usize {
    std::fs::read_dir(&app.state.uploads.dir).map_or(0, Iterator::count)
}

#[sqlx::test(migrations = "../../migrations")]
async fn auth_rate_limit_is_tracked_per_client(pool: sqlx::PgPool) {
    let app = test_app_with_rate_limit(pool, 2).await;
    let login = || {
        request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "wrong@pass1" })),
        )
    };

    for _ in 0..2 {
        let (status, _) = send(&app.router, from_client(login(), [10, 0, 0, 1])).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, json) = send(&app.router, from_client(login(), [10, 0, 0, 1])).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "rate_limited");

    let (status, _) = send(&app.router, from_client(login(), [10, 0, 0, 2])).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../migrations")]
async fn admins_cannot_be_banned(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let admin = seed_admin(&app.state.pool).await;
    let token = token_for(&app.state, &admin);

    let (status, json) = send(
        &app.router,
        request(
            Method::PUT,
            &format!("/api/v1/users/{}/ban", admin.id),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "forbidden");

    let reloaded = butcher_db::get_user_by_id(&app.state.pool, admin.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!reloaded.is_banned);
}

#[sqlx::test(migrations = "../../migrations")]
async fn uploaded_image_is_stored_and_served(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let admin = seed_admin(&app.state.pool).await;
    let token = token_for(&app.state, &admin);

    let (status, json) = send(
        &app.router,
        multipart_request(
            "/api/v1/uploads/image",
            &token,
            &[png("image", b"not-really-a-png".to_vec())],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    let filename = json["data"]["filename"].as_str().expect("filename").to_owned();
    assert!(filename.ends_with(".png"));
    assert_eq!(json["data"]["size"], 16);
    assert_eq!(
        json["data"]["url"],
        format!("http://localhost:5001/uploads/{filename}")
    );

    let served = app
        .router
        .clone()
        .oneshot(request(Method::GET, &format!("/uploads/{filename}"), None, None))
        .await
        .expect("response");
    assert_eq!(served.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../migrations")]
async fn upload_rejects_other_content_types(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let admin = seed_admin(&app.state.pool).await;
    let token = token_for(&app.state, &admin);

    let (status, json) = send(
        &app.router,
        multipart_request(
            "/api/v1/uploads/image",
            &token,
            &[FilePart {
                field: "image",
                filename: "menu.pdf",
                content_type: "application/pdf",
                bytes: b"%PDF-1.4".to_vec(),
            }],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
    assert_eq!(stored_upload_count(&app), 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn upload_enforces_the_per_image_size_limit(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let admin = seed_admin(&app.state.pool).await;
    let token = token_for(&app.state, &admin);
    let oversized = vec![0_u8; app.state.uploads.max_bytes + 1];

    let (status, json) = send(
        &app.router,
        multipart_request("/api/v1/uploads/image", &token, &[png("image", oversized)]),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["error"]["code"], "payload_too_large");
    assert_eq!(stored_upload_count(&app), 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn sixth_image_is_refused_and_earlier_files_removed(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let admin = seed_admin(&app.state.pool).await;
    let token = token_for(&app.state, &admin);

    let (status, json) = send(
        &app.router,
        multipart_request(
            "/api/v1/uploads/images",
            &token,
            &[png("images", vec![1; 8]), png("images", vec![2; 8])],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(stored_upload_count(&app), 2);

    let six: Vec<FilePart<'static>> = (0..6).map(|n| png("images", vec![n; 8])).collect();
    let (status, json) = send(
        &app.router,
        multipart_request("/api/v1/uploads/images", &token, &six),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        json["error"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("at most 5")),
        "{json}"
    );
    assert_eq!(stored_upload_count(&app), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn replacing_product_images_deletes_dropped_uploads(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let admin = seed_admin(&app.state.pool).await;
    let token = token_for(&app.state, &admin);
    let product_id = seed_product(&app.state.pool).await;

    let (status, json) = send(
        &app.router,
        multipart_request(
            "/api/v1/uploads/images",
            &token,
            &[png("images", vec![1; 8]), png("images", vec![2; 8])],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    let urls: Vec<String> = json["data"]
        .as_array()
        .expect("uploaded images")
        .iter()
        .map(|image| image["url"].as_str().expect("url").to_owned())
        .collect();

    for images in [json!(urls), json!([urls[1]])] {
        let (status, json) = send(
            &app.router,
            request(
                Method::PUT,
                &format!("/api/v1/products/{product_id}"),
                Some(&token),
                Some(json!({ "images": images })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{json}");
    }

    let first = urls[0].rsplit('/').next().expect("file name");
    let second = urls[1].rsplit('/').next().expect("file name");
    assert!(!app.state.uploads.dir.join(first).exists());
    assert!(app.state.uploads.dir.join(second).exists());
}

#[sqlx::test(migrations = "../../migrations")]
async fn whatsapp_test_message_goes_through_the_notifier(pool: sqlx::PgPool) {
    let app = test_app(pool).await;
    let admin = seed_admin(&app.state.pool).await;
    let customer = seed_customer(&app.state.pool, "c@example.com", "03111111").await;
    let admin_token = token_for(&app.state, &admin);
    let customer_token = token_for(&app.state, &customer);
    let body = json!({ "phone_number": "03111111", "message": "Twilio setup check" });

    let (status, json) = send(
        &app.router,
        request(Method::POST, "/api/v1/whatsapp/test", Some(&admin_token), Some(body.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["delivery"], "logged");
    assert_eq!(app.notifier.whatsapp_bodies(), vec!["Twilio setup check".to_owned()]);

    let (status, _) = send(
        &app.router,
        request(
            Method::POST,
            "/api/v1/whatsapp/test",
            Some(&admin_token),
            Some(json!({ "phone_number": "03111111", "message": "  " })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        request(Method::POST, "/api/v1/whatsapp/test", Some(&customer_token), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../migrations")]
async fn whatsapp_test_message_reports_provider_failure(pool: sqlx::PgPool) {
    let app = test_app_with(pool, RecordingNotifier::failing()).await;
    let admin = seed_admin(&app.state.pool).await;
    let token = token_for(&app.state, &admin);

    let (status, json) = send(
        &app.router,
        request(
            Method::POST,
            "/api/v1/whatsapp/test",
            Some(&token),
            Some(json!({ "phone_number": "03111111", "message": "hello" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"], "upstream_error");
}
