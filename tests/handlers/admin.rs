//! Operator API: zones, pricing, inventory, payments, reconciliation

#[path = "../common/mod.rs"]
mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_admin_requires_api_key() {
    let fx = Fixture::new(0);
    let app = fx.app();

    let anonymous = Request::builder().uri("/admin/zones").body(Body::empty()).unwrap();
    assert_eq!(send(&app, anonymous).await.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/admin/zones")
        .header("authorization", "Bearer not-the-key")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, wrong).await.status(), StatusCode::UNAUTHORIZED);

    let ok = send(&app, admin_request("GET", "/admin/zones", None)).await;
    assert_eq!(ok.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_disabled_without_configured_key() {
    let fx = Fixture::new(0);
    let mut state = create_test_app_state(&fx.db.pool, fx.gateway.clone());
    state.admin_key_hash = None;

    let response = send(&test_app(state), admin_request("GET", "/admin/zones", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_zone_setup_flow() {
    let fx = Fixture::new(0);
    let app = fx.app();

    let response = send(
        &app,
        admin_request(
            "POST",
            "/admin/zones",
            Some(json!({"name": "Airport", "location": "Terminal 1", "router_ip": "192.168.88.1"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let zone = body_json(response).await;
    let zone_id = zone["id"].as_str().unwrap().to_string();
    assert!(zone_id.starts_with("zt_zone_"));

    let response = send(
        &app,
        admin_request(
            "POST",
            &format!("/admin/zones/{}/pricings", zone_id),
            Some(json!({"name": "2 hours", "amount": 200, "duration_hours": 2})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["is_active"], true);

    let response = send(
        &app,
        admin_request(
            "POST",
            &format!("/admin/zones/{}/tickets/import", zone_id),
            Some(json!({"tickets": [
                {"username": "air1", "password": "x1"},
                {"username": "air2", "password": "x2", "profile": "2h"},
                {"username": "air1", "password": "dup"},
                {"username": "  ", "password": "blank"}
            ]})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let imported = body_json(response).await;
    assert_eq!(imported["imported"], 2);
    assert_eq!(imported["skipped"], 1);

    let detail = body_json(send(&app, admin_request("GET", &format!("/admin/zones/{}", zone_id), None)).await).await;
    assert_eq!(detail["name"], "Airport");
    assert_eq!(detail["pricings"].as_array().unwrap().len(), 1);
    assert_eq!(detail["tickets"]["free"], 2);

    let stats = body_json(
        send(&app, admin_request("GET", &format!("/admin/zones/{}/tickets/stats", zone_id), None)).await,
    )
    .await;
    assert_eq!(stats["total"], 2);

    let zones = body_json(send(&app, admin_request("GET", "/admin/zones", None)).await).await;
    assert_eq!(zones.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_admin_validation() {
    let fx = Fixture::new(0);
    let app = fx.app();

    let response = send(&app, admin_request("POST", "/admin/zones", Some(json!({"name": " "})))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        admin_request(
            "POST",
            &format!("/admin/zones/{}/pricings", fx.zone.id),
            Some(json!({"name": "Free", "amount": 0, "duration_hours": 1})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        admin_request(
            "POST",
            "/admin/zones/zt_zone_00000000000000000000000000000000/pricings",
            Some(json!({"name": "1h", "amount": 100, "duration_hours": 1})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        admin_request(
            "POST",
            &format!("/admin/zones/{}/tickets/import", fx.zone.id),
            Some(json!({"tickets": [{"username": "", "password": ""}]})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_tickets_paginates_and_filters() {
    let fx = Fixture::new(5);
    fx.pending_payment("py_admin_sold");
    fx.deliver("payment.success", "py_admin_sold", "success").await.unwrap();
    let app = fx.app();

    let page = body_json(
        send(
            &app,
            admin_request("GET", &format!("/admin/zones/{}/tickets?limit=2&page=2", fx.zone.id), None),
        )
        .await,
    )
    .await;
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["pagination"]["total"], 5);
    assert_eq!(page["pagination"]["pages"], 3);

    let sold = body_json(
        send(
            &app,
            admin_request("GET", &format!("/admin/zones/{}/tickets?status=sold", fx.zone.id), None),
        )
        .await,
    )
    .await;
    assert_eq!(sold["pagination"]["total"], 1);
    assert_eq!(sold["items"][0]["status"], "sold");
}

#[tokio::test]
async fn test_list_zone_payments() {
    let fx = Fixture::new(1);
    fx.pending_payment("py_admin_a");
    fx.pending_payment("py_admin_b");
    fx.deliver("payment.success", "py_admin_a", "success").await.unwrap();
    let app = fx.app();

    let all = body_json(
        send(&app, admin_request("GET", &format!("/admin/zones/{}/payments", fx.zone.id), None)).await,
    )
    .await;
    assert_eq!(all["pagination"]["total"], 2);

    let completed = body_json(
        send(
            &app,
            admin_request("GET", &format!("/admin/zones/{}/payments?status=completed", fx.zone.id), None),
        )
        .await,
    )
    .await;
    assert_eq!(completed["pagination"]["total"], 1);
    assert_eq!(completed["items"][0]["external_ref"], "py_admin_a");
}

#[tokio::test]
async fn test_reconciliation_and_fulfill() {
    let fx = Fixture::new(0);
    let payment = fx.pending_payment("py_admin_flagged");
    fx.deliver("payment.success", "py_admin_flagged", "success").await.unwrap();
    let app = fx.app();

    let flagged =
        body_json(send(&app, admin_request("GET", "/admin/payments/reconciliation", None)).await).await;
    assert_eq!(flagged.as_array().unwrap().len(), 1);
    assert_eq!(flagged[0]["id"], payment.id.as_str());

    let fulfill_uri = format!("/admin/payments/{}/fulfill", payment.id);

    // Still no inventory
    let response = send(&app, admin_request("POST", &fulfill_uri, None)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    fx.import("late", 1);
    let response = send(&app, admin_request("POST", &fulfill_uri, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["payment"]["needs_reconciliation"], false);
    assert_eq!(json["tickets"][0]["username"], "late-0");

    let response = send(&app, admin_request("POST", &fulfill_uri, None)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let flagged =
        body_json(send(&app, admin_request("GET", "/admin/payments/reconciliation", None)).await).await;
    assert!(flagged.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_update_and_delete_zone() {
    let fx = Fixture::new(2);
    let app = fx.app();
    let uri = format!("/admin/zones/{}", fx.zone.id);

    let response = send(
        &app,
        admin_request("PATCH", &uri, Some(json!({"name": "Renamed", "location": null}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let zone = body_json(response).await;
    assert_eq!(zone["name"], "Renamed");
    assert!(zone["location"].is_null());
    assert_eq!(zone["router_ip"], "10.0.0.1");

    let response = send(&app, admin_request("PATCH", &uri, Some(json!({"name": ""})))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        admin_request(
            "PATCH",
            "/admin/zones/zt_zone_00000000000000000000000000000000",
            Some(json!({"name": "Ghost"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // A zone that has taken a payment stays
    fx.pending_payment("py_zone_in_use");
    let response = send(&app, admin_request("DELETE", &uri, None)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let spare = body_json(
        send(&app, admin_request("POST", "/admin/zones", Some(json!({"name": "Spare"})))).await,
    )
    .await;
    let spare_uri = format!("/admin/zones/{}", spare["id"].as_str().unwrap());
    let response = send(&app, admin_request("DELETE", &spare_uri, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(&app, admin_request("GET", &spare_uri, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_retired_pricing_cannot_be_bought() {
    let fx = Fixture::new(2);
    let pricing = create_test_pricing(&fx.conn(), &fx.zone.id, 300);
    let app = fx.app();
    let uri = format!("/admin/pricings/{}", pricing.id);

    let response = send(&app, admin_request("PATCH", &uri, Some(json!({"amount": 0})))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        admin_request("PATCH", &uri, Some(json!({"name": "3 hours", "duration_hours": 3, "is_active": false}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["duration_hours"], 3);
    assert_eq!(updated["is_active"], false);

    let public = body_json(
        send(
            &app,
            Request::builder()
                .uri(format!("/zones/{}/pricings/public", fx.zone.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await,
    )
    .await;
    assert!(public.as_array().unwrap().is_empty());

    let response = send(
        &app,
        json_request(
            "POST",
            "/payments/intent",
            json!({
                "zone_id": fx.zone.id,
                "pricing_id": pricing.id,
                "customer": {"phone": "22997000000"}
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, admin_request("DELETE", &uri, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(&app, admin_request("DELETE", &uri, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["details"], "Pricing not found");
}

#[tokio::test]
async fn test_delete_tickets_spares_sold_ones() {
    let fx = Fixture::new(3);
    let payment = fx.pending_payment("py_keep_sold");
    fx.deliver("payment.success", "py_keep_sold", "success").await.unwrap();
    let sold = fx.tickets_for(&payment.id).remove(0);
    let app = fx.app();

    let response = send(
        &app,
        admin_request("DELETE", &format!("/admin/zones/{}/tickets/{}", fx.zone.id, sold.id), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let free = body_json(
        send(
            &app,
            admin_request("GET", &format!("/admin/zones/{}/tickets?status=free", fx.zone.id), None),
        )
        .await,
    )
    .await;
    let free_id = free["items"][0]["id"].as_str().unwrap().to_string();
    let response = send(
        &app,
        admin_request("DELETE", &format!("/admin/zones/{}/tickets/{}", fx.zone.id, free_id), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        admin_request("DELETE", &format!("/admin/zones/{}/tickets/{}", fx.zone.id, free_id), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        admin_request("DELETE", &format!("/admin/zones/{}/tickets", fx.zone.id), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["deleted"], 1);

    let stats = fx.stats();
    assert_eq!((stats.total, stats.sold), (1, 1));
    assert_eq!(fx.tickets_for(&payment.id)[0].id, sold.id);
}

#[tokio::test]
async fn test_huge_page_number_returns_empty_page() {
    let fx = Fixture::new(3);
    let app = fx.app();

    for list in ["tickets", "payments"] {
        let response = send(
            &app,
            admin_request(
                "GET",
                &format!("/admin/zones/{}/{}?page=9223372036854775807&limit=200", fx.zone.id, list),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_json(response).await;
        assert!(page["items"].as_array().unwrap().is_empty());
    }
}
