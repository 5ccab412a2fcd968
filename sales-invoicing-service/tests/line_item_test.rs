//! Service line item integration tests for sales-invoicing-service.

mod common;

use axum::http::StatusCode;
use common::{dec, id_of, money, TestApp};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_line_item_amounts() {
    let app = TestApp::spawn();
    let (invoice, _) = app.scenario_a_invoice(None).await;

    let line = &invoice["services"][0];
    assert_eq!(line["service_name"], "Onboarding");
    assert_eq!(line["quantity"], 2);
    assert_eq!(money(&line["price_per_unit"]), dec("100"));
    assert_eq!(money(&line["total_price"]), dec("180"));
}

#[tokio::test]
async fn test_zero_quantity_rejected_and_lines_unchanged() {
    let app = TestApp::spawn();
    let (invoice, _) = app.scenario_a_invoice(None).await;
    let invoice_id = id_of(&invoice, "invoice_id");
    let service = app.seed_service("Training", "40").await;

    let (status, body) = app.add_line(&invoice_id, service, 0, "0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("quantity"));

    let (_, current) = app.get(&format!("/invoices/{}", invoice_id)).await;
    assert_eq!(current["services"].as_array().unwrap().len(), 1);
    assert_eq!(money(&current["final_total"]), dec("184.68"));
}

#[tokio::test]
async fn test_negative_quantity_rejected() {
    let app = TestApp::spawn();
    let (invoice, _) = app.scenario_a_invoice(None).await;
    let invoice_id = id_of(&invoice, "invoice_id");
    let service = app.seed_service("Training", "40").await;

    let (status, _) = app.add_line(&invoice_id, service, -3, "0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_line_discount_outside_unit_interval_rejected() {
    let app = TestApp::spawn();
    let (invoice, _) = app.scenario_a_invoice(None).await;
    let invoice_id = id_of(&invoice, "invoice_id");
    let service = app.seed_service("Training", "40").await;

    let (status, _) = app.add_line(&invoice_id, service, 1, "1.2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_catalog_service_rejected() {
    let app = TestApp::spawn();
    let (invoice, _) = app.scenario_a_invoice(None).await;
    let invoice_id = id_of(&invoice, "invoice_id");

    let (status, _) = app.add_line(&invoice_id, Uuid::new_v4(), 1, "0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_lines_accumulate_in_any_order() {
    let app = TestApp::spawn();
    let rep = app.seed_rep("0").await;
    let a = app.seed_service("A", "12.50").await;
    let b = app.seed_service("B", "80").await;

    let first = app.create_invoice(rep, "0.1", "0", None).await;
    let first_id = id_of(&first, "invoice_id");
    app.add_line(&first_id, a, 4, "0").await;
    let (_, first_body) = app.add_line(&first_id, b, 1, "0.25").await;

    let second = app.create_invoice(rep, "0.1", "0", None).await;
    let second_id = id_of(&second, "invoice_id");
    app.add_line(&second_id, b, 1, "0.25").await;
    let (_, second_body) = app.add_line(&second_id, a, 4, "0").await;

    // 50 + 60 = 110, plus 10% tax
    assert_eq!(money(&first_body["invoice"]["final_total"]), dec("121"));
    for field in ["service_total", "service_discount_total", "tax_amount", "final_total"] {
        assert_eq!(
            money(&first_body["invoice"]["totals"][field]),
            money(&second_body["invoice"]["totals"][field])
        );
    }
}

#[tokio::test]
async fn test_update_line_item_recomputes_invoice() {
    let app = TestApp::spawn();
    let (invoice, _) = app.scenario_a_invoice(None).await;
    let invoice_id = id_of(&invoice, "invoice_id");
    let line_id = id_of(&invoice["services"][0], "invoice_service_id");

    let (status, body) = app
        .put(
            &format!("/invoices/{}/services/{}", invoice_id, line_id),
            app.with_actor(json!({ "quantity": 1, "discount_percent": "0" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(money(&body["service"]["total_price"]), dec("100"));
    // 100 - 5% = 95, + 8% tax = 102.60
    assert_eq!(money(&body["invoice"]["final_total"]), dec("102.60"));
}

#[tokio::test]
async fn test_update_line_item_rejects_zero_quantity() {
    let app = TestApp::spawn();
    let (invoice, _) = app.scenario_a_invoice(None).await;
    let invoice_id = id_of(&invoice, "invoice_id");
    let line_id = id_of(&invoice["services"][0], "invoice_service_id");

    let (status, _) = app
        .put(
            &format!("/invoices/{}/services/{}", invoice_id, line_id),
            app.with_actor(json!({ "quantity": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, current) = app.get(&format!("/invoices/{}", invoice_id)).await;
    assert_eq!(current["services"][0]["quantity"], 2);
}

#[tokio::test]
async fn test_delete_line_item() {
    let app = TestApp::spawn();
    let (invoice, _) = app.scenario_a_invoice(None).await;
    let invoice_id = id_of(&invoice, "invoice_id");
    let line_id = id_of(&invoice["services"][0], "invoice_service_id");

    let (status, body) = app
        .delete(&format!("/invoices/{}/services/{}", invoice_id, line_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["services"].as_array().unwrap().is_empty());
    assert_eq!(money(&body["final_total"]), dec("0"));

    let actions = app.audit.actions_for(line_id.parse().unwrap());
    assert_eq!(actions, vec!["create".to_string(), "delete".to_string()]);
}

#[tokio::test]
async fn test_line_from_another_invoice_not_found() {
    let app = TestApp::spawn();
    let (invoice, rep) = app.scenario_a_invoice(None).await;
    let line_id = id_of(&invoice["services"][0], "invoice_service_id");
    let other = app.create_invoice(rep, "0", "0", None).await;

    let (status, _) = app
        .delete(&format!(
            "/invoices/{}/services/{}",
            id_of(&other, "invoice_id"),
            line_id
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_line_price_is_snapshot_of_catalog() {
    let app = TestApp::spawn();
    let rep = app.seed_rep("0").await;
    let service = app.seed_service("Consulting", "100").await;
    let invoice = app.create_invoice(rep, "0", "0", None).await;
    let invoice_id = id_of(&invoice, "invoice_id");
    app.add_line(&invoice_id, service, 1, "0").await;

    let (status, _) = app
        .put(
            &format!("/catalog/services/{}", service),
            json!({ "service_name": "Consulting", "price_per_unit": "250" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, current) = app.get(&format!("/invoices/{}", invoice_id)).await;
    assert_eq!(money(&current["services"][0]["price_per_unit"]), dec("100"));
    assert_eq!(money(&current["final_total"]), dec("100"));
}

#[tokio::test]
async fn test_negative_catalog_price_rejected() {
    let app = TestApp::spawn();
    let (status, _) = app
        .put(
            &format!("/catalog/services/{}", Uuid::new_v4()),
            json!({ "service_name": "Refund", "price_per_unit": "-5" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_line_overflowing_gross_is_rejected_and_not_stored() {
    let app = TestApp::spawn();
    let rep = app.seed_rep("0.1").await;
    let service = app
        .seed_service("Enterprise", "79228162514264337593543950335")
        .await;
    let invoice = app.create_invoice(rep, "0", "0", None).await;
    let invoice_id = id_of(&invoice, "invoice_id");

    let (status, body) = app.add_line(&invoice_id, service, 2, "0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("line gross"));

    let (status, current) = app.get(&format!("/invoices/{}", invoice_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(current["services"].as_array().unwrap().is_empty());
    assert_eq!(money(&current["final_total"]), dec("0"));
}

#[tokio::test]
async fn test_line_overflowing_invoice_total_is_rejected_and_not_stored() {
    let app = TestApp::spawn();
    let rep = app.seed_rep("0").await;
    let service = app
        .seed_service("Enterprise", "40000000000000000000000000000")
        .await;
    let invoice = app.create_invoice(rep, "0", "0", None).await;
    let invoice_id = id_of(&invoice, "invoice_id");

    let (status, _) = app.add_line(&invoice_id, service, 1, "0").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.add_line(&invoice_id, service, 1, "0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("service_total"));

    let (status, current) = app.get(&format!("/invoices/{}", invoice_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["services"].as_array().unwrap().len(), 1);
    assert_eq!(
        money(&current["final_total"]),
        dec("40000000000000000000000000000")
    );
}

#[tokio::test]
async fn test_fine_grained_discount_kept_at_full_precision() {
    let app = TestApp::spawn();
    let rep = app.seed_rep("0").await;
    let service = app.seed_service("Analytics", "1000").await;
    let invoice = app.create_invoice(rep, "0", "0", None).await;
    let invoice_id = id_of(&invoice, "invoice_id");

    let (status, body) = app.add_line(&invoice_id, service, 1, "0.1234567").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(money(&body["service"]["discount_percent"]), dec("0.1234567"));
    assert_eq!(money(&body["service"]["total_price"]), dec("876.54"));
    assert_eq!(
        money(&body["invoice"]["totals"]["service_discount_total"]),
        dec("123.46")
    );
}
