mod common;

use axum::http::StatusCode;
use common::{bot_check, TestApp};
use serde_json::json;

fn claim_body(apartment: i64, relation: &str) -> serde_json::Value {
    json!({
        "property_kind": "apartment",
        "property_id": apartment,
        "relation": relation,
        "comment": "Moved in last spring",
        "bot_check": bot_check(),
    })
}

#[tokio::test]
async fn approved_claim_grants_role_and_link() {
    let app = TestApp::new().await;
    let ((root, _), (resident, resident_id)) = app.root_and_resident().await;
    let apartment = app.seed_apartment(&root).await;

    let submitted = app.post("/api/claims", Some(&resident), claim_body(apartment, "owner")).await;
    assert_eq!(submitted.status, StatusCode::CREATED, "{}", submitted.body);
    assert_eq!(submitted.body["status"], "pending");
    assert!(submitted.body["property_label"].as_str().unwrap().contains("12"));
    let claim_id = submitted.body["id"].as_i64().unwrap();

    let duplicate = app.post("/api/claims", Some(&resident), claim_body(apartment, "owner")).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let queue = app.get("/api/admin/claims?status=pending", Some(&root)).await;
    assert_eq!(queue.status, StatusCode::OK);
    assert_eq!(queue.body["total"], 1);
    assert_eq!(queue.body["items"][0]["user_id"], resident_id);

    let forbidden = app.get("/api/admin/claims", Some(&resident)).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let approved = app
        .post(
            &format!("/api/admin/claims/{claim_id}/approve"),
            Some(&root),
            json!({ "comment": "Checked the deed" }),
        )
        .await;
    assert_eq!(approved.status, StatusCode::OK, "{}", approved.body);
    assert_eq!(approved.body["status"], "approved");
    assert_eq!(approved.body["admin_comment"], "Checked the deed");

    let me = app.get("/api/auth/me", Some(&resident)).await;
    assert_eq!(me.body["roles"], json!(["owner"]));

    let property = app.get("/api/me/property", Some(&resident)).await;
    assert_eq!(property.body.as_array().unwrap().len(), 1);
    assert_eq!(property.body[0]["property_id"], apartment);
    assert_eq!(property.body[0]["relation"], "owner");

    let again = app
        .post(&format!("/api/admin/claims/{claim_id}/approve"), Some(&root), json!({}))
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let audit = app.get("/api/admin/audit?entity=claim", Some(&root)).await;
    assert_eq!(audit.body["items"][0]["action"], "claim.approve");
}

#[tokio::test]
async fn rejection_needs_reason_and_only_author_cancels() {
    let app = TestApp::new().await;
    let ((root, _), (resident, _)) = app.root_and_resident().await;
    let (stranger, _) = app.register("oleg@example.com").await;
    let apartment = app.seed_apartment(&root).await;

    let first = app.post("/api/claims", Some(&resident), claim_body(apartment, "tenant")).await;
    let first_id = first.body["id"].as_i64().unwrap();

    let blank = app
        .post(&format!("/api/admin/claims/{first_id}/reject"), Some(&root), json!({ "reason": "  " }))
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let rejected = app
        .post(
            &format!("/api/admin/claims/{first_id}/reject"),
            Some(&root),
            json!({ "reason": "No lease on file" }),
        )
        .await;
    assert_eq!(rejected.body["status"], "rejected");
    assert_eq!(rejected.body["admin_comment"], "No lease on file");

    // A rejected claim no longer blocks a new one.
    let second = app.post("/api/claims", Some(&resident), claim_body(apartment, "tenant")).await;
    assert_eq!(second.status, StatusCode::CREATED);
    let second_id = second.body["id"].as_i64().unwrap();

    let not_author = app
        .post(&format!("/api/claims/{second_id}/cancel"), Some(&stranger), json!({}))
        .await;
    assert_eq!(not_author.status, StatusCode::FORBIDDEN);

    let cancelled = app
        .post(&format!("/api/claims/{second_id}/cancel"), Some(&resident), json!({}))
        .await;
    assert_eq!(cancelled.status, StatusCode::OK);
    assert_eq!(cancelled.body["status"], "cancelled");

    let mine = app.get("/api/claims/mine", Some(&resident)).await;
    assert_eq!(mine.body.as_array().unwrap().len(), 2);

    let me = app.get("/api/auth/me", Some(&resident)).await;
    assert_eq!(me.body["roles"], json!([]));
}

#[tokio::test]
async fn claims_on_missing_property_or_without_session_fail() {
    let app = TestApp::new().await;
    let (resident, _) = app.register("anna@example.com").await;

    let anonymous = app.post("/api/claims", None, claim_body(1, "owner")).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let missing = app.post("/api/claims", Some(&resident), claim_body(999, "owner")).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn registry_protects_claimed_units() {
    let app = TestApp::new().await;
    let ((root, _), (resident, _)) = app.root_and_resident().await;
    let apartment = app.seed_apartment(&root).await;

    let buildings = app.get("/api/buildings", None).await;
    assert_eq!(buildings.status, StatusCode::OK);
    let building_id = buildings.body[0]["id"].as_i64().unwrap();

    let tree = app.get(&format!("/api/buildings/{building_id}"), None).await;
    assert_eq!(tree.status, StatusCode::OK);
    assert_eq!(
        tree.body["entrances"][0]["floors"][0]["apartments"][0]["id"],
        apartment
    );

    let not_staff = app
        .post("/api/admin/buildings", Some(&resident), json!({ "number": "8", "title": "South" }))
        .await;
    assert_eq!(not_staff.status, StatusCode::FORBIDDEN);

    app.post("/api/claims", Some(&resident), claim_body(apartment, "owner")).await;
    let pending = app.delete(&format!("/api/admin/apartments/{apartment}"), Some(&root)).await;
    assert_eq!(pending.status, StatusCode::CONFLICT);

    let with_children = app.delete(&format!("/api/admin/buildings/{building_id}"), Some(&root)).await;
    assert_eq!(with_children.status, StatusCode::CONFLICT);

    let bad_area = app
        .put(
            &format!("/api/admin/apartments/{apartment}"),
            Some(&root),
            json!({ "number": "12", "area": -3.0 }),
        )
        .await;
    assert_eq!(bad_area.status, StatusCode::BAD_REQUEST);

    let spot_parent = app
        .post("/api/admin/parking", Some(&root), json!({ "title": "P1", "address": "Sadovaya 7" }))
        .await;
    assert_eq!(spot_parent.status, StatusCode::CREATED);
    let parking = app.get("/api/parking", None).await;
    assert_eq!(parking.body[0]["title"], "P1");
}

#[tokio::test]
async fn failed_audit_write_undoes_the_decision() {
    let app = TestApp::new().await;
    let ((root, _), (resident, resident_id)) = app.root_and_resident().await;
    let apartment = app.seed_apartment(&root).await;
    let submitted = app.post("/api/claims", Some(&resident), claim_body(apartment, "owner")).await;
    let claim_id = submitted.body["id"].as_i64().unwrap();

    app.state
        .db
        .call(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER audit_log_readonly BEFORE INSERT ON audit_log
                 BEGIN SELECT RAISE(ABORT, 'audit log is read-only'); END;",
            )?;
            Ok(())
        })
        .await
        .unwrap();

    let approved = app
        .post(&format!("/api/admin/claims/{claim_id}/approve"), Some(&root), json!({}))
        .await;
    assert!(!approved.status.is_success(), "{}", approved.body);

    let queue = app.get("/api/admin/claims?status=pending", Some(&root)).await;
    assert_eq!(queue.body["total"], 1);
    let me = app.get("/api/auth/me", Some(&resident)).await;
    assert_eq!(me.body["roles"], json!([]));
    let property = app.get("/api/me/property", Some(&resident)).await;
    assert_eq!(property.body, json!([]));

    let blocked = app
        .post(&format!("/api/admin/users/{resident_id}/block"), Some(&root), json!({}))
        .await;
    assert!(!blocked.status.is_success(), "{}", blocked.body);
    let me = app.get("/api/auth/me", Some(&resident)).await;
    assert_eq!(me.status, StatusCode::OK);
}
