mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{Duration, Utc};
use common::TestApp;
use serde_json::{json, Value};

fn doc(text: &str) -> Value {
    json!({
        "type": "doc",
        "content": [{ "type": "paragraph", "content": [{ "type": "text", "text": text }] }]
    })
}

#[tokio::test]
async fn drafts_stay_private_until_published() {
    let app = TestApp::new().await;
    let (root, _) = app.register("root@example.com").await;

    let created = app
        .post(
            "/api/admin/publications",
            Some(&root),
            json!({ "kind": "news", "title": "Spring cleanup", "content": doc("Bring gloves to the yard.") }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    assert_eq!(created.body["slug"], "spring-cleanup");
    assert_eq!(created.body["status"], "draft");
    assert_eq!(created.body["excerpt"], "Bring gloves to the yard.");
    let id = created.body["id"].as_i64().unwrap();

    let public = app.get("/api/news", None).await;
    assert_eq!(public.body["total"], 0);
    assert_eq!(app.get("/api/publications/spring-cleanup", None).await.status, StatusCode::NOT_FOUND);

    let published = app
        .post(&format!("/api/admin/publications/{id}/status"), Some(&root), json!({ "status": "published" }))
        .await;
    assert_eq!(published.status, StatusCode::OK);
    assert!(published.body["published_at"].is_string());

    let public = app.get("/api/news?q=GLOVES", None).await;
    assert_eq!(public.body["total"], 1);
    let single = app.get("/api/publications/spring-cleanup", None).await;
    assert_eq!(single.body["title"], "Spring cleanup");

    let second = app
        .post(
            "/api/admin/publications",
            Some(&root),
            json!({ "kind": "announcement", "title": "Spring cleanup!", "content": "Plain text body" }),
        )
        .await;
    assert_eq!(second.body["slug"], "spring-cleanup-2");

    let archived = app
        .post(&format!("/api/admin/publications/{id}/status"), Some(&root), json!({ "status": "archived" }))
        .await;
    assert_eq!(archived.status, StatusCode::OK);
    let republish = app
        .post(&format!("/api/admin/publications/{id}/status"), Some(&root), json!({ "status": "published" }))
        .await;
    assert_eq!(republish.status, StatusCode::BAD_REQUEST);

    let renamed = app
        .put(
            &format!("/api/admin/publications/{id}"),
            Some(&root),
            json!({ "kind": "news", "title": "Autumn cleanup", "content": doc("Rakes provided.") }),
        )
        .await;
    assert_eq!(renamed.body["slug"], "spring-cleanup");
    assert_eq!(renamed.body["title"], "Autumn cleanup");

    let deleted = app.delete(&format!("/api/admin/publications/{id}"), Some(&root)).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    let all = app.get("/api/admin/publications", Some(&root)).await;
    assert_eq!(all.body["total"], 1);
}

#[tokio::test]
async fn events_are_validated_and_exported() {
    let app = TestApp::new().await;
    let (root, _) = app.register("root@example.com").await;

    let no_start = app
        .post("/api/admin/publications", Some(&root), json!({ "kind": "event", "title": "Meeting" }))
        .await;
    assert_eq!(no_start.status, StatusCode::BAD_REQUEST);

    let start = Utc::now() + Duration::days(3);
    let backwards = app
        .post(
            "/api/admin/publications",
            Some(&root),
            json!({
                "kind": "event",
                "title": "Meeting",
                "event_start": start,
                "event_end": start - Duration::hours(1),
            }),
        )
        .await;
    assert_eq!(backwards.status, StatusCode::BAD_REQUEST);

    let created = app
        .post(
            "/api/admin/publications",
            Some(&root),
            json!({
                "kind": "event",
                "title": "Residents meeting",
                "content": doc("Agenda: parking, lifts"),
                "event_start": start,
                "event_end": start + Duration::hours(2),
                "event_location": "Lobby, building 7",
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let id = created.body["id"].as_i64().unwrap();
    app.post(&format!("/api/admin/publications/{id}/status"), Some(&root), json!({ "status": "published" }))
        .await;

    let upcoming = app.get("/api/events/upcoming?limit=5", None).await;
    assert_eq!(upcoming.status, StatusCode::OK);
    assert_eq!(upcoming.body[0]["slug"], "residents-meeting");
    assert_eq!(upcoming.body[0]["calendar_url"], "/api/events/residents-meeting/calendar.ics");
    assert!(upcoming.body[0]["google_calendar_url"]
        .as_str()
        .unwrap()
        .starts_with("https://calendar.google.com/"));

    let response = app
        .send(
            Request::builder()
                .uri("/api/events/residents-meeting/calendar.ics")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/calendar"));
    let ics = common::reply(response).await.body;
    let ics = ics.as_str().unwrap();
    assert!(ics.starts_with("BEGIN:VCALENDAR"));
    assert!(ics.contains("SUMMARY:Residents meeting"));
    assert!(ics.contains("LOCATION:Lobby\\, building 7"));
}

#[tokio::test]
async fn editors_publish_but_cannot_manage_users() {
    let app = TestApp::new().await;
    let ((root, _), (editor, editor_id)) = app.root_and_resident().await;
    app.put(&format!("/api/admin/users/{editor_id}/roles"), Some(&root), json!({ "roles": ["editor"] }))
        .await;

    let created = app
        .post("/api/admin/publications", Some(&editor), json!({ "kind": "news", "title": "Lift repair" }))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);

    let settings = app.get("/api/admin/settings", Some(&editor)).await;
    assert_eq!(settings.status, StatusCode::FORBIDDEN);
    assert_eq!(settings.body["error"], "forbidden");

    let bad_cover = app
        .post(
            "/api/admin/publications",
            Some(&editor),
            json!({ "kind": "news", "title": "With cover", "cover_media_id": 42 }),
        )
        .await;
    assert_eq!(bad_cover.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_is_case_insensitive_for_cyrillic_titles() {
    let app = TestApp::new().await;
    let (root, _) = app.register("root@example.com").await;

    let created = app
        .post(
            "/api/admin/publications",
            Some(&root),
            json!({ "kind": "news", "title": "Отключение воды", "content": doc("Плановые работы в подвале.") }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let id = created.body["id"].as_i64().unwrap();
    app.post(&format!("/api/admin/publications/{id}/status"), Some(&root), json!({ "status": "published" }))
        .await;

    // "отключение", "Отключение", "ВОДЫ"
    for q in [
        "%D0%BE%D1%82%D0%BA%D0%BB%D1%8E%D1%87%D0%B5%D0%BD%D0%B8%D0%B5",
        "%D0%9E%D1%82%D0%BA%D0%BB%D1%8E%D1%87%D0%B5%D0%BD%D0%B8%D0%B5",
        "%D0%92%D0%9E%D0%94%D0%AB",
    ] {
        let found = app.get(&format!("/api/publications?q={q}"), None).await;
        assert_eq!(found.status, StatusCode::OK, "{}", found.body);
        assert_eq!(found.body["total"], 1, "{q}");
        assert_eq!(found.body["items"][0]["title"], "Отключение воды");
    }
}
