mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::{Form, TestApp};

fn ids(body: &Value, key: &str) -> Vec<String> {
    body["data"][key]
        .as_array()
        .map(|items| items.iter().filter_map(|i| i["id"].as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

async fn create_project(app: &TestApp, payload: Value) -> Result<String> {
    let (status, body) = app.json(Method::POST, "/api/projects", payload).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    Ok(body["data"]["id"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn multipart_create_uploads_images_and_links_stacks() -> Result<()> {
    let app = TestApp::new();
    let rust = app.seed_tech_stack("Rust");

    let form = Form::new()
        .payload(json!({ "name": "Portfolio", "featured": true, "tech_stack_ids": [rust] }))
        .file("images", "Cover.PNG", "image/png", b"cover")
        .file("images", "detail.jpg", "image/jpeg", b"detail");
    let (status, body) = app.multipart(Method::POST, "/api/projects", form).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let id = body["data"]["id"].as_str().unwrap_or_default().to_string();
    assert_eq!(body["data"]["status"], "draft");
    assert_eq!(
        body["data"]["images"],
        json!([
            format!("https://storage.test/public/projects/{}/images_0.png", id),
            format!("https://storage.test/public/projects/{}/images_1.jpg", id),
        ])
    );
    assert_eq!(ids(&body, "tech_stacks"), vec![rust.to_string()]);

    assert_eq!(app.storage.paths().len(), 2);
    assert_eq!(app.db.rows("projects").len(), 1);
    assert_eq!(app.db.rows("project_tech_stacks").len(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_second_upload_leaves_nothing_behind() -> Result<()> {
    let app = TestApp::new();
    let rust = app.seed_tech_stack("Rust");
    app.storage.fail_uploads_after(1);

    let form = Form::new()
        .payload(json!({ "name": "Portfolio", "tech_stack_ids": [rust] }))
        .file("images", "a.png", "image/png", b"a")
        .file("images", "b.png", "image/png", b"b");
    let (status, body) = app.multipart(Method::POST, "/api/projects", form).await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", body);
    assert_eq!(body["success"], false);
    assert!(app.db.rows("projects").is_empty());
    assert!(app.db.rows("project_tech_stacks").is_empty());
    assert!(app.storage.paths().is_empty(), "orphaned files: {:?}", app.storage.paths());
    Ok(())
}

#[tokio::test]
async fn create_reports_every_invalid_field() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app
        .json(Method::POST, "/api/projects", json!({ "name": " ", "status": "bogus" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let fields: Vec<&str> = body["error"]["details"]
        .as_array()
        .map(|d| d.iter().filter_map(|v| v["field"].as_str()).collect())
        .unwrap_or_default();
    assert!(fields.contains(&"name"), "{:?}", fields);
    assert!(fields.contains(&"status"), "{:?}", fields);
    assert!(app.db.rows("projects").is_empty());
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_rejected() -> Result<()> {
    let app = TestApp::new();
    let request = axum::http::Request::post("/api/projects")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{\"name\": "))?;

    let (status, body) = app.send(request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_JSON");
    Ok(())
}

#[tokio::test]
async fn empty_link_list_keeps_associations() -> Result<()> {
    let app = TestApp::new();
    let rust = app.seed_tech_stack("Rust");
    let axum = app.seed_tech_stack("Axum");
    let id = create_project(&app, json!({ "name": "API", "tech_stack_ids": [rust, axum] })).await?;

    let uri = format!("/api/projects/{}", id);
    let (status, body) = app.json(Method::PATCH, &uri, json!({ "tech_stack_ids": [] })).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(ids(&body, "tech_stacks").len(), 2);

    let (_, body) = app.json(Method::PUT, &uri, json!({ "name": "API v2" })).await?;
    assert_eq!(body["data"]["name"], "API v2");
    assert_eq!(ids(&body, "tech_stacks").len(), 2);
    Ok(())
}

#[tokio::test]
async fn new_link_list_replaces_associations() -> Result<()> {
    let app = TestApp::new();
    let rust = app.seed_tech_stack("Rust");
    let go = app.seed_tech_stack("Go");
    let id = create_project(&app, json!({ "name": "API", "tech_stack_ids": [rust] })).await?;

    let uri = format!("/api/projects/{}", id);
    let (status, body) = app.json(Method::PATCH, &uri, json!({ "tech_stack_ids": [go] })).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(ids(&body, "tech_stacks"), vec![go.to_string()]);

    let (_, body) = app.get(&uri).await?;
    assert_eq!(ids(&body, "tech_stacks"), vec![go.to_string()]);
    assert_eq!(app.db.rows("project_tech_stacks").len(), 1);
    Ok(())
}

#[tokio::test]
async fn description_only_update_keeps_other_fields() -> Result<()> {
    let app = TestApp::new();
    let id = create_project(
        &app,
        json!({
            "name": "Site",
            "description": "old",
            "status": "in_progress",
            "featured": true,
            "repository_url": "https://github.com/me/site"
        }),
    )
    .await?;

    let uri = format!("/api/projects/{}", id);
    let (_, before) = app.get(&uri).await?;
    let (status, after) = app.json(Method::PATCH, &uri, json!({ "description": "new" })).await?;
    assert_eq!(status, StatusCode::OK, "{}", after);

    let (before, after) = (&before["data"], &after["data"]);
    assert_eq!(after["description"], "new");
    for key in ["name", "status", "featured", "repository_url", "images", "created_at"] {
        assert_eq!(after[key], before[key], "field {} changed", key);
    }
    Ok(())
}

#[tokio::test]
async fn explicit_null_clears_optional_field() -> Result<()> {
    let app = TestApp::new();
    let id = create_project(&app, json!({ "name": "Site", "demo_url": "https://demo.example.com" })).await?;

    let uri = format!("/api/projects/{}", id);
    let (status, body) = app.json(Method::PATCH, &uri, json!({ "demo_url": null })).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["demo_url"], Value::Null);
    assert_eq!(body["data"]["name"], "Site");
    Ok(())
}

#[tokio::test]
async fn delete_survives_storage_failure() -> Result<()> {
    let app = TestApp::new();
    let rust = app.seed_tech_stack("Rust");

    let form = Form::new()
        .payload(json!({ "name": "Gallery", "tech_stack_ids": [rust] }))
        .file("images", "a.png", "image/png", b"a");
    let (_, body) = app.multipart(Method::POST, "/api/projects", form).await?;
    let id = body["data"]["id"].as_str().unwrap_or_default().to_string();

    app.storage.fail_removals();
    let (status, body) = app.send(
        axum::http::Request::delete(format!("/api/projects/{}", id)).body(axum::body::Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["name"], "Gallery");

    assert!(app.db.rows("projects").is_empty());
    assert!(app.db.rows("project_tech_stacks").is_empty());
    assert_eq!(app.storage.removed().len(), 1);

    let (status, _) = app.get(&format!("/api/projects/{}", id)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn bad_and_unknown_ids() -> Result<()> {
    let app = TestApp::new();

    let (status, body) = app.get("/api/projects/not-a-uuid").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let missing = uuid::Uuid::new_v4();
    let (status, body) = app
        .json(Method::PATCH, &format!("/api/projects/{}", missing), json!({ "name": "x" }))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn files_on_undeclared_field_are_rejected() -> Result<()> {
    let app = TestApp::new();
    let form = Form::new()
        .payload(json!({ "name": "Rust" }))
        .file("banner", "b.png", "image/png", b"b");

    let (status, body) = app.multipart(Method::POST, "/api/tech-stacks", form).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert!(app.storage.paths().is_empty());
    assert!(app.db.rows("tech_stacks").is_empty());
    Ok(())
}

#[tokio::test]
async fn single_form_id_field_links_one_stack() -> Result<()> {
    let app = TestApp::new();
    let rust = app.seed_tech_stack("Rust");

    let form = Form::new()
        .text("name", "Form project")
        .text("tech_stack_ids", &rust.to_string())
        .file("images", "a.png", "image/png", b"a");
    let (status, body) = app.multipart(Method::POST, "/api/projects", form).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(ids(&body, "tech_stacks"), vec![rust.to_string()]);
    Ok(())
}
