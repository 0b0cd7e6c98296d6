mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{json_body, TestApp, TestOptions};
use ppg_docs::domain::Role;
use serde_json::json;

#[tokio::test]
async fn managers_maintain_the_catalog() -> Result<()> {
    let app = TestApp::new().await?;
    let manager = app.token_for("manager@ppg.example", Role::Manager).await?;

    let response = app
        .post_json(
            "/api/programs",
            &json!({
                "name": " Mestrado em Computação ",
                "code": "PPGCC",
                "description": "   "
            }),
            Some(&manager),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await?;
    assert_eq!(body["name"], "Mestrado em Computação");
    assert!(body["description"].is_null());
    let program_id = body["id"].as_str().unwrap().to_string();

    let response = app
        .put_json(
            &format!("/api/programs/{program_id}"),
            &json!({
                "name": "Mestrado e Doutorado em Computação",
                "code": "PPGCC",
                "description": "Stricto sensu"
            }),
            Some(&manager),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["description"], "Stricto sensu");

    let response = app
        .get(&format!("/api/programs/{program_id}"), None)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await?["name"],
        "Mestrado e Doutorado em Computação"
    );

    let response = app
        .delete(&format!("/api/programs/{program_id}"), Some(&manager))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/api/programs/{program_id}"), None)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn program_codes_are_unique_ignoring_case() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.token_for("admin@ppg.example", Role::Admin).await?;
    app.seed_program("Física", "PPGF")?;

    let response = app
        .post_json(
            "/api/programs",
            &json!({ "name": "Física Aplicada", "code": "ppgf" }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?["kind"], "business_rule");
    Ok(())
}

#[tokio::test]
async fn programs_with_documents_cannot_be_deleted() -> Result<()> {
    let app = TestApp::new().await?;
    let admin = app.token_for("admin@ppg.example", Role::Admin).await?;
    let program_id = app.seed_program("Química", "PPGQ")?;

    let response = app
        .upload_document(&admin, "Edital 2024", program_id, "edital.pdf", b"%PDF-1.4")
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .delete(&format!("/api/programs/{program_id}"), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?["kind"], "business_rule");
    Ok(())
}

#[tokio::test]
async fn staff_cannot_change_the_catalog() -> Result<()> {
    let app = TestApp::new().await?;
    let staff = app.token_for("staff@ppg.example", Role::Staff).await?;

    let response = app
        .post_json(
            "/api/programs",
            &json!({ "name": "Letras", "code": "PPGL" }),
            Some(&staff),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get("/api/programs", Some(&staff)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn private_deployments_hide_the_catalog_from_anonymous_callers() -> Result<()> {
    let app = TestApp::with_options(TestOptions {
        public_document_access: false,
        ..TestOptions::default()
    })
    .await?;
    app.seed_program("História", "PPGH")?;

    let response = app.get("/api/programs", None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let intern = app.token_for("intern@ppg.example", Role::Intern).await?;
    let response = app.get("/api/programs", Some(&intern)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?.as_array().map(Vec::len), Some(1));
    Ok(())
}
