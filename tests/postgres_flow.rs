//! Flows run against the diesel repositories. Each test skips itself when
//! `TEST_DATABASE_URL` is not set.

mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use common::{acquire_db_lock, document_fields, json_body, FilePart, TestApp, PASSWORD};
use diesel::prelude::*;
use ppg_docs::domain::{NewUser, Role};
use ppg_docs::repository::{RepositoryError, UserRepository};
use ppg_docs::schema::{approval_flows, document_summaries, documents};
use serde_json::{json, Value};
use uuid::Uuid;

fn titles(body: &Value) -> Vec<&str> {
    body.as_array()
        .unwrap()
        .iter()
        .filter_map(|item| item["title"].as_str().or(item["document_title"].as_str()))
        .collect()
}

async fn row_counts(app: &TestApp) -> Result<(i64, i64, i64)> {
    app.with_conn(|conn| {
        let document_rows = documents::table.count().get_result(conn)?;
        let flows = approval_flows::table.count().get_result(conn)?;
        let summaries = document_summaries::table.count().get_result(conn)?;
        Ok((document_rows, flows, summaries))
    })
    .await
}

#[tokio::test]
async fn review_cycle_persists_decisions() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::postgres().await? else {
        return Ok(());
    };

    app.seed_user("u1@ppg.example", Role::Staff, true)?;
    let manager_id = app.seed_user("u2@ppg.example", Role::Manager, true)?;
    let staff = app.login_token("u1@ppg.example", PASSWORD).await?;
    let manager = app.login_token("u2@ppg.example", PASSWORD).await?;
    let program_id = app.seed_program("P1", "P1")?;

    let mut flow_ids = Vec::new();
    for title in ["Edital 2024", "Resultado 2024"] {
        let response = app
            .upload_document(&staff, title, program_id, "edital.pdf", b"%PDF")
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
        let document = json_body(response).await?;
        assert_eq!(document["approval"]["state"], "PENDING");
        assert_eq!(document["author_name"], "STAFF user");
        flow_ids.push(document["approval"]["id"].as_str().unwrap().to_string());
    }
    assert_eq!(row_counts(&app).await?, (2, 2, 0));

    let response = app.get("/api/approvals/pending", Some(&manager)).await?;
    let pending = json_body(response).await?;
    assert_eq!(titles(&pending), vec!["Edital 2024", "Resultado 2024"]);
    assert_eq!(pending[0]["program_name"], "P1");

    let response = app
        .patch_json(
            &format!("/api/approvals/{}", flow_ids[0]),
            &json!({ "approved": true, "comment": "ok" }),
            Some(&manager),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.get("/api/documents", None).await?;
    let listed = json_body(response).await?;
    assert_eq!(titles(&listed), vec!["Edital 2024"]);
    assert_eq!(listed[0]["approval"]["state"], "APPROVED");
    assert_eq!(listed[0]["approval"]["reviewer_id"], manager_id.to_string());
    assert_eq!(listed[0]["approval"]["comment"], "ok");

    let response = app.get("/api/approvals/pending", Some(&manager)).await?;
    assert_eq!(titles(&json_body(response).await?), vec!["Resultado 2024"]);

    // A later rejection overwrites the approval.
    let response = app
        .patch_json(
            &format!("/api/approvals/{}", flow_ids[0]),
            &json!({ "approved": false, "comment": "revisar" }),
            Some(&manager),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.get("/api/documents", None).await?;
    assert!(titles(&json_body(response).await?).is_empty());
    Ok(())
}

#[tokio::test]
async fn deleting_a_document_cascades_to_flow_and_summary() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::postgres().await? else {
        return Ok(());
    };

    let admin = app.token_for("admin@ppg.example", Role::Admin).await?;
    let program_id = app.seed_program("Computação", "PPGCC")?;

    let response = app
        .upload_document(&admin, "Edital", program_id, "edital.txt", b"vagas abertas")
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = json_body(response).await?["id"].as_str().unwrap().to_string();

    // The second request overwrites the stored summary in place.
    for _ in 0..2 {
        let response = app
            .post_json(&format!("/api/documents/{id}/summary"), &(), Some(&admin))
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await?["summary"],
            "[Computação] edital.txt: vagas abertas"
        );
    }
    assert_eq!(row_counts(&app).await?, (1, 1, 1));

    let response = app.get(&format!("/api/documents/{id}"), Some(&admin)).await?;
    assert_eq!(
        json_body(response).await?["summary"],
        "[Computação] edital.txt: vagas abertas"
    );

    let response = app.delete(&format!("/api/documents/{id}"), Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(row_counts(&app).await?, (0, 0, 0));
    assert_eq!(app.stored_file_count()?, 0);

    let response = app.get(&format!("/api/documents/{id}"), Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn unique_indexes_ignore_case() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::postgres().await? else {
        return Ok(());
    };

    let payload = |email: &str| {
        json!({
            "name": "Ana",
            "email": email,
            "password": "pw-1",
            "role": "STAFF"
        })
    };
    let response = app
        .post_json("/api/users/self-register", &payload("ana@ppg.example"), None)
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = app
        .post_json("/api/users/self-register", &payload("ANA@ppg.example"), None)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?["kind"], "business_rule");

    // The index itself rejects a differently cased address.
    let err = app
        .repositories()
        .users
        .insert_user(NewUser {
            id: Uuid::new_v4(),
            name: "Ana".into(),
            email: "ANA@PPG.EXAMPLE".into(),
            password_hash: "hash".into(),
            role: Role::Staff,
            active: false,
        })
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(ref msg) if msg == "email already registered"));

    let admin = app.token_for("admin@ppg.example", Role::Admin).await?;
    app.seed_program("Computação", "PECS")?;
    let response = app
        .post_json(
            "/api/programs",
            &json!({ "name": "Outro", "code": "pecs" }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await?;
    assert_eq!(body["kind"], "business_rule");
    assert_eq!(body["error"], "program code already in use");
    Ok(())
}

#[tokio::test]
async fn removed_accounts_leave_documents_behind() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::postgres().await? else {
        return Ok(());
    };

    let staff_id = app.seed_user("staff@ppg.example", Role::Staff, true)?;
    let manager_id = app.seed_user("manager@ppg.example", Role::Manager, true)?;
    let staff = app.login_token("staff@ppg.example", PASSWORD).await?;
    let manager = app.login_token("manager@ppg.example", PASSWORD).await?;
    let admin = app.token_for("admin@ppg.example", Role::Admin).await?;
    let program_id = app.seed_program("Computação", "PPGCC")?;

    let response = app
        .upload_document(&staff, "Relatório", program_id, "r.pdf", b"r")
        .await?;
    let flow_id = json_body(response).await?["approval"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app.delete(&format!("/api/users/{staff_id}"), Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.get("/api/approvals/pending", Some(&manager)).await?;
    let pending = json_body(response).await?;
    assert_eq!(titles(&pending), vec!["Relatório"]);
    assert_eq!(pending[0]["author_name"], "unknown");

    let response = app
        .patch_json(
            &format!("/api/approvals/{flow_id}"),
            &json!({ "approved": true }),
            Some(&manager),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.delete(&format!("/api/users/{manager_id}"), Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.get("/api/documents", Some(&admin)).await?;
    let listed = json_body(response).await?;
    assert_eq!(titles(&listed), vec!["Relatório"]);
    assert_eq!(listed[0]["author_name"], "unknown");
    assert!(listed[0]["author_id"].is_null());
    assert!(listed[0]["approval"]["reviewer_id"].is_null());
    assert_eq!(listed[0]["approval"]["state"], "APPROVED");
    Ok(())
}

#[tokio::test]
async fn programs_owning_documents_stay_put() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::postgres().await? else {
        return Ok(());
    };

    let admin = app.token_for("admin@ppg.example", Role::Admin).await?;
    let program_id = app.seed_program("Computação", "PPGCC")?;
    let response = app
        .upload_document(&admin, "Edital", program_id, "e.pdf", b"e")
        .await?;
    let id = json_body(response).await?["id"].as_str().unwrap().to_string();

    let response = app
        .delete(&format!("/api/programs/{program_id}"), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?["kind"], "business_rule");

    let response = app.delete(&format!("/api/documents/{id}"), Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app
        .delete(&format!("/api/programs/{program_id}"), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn updates_move_documents_and_replace_files() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::postgres().await? else {
        return Ok(());
    };

    let admin = app.token_for("admin@ppg.example", Role::Admin).await?;
    let first = app.seed_program("Computação", "PPGCC")?;
    let second = app.seed_program("Letras", "PPGL")?;

    let response = app
        .upload_document(&admin, "Edital", first, "v1.pdf", b"first version")
        .await?;
    let id = json_body(response).await?["id"].as_str().unwrap().to_string();

    let response = app
        .send_document_form(
            Method::PUT,
            &format!("/api/documents/{id}"),
            &document_fields("Edital retificado", second),
            Some(FilePart {
                filename: "v2.pdf",
                content_type: "application/pdf",
                data: b"second version",
            }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["title"], "Edital retificado");
    assert_eq!(body["program_name"], "Letras");
    assert_eq!(body["original_filename"], "v2.pdf");
    assert_eq!(body["size_bytes"], 14);
    assert_eq!(body["approval"]["state"], "APPROVED");

    let response = app
        .get(&format!("/api/documents/download/{id}"), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = common::body_to_vec(response.into_body()).await?;
    assert_eq!(bytes, b"second version");

    let response = app
        .send_document_form(
            Method::PUT,
            &format!("/api/documents/{id}"),
            &document_fields("Edital", Uuid::new_v4()),
            None,
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
