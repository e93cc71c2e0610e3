mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn needs_setup_answers_with_flag() -> Result<()> {
    if !common::database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/auth/needs-setup", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert!(body["needsSetup"].is_boolean(), "body: {}", body);
    Ok(())
}

#[tokio::test]
async fn setup_then_signin_yields_admin_identity() -> Result<()> {
    if !common::database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let token = common::admin_token(server).await?;
    assert!(!token.is_empty());

    // A fresh signin carries profile and role alongside the token.
    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/api/auth/signin", server.base_url))
        .json(&json!({
            "email": common::ADMIN_EMAIL,
            "password": common::ADMIN_PASSWORD,
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["user"]["email"], common::ADMIN_EMAIL);
    assert_eq!(body["user"]["role"], "admin");
    Ok(())
}

#[tokio::test]
async fn setup_is_refused_once_a_user_exists() -> Result<()> {
    if !common::database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    common::admin_token(server).await?;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/api/auth/setup", server.base_url))
        .json(&json!({ "email": "other@teste.local", "password": "qualquer1" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["error"], "Setup already completed");
    Ok(())
}

#[tokio::test]
async fn signin_rejects_bad_credentials_uniformly() -> Result<()> {
    if !common::database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    common::admin_token(server).await?;
    let client = reqwest::Client::new();

    // Wrong password and unknown email answer identically.
    for payload in [
        json!({ "email": common::ADMIN_EMAIL, "password": "senha-errada" }),
        json!({ "email": "ninguem@teste.local", "password": "senha-errada" }),
    ] {
        let res = client
            .post(format!("{}/api/auth/signin", server.base_url))
            .json(&payload)
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body = res.json::<serde_json::Value>().await?;
        assert_eq!(body["error"], "Invalid credentials");
    }
    Ok(())
}

#[tokio::test]
async fn signin_requires_both_fields() -> Result<()> {
    if !common::database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    for payload in [
        json!({}),
        json!({ "email": "a@b.c" }),
        json!({ "email": "a@b.c", "password": "" }),
    ] {
        let res = client
            .post(format!("{}/api/auth/signin", server.base_url))
            .json(&payload)
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = res.json::<serde_json::Value>().await?;
        assert_eq!(body["error"], "Email and password are required");
    }
    Ok(())
}

#[tokio::test]
async fn create_user_validates_payload() -> Result<()> {
    if !common::database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let token = common::admin_token(server).await?;
    let client = reqwest::Client::new();
    let url = format!("{}/api/auth/create-user", server.base_url);

    let cases = [
        (
            json!({ "email": "x@teste.local", "password": "abc123" }),
            "Email, password and role are required",
        ),
        (
            json!({ "email": "x@teste.local", "password": "curta", "role": "operador" }),
            "Password must be at least 6 characters",
        ),
        (
            json!({ "email": "x@teste.local", "password": "abc123", "role": "chefe" }),
            "Invalid role",
        ),
    ];
    for (payload, message) in cases {
        let res = client
            .post(&url)
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "payload: {payload}");
        let body = res.json::<serde_json::Value>().await?;
        assert_eq!(body["error"], message);
    }
    Ok(())
}

#[tokio::test]
async fn create_user_provisions_account_and_blocks_duplicates() -> Result<()> {
    if !common::database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let token = common::admin_token(server).await?;
    let client = reqwest::Client::new();

    let email = format!("op-{}@teste.local", uuid::Uuid::new_v4());
    let payload = json!({
        "email": email,
        "password": "senha-op-1",
        "fullName": "Operador de Teste",
        "role": "operador",
    });

    let res = client
        .post(format!("{}/api/auth/create-user", server.base_url))
        .bearer_auth(&token)
        .json(&payload)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert!(body["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert_eq!(body["message"], "User created successfully");

    // Same email again is refused.
    let res = client
        .post(format!("{}/api/auth/create-user", server.base_url))
        .bearer_auth(&token)
        .json(&payload)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["error"], "Email already registered");

    // The new account can sign in and sees its own role.
    let res = client
        .post(format!("{}/api/auth/signin", server.base_url))
        .json(&json!({ "email": email, "password": "senha-op-1" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["user"]["role"], "operador");
    assert_eq!(body["user"]["full_name"], "Operador de Teste");
    Ok(())
}

#[tokio::test]
async fn create_user_is_admin_only() -> Result<()> {
    if !common::database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let admin = common::admin_token(server).await?;
    let client = reqwest::Client::new();

    // Provision a gestor, then have it try to create a user.
    let email = format!("gestor-{}@teste.local", uuid::Uuid::new_v4());
    let res = client
        .post(format!("{}/api/auth/create-user", server.base_url))
        .bearer_auth(&admin)
        .json(&json!({
            "email": email,
            "password": "senha-g-1",
            "role": "gestor",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/api/auth/signin", server.base_url))
        .json(&json!({ "email": email, "password": "senha-g-1" }))
        .send()
        .await?;
    let gestor_token = res.json::<serde_json::Value>().await?["token"]
        .as_str()
        .unwrap()
        .to_string();

    let res = client
        .post(format!("{}/api/auth/create-user", server.base_url))
        .bearer_auth(&gestor_token)
        .json(&json!({
            "email": "novo@teste.local",
            "password": "senha-n-1",
            "role": "operador",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["error"], "Only admins can create users");
    Ok(())
}
