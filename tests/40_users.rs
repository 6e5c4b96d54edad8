mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

fn registration(username: &str) -> Value {
    json!({
        "username": username,
        "password": "password1",
        "firstName": "New",
        "lastName": "User",
        "email": format!("{}@email.com", username)
    })
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn register_then_login() -> Result<()> {
    let server = common::spawn_app_with_db().await?;
    let username = common::unique("r");

    let res = server
        .client
        .post(server.url("/auth/register"))
        .json(&registration(&username))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let token = res.json::<Value>().await?["token"].as_str().unwrap_or_default().to_string();

    let res = server.client.get(server.url("/auth/whoami")).bearer_auth(&token).send().await?;
    assert_eq!(
        res.json::<Value>().await?,
        json!({ "user": { "username": username, "isAdmin": false } })
    );

    let res = server
        .client
        .post(server.url("/auth/token"))
        .json(&json!({ "username": username, "password": "password1" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.json::<Value>().await?["token"].is_string());

    let res = server
        .client
        .post(server.url("/auth/token"))
        .json(&json!({ "username": username, "password": "wrong-one" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn duplicate_registration_conflicts() -> Result<()> {
    let server = common::spawn_app_with_db().await?;
    let username = server.seed_user(false).await?;

    let res = server
        .client
        .post(server.url("/auth/register"))
        .json(&registration(&username))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn admin_creates_admin() -> Result<()> {
    let server = common::spawn_app_with_db().await?;
    let username = common::unique("a");
    let mut body = registration(&username);
    body["isAdmin"] = json!(true);
    body["_token"] = json!(server.token("admin", true));

    let res = server.client.post(server.url("/users")).json(&body).send().await?;

    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["user"]["username"], username.as_str());
    assert_eq!(body["user"]["isAdmin"], true);
    assert!(body["user"].get("password").is_none());
    assert!(body["token"].is_string());
    Ok(())
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn self_reads_and_updates() -> Result<()> {
    let server = common::spawn_app_with_db().await?;
    let username = server.seed_user(false).await?;
    let token = server.token(&username, false);
    let path = format!("/users/{}", username);

    let res = server
        .client
        .get(server.url(&path))
        .query(&[("_token", token.as_str())])
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["user"]["firstName"], "First");
    assert_eq!(body["user"]["jobs"], json!([]));

    let res = server
        .client
        .patch(server.url(&path))
        .json(&json!({ "firstName": "Renamed", "password": "new-password", "_token": token }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["user"]["firstName"], "Renamed");
    assert_eq!(body["user"]["lastName"], "Last");

    // New password is stored hashed and usable
    let res = server
        .client
        .post(server.url("/auth/token"))
        .json(&json!({ "username": username, "password": "new-password" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn apply_once() -> Result<()> {
    let server = common::spawn_app_with_db().await?;
    let company = server.seed_company().await?;
    let username = server.seed_user(false).await?;
    let token = server.token(&username, false);

    let job_id: i32 = sqlx::query_scalar(
        "INSERT INTO jobs (title, company_handle) VALUES ('Applied', $1) RETURNING id",
    )
    .bind(&company)
    .fetch_one(&server.pool)
    .await?;
    let path = format!("/users/{}/jobs/{}", username, job_id);

    let res = server.client.post(server.url(&path)).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(res.json::<Value>().await?, json!({ "applied": job_id }));

    let res = server.client.post(server.url(&path)).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = server
        .client
        .get(server.url(&format!("/users/{}", username)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.json::<Value>().await?["user"]["jobs"], json!([job_id]));

    let res = server
        .client
        .post(server.url(&format!("/users/{}/jobs/999999999", username)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn admin_deletes_user() -> Result<()> {
    let server = common::spawn_app_with_db().await?;
    let username = server.seed_user(false).await?;
    let path = format!("/users/{}", username);
    let token = server.token("admin", true);

    let res = server.client.delete(server.url(&path)).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?, json!({ "deleted": username }));

    let res = server.client.get(server.url(&path)).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}
