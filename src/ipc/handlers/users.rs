use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn handle_users_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    let email = match req.params.get("email").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_ascii_lowercase(),
        None => return err(&req.id, "bad_params", "missing email", None),
    };
    let password = match req.params.get("password").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing password", None),
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }
    if email.is_empty() || !email.contains('@') {
        return err(&req.id, "bad_params", "email must be a valid address", None);
    }
    if password.is_empty() {
        return err(&req.id, "bad_params", "password must not be empty", None);
    }
    // Accounts created through the web tier's Google sign-in carry the
    // provider subject so later credential logins map to the same row.
    let google_sub = req
        .params
        .get("googleSub")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let existing: Option<String> = match conn
        .query_row("SELECT id FROM users WHERE email = ?", [&email], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if existing.is_some() {
        return err(&req.id, "conflict", "email already registered", None);
    }

    let user_id = Uuid::new_v4().to_string();
    let salt = Uuid::new_v4().simple().to_string();
    let hash = hash_password(&salt, &password);
    let created_at = chrono::Utc::now().to_rfc3339();

    if let Err(e) = conn.execute(
        "INSERT INTO users(id, name, email, password_salt, password_hash, google_sub, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (&user_id, &name, &email, &salt, &hash, &google_sub, &created_at),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "users" })),
        );
    }

    ok(
        &req.id,
        json!({ "userId": user_id, "name": name, "email": email }),
    )
}

fn handle_users_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let email = match req.params.get("email").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_ascii_lowercase(),
        None => return err(&req.id, "bad_params", "missing email", None),
    };
    let password = match req.params.get("password").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing password", None),
    };

    let row: Option<(String, String, String, String, String)> = match conn
        .query_row(
            "SELECT id, name, password_salt, password_hash, created_at
             FROM users WHERE email = ?",
            [&email],
            |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                ))
            },
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Same code for unknown email and wrong password: the reply must not
    // reveal which emails exist.
    let Some((user_id, name, salt, stored_hash, created_at)) = row else {
        return err(&req.id, "auth_failed", "invalid email or password", None);
    };
    if hash_password(&salt, &password) != stored_hash {
        return err(&req.id, "auth_failed", "invalid email or password", None);
    }

    ok(
        &req.id,
        json!({
            "userId": user_id,
            "name": name,
            "email": email,
            "createdAt": created_at,
        }),
    )
}

fn handle_users_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let user_id = match req.params.get("userId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing userId", None),
    };

    let row: Option<(String, String, Option<String>, String)> = match conn
        .query_row(
            "SELECT name, email, google_sub, created_at FROM users WHERE id = ?",
            [&user_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let Some((name, email, google_sub, created_at)) = row else {
        return err(&req.id, "not_found", "user not found", None);
    };

    ok(
        &req.id,
        json!({
            "userId": user_id,
            "name": name,
            "email": email,
            "googleSub": google_sub,
            "createdAt": created_at,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.register" => Some(handle_users_register(state, req)),
        "users.login" => Some(handle_users_login(state, req)),
        "users.get" => Some(handle_users_get(state, req)),
        _ => None,
    }
}
