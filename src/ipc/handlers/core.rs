use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

// Deployment secrets live in the web tier's environment; we report
// presence only, never values.
fn env_check() -> serde_json::Value {
    json!({
        "hasDbUrl": env_present("CAMPUSD_DATABASE_URL"),
        "hasAuthUrl": env_present("AUTH_BASE_URL"),
        "hasAuthSecret": env_present("AUTH_SECRET"),
        "hasGoogleId": env_present("GOOGLE_CLIENT_ID"),
        "hasGoogleSecret": env_present("GOOGLE_CLIENT_SECRET"),
    })
}

fn env_present(name: &str) -> bool {
    std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false)
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let workspace = state
        .workspace
        .as_ref()
        .map(|p| p.to_string_lossy().to_string());

    let result = match state.db.as_ref() {
        Some(conn) => match conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)) {
            Ok(_) => json!({
                "status": "healthy",
                "database": "connected",
                "version": env!("CARGO_PKG_VERSION"),
                "workspacePath": workspace,
                "envCheck": env_check(),
            }),
            Err(e) => json!({
                "status": "unhealthy",
                "database": "error",
                "error": e.to_string(),
                "version": env!("CARGO_PKG_VERSION"),
                "workspacePath": workspace,
                "envCheck": env_check(),
            }),
        },
        None => json!({
            "status": "unhealthy",
            "database": "not_connected",
            "error": "no workspace selected",
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": workspace,
            "envCheck": env_check(),
        }),
    };

    ok(&req.id, result)
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
