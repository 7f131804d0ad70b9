use crate::db;
use crate::identity::LocalDirectory;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::notes::NoteStore;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
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

    // Open everything before swapping anything in, so a failure leaves the
    // previous workspace intact.
    let conn = match db::open_db(&path) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
    };
    let directory = match LocalDirectory::open(&path) {
        Ok(d) => d,
        Err(e) => {
            return err(
                &req.id,
                "db_open_failed",
                format!("{e:?}"),
                Some(json!({ "store": "identity" })),
            )
        }
    };
    let notes = match NoteStore::open(&path) {
        Ok(n) => n,
        Err(e) => {
            return err(
                &req.id,
                "db_open_failed",
                format!("{e:?}"),
                Some(json!({ "store": "notes" })),
            )
        }
    };

    tracing::info!(workspace = %path.display(), "workspace opened");
    state.workspace = Some(path.clone());
    state.db = Some(conn);
    state.identity = Some(Box::new(directory));
    state.notes = Some(notes);
    ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
