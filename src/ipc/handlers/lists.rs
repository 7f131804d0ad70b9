use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{caller, db, reply, store_err};
use crate::ipc::types::{AppState, Request};
use crate::query::{self, EntityKind, QueryParams};
use crate::settings;

fn handle_list(
    state: &mut AppState,
    req: &Request,
    kind: EntityKind,
) -> Result<serde_json::Value, HandlerErr> {
    let who = caller(state, req)?;
    let conn = db(state)?;
    let params = QueryParams::from_json(&req.params)?;
    let defaults = settings::list_defaults(conn).map_err(store_err("db_query_failed"))?;

    let list_req = query::build(kind, &who, &params, &defaults)?;
    let page = query::run(conn, &list_req)?;
    tracing::debug!(
        entity = kind.table(),
        page = page.window.page,
        rows = page.rows.len(),
        count = page.count,
        "list served"
    );
    Ok(page.to_json())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (table, action) = req.method.split_once('.')?;
    if action != "list" {
        return None;
    }
    let kind = EntityKind::from_table(table)?;
    Some(reply(req, handle_list(state, req, kind)))
}
