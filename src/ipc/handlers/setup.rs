use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{caller, db, reply, require_admin, store_err};
use crate::ipc::types::{AppState, Request};
use crate::settings::{self, SetupSection};
use serde_json::{json, Map, Value};

fn handle_setup_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    caller(state, req)?;
    let conn = db(state)?;
    let mut out = Map::new();
    for section in SetupSection::ALL {
        let v = settings::load_section(conn, section).map_err(store_err("db_query_failed"))?;
        out.insert(section.name().to_string(), v);
    }
    Ok(Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let who = caller(state, req)?;
    require_admin(&who)?;
    let conn = db(state)?;

    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return Err(HandlerErr::new("bad_params", "missing section"));
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return Err(HandlerErr::new("bad_params", "unknown section")
            .with_details(json!({ "section": section_raw })));
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::new("bad_params", "patch must be an object"));
    };

    let mut current =
        settings::load_section(conn, section).map_err(store_err("db_query_failed"))?;
    settings::merge_section_patch(section, &mut current, patch_obj)
        .map_err(|msg| HandlerErr::new("bad_params", msg))?;
    settings::save_section(conn, section, &current).map_err(store_err("db_update_failed"))?;
    tracing::info!(section = section.name(), user_id = %who.user_id, "settings updated");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "setup.get" => handle_setup_get(state, req),
        "setup.update" => handle_setup_update(state, req),
        _ => return None,
    };
    Some(reply(req, result))
}
