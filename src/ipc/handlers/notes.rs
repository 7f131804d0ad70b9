use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{caller, get_required_str, reply};
use crate::ipc::types::{AppState, Request};
use crate::notes::{Note, NoteStore};
use serde_json::json;

fn store(state: &AppState) -> Result<&NoteStore, HandlerErr> {
    state
        .notes
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn note_json(id: &str, note: &Note) -> serde_json::Value {
    json!({
        "id": id,
        "title": note.title,
        "content": note.content,
        "userId": note.user_id,
        "timestamp": note.timestamp,
    })
}

fn handle_notes_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let who = caller(state, req)?;
    let notes = store(state)?.list(&who.user_id)?;
    let rows: Vec<_> = notes.iter().map(|(id, n)| note_json(id, n)).collect();
    Ok(json!({ "notes": rows }))
}

fn handle_notes_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let who = caller(state, req)?;
    let title = get_required_str(req, "title")?;
    let content = get_required_str(req, "content")?;
    let (id, note) = store(state)?.create(&who.user_id, title, content)?;
    Ok(note_json(&id, &note))
}

fn handle_notes_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let who = caller(state, req)?;
    let id = get_required_str(req, "id")?;
    let title = get_required_str(req, "title")?;
    let content = get_required_str(req, "content")?;
    let note = store(state)?.update(&who.user_id, id, title, content)?;
    Ok(note_json(id, &note))
}

fn handle_notes_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let who = caller(state, req)?;
    let id = get_required_str(req, "id")?;
    store(state)?.delete(&who.user_id, id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "notes.list" => handle_notes_list(state, req),
        "notes.create" => handle_notes_create(state, req),
        "notes.update" => handle_notes_update(state, req),
        "notes.delete" => handle_notes_delete(state, req),
        _ => return None,
    };
    Some(reply(req, result))
}
