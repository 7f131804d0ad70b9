use crate::gate::{self, GateError, WriteEntity};
use crate::ipc::helpers::{mutation, reply, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::schema::{fmt_datetime, AnnouncementInput, DeleteIntInput, EventInput, Mode};
use rusqlite::types::Value;

fn missing_id(entity: &'static str) -> GateError {
    GateError::NotFound {
        entity,
        id: "?".to_string(),
    }
}

fn create_announcement(ctx: &Ctx<'_>, v: AnnouncementInput) -> Result<Option<String>, GateError> {
    ctx.conn.execute(
        "INSERT INTO announcements(title, description, date, class_id) VALUES(?, ?, ?, ?)",
        (v.title.trim(), v.description.trim(), fmt_datetime(&v.date), v.class_id),
    )?;
    Ok(Some(ctx.conn.last_insert_rowid().to_string()))
}

fn update_announcement(ctx: &Ctx<'_>, v: AnnouncementInput) -> Result<Option<String>, GateError> {
    let id = v.id.ok_or_else(|| missing_id("announcement"))?;
    gate::update_row(
        ctx.conn,
        WriteEntity::Announcement,
        "announcements",
        "title = ?, description = ?, date = ?, class_id = ?",
        vec![
            Value::from(v.title.trim().to_string()),
            Value::from(v.description.trim().to_string()),
            Value::from(fmt_datetime(&v.date)),
            Value::from(v.class_id),
        ],
        Value::Integer(id),
        ctx.policy,
        &ctx.who,
    )?;
    Ok(None)
}

fn delete_announcement(ctx: &Ctx<'_>, v: DeleteIntInput) -> Result<Option<String>, GateError> {
    gate::delete_row(
        ctx.conn,
        WriteEntity::Announcement,
        "announcements",
        Value::Integer(v.id),
        ctx.policy,
        &ctx.who,
    )?;
    Ok(None)
}

fn create_event(ctx: &Ctx<'_>, v: EventInput) -> Result<Option<String>, GateError> {
    ctx.conn.execute(
        "INSERT INTO events(title, description, start_time, end_time, class_id) VALUES(?, ?, ?, ?, ?)",
        (
            v.title.trim(),
            v.description.trim(),
            fmt_datetime(&v.start_time),
            fmt_datetime(&v.end_time),
            v.class_id,
        ),
    )?;
    Ok(Some(ctx.conn.last_insert_rowid().to_string()))
}

fn update_event(ctx: &Ctx<'_>, v: EventInput) -> Result<Option<String>, GateError> {
    let id = v.id.ok_or_else(|| missing_id("event"))?;
    gate::update_row(
        ctx.conn,
        WriteEntity::Event,
        "events",
        "title = ?, description = ?, start_time = ?, end_time = ?, class_id = ?",
        vec![
            Value::from(v.title.trim().to_string()),
            Value::from(v.description.trim().to_string()),
            Value::from(fmt_datetime(&v.start_time)),
            Value::from(fmt_datetime(&v.end_time)),
            Value::from(v.class_id),
        ],
        Value::Integer(id),
        ctx.policy,
        &ctx.who,
    )?;
    Ok(None)
}

fn delete_event(ctx: &Ctx<'_>, v: DeleteIntInput) -> Result<Option<String>, GateError> {
    gate::delete_row(ctx.conn, WriteEntity::Event, "events", Value::Integer(v.id), ctx.policy, &ctx.who)?;
    Ok(None)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    use WriteEntity as W;
    let result = match req.method.as_str() {
        "announcements.create" => {
            mutation(state, req, W::Announcement, "create", Mode::Create, create_announcement)
        }
        "announcements.update" => {
            mutation(state, req, W::Announcement, "update", Mode::Update, update_announcement)
        }
        "announcements.delete" => {
            mutation(state, req, W::Announcement, "delete", Mode::Update, delete_announcement)
        }
        "events.create" => mutation(state, req, W::Event, "create", Mode::Create, create_event),
        "events.update" => mutation(state, req, W::Event, "update", Mode::Update, update_event),
        "events.delete" => mutation(state, req, W::Event, "delete", Mode::Update, delete_event),
        _ => return None,
    };
    Some(reply(req, result))
}
