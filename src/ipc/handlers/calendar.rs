use crate::identity::Identity;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{caller, db, get_required_str, reply};
use crate::ipc::types::{AppState, Request};
use crate::query::filter::{Clause, Predicate};
use crate::query::{list, scope, EntityKind, SortOrder};
use crate::schema::{fmt_datetime, DATE_FORMAT};
use chrono::NaiveDate;
use rusqlite::types::Value;
use serde_json::json;

const CALENDAR_DATE_FORMAT: &str = "%d/%m/%Y";

fn parse_calendar_date(raw: Option<&str>) -> Result<NaiveDate, HandlerErr> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(chrono::Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s, CALENDAR_DATE_FORMAT).map_err(|_| {
            HandlerErr::new("bad_params", "date must be dd/mm/yyyy")
                .with_details(json!({ "date": s }))
        }),
    }
}

/// Events starting on `day`, narrowed to what `who` may see.
fn events_on(day: NaiveDate, who: &Identity) -> Result<Predicate, HandlerErr> {
    let start = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| HandlerErr::new("bad_params", "invalid date"))?;
    let end = day
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| HandlerErr::new("bad_params", "date out of range"))?;
    let pred = Predicate::new()
        .and(Clause::Template {
            sql: "ev.start_time >= ?",
            value: Value::Text(fmt_datetime(&start)),
        })
        .and(Clause::Template {
            sql: "ev.start_time < ?",
            value: Value::Text(fmt_datetime(&end)),
        });
    Ok(scope::apply(pred, EntityKind::Event, who))
}

fn handle_calendar_events(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let who = caller(state, req)?;
    let conn = db(state)?;
    let day = parse_calendar_date(req.params.get("date").and_then(|v| v.as_str()))?;
    let pred = events_on(day, &who)?;
    let events = list::fetch_all(conn, EntityKind::Event, &pred, SortOrder::Asc)?;
    Ok(json!({
        "date": day.format(DATE_FORMAT).to_string(),
        "events": events,
    }))
}

fn handle_calendar_schedule(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let who = caller(state, req)?;
    let conn = db(state)?;
    let kind = get_required_str(req, "type")?;
    let id = match req.params.get("id") {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => return Err(HandlerErr::new("bad_params", "missing id")),
    };

    let clause = match kind {
        "teacherId" => Clause::Eq {
            column: "l.teacher_id",
            value: Value::Text(id),
        },
        "classId" => {
            let class_id: i64 = id.parse().map_err(|_| {
                HandlerErr::new("bad_params", "classId must be an integer")
                    .with_details(json!({ "id": id }))
            })?;
            Clause::Eq {
                column: "l.class_id",
                value: Value::Integer(class_id),
            }
        }
        other => {
            return Err(HandlerErr::new("bad_params", "type must be teacherId or classId")
                .with_details(json!({ "type": other })))
        }
    };
    let pred = scope::apply(Predicate::new().and(clause), EntityKind::Lesson, &who);
    let lessons = list::fetch_all(conn, EntityKind::Lesson, &pred, SortOrder::Asc)?;
    Ok(json!({ "lessons": lessons }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "calendar.events" => handle_calendar_events(state, req),
        "calendar.schedule" => handle_calendar_schedule(state, req),
        _ => return None,
    };
    Some(reply(req, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_dates_are_day_month_year() {
        let d = parse_calendar_date(Some("05/03/2025")).expect("valid");
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 3, 5).expect("date"));
        assert!(parse_calendar_date(Some("2025-03-05")).is_err());
        assert!(parse_calendar_date(Some("31/02/2025")).is_err());
        assert!(parse_calendar_date(None).is_ok());
    }
}
