//! Option lists that back the create/update forms.

use crate::gate::{self, WriteEntity, WritePolicy};
use crate::identity::Identity;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{caller, db, get_required_str, reply};
use crate::ipc::types::{AppState, Request};
use crate::query::filter::Predicate;
use crate::query::{scope, EntityKind};
use rusqlite::{Connection, Row};
use serde_json::{json, Map, Value};

fn form_entity(table: &str) -> Option<WriteEntity> {
    Some(match table {
        "subject" => WriteEntity::Subject,
        "class" => WriteEntity::Class,
        "teacher" => WriteEntity::Teacher,
        "student" => WriteEntity::Student,
        "parent" => WriteEntity::Parent,
        "lesson" => WriteEntity::Lesson,
        "exam" => WriteEntity::Exam,
        "assignment" => WriteEntity::Assignment,
        "result" => WriteEntity::Result,
        "attendance" => WriteEntity::Attendance,
        "event" => WriteEntity::Event,
        "announcement" => WriteEntity::Announcement,
        _ => return None,
    })
}

fn options(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
    row: fn(&Row<'_>) -> rusqlite::Result<Value>,
) -> Result<Value, HandlerErr> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let rows = stmt
        .query_map(params, row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(Value::Array(rows))
}

fn teachers(conn: &Connection) -> Result<Value, HandlerErr> {
    options(
        conn,
        "SELECT id, name, surname FROM teachers ORDER BY surname, name, id",
        &[],
        |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "surname": r.get::<_, String>(2)?,
            }))
        },
    )
}

fn grades(conn: &Connection) -> Result<Value, HandlerErr> {
    options(conn, "SELECT id, level FROM grades ORDER BY level", &[], |r| {
        Ok(json!({ "id": r.get::<_, i64>(0)?, "level": r.get::<_, i64>(1)? }))
    })
}

fn subjects(conn: &Connection) -> Result<Value, HandlerErr> {
    options(conn, "SELECT id, name FROM subjects ORDER BY name", &[], |r| {
        Ok(json!({ "id": r.get::<_, i64>(0)?, "name": r.get::<_, String>(1)? }))
    })
}

fn classes(conn: &Connection) -> Result<Value, HandlerErr> {
    options(
        conn,
        "SELECT c.id, c.name, c.capacity, c.grade_id,
                (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id)
         FROM classes c ORDER BY c.name",
        &[],
        |r| {
            Ok(json!({
                "id": r.get::<_, i64>(0)?,
                "name": r.get::<_, String>(1)?,
                "capacity": r.get::<_, i64>(2)?,
                "gradeId": r.get::<_, i64>(3)?,
                "enrolled": r.get::<_, i64>(4)?,
            }))
        },
    )
}

/// Students a teacher may record against follow the same rule as `students.list`.
fn students(conn: &Connection, policy: WritePolicy, who: &Identity) -> Result<Value, HandlerErr> {
    let pred = match policy {
        WritePolicy::OwnedLesson => scope::apply(Predicate::new(), EntityKind::Student, who),
        _ => Predicate::new(),
    };
    let (where_sql, binds) = pred.to_sql();
    let params: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|b| b as &dyn rusqlite::ToSql).collect();
    options(
        conn,
        &format!(
            "SELECT s.id, s.name, s.surname FROM students s WHERE {} ORDER BY s.surname, s.name, s.id",
            where_sql
        ),
        &params,
        |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "surname": r.get::<_, String>(2)?,
            }))
        },
    )
}

/// Lessons the caller may attach records to: all for admins, own for teachers.
fn lessons(conn: &Connection, policy: WritePolicy, who: &Identity) -> Result<Value, HandlerErr> {
    let row: fn(&Row<'_>) -> rusqlite::Result<Value> =
        |r| Ok(json!({ "id": r.get::<_, i64>(0)?, "name": r.get::<_, String>(1)? }));
    match policy {
        WritePolicy::OwnedLesson => options(
            conn,
            "SELECT id, name FROM lessons WHERE teacher_id = ? ORDER BY name, id",
            &[&who.user_id],
            row,
        ),
        _ => options(conn, "SELECT id, name FROM lessons ORDER BY name, id", &[], row),
    }
}

fn graded_work(
    conn: &Connection,
    table: &str,
    policy: WritePolicy,
    who: &Identity,
) -> Result<Value, HandlerErr> {
    let row: fn(&Row<'_>) -> rusqlite::Result<Value> =
        |r| Ok(json!({ "id": r.get::<_, i64>(0)?, "title": r.get::<_, String>(1)?, "lessonId": r.get::<_, i64>(2)? }));
    match policy {
        WritePolicy::OwnedLesson => options(
            conn,
            &format!(
                "SELECT x.id, x.title, x.lesson_id FROM {} x
                 JOIN lessons l ON l.id = x.lesson_id
                 WHERE l.teacher_id = ? ORDER BY x.title, x.id",
                table
            ),
            &[&who.user_id],
            row,
        ),
        _ => options(
            conn,
            &format!("SELECT id, title, lesson_id FROM {} ORDER BY title, id", table),
            &[],
            row,
        ),
    }
}

fn handle_related_data(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let who = caller(state, req)?;
    let conn = db(state)?;
    let table = get_required_str(req, "table")?;
    let entity = form_entity(table).ok_or_else(|| {
        HandlerErr::new("bad_params", "unknown form table").with_details(json!({ "table": table }))
    })?;
    let policy = gate::policy_for(entity, &who);
    if policy == WritePolicy::Deny {
        return Err(HandlerErr::new("forbidden", format!("no write access to {}", table)));
    }

    let mut out = Map::new();
    match entity {
        WriteEntity::Subject => {
            out.insert("teachers".into(), teachers(conn)?);
        }
        WriteEntity::Class => {
            out.insert("teachers".into(), teachers(conn)?);
            out.insert("grades".into(), grades(conn)?);
        }
        WriteEntity::Teacher => {
            out.insert("subjects".into(), subjects(conn)?);
        }
        WriteEntity::Student => {
            out.insert("classes".into(), classes(conn)?);
            out.insert("grades".into(), grades(conn)?);
        }
        WriteEntity::Parent => {
            out.insert("students".into(), students(conn, policy, &who)?);
        }
        WriteEntity::Lesson => {
            out.insert("teachers".into(), teachers(conn)?);
            out.insert("subjects".into(), subjects(conn)?);
            out.insert("classes".into(), classes(conn)?);
        }
        WriteEntity::Exam | WriteEntity::Assignment => {
            out.insert("lessons".into(), lessons(conn, policy, &who)?);
        }
        WriteEntity::Result => {
            out.insert("students".into(), students(conn, policy, &who)?);
            out.insert("exams".into(), graded_work(conn, "exams", policy, &who)?);
            out.insert("assignments".into(), graded_work(conn, "assignments", policy, &who)?);
        }
        WriteEntity::Attendance => {
            out.insert("students".into(), students(conn, policy, &who)?);
            out.insert("lessons".into(), lessons(conn, policy, &who)?);
        }
        WriteEntity::Event | WriteEntity::Announcement => {
            out.insert("classes".into(), classes(conn)?);
        }
        WriteEntity::Grade => {}
    }
    Ok(Value::Object(out))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "forms.relatedData" => Some(reply(req, handle_related_data(state, req))),
        _ => None,
    }
}
