//! Mutation gatekeeper.
//!
//! Every create/update/delete goes through here: the caller's role is looked
//! up in [`WRITE_POLICIES`], lesson ownership is checked for teachers, class
//! capacity is enforced with a conditional insert, and writes that span the
//! identity provider and the store are coordinated with compensation.

use crate::identity::{Identity, IdentityError, IdentityProvider, NewUser, Role, UserPatch};
use crate::schema::ResultTarget;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEntity {
    Grade,
    Subject,
    Class,
    Teacher,
    Student,
    Parent,
    Lesson,
    Exam,
    Assignment,
    Announcement,
    Event,
    Attendance,
    Result,
}

impl WriteEntity {
    #[cfg(test)]
    pub const ALL: [WriteEntity; 13] = [
        WriteEntity::Grade,
        WriteEntity::Subject,
        WriteEntity::Class,
        WriteEntity::Teacher,
        WriteEntity::Student,
        WriteEntity::Parent,
        WriteEntity::Lesson,
        WriteEntity::Exam,
        WriteEntity::Assignment,
        WriteEntity::Announcement,
        WriteEntity::Event,
        WriteEntity::Attendance,
        WriteEntity::Result,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WriteEntity::Grade => "grade",
            WriteEntity::Subject => "subject",
            WriteEntity::Class => "class",
            WriteEntity::Teacher => "teacher",
            WriteEntity::Student => "student",
            WriteEntity::Parent => "parent",
            WriteEntity::Lesson => "lesson",
            WriteEntity::Exam => "exam",
            WriteEntity::Assignment => "assignment",
            WriteEntity::Announcement => "announcement",
            WriteEntity::Event => "event",
            WriteEntity::Attendance => "attendance",
            WriteEntity::Result => "result",
        }
    }

    /// Row condition restricting writes to rows whose lesson the teacher
    /// (bound as the single `?`) owns. Only lesson-bound entities have one.
    fn ownership_sql(self) -> Option<&'static str> {
        match self {
            WriteEntity::Lesson => Some("teacher_id = ?"),
            WriteEntity::Exam | WriteEntity::Assignment | WriteEntity::Attendance => {
                Some("lesson_id IN (SELECT id FROM lessons WHERE teacher_id = ?)")
            }
            WriteEntity::Result => Some(
                "COALESCE(
                   (SELECT lesson_id FROM exams WHERE exams.id = results.exam_id),
                   (SELECT lesson_id FROM assignments WHERE assignments.id = results.assignment_id)
                 ) IN (SELECT id FROM lessons WHERE teacher_id = ?)",
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    Allow,
    /// Allowed only for rows tied to a lesson the caller teaches.
    OwnedLesson,
    Deny,
}

#[derive(Debug, Clone, Copy)]
pub struct WriteRule {
    pub entity: WriteEntity,
    pub role: Role,
    pub policy: WritePolicy,
}

const fn write(entity: WriteEntity, role: Role, policy: WritePolicy) -> WriteRule {
    WriteRule {
        entity,
        role,
        policy,
    }
}

/// Entries not listed here are denied. Admins are allowed everywhere.
pub const WRITE_POLICIES: &[WriteRule] = &[
    write(WriteEntity::Lesson, Role::Teacher, WritePolicy::OwnedLesson),
    write(WriteEntity::Exam, Role::Teacher, WritePolicy::OwnedLesson),
    write(WriteEntity::Assignment, Role::Teacher, WritePolicy::OwnedLesson),
    write(WriteEntity::Attendance, Role::Teacher, WritePolicy::OwnedLesson),
    write(WriteEntity::Result, Role::Teacher, WritePolicy::OwnedLesson),
];

pub fn policy_for(entity: WriteEntity, identity: &Identity) -> WritePolicy {
    match identity.role {
        Some(Role::Admin) => WritePolicy::Allow,
        Some(role) => WRITE_POLICIES
            .iter()
            .find(|r| r.entity == entity && r.role == role)
            .map(|r| r.policy)
            .unwrap_or(WritePolicy::Deny),
        None => WritePolicy::Deny,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("{role} may not write {entity}")]
    Forbidden { role: String, entity: &'static str },
    #[error("lesson {0} is not taught by the caller")]
    NotOwned(i64),
    #[error("teacher does not teach subject {0}")]
    SubjectNotTaught(i64),
    #[error("{entity} {id} not found or not writable")]
    NotFound { entity: &'static str, id: String },
    #[error("class {0} is full")]
    ClassFull(i64),
    #[error("identity provider: {0}")]
    Identity(#[from] IdentityError),
    #[error("store: {0}")]
    Store(rusqlite::Error),
}

impl From<rusqlite::Error> for GateError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("class_full") => {
                GateError::ClassFull(0)
            }
            _ => GateError::Store(e),
        }
    }
}

/// Resolves the caller's write policy, rejecting `Deny` up front.
pub fn authorize(entity: WriteEntity, identity: &Identity) -> Result<WritePolicy, GateError> {
    match policy_for(entity, identity) {
        WritePolicy::Deny => Err(GateError::Forbidden {
            role: identity
                .role
                .map(|r| r.as_str().to_string())
                .unwrap_or_else(|| "unknown role".to_string()),
            entity: entity.name(),
        }),
        p => Ok(p),
    }
}

/// `WHERE` body plus binds addressing one row by id, narrowed to the caller's
/// own lessons under [`WritePolicy::OwnedLesson`].
#[derive(Debug, Clone, PartialEq)]
pub struct RowGuard {
    pub sql: String,
    pub binds: Vec<Value>,
}

pub fn row_guard(entity: WriteEntity, id: Value, policy: WritePolicy, identity: &Identity) -> RowGuard {
    match (policy, entity.ownership_sql()) {
        (WritePolicy::OwnedLesson, Some(owned)) => RowGuard {
            sql: format!("id = ? AND {}", owned),
            binds: vec![id, Value::Text(identity.user_id.clone())],
        },
        (WritePolicy::OwnedLesson, None) | (WritePolicy::Deny, _) => RowGuard {
            sql: "0".to_string(),
            binds: Vec::new(),
        },
        (WritePolicy::Allow, _) => RowGuard {
            sql: "id = ?".to_string(),
            binds: vec![id],
        },
    }
}

/// Deletes one row; zero affected rows (missing or not owned) is a failure.
pub fn delete_row(
    conn: &Connection,
    entity: WriteEntity,
    table: &str,
    id: Value,
    policy: WritePolicy,
    identity: &Identity,
) -> Result<(), GateError> {
    let shown = value_label(&id);
    let guard = row_guard(entity, id, policy, identity);
    let n = conn.execute(
        &format!("DELETE FROM {} WHERE {}", table, guard.sql),
        rusqlite::params_from_iter(guard.binds.iter()),
    )?;
    if n == 0 {
        return Err(GateError::NotFound {
            entity: entity.name(),
            id: shown,
        });
    }
    Ok(())
}

/// Runs `UPDATE table SET <assignments> WHERE <guard>`; zero rows is a failure.
#[allow(clippy::too_many_arguments)]
pub fn update_row(
    conn: &Connection,
    entity: WriteEntity,
    table: &str,
    assignments: &str,
    mut values: Vec<Value>,
    id: Value,
    policy: WritePolicy,
    identity: &Identity,
) -> Result<(), GateError> {
    let shown = value_label(&id);
    let guard = row_guard(entity, id, policy, identity);
    values.extend(guard.binds);
    let n = conn.execute(
        &format!("UPDATE {} SET {} WHERE {}", table, assignments, guard.sql),
        rusqlite::params_from_iter(values.iter()),
    )?;
    if n == 0 {
        return Err(GateError::NotFound {
            entity: entity.name(),
            id: shown,
        });
    }
    Ok(())
}

fn value_label(v: &Value) -> String {
    match v {
        Value::Integer(i) => i.to_string(),
        Value::Text(s) => s.clone(),
        other => format!("{:?}", other),
    }
}

pub fn teacher_owns_lesson(conn: &Connection, teacher_id: &str, lesson_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM lessons WHERE id = ? AND teacher_id = ?)",
        (lesson_id, teacher_id),
        |r| r.get(0),
    )
}

pub fn teacher_teaches_subject(conn: &Connection, teacher_id: &str, subject_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM teacher_subjects WHERE teacher_id = ? AND subject_id = ?)",
        (teacher_id, subject_id),
        |r| r.get(0),
    )
}

/// The lesson an exam or assignment belongs to.
pub fn lesson_of_target(conn: &Connection, target: ResultTarget) -> rusqlite::Result<Option<i64>> {
    let (sql, id) = match target {
        ResultTarget::Exam(id) => ("SELECT lesson_id FROM exams WHERE id = ?", id),
        ResultTarget::Assignment(id) => ("SELECT lesson_id FROM assignments WHERE id = ?", id),
    };
    conn.query_row(sql, [id], |r| r.get(0)).optional()
}

/// Checks the lesson a new or moved row will hang off.
pub fn check_lesson(
    conn: &Connection,
    policy: WritePolicy,
    identity: &Identity,
    lesson_id: i64,
) -> Result<(), GateError> {
    match policy {
        WritePolicy::Allow => Ok(()),
        WritePolicy::OwnedLesson => {
            if teacher_owns_lesson(conn, &identity.user_id, lesson_id)? {
                Ok(())
            } else {
                Err(GateError::NotOwned(lesson_id))
            }
        }
        WritePolicy::Deny => Err(GateError::NotOwned(lesson_id)),
    }
}

/// A teacher may only schedule lessons for themselves in subjects they teach.
pub fn check_lesson_assignment(
    conn: &Connection,
    policy: WritePolicy,
    identity: &Identity,
    teacher_id: &str,
    subject_id: i64,
) -> Result<(), GateError> {
    match policy {
        WritePolicy::Allow => Ok(()),
        WritePolicy::OwnedLesson if teacher_id == identity.user_id => {
            if teacher_teaches_subject(conn, teacher_id, subject_id)? {
                Ok(())
            } else {
                Err(GateError::SubjectNotTaught(subject_id))
            }
        }
        _ => Err(GateError::Forbidden {
            role: identity.role.map(|r| r.as_str()).unwrap_or("unknown role").to_string(),
            entity: WriteEntity::Lesson.name(),
        }),
    }
}

pub fn begin_immediate(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

/// Column values for a student row, in `STUDENT_COLUMNS` order after `id`.
#[derive(Debug, Clone)]
pub struct StudentRow {
    pub id: String,
    pub username: String,
    pub name: String,
    pub surname: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: String,
    pub img: Option<String>,
    pub blood_type: String,
    pub sex: &'static str,
    pub birthday: String,
    pub grade_id: i64,
    pub class_id: i64,
    pub parent_id: String,
}

fn class_full_or_missing(conn: &Connection, class_id: i64) -> GateError {
    match conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |_| Ok(()))
        .optional()
    {
        Ok(Some(())) => GateError::ClassFull(class_id),
        Ok(None) => GateError::NotFound {
            entity: "class",
            id: class_id.to_string(),
        },
        Err(e) => GateError::Store(e),
    }
}

fn fix_class(e: GateError, class_id: i64) -> GateError {
    match e {
        GateError::ClassFull(_) => GateError::ClassFull(class_id),
        other => other,
    }
}

/// Inserts a student only while the class has a free seat. The count and the
/// insert are one statement; run it inside [`begin_immediate`].
pub fn enroll_student(conn: &Connection, s: &StudentRow) -> Result<(), GateError> {
    let n = conn
        .execute(
            "INSERT INTO students(id, username, name, surname, email, phone, address, img,
                                  blood_type, sex, birthday, grade_id, class_id, parent_id)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14
             WHERE (SELECT COUNT(*) FROM students WHERE class_id = ?13)
                 < (SELECT capacity FROM classes WHERE id = ?13)",
            rusqlite::params![
                s.id,
                s.username,
                s.name,
                s.surname,
                s.email,
                s.phone,
                s.address,
                s.img,
                s.blood_type,
                s.sex,
                s.birthday,
                s.grade_id,
                s.class_id,
                s.parent_id
            ],
        )
        .map_err(|e| fix_class(e.into(), s.class_id))?;
    if n == 0 {
        return Err(class_full_or_missing(conn, s.class_id));
    }
    Ok(())
}

/// Updates a student; moving to another class needs a free seat there.
/// `password` changes are the identity provider's business and not stored.
pub fn update_student(conn: &Connection, s: &StudentRow) -> Result<(), GateError> {
    let n = conn
        .execute(
            "UPDATE students SET username = ?2, name = ?3, surname = ?4, email = ?5, phone = ?6,
                    address = ?7, img = ?8, blood_type = ?9, sex = ?10, birthday = ?11,
                    grade_id = ?12, class_id = ?13, parent_id = ?14
             WHERE id = ?1
               AND (class_id = ?13
                    OR (SELECT COUNT(*) FROM students WHERE class_id = ?13)
                       < (SELECT capacity FROM classes WHERE id = ?13))",
            rusqlite::params![
                s.id,
                s.username,
                s.name,
                s.surname,
                s.email,
                s.phone,
                s.address,
                s.img,
                s.blood_type,
                s.sex,
                s.birthday,
                s.grade_id,
                s.class_id,
                s.parent_id
            ],
        )
        .map_err(|e| fix_class(e.into(), s.class_id))?;
    if n == 0 {
        let exists = conn
            .query_row("SELECT 1 FROM students WHERE id = ?", [&s.id], |_| Ok(()))
            .optional()?;
        return Err(match exists {
            Some(()) => class_full_or_missing(conn, s.class_id),
            None => GateError::NotFound {
                entity: "student",
                id: s.id.clone(),
            },
        });
    }
    Ok(())
}

/// Creates the identity user first, then the store rows. If the store write
/// fails the identity user is deleted again.
pub fn create_with_identity<F>(
    provider: &dyn IdentityProvider,
    user: &NewUser,
    store: F,
) -> Result<String, GateError>
where
    F: FnOnce(&str) -> Result<(), GateError>,
{
    let id = provider.create_user(user)?;
    match store(&id) {
        Ok(()) => Ok(id),
        Err(e) => {
            match provider.delete_user(&id) {
                Ok(()) => tracing::warn!(user_id = %id, error = %e, "store write failed; identity user removed"),
                Err(c) => tracing::error!(
                    user_id = %id,
                    error = %e,
                    compensation_error = %c,
                    "store write failed and identity user could not be removed"
                ),
            }
            Err(e)
        }
    }
}

/// Updates the identity user, then the store. On store failure the captured
/// identity record is written back.
pub fn update_with_identity<F>(
    provider: &dyn IdentityProvider,
    id: &str,
    patch: &UserPatch,
    store: F,
) -> Result<(), GateError>
where
    F: FnOnce() -> Result<(), GateError>,
{
    let previous = provider.get_user(id)?.ok_or_else(|| GateError::NotFound {
        entity: "user",
        id: id.to_string(),
    })?;
    provider.update_user(id, patch)?;
    match store() {
        Ok(()) => Ok(()),
        Err(e) => {
            match provider.restore_user(&previous) {
                Ok(()) => tracing::warn!(user_id = %id, error = %e, "store write failed; identity user restored"),
                Err(c) => tracing::error!(
                    user_id = %id,
                    error = %e,
                    compensation_error = %c,
                    "store write failed and identity user could not be restored"
                ),
            }
            Err(e)
        }
    }
}

/// Deletes store rows in an open transaction, then the identity user. The
/// transaction commits only when the identity delete succeeded.
pub fn delete_with_identity<F>(
    conn: &Connection,
    provider: &dyn IdentityProvider,
    id: &str,
    store: F,
) -> Result<(), GateError>
where
    F: FnOnce(&Connection) -> Result<(), GateError>,
{
    let tx = conn.unchecked_transaction()?;
    store(&tx)?;
    provider.delete_user(id)?;
    tx.commit()?;
    Ok(())
}

/// Collapses a mutation result into the `{success, error}` reply. Failures are
/// logged here and never reach the caller in detail.
pub fn outcome(
    entity: WriteEntity,
    action: &'static str,
    result: Result<Option<String>, GateError>,
) -> serde_json::Value {
    match result {
        Ok(Some(id)) => {
            tracing::info!(entity = entity.name(), action, id = %id, "mutation applied");
            json!({ "success": true, "error": false, "id": id })
        }
        Ok(None) => {
            tracing::info!(entity = entity.name(), action, "mutation applied");
            json!({ "success": true, "error": false })
        }
        Err(e) => {
            match &e {
                GateError::Store(_) | GateError::Identity(IdentityError::Store(_)) => {
                    tracing::error!(entity = entity.name(), action, error = %e, "mutation failed")
                }
                _ => tracing::warn!(entity = entity.name(), action, error = %e, "mutation rejected"),
            }
            json!({ "success": false, "error": true })
        }
    }
}
