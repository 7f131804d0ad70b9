//! Grades, subjects, classes and the lesson-bound records (lessons, exams,
//! assignments, attendance, results).

use crate::gate::{self, GateError, WriteEntity};
use crate::ipc::helpers::{mutation, reply, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::schema::{
    fmt_datetime, AssignmentInput, AttendanceInput, ClassInput, DeleteIntInput, ExamInput,
    GradeInput, LessonInput, Mode, ResultInput, SubjectInput,
};
use rusqlite::types::Value;
use rusqlite::Connection;

fn created(conn: &Connection) -> Option<String> {
    Some(conn.last_insert_rowid().to_string())
}

fn not_found(entity: &'static str, id: impl ToString) -> GateError {
    GateError::NotFound {
        entity,
        id: id.to_string(),
    }
}

// Every mutation below runs after `gate::authorize`; `ctx.policy` is Allow or
// OwnedLesson.

fn create_grade(ctx: &Ctx<'_>, v: GradeInput) -> Result<Option<String>, GateError> {
    ctx.conn
        .execute("INSERT INTO grades(level) VALUES(?)", [v.level])?;
    Ok(created(ctx.conn))
}

fn replace_subject_teachers(
    conn: &Connection,
    subject_id: i64,
    teachers: &[String],
) -> Result<(), GateError> {
    conn.execute(
        "DELETE FROM teacher_subjects WHERE subject_id = ?",
        [subject_id],
    )?;
    for t in teachers {
        conn.execute(
            "INSERT INTO teacher_subjects(teacher_id, subject_id) VALUES(?, ?)",
            (t, subject_id),
        )?;
    }
    Ok(())
}

fn create_subject(ctx: &Ctx<'_>, v: SubjectInput) -> Result<Option<String>, GateError> {
    let tx = ctx.conn.unchecked_transaction()?;
    tx.execute("INSERT INTO subjects(name) VALUES(?)", [v.name.trim()])?;
    let id = tx.last_insert_rowid();
    replace_subject_teachers(&tx, id, &v.teachers)?;
    tx.commit()?;
    Ok(Some(id.to_string()))
}

fn update_subject(ctx: &Ctx<'_>, v: SubjectInput) -> Result<Option<String>, GateError> {
    let id = v.id.ok_or_else(|| not_found("subject", "?"))?;
    let tx = ctx.conn.unchecked_transaction()?;
    gate::update_row(
        &tx,
        WriteEntity::Subject,
        "subjects",
        "name = ?",
        vec![Value::from(v.name.trim().to_string())],
        Value::Integer(id),
        ctx.policy,
        &ctx.who,
    )?;
    replace_subject_teachers(&tx, id, &v.teachers)?;
    tx.commit()?;
    Ok(None)
}

fn delete_subject(ctx: &Ctx<'_>, v: DeleteIntInput) -> Result<Option<String>, GateError> {
    let tx = ctx.conn.unchecked_transaction()?;
    tx.execute("DELETE FROM teacher_subjects WHERE subject_id = ?", [v.id])?;
    gate::delete_row(&tx, WriteEntity::Subject, "subjects", Value::Integer(v.id), ctx.policy, &ctx.who)?;
    tx.commit()?;
    Ok(None)
}

fn create_class(ctx: &Ctx<'_>, v: ClassInput) -> Result<Option<String>, GateError> {
    ctx.conn.execute(
        "INSERT INTO classes(name, capacity, grade_id, supervisor_id) VALUES(?, ?, ?, ?)",
        (v.name.trim(), v.capacity, v.grade_id, &v.supervisor_id),
    )?;
    Ok(created(ctx.conn))
}

/// Capacity may not drop below the number already enrolled.
fn update_class(ctx: &Ctx<'_>, v: ClassInput) -> Result<Option<String>, GateError> {
    let id = v.id.ok_or_else(|| not_found("class", "?"))?;
    let tx = gate::begin_immediate(ctx.conn)?;
    let enrolled: i64 = tx.query_row(
        "SELECT COUNT(*) FROM students WHERE class_id = ?",
        [id],
        |r| r.get(0),
    )?;
    if v.capacity < enrolled {
        return Err(GateError::ClassFull(id));
    }
    gate::update_row(
        &tx,
        WriteEntity::Class,
        "classes",
        "name = ?, capacity = ?, grade_id = ?, supervisor_id = ?",
        vec![
            Value::from(v.name.trim().to_string()),
            Value::from(v.capacity),
            Value::from(v.grade_id),
            Value::from(v.supervisor_id.clone()),
        ],
        Value::Integer(id),
        ctx.policy,
        &ctx.who,
    )?;
    tx.commit()?;
    Ok(None)
}

fn delete_class(ctx: &Ctx<'_>, v: DeleteIntInput) -> Result<Option<String>, GateError> {
    gate::delete_row(ctx.conn, WriteEntity::Class, "classes", Value::Integer(v.id), ctx.policy, &ctx.who)?;
    Ok(None)
}

fn create_lesson(ctx: &Ctx<'_>, v: LessonInput) -> Result<Option<String>, GateError> {
    gate::check_lesson_assignment(ctx.conn, ctx.policy, &ctx.who, &v.teacher_id, v.subject_id)?;
    ctx.conn.execute(
        "INSERT INTO lessons(name, day, start_time, end_time, subject_id, class_id, teacher_id)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            v.name.trim(),
            v.day.as_str(),
            fmt_datetime(&v.start_time),
            fmt_datetime(&v.end_time),
            v.subject_id,
            v.class_id,
            &v.teacher_id,
        ),
    )?;
    Ok(created(ctx.conn))
}

fn update_lesson(ctx: &Ctx<'_>, v: LessonInput) -> Result<Option<String>, GateError> {
    let id = v.id.ok_or_else(|| not_found("lesson", "?"))?;
    gate::check_lesson_assignment(ctx.conn, ctx.policy, &ctx.who, &v.teacher_id, v.subject_id)?;
    gate::update_row(
        ctx.conn,
        WriteEntity::Lesson,
        "lessons",
        "name = ?, day = ?, start_time = ?, end_time = ?, subject_id = ?, class_id = ?, teacher_id = ?",
        vec![
            Value::from(v.name.trim().to_string()),
            Value::from(v.day.as_str().to_string()),
            Value::from(fmt_datetime(&v.start_time)),
            Value::from(fmt_datetime(&v.end_time)),
            Value::from(v.subject_id),
            Value::from(v.class_id),
            Value::from(v.teacher_id.clone()),
        ],
        Value::Integer(id),
        ctx.policy,
        &ctx.who,
    )?;
    Ok(None)
}

fn create_exam(ctx: &Ctx<'_>, v: ExamInput) -> Result<Option<String>, GateError> {
    gate::check_lesson(ctx.conn, ctx.policy, &ctx.who, v.lesson_id)?;
    ctx.conn.execute(
        "INSERT INTO exams(title, start_time, end_time, lesson_id) VALUES(?, ?, ?, ?)",
        (
            v.title.trim(),
            fmt_datetime(&v.start_time),
            fmt_datetime(&v.end_time),
            v.lesson_id,
        ),
    )?;
    Ok(created(ctx.conn))
}

fn update_exam(ctx: &Ctx<'_>, v: ExamInput) -> Result<Option<String>, GateError> {
    let id = v.id.ok_or_else(|| not_found("exam", "?"))?;
    gate::check_lesson(ctx.conn, ctx.policy, &ctx.who, v.lesson_id)?;
    gate::update_row(
        ctx.conn,
        WriteEntity::Exam,
        "exams",
        "title = ?, start_time = ?, end_time = ?, lesson_id = ?",
        vec![
            Value::from(v.title.trim().to_string()),
            Value::from(fmt_datetime(&v.start_time)),
            Value::from(fmt_datetime(&v.end_time)),
            Value::from(v.lesson_id),
        ],
        Value::Integer(id),
        ctx.policy,
        &ctx.who,
    )?;
    Ok(None)
}

fn create_assignment(ctx: &Ctx<'_>, v: AssignmentInput) -> Result<Option<String>, GateError> {
    gate::check_lesson(ctx.conn, ctx.policy, &ctx.who, v.lesson_id)?;
    ctx.conn.execute(
        "INSERT INTO assignments(title, start_date, due_date, lesson_id) VALUES(?, ?, ?, ?)",
        (
            v.title.trim(),
            fmt_datetime(&v.start_date),
            fmt_datetime(&v.due_date),
            v.lesson_id,
        ),
    )?;
    Ok(created(ctx.conn))
}

fn update_assignment(ctx: &Ctx<'_>, v: AssignmentInput) -> Result<Option<String>, GateError> {
    let id = v.id.ok_or_else(|| not_found("assignment", "?"))?;
    gate::check_lesson(ctx.conn, ctx.policy, &ctx.who, v.lesson_id)?;
    gate::update_row(
        ctx.conn,
        WriteEntity::Assignment,
        "assignments",
        "title = ?, start_date = ?, due_date = ?, lesson_id = ?",
        vec![
            Value::from(v.title.trim().to_string()),
            Value::from(fmt_datetime(&v.start_date)),
            Value::from(fmt_datetime(&v.due_date)),
            Value::from(v.lesson_id),
        ],
        Value::Integer(id),
        ctx.policy,
        &ctx.who,
    )?;
    Ok(None)
}

fn create_attendance(ctx: &Ctx<'_>, v: AttendanceInput) -> Result<Option<String>, GateError> {
    gate::check_lesson(ctx.conn, ctx.policy, &ctx.who, v.lesson_id)?;
    ctx.conn.execute(
        "INSERT INTO attendance(date, present, student_id, lesson_id) VALUES(?, ?, ?, ?)",
        (fmt_datetime(&v.date), v.present, &v.student_id, v.lesson_id),
    )?;
    Ok(created(ctx.conn))
}

fn update_attendance(ctx: &Ctx<'_>, v: AttendanceInput) -> Result<Option<String>, GateError> {
    let id = v.id.ok_or_else(|| not_found("attendance", "?"))?;
    gate::check_lesson(ctx.conn, ctx.policy, &ctx.who, v.lesson_id)?;
    gate::update_row(
        ctx.conn,
        WriteEntity::Attendance,
        "attendance",
        "date = ?, present = ?, student_id = ?, lesson_id = ?",
        vec![
            Value::from(fmt_datetime(&v.date)),
            Value::from(v.present),
            Value::from(v.student_id.clone()),
            Value::from(v.lesson_id),
        ],
        Value::Integer(id),
        ctx.policy,
        &ctx.who,
    )?;
    Ok(None)
}

/// Results are owned through the lesson of the exam or assignment they grade.
fn result_lesson(ctx: &Ctx<'_>, v: &ResultInput) -> Result<(), GateError> {
    let target = v.target().map_err(|_| not_found("result target", "?"))?;
    let lesson = gate::lesson_of_target(ctx.conn, target)?
        .ok_or_else(|| not_found("result target", format!("{:?}", target)))?;
    gate::check_lesson(ctx.conn, ctx.policy, &ctx.who, lesson)
}

fn create_result(ctx: &Ctx<'_>, v: ResultInput) -> Result<Option<String>, GateError> {
    result_lesson(ctx, &v)?;
    ctx.conn.execute(
        "INSERT INTO results(score, exam_id, assignment_id, student_id) VALUES(?, ?, ?, ?)",
        (v.score, v.exam_id, v.assignment_id, &v.student_id),
    )?;
    Ok(created(ctx.conn))
}

fn update_result(ctx: &Ctx<'_>, v: ResultInput) -> Result<Option<String>, GateError> {
    let id = v.id.ok_or_else(|| not_found("result", "?"))?;
    result_lesson(ctx, &v)?;
    gate::update_row(
        ctx.conn,
        WriteEntity::Result,
        "results",
        "score = ?, exam_id = ?, assignment_id = ?, student_id = ?",
        vec![
            Value::from(v.score),
            Value::from(v.exam_id),
            Value::from(v.assignment_id),
            Value::from(v.student_id.clone()),
        ],
        Value::Integer(id),
        ctx.policy,
        &ctx.who,
    )?;
    Ok(None)
}

fn delete_in(
    entity: WriteEntity,
    table: &'static str,
) -> impl FnOnce(&Ctx<'_>, DeleteIntInput) -> Result<Option<String>, GateError> {
    move |ctx, v| {
        gate::delete_row(ctx.conn, entity, table, Value::Integer(v.id), ctx.policy, &ctx.who)?;
        Ok(None)
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    use WriteEntity as W;
    let result = match req.method.as_str() {
        "grades.create" => mutation(state, req, W::Grade, "create", Mode::Create, create_grade),

        "subjects.create" => mutation(state, req, W::Subject, "create", Mode::Create, create_subject),
        "subjects.update" => mutation(state, req, W::Subject, "update", Mode::Update, update_subject),
        "subjects.delete" => mutation(state, req, W::Subject, "delete", Mode::Update, delete_subject),

        "classes.create" => mutation(state, req, W::Class, "create", Mode::Create, create_class),
        "classes.update" => mutation(state, req, W::Class, "update", Mode::Update, update_class),
        "classes.delete" => mutation(state, req, W::Class, "delete", Mode::Update, delete_class),

        "lessons.create" => mutation(state, req, W::Lesson, "create", Mode::Create, create_lesson),
        "lessons.update" => mutation(state, req, W::Lesson, "update", Mode::Update, update_lesson),
        "lessons.delete" => {
            mutation(state, req, W::Lesson, "delete", Mode::Update, delete_in(W::Lesson, "lessons"))
        }

        "exams.create" => mutation(state, req, W::Exam, "create", Mode::Create, create_exam),
        "exams.update" => mutation(state, req, W::Exam, "update", Mode::Update, update_exam),
        "exams.delete" => {
            mutation(state, req, W::Exam, "delete", Mode::Update, delete_in(W::Exam, "exams"))
        }

        "assignments.create" => {
            mutation(state, req, W::Assignment, "create", Mode::Create, create_assignment)
        }
        "assignments.update" => {
            mutation(state, req, W::Assignment, "update", Mode::Update, update_assignment)
        }
        "assignments.delete" => mutation(
            state,
            req,
            W::Assignment,
            "delete",
            Mode::Update,
            delete_in(W::Assignment, "assignments"),
        ),

        "attendance.create" => {
            mutation(state, req, W::Attendance, "create", Mode::Create, create_attendance)
        }
        "attendance.update" => {
            mutation(state, req, W::Attendance, "update", Mode::Update, update_attendance)
        }
        "attendance.delete" => mutation(
            state,
            req,
            W::Attendance,
            "delete",
            Mode::Update,
            delete_in(W::Attendance, "attendance"),
        ),

        "results.create" => mutation(state, req, W::Result, "create", Mode::Create, create_result),
        "results.update" => mutation(state, req, W::Result, "update", Mode::Update, update_result),
        "results.delete" => {
            mutation(state, req, W::Result, "delete", Mode::Update, delete_in(W::Result, "results"))
        }
        _ => return None,
    };
    Some(reply(req, result))
}
