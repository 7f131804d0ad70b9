//! Teachers, students and parents. Each one is a user in the identity provider
//! and a row in the store, so every write here goes through the gatekeeper's
//! compensating helpers.

use crate::gate::{self, GateError, StudentRow, WriteEntity};
use crate::identity::{NewUser, Role, UserPatch};
use crate::ipc::helpers::{mutation, reply, Ctx};
use crate::ipc::types::{AppState, Request};
use crate::schema::{fmt_date, Account, DeleteInput, Mode, ParentInput, StudentInput, TeacherInput};
use rusqlite::{params, Connection};

fn new_user(a: &Account, role: Role) -> NewUser {
    NewUser {
        username: a.username.trim().to_string(),
        password: a.password.clone().unwrap_or_default(),
        first_name: a.name.trim().to_string(),
        last_name: a.surname.trim().to_string(),
        role,
    }
}

fn user_patch(a: &Account) -> UserPatch {
    UserPatch {
        username: a.username.trim().to_string(),
        password: a.password.clone(),
        first_name: a.name.trim().to_string(),
        last_name: a.surname.trim().to_string(),
    }
}

fn account_id(a: &Account, entity: &'static str) -> Result<String, GateError> {
    a.id.clone().ok_or_else(|| GateError::NotFound {
        entity,
        id: "?".to_string(),
    })
}

fn require_changed(n: usize, entity: &'static str, id: &str) -> Result<(), GateError> {
    if n == 0 {
        return Err(GateError::NotFound {
            entity,
            id: id.to_string(),
        });
    }
    Ok(())
}

fn set_teacher_subjects(conn: &Connection, teacher_id: &str, subjects: &[String]) -> Result<(), GateError> {
    conn.execute("DELETE FROM teacher_subjects WHERE teacher_id = ?", [teacher_id])?;
    for s in subjects {
        let subject_id: i64 = s.trim().parse().map_err(|_| GateError::NotFound {
            entity: "subject",
            id: s.clone(),
        })?;
        conn.execute(
            "INSERT INTO teacher_subjects(teacher_id, subject_id) VALUES(?, ?)",
            (teacher_id, subject_id),
        )?;
    }
    Ok(())
}

fn create_teacher(ctx: &Ctx<'_>, v: TeacherInput) -> Result<Option<String>, GateError> {
    let (a, p) = (&v.account, &v.profile);
    let id = gate::create_with_identity(ctx.provider, &new_user(a, Role::Teacher), |id| {
        let tx = ctx.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO teachers(id, username, name, surname, email, phone, address, img,
                                  blood_type, sex, birthday)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                a.username.trim(),
                a.name.trim(),
                a.surname.trim(),
                a.email,
                a.phone,
                a.address,
                p.img,
                p.blood_type,
                p.sex.as_str(),
                fmt_date(&p.birthday)
            ],
        )?;
        set_teacher_subjects(&tx, id, &v.subjects)?;
        tx.commit()?;
        Ok(())
    })?;
    Ok(Some(id))
}

fn update_teacher(ctx: &Ctx<'_>, v: TeacherInput) -> Result<Option<String>, GateError> {
    let (a, p) = (&v.account, &v.profile);
    let id = account_id(a, "teacher")?;
    gate::update_with_identity(ctx.provider, &id, &user_patch(a), || {
        let tx = ctx.conn.unchecked_transaction()?;
        let n = tx.execute(
            "UPDATE teachers SET username = ?, name = ?, surname = ?, email = ?, phone = ?,
                    address = ?, img = ?, blood_type = ?, sex = ?, birthday = ?
             WHERE id = ?",
            params![
                a.username.trim(),
                a.name.trim(),
                a.surname.trim(),
                a.email,
                a.phone,
                a.address,
                p.img,
                p.blood_type,
                p.sex.as_str(),
                fmt_date(&p.birthday),
                id
            ],
        )?;
        require_changed(n, "teacher", &id)?;
        set_teacher_subjects(&tx, &id, &v.subjects)?;
        tx.commit()?;
        Ok(())
    })?;
    Ok(None)
}

fn delete_teacher(ctx: &Ctx<'_>, v: DeleteInput) -> Result<Option<String>, GateError> {
    gate::delete_with_identity(ctx.conn, ctx.provider, &v.id, |tx| {
        tx.execute("DELETE FROM teacher_subjects WHERE teacher_id = ?", [&v.id])?;
        let n = tx.execute("DELETE FROM teachers WHERE id = ?", [&v.id])?;
        require_changed(n, "teacher", &v.id)
    })?;
    Ok(None)
}

fn student_row(id: &str, v: &StudentInput) -> StudentRow {
    let (a, p) = (&v.account, &v.profile);
    StudentRow {
        id: id.to_string(),
        username: a.username.trim().to_string(),
        name: a.name.trim().to_string(),
        surname: a.surname.trim().to_string(),
        email: a.email.clone(),
        phone: a.phone.clone(),
        address: a.address.clone(),
        img: p.img.clone(),
        blood_type: p.blood_type.clone(),
        sex: p.sex.as_str(),
        birthday: fmt_date(&p.birthday),
        grade_id: v.grade_id,
        class_id: v.class_id,
        parent_id: v.parent_id.clone(),
    }
}

fn create_student(ctx: &Ctx<'_>, v: StudentInput) -> Result<Option<String>, GateError> {
    let id = gate::create_with_identity(ctx.provider, &new_user(&v.account, Role::Student), |id| {
        let tx = gate::begin_immediate(ctx.conn)?;
        gate::enroll_student(&tx, &student_row(id, &v))?;
        tx.commit()?;
        Ok(())
    })?;
    Ok(Some(id))
}

fn update_student(ctx: &Ctx<'_>, v: StudentInput) -> Result<Option<String>, GateError> {
    let id = account_id(&v.account, "student")?;
    gate::update_with_identity(ctx.provider, &id, &user_patch(&v.account), || {
        let tx = gate::begin_immediate(ctx.conn)?;
        gate::update_student(&tx, &student_row(&id, &v))?;
        tx.commit()?;
        Ok(())
    })?;
    Ok(None)
}

fn delete_student(ctx: &Ctx<'_>, v: DeleteInput) -> Result<Option<String>, GateError> {
    gate::delete_with_identity(ctx.conn, ctx.provider, &v.id, |tx| {
        let n = tx.execute("DELETE FROM students WHERE id = ?", [&v.id])?;
        require_changed(n, "student", &v.id)
    })?;
    Ok(None)
}

/// Listing a student under a parent moves the student to that parent.
fn adopt_students(conn: &Connection, parent_id: &str, students: &[String]) -> Result<(), GateError> {
    for s in students {
        let n = conn.execute(
            "UPDATE students SET parent_id = ? WHERE id = ?",
            (parent_id, s),
        )?;
        require_changed(n, "student", s)?;
    }
    Ok(())
}

fn create_parent(ctx: &Ctx<'_>, v: ParentInput) -> Result<Option<String>, GateError> {
    let a = &v.account;
    let id = gate::create_with_identity(ctx.provider, &new_user(a, Role::Parent), |id| {
        let tx = ctx.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO parents(id, username, name, surname, email, phone, address)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                a.username.trim(),
                a.name.trim(),
                a.surname.trim(),
                a.email,
                a.phone,
                a.address
            ],
        )?;
        adopt_students(&tx, id, &v.students)?;
        tx.commit()?;
        Ok(())
    })?;
    Ok(Some(id))
}

fn update_parent(ctx: &Ctx<'_>, v: ParentInput) -> Result<Option<String>, GateError> {
    let a = &v.account;
    let id = account_id(a, "parent")?;
    gate::update_with_identity(ctx.provider, &id, &user_patch(a), || {
        let tx = ctx.conn.unchecked_transaction()?;
        let n = tx.execute(
            "UPDATE parents SET username = ?, name = ?, surname = ?, email = ?, phone = ?, address = ?
             WHERE id = ?",
            params![
                a.username.trim(),
                a.name.trim(),
                a.surname.trim(),
                a.email,
                a.phone,
                a.address,
                id
            ],
        )?;
        require_changed(n, "parent", &id)?;
        adopt_students(&tx, &id, &v.students)?;
        tx.commit()?;
        Ok(())
    })?;
    Ok(None)
}

fn delete_parent(ctx: &Ctx<'_>, v: DeleteInput) -> Result<Option<String>, GateError> {
    gate::delete_with_identity(ctx.conn, ctx.provider, &v.id, |tx| {
        let n = tx.execute("DELETE FROM parents WHERE id = ?", [&v.id])?;
        require_changed(n, "parent", &v.id)
    })?;
    Ok(None)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    use WriteEntity as W;
    let result = match req.method.as_str() {
        "teachers.create" => mutation(state, req, W::Teacher, "create", Mode::Create, create_teacher),
        "teachers.update" => mutation(state, req, W::Teacher, "update", Mode::Update, update_teacher),
        "teachers.delete" => mutation(state, req, W::Teacher, "delete", Mode::Update, delete_teacher),
        "students.create" => mutation(state, req, W::Student, "create", Mode::Create, create_student),
        "students.update" => mutation(state, req, W::Student, "update", Mode::Update, update_student),
        "students.delete" => mutation(state, req, W::Student, "delete", Mode::Update, delete_student),
        "parents.create" => mutation(state, req, W::Parent, "create", Mode::Create, create_parent),
        "parents.update" => mutation(state, req, W::Parent, "update", Mode::Update, update_parent),
        "parents.delete" => mutation(state, req, W::Parent, "delete", Mode::Update, delete_parent),
        _ => return None,
    };
    Some(reply(req, result))
}
