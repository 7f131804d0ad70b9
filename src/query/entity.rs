use super::filter::{rule, FilterKind, FilterRule};
use rusqlite::Row;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Class,
    Lesson,
    Attendance,
    Announcement,
    Event,
    Exam,
    Assignment,
    Result,
    Student,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Class,
        EntityKind::Lesson,
        EntityKind::Attendance,
        EntityKind::Announcement,
        EntityKind::Event,
        EntityKind::Exam,
        EntityKind::Assignment,
        EntityKind::Result,
        EntityKind::Student,
    ];

    /// Method prefix used on the wire, e.g. `lessons` for `lessons.list`.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Class => "classes",
            EntityKind::Lesson => "lessons",
            EntityKind::Attendance => "attendance",
            EntityKind::Announcement => "announcements",
            EntityKind::Event => "events",
            EntityKind::Exam => "exams",
            EntityKind::Assignment => "assignments",
            EntityKind::Result => "results",
            EntityKind::Student => "students",
        }
    }

    pub fn from_table(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.table() == s)
    }

    pub fn spec(self) -> &'static EntitySpec {
        match self {
            EntityKind::Class => &CLASSES,
            EntityKind::Lesson => &LESSONS,
            EntityKind::Attendance => &ATTENDANCE,
            EntityKind::Announcement => &ANNOUNCEMENTS,
            EntityKind::Event => &EVENTS,
            EntityKind::Exam => &EXAMS,
            EntityKind::Assignment => &ASSIGNMENTS,
            EntityKind::Result => &RESULTS,
            EntityKind::Student => &STUDENTS,
        }
    }
}

/// How one entity's list is read: the joined `FROM`, selected columns, the
/// single sortable field, recognised filters and the row shape.
pub struct EntitySpec {
    pub from: &'static str,
    pub columns: &'static str,
    pub sort_column: &'static str,
    pub id_column: &'static str,
    pub filters: &'static [FilterRule],
    pub row: fn(&Row<'_>) -> rusqlite::Result<Value>,
}

fn full_name(row: &Row<'_>, name: usize, surname: usize) -> rusqlite::Result<String> {
    let n: String = row.get(name)?;
    let s: String = row.get(surname)?;
    Ok(format!("{} {}", n, s))
}

fn optional_full_name(row: &Row<'_>, name: usize, surname: usize) -> rusqlite::Result<Option<String>> {
    let n: Option<String> = row.get(name)?;
    let s: Option<String> = row.get(surname)?;
    Ok(match (n, s) {
        (Some(n), Some(s)) => Some(format!("{} {}", n, s)),
        _ => None,
    })
}

pub static CLASSES: EntitySpec = EntitySpec {
    from: "classes c
    JOIN grades g ON g.id = c.grade_id
    LEFT JOIN teachers sup ON sup.id = c.supervisor_id",
    columns: "c.id, c.name, c.capacity, g.level, c.supervisor_id, sup.name, sup.surname, c.created_at,
    (SELECT COUNT(*) FROM students es WHERE es.class_id = c.id)",
    sort_column: "c.created_at",
    id_column: "c.id",
    filters: &[
        rule("search", FilterKind::Search(&["c.name"])),
        rule("supervisorId", FilterKind::TextEq("c.supervisor_id")),
        rule("supervisor", FilterKind::TextEq("c.supervisor_id")),
    ],
    row: |r| {
        Ok(json!({
            "id": r.get::<_, i64>(0)?,
            "name": r.get::<_, String>(1)?,
            "capacity": r.get::<_, i64>(2)?,
            "grade": r.get::<_, i64>(3)?,
            "supervisorId": r.get::<_, Option<String>>(4)?,
            "supervisor": optional_full_name(r, 5, 6)?,
            "createdAt": r.get::<_, String>(7)?,
            "enrolled": r.get::<_, i64>(8)?,
        }))
    },
};

pub static LESSONS: EntitySpec = EntitySpec {
    from: "lessons l
    JOIN subjects sub ON sub.id = l.subject_id
    JOIN classes c ON c.id = l.class_id
    JOIN teachers t ON t.id = l.teacher_id",
    columns: "l.id, l.name, l.day, l.start_time, l.end_time, sub.name, c.id, c.name, t.id, t.name, t.surname",
    sort_column: "l.start_time",
    id_column: "l.id",
    filters: &[
        rule("search", FilterKind::Search(&["sub.name", "t.name"])),
        rule("classId", FilterKind::IntEq("l.class_id")),
        rule("teacherId", FilterKind::TextEq("l.teacher_id")),
    ],
    row: |r| {
        Ok(json!({
            "id": r.get::<_, i64>(0)?,
            "name": r.get::<_, String>(1)?,
            "day": r.get::<_, String>(2)?,
            "startTime": r.get::<_, String>(3)?,
            "endTime": r.get::<_, String>(4)?,
            "subject": r.get::<_, String>(5)?,
            "classId": r.get::<_, i64>(6)?,
            "class": r.get::<_, String>(7)?,
            "teacherId": r.get::<_, String>(8)?,
            "teacher": full_name(r, 9, 10)?,
        }))
    },
};

pub static ATTENDANCE: EntitySpec = EntitySpec {
    from: "attendance a
    JOIN students st ON st.id = a.student_id
    JOIN lessons l ON l.id = a.lesson_id
    JOIN subjects sub ON sub.id = l.subject_id
    JOIN classes c ON c.id = l.class_id
    JOIN teachers t ON t.id = l.teacher_id",
    columns: "a.id, a.date, a.present, st.id, st.name, st.surname, l.id, sub.name, c.name, t.id, t.name, t.surname",
    sort_column: "a.date",
    id_column: "a.id",
    filters: &[
        rule("search", FilterKind::Search(&["st.name", "st.surname"])),
        rule("classId", FilterKind::IntEq("l.class_id")),
        rule("teacherId", FilterKind::TextEq("l.teacher_id")),
        rule("studentId", FilterKind::TextEq("a.student_id")),
    ],
    row: |r| {
        Ok(json!({
            "id": r.get::<_, i64>(0)?,
            "date": r.get::<_, String>(1)?,
            "present": r.get::<_, i64>(2)? != 0,
            "studentId": r.get::<_, String>(3)?,
            "studentName": full_name(r, 4, 5)?,
            "lessonId": r.get::<_, i64>(6)?,
            "subject": r.get::<_, String>(7)?,
            "class": r.get::<_, String>(8)?,
            "teacherId": r.get::<_, String>(9)?,
            "teacher": full_name(r, 10, 11)?,
        }))
    },
};

pub static ANNOUNCEMENTS: EntitySpec = EntitySpec {
    from: "announcements an
    LEFT JOIN classes c ON c.id = an.class_id",
    columns: "an.id, an.title, an.description, an.date, an.class_id, c.name",
    sort_column: "an.date",
    id_column: "an.id",
    filters: &[
        rule("search", FilterKind::Search(&["an.title"])),
        rule("classId", FilterKind::IntEq("an.class_id")),
    ],
    row: |r| {
        Ok(json!({
            "id": r.get::<_, i64>(0)?,
            "title": r.get::<_, String>(1)?,
            "description": r.get::<_, String>(2)?,
            "date": r.get::<_, String>(3)?,
            "classId": r.get::<_, Option<i64>>(4)?,
            "class": r.get::<_, Option<String>>(5)?,
        }))
    },
};

pub static EVENTS: EntitySpec = EntitySpec {
    from: "events ev
    LEFT JOIN classes c ON c.id = ev.class_id",
    columns: "ev.id, ev.title, ev.description, ev.start_time, ev.end_time, ev.class_id, c.name",
    sort_column: "ev.start_time",
    id_column: "ev.id",
    filters: &[
        rule("search", FilterKind::Search(&["ev.title"])),
        rule("classId", FilterKind::IntEq("ev.class_id")),
    ],
    row: |r| {
        Ok(json!({
            "id": r.get::<_, i64>(0)?,
            "title": r.get::<_, String>(1)?,
            "description": r.get::<_, String>(2)?,
            "startTime": r.get::<_, String>(3)?,
            "endTime": r.get::<_, String>(4)?,
            "classId": r.get::<_, Option<i64>>(5)?,
            "class": r.get::<_, Option<String>>(6)?,
        }))
    },
};

fn lesson_work_row(r: &Row<'_>, time_keys: (&str, &str)) -> rusqlite::Result<Value> {
    let mut v = json!({
        "id": r.get::<_, i64>(0)?,
        "title": r.get::<_, String>(1)?,
        "lessonId": r.get::<_, i64>(4)?,
        "subject": r.get::<_, String>(5)?,
        "classId": r.get::<_, i64>(6)?,
        "class": r.get::<_, String>(7)?,
        "teacherId": r.get::<_, String>(8)?,
        "teacher": full_name(r, 9, 10)?,
    });
    v[time_keys.0] = Value::String(r.get(2)?);
    v[time_keys.1] = Value::String(r.get(3)?);
    Ok(v)
}

pub static EXAMS: EntitySpec = EntitySpec {
    from: "exams ex
    JOIN lessons l ON l.id = ex.lesson_id
    JOIN subjects sub ON sub.id = l.subject_id
    JOIN classes c ON c.id = l.class_id
    JOIN teachers t ON t.id = l.teacher_id",
    columns: "ex.id, ex.title, ex.start_time, ex.end_time, l.id, sub.name, c.id, c.name, t.id, t.name, t.surname",
    sort_column: "ex.start_time",
    id_column: "ex.id",
    filters: &[
        rule("search", FilterKind::Search(&["ex.title", "sub.name"])),
        rule("classId", FilterKind::IntEq("l.class_id")),
        rule("teacherId", FilterKind::TextEq("l.teacher_id")),
    ],
    row: |r| lesson_work_row(r, ("startTime", "endTime")),
};

pub static ASSIGNMENTS: EntitySpec = EntitySpec {
    from: "assignments asg
    JOIN lessons l ON l.id = asg.lesson_id
    JOIN subjects sub ON sub.id = l.subject_id
    JOIN classes c ON c.id = l.class_id
    JOIN teachers t ON t.id = l.teacher_id",
    columns: "asg.id, asg.title, asg.start_date, asg.due_date, l.id, sub.name, c.id, c.name, t.id, t.name, t.surname",
    sort_column: "asg.due_date",
    id_column: "asg.id",
    filters: &[
        rule("search", FilterKind::Search(&["asg.title", "sub.name"])),
        rule("classId", FilterKind::IntEq("l.class_id")),
        rule("teacherId", FilterKind::TextEq("l.teacher_id")),
    ],
    row: |r| lesson_work_row(r, ("startDate", "dueDate")),
};

pub static RESULTS: EntitySpec = EntitySpec {
    from: "results r
    JOIN students st ON st.id = r.student_id
    LEFT JOIN exams ex ON ex.id = r.exam_id
    LEFT JOIN assignments asg ON asg.id = r.assignment_id
    JOIN lessons l ON l.id = COALESCE(ex.lesson_id, asg.lesson_id)
    JOIN classes c ON c.id = l.class_id
    JOIN teachers t ON t.id = l.teacher_id",
    columns: "r.id, r.score, r.exam_id, r.assignment_id, COALESCE(ex.title, asg.title),
    COALESCE(ex.start_time, asg.start_date), st.id, st.name, st.surname, c.name, t.id, t.name, t.surname",
    sort_column: "r.id",
    id_column: "r.id",
    filters: &[
        rule(
            "search",
            FilterKind::Search(&["ex.title", "asg.title", "st.name", "st.surname"]),
        ),
        rule("studentId", FilterKind::TextEq("r.student_id")),
    ],
    row: |r| {
        let exam_id: Option<i64> = r.get(2)?;
        let kind = if exam_id.is_some() { "exam" } else { "assignment" };
        Ok(json!({
            "id": r.get::<_, i64>(0)?,
            "score": r.get::<_, f64>(1)?,
            "type": kind,
            "examId": exam_id,
            "assignmentId": r.get::<_, Option<i64>>(3)?,
            "title": r.get::<_, String>(4)?,
            "startTime": r.get::<_, String>(5)?,
            "studentId": r.get::<_, String>(6)?,
            "studentName": full_name(r, 7, 8)?,
            "class": r.get::<_, String>(9)?,
            "teacherId": r.get::<_, String>(10)?,
            "teacher": full_name(r, 11, 12)?,
        }))
    },
};

pub static STUDENTS: EntitySpec = EntitySpec {
    from: "students s
    JOIN classes c ON c.id = s.class_id
    JOIN grades g ON g.id = s.grade_id",
    columns: "s.id, s.username, s.name, s.surname, s.email, s.phone, s.address, s.img, s.sex,
    s.birthday, g.level, c.id, c.name, s.parent_id",
    sort_column: "s.surname",
    id_column: "s.id",
    filters: &[
        rule("search", FilterKind::Search(&["s.name", "s.surname"])),
        rule("classId", FilterKind::IntEq("s.class_id")),
        rule(
            "teacherId",
            FilterKind::TextTemplate(
                "EXISTS (SELECT 1 FROM lessons fl WHERE fl.class_id = s.class_id AND fl.teacher_id = ?)",
            ),
        ),
    ],
    row: |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "username": r.get::<_, String>(1)?,
            "name": r.get::<_, String>(2)?,
            "surname": r.get::<_, String>(3)?,
            "email": r.get::<_, Option<String>>(4)?,
            "phone": r.get::<_, Option<String>>(5)?,
            "address": r.get::<_, String>(6)?,
            "img": r.get::<_, Option<String>>(7)?,
            "sex": r.get::<_, String>(8)?,
            "birthday": r.get::<_, String>(9)?,
            "grade": r.get::<_, i64>(10)?,
            "classId": r.get::<_, i64>(11)?,
            "class": r.get::<_, String>(12)?,
            "parentId": r.get::<_, String>(13)?,
        }))
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_table(kind.table()), Some(kind));
            assert!(kind.spec().from.trim_start().starts_with(kind.table()));
        }
        assert_eq!(EntityKind::from_table("teachers"), None);
    }

    #[test]
    fn every_entity_supports_search() {
        for kind in EntityKind::ALL {
            assert!(
                kind.spec().filters.iter().any(|f| f.key == "search"),
                "{} has no search filter",
                kind.table()
            );
        }
    }
}
