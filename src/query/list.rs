use super::entity::EntityKind;
use super::filter::{build_predicate, Predicate};
use super::page::{PageWindow, DEFAULT_PAGE_SIZE};
use super::params::QueryParams;
use super::scope;
use super::sort::SortOrder;
use super::QueryError;
use crate::identity::Identity;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListDefaults {
    pub page_size: u32,
    pub sort: SortOrder,
}

impl Default for ListDefaults {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            sort: SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListRequest {
    pub kind: EntityKind,
    pub predicate: Predicate,
    pub order: SortOrder,
    pub window: PageWindow,
}

#[derive(Debug, Clone)]
pub struct ListPage {
    pub rows: Vec<serde_json::Value>,
    pub count: u64,
    pub order: SortOrder,
    pub window: PageWindow,
}

impl ListPage {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "rows": self.rows,
            "count": self.count,
            "page": self.window.page,
            "pageSize": self.window.size,
            "pageCount": self.window.page_count(self.count),
            "sortOrder": self.order.as_str(),
            "nextSortOrder": self.order.toggled().as_str(),
        })
    }
}

/// Filters, then role scope, then sort and window. Nothing here touches the
/// store, so the same inputs always give the same request.
pub fn build(
    kind: EntityKind,
    identity: &Identity,
    params: &QueryParams,
    defaults: &ListDefaults,
) -> Result<ListRequest, QueryError> {
    let base = build_predicate(kind.spec().filters, params)?;
    Ok(ListRequest {
        kind,
        predicate: scope::apply(base, kind, identity),
        order: SortOrder::resolve(params.sort_order(), defaults.sort),
        window: PageWindow::from_param(params.page(), defaults.page_size),
    })
}

fn order_by(kind: EntityKind, order: SortOrder) -> String {
    let spec = kind.spec();
    format!(
        "{} {}, {} ASC",
        spec.sort_column,
        order.as_sql(),
        spec.id_column
    )
}

/// Runs the page fetch and the count in one read transaction so both see the
/// same snapshot.
pub fn run(conn: &Connection, req: &ListRequest) -> Result<ListPage, QueryError> {
    if req.predicate.denies_all() {
        return Ok(ListPage {
            rows: Vec::new(),
            count: 0,
            order: req.order,
            window: req.window,
        });
    }
    let spec = req.kind.spec();
    let (where_sql, binds) = req.predicate.to_sql();

    let tx = conn.unchecked_transaction()?;
    let rows = {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            spec.columns,
            spec.from,
            where_sql,
            order_by(req.kind, req.order)
        );
        let mut page_binds = binds.clone();
        page_binds.push(Value::Integer(req.window.take() as i64));
        page_binds.push(Value::Integer(req.window.skip() as i64));
        let mut stmt = tx.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(page_binds.iter()), spec.row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };
    let count: i64 = tx.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE {}", spec.from, where_sql),
        params_from_iter(binds.iter()),
        |r| r.get(0),
    )?;
    tx.commit()?;

    Ok(ListPage {
        rows,
        count: count.max(0) as u64,
        order: req.order,
        window: req.window,
    })
}

/// Unpaged variant for views that show everything in a range (calendar).
pub fn fetch_all(
    conn: &Connection,
    kind: EntityKind,
    predicate: &Predicate,
    order: SortOrder,
) -> Result<Vec<serde_json::Value>, QueryError> {
    let spec = kind.spec();
    let (where_sql, binds) = predicate.to_sql();
    let sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}",
        spec.columns,
        spec.from,
        where_sql,
        order_by(kind, order)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds.iter()), spec.row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    fn admin() -> Identity {
        Identity {
            user_id: "admin".to_string(),
            role: Some(Role::Admin),
        }
    }

    fn seeded_store(lessons: usize) -> Connection {
        let ws = std::env::temp_dir().join(format!("schoold-list-{}", uuid::Uuid::new_v4()));
        let conn = crate::db::open_db(&ws).expect("open");
        conn.execute_batch(
            "INSERT INTO grades(level) VALUES(1);
             INSERT INTO subjects(name) VALUES('Math');
             INSERT INTO teachers(id, username, name, surname, address, blood_type, sex, birthday)
               VALUES('t1', 't1', 'Tom', 'Hill', 'x', 'A+', 'MALE', '1980-01-01'),
                     ('t2', 't2', 'Ann', 'Lake', 'x', 'B+', 'FEMALE', '1981-01-01');
             INSERT INTO classes(name, capacity, grade_id, supervisor_id) VALUES('1A', 30, 1, 't1');",
        )
        .expect("seed");
        for i in 0..lessons {
            let teacher = if i % 2 == 0 { "t1" } else { "t2" };
            conn.execute(
                "INSERT INTO lessons(name, day, start_time, end_time, subject_id, class_id, teacher_id)
                 VALUES(?, 'MONDAY', ?, ?, 1, 1, ?)",
                (
                    format!("Lesson {}", i),
                    format!("2025-01-06T08:{:02}:00", i),
                    format!("2025-01-06T09:{:02}:00", i),
                    teacher,
                ),
            )
            .expect("lesson");
        }
        conn
    }

    #[test]
    fn pages_cover_count_exactly() {
        let conn = seeded_store(23);
        let defaults = ListDefaults::default();
        let mut seen = 0;
        for page in 1..=3 {
            let p = page.to_string();
            let params = QueryParams::from_pairs([("page", p.as_str())]);
            let req = build(EntityKind::Lesson, &admin(), &params, &defaults).expect("build");
            let out = run(&conn, &req).expect("run");
            assert_eq!(out.count, 23);
            assert_eq!(out.rows.len() as u64, req.window.expected_rows(out.count));
            seen += out.rows.len();
        }
        assert_eq!(seen, 23);
    }

    #[test]
    fn descending_reverses_order_and_reissue_is_stable() {
        let conn = seeded_store(5);
        let defaults = ListDefaults::default();
        let asc = run(
            &conn,
            &build(EntityKind::Lesson, &admin(), &QueryParams::default(), &defaults).expect("build"),
        )
        .expect("asc");
        let desc_params = QueryParams::from_pairs([("sortOrder", "desc")]);
        let desc_req = build(EntityKind::Lesson, &admin(), &desc_params, &defaults).expect("build");
        let desc = run(&conn, &desc_req).expect("desc");
        let again = run(&conn, &desc_req).expect("again");

        let mut reversed = asc.rows.clone();
        reversed.reverse();
        assert_eq!(desc.rows, reversed);
        assert_eq!(again.rows, desc.rows);
        assert_eq!(again.count, desc.count);
    }

    #[test]
    fn teacher_sees_own_lessons_only() {
        let conn = seeded_store(6);
        let teacher = Identity {
            user_id: "t2".to_string(),
            role: Some(Role::Teacher),
        };
        let req = build(
            EntityKind::Lesson,
            &teacher,
            &QueryParams::default(),
            &ListDefaults::default(),
        )
        .expect("build");
        let out = run(&conn, &req).expect("run");
        assert_eq!(out.count, 3);
        assert!(out.rows.iter().all(|r| r["teacherId"] == "t2"));
    }

    #[test]
    fn missing_role_sees_nothing() {
        let conn = seeded_store(4);
        let nobody = Identity {
            user_id: "x".to_string(),
            role: None,
        };
        let req = build(
            EntityKind::Lesson,
            &nobody,
            &QueryParams::default(),
            &ListDefaults::default(),
        )
        .expect("build");
        let out = run(&conn, &req).expect("run");
        assert_eq!(out.count, 0);
        assert!(out.rows.is_empty());
    }

    /// Two of everything: side 1 (teacher t1, class 1A, student s1, parent p1)
    /// and side 2 (t2, 1B, s2, p2), plus one global announcement and event.
    /// Integer ids 1 belong to side 1 except for announcements and events,
    /// where 1 is global and 2 is side 1.
    fn two_sided_store() -> Connection {
        let ws = std::env::temp_dir().join(format!("schoold-scope-{}", uuid::Uuid::new_v4()));
        let conn = crate::db::open_db(&ws).expect("open");
        conn.execute_batch(
            "INSERT INTO grades(level) VALUES(1);
             INSERT INTO subjects(name) VALUES('Math');
             INSERT INTO teachers(id, username, name, surname, address, blood_type, sex, birthday)
               VALUES('t1', 't1', 'Émile', 'Roux', 'x', 'A+', 'MALE', '1980-01-01'),
                     ('t2', 't2', 'Ann', 'Lake', 'x', 'B+', 'FEMALE', '1981-01-01');
             INSERT INTO parents(id, username, name, surname, address)
               VALUES('p1', 'p1', 'Pia', 'One', 'x'), ('p2', 'p2', 'Per', 'Two', 'x');
             INSERT INTO classes(name, capacity, grade_id, supervisor_id)
               VALUES('1A', 30, 1, 't1'), ('1B', 30, 1, 't2');
             INSERT INTO students(id, username, name, surname, address, blood_type, sex, birthday,
                                  grade_id, class_id, parent_id)
               VALUES('s1', 's1', 'Ölaf', 'Ström', 'x', 'O-', 'MALE', '2014-01-01', 1, 1, 'p1'),
                     ('s2', 's2', 'Sam', 'Stone', 'x', 'O-', 'MALE', '2014-01-01', 1, 2, 'p2');
             INSERT INTO lessons(name, day, start_time, end_time, subject_id, class_id, teacher_id)
               VALUES('Math 1A', 'MONDAY', '2025-01-06T08:00:00', '2025-01-06T09:00:00', 1, 1, 't1'),
                     ('Math 1B', 'MONDAY', '2025-01-06T10:00:00', '2025-01-06T11:00:00', 1, 2, 't2');
             INSERT INTO exams(title, start_time, end_time, lesson_id)
               VALUES('Quiz 1A', '2025-02-03T08:00:00', '2025-02-03T09:00:00', 1),
                     ('Quiz 1B', '2025-02-03T10:00:00', '2025-02-03T11:00:00', 2);
             INSERT INTO assignments(title, start_date, due_date, lesson_id)
               VALUES('Essay 1A', '2025-02-01T00:00:00', '2025-02-10T00:00:00', 1),
                     ('Essay 1B', '2025-02-01T00:00:00', '2025-02-10T00:00:00', 2);
             INSERT INTO results(score, exam_id, assignment_id, student_id)
               VALUES(80, 1, NULL, 's1'), (70, NULL, 2, 's2');
             INSERT INTO attendance(date, present, student_id, lesson_id)
               VALUES('2025-01-06T08:00:00', 1, 's1', 1), ('2025-01-06T10:00:00', 0, 's2', 2);
             INSERT INTO announcements(title, description, date, class_id)
               VALUES('All', 'x', '2025-01-01T08:00:00', NULL),
                     ('For 1A', 'x', '2025-01-02T08:00:00', 1),
                     ('For 1B', 'x', '2025-01-03T08:00:00', 2);
             INSERT INTO events(title, description, start_time, end_time, class_id)
               VALUES('All', 'x', '2025-01-01T08:00:00', '2025-01-01T09:00:00', NULL),
                     ('For 1A', 'x', '2025-01-02T08:00:00', '2025-01-02T09:00:00', 1),
                     ('For 1B', 'x', '2025-01-03T08:00:00', '2025-01-03T09:00:00', 2);",
        )
        .expect("seed");
        conn
    }

    fn list_ids(
        conn: &Connection,
        kind: EntityKind,
        who: &Identity,
        params: &QueryParams,
    ) -> (u64, Vec<String>) {
        let req = build(kind, who, params, &ListDefaults::default()).expect("build");
        let out = run(conn, &req).expect("run");
        let mut ids: Vec<String> = out
            .rows
            .iter()
            .map(|r| match &r["id"] {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        ids.sort();
        (out.count, ids)
    }

    #[test]
    fn every_role_sees_only_its_side_and_never_more_than_admin() {
        let conn = two_sided_store();
        let side_one: &[(EntityKind, &[&str])] = &[
            (EntityKind::Class, &["1"]),
            (EntityKind::Lesson, &["1"]),
            (EntityKind::Attendance, &["1"]),
            (EntityKind::Announcement, &["1", "2"]),
            (EntityKind::Event, &["1", "2"]),
            (EntityKind::Exam, &["1"]),
            (EntityKind::Assignment, &["1"]),
            (EntityKind::Result, &["1"]),
            (EntityKind::Student, &["s1"]),
        ];
        assert_eq!(side_one.len(), EntityKind::ALL.len());

        for (kind, expected) in side_one {
            let (admin_count, admin_ids) =
                list_ids(&conn, *kind, &admin(), &QueryParams::default());
            assert!(
                admin_count > expected.len() as u64,
                "{} admin sees {:?}",
                kind.table(),
                admin_ids
            );
            for (role, user) in [(Role::Teacher, "t1"), (Role::Student, "s1"), (Role::Parent, "p1")] {
                let who = Identity {
                    user_id: user.to_string(),
                    role: Some(role),
                };
                let (count, ids) = list_ids(&conn, *kind, &who, &QueryParams::default());
                assert!(count <= admin_count);
                assert_eq!(
                    ids,
                    expected.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
                    "{} as {}",
                    kind.table(),
                    role.as_str()
                );
                assert!(ids.iter().all(|id| admin_ids.contains(id)));
            }
        }
    }

    #[test]
    fn search_folds_case_beyond_ascii() {
        let conn = two_sided_store();
        for needle in ["ölaf", "ÖLAF", "Ölaf", "STRÖM"] {
            let params = QueryParams::from_pairs([("search", needle)]);
            let (count, ids) = list_ids(&conn, EntityKind::Student, &admin(), &params);
            assert_eq!(count, 1, "search {:?}", needle);
            assert_eq!(ids, vec!["s1".to_string()]);
        }
        let params = QueryParams::from_pairs([("search", "émile")]);
        let (count, _) = list_ids(&conn, EntityKind::Lesson, &admin(), &params);
        assert_eq!(count, 1);
        let params = QueryParams::from_pairs([("search", "ÉMILE")]);
        let (count, _) = list_ids(&conn, EntityKind::Lesson, &admin(), &params);
        assert_eq!(count, 1);
    }
}
