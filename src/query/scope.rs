//! Entitlement narrowing per `(entity, role)`.
//!
//! Admins have no rule and see everything. Every other role needs an entry in
//! [`SCOPE_RULES`]; a missing entry or a missing role denies all rows. The SQL
//! refers to the aliases used by the entity's `FROM` in [`super::entity`], and
//! each `?` binds the caller's user id.

use super::entity::EntityKind;
use super::entity::EntityKind as E;
use super::filter::{Clause, Predicate};
use crate::identity::{Identity, Role};
use crate::identity::Role as R;
use rusqlite::types::Value;

#[derive(Debug, Clone, Copy)]
pub struct ScopeRule {
    pub entity: EntityKind,
    pub role: Role,
    pub sql: &'static str,
}

const fn scope(entity: EntityKind, role: Role, sql: &'static str) -> ScopeRule {
    ScopeRule { entity, role, sql }
}

pub const SCOPE_RULES: &[ScopeRule] = &[
    scope(E::Class, R::Teacher, "c.supervisor_id = ?"),
    scope(
        E::Class,
        R::Student,
        "EXISTS (SELECT 1 FROM students ss WHERE ss.class_id = c.id AND ss.id = ?)",
    ),
    scope(
        E::Class,
        R::Parent,
        "EXISTS (SELECT 1 FROM students ss WHERE ss.class_id = c.id AND ss.parent_id = ?)",
    ),
    scope(E::Lesson, R::Teacher, "l.teacher_id = ?"),
    scope(
        E::Lesson,
        R::Student,
        "EXISTS (SELECT 1 FROM students ss WHERE ss.class_id = l.class_id AND ss.id = ?)",
    ),
    scope(
        E::Lesson,
        R::Parent,
        "EXISTS (SELECT 1 FROM students ss WHERE ss.class_id = l.class_id AND ss.parent_id = ?)",
    ),
    scope(E::Attendance, R::Teacher, "l.teacher_id = ?"),
    scope(E::Attendance, R::Student, "a.student_id = ?"),
    scope(E::Attendance, R::Parent, "st.parent_id = ?"),
    scope(
        E::Announcement,
        R::Teacher,
        "an.class_id IS NULL OR c.supervisor_id = ?",
    ),
    scope(
        E::Announcement,
        R::Student,
        "an.class_id IS NULL OR EXISTS (SELECT 1 FROM students ss WHERE ss.class_id = an.class_id AND ss.id = ?)",
    ),
    scope(
        E::Announcement,
        R::Parent,
        "an.class_id IS NULL OR EXISTS (SELECT 1 FROM students ss WHERE ss.class_id = an.class_id AND ss.parent_id = ?)",
    ),
    scope(
        E::Event,
        R::Teacher,
        "ev.class_id IS NULL OR c.supervisor_id = ?",
    ),
    scope(
        E::Event,
        R::Student,
        "ev.class_id IS NULL OR EXISTS (SELECT 1 FROM students ss WHERE ss.class_id = ev.class_id AND ss.id = ?)",
    ),
    scope(
        E::Event,
        R::Parent,
        "ev.class_id IS NULL OR EXISTS (SELECT 1 FROM students ss WHERE ss.class_id = ev.class_id AND ss.parent_id = ?)",
    ),
    scope(E::Exam, R::Teacher, "l.teacher_id = ?"),
    scope(
        E::Exam,
        R::Student,
        "EXISTS (SELECT 1 FROM students ss WHERE ss.class_id = l.class_id AND ss.id = ?)",
    ),
    scope(
        E::Exam,
        R::Parent,
        "EXISTS (SELECT 1 FROM students ss WHERE ss.class_id = l.class_id AND ss.parent_id = ?)",
    ),
    scope(E::Assignment, R::Teacher, "l.teacher_id = ?"),
    scope(
        E::Assignment,
        R::Student,
        "EXISTS (SELECT 1 FROM students ss WHERE ss.class_id = l.class_id AND ss.id = ?)",
    ),
    scope(
        E::Assignment,
        R::Parent,
        "EXISTS (SELECT 1 FROM students ss WHERE ss.class_id = l.class_id AND ss.parent_id = ?)",
    ),
    scope(E::Result, R::Teacher, "l.teacher_id = ?"),
    scope(E::Result, R::Student, "r.student_id = ?"),
    scope(E::Result, R::Parent, "st.parent_id = ?"),
    scope(
        E::Student,
        R::Teacher,
        "EXISTS (SELECT 1 FROM lessons sl WHERE sl.class_id = s.class_id AND sl.teacher_id = ?)",
    ),
    scope(E::Student, R::Student, "s.id = ?"),
    scope(E::Student, R::Parent, "s.parent_id = ?"),
];

pub fn lookup(entity: EntityKind, role: Role) -> Option<&'static ScopeRule> {
    SCOPE_RULES
        .iter()
        .find(|r| r.entity == entity && r.role == role)
}

/// The narrowing clause for `identity` on `entity`; `None` means unrestricted.
pub fn scope_clause(entity: EntityKind, identity: &Identity) -> Option<Clause> {
    match identity.role {
        Some(Role::Admin) => None,
        Some(role) => Some(match lookup(entity, role) {
            Some(rule) => Clause::Template {
                sql: rule.sql,
                value: Value::Text(identity.user_id.clone()),
            },
            None => Clause::Deny,
        }),
        None => Some(Clause::Deny),
    }
}

pub fn apply(predicate: Predicate, entity: EntityKind, identity: &Identity) -> Predicate {
    match scope_clause(entity, identity) {
        Some(clause) => predicate.and(clause),
        None => predicate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn who(role: Option<Role>) -> Identity {
        Identity {
            user_id: "u1".to_string(),
            role,
        }
    }

    #[test]
    fn every_entity_has_a_rule_for_every_non_admin_role() {
        for entity in EntityKind::ALL {
            for role in [Role::Teacher, Role::Student, Role::Parent] {
                assert!(
                    lookup(entity, role).is_some(),
                    "missing scope for {} / {}",
                    entity.table(),
                    role.as_str()
                );
            }
            assert!(lookup(entity, Role::Admin).is_none());
        }
    }

    #[test]
    fn rules_are_unique_per_key() {
        for (i, a) in SCOPE_RULES.iter().enumerate() {
            for b in &SCOPE_RULES[i + 1..] {
                assert!(!(a.entity == b.entity && a.role == b.role));
            }
        }
    }

    #[test]
    fn admin_is_unrestricted_and_missing_role_is_denied() {
        assert_eq!(scope_clause(EntityKind::Lesson, &who(Some(Role::Admin))), None);
        assert_eq!(
            scope_clause(EntityKind::Lesson, &who(None)),
            Some(Clause::Deny)
        );
    }

    #[test]
    fn teacher_attendance_is_bound_to_lesson_teacher() {
        let pred = apply(Predicate::new(), EntityKind::Attendance, &who(Some(Role::Teacher)));
        let (sql, binds) = pred.to_sql();
        assert_eq!(sql, "(l.teacher_id = ?)");
        assert_eq!(binds, vec![Value::Text("u1".into())]);
    }

    #[test]
    fn scope_narrows_rather_than_replaces_filters() {
        let base = Predicate::new().and(Clause::Eq {
            column: "l.teacher_id",
            value: Value::Text("someone-else".into()),
        });
        let scoped = apply(base, EntityKind::Lesson, &who(Some(Role::Teacher)));
        assert_eq!(scoped.clauses().len(), 2);
    }

    #[test]
    fn parent_announcements_include_global_rows() {
        let rule = lookup(EntityKind::Announcement, Role::Parent).expect("rule");
        assert!(rule.sql.starts_with("an.class_id IS NULL OR"));
        assert!(rule.sql.contains("parent_id = ?"));
    }
}
