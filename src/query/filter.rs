use super::params::QueryParams;
use super::QueryError;
use rusqlite::types::Value;

/// One condition of a list predicate. Clauses are AND-ed together.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Eq {
        column: &'static str,
        value: Value,
    },
    /// Case-insensitive substring match over any of `columns`.
    Contains {
        columns: &'static [&'static str],
        needle: String,
    },
    /// A fixed SQL condition; every `?` binds `value`.
    Template { sql: &'static str, value: Value },
    /// Matches nothing.
    Deny,
}

impl Clause {
    fn write_sql(&self, sql: &mut String, binds: &mut Vec<Value>) {
        match self {
            Clause::Eq { column, value } => {
                sql.push_str(column);
                sql.push_str(" = ?");
                binds.push(value.clone());
            }
            Clause::Contains { columns, needle } => {
                sql.push('(');
                for (i, col) in columns.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(" OR ");
                    }
                    sql.push_str("instr(fold(");
                    sql.push_str(col);
                    sql.push_str("), fold(?)) > 0");
                    binds.push(Value::Text(needle.clone()));
                }
                sql.push(')');
            }
            Clause::Template { sql: template, value } => {
                sql.push('(');
                sql.push_str(template);
                sql.push(')');
                for _ in template.matches('?') {
                    binds.push(value.clone());
                }
            }
            Clause::Deny => sql.push_str("0"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    #[cfg(test)]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn denies_all(&self) -> bool {
        self.clauses.iter().any(|c| matches!(c, Clause::Deny))
    }

    /// Renders a `WHERE` body (`1` when empty) and its positional binds.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut binds = Vec::new();
        if self.clauses.is_empty() {
            sql.push('1');
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            clause.write_sql(&mut sql, &mut binds);
        }
        (sql, binds)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FilterKind {
    Search(&'static [&'static str]),
    TextEq(&'static str),
    IntEq(&'static str),
    TextTemplate(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct FilterRule {
    pub key: &'static str,
    pub kind: FilterKind,
}

pub const fn rule(key: &'static str, kind: FilterKind) -> FilterRule {
    FilterRule { key, kind }
}

fn parse_int(key: &str, raw: &str) -> Result<i64, QueryError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| QueryError::NotAnInteger {
            key: key.to_string(),
            value: raw.to_string(),
        })
}

/// Builds a fresh predicate from the recognised filter keys. Unknown keys are
/// ignored; malformed integer ids reject the whole request.
pub fn build_predicate(rules: &[FilterRule], params: &QueryParams) -> Result<Predicate, QueryError> {
    let mut pred = Predicate::new();
    for (key, raw) in params.filters() {
        let Some(rule) = rules.iter().find(|r| r.key == key) else {
            continue;
        };
        let clause = match rule.kind {
            FilterKind::Search(columns) => {
                let needle = raw.trim();
                if needle.is_empty() {
                    continue;
                }
                Clause::Contains {
                    columns,
                    needle: needle.to_string(),
                }
            }
            FilterKind::TextEq(column) => Clause::Eq {
                column,
                value: Value::Text(raw.to_string()),
            },
            FilterKind::IntEq(column) => Clause::Eq {
                column,
                value: Value::Integer(parse_int(key, raw)?),
            },
            FilterKind::TextTemplate(sql) => Clause::Template {
                sql,
                value: Value::Text(raw.to_string()),
            },
        };
        pred = pred.and(clause);
    }
    Ok(pred)
}
