//! Typed mutation payloads.
//!
//! Every create/update method deserializes its params into one of these
//! structs and validates it before the store is touched. Numbers accept
//! numeric strings and dates accept several common spellings, matching what
//! form submissions send.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SchemaError {
    #[error("{0}")]
    Malformed(String),
    #[error("{field}: {message}")]
    Field {
        field: &'static str,
        message: String,
    },
}

fn field(field: &'static str, message: impl Into<String>) -> SchemaError {
    SchemaError::Field {
        field,
        message: message.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

#[derive(Debug, Clone, Copy)]
pub struct Rules {
    pub min_password_length: usize,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            min_password_length: 8,
        }
    }
}

pub trait Validate {
    fn validate(&self, rules: &Rules, mode: Mode) -> Result<(), SchemaError>;
}

pub fn parse<T: DeserializeOwned>(params: &Value) -> Result<T, SchemaError> {
    T::deserialize(params).map_err(|e| SchemaError::Malformed(e.to_string()))
}

pub fn parse_valid<T: DeserializeOwned + Validate>(
    params: &Value,
    rules: &Rules,
    mode: Mode,
) -> Result<T, SchemaError> {
    let v: T = parse(params)?;
    v.validate(rules, mode)?;
    Ok(v)
}

pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn fmt_datetime(v: &NaiveDateTime) -> String {
    v.format(DATETIME_FORMAT).to_string()
}

pub fn fmt_date(v: &NaiveDate) -> String {
    v.format(DATE_FORMAT).to_string()
}

pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let t = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(t, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

mod coerce {
    use super::*;

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        match Value::deserialize(d)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .ok_or_else(|| D::Error::custom("expected an integer")),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("expected an integer, got {:?}", s))),
            _ => Err(D::Error::custom("expected an integer")),
        }
    }

    pub fn opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            v => int(v).map(Some).map_err(D::Error::custom),
        }
    }

    pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        let v = match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        v.filter(|f| f.is_finite())
            .ok_or_else(|| D::Error::custom("expected a finite number"))
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::String(s) => {
                let t = s.trim();
                Ok((!t.is_empty()).then(|| t.to_string()))
            }
            Value::Number(n) => Ok(Some(n.to_string())),
            _ => Err(D::Error::custom("expected a string")),
        }
    }

    pub fn datetime<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(d)?;
        parse_datetime(&s).ok_or_else(|| D::Error::custom(format!("invalid date/time {:?}", s)))
    }

    pub fn date<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        datetime(d).map(|dt| dt.date())
    }

    pub fn id_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s),
                    Value::Number(n) => Ok(n.to_string()),
                    _ => Err(D::Error::custom("ids must be strings or numbers")),
                })
                .collect(),
            _ => Err(D::Error::custom("expected an array of ids")),
        }
    }

    pub fn text_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        match Value::deserialize(d)? {
            Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(D::Error::custom("expected an id")),
        }
    }

    pub fn opt_text_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            v => text_id(v).map(Some).map_err(D::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "MALE",
            Sex::Female => "FEMALE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Monday => "MONDAY",
            Weekday::Tuesday => "TUESDAY",
            Weekday::Wednesday => "WEDNESDAY",
            Weekday::Thursday => "THURSDAY",
            Weekday::Friday => "FRIDAY",
        }
    }
}

fn require_text(name: &'static str, v: &str) -> Result<(), SchemaError> {
    if v.trim().is_empty() {
        return Err(field(name, "is required"));
    }
    Ok(())
}

fn require_id<T>(mode: Mode, id: &Option<T>) -> Result<(), SchemaError> {
    if mode == Mode::Update && id.is_none() {
        return Err(field("id", "is required for updates"));
    }
    Ok(())
}

fn valid_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .map(|(a, b)| !a.is_empty() && !b.is_empty())
            .unwrap_or(false)
        && !s.chars().any(char::is_whitespace)
}

/// Login and contact fields shared by teachers, students and parents.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default, deserialize_with = "coerce::opt_text_id")]
    pub id: Option<String>,
    pub username: String,
    /// Empty on update means "keep the current password".
    #[serde(default, deserialize_with = "coerce::opt_text")]
    pub password: Option<String>,
    pub name: String,
    pub surname: String,
    #[serde(default, deserialize_with = "coerce::opt_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "coerce::opt_text")]
    pub phone: Option<String>,
    pub address: String,
}

impl Validate for Account {
    fn validate(&self, rules: &Rules, mode: Mode) -> Result<(), SchemaError> {
        require_id(mode, &self.id)?;
        let len = self.username.trim().chars().count();
        if !(3..=20).contains(&len) {
            return Err(field("username", "must be 3 to 20 characters"));
        }
        match (&self.password, mode) {
            (None, Mode::Create) => return Err(field("password", "is required")),
            (Some(p), _) if p.chars().count() < rules.min_password_length => {
                return Err(field(
                    "password",
                    format!("must be at least {} characters", rules.min_password_length),
                ))
            }
            _ => {}
        }
        require_text("name", &self.name)?;
        require_text("surname", &self.surname)?;
        if let Some(email) = &self.email {
            if !valid_email(email) {
                return Err(field("email", "invalid email address"));
            }
        }
        Ok(())
    }
}

/// Personal details for teachers and students.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, deserialize_with = "coerce::opt_text")]
    pub img: Option<String>,
    pub blood_type: String,
    #[serde(deserialize_with = "coerce::date")]
    pub birthday: NaiveDate,
    pub sex: Sex,
}

impl Profile {
    fn check(&self) -> Result<(), SchemaError> {
        require_text("bloodType", &self.blood_type)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherInput {
    #[serde(flatten)]
    pub account: Account,
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(default, deserialize_with = "coerce::id_list")]
    pub subjects: Vec<String>,
}

impl Validate for TeacherInput {
    fn validate(&self, rules: &Rules, mode: Mode) -> Result<(), SchemaError> {
        self.account.validate(rules, mode)?;
        self.profile.check()?;
        for s in &self.subjects {
            if s.trim().parse::<i64>().is_err() {
                return Err(field("subjects", format!("{:?} is not a subject id", s)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInput {
    #[serde(flatten)]
    pub account: Account,
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(deserialize_with = "coerce::int")]
    pub grade_id: i64,
    #[serde(deserialize_with = "coerce::int")]
    pub class_id: i64,
    #[serde(deserialize_with = "coerce::text_id")]
    pub parent_id: String,
}

impl Validate for StudentInput {
    fn validate(&self, rules: &Rules, mode: Mode) -> Result<(), SchemaError> {
        self.account.validate(rules, mode)?;
        self.profile.check()?;
        if self.grade_id < 1 {
            return Err(field("gradeId", "grade is required"));
        }
        if self.class_id < 1 {
            return Err(field("classId", "class is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentInput {
    #[serde(flatten)]
    pub account: Account,
    #[serde(default, deserialize_with = "coerce::id_list")]
    pub students: Vec<String>,
}

impl Validate for ParentInput {
    fn validate(&self, rules: &Rules, mode: Mode) -> Result<(), SchemaError> {
        self.account.validate(rules, mode)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeInput {
    #[serde(deserialize_with = "coerce::int")]
    pub level: i64,
}

impl Validate for GradeInput {
    fn validate(&self, _rules: &Rules, _mode: Mode) -> Result<(), SchemaError> {
        if self.level < 1 {
            return Err(field("level", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectInput {
    #[serde(default, deserialize_with = "coerce::opt_int")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default, deserialize_with = "coerce::id_list")]
    pub teachers: Vec<String>,
}

impl Validate for SubjectInput {
    fn validate(&self, _rules: &Rules, mode: Mode) -> Result<(), SchemaError> {
        require_id(mode, &self.id)?;
        require_text("name", &self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInput {
    #[serde(default, deserialize_with = "coerce::opt_int")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(deserialize_with = "coerce::int")]
    pub capacity: i64,
    #[serde(deserialize_with = "coerce::int")]
    pub grade_id: i64,
    #[serde(default, deserialize_with = "coerce::opt_text_id")]
    pub supervisor_id: Option<String>,
}

impl Validate for ClassInput {
    fn validate(&self, _rules: &Rules, mode: Mode) -> Result<(), SchemaError> {
        require_id(mode, &self.id)?;
        require_text("name", &self.name)?;
        if self.capacity < 1 {
            return Err(field("capacity", "must be at least 1"));
        }
        if self.grade_id < 1 {
            return Err(field("gradeId", "grade is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonInput {
    #[serde(default, deserialize_with = "coerce::opt_int")]
    pub id: Option<i64>,
    pub name: String,
    pub day: Weekday,
    #[serde(deserialize_with = "coerce::datetime")]
    pub start_time: NaiveDateTime,
    #[serde(deserialize_with = "coerce::datetime")]
    pub end_time: NaiveDateTime,
    #[serde(deserialize_with = "coerce::int")]
    pub subject_id: i64,
    #[serde(deserialize_with = "coerce::int")]
    pub class_id: i64,
    #[serde(deserialize_with = "coerce::text_id")]
    pub teacher_id: String,
}

impl Validate for LessonInput {
    fn validate(&self, _rules: &Rules, mode: Mode) -> Result<(), SchemaError> {
        require_id(mode, &self.id)?;
        require_text("name", &self.name)?;
        if self.end_time <= self.start_time {
            return Err(field("endTime", "must be after startTime"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamInput {
    #[serde(default, deserialize_with = "coerce::opt_int")]
    pub id: Option<i64>,
    pub title: String,
    #[serde(deserialize_with = "coerce::datetime")]
    pub start_time: NaiveDateTime,
    #[serde(deserialize_with = "coerce::datetime")]
    pub end_time: NaiveDateTime,
    #[serde(deserialize_with = "coerce::int")]
    pub lesson_id: i64,
}

impl Validate for ExamInput {
    fn validate(&self, _rules: &Rules, mode: Mode) -> Result<(), SchemaError> {
        require_id(mode, &self.id)?;
        require_text("title", &self.title)?;
        if self.end_time <= self.start_time {
            return Err(field("endTime", "must be after startTime"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentInput {
    #[serde(default, deserialize_with = "coerce::opt_int")]
    pub id: Option<i64>,
    pub title: String,
    #[serde(deserialize_with = "coerce::datetime")]
    pub start_date: NaiveDateTime,
    #[serde(deserialize_with = "coerce::datetime")]
    pub due_date: NaiveDateTime,
    #[serde(deserialize_with = "coerce::int")]
    pub lesson_id: i64,
}

impl Validate for AssignmentInput {
    fn validate(&self, _rules: &Rules, mode: Mode) -> Result<(), SchemaError> {
        require_id(mode, &self.id)?;
        require_text("title", &self.title)?;
        if self.due_date < self.start_date {
            return Err(field("dueDate", "must not be before startDate"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementInput {
    #[serde(default, deserialize_with = "coerce::opt_int")]
    pub id: Option<i64>,
    pub title: String,
    pub description: String,
    #[serde(deserialize_with = "coerce::datetime")]
    pub date: NaiveDateTime,
    #[serde(default, deserialize_with = "coerce::opt_int")]
    pub class_id: Option<i64>,
}

impl Validate for AnnouncementInput {
    fn validate(&self, _rules: &Rules, mode: Mode) -> Result<(), SchemaError> {
        require_id(mode, &self.id)?;
        require_text("title", &self.title)?;
        require_text("description", &self.description)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    #[serde(default, deserialize_with = "coerce::opt_int")]
    pub id: Option<i64>,
    pub title: String,
    pub description: String,
    #[serde(deserialize_with = "coerce::datetime")]
    pub start_time: NaiveDateTime,
    #[serde(deserialize_with = "coerce::datetime")]
    pub end_time: NaiveDateTime,
    #[serde(default, deserialize_with = "coerce::opt_int")]
    pub class_id: Option<i64>,
}

impl Validate for EventInput {
    fn validate(&self, _rules: &Rules, mode: Mode) -> Result<(), SchemaError> {
        require_id(mode, &self.id)?;
        require_text("title", &self.title)?;
        require_text("description", &self.description)?;
        if self.end_time <= self.start_time {
            return Err(field("endTime", "must be after startTime"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceInput {
    #[serde(default, deserialize_with = "coerce::opt_int")]
    pub id: Option<i64>,
    #[serde(deserialize_with = "coerce::datetime")]
    pub date: NaiveDateTime,
    #[serde(default)]
    pub present: bool,
    #[serde(deserialize_with = "coerce::text_id")]
    pub student_id: String,
    #[serde(deserialize_with = "coerce::int")]
    pub lesson_id: i64,
}

impl Validate for AttendanceInput {
    fn validate(&self, _rules: &Rules, mode: Mode) -> Result<(), SchemaError> {
        require_id(mode, &self.id)
    }
}

/// What a result is graded against: exactly one of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultTarget {
    Exam(i64),
    Assignment(i64),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultInput {
    #[serde(default, deserialize_with = "coerce::opt_int")]
    pub id: Option<i64>,
    #[serde(deserialize_with = "coerce::float")]
    pub score: f64,
    #[serde(default, deserialize_with = "coerce::opt_int")]
    pub exam_id: Option<i64>,
    #[serde(default, deserialize_with = "coerce::opt_int")]
    pub assignment_id: Option<i64>,
    #[serde(deserialize_with = "coerce::text_id")]
    pub student_id: String,
}

impl ResultInput {
    pub fn target(&self) -> Result<ResultTarget, SchemaError> {
        match (self.exam_id, self.assignment_id) {
            (Some(e), None) => Ok(ResultTarget::Exam(e)),
            (None, Some(a)) => Ok(ResultTarget::Assignment(a)),
            (Some(_), Some(_)) => Err(field(
                "examId",
                "a result belongs to an exam or an assignment, not both",
            )),
            (None, None) => Err(field("examId", "an exam or an assignment is required")),
        }
    }
}

impl Validate for ResultInput {
    fn validate(&self, _rules: &Rules, mode: Mode) -> Result<(), SchemaError> {
        require_id(mode, &self.id)?;
        self.target().map(|_| ())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteInput {
    #[serde(deserialize_with = "coerce::text_id")]
    pub id: String,
}

impl Validate for DeleteInput {
    fn validate(&self, _rules: &Rules, _mode: Mode) -> Result<(), SchemaError> {
        Ok(())
    }
}

/// Delete payload for tables keyed by integer ids.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteIntInput {
    #[serde(deserialize_with = "coerce::int")]
    pub id: i64,
}

impl Validate for DeleteIntInput {
    fn validate(&self, _rules: &Rules, _mode: Mode) -> Result<(), SchemaError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn student_payload() -> Value {
        json!({
            "username": "stud01",
            "password": "longenough",
            "name": "Sam",
            "surname": "Stone",
            "email": "",
            "address": "1 Road",
            "bloodType": "O+",
            "birthday": "2012-04-01",
            "sex": "MALE",
            "gradeId": "3",
            "classId": 2,
            "parentId": "user_p"
        })
    }

    #[test]
    fn student_payload_coerces_numbers_and_blank_email() {
        let s: StudentInput =
            parse_valid(&student_payload(), &Rules::default(), Mode::Create).expect("valid");
        assert_eq!(s.grade_id, 3);
        assert_eq!(s.class_id, 2);
        assert_eq!(s.account.email, None);
        assert_eq!(s.profile.sex, Sex::Male);
        assert_eq!(fmt_date(&s.profile.birthday), "2012-04-01");
    }

    #[test]
    fn enumerations_are_checked() {
        let mut p = student_payload();
        p["sex"] = json!("OTHER");
        assert!(matches!(
            parse::<StudentInput>(&p),
            Err(SchemaError::Malformed(_))
        ));

        let lesson = json!({
            "name": "Algebra",
            "day": "SATURDAY",
            "startTime": "2025-01-06T08:00",
            "endTime": "2025-01-06T09:00",
            "subjectId": 1,
            "classId": 1,
            "teacherId": "t1"
        });
        assert!(parse::<LessonInput>(&lesson).is_err());
    }

    #[test]
    fn password_rules_depend_on_mode() {
        let mut p = student_payload();
        p["password"] = json!("");
        let create = parse_valid::<StudentInput>(&p, &Rules::default(), Mode::Create);
        assert!(matches!(create, Err(SchemaError::Field { field: "password", .. })));

        p["id"] = json!("user_s");
        let update = parse_valid::<StudentInput>(&p, &Rules::default(), Mode::Update);
        assert!(update.is_ok());

        p["password"] = json!("short");
        let update = parse_valid::<StudentInput>(&p, &Rules::default(), Mode::Update);
        assert!(matches!(update, Err(SchemaError::Field { field: "password", .. })));
    }

    #[test]
    fn updates_require_an_id() {
        let exam = json!({
            "title": "Midterm",
            "startTime": "2025-02-01T09:00:00Z",
            "endTime": "2025-02-01T10:00:00Z",
            "lessonId": "4"
        });
        assert!(parse_valid::<ExamInput>(&exam, &Rules::default(), Mode::Create).is_ok());
        assert!(matches!(
            parse_valid::<ExamInput>(&exam, &Rules::default(), Mode::Update),
            Err(SchemaError::Field { field: "id", .. })
        ));
    }

    #[test]
    fn result_target_is_exactly_one() {
        let base = json!({ "score": "87.5", "studentId": "s1" });
        let mut exam = base.clone();
        exam["examId"] = json!(3);
        let r: ResultInput = parse_valid(&exam, &Rules::default(), Mode::Create).expect("valid");
        assert_eq!(r.target(), Ok(ResultTarget::Exam(3)));
        assert_eq!(r.score, 87.5);

        let mut both = exam.clone();
        both["assignmentId"] = json!(4);
        assert!(parse_valid::<ResultInput>(&both, &Rules::default(), Mode::Create).is_err());
        assert!(parse_valid::<ResultInput>(&base, &Rules::default(), Mode::Create).is_err());
    }

    #[test]
    fn time_ranges_are_ordered() {
        let ev = json!({
            "title": "Fair",
            "description": "Science fair",
            "startTime": "2025-03-01T12:00",
            "endTime": "2025-03-01T11:00"
        });
        assert!(matches!(
            parse_valid::<EventInput>(&ev, &Rules::default(), Mode::Create),
            Err(SchemaError::Field { field: "endTime", .. })
        ));
    }

    #[test]
    fn datetime_spellings() {
        assert!(parse_datetime("2025-01-06").is_some());
        assert!(parse_datetime("2025-01-06T08:30").is_some());
        assert!(parse_datetime("2025-01-06 08:30:00").is_some());
        assert!(parse_datetime("2025-01-06T08:30:00.250Z").is_some());
        assert!(parse_datetime("06/01/2025").is_none());
    }

    #[test]
    fn email_check() {
        assert!(valid_email("a@b.co"));
        assert!(!valid_email("a@b"));
        assert!(!valid_email("@b.co"));
        assert!(!valid_email("a b@c.de"));
    }
}
