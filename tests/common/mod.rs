#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub const ADMIN_PASSWORD: &str = "admin-pass-1";
pub const USER_PASSWORD: &str = "user-pass-1";

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Sidecar {
    pub fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_schoold");
        let mut child = Command::new(exe)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn schoold");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
        }
    }

    pub fn send_raw(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    /// Full response envelope for one call.
    pub fn request(&mut self, session: Option<&str>, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let mut payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        if let Some(token) = session {
            payload["session"] = json!(token);
        }
        let value = self.send_raw(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, session: Option<&str>, method: &str, params: Value) -> Value {
        let value = self.request(session, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Error code of a call that must fail.
    pub fn request_err(&mut self, session: Option<&str>, method: &str, params: Value) -> String {
        let value = self.request(session, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value["error"]["code"].as_str().unwrap_or("").to_string()
    }

    /// Runs a mutation and returns its `{success, error, id?}` result.
    pub fn mutate(&mut self, session: &str, method: &str, params: Value) -> Value {
        self.request_ok(Some(session), method, params)
    }

    /// Runs a mutation that must succeed and returns the new row's id.
    pub fn create(&mut self, session: &str, method: &str, params: Value) -> String {
        let out = self.mutate(session, method, params);
        assert_eq!(out["success"], json!(true), "{} rejected: {}", method, out);
        assert_eq!(out["error"], json!(false));
        out["id"].as_str().expect("created id").to_string()
    }

    pub fn sign_in(&mut self, username: &str, password: &str) -> String {
        let out = self.request_ok(
            None,
            "auth.signIn",
            json!({ "username": username, "password": password }),
        );
        out["session"].as_str().expect("session token").to_string()
    }

    pub fn list(&mut self, session: &str, table: &str, params: Value) -> Value {
        self.request_ok(Some(session), &format!("{}.list", table), params)
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A fresh workspace with a bootstrapped admin. Returns the admin session.
pub fn open_school(prefix: &str) -> (Sidecar, String) {
    let workspace = temp_dir(prefix);
    let mut sc = Sidecar::spawn();
    sc.request_ok(
        None,
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    sc.request_ok(
        None,
        "auth.bootstrapAdmin",
        json!({
            "username": "admin",
            "password": ADMIN_PASSWORD,
            "name": "Ada",
            "surname": "Admin",
        }),
    );
    let session = sc.sign_in("admin", ADMIN_PASSWORD);
    (sc, session)
}

pub fn teacher_params(username: &str, subjects: &[&str]) -> Value {
    json!({
        "username": username,
        "password": USER_PASSWORD,
        "name": username,
        "surname": "Teacher",
        "email": format!("{}@school.test", username),
        "address": "1 School Road",
        "bloodType": "A+",
        "birthday": "1985-02-10",
        "sex": "FEMALE",
        "subjects": subjects,
    })
}

pub fn parent_params(username: &str) -> Value {
    json!({
        "username": username,
        "password": USER_PASSWORD,
        "name": username,
        "surname": "Parent",
        "phone": "555-0100",
        "address": "2 Home Street",
    })
}

pub fn student_params(username: &str, grade_id: &str, class_id: &str, parent_id: &str) -> Value {
    json!({
        "username": username,
        "password": USER_PASSWORD,
        "name": username,
        "surname": "Student",
        "address": "2 Home Street",
        "bloodType": "O-",
        "birthday": "2014-09-01",
        "sex": "MALE",
        "gradeId": grade_id,
        "classId": class_id,
        "parentId": parent_id,
    })
}

pub fn lesson_params(name: &str, subject_id: &str, class_id: &str, teacher_id: &str) -> Value {
    json!({
        "name": name,
        "day": "MONDAY",
        "startTime": "2025-03-03T09:00:00",
        "endTime": "2025-03-03T10:00:00",
        "subjectId": subject_id,
        "classId": class_id,
        "teacherId": teacher_id,
    })
}

/// Two classes, two teachers, two families.
///
/// `t1` supervises 1A and teaches lesson `l1` there; `t2` supervises 1B,
/// teaches `l2` in 1B and `l3` in 1A. `s1` (parent `p1`) is in 1A, `s2`
/// (parent `p2`) is in 1B.
pub struct School {
    pub sc: Sidecar,
    pub admin: String,
    pub grade: String,
    pub subject: String,
    pub t1: String,
    pub t2: String,
    pub class_a: String,
    pub class_b: String,
    pub p1: String,
    pub p2: String,
    pub s1: String,
    pub s2: String,
    pub l1: String,
    pub l2: String,
    pub l3: String,
}

impl School {
    pub fn seed(prefix: &str) -> Self {
        let (mut sc, admin) = open_school(prefix);
        let grade = sc.create(&admin, "grades.create", json!({ "level": 1 }));
        let subject = sc.create(&admin, "subjects.create", json!({ "name": "Math" }));
        let t1 = sc.create(&admin, "teachers.create", teacher_params("teacher1", &[subject.as_str()]));
        let t2 = sc.create(&admin, "teachers.create", teacher_params("teacher2", &[subject.as_str()]));
        let class_a = sc.create(
            &admin,
            "classes.create",
            json!({ "name": "1A", "capacity": 5, "gradeId": grade, "supervisorId": t1 }),
        );
        let class_b = sc.create(
            &admin,
            "classes.create",
            json!({ "name": "1B", "capacity": 5, "gradeId": grade, "supervisorId": t2 }),
        );
        let p1 = sc.create(&admin, "parents.create", parent_params("parent1"));
        let p2 = sc.create(&admin, "parents.create", parent_params("parent2"));
        let s1 = sc.create(
            &admin,
            "students.create",
            student_params("student1", &grade, &class_a, &p1),
        );
        let s2 = sc.create(
            &admin,
            "students.create",
            student_params("student2", &grade, &class_b, &p2),
        );
        let l1 = sc.create(
            &admin,
            "lessons.create",
            lesson_params("Math 1A", &subject, &class_a, &t1),
        );
        let l2 = sc.create(
            &admin,
            "lessons.create",
            lesson_params("Math 1B", &subject, &class_b, &t2),
        );
        let l3 = sc.create(
            &admin,
            "lessons.create",
            lesson_params("Math 1A extra", &subject, &class_a, &t2),
        );
        Self {
            sc,
            admin,
            grade,
            subject,
            t1,
            t2,
            class_a,
            class_b,
            p1,
            p2,
            s1,
            s2,
            l1,
            l2,
            l3,
        }
    }

    pub fn sign_in(&mut self, username: &str) -> String {
        self.sc.sign_in(username, USER_PASSWORD)
    }
}

pub fn row_ids(page: &Value) -> Vec<String> {
    page["rows"]
        .as_array()
        .expect("rows array")
        .iter()
        .map(|r| match &r["id"] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}
