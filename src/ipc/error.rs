use crate::identity::IdentityError;
use crate::notes::NoteError;
use crate::query::QueryError;
use crate::schema::SchemaError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<QueryError> for HandlerErr {
    fn from(e: QueryError) -> Self {
        let details = match &e {
            QueryError::NotAnInteger { key, value } => Some(json!({ "key": key, "value": value })),
            _ => None,
        };
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

impl From<SchemaError> for HandlerErr {
    fn from(e: SchemaError) -> Self {
        let details = match &e {
            SchemaError::Field { field, .. } => Some(json!({ "field": field })),
            SchemaError::Malformed(_) => None,
        };
        HandlerErr {
            code: "bad_params",
            message: e.to_string(),
            details,
        }
    }
}

impl From<IdentityError> for HandlerErr {
    fn from(e: IdentityError) -> Self {
        let code = match e {
            IdentityError::InvalidCredentials => "unauthenticated",
            IdentityError::NotFound => "not_found",
            IdentityError::UsernameTaken => "bad_params",
            IdentityError::Store(_) => "identity_failed",
        };
        HandlerErr::new(code, e.to_string())
    }
}

impl From<NoteError> for HandlerErr {
    fn from(e: NoteError) -> Self {
        HandlerErr::new(e.code(), e.to_string())
    }
}
