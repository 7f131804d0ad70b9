use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::identity::IdentityProvider;
use crate::notes::NoteStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Session token from `auth.signIn`; resolved to an identity per request.
    #[serde(default)]
    pub session: Option<String>,
}

/// Everything opened by `workspace.select`. All three are replaced together.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub identity: Option<Box<dyn IdentityProvider>>,
    pub notes: Option<NoteStore>,
}

impl AppState {
    pub fn empty() -> Self {
        Self {
            workspace: None,
            db: None,
            identity: None,
            notes: None,
        }
    }
}
