//! Personal notes kept as JSON documents in `notes.sqlite3`.

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

pub const NOTES_FILE: &str = "notes.sqlite3";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub title: String,
    pub content: String,
    pub user_id: String,
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("note not found")]
    NotFound,
    #[error("notes store: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("notes document: {0}")]
    Document(#[from] serde_json::Error),
}

impl NoteError {
    pub fn code(&self) -> &'static str {
        match self {
            NoteError::Empty(_) => "bad_params",
            NoteError::NotFound => "not_found",
            NoteError::Store(_) | NoteError::Document(_) => "db_update_failed",
        }
    }
}

pub struct NoteStore {
    conn: Connection,
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn check(title: &str, content: &str) -> Result<(), NoteError> {
    if title.trim().is_empty() {
        return Err(NoteError::Empty("title"));
    }
    if content.trim().is_empty() {
        return Err(NoteError::Empty("content"));
    }
    Ok(())
}

impl NoteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace)?;
        let conn = Connection::open(workspace.join(NOTES_FILE))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents(
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                body TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner)",
            [],
        )?;
        Ok(Self { conn })
    }

    /// The owner's notes, oldest first.
    pub fn list(&self, owner: &str) -> Result<Vec<(String, Note)>, NoteError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, body FROM documents WHERE owner = ?")?;
        let raw = stmt
            .query_map([owner], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut notes = raw
            .into_iter()
            .map(|(id, body)| Ok((id, serde_json::from_str::<Note>(&body)?)))
            .collect::<Result<Vec<_>, NoteError>>()?;
        notes.sort_by(|a, b| a.1.timestamp.cmp(&b.1.timestamp).then_with(|| a.0.cmp(&b.0)));
        Ok(notes)
    }

    pub fn create(&self, owner: &str, title: &str, content: &str) -> Result<(String, Note), NoteError> {
        check(title, content)?;
        let note = Note {
            title: title.trim().to_string(),
            content: content.to_string(),
            user_id: owner.to_string(),
            timestamp: now_stamp(),
        };
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO documents(id, owner, body) VALUES(?, ?, ?)",
            (&id, owner, serde_json::to_string(&note)?),
        )?;
        Ok((id, note))
    }

    fn owned(&self, owner: &str, id: &str) -> Result<Note, NoteError> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE id = ? AND owner = ?",
                (id, owner),
                |r| r.get(0),
            )
            .optional()?;
        match body {
            Some(b) => Ok(serde_json::from_str(&b)?),
            None => Err(NoteError::NotFound),
        }
    }

    pub fn update(&self, owner: &str, id: &str, title: &str, content: &str) -> Result<Note, NoteError> {
        check(title, content)?;
        let mut note = self.owned(owner, id)?;
        note.title = title.trim().to_string();
        note.content = content.to_string();
        note.timestamp = now_stamp();
        self.conn.execute(
            "UPDATE documents SET body = ? WHERE id = ? AND owner = ?",
            (serde_json::to_string(&note)?, id, owner),
        )?;
        Ok(note)
    }

    pub fn delete(&self, owner: &str, id: &str) -> Result<(), NoteError> {
        let n = self
            .conn
            .execute("DELETE FROM documents WHERE id = ? AND owner = ?", (id, owner))?;
        if n == 0 {
            return Err(NoteError::NotFound);
        }
        Ok(())
    }
}
