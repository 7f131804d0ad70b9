use crate::identity::{NewUser, Role};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{caller, db, get_required_str, provider, reply, store_err};
use crate::ipc::types::{AppState, Request};
use crate::settings;
use serde_json::json;

fn handle_bootstrap_admin(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let provider = provider(state)?;
    if provider.role_exists(Role::Admin)? {
        return Err(HandlerErr::new("forbidden", "an admin already exists"));
    }

    let username = get_required_str(req, "username")?.trim().to_string();
    let password = get_required_str(req, "password")?.to_string();
    let name = get_required_str(req, "name")?.trim().to_string();
    let surname = get_required_str(req, "surname")?.trim().to_string();
    let accounts = settings::account_settings(conn).map_err(store_err("db_query_failed"))?;

    if !(3..=20).contains(&username.chars().count()) {
        return Err(HandlerErr::new("bad_params", "username must be 3 to 20 characters")
            .with_details(json!({ "field": "username" })));
    }
    if password.chars().count() < accounts.min_password_length {
        return Err(HandlerErr::new(
            "bad_params",
            format!("password must be at least {} characters", accounts.min_password_length),
        )
        .with_details(json!({ "field": "password" })));
    }
    if name.is_empty() || surname.is_empty() {
        return Err(HandlerErr::new("bad_params", "name and surname are required"));
    }

    let user_id = provider.create_user(&NewUser {
        username,
        password,
        first_name: name,
        last_name: surname,
        role: Role::Admin,
    })?;
    tracing::info!(user_id = %user_id, "admin account created");
    Ok(json!({ "userId": user_id }))
}

fn handle_sign_in(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let provider = provider(state)?;
    let username = get_required_str(req, "username")?;
    let password = get_required_str(req, "password")?;
    let accounts = settings::account_settings(conn).map_err(store_err("db_query_failed"))?;

    let session = provider.sign_in(username.trim(), password, accounts.session_ttl)?;
    tracing::info!(user_id = %session.user_id, "signed in");
    Ok(json!({
        "session": session.token,
        "userId": session.user_id,
        "role": session.role.map(Role::as_str),
        "expiresAt": session.expires_at,
    }))
}

fn handle_sign_out(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let who = caller(state, req)?;
    if let Some(token) = req.session.as_deref() {
        provider(state)?.sign_out(token)?;
    }
    tracing::info!(user_id = %who.user_id, "signed out");
    Ok(json!({ "ok": true }))
}

fn handle_whoami(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let who = caller(state, req)?;
    Ok(json!({
        "userId": who.user_id,
        "role": who.role.map(Role::as_str),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.bootstrapAdmin" => handle_bootstrap_admin(state, req),
        "auth.signIn" => handle_sign_in(state, req),
        "auth.signOut" => handle_sign_out(state, req),
        "auth.whoami" => handle_whoami(state, req),
        _ => return None,
    };
    Some(reply(req, result))
}
