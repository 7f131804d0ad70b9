use crate::gate::{self, GateError, WriteEntity, WritePolicy};
use crate::identity::{Identity, IdentityProvider, Role};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::schema::{self, Mode, Validate};
use crate::settings;
use rusqlite::Connection;
use serde::de::DeserializeOwned;

/// Turns a handler result into the reply envelope.
pub fn reply(req: &Request, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => {
            tracing::debug!(code = e.code, message = %e.message, "request failed");
            e.response(&req.id)
        }
    }
}

pub fn db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn provider(state: &AppState) -> Result<&dyn IdentityProvider, HandlerErr> {
    state
        .identity
        .as_deref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn store_err(code: &'static str) -> impl Fn(anyhow::Error) -> HandlerErr {
    move |e| HandlerErr::new(code, e.to_string())
}

/// Resolves the request's session. Every call re-reads the provider.
pub fn caller(state: &AppState, req: &Request) -> Result<Identity, HandlerErr> {
    let provider = provider(state)?;
    let Some(token) = req.session.as_deref().filter(|t| !t.is_empty()) else {
        return Err(HandlerErr::new("unauthenticated", "missing session"));
    };
    provider
        .resolve_session(token)?
        .ok_or_else(|| HandlerErr::new("unauthenticated", "session expired or unknown"))
}

pub fn require_admin(who: &Identity) -> Result<(), HandlerErr> {
    if who.is(Role::Admin) {
        Ok(())
    } else {
        Err(HandlerErr::new("forbidden", "admin only"))
    }
}

pub fn get_required_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

/// What a mutation body gets to work with.
pub struct Ctx<'a> {
    pub conn: &'a Connection,
    pub provider: &'a dyn IdentityProvider,
    pub who: Identity,
    pub policy: WritePolicy,
}

/// Shared create/update/delete flow: session, payload validation, write
/// policy, then `apply`. Validation failures become `bad_params`; anything
/// after that collapses to `{success, error}`.
pub fn mutation<T, F>(
    state: &AppState,
    req: &Request,
    entity: WriteEntity,
    action: &'static str,
    mode: Mode,
    apply: F,
) -> Result<serde_json::Value, HandlerErr>
where
    T: DeserializeOwned + Validate,
    F: FnOnce(&Ctx<'_>, T) -> Result<Option<String>, GateError>,
{
    let who = caller(state, req)?;
    let conn = db(state)?;
    let provider = provider(state)?;
    let rules = settings::account_settings(conn)
        .map_err(store_err("db_query_failed"))?
        .rules();
    let input: T = schema::parse_valid(&req.params, &rules, mode)?;

    let result = gate::authorize(entity, &who).and_then(|policy| {
        let ctx = Ctx {
            conn,
            provider,
            who,
            policy,
        };
        apply(&ctx, input)
    });
    Ok(gate::outcome(entity, action, result))
}
