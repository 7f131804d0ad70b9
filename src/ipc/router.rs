use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type Handler = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const HANDLERS: &[Handler] = &[
    handlers::core::try_handle,
    handlers::auth::try_handle,
    handlers::setup::try_handle,
    handlers::lists::try_handle,
    handlers::academics::try_handle,
    handlers::people::try_handle,
    handlers::notices::try_handle,
    handlers::calendar::try_handle,
    handlers::forms::try_handle,
    handlers::notes::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    let span = tracing::info_span!("request", id = %req.id, method = %req.method);
    let _enter = span.enter();

    for handler in HANDLERS {
        if let Some(resp) = handler(state, &req) {
            let ok = resp.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
            tracing::debug!(ok, "handled");
            return resp;
        }
    }

    tracing::warn!("unknown method");
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
