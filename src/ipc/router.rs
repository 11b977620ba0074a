use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use tracing::debug;

type Handler = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const HANDLERS: [Handler; 6] = [
    handlers::core::try_handle,
    handlers::lookup::try_handle,
    handlers::organizations::try_handle,
    handlers::schools::try_handle,
    handlers::members::try_handle,
    handlers::bulk::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    debug!(request_id = %req.id, method = %req.method, "dispatch");
    for handler in HANDLERS {
        if let Some(resp) = handler(state, &req) {
            return resp;
        }
    }

    err(
        &req.id,
        404,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
