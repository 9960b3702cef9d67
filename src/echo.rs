use crate::dispatcher::{Bindings, HandlerError, Response};
use serde_json::json;

// Example handler: echoes the body and captured bindings back.
pub fn echo_handler(body: &str, bindings: &Bindings) -> Result<Response, HandlerError> {
    Ok(Response::json(
        200,
        json!({
            "body": body,
            "bindings": bindings,
        }),
    ))
}
