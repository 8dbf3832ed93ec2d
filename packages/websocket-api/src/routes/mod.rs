pub mod connection;
pub mod default;
pub mod websocket;

use serde_json::{json, Value};

/// Lambda proxy response for API Gateway WebSocket routes.
pub fn response(status_code: u16, body: Option<Value>) -> Value {
    match body {
        Some(body) => json!({ "statusCode": status_code, "body": body.to_string() }),
        None => json!({ "statusCode": status_code }),
    }
}
