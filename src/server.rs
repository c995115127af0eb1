//! Request-grammar validation, dispatch, and batch fan-out.

use std::panic::{self, AssertUnwindSafe};

use serde_json::{json, Map, Value};
use tracing::{debug, error};

use crate::binder::{IntoMethodHandle, IntoNotificationHandle};
use crate::dispatcher::Dispatcher;
use crate::error::RpcError;
use crate::value::Id;

const RESERVED_PREFIX: &str = "rpc.";

/// A JSON-RPC 2.0 server: wraps a [`Dispatcher`] with request-grammar
/// validation, batch handling, and the `rpc.`-prefix registration guard.
#[derive(Default)]
pub struct JsonRpcServer {
    dispatcher: Dispatcher,
}

impl JsonRpcServer {
    /// Construct a server with an empty dispatcher.
    pub fn new() -> Self {
        JsonRpcServer {
            dispatcher: Dispatcher::new(),
        }
    }

    /// Register a method. Returns `false` if `name` is reserved (starts with
    /// `"rpc."`) or already registered.
    pub fn add_method<F, Args>(&mut self, name: impl Into<String>, f: F) -> bool
    where
        F: IntoMethodHandle<Args>,
    {
        self.add_method_named(name, f, None)
    }

    /// Like [`JsonRpcServer::add_method`], additionally declaring the
    /// parameter names accepted in object-form calls.
    pub fn add_method_named<F, Args>(
        &mut self,
        name: impl Into<String>,
        f: F,
        names: Option<Vec<String>>,
    ) -> bool
    where
        F: IntoMethodHandle<Args>,
    {
        let name = name.into();
        if is_reserved(&name) {
            return false;
        }
        self.dispatcher.add_method_named(name, f, names)
    }

    /// Register a notification. Returns `false` if `name` is reserved or
    /// already registered.
    pub fn add_notification<F, Args>(&mut self, name: impl Into<String>, f: F) -> bool
    where
        F: IntoNotificationHandle<Args>,
    {
        self.add_notification_named(name, f, None)
    }

    /// Like [`JsonRpcServer::add_notification`], additionally declaring the
    /// parameter names accepted in object-form calls.
    pub fn add_notification_named<F, Args>(
        &mut self,
        name: impl Into<String>,
        f: F,
        names: Option<Vec<String>>,
    ) -> bool
    where
        F: IntoNotificationHandle<Args>,
    {
        let name = name.into();
        if is_reserved(&name) {
            return false;
        }
        self.dispatcher.add_notification_named(name, f, names)
    }

    /// Access the underlying dispatcher directly (for `contains`,
    /// `method_names`, `remove`, and other registry queries).
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle a raw request (single object or batch array) and produce the
    /// raw response bytes. Returns an empty vector when nothing should be
    /// sent back (a lone notification).
    pub fn handle_request(&self, bytes: &[u8]) -> Vec<u8> {
        let value: Value = match serde_json::from_slice(bytes) {
            Ok(v) => v,
            Err(e) => {
                let resp = error_envelope(Id::Null, RpcError::parse_error(e));
                return serde_json::to_vec(&resp).expect("error envelope always serializes");
            }
        };

        let response = match value {
            Value::Object(_) => self.handle_single(&value),
            Value::Array(items) => {
                if items.is_empty() {
                    Some(error_envelope(
                        Id::Null,
                        RpcError::invalid_request("empty batch"),
                    ))
                } else {
                    let results: Vec<Value> = items
                        .iter()
                        .filter_map(|item| self.handle_single(item))
                        .collect();
                    if results.is_empty() {
                        None
                    } else {
                        Some(Value::Array(results))
                    }
                }
            }
            _ => Some(error_envelope(
                Id::Null,
                RpcError::invalid_request("expected array or object"),
            )),
        };

        match response {
            Some(v) => serde_json::to_vec(&v).expect("response envelope always serializes"),
            None => Vec::new(),
        }
    }

    /// Process one request object (never a batch). Returns `None` for a
    /// well-formed notification, which produces no response.
    fn handle_single(&self, request: &Value) -> Option<Value> {
        let object = match request.as_object() {
            Some(o) => o,
            None => {
                return Some(error_envelope(
                    Id::Null,
                    RpcError::invalid_request("expected an object"),
                ))
            }
        };

        let id = object
            .get("id")
            .and_then(Id::from_value)
            .unwrap_or(Id::Null);
        let has_id = object.contains_key("id");

        if let Err(e) = validate_grammar(object) {
            return Some(error_envelope(id, e));
        }

        let method = object.get("method").and_then(Value::as_str).unwrap();
        // Normalize absent/null params to an empty positional array here;
        // the Dispatcher only ever sees array or object params.
        let params = match object.get("params") {
            None | Some(Value::Null) => Value::Array(Vec::new()),
            Some(other) => other.clone(),
        };

        if !has_id {
            debug!(%method, "dispatching notification");
            if let Err(e) = self.invoke_notification_guarded(method, &params) {
                debug!(%method, error = %e, "notification failed, swallowing per protocol");
            }
            return None;
        }

        debug!(%method, "dispatching method call");
        match self.invoke_method_guarded(method, &params) {
            Ok(result) => Some(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": result,
            })),
            Err(e) => {
                error!(%method, error = %e, "method call failed");
                Some(error_envelope(id, e))
            }
        }
    }

    fn invoke_method_guarded(&self, method: &str, params: &Value) -> Result<Value, RpcError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.dispatcher.invoke_method(method, params)))
            .unwrap_or_else(|payload| Err(RpcError::internal_error(panic_detail(&payload))))
    }

    fn invoke_notification_guarded(&self, method: &str, params: &Value) -> Result<(), RpcError> {
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.dispatcher.invoke_notification(method, params)
        }))
        .unwrap_or_else(|payload| Err(RpcError::internal_error(panic_detail(&payload))))
    }
}

fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

fn validate_grammar(object: &Map<String, Value>) -> Result<(), RpcError> {
    match object.get("jsonrpc") {
        Some(Value::String(v)) if v == "2.0" => {}
        _ => return Err(RpcError::invalid_request("missing jsonrpc field set to \"2.0\"")),
    }
    match object.get("method") {
        Some(Value::String(_)) => {}
        _ => return Err(RpcError::invalid_request("method field must be a string")),
    }
    if let Some(id) = object.get("id") {
        if Id::from_value(id).is_none() {
            return Err(RpcError::invalid_request(
                "id field must be a number, string or null",
            ));
        }
    }
    match object.get("params") {
        None | Some(Value::Null) | Some(Value::Array(_)) | Some(Value::Object(_)) => {}
        Some(_) => {
            return Err(RpcError::invalid_request(
                "params field must be an array, object or null",
            ))
        }
    }
    Ok(())
}

fn error_envelope(id: Id, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": error.to_value(),
    })
}

fn panic_detail(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
