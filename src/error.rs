//! The error model: [`RpcError`], its [`ErrorKind`] classification, and
//! [`ClientError`] for wrapping a connector's transport failure alongside a
//! protocol failure.

use std::fmt;

use serde_json::Value;

/// Parse error: invalid JSON was received.
pub const PARSE_ERROR: i64 = -32700;
/// Invalid request: the JSON sent is not a valid request object.
pub const INVALID_REQUEST: i64 = -32600;
/// Method not found: the method does not exist or is not registered.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid params: arity, type, range or naming mismatch.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal error: an unhandled failure inside the library or the handler.
pub const INTERNAL_ERROR: i64 = -32603;

/// Classification of an error code into the reserved ranges.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// `-32700`
    ParseError,
    /// `-32600`
    InvalidRequest,
    /// `-32601`
    MethodNotFound,
    /// `-32602`
    InvalidParams,
    /// `-32603`
    InternalError,
    /// `-32000..=-32099`, reserved for application-defined errors.
    ServerError,
    /// Any other code: not a valid JSON-RPC error code.
    Invalid,
}

impl ErrorKind {
    /// Classify a raw error code into its [`ErrorKind`].
    pub fn classify(code: i64) -> ErrorKind {
        match code {
            PARSE_ERROR => ErrorKind::ParseError,
            INVALID_REQUEST => ErrorKind::InvalidRequest,
            METHOD_NOT_FOUND => ErrorKind::MethodNotFound,
            INVALID_PARAMS => ErrorKind::InvalidParams,
            INTERNAL_ERROR => ErrorKind::InternalError,
            -32099..=-32000 => ErrorKind::ServerError,
            -32768..=-32000 => ErrorKind::Invalid,
            _ => ErrorKind::Invalid,
        }
    }
}

/// A structured JSON-RPC error: a code, a message, and optional data.
///
/// This is the one error type that flows through both the server's dispatch
/// path and the client's response-parsing path. `data` doubles as the wire
/// `"data"` field and, transiently, as the parameter-index carrier a
/// [`crate::dispatcher::Dispatcher`] uses to decorate `invalid_params`
/// messages before the error is ever serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

impl RpcError {
    /// Construct an error with no data.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        RpcError {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Construct an error carrying arbitrary wire data.
    pub fn with_data(code: i64, message: impl Into<String>, data: Value) -> Self {
        RpcError {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// `-32700 parse error: <detail>`
    pub fn parse_error(detail: impl fmt::Display) -> Self {
        RpcError::new(PARSE_ERROR, format!("parse error: {detail}"))
    }

    /// `-32600 invalid request: <detail>`
    pub fn invalid_request(detail: impl fmt::Display) -> Self {
        RpcError::new(INVALID_REQUEST, format!("invalid request: {detail}"))
    }

    /// `-32601 method not found: <name>`
    pub fn method_not_found(name: &str) -> Self {
        RpcError::new(METHOD_NOT_FOUND, format!("method not found: {name}"))
    }

    /// `-32601 notification not found: <name>`
    pub fn notification_not_found(name: &str) -> Self {
        RpcError::new(
            METHOD_NOT_FOUND,
            format!("notification not found: {name}"),
        )
    }

    /// `-32602 invalid parameter: <detail>`, with no parameter index attached.
    pub fn invalid_params(detail: impl fmt::Display) -> Self {
        RpcError::new(INVALID_PARAMS, format!("invalid parameter: {detail}"))
    }

    /// Same as [`RpcError::invalid_params`], but tagged with the offending
    /// parameter's positional index so the dispatcher can later decorate the
    /// message with the parameter's name.
    pub fn invalid_param_at(detail: impl fmt::Display, index: usize) -> Self {
        RpcError::with_data(
            INVALID_PARAMS,
            format!("invalid parameter: {detail}"),
            Value::from(index),
        )
    }

    /// `-32603 internal error: <detail>`
    pub fn internal_error(detail: impl fmt::Display) -> Self {
        RpcError::new(INTERNAL_ERROR, format!("internal error: {detail}"))
    }

    /// The error code.
    pub fn code(&self) -> i64 {
        self.code
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The attached data, if any.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// This error's classification.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::classify(self.code)
    }

    /// If this is an `invalid_params` error carrying a parameter index,
    /// return it without consuming the error.
    pub fn param_index(&self) -> Option<usize> {
        if self.code != INVALID_PARAMS {
            return None;
        }
        self.data.as_ref().and_then(Value::as_u64).map(|v| v as usize)
    }

    /// Append a parameter-name (or, lacking a name, index) suffix to the
    /// message and clear the carried index. A no-op if no index is carried —
    /// so decorating an already-decorated error leaves it unchanged.
    pub fn decorate_param(&mut self, label: &str) {
        if self.data.take().is_some() {
            self.message.push_str(" for parameter ");
            self.message.push_str(label);
        }
    }

    /// Build the wire `error` object: `{code, message, data?}`.
    pub fn to_value(&self) -> Value {
        let mut object = serde_json::Map::new();
        object.insert("code".into(), Value::from(self.code));
        object.insert("message".into(), Value::from(self.message.clone()));
        if let Some(data) = &self.data {
            object.insert("data".into(), data.clone());
        }
        Value::Object(object)
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, ", data: {data}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

/// The error a [`crate::client::JsonRpcClient`] call can fail with: either
/// the connector's own transport error, or a structured protocol error.
#[derive(Debug, thiserror::Error)]
pub enum ClientError<E>
where
    E: std::error::Error + 'static,
{
    /// The connector failed to deliver or receive bytes.
    #[error(transparent)]
    Transport(#[from] E),
    /// The server (or the response itself) reported a protocol error.
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_reference_format() {
        let err = RpcError::new(-32601, "method not found: foo");
        assert_eq!(err.to_string(), "-32601: method not found: foo");

        let err = RpcError::with_data(-32602, "invalid parameter: bad", Value::from(3));
        assert_eq!(err.to_string(), "-32602: invalid parameter: bad, data: 3");
    }

    #[test]
    fn decoration_is_idempotent() {
        let mut err = RpcError::invalid_param_at("must be integer, but is string", 0);
        err.decorate_param("\"a\"");
        assert_eq!(
            err.message(),
            "invalid parameter: must be integer, but is string for parameter \"a\""
        );
        assert!(err.data().is_none());

        // Decorating again is a no-op: the index was already consumed.
        let before = err.message().to_string();
        err.decorate_param("\"a\"");
        assert_eq!(err.message(), before);
    }

    #[test]
    fn classify_covers_reserved_band() {
        assert_eq!(ErrorKind::classify(-32700), ErrorKind::ParseError);
        assert_eq!(ErrorKind::classify(-32050), ErrorKind::ServerError);
        assert_eq!(ErrorKind::classify(-32100), ErrorKind::Invalid);
        assert_eq!(ErrorKind::classify(1), ErrorKind::Invalid);
    }
}
