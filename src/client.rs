//! Request composition, response parsing, and batch correlation for the
//! client side of the protocol.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{ClientError, RpcError, INTERNAL_ERROR, PARSE_ERROR};
use crate::value::{ClientId, Id};

/// The wire dialect a [`JsonRpcClient`] speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// JSON-RPC 1.0: `params` is always present (`null` when empty);
    /// notifications are sent with an explicit `id: null` and no `jsonrpc`
    /// field.
    V1,
    /// JSON-RPC 2.0: `params` is omitted when empty; notifications omit
    /// `id` entirely.
    V2,
}

/// The transport seam a [`JsonRpcClient`] is built on.
///
/// Implementors own the actual network/IPC mechanism; the client only ever
/// calls `send` once per request (or once per batch) and treats the
/// returned bytes as an opaque response body.
pub trait Connector {
    /// The error a failed send/receive produces.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Deliver `request` and return the raw response bytes.
    fn send(&mut self, request: &[u8]) -> Result<Vec<u8>, Self::Error>;
}

/// A successful method call's response: the id echoed back by the server,
/// alongside the decoded `result`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    /// The id the server echoed back.
    pub id: Id,
    /// The raw `result` value.
    pub result: Value,
}

enum Params {
    Positional(Vec<Value>),
    Named(BTreeMap<String, Value>),
}

impl Params {
    fn is_empty(&self) -> bool {
        match self {
            Params::Positional(v) => v.is_empty(),
            Params::Named(m) => m.is_empty(),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Params::Positional(v) => Value::Array(v),
            Params::Named(m) => Value::Object(m.into_iter().collect()),
        }
    }
}

/// A JSON-RPC client bound to one [`Connector`] and one wire [`Version`].
pub struct JsonRpcClient<C: Connector> {
    connector: C,
    version: Version,
}

impl<C: Connector> JsonRpcClient<C> {
    /// Build a client speaking `version` over `connector`.
    pub fn new(connector: C, version: Version) -> Self {
        JsonRpcClient { connector, version }
    }

    /// Call a method with positional parameters.
    pub fn call_method(
        &mut self,
        id: ClientId,
        method: &str,
        params: &[Value],
    ) -> Result<JsonRpcResponse, ClientError<C::Error>> {
        self.call(Some(id), method, Params::Positional(params.to_vec()))
            .map(|r| r.expect("method call always produces a response"))
    }

    /// Call a method with named parameters.
    pub fn call_method_named(
        &mut self,
        id: ClientId,
        method: &str,
        params: &BTreeMap<String, Value>,
    ) -> Result<JsonRpcResponse, ClientError<C::Error>> {
        self.call(Some(id), method, Params::Named(params.clone()))
            .map(|r| r.expect("method call always produces a response"))
    }

    /// Send a notification with positional parameters; the connector's
    /// response bytes, if any, are discarded.
    pub fn call_notification(
        &mut self,
        method: &str,
        params: &[Value],
    ) -> Result<(), ClientError<C::Error>> {
        self.call(None, method, Params::Positional(params.to_vec()))
            .map(|_| ())
    }

    /// Send a notification with named parameters; the connector's response
    /// bytes, if any, are discarded.
    pub fn call_notification_named(
        &mut self,
        method: &str,
        params: &BTreeMap<String, Value>,
    ) -> Result<(), ClientError<C::Error>> {
        self.call(None, method, Params::Named(params.clone()))
            .map(|_| ())
    }

    /// Send a v2 batch and correlate its responses.
    pub fn batch_call(
        &mut self,
        batch: BatchRequest,
    ) -> Result<BatchResponse, ClientError<C::Error>> {
        if self.version != Version::V2 {
            return Err(RpcError::invalid_request("batch calls require JSON-RPC 2.0").into());
        }
        let bytes = serde_json::to_vec(&Value::Array(batch.items)).expect("batch always serializes");
        debug!(size = bytes.len(), "sending batch request");
        let response = self.connector.send(&bytes)?;
        BatchResponse::parse(&response).map_err(ClientError::Rpc)
    }

    fn call(
        &mut self,
        id: Option<ClientId>,
        method: &str,
        params: Params,
    ) -> Result<Option<JsonRpcResponse>, ClientError<C::Error>> {
        let request = self.build_request(id, method, params);
        let bytes = serde_json::to_vec(&request).expect("request always serializes");
        debug!(method, is_notification = request.get("id").is_none() && self.version == Version::V2, "sending request");
        let response = self.connector.send(&bytes)?;

        if request_is_notification(&request, self.version) {
            return Ok(None);
        }
        parse_method_response(&response).map(Some).map_err(ClientError::Rpc)
    }

    fn build_request(&self, id: Option<ClientId>, method: &str, params: Params) -> Value {
        let mut object = Map::new();
        if self.version == Version::V2 {
            object.insert("jsonrpc".into(), Value::from("2.0"));
        }
        object.insert("method".into(), Value::from(method));

        match self.version {
            Version::V2 => {
                if !params.is_empty() {
                    object.insert("params".into(), params.into_value());
                }
            }
            Version::V1 => {
                let value = if params.is_empty() {
                    Value::Null
                } else {
                    params.into_value()
                };
                object.insert("params".into(), value);
            }
        }

        match (self.version, id) {
            (Version::V2, Some(id)) => {
                object.insert("id".into(), Value::from(id));
            }
            (Version::V2, None) => {}
            (Version::V1, Some(id)) => {
                object.insert("id".into(), Value::from(id));
            }
            (Version::V1, None) => {
                object.insert("id".into(), Value::Null);
            }
        }

        Value::Object(object)
    }
}

fn request_is_notification(request: &Value, version: Version) -> bool {
    match version {
        Version::V2 => request.get("id").is_none(),
        Version::V1 => request.get("id") == Some(&Value::Null),
    }
}

fn parse_method_response(bytes: &[u8]) -> Result<JsonRpcResponse, RpcError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| RpcError::new(PARSE_ERROR, format!("invalid JSON response from server: {e}")))?;

    let object = value.as_object().ok_or_else(|| {
        RpcError::new(
            INTERNAL_ERROR,
            "invalid server response: neither \"result\" nor \"error\" fields found",
        )
    })?;

    if let Some(error) = object.get("error") {
        return Err(parse_error_object(error)?);
    }

    match (object.get("result"), object.get("id")) {
        (Some(result), Some(id)) => Ok(JsonRpcResponse {
            id: Id::from_value(id).unwrap_or(Id::Null),
            result: result.clone(),
        }),
        _ => Err(RpcError::new(
            INTERNAL_ERROR,
            "invalid server response: neither \"result\" nor \"error\" fields found",
        )),
    }
}

fn parse_error_object(error: &Value) -> Result<RpcError, RpcError> {
    let code = error.get("code").and_then(Value::as_i64);
    let message = error.get("message").and_then(Value::as_str);
    match (code, message) {
        (Some(code), Some(message)) => Ok(match error.get("data") {
            Some(data) => RpcError::with_data(code, message, data.clone()),
            None => RpcError::new(code, message),
        }),
        _ => Err(RpcError::new(
            INTERNAL_ERROR,
            "invalid error response: \"code\" (negative number) and \"message\" (string) are required",
        )),
    }
}

/// Accumulates method calls and notifications into a single v2 batch
/// request.
#[derive(Default)]
pub struct BatchRequest {
    items: Vec<Value>,
}

impl BatchRequest {
    /// An empty batch.
    pub fn new() -> Self {
        BatchRequest::default()
    }

    /// Add a positional-parameter method call to the batch.
    pub fn add_method(&mut self, id: ClientId, method: &str, params: &[Value]) {
        self.items.push(json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": Value::from(id),
        }));
    }

    /// Add a positional-parameter notification to the batch.
    pub fn add_notification(&mut self, method: &str, params: &[Value]) {
        self.items.push(json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        }));
    }

    /// Add a named-parameter method call to the batch.
    pub fn add_method_named(
        &mut self,
        id: ClientId,
        method: &str,
        params: &BTreeMap<String, Value>,
    ) {
        self.items.push(json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": Value::from(id),
        }));
    }

    /// Add a named-parameter notification to the batch.
    pub fn add_notification_named(&mut self, method: &str, params: &BTreeMap<String, Value>) {
        self.items.push(json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        }));
    }

    /// The number of entries accumulated so far.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no entries have been accumulated.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A parsed batch response, correlated by id.
pub struct BatchResponse {
    raw: Vec<Value>,
    results: std::collections::HashMap<Id, Result<Value, RpcError>>,
    invalid_indexes: Vec<usize>,
}

impl BatchResponse {
    fn parse(bytes: &[u8]) -> Result<BatchResponse, RpcError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| RpcError::new(PARSE_ERROR, format!("invalid JSON response from server: {e}")))?;
        let raw = value
            .as_array()
            .cloned()
            .ok_or_else(|| RpcError::invalid_request("expected a batch response array"))?;

        let mut results = std::collections::HashMap::new();
        let mut invalid_indexes = Vec::new();

        for (index, entry) in raw.iter().enumerate() {
            let object = match entry.as_object() {
                Some(o) => o,
                None => {
                    invalid_indexes.push(index);
                    continue;
                }
            };
            let id = match object.get("id").and_then(Id::from_value) {
                Some(Id::Null) | None => {
                    invalid_indexes.push(index);
                    continue;
                }
                Some(id) => id,
            };
            if let Some(error) = object.get("error") {
                match parse_error_object(error) {
                    Ok(e) => {
                        results.insert(id, Err(e));
                    }
                    Err(_) => invalid_indexes.push(index),
                }
            } else if let Some(result) = object.get("result") {
                results.insert(id, Ok(result.clone()));
            } else {
                invalid_indexes.push(index);
            }
        }

        Ok(BatchResponse {
            raw,
            results,
            invalid_indexes,
        })
    }

    /// Look up the decoded result for `id`, or the error it failed with.
    pub fn get<T: DeserializeOwned>(&self, id: impl Into<Id>) -> Result<T, RpcError> {
        let id = id.into();
        match self.results.get(&id) {
            Some(Ok(value)) => serde_json::from_value(value.clone())
                .map_err(|e| RpcError::internal_error(format!("failed to decode result: {e}"))),
            Some(Err(e)) => Err(e.clone()),
            None => Err(RpcError::new(
                PARSE_ERROR,
                format!("no result found for id {}", id.dump()),
            )),
        }
    }

    /// Whether any entry in the batch carried an error.
    pub fn has_errors(&self) -> bool {
        self.results.values().any(Result::is_err)
    }

    /// Indexes (into the original response array) of entries that were not
    /// well-formed responses.
    pub fn invalid_indexes(&self) -> &[usize] {
        &self.invalid_indexes
    }

    /// The raw response element at `index`, if present.
    pub fn get_at(&self, index: usize) -> Option<&Value> {
        self.raw.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(Vec<u8>);

    impl Connector for Echo {
        type Error = std::convert::Infallible;

        fn send(&mut self, _request: &[u8]) -> Result<Vec<u8>, Self::Error> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn v2_omits_empty_params_and_id_for_notification() {
        let mut client = JsonRpcClient::new(Echo(Vec::new()), Version::V2);
        let request = client.build_request(None, "ping", Params::Positional(vec![]));
        assert!(request.get("params").is_none());
        assert!(request.get("id").is_none());
        assert_eq!(request["jsonrpc"], Value::from("2.0"));
    }

    #[test]
    fn v1_always_includes_params_and_null_id_for_notification() {
        let mut client = JsonRpcClient::new(Echo(Vec::new()), Version::V1);
        let request = client.build_request(None, "ping", Params::Positional(vec![]));
        assert_eq!(request["params"], Value::Null);
        assert_eq!(request["id"], Value::Null);
        assert!(request.get("jsonrpc").is_none());
    }

    #[test]
    fn call_method_parses_result() {
        let body = serde_json::to_vec(&json!({"jsonrpc":"2.0","id":1,"result":33})).unwrap();
        let mut client = JsonRpcClient::new(Echo(body), Version::V2);
        let resp = client.call_method(ClientId::from(1), "add", &[Value::from(1)]).unwrap();
        assert_eq!(resp.result, Value::from(33));
        assert_eq!(resp.id, Id::Int(1));
    }

    #[test]
    fn call_method_surfaces_rpc_error() {
        let body = serde_json::to_vec(
            &json!({"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found: x"}}),
        )
        .unwrap();
        let mut client = JsonRpcClient::new(Echo(body), Version::V2);
        let err = client
            .call_method(ClientId::from(1), "x", &[])
            .unwrap_err();
        match err {
            ClientError::Rpc(e) => assert_eq!(e.code(), -32601),
            _ => panic!("expected Rpc error"),
        }
    }

    #[test]
    fn batch_response_correlates_by_id() {
        let body = serde_json::to_vec(&json!([
            {"jsonrpc":"2.0","id":1,"result":"ok"},
            {"jsonrpc":"2.0","id":2,"error":{"code":-32602,"message":"bad"}},
            "garbage",
        ]))
        .unwrap();
        let resp = BatchResponse::parse(&body).unwrap();
        assert_eq!(resp.get::<String>(1i64).unwrap(), "ok");
        assert!(resp.get::<Value>(2i64).is_err());
        assert!(resp.get::<Value>(3i64).is_err());
        assert_eq!(resp.invalid_indexes(), &[2]);
        assert!(resp.has_errors());
    }
}
