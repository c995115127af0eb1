use jrpc_core::server::JsonRpcServer;
use serde_json::{json, Value};

fn calculator() -> JsonRpcServer {
    let mut server = JsonRpcServer::new();
    server.add_method_named(
        "add",
        |a: i64, b: i64| a + b,
        Some(vec!["a".into(), "b".into()]),
    );
    server.add_method_named(
        "divide",
        |a: i64, b: i64| -> Result<i64, jrpc_core::RpcError> {
            if b == 0 {
                Err(jrpc_core::RpcError::invalid_params("divisor must not be zero"))
            } else {
                Ok(a / b)
            }
        },
        Some(vec!["a".into(), "b".into()]),
    );
    server.add_notification("log", |_msg: String| {});
    server
}

fn send(server: &JsonRpcServer, request: Value) -> Value {
    let bytes = serde_json::to_vec(&request).unwrap();
    let response = server.handle_request(&bytes);
    serde_json::from_slice(&response).unwrap()
}

#[test]
fn positional_add() {
    let server = calculator();
    let response = send(
        &server,
        json!({"jsonrpc":"2.0","method":"add","params":[11,22],"id":1}),
    );
    assert_eq!(response, json!({"jsonrpc":"2.0","id":1,"result":33}));
}

#[test]
fn named_add() {
    let server = calculator();
    let response = send(
        &server,
        json!({"jsonrpc":"2.0","method":"add","params":{"a":11,"b":22},"id":1}),
    );
    assert_eq!(response["result"], json!(33));
}

#[test]
fn missing_named_parameter() {
    let server = calculator();
    let response = send(
        &server,
        json!({"jsonrpc":"2.0","method":"add","params":{"a":11},"id":1}),
    );
    assert_eq!(response["error"]["code"], json!(-32602));
    assert_eq!(
        response["error"]["message"],
        json!("invalid parameter: missing named parameter \"b\"")
    );
}

#[test]
fn type_error_is_decorated_with_parameter_name() {
    let server = calculator();
    let response = send(
        &server,
        json!({"jsonrpc":"2.0","method":"add","params":{"a":"oops","b":1},"id":1}),
    );
    assert_eq!(
        response["error"]["message"],
        json!("invalid parameter: must be integer, but is string for parameter \"a\"")
    );
    assert!(response["error"].get("data").is_none());
}

#[test]
fn fallible_method_surfaces_application_error() {
    let server = calculator();
    let response = send(
        &server,
        json!({"jsonrpc":"2.0","method":"divide","params":[4,0],"id":1}),
    );
    assert_eq!(response["error"]["code"], json!(-32602));
}

#[test]
fn batch_mixes_valid_error_and_non_object() {
    let server = calculator();
    let request = json!([
        {"jsonrpc":"2.0","method":"add","params":[1,2],"id":1},
        {"jsonrpc":"2.0","method":"missing","params":[],"id":2},
        1,
        {"jsonrpc":"2.0","method":"add","params":[1,2]},
    ]);
    let bytes = serde_json::to_vec(&request).unwrap();
    let response: Value = serde_json::from_slice(&server.handle_request(&bytes)).unwrap();
    let items = response.as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["result"], json!(3));
    assert_eq!(items[1]["error"]["code"], json!(-32601));
    assert_eq!(items[2]["error"]["code"], json!(-32600));
}

#[test]
fn notification_produces_no_response_even_when_handler_errors() {
    let server = calculator();
    let bytes = serde_json::to_vec(&json!({
        "jsonrpc":"2.0","method":"missing","params":[],
    }))
    .unwrap();
    assert!(server.handle_request(&bytes).is_empty());
}

#[test]
fn reserved_method_names_are_rejected() {
    let mut server = JsonRpcServer::new();
    assert!(!server.add_method("rpc.internal", || 1));
    assert!(server.add_method("rpc", || 1));
}

#[test]
fn empty_batch_is_a_single_invalid_request() {
    let server = calculator();
    let response: Value = serde_json::from_slice(&server.handle_request(b"[]")).unwrap();
    assert!(response.is_object());
    assert_eq!(response["error"]["code"], json!(-32600));
}

#[test]
fn malformed_json_is_a_parse_error() {
    let server = calculator();
    let response: Value = serde_json::from_slice(&server.handle_request(b"{ not json")).unwrap();
    assert_eq!(response["error"]["code"], json!(-32700));
    assert_eq!(response["id"], Value::Null);
}
