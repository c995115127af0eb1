//! A transport-agnostic JSON-RPC 2.0 dispatcher, typed parameter binder, and
//! client stub.
//!
//! This crate does not open a socket, spawn a thread, or pick a transport
//! for you. It gives you three things that compose around whatever
//! transport you already have:
//!
//! - A [`dispatcher::Dispatcher`]/[`server::JsonRpcServer`] pair that turns
//!   request bytes into response bytes: parsing, grammar validation, batch
//!   fan-out, and routing to registered procedures.
//! - A [`binder`] layer that turns an ordinary Rust function or closure into
//!   a JSON-callable procedure, with per-parameter type and range checking
//!   and precise error messages.
//! - A [`client::JsonRpcClient`] that composes v1/v2 requests, parses
//!   responses, and correlates batch responses by id, driven by any type
//!   implementing [`client::Connector`].
//!
//! # Example
//!
//! ```rust
//! use jrpc_core::server::JsonRpcServer;
//!
//! let mut server = JsonRpcServer::new();
//! server.add_method_named(
//!     "add",
//!     |a: i64, b: i64| a + b,
//!     Some(vec!["a".into(), "b".into()]),
//! );
//!
//! let request = br#"{"jsonrpc":"2.0","method":"add","params":[11,22],"id":1}"#;
//! let response = server.handle_request(request);
//! assert_eq!(
//!     String::from_utf8(response).unwrap(),
//!     r#"{"id":1,"jsonrpc":"2.0","result":33}"#,
//! );
//! ```
//!
//! # Reserved method names
//!
//! Names beginning with `"rpc."` are reserved for protocol extensions and
//! are refused by [`server::JsonRpcServer::add_method`]/`add_notification`.
//! The raw [`dispatcher::Dispatcher`] does not enforce this; it is a
//! policy the server layer adds on top.
//!
//! # Concurrency
//!
//! The core is single-threaded and synchronous by design: dispatch does no
//! I/O, and [`client::Connector::send`] is a plain blocking call. Sharing a
//! [`dispatcher::Dispatcher`] across threads while mutating it requires the
//! embedder's own synchronization (e.g. a `Mutex`).

#![warn(missing_docs)]

pub mod binder;
pub mod client;
pub mod dispatcher;
pub mod error;
pub mod server;
pub mod value;

pub use error::{ClientError, ErrorKind, RpcError};
pub use value::{ClientId, Id};

pub use serde_json::Value;
