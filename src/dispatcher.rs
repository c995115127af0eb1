//! The method/notification registry: normalizes named parameters into
//! positional ones, invokes bound handles, and decorates `invalid_params`
//! errors with the offending parameter's name or index.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::binder::{IntoMethodHandle, IntoNotificationHandle, MethodHandle, NotificationHandle};
use crate::error::RpcError;

struct Entry<H> {
    handle: H,
    names: Option<Vec<String>>,
}

/// A registry of JSON-callable methods and notifications.
///
/// A `Dispatcher` owns no transport knowledge; it is driven by
/// [`crate::server::JsonRpcServer`], which adds the request-grammar layer on
/// top of plain name+params invocation.
#[derive(Default)]
pub struct Dispatcher {
    methods: HashMap<String, Entry<MethodHandle>>,
    notifications: HashMap<String, Entry<NotificationHandle>>,
}

impl Dispatcher {
    /// Construct an empty dispatcher.
    pub fn new() -> Self {
        Dispatcher::default()
    }

    /// Register a method under `name`. Returns `false` (without replacing
    /// the existing registration) if `name` is already registered as either
    /// a method or a notification.
    pub fn add_method<F, Args>(&mut self, name: impl Into<String>, f: F) -> bool
    where
        F: IntoMethodHandle<Args>,
    {
        self.add_method_named(name, f, None)
    }

    /// Like [`Dispatcher::add_method`], but also declares the ordered list
    /// of parameter names this method accepts in object-form calls.
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
        if self.contains(&name) {
            return false;
        }
        debug!(method = %name, "registering method");
        self.methods.insert(
            name,
            Entry {
                handle: f.into_method_handle(),
                names,
            },
        );
        true
    }

    /// Register a notification under `name`.
    pub fn add_notification<F, Args>(&mut self, name: impl Into<String>, f: F) -> bool
    where
        F: IntoNotificationHandle<Args>,
    {
        self.add_notification_named(name, f, None)
    }

    /// Like [`Dispatcher::add_notification`], but also declares the ordered
    /// list of parameter names this notification accepts in object-form
    /// calls.
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
        if self.contains(&name) {
            return false;
        }
        debug!(notification = %name, "registering notification");
        self.notifications.insert(
            name,
            Entry {
                handle: f.into_notification_handle(),
                names,
            },
        );
        true
    }

    /// Remove a registered method or notification. Returns whether anything
    /// was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.methods.remove(name).is_some() || self.notifications.remove(name).is_some()
    }

    /// Whether `name` is registered as either a method or a notification.
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name) || self.notifications.contains_key(name)
    }

    /// Whether `name` is registered as a method.
    pub fn contains_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Whether `name` is registered as a notification.
    pub fn contains_notification(&self, name: &str) -> bool {
        self.notifications.contains_key(name)
    }

    /// All registered method names.
    pub fn method_names(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }

    /// All registered notification names.
    pub fn notification_names(&self) -> Vec<String> {
        self.notifications.keys().cloned().collect()
    }

    /// Invoke the method registered under `name` with the given wire
    /// `params` (array, object, or absent/null).
    pub fn invoke_method(&self, name: &str, params: &Value) -> Result<Value, RpcError> {
        let entry = self
            .methods
            .get(name)
            .ok_or_else(|| RpcError::method_not_found(name))?;
        let positional = normalize_params(params, entry.names.as_deref())?;
        entry
            .handle
            .call(&positional)
            .map_err(|e| decorate(e, entry.names.as_deref()))
    }

    /// Invoke the notification registered under `name` with the given wire
    /// `params` (array, object, or absent/null).
    pub fn invoke_notification(&self, name: &str, params: &Value) -> Result<(), RpcError> {
        let entry = self
            .notifications
            .get(name)
            .ok_or_else(|| RpcError::notification_not_found(name))?;
        let positional = normalize_params(params, entry.names.as_deref())?;
        entry
            .handle
            .call(&positional)
            .map_err(|e| decorate(e, entry.names.as_deref()))
    }
}

/// Convert wire `params` into the positional array a handle expects.
fn normalize_params(params: &Value, names: Option<&[String]>) -> Result<Vec<Value>, RpcError> {
    match params {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(map) => {
            let names = names.ok_or_else(|| {
                RpcError::invalid_params("procedure doesn't support named parameter")
            })?;
            let mut positional = Vec::with_capacity(names.len());
            for name in names {
                match map.get(name) {
                    Some(value) => positional.push(value.clone()),
                    None => {
                        return Err(RpcError::invalid_params(format!(
                            "missing named parameter \"{name}\""
                        )))
                    }
                }
            }
            Ok(positional)
        }
        _ => Err(RpcError::invalid_request(
            "params field must be an array, object",
        )),
    }
}

fn decorate(mut err: RpcError, names: Option<&[String]>) -> RpcError {
    if let Some(index) = err.param_index() {
        let label = match names.and_then(|n| n.get(index)) {
            Some(name) => format!("\"{name}\""),
            None => index.to_string(),
        };
        err.decorate_param(&label);
        warn!(parameter = %label, error = %err, "parameter binding failed");
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut d = Dispatcher::new();
        assert!(d.add_method("add", |a: i64, b: i64| a + b));
        assert!(!d.add_method("add", |a: i64, b: i64| a - b));
    }

    #[test]
    fn named_parameters_are_normalized() {
        let mut d = Dispatcher::new();
        d.add_method_named(
            "add",
            |a: i64, b: i64| a + b,
            Some(vec!["a".into(), "b".into()]),
        );
        let params = serde_json::json!({"b": 22, "a": 11});
        let result = d.invoke_method("add", &params).unwrap();
        assert_eq!(result, Value::from(33));
    }

    #[test]
    fn missing_named_parameter_is_reported() {
        let mut d = Dispatcher::new();
        d.add_method_named(
            "add",
            |a: i64, b: i64| a + b,
            Some(vec!["a".into(), "b".into()]),
        );
        let params = serde_json::json!({"a": 11});
        let err = d.invoke_method("add", &params).unwrap_err();
        assert_eq!(err.message(), "invalid parameter: missing named parameter \"b\"");
    }

    #[test]
    fn type_error_is_decorated_with_parameter_name() {
        let mut d = Dispatcher::new();
        d.add_method_named(
            "add",
            |a: u32, b: u32| a + b,
            Some(vec!["a".into(), "b".into()]),
        );
        let params = serde_json::json!({"a": "oops", "b": 1});
        let err = d.invoke_method("add", &params).unwrap_err();
        assert_eq!(
            err.message(),
            "invalid parameter: must be unsigned integer, but is string for parameter \"a\""
        );
        assert!(err.data().is_none());
    }

    #[test]
    fn method_not_found() {
        let d = Dispatcher::new();
        let err = d.invoke_method("missing", &Value::Array(vec![])).unwrap_err();
        assert_eq!(err.message(), "method not found: missing");
    }
}
