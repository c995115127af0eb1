//! The typed binding layer: turning a native procedure of arbitrary arity
//! into a uniform `&[Value] -> Result<Value, RpcError>` (or, for
//! notifications, `&[Value] -> Result<(), RpcError>`) callable.
//!
//! Rust has no variadic generics, so the arity erasure the reference
//! implementation gets from template specialization is built here instead
//! as one trait impl per tuple arity, generated by [`impl_into_handles`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::RpcError;
use crate::value::json_kind_name;

/// A bound method: accepts positional JSON parameters, returns a JSON result
/// or a structured error.
pub struct MethodHandle {
    arity: usize,
    func: Box<dyn Fn(&[Value]) -> Result<Value, RpcError> + Send + Sync>,
}

impl MethodHandle {
    /// The number of positional parameters this handle expects.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Invoke the bound procedure with positional parameters.
    pub fn call(&self, params: &[Value]) -> Result<Value, RpcError> {
        (self.func)(params)
    }
}

/// A bound notification: accepts positional JSON parameters, returns nothing.
pub struct NotificationHandle {
    arity: usize,
    func: Box<dyn Fn(&[Value]) -> Result<(), RpcError> + Send + Sync>,
}

impl NotificationHandle {
    /// The number of positional parameters this handle expects.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Invoke the bound procedure with positional parameters.
    pub fn call(&self, params: &[Value]) -> Result<(), RpcError> {
        (self.func)(params)
    }
}

/// Extracts a native parameter from a single JSON value at a known
/// positional index, for use in a structured `invalid_parameter` message.
pub trait FromParam: Sized {
    /// The kind name reported as "expected" on a type mismatch.
    const EXPECTED: &'static str;

    /// Extract `Self` from `value`, found at positional `index`.
    fn from_param(value: &Value, index: usize) -> Result<Self, RpcError>;
}

fn type_mismatch<T: FromParam>(value: &Value, index: usize) -> RpcError {
    RpcError::invalid_param_at(
        format!("must be {}, but is {}", T::EXPECTED, json_kind_name(value)),
        index,
    )
}

macro_rules! impl_from_param_signed {
    ($($t:ty),* $(,)?) => {$(
        impl FromParam for $t {
            const EXPECTED: &'static str = "integer";

            fn from_param(value: &Value, index: usize) -> Result<Self, RpcError> {
                let i = value.as_i64().ok_or_else(|| type_mismatch::<Self>(value, index))?;
                <$t>::try_from(i).map_err(|_| {
                    RpcError::invalid_param_at("exceeds value range of integer", index)
                })
            }
        }
    )*};
}

macro_rules! impl_from_param_unsigned {
    ($($t:ty),* $(,)?) => {$(
        impl FromParam for $t {
            const EXPECTED: &'static str = "unsigned integer";

            fn from_param(value: &Value, index: usize) -> Result<Self, RpcError> {
                let u = value.as_u64().ok_or_else(|| type_mismatch::<Self>(value, index))?;
                <$t>::try_from(u).map_err(|_| {
                    RpcError::invalid_param_at("exceeds value range of integer", index)
                })
            }
        }
    )*};
}

impl_from_param_signed!(i8, i16, i32, i64, isize);
impl_from_param_unsigned!(u8, u16, u32, u64, usize);

impl FromParam for f32 {
    const EXPECTED: &'static str = "number";

    fn from_param(value: &Value, index: usize) -> Result<Self, RpcError> {
        value
            .as_f64()
            .map(|f| f as f32)
            .ok_or_else(|| type_mismatch::<Self>(value, index))
    }
}

impl FromParam for f64 {
    const EXPECTED: &'static str = "number";

    fn from_param(value: &Value, index: usize) -> Result<Self, RpcError> {
        value
            .as_f64()
            .ok_or_else(|| type_mismatch::<Self>(value, index))
    }
}

impl FromParam for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_param(value: &Value, index: usize) -> Result<Self, RpcError> {
        value
            .as_bool()
            .ok_or_else(|| type_mismatch::<Self>(value, index))
    }
}

impl FromParam for String {
    const EXPECTED: &'static str = "string";

    fn from_param(value: &Value, index: usize) -> Result<Self, RpcError> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| type_mismatch::<Self>(value, index))
    }
}

impl FromParam for Value {
    const EXPECTED: &'static str = "any";

    fn from_param(value: &Value, _index: usize) -> Result<Self, RpcError> {
        Ok(value.clone())
    }
}

impl<T: FromParam> FromParam for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_param(value: &Value, index: usize) -> Result<Self, RpcError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_param(value, index).map(Some)
        }
    }
}

impl<T: DeserializeOwned> FromParam for Vec<T> {
    const EXPECTED: &'static str = "array";

    fn from_param(value: &Value, index: usize) -> Result<Self, RpcError> {
        if !value.is_array() {
            return Err(type_mismatch::<Self>(value, index));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| RpcError::invalid_params(e))
    }
}

impl<T: DeserializeOwned> FromParam for std::collections::HashMap<String, T> {
    const EXPECTED: &'static str = "object";

    fn from_param(value: &Value, index: usize) -> Result<Self, RpcError> {
        if !value.is_object() {
            return Err(type_mismatch::<Self>(value, index));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| RpcError::invalid_params(e))
    }
}

/// A parameter wrapper delegating extraction entirely to `serde`, for
/// procedure parameters that have no dedicated [`FromParam`] impl (plain
/// structs and enums). `MethodHandle`s receive this wrapper by value and
/// unwrap it with `.0`.
pub struct Struct<T>(pub T);

impl<T: DeserializeOwned> FromParam for Struct<T> {
    const EXPECTED: &'static str = "object";

    fn from_param(value: &Value, index: usize) -> Result<Self, RpcError> {
        serde_json::from_value(value.clone())
            .map(Struct)
            .map_err(|e| RpcError::invalid_params(e))
    }
}

/// Converts a native procedure's return value into a JSON result, or a
/// structured error for procedures that may fail.
pub trait IntoJson {
    /// Convert `self` into a JSON-RPC result value.
    fn into_json(self) -> Result<Value, RpcError>;
}

impl<T: Serialize> IntoJson for T {
    fn into_json(self) -> Result<Value, RpcError> {
        serde_json::to_value(self)
            .map_err(|e| RpcError::internal_error(format!("failed to serialize result: {e}")))
    }
}

/// Converts a native procedure of a specific argument tuple shape into a
/// [`MethodHandle`].
pub trait IntoMethodHandle<Args> {
    /// Bind this procedure into a uniform [`MethodHandle`].
    fn into_method_handle(self) -> MethodHandle;
}

/// Converts a native procedure of a specific argument tuple shape into a
/// [`NotificationHandle`].
pub trait IntoNotificationHandle<Args> {
    /// Bind this procedure into a uniform [`NotificationHandle`].
    fn into_notification_handle(self) -> NotificationHandle;
}

/// A marker result type procedures can return to signal a JSON-RPC failure
/// without panicking; `IntoJson` for `Result<T, RpcError>` is implemented
/// separately from the blanket `Serialize` impl below, since `RpcError`
/// itself never implements `Serialize`.
impl<T: Serialize> IntoJson for Result<T, RpcError> {
    fn into_json(self) -> Result<Value, RpcError> {
        match self {
            Ok(v) => serde_json::to_value(v)
                .map_err(|e| RpcError::internal_error(format!("failed to serialize result: {e}"))),
            Err(e) => Err(e),
        }
    }
}

macro_rules! arity_error {
    ($params:expr, $arity:expr) => {
        if $params.len() != $arity {
            // Unlike a per-parameter mismatch, this is about the whole
            // argument list, so it carries no "invalid parameter: " prefix
            // and no parameter index.
            return Err(RpcError::new(
                crate::error::INVALID_PARAMS,
                format!("expected {} argument(s), but found {}", $arity, $params.len()),
            ));
        }
    };
}

macro_rules! impl_into_handles {
    ( $n:expr; $( $arg:ident : $idx:tt ),* ) => {
        impl<F, R, $($arg),*> IntoMethodHandle<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: IntoJson,
            $($arg: FromParam + 'static,)*
        {
            #[allow(unused_variables)]
            fn into_method_handle(self) -> MethodHandle {
                MethodHandle {
                    arity: $n,
                    func: Box::new(move |params: &[Value]| {
                        arity_error!(params, $n);
                        $(
                            let $arg = <$arg as FromParam>::from_param(&params[$idx], $idx)?;
                        )*
                        self($($arg),*).into_json()
                    }),
                }
            }
        }

        impl<F, $($arg),*> IntoNotificationHandle<($($arg,)*)> for F
        where
            F: Fn($($arg),*) + Send + Sync + 'static,
            $($arg: FromParam + 'static,)*
        {
            #[allow(unused_variables)]
            fn into_notification_handle(self) -> NotificationHandle {
                NotificationHandle {
                    arity: $n,
                    func: Box::new(move |params: &[Value]| {
                        arity_error!(params, $n);
                        $(
                            let $arg = <$arg as FromParam>::from_param(&params[$idx], $idx)?;
                        )*
                        self($($arg),*);
                        Ok(())
                    }),
                }
            }
        }
    };
}

impl_into_handles!(0;);
impl_into_handles!(1; A0:0);
impl_into_handles!(2; A0:0, A1:1);
impl_into_handles!(3; A0:0, A1:1, A2:2);
impl_into_handles!(4; A0:0, A1:1, A2:2, A3:3);
impl_into_handles!(5; A0:0, A1:1, A2:2, A3:3, A4:4);
impl_into_handles!(6; A0:0, A1:1, A2:2, A3:3, A4:4, A5:5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_positional_add() {
        let handle = (|a: i64, b: i64| a + b).into_method_handle();
        let result = handle.call(&[Value::from(11), Value::from(22)]).unwrap();
        assert_eq!(result, Value::from(33));
    }

    #[test]
    fn arity_mismatch() {
        let handle = (|a: i64, b: i64| a + b).into_method_handle();
        let err = handle.call(&[Value::from(1)]).unwrap_err();
        assert_eq!(err.message(), "expected 2 argument(s), but found 1");
    }

    #[test]
    fn type_mismatch_is_decorable() {
        let handle = (|a: u32| a).into_method_handle();
        let err = handle.call(&[Value::from("x")]).unwrap_err();
        assert_eq!(
            err.message(),
            "invalid parameter: must be unsigned integer, but is string"
        );
        assert_eq!(err.param_index(), Some(0));
    }

    #[test]
    fn negative_against_unsigned_reports_integer_kind() {
        let handle = (|a: u32| a).into_method_handle();
        let err = handle.call(&[Value::from(-5)]).unwrap_err();
        assert_eq!(
            err.message(),
            "invalid parameter: must be unsigned integer, but is integer"
        );
    }

    #[test]
    fn option_param_accepts_null() {
        let handle = (|a: Option<i64>| a.unwrap_or(-1)).into_method_handle();
        assert_eq!(handle.call(&[Value::Null]).unwrap(), Value::from(-1));
        assert_eq!(handle.call(&[Value::from(7)]).unwrap(), Value::from(7));
    }

    #[test]
    fn fallible_procedure_propagates_rpc_error() {
        let handle = (|a: i64, b: i64| -> Result<i64, RpcError> {
            if b == 0 {
                Err(RpcError::invalid_params("divisor must not be zero"))
            } else {
                Ok(a / b)
            }
        })
        .into_method_handle();
        let err = handle.call(&[Value::from(4), Value::from(0)]).unwrap_err();
        assert_eq!(err.message(), "invalid parameter: divisor must not be zero");
    }

    #[test]
    fn notification_runs_for_side_effect() {
        use std::sync::atomic::{AtomicI64, Ordering};
        use std::sync::Arc;

        let total = Arc::new(AtomicI64::new(0));
        let total2 = total.clone();
        let handle = (move |a: i64| {
            total2.fetch_add(a, Ordering::SeqCst);
        })
        .into_notification_handle();
        handle.call(&[Value::from(5)]).unwrap();
        assert_eq!(total.load(Ordering::SeqCst), 5);
    }
}
