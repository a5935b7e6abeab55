//! Method registry and parameter adaptation
//!
//! Handlers are registered under a case-insensitive name together with an
//! explicit list of declared parameter names. Dispatch reconciles the
//! caller-supplied positional or named arguments against that declaration
//! and invokes the handler positionally in declared order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::ErrorObject;
use crate::request::Request;
use crate::response::Response;

/// Result type returned by method handlers
pub type HandlerResult = Result<Value, Box<dyn std::error::Error + Send + Sync>>;

/// Trait for handling a dispatched method call
///
/// Arguments arrive positionally, already adapted: for named params they
/// are reordered into the declared-parameter order before invocation.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn invoke(&self, args: Vec<Value>) -> HandlerResult;
}

/// A function-based handler for closures returning boxed futures
pub struct FunctionHandler<F>
where
    F: Fn(Vec<Value>) -> BoxFuture<'static, HandlerResult> + Send + Sync,
{
    handler_fn: F,
}

impl<F> FunctionHandler<F>
where
    F: Fn(Vec<Value>) -> BoxFuture<'static, HandlerResult> + Send + Sync,
{
    pub fn new(handler_fn: F) -> Self {
        Self { handler_fn }
    }
}

#[async_trait]
impl<F> MethodHandler for FunctionHandler<F>
where
    F: Fn(Vec<Value>) -> BoxFuture<'static, HandlerResult> + Send + Sync,
{
    async fn invoke(&self, args: Vec<Value>) -> HandlerResult {
        (self.handler_fn)(args).await
    }
}

/// A registered method: the handler plus its declared parameter names
pub struct RegisteredMethod {
    pub handler: Arc<dyn MethodHandler>,
    pub param_names: Vec<String>,
}

/// Case-insensitive mapping from method name to registered handler
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, RegisteredMethod>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Register a handler under `name`; re-registration overwrites.
    ///
    /// Names are canonicalized to lowercase, so `"Sum"`, `"sum"`, and
    /// `"SUM"` all address the same entry.
    pub fn register<H>(&mut self, name: &str, param_names: &[&str], handler: H)
    where
        H: MethodHandler + 'static,
    {
        self.register_arc(
            name,
            param_names.iter().map(|p| p.to_string()).collect(),
            Arc::new(handler),
        );
    }

    pub fn register_arc(
        &mut self,
        name: &str,
        param_names: Vec<String>,
        handler: Arc<dyn MethodHandler>,
    ) {
        self.methods.insert(
            name.to_lowercase(),
            RegisteredMethod {
                handler,
                param_names,
            },
        );
    }

    /// Remove a registered method; removing an absent entry is a no-op.
    pub fn unregister(&mut self, name: &str) {
        self.methods.remove(&name.to_lowercase());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(&name.to_lowercase())
    }

    pub fn method_names(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }

    /// Dispatch an inbound request to its handler.
    ///
    /// Returns the response to send back, or `None` for notifications:
    /// whatever the outcome, a request without an id never produces a
    /// reply.
    pub async fn dispatch(&self, request: &Request) -> Option<Response> {
        let Some(entry) = self.methods.get(&request.method.to_lowercase()) else {
            return request
                .id
                .map(|id| Response::error(id, ErrorObject::method_not_found(&request.method)));
        };

        let args = match adapt(&request.method, &entry.param_names, request.params.as_ref()) {
            Ok(args) => args,
            Err(error) => return request.id.map(|id| Response::error(id, error)),
        };

        match entry.handler.invoke(args).await {
            Ok(result) => request.id.map(|id| Response::success(id, result)),
            Err(failure) => request.id.map(|id| {
                Response::error(
                    id,
                    ErrorObject::internal_error(format!(
                        "Method '{}' failed: {}",
                        request.method, failure
                    )),
                )
            }),
        }
    }
}

/// Reconcile supplied params with the declared parameter names.
///
/// A named argument bound to JSON `null` counts as missing, the same as
/// one that is absent outright.
fn adapt(
    method: &str,
    declared: &[String],
    params: Option<&Value>,
) -> Result<Vec<Value>, ErrorObject> {
    match params {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => {
            if items.len() != declared.len() {
                return Err(ErrorObject::invalid_params(&format!(
                    "Method '{}' expects {} parameters, but got {}",
                    method,
                    declared.len(),
                    items.len()
                )));
            }
            Ok(items.clone())
        }
        Some(Value::Object(map)) => {
            let missing = declared
                .iter()
                .any(|name| map.get(name).is_none_or(Value::is_null));
            if map.len() != declared.len() || missing {
                let supplied: Vec<&str> = map.keys().map(String::as_str).collect();
                return Err(ErrorObject::invalid_params(&format!(
                    "Method '{}' expects parameters [{}], but got [{}]",
                    method,
                    declared.join(", "),
                    supplied.join(", ")
                )));
            }
            Ok(declared
                .iter()
                .filter_map(|name| map.get(name).cloned())
                .collect())
        }
        Some(other) => Err(ErrorObject::invalid_params(&format!(
            "Method '{}' expects array or object params, got {}",
            method,
            json_type_name(other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
