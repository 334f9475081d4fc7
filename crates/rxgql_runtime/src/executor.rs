//! Per-event execution for subscriptions.
//!
//! A subscription root field produces a stream of source events. Every event
//! is run through the field's resolver and projected onto the selection set,
//! yielding one [`Response`] per event.

use crate::config::SubscriptionConfig;
use crate::resolver::{EventResolverFn, ResolverArgs, ResolverError, ResolverResult};
use crate::selection::SelectionSet;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The value each subscription event is transformed into.
///
/// Produced synchronously when the source emits; the consumer awaits it.
/// Field timeouts apply when it is polled inside a tokio runtime with the
/// time driver enabled. Other executors run the resolver without a limit.
pub type ResponseFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Request-scoped values handed to every resolver of one subscription.
///
/// Cloned into each per-event resolver call.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Values set by the transport, such as the authenticated user.
    pub data: HashMap<String, Value>,
    /// Operation variables.
    pub variables: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variables(variables: HashMap<String, Value>) -> Self {
        Self {
            variables,
            ..Self::default()
        }
    }

    /// Stores `value` under `key`. Values that fail to serialize are skipped.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.data.insert(key.into(), value);
            }
            Err(e) => tracing::warn!("context value not stored: {}", e),
        }
    }

    /// Decodes the value stored under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        T::deserialize(self.data.get(key)?).ok()
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}

/// The GraphQL payload produced for one subscription event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl Response {
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }

    /// A response with no data, only `error`.
    pub fn error(error: FieldError) -> Self {
        Self {
            data: None,
            errors: Some(vec![error]),
        }
    }

    pub fn partial(data: Value, errors: Vec<FieldError>) -> Self {
        Self {
            data: Some(data),
            errors: Some(errors),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_empty())
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

/// A GraphQL error located at a response path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub message: String,
    /// Response keys and list indices leading to the failed value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Map<String, Value>>,
}

/// One step of a [`FieldError`] path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Field(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl FieldError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            extensions: None,
        }
    }

    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = Some(path);
        self
    }

    /// Sets `extensions[key]`.
    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.into(), value);
        self
    }

    /// Sets `extensions.code`.
    pub fn with_code(self, code: impl Into<String>) -> Self {
        self.with_extension("code", Value::String(code.into()))
    }

    /// The `extensions.code` value, if set.
    pub fn code(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .and_then(Value::as_str)
    }
}

/// Turns source events of one subscription into responses.
///
/// Shared by every event of the subscription, so each event's future gets a
/// cheap handle to it.
pub(crate) struct EventExecutor {
    pub(crate) field_name: String,
    pub(crate) response_key: String,
    pub(crate) args: ResolverArgs,
    pub(crate) ctx: Context,
    pub(crate) selection: SelectionSet,
    pub(crate) resolver: Option<EventResolverFn>,
    pub(crate) config: SubscriptionConfig,
}

impl EventExecutor {
    /// Starts execution for one event.
    ///
    /// Nothing is resolved until the returned future is polled.
    pub(crate) fn execute(self: &Arc<Self>, event: Value) -> ResponseFuture {
        if self.config.trace_events {
            tracing::trace!(field = %self.field_name, event = %event, "subscription event");
        }
        let this = Arc::clone(self);
        Box::pin(async move { this.run(event).await })
    }

    async fn run(&self, event: Value) -> Response {
        let mut path = vec![PathSegment::Field(self.response_key.clone())];
        let resolved = match self.resolve(event).await {
            Ok(value) => self.selection.project(&value, &mut path),
            Err(error) => Err(FieldError::from(error)),
        };

        match resolved {
            Ok(value) => Response::data(self.wrap(value)),
            Err(error) => {
                tracing::debug!(field = %self.field_name, "subscription event failed: {}", error.message);
                let error = if error.path.is_some() {
                    error
                } else {
                    error.with_path(vec![PathSegment::Field(self.response_key.clone())])
                };
                let errors = vec![finish_error(&self.config, error)];
                Response::partial(self.wrap(Value::Null), errors)
            }
        }
    }

    async fn resolve(&self, event: Value) -> ResolverResult {
        let Some(resolver) = &self.resolver else {
            return Ok(event);
        };
        let future = resolver(event, self.ctx.clone(), self.args.clone());
        let limit = self
            .config
            .field_timeout()
            .filter(|_| tokio::runtime::Handle::try_current().is_ok());
        match limit {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .map_err(|_| ResolverError::Timeout {
                    field: self.field_name.clone(),
                    timeout_ms: self.config.field_timeout_ms,
                })?,
            None => future.await,
        }
    }

    fn wrap(&self, value: Value) -> Value {
        let mut data = serde_json::Map::new();
        data.insert(self.response_key.clone(), value);
        Value::Object(data)
    }
}

/// Applies the error reporting options of `config` to `error`.
pub(crate) fn finish_error(config: &SubscriptionConfig, mut error: FieldError) -> FieldError {
    if config.include_error_codes {
        return error;
    }
    if let Some(ext) = error.extensions.as_mut() {
        ext.remove("code");
        if ext.is_empty() {
            error.extensions = None;
        }
    }
    error
}
