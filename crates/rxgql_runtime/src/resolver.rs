//! Resolver plumbing for subscription fields.

use crate::executor::{Context, FieldError};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Field arguments of a subscription request, in the order they were given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverArgs {
    values: IndexMap<String, Value>,
}

impl ResolverArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value of `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Decodes `name`, or `None` if it is absent or does not decode as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.require(name).ok()
    }

    /// Decodes `name`, failing if it is absent or malformed.
    pub fn require<T: DeserializeOwned>(&self, name: &str) -> Result<T, ResolverError> {
        let Some(value) = self.values.get(name) else {
            return Err(ResolverError::MissingArgument(name.to_string()));
        };
        T::deserialize(value)
            .map_err(|e| ResolverError::ArgumentParseError(name.to_string(), e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sets `name`, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ResolverArgs {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Outcome of resolving one field value.
pub type ResolverResult = Result<Value, ResolverError>;

/// Boxed future returned by per-event resolvers.
pub type ResolverFuture<'a> = Pin<Box<dyn Future<Output = ResolverResult> + Send + 'a>>;

/// A per-event resolver, type-erased.
pub(crate) type EventResolverFn =
    Arc<dyn Fn(Value, Context, ResolverArgs) -> ResolverFuture<'static> + Send + Sync>;

/// Boxes an async closure into an [`EventResolverFn`].
pub(crate) fn event_resolver<F, Fut>(f: F) -> EventResolverFn
where
    F: Fn(Value, Context, ResolverArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ResolverResult> + Send + 'static,
{
    Arc::new(move |event, ctx, args| -> ResolverFuture<'static> { Box::pin(f(event, ctx, args)) })
}

/// Failure while resolving a subscription field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolverError {
    /// The schema has no such subscription field.
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// A required argument was not supplied.
    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    /// An argument did not decode to the expected type.
    #[error("Failed to parse argument '{0}': {1}")]
    ArgumentParseError(String, String),

    /// The per-event resolver did not finish in time.
    #[error("Resolver for '{field}' timed out after {timeout_ms}ms")]
    Timeout { field: String, timeout_ms: u64 },

    /// Error raised by application code.
    #[error("{0}")]
    Custom(String),

    /// Unexpected failure inside the runtime.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResolverError {
    /// Returns the error code reported in the `code` extension.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::FieldNotFound(_) => "FIELD_NOT_FOUND",
            Self::MissingArgument(_) | Self::ArgumentParseError(..) => "VALIDATION_ERROR",
            Self::Timeout { .. } => "RESOLVER_TIMEOUT",
            Self::Custom(_) => "RESOLVER_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<ResolverError> for FieldError {
    fn from(error: ResolverError) -> Self {
        FieldError::new(error.to_string()).with_code(error.code())
    }
}

/// Looks a field up on a parent object.
///
/// Falls back to the snake_case spelling of `field_name`, so serialized Rust
/// structs can back camelCase selections. Missing fields resolve to null.
pub(crate) fn lookup_field(parent: &serde_json::Map<String, Value>, field_name: &str) -> Value {
    parent
        .get(field_name)
        .or_else(|| parent.get(&to_snake_case(field_name)))
        .cloned()
        .unwrap_or(Value::Null)
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.char_indices() {
        if c.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_args_keep_order() {
        let mut args = ResolverArgs::new();
        args.set("room", json!("lobby"));
        args.set("limit", json!(10));
        args.set("room", json!("kitchen"));

        assert_eq!(args.len(), 2);
        assert_eq!(args.get_as::<u32>("limit"), Some(10));
        assert_eq!(args.get_as::<u32>("room"), None);
        let names: Vec<_> = args.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["room", "limit"]);
    }

    #[test]
    fn test_require() {
        let args: ResolverArgs = [("id", json!("abc"))].into_iter().collect();

        assert_eq!(args.require::<String>("id"), Ok("abc".to_string()));
        assert_eq!(
            args.require::<String>("name"),
            Err(ResolverError::MissingArgument("name".to_string()))
        );
        assert!(matches!(
            args.require::<i64>("id"),
            Err(ResolverError::ArgumentParseError(name, _)) if name == "id"
        ));
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("userEventId"), "user_event_id");
        assert_eq!(to_snake_case("user"), "user");
    }

    #[test]
    fn test_lookup_field() {
        let parent = json!({"name": "Alice", "created_at": "today"});
        let parent = parent.as_object().unwrap();

        assert_eq!(lookup_field(parent, "name"), json!("Alice"));
        assert_eq!(lookup_field(parent, "createdAt"), json!("today"));
        assert_eq!(lookup_field(parent, "missing"), Value::Null);
    }

    #[test]
    fn test_field_error_conversion() {
        let error: FieldError = ResolverError::MissingArgument("id".to_string()).into();
        assert_eq!(error.message, "Missing required argument: id");
        assert_eq!(error.code(), Some("VALIDATION_ERROR"));
    }

    #[tokio::test]
    async fn test_event_resolver() {
        let resolver = event_resolver(|event, ctx, args| async move {
            let suffix: String = args.get_as("suffix").unwrap_or_default();
            let user: Option<String> = ctx.get("user");
            Ok(json!(format!(
                "{}{}-{}",
                event.as_str().unwrap_or_default(),
                suffix,
                user.unwrap_or_default()
            )))
        });

        let mut ctx = Context::new();
        ctx.set("user", "bob");
        let args: ResolverArgs = [("suffix", json!("!"))].into_iter().collect();

        let value = resolver(json!("hi"), ctx, args).await.unwrap();
        assert_eq!(value, json!("hi!-bob"));
    }
}
