//! Subscription root fields and their resolution to event streams.
//!
//! A [`SubscriptionSchema`] maps root field names to [`SubscriptionField`]s.
//! Subscribing resolves the field's source stream and derives, through
//! [`EventStream::transform`], a stream of per-event [`ResponseFuture`]s.
//! No source event is consumed until the transport subscribes to that stream.

use crate::config::SubscriptionConfig;
use crate::event_stream::EventStream;
use crate::executor::{
    finish_error, Context, EventExecutor, FieldError, PathSegment, ResponseFuture,
};
use crate::observable_stream::ObservableEventStream;
use crate::resolver::{
    event_resolver, EventResolverFn, ResolverArgs, ResolverError, ResolverResult,
};
use crate::selection::SelectionSet;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

type SourceResolverFn<S> =
    Arc<dyn Fn(&Context, &ResolverArgs) -> Result<S, ResolverError> + Send + Sync>;

/// A subscription root field.
pub struct SubscriptionField<S = ObservableEventStream<Value>> {
    name: String,
    description: Option<String>,
    source: SourceResolverFn<S>,
    resolver: Option<EventResolverFn>,
}

impl<S: EventStream<Value>> SubscriptionField<S> {
    /// Creates a field whose events are the field value.
    ///
    /// `source` runs once per subscription and must only build the stream;
    /// events flow after the transport subscribes.
    pub fn new<F>(name: impl Into<String>, source: F) -> Self
    where
        F: Fn(&Context, &ResolverArgs) -> Result<S, ResolverError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            source: Arc::new(source),
            resolver: None,
        }
    }

    /// Creates a field from a stream of serializable events.
    ///
    /// An event that fails to serialize ends the stream with a mapping error.
    pub fn typed<E, Src, F>(name: impl Into<String>, source: F) -> Self
    where
        E: Serialize + Send + 'static,
        Src: EventStream<E, Transformed<Value> = S>,
        F: Fn(&Context, &ResolverArgs) -> Result<Src, ResolverError> + Send + Sync + 'static,
    {
        Self::new(name, move |ctx: &Context, args: &ResolverArgs| {
            Ok(source(ctx, args)?.try_transform(serde_json::to_value::<E>))
        })
    }

    /// Resolves every event before it is projected onto the selection.
    pub fn resolve_with<F, Fut>(mut self, resolver: F) -> Self
    where
        F: Fn(Value, Context, ResolverArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResolverResult> + Send + 'static,
    {
        self.resolver = Some(event_resolver(resolver));
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The description, if any.
    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl<S> fmt::Debug for SubscriptionField<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionField")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("has_resolver", &self.resolver.is_some())
            .finish()
    }
}

/// Errors raised while building a [`SubscriptionSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A field was registered without a name.
    #[error("Subscription field name must not be empty")]
    EmptyFieldName,

    /// Two fields share a name.
    #[error("Duplicate subscription field: {0}")]
    DuplicateField(String),
}

/// Subscription root fields by name.
pub struct SubscriptionSchema<S = ObservableEventStream<Value>> {
    fields: IndexMap<String, SubscriptionField<S>>,
    config: SubscriptionConfig,
}

impl<S: EventStream<Value>> SubscriptionSchema<S> {
    /// Starts building a schema.
    pub fn builder() -> SubscriptionSchemaBuilder<S> {
        SubscriptionSchemaBuilder {
            fields: Vec::new(),
            config: SubscriptionConfig::default(),
        }
    }

    /// Looks a root field up by name.
    pub fn field(&self, name: &str) -> Option<&SubscriptionField<S>> {
        self.fields.get(name)
    }

    /// Root field names in registration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// The execution configuration.
    pub fn config(&self) -> &SubscriptionConfig {
        &self.config
    }

    /// Resolves `request` to a stream of per-event responses.
    ///
    /// Failing to resolve the root field is reported in
    /// [`SubscriptionResult::errors`] and yields no stream.
    pub fn subscribe(
        &self,
        request: SubscriptionRequest,
        ctx: Context,
    ) -> SubscriptionResult<S::Transformed<ResponseFuture>> {
        let response_key = request.response_key().to_string();
        let path = vec![PathSegment::Field(response_key.clone())];

        let Some(field) = self.fields.get(&request.field) else {
            tracing::debug!(field = %request.field, "unknown subscription field");
            let error = FieldError::from(ResolverError::FieldNotFound(request.field))
                .with_path(path);
            return SubscriptionResult::failed(finish_error(&self.config, error));
        };

        let source = match (field.source)(&ctx, &request.args) {
            Ok(source) => source,
            Err(error) => {
                tracing::debug!(field = %field.name, "subscription source failed: {}", error);
                let error = FieldError::from(error).with_path(path);
                return SubscriptionResult::failed(finish_error(&self.config, error));
            }
        };

        let executor = Arc::new(EventExecutor {
            field_name: field.name.clone(),
            response_key,
            args: request.args,
            ctx,
            selection: request.selection,
            resolver: field.resolver.clone(),
            config: self.config.clone(),
        });
        tracing::debug!(field = %field.name, "subscription resolved");

        SubscriptionResult::stream(source.transform(move |event| executor.execute(event)))
    }
}

impl<S> fmt::Debug for SubscriptionSchema<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionSchema")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`SubscriptionSchema`].
pub struct SubscriptionSchemaBuilder<S = ObservableEventStream<Value>> {
    fields: Vec<SubscriptionField<S>>,
    config: SubscriptionConfig,
}

impl<S: EventStream<Value>> SubscriptionSchemaBuilder<S> {
    /// Adds a root field.
    pub fn field(mut self, field: SubscriptionField<S>) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the execution configuration.
    pub fn config(mut self, config: SubscriptionConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the schema.
    pub fn build(self) -> Result<SubscriptionSchema<S>, SchemaError> {
        let mut fields = IndexMap::with_capacity(self.fields.len());
        for field in self.fields {
            if field.name.is_empty() {
                return Err(SchemaError::EmptyFieldName);
            }
            if fields.contains_key(&field.name) {
                return Err(SchemaError::DuplicateField(field.name));
            }
            fields.insert(field.name.clone(), field);
        }
        Ok(SubscriptionSchema {
            fields,
            config: self.config,
        })
    }
}

/// A request for one subscription root field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionRequest {
    field: String,
    alias: Option<String>,
    args: ResolverArgs,
    selection: SelectionSet,
}

impl SubscriptionRequest {
    /// Requests the root field `field`.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Self::default()
        }
    }

    /// Renames the field in every response.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Adds an argument.
    pub fn arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.args.set(name, value);
        self
    }

    /// Replaces all arguments.
    pub fn args(mut self, args: ResolverArgs) -> Self {
        self.args = args;
        self
    }

    /// Sets the selection applied to every event.
    pub fn select(mut self, selection: SelectionSet) -> Self {
        self.selection = selection;
        self
    }

    /// The requested field name.
    pub fn field_name(&self) -> &str {
        &self.field
    }

    /// The key responses are written under.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.field)
    }
}

/// Outcome of resolving a subscription.
#[derive(Debug)]
pub struct SubscriptionResult<S> {
    /// The response stream, if the root field resolved.
    pub stream: Option<S>,
    /// Errors raised while resolving the root field.
    pub errors: Vec<FieldError>,
}

impl<S> SubscriptionResult<S> {
    fn stream(stream: S) -> Self {
        Self {
            stream: Some(stream),
            errors: Vec::new(),
        }
    }

    fn failed(error: FieldError) -> Self {
        Self {
            stream: None,
            errors: vec![error],
        }
    }

    /// Returns true if a stream was produced.
    pub fn is_ok(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns the stream, or the resolution errors.
    pub fn into_stream(self) -> Result<S, Vec<FieldError>> {
        self.stream.ok_or(self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Response;
    use crate::observable_stream::ToEventStream;
    use rxgql_reactive::{Observable, PublishSubject, StreamErrorKind};
    use serde_json::json;
    use std::sync::Mutex;

    fn echo_schema(subject: &PublishSubject<Value>) -> SubscriptionSchema {
        let subject = subject.clone();
        SubscriptionSchema::builder()
            .field(SubscriptionField::new("echo", move |_ctx, _args| {
                Ok(subject.to_event_stream())
            }))
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let field = || {
            SubscriptionField::new("ticks", |_ctx, _args| {
                Ok(Observable::<Value>::never().to_event_stream())
            })
        };
        let err = SubscriptionSchema::builder()
            .field(field())
            .field(field())
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField("ticks".to_string()));

        let err = SubscriptionSchema::builder()
            .field(SubscriptionField::new("", |_ctx, _args| {
                Ok(Observable::<Value>::never().to_event_stream())
            }))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::EmptyFieldName);
    }

    #[test]
    fn test_field_names_keep_order() {
        let schema: SubscriptionSchema = SubscriptionSchema::builder()
            .field(SubscriptionField::new("b", |_ctx, _args| {
                Ok(Observable::empty().to_event_stream())
            }))
            .field(
                SubscriptionField::new("a", |_ctx, _args| {
                    Ok(Observable::empty().to_event_stream())
                })
                .description("second"),
            )
            .build()
            .unwrap();
        assert_eq!(schema.field_names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(schema.field("a").unwrap().get_description(), Some("second"));
    }

    #[test]
    fn test_unknown_field() {
        let schema = echo_schema(&PublishSubject::new());
        let result = schema.subscribe(SubscriptionRequest::new("missing"), Context::new());

        assert!(!result.is_ok());
        let errors = result.into_stream().unwrap_err();
        assert_eq!(errors[0].message, "Field not found: missing");
        assert_eq!(errors[0].code(), Some("FIELD_NOT_FOUND"));
        assert_eq!(errors[0].path, Some(vec![PathSegment::from("missing")]));
    }

    #[test]
    fn test_source_error() {
        let schema: SubscriptionSchema = SubscriptionSchema::builder()
            .field(SubscriptionField::new("room", |_ctx, args| {
                let room: String = args.require("room")?;
                Ok(Observable::just(json!(room)).to_event_stream())
            }))
            .build()
            .unwrap();

        let result = schema.subscribe(SubscriptionRequest::new("room").alias("r"), Context::new());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code(), Some("VALIDATION_ERROR"));
        assert_eq!(result.errors[0].path, Some(vec![PathSegment::from("r")]));
    }

    #[test]
    fn test_subscribe_does_not_consume_source() {
        let subject = PublishSubject::new();
        let schema = echo_schema(&subject);
        let stream = schema
            .subscribe(SubscriptionRequest::new("echo"), Context::new())
            .into_stream()
            .unwrap();

        assert!(!subject.has_observers());
        let handle = stream.subscribe_fn(|_| {});
        assert!(subject.has_observers());
        handle.dispose();
        assert!(!subject.has_observers());
    }

    #[tokio::test]
    async fn test_events_become_responses() {
        let subject = PublishSubject::new();
        let schema = echo_schema(&subject);
        let stream = schema
            .subscribe(SubscriptionRequest::new("echo").alias("e"), Context::new())
            .into_stream()
            .unwrap();

        let futures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&futures);
        let _handle = stream.subscribe_fn(move |response| sink.lock().unwrap().push(response));

        subject.on_next(json!(1));
        subject.on_next(json!("two"));

        let pending: Vec<ResponseFuture> = std::mem::take(&mut *futures.lock().unwrap());
        let mut responses = Vec::new();
        for future in pending {
            responses.push(future.await);
        }
        assert_eq!(
            responses,
            vec![
                Response::data(json!({"e": 1})),
                Response::data(json!({"e": "two"})),
            ]
        );
    }

    #[derive(Clone, Serialize)]
    struct Tick {
        n: u32,
    }

    #[tokio::test]
    async fn test_typed_field() {
        let ticks: PublishSubject<Tick> = PublishSubject::new();
        let source = ticks.clone();
        let schema: SubscriptionSchema = SubscriptionSchema::builder()
            .field(SubscriptionField::typed("ticks", move |_ctx, _args| {
                Ok(source.to_event_stream())
            }))
            .build()
            .unwrap();

        let stream = schema
            .subscribe(
                SubscriptionRequest::new("ticks").select(SelectionSet::fields(["n"])),
                Context::new(),
            )
            .into_stream()
            .unwrap();

        let futures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&futures);
        let _handle = stream.subscribe_fn(move |response| sink.lock().unwrap().push(response));
        ticks.on_next(Tick { n: 7 });

        let future = futures.lock().unwrap().pop().unwrap();
        assert_eq!(future.await, Response::data(json!({"ticks": {"n": 7}})));
    }

    #[test]
    fn test_typed_field_serialization_failure() {
        struct Unserializable;

        impl Serialize for Unserializable {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("not today"))
            }
        }

        let schema: SubscriptionSchema = SubscriptionSchema::builder()
            .field(SubscriptionField::typed("bad", |_ctx, _args| {
                Ok(Observable::create(|subscriber: rxgql_reactive::Subscriber<Unserializable>| {
                    subscriber.on_next(Unserializable);
                    rxgql_reactive::Disposable::empty()
                })
                .to_event_stream())
            }))
            .build()
            .unwrap();
        let stream = schema
            .subscribe(SubscriptionRequest::new("bad"), Context::new())
            .into_stream()
            .unwrap();

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let _handle = stream.subscribe_event(move |event| {
            if let rxgql_reactive::Event::Error(err) = event {
                sink.lock().unwrap().push(err);
            }
        });

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), StreamErrorKind::Mapping);
        assert_eq!(errors[0].message(), "not today");
    }
}
