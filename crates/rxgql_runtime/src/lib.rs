//! GraphQL subscription runtime for rxgql.
//!
//! This crate turns push sources into GraphQL subscription streams:
//! - `event_stream`: the `EventStream` capability execution depends on
//! - `observable_stream`: `ObservableEventStream`, the observable-backed stream
//! - `subscription`: root fields, schema and `subscribe`
//! - `executor`: per-event resolution into `Response`s
//! - `selection`: selection sets and response shaping
//! - `resolver`: resolver arguments and errors
//! - `pubsub`: topic hub for publishing events
//! - `config`: execution configuration

pub mod config;
pub mod event_stream;
pub mod executor;
pub mod observable_stream;
pub mod pubsub;
pub mod resolver;
pub mod selection;
pub mod subscription;

pub use config::SubscriptionConfig;
pub use event_stream::EventStream;
pub use executor::{Context, FieldError, PathSegment, Response, ResponseFuture};
pub use observable_stream::{
    ObservableEventStream, ObservableSubscriptionEventStream, ToEventStream,
};
pub use pubsub::{PubSub, TypedPubSub};
pub use resolver::{ResolverArgs, ResolverError, ResolverFuture, ResolverResult};
pub use selection::{Selection, SelectionSet};
pub use subscription::{
    SchemaError, SubscriptionField, SubscriptionRequest, SubscriptionResult, SubscriptionSchema,
    SubscriptionSchemaBuilder,
};
