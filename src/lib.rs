//! # wireroute
//!
//! **wireroute** is the dispatch core of an RPC-style server framework: it
//! turns registered, typed route descriptions into compiled handlers that
//! can be invoked from a binary wire protocol, with plugins that inject
//! extra parameters or side effects without changing the handler
//! signatures application authors write.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - **[`descriptor`]** - Immutable route shape value objects and the wire
//!   identity hash
//! - **[`router`]** - Route registration, plugin composition, and argument
//!   slot binding
//! - **[`plugin`]** - The two-phase capability protocol for claiming and
//!   injecting handler arguments
//! - **[`dispatcher`]** - Per-request decode → invoke → encode with the
//!   uniform status-code mapping
//! - **[`completion`]** - The single-shot completion handle handlers
//!   resolve their results through
//! - **[`wire`]** - Varint framing primitives and the typed value codec
//! - **[`token`]** - Streaming value tokenizer for textual literals
//! - **[`listener`]** - External call observation seam (metrics)
//! - **[`docs`]** - Write-only documentation sink
//! - **[`limits`]** - Environment-driven runtime limits
//!
//! ## Request flow
//!
//! Registration time wires plugins → router → compiled routes stored in a
//! hash-keyed table. At request time the dispatcher decodes a route
//! identity off the inbound frame, decodes typed arguments using the
//! route's compiled shape, invokes the handler (plugin slots injected
//! first), and writes exactly one response frame.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use wireroute::descriptor::{ParamType, QueryParam};
//! use wireroute::dispatcher::WireDispatcher;
//! use wireroute::router::{RouteDesc, Router};
//! use wireroute::wire::BinaryCodec;
//!
//! let mut router = Router::new();
//! let desc = RouteDesc::get("/item/{id:int}")
//!     .query(QueryParam::optional(
//!         "verbose",
//!         ParamType::Bool,
//!         serde_json::Value::Bool(false),
//!         "include details",
//!     ));
//! router
//!     .add_route(
//!         desc,
//!         Arc::new(|call, done| {
//!             let id = call.arg(0).cloned().unwrap_or_default();
//!             done.succeed(Ok(id));
//!         }),
//!         &[ParamType::Int, ParamType::Bool],
//!         ParamType::Int,
//!     )
//!     .expect("register route");
//!
//! let dispatcher = WireDispatcher::from_router(router, Arc::new(BinaryCodec::default()));
//! // hand `dispatcher` to the transport; it is read-only from here on
//! # let _ = dispatcher;
//! ```
//!
//! ## Concurrency model
//!
//! One request is one synchronous decode → dispatch → encode run on the
//! thread the transport provides. The route table is built once at startup
//! and read without locks afterwards; completion handles and tokenizer
//! cursors are single-use, single-owner objects. Cancellation, deadlines,
//! and retries belong to the transport, not this layer.

pub mod completion;
pub mod descriptor;
pub mod dispatcher;
pub mod docs;
pub mod limits;
pub mod listener;
pub mod plugin;
pub mod router;
pub mod token;
pub mod wire;

pub use completion::Completion;
pub use descriptor::{
    route_hash, route_identity, Method, ParamType, PathSegment, QueryParam, RouteProperty,
};
pub use dispatcher::{
    CallContext, CallFailure, CallOutcome, ConnectionContext, DispatchError, HandlerBody,
    ResponseCode, WireDispatcher,
};
pub use docs::{CollectingDocSink, DocSink, NullDocSink, RouteDoc};
pub use limits::DispatchLimits;
pub use listener::{DispatchListener, MetricsListener};
pub use plugin::{BoundPlugin, Plugin, PluginContext, RouteModifier};
pub use router::{RegistrationError, Route, RouteDesc, Router};
pub use token::{TokenError, TokenKind, Tokenizer};
pub use wire::{BinaryCodec, CodecError, ValueCodec};
