use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::Value;
use smallvec::{smallvec, SmallVec};
use tracing::{debug, error, warn};

use crate::completion::Completion;
use crate::descriptor::ParamType;
use crate::listener::DispatchListener;
use crate::router::{Route, Router};
use crate::wire::{varint, CodecError, ValueCodec};

/// Maximum inline handler arguments before heap allocation.
pub const MAX_INLINE_ARGS: usize = 8;

/// Stack-allocated argument array for the hot path.
pub type ArgVec = SmallVec<[Value; MAX_INLINE_ARGS]>;

/// Fixed message written for every `InternalError` frame, so internal
/// detail never leaks onto the wire.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Ordinal-stable response status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseCode {
    Success = 0,
    NoRoute = 1,
    NotFound = 2,
    InvalidArgs = 3,
    NoPermission = 4,
    InternalError = 5,
}

impl ResponseCode {
    /// Decode a status byte, e.g. from a response frame in tests.
    #[must_use]
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(ResponseCode::Success),
            1 => Some(ResponseCode::NoRoute),
            2 => Some(ResponseCode::NotFound),
            3 => Some(ResponseCode::InvalidArgs),
            4 => Some(ResponseCode::NoPermission),
            5 => Some(ResponseCode::InternalError),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResponseCode::Success => "Success",
            ResponseCode::NoRoute => "NoRoute",
            ResponseCode::NotFound => "NotFound",
            ResponseCode::InvalidArgs => "InvalidArgs",
            ResponseCode::NoPermission => "NoPermission",
            ResponseCode::InternalError => "InternalError",
        };
        write!(f, "{}", s)
    }
}

/// Domain failure kinds a handler can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Domain "not found".
    NotFound,
    /// Malformed input or invalid state.
    InvalidArgs,
    /// Caller lacks permission.
    Unauthorized,
    /// Everything else; the message is scrubbed before leaving the
    /// process.
    Internal,
}

/// A handler-reported failure carried through the completion handle.
#[derive(Debug, Clone)]
pub struct CallFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl CallFailure {
    #[must_use]
    pub fn not_found(message: &str) -> Self {
        CallFailure {
            kind: FailureKind::NotFound,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn invalid(message: &str) -> Self {
        CallFailure {
            kind: FailureKind::InvalidArgs,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unauthorized(message: &str) -> Self {
        CallFailure {
            kind: FailureKind::Unauthorized,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn internal(message: &str) -> Self {
        CallFailure {
            kind: FailureKind::Internal,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CallFailure {}

/// Handler bodies may bubble arbitrary application errors; they surface as
/// internal failures with the message preserved for logging.
impl From<anyhow::Error> for CallFailure {
    fn from(err: anyhow::Error) -> Self {
        CallFailure::internal(&err.to_string())
    }
}

/// The value-or-error outcome a handler resolves its completion with.
pub type CallOutcome = Result<Value, CallFailure>;

/// A compiled handler body.
///
/// Receives the per-call context and a single-shot completion handle, and
/// must resolve the handle exactly once — synchronously before returning
/// in this dispatch model.
pub type HandlerBody = Arc<dyn Fn(&mut CallContext, &Completion<CallOutcome>) + Send + Sync>;

/// Transport-provided connection state, opaque to the dispatch core.
#[derive(Debug, Clone, Default)]
pub struct ConnectionContext {
    pub peer: Option<SocketAddr>,
    pub attributes: HashMap<String, Value>,
}

impl ConnectionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_peer(peer: SocketAddr) -> Self {
        ConnectionContext {
            peer: Some(peer),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Per-call context handed to plugins and the handler body.
///
/// `args` is the full handler argument array: path-bound, query-bound and
/// plugin-claimed slots all live here. Path and query values are decoded
/// by the dispatcher; plugin slots are injected by the compiled handler
/// wrapper before the application body runs.
#[derive(Debug)]
pub struct CallContext {
    pub connection: ConnectionContext,
    pub route_name: Arc<str>,
    pub args: ArgVec,
}

impl CallContext {
    /// The argument at `index`, if declared.
    #[inline]
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
}

/// Per-request failures, aggregated at the dispatch boundary into the
/// status-code mapping.
#[derive(Debug)]
pub enum DispatchError {
    /// No route registered under the decoded identity.
    NoRoute { identity: u32 },
    /// Malformed wire bytes while decoding arguments.
    Decode(CodecError),
    /// A required query parameter's presence bit was unset.
    MissingQuery {
        name: String,
        description: String,
        ty: ParamType,
    },
    /// The handler resolved its completion with a failure.
    Handler(CallFailure),
    /// The handler returned without resolving its completion.
    Unresolved,
    /// The handler panicked; the payload is for logs only.
    HandlerPanic(String),
    /// Result serialization failed after the handler succeeded.
    Encode(CodecError),
}

impl DispatchError {
    /// The single exhaustive status-code mapping; first match wins.
    #[must_use]
    pub fn response_code(&self) -> ResponseCode {
        match self {
            DispatchError::NoRoute { .. } => ResponseCode::NoRoute,
            DispatchError::Decode(_) | DispatchError::MissingQuery { .. } => {
                ResponseCode::InvalidArgs
            }
            DispatchError::Handler(failure) => match failure.kind {
                FailureKind::NotFound => ResponseCode::NotFound,
                FailureKind::InvalidArgs => ResponseCode::InvalidArgs,
                FailureKind::Unauthorized => ResponseCode::NoPermission,
                FailureKind::Internal => ResponseCode::InternalError,
            },
            DispatchError::Unresolved
            | DispatchError::HandlerPanic(_)
            | DispatchError::Encode(_) => ResponseCode::InternalError,
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NoRoute { identity } => {
                write!(f, "no route registered for identity 0x{:08x}", identity)
            }
            DispatchError::Decode(err) => write!(f, "argument decode failed: {}", err),
            DispatchError::MissingQuery {
                name,
                description,
                ty,
            } => {
                write!(
                    f,
                    "missing required query parameter '{}' ({}) of type '{}'",
                    name, description, ty
                )
            }
            DispatchError::Handler(failure) => write!(f, "{}", failure.message),
            DispatchError::Unresolved => {
                write!(f, "handler returned without resolving its completion")
            }
            DispatchError::HandlerPanic(detail) => write!(f, "handler panicked: {}", detail),
            DispatchError::Encode(err) => write!(f, "result encode failed: {}", err),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Wire dispatcher: immutable identity → route table plus the value codec
/// and an optional call listener.
pub struct WireDispatcher {
    routes: HashMap<u32, Arc<Route>>,
    codec: Arc<dyn ValueCodec>,
    listener: Option<Arc<dyn DispatchListener>>,
}

impl WireDispatcher {
    /// Build the dispatch table from compiled routes.
    ///
    /// The router has already rejected identity collisions, so insertion
    /// order is irrelevant.
    #[must_use]
    pub fn new(routes: Vec<Arc<Route>>, codec: Arc<dyn ValueCodec>) -> Self {
        let table: HashMap<u32, Arc<Route>> = routes
            .into_iter()
            .map(|route| (route.identity, route))
            .collect();
        debug!(routes = table.len(), "Dispatch table built");
        WireDispatcher {
            routes: table,
            codec,
            listener: None,
        }
    }

    /// Consume a router's registry directly.
    #[must_use]
    pub fn from_router(router: Router, codec: Arc<dyn ValueCodec>) -> Self {
        Self::new(router.into_routes(), codec)
    }

    /// Attach the external call listener (metrics, tracing, ...).
    pub fn set_listener(&mut self, listener: Arc<dyn DispatchListener>) {
        self.listener = Some(listener);
    }

    /// Number of routes in the dispatch table.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Look up a route by identity, read-only.
    #[must_use]
    pub fn route(&self, identity: u32) -> Option<&Arc<Route>> {
        self.routes.get(&identity)
    }

    /// Dispatch one request frame, writing exactly one response frame.
    ///
    /// `input` and `out` are borrowed for this call only and must not be
    /// retained. Every error path funnels through the status-code mapping;
    /// the outbound cursor is never left partially written.
    pub fn dispatch(&self, input: &mut Bytes, out: &mut BytesMut, conn: &ConnectionContext) {
        let identity = match varint::read_uvarint32(input) {
            Ok(identity) => identity,
            Err(err) => {
                warn!(error = %err, "Malformed route identity");
                self.write_error(out, ResponseCode::InvalidArgs, &format!(
                    "malformed route identity: {}",
                    err
                ));
                return;
            }
        };

        let route = match self.routes.get(&identity) {
            Some(route) => Arc::clone(route),
            None => {
                warn!(identity = format_args!("0x{:08x}", identity), "No route");
                self.write_error(
                    out,
                    ResponseCode::NoRoute,
                    &DispatchError::NoRoute { identity }.to_string(),
                );
                return;
            }
        };
        debug!(route = %route.name, "Route resolved");

        // The listener is told about the call before argument decode, so
        // decode failures are still observable as failed calls.
        let call_id = self.listener.as_ref().map(|l| l.on_start(&route));

        match self.run_call(&route, input, out, conn) {
            Ok(result) => {
                debug!(route = %route.name, "Call succeeded");
                if let (Some(listener), Some(id)) = (self.listener.as_ref(), call_id) {
                    listener.on_succeed(id, &route, &result);
                }
            }
            Err(err) => {
                let code = err.response_code();
                let message = if code == ResponseCode::InternalError {
                    error!(route = %route.name, error = %err, "Dispatch failed internally");
                    INTERNAL_ERROR_MESSAGE.to_string()
                } else {
                    warn!(route = %route.name, code = %code, error = %err, "Dispatch failed");
                    err.to_string()
                };
                self.write_error(out, code, &message);
                if let (Some(listener), Some(id)) = (self.listener.as_ref(), call_id) {
                    listener.on_fail(id, &route, &message);
                }
            }
        }
    }

    /// Decode arguments, invoke the handler, and on success write the
    /// `Success` frame. Writes nothing on error — the caller writes the
    /// single error frame.
    fn run_call(
        &self,
        route: &Arc<Route>,
        input: &mut Bytes,
        out: &mut BytesMut,
        conn: &ConnectionContext,
    ) -> Result<Value, DispatchError> {
        let mut args: ArgVec = smallvec![Value::Null; route.arg_count];

        for segment in &route.typed_segments {
            let value = self
                .codec
                .read_value(segment.ty, input)
                .map_err(DispatchError::Decode)?;
            args[segment.arg_index] = value;
        }

        // Presence bitmask: bit i covers the i-th declared query. The mask
        // is 64 bits wide; slots past it read as absent.
        let mask = varint::read_uvarint(input).map_err(DispatchError::Decode)?;
        for (i, bound) in route.queries.iter().enumerate() {
            let present = i < 64 && (mask >> i) & 1 == 1;
            if present {
                let value = self
                    .codec
                    .read_value(bound.param.ty, input)
                    .map_err(DispatchError::Decode)?;
                args[bound.arg_index] = value;
            } else if let Some(default) = &bound.param.default {
                args[bound.arg_index] = default.clone();
            } else {
                return Err(DispatchError::MissingQuery {
                    name: bound.param.name.clone(),
                    description: bound.param.description.clone(),
                    ty: bound.param.ty,
                });
            }
        }

        let mut call = CallContext {
            connection: conn.clone(),
            route_name: Arc::from(route.name.as_str()),
            args,
        };

        // One completion per request with one registered continuation; the
        // handler must resolve it (synchronously, in this dispatch model)
        // before returning.
        let done: Completion<CallOutcome> = Completion::new();
        let resolved: Rc<RefCell<Option<CallOutcome>>> = Rc::new(RefCell::new(None));
        {
            let slot = Rc::clone(&resolved);
            done.then(move |outcome| {
                *slot.borrow_mut() = Some(outcome);
            });
        }

        let invoked = catch_unwind(AssertUnwindSafe(|| {
            (route.handler())(&mut call, &done);
        }));
        if let Err(panic) = invoked {
            return Err(DispatchError::HandlerPanic(format!("{:?}", panic)));
        }

        let outcome = resolved
            .borrow_mut()
            .take()
            .ok_or(DispatchError::Unresolved)?;
        let result = outcome.map_err(DispatchError::Handler)?;

        // Remember the frame start so a failed result encode can be rolled
        // back; a half-written success frame must never reach the wire.
        let mark = out.len();
        out.put_u8(ResponseCode::Success as u8);
        if let Err(err) = self.codec.write_value(route.result_ty, &result, out) {
            out.truncate(mark);
            return Err(DispatchError::Encode(err));
        }
        Ok(result)
    }

    /// Write one `<code><message>` error frame.
    fn write_error(&self, out: &mut BytesMut, code: ResponseCode, message: &str) {
        out.put_u8(code as u8);
        varint::write_uvarint(out, message.len() as u64);
        out.put_slice(message.as_bytes());
    }
}
