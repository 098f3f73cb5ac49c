//! # Dispatcher Module
//!
//! Binary wire dispatch: one inbound frame in, exactly one response frame
//! out.
//!
//! ## Overview
//!
//! The [`WireDispatcher`] owns an immutable identity → route table built
//! once from the router's registry. Per request it:
//!
//! 1. Decodes a varint route identity; a miss writes one `NoRoute` frame
//!    and never invokes a handler.
//! 2. Notifies the optional listener that a call started, receiving the
//!    call id used for the correlated completion notification.
//! 3. Decodes typed path arguments in declared order, then the query
//!    presence bitmask and query values, substituting defaults for absent
//!    optional parameters and failing on absent required ones.
//! 4. Builds the per-call context and invokes the compiled handler with a
//!    single-shot completion handle.
//! 5. Writes exactly one response frame: `Success` plus the encoded result,
//!    or an error status plus a message mapped through the single
//!    status-code table.
//!
//! ## Failure containment
//!
//! Every decode step, handler-reported failure, and unexpected panic
//! funnels through one status-code mapping at one boundary. A failure
//! during result serialization rolls the outbound cursor back to the frame
//! start — callers never observe a half-written success frame. Internal
//! errors leave the process with a fixed generic message; the real error
//! is only logged.
//!
//! ## Concurrency
//!
//! A request is one synchronous decode → dispatch → encode run on whatever
//! thread the transport hands it to. The route table is read-only after
//! construction, so concurrent requests share it without locks. Inbound
//! and outbound buffers are borrowed for the duration of one dispatch call
//! only.

mod core;

pub use core::{
    ArgVec, CallContext, CallFailure, CallOutcome, ConnectionContext, DispatchError, FailureKind,
    HandlerBody, ResponseCode, WireDispatcher, INTERNAL_ERROR_MESSAGE, MAX_INLINE_ARGS,
};
