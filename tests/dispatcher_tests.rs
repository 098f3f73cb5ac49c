//! Tests for the wire dispatcher
//!
//! # Test Coverage
//!
//! Validates the dispatcher's core responsibilities end to end:
//! - Route resolution by wire identity
//! - Typed path argument decode and query presence-bitmask handling
//! - Exactly one response frame per request, success or error
//! - The uniform status-code mapping, including panic containment and
//!   internal message scrubbing
//! - Rollback of half-written success frames on encode failure
//! - Listener notification counts
//! - Plugin-injected argument slots reaching the handler

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use serde_json::{json, Value};
use wireroute::descriptor::{ParamType, QueryParam, RouteProperty};
use wireroute::dispatcher::{
    CallContext, CallFailure, ConnectionContext, HandlerBody, ResponseCode, WireDispatcher,
    INTERNAL_ERROR_MESSAGE,
};
use wireroute::listener::MetricsListener;
use wireroute::plugin::{Plugin, PluginContext, RouteModifier};
use wireroute::router::{RegistrationError, RouteDesc, Router};
use wireroute::wire::{varint, BinaryCodec};

mod tracing_util;
use tracing_util::TestTracing;

/// Build a request frame: identity varint followed by caller-supplied
/// argument bytes.
fn frame(identity: u32, args: impl FnOnce(&mut BytesMut)) -> Bytes {
    let mut buf = BytesMut::new();
    varint::write_uvarint(&mut buf, u64::from(identity));
    args(&mut buf);
    buf.freeze()
}

fn put_int(buf: &mut BytesMut, value: i64) {
    varint::write_uvarint(buf, varint::zigzag_encode(value));
}

/// Split a response frame into its status code and remaining payload.
fn split_frame(mut out: Bytes) -> (ResponseCode, Bytes) {
    assert!(!out.is_empty(), "no response frame written");
    let code = ResponseCode::from_u8(out.get_u8()).expect("unknown status byte");
    (code, out)
}

fn read_message(buf: &mut Bytes) -> String {
    let len = varint::read_uvarint(buf).unwrap() as usize;
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).unwrap()
}

/// `GET /item/{id:int}` with an optional `verbose` flag; echoes both
/// arguments as a structured value.
fn item_dispatcher(invocations: Arc<AtomicUsize>) -> (WireDispatcher, u32) {
    let mut router = Router::new();
    let handler: HandlerBody = Arc::new(move |call, done| {
        invocations.fetch_add(1, Ordering::SeqCst);
        let id = call.arg(0).cloned().unwrap_or_default();
        let verbose = call.arg(1).cloned().unwrap_or_default();
        done.succeed(Ok(json!({ "id": id, "verbose": verbose })));
    });
    let route = router
        .add_route(
            RouteDesc::get("/item/{id:int}").query(QueryParam::optional(
                "verbose",
                ParamType::Bool,
                Value::Bool(false),
                "include details",
            )),
            handler,
            &[ParamType::Int, ParamType::Bool],
            ParamType::Json,
        )
        .unwrap();
    let identity = route.identity;
    (
        WireDispatcher::from_router(router, Arc::new(BinaryCodec::default())),
        identity,
    )
}

fn single_route_dispatcher(handler: HandlerBody, result_ty: ParamType) -> (WireDispatcher, u32) {
    let mut router = Router::new();
    let route = router
        .add_route(
            RouteDesc::get("/thing/{id:int}"),
            handler,
            &[ParamType::Int],
            result_ty,
        )
        .unwrap();
    let identity = route.identity;
    (
        WireDispatcher::from_router(router, Arc::new(BinaryCodec::default())),
        identity,
    )
}

#[test]
fn success_frame_carries_the_encoded_result() {
    let _tracing = TestTracing::init();
    let invocations = Arc::new(AtomicUsize::new(0));
    let (dispatcher, identity) = item_dispatcher(Arc::clone(&invocations));

    let mut input = frame(identity, |buf| {
        put_int(buf, 42);
        varint::write_uvarint(buf, 0); // verbose absent, default applies
    });
    let mut out = BytesMut::new();
    dispatcher.dispatch(&mut input, &mut out, &ConnectionContext::new());

    let (code, mut payload) = split_frame(out.freeze());
    assert_eq!(code, ResponseCode::Success);
    let text = read_message(&mut payload);
    let result: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(result, json!({ "id": 42, "verbose": false }));
    assert_eq!(payload.remaining(), 0, "trailing bytes after result");
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[test]
fn present_query_overrides_the_default() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let (dispatcher, identity) = item_dispatcher(invocations);

    let mut input = frame(identity, |buf| {
        put_int(buf, 7);
        varint::write_uvarint(buf, 0b1); // verbose present
        buf.extend_from_slice(&[1]); // true
    });
    let mut out = BytesMut::new();
    dispatcher.dispatch(&mut input, &mut out, &ConnectionContext::new());

    let (code, mut payload) = split_frame(out.freeze());
    assert_eq!(code, ResponseCode::Success);
    let result: Value = serde_json::from_str(&read_message(&mut payload)).unwrap();
    assert_eq!(result, json!({ "id": 7, "verbose": true }));
}

#[test]
fn unknown_identity_writes_no_route_and_skips_the_handler() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let (dispatcher, identity) = item_dispatcher(Arc::clone(&invocations));

    let mut input = frame(identity.wrapping_add(1), |_| {});
    let mut out = BytesMut::new();
    dispatcher.dispatch(&mut input, &mut out, &ConnectionContext::new());

    let (code, _) = split_frame(out.freeze());
    assert_eq!(code, ResponseCode::NoRoute);
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_required_query_is_invalid_args_without_invoking_the_handler() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invocations);
    let mut router = Router::new();
    let handler: HandlerBody = Arc::new(move |_call, done| {
        counter.fetch_add(1, Ordering::SeqCst);
        done.succeed(Ok(Value::Null));
    });
    let route = router
        .add_route(
            RouteDesc::get("/report").query(QueryParam::required(
                "window",
                ParamType::Long,
                "aggregation window",
            )),
            handler,
            &[ParamType::Long],
            ParamType::Json,
        )
        .unwrap();
    let identity = route.identity;
    let dispatcher = WireDispatcher::from_router(router, Arc::new(BinaryCodec::default()));

    let mut input = frame(identity, |buf| {
        varint::write_uvarint(buf, 0); // window absent
    });
    let mut out = BytesMut::new();
    dispatcher.dispatch(&mut input, &mut out, &ConnectionContext::new());

    let (code, mut payload) = split_frame(out.freeze());
    assert_eq!(code, ResponseCode::InvalidArgs);
    let message = read_message(&mut payload);
    assert!(message.contains("window"), "message was {:?}", message);
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[test]
fn malformed_argument_bytes_are_invalid_args() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let (dispatcher, identity) = item_dispatcher(Arc::clone(&invocations));

    // Identity only; the int argument is missing entirely.
    let mut input = frame(identity, |_| {});
    let mut out = BytesMut::new();
    dispatcher.dispatch(&mut input, &mut out, &ConnectionContext::new());

    let (code, _) = split_frame(out.freeze());
    assert_eq!(code, ResponseCode::InvalidArgs);
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[test]
fn handler_failures_map_through_the_status_table() {
    let cases: Vec<(CallFailure, ResponseCode, &str)> = vec![
        (
            CallFailure::not_found("no such item"),
            ResponseCode::NotFound,
            "no such item",
        ),
        (
            CallFailure::invalid("bad cursor"),
            ResponseCode::InvalidArgs,
            "bad cursor",
        ),
        (
            CallFailure::unauthorized("token expired"),
            ResponseCode::NoPermission,
            "token expired",
        ),
    ];
    for (failure, expected_code, expected_message) in cases {
        let handler: HandlerBody = Arc::new(move |_call, done| {
            done.succeed(Err(failure.clone()));
        });
        let (dispatcher, identity) = single_route_dispatcher(handler, ParamType::Json);

        let mut input = frame(identity, |buf| {
            put_int(buf, 1);
            varint::write_uvarint(buf, 0);
        });
        let mut out = BytesMut::new();
        dispatcher.dispatch(&mut input, &mut out, &ConnectionContext::new());

        let (code, mut payload) = split_frame(out.freeze());
        assert_eq!(code, expected_code);
        assert_eq!(read_message(&mut payload), expected_message);
    }
}

#[test]
fn internal_failure_detail_never_reaches_the_wire() {
    let handler: HandlerBody = Arc::new(|_call, done| {
        done.succeed(Err(CallFailure::internal("db connection string leaked")));
    });
    let (dispatcher, identity) = single_route_dispatcher(handler, ParamType::Json);

    let mut input = frame(identity, |buf| {
        put_int(buf, 1);
        varint::write_uvarint(buf, 0);
    });
    let mut out = BytesMut::new();
    dispatcher.dispatch(&mut input, &mut out, &ConnectionContext::new());

    let (code, mut payload) = split_frame(out.freeze());
    assert_eq!(code, ResponseCode::InternalError);
    assert_eq!(read_message(&mut payload), INTERNAL_ERROR_MESSAGE);
}

#[test]
fn handler_panic_is_contained_as_internal_error() {
    let handler: HandlerBody = Arc::new(|_call, _done| {
        panic!("handler exploded");
    });
    let (dispatcher, identity) = single_route_dispatcher(handler, ParamType::Json);

    let mut input = frame(identity, |buf| {
        put_int(buf, 1);
        varint::write_uvarint(buf, 0);
    });
    let mut out = BytesMut::new();
    dispatcher.dispatch(&mut input, &mut out, &ConnectionContext::new());

    let (code, mut payload) = split_frame(out.freeze());
    assert_eq!(code, ResponseCode::InternalError);
    assert_eq!(read_message(&mut payload), INTERNAL_ERROR_MESSAGE);
}

#[test]
fn handler_returning_without_resolving_is_internal_error() {
    let handler: HandlerBody = Arc::new(|_call, _done| {});
    let (dispatcher, identity) = single_route_dispatcher(handler, ParamType::Json);

    let mut input = frame(identity, |buf| {
        put_int(buf, 1);
        varint::write_uvarint(buf, 0);
    });
    let mut out = BytesMut::new();
    dispatcher.dispatch(&mut input, &mut out, &ConnectionContext::new());

    let (code, mut payload) = split_frame(out.freeze());
    assert_eq!(code, ResponseCode::InternalError);
    assert_eq!(read_message(&mut payload), INTERNAL_ERROR_MESSAGE);
}

#[test]
fn encode_failure_rolls_back_the_partial_success_frame() {
    // Result type says bool, handler resolves a string: the success frame
    // starts, encoding fails, and the frame must be rolled back before the
    // error frame is written.
    let handler: HandlerBody = Arc::new(|_call, done| {
        done.succeed(Ok(json!("not a bool")));
    });
    let (dispatcher, identity) = single_route_dispatcher(handler, ParamType::Bool);

    let mut input = frame(identity, |buf| {
        put_int(buf, 1);
        varint::write_uvarint(buf, 0);
    });
    let mut out = BytesMut::new();
    dispatcher.dispatch(&mut input, &mut out, &ConnectionContext::new());

    let (code, mut payload) = split_frame(out.freeze());
    assert_eq!(code, ResponseCode::InternalError);
    assert_eq!(read_message(&mut payload), INTERNAL_ERROR_MESSAGE);
    assert_eq!(payload.remaining(), 0, "stray bytes from rolled-back frame");
}

#[test]
fn listener_sees_starts_successes_and_failures() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let (mut dispatcher, identity) = item_dispatcher(invocations);
    let metrics = Arc::new(MetricsListener::new());
    dispatcher.set_listener(Arc::clone(&metrics) as Arc<dyn wireroute::listener::DispatchListener>);

    // One success.
    let mut input = frame(identity, |buf| {
        put_int(buf, 1);
        varint::write_uvarint(buf, 0);
    });
    let mut out = BytesMut::new();
    dispatcher.dispatch(&mut input, &mut out, &ConnectionContext::new());

    // One decode failure (truncated arguments).
    let mut input = frame(identity, |_| {});
    let mut out = BytesMut::new();
    dispatcher.dispatch(&mut input, &mut out, &ConnectionContext::new());

    // One unknown identity; no route resolved, so no call is started.
    let mut input = frame(identity.wrapping_add(1), |_| {});
    let mut out = BytesMut::new();
    dispatcher.dispatch(&mut input, &mut out, &ConnectionContext::new());

    assert_eq!(metrics.started(), 2);
    assert_eq!(metrics.succeeded(), 1);
    assert_eq!(metrics.failed(), 1);
}

/// Plugin that fills its claimed slot with the caller's peer address for
/// routes carrying the `needs_peer` property.
struct PeerPlugin;

struct PeerSlot(usize);

impl Plugin for PeerPlugin {
    fn name(&self) -> &str {
        "peer"
    }

    fn is_used(
        &self,
        _desc: &RouteDesc,
        _result_ty: ParamType,
        properties: &[RouteProperty],
    ) -> Option<PluginContext> {
        properties
            .iter()
            .any(|p| p.name == "needs_peer")
            .then(|| Box::new(PeerSlot(0)) as PluginContext)
    }

    fn modify_route(
        &self,
        _context: &mut PluginContext,
        modifier: &mut RouteModifier<'_>,
    ) -> Result<(), RegistrationError> {
        modifier.provide_parameter(0)
    }

    fn modify_call(&self, context: &PluginContext, call: &mut CallContext) {
        if let Some(slot) = context.downcast_ref::<PeerSlot>() {
            let peer = call
                .connection
                .peer
                .map(|p| p.to_string())
                .unwrap_or_default();
            call.args[slot.0] = Value::String(peer);
        }
    }
}

#[test]
fn plugin_injected_slot_reaches_the_handler() {
    let mut router = Router::new();
    router.register_plugin(Arc::new(PeerPlugin));
    let handler: HandlerBody = Arc::new(|call, done| {
        let peer = call.arg(0).cloned().unwrap_or_default();
        let id = call.arg(1).cloned().unwrap_or_default();
        done.succeed(Ok(json!({ "peer": peer, "id": id })));
    });
    let route = router
        .add_route(
            RouteDesc::get("/item/{id:int}").property("needs_peer", json!(true)),
            handler,
            &[ParamType::Str, ParamType::Int],
            ParamType::Json,
        )
        .unwrap();
    let identity = route.identity;
    let dispatcher = WireDispatcher::from_router(router, Arc::new(BinaryCodec::default()));

    let conn = ConnectionContext::with_peer("10.1.2.3:4567".parse().unwrap());
    let mut input = frame(identity, |buf| {
        put_int(buf, 9);
        varint::write_uvarint(buf, 0);
    });
    let mut out = BytesMut::new();
    dispatcher.dispatch(&mut input, &mut out, &conn);

    let (code, mut payload) = split_frame(out.freeze());
    assert_eq!(code, ResponseCode::Success);
    let result: Value = serde_json::from_str(&read_message(&mut payload)).unwrap();
    assert_eq!(result, json!({ "peer": "10.1.2.3:4567", "id": 9 }));
}
