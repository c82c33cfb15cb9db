//! Custom SQL functions and aggregates.
//!
//! Native code cannot hold a Rust closure, so registration goes through an
//! opaque-key indirection: the closure(s) land in a process-wide registry
//! and the registry key travels as the engine's user-data pointer. When the
//! engine invokes one of the `extern "C"` adapters below, the adapter reads
//! the key back out of the invocation context, recovers the entry, decodes
//! the native argument values, runs the closure, and writes the result
//! through the matching result-set call.
//!
//! Registry entries live until the connection that registered them closes
//! ([`Connection::close`](crate::Connection::close) purges its keys). A
//! stale key therefore only occurs when a function is invoked on a
//! connection whose registration was already purged; the adapter reports an
//! error result instead of faulting.
//!
//! The registry lock is never held while a closure runs, so a function body
//! may re-enter the connection that is driving the query (e.g. issue a
//! nested query); invocations happen synchronously on whatever thread is
//! inside `step()`.
//!
//! A panic inside a closure crosses the `extern "C"` boundary and aborts
//! the process. Recoverable failures go through [`FunctionError`], which
//! maps to the engine's error result.

use std::any::Any;
use std::collections::HashMap;
use std::os::raw::{c_int, c_void};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use crate::error::FunctionError;
use crate::ffi;
use crate::marshal;
use crate::platform::Platform;
use crate::provider::{ContextHandle, Provider, ValueHandle};
use crate::value::{ColumnValue, Value};

/// What a scalar-function or aggregate-final closure produces.
pub type FunctionResult = std::result::Result<Value, FunctionError>;

pub(crate) type ScalarFn = dyn Fn(&[ColumnValue]) -> FunctionResult + Send + Sync;
pub(crate) type StepFn =
    dyn Fn(&mut AggregateState, &[ColumnValue]) -> std::result::Result<(), FunctionError>
        + Send
        + Sync;
pub(crate) type FinalFn = dyn Fn(AggregateState) -> FunctionResult + Send + Sync;

/// Per-group accumulator for a custom aggregate.
///
/// The engine supplies one zeroed scratch block per aggregation group; the
/// step adapter stores the state there, which keeps concurrent groups in a
/// single query independent without any map keyed by group. Step closures
/// shape the state as any `Any + Send` value.
pub struct AggregateState(Option<Box<dyn Any + Send>>);

impl AggregateState {
    pub(crate) const fn empty() -> Self {
        Self(None)
    }

    /// The accumulator of type `T`, created with `init` on the group's
    /// first call (or if a previous step stored a different type).
    pub fn get_or_insert_with<T: Any + Send>(&mut self, init: impl FnOnce() -> T) -> &mut T {
        let fresh = !matches!(&self.0, Some(state) if state.is::<T>());
        if fresh {
            self.0 = Some(Box::new(init()));
        }
        self.0
            .as_mut()
            .and_then(|state| state.downcast_mut::<T>())
            .expect("aggregate state was just initialised to the requested type")
    }

    /// The accumulator of type `T`, default-created on first use.
    pub fn get_or_default<T: Any + Send + Default>(&mut self) -> &mut T {
        self.get_or_insert_with(T::default)
    }

    /// Consumes the state. `None` when the group saw no rows or the stored
    /// type differs from `T`.
    #[must_use]
    pub fn into_inner<T: Any + Send>(self) -> Option<T> {
        self.0
            .and_then(|state| state.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }
}

impl std::fmt::Debug for AggregateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateState")
            .field("initialised", &self.0.is_some())
            .finish()
    }
}

// ── Registry ────────────────────────────────────────────────────────────

pub(crate) struct Slot {
    platform: &'static Platform,
    kind: SlotKind,
}

enum SlotKind {
    Scalar(Box<ScalarFn>),
    Aggregate {
        step: Box<StepFn>,
        final_: Box<FinalFn>,
    },
}

impl Slot {
    pub(crate) fn scalar(
        platform: &'static Platform,
        function: impl Fn(&[ColumnValue]) -> FunctionResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            platform,
            kind: SlotKind::Scalar(Box::new(function)),
        }
    }

    pub(crate) fn aggregate(
        platform: &'static Platform,
        step: impl Fn(&mut AggregateState, &[ColumnValue]) -> std::result::Result<(), FunctionError>
            + Send
            + Sync
            + 'static,
        final_: impl Fn(AggregateState) -> FunctionResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            platform,
            kind: SlotKind::Aggregate {
                step: Box::new(step),
                final_: Box::new(final_),
            },
        }
    }
}

static REGISTRY: LazyLock<Mutex<HashMap<usize, Arc<Slot>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

// Key 0 is never handed out: a null user-data pointer must stay
// distinguishable from a registration.
static NEXT_KEY: AtomicUsize = AtomicUsize::new(1);

fn registry() -> std::sync::MutexGuard<'static, HashMap<usize, Arc<Slot>>> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn register(slot: Slot) -> usize {
    let key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
    registry().insert(key, Arc::new(slot));
    key
}

pub(crate) fn unregister(key: usize) {
    registry().remove(&key);
}

pub(crate) fn unregister_all(keys: &[usize]) {
    let mut entries = registry();
    for key in keys {
        entries.remove(key);
    }
}

pub(crate) fn key_to_user_data(key: usize) -> *mut c_void {
    key as *mut c_void
}

fn lookup(key: usize) -> Option<Arc<Slot>> {
    registry().get(&key).cloned()
}

// ── Adapters ────────────────────────────────────────────────────────────

/// Recovers the registry entry for an invocation context.
///
/// The user-data read is the one call that must go through the engine
/// directly: until the key is known there is no entry, hence no platform to
/// route through.
unsafe fn slot_for(context: *mut c_void) -> Option<Arc<Slot>> {
    let key = ffi::sqlite3_user_data(context) as usize;
    lookup(key)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
unsafe fn report_stale(context: *mut c_void) {
    const MESSAGE: &str = "custom sql function is no longer registered";
    ffi::sqlite3_result_error(context, MESSAGE.as_ptr().cast(), MESSAGE.len() as c_int);
}

fn decode_args(provider: &dyn Provider, argc: c_int, argv: *mut *mut c_void) -> Vec<ColumnValue> {
    if argc <= 0 || argv.is_null() {
        return Vec::new();
    }
    // SAFETY: the engine passes `argc` valid value pointers.
    #[allow(clippy::cast_sign_loss)]
    let raw = unsafe { std::slice::from_raw_parts(argv, argc as usize) };
    raw.iter()
        .map(|&value| decode_value(provider, ValueHandle::from_raw(value)))
        .collect()
}

/// Same type-tag dispatch as a column read, over value accessors.
fn decode_value(provider: &dyn Provider, value: ValueHandle) -> ColumnValue {
    match provider.value_type(value) {
        ffi::SQLITE_INTEGER => ColumnValue::Integer(provider.value_int64(value)),
        ffi::SQLITE_FLOAT => ColumnValue::Float(provider.value_double(value)),
        ffi::SQLITE_TEXT => {
            // SAFETY: the engine's text pointer stays valid for this call.
            let text = unsafe { marshal::decode_utf8(provider.value_text(value)) };
            ColumnValue::Text(text.unwrap_or_default())
        }
        ffi::SQLITE_BLOB => {
            let ptr = provider.value_blob(value);
            let len = usize::try_from(provider.value_bytes(value)).unwrap_or(0);
            // SAFETY: the engine reports the byte length of its own buffer.
            ColumnValue::Blob(unsafe { marshal::copy_bytes(ptr, len) })
        }
        _ => ColumnValue::Null,
    }
}

fn write_result(provider: &dyn Provider, context: ContextHandle, value: &Value) {
    match value {
        Value::Null => provider.result_null(context),
        Value::Int(v) => provider.result_int(context, *v),
        Value::Int64(v) => provider.result_int64(context, *v),
        Value::Double(v) => provider.result_double(context, *v),
        Value::Text(v) => provider.result_text(context, v),
        Value::Blob(v) => provider.result_blob(context, v),
    }
}

fn write_outcome(provider: &dyn Provider, context: ContextHandle, outcome: FunctionResult) {
    match outcome {
        Ok(value) => write_result(provider, context, &value),
        Err(error) => provider.result_error(context, &error.to_string()),
    }
}

pub(crate) unsafe extern "C" fn scalar_trampoline(
    context: *mut c_void,
    argc: c_int,
    argv: *mut *mut c_void,
) {
    let Some(slot) = slot_for(context) else {
        report_stale(context);
        return;
    };
    let provider = slot.platform.provider();
    let ctx = ContextHandle::from_raw(context);
    let SlotKind::Scalar(function) = &slot.kind else {
        provider.result_error(ctx, "registered callback is not a scalar function");
        return;
    };
    let args = decode_args(provider, argc, argv);
    write_outcome(provider, ctx, function(&args));
}

pub(crate) unsafe extern "C" fn aggregate_step_trampoline(
    context: *mut c_void,
    argc: c_int,
    argv: *mut *mut c_void,
) {
    let Some(slot) = slot_for(context) else {
        report_stale(context);
        return;
    };
    let provider = slot.platform.provider();
    let ctx = ContextHandle::from_raw(context);
    let SlotKind::Aggregate { step, .. } = &slot.kind else {
        provider.result_error(ctx, "registered callback is not an aggregate");
        return;
    };

    // One pointer-sized block per group, zeroed by the engine on the
    // group's first call. The state Box lives behind it until `final`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let block = provider
        .aggregate_context(ctx, std::mem::size_of::<*mut AggregateState>() as c_int)
        .cast::<*mut AggregateState>();
    if block.is_null() {
        provider.result_error(ctx, "out of memory allocating aggregate context");
        return;
    }
    if (*block).is_null() {
        *block = Box::into_raw(Box::new(AggregateState::empty()));
    }
    let state = &mut **block;

    let args = decode_args(provider, argc, argv);
    if let Err(error) = step(state, &args) {
        provider.result_error(ctx, &error.to_string());
    }
}

pub(crate) unsafe extern "C" fn aggregate_final_trampoline(context: *mut c_void) {
    let Some(slot) = slot_for(context) else {
        report_stale(context);
        return;
    };
    let provider = slot.platform.provider();
    let ctx = ContextHandle::from_raw(context);
    let SlotKind::Aggregate { final_, .. } = &slot.kind else {
        provider.result_error(ctx, "registered callback is not an aggregate");
        return;
    };

    // Zero-byte request never allocates: null means no step ran for this
    // group, which still owes the caller exactly one final value.
    let block = provider.aggregate_context(ctx, 0).cast::<*mut AggregateState>();
    let state = if block.is_null() || (*block).is_null() {
        AggregateState::empty()
    } else {
        let boxed = Box::from_raw(*block);
        *block = std::ptr::null_mut();
        *boxed
    };

    write_outcome(provider, ctx, final_(state));
}
