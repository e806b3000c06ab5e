//! Scope arenas and call contexts.

use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};

use smallvec::SmallVec;

use crate::error::ArgumentError;
use crate::exception::ExceptionState;
use crate::intrinsics::ErrorKind;
use crate::result::{BridgeResult, JsResult, ResultExt};
use crate::{
  Handle, Heap, JsArray, JsBoolean, JsError, JsFunction, JsNull, JsNumber, JsObject, JsString,
  JsUndefined, JsValue, RawValue, Runtime, RuntimeOptions, Value,
};

/// A scope arena: the region that owns every [`Handle`] created through it.
///
/// Handles carry the arena's lifetime `'a`, so none can be used after the arena closes. Arenas nest
/// in strict LIFO order: [`Cx::execute_scoped`] and [`Cx::compute_scoped`] open a child arena for
/// the duration of a closure, and the child closes (releasing its handles) when the closure
/// returns, throws, or panics.
pub struct Cx<'a> {
  pub(crate) rt: &'a mut Runtime,
  depth: usize,
}

impl<'a> Cx<'a> {
  pub(crate) fn enter(rt: &'a mut Runtime) -> Self {
    let depth = rt.heap.enter_frame();
    Self { rt, depth }
  }

  /// Roots `value` in this arena and wraps it in a handle.
  pub(crate) fn handle<V: Value>(&mut self, value: RawValue) -> Handle<'a, V> {
    Handle::new_internal(self.rt.heap.push_root(value))
  }

  pub fn heap(&self) -> &Heap {
    &self.rt.heap
  }

  pub fn options(&self) -> &RuntimeOptions {
    self.rt.options()
  }

  /// Nesting depth of this arena (1 for the outermost one).
  pub fn scope_depth(&self) -> usize {
    self.depth
  }

  /// Number of handles owned by this arena.
  pub fn handle_count(&self) -> usize {
    self.rt.heap.frame_len()
  }

  pub fn exception_state(&self) -> ExceptionState {
    self.rt.exception.state()
  }

  /// Runs a mark/sweep cycle. Values only referenced from closed arenas are reclaimed.
  pub fn collect_garbage(&mut self) {
    self.rt.collect_garbage();
  }

  /// Runs `f` in a child arena. Nothing created inside escapes.
  pub fn execute_scoped<T, F>(&mut self, f: F) -> T
  where
    F: for<'b> FnOnce(Cx<'b>) -> T,
  {
    f(Cx::enter(&mut *self.rt))
  }

  /// Runs `f` in a child arena and escapes its result into this arena.
  ///
  /// Only the returned handle survives the child arena. If `f` throws, the child still closes and
  /// the exception propagates unchanged.
  pub fn compute_scoped<V, F>(&mut self, f: F) -> JsResult<'a, V>
  where
    V: Value,
    F: for<'b> FnOnce(Cx<'b>) -> JsResult<'b, V>,
  {
    let value = f(Cx::enter(&mut *self.rt))?.raw();
    Ok(self.handle(value))
  }

  /// Runs `f`, catching any JavaScript exception it throws.
  ///
  /// On success the slot is left clear and `f`'s result is returned. If `f` throws (or returns
  /// normally while an exception is pending) the slot is cleared and the thrown value is returned
  /// as `Err`, unchanged in identity and type.
  ///
  /// Panics are not caught: they keep unwinding to the nearest native boundary, which converts
  /// them into a thrown `Error`.
  pub fn try_catch<T, F>(&mut self, f: F) -> Result<T, Handle<'a, JsValue>>
  where
    F: FnOnce(&mut Self) -> BridgeResult<T>,
  {
    let result = match panic::catch_unwind(AssertUnwindSafe(|| f(self))) {
      Ok(result) => result,
      Err(payload) => {
        self.rt.exception.begin_unwind();
        panic::resume_unwind(payload)
      }
    };

    match (result, self.rt.exception.take()) {
      (Ok(value), None) => Ok(value),
      (_, Some(exception)) => Err(self.handle(exception)),
      (Err(_), None) => {
        tracing::warn!("caught a throw with no pending exception; reporting undefined");
        Err(self.undefined().upcast())
      }
    }
  }

  /// Throws `value` as a JavaScript exception.
  ///
  /// A previously pending exception is replaced.
  pub fn throw<V: Value, T>(&mut self, value: Handle<'_, V>) -> BridgeResult<T> {
    self.rt.throw_raw(value.raw())
  }

  /// Throws a new `Error` with the given message.
  pub fn throw_error<S: AsRef<str>, T>(&mut self, msg: S) -> BridgeResult<T> {
    self.rt.throw_error(ErrorKind::Error, msg.as_ref())
  }

  /// Throws a new `TypeError` with the given message.
  pub fn throw_type_error<S: AsRef<str>, T>(&mut self, msg: S) -> BridgeResult<T> {
    self.rt.throw_error(ErrorKind::TypeError, msg.as_ref())
  }

  /// Throws a new `RangeError` with the given message.
  pub fn throw_range_error<S: AsRef<str>, T>(&mut self, msg: S) -> BridgeResult<T> {
    self.rt.throw_error(ErrorKind::RangeError, msg.as_ref())
  }

  pub fn undefined(&mut self) -> Handle<'a, JsUndefined> {
    self.handle(RawValue::Undefined)
  }

  pub fn null(&mut self) -> Handle<'a, JsNull> {
    self.handle(RawValue::Null)
  }

  pub fn boolean(&mut self, b: bool) -> Handle<'a, JsBoolean> {
    self.handle(RawValue::Bool(b))
  }

  pub fn number<T: Into<f64>>(&mut self, n: T) -> Handle<'a, JsNumber> {
    self.handle(RawValue::Number(n.into()))
  }

  pub fn string<S: AsRef<str>>(&mut self, s: S) -> Handle<'a, JsString> {
    let s = self.rt.heap.alloc_string(s.as_ref());
    self.handle(RawValue::String(s))
  }

  pub fn empty_object(&mut self) -> Handle<'a, JsObject> {
    let proto = self.rt.intrinsics.object_prototype();
    let obj = self.rt.alloc_ordinary_object(Some(proto));
    self.handle(RawValue::Object(obj))
  }

  pub fn empty_array(&mut self) -> Handle<'a, JsArray> {
    let arr = self.rt.alloc_array(Vec::new());
    self.handle(RawValue::Object(arr))
  }

  /// The global object (`globalThis`).
  pub fn global_object(&mut self) -> Handle<'a, JsObject> {
    let global = self.rt.intrinsics.global_object();
    self.handle(RawValue::Object(global))
  }

  /// Reads a property of the global object, e.g. `cx.global::<JsFunction>("TypeError")`.
  pub fn global<V: Value>(&mut self, name: &str) -> JsResult<'a, V> {
    let global = self.global_object();
    global.get(self, name)
  }

  pub fn error<S: AsRef<str>>(&mut self, msg: S) -> JsResult<'a, JsError> {
    Ok(self.new_error(ErrorKind::Error, msg))
  }

  pub fn type_error<S: AsRef<str>>(&mut self, msg: S) -> JsResult<'a, JsError> {
    Ok(self.new_error(ErrorKind::TypeError, msg))
  }

  pub fn range_error<S: AsRef<str>>(&mut self, msg: S) -> JsResult<'a, JsError> {
    Ok(self.new_error(ErrorKind::RangeError, msg))
  }

  pub(crate) fn new_error<S: AsRef<str>>(&mut self, kind: ErrorKind, msg: S) -> Handle<'a, JsError> {
    let err = self.rt.alloc_error(kind, msg.as_ref());
    self.handle(RawValue::Object(err))
  }
}

impl Drop for Cx<'_> {
  fn drop(&mut self) {
    self.rt.heap.exit_frame(self.depth);
  }
}

/// Whether a native function was entered through `[[Call]]` or `[[Construct]]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
  Call,
  Construct,
}

pub(crate) struct CallInfo<'a> {
  pub(crate) callee: Handle<'a, JsFunction>,
  pub(crate) this: Handle<'a, JsValue>,
  pub(crate) args: SmallVec<[Handle<'a, JsValue>; 4]>,
  pub(crate) new_target: Option<Handle<'a, JsFunction>>,
}

/// The context of a native function invoked from JavaScript.
///
/// Dereferences to the [`Cx`] arena that owns `this`, the arguments, and everything the function
/// creates. The arena closes when the function returns.
pub struct FunctionContext<'a> {
  cx: Cx<'a>,
  info: CallInfo<'a>,
}

impl<'a> Deref for FunctionContext<'a> {
  type Target = Cx<'a>;

  fn deref(&self) -> &Cx<'a> {
    &self.cx
  }
}

impl<'a> DerefMut for FunctionContext<'a> {
  fn deref_mut(&mut self) -> &mut Cx<'a> {
    &mut self.cx
  }
}

impl<'a> FunctionContext<'a> {
  pub(crate) fn new(cx: Cx<'a>, info: CallInfo<'a>) -> Self {
    Self { cx, info }
  }

  /// Number of arguments supplied at the call site.
  pub fn len(&self) -> usize {
    self.info.args.len()
  }

  pub fn is_empty(&self) -> bool {
    self.info.args.is_empty()
  }

  /// Argument `i`, or `None` if fewer than `i + 1` arguments were supplied.
  pub fn argument(&self, i: usize) -> Option<Handle<'a, JsValue>> {
    self.info.args.get(i).copied()
  }

  pub fn required_argument(&self, i: usize) -> Result<Handle<'a, JsValue>, ArgumentError> {
    self.argument(i).ok_or(ArgumentError {
      index: i,
      len: self.len(),
    })
  }

  /// Argument `i` downcast to `V`, throwing a `TypeError` if it is missing or has another type.
  pub fn argument_as<V: Value>(&mut self, i: usize) -> JsResult<'a, V> {
    let arg = self.required_argument(i).or_throw(&mut self.cx)?;
    arg.downcast_or_throw(&mut self.cx)
  }

  /// `this` after the callee's coercion rules were applied.
  pub fn this_value(&self) -> Handle<'a, JsValue> {
    self.info.this
  }

  pub fn this_as<V: Value>(&mut self) -> JsResult<'a, V> {
    let this = self.info.this;
    this.downcast_or_throw(&mut self.cx)
  }

  /// `this` as an object, wrapping primitives and substituting the global object for
  /// `undefined`/`null` regardless of the callee's mode.
  pub fn this_object(&mut self) -> Handle<'a, JsObject> {
    let this = self.cx.rt.coerce_to_object(self.info.this.raw());
    self.cx.handle(RawValue::Object(this))
  }

  pub fn kind(&self) -> CallKind {
    match self.info.new_target {
      Some(_) => CallKind::Construct,
      None => CallKind::Call,
    }
  }

  /// `true` when invoked with `new`.
  pub fn is_construct(&self) -> bool {
    self.kind() == CallKind::Construct
  }

  /// The function being invoked.
  pub fn callee(&self) -> Handle<'a, JsFunction> {
    self.info.callee
  }

  /// `new.target`; `None` for plain calls.
  pub fn new_target(&self) -> Option<Handle<'a, JsFunction>> {
    self.info.new_target
  }

  /// A snapshot of `this`, the arguments and the construct flag.
  pub fn call_context(&self) -> CallContext<'a> {
    CallContext {
      this: self.info.this,
      args: self.info.args.clone(),
      is_construct: self.is_construct(),
    }
  }
}

/// An immutable `(this, arguments, is_construct)` triple for one invocation.
///
/// Received from [`FunctionContext::call_context`] or built by hand and passed to
/// [`Handle::invoke`](crate::Handle::invoke).
#[derive(Clone, Debug)]
pub struct CallContext<'a> {
  this: Handle<'a, JsValue>,
  args: SmallVec<[Handle<'a, JsValue>; 4]>,
  is_construct: bool,
}

impl<'a> CallContext<'a> {
  /// A `[[Call]]` with the given receiver and arguments.
  pub fn call<T, I>(this: Handle<'a, T>, args: I) -> Self
  where
    T: Value,
    I: IntoIterator<Item = Handle<'a, JsValue>>,
  {
    Self {
      this: this.upcast(),
      args: args.into_iter().collect(),
      is_construct: false,
    }
  }

  /// A `[[Construct]]` with the given arguments. The receiver is created by the engine.
  pub fn construct<I>(cx: &mut Cx<'a>, args: I) -> Self
  where
    I: IntoIterator<Item = Handle<'a, JsValue>>,
  {
    Self {
      this: cx.undefined().upcast(),
      args: args.into_iter().collect(),
      is_construct: true,
    }
  }

  pub fn this(&self) -> Handle<'a, JsValue> {
    self.this
  }

  pub fn args(&self) -> &[Handle<'a, JsValue>] {
    &self.args
  }

  pub fn len(&self) -> usize {
    self.args.len()
  }

  pub fn is_empty(&self) -> bool {
    self.args.is_empty()
  }

  pub fn is_construct(&self) -> bool {
    self.is_construct
  }
}
