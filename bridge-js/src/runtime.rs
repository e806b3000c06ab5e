use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::context::CallInfo;
use crate::error::UncaughtException;
use crate::exception::{panic_message, ExceptionSlot, ExceptionState};
use crate::function::{alloc_native_function, ArgList, FunctionKind, FunctionOptions, NativeCallback};
use crate::intrinsics::{alloc_error, ErrorKind, Intrinsics};
use crate::object::{ObjectData, ObjectKind};
use crate::result::{BridgeResult, Throw};
use crate::value::number_to_string;
use crate::{Cx, FunctionContext, GcObject, GcString, Heap, RawValue, ThisMode, VmError};

const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RuntimeOptions {
  /// Named in the message of exceptions converted from native panics:
  /// `internal error in <module_name>: <panic message>`.
  pub module_name: String,
  /// Upper bound on the number of arguments of a single call.
  pub max_arguments: usize,
  /// Upper bound on nested native calls.
  pub max_call_depth: usize,
}

impl Default for RuntimeOptions {
  fn default() -> Self {
    Self {
      module_name: env!("CARGO_PKG_NAME").to_string(),
      max_arguments: 65_535,
      max_call_depth: 1024,
    }
  }
}

impl RuntimeOptions {
  /// Parses options from JSON. Missing fields take their default values.
  pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }
}

/// One engine context: a heap, its realm, and the exception slot.
///
/// All access goes through [`Runtime::execute`], which opens the outermost scope arena.
pub struct Runtime {
  pub(crate) heap: Heap,
  pub(crate) intrinsics: Intrinsics,
  pub(crate) exception: ExceptionSlot,
  options: RuntimeOptions,
  call_depth: usize,
}

impl Default for Runtime {
  fn default() -> Self {
    Self::new()
  }
}

impl Runtime {
  pub fn new() -> Self {
    Self::with_options(RuntimeOptions::default())
  }

  pub fn with_options(options: RuntimeOptions) -> Self {
    let mut heap = Heap::new();
    let intrinsics = Intrinsics::new(&mut heap);
    Self {
      heap,
      intrinsics,
      exception: ExceptionSlot::default(),
      options,
      call_depth: 0,
    }
  }

  pub fn options(&self) -> &RuntimeOptions {
    &self.options
  }

  pub fn heap(&self) -> &Heap {
    &self.heap
  }

  pub fn intrinsics(&self) -> &Intrinsics {
    &self.intrinsics
  }

  pub fn exception_state(&self) -> ExceptionState {
    self.exception.state()
  }

  pub fn collect_garbage(&mut self) {
    debug_assert!(self.exception.debug_is_valid(&self.heap));
    let extra_roots = self.exception.roots();
    self.heap.collect_garbage(extra_roots.as_slice());
  }

  /// Runs `f` in a fresh outermost scope arena.
  ///
  /// An exception escaping `f` is cleared from the slot and reported as [`UncaughtException`]. A
  /// panic escaping `f` is converted the same way a native boundary converts it.
  pub fn execute<T, F>(&mut self, f: F) -> Result<T, UncaughtException>
  where
    F: for<'a> FnOnce(Cx<'a>) -> BridgeResult<T>,
  {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(Cx::enter(&mut *self))));
    match outcome {
      Ok(Ok(value)) if self.exception.pending().is_none() => Ok(value),
      Ok(_) => Err(self.take_uncaught()),
      Err(payload) => {
        self.convert_panic(payload);
        Err(self.take_uncaught())
      }
    }
  }

  fn take_uncaught(&mut self) -> UncaughtException {
    let Some(value) = self.exception.take() else {
      let message = "exception signalled without a pending value".to_string();
      return UncaughtException {
        name: None,
        message: message.clone(),
        description: message,
      };
    };
    let description = self.display_raw(value);
    let name = self.string_property(value, "name");
    let message = self
      .string_property(value, "message")
      .unwrap_or_else(|| description.clone());
    tracing::debug!(%description, "uncaught exception");
    UncaughtException {
      name,
      message,
      description,
    }
  }

  fn string_property(&self, value: RawValue, key: &str) -> Option<String> {
    let obj = value.as_object()?;
    match self.heap.get_property(obj, key) {
      Ok(Some(RawValue::String(s))) => self.heap.get_string(s).ok().map(str::to_owned),
      _ => None,
    }
  }

  // Allocation.

  pub(crate) fn alloc_ordinary_object(&mut self, prototype: Option<GcObject>) -> GcObject {
    self
      .heap
      .alloc_object(ObjectData::new(prototype, ObjectKind::Ordinary))
  }

  pub(crate) fn alloc_array(&mut self, elements: Vec<RawValue>) -> GcObject {
    let proto = self.intrinsics.array_prototype();
    self
      .heap
      .alloc_object(ObjectData::new(Some(proto), ObjectKind::Array(elements)))
  }

  pub(crate) fn alloc_error(&mut self, kind: ErrorKind, message: &str) -> GcObject {
    let proto = self.intrinsics.error_prototype(kind);
    alloc_error(&mut self.heap, proto, message)
  }

  pub(crate) fn alloc_function(
    &mut self,
    options: &FunctionOptions,
    callback: NativeCallback,
  ) -> GcObject {
    let instance_prototype = options
      .constructable
      .then(|| self.alloc_ordinary_object(Some(self.intrinsics.object_prototype())));
    alloc_native_function(
      &mut self.heap,
      self.intrinsics.function_prototype(),
      instance_prototype,
      options,
      callback,
    )
  }

  fn alloc_wrapper(&mut self, value: RawValue) -> GcObject {
    let proto = match value {
      RawValue::Bool(_) => self.intrinsics.boolean_prototype(),
      RawValue::Number(_) => self.intrinsics.number_prototype(),
      RawValue::String(_) => self.intrinsics.string_prototype(),
      _ => self.intrinsics.object_prototype(),
    };
    self
      .heap
      .alloc_object(ObjectData::new(Some(proto), ObjectKind::Primitive(value)))
  }

  // Exceptions.

  pub(crate) fn throw_raw<T>(&mut self, value: RawValue) -> BridgeResult<T> {
    if let Some(previous) = self.exception.set_pending(value) {
      tracing::debug!(
        previous = %self.display_raw(previous),
        "pending exception overwritten by a new throw"
      );
    }
    Err(Throw::new())
  }

  pub(crate) fn throw_error<T>(&mut self, kind: ErrorKind, message: &str) -> BridgeResult<T> {
    let err = self.alloc_error(kind, message);
    self.throw_raw(RawValue::Object(err))
  }

  pub(crate) fn throw_vm_error<T>(&mut self, err: VmError) -> BridgeResult<T> {
    let kind = match err {
      VmError::TooManyArguments { .. }
      | VmError::StackOverflow { .. }
      | VmError::PrototypeChainTooDeep
      | VmError::InvalidArrayLength { .. } => ErrorKind::RangeError,
      VmError::InvalidHandle | VmError::NotCallable | VmError::NotConstructable => {
        ErrorKind::TypeError
      }
    };
    self.throw_error(kind, &err.to_string())
  }

  /// Turns a caught panic into a pending `Error`.
  ///
  /// The panic wins over any exception that was pending when it started; that exception is logged
  /// and dropped.
  fn convert_panic(&mut self, payload: Box<dyn Any + Send>) -> Throw {
    let panic = panic_message(&*payload);
    if let Some(discarded) = self.exception.finish_unwind() {
      tracing::warn!(
        discarded = %self.display_raw(discarded),
        "panic discarded a pending exception"
      );
    }
    let message = format!("internal error in {}: {}", self.options.module_name, panic);
    tracing::error!(module = %self.options.module_name, %panic, "native panic converted into an exception");
    let err = self.alloc_error(ErrorKind::Error, &message);
    self.exception.set_pending(RawValue::Object(err));
    Throw::new()
  }

  // Calls.

  /// `[[Call]]`.
  pub(crate) fn call_raw(
    &mut self,
    callee: RawValue,
    this: RawValue,
    args: &[RawValue],
  ) -> BridgeResult<RawValue> {
    if args.len() > self.options.max_arguments {
      return self.throw_vm_error(VmError::TooManyArguments {
        count: args.len(),
        limit: self.options.max_arguments,
      });
    }
    let Some(func) = callee.as_object() else {
      return self.throw_vm_error(VmError::NotCallable);
    };
    let (callback, this_mode) = match self.heap.function(func) {
      Ok(data) => match &data.kind {
        FunctionKind::Native(callback) => (callback.clone(), data.this_mode),
        FunctionKind::Bound {
          target,
          this: bound_this,
          args: prefix,
        } => {
          let target = RawValue::Object(*target);
          let bound_this = *bound_this;
          let args: ArgList = prefix.iter().chain(args).copied().collect();
          return self.bound_hop(|rt| rt.call_raw(target, bound_this, &args));
        }
      },
      Err(err) => return self.throw_vm_error(err),
    };

    let this = match this_mode {
      ThisMode::Strict => this,
      ThisMode::Sloppy => RawValue::Object(self.coerce_to_object(this)),
    };
    self.invoke_native(func, callback, this, args, None)
  }

  /// `[[Construct]]`. `new_target` defaults to `callee`.
  pub(crate) fn construct_raw(
    &mut self,
    callee: RawValue,
    args: &[RawValue],
    new_target: Option<GcObject>,
  ) -> BridgeResult<RawValue> {
    if args.len() > self.options.max_arguments {
      return self.throw_vm_error(VmError::TooManyArguments {
        count: args.len(),
        limit: self.options.max_arguments,
      });
    }
    let func = match callee.as_object() {
      Some(func) if self.heap.is_constructor(callee) => func,
      _ => return self.throw_vm_error(VmError::NotConstructable),
    };
    let new_target = new_target.unwrap_or(func);
    let callback = match self.heap.function(func) {
      Ok(data) => match &data.kind {
        FunctionKind::Native(callback) => callback.clone(),
        FunctionKind::Bound {
          target,
          args: prefix,
          ..
        } => {
          let target = *target;
          let args: ArgList = prefix.iter().chain(args).copied().collect();
          let new_target = if new_target == func { target } else { new_target };
          return self.bound_hop(|rt| {
            rt.construct_raw(RawValue::Object(target), &args, Some(new_target))
          });
        }
      },
      Err(err) => return self.throw_vm_error(err),
    };

    let prototype = match self.heap.get_property(new_target, "prototype") {
      Ok(Some(RawValue::Object(proto))) => proto,
      Ok(_) => self.intrinsics.object_prototype(),
      Err(err) => return self.throw_vm_error(err),
    };
    let instance = RawValue::Object(self.alloc_ordinary_object(Some(prototype)));
    let result = self.invoke_native(func, callback, instance, args, Some(new_target))?;
    Ok(if result.is_object() { result } else { instance })
  }

  /// Forwards from a bound function to its target, counting the hop against `max_call_depth`.
  fn bound_hop<F>(&mut self, forward: F) -> BridgeResult<RawValue>
  where
    F: FnOnce(&mut Self) -> BridgeResult<RawValue>,
  {
    if self.call_depth >= self.options.max_call_depth {
      return self.throw_vm_error(VmError::StackOverflow {
        depth: self.call_depth,
      });
    }
    self.call_depth += 1;
    let result = forward(self);
    self.call_depth -= 1;
    result
  }

  /// Creates a bound function exotic object.
  ///
  /// Rebinding a bound function does not nest: the new function targets the innermost target,
  /// keeps its fixed `this`, and appends `args` to its prefix. Bound chains are therefore never
  /// more than one hop deep.
  pub(crate) fn bind_raw(
    &mut self,
    target: RawValue,
    this: RawValue,
    args: &[RawValue],
  ) -> BridgeResult<GcObject> {
    let target_obj = match target.as_object() {
      Some(obj) if self.heap.is_callable(target) => obj,
      _ => return self.throw_vm_error(VmError::NotCallable),
    };
    let prototype = match self.heap.object_prototype(target_obj) {
      Ok(proto) => proto,
      Err(err) => return self.throw_vm_error(err),
    };
    let target_length = match self.heap.get_property(target_obj, "length") {
      Ok(Some(RawValue::Number(n))) if n.is_finite() => n.trunc(),
      _ => 0.0,
    };

    let (inner_target, this, prefix): (GcObject, RawValue, Vec<RawValue>) =
      match self.heap.function(target_obj) {
        Ok(crate::function::FunctionData {
          kind:
            FunctionKind::Bound {
              target: inner,
              this: inner_this,
              args: inner_args,
            },
          ..
        }) => (*inner, *inner_this, inner_args.iter().chain(args).copied().collect()),
        Ok(_) => (target_obj, this, args.to_vec()),
        Err(err) => return self.throw_vm_error(err),
      };
    if prefix.len() > self.options.max_arguments {
      return self.throw_vm_error(VmError::TooManyArguments {
        count: prefix.len(),
        limit: self.options.max_arguments,
      });
    }
    let target_name = self
      .string_property(RawValue::Object(inner_target), "name")
      .unwrap_or_default();

    let name = self.heap.alloc_string(&format!("bound {target_name}"));
    let mut data = ObjectData::new(
      prototype,
      ObjectKind::Function(crate::function::FunctionData {
        kind: FunctionKind::Bound {
          target: inner_target,
          this,
          args: prefix.into_boxed_slice(),
        },
        this_mode: ThisMode::Strict,
        constructable: self.heap.is_constructor(target),
      }),
    );
    data.define_own("name", RawValue::String(name));
    data.define_own(
      "length",
      RawValue::Number((target_length - args.len() as f64).max(0.0)),
    );
    Ok(self.heap.alloc_object(data))
  }

  /// Enters a native function: opens its scope arena, roots the receiver and the arguments, and
  /// runs the callback behind a panic guard.
  fn invoke_native(
    &mut self,
    callee: GcObject,
    callback: NativeCallback,
    this: RawValue,
    args: &[RawValue],
    new_target: Option<GcObject>,
  ) -> BridgeResult<RawValue> {
    if self.call_depth >= self.options.max_call_depth {
      return self.throw_vm_error(VmError::StackOverflow {
        depth: self.call_depth,
      });
    }

    let span = tracing::trace_span!(
      "bridge_js.native_call",
      depth = self.call_depth + 1,
      argc = args.len(),
      construct = new_target.is_some(),
      outcome = tracing::field::Empty,
    );
    let _enter = span.enter();

    self.call_depth += 1;
    // Recursion is bounded by `max_call_depth`, not by the thread's stack.
    let outcome = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
      panic::catch_unwind(AssertUnwindSafe(|| {
        let mut cx = Cx::enter(&mut *self);
        let info = CallInfo {
          callee: cx.handle(RawValue::Object(callee)),
          this: cx.handle(this),
          args: args.iter().map(|arg| cx.handle(*arg)).collect(),
          new_target: new_target.map(|target| cx.handle(RawValue::Object(target))),
        };
        callback.invoke(FunctionContext::new(cx, info))
      }))
    });
    self.call_depth -= 1;

    match outcome {
      Ok(Ok(value)) if self.exception.pending().is_none() => {
        span.record("outcome", "return");
        Ok(value)
      }
      Ok(Ok(_)) => {
        // Returned normally with an exception pending: treat as a throw.
        span.record("outcome", "throw");
        Err(Throw::new())
      }
      Ok(Err(_)) if self.exception.pending().is_some() => {
        span.record("outcome", "throw");
        Err(Throw::new())
      }
      Ok(Err(_)) => {
        span.record("outcome", "throw");
        tracing::warn!("native function signalled a throw without a pending exception");
        self.throw_error(
          ErrorKind::Error,
          &format!(
            "internal error in {}: exception signalled without a pending value",
            self.options.module_name
          ),
        )
      }
      Err(payload) => {
        span.record("outcome", "panic");
        Err(self.convert_panic(payload))
      }
    }
  }

  // Conversions.

  /// The receiver a sloppy-mode function sees, also used by `FunctionContext::this_object`.
  pub(crate) fn coerce_to_object(&mut self, value: RawValue) -> GcObject {
    match value {
      RawValue::Undefined | RawValue::Null => self.intrinsics.global_object(),
      RawValue::Object(obj) => obj,
      primitive => self.alloc_wrapper(primitive),
    }
  }

  /// ECMAScript `ToString`.
  pub(crate) fn to_string_raw(&mut self, value: RawValue) -> BridgeResult<GcString> {
    let primitive = match value {
      RawValue::String(s) => return Ok(s),
      RawValue::Object(obj) => {
        let to_string = match self.heap.get_property(obj, "toString") {
          Ok(method) => method.filter(|method| self.heap.is_callable(*method)),
          Err(err) => return self.throw_vm_error(err),
        };
        match to_string {
          Some(method) => {
            let result = self.call_raw(method, value, &[])?;
            if result.is_object() {
              return self.throw_error(
                ErrorKind::TypeError,
                "Cannot convert object to primitive value",
              );
            }
            result
          }
          None => {
            let s = self.display_raw(value);
            return Ok(self.heap.alloc_string(&s));
          }
        }
      }
      other => other,
    };
    match primitive {
      RawValue::String(s) => Ok(s),
      other => {
        let s = self.display_raw(other);
        Ok(self.heap.alloc_string(&s))
      }
    }
  }

  /// ECMAScript `ToNumber`, without calling user code: objects other than wrappers are `NaN`.
  pub(crate) fn to_number_raw(&self, value: RawValue) -> f64 {
    match value {
      RawValue::Undefined => f64::NAN,
      RawValue::Null => 0.0,
      RawValue::Bool(b) => {
        if b {
          1.0
        } else {
          0.0
        }
      }
      RawValue::Number(n) => n,
      RawValue::String(s) => {
        let s = self.heap.get_string(s).unwrap_or("").trim();
        if s.is_empty() {
          0.0
        } else {
          match s {
            "Infinity" | "+Infinity" => f64::INFINITY,
            "-Infinity" => f64::NEG_INFINITY,
            // Rust accepts spellings like "inf" and "nan" that JavaScript does not.
            s if s.bytes().any(|b| b.is_ascii_alphabetic() && b != b'e' && b != b'E') => f64::NAN,
            s => s.parse().unwrap_or(f64::NAN),
          }
        }
      }
      RawValue::Object(obj) => match self.heap.object(obj).map(|data| &data.kind) {
        Ok(ObjectKind::Primitive(inner)) => self.to_number_raw(*inner),
        _ => f64::NAN,
      },
    }
  }

  /// ECMAScript `ToBoolean`.
  pub(crate) fn to_boolean_raw(&self, value: RawValue) -> bool {
    match value {
      RawValue::Undefined | RawValue::Null => false,
      RawValue::Bool(b) => b,
      RawValue::Number(n) => !(n == 0.0 || n.is_nan()),
      RawValue::String(s) => !self.heap.get_string(s).unwrap_or("").is_empty(),
      RawValue::Object(_) => true,
    }
  }

  /// A description of `value` that never runs user code. Used for diagnostics and as the `ToString`
  /// fallback for objects without a callable `toString`.
  pub(crate) fn display_raw(&self, value: RawValue) -> String {
    match value {
      RawValue::Undefined => "undefined".to_string(),
      RawValue::Null => "null".to_string(),
      RawValue::Bool(b) => b.to_string(),
      RawValue::Number(n) => number_to_string(n),
      RawValue::String(s) => self.heap.get_string(s).unwrap_or("").to_string(),
      RawValue::Object(obj) => {
        let Ok(data) = self.heap.object(obj) else {
          return "[invalid object]".to_string();
        };
        match &data.kind {
          ObjectKind::Error => {
            let name = self
              .string_property(value, "name")
              .unwrap_or_else(|| "Error".to_string());
            let message = self.string_property(value, "message").unwrap_or_default();
            if message.is_empty() {
              name
            } else if name.is_empty() {
              message
            } else {
              format!("{name}: {message}")
            }
          }
          ObjectKind::Primitive(inner) => self.display_raw(*inner),
          ObjectKind::Function(_) => {
            format!("function {}", self.string_property(value, "name").unwrap_or_default())
          }
          ObjectKind::Array(_) => "[object Array]".to_string(),
          ObjectKind::Ordinary => "[object Object]".to_string(),
        }
      }
    }
  }
}
