//! Function objects and the outbound call surface.
//!
//! Native code invokes a [`JsFunction`] handle through one of:
//! - [`call`](Handle::call), [`apply`](Handle::apply), [`exec`](Handle::exec): `[[Call]]` with an
//!   explicit receiver.
//! - [`construct`](Handle::construct): `[[Construct]]`.
//! - [`call_with`](Handle::call_with) / [`construct_with`](Handle::construct_with): inert builders
//!   that accumulate a receiver and arguments and run on [`apply`](CallOptions::apply) /
//!   [`exec`](CallOptions::exec).
//! - [`bind`](Handle::bind): creates a bound function with a fixed receiver and argument prefix.
//! - [`invoke`](Handle::invoke): replays a [`CallContext`].

use std::marker::PhantomData;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::heap::Heap;
use crate::object::{ObjectData, ObjectKind};
use crate::result::{BridgeResult, JsResult};
use crate::{
  CallContext, Cx, FunctionContext, GcObject, Handle, JsArray, JsFunction, JsObject, JsValue,
  Object, RawValue, Value,
};

/// Arguments collected for one call. Calls with up to four arguments stay on the stack.
pub(crate) type ArgList = SmallVec<[RawValue; 4]>;

/// How a function's `this` is derived from the caller-supplied receiver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThisMode {
  /// The receiver is passed through unchanged.
  #[default]
  Strict,
  /// `undefined`/`null` become the global object and primitives are boxed.
  Sloppy,
}

pub(crate) struct FunctionData {
  pub(crate) kind: FunctionKind,
  pub(crate) this_mode: ThisMode,
  pub(crate) constructable: bool,
}

pub(crate) enum FunctionKind {
  Native(NativeCallback),
  Bound {
    target: GcObject,
    this: RawValue,
    args: Box<[RawValue]>,
  },
}

/// The entry point of a native function, erased over its return type.
pub(crate) trait Callback {
  fn invoke<'a>(&self, cx: FunctionContext<'a>) -> BridgeResult<RawValue>;
}

pub(crate) type NativeCallback = Rc<dyn Callback>;

pub(crate) struct Native<F, V> {
  f: F,
  phantom: PhantomData<fn() -> V>,
}

impl<F, V> Native<F, V>
where
  F: for<'a> Fn(FunctionContext<'a>) -> JsResult<'a, V> + 'static,
  V: Value,
{
  pub(crate) fn callback(f: F) -> NativeCallback {
    Rc::new(Native {
      f,
      phantom: PhantomData,
    })
  }
}

impl<F, V> Callback for Native<F, V>
where
  F: for<'a> Fn(FunctionContext<'a>) -> JsResult<'a, V>,
  V: Value,
{
  fn invoke<'a>(&self, cx: FunctionContext<'a>) -> BridgeResult<RawValue> {
    (self.f)(cx).map(|value| value.raw())
  }
}

/// Properties of a native function created with [`JsFunction::with_options`].
#[derive(Clone, Debug)]
pub struct FunctionOptions {
  pub name: String,
  pub length: u32,
  pub this_mode: ThisMode,
  pub constructable: bool,
}

impl Default for FunctionOptions {
  fn default() -> Self {
    Self {
      name: String::new(),
      length: 0,
      this_mode: ThisMode::Strict,
      constructable: true,
    }
  }
}

impl FunctionOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn length(mut self, length: u32) -> Self {
    self.length = length;
    self
  }

  pub fn this_mode(mut self, this_mode: ThisMode) -> Self {
    self.this_mode = this_mode;
    self
  }

  /// Shorthand for `this_mode(ThisMode::Sloppy)`.
  pub fn sloppy(self) -> Self {
    self.this_mode(ThisMode::Sloppy)
  }

  pub fn constructable(mut self, constructable: bool) -> Self {
    self.constructable = constructable;
    self
  }
}

/// Allocates a native function object.
///
/// Constructable functions get a `prototype` property pointing at `instance_prototype`, which in
/// turn gets a `constructor` property pointing back at the function.
pub(crate) fn alloc_native_function(
  heap: &mut Heap,
  function_prototype: GcObject,
  instance_prototype: Option<GcObject>,
  options: &FunctionOptions,
  callback: NativeCallback,
) -> GcObject {
  let name = heap.alloc_string(&options.name);
  let mut data = ObjectData::new(
    Some(function_prototype),
    ObjectKind::Function(FunctionData {
      kind: FunctionKind::Native(callback),
      this_mode: options.this_mode,
      constructable: options.constructable,
    }),
  );
  data.define_own("name", RawValue::String(name));
  data.define_own("length", RawValue::Number(options.length as f64));
  let instance_prototype = instance_prototype.filter(|_| options.constructable);
  if let Some(proto) = instance_prototype {
    data.define_own("prototype", RawValue::Object(proto));
  }

  let func = heap.alloc_object(data);
  if let Some(proto) = instance_prototype {
    if let Ok(proto) = heap.object_mut(proto) {
      proto.define_own("constructor", RawValue::Object(func));
    }
  }
  func
}

impl JsFunction {
  /// Creates a strict, constructable native function.
  ///
  /// ```ignore
  /// let add = JsFunction::new(&mut cx, |mut cx| {
  ///   let a = cx.argument_as::<JsNumber>(0)?.value(&cx);
  ///   let b = cx.argument_as::<JsNumber>(1)?.value(&cx);
  ///   Ok(cx.number(a + b))
  /// })?;
  /// ```
  pub fn new<'a, F, V>(cx: &mut Cx<'a>, f: F) -> JsResult<'a, JsFunction>
  where
    F: for<'b> Fn(FunctionContext<'b>) -> JsResult<'b, V> + 'static,
    V: Value,
  {
    Self::with_options(cx, FunctionOptions::default(), f)
  }

  pub fn with_options<'a, F, V>(
    cx: &mut Cx<'a>,
    options: FunctionOptions,
    f: F,
  ) -> JsResult<'a, JsFunction>
  where
    F: for<'b> Fn(FunctionContext<'b>) -> JsResult<'b, V> + 'static,
    V: Value,
  {
    let func = cx.rt.alloc_function(&options, Native::callback(f));
    Ok(cx.handle(RawValue::Object(func)))
  }
}

fn collect_args<V: Value>(args: &[Handle<'_, V>]) -> ArgList {
  args.iter().map(|arg| arg.raw()).collect()
}

impl<'a> Handle<'a, JsFunction> {
  /// `[[Call]]` with `this` as the receiver.
  ///
  /// The receiver is coerced according to the callee's [`ThisMode`].
  pub fn call<'c, T: Value>(
    &self,
    cx: &mut Cx<'c>,
    this: Handle<'_, T>,
    args: &[Handle<'_, JsValue>],
  ) -> JsResult<'c, JsValue> {
    let value = cx.rt.call_raw(self.raw(), this.raw(), &collect_args(args))?;
    Ok(cx.handle(value))
  }

  /// `[[Call]]` spreading the elements of `args` as positional arguments.
  pub fn apply<'c, T: Value>(
    &self,
    cx: &mut Cx<'c>,
    this: Handle<'_, T>,
    args: Handle<'_, JsArray>,
  ) -> JsResult<'c, JsValue> {
    let args = args.to_vec(cx);
    self.call(cx, this, &args)
  }

  /// Like [`call`](Handle::call), discarding the return value.
  pub fn exec<T: Value>(
    &self,
    cx: &mut Cx<'_>,
    this: Handle<'_, T>,
    args: &[Handle<'_, JsValue>],
  ) -> BridgeResult<()> {
    cx.rt.call_raw(self.raw(), this.raw(), &collect_args(args))?;
    Ok(())
  }

  /// `[[Construct]]` with `new.target` set to this function.
  ///
  /// Returns the object explicitly returned by the constructor, or the freshly created instance
  /// when it returned a primitive.
  pub fn construct<'c>(
    &self,
    cx: &mut Cx<'c>,
    args: &[Handle<'_, JsValue>],
  ) -> JsResult<'c, JsObject> {
    let value = cx.rt.construct_raw(self.raw(), &collect_args(args), None)?;
    Ok(cx.handle(value))
  }

  /// Creates a bound function.
  ///
  /// Calling the result ignores the supplied receiver: the callee always sees `this` and receives
  /// `args` followed by the call-site arguments. Binding a bound function appends to the prefix
  /// and keeps the first receiver.
  pub fn bind<'c, 'b, T: Value, A: Arguments<'b>>(
    &self,
    cx: &mut Cx<'c>,
    this: Handle<'_, T>,
    args: A,
  ) -> JsResult<'c, JsFunction> {
    let mut prefix = ArgList::new();
    args.append(&mut prefix);
    let bound = cx.rt.bind_raw(self.raw(), this.raw(), &prefix)?;
    Ok(cx.handle(RawValue::Object(bound)))
  }

  /// Starts a `[[Call]]` builder. The receiver defaults to `undefined`.
  pub fn call_with(&self) -> CallOptions<'a> {
    CallOptions {
      callee: *self,
      this: None,
      args: ArgList::new(),
    }
  }

  /// Starts a `[[Construct]]` builder.
  pub fn construct_with(&self) -> ConstructOptions<'a> {
    ConstructOptions {
      callee: *self,
      args: ArgList::new(),
    }
  }

  /// Replays `call` against this function: a `[[Construct]]` if it is a construct call, otherwise
  /// a `[[Call]]` with its receiver.
  pub fn invoke<'c>(&self, cx: &mut Cx<'c>, call: &CallContext<'_>) -> JsResult<'c, JsValue> {
    if call.is_construct() {
      Ok(self.construct(cx, call.args())?.upcast())
    } else {
      self.call(cx, call.this(), call.args())
    }
  }

  /// The function's `name` property, or `""`.
  pub fn name(&self, cx: &mut Cx<'_>) -> BridgeResult<String> {
    match self.get_own_property(cx, "name")? {
      Some(name) if name.is_a::<crate::JsString>(cx) => name.to_rust_string(cx),
      _ => Ok(String::new()),
    }
  }
}

/// A `[[Call]]` under construction. Nothing runs until [`apply`](CallOptions::apply) or
/// [`exec`](CallOptions::exec).
#[derive(Clone)]
pub struct CallOptions<'a> {
  callee: Handle<'a, JsFunction>,
  this: Option<Handle<'a, JsValue>>,
  args: ArgList,
}

impl<'a> CallOptions<'a> {
  /// Sets the receiver.
  pub fn this<V: Value>(&mut self, this: Handle<'a, V>) -> &mut Self {
    self.this = Some(this.upcast());
    self
  }

  /// Appends one argument.
  pub fn arg<V: Value>(&mut self, arg: Handle<'a, V>) -> &mut Self {
    self.args.push(arg.raw());
    self
  }

  /// Appends several arguments.
  pub fn args<A: Arguments<'a>>(&mut self, args: A) -> &mut Self {
    args.append(&mut self.args);
    self
  }

  /// Performs the call and downcasts the result to `V`.
  pub fn apply<'c, V: Value>(&self, cx: &mut Cx<'c>) -> JsResult<'c, V> {
    let this = self.this.map(|this| this.raw()).unwrap_or(RawValue::Undefined);
    let value = cx.rt.call_raw(self.callee.raw(), this, &self.args)?;
    let value: Handle<'c, JsValue> = cx.handle(value);
    value.downcast_or_throw(cx)
  }

  /// Performs the call, discarding the result.
  pub fn exec(&self, cx: &mut Cx<'_>) -> BridgeResult<()> {
    let this = self.this.map(|this| this.raw()).unwrap_or(RawValue::Undefined);
    cx.rt.call_raw(self.callee.raw(), this, &self.args)?;
    Ok(())
  }
}

/// A `[[Construct]]` under construction.
#[derive(Clone)]
pub struct ConstructOptions<'a> {
  callee: Handle<'a, JsFunction>,
  args: ArgList,
}

impl<'a> ConstructOptions<'a> {
  pub fn arg<V: Value>(&mut self, arg: Handle<'a, V>) -> &mut Self {
    self.args.push(arg.raw());
    self
  }

  pub fn args<A: Arguments<'a>>(&mut self, args: A) -> &mut Self {
    args.append(&mut self.args);
    self
  }

  /// Performs the construction and downcasts the result to `O`.
  pub fn apply<'c, O: Object>(&self, cx: &mut Cx<'c>) -> JsResult<'c, O> {
    let value = cx.rt.construct_raw(self.callee.raw(), &self.args, None)?;
    let value: Handle<'c, JsObject> = cx.handle(value);
    value.downcast_or_throw(cx)
  }
}

mod private {
  use super::ArgList;

  pub trait ArgumentsInternal {
    fn append(self, args: &mut ArgList);
  }
}

/// Values usable as an argument list: tuples of handles (up to twelve), arrays and `Vec`s of
/// handles.
pub trait Arguments<'a>: private::ArgumentsInternal {}

macro_rules! impl_arguments_tuple {
  ($($name:ident),*) => {
    impl<'a, $($name: Value),*> private::ArgumentsInternal for ($(Handle<'a, $name>,)*) {
      #[allow(non_snake_case, unused_variables)]
      fn append(self, args: &mut ArgList) {
        let ($($name,)*) = self;
        $(args.push($name.raw());)*
      }
    }

    impl<'a, $($name: Value),*> Arguments<'a> for ($(Handle<'a, $name>,)*) {}
  };
}

impl_arguments_tuple!();
impl_arguments_tuple!(V1);
impl_arguments_tuple!(V1, V2);
impl_arguments_tuple!(V1, V2, V3);
impl_arguments_tuple!(V1, V2, V3, V4);
impl_arguments_tuple!(V1, V2, V3, V4, V5);
impl_arguments_tuple!(V1, V2, V3, V4, V5, V6);
impl_arguments_tuple!(V1, V2, V3, V4, V5, V6, V7);
impl_arguments_tuple!(V1, V2, V3, V4, V5, V6, V7, V8);
impl_arguments_tuple!(V1, V2, V3, V4, V5, V6, V7, V8, V9);
impl_arguments_tuple!(V1, V2, V3, V4, V5, V6, V7, V8, V9, V10);
impl_arguments_tuple!(V1, V2, V3, V4, V5, V6, V7, V8, V9, V10, V11);
impl_arguments_tuple!(V1, V2, V3, V4, V5, V6, V7, V8, V9, V10, V11, V12);

impl<'a, V: Value, const N: usize> private::ArgumentsInternal for [Handle<'a, V>; N] {
  fn append(self, args: &mut ArgList) {
    args.extend(self.iter().map(|arg| arg.raw()));
  }
}

impl<'a, V: Value, const N: usize> Arguments<'a> for [Handle<'a, V>; N] {}

impl<'a, V: Value> private::ArgumentsInternal for Vec<Handle<'a, V>> {
  fn append(self, args: &mut ArgList) {
    args.extend(self.iter().map(|arg| arg.raw()));
  }
}

impl<'a, V: Value> Arguments<'a> for Vec<Handle<'a, V>> {}

impl<'a, V: Value> private::ArgumentsInternal for &[Handle<'a, V>] {
  fn append(self, args: &mut ArgList) {
    args.extend(self.iter().map(|arg| arg.raw()));
  }
}

impl<'a, V: Value> Arguments<'a> for &[Handle<'a, V>] {}
