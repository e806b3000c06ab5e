use crate::function::{alloc_native_function, FunctionOptions, Native, NativeCallback};
use crate::heap::Heap;
use crate::object::{ObjectData, ObjectKind};
use crate::result::JsResult;
use crate::value::number_to_string;
use crate::{
  FunctionContext, GcObject, Handle, JsArray, JsFunction, JsObject, JsValue, RawValue,
};

/// The native error constructors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
  Error,
  TypeError,
  RangeError,
}

impl ErrorKind {
  pub fn name(self) -> &'static str {
    match self {
      ErrorKind::Error => "Error",
      ErrorKind::TypeError => "TypeError",
      ErrorKind::RangeError => "RangeError",
    }
  }
}

/// The objects every runtime starts with.
///
/// All of them are persistently rooted, so deleting a global binding never lets the GC reclaim an
/// intrinsic the engine still relies on.
#[derive(Debug, Clone, Copy)]
pub struct Intrinsics {
  global_object: GcObject,
  object_prototype: GcObject,
  function_prototype: GcObject,
  array_prototype: GcObject,
  number_prototype: GcObject,
  string_prototype: GcObject,
  boolean_prototype: GcObject,
  object_constructor: GcObject,
  number_constructor: GcObject,
  string_constructor: GcObject,
  boolean_constructor: GcObject,

  error: GcObject,
  error_prototype: GcObject,
  type_error: GcObject,
  type_error_prototype: GcObject,
  range_error: GcObject,
  range_error_prototype: GcObject,
}

struct Builder<'h> {
  heap: &'h mut Heap,
  function_prototype: GcObject,
}

impl Builder<'_> {
  fn object(&mut self, prototype: Option<GcObject>, kind: ObjectKind) -> GcObject {
    let obj = self.heap.alloc_object(ObjectData::new(prototype, kind));
    self.heap.add_root(RawValue::Object(obj));
    obj
  }

  fn function(
    &mut self,
    name: &str,
    length: u32,
    instance_prototype: Option<GcObject>,
    callback: NativeCallback,
  ) -> GcObject {
    let options = FunctionOptions::new()
      .name(name)
      .length(length)
      .constructable(instance_prototype.is_some());
    let func = alloc_native_function(
      self.heap,
      self.function_prototype,
      instance_prototype,
      &options,
      callback,
    );
    self.heap.add_root(RawValue::Object(func));
    func
  }

  fn method(&mut self, target: GcObject, name: &str, length: u32, callback: NativeCallback) {
    let func = self.function(name, length, None, callback);
    self.set(target, name, RawValue::Object(func));
  }

  fn set(&mut self, target: GcObject, key: &str, value: RawValue) {
    if let Ok(data) = self.heap.object_mut(target) {
      data.define_own(key, value);
    }
  }

  fn set_str(&mut self, target: GcObject, key: &str, value: &str) {
    let s = self.heap.alloc_string(value);
    self.set(target, key, RawValue::String(s));
  }
}

impl Intrinsics {
  pub(crate) fn new(heap: &mut Heap) -> Self {
    let object_prototype = heap.alloc_object(ObjectData::new(None, ObjectKind::Ordinary));
    heap.add_root(RawValue::Object(object_prototype));
    let function_prototype =
      heap.alloc_object(ObjectData::new(Some(object_prototype), ObjectKind::Ordinary));
    heap.add_root(RawValue::Object(function_prototype));

    let mut b = Builder {
      heap,
      function_prototype,
    };
    let proto = Some(object_prototype);

    let global_object = b.object(proto, ObjectKind::Ordinary);
    let array_prototype = b.object(proto, ObjectKind::Array(Vec::new()));
    let number_prototype = b.object(proto, ObjectKind::Primitive(RawValue::Number(0.0)));
    let empty = b.heap.alloc_string("");
    let string_prototype = b.object(proto, ObjectKind::Primitive(RawValue::String(empty)));
    let boolean_prototype = b.object(proto, ObjectKind::Primitive(RawValue::Bool(false)));

    let object_constructor = b.function("Object", 1, proto, Native::callback(object_ctor));
    let number_constructor =
      b.function("Number", 1, Some(number_prototype), Native::callback(number_ctor));
    let string_constructor =
      b.function("String", 1, Some(string_prototype), Native::callback(string_ctor));
    let boolean_constructor =
      b.function("Boolean", 1, Some(boolean_prototype), Native::callback(boolean_ctor));

    b.method(object_prototype, "toString", 0, Native::callback(object_proto_to_string));
    b.method(number_prototype, "toString", 0, Native::callback(number_proto_value_to_string));
    b.method(number_prototype, "valueOf", 0, Native::callback(number_proto_value_of));
    b.method(string_prototype, "toString", 0, Native::callback(string_proto_value_of));
    b.method(string_prototype, "valueOf", 0, Native::callback(string_proto_value_of));
    b.method(boolean_prototype, "toString", 0, Native::callback(boolean_proto_to_string));
    b.method(boolean_prototype, "valueOf", 0, Native::callback(boolean_proto_value_of));
    b.method(function_prototype, "call", 1, Native::callback(function_proto_call));
    b.method(function_prototype, "apply", 2, Native::callback(function_proto_apply));
    b.method(function_prototype, "bind", 1, Native::callback(function_proto_bind));

    let error_prototype = b.object(proto, ObjectKind::Ordinary);
    b.set_str(error_prototype, "name", "Error");
    b.set_str(error_prototype, "message", "");
    b.method(error_prototype, "toString", 0, Native::callback(error_proto_to_string));
    let error = b.function("Error", 1, Some(error_prototype), Native::callback(error_ctor));

    let type_error_prototype = b.object(Some(error_prototype), ObjectKind::Ordinary);
    b.set_str(type_error_prototype, "name", "TypeError");
    b.set_str(type_error_prototype, "message", "");
    let type_error = b.function(
      "TypeError",
      1,
      Some(type_error_prototype),
      Native::callback(type_error_ctor),
    );

    let range_error_prototype = b.object(Some(error_prototype), ObjectKind::Ordinary);
    b.set_str(range_error_prototype, "name", "RangeError");
    b.set_str(range_error_prototype, "message", "");
    let range_error = b.function(
      "RangeError",
      1,
      Some(range_error_prototype),
      Native::callback(range_error_ctor),
    );

    for (name, value) in [
      ("globalThis", global_object),
      ("Object", object_constructor),
      ("Number", number_constructor),
      ("String", string_constructor),
      ("Boolean", boolean_constructor),
      ("Error", error),
      ("TypeError", type_error),
      ("RangeError", range_error),
    ] {
      b.set(global_object, name, RawValue::Object(value));
    }

    Self {
      global_object,
      object_prototype,
      function_prototype,
      array_prototype,
      number_prototype,
      string_prototype,
      boolean_prototype,
      object_constructor,
      number_constructor,
      string_constructor,
      boolean_constructor,
      error,
      error_prototype,
      type_error,
      type_error_prototype,
      range_error,
      range_error_prototype,
    }
  }

  pub fn global_object(&self) -> GcObject {
    self.global_object
  }

  pub fn object_prototype(&self) -> GcObject {
    self.object_prototype
  }

  pub fn function_prototype(&self) -> GcObject {
    self.function_prototype
  }

  pub fn array_prototype(&self) -> GcObject {
    self.array_prototype
  }

  pub fn number_prototype(&self) -> GcObject {
    self.number_prototype
  }

  pub fn string_prototype(&self) -> GcObject {
    self.string_prototype
  }

  pub fn boolean_prototype(&self) -> GcObject {
    self.boolean_prototype
  }

  pub fn object_constructor(&self) -> GcObject {
    self.object_constructor
  }

  pub fn number_constructor(&self) -> GcObject {
    self.number_constructor
  }

  pub fn string_constructor(&self) -> GcObject {
    self.string_constructor
  }

  pub fn boolean_constructor(&self) -> GcObject {
    self.boolean_constructor
  }

  pub fn error(&self) -> GcObject {
    self.error
  }

  pub fn type_error(&self) -> GcObject {
    self.type_error
  }

  pub fn range_error(&self) -> GcObject {
    self.range_error
  }

  pub fn error_prototype(&self, kind: ErrorKind) -> GcObject {
    match kind {
      ErrorKind::Error => self.error_prototype,
      ErrorKind::TypeError => self.type_error_prototype,
      ErrorKind::RangeError => self.range_error_prototype,
    }
  }
}

/// Allocates an error object with an own `message`.
pub(crate) fn alloc_error(heap: &mut Heap, prototype: GcObject, message: &str) -> GcObject {
  let message = heap.alloc_string(message);
  let mut data = ObjectData::new(Some(prototype), ObjectKind::Error);
  data.define_own("message", RawValue::String(message));
  heap.alloc_object(data)
}

fn first_argument<'a>(cx: &mut FunctionContext<'a>) -> Handle<'a, JsValue> {
  match cx.argument(0) {
    Some(arg) => arg,
    None => cx.undefined().upcast(),
  }
}

fn make_error<'a>(mut cx: FunctionContext<'a>, kind: ErrorKind) -> JsResult<'a, JsValue> {
  // `new` takes the prototype from `new.target`; a plain call uses the intrinsic one.
  let prototype = if cx.is_construct() {
    let this = cx.this_object();
    this.prototype(&mut cx)?.map(|p| p.object())
  } else {
    None
  };
  let prototype = prototype.unwrap_or_else(|| cx.rt.intrinsics.error_prototype(kind));

  let message = cx.argument(0).filter(|m| !m.is_a::<crate::JsUndefined>(&cx));
  let err = match message {
    Some(message) => {
      let message = message.to_rust_string(&mut cx)?;
      alloc_error(&mut cx.rt.heap, prototype, &message)
    }
    None => cx.rt.heap.alloc_object(ObjectData::new(Some(prototype), ObjectKind::Error)),
  };
  Ok(cx.handle(RawValue::Object(err)))
}

fn error_ctor<'a>(cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  make_error(cx, ErrorKind::Error)
}

fn type_error_ctor<'a>(cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  make_error(cx, ErrorKind::TypeError)
}

fn range_error_ctor<'a>(cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  make_error(cx, ErrorKind::RangeError)
}

fn error_proto_to_string<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  let this = match cx.this_value().downcast::<JsObject>(&cx) {
    Ok(this) => this,
    Err(_) => return cx.throw_type_error("Error.prototype.toString requires that 'this' be an Object"),
  };
  let name = match this.get_property(&mut cx, "name")? {
    Some(name) if !name.is_a::<crate::JsUndefined>(&cx) => name.to_rust_string(&mut cx)?,
    _ => "Error".to_string(),
  };
  let message = match this.get_property(&mut cx, "message")? {
    Some(message) if !message.is_a::<crate::JsUndefined>(&cx) => message.to_rust_string(&mut cx)?,
    _ => String::new(),
  };
  let s = match (name.is_empty(), message.is_empty()) {
    (_, true) => name,
    (true, false) => message,
    (false, false) => format!("{name}: {message}"),
  };
  Ok(cx.string(s).upcast())
}

fn object_ctor<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  let value = first_argument(&mut cx);
  if value.raw().is_nullish() {
    return Ok(cx.empty_object().upcast());
  }
  let obj = cx.rt.coerce_to_object(value.raw());
  Ok(cx.handle(RawValue::Object(obj)))
}

/// `new Number(v)`, `new String(v)` and `new Boolean(v)` return wrappers; plain calls convert.
fn wrap_if_construct<'a>(
  mut cx: FunctionContext<'a>,
  value: RawValue,
) -> JsResult<'a, JsValue> {
  if cx.is_construct() {
    let obj = cx.rt.coerce_to_object(value);
    Ok(cx.handle(RawValue::Object(obj)))
  } else {
    Ok(cx.handle(value))
  }
}

fn number_ctor<'a>(cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  let n = match cx.argument(0) {
    Some(value) => cx.rt.to_number_raw(value.raw()),
    None => 0.0,
  };
  wrap_if_construct(cx, RawValue::Number(n))
}

fn string_ctor<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  let s = match cx.argument(0) {
    Some(value) => cx.rt.to_string_raw(value.raw())?,
    None => cx.rt.heap.alloc_string(""),
  };
  wrap_if_construct(cx, RawValue::String(s))
}

fn boolean_ctor<'a>(cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  let b = match cx.argument(0) {
    Some(value) => cx.rt.to_boolean_raw(value.raw()),
    None => false,
  };
  wrap_if_construct(cx, RawValue::Bool(b))
}

fn object_proto_to_string<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  let tag = match cx.this_value().raw() {
    RawValue::Undefined => "Undefined",
    RawValue::Null => "Null",
    RawValue::Bool(_) => "Boolean",
    RawValue::Number(_) => "Number",
    RawValue::String(_) => "String",
    RawValue::Object(obj) => match cx.heap().object(obj).map(|data| &data.kind) {
      Ok(ObjectKind::Array(_)) => "Array",
      Ok(ObjectKind::Function(_)) => "Function",
      Ok(ObjectKind::Error) => "Error",
      Ok(ObjectKind::Primitive(RawValue::Number(_))) => "Number",
      Ok(ObjectKind::Primitive(RawValue::String(_))) => "String",
      Ok(ObjectKind::Primitive(RawValue::Bool(_))) => "Boolean",
      _ => "Object",
    },
  };
  Ok(cx.string(format!("[object {tag}]")).upcast())
}

/// `thisNumberValue`, `thisStringValue` and `thisBooleanValue`: unwraps a primitive receiver or a
/// wrapper object of the expected type.
fn this_primitive(cx: &FunctionContext<'_>, matches: fn(RawValue) -> bool) -> Option<RawValue> {
  let this = cx.this_value().raw();
  if matches(this) {
    return Some(this);
  }
  let obj = this.as_object()?;
  match cx.heap().object(obj).map(|data| &data.kind) {
    Ok(ObjectKind::Primitive(value)) if matches(*value) => Some(*value),
    _ => None,
  }
}

fn number_proto_value_of<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  match this_primitive(&cx, |v| matches!(v, RawValue::Number(_))) {
    Some(value) => Ok(cx.handle(value)),
    None => cx.throw_type_error("Number.prototype.valueOf requires that 'this' be a Number"),
  }
}

fn number_proto_value_to_string<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  match this_primitive(&cx, |v| matches!(v, RawValue::Number(_))) {
    Some(RawValue::Number(n)) => Ok(cx.string(number_to_string(n)).upcast()),
    _ => cx.throw_type_error("Number.prototype.toString requires that 'this' be a Number"),
  }
}

fn string_proto_value_of<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  match this_primitive(&cx, |v| matches!(v, RawValue::String(_))) {
    Some(value) => Ok(cx.handle(value)),
    None => cx.throw_type_error("String.prototype.valueOf requires that 'this' be a String"),
  }
}

fn boolean_proto_value_of<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  match this_primitive(&cx, |v| matches!(v, RawValue::Bool(_))) {
    Some(value) => Ok(cx.handle(value)),
    None => cx.throw_type_error("Boolean.prototype.valueOf requires that 'this' be a Boolean"),
  }
}

fn boolean_proto_to_string<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  match this_primitive(&cx, |v| matches!(v, RawValue::Bool(_))) {
    Some(RawValue::Bool(b)) => Ok(cx.string(if b { "true" } else { "false" }).upcast()),
    _ => cx.throw_type_error("Boolean.prototype.toString requires that 'this' be a Boolean"),
  }
}

fn rest_arguments<'a>(cx: &FunctionContext<'a>, from: usize) -> Vec<Handle<'a, JsValue>> {
  (from..cx.len()).filter_map(|i| cx.argument(i)).collect()
}

fn function_proto_call<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  let f = cx.this_as::<JsFunction>()?;
  let this = first_argument(&mut cx);
  let args = rest_arguments(&cx, 1);
  f.call(&mut cx, this, &args)
}

fn function_proto_apply<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  let f = cx.this_as::<JsFunction>()?;
  let this = first_argument(&mut cx);
  match cx.argument(1) {
    Some(args) if !args.raw().is_nullish() => {
      let args = args.downcast_or_throw::<JsArray>(&mut cx)?;
      f.apply(&mut cx, this, args)
    }
    _ => f.call(&mut cx, this, &[]),
  }
}

fn function_proto_bind<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  let f = cx.this_as::<JsFunction>()?;
  let this = first_argument(&mut cx);
  let args = rest_arguments(&cx, 1);
  Ok(f.bind(&mut cx, this, args)?.upcast())
}
