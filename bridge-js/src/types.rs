//! JavaScript type markers.
//!
//! Every handle is tagged with one of these zero-sized types. The tag is a static claim about the
//! dynamic type of the referenced value; it can only be established by the engine (when it creates
//! a value), by [`Handle::upcast`], or by a checked [`Handle::downcast`].

use crate::heap::Heap;
use crate::object::ObjectKind;
use crate::result::{BridgeResult, JsResult};
use crate::{Cx, Handle, RawValue};

mod private {
  pub trait Sealed {}
}

/// The trait shared by all JavaScript value types.
pub trait Value: private::Sealed + Copy + 'static {
  /// A human readable name used in downcast errors.
  fn name() -> &'static str;

  /// Returns `true` if `value` is an instance of this type.
  fn is_typeof(heap: &Heap, value: RawValue) -> bool;
}

/// The trait of all object types.
pub trait Object: Value {}

/// `Self` is a supertype of `T`: every `T` is also a `Self`.
pub trait SuperType<T: Value> {}

macro_rules! value_type {
  ($(#[$meta:meta])* $name:ident, $label:literal, |$heap:ident, $value:ident| $check:expr) => {
    $(#[$meta])*
    #[derive(Clone, Copy, Debug)]
    pub struct $name {
      _private: (),
    }

    impl private::Sealed for $name {}

    impl Value for $name {
      fn name() -> &'static str {
        $label
      }

      #[allow(unused_variables)]
      fn is_typeof($heap: &Heap, $value: RawValue) -> bool {
        $check
      }
    }
  };
}

value_type!(
  /// Any JavaScript value.
  JsValue, "any", |heap, value| true
);
value_type!(
  /// The `undefined` value.
  JsUndefined, "undefined", |heap, value| matches!(value, RawValue::Undefined)
);
value_type!(
  /// The `null` value.
  JsNull, "null", |heap, value| matches!(value, RawValue::Null)
);
value_type!(
  JsBoolean, "boolean", |heap, value| matches!(value, RawValue::Bool(_))
);
value_type!(
  JsNumber, "number", |heap, value| matches!(value, RawValue::Number(_))
);
value_type!(
  JsString, "string", |heap, value| matches!(value, RawValue::String(_))
);
value_type!(
  /// Any object, including functions, arrays and errors.
  JsObject, "object", |heap, value| value.is_object()
);
value_type!(
  /// A callable object.
  JsFunction, "function", |heap, value| heap.is_callable(value)
);
value_type!(
  JsArray, "Array", |heap, value| object_kind_is(heap, value, |k| matches!(k, ObjectKind::Array(_)))
);
value_type!(
  /// An object created by one of the `Error` constructors.
  JsError, "Error", |heap, value| object_kind_is(heap, value, |k| matches!(k, ObjectKind::Error))
);

impl Object for JsObject {}
impl Object for JsFunction {}
impl Object for JsArray {}
impl Object for JsError {}

impl<T: Value> SuperType<T> for JsValue {}
impl<T: Object> SuperType<T> for JsObject {}

fn object_kind_is(heap: &Heap, value: RawValue, f: impl FnOnce(&ObjectKind) -> bool) -> bool {
  match value {
    RawValue::Object(obj) => heap.object(obj).map(|data| f(&data.kind)).unwrap_or(false),
    _ => false,
  }
}

/// The most specific type name of `value`, for diagnostics.
pub(crate) fn type_name_of(heap: &Heap, value: RawValue) -> &'static str {
  match value {
    RawValue::Undefined => JsUndefined::name(),
    RawValue::Null => JsNull::name(),
    RawValue::Bool(_) => JsBoolean::name(),
    RawValue::Number(_) => JsNumber::name(),
    RawValue::String(_) => JsString::name(),
    RawValue::Object(_) if JsFunction::is_typeof(heap, value) => JsFunction::name(),
    RawValue::Object(_) if JsArray::is_typeof(heap, value) => JsArray::name(),
    RawValue::Object(_) if JsError::is_typeof(heap, value) => JsError::name(),
    RawValue::Object(_) => JsObject::name(),
  }
}

impl JsUndefined {
  pub fn new<'a>(cx: &mut Cx<'a>) -> Handle<'a, JsUndefined> {
    cx.undefined()
  }
}

impl JsNull {
  pub fn new<'a>(cx: &mut Cx<'a>) -> Handle<'a, JsNull> {
    cx.null()
  }
}

impl JsBoolean {
  pub fn new<'a>(cx: &mut Cx<'a>, value: bool) -> Handle<'a, JsBoolean> {
    cx.boolean(value)
  }
}

impl JsNumber {
  pub fn new<'a, T: Into<f64>>(cx: &mut Cx<'a>, value: T) -> Handle<'a, JsNumber> {
    cx.number(value)
  }
}

impl JsString {
  pub fn new<'a, S: AsRef<str>>(cx: &mut Cx<'a>, value: S) -> Handle<'a, JsString> {
    cx.string(value)
  }
}

impl JsObject {
  /// Creates an ordinary object inheriting from `Object.prototype`.
  pub fn new<'a>(cx: &mut Cx<'a>) -> Handle<'a, JsObject> {
    cx.empty_object()
  }

  /// Creates an ordinary object with an explicit prototype (`None` for a null-prototype object).
  pub fn with_prototype<'a>(
    cx: &mut Cx<'a>,
    prototype: Option<Handle<'_, JsObject>>,
  ) -> Handle<'a, JsObject> {
    let obj = cx.rt.alloc_ordinary_object(prototype.map(|p| p.object()));
    cx.handle(RawValue::Object(obj))
  }
}

impl JsArray {
  /// Creates an empty array.
  pub fn new<'a>(cx: &mut Cx<'a>) -> Handle<'a, JsArray> {
    cx.empty_array()
  }

  /// Creates an array holding `values` in order.
  pub fn from_values<'a, V: Value>(cx: &mut Cx<'a>, values: &[Handle<'_, V>]) -> Handle<'a, JsArray> {
    let elements = values.iter().map(|v| v.raw()).collect();
    let arr = cx.rt.alloc_array(elements);
    cx.handle(RawValue::Object(arr))
  }
}

impl JsError {
  /// Creates an `Error` object with the given message.
  pub fn error<'a, S: AsRef<str>>(cx: &mut Cx<'a>, msg: S) -> JsResult<'a, JsError> {
    Ok(cx.new_error(crate::intrinsics::ErrorKind::Error, msg))
  }

  /// Creates a `TypeError` object with the given message.
  pub fn type_error<'a, S: AsRef<str>>(cx: &mut Cx<'a>, msg: S) -> JsResult<'a, JsError> {
    Ok(cx.new_error(crate::intrinsics::ErrorKind::TypeError, msg))
  }

  /// Creates a `RangeError` object with the given message.
  pub fn range_error<'a, S: AsRef<str>>(cx: &mut Cx<'a>, msg: S) -> JsResult<'a, JsError> {
    Ok(cx.new_error(crate::intrinsics::ErrorKind::RangeError, msg))
  }
}

impl<'a> Handle<'a, JsBoolean> {
  pub fn value(&self, _cx: &Cx<'_>) -> bool {
    match self.raw() {
      RawValue::Bool(b) => b,
      _ => false,
    }
  }
}

impl<'a> Handle<'a, JsNumber> {
  pub fn value(&self, _cx: &Cx<'_>) -> f64 {
    match self.raw() {
      RawValue::Number(n) => n,
      _ => f64::NAN,
    }
  }
}

impl<'a> Handle<'a, JsString> {
  /// Copies the string contents out of the engine.
  pub fn value(&self, cx: &Cx<'_>) -> String {
    match self.raw() {
      RawValue::String(s) => cx.heap().get_string(s).map(str::to_owned).unwrap_or_default(),
      _ => String::new(),
    }
  }
}

impl<'a, V: Value> Handle<'a, V> {
  /// ECMAScript `ToString`. Objects are converted by calling their `toString` method.
  pub fn to_string<'c>(&self, cx: &mut Cx<'c>) -> JsResult<'c, JsString> {
    let s = cx.rt.to_string_raw(self.raw())?;
    Ok(cx.handle(RawValue::String(s)))
  }

  /// Like [`Handle::to_string`], but copies the result into a Rust `String`.
  pub fn to_rust_string(&self, cx: &mut Cx<'_>) -> BridgeResult<String> {
    let s = cx.rt.to_string_raw(self.raw())?;
    Ok(cx.heap().get_string(s).map(str::to_owned).unwrap_or_default())
  }

  /// The `typeof`-like name of the value (`"undefined"`, `"function"`, `"Array"`, ...).
  pub fn type_name(&self, cx: &Cx<'_>) -> &'static str {
    type_name_of(cx.heap(), self.raw())
  }
}

impl<'a, O: Object> Handle<'a, O> {
  pub(crate) fn object(&self) -> crate::GcObject {
    match self.raw() {
      RawValue::Object(obj) => obj,
      // Object handles are only created for object values.
      _ => unreachable!("object handle holds a primitive"),
    }
  }
}

impl<'a> Handle<'a, JsArray> {
  /// The current `length` of the array.
  pub fn len(&self, cx: &Cx<'_>) -> usize {
    match cx.heap().object(self.object()).map(|data| &data.kind) {
      Ok(ObjectKind::Array(elements)) => elements.len(),
      _ => 0,
    }
  }

  pub fn is_empty(&self, cx: &Cx<'_>) -> bool {
    self.len(cx) == 0
  }

  /// Copies the elements into handles owned by `cx`'s arena.
  pub fn to_vec<'c>(&self, cx: &mut Cx<'c>) -> Vec<Handle<'c, crate::JsValue>> {
    let mut out = Vec::with_capacity(self.len(cx));
    let mut i = 0;
    // Re-read the length each time: the array is shared engine state.
    while i < self.len(cx) {
      let value = match cx.heap().object(self.object()).map(|data| &data.kind) {
        Ok(ObjectKind::Array(elements)) => elements.get(i).copied().unwrap_or(RawValue::Undefined),
        _ => RawValue::Undefined,
      };
      out.push(cx.handle(value));
      i += 1;
    }
    out
  }
}
