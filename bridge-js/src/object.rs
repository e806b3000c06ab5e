use ahash::AHashMap;

use crate::function::{FunctionData, FunctionKind};
use crate::heap::Tracer;
use crate::result::{BridgeResult, JsResult};
use crate::{Cx, GcObject, Handle, JsObject, JsValue, Object, RawValue, Value, VmError};

/// Largest dense array the heap will grow to.
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// Storage for a heap object.
pub(crate) struct ObjectData {
  pub(crate) prototype: Option<GcObject>,
  pub(crate) properties: AHashMap<Box<str>, RawValue>,
  pub(crate) kind: ObjectKind,
}

pub(crate) enum ObjectKind {
  Ordinary,
  /// Dense elements; `length` is derived from the element count.
  Array(Vec<RawValue>),
  Error,
  /// A `Number`/`String`/`Boolean` wrapper object.
  Primitive(RawValue),
  Function(FunctionData),
}

impl ObjectData {
  pub(crate) fn new(prototype: Option<GcObject>, kind: ObjectKind) -> Self {
    Self {
      prototype,
      properties: AHashMap::new(),
      kind,
    }
  }

  pub(crate) fn get_own(&self, key: &str) -> Option<RawValue> {
    if let ObjectKind::Array(elements) = &self.kind {
      if key == "length" {
        return Some(RawValue::Number(elements.len() as f64));
      }
      if let Some(idx) = array_index(key) {
        return elements.get(idx).copied();
      }
    }
    self.properties.get(key).copied()
  }

  /// Writes an own property, keeping array `length` and index writes dense.
  ///
  /// Array growth past [`MAX_ARRAY_LENGTH`] fails with [`VmError::InvalidArrayLength`].
  pub(crate) fn set_own(&mut self, key: &str, value: RawValue) -> Result<(), VmError> {
    if let ObjectKind::Array(elements) = &mut self.kind {
      if key == "length" {
        if let RawValue::Number(n) = value {
          if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 {
            let len = n as usize;
            if len > MAX_ARRAY_LENGTH {
              return Err(VmError::InvalidArrayLength { length: len });
            }
            elements.resize(len, RawValue::Undefined);
          }
        }
        return Ok(());
      }
      if let Some(idx) = array_index(key) {
        if idx >= elements.len() {
          if idx >= MAX_ARRAY_LENGTH {
            return Err(VmError::InvalidArrayLength { length: idx + 1 });
          }
          elements.resize(idx + 1, RawValue::Undefined);
        }
        elements[idx] = value;
        return Ok(());
      }
    }
    self.define_own(key, value);
    Ok(())
  }

  /// Writes straight into the property table. Only for non-index keys on objects being built.
  pub(crate) fn define_own(&mut self, key: &str, value: RawValue) {
    match self.properties.get_mut(key) {
      Some(slot) => *slot = value,
      None => {
        self.properties.insert(key.into(), value);
      }
    }
  }

  pub(crate) fn trace(&self, tracer: &mut Tracer<'_>) {
    if let Some(proto) = self.prototype {
      tracer.trace_value(RawValue::Object(proto));
    }
    for value in self.properties.values() {
      tracer.trace_value(*value);
    }
    match &self.kind {
      ObjectKind::Ordinary | ObjectKind::Error => {}
      ObjectKind::Array(elements) => {
        for value in elements {
          tracer.trace_value(*value);
        }
      }
      ObjectKind::Primitive(value) => tracer.trace_value(*value),
      ObjectKind::Function(func) => {
        if let FunctionKind::Bound { target, this, args } = &func.kind {
          tracer.trace_value(RawValue::Object(*target));
          tracer.trace_value(*this);
          for value in args.iter() {
            tracer.trace_value(*value);
          }
        }
      }
    }
  }
}

/// Parses a canonical array index (`"0"`, `"17"`, but not `"01"` or `"-1"`).
fn array_index(key: &str) -> Option<usize> {
  if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
    return None;
  }
  if !key.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  let idx: u32 = key.parse().ok()?;
  (idx != u32::MAX).then_some(idx as usize)
}

impl<'a, O: Object> Handle<'a, O> {
  /// `[[Get]]`, downcast to `V`. Missing properties read as `undefined`.
  pub fn get<'c, V: Value>(&self, cx: &mut Cx<'c>, key: &str) -> JsResult<'c, V> {
    let value = match self.get_property(cx, key)? {
      Some(value) => value,
      None => cx.undefined().upcast(),
    };
    value.downcast_or_throw(cx)
  }

  /// `[[Get]]` through the prototype chain, distinguishing a missing property from `undefined`.
  pub fn get_property<'c>(
    &self,
    cx: &mut Cx<'c>,
    key: &str,
  ) -> BridgeResult<Option<Handle<'c, JsValue>>> {
    match cx.rt.heap.get_property(self.object(), key) {
      Ok(value) => Ok(value.map(|v| cx.handle(v))),
      Err(err) => cx.rt.throw_vm_error(err),
    }
  }

  /// Reads an own property, ignoring the prototype chain.
  pub fn get_own_property<'c>(
    &self,
    cx: &mut Cx<'c>,
    key: &str,
  ) -> BridgeResult<Option<Handle<'c, JsValue>>> {
    match cx.rt.heap.get_own_property(self.object(), key) {
      Ok(value) => Ok(value.map(|v| cx.handle(v))),
      Err(err) => cx.rt.throw_vm_error(err),
    }
  }

  pub fn has_own_property(&self, cx: &mut Cx<'_>, key: &str) -> BridgeResult<bool> {
    match cx.rt.heap.get_own_property(self.object(), key) {
      Ok(value) => Ok(value.is_some()),
      Err(err) => cx.rt.throw_vm_error(err),
    }
  }

  /// Creates or overwrites an own data property.
  pub fn set<V: Value>(&self, cx: &mut Cx<'_>, key: &str, value: Handle<'_, V>) -> BridgeResult<()> {
    match cx.rt.heap.set_property(self.object(), key, value.raw()) {
      Ok(()) => Ok(()),
      Err(err) => cx.rt.throw_vm_error(err),
    }
  }

  /// The object's `[[Prototype]]`, or `None` for a null-prototype object.
  pub fn prototype<'c>(&self, cx: &mut Cx<'c>) -> BridgeResult<Option<Handle<'c, JsObject>>> {
    match cx.rt.heap.object_prototype(self.object()) {
      Ok(proto) => Ok(proto.map(|p| cx.handle(RawValue::Object(p)))),
      Err(err) => cx.rt.throw_vm_error(err),
    }
  }
}
