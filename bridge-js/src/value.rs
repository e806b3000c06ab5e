use crate::{GcObject, GcString, Heap};

/// A JavaScript value as stored by the engine.
///
/// Heap-allocated values are referenced through generation-checked ids. Native code never sees a
/// `RawValue` directly; it works with scope-bound [`Handle`](crate::Handle)s instead.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RawValue {
  /// The JavaScript `undefined` value.
  Undefined,
  /// The JavaScript `null` value.
  Null,
  /// A JavaScript boolean.
  Bool(bool),
  /// A JavaScript number (IEEE-754 double).
  Number(f64),
  /// A heap-allocated JavaScript string.
  String(GcString),
  /// A heap-allocated JavaScript object.
  Object(GcObject),
}

impl RawValue {
  #[inline]
  pub fn is_object(self) -> bool {
    matches!(self, RawValue::Object(_))
  }

  #[inline]
  pub fn is_nullish(self) -> bool {
    matches!(self, RawValue::Undefined | RawValue::Null)
  }

  #[inline]
  pub fn as_object(self) -> Option<GcObject> {
    match self {
      RawValue::Object(obj) => Some(obj),
      _ => None,
    }
  }

  /// ECMAScript `IsStrictlyEqual(x, y)` (the `===` operator).
  ///
  /// Strings compare by contents, objects by identity, and numbers by IEEE equality (so `NaN` is
  /// never equal to itself and `+0 === -0`).
  pub fn strict_equals(self, other: Self, heap: &Heap) -> bool {
    match (self, other) {
      (RawValue::Undefined, RawValue::Undefined) => true,
      (RawValue::Null, RawValue::Null) => true,
      (RawValue::Bool(a), RawValue::Bool(b)) => a == b,
      (RawValue::Number(a), RawValue::Number(b)) => a == b,
      (RawValue::String(a), RawValue::String(b)) => {
        if a == b {
          return true;
        }
        let (Ok(a), Ok(b)) = (heap.get_string(a), heap.get_string(b)) else {
          return false;
        };
        a == b
      }
      (RawValue::Object(a), RawValue::Object(b)) => a == b,
      _ => false,
    }
  }

  /// ECMAScript `SameValue(x, y)`.
  ///
  /// This differs from `===` for Numbers:
  /// - `NaN` is the same as `NaN`
  /// - `+0` and `-0` are distinct
  pub fn same_value(self, other: Self, heap: &Heap) -> bool {
    match (self, other) {
      (RawValue::Number(a), RawValue::Number(b)) => {
        if a.is_nan() && b.is_nan() {
          return true;
        }
        if a == 0.0 && b == 0.0 {
          return a.to_bits() == b.to_bits();
        }
        a == b
      }
      _ => self.strict_equals(other, heap),
    }
  }
}

impl From<GcString> for RawValue {
  fn from(value: GcString) -> Self {
    Self::String(value)
  }
}

impl From<GcObject> for RawValue {
  fn from(value: GcObject) -> Self {
    Self::Object(value)
  }
}

impl From<bool> for RawValue {
  fn from(value: bool) -> Self {
    Self::Bool(value)
  }
}

impl From<f64> for RawValue {
  fn from(value: f64) -> Self {
    Self::Number(value)
  }
}

/// Formats a number the way `Number.prototype.toString()` does for radix 10.
pub(crate) fn number_to_string(n: f64) -> String {
  if n.is_nan() {
    return "NaN".to_string();
  }
  if n.is_infinite() {
    return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
  }
  if n == 0.0 {
    // Covers -0.
    return "0".to_string();
  }
  if n.fract() == 0.0 && n.abs() < 1e21 {
    return format!("{n:.0}");
  }
  format!("{n}")
}
