//! The per-runtime exception slot.
//!
//! The slot holds at most one pending exception. Writing while a value is already pending replaces
//! it (last write wins). A panic in native code moves the slot to `Unwinding` until the nearest
//! native boundary converts the panic into a thrown `Error`.

use std::any::Any;

use crate::heap::Heap;
use crate::RawValue;

/// Observable state of the exception slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExceptionState {
  /// No exception is pending.
  Clear,
  /// Exactly one exception value is pending.
  Pending,
  /// A native panic is in flight and has not been converted yet.
  Unwinding,
}

#[derive(Debug, Default)]
pub(crate) enum ExceptionSlot {
  #[default]
  Clear,
  Pending(RawValue),
  Unwinding {
    discarded: Option<RawValue>,
  },
}

impl ExceptionSlot {
  pub(crate) fn state(&self) -> ExceptionState {
    match self {
      ExceptionSlot::Clear => ExceptionState::Clear,
      ExceptionSlot::Pending(_) => ExceptionState::Pending,
      ExceptionSlot::Unwinding { .. } => ExceptionState::Unwinding,
    }
  }

  pub(crate) fn pending(&self) -> Option<RawValue> {
    match self {
      ExceptionSlot::Pending(value) => Some(*value),
      _ => None,
    }
  }

  /// Makes `value` the pending exception and returns whatever it replaced.
  pub(crate) fn set_pending(&mut self, value: RawValue) -> Option<RawValue> {
    match std::mem::replace(self, ExceptionSlot::Pending(value)) {
      ExceptionSlot::Clear => None,
      ExceptionSlot::Pending(prev) => Some(prev),
      ExceptionSlot::Unwinding { discarded } => discarded,
    }
  }

  /// Clears a pending exception, returning it.
  ///
  /// An in-flight panic is left untouched.
  pub(crate) fn take(&mut self) -> Option<RawValue> {
    match self {
      ExceptionSlot::Pending(value) => {
        let value = *value;
        *self = ExceptionSlot::Clear;
        Some(value)
      }
      _ => None,
    }
  }

  /// Records that a panic started unwinding. A pending exception is remembered so it can be
  /// reported once the panic is converted.
  pub(crate) fn begin_unwind(&mut self) {
    let discarded = match std::mem::take(self) {
      ExceptionSlot::Clear => None,
      ExceptionSlot::Pending(value) => Some(value),
      ExceptionSlot::Unwinding { discarded } => discarded,
    };
    *self = ExceptionSlot::Unwinding { discarded };
  }

  /// Ends an unwind, returning the exception the panic displaced (if any). The slot is cleared.
  pub(crate) fn finish_unwind(&mut self) -> Option<RawValue> {
    match std::mem::take(self) {
      ExceptionSlot::Clear => None,
      ExceptionSlot::Pending(value) => Some(value),
      ExceptionSlot::Unwinding { discarded } => discarded,
    }
  }

  /// Values the GC must keep alive.
  pub(crate) fn roots(&self) -> Option<RawValue> {
    match self {
      ExceptionSlot::Clear => None,
      ExceptionSlot::Pending(value) => Some(*value),
      ExceptionSlot::Unwinding { discarded } => *discarded,
    }
  }

  pub(crate) fn debug_is_valid(&self, heap: &Heap) -> bool {
    match self.roots() {
      Some(RawValue::Object(obj)) => heap.is_valid_object(obj),
      Some(RawValue::String(s)) => heap.is_valid_string(s),
      _ => true,
    }
  }
}

/// Extracts the message of a panic payload (`panic!("..")` produces `&str` or `String`).
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&'static str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}
