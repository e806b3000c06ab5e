//! References to engine-owned JavaScript values.
//!
//! Two layers live here:
//! - Heap ids ([`HeapId`], [`GcObject`], [`GcString`], [`RootId`]): packed `{ index, generation }`
//!   slot references. They are plain data and carry no lifetime.
//! - [`Handle`]: what native code actually holds. A handle is created inside a scope arena (a
//!   [`Cx`]) and carries that arena's lifetime, so the borrow checker rejects any use after the
//!   arena closes. [`Root`] is the escape hatch for values that must outlive every scope.

use core::fmt;
use core::marker::PhantomData;

use crate::error::DowncastError;
use crate::heap::ReleaseQueue;
use crate::result::JsResult;
use crate::result::ResultExt;
use crate::types::SuperType;
use crate::{Cx, Object, RawValue, Value};

/// A stable identifier for an allocation in the [`Heap`](crate::Heap).
///
/// This is a packed `{ index: u32, generation: u32 }`.
/// - `index` selects a slot in the heap's slot vector.
/// - `generation` is incremented each time that slot is freed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct HeapId(pub(crate) u64);

impl HeapId {
  pub(crate) fn from_parts(index: u32, generation: u32) -> Self {
    Self((index as u64) | ((generation as u64) << 32))
  }

  /// The slot index within the heap.
  #[inline]
  pub fn index(self) -> u32 {
    self.0 as u32
  }

  /// The generation of the slot when this id was created.
  #[inline]
  pub fn generation(self) -> u32 {
    (self.0 >> 32) as u32
  }
}

impl fmt::Debug for HeapId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HeapId")
      .field("index", &self.index())
      .field("generation", &self.generation())
      .finish()
  }
}

/// A heap-allocated JavaScript object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct GcObject(pub(crate) HeapId);

impl GcObject {
  #[inline]
  pub fn id(self) -> HeapId {
    self.0
  }
}

/// A heap-allocated JavaScript string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct GcString(pub(crate) HeapId);

impl GcString {
  #[inline]
  pub fn id(self) -> HeapId {
    self.0
  }
}

/// An ID for a persistent root stored in the heap.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct RootId(pub(crate) u32);

impl RootId {
  /// The underlying index into the heap's persistent root table.
  #[inline]
  pub fn index(self) -> u32 {
    self.0
  }
}

/// A handle to a JavaScript value owned by a scope arena.
///
/// `'a` is the lifetime of the [`Cx`] the handle was created in (or escaped into). `V` is the
/// statically known type of the value; [`JsValue`](crate::JsValue) means "any".
#[repr(transparent)]
pub struct Handle<'a, V: Value + 'a> {
  value: RawValue,
  phantom: PhantomData<&'a V>,
}

impl<'a, V: Value> Clone for Handle<'a, V> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<'a, V: Value> Copy for Handle<'a, V> {}

impl<'a, V: Value> fmt::Debug for Handle<'a, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Handle<{}>({:?})", V::name(), self.value)
  }
}

impl<'a, V: Value + 'a> Handle<'a, V> {
  /// Wraps an already-rooted value.
  ///
  /// Callers must have pushed `value` onto the root stack of the arena that owns `'a` (or know it
  /// is otherwise reachable for at least `'a`).
  #[inline]
  pub(crate) fn new_internal(value: RawValue) -> Handle<'a, V> {
    Handle {
      value,
      phantom: PhantomData,
    }
  }

  #[inline]
  pub(crate) fn raw(&self) -> RawValue {
    self.value
  }

  /// Safely upcast a handle to a supertype.
  ///
  /// This never fails and does not need a context because it only re-tags the handle.
  pub fn upcast<U: Value + SuperType<V>>(&self) -> Handle<'a, U> {
    Handle::new_internal(self.value)
  }

  /// Tests whether this value is an instance of the given type.
  pub fn is_a<U: Value>(&self, cx: &Cx<'_>) -> bool {
    U::is_typeof(cx.heap(), self.value)
  }

  /// Attempts to downcast a handle to another type.
  ///
  /// A failed downcast **does not** throw; the engine stays usable and the caller decides whether
  /// to convert the error into a `TypeError` (see [`ResultExt::or_throw`]).
  pub fn downcast<U: Value>(&self, cx: &Cx<'_>) -> Result<Handle<'a, U>, DowncastError> {
    if U::is_typeof(cx.heap(), self.value) {
      Ok(Handle::new_internal(self.value))
    } else {
      Err(DowncastError::new(
        crate::types::type_name_of(cx.heap(), self.value),
        U::name(),
      ))
    }
  }

  /// Attempts to downcast a handle, throwing a `TypeError` on failure.
  pub fn downcast_or_throw<U: Value>(&self, cx: &mut Cx<'_>) -> JsResult<'a, U> {
    self.downcast(cx).or_throw(cx)
  }

  /// JavaScript `===`.
  pub fn strict_equals<U: Value>(&self, cx: &Cx<'_>, other: Handle<'_, U>) -> bool {
    self.value.strict_equals(other.value, cx.heap())
  }
}

/// A persistent reference to a JavaScript object.
///
/// Unlike a [`Handle`], a `Root` is not tied to any scope arena: it keeps its object alive across
/// scope exits and GC cycles until it is released with [`Root::drop`] or [`Root::into_inner`].
/// A `Root` dropped without a context (for example one captured by a native function's closure
/// when the function is collected) is queued and released at the start of the next GC cycle.
pub struct Root<O: Object> {
  id: RootId,
  release: Option<ReleaseQueue>,
  phantom: PhantomData<O>,
}

impl<O: Object> fmt::Debug for Root<O> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Root").field("id", &self.id).finish()
  }
}

impl<O: Object> Root<O> {
  pub fn new(cx: &mut Cx<'_>, handle: &Handle<'_, O>) -> Self {
    let id = cx.rt.heap.add_root(handle.raw());
    Self {
      id,
      release: Some(cx.rt.heap.release_queue()),
      phantom: PhantomData,
    }
  }

  pub fn id(&self) -> RootId {
    self.id
  }

  /// Returns a handle to the rooted object, owned by the arena of `cx`.
  pub fn to_inner<'a>(&self, cx: &mut Cx<'a>) -> Handle<'a, O> {
    let value = cx.rt.heap.get_root(self.id).unwrap_or(RawValue::Undefined);
    cx.handle(value)
  }

  /// Releases the persistent root and returns a scope-bound handle to the object.
  pub fn into_inner<'a>(mut self, cx: &mut Cx<'a>) -> Handle<'a, O> {
    let handle = self.to_inner(cx);
    self.release = None;
    cx.rt.heap.remove_root(self.id);
    handle
  }

  /// Releases the persistent root.
  pub fn drop(mut self, cx: &mut Cx<'_>) {
    self.release = None;
    cx.rt.heap.remove_root(self.id);
  }
}

impl<O: Object> Drop for Root<O> {
  fn drop(&mut self) {
    if let Some(queue) = self.release.take() {
      queue.borrow_mut().push(self.id);
    }
  }
}
