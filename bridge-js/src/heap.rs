use std::cell::RefCell;
use std::rc::Rc;

use crate::function::FunctionData;
use crate::object::{ObjectData, ObjectKind};
use crate::{GcObject, GcString, HeapId, RawValue, RootId, VmError};

/// Hard upper bound for `[[Prototype]]` chain traversals.
pub const MAX_PROTOTYPE_CHAIN: usize = 10_000;

/// A non-moving mark/sweep GC heap.
///
/// The heap stores allocations in a `Vec` of slots. Ids store the slot `index` and a per-slot
/// `generation`, which keeps them stable across `Vec` reallocations and lets stale ids be
/// detected once a slot is reused.
///
/// The heap also owns the *scope arena stack*: a single root stack partitioned into frames, one
/// per open [`Cx`](crate::Cx). Handles created while a frame is on top are pushed into it; closing
/// the frame truncates the root stack back to the frame's base.
pub struct Heap {
  gc_runs: u64,
  live: usize,

  slots: Vec<Slot>,
  marks: Vec<u8>,
  free_list: Vec<u32>,

  // Root sets.
  root_stack: Vec<RawValue>,
  frames: Vec<usize>,
  persistent_roots: Vec<Option<RawValue>>,
  persistent_roots_free: Vec<u32>,
  /// Roots dropped without a context. Drained at the start of the next GC cycle.
  released_roots: ReleaseQueue,
}

pub(crate) type ReleaseQueue = Rc<RefCell<Vec<RootId>>>;

struct Slot {
  generation: u32,
  value: Option<HeapObject>,
}

pub(crate) enum HeapObject {
  String(Box<str>),
  Object(ObjectData),
}

impl Default for Heap {
  fn default() -> Self {
    Self::new()
  }
}

impl Heap {
  pub fn new() -> Self {
    Self {
      gc_runs: 0,
      live: 0,
      slots: Vec::new(),
      marks: Vec::new(),
      free_list: Vec::new(),
      root_stack: Vec::new(),
      frames: Vec::new(),
      persistent_roots: Vec::new(),
      persistent_roots_free: Vec::new(),
      released_roots: ReleaseQueue::default(),
    }
  }

  /// Number of live allocations (strings and objects).
  pub fn live_allocations(&self) -> usize {
    self.live
  }

  /// Total number of GC cycles that have run.
  pub fn gc_runs(&self) -> u64 {
    self.gc_runs
  }

  /// Number of currently open scope arenas.
  pub fn scope_depth(&self) -> usize {
    self.frames.len()
  }

  /// Number of stack roots held by all open scope arenas.
  pub fn root_stack_len(&self) -> usize {
    self.root_stack.len()
  }

  fn alloc(&mut self, obj: HeapObject) -> HeapId {
    self.live += 1;
    match self.free_list.pop() {
      Some(idx) => {
        let slot = &mut self.slots[idx as usize];
        debug_assert!(slot.value.is_none());
        slot.value = Some(obj);
        HeapId::from_parts(idx, slot.generation)
      }
      None => {
        let idx = self.slots.len() as u32;
        self.slots.push(Slot {
          generation: 0,
          value: Some(obj),
        });
        self.marks.push(0);
        HeapId::from_parts(idx, 0)
      }
    }
  }

  fn validate(&self, id: HeapId) -> Option<usize> {
    let idx = id.index() as usize;
    let slot = self.slots.get(idx)?;
    if slot.generation != id.generation() || slot.value.is_none() {
      return None;
    }
    Some(idx)
  }

  pub(crate) fn get_heap_object(&self, id: HeapId) -> Result<&HeapObject, VmError> {
    let idx = self.validate(id).ok_or(VmError::InvalidHandle)?;
    self.slots[idx].value.as_ref().ok_or(VmError::InvalidHandle)
  }

  fn get_heap_object_mut(&mut self, id: HeapId) -> Result<&mut HeapObject, VmError> {
    let idx = self.validate(id).ok_or(VmError::InvalidHandle)?;
    self.slots[idx].value.as_mut().ok_or(VmError::InvalidHandle)
  }

  pub fn is_valid_object(&self, obj: GcObject) -> bool {
    matches!(self.get_heap_object(obj.0), Ok(HeapObject::Object(_)))
  }

  pub fn is_valid_string(&self, s: GcString) -> bool {
    matches!(self.get_heap_object(s.0), Ok(HeapObject::String(_)))
  }

  pub(crate) fn alloc_string(&mut self, s: &str) -> GcString {
    GcString(self.alloc(HeapObject::String(s.into())))
  }

  /// Gets the contents of `s`.
  pub fn get_string(&self, s: GcString) -> Result<&str, VmError> {
    match self.get_heap_object(s.0)? {
      HeapObject::String(s) => Ok(s),
      HeapObject::Object(_) => Err(VmError::InvalidHandle),
    }
  }

  pub(crate) fn alloc_object(&mut self, data: ObjectData) -> GcObject {
    GcObject(self.alloc(HeapObject::Object(data)))
  }

  pub(crate) fn object(&self, obj: GcObject) -> Result<&ObjectData, VmError> {
    match self.get_heap_object(obj.0)? {
      HeapObject::Object(data) => Ok(data),
      HeapObject::String(_) => Err(VmError::InvalidHandle),
    }
  }

  pub(crate) fn object_mut(&mut self, obj: GcObject) -> Result<&mut ObjectData, VmError> {
    match self.get_heap_object_mut(obj.0)? {
      HeapObject::Object(data) => Ok(data),
      HeapObject::String(_) => Err(VmError::InvalidHandle),
    }
  }

  pub(crate) fn function(&self, obj: GcObject) -> Result<&FunctionData, VmError> {
    match &self.object(obj)?.kind {
      ObjectKind::Function(f) => Ok(f),
      _ => Err(VmError::NotCallable),
    }
  }

  /// Returns `true` if `value` is callable (has a `[[Call]]` internal method).
  pub fn is_callable(&self, value: RawValue) -> bool {
    match value {
      RawValue::Object(obj) => self.function(obj).is_ok(),
      _ => false,
    }
  }

  /// Returns `true` if `value` is a constructor (has a `[[Construct]]` internal method).
  pub fn is_constructor(&self, value: RawValue) -> bool {
    match value {
      RawValue::Object(obj) => self.function(obj).map(|f| f.constructable).unwrap_or(false),
      _ => false,
    }
  }

  pub fn object_prototype(&self, obj: GcObject) -> Result<Option<GcObject>, VmError> {
    Ok(self.object(obj)?.prototype)
  }

  pub(crate) fn get_own_property(
    &self,
    obj: GcObject,
    key: &str,
  ) -> Result<Option<RawValue>, VmError> {
    Ok(self.object(obj)?.get_own(key))
  }

  /// `[[Get]]` for data properties: walks the prototype chain.
  pub(crate) fn get_property(&self, obj: GcObject, key: &str) -> Result<Option<RawValue>, VmError> {
    let mut current = Some(obj);
    let mut steps = 0usize;
    while let Some(obj) = current {
      if steps >= MAX_PROTOTYPE_CHAIN {
        return Err(VmError::PrototypeChainTooDeep);
      }
      steps += 1;

      let data = self.object(obj)?;
      if let Some(value) = data.get_own(key) {
        return Ok(Some(value));
      }
      current = data.prototype;
    }
    Ok(None)
  }

  pub(crate) fn set_property(
    &mut self,
    obj: GcObject,
    key: &str,
    value: RawValue,
  ) -> Result<(), VmError> {
    self.object_mut(obj)?.set_own(key, value)
  }

  // Scope arenas.

  /// Opens a new scope arena and returns its depth (1 for the outermost arena).
  pub(crate) fn enter_frame(&mut self) -> usize {
    self.frames.push(self.root_stack.len());
    self.frames.len()
  }

  /// Closes the scope arena opened at `depth` (and any arena still open above it), dropping every
  /// stack root they own.
  pub(crate) fn exit_frame(&mut self, depth: usize) {
    debug_assert_eq!(
      self.frames.len(),
      depth,
      "scope arenas must be closed in LIFO order"
    );
    if depth == 0 || depth > self.frames.len() {
      return;
    }
    let base = self.frames[depth - 1];
    self.frames.truncate(depth - 1);
    self.root_stack.truncate(base);
  }

  /// Number of stack roots owned by the innermost arena.
  pub(crate) fn frame_len(&self) -> usize {
    let base = self.frames.last().copied().unwrap_or(0);
    self.root_stack.len() - base
  }

  /// Pushes a stack root into the innermost arena.
  ///
  /// The returned value is the same as the input, allowing `let v = heap.push_root(v);`.
  pub(crate) fn push_root(&mut self, value: RawValue) -> RawValue {
    debug_assert!(self.debug_value_is_valid_or_primitive(value));
    self.root_stack.push(value);
    value
  }

  // Persistent roots.

  /// Adds a persistent root, keeping `value` live until the returned [`RootId`] is removed.
  pub fn add_root(&mut self, value: RawValue) -> RootId {
    debug_assert!(self.debug_value_is_valid_or_primitive(value));

    let idx = match self.persistent_roots_free.pop() {
      Some(idx) => idx as usize,
      None => {
        self.persistent_roots.push(None);
        self.persistent_roots.len() - 1
      }
    };
    debug_assert!(self.persistent_roots[idx].is_none());
    self.persistent_roots[idx] = Some(value);
    RootId(idx as u32)
  }

  pub(crate) fn release_queue(&self) -> ReleaseQueue {
    self.released_roots.clone()
  }

  /// Number of roots released by dropping a [`Root`](crate::Root) and not yet removed.
  pub fn queued_root_releases(&self) -> usize {
    self.released_roots.borrow().len()
  }

  pub fn get_root(&self, id: RootId) -> Option<RawValue> {
    self
      .persistent_roots
      .get(id.0 as usize)
      .and_then(|slot| *slot)
  }

  pub fn remove_root(&mut self, id: RootId) {
    let idx = id.0 as usize;
    debug_assert!(idx < self.persistent_roots.len(), "invalid RootId");
    if let Some(slot) = self.persistent_roots.get_mut(idx) {
      if slot.take().is_some() {
        self.persistent_roots_free.push(id.0);
      }
    }
  }

  fn debug_value_is_valid_or_primitive(&self, value: RawValue) -> bool {
    match value {
      RawValue::String(s) => self.is_valid_string(s),
      RawValue::Object(o) => self.is_valid_object(o),
      _ => true,
    }
  }

  /// Runs a GC cycle.
  ///
  /// Traces the root stack, the persistent roots, and `extra_roots` (engine state that lives
  /// outside the heap, such as a pending exception).
  pub(crate) fn collect_garbage(&mut self, extra_roots: &[RawValue]) {
    self.gc_runs += 1;

    let released = std::mem::take(&mut *self.released_roots.borrow_mut());
    for id in &released {
      self.remove_root(*id);
    }

    // Mark.
    {
      let slots = &self.slots;
      let marks = &mut self.marks[..];
      let mut tracer = Tracer::new(slots, marks);
      for value in &self.root_stack {
        tracer.trace_value(*value);
      }
      for value in self.persistent_roots.iter().flatten() {
        tracer.trace_value(*value);
      }
      for value in extra_roots {
        tracer.trace_value(*value);
      }

      while let Some(id) = tracer.work.pop() {
        let Some(idx) = tracer.validate(id) else {
          debug_assert!(false, "stale heap id reached during tracing: {id:?}");
          continue;
        };
        if tracer.marks[idx] != 0 {
          continue;
        }
        tracer.marks[idx] = 1;

        if let Some(HeapObject::Object(data)) = tracer.slots[idx].value.as_ref() {
          data.trace(&mut tracer);
        }
      }
    }

    // Sweep.
    for (idx, slot) in self.slots.iter_mut().enumerate() {
      let marked = self.marks[idx] != 0;
      self.marks[idx] = 0;

      if slot.value.is_none() || marked {
        continue;
      }

      slot.value = None;
      slot.generation = slot.generation.wrapping_add(1);
      self.live -= 1;
      self.free_list.push(idx as u32);
    }

    tracing::trace!(
      gc_runs = self.gc_runs,
      live = self.live,
      released_roots = released.len(),
      "bridge_js.collect_garbage"
    );
  }
}

pub(crate) struct Tracer<'a> {
  slots: &'a [Slot],
  marks: &'a mut [u8],
  work: Vec<HeapId>,
}

impl<'a> Tracer<'a> {
  fn new(slots: &'a [Slot], marks: &'a mut [u8]) -> Self {
    Self {
      slots,
      marks,
      work: Vec::new(),
    }
  }

  fn validate(&self, id: HeapId) -> Option<usize> {
    let idx = id.index() as usize;
    let slot = self.slots.get(idx)?;
    (slot.generation == id.generation() && slot.value.is_some()).then_some(idx)
  }

  pub(crate) fn trace_value(&mut self, value: RawValue) {
    match value {
      RawValue::String(s) => self.work.push(s.0),
      RawValue::Object(o) => self.work.push(o.0),
      _ => {}
    }
  }
}
