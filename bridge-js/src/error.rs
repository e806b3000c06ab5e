/// Engine-internal failures.
///
/// These never reach native callers directly: the runtime turns them into thrown JavaScript
/// exceptions (usually `TypeError`/`RangeError`) at the point where they occur.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
  /// A GC id was used after the underlying allocation was freed (or the id is otherwise
  /// malformed).
  #[error("invalid handle")]
  InvalidHandle,

  /// Attempted to call a non-callable value.
  #[error("value is not a function")]
  NotCallable,

  /// Attempted to construct a non-constructable value.
  #[error("value is not a constructor")]
  NotConstructable,

  /// A prototype chain traversal exceeded a hard upper bound.
  #[error("prototype chain too deep")]
  PrototypeChainTooDeep,

  /// A call supplied more arguments than the runtime accepts.
  #[error("too many arguments")]
  TooManyArguments { count: usize, limit: usize },

  /// An array write would grow the dense element storage past
  /// [`MAX_ARRAY_LENGTH`](crate::MAX_ARRAY_LENGTH).
  #[error("Invalid array length")]
  InvalidArrayLength { length: usize },

  /// Nested calls exceeded the configured call depth.
  #[error("Maximum call stack size exceeded")]
  StackOverflow { depth: usize },
}

/// A failed [`Handle::downcast`](crate::Handle::downcast).
///
/// Downcasting does not throw; convert this into a `TypeError` with
/// [`ResultExt::or_throw`](crate::ResultExt::or_throw).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("failed to downcast {from} to {to}")]
pub struct DowncastError {
  pub from: &'static str,
  pub to: &'static str,
}

impl DowncastError {
  pub(crate) fn new(from: &'static str, to: &'static str) -> Self {
    Self { from, to }
  }
}

/// A required argument was not supplied at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("missing argument {index} (called with {len} arguments)")]
pub struct ArgumentError {
  pub index: usize,
  pub len: usize,
}

/// An exception that escaped [`Runtime::execute`](crate::Runtime::execute).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("uncaught exception: {description}")]
pub struct UncaughtException {
  /// The thrown value's `name`, when it was an object carrying a string `name`.
  pub name: Option<String>,
  /// The thrown value's `message`, or its string form for non-error values.
  pub message: String,
  /// `ToString` of the thrown value (e.g. `"TypeError: boom"`).
  pub description: String,
}
