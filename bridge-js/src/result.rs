//! Result types for operations that may throw a JavaScript exception.
//!
//! When a bridge operation throws, the thrown value is stored in the runtime's exception slot and
//! the operation returns `Err(Throw)`. [`Throw`] carries no data and cannot be constructed outside
//! the crate: the only way to get one is to actually throw, so a `Throw` in hand always means an
//! exception is pending (or a panic is being converted).

use core::fmt;
use core::marker::PhantomData;

use crate::error::{ArgumentError, DowncastError};
use crate::{Cx, Handle, Value};

/// A marker proving that a JavaScript exception is pending in the runtime.
#[derive(Debug)]
pub struct Throw(PhantomData<*mut ()>);

impl Throw {
  pub(crate) fn new() -> Self {
    Self(PhantomData)
  }
}

impl fmt::Display for Throw {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("JavaScript Error")
  }
}

impl std::error::Error for Throw {}

/// The result of a computation that might throw a JavaScript exception.
pub type BridgeResult<T> = Result<T, Throw>;

/// Shorthand for a [`BridgeResult`] that produces a [`Handle`].
pub type JsResult<'a, T> = BridgeResult<Handle<'a, T>>;

/// Converts local errors into thrown JavaScript exceptions.
pub trait ResultExt<T> {
  fn or_throw(self, cx: &mut Cx<'_>) -> BridgeResult<T>;
}

impl<T> ResultExt<T> for Result<T, DowncastError> {
  fn or_throw(self, cx: &mut Cx<'_>) -> BridgeResult<T> {
    self.or_else(|err| cx.throw_type_error(err.to_string()))
  }
}

impl<T> ResultExt<T> for Result<T, ArgumentError> {
  fn or_throw(self, cx: &mut Cx<'_>) -> BridgeResult<T> {
    self.or_else(|err| cx.throw_type_error(err.to_string()))
  }
}

/// Rethrows a value caught by [`Cx::try_catch`].
impl<'a, 'b, T: Value, E: Value> ResultExt<Handle<'a, T>> for Result<Handle<'a, T>, Handle<'b, E>> {
  fn or_throw(self, cx: &mut Cx<'_>) -> JsResult<'a, T> {
    self.or_else(|err| cx.throw(err))
  }
}
