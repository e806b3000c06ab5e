//! A native/JavaScript function-invocation bridge.
//!
//! Native code talks to an in-process engine context ([`Runtime`]) through scope-bound handles. It
//! can create values, call, apply, bind and construct JavaScript functions, expose native
//! functions to JavaScript, and move exceptions across the boundary in both directions.
//!
//! # Scope arenas and handle lifetimes
//!
//! Every [`Handle`] is owned by a scope arena ([`Cx`]) and carries its lifetime, so using a handle
//! after its arena closed is a compile error. Arenas nest in LIFO order:
//! - [`Runtime::execute`] opens the outermost arena.
//! - Each native function invoked from JavaScript gets its own arena ([`FunctionContext`]), which
//!   owns `this` and the arguments.
//! - [`Cx::execute_scoped`] and [`Cx::compute_scoped`] open child arenas; the latter escapes exactly
//!   one result handle into the parent.
//!
//! Arenas are backed by a single root stack in the [`Heap`]. Closing an arena truncates the stack;
//! values that were only reachable from it are reclaimed by the next GC cycle, and stale ids are
//! detected through `{ index, generation }` checks ([`VmError::InvalidHandle`]). [`Root`] keeps an
//! object alive independently of any arena.
//!
//! # Exceptions and panics
//!
//! A thrown JavaScript value lives in the runtime's exception slot while a [`Throw`] marker travels
//! up the native stack in a `Result`. [`Cx::try_catch`] catches it. Panics never cross a native
//! boundary: they are converted into an `Error` with the message
//! `internal error in <module name>: <panic message>`, replacing any pending exception.

mod context;
mod error;
mod exception;
mod function;
mod handle;
mod heap;
mod intrinsics;
mod object;
mod result;
mod runtime;
mod types;
mod value;

pub use crate::context::CallContext;
pub use crate::context::CallKind;
pub use crate::context::Cx;
pub use crate::context::FunctionContext;
pub use crate::error::ArgumentError;
pub use crate::error::DowncastError;
pub use crate::error::UncaughtException;
pub use crate::error::VmError;
pub use crate::exception::ExceptionState;
pub use crate::function::Arguments;
pub use crate::function::CallOptions;
pub use crate::function::ConstructOptions;
pub use crate::function::FunctionOptions;
pub use crate::function::ThisMode;
pub use crate::handle::GcObject;
pub use crate::handle::GcString;
pub use crate::handle::Handle;
pub use crate::handle::HeapId;
pub use crate::handle::Root;
pub use crate::handle::RootId;
pub use crate::heap::Heap;
pub use crate::heap::MAX_PROTOTYPE_CHAIN;
pub use crate::intrinsics::ErrorKind;
pub use crate::intrinsics::Intrinsics;
pub use crate::object::MAX_ARRAY_LENGTH;
pub use crate::result::BridgeResult;
pub use crate::result::JsResult;
pub use crate::result::ResultExt;
pub use crate::result::Throw;
pub use crate::runtime::Runtime;
pub use crate::runtime::RuntimeOptions;
pub use crate::types::JsArray;
pub use crate::types::JsBoolean;
pub use crate::types::JsError;
pub use crate::types::JsFunction;
pub use crate::types::JsNull;
pub use crate::types::JsNumber;
pub use crate::types::JsObject;
pub use crate::types::JsString;
pub use crate::types::JsUndefined;
pub use crate::types::JsValue;
pub use crate::types::Object;
pub use crate::types::SuperType;
pub use crate::types::Value;
pub use crate::value::RawValue;
