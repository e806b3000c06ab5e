use std::panic;

use bridge_js::{
  ExceptionState, FunctionContext, JsError, JsFunction, JsResult, JsString, JsValue, Runtime,
  RuntimeOptions, UncaughtException,
};

fn panics<'a>(_cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  panic!("boom")
}

fn throws_then_panics<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  let _ = cx.throw_type_error::<_, ()>("thrown first");
  panic!("boom")
}

fn panics_with_a_payload<'a>(_cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  panic::panic_any(17u8)
}

fn panics_with_a_formatted_message<'a>(cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  panic!("called with {} arguments", cx.len())
}

#[test]
fn panic_becomes_a_catchable_error() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let f = JsFunction::new(&mut cx, panics)?;
    let undefined = cx.undefined();
    let err = cx.try_catch(|cx| f.call(cx, undefined, &[])).unwrap_err();
    let err = err.downcast_or_throw::<JsError>(&mut cx)?;
    let expected = format!("internal error in {}: boom", cx.options().module_name);
    assert_eq!(expected, "internal error in bridge-js: boom");
    assert_eq!(err.get::<JsString>(&mut cx, "message")?.value(&cx), expected);
    assert_eq!(err.to_rust_string(&mut cx)?, format!("Error: {expected}"));
    assert_eq!(cx.exception_state(), ExceptionState::Clear);
    Ok(())
  })
}

#[test]
fn panic_replaces_a_pending_exception() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let f = JsFunction::new(&mut cx, throws_then_panics)?;
    let undefined = cx.undefined();
    let err = cx.try_catch(|cx| f.call(cx, undefined, &[])).unwrap_err();
    assert_eq!(err.to_rust_string(&mut cx)?, "Error: internal error in bridge-js: boom");
    Ok(())
  })
}

#[test]
fn panic_messages() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let payload = JsFunction::new(&mut cx, panics_with_a_payload)?;
    let formatted = JsFunction::new(&mut cx, panics_with_a_formatted_message)?;
    let undefined = cx.undefined();
    let one = cx.number(1);

    let err = cx.try_catch(|cx| payload.call(cx, undefined, &[])).unwrap_err();
    let message = err.downcast_or_throw::<JsError>(&mut cx)?.get::<JsString>(&mut cx, "message")?;
    assert_eq!(message.value(&cx), "internal error in bridge-js: unknown panic");

    let err = cx.try_catch(|cx| formatted.call(cx, undefined, &[one.upcast()])).unwrap_err();
    let message = err.downcast_or_throw::<JsError>(&mut cx)?.get::<JsString>(&mut cx, "message")?;
    assert_eq!(message.value(&cx), "internal error in bridge-js: called with 1 arguments");
    Ok(())
  })
}

#[test]
fn panic_names_the_configured_module() {
  let options = RuntimeOptions {
    module_name: "image-codec".to_string(),
    ..RuntimeOptions::default()
  };
  let mut rt = Runtime::with_options(options);
  let err = rt
    .execute(|mut cx| {
      let f = JsFunction::new(&mut cx, panics)?;
      let undefined = cx.undefined();
      f.exec(&mut cx, undefined, &[])
    })
    .unwrap_err();
  assert_eq!(err.name.as_deref(), Some("Error"));
  assert_eq!(err.message, "internal error in image-codec: boom");
}

#[test]
fn panic_inside_try_catch_is_not_caught_there() {
  let mut rt = Runtime::new();
  let err = rt
    .execute(|mut cx| {
      let caught = cx.try_catch(|_| -> Result<(), _> { panic!("inside try_catch") });
      // Unreachable: the panic unwinds past `try_catch`.
      assert!(caught.is_ok());
      Ok(())
    })
    .unwrap_err();
  assert_eq!(err.message, "internal error in bridge-js: inside try_catch");
  assert_eq!(rt.exception_state(), ExceptionState::Clear);
}

#[test]
fn panic_inside_try_catch_discards_the_pending_exception() {
  let mut rt = Runtime::new();
  let err = rt
    .execute(|mut cx| {
      cx.try_catch(|cx| -> Result<(), _> {
        let _ = cx.throw_error::<_, ()>("pending");
        panic!("boom")
      })
      .ok();
      Ok(())
    })
    .unwrap_err();
  assert_eq!(err.description, "Error: internal error in bridge-js: boom");
}

#[test]
fn scopes_and_depth_recover_after_a_panic() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  let depth_before = rt.heap().scope_depth();
  rt.execute(|mut cx| {
    let f = JsFunction::new(&mut cx, panics)?;
    let undefined = cx.undefined();
    let handles = cx.handle_count();
    for _ in 0..3 {
      let scope_depth = cx.scope_depth();
      cx.execute_scoped(|mut cx| {
        let _ = cx.try_catch(|cx| f.call(cx, undefined, &[]));
        assert_eq!(cx.exception_state(), ExceptionState::Clear);
      });
      assert_eq!(cx.scope_depth(), scope_depth);
      assert_eq!(cx.handle_count(), handles);
    }
    assert_eq!(cx.heap().scope_depth(), 1);
    Ok(())
  })?;
  assert_eq!(rt.heap().scope_depth(), depth_before);
  assert_eq!(rt.heap().root_stack_len(), 0);

  // Panics escaping `execute` leave nothing behind either.
  let _ = rt.execute(|_| -> Result<(), _> { panic!("outer") });
  assert_eq!(rt.heap().scope_depth(), depth_before);
  assert_eq!(rt.heap().root_stack_len(), 0);
  assert_eq!(rt.exception_state(), ExceptionState::Clear);
  Ok(())
}
