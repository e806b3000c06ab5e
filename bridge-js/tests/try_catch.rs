use bridge_js::{
  Cx, ExceptionState, FunctionContext, Handle, JsError, JsFunction, JsNumber, JsObject, JsResult,
  JsString, JsValue, ResultExt, Root, Runtime, UncaughtException,
};

/// Throws its first argument.
fn throw_argument<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  let value = match cx.argument(0) {
    Some(value) => value,
    None => cx.undefined().upcast(),
  };
  cx.throw(value)
}

fn throw_once<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  let once = cx.string("once");
  cx.throw(once)
}

/// Wraps `inner` in a function that calls it, catches the thrown string and rethrows it with
/// `suffix` appended.
fn catch_and_append<'a>(
  cx: &mut Cx<'a>,
  inner: Handle<'_, JsFunction>,
  suffix: &'static str,
) -> JsResult<'a, JsFunction> {
  let inner = Root::new(cx, &inner);
  JsFunction::new(cx, move |mut cx| {
    let inner = inner.to_inner(&mut cx);
    let undefined = cx.undefined();
    match cx.try_catch(|cx| inner.call(cx, undefined, &[])) {
      Ok(value) => Ok(value),
      Err(err) => {
        let story = err.downcast_or_throw::<JsString>(&mut cx)?.value(&cx);
        let story = cx.string(format!("{story}{suffix}"));
        cx.throw(story)
      }
    }
  })
}

#[test]
fn caught_values_keep_their_identity() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let thrower = JsFunction::new(&mut cx, throw_argument)?;
    let undefined = cx.undefined();
    let values = [
      cx.empty_object().upcast::<JsValue>(),
      cx.number(17).upcast(),
      cx.string("thrown").upcast(),
      cx.null().upcast(),
      cx.error("an error")?.upcast(),
    ];
    for value in values {
      let caught = cx.try_catch(|cx| thrower.call(cx, undefined, &[value])).unwrap_err();
      assert!(caught.strict_equals(&cx, value));
      assert_eq!(caught.type_name(&cx), value.type_name(&cx));
      assert_eq!(cx.exception_state(), ExceptionState::Clear);
    }
    Ok(())
  })
}

#[test]
fn try_catch_returns_native_results() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let n = cx.try_catch(|_| Ok(42u32)).unwrap();
    assert_eq!(n, 42);

    let words = cx
      .try_catch(|cx| {
        let s = cx.string("plain data");
        Ok(s.value(cx).split(' ').map(str::to_owned).collect::<Vec<_>>())
      })
      .unwrap();
    assert_eq!(words, ["plain", "data"]);
    assert_eq!(cx.exception_state(), ExceptionState::Clear);
    Ok(())
  })
}

#[test]
fn exceptions_accumulate_through_nested_catches() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let once = JsFunction::new(&mut cx, throw_once)?;
    let upon = catch_and_append(&mut cx, once, " upon")?;
    let a = catch_and_append(&mut cx, upon, " a")?;
    let time = catch_and_append(&mut cx, a, " time")?;

    let undefined = cx.undefined();
    let err = cx.try_catch(|cx| time.call(cx, undefined, &[])).unwrap_err();
    let story = err.downcast_or_throw::<JsString>(&mut cx)?;
    assert_eq!(story.value(&cx), "once upon a time");
    assert_eq!(cx.exception_state(), ExceptionState::Clear);
    Ok(())
  })
}

#[test]
fn rethrow_preserves_the_value() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let thrower = JsFunction::new(&mut cx, throw_argument)?;
    let undefined = cx.undefined();
    let obj = cx.empty_object();

    let outer = cx
      .try_catch(|cx| {
        let err = cx
          .try_catch(|cx| thrower.call(cx, undefined, &[obj.upcast()]))
          .unwrap_err();
        assert!(err.strict_equals(cx, obj));
        assert_eq!(cx.exception_state(), ExceptionState::Clear);
        cx.throw::<_, ()>(err)
      })
      .unwrap_err();
    assert!(outer.strict_equals(&cx, obj));

    // `or_throw` rethrows a caught value unchanged.
    let outer = cx
      .try_catch(|cx| {
        let caught = cx.try_catch(|cx| thrower.call(cx, undefined, &[obj.upcast()]));
        caught.or_throw(cx)
      })
      .unwrap_err();
    assert!(outer.strict_equals(&cx, obj));
    assert_eq!(cx.exception_state(), ExceptionState::Clear);
    Ok(())
  })
}

#[test]
fn the_last_throw_wins() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let err = cx
      .try_catch(|cx| {
        let first = cx.number(1);
        let second = cx.number(2);
        let _ = cx.throw::<_, ()>(first);
        cx.throw::<_, ()>(second)
      })
      .unwrap_err();
    assert_eq!(err.downcast_or_throw::<JsNumber>(&mut cx)?.value(&cx), 2.0);
    Ok(())
  })
}

#[test]
fn returning_normally_with_a_pending_exception_is_a_throw() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let err = cx
      .try_catch(|cx| {
        let _ = cx.throw_range_error::<_, ()>("swallowed");
        Ok(1)
      })
      .unwrap_err();
    assert_eq!(err.to_rust_string(&mut cx)?, "RangeError: swallowed");

    // The same holds for a native function that ignores its own throw.
    let sloppy = JsFunction::new(&mut cx, |mut cx| {
      let _ = cx.throw_error::<_, ()>("ignored");
      Ok(cx.undefined())
    })?;
    let undefined = cx.undefined();
    let err = cx.try_catch(|cx| sloppy.call(cx, undefined, &[])).unwrap_err();
    assert_eq!(err.to_rust_string(&mut cx)?, "Error: ignored");
    Ok(())
  })
}

#[test]
fn errors_created_natively_are_catchable() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let err = cx.try_catch(|cx| {
      let err = JsError::type_error(cx, "wrong type")?;
      cx.throw::<_, ()>(err)
    });
    let err = err.unwrap_err().downcast_or_throw::<JsError>(&mut cx)?;
    let type_error = cx.global::<JsFunction>("TypeError")?;
    let prototype = type_error.get::<JsObject>(&mut cx, "prototype")?;
    let proto = err.prototype(&mut cx)?.expect("error has a prototype");
    assert!(proto.strict_equals(&cx, prototype));
    assert_eq!(err.get::<JsString>(&mut cx, "message")?.value(&cx), "wrong type");
    assert_eq!(err.get::<JsString>(&mut cx, "name")?.value(&cx), "TypeError");
    Ok(())
  })
}

#[test]
fn uncaught_error_is_reported() {
  let mut rt = Runtime::new();
  let err = rt
    .execute(|mut cx| cx.throw_type_error::<_, ()>("boom"))
    .unwrap_err();
  assert_eq!(
    err,
    UncaughtException {
      name: Some("TypeError".to_string()),
      message: "boom".to_string(),
      description: "TypeError: boom".to_string(),
    }
  );
  assert_eq!(err.to_string(), "uncaught exception: TypeError: boom");
  assert_eq!(rt.exception_state(), ExceptionState::Clear);
}

#[test]
fn uncaught_primitive_is_reported() {
  let mut rt = Runtime::new();
  let err = rt
    .execute(|mut cx| {
      let n = cx.number(42);
      cx.throw::<_, ()>(n)
    })
    .unwrap_err();
  assert_eq!(err.name, None);
  assert_eq!(err.message, "42");
  assert_eq!(err.description, "42");

  // The runtime stays usable.
  let n = rt.execute(|mut cx| Ok(cx.number(1).value(&cx))).unwrap();
  assert_eq!(n, 1.0);
}

#[test]
fn exception_escaping_a_native_call_is_uncaught() {
  let mut rt = Runtime::new();
  let err = rt
    .execute(|mut cx| {
      let thrower = JsFunction::new(&mut cx, throw_argument)?;
      let undefined = cx.undefined();
      let msg = cx.string("escaped");
      thrower.exec(&mut cx, undefined, &[msg.upcast()])
    })
    .unwrap_err();
  assert_eq!(err.description, "escaped");
}
