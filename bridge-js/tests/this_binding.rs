use bridge_js::{
  BridgeResult, Cx, FunctionContext, FunctionOptions, Handle, JsArray, JsFunction, JsNumber,
  JsObject, JsResult, JsString, JsUndefined, JsValue, Runtime, ThisMode, UncaughtException,
};

fn return_this<'a>(cx: FunctionContext<'a>) -> JsResult<'a, JsValue> {
  Ok(cx.this_value())
}

/// `[prototype or null, hasOwn("toString"), this.toString or undefined]` for `this` coerced to an
/// object.
fn describe_this<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsArray> {
  let this = cx.this_object();
  let prototype: Handle<JsValue> = match this.prototype(&mut cx)? {
    Some(proto) => proto.upcast(),
    None => cx.null().upcast(),
  };
  let has_own = this.has_own_property(&mut cx, "toString")?;
  let has_own = cx.boolean(has_own).upcast();
  let property = match this.get_property(&mut cx, "toString")? {
    Some(value) => value,
    None => cx.undefined().upcast(),
  };
  Ok(JsArray::from_values(&mut cx, &[prototype, has_own, property]))
}

fn functions<'a>(cx: &mut Cx<'a>) -> BridgeResult<(Handle<'a, JsFunction>, Handle<'a, JsFunction>)> {
  let strict = JsFunction::new(cx, return_this)?;
  let sloppy = JsFunction::with_options(cx, FunctionOptions::new().this_mode(ThisMode::Sloppy), return_this)?;
  Ok((strict, sloppy))
}

fn prototype_of<'a>(cx: &mut Cx<'a>, constructor: &str) -> BridgeResult<Handle<'a, JsObject>> {
  let ctor = cx.global::<JsFunction>(constructor)?;
  ctor.get::<JsObject>(cx, "prototype")
}

#[test]
fn nullish_this() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let (strict, sloppy) = functions(&mut cx)?;
    let global = cx.global_object();
    let undefined = cx.undefined();
    let null = cx.null();

    let r = strict.call(&mut cx, undefined, &[])?;
    assert!(r.is_a::<JsUndefined>(&cx));
    let r = strict.call(&mut cx, null, &[])?;
    assert!(r.strict_equals(&cx, null));

    let r = sloppy.call(&mut cx, undefined, &[])?;
    assert!(r.strict_equals(&cx, global));
    let r = sloppy.call(&mut cx, null, &[])?;
    assert!(r.strict_equals(&cx, global));
    Ok(())
  })
}

#[test]
fn primitive_this() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let (strict, sloppy) = functions(&mut cx)?;
    let n = cx.number(42);
    let s = cx.string("hello");
    let b = cx.boolean(true);

    let r = strict.call(&mut cx, n, &[])?.downcast_or_throw::<JsNumber>(&mut cx)?;
    assert_eq!(r.value(&cx), 42.0);
    let r = strict.call(&mut cx, s, &[])?.downcast_or_throw::<JsString>(&mut cx)?;
    assert_eq!(r.value(&cx), "hello");

    let boxed = sloppy.call(&mut cx, n, &[])?.downcast_or_throw::<JsObject>(&mut cx)?;
    assert!(!boxed.is_a::<JsNumber>(&cx));
    let number_prototype = prototype_of(&mut cx, "Number")?;
    let proto = boxed.prototype(&mut cx)?.expect("wrapper has a prototype");
    assert!(proto.strict_equals(&cx, number_prototype));
    assert_eq!(boxed.to_rust_string(&mut cx)?, "42");

    // Each call boxes afresh.
    let again = sloppy.call(&mut cx, n, &[])?;
    assert!(!again.strict_equals(&cx, boxed));

    let boxed = sloppy.call(&mut cx, s, &[])?.downcast_or_throw::<JsObject>(&mut cx)?;
    let string_prototype = prototype_of(&mut cx, "String")?;
    let proto = boxed.prototype(&mut cx)?.expect("wrapper has a prototype");
    assert!(proto.strict_equals(&cx, string_prototype));
    assert_eq!(boxed.to_rust_string(&mut cx)?, "hello");

    let boxed = sloppy.call(&mut cx, b, &[])?.downcast_or_throw::<JsObject>(&mut cx)?;
    assert_eq!(boxed.to_rust_string(&mut cx)?, "true");
    Ok(())
  })
}

#[test]
fn object_this_passes_through() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let (strict, sloppy) = functions(&mut cx)?;
    let obj = cx.empty_object();
    let r = strict.call(&mut cx, obj, &[])?;
    assert!(r.strict_equals(&cx, obj));
    let r = sloppy.call(&mut cx, obj, &[])?;
    assert!(r.strict_equals(&cx, obj));
    Ok(())
  })
}

#[test]
fn assume_this_is_an_object() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let describe = JsFunction::new(&mut cx, describe_this)?;
    let object_prototype = prototype_of(&mut cx, "Object")?;
    let number_prototype = prototype_of(&mut cx, "Number")?;
    let number_to_string = number_prototype.get::<JsFunction>(&mut cx, "toString")?;

    // Object.create(null)
    let null_object = JsObject::with_prototype(&mut cx, None);
    let triple = describe
      .call(&mut cx, null_object, &[])?
      .downcast_or_throw::<JsArray>(&mut cx)?
      .to_vec(&mut cx);
    assert!(triple[0].is_a::<bridge_js::JsNull>(&cx));
    assert!(!triple[1].downcast_or_throw::<bridge_js::JsBoolean>(&mut cx)?.value(&cx));
    assert!(triple[2].is_a::<JsUndefined>(&cx));

    // 42
    let n = cx.number(42);
    let triple = describe
      .call(&mut cx, n, &[])?
      .downcast_or_throw::<JsArray>(&mut cx)?
      .to_vec(&mut cx);
    assert!(triple[0].strict_equals(&cx, number_prototype));
    assert!(!triple[1].downcast_or_throw::<bridge_js::JsBoolean>(&mut cx)?.value(&cx));
    assert!(triple[2].strict_equals(&cx, number_to_string));

    // { toString: 17 }
    let obj = cx.empty_object();
    let seventeen = cx.number(17);
    obj.set(&mut cx, "toString", seventeen)?;
    let triple = describe
      .call(&mut cx, obj, &[])?
      .downcast_or_throw::<JsArray>(&mut cx)?
      .to_vec(&mut cx);
    assert!(triple[0].strict_equals(&cx, object_prototype));
    assert!(triple[1].downcast_or_throw::<bridge_js::JsBoolean>(&mut cx)?.value(&cx));
    assert_eq!(triple[2].downcast_or_throw::<JsNumber>(&mut cx)?.value(&cx), 17.0);

    // undefined
    let undefined = cx.undefined();
    let global = cx.global_object();
    let this = JsFunction::new(&mut cx, |mut cx| Ok(cx.this_object()))?;
    let r = this.call(&mut cx, undefined, &[])?;
    assert!(r.strict_equals(&cx, global));
    Ok(())
  })
}

#[test]
fn this_as_checks_the_receiver_type() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let len = JsFunction::new(&mut cx, |mut cx| {
      let this = cx.this_as::<JsString>()?;
      let len = this.value(&cx).len();
      Ok(cx.number(len as f64))
    })?;
    let s = cx.string("four");
    let r = len.call(&mut cx, s, &[])?.downcast_or_throw::<JsNumber>(&mut cx)?;
    assert_eq!(r.value(&cx), 4.0);

    let n = cx.number(4);
    let err = cx.try_catch(|cx| len.call(cx, n, &[])).unwrap_err();
    assert_eq!(err.to_rust_string(&mut cx)?, "TypeError: failed to downcast number to string");
    Ok(())
  })
}
