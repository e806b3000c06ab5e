use std::cell::Cell;
use std::rc::Rc;

use bridge_js::{
  FunctionContext, JsError, JsFunction, JsNumber, JsResult, JsString, Runtime, RuntimeOptions,
  UncaughtException,
};

fn count_arguments<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsNumber> {
  let len = cx.len();
  Ok(cx.number(len as f64))
}

#[test]
fn defaults() {
  let options = RuntimeOptions::default();
  assert_eq!(options.module_name, "bridge-js");
  assert_eq!(options.max_arguments, 65_535);
  assert_eq!(options.max_call_depth, 1024);
  assert_eq!(Runtime::new().options(), &options);
}

#[test]
fn parses_partial_json() {
  let options = RuntimeOptions::from_json_str(r#"{ "module_name": "addon" }"#).unwrap();
  assert_eq!(options.module_name, "addon");
  assert_eq!(options.max_arguments, RuntimeOptions::default().max_arguments);

  let options = RuntimeOptions::from_json_str(r#"{ "max_call_depth": 8, "max_arguments": 2 }"#).unwrap();
  assert_eq!(options.module_name, "bridge-js");
  assert_eq!(options.max_call_depth, 8);
  assert_eq!(options.max_arguments, 2);

  let round_trip = serde_json::to_string(&options).unwrap();
  assert_eq!(RuntimeOptions::from_json_str(&round_trip).unwrap(), options);
}

#[test]
fn rejects_invalid_json() {
  assert!(RuntimeOptions::from_json_str("{ \"max_arguments\": -1 }").is_err());
  assert!(RuntimeOptions::from_json_str("not json").is_err());
}

#[test]
fn argument_limit() -> Result<(), UncaughtException> {
  let mut rt = Runtime::with_options(RuntimeOptions {
    max_arguments: 2,
    ..RuntimeOptions::default()
  });
  rt.execute(|mut cx| {
    let f = JsFunction::new(&mut cx, count_arguments)?;
    let one = cx.number(1);

    let two = f.call_with().args((one, one)).apply::<JsNumber>(&mut cx)?;
    assert_eq!(two.value(&cx), 2.0);

    let err = cx
      .try_catch(|cx| f.call_with().args((one, one, one)).apply::<JsNumber>(cx))
      .unwrap_err();
    assert_eq!(err.to_rust_string(&mut cx)?, "RangeError: too many arguments");

    // A bound prefix counts towards the limit.
    let bound = f.bind(&mut cx, one, (one, one))?;
    let err = cx.try_catch(|cx| bound.call(cx, one, &[one.upcast()])).unwrap_err();
    assert!(err.is_a::<JsError>(&cx));
    Ok(())
  })
}

#[test]
fn call_depth_limit() {
  let depth = Rc::new(Cell::new(0));
  let mut rt = Runtime::with_options(RuntimeOptions {
    max_call_depth: 8,
    ..RuntimeOptions::default()
  });
  let reached = depth.clone();
  let err = rt
    .execute(move |mut cx| {
      let recurse = JsFunction::new(&mut cx, move |mut cx| {
        reached.set(reached.get() + 1);
        let callee = cx.callee();
        let undefined = cx.undefined();
        callee.call(&mut cx, undefined, &[])
      })?;
      let undefined = cx.undefined();
      recurse.exec(&mut cx, undefined, &[])
    })
    .unwrap_err();
  assert_eq!(depth.get(), 8);
  assert_eq!(err.name.as_deref(), Some("RangeError"));
  assert_eq!(err.message, "Maximum call stack size exceeded");

  // The depth counter unwinds with the calls.
  let r = rt.execute(|mut cx| {
    let f = JsFunction::new(&mut cx, |mut cx| Ok(cx.string("fine")))?;
    let undefined = cx.undefined();
    let s = f.call(&mut cx, undefined, &[])?.downcast_or_throw::<JsString>(&mut cx)?;
    Ok(s.value(&cx))
  });
  assert_eq!(r.unwrap(), "fine");
}
