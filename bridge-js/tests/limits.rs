use std::cell::Cell;
use std::rc::Rc;

use bridge_js::{
  BridgeResult, FunctionContext, FunctionOptions, JsFunction, JsNumber, JsObject, JsResult,
  Runtime, RuntimeOptions, UncaughtException, MAX_ARRAY_LENGTH,
};

fn count_arguments<'a>(mut cx: FunctionContext<'a>) -> JsResult<'a, JsNumber> {
  let len = cx.len();
  Ok(cx.number(len as f64))
}

#[test]
fn long_bind_chains_stay_one_hop_deep() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let target = JsFunction::with_options(
      &mut cx,
      FunctionOptions::new().name("count").length(2),
      count_arguments,
    )?;
    let undefined = cx.undefined();
    let one = cx.number(1);

    let mut f = target;
    for _ in 0..100_000 {
      f = f.bind(&mut cx, undefined, ())?;
    }
    assert_eq!(f.name(&mut cx)?, "bound count");
    assert_eq!(f.get::<JsNumber>(&mut cx, "length")?.value(&cx), 2.0);

    let count = f
      .call(&mut cx, undefined, &[one.upcast()])?
      .downcast_or_throw::<JsNumber>(&mut cx)?;
    assert_eq!(count.value(&cx), 1.0);

    let instance = f.construct(&mut cx, &[])?;
    let proto = instance.prototype(&mut cx)?.expect("instance prototype");
    let target_proto = target.get::<JsObject>(&mut cx, "prototype")?;
    assert!(proto.strict_equals(&cx, target_proto));
    Ok(())
  })
}

#[test]
fn bound_prefixes_are_capped_at_bind_time() {
  let mut rt = Runtime::with_options(RuntimeOptions {
    max_arguments: 16,
    ..RuntimeOptions::default()
  });
  let binds = Rc::new(Cell::new(0));
  let counted = binds.clone();
  let err = rt
    .execute(move |mut cx| -> BridgeResult<()> {
      let mut f = JsFunction::new(&mut cx, count_arguments)?;
      let undefined = cx.undefined();
      let one = cx.number(1);
      loop {
        f = f.bind(&mut cx, undefined, (one, one, one))?;
        counted.set(counted.get() + 1);
      }
    })
    .unwrap_err();
  assert_eq!(binds.get(), 5);
  assert_eq!(err.description, "RangeError: too many arguments");
}

#[test]
fn default_call_depth_throws_before_the_stack_runs_out() {
  let depth = Rc::new(Cell::new(0));
  let reached = depth.clone();
  let mut rt = Runtime::new();
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
  assert_eq!(depth.get(), rt.options().max_call_depth);
  assert_eq!(err.description, "RangeError: Maximum call stack size exceeded");
}

#[test]
fn oversized_array_writes_throw() -> Result<(), UncaughtException> {
  let mut rt = Runtime::new();
  rt.execute(|mut cx| {
    let arr = cx.empty_array();
    let one = cx.number(1);

    let err = cx.try_catch(|cx| arr.set(cx, "4294967294", one)).unwrap_err();
    assert_eq!(err.to_rust_string(&mut cx)?, "RangeError: Invalid array length");

    let huge = cx.number(4e9);
    let err = cx.try_catch(|cx| arr.set(cx, "length", huge)).unwrap_err();
    assert_eq!(err.to_rust_string(&mut cx)?, "RangeError: Invalid array length");

    let past_cap = MAX_ARRAY_LENGTH.to_string();
    assert!(cx.try_catch(|cx| arr.set(cx, &past_cap, one)).is_err());
    assert_eq!(arr.len(&cx), 0);

    arr.set(&mut cx, "2", one)?;
    assert_eq!(arr.len(&cx), 3);
    let three = cx.number(3);
    arr.set(&mut cx, "length", three)?;
    assert_eq!(arr.len(&cx), 3);
    Ok(())
  })
}
