//! End-to-end engine behavior: stepping, tail calls, native callbacks.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use sprig_eval::{EnvFlags, EnvTarget, ExecError, ExecState, NativeCtx, StepResult};
use sprig_ir::Value;
use sprig_parse::parse;

#[test]
fn define_binds_through_repeated_steps() {
    let program = parse("(define x 5)").unwrap();
    let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();

    let mut result = StepResult::Continue;
    for _ in 0..100 {
        result = exec.step(&program);
        if result != StepResult::Continue {
            break;
        }
    }
    assert_eq!(result, StepResult::Done(Value::Int(5)));
    assert_eq!(exec.env().borrow().lookup("x"), Some(Value::Int(5)));
}

#[test]
fn if_takes_exactly_one_branch() {
    let program = parse("(if (< 1 2) 10 20)").unwrap();
    let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();
    assert_eq!(exec.run(&program, 100), StepResult::Done(Value::Int(10)));

    let program = parse("(if (< 2 1) 10 20)").unwrap();
    let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();
    assert_eq!(exec.run(&program, 100), StepResult::Done(Value::Int(20)));
}

fn bump(exec: &mut ExecState, ctx: NativeCtx<'_>) -> Result<(), ExecError> {
    for _ in 0..ctx.argc {
        exec.pop()?;
    }
    if let Some(counter) = ctx
        .payload
        .as_ref()
        .and_then(|p| p.downcast_ref::<RefCell<i32>>())
    {
        *counter.borrow_mut() += 1;
    }
    exec.push(Value::Bool(true));
    Ok(())
}

#[test]
fn untaken_branch_side_effects_never_fire() {
    let program = parse("(if (< 1 2) 10 (bump))").unwrap();
    let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();
    let counter: Rc<dyn Any> = Rc::new(RefCell::new(0_i32));
    exec.env()
        .borrow_mut()
        .register("bump", bump, Some(counter.clone()), EnvFlags::empty())
        .unwrap();

    assert_eq!(exec.run(&program, 100), StepResult::Done(Value::Int(10)));
    let fired = counter.downcast_ref::<RefCell<i32>>().map(|c| *c.borrow());
    assert_eq!(fired, Some(0));
}

#[test]
fn tail_recursive_countdown_runs_in_constant_trace_space() {
    let src = "(define loop (lambda (n) (if (= n 0) 0 (loop (- n 1))))) (loop 100000)";
    let program = parse(src).unwrap();
    let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();

    let mut result = StepResult::Continue;
    while result == StepResult::Continue {
        result = exec.step(&program);
    }
    assert_eq!(result, StepResult::Done(Value::Int(0)));
    assert!(
        exec.trace_high_water() <= 2,
        "call trace grew to {}",
        exec.trace_high_water()
    );
}

#[test]
fn begin_visits_children_in_order_exactly_once() {
    let program = parse("(begin 1 2 3)").unwrap();
    let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();
    let form = program.node(program.root()).children[0];
    let children = program.node(form).children.clone();

    // Children complete left to right: at every suspension point, a
    // child is never ahead of the one before it.
    let mut result = exec.step(&program);
    while result == StepResult::Continue {
        for pair in children.windows(2) {
            assert!(exec.visits(pair[1]) <= exec.visits(pair[0]));
        }
        result = exec.step(&program);
    }
    assert_eq!(result, StepResult::Done(Value::Int(3)));
    for &child in &children {
        assert_eq!(exec.visits(child), 1);
    }
}

fn add(exec: &mut ExecState, ctx: NativeCtx<'_>) -> Result<(), ExecError> {
    assert_eq!(ctx.argc, 2);
    assert_eq!(ctx.name(), "add");
    // Arguments are on the stack in evaluation order, last on top.
    assert_eq!(exec.peek_at(0), Ok(Value::Int(3)));
    assert_eq!(exec.peek_at(1), Ok(Value::Int(2)));
    let b = exec.pop()?;
    let a = exec.pop()?;
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => {
            exec.push(Value::Int(a + b));
            Ok(())
        }
        _ => Err(ExecError::TypeMismatch {
            expected: "number",
            got: "other",
        }),
    }
}

#[test]
fn native_callback_sees_arg_count_and_stack() {
    let program = parse("(add 2 3)").unwrap();
    let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();
    exec.env()
        .borrow_mut()
        .register("add", add, None, EnvFlags::empty())
        .unwrap();
    assert_eq!(exec.run(&program, 100), StepResult::Done(Value::Int(5)));
}

#[test]
fn budget_exhaustion_reports_continue() {
    let src = "(define spin (lambda (n) (if (= n 0) 0 (spin (- n 1))))) (spin 100000)";
    let program = parse(src).unwrap();
    let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();
    assert_eq!(exec.run(&program, 10), StepResult::Continue);
    // The budget is a pause, not an abort.
    let mut result = StepResult::Continue;
    while result == StepResult::Continue {
        result = exec.run(&program, 10_000);
    }
    assert_eq!(result, StepResult::Done(Value::Int(0)));
}

#[test]
fn two_states_can_walk_one_program() {
    let program = parse("(+ 1 2)").unwrap();
    let mut a = ExecState::new(&program, EnvTarget::Local).unwrap();
    let mut b = ExecState::new(&program, EnvTarget::Local).unwrap();
    // Interleaved stepping: cursors are per-state, not per-AST.
    loop {
        let ra = a.step(&program);
        let rb = b.step(&program);
        assert_eq!(ra, rb);
        if ra != StepResult::Continue {
            assert_eq!(ra, StepResult::Done(Value::Int(3)));
            break;
        }
    }
}
