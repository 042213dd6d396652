//! Default environment: arithmetic and comparison callbacks.
//!
//! One callback body serves several names, dispatched on the registered
//! entry's flags. Integer arithmetic wraps; an operation mixing an int
//! with a float promotes to float.

use tracing::trace;

use sprig_ir::Value;

use crate::env::{EnvFlags, EnvTable, NativeCtx};
use crate::error::ExecError;
use crate::exec::ExecState;

/// Install `+ - * / < > =` into `env`.
pub fn install(env: &mut EnvTable) -> Result<(), ExecError> {
    let b = EnvFlags::BUILTIN;
    env.register("+", arithmetic, None, b | EnvFlags::ARI_ADD)?;
    env.register("-", arithmetic, None, b | EnvFlags::ARI_SUB)?;
    env.register("*", arithmetic, None, b | EnvFlags::ARI_MUL)?;
    env.register("/", arithmetic, None, b | EnvFlags::ARI_DIV)?;
    env.register("<", comparison, None, b | EnvFlags::CMP_LT)?;
    env.register(">", comparison, None, b | EnvFlags::CMP_GT)?;
    env.register("=", comparison, None, b | EnvFlags::CMP_EQ)?;
    Ok(())
}

fn pop_args(exec: &mut ExecState, argc: usize) -> Result<Vec<Value>, ExecError> {
    let mut args = vec![Value::Bool(false); argc];
    for slot in args.iter_mut().rev() {
        *slot = exec.pop()?;
    }
    Ok(args)
}

fn as_f32(value: Value) -> Result<f32, ExecError> {
    match value {
        Value::Int(i) => Ok(i as f32),
        Value::Float(f) => Ok(f),
        other => Err(ExecError::TypeMismatch {
            expected: "number",
            got: other.kind(),
        }),
    }
}

fn arithmetic(exec: &mut ExecState, ctx: NativeCtx<'_>) -> Result<(), ExecError> {
    // `+` and `*` fold any number of arguments; `-` and `/` are binary.
    let binary = ctx.flags.intersects(EnvFlags::ARI_SUB | EnvFlags::ARI_DIV);
    let min = if binary { 2 } else { 1 };
    if ctx.argc < min || (binary && ctx.argc != 2) {
        return Err(ExecError::ArityMismatch {
            name: ctx.name().to_owned(),
            expected: min,
            got: ctx.argc,
        });
    }
    let args = pop_args(exec, ctx.argc)?;
    trace!(name = ctx.name(), argc = ctx.argc, "arithmetic");

    let mut acc = args[0];
    for &arg in &args[1..] {
        acc = match (acc, arg) {
            (Value::Int(a), Value::Int(b)) => {
                if ctx.flags.contains(EnvFlags::ARI_ADD) {
                    Value::Int(a.wrapping_add(b))
                } else if ctx.flags.contains(EnvFlags::ARI_SUB) {
                    Value::Int(a.wrapping_sub(b))
                } else if ctx.flags.contains(EnvFlags::ARI_MUL) {
                    Value::Int(a.wrapping_mul(b))
                } else {
                    Value::Int(a.checked_div(b).ok_or(ExecError::TypeMismatch {
                        expected: "non-zero divisor",
                        got: "int",
                    })?)
                }
            }
            _ => {
                let a = as_f32(acc)?;
                let b = as_f32(arg)?;
                if ctx.flags.contains(EnvFlags::ARI_ADD) {
                    Value::Float(a + b)
                } else if ctx.flags.contains(EnvFlags::ARI_SUB) {
                    Value::Float(a - b)
                } else if ctx.flags.contains(EnvFlags::ARI_MUL) {
                    Value::Float(a * b)
                } else {
                    Value::Float(a / b)
                }
            }
        };
    }
    // Single-argument `+`/`*` still type-check their argument.
    if args.len() == 1 {
        as_f32(acc)?;
    }
    exec.push(acc);
    Ok(())
}

fn comparison(exec: &mut ExecState, ctx: NativeCtx<'_>) -> Result<(), ExecError> {
    if ctx.argc != 2 {
        return Err(ExecError::ArityMismatch {
            name: ctx.name().to_owned(),
            expected: 2,
            got: ctx.argc,
        });
    }
    let args = pop_args(exec, 2)?;
    trace!(name = ctx.name(), "comparison");

    let result = match (args[0], args[1]) {
        (Value::Int(a), Value::Int(b)) => {
            if ctx.flags.contains(EnvFlags::CMP_LT) {
                a < b
            } else if ctx.flags.contains(EnvFlags::CMP_GT) {
                a > b
            } else {
                a == b
            }
        }
        (a, b) => {
            let a = as_f32(a)?;
            let b = as_f32(b)?;
            if ctx.flags.contains(EnvFlags::CMP_LT) {
                a < b
            } else if ctx.flags.contains(EnvFlags::CMP_GT) {
                a > b
            } else {
                (a - b).abs() <= f32::EPSILON
            }
        }
    };
    exec.push(Value::Bool(result));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvTarget;
    use crate::exec::StepResult;
    use pretty_assertions::assert_eq;
    use sprig_parse::parse;

    fn eval(source: &str) -> StepResult {
        let program = parse(source).unwrap();
        let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();
        exec.run(&program, 10_000)
    }

    #[test]
    fn addition_folds_all_arguments() {
        assert_eq!(eval("(+ 1 2 3 4)"), StepResult::Done(Value::Int(10)));
    }

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        assert_eq!(eval("(+ 1 0.5)"), StepResult::Done(Value::Float(1.5)));
    }

    #[test]
    fn subtraction_is_binary() {
        assert_eq!(eval("(- 10 4)"), StepResult::Done(Value::Int(6)));
        assert_eq!(
            eval("(- 10 4 1)"),
            StepResult::Error(ExecError::ArityMismatch {
                name: "-".to_owned(),
                expected: 2,
                got: 3,
            })
        );
    }

    #[test]
    fn integer_division_truncates() {
        assert_eq!(eval("(/ 7 2)"), StepResult::Done(Value::Int(3)));
    }

    #[test]
    fn division_by_integer_zero_fails() {
        assert_eq!(
            eval("(/ 1 0)"),
            StepResult::Error(ExecError::TypeMismatch {
                expected: "non-zero divisor",
                got: "int",
            })
        );
    }

    #[test]
    fn comparisons_yield_bools() {
        assert_eq!(eval("(< 1 2)"), StepResult::Done(Value::Bool(true)));
        assert_eq!(eval("(> 1 2)"), StepResult::Done(Value::Bool(false)));
        assert_eq!(eval("(= 3 3)"), StepResult::Done(Value::Bool(true)));
    }

    #[test]
    fn arithmetic_rejects_non_numbers() {
        assert_eq!(
            eval("(+ 1 \"two\")"),
            StepResult::Error(ExecError::TypeMismatch {
                expected: "number",
                got: "string",
            })
        );
    }
}
