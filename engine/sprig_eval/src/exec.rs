//! The resumable tree-walking evaluator.
//!
//! No recursive `eval`: each [`ExecState::step`] performs one reduction
//! and returns, so a host can interleave script execution with its own
//! per-frame work. Resumability comes from two per-node vectors on the
//! execution state (visit count and next-child cursor) that record how
//! far the walk got into every node; re-entering `step()` descends the
//! cursors back to the suspension point.
//!
//! Self-tail-calls are eliminated: the frame's argument bindings and the
//! lambda subtree's cursors are rebuilt in place, so scripted loops run
//! indefinitely without stack or trace growth. Non-tail re-entry of an
//! already-active lambda snapshots the subtree's cursors and in-flight
//! call routing into a shadow frame and restores them when the inner
//! activation finishes, since a per-node cursor can only describe one
//! activation at a time.

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use sprig_ir::{Limits, NodeFlags, NodeId, Program, Value};

use crate::builtins;
use crate::env::{EnvTable, EnvTarget, SharedEnv};
use crate::error::ExecError;

/// Outcome of one [`ExecState::step`].
#[derive(Clone, Debug, PartialEq)]
pub enum StepResult {
    /// A reduction happened; call `step` again.
    Continue,
    /// The program finished with this value. Terminal: further `step`
    /// calls return the same result.
    Done(Value),
    /// Execution failed. Terminal as well.
    Error(ExecError),
}

/// Internal signal: did the stepped node finish, or hand control back
/// up the walk mid-way?
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Reduction {
    Complete,
    Preempt,
}

/// Saved cursors of one buried activation.
#[derive(Debug)]
struct ShadowFrame {
    lambda: NodeId,
    /// Call site of the activation that buried it; patched to
    /// value-delivered when the inner activation finishes.
    call: NodeId,
    saved: Vec<SavedCursor>,
}

#[derive(Debug)]
struct SavedCursor {
    node: NodeId,
    visit: u32,
    next: usize,
    /// In-flight callee routed through this node, if any. The same
    /// syntactic call site can be live in several buried activations
    /// (mutual recursion, a re-entered higher-order lambda), each with
    /// its own callee, so routing is part of the snapshot.
    in_flight: Option<NodeId>,
}

/// One in-flight execution of a [`Program`].
///
/// The program is borrowed per call, never stored: several states may
/// walk one program at once because every mutable cursor lives here.
#[derive(Debug)]
pub struct ExecState {
    stack: Vec<Value>,
    env: SharedEnv,
    /// Per-node visit counters, indexed by `NodeId`.
    visit_count: Vec<u32>,
    /// Per-node next-child cursors. For an application node with `k`
    /// children, `k` means ready-to-apply, `k + 1` means a lambda call
    /// is in flight, `k + 2` means its value is already on the stack.
    next_child: Vec<usize>,
    /// Lambda-entry chain of the current step's walk; rebuilt every
    /// step, so between steps it is empty.
    call_trace: Vec<NodeId>,
    trace_high_water: usize,
    /// Logical (non-tail) frames currently alive, bounded by
    /// `Limits::call_depth`.
    live_frames: usize,
    /// Live activation count per lambda node.
    active_calls: FxHashMap<NodeId, u32>,
    /// Call site -> lambda for every in-flight application of the
    /// walkable activations. Buried activations keep their routing
    /// entries inside their shadow frame.
    in_flight: FxHashMap<NodeId, NodeId>,
    shadow_frames: Vec<ShadowFrame>,
    outcome: Option<StepResult>,
    limits: Limits,
}

impl ExecState {
    /// Build a state for `program` with default limits.
    pub fn new(program: &Program, target: EnvTarget) -> Result<Self, ExecError> {
        Self::with_limits(program, target, Limits::default())
    }

    pub fn with_limits(
        program: &Program,
        target: EnvTarget,
        limits: Limits,
    ) -> Result<Self, ExecError> {
        let env = match target {
            EnvTarget::Local => {
                let mut table = EnvTable::new(limits.env_entries);
                builtins::install(&mut table)?;
                SharedEnv::new(table)
            }
            EnvTarget::Shared(env) => env,
        };
        Ok(ExecState {
            stack: Vec::new(),
            env,
            visit_count: vec![0; program.node_count()],
            next_child: vec![0; program.node_count()],
            call_trace: Vec::new(),
            trace_high_water: 0,
            live_frames: 0,
            active_calls: FxHashMap::default(),
            in_flight: FxHashMap::default(),
            shadow_frames: Vec::new(),
            outcome: None,
            limits,
        })
    }

    /// Perform one reduction.
    pub fn step(&mut self, program: &Program) -> StepResult {
        if let Some(out) = &self.outcome {
            return out.clone();
        }
        self.call_trace.clear();
        let out = match self.step_node(program, program.root()) {
            Ok(Reduction::Preempt) => return StepResult::Continue,
            Ok(Reduction::Complete) => match self.pop() {
                Ok(value) => StepResult::Done(value),
                Err(e) => StepResult::Error(e),
            },
            Err(e) => StepResult::Error(e),
        };
        debug!(outcome = ?out, "execution finished");
        self.outcome = Some(out.clone());
        out
    }

    /// Step up to `budget` reductions; `Continue` means the budget ran
    /// out first. The budget is the host's only cancellation mechanism.
    pub fn run(&mut self, program: &Program, budget: usize) -> StepResult {
        for _ in 0..budget {
            let result = self.step(program);
            if !matches!(result, StepResult::Continue) {
                return result;
            }
        }
        StepResult::Continue
    }

    // === host / native-callback surface ===

    /// Push a value on the evaluation stack.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pop the top of the evaluation stack.
    pub fn pop(&mut self) -> Result<Value, ExecError> {
        self.stack.pop().ok_or(ExecError::StackUnderflow)
    }

    /// Read `depth` values below the top without popping.
    pub fn peek_at(&self, depth: usize) -> Result<Value, ExecError> {
        self.stack
            .len()
            .checked_sub(depth + 1)
            .and_then(|i| self.stack.get(i))
            .copied()
            .ok_or(ExecError::StackUnderflow)
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// The environment this state binds into.
    pub fn env(&self) -> &SharedEnv {
        &self.env
    }

    /// Deepest lambda-entry chain any single step has walked.
    pub fn trace_high_water(&self) -> usize {
        self.trace_high_water
    }

    /// How many times a node has been stepped.
    pub fn visits(&self, node: NodeId) -> u32 {
        self.visit_count[node.index()]
    }

    // === the walk ===

    fn step_node(&mut self, program: &Program, n: NodeId) -> Result<Reduction, ExecError> {
        self.visit_count[n.index()] += 1;
        let flags = program.node(n).flags;
        trace!(node = n.index(), ?flags, visit = self.visit_count[n.index()], "step");

        if flags.contains(NodeFlags::STRING) {
            let value = program.node(n).token.map_or(Value::Bool(false), Value::Str);
            self.push(value);
            Ok(Reduction::Complete)
        } else if flags.contains(NodeFlags::LAMBDA) {
            // A lambda in value position: children stay unevaluated
            // until the closure is applied.
            self.push(Value::Lambda(n));
            Ok(Reduction::Complete)
        } else if flags.contains(NodeFlags::IF) {
            self.step_if(program, n)
        } else if flags.contains(NodeFlags::DEFINE) {
            self.step_define(program, n)
        } else if flags.contains(NodeFlags::BEGIN) {
            self.step_begin(program, n)
        } else {
            self.step_apply(program, n)
        }
    }

    fn step_if(&mut self, program: &Program, n: NodeId) -> Result<Reduction, ExecError> {
        let len = program.node(n).children.len();
        if !(2..=3).contains(&len) {
            return Err(ExecError::ArityMismatch {
                name: "if".to_owned(),
                expected: 3,
                got: len,
            });
        }
        match self.next_child[n.index()] {
            0 => {
                let cond_node = program.node(n).children[0];
                match self.step_node(program, cond_node)? {
                    Reduction::Preempt => Ok(Reduction::Preempt),
                    Reduction::Complete => {
                        let cond = self.pop()?;
                        let Value::Bool(b) = cond else {
                            return Err(ExecError::TypeMismatch {
                                expected: "bool",
                                got: cond.kind(),
                            });
                        };
                        // The untaken branch is never visited.
                        self.next_child[n.index()] = if b { 1 } else { 2 };
                        Ok(Reduction::Preempt)
                    }
                }
            }
            branch @ (1 | 2) if branch < len => {
                let branch_node = program.node(n).children[branch];
                match self.step_node(program, branch_node)? {
                    Reduction::Preempt => Ok(Reduction::Preempt),
                    Reduction::Complete => {
                        // The branch's value is the if's value.
                        self.next_child[n.index()] = 3;
                        Ok(Reduction::Complete)
                    }
                }
            }
            2 => {
                // False condition, no else branch.
                self.push(Value::Bool(false));
                self.next_child[n.index()] = 3;
                Ok(Reduction::Complete)
            }
            _ => Ok(Reduction::Complete),
        }
    }

    fn step_define(&mut self, program: &Program, n: NodeId) -> Result<Reduction, ExecError> {
        let len = program.node(n).children.len();
        if len != 2 {
            return Err(ExecError::ArityMismatch {
                name: "define".to_owned(),
                expected: 2,
                got: len,
            });
        }
        // The name child is never evaluated.
        if self.next_child[n.index()] == 0 {
            self.next_child[n.index()] = 1;
        }
        if self.next_child[n.index()] != 1 {
            return Ok(Reduction::Complete);
        }
        let value_node = program.node(n).children[1];
        match self.step_node(program, value_node)? {
            Reduction::Preempt => Ok(Reduction::Preempt),
            Reduction::Complete => {
                let value = self.pop()?;
                let name_node = program.node(n).children[0];
                let name = match program.node(name_node).token {
                    Some(tok) if program.node(name_node).is_leaf() => program.text(tok),
                    _ => {
                        return Err(ExecError::TypeMismatch {
                            expected: "symbol",
                            got: "form",
                        })
                    }
                };
                self.env.borrow_mut().define(name, value)?;
                // A define's value is the bound value.
                self.push(value);
                self.next_child[n.index()] = 2;
                Ok(Reduction::Complete)
            }
        }
    }

    fn step_begin(&mut self, program: &Program, n: NodeId) -> Result<Reduction, ExecError> {
        let len = program.node(n).children.len();
        let cursor = self.next_child[n.index()];
        if cursor == 0 && self.visit_count[n.index()] == 1 {
            // Scope marker: the final drain pops back to it, so however
            // many values the children leave behind, exactly one survives.
            self.push(Value::Begin(n));
            return Ok(Reduction::Preempt);
        }
        if cursor < len {
            let child = program.node(n).children[cursor];
            match self.step_node(program, child)? {
                Reduction::Preempt => return Ok(Reduction::Preempt),
                Reduction::Complete => {
                    self.next_child[n.index()] = cursor + 1;
                    if cursor + 1 < len {
                        return Ok(Reduction::Preempt);
                    }
                }
            }
        }
        // All children done: keep the last value, drop the rest.
        let value = if len == 0 {
            Value::Bool(false)
        } else {
            self.pop()?
        };
        loop {
            if self.pop()? == Value::Begin(n) {
                break;
            }
        }
        self.push(value);
        Ok(Reduction::Complete)
    }

    fn step_apply(&mut self, program: &Program, n: NodeId) -> Result<Reduction, ExecError> {
        let len = program.node(n).children.len();
        let cursor = self.next_child[n.index()];
        if cursor < len {
            // Arguments evaluate left to right before the operator is
            // resolved.
            let child = program.node(n).children[cursor];
            return match self.step_node(program, child)? {
                Reduction::Preempt => Ok(Reduction::Preempt),
                Reduction::Complete => {
                    self.next_child[n.index()] = cursor + 1;
                    Ok(Reduction::Preempt)
                }
            };
        }
        if cursor == len {
            self.apply(program, n)
        } else if cursor == len + 1 {
            self.resume_call(program, n)
        } else {
            // Value already delivered by a finished inner activation.
            Ok(Reduction::Complete)
        }
    }

    /// All children evaluated: resolve the operator and apply it.
    fn apply(&mut self, program: &Program, n: NodeId) -> Result<Reduction, ExecError> {
        let node = program.node(n);
        let len = node.children.len();
        let Some(tok) = node.token else {
            // Token-less node: `((lambda …) args…)`, or the empty form.
            if len == 0 {
                self.push(Value::Bool(false));
                return Ok(Reduction::Complete);
            }
            let argc = len - 1;
            let callee = self.peek_at(argc)?;
            let Value::Lambda(lambda) = callee else {
                return Err(ExecError::TypeMismatch {
                    expected: "lambda",
                    got: callee.kind(),
                });
            };
            return self.enter_call(program, n, lambda, argc, true);
        };

        let resolved = self.env.borrow().lookup(program.text(tok));
        match resolved {
            Some(Value::Native(id)) => {
                let entry = self.env.borrow().native(id).ok_or(ExecError::TypeMismatch {
                    expected: "registered native",
                    got: "native",
                })?;
                let ctx = crate::env::NativeCtx {
                    program,
                    node: n,
                    argc: len,
                    payload: entry.payload.clone(),
                    flags: entry.flags,
                };
                (entry.func)(self, ctx)?;
                Ok(Reduction::Complete)
            }
            Some(Value::Lambda(lambda)) => self.enter_call(program, n, lambda, len, false),
            Some(value) if len == 0 => {
                self.push(value);
                Ok(Reduction::Complete)
            }
            Some(value) => Err(ExecError::TypeMismatch {
                expected: "callable",
                got: value.kind(),
            }),
            None if len > 0 => Err(ExecError::UndefinedSymbol {
                name: program.text(tok).to_owned(),
            }),
            None => {
                // Leaf literal fallback: int, then float, then string.
                let text = program.text(tok);
                let value = if let Ok(i) = text.parse::<i32>() {
                    Value::Int(i)
                } else if let Ok(f) = text.parse::<f32>() {
                    Value::Float(f)
                } else {
                    Value::Str(tok)
                };
                self.push(value);
                Ok(Reduction::Complete)
            }
        }
    }

    /// Begin applying `lambda` at call site `call` with `argc` evaluated
    /// arguments on the stack (plus the callee value under them when
    /// `drop_callee` is set).
    fn enter_call(
        &mut self,
        program: &Program,
        call: NodeId,
        lambda: NodeId,
        argc: usize,
        drop_callee: bool,
    ) -> Result<Reduction, ExecError> {
        let params: Vec<NodeId> = program
            .node(lambda)
            .children
            .first()
            .map(|&holder| program.node(holder).children.to_vec())
            .unwrap_or_default();
        if params.len() != argc {
            let name = program.token_text(call);
            return Err(ExecError::ArityMismatch {
                name: if name.is_empty() {
                    "lambda".to_owned()
                } else {
                    name.to_owned()
                },
                expected: params.len(),
                got: argc,
            });
        }

        let mut args = vec![Value::Bool(false); argc];
        for slot in args.iter_mut().rev() {
            *slot = self.pop()?;
        }
        if drop_callee {
            self.pop()?;
        }

        let is_tail =
            self.call_trace.last() == Some(&lambda) && is_tail_position(program, call, lambda);
        if is_tail {
            // Same logical frame: rebind in place, a loop rather than a
            // call. The subtree reset includes this call site.
            trace!(lambda = lambda.index(), "tail call");
            self.env.borrow_mut().prune_args(lambda);
            self.reset_subtree(program, lambda);
            self.bind_frame(program, lambda, &params, &args)?;
            self.next_child[lambda.index()] = 1;
            return Ok(Reduction::Preempt);
        }

        if self.live_frames >= self.limits.call_depth {
            return Err(ExecError::StackOverflow);
        }
        self.live_frames += 1;
        // Route marker so the walk resumes through this site. For a
        // self-call the subtree reset below clears it again, which is
        // fine: only the deepest activation is ever walked directly.
        self.next_child[call.index()] = program.node(call).children.len() + 1;

        let active = self.active_calls.entry(lambda).or_insert(0);
        if *active > 0 {
            // The lambda is already mid-flight: bury the outer
            // activation's cursors until this one finishes.
            trace!(lambda = lambda.index(), "shadowing active frame");
            let saved = snapshot_subtree(
                program,
                lambda,
                &self.visit_count,
                &self.next_child,
                &self.in_flight,
            );
            self.shadow_frames.push(ShadowFrame {
                lambda,
                call,
                saved,
            });
        }
        *self.active_calls.entry(lambda).or_insert(0) += 1;
        self.in_flight.insert(call, lambda);

        self.reset_subtree(program, lambda);
        self.bind_frame(program, lambda, &params, &args)?;
        self.next_child[lambda.index()] = 1;
        self.trace_push(lambda);
        Ok(Reduction::Preempt)
    }

    /// Step the body of the in-flight call at `call`.
    fn resume_call(&mut self, program: &Program, call: NodeId) -> Result<Reduction, ExecError> {
        let Some(&lambda) = self.in_flight.get(&call) else {
            // Cursor claims a call is in flight that was never entered.
            return Err(ExecError::StackUnderflow);
        };
        self.trace_push(lambda);

        let body_len = program.node(lambda).children.len();
        let cursor = self.next_child[lambda.index()];
        if cursor < body_len {
            let child = program.node(lambda).children[cursor];
            match self.step_node(program, child)? {
                Reduction::Preempt => return Ok(Reduction::Preempt),
                Reduction::Complete => {
                    self.next_child[lambda.index()] = cursor + 1;
                    if cursor + 1 < body_len {
                        // Intermediate body values are discarded; only
                        // the last one is the call's value.
                        self.pop()?;
                        return Ok(Reduction::Preempt);
                    }
                }
            }
        } else {
            // Parameter list only, no body.
            self.push(Value::Bool(false));
        }
        self.finish_call(program, call, lambda)
    }

    /// Body finished; its value is on top of the stack.
    fn finish_call(
        &mut self,
        program: &Program,
        call: NodeId,
        lambda: NodeId,
    ) -> Result<Reduction, ExecError> {
        self.env.borrow_mut().prune_args(lambda);
        self.live_frames -= 1;

        let remaining = match self.active_calls.get_mut(&lambda) {
            Some(count) => {
                *count -= 1;
                *count
            }
            None => 0,
        };
        if remaining == 0 {
            self.active_calls.remove(&lambda);
        }

        if remaining > 0 {
            // This activation buried an outer one; dig it back up.
            // Shadow frames are strictly LIFO with call nesting, so the
            // top frame is ours.
            let Some(frame) = self.shadow_frames.pop() else {
                return Err(ExecError::StackUnderflow);
            };
            debug_assert_eq!(frame.lambda, lambda);
            for cursor in &frame.saved {
                self.visit_count[cursor.node.index()] = cursor.visit;
                self.next_child[cursor.node.index()] = cursor.next;
                // Routing entries come back with the cursors; an entry
                // this activation left behind is dropped the same way.
                match cursor.in_flight {
                    Some(callee) => {
                        self.in_flight.insert(cursor.node, callee);
                    }
                    None => {
                        self.in_flight.remove(&cursor.node);
                    }
                }
            }
            // The outer activation resumes at its call site with the
            // result already on the stack.
            self.in_flight.remove(&frame.call);
            self.next_child[frame.call.index()] =
                program.node(frame.call).children.len() + 2;
            return Ok(Reduction::Preempt);
        }

        self.in_flight.remove(&call);
        // Leave the subtree clean for the lambda's next application.
        self.reset_subtree(program, lambda);
        Ok(Reduction::Complete)
    }

    /// Push the argument frame: `ArgsStart`, one binding per parameter,
    /// `ArgsEnd`.
    fn bind_frame(
        &mut self,
        program: &Program,
        lambda: NodeId,
        params: &[NodeId],
        args: &[Value],
    ) -> Result<(), ExecError> {
        let mut env = self.env.borrow_mut();
        env.push_marker(Value::ArgsStart(lambda))?;
        for (&param, &arg) in params.iter().zip(args) {
            let Some(tok) = program.node(param).token else {
                return Err(ExecError::TypeMismatch {
                    expected: "symbol",
                    got: "form",
                });
            };
            env.bind_arg(program.text(tok), arg)?;
        }
        env.push_marker(Value::ArgsEnd(lambda))
    }

    fn reset_subtree(&mut self, program: &Program, n: NodeId) {
        self.visit_count[n.index()] = 0;
        self.next_child[n.index()] = 0;
        for i in 0..program.node(n).children.len() {
            self.reset_subtree(program, program.node(n).children[i]);
        }
    }

    fn trace_push(&mut self, lambda: NodeId) {
        self.call_trace.push(lambda);
        if self.call_trace.len() > self.trace_high_water {
            self.trace_high_water = self.call_trace.len();
        }
    }
}

/// Is `node` the last reduction its enclosing lambda `lambda` performs?
///
/// True for the last body child, looking through `if` branches (a
/// branch's value is the if's value, nothing runs after it). A `begin`
/// child is never a tail position: the begin's marker drain still runs
/// after it.
fn is_tail_position(program: &Program, node: NodeId, lambda: NodeId) -> bool {
    let mut n = node;
    loop {
        let Some(parent) = program.node(n).parent else {
            return false;
        };
        if parent == lambda {
            return program.node(lambda).children.last() == Some(&n);
        }
        let pn = program.node(parent);
        if pn.flags.contains(NodeFlags::IF) {
            let idx = pn.children.iter().position(|&c| c == n);
            if idx == Some(1) || idx == Some(2) {
                n = parent;
                continue;
            }
        }
        return false;
    }
}

fn snapshot_subtree(
    program: &Program,
    n: NodeId,
    visit_count: &[u32],
    next_child: &[usize],
    in_flight: &FxHashMap<NodeId, NodeId>,
) -> Vec<SavedCursor> {
    let mut saved = Vec::new();
    let mut pending = vec![n];
    while let Some(id) = pending.pop() {
        saved.push(SavedCursor {
            node: id,
            visit: visit_count[id.index()],
            next: next_child[id.index()],
            in_flight: in_flight.get(&id).copied(),
        });
        pending.extend(program.node(id).children.iter().copied());
    }
    saved
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sprig_parse::parse;

    fn eval(source: &str) -> StepResult {
        let program = parse(source).unwrap();
        let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();
        exec.run(&program, 1_000_000)
    }

    #[test]
    fn literals_resolve_lazily() {
        assert_eq!(eval("42"), StepResult::Done(Value::Int(42)));
        assert_eq!(eval("2.5"), StepResult::Done(Value::Float(2.5)));
    }

    #[test]
    fn define_evaluates_value_not_name() {
        let program = parse("(define x (+ 2 3))").unwrap();
        let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();
        assert_eq!(exec.run(&program, 100), StepResult::Done(Value::Int(5)));
        assert_eq!(exec.env().borrow().lookup("x"), Some(Value::Int(5)));
    }

    #[test]
    fn begin_keeps_the_last_value_only() {
        assert_eq!(eval("(begin 1 2 3)"), StepResult::Done(Value::Int(3)));
    }

    #[test]
    fn empty_begin_is_false() {
        assert_eq!(eval("(begin)"), StepResult::Done(Value::Bool(false)));
    }

    #[test]
    fn if_requires_a_bool_condition() {
        assert_eq!(
            eval("(if 1 2 3)"),
            StepResult::Error(ExecError::TypeMismatch {
                expected: "bool",
                got: "int",
            })
        );
    }

    #[test]
    fn if_without_else_is_false_when_untaken() {
        assert_eq!(eval("(if (< 2 1) 9)"), StepResult::Done(Value::Bool(false)));
    }

    #[test]
    fn applying_an_undefined_symbol_fails() {
        assert_eq!(
            eval("(nope 1)"),
            StepResult::Error(ExecError::UndefinedSymbol {
                name: "nope".to_owned(),
            })
        );
    }

    #[test]
    fn lambda_call_binds_and_prunes() {
        let program = parse("(define twice (lambda (n) (+ n n))) (twice 21)").unwrap();
        let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();
        assert_eq!(exec.run(&program, 1000), StepResult::Done(Value::Int(42)));
        // Argument binding did not leak out of the call.
        assert_eq!(exec.env().borrow().lookup("n"), None);
    }

    #[test]
    fn wrong_argument_count_is_arity_mismatch() {
        assert_eq!(
            eval("(define f (lambda (a b) a)) (f 1)"),
            StepResult::Error(ExecError::ArityMismatch {
                name: "f".to_owned(),
                expected: 2,
                got: 1,
            })
        );
    }

    #[test]
    fn direct_lambda_application() {
        assert_eq!(
            eval("((lambda (x) (* x x)) 7)"),
            StepResult::Done(Value::Int(49))
        );
    }

    #[test]
    fn non_tail_self_recursion_is_correct() {
        let src = "(define fact (lambda (n) (if (< n 2) 1 (* n (fact (- n 1)))))) (fact 6)";
        assert_eq!(eval(src), StepResult::Done(Value::Int(720)));
    }

    #[test]
    fn mutual_recursion_terminates() {
        let src = "(define even (lambda (n) (if (= n 0) 1 (odd (- n 1)))))\
                   (define odd (lambda (n) (if (= n 0) 0 (even (- n 1)))))\
                   (even 10)";
        assert_eq!(eval(src), StepResult::Done(Value::Int(1)));
    }

    #[test]
    fn mutual_recursion_across_depths() {
        // Both lambdas route through the same pair of call sites on
        // every other activation; the result must hold well past the
        // first few interleavings.
        for n in 0..12 {
            let src = format!(
                "(define even (lambda (n) (if (= n 0) 1 (odd (- n 1)))))\
                 (define odd (lambda (n) (if (= n 0) 0 (even (- n 1)))))\
                 (even {n})"
            );
            let expected = i32::from(n % 2 == 0);
            assert_eq!(eval(&src), StepResult::Done(Value::Int(expected)), "n = {n}");
        }
    }

    #[test]
    fn tree_recursion_with_two_call_sites() {
        let src = "(define fib (lambda (n) \
                     (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2)))))) \
                   (fib 10)";
        assert_eq!(eval(src), StepResult::Done(Value::Int(55)));
    }

    #[test]
    fn zero_argument_form_collapses_to_the_leaf_fallback() {
        // `(nope)` parses to the same node as the bare leaf `nope`, so
        // an unbound name there resolves as a literal, not a call.
        let program = parse("(nope)").unwrap();
        let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();
        let StepResult::Done(Value::Str(s)) = exec.run(&program, 100) else {
            panic!("expected the literal fallback");
        };
        assert_eq!(program.text(s), "nope");
    }

    #[test]
    fn deep_non_tail_recursion_hits_the_depth_budget() {
        let src = "(define f (lambda (n) (+ 1 (f n)))) (f 0)";
        assert_eq!(eval(src), StepResult::Error(ExecError::StackOverflow));
    }

    #[test]
    fn outcome_is_sticky() {
        let program = parse("7").unwrap();
        let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();
        let done = exec.run(&program, 100);
        assert_eq!(done, StepResult::Done(Value::Int(7)));
        assert_eq!(exec.step(&program), done);
    }

    #[test]
    fn shared_env_carries_defines_across_states() {
        let mut table = EnvTable::new(256);
        builtins::install(&mut table).unwrap();
        let shared = SharedEnv::new(table);

        let first = parse("(define x 5)").unwrap();
        let mut exec = ExecState::new(&first, EnvTarget::Shared(shared.clone())).unwrap();
        assert_eq!(exec.run(&first, 100), StepResult::Done(Value::Int(5)));

        let second = parse("(+ x 1)").unwrap();
        let mut exec = ExecState::new(&second, EnvTarget::Shared(shared)).unwrap();
        assert_eq!(exec.run(&second, 100), StepResult::Done(Value::Int(6)));
    }

    #[test]
    fn string_literals_evaluate_to_str_values() {
        let program = parse("\"hello\"").unwrap();
        let mut exec = ExecState::new(&program, EnvTarget::Local).unwrap();
        let StepResult::Done(Value::Str(s)) = exec.run(&program, 100) else {
            panic!("expected a string value");
        };
        assert_eq!(program.text(s), "hello");
    }
}
