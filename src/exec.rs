use tracing::{debug, trace};

use crate::builtins;
use crate::env::Env;
use crate::error::{Error, Result};
use crate::parser::Parser;
use crate::strpool::StrRef;
use crate::value::Value;

//===----------------------------------------------------------------------===//
// Step outcomes
//===----------------------------------------------------------------------===//

/// Result of driving the evaluator forward.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Evaluation is still in progress; call again.
    More,
    /// The program has produced its final state. Further steps are no-ops.
    Finished,
}

/// Internal per-node outcome. `Preempt` yields control back up the tree after
/// at most one unit of work, which is what makes single stepping possible.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Flow {
    Done,
    Preempt,
}

//===----------------------------------------------------------------------===//
// ExecState
//===----------------------------------------------------------------------===//

/// Resumable evaluation state over a parsed program.
///
/// All progress lives here, outside the AST: a per-node child cursor, a
/// per-node visit counter, the value stack and the environment. One call to
/// [`ExecState::step`] performs one unit of work and returns, so the host can
/// interleave evaluation with anything else.
pub struct ExecState {
    child_cursor: Vec<usize>,
    visit_count: Vec<usize>,
    stack: Vec<Value>,
    env: Env,
    finished: bool,
}

impl ExecState {
    /// Builds an execution state for `parser`'s program and seeds the
    /// environment with the builtins. Needs the parser mutably just long
    /// enough to intern the builtin and sentinel names.
    pub fn new(parser: &mut Parser) -> Self {
        let mut env = Env::new(parser.strpool_mut());
        builtins::register(parser, &mut env);
        Self {
            child_cursor: Vec::new(),
            visit_count: Vec::new(),
            stack: Vec::new(),
            env,
            finished: false,
        }
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Env {
        &mut self.env
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn push(&mut self, value: Value) {
        trace!(?value, depth = self.stack.len(), "push");
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value> {
        let value = self.stack.pop().ok_or(Error::StackUnderflow)?;
        trace!(?value, depth = self.stack.len(), "pop");
        Ok(value)
    }

    /// Performs one unit of evaluation work.
    pub fn step(&mut self, parser: &Parser) -> Result<StepOutcome> {
        if self.finished {
            return Ok(StepOutcome::Finished);
        }
        if parser.ast().is_empty() {
            self.finished = true;
            return Ok(StepOutcome::Finished);
        }
        // The AST may have grown since the last step (REPL feeding more
        // forms); the per-node bookkeeping grows with it.
        let n = parser.ast().len();
        self.child_cursor.resize(n, 0);
        self.visit_count.resize(n, 0);

        match self.step_node(parser, 0)? {
            Flow::Done => {
                debug!("evaluation finished");
                self.finished = true;
                Ok(StepOutcome::Finished)
            }
            Flow::Preempt => Ok(StepOutcome::More),
        }
    }

    /// Steps until finished or `max_steps` calls have been made. Returns
    /// `More` if the budget ran out first.
    pub fn run(&mut self, parser: &Parser, max_steps: usize) -> Result<StepOutcome> {
        for _ in 0..max_steps {
            if self.step(parser)? == StepOutcome::Finished {
                return Ok(StepOutcome::Finished);
            }
        }
        Ok(StepOutcome::More)
    }

    //===------------------------------------------------------------------===//
    // Tree walking
    //===------------------------------------------------------------------===//

    fn step_node(&mut self, parser: &Parser, idx: usize) -> Result<Flow> {
        self.visit_count[idx] += 1;
        let node = parser.ast().node(idx);
        trace!(
            node = idx,
            cursor = self.child_cursor[idx],
            visits = self.visit_count[idx],
            "step node"
        );

        if node.is_begin() && self.visit_count[idx] == 1 {
            // Marks how far down the cleanup at the end of the block reaches.
            self.push(Value::Begin(idx));
        }
        if node.is_if() {
            return self.step_if(parser, idx);
        }
        if node.is_lambda() {
            // A lambda form in evaluation position is just a value; its
            // children only run when the lambda is applied.
            self.push(Value::Lambda(idx));
            return Ok(Flow::Done);
        }

        let cursor = self.child_cursor[idx];
        if cursor < node.children().len() {
            if Flow::Done == self.step_node(parser, node.children()[cursor])? {
                self.child_cursor[idx] += 1;
            }
            return Ok(Flow::Preempt);
        }

        self.eval_node(parser, idx)
    }

    /// All children of `idx` have produced their values; now the node itself
    /// acts on them.
    fn eval_node(&mut self, parser: &Parser, idx: usize) -> Result<Flow> {
        let node = parser.ast().node(idx);
        if node.is_begin() {
            return self.finish_begin(idx);
        }
        match node.token() {
            Some(tok) => self.eval_token(parser, idx, tok),
            None => Ok(Flow::Done),
        }
    }

    fn eval_token(&mut self, parser: &Parser, idx: usize, tok: StrRef) -> Result<Flow> {
        let node = parser.ast().node(idx);
        if node.is_string() {
            self.push(Value::Str(tok));
            return Ok(Flow::Done);
        }
        if let Some(value) = self.env.resolve(tok) {
            return match value {
                Value::Native { f, flags } => {
                    debug!(op = parser.strpool().get(tok), "native call");
                    f(parser, self, flags)?;
                    Ok(Flow::Done)
                }
                Value::Lambda(lambda_idx) => self.step_lambda(parser, lambda_idx),
                other => {
                    self.push(other);
                    Ok(Flow::Done)
                }
            };
        }

        // Not bound: a numeric literal, or bare text. Bare text is what
        // `define` later consumes as its key.
        let text = parser.strpool().get(tok);
        if let Ok(n) = text.parse::<i16>() {
            self.push(Value::Int(n));
        } else if let Ok(x) = text.parse::<f32>() {
            self.push(Value::Float(x));
        } else {
            self.push(Value::Str(tok));
        }
        Ok(Flow::Done)
    }

    //===------------------------------------------------------------------===//
    // Special forms
    //===------------------------------------------------------------------===//

    /// Drives one step of an active call to the lambda at `lambda_idx`. The
    /// call site's operand values are already on the stack when the first
    /// step arrives.
    fn step_lambda(&mut self, parser: &Parser, lambda_idx: usize) -> Result<Flow> {
        let node = parser.ast().node(lambda_idx);
        if node.children().len() < 2 {
            return Err(Error::Eval(
                "lambda needs an argument list and a body".to_owned(),
            ));
        }

        let cursor = self.child_cursor[lambda_idx];
        if cursor == 0 {
            self.bind_lambda_args(parser, lambda_idx)?;
            self.child_cursor[lambda_idx] = 1;
            return Ok(Flow::Preempt);
        }
        if cursor < node.children().len() {
            if Flow::Done == self.step_node(parser, node.children()[cursor])? {
                self.child_cursor[lambda_idx] += 1;
            }
            return Ok(Flow::Preempt);
        }

        // Body complete, its value is on the stack. Unbind the arguments and
        // rewind the lambda's subtree so the next call starts fresh.
        self.env.prune_call_frame()?;
        self.reset_subtree(parser, lambda_idx);
        Ok(Flow::Done)
    }

    /// Pops one value per declared argument name and binds them inside a
    /// fresh sentinel frame. Values pop in reverse order of evaluation, so
    /// names are bound right to left.
    fn bind_lambda_args(&mut self, parser: &Parser, lambda_idx: usize) -> Result<()> {
        let node = parser.ast().node(lambda_idx);
        self.env.push_args_start(lambda_idx);
        let args_node = parser.ast().node(node.children()[0]);
        for &name_idx in args_node.children().iter().rev() {
            let name = parser.ast().node(name_idx).token().ok_or_else(|| {
                Error::Eval("lambda argument without a name".to_owned())
            })?;
            let value = self.pop()?;
            self.env.define(name, value);
        }
        self.env.push_args_end(lambda_idx);
        Ok(())
    }

    fn step_if(&mut self, parser: &Parser, idx: usize) -> Result<Flow> {
        let node = parser.ast().node(idx);
        if node.children().len() != 3 {
            return Err(Error::Eval(
                "if needs a condition and exactly two branches".to_owned(),
            ));
        }

        match self.child_cursor[idx] {
            0 => {
                if Flow::Done == self.step_node(parser, node.children()[0])? {
                    match self.pop()? {
                        Value::Bool(b) => {
                            self.child_cursor[idx] = if b { 1 } else { 2 };
                        }
                        other => {
                            return Err(Error::Type(format!(
                                "if condition must be a bool, got {}",
                                other.type_name()
                            )))
                        }
                    }
                }
                Ok(Flow::Preempt)
            }
            cursor @ (1 | 2) => {
                if Flow::Done == self.step_node(parser, node.children()[cursor])? {
                    self.child_cursor[idx] = 3;
                }
                Ok(Flow::Preempt)
            }
            _ => Ok(Flow::Done),
        }
    }

    /// Unwinds the stack down to this block's marker, keeping only the value
    /// of the last child that produced one.
    fn finish_begin(&mut self, idx: usize) -> Result<Flow> {
        let mut kept = None;
        loop {
            match self.pop()? {
                Value::Begin(i) if i == idx => break,
                value => {
                    if kept.is_none() {
                        kept = Some(value);
                    }
                }
            }
        }
        if let Some(value) = kept {
            self.push(value);
        }
        Ok(Flow::Done)
    }

    /// Clears cursors and visit counts for `root` and everything below it.
    fn reset_subtree(&mut self, parser: &Parser, root: usize) {
        let mut pending = vec![root];
        while let Some(idx) = pending.pop() {
            self.child_cursor[idx] = 0;
            self.visit_count[idx] = 0;
            pending.extend_from_slice(parser.ast().node(idx).children());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str) -> (Parser, ExecState) {
        let mut parser = Parser::parse(source).unwrap();
        let mut exec = ExecState::new(&mut parser);
        assert_eq!(exec.run(&parser, 10_000).unwrap(), StepOutcome::Finished);
        (parser, exec)
    }

    #[test]
    fn literal_evaluates_to_itself() {
        let (_, exec) = eval("(begin 42)");
        assert_eq!(exec.stack(), &[Value::Int(42)]);
    }

    #[test]
    fn arithmetic_pops_exactly_two_operands() {
        let (_, exec) = eval("(+ 1 2)");
        assert_eq!(exec.stack(), &[Value::Int(3)]);
        // A surplus operand takes no part and stays on the stack.
        let (_, exec) = eval("(+ 1 2 3)");
        assert_eq!(exec.stack(), &[Value::Int(1), Value::Int(5)]);
    }

    #[test]
    fn nested_arithmetic() {
        let (_, exec) = eval("(* 2 (+ 3 4))");
        assert_eq!(exec.stack(), &[Value::Int(14)]);
    }

    #[test]
    fn define_binds_and_yields_its_value() {
        let (parser, exec) = eval("(begin (define x 3) (define y (+ x 6)))");
        let y = parser.strpool().lookup("y").unwrap();
        assert_eq!(exec.env().resolve(y), Some(Value::Int(9)));
        assert_eq!(exec.stack(), &[Value::Int(9)]);
    }

    #[test]
    fn each_step_does_bounded_work() {
        let mut parser = Parser::parse("(+ 1 (+ 2 (+ 3 4)))").unwrap();
        let mut exec = ExecState::new(&mut parser);
        let mut steps = 0;
        while exec.step(&parser).unwrap() == StepOutcome::More {
            steps += 1;
            assert!(steps < 1000, "runaway evaluation");
        }
        assert!(steps > 3, "work was not spread over multiple steps");
        assert_eq!(exec.stack(), &[Value::Int(10)]);
    }

    #[test]
    fn step_after_finished_is_a_noop() {
        let mut parser = Parser::parse("(+ 1 2)").unwrap();
        let mut exec = ExecState::new(&mut parser);
        exec.run(&parser, 10_000).unwrap();
        assert_eq!(exec.step(&parser).unwrap(), StepOutcome::Finished);
        assert_eq!(exec.stack(), &[Value::Int(3)]);
    }

    #[test]
    fn run_respects_its_budget() {
        let mut parser = Parser::parse("(+ 1 (+ 2 (+ 3 4)))").unwrap();
        let mut exec = ExecState::new(&mut parser);
        assert_eq!(exec.run(&parser, 1).unwrap(), StepOutcome::More);
        assert_eq!(exec.run(&parser, 10_000).unwrap(), StepOutcome::Finished);
    }

    #[test]
    fn if_takes_only_one_branch() {
        let (_, exec) = eval("(if (< 1 2) 10 20)");
        assert_eq!(exec.stack(), &[Value::Int(10)]);
        let (_, exec) = eval("(if (> 1 2) 10 20)");
        assert_eq!(exec.stack(), &[Value::Int(20)]);
    }

    #[test]
    fn if_condition_must_be_bool() {
        let mut parser = Parser::parse("(if 1 10 20)").unwrap();
        let mut exec = ExecState::new(&mut parser);
        let err = exec.run(&parser, 10_000).unwrap_err();
        assert!(matches!(err, Error::Type(_)));
    }

    #[test]
    fn lambda_call_binds_args_and_restores_env() {
        let (_, exec) =
            eval("(begin (define inc (lambda (x) (+ x 1))) (inc 2))");
        assert_eq!(exec.stack(), &[Value::Int(3)]);
        // Sentinels and argument bindings are gone after the call.
        assert!(!exec
            .env()
            .entries()
            .iter()
            .any(|e| matches!(e.value, Value::ArgsStart(_) | Value::ArgsEnd(_))));
    }

    #[test]
    fn lambda_is_reinvocable() {
        let (_, exec) = eval(
            "(begin (define twice (lambda (n) (* n 2))) \
                    (+ (twice 3) (twice 4)))",
        );
        assert_eq!(exec.stack(), &[Value::Int(14)]);
    }

    #[test]
    fn two_argument_lambda_binds_in_declaration_order() {
        let (_, exec) = eval(
            "(begin (define sub (lambda (a b) (if (> a b) 1 0))) (sub 5 2))",
        );
        assert_eq!(exec.stack(), &[Value::Int(1)]);
    }

    #[test]
    fn begin_keeps_only_its_last_value() {
        let (_, exec) = eval("(begin 1 2 3)");
        assert_eq!(exec.stack(), &[Value::Int(3)]);
    }

    #[test]
    fn stack_underflow_is_fatal() {
        // A builtin invoked with too few preceding values reports an
        // underflow instead of evaluating.
        let mut parser = Parser::parse("(+)").unwrap();
        let mut exec = ExecState::new(&mut parser);
        assert_eq!(exec.run(&parser, 10_000).unwrap_err(), Error::StackUnderflow);
    }

    #[test]
    fn first_binding_shadows_later_arguments() {
        // `x` is defined globally before the lambda runs; the oldest-first
        // scan means the argument binding never takes effect.
        let (_, exec) = eval(
            "(begin (define x 100) \
                    (define f (lambda (x) (+ x 1))) \
                    (f 5))",
        );
        assert_eq!(exec.stack(), &[Value::Int(101)]);
    }
}
