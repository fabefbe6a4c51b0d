use steplisp::devtools;
use steplisp::error::Error;
use steplisp::exec::{ExecState, StepOutcome};
use steplisp::parser::Parser;
use steplisp::value::Value;

fn eval(source: &str) -> (Parser, ExecState) {
    let mut parser = Parser::parse(source).unwrap();
    let mut exec = ExecState::new(&mut parser);
    assert_eq!(exec.run(&parser, 100_000).unwrap(), StepOutcome::Finished);
    (parser, exec)
}

fn result_of(source: &str) -> Value {
    let (_, exec) = eval(source);
    *exec.stack().last().expect("program produced no value")
}

#[test]
fn full_program_evaluates() {
    let value = result_of(
        "(begin \
           (define base 10) \
           (define scale (lambda (n) (* n base))) \
           (if (> (scale 3) 25) (+ (scale 1) 5) 0))",
    );
    assert_eq!(value, Value::Int(15));
}

#[test]
fn feeding_in_arbitrary_chunks_matches_whole_input() {
    let source = "(begin (define x 3) (+ x (* 2 x)))";
    let whole = result_of(source);

    // One character per feed call, which is the worst-case chunking.
    let mut parser = Parser::new();
    for c in source.chars() {
        parser.feed(c).unwrap();
    }
    parser.finish().unwrap();
    let mut exec = ExecState::new(&mut parser);
    exec.run(&parser, 100_000).unwrap();
    assert_eq!(exec.stack().last(), Some(&whole));
}

#[test]
fn evaluation_is_deterministic() {
    let source = "(begin (define f (lambda (a b) (+ (* a a) b))) (f 3 4))";
    assert_eq!(result_of(source), result_of(source));
    assert_eq!(result_of(source), Value::Int(13));
}

#[test]
fn reserialized_source_evaluates_to_the_same_value() {
    let source = "(begin (define n 7) ; a comment\n (if (< n 10) (* n n) 0))";
    let (parser, exec) = eval(source);
    let rendered = devtools::ast_to_source(&parser);
    let mut reparsed = Parser::parse(&rendered).unwrap();
    let mut exec2 = ExecState::new(&mut reparsed);
    exec2.run(&reparsed, 100_000).unwrap();
    assert_eq!(exec.stack(), exec2.stack());
}

#[test]
fn every_step_terminates_and_makes_progress() {
    let mut parser =
        Parser::parse("(begin (define sq (lambda (n) (* n n))) (+ (sq 2) (sq 3)))")
            .unwrap();
    let mut exec = ExecState::new(&mut parser);
    let mut steps = 0;
    loop {
        match exec.step(&parser).unwrap() {
            StepOutcome::Finished => break,
            StepOutcome::More => {
                steps += 1;
                assert!(steps < 10_000, "evaluation did not converge");
            }
        }
    }
    assert_eq!(exec.stack(), &[Value::Int(13)]);
}

#[test]
fn interrupted_run_resumes_to_the_same_result() {
    let source = "(begin (define inc (lambda (n) (+ n 1))) (inc (inc (inc 0))))";
    let uninterrupted = result_of(source);

    let mut parser = Parser::parse(source).unwrap();
    let mut exec = ExecState::new(&mut parser);
    // Drip-feed the budget one step at a time.
    while exec.run(&parser, 1).unwrap() == StepOutcome::More {}
    assert_eq!(exec.stack().last(), Some(&uninterrupted));
}

#[test]
fn completed_program_leaves_a_single_value() {
    for source in [
        "(+ 1 2)",
        "(begin 1 2 3)",
        "(begin (define x 5) (if (= x 5) x 0))",
        "(begin (define id (lambda (v) v)) (id 9))",
    ] {
        let (_, exec) = eval(source);
        assert_eq!(exec.stack().len(), 1, "unbalanced stack for {:?}", source);
    }
}

#[test]
fn call_frames_do_not_leak_bindings() {
    let (parser, exec) = eval(
        "(begin (define pick (lambda (a b) (if (> a b) a b))) \
                (+ (pick 1 2) (pick 4 3)))",
    );
    let a = parser.strpool().lookup("a").unwrap();
    assert_eq!(exec.env().resolve(a), None);
    assert_eq!(exec.stack(), &[Value::Int(6)]);
}

#[test]
fn strings_survive_definition_and_lookup() {
    let (parser, exec) = eval("(begin (define name \"ada\") name)");
    let value = *exec.stack().last().unwrap();
    assert_eq!(value.render(parser.strpool()), "ada");
}

#[test]
fn unterminated_program_fails_before_evaluation() {
    let mut parser = Parser::new();
    for c in "(begin (define x 3)".chars() {
        parser.feed(c).unwrap();
    }
    assert!(matches!(parser.finish().unwrap_err(), Error::Parse(_)));
}

#[test]
fn malformed_if_is_an_evaluation_error() {
    let mut parser = Parser::parse("(if (> 1 0) 1)").unwrap();
    let mut exec = ExecState::new(&mut parser);
    assert!(matches!(
        exec.run(&parser, 100_000).unwrap_err(),
        Error::Eval(_)
    ));
}

#[test]
fn oldest_binding_wins_across_scopes() {
    // The flat environment scans from the oldest entry, so the global `n`
    // defined first shadows the lambda's own argument.
    let value = result_of(
        "(begin (define n 40) (define f (lambda (n) (+ n 2))) (f 0))",
    );
    assert_eq!(value, Value::Int(42));
}

#[test]
fn step_budget_surfaces_as_more_not_error() {
    let mut parser =
        Parser::parse("(begin (define f (lambda (n) (* n n))) (f 5))").unwrap();
    let mut exec = ExecState::new(&mut parser);
    assert_eq!(exec.run(&parser, 2).unwrap(), StepOutcome::More);
    assert!(!exec.is_finished());
    assert_eq!(exec.run(&parser, 100_000).unwrap(), StepOutcome::Finished);
    assert_eq!(exec.stack(), &[Value::Int(25)]);
}
