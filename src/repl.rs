use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::devtools;
use crate::error::{Error, Result};
use crate::exec::{ExecState, StepOutcome};
use crate::parser::Parser;

pub struct Repl {
    pub print_ast: bool,
    pub max_steps: usize,
}

impl Repl {
    pub fn new(print_ast: bool, max_steps: usize) -> Self {
        Repl { print_ast, max_steps }
    }

    /// Parses and evaluates one line as a complete program, returning the
    /// rendered result.
    pub fn rep(&self, input: &str) -> Result<String> {
        let mut parser = Parser::parse(input)?;
        if self.print_ast {
            println!("{}", devtools::dump_ast(&parser));
        }
        let mut exec = ExecState::new(&mut parser);
        if exec.run(&parser, self.max_steps)? == StepOutcome::More {
            return Err(Error::Eval(format!(
                "step budget of {} exhausted",
                self.max_steps
            )));
        }
        Ok(match exec.stack().last() {
            Some(value) => value.render(parser.strpool()),
            None => String::new(),
        })
    }

    pub fn run(&self) {
        let mut rl = DefaultEditor::new().unwrap();
        if rl.load_history(".steplisp-history").is_err() {}

        'repl_loop: loop {
            let readline = rl.readline("> ");
            match readline {
                Ok(line) => {
                    if let Err(err) = rl.add_history_entry(line.as_str()) {
                        eprintln!("Error adding to history: {:?}", err);
                    }

                    if let Err(err) = rl.save_history(".steplisp-history") {
                        eprintln!("Error saving history: {:?}", err);
                    }

                    if !line.is_empty() {
                        match self.rep(&line) {
                            Ok(out) => println!("{}", out),
                            Err(e) => {
                                println!("{}", e);
                                continue 'repl_loop;
                            }
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => continue 'repl_loop,
                Err(ReadlineError::Eof) => break 'repl_loop,
                Err(err) => {
                    println!("Error: {:?}", err);
                    break 'repl_loop;
                }
            }
        }
    }
}
