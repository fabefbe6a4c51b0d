use std::env;
use std::fs;

use tracing_subscriber::EnvFilter;

use steplisp::devtools;
use steplisp::error::{Error, Result};
use steplisp::exec::{ExecState, StepOutcome};
use steplisp::parser::Parser;
use steplisp::repl::Repl;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default per-program step budget for `--file` and the REPL.
const DEFAULT_MAX_STEPS: usize = 1_000_000;

#[derive(Debug, Clone)]
enum ArgCmd {
    Repl { print_ast: bool, max_steps: usize },
    File { path: String, print_ast: bool, max_steps: usize },
    Help,
}

fn print_usage() {
    println!("steplisp v{}\n\n", VERSION);
    println!("Usage:");
    println!("  steplisp                    Start the REPL");
    println!("  steplisp --file <path>      Execute a file");
    println!("  steplisp --steps <n>        Cap evaluation at n steps (default {})", DEFAULT_MAX_STEPS);
    println!("  steplisp --print-ast        Print the AST before evaluating (works with REPL and --file)");
    println!("  steplisp -h                 Show this help message");
}

fn parse_args(args: Vec<String>) -> std::result::Result<ArgCmd, String> {
    let mut print_ast = false;
    let mut max_steps = DEFAULT_MAX_STEPS;
    let mut file_path: Option<String> = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                return Ok(ArgCmd::Help);
            }
            "--print-ast" => {
                print_ast = true;
            }
            "--file" => {
                if i + 1 >= args.len() {
                    return Err("Error: --file requires a file path".to_string());
                }
                file_path = Some(args[i + 1].clone());
                i += 1; // Skip the file path
            }
            "--steps" => {
                if i + 1 >= args.len() {
                    return Err("Error: --steps requires a number".to_string());
                }
                max_steps = args[i + 1]
                    .parse()
                    .map_err(|_| format!("Error: invalid step count '{}'", args[i + 1]))?;
                i += 1;
            }
            arg => {
                return Err(format!("Error: Unknown argument '{}'", arg));
            }
        }
        i += 1;
    }

    if let Some(path) = file_path {
        Ok(ArgCmd::File { path, print_ast, max_steps })
    } else {
        Ok(ArgCmd::Repl { print_ast, max_steps })
    }
}

fn run_file(file_path: &str, print_ast: bool, max_steps: usize) -> Result<()> {
    let source = fs::read_to_string(file_path)
        .map_err(|e| Error::Eval(format!("cannot read {}: {}", file_path, e)))?;

    let mut parser = Parser::new();
    for c in source.chars() {
        parser.feed(c)?;
    }
    parser.finish()?;

    if print_ast {
        println!("{}", devtools::dump_ast(&parser));
    }

    let mut exec = ExecState::new(&mut parser);
    if exec.run(&parser, max_steps)? == StepOutcome::More {
        return Err(Error::Eval(format!("step budget of {} exhausted", max_steps)));
    }
    if let Some(value) = exec.stack().last() {
        println!("{}", value.render(parser.strpool()));
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    let command = match parse_args(args) {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("{}\n\n", e);
            print_usage();
            std::process::exit(1);
        }
    };

    match command {
        ArgCmd::Help => {
            print_usage();
        }
        ArgCmd::Repl { print_ast, max_steps } => {
            let repl = Repl::new(print_ast, max_steps);
            repl.run();
        }
        ArgCmd::File { path, print_ast, max_steps } => {
            match run_file(&path, print_ast, max_steps) {
                Ok(()) => {}
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
