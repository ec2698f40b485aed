use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::PathBuf;

use tree_lox as lox;

use clap::Parser as ClapParser;
use clap::Subcommand;

use lox::ast_printer::Ast;
use lox::error::LoxError;
use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Allow `+` to concatenate a string and a number via stringification
    #[arg(long = "cross-add", global = true)]
    cross_add: bool,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes the provided input from a given valid filepath
    Tokenize { filename: PathBuf },

    /// Parses a single expression and prints its tree
    Parse { filename: PathBuf },

    /// Evaluates a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs a program: scan, parse, resolve, interpret
    Run { filename: PathBuf },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,

        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    match args.commands {
        Commands::Tokenize { filename } => {
            let buf = read_source(&filename)?;

            let scanner: Scanner = Scanner::new(&buf);
            let mut tokenized = true;

            for token in scanner {
                match token {
                    Ok(token) => println!("{}", token),

                    Err(e) => {
                        tokenized = false;
                        eprintln!("{}", e);
                    }
                }
            }

            if !tokenized {
                std::process::exit(65);
            }
        }

        Commands::Parse { filename } => {
            let buf = read_source(&filename)?;

            let (tokens, had_scan_error) = scan(&buf);
            if had_scan_error {
                std::process::exit(65);
            }

            let mut parser: Parser = Parser::new(tokens);

            match parser.parse_expression() {
                Ok(expr) => {
                    let printer = Ast;
                    println!("{}", printer.print(&expr));
                }

                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(65);
                }
            }
        }

        Commands::Evaluate { filename } => {
            let buf = read_source(&filename)?;

            let (tokens, had_scan_error) = scan(&buf);
            if had_scan_error {
                std::process::exit(70);
            }

            let mut parser: Parser = Parser::new(tokens);

            let expr = match parser.parse_expression() {
                Ok(expr) => expr,

                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(70);
                }
            };

            let mut interpreter: Interpreter = Interpreter::new();
            interpreter.set_cross_add(args.cross_add);

            match interpreter.evaluate(&expr) {
                Ok(value) => println!("{}", value),

                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(70);
                }
            }
        }

        Commands::Run { filename } => {
            let buf = read_source(&filename)?;

            let (tokens, had_scan_error) = scan(&buf);
            if had_scan_error {
                std::process::exit(65);
            }

            let mut parser: Parser = Parser::new(tokens);

            let statements = match parser.parse() {
                Ok(statements) => statements,

                Err(errors) => {
                    for e in &errors {
                        eprintln!("{}", e);
                    }
                    std::process::exit(65);
                }
            };

            let mut interpreter: Interpreter = Interpreter::new();
            interpreter.set_cross_add(args.cross_add);

            let mut resolver: Resolver = Resolver::new(&mut interpreter);

            if let Err(e) = resolver.resolve(&statements) {
                eprintln!("{}", e);
                std::process::exit(65);
            }

            if let Err(e) = interpreter.interpret(&statements) {
                eprintln!("{}", e);

                match e {
                    LoxError::Runtime(_) => std::process::exit(70),
                    _ => std::process::exit(75),
                }
            }
        }
    }

    Ok(())
}

fn read_source(filename: &PathBuf) -> anyhow::Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();

    let file = match File::open(filename) {
        Ok(file) => file,

        Err(e) => {
            eprintln!("Error reading file: {}", e);
            std::process::exit(1);
        }
    };

    let mut reader: BufReader<File> = BufReader::new(file);
    reader.read_to_end(&mut buf)?;

    Ok(buf)
}

/// Runs the scanner to completion, printing scan errors to stderr.
fn scan(buf: &[u8]) -> (Vec<Token>, bool) {
    let scanner: Scanner = Scanner::new(buf);

    let mut tokens: Vec<Token> = Vec::new();
    let mut had_error = false;

    for result in scanner {
        match result {
            Ok(token) => tokens.push(token),

            Err(e) => {
                had_error = true;
                eprintln!("{}", e);
            }
        }
    }

    (tokens, had_error)
}
