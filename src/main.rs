use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::error::Diagnostics;
use rox::parser::Parser;
use rox::scanner::{self, Scanner};
use rox::token::Token;
use rox::{LoxError, RunStatus, Session};

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,

    /// Enable logging to rox.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the tokens as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file and prints each statement's AST, or the
    /// AST of a single bare expression
    Parse { filename: PathBuf },

    /// Runs input from a file as a Lox program
    Run { filename: PathBuf },

    /// Reads and runs one line at a time (the default)
    Repl,
}

/// Reads the contents of a file into a String
fn read_file(filename: &Path) -> rox::Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename)?;
    let mut reader = BufReader::new(file);
    let mut buf: Vec<u8> = Vec::new();

    let bytes = reader.read_to_end(&mut buf)?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(String::from_utf8(buf)?)
}

/// Reports an unreadable script and yields its exit code.
fn read_failure(filename: &Path, error: LoxError) -> i32 {
    eprintln!("Failed to read file {:?}: {}", filename, error);

    error.exit_code()
}

fn init_logger() -> Result<()> {
    let log_file = File::create("rox.log").context("Failed to create rox.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to rox.log");
    Ok(())
}

fn report(diagnostics: &mut Diagnostics) {
    for error in diagnostics.take() {
        eprintln!("{}", error);
    }
}

fn tokenize(filename: PathBuf, json: bool) -> Result<i32> {
    let source = match read_file(&filename) {
        Ok(source) => source,
        Err(e) => return Ok(read_failure(&filename, e)),
    };
    let mut tokens: Vec<Token> = Vec::new();
    let mut tokenized = true;

    for result in Scanner::new(&source) {
        match result {
            Ok(token) => {
                if !json {
                    println!("{}", token);
                }
                tokens.push(token);
            }

            Err(e) => {
                tokenized = false;
                eprintln!("{}", e);
            }
        }
    }

    if json {
        let rendered = serde_json::to_string_pretty(&tokens).context("Failed to encode tokens")?;
        println!("{}", rendered);
    }

    Ok(if tokenized { 0 } else { 65 })
}

fn parse(filename: PathBuf) -> Result<i32> {
    let source = match read_file(&filename) {
        Ok(source) => source,
        Err(e) => return Ok(read_failure(&filename, e)),
    };
    let mut diagnostics = Diagnostics::new();

    let tokens: Vec<Token> = scanner::scan(&source, &mut diagnostics);

    if diagnostics.had_error() {
        report(&mut diagnostics);
        return Ok(65);
    }

    let statements = Parser::new(tokens.clone()).parse(&mut diagnostics);

    if diagnostics.had_error() {
        // Not a program; a lone expression like `1 + 2` is still printable.
        let mut expression_diagnostics = Diagnostics::new();

        if let Some(expr) = Parser::new(tokens).parse_expression(&mut expression_diagnostics) {
            debug!("Parsed input as a bare expression");
            println!("{}", AstPrinter.print(&expr));
            return Ok(0);
        }

        report(&mut diagnostics);
        return Ok(65);
    }

    for stmt in &statements {
        println!("{}", AstPrinter.print_stmt(stmt));
    }

    Ok(0)
}

fn run(filename: PathBuf) -> Result<i32> {
    let source = match read_file(&filename) {
        Ok(source) => source,
        Err(e) => return Ok(read_failure(&filename, e)),
    };
    let mut session = Session::new();

    let status: RunStatus = session.run(&source);

    for error in session.take_errors() {
        eprintln!("{}", error);
    }

    debug!("Run finished with {:?}", status);

    Ok(status.exit_code())
}

fn repl() -> Result<i32> {
    let mut session = Session::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush prompt")?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("Failed to read line")?;

        // Errors on one line never end the session.
        session.run(&line);

        for error in session.take_errors() {
            eprintln!("{}", error);
        }
    }

    Ok(0)
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let code: i32 = match args.commands.unwrap_or(Commands::Repl) {
        Commands::Tokenize { filename, json } => tokenize(filename, json)?,
        Commands::Parse { filename } => parse(filename)?,
        Commands::Run { filename } => run(filename)?,
        Commands::Repl => repl()?,
    };

    if code != 0 {
        debug!("Exiting with code {}", code);
        std::process::exit(code);
    }

    Ok(())
}
