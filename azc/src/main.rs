use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use az::{codegen::Emit, lexer, parser, util::fmt::tree};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use crate::target::{EmitKind, Target, DEFAULT_TARGET};

mod target;

/// Compiles az programs to x86-64 assembly or C.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Entry file of the program. `use` paths are resolved against the
    /// working directory.
    input: String,

    #[arg(long, value_enum, default_value = "asm")]
    emit: EmitKind,

    /// Assembly flavor. Defaults to the host platform.
    #[arg(long, value_enum)]
    target: Option<Target>,

    /// Defaults to the input path with a `.s` or `.c` extension.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Also write a C header with the prototypes of every defined function.
    #[arg(long, value_name = "PATH")]
    header: Option<PathBuf>,

    /// Print the tokens of the entry file to stderr.
    #[arg(long)]
    dump_tokens: bool,

    /// Print the syntax tree of the entry file to stderr.
    #[arg(long)]
    dump_ast: bool,

    /// Log pipeline progress. `RUST_LOG` takes precedence.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    execute(&cli)
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")
}

fn execute(cli: &Cli) -> Result<()> {
    let emit = match cli.emit {
        EmitKind::C => Emit::C,
        EmitKind::Asm => {
            let target = cli.target.unwrap_or(DEFAULT_TARGET);
            let Ok(target) = az::codegen::Target::try_from(target) else {
                bail!("no default assembly target for this host, pass --target");
            };
            tracing::debug!(%target, "selected assembly target");
            Emit::Asm(target)
        }
    };

    if cli.dump_tokens || cli.dump_ast {
        dump(cli)?;
    }

    let output = az::compile(&cli.input, emit)
        .with_context(|| format!("failed to compile {}", cli.input))?;

    let path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&cli.input, emit));
    write_output(&path, &output.code)?;
    if let Some(header) = &cli.header {
        write_output(header, &output.header)?;
    }
    Ok(())
}

fn dump(cli: &Cli) -> Result<()> {
    let src = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read input file {}", cli.input))?;

    if cli.dump_tokens {
        for token in lexer::lex_in_new(&src) {
            if !token.kind.is_trivia() {
                eprintln!("{token:?} {:?}", token.lexeme(&src));
            }
        }
    }
    // Syntax errors are reported by the compilation itself.
    if cli.dump_ast {
        if let Ok(program) = parser::parse_program(&src, &mut Vec::new()) {
            eprint!("{}", tree::print_program_string(&program));
        }
    }
    Ok(())
}

fn default_output(input: &str, emit: Emit) -> PathBuf {
    Path::new(input).with_extension(emit.extension())
}

fn write_output(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}
