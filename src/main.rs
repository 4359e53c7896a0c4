//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use anyhow::{self, bail, Context};
use clap::{self, crate_version, Arg, Command};
use tinybc::{
    error::Diagnostics,
    lex,
    link::{LinkOptions, Linker},
    source::{Located, Source},
    target, Options,
};

use std::{
    error::Error,
    fs::File,
    io::{self, Write},
};

fn main() -> anyhow::Result<()> {
    let args = Command::new("Tiny BASIC compiler")
        .version(crate_version!())
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("INPUT")
                .help("Source file ('-' for stdin)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .default_value("a.out")
                .help("Output file ('-' along with -S for stdout)"),
        )
        .arg(
            Arg::new("asm")
                .short('S')
                .help("Generate assembly instead of linking"),
        )
        .arg(Arg::new("strip").short('s').help("Strip executables"))
        .arg(
            Arg::new("no-pie")
                .long("no-pie")
                .help("Link a position-dependent executable"),
        )
        .arg(
            Arg::new("dump")
                .long("dump")
                .takes_value(true)
                .value_name("STAGE")
                .possible_values(["tokens", "ast", "ir"])
                .help("Print an intermediate stage to stdout and stop"),
        )
        .arg(
            Arg::new("arena-size")
                .long("arena-size")
                .takes_value(true)
                .value_name("BYTES")
                .help("Memory budget for the syntax tree"),
        )
        .get_matches();

    let input = args.value_of("input").unwrap_or("-");
    let output = args.value_of("output").unwrap_or("a.out");
    let asm = args.is_present("asm");

    let mut options = Options::default();
    if let Some(size) = args.value_of("arena-size") {
        options.arena_capacity = size
            .parse()
            .with_context(|| format!("Invalid arena size: {}", size))?;
    }

    let source = match input {
        "-" => Source::read(io::stdin(), "<stdin>").context("Failed to read from stdin")?,
        path => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open for reading: {}", path))?;

            Source::read(file, path).with_context(|| format!("Failed to read: {}", path))?
        }
    };

    let mut diagnostics = Diagnostics::new();
    let mut stdout = io::stdout();

    match args.value_of("dump") {
        Some("tokens") => {
            let tokens = lex::tokenize(source.text(), &mut diagnostics);
            for token in fatal(tokens, &mut diagnostics, &source)? {
                writeln!(stdout, "{}\t{}", token.line(), token.val())?;
            }

            print_warnings(&diagnostics, &source);
            return Ok(());
        }

        Some("ast") => {
            let program = tinybc::parse_source(&source, &options, &mut diagnostics);
            let program = fatal(program, &mut diagnostics, &source)?;
            write!(stdout, "{}", program.listing())?;

            print_warnings(&diagnostics, &source);
            return Ok(());
        }

        Some("ir") => {
            let program = tinybc::compile(&source, &options, &mut diagnostics);
            let program = fatal(program, &mut diagnostics, &source)?;
            write!(stdout, "{}", program)?;

            print_warnings(&diagnostics, &source);
            return Ok(());
        }

        Some(stage) => bail!("Unknown stage: {}", stage),
        None => (),
    }

    let program = tinybc::compile(&source, &options, &mut diagnostics);
    let program = fatal(program, &mut diagnostics, &source)?;
    print_warnings(&diagnostics, &source);

    match (asm, output) {
        // Salida a stdout sin enlazado
        (true, "-") => {
            target::emit(&program, &mut stdout).context("Failed to emit to stdout")?;
        }

        // Salida a archivo sin enlazado
        (true, path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            target::emit(&program, &mut file)
                .with_context(|| format!("Failed to emit to file: {}", path))?;
        }

        // Salida a stdout con enlazado
        (false, "-") => bail!("Refusing to write executable to stdout"),

        // Salida a archivo con enlazado
        (false, path) => {
            let mut options = LinkOptions::empty();
            if args.is_present("strip") {
                options |= LinkOptions::STRIP;
            }

            if args.is_present("no-pie") {
                options |= LinkOptions::NO_PIE;
            }

            let mut linker = Linker::spawn(path, options).context("Failed to link")?;
            target::emit(&program, linker.stdin())
                .context("Failed to emit assembly to assembler")?;

            linker
                .finish()
                .with_context(|| format!("Failed to generate executable: {}", path))?;
        }
    };

    Ok(())
}

/// Registra un error fatal, imprime todo lo reportado hasta el momento y aborta.
fn fatal<T, E: Error>(
    result: Result<T, Located<E>>,
    diagnostics: &mut Diagnostics,
    source: &Source,
) -> anyhow::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(error) => {
            diagnostics.fatal(error);
            eprint!("{}", diagnostics.render(source));

            bail!("Could not compile `{}`", source.name())
        }
    }
}

fn print_warnings(diagnostics: &Diagnostics, source: &Source) {
    if !diagnostics.is_empty() {
        eprint!("{}", diagnostics.render(source));
    }
}
