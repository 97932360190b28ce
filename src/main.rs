use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Compile YADL programs to 32-bit x86 assembly", long_about = None)]
struct Cli {
    /// Log translation progress (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate a source file and write the assembly
    ///
    /// The output has no _start symbol. Assemble with `nasm -f elf32` and
    /// link with `ld -m elf_i386 -e _main`.
    Compile {
        #[arg(help = "The .yadl file to compile")]
        file: PathBuf,

        /// Where to write the assembly, defaults to out.asm beside the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Translate without writing anything
    Check {
        #[arg(help = "The .yadl file to check")]
        file: PathBuf,
    },

    /// Print the token stream, one token per line
    Tokenize {
        #[arg(help = "The .yadl file to tokenize")]
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Command::Compile { file, output } => {
            let source = read_source(&file);
            let asm = yadl::compile(&source).unwrap_or_else(|err| fail(&file, err));

            let output = output.unwrap_or_else(|| default_output(&file));
            if let Err(err) = fs::write(&output, asm) {
                eprintln!("Error writing '{}': {}", output.display(), err);
                process::exit(1);
            }
            println!("Successfully translated! Location: {}", output.display());
        }

        Command::Check { file } => {
            let source = read_source(&file);
            let translation = yadl::translate(&source).unwrap_or_else(|err| fail(&file, err));
            println!(
                "{}: ok ({} methods, {} strings)",
                file.display(),
                translation.methods().count(),
                translation.data().len()
            );
        }

        Command::Tokenize { file } => {
            let source = read_source(&file);
            let tokens = yadl::tokenize(&source).unwrap_or_else(|err| fail(&file, err));
            for token in tokens {
                println!("{}:{} {:?} {}", token.line, token.column, token.kind, token);
            }
        }
    }
}

fn read_source(file: &Path) -> String {
    match fs::read_to_string(file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Error reading file '{}': {}", file.display(), err);
            process::exit(1);
        }
    }
}

fn fail(file: &Path, err: yadl::Error) -> ! {
    eprintln!("{}: {}", file.display(), err);
    process::exit(1);
}

// a bare file name has an empty parent, which joins to a relative out.asm
fn default_output(file: &Path) -> PathBuf {
    match file.parent() {
        Some(dir) => dir.join("out.asm"),
        None => PathBuf::from("out.asm"),
    }
}
