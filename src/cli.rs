// Command-line front end for zipdelta.
//
// Subcommands:
// - `generate`: write a patch between two archives
// - `divine`: show the recovered deflate settings of each entry
// - `compat`: run the deflate compatibility self-check

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::deflate::{CompatibilityWindow, divine_archive};
use crate::generator::{GeneratorOptions, ScratchStorage};
use crate::io::generate_patch_file;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// File-by-file delta patches between ZIP archives.
#[derive(Parser, Debug)]
#[command(
    name = "zipdelta",
    version,
    about = "File-by-file delta patch generator for ZIP archives",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output results as JSON.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Generate a patch from an old archive to a new one.
    Generate(GenerateArgs),
    /// Print the deflate settings recovered for each entry of an archive.
    Divine(DivineArgs),
    /// Check that this build's deflate reproduces the reference output.
    Compat,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// The archive the patch applies to.
    #[arg(long, value_hint = ValueHint::FilePath)]
    old: PathBuf,

    /// The archive the patch produces.
    #[arg(long, value_hint = ValueHint::FilePath)]
    new: PathBuf,

    /// Patch output file.
    #[arg(long, value_hint = ValueHint::FilePath)]
    patch: PathBuf,

    /// Keep suffix-sort scratch arrays on the heap instead of a temp file.
    #[arg(long = "memory-scratch")]
    memory_scratch: bool,

    /// Limit on uncompressed bytes to recompress (supports K/M/G suffix).
    #[arg(long = "max-recompression", value_parser = parse_byte_size)]
    max_recompression: Option<u64>,

    /// Skip the compatibility self-check and trust this build's deflate.
    #[arg(long = "trust-runtime")]
    trust_runtime: bool,

    /// Minimum match gain before bsdiff starts a new control entry.
    #[arg(long = "min-match-length", value_parser = clap::value_parser!(u64).range(1..), default_value_t = GeneratorOptions::default().min_match_length)]
    min_match_length: u64,
}

#[derive(Args, Debug)]
struct DivineArgs {
    /// Archive to inspect.
    #[arg(value_hint = ValueHint::FilePath)]
    archive: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Generate,
    Divine,
    Compat,
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    old_file: Option<PathBuf>,
    new_file: Option<PathBuf>,
    patch_file: Option<PathBuf>,
    archive: Option<PathBuf>,
    generator: GeneratorOptions,
}

fn resolve_options(cli: Cli) -> Options {
    let mut opts = Options {
        command: Command::Compat,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        old_file: None,
        new_file: None,
        patch_file: None,
        archive: None,
        generator: GeneratorOptions::default(),
    };

    match cli.command {
        Cmd::Generate(args) => {
            opts.command = Command::Generate;
            opts.old_file = Some(args.old);
            opts.new_file = Some(args.new);
            opts.patch_file = Some(args.patch);
            opts.generator = GeneratorOptions {
                scratch: if args.memory_scratch {
                    ScratchStorage::Memory
                } else {
                    ScratchStorage::TempFile
                },
                max_recompression: args.max_recompression,
                trust_runtime: args.trust_runtime,
                min_match_length: args.min_match_length,
            };
        }
        Cmd::Divine(args) => {
            opts.command = Command::Divine;
            opts.archive = Some(args.archive);
        }
        Cmd::Compat => {}
    }
    opts
}

fn log_filter(opts: &Options) -> &'static str {
    match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("zipdelta".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Generate command
// ---------------------------------------------------------------------------

fn cmd_generate(opts: &Options) -> i32 {
    let (Some(old), Some(new), Some(patch)) = (&opts.old_file, &opts.new_file, &opts.patch_file)
    else {
        eprintln!("zipdelta: generate needs --old, --new and --patch");
        return 1;
    };

    if patch.exists() && !opts.force {
        eprintln!(
            "zipdelta: output file exists, use -f to overwrite: {}",
            patch.display()
        );
        return 1;
    }

    let stats = match generate_patch_file(old, new, patch, opts.generator) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("zipdelta: generate: {e}");
            // Do not leave a truncated patch behind.
            let _ = std::fs::remove_file(patch);
            return 1;
        }
    };
    let g = &stats.generate;

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "zipdelta: entries: {} old, {} new, {} paired; uncompressed {} old, {} new",
            g.old_entries,
            g.new_entries,
            g.paired_entries,
            g.uncompressed_old_entries,
            g.uncompressed_new_entries
        );
        eprintln!(
            "zipdelta: delta-friendly sizes: {} old, {} new; delta {}, patch {}",
            g.delta_friendly_old_size, g.delta_friendly_new_size, g.delta_size, g.patch_size
        );
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": "generate",
            "old_entries": g.old_entries,
            "new_entries": g.new_entries,
            "paired_entries": g.paired_entries,
            "uncompressed_old_entries": g.uncompressed_old_entries,
            "uncompressed_new_entries": g.uncompressed_new_entries,
            "runtime_trusted": g.runtime_trusted,
            "delta_friendly_old_size": g.delta_friendly_old_size,
            "delta_friendly_new_size": g.delta_friendly_new_size,
            "delta_size": g.delta_size,
            "patch_size": g.patch_size,
            "old_sha256": stats.old_sha256.map(|d| hex(&d)),
            "new_sha256": stats.new_sha256.map(|d| hex(&d)),
            "patch_sha256": stats.patch_sha256.map(|d| hex(&d)),
        });
        eprintln!("{json:#}");
    }

    0
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Divine command
// ---------------------------------------------------------------------------

fn cmd_divine(opts: &Options) -> i32 {
    let Some(path) = &opts.archive else {
        eprintln!("zipdelta: divine needs an archive");
        return 1;
    };

    let results = match divine_archive(path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("zipdelta: {}: {e}", path.display());
            return 1;
        }
    };

    if opts.json_output {
        let entries: Vec<_> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "name": r.entry.file_name(),
                    "method": r.entry.compression_method(),
                    "compressed_size": r.entry.compressed_size(),
                    "uncompressed_size": r.entry.uncompressed_size(),
                    "level": r.parameters.map(|p| p.level()),
                    "strategy": r.parameters.map(|p| p.strategy()),
                    "nowrap": r.parameters.map(|p| p.nowrap()),
                })
            })
            .collect();
        println!("{:#}", serde_json::Value::Array(entries));
        return 0;
    }

    if !opts.quiet {
        for r in &results {
            match r.parameters {
                Some(p) => println!("{}\t{p}", r.entry.file_name()),
                None => println!("{}\t-", r.entry.file_name()),
            }
        }
    }
    0
}

// ---------------------------------------------------------------------------
// Compat command
// ---------------------------------------------------------------------------

fn cmd_compat(opts: &Options) -> i32 {
    let incompatible = match CompatibilityWindow::new().incompatible_values() {
        Ok(values) => values,
        Err(e) => {
            eprintln!("zipdelta: compat: {e}");
            return 1;
        }
    };
    let mut mismatches: Vec<_> = incompatible.into_iter().collect();
    mismatches.sort();

    if opts.json_output {
        let list: Vec<_> = mismatches
            .iter()
            .map(|(p, actual)| {
                serde_json::json!({
                    "level": p.level(),
                    "strategy": p.strategy(),
                    "nowrap": p.nowrap(),
                    "actual": actual,
                })
            })
            .collect();
        let json = serde_json::json!({
            "compatible": mismatches.is_empty(),
            "incompatible": list,
        });
        println!("{json:#}");
    } else if !opts.quiet {
        if mismatches.is_empty() {
            println!("deflate runtime is compatible");
        }
        for (params, actual) in &mismatches {
            let actual = if actual.is_empty() { "-" } else { actual.as_str() };
            println!("{params}\t{actual}");
        }
    }

    if mismatches.is_empty() { 0 } else { 1 }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(&opts)))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Generate => cmd_generate(&opts),
        Command::Divine => cmd_divine(&opts),
        Command::Compat => cmd_compat(&opts),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
