use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use safeout_core::{Destination, SafeOutput};
use tracing::Level;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "SAFEOUT_LOG";
const MAX_MODE: u32 = 0o7777;

#[derive(Parser)]
#[command(
    name = "safeout",
    about = "Copy input to a file that readers only ever see complete",
    author,
    version
)]
struct Cli {
    /// 輸出路徑；`-`、`/dev/stdout`、`/dev/stderr` 代表標準串流。 / Output path; `-`, `/dev/stdout` and `/dev/stderr` select standard streams.
    #[arg(value_name = "OUTPUT")]
    output: OsString,

    /// 依序讀取的輸入檔；未指定時讀取 stdin。 / Input files read in order; stdin when omitted (`-` also means stdin).
    #[arg(short, long = "input", value_name = "FILE")]
    inputs: Vec<PathBuf>,

    /// 以八進位表示的檔案權限。 / Permission mode in octal (`644`, `0600`, `0o640`).
    #[arg(short, long, value_name = "OCTAL", default_value = "644", value_parser = parse_mode)]
    mode: u32,

    /// 沒有輸入時保留原檔案。 / Leave the output untouched when no bytes were read.
    #[arg(long)]
    skip_empty: bool,

    /// 輸出除錯訊息。 / Emit debug diagnostics on stderr.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut output = SafeOutput::new(&cli.output, cli.mode);
    let label = describe(Path::new(&cli.output), output.destination());

    let mut copied = 0u64;
    if cli.inputs.is_empty() {
        copied += copy_stdin(&mut output).context("failed to copy stdin")?;
    } else {
        for input in &cli.inputs {
            copied += copy_input(input, &mut output)?;
        }
    }

    if copied == 0 {
        if cli.skip_empty {
            tracing::info!("no input; leaving {label} untouched");
        } else {
            // Stage an empty replacement so close still truncates the target.
            output
                .begin()
                .with_context(|| format!("failed to prepare {label}"))?;
        }
    }
    output
        .close()
        .with_context(|| format!("failed to commit {label}"))?;
    tracing::debug!("copied {copied} bytes to {label}");
    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env(LOG_ENV).add_directive(level.into()))
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn copy_stdin(output: &mut SafeOutput) -> io::Result<u64> {
    let stdin = io::stdin();
    let mut handle = stdin.lock();
    io::copy(&mut handle, output)
}

fn copy_input(input: &Path, output: &mut SafeOutput) -> Result<u64> {
    if input.as_os_str() == "-" {
        return copy_stdin(output).context("failed to copy stdin");
    }
    let mut file =
        File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    io::copy(&mut file, output).with_context(|| format!("failed to copy {}", input.display()))
}

fn describe(output: &Path, destination: Destination) -> String {
    if destination.is_stream() {
        destination.name().to_string()
    } else {
        output.display().to_string()
    }
}

fn parse_mode(raw: &str) -> Result<u32, String> {
    let digits = raw.strip_prefix("0o").unwrap_or(raw);
    let mode = u32::from_str_radix(digits, 8)
        .map_err(|_| format!("'{raw}' is not an octal permission mode"))?;
    if mode > MAX_MODE {
        return Err(format!("'{raw}' exceeds {MAX_MODE:o}"));
    }
    Ok(mode)
}
