use clap::{ArgAction, Parser};
use mp4probe::{ByteWindow, Selector, util::hex_dump};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Extract boxes by path, e.g. moov/trak[1]/mdia/hdlr or TSCM/DATA$2b7b6af8/+16"
)]
struct Args {
    /// Path expression
    selector: String,

    /// MP4/QuickTime file
    path: PathBuf,

    /// Only report whether anything matches (exit 0 found, 1 not found, 2 error)
    #[arg(long, action = ArgAction::SetTrue)]
    exists: bool,

    /// Hex-dump each match instead of writing raw bytes
    #[arg(long, action = ArgAction::SetTrue)]
    hex: bool,
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let selector = Selector::parse(&args.selector)?;
    let window = ByteWindow::open(&args.path)?;

    if args.exists {
        return Ok(if selector.exists(&window)? {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        });
    }

    let mut out = std::io::stdout().lock();
    if args.hex {
        for (i, m) in selector.select(&window)?.into_iter().enumerate() {
            writeln!(
                out,
                "== Match {} payload: offset={:#x}, len={} ==",
                i,
                m.start(),
                m.len()
            )?;
            write!(out, "{}", hex_dump(&m.materialize()?, m.start()))?;
        }
    } else {
        selector.write_to(&window, &mut out)?;
    }
    out.flush()?;
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
