use clap::{ArgAction, Parser};
use mp4probe::{
    check::{Status, check_file},
    config::CheckOptions,
    report::{JsonReport, render_text},
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Check MP4/QuickTime files for truncation and index placement")]
struct Args {
    /// Files to check
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// JSON file with check options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Limit container nesting
    #[arg(long)]
    max_depth: Option<usize>,

    /// Byte offset past which a missing index is reported
    #[arg(long)]
    index_threshold: Option<u64>,

    /// Do not write the sibling result file
    #[arg(long, action = ArgAction::SetTrue)]
    no_result_file: bool,

    /// Emit JSON instead of the human-readable tree
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

impl Args {
    fn options(&self) -> anyhow::Result<CheckOptions> {
        let mut opts = match &self.config {
            Some(path) => CheckOptions::from_json_file(path)?,
            None => CheckOptions::default(),
        };
        if let Some(d) = self.max_depth {
            opts.parse.max_depth = d;
        }
        if let Some(t) = self.index_threshold {
            opts.index_threshold = t;
        }
        if self.no_result_file {
            opts.write_result = false;
        }
        Ok(opts)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let opts = args.options()?;

    let mut last = Status::Good;
    for (i, path) in args.paths.iter().enumerate() {
        if i > 0 && !args.json {
            println!();
        }
        let outcome = check_file(path, &opts)?;
        last = outcome.status;

        if args.json {
            let report = JsonReport::new(
                outcome.path.display().to_string(),
                &outcome.tree,
                outcome.status,
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
            continue;
        }

        println!("{}", outcome.path.display());
        print!("{}", render_text(&outcome.tree));
        match outcome.status {
            Status::Good => println!("file looks okay"),
            Status::IndexNotNearFront => println!("index not at beginning of file!"),
            s => println!("status: {}", s.text()),
        }
        for w in &outcome.warnings {
            println!("{w}");
        }
    }

    // the exit code only carries a status when a single file was checked
    if args.paths.len() == 1 {
        std::process::exit(last.code());
    }
    Ok(())
}
