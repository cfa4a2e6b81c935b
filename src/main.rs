use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod jobs;
mod scheme;
mod value;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "suite-migrate")]
#[command(about = "Test-suite schema migration and job expansion", long_about = None)]
struct Cli {
    /// Optional YAML file with `rewrite:` and `expand:` option sections.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate a document to the current layout using a rule table.
    Convert {
        #[arg(short, long, value_enum)]
        kind: scheme::Kind,

        /// Rule table (YAML or JSON). Defaults to the bundled one.
        #[arg(short, long)]
        scheme: Option<PathBuf>,

        /// Print the result instead of writing `new-<file>`. Required when
        /// the input is `-` (standard input).
        #[arg(long)]
        stdout: bool,

        /// Fail when two rewritten keys land on the same path.
        #[arg(long)]
        strict_collisions: bool,

        /// Document to migrate, or `-` for standard input.
        input: PathBuf,
    },

    /// Expand a suite of test entries into build/run jobs (JSON on stdout).
    Expand {
        /// Compiler descriptor (commands + variants).
        #[arg(long)]
        compiler: PathBuf,

        /// Prefix for job ids; defaults to the suite file stem. Required when
        /// the suite is read from standard input.
        #[arg(long)]
        namespace: Option<String>,

        #[arg(long)]
        strict_variants: bool,

        #[arg(long)]
        strict_deps: bool,

        #[arg(long)]
        strict_language: bool,

        suite: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => config::Settings::load(path)?,
        None => config::Settings::default(),
    };

    match cli.cmd {
        Commands::Convert {
            kind,
            scheme: scheme_path,
            stdout,
            strict_collisions,
            input,
        } => {
            if value::is_stdin(&input) && !stdout {
                anyhow::bail!("reading from standard input requires --stdout");
            }
            let mut options = settings.rewrite;
            if strict_collisions {
                options.collisions = config::CollisionPolicy::Error;
            }

            // 1) Compile the rule table before touching the input.
            let rules = match &scheme_path {
                Some(path) => scheme::load_rules(path)
                    .with_context(|| format!("load rule table {}", path.display()))?,
                None => scheme::default_rules().context("load bundled rule table")?,
            };

            // 2) Rewrite.
            let doc = value::read_yaml(&input)?;
            let (out, report) = scheme::convert(&doc, kind, &rules, &options)?;
            let text = serde_yaml::to_string(&out)?;

            // 3) Emit.
            if stdout {
                print!("{}", text);
            } else {
                let target = sibling_output(&input)?;
                std::fs::write(&target, text)
                    .with_context(|| format!("write {}", target.display()))?;
                println!("Wrote {}", target.display());
            }
            debug!(
                misses = report.misses.len(),
                dropped = report.dropped.len(),
                collisions = report.collisions.len(),
                "converted"
            );
        }
        Commands::Expand {
            compiler,
            namespace,
            strict_variants,
            strict_deps,
            strict_language,
            suite,
        } => {
            let mut options = settings.expand;
            if strict_variants {
                options.variants = config::LookupPolicy::Error;
            }
            if strict_deps {
                options.dependencies = config::LookupPolicy::Error;
            }
            if strict_language {
                options.language = config::LookupPolicy::Error;
            }

            let compiler = jobs::CompilerDescriptor::from_value(&value::read_yaml(&compiler)?)?;
            let namespace = match namespace {
                Some(ns) => ns,
                None => Some(suite.as_path())
                    .filter(|p| !value::is_stdin(p))
                    .and_then(Path::file_stem)
                    .and_then(|s| s.to_str())
                    .context("suite path has no usable file stem; pass --namespace")?
                    .to_string(),
            };

            let doc = value::read_yaml(&suite)?;
            let jobs = jobs::expand_suite(&namespace, &doc, &compiler, &options)?;
            println!("{}", serde_json::to_string_pretty(&jobs)?);
        }
    }

    Ok(())
}

/// `dir/file.yml` -> `dir/new-file.yml`.
fn sibling_output(input: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("input path {} has no file name", input.display()))?;
    Ok(input.with_file_name(format!("new-{}", name)))
}
