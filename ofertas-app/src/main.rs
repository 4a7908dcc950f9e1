use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use ofertas_common::observability::{LogConfig, init_logging};
use ofertas_config::{OfertasConfig, OfertasConfigLoader, default_config_path};
use ofertas_core::dates;
use std::path::PathBuf;

mod report;
mod runner;

#[derive(Parser)]
#[command(
    name = "ofertas",
    about = "Harvest open job offers from Spanish health research institutes",
    version
)]
struct Cli {
    /// Path to ofertas.yaml (defaults to ./ofertas.yaml, then the user config dir).
    #[arg(short, long, env = "OFERTAS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Mirror log events to stderr.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest every enabled institute (default).
    Run {
        /// Only harvest these institute ids (repeatable).
        #[arg(long = "only", value_name = "ID")]
        only: Vec<String>,

        /// Snapshot path instead of <output_dir>/ofertas_<timestamp>.json.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the report without writing a snapshot.
        #[arg(long)]
        no_save: bool,
    },

    /// List configured institutes.
    List,

    /// Show how date texts are recognised.
    Dates {
        #[arg(required = true)]
        text: Vec<String>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<OfertasConfig> {
    let path = path.unwrap_or_else(default_config_path);
    OfertasConfigLoader::new()
        .with_file(&path)
        .load()
        .with_context(|| format!("loading {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Dates { text }) = &cli.command {
        print_dates(text);
        return Ok(());
    }

    // 1) Load config (env wins)
    let cfg = load_config(cli.config)?;

    let log = &cfg.run.log;
    let log_path = init_logging(LogConfig {
        log_dir: log.dir.clone(),
        emit_stderr: log.stderr || cli.verbose,
        format: log.format,
        default_filter: log.filter.clone().unwrap_or_else(|| "info".to_string()),
        ..LogConfig::default()
    })?;
    tracing::info!(log = %log_path.display(), institutes = cfg.institutes.len(), "ofertas.start");

    match cli.command.unwrap_or(Commands::Run {
        only: Vec::new(),
        output: None,
        no_save: false,
    }) {
        Commands::List => {
            for inst in &cfg.institutes {
                let state = if inst.enabled.unwrap_or(true) { "" } else { " (disabled)" };
                println!("{:<16} {:<13} {}{state}", inst.id, inst.site.name(), inst.url);
            }
        }
        Commands::Run {
            only,
            output,
            no_save,
        } => {
            let runner = runner::build_from_config(&cfg, &only)?;
            if runner.is_empty() {
                println!("No hay centros habilitados");
                return Ok(());
            }
            println!("Procesando {} centros...", runner.len());

            let results = runner.run(dates::today()).await;
            for run in &results {
                print!("{}", report::institute_block(run));
            }
            print!("{}", report::summary(&results));

            if !no_save {
                let now = Local::now();
                let path = output
                    .unwrap_or_else(|| report::default_snapshot_path(&cfg.run.output_dir, now));
                report::save_snapshot(&path, &report::Snapshot::new(&results, now))?;
                println!("\nResultados guardados en: {}", path.display());
            }
        }
        Commands::Dates { text } => print_dates(&text),
    }

    Ok(())
}

fn print_dates(texts: &[String]) {
    for text in texts {
        println!("{text:?}");
        match dates::parse(text) {
            Some(d) => println!("  parse:      {}", dates::format(d)),
            None => println!("  parse:      -"),
        }
        let found = dates::extract_all(text);
        if !found.is_empty() {
            let all: Vec<String> = found
                .iter()
                .map(|c| format!("{} ({})", dates::format(c.date), c.matched))
                .collect();
            println!("  matches:    {}", all.join(", "));
        }
        println!("  open:       {}", dates::is_open(text));
        if let Some(days) = dates::days_until(text) {
            println!("  days left:  {days}");
        }
    }
}
