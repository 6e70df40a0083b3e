//! odtei CLI - OpenDocument to TEI conversion tool

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use odtei::{
    parse_file_with_options, Artifact, Conversion, ConversionStats, ConversionStatus, Engine,
    OutputSet, Settings,
};

#[derive(Parser)]
#[command(name = "odtei")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Convert OpenDocument critical-edition manuscripts to TEI P5", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one document to TEI plus three ledgers
    Convert {
        /// content.xml part or flat .fodt document
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory (defaults to the input's directory)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// JSON settings file
        #[arg(short, long, value_name = "FILE", env = "ODTEI_CONFIG")]
        config: Option<PathBuf>,

        /// TEI output path
        #[arg(long, value_name = "FILE")]
        tei: Option<PathBuf>,

        /// Lost-comments ledger path
        #[arg(long, value_name = "FILE")]
        comments: Option<PathBuf>,

        /// Lost-apparatus ledger path
        #[arg(long, value_name = "FILE")]
        apparatus: Option<PathBuf>,

        /// Problematic-annotations ledger path
        #[arg(long, value_name = "FILE")]
        problematic: Option<PathBuf>,

        /// Also write a JSON report
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,

        /// Print TEI to stdout instead of writing files
        #[arg(long)]
        stdout: bool,

        /// Exit with status 2 when any annotation is lost or problematic
        #[arg(long)]
        fail_on_loss: bool,
    },

    /// Convert many documents in parallel
    Batch {
        /// Input files
        #[arg(value_name = "FILES", required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// JSON settings file
        #[arg(short, long, value_name = "FILE", env = "ODTEI_CONFIG")]
        config: Option<PathBuf>,

        /// Number of worker threads (defaults to the number of CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Exit with status 2 when any document is partial
        #[arg(long)]
        fail_on_loss: bool,
    },

    /// Validate a settings file
    CheckConfig {
        /// JSON settings file
        #[arg(value_name = "FILE")]
        config: PathBuf,
    },

    /// Show document information
    Info {
        /// content.xml part or flat .fodt document
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// JSON settings file
        #[arg(short, long, value_name = "FILE", env = "ODTEI_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Exit status 2: finished, but with lost or problematic annotations.
const EXIT_PARTIAL: u8 = 2;

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            input,
            output,
            config,
            tei,
            comments,
            apparatus,
            problematic,
            json,
            stdout,
            fail_on_loss,
        } => {
            let overrides = [
                (Artifact::Tei, tei),
                (Artifact::LostComments, comments),
                (Artifact::LostApparatus, apparatus),
                (Artifact::Problematic, problematic),
                (Artifact::Report, json),
            ];
            cmd_convert(&input, output.as_deref(), config.as_deref(), overrides, stdout)
                .map(|status| partial_exit(status == ConversionStatus::Partial, fail_on_loss))
        }
        Commands::Batch {
            inputs,
            output,
            config,
            jobs,
            fail_on_loss,
        } => cmd_batch(&inputs, &output, config.as_deref(), jobs).map(|partial| {
            partial_exit(partial, fail_on_loss)
        }),
        Commands::CheckConfig { config } => cmd_check_config(&config).map(|_| ExitCode::SUCCESS),
        Commands::Info { input, config } => {
            cmd_info(&input, config.as_deref()).map(|_| ExitCode::SUCCESS)
        }
        Commands::Version => {
            cmd_version();
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn partial_exit(partial: bool, fail_on_loss: bool) -> ExitCode {
    if partial && fail_on_loss {
        ExitCode::from(EXIT_PARTIAL)
    } else {
        ExitCode::SUCCESS
    }
}

fn load_settings(config: Option<&Path>) -> CliResult<Settings> {
    Ok(match config {
        Some(path) => Settings::from_json_file(path)?,
        None => Settings::default(),
    })
}

fn load_engine(config: Option<&Path>) -> CliResult<Engine> {
    Ok(Engine::from_settings(load_settings(config)?)?)
}

fn print_summary(input: &Path, conversion: &Conversion) {
    let stats = &conversion.stats;
    let status = match conversion.status() {
        ConversionStatus::Complete => "complete".green().bold(),
        ConversionStatus::Partial => "partial".yellow().bold(),
    };
    println!("{} {} ({})", "Converted".green(), input.display(), status);
    println!(
        "  {} {} placed, {} lost comments, {} lost apparatus, {} problematic",
        "├─".dimmed(),
        stats.placed_count,
        stats.lost_comment_count,
        stats.lost_apparatus_count,
        stats.problematic_count
    );
    println!(
        "  {} {} paragraphs, {} characters removed by normalization",
        "└─".dimmed(),
        stats.paragraph_count,
        stats.removed_char_count
    );
}

fn cmd_convert(
    input: &Path,
    output: Option<&Path>,
    config: Option<&Path>,
    overrides: [(Artifact, Option<PathBuf>); 5],
    stdout: bool,
) -> CliResult<ConversionStatus> {
    let engine = load_engine(config)?;
    let conversion = engine.convert_file(input)?;

    if stdout {
        print!("{}", conversion.tei);
        return Ok(conversion.status());
    }

    let output_dir = output
        .map(|p| p.to_path_buf())
        .or_else(|| input.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut outputs = OutputSet::for_input(&output_dir, input);
    for (artifact, path) in overrides {
        if let Some(path) = path {
            outputs = outputs.with_path(artifact, path);
        }
    }
    let written = outputs.persist(&conversion)?;

    print_summary(input, &conversion);
    println!("\n{}", "Output files:".green().bold());
    for (i, path) in written.iter().enumerate() {
        let branch = if i + 1 == written.len() { "└─" } else { "├─" };
        println!("  {} {}", branch.dimmed(), path.display());
    }

    Ok(conversion.status())
}

fn cmd_batch(
    inputs: &[PathBuf],
    output: &Path,
    config: Option<&Path>,
    jobs: Option<usize>,
) -> CliResult<bool> {
    let engine = load_engine(config)?;

    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(n) = jobs {
        pool = pool.num_threads(n);
    }
    let pool = pool.build()?;

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let results: Vec<(&PathBuf, odtei::Result<Conversion>)> = pool.install(|| {
        inputs
            .par_iter()
            .map(|input| {
                let result = engine.convert_file(input).and_then(|conversion| {
                    OutputSet::for_input(output, input).persist(&conversion)?;
                    Ok(conversion)
                });
                pb.set_message(input.display().to_string());
                pb.inc(1);
                (input, result)
            })
            .collect()
    });
    pb.finish_with_message("Done!");

    let mut failed = 0;
    let mut partial = 0;
    let mut total = ConversionStats::default();
    println!();
    for (input, result) in &results {
        match result {
            Ok(conversion) => {
                if conversion.status() == ConversionStatus::Partial {
                    partial += 1;
                }
                total.merge(&conversion.stats);
                print_summary(input, conversion);
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} {}: {}", "Failed".red().bold(), input.display(), e);
            }
        }
    }

    println!(
        "\n{} {} converted, {} partial, {} failed",
        "Done!".green().bold(),
        results.len() - failed,
        partial,
        failed
    );
    println!(
        "  {} {} of {} annotations placed, {} lost, {} problematic",
        "└─".dimmed(),
        total.placed_count,
        total.annotation_count,
        total.lost_count(),
        total.problematic_count
    );

    if failed > 0 {
        return Err(format!("{} of {} documents failed", failed, results.len()).into());
    }
    Ok(partial > 0)
}

fn cmd_check_config(config: &Path) -> CliResult<()> {
    let settings = Settings::from_json_file(config)?;
    Engine::from_settings(settings.clone())?;

    println!("{} {}", "Valid".green().bold(), config.display());
    println!(
        "  {} apparatus styles: {}",
        "├─".dimmed(),
        settings.engine.apparatus_styles.join(", ")
    );
    println!(
        "  {} comment styles: {}",
        "├─".dimmed(),
        settings.engine.comment_styles.join(", ")
    );
    println!(
        "  {} witnesses: {}",
        "├─".dimmed(),
        settings.engine.witness_ids().join(", ")
    );
    println!(
        "  {} normalization rules: {}",
        "└─".dimmed(),
        settings.engine.normalization.len()
    );
    Ok(())
}

fn cmd_info(input: &Path, config: Option<&Path>) -> CliResult<()> {
    let settings = load_settings(config)?;
    let format = odtei::detect_format_from_path(input)?;
    let doc = parse_file_with_options(input, settings.parse.clone())?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Format".bold(), format);
    if let Some(ref title) = doc.metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    if let Some(ref author) = doc.metadata.author {
        println!("{}: {}", "Author".bold(), author);
    }
    if let Some(ref language) = doc.metadata.language {
        println!("{}: {}", "Language".bold(), language);
    }

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let text = doc.plain_text();
    let headings = doc.paragraphs.iter().filter(|p| p.is_heading()).count();
    println!("{}: {}", "Paragraphs".bold(), doc.paragraph_count());
    println!("{}: {}", "Headings".bold(), headings);
    println!("{}: {}", "Words".bold(), text.split_whitespace().count());
    println!("{}: {}", "Annotations".bold(), doc.annotation_count());

    let engine = Engine::from_settings(settings)?;
    let conversion = engine.convert_document(&doc)?;
    let stats = &conversion.stats;
    println!("{}: {}", "Placed".bold(), stats.placed_count);
    println!("{}: {}", "Lost".bold(), stats.lost_count());
    println!("{}: {}", "Problematic".bold(), stats.problematic_count);

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "odtei".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("OpenDocument to TEI P5 conversion tool");
    println!();
    println!("License: MIT");
}
