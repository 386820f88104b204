//! Proofread a DOCX: rewrite character classes by rule and highlight every edit.
//!
//! Usage:
//!   proofmark proof --input data/ [-o out.docx] [--rules rules.csv] \
//!     [--log conversion_rules_log.txt] [--log-format text|csv]
//!   proofmark unpack --docx input.docx --dir xml/
//!   proofmark pack --dir xml/ -o output.docx

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use proofmark::container::{
    default_output_path, find_docx_in_dir, pack_dir, process_entries, read_docx, unpack_docx,
    write_docx, PartSelector,
};
use proofmark::{AuditSink, CsvAuditLog, Engine, MergeConfig, RuleSet, TextAuditLog};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "proofmark")]
#[command(about = "Rule-based DOCX proofreading with highlighted edits")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Proofread a DOCX and write a highlighted copy
    Proof {
        /// Input DOCX, or a folder whose first .docx is used
        #[arg(short, long, default_value = "data")]
        input: PathBuf,

        /// Output DOCX (default: 【校閲ずみ】<name>.docx next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rule CSV replacing the built-in Japanese rule set
        #[arg(long, env = "PROOFMARK_RULES")]
        rules: Option<PathBuf>,

        /// Audit log file
        #[arg(long, default_value = "conversion_rules_log.txt")]
        log: PathBuf,

        /// Audit log format
        #[arg(long, value_enum, default_value_t = LogFormat::Text)]
        log_format: LogFormat,

        /// Also proofread headers
        #[arg(long)]
        include_headers: bool,

        /// Also proofread footnotes and endnotes
        #[arg(long)]
        include_notes: bool,

        /// Skip footers
        #[arg(long)]
        no_footers: bool,

        /// Match across run boundaries within a paragraph
        #[arg(long)]
        paragraph_window: bool,

        /// Extra fragile run texts merged with their neighbours (repeatable)
        #[arg(long = "fragile")]
        fragile: Vec<String>,

        /// Process paragraphs in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Extract a DOCX into a folder of XML parts
    Unpack {
        #[arg(long)]
        docx: PathBuf,

        #[arg(long)]
        dir: PathBuf,
    },

    /// Zip a folder of XML parts into a DOCX
    Pack {
        #[arg(long)]
        dir: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Csv,
}

#[allow(clippy::too_many_arguments)]
fn run_proof(
    input: &PathBuf,
    output: Option<&PathBuf>,
    rules: Option<&PathBuf>,
    log: &PathBuf,
    log_format: LogFormat,
    selector: PartSelector,
    merge: MergeConfig,
    parallel: bool,
) -> Result<()> {
    let docx = if input.is_dir() {
        find_docx_in_dir(input)?
    } else {
        input.clone()
    };
    let output = output.cloned().unwrap_or_else(|| default_output_path(&docx));

    let rule_set = match rules {
        Some(path) => {
            let set = RuleSet::from_csv_path(path)
                .with_context(|| format!("Failed to load rules: {}", path.display()))?;
            println!("Loaded {} rules from {}", set.len(), path.display());
            set
        }
        None => RuleSet::japanese_proofreading(),
    };
    let engine = Engine::builder()
        .rules(rule_set)
        .merge(merge)
        .parallel(parallel)
        .build();

    println!("Opening DOCX: {}", docx.display());
    let mut entries = read_docx(&docx)?;
    println!("  {} zip entries", entries.len());

    let log_file = BufWriter::new(
        File::create(log).with_context(|| format!("Failed to create log: {}", log.display()))?,
    );
    let mut sink: Box<dyn AuditSink> = match log_format {
        LogFormat::Text => Box::new(TextAuditLog::create(log_file)?),
        LogFormat::Csv => Box::new(CsvAuditLog::new(log_file)),
    };

    let reports = process_entries(&engine, &mut entries, &selector, sink.as_mut())?;
    for report in &reports {
        println!(
            "{}: {} paragraphs, {} changed, {} edits",
            report.part, report.paragraphs, report.changed, report.spans
        );
        for diagnostic in &report.diagnostics {
            match diagnostic.paragraph {
                Some(p) => eprintln!("  Warning: paragraph {}: {}", p + 1, diagnostic.message),
                None => eprintln!("  Warning: {}", diagnostic.message),
            }
        }
    }

    write_docx(&output, &entries)?;
    println!("\nAudit log: {}", log.display());
    println!("Saved to: {}", output.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Proof {
            input,
            output,
            rules,
            log,
            log_format,
            include_headers,
            include_notes,
            no_footers,
            paragraph_window,
            fragile,
            parallel,
        } => {
            let selector = PartSelector {
                footers: !no_footers,
                headers: include_headers,
                notes: include_notes,
            };
            let mut merge = if paragraph_window {
                MergeConfig::paragraph()
            } else {
                MergeConfig::default()
            };
            for fragment in fragile {
                merge = merge.with_fragile(fragment);
            }
            run_proof(
                &input,
                output.as_ref(),
                rules.as_ref(),
                &log,
                log_format,
                selector,
                merge,
                parallel,
            )
        }
        Commands::Unpack { docx, dir } => {
            let count = unpack_docx(&docx, &dir)?;
            println!("Extracted {} entries to {}", count, dir.display());
            Ok(())
        }
        Commands::Pack { dir, output } => {
            let count = pack_dir(&dir, &output)?;
            println!("Packed {} entries into {}", count, output.display());
            Ok(())
        }
    }
}
