use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use talegen_core::config::{ApiMode, TalegenConfig, load_config};
use talegen_core::listing::{ListingKind, ListingReport, generate_listings};
use talegen_core::record::{load_snapshot, save_snapshot};
use talegen_core::sink::{FileSink, RemoteSink};
use talegen_core::wikidot::{CollectedRecords, WikidotClient, WikidotClientConfig, collect_records};

#[derive(Debug, Parser)]
#[command(
    name = "talegen",
    version,
    about = "Generates the tales-by-title/author/date index pages for a Wikidot site"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", default_value = "talegen.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Build the listings and persist their pages")]
    Generate(GenerateArgs),
    #[command(about = "Fetch and resolve all tale records into a JSON snapshot")]
    Snapshot(SnapshotArgs),
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(
        long,
        value_name = "LISTING",
        help = "Which listing to build: title, author, date, or all",
        default_value = "all"
    )]
    listing: String,
    #[arg(long, value_name = "PATH", help = "Read records from a snapshot instead of the API")]
    snapshot: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Directory for read-only page output")]
    output_dir: Option<PathBuf>,
    #[arg(long, help = "Publish to the wiki regardless of the configured mode")]
    publish: bool,
    #[arg(long, help = "Print the listing reports as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct SnapshotArgs {
    #[arg(long, value_name = "PATH")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    let config = load_config(&cli.config)?;

    match cli.command {
        Some(Commands::Generate(args)) => run_generate(&config, args),
        Some(Commands::Snapshot(args)) => run_snapshot(&config, args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run_generate(config: &TalegenConfig, args: GenerateArgs) -> Result<()> {
    let kinds = parse_listing_selection(&args.listing)?;
    let mode = if args.publish {
        ApiMode::ReadWrite
    } else {
        config.api_mode()?
    };

    let (collected, request_count) = match &args.snapshot {
        Some(path) => (
            CollectedRecords {
                records: load_snapshot(path)?,
                warnings: Vec::new(),
            },
            0,
        ),
        None => fetch_records(config)?,
    };
    let records = collected.records;

    println!("generate");
    println!("listings: {}", args.listing);
    println!("mode: {}", mode.as_str());
    println!("records: {}", records.len());
    if request_count > 0 {
        println!("api_requests: {request_count}");
    }
    print_warnings("fetch", &collected.warnings);

    let reports = match mode {
        ApiMode::ReadOnly => {
            let output_dir = args
                .output_dir
                .unwrap_or_else(|| PathBuf::from(config.output_dir()));
            println!("output_dir: {}", output_dir.display());
            let mut sink = FileSink::new(output_dir);
            generate_listings(&records, &kinds, &mut sink)?
        }
        ApiMode::ReadWrite => {
            let mut client = WikidotClient::new(WikidotClientConfig::from_config(config)?)?;
            let mut sink = RemoteSink::new(&mut client);
            generate_listings(&records, &kinds, &mut sink)?
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_listing_report(report);
        }
    }
    Ok(())
}

fn run_snapshot(config: &TalegenConfig, args: SnapshotArgs) -> Result<()> {
    let (collected, request_count) = fetch_records(config)?;
    save_snapshot(&args.output, &collected.records)?;

    println!("snapshot");
    println!("output: {}", args.output.display());
    println!("records: {}", collected.records.len());
    println!("api_requests: {request_count}");
    print_warnings("fetch", &collected.warnings);
    Ok(())
}

fn fetch_records(config: &TalegenConfig) -> Result<(CollectedRecords, usize)> {
    use talegen_core::wikidot::TaleSource;

    let mut client = WikidotClient::new(WikidotClientConfig::from_config(config)?)?;
    let attribution_table = client.attribution_table()?;
    let collected = collect_records(&mut client, &config.tag(), &attribution_table)?;
    Ok((collected, client.request_count()))
}

fn parse_listing_selection(value: &str) -> Result<Vec<ListingKind>> {
    match value.to_ascii_lowercase().as_str() {
        "all" => Ok(ListingKind::ALL.to_vec()),
        "title" => Ok(vec![ListingKind::ByTitle]),
        "author" => Ok(vec![ListingKind::ByAuthor]),
        "date" => Ok(vec![ListingKind::ByDate]),
        other => bail!("unsupported listing: {other} (expected title|author|date|all)"),
    }
}

fn print_listing_report(report: &ListingReport) {
    println!("{}.records: {}", report.listing, report.records);
    println!("{}.placements: {}", report.listing, report.placements);
    println!("{}.fragments: {}", report.listing, report.fragments);
    println!("{}.pages_written: {}", report.listing, report.pages_written);
    println!("{}.skipped: {}", report.listing, report.skipped);
    print_warnings(&report.listing, &report.warnings);
}

fn print_warnings(scope: &str, warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!("{scope}.warnings:");
    for warning in warnings {
        println!("  - {warning}");
    }
}
