use bling_deck::catalog::analyze::write_report_csv;
use bling_deck::catalog::scryfall::SCRYFALL_API_URL;
use bling_deck::catalog::{analyze_decklist, CardService, CardStore, ScryfallClient};
use bling_deck::utils::logger;
use bling_deck::BlingError;
use clap::{Parser, ValueEnum};
use std::io::Read;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "analyze")]
#[command(about = "List every printing of each card in a decklist, cheapest first")]
struct Args {
    /// Decklist file, or `-` for stdin
    decklist: String,

    #[arg(long, default_value = "app/data/cards.db")]
    database: PathBuf,

    /// Do not query Scryfall for cards missing from the database
    #[arg(long)]
    no_fallback: bool,

    #[arg(long, default_value = SCRYFALL_API_URL)]
    scryfall_url: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    #[arg(short, long, help = "Enable verbose output")]
    verbose: bool,
}

fn read_decklist(source: &str) -> Result<String, BlingError> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(source)?)
    }
}

async fn run(args: &Args) -> Result<(), BlingError> {
    let store = CardStore::open(&args.database)?;
    tracing::debug!("Card database has {} rows", store.count()?);

    let fallback = if args.no_fallback {
        None
    } else {
        Some(ScryfallClient::new(args.scryfall_url.clone())?)
    };
    let service = CardService::new(store, fallback);

    let decklist = read_decklist(&args.decklist)?;
    let report = analyze_decklist(&service, &decklist).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Csv => write_report_csv(&report, std::io::stdout().lock())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logger::init_from_env(args.verbose);

    if let Err(e) = run(&args).await {
        tracing::error!(
            "❌ Analysis failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(e.exit_code().max(1));
    }
}
