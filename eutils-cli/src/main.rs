use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use eutils_automater::{
    Automater, ClientConfig, EntrezParameters, EutilsClient, RunState,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod output;

use output::{FileListener, ProgressLogger};

#[derive(Parser, Debug)]
#[command(
    name = "eutils-automate",
    about = "Search and fetch a list of terms from NCBI E-utilities in paced batches",
    long_about = "Runs every term through ESearch and EFetch, several terms per request if asked, \
                  pausing between requests as NCBI requires. Fetched records are written to \
                  stdout or to --output."
)]
struct Cli {
    /// Search terms (keywords, phrases or accession numbers)
    terms: Vec<String>,

    /// Read additional terms from a file, one per line
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Write fetched records to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Append to the output file instead of overwriting it
    #[arg(long, requires = "output")]
    append: bool,

    /// Number of terms sent per search (1-100)
    #[arg(short = 'n', long, default_value_t = 1)]
    max_retrieval: usize,

    /// Number of failed requests tolerated before giving up
    #[arg(short = 'e', long, default_value_t = 4)]
    max_errors: usize,

    /// Entrez database to search
    #[arg(long, default_value = "pubmed")]
    database: String,

    /// Record format requested from EFetch
    #[arg(long, default_value = "xml")]
    rettype: String,

    /// Maximum identifiers returned per search (raised to the batch size when lower)
    #[arg(long, default_value_t = 100)]
    retmax: usize,

    /// Retrieval mode requested from EFetch
    #[arg(long, default_value = "xml")]
    retmode: String,

    /// Post searches to the history server and fetch through it
    #[arg(long)]
    use_history: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// API key for NCBI E-utilities
    #[arg(long, env = "NCBI_API_KEY")]
    api_key: Option<String>,

    /// Email for NCBI requests
    #[arg(long, env = "NCBI_EMAIL")]
    email: Option<String>,

    /// Tool name for NCBI requests
    #[arg(long, env = "NCBI_TOOL")]
    tool: Option<String>,
}

impl Cli {
    fn collect_terms(&self) -> Result<Vec<String>> {
        let mut terms = self.terms.clone();

        if let Some(path) = &self.input {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read terms from {}", path.display()))?;
            terms.extend(parse_terms(&content));
        }

        Ok(terms)
    }

    fn client_config(&self) -> ClientConfig {
        let parameters = EntrezParameters::new()
            .with_database(&self.database)
            .with_ret_type(&self.rettype)
            .with_ret_mode(&self.retmode)
            .with_ret_max(self.retmax)
            .with_use_history(self.use_history)
            .with_print_esearch_output(self.verbose)
            .with_print_efetch_output(self.verbose);

        let mut config = ClientConfig::new().with_parameters(parameters);
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key);
        }
        if let Some(email) = &self.email {
            config = config.with_email(email);
        }
        if let Some(tool) = &self.tool {
            config = config.with_tool(tool);
        }
        config
    }
}

/// One term per non-blank line
fn parse_terms(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let terms = cli.collect_terms()?;
    if terms.is_empty() {
        bail!("No search terms given; pass terms as arguments or with --input");
    }

    let client = EutilsClient::with_config(cli.client_config())?;
    let automater = Automater::with_service(terms, Arc::new(client))?;
    automater.set_max_retrieval(cli.max_retrieval)?;
    automater.set_max_error_count(cli.max_errors)?;
    automater.add_thread_listener(Arc::new(ProgressLogger));

    if let Some(path) = &cli.output {
        automater.add_output_listener(Arc::new(FileListener::create(path, cli.append)?));
    }

    tracing::info!(
        terms = automater.terms().len(),
        max_retrieval = cli.max_retrieval,
        database = %cli.database,
        "Starting batch run"
    );

    let state = automater.start()?.await?;
    if state == RunState::Aborted {
        bail!("Run aborted before every term was processed");
    }

    Ok(())
}
