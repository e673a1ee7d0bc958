//! Terminal dashboard for a running AAS simulation server.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use aas_client::events::EventStream;
use aas_client::{
    poller, reset_billing, AlwaysConfirm, ApiClient, Composer, Confirm, ExportFormat, Navigator,
    Page, PollState, ResetOutcome, SubmitOutcome, DEFAULT_BASE_URL,
};
use aas_core::{BatchDraft, ComposerSite, ConfigUpdate, Coords, JobSource, QueueJob, JOB_POS1};
use aas_sim::render;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

/// Dashboard for the AAS simulation backend
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Backend URL (can also be set via AAS_API_URL env var)
    #[arg(long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cycle status, billing and queue
    Overview {
        /// Refresh until Ctrl-C
        #[arg(short, long)]
        watch: bool,
    },
    /// Device submodels
    Devices,
    /// Job queue
    Queue {
        #[command(subcommand)]
        action: Option<QueueAction>,
    },
    /// Start a cycle for the queued jobs of a site
    Run {
        #[arg(long, default_value = JOB_POS1)]
        site: String,
        /// Number of jobs to process (all when omitted)
        #[arg(long)]
        max_jobs: Option<usize>,
    },
    /// Status of a run, or the live cycle status without a run id
    Status { run_id: Option<String> },
    /// Submit a single engraving job
    Direct {
        #[arg(long)]
        text: String,
        #[arg(long, default_value = JOB_POS1, value_parser = parse_site)]
        site: ComposerSite,
    },
    /// Submit up to 5 jobs as one batch
    Batch {
        #[arg(long, default_value = JOB_POS1, value_parser = parse_site)]
        site: ComposerSite,
        /// Engraving text, repeat for every job
        #[arg(long = "text", required = true)]
        texts: Vec<String>,
    },
    /// Run predefined scenario 1 (batch) or 2 (individual)
    Scenario {
        #[arg(value_parser = clap::value_parser!(u8).range(1..=2))]
        number: u8,
        /// Go through the composer and wait for the result
        #[arg(long)]
        composer: bool,
    },
    /// Billing breakdown
    Billing {
        /// Per-job records instead of the combined view
        #[arg(long)]
        jobs: bool,
        /// Restrict per-job records to one source (direct, batch, scenario)
        #[arg(long, value_parser = parse_source)]
        source: Option<JobSource>,
    },
    /// Reset user job billing
    ResetBilling {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Simulation configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
    /// Run history
    History {
        #[arg(long)]
        limit: Option<usize>,
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },
    /// Follow the server event stream
    Events,
    /// Check an order number against the X-NNNN format
    ValidateOrder { order_no: String },
}

#[derive(Subcommand, Debug)]
enum QueueAction {
    /// Append a job
    Add {
        #[arg(long)]
        order_no: String,
        #[arg(long)]
        text: String,
        #[arg(long, default_value = JOB_POS1)]
        site: String,
    },
    /// Remove a job by order number
    Remove { order_no: String },
    /// Remove every job
    Clear,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    /// Apply a partial update given as JSON, e.g. '{"agv":{"costPerMeter_EUR":0.03}}'
    Set { patch: String },
    /// Restore the defaults
    Reset,
    /// Show the defaults without applying them
    Defaults,
    /// Update coordinates given as JSON, e.g. '{"JOB_POS1":[10,4]}'
    Coords { patch: String },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// Details of one run
    Show { run_id: String },
    /// Aggregated statistics
    Stats,
    /// Write the history to a file
    Export {
        #[arg(value_enum)]
        format: Format,
        /// Output file (defaults to aas_history_<timestamp>.<ext>)
        #[arg(short, long)]
        out: Option<String>,
    },
    /// Delete the whole history
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Json,
    Csv,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => ExportFormat::Json,
            Format::Csv => ExportFormat::Csv,
        }
    }
}

fn parse_site(s: &str) -> Result<ComposerSite, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_source(s: &str) -> Result<JobSource, String> {
    s.parse()
}

/// Prints redirects; the caller renders the target page.
struct Terminal;

impl Navigator for Terminal {
    fn navigate(&self, page: Page) {
        println!("-> {page:?}");
    }
}

struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    aas_telemetry::init_logging("warn")?;

    let url = args
        .url
        .or_else(|| std::env::var("AAS_API_URL").ok())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let client = ApiClient::new(&url)?;

    match args.command {
        Command::Overview { watch: false } => overview(&client).await?,
        Command::Overview { watch: true } => watch_overview(&client).await?,
        Command::Devices => print!("{}", render::devices(&client.devices().await?)),
        Command::Queue { action } => queue(&client, action).await?,
        Command::Run { site, max_jobs } => {
            let started = client.run_cycle(&site, max_jobs).await?;
            println!("{}", started.message);
            println!("Run {} ({} job(s) expected)", started.run_id, started.estimated_jobs);
        }
        Command::Status { run_id: Some(run_id) } => {
            print!("{}", render::run(&client.run_status(&run_id).await?));
        }
        Command::Status { run_id: None } => {
            print!("{}", render::cycle_status(&client.cycle_status().await?));
        }
        Command::Direct { text, site } => {
            let outcome = Composer::new(client.clone()).submit_direct(&text, site).await;
            follow(&client, outcome).await?;
        }
        Command::Batch { site, texts } => {
            let draft = BatchDraft::from_texts(site, texts);
            let outcome = Composer::new(client.clone()).submit_batch(&draft).await;
            follow(&client, outcome).await?;
        }
        Command::Scenario { number, composer: true } => {
            let outcome = Composer::new(client.clone()).run_scenario(number).await;
            follow(&client, outcome).await?;
        }
        Command::Scenario { number, composer: false } => {
            let started = client.start_scenario(number).await?;
            println!("{}", started.message);
            println!("Run {}: {}", started.run_id, started.expected_jobs.join(", "));
        }
        Command::Billing { jobs: false, .. } => {
            print!("{}", render::combined_billing(&client.combined_billing().await?));
        }
        Command::Billing { jobs: true, source } => {
            let currency = client.config().await?.config.currency;
            let report = client.individual_jobs(source).await?;
            print!("{}", render::individual_jobs(&report, &currency));
        }
        Command::ResetBilling { yes } => {
            let confirm: Box<dyn Confirm> = if yes {
                Box::new(AlwaysConfirm)
            } else {
                Box::new(StdinConfirm)
            };
            let mut refresh = false;
            match reset_billing(&client, confirm.as_ref(), || refresh = true).await {
                ResetOutcome::Cancelled => println!("Cancelled"),
                ResetOutcome::Reset(message) => println!("{message}"),
                ResetOutcome::Failed(message) => bail!(message),
            }
            if refresh {
                print!("{}", render::combined_billing(&client.combined_billing().await?));
            }
        }
        Command::Config { action } => config(&client, action).await?,
        Command::History { limit, action } => history(&client, limit, action).await?,
        Command::Events => events(&client).await?,
        Command::ValidateOrder { order_no } => {
            let result = client.validate_order(&order_no).await?;
            println!("{}: {}", result.order_no, result.message);
            if !result.valid {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

/// Print the notification and, after a successful submission, wait for the
/// redirect and show the overview.
async fn follow(client: &ApiClient, outcome: SubmitOutcome) -> Result<()> {
    println!("{}", outcome.notification.message);
    if !outcome.notification.is_success() {
        bail!("submission failed");
    }
    if let Some(handle) = outcome.schedule_redirect(Arc::new(Terminal)) {
        handle.await?;
        overview(client).await?;
    }
    Ok(())
}

async fn overview(client: &ApiClient) -> Result<()> {
    let (status, billing, queue) = tokio::try_join!(
        client.cycle_status(),
        client.combined_billing(),
        client.queue()
    )?;
    print!("{}", render::cycle_status(&status));
    print!("{}", render::combined_billing(&billing));
    print!("{}", render::queue(&queue));
    Ok(())
}

fn section<T>(state: &PollState<T>, view: impl Fn(&T) -> String) -> String {
    match (&state.data, &state.error) {
        (_, Some(error)) if state.data.is_none() => format!("Error: {error}\n"),
        (Some(data), error) => {
            let mut text = view(data);
            if let Some(error) = error {
                text.push_str(&format!("  (stale: {error})\n"));
            }
            text
        }
        _ => "Loading...\n".to_string(),
    }
}

async fn watch_overview(client: &ApiClient) -> Result<()> {
    let status = poller::cycle_status(client);
    let billing = poller::combined_billing(client);
    let queue = poller::queue(client);

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                print!("\x1b[2J\x1b[H");
                print!("{}", section(&status.latest(), render::cycle_status));
                print!("{}", section(&billing.latest(), render::combined_billing));
                print!("{}", section(&queue.latest(), render::queue));
                io::stdout().flush()?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn queue(client: &ApiClient, action: Option<QueueAction>) -> Result<()> {
    match action {
        None => print!("{}", render::queue(&client.queue().await?)),
        Some(QueueAction::Add { order_no, text, site }) => {
            let response = client.enqueue(&QueueJob::new(order_no, text, site)).await?;
            println!("{} (queue length {})", response.message, response.queue_length);
        }
        Some(QueueAction::Remove { order_no }) => {
            let response = client.remove_job(&order_no).await?;
            println!("{} (queue length {})", response.message, response.queue_length);
        }
        Some(QueueAction::Clear) => {
            let response = client.clear_queue().await?;
            println!("{}", response.message);
        }
    }
    Ok(())
}

async fn config(client: &ApiClient, action: Option<ConfigAction>) -> Result<()> {
    let response = match action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => client.config().await?,
        ConfigAction::Defaults => client.config_defaults().await?,
        ConfigAction::Reset => client.reset_config().await?,
        ConfigAction::Set { patch } => {
            let update: ConfigUpdate =
                serde_json::from_str(&patch).context("Invalid configuration JSON")?;
            client.update_config(&update).await?
        }
        ConfigAction::Coords { patch } => {
            let coords: Coords = serde_json::from_str(&patch).context("Invalid coordinates JSON")?;
            let response = client.update_coords(&coords).await?;
            println!("{}", response.message);
            for (site, (x, y)) in &response.coords {
                println!("  {site:<15} ({x}, {y})");
            }
            return Ok(());
        }
    };
    print!("{}", render::config(&response));
    Ok(())
}

async fn history(client: &ApiClient, limit: Option<usize>, action: Option<HistoryAction>) -> Result<()> {
    match action {
        None => print!("{}", render::history(&client.history(limit).await?)),
        Some(HistoryAction::Show { run_id }) => {
            print!("{}", render::run(&client.run_details(&run_id).await?));
        }
        Some(HistoryAction::Stats) => {
            let currency = client.config().await?.config.currency;
            print!("{}", render::history_stats(&client.history_stats().await?, &currency));
        }
        Some(HistoryAction::Export { format, out }) => {
            let format = ExportFormat::from(format);
            let body = client.export_history(format, limit).await?;
            let path = out.unwrap_or_else(|| {
                aas_persistence::export_filename(format.as_str(), &chrono::Local::now())
            });
            std::fs::write(&path, body).with_context(|| format!("Failed to write {path}"))?;
            println!("Exported to {path}");
        }
        Some(HistoryAction::Clear) => println!("{}", client.clear_history().await?.message),
    }
    Ok(())
}

async fn events(client: &ApiClient) -> Result<()> {
    let stream = EventStream::connect(client);
    let mut rx = stream.subscribe();
    eprintln!("Listening on {}", client.events_url());

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                match (&state.error, &state.data) {
                    (Some(error), _) => eprintln!("{error}"),
                    (None, Some(snapshot)) => println!("{}", render::event(snapshot)),
                    (None, None) => {}
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
