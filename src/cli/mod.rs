mod profile;

use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{Datelike, Local};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::{self, Config};
use crate::services::grid::{DaySlot, HeatmapLayout, DAYS_PER_WEEK};
use crate::services::{
    contribution_label, no_data_label, normalize_username, ContributionsService, DataSource,
    FetchedContributions, FileSecretStore, LinkedAccounts, Phase, SecretStore,
};
use crate::types::{ContributionLevel, ProviderKind};

pub use profile::ProfileArgs;

const LOG_FILE: &str = "contribgrid.log";

/// GitHub contribution heatmap and account links for the terminal
#[derive(Parser)]
#[command(name = "contribgrid")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// GitHub username or profile URL (defaults to `default_username` in config)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Calendar year to show (defaults to the current year)
    #[arg(long, global = true)]
    year: Option<i32>,

    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch interactive TUI (default)
    Tui,

    /// Print the contribution heatmap
    Grid {
        /// Output grid, month labels and total as JSON
        #[arg(long)]
        json: bool,
    },

    /// List years with contribution totals
    Years,

    /// Link a GitHub, Google Drive or Freelancer account
    Connect {
        #[arg(value_parser = parse_provider)]
        provider: ProviderKind,

        /// Page the provider redirects back to
        #[arg(long)]
        return_url: String,
    },

    /// Unlink an account and forget its token
    Disconnect {
        #[arg(value_parser = parse_provider)]
        provider: ProviderKind,
    },

    /// Show the state of every linked account
    Accounts,

    /// Send a profile settings update
    Profile(ProfileArgs),
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let tui_mode = matches!(self.command, None | Some(Commands::Tui));
        init_tracing(self.verbose, tui_mode);

        let config = Config::load()?;
        match self.command {
            None | Some(Commands::Tui) => {
                let username = resolve_username(self.user.as_deref(), &config)?;
                let year = self.year.unwrap_or_else(|| Local::now().year());
                crate::tui::run(config, username, year)
            }
            Some(Commands::Grid { json }) => {
                let username = resolve_username(self.user.as_deref(), &config)?;
                let year = self.year.unwrap_or_else(|| Local::now().year());
                print_grid(&config, &username, year, json)
            }
            Some(Commands::Years) => {
                let username = resolve_username(self.user.as_deref(), &config)?;
                print_years(&config, &username)
            }
            Some(Commands::Connect {
                provider,
                return_url,
            }) => connect(&config, provider, &return_url),
            Some(Commands::Disconnect { provider }) => disconnect(&config, provider),
            Some(Commands::Accounts) => print_accounts(&config),
            Some(Commands::Profile(args)) => args.run(&config),
        }
    }
}

fn parse_provider(value: &str) -> Result<ProviderKind, String> {
    ProviderKind::from_slug(&value.to_ascii_lowercase())
        .ok_or_else(|| format!("unknown provider {:?} (github, drive, freelancer)", value))
}

/// Log to stderr, or to a file while the TUI owns the screen
fn init_tracing(verbose: bool, tui_mode: bool) {
    let default_level = if verbose { "contribgrid=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if !tui_mode {
        let _ = builder.with_writer(io::stderr).try_init();
        return;
    }

    let log_file = config::data_dir().ok().and_then(|dir| {
        std::fs::create_dir_all(&dir).ok()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE))
            .ok()
    });
    match log_file {
        Some(file) => {
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        // Nowhere safe to write while the TUI is up
        None => {
            let _ = builder.with_writer(io::sink).try_init();
        }
    }
}

fn resolve_username(flag: Option<&str>, config: &Config) -> anyhow::Result<String> {
    let raw = flag
        .or(config.default_username.as_deref())
        .context("no username given: pass --user or set default_username in config.json")?;
    Ok(normalize_username(raw)?)
}

fn print_grid(config: &Config, username: &str, year: i32, json: bool) -> anyhow::Result<()> {
    let service = ContributionsService::new(config)?;
    let fetched = service.load(username)?;
    if fetched.source == DataSource::StaleCache {
        eprintln!("[contribgrid] Warning: network unavailable, showing cached data");
    }
    print!("{}", format_grid(&fetched, year, json)?);
    Ok(())
}

/// Text or JSON rendering of one year; a year with no records gets a message, not a grid
fn format_grid(
    fetched: &FetchedContributions,
    year: i32,
    json: bool,
) -> serde_json::Result<String> {
    let has_data = fetched.data.has_activity(year);
    let total = fetched.data.year_total(year);

    if json {
        let layout = has_data.then(|| HeatmapLayout::build(&fetched.data.contributions, year));
        let out = serde_json::json!({
            "username": fetched.username,
            "year": year,
            "total": total,
            "source": source_name(fetched.source),
            "has_data": has_data,
            "months": layout.as_ref().map(|l| &l.months),
            "grid": layout.as_ref().map(|l| &l.grid),
        });
        return Ok(serde_json::to_string_pretty(&out)? + "\n");
    }

    let mut out = format!("@{}  {}\n\n", fetched.username, year);
    if !has_data {
        out.push_str(&no_data_label(year));
        out.push('\n');
        return Ok(out);
    }
    let layout = HeatmapLayout::build(&fetched.data.contributions, year);
    out.push_str(&render_text_grid(&layout));
    out.push('\n');
    out.push_str(&format!("{} in {}\n", contribution_label(total), year));
    Ok(out)
}

fn source_name(source: DataSource) -> &'static str {
    match source {
        DataSource::Network => "network",
        DataSource::Cache => "cache",
        DataSource::StaleCache => "stale_cache",
    }
}

fn print_years(config: &Config, username: &str) -> anyhow::Result<()> {
    let service = ContributionsService::new(config)?;
    let fetched = service.load(username)?;
    let years = fetched.data.available_years();
    if years.is_empty() {
        println!("No contribution years for @{}", username);
        return Ok(());
    }
    for year in years {
        println!("{}  {}", year, contribution_label(fetched.data.year_total(year)));
    }
    Ok(())
}

const TEXT_LABEL_WIDTH: usize = 4;
const TEXT_DAY_LABELS: [&str; DAYS_PER_WEEK] = ["Sun", "", "Tue", "", "Thu", "", "Sat"];

fn level_char(level: ContributionLevel) -> char {
    match level {
        ContributionLevel::None => '·',
        ContributionLevel::Low => '░',
        ContributionLevel::Medium => '▒',
        ContributionLevel::High => '▓',
        ContributionLevel::Max => '█',
    }
}

/// Plain-text heatmap: a month row, then one line per weekday
fn render_text_grid(layout: &HeatmapLayout) -> String {
    let width = TEXT_LABEL_WIDTH + layout.grid.weeks.len();
    let mut months: Vec<char> = vec![' '; width];
    let mut next_free = 0;
    for label in &layout.months {
        let x = TEXT_LABEL_WIDTH + label.week_index;
        // Skip a label that would overwrite its neighbour
        if x < next_free {
            continue;
        }
        for (i, c) in label.name().chars().enumerate() {
            if let Some(slot) = months.get_mut(x + i) {
                *slot = c;
            }
        }
        next_free = x + label.name().len() + 1;
    }

    let mut out = String::new();
    out.push_str(months.iter().collect::<String>().trim_end());
    out.push('\n');
    for (day, label) in TEXT_DAY_LABELS.iter().enumerate() {
        let row: String = layout
            .grid
            .weeks
            .iter()
            .map(|week| match &week[day] {
                DaySlot::Masked => ' ',
                slot => level_char(slot.level()),
            })
            .collect();
        let line = format!("{:<width$}{}", label, row, width = TEXT_LABEL_WIDTH);
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn open_accounts(config: &Config) -> anyhow::Result<LinkedAccounts> {
    let secrets: Arc<dyn SecretStore> = Arc::new(FileSecretStore::new()?);
    Ok(LinkedAccounts::new(config, secrets)?)
}

fn connect(config: &Config, kind: ProviderKind, return_url: &str) -> anyhow::Result<()> {
    let mut accounts = open_accounts(config)?;
    let link = accounts.get_mut(kind);
    let url = link.begin_connect(return_url)?;

    println!("Open this URL to link your {} account:", kind);
    println!();
    println!("  {}", url);
    println!();
    print!("Paste the URL you were redirected to: ");
    io::stdout().flush()?;

    let mut callback = String::new();
    io::stdin().lock().read_line(&mut callback)?;
    let callback = callback.trim();
    if callback.is_empty() {
        link.cancel_connect()?;
        anyhow::bail!("no callback URL given; {} link cancelled", kind);
    }

    link.complete_connect(callback)?;
    let status = link.status();
    match status.detail {
        Some(detail) => println!("Linked {}: {}", kind, detail),
        None => println!("Linked {}", kind),
    }
    Ok(())
}

fn disconnect(config: &Config, kind: ProviderKind) -> anyhow::Result<()> {
    let mut accounts = open_accounts(config)?;
    let link = accounts.get_mut(kind);
    if !link.has_stored_token()? {
        println!("{} is not linked", kind);
        return Ok(());
    }

    match link.restore() {
        Ok(()) if link.status().phase == Phase::Connected => link.disconnect()?,
        Ok(()) => link.forget()?,
        Err(e) => {
            // Still drop the local token when the provider cannot be reached
            tracing::warn!(provider = %kind, error = %e, "restore failed, forgetting token");
            link.forget()?;
        }
    }
    println!("Unlinked {}", kind);
    Ok(())
}

fn print_accounts(config: &Config) -> anyhow::Result<()> {
    let mut accounts = open_accounts(config)?;
    for (kind, e) in accounts.restore_all() {
        eprintln!("[contribgrid] Warning: could not verify {}: {}", kind, e);
    }
    for status in accounts.statuses() {
        let detail = status.detail.unwrap_or_default();
        println!(
            "{:<14}{:<14}{}",
            status.kind.to_string(),
            status.phase.to_string(),
            detail
        );
    }
    Ok(())
}
