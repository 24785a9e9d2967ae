mod config;
mod console;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    AutoConfirm, Confirmer, ControllerEvent, HttpLeadsApi, LeadListController, StartOptions,
};
use shared::{
    domain::{LeadId, StatusField},
    filter::Filter,
    protocol::CallingConfiguration,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    config::{load_settings, Settings},
    console::{render_status, render_view, ConsoleNotifier, StdinConfirmer},
};

#[derive(Parser, Debug)]
#[command(name = "leads-dashboard", about = "Lead selection and outbound calling control")]
struct Cli {
    #[arg(long, default_value = "dashboard.toml")]
    config: PathBuf,
    /// Overrides `api_base_url` from the config file and environment.
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Answer "yes" to every confirmation prompt.
    #[arg(long, short = 'y')]
    yes: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct FilterArgs {
    #[arg(long)]
    estado1: Option<String>,
    #[arg(long)]
    estado2: Option<String>,
    /// Call status; "todos" means any.
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    priority: Option<String>,
    #[arg(long)]
    selected_only: bool,
    /// Origin file(s), comma separated.
    #[arg(long, value_delimiter = ',')]
    origen: Vec<String>,
    /// Server page (window of `limit` rows).
    #[arg(long, default_value_t = 1)]
    page: u64,
    /// Table page within the loaded window.
    #[arg(long, default_value_t = 1)]
    display_page: usize,
}

impl FilterArgs {
    fn filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(v) = &self.estado1 {
            filters.push(Filter::Estado1(v.clone()));
        }
        if let Some(v) = &self.estado2 {
            filters.push(Filter::Estado2(v.clone()));
        }
        if let Some(v) = &self.status {
            filters.push(Filter::Status(v.clone()));
        }
        if let Some(v) = &self.priority {
            filters.push(Filter::Priority(v.clone()));
        }
        if self.selected_only {
            filters.push(Filter::SelectedOnly(true));
        }
        if !self.origen.is_empty() {
            filters.push(Filter::OrigenArchivo(self.origen.clone()));
        }
        filters
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the lead table.
    Leads(FilterArgs),
    /// Select (or deselect) individual leads by id.
    Select {
        ids: Vec<i64>,
        #[arg(long)]
        deselect: bool,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Select (or deselect) every lead matching the filters.
    SelectFiltered {
        #[arg(long)]
        deselect: bool,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Server-side selection by status column value.
    SelectByStatus {
        /// status_level_1 / estado1 or status_level_2 / estado2.
        field: String,
        value: String,
        #[arg(long)]
        origin: Option<String>,
        #[arg(long)]
        deselect: bool,
    },
    DeselectAll,
    /// Reset call status of every lead.
    Reset {
        #[arg(long)]
        attempts: bool,
        #[arg(long)]
        selection: bool,
    },
    Status,
    /// Start calling the currently selected leads.
    Start {
        #[arg(long)]
        max_concurrent: Option<u32>,
        /// Test mode: route every call to this number.
        #[arg(long)]
        test_phone: Option<String>,
    },
    Stop,
    /// Poll status until interrupted.
    Watch {
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Show or change the calling configuration.
    Config {
        #[arg(long)]
        max_concurrent: Option<u32>,
    },
    TestConnection,
}

fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = load_settings(&cli.config)?;
    if let Some(url) = &cli.api_url {
        settings.api_base_url = url.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        settings.request_timeout_secs = secs;
    }
    settings.validate()?;
    Ok(settings)
}

async fn load_with(controller: &LeadListController, args: &FilterArgs) -> Result<()> {
    controller
        .set_filters_at_page(args.filters(), args.page)
        .await?;
    controller.set_display_page(args.display_page).await;
    Ok(())
}

async fn print_table(controller: &LeadListController) {
    print!("{}", render_view(&controller.view().await));
}

async fn watch(
    controller: &Arc<LeadListController>,
    settings: &Settings,
    every: Option<u64>,
) -> Result<()> {
    let interval = every
        .map(|secs| std::time::Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| settings.status_poll_interval());
    let mut events = controller.subscribe_events();
    let _poller = controller.spawn_status_poller(interval);
    info!(interval_secs = interval.as_secs(), "watching calling status");
    if controller.load_leads().await.is_err() {
        warn!("watch: initial lead load failed; retrying on the next refresh");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(ControllerEvent::StatusUpdated(status)) => println!("{}", render_status(&status)),
                Ok(ControllerEvent::LeadsLoaded { .. }) => print_table(controller).await,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;

    let api = HttpLeadsApi::with_timeout(&settings.api_base_url, settings.request_timeout())
        .context("failed to build leads api client")?;
    let confirmer: Arc<dyn Confirmer> = if cli.yes {
        Arc::new(AutoConfirm)
    } else {
        Arc::new(StdinConfirmer)
    };
    let controller = LeadListController::new_with_dependencies(
        Arc::new(api),
        Arc::new(ConsoleNotifier),
        confirmer,
        settings.controller_settings(),
    );

    match cli.command {
        Command::Leads(args) => {
            load_with(&controller, &args).await?;
            print_table(&controller).await;
        }
        Command::Select {
            ids,
            deselect,
            filters,
        } => {
            if ids.is_empty() {
                bail!("no lead ids given");
            }
            load_with(&controller, &filters).await?;
            for id in ids {
                match controller.toggle_selection(LeadId(id), !deselect).await {
                    Some(push) => push.await.context("selection update task failed")?,
                    None => eprintln!("lead {id} is not in the loaded list; skipped"),
                }
            }
            print_table(&controller).await;
        }
        Command::SelectFiltered { deselect, filters } => {
            load_with(&controller, &filters).await?;
            let updated = controller.select_all_filtered(!deselect).await?;
            println!("{updated} leads updated");
        }
        Command::SelectByStatus {
            field,
            value,
            origin,
            deselect,
        } => {
            let Some(field) = StatusField::parse(&field) else {
                bail!("unknown status field '{field}' (expected status_level_1 or status_level_2)");
            };
            let count = controller
                .select_by_status(field, &value, origin.as_deref(), !deselect)
                .await?;
            println!("{count} leads updated");
        }
        Command::DeselectAll => {
            controller.load_leads().await?;
            let cleared = controller.deselect_all().await?;
            println!("{cleared} loaded leads were selected");
        }
        Command::Reset {
            attempts,
            selection,
        } => {
            if !controller.reset_leads(attempts, selection).await? {
                println!("reset cancelled");
            }
        }
        Command::Status => {
            let status = controller.get_status().await?;
            println!("{}", render_status(&status));
        }
        Command::Start {
            max_concurrent,
            test_phone,
        } => {
            controller.load_leads().await?;
            let options = StartOptions {
                max_concurrent,
                test_mode: test_phone.is_some(),
                override_phone: test_phone,
            };
            controller.start_calling(options).await?;
        }
        Command::Stop => controller.stop_calling().await?,
        Command::Watch { interval_secs } => watch(&controller, &settings, interval_secs).await?,
        Command::Config { max_concurrent } => match max_concurrent {
            Some(max_concurrent_calls) => {
                controller
                    .save_configuration(CallingConfiguration {
                        max_concurrent_calls,
                    })
                    .await?
            }
            None => {
                let config = controller.configuration().await?;
                println!("max concurrent calls: {}", config.max_concurrent_calls);
            }
        },
        Command::TestConnection => {
            if !controller.test_connection().await? {
                bail!("telephony provider unreachable");
            }
        }
    }

    Ok(())
}
