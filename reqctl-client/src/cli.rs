use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use reqctl_shared::{requests::Decision, roles::Role, users::Operator};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::auth::{Session, SessionStore};
use crate::config::Config;
use crate::requests::{
    ControllerEvent, ControllerOptions, OrganizationSource, OrganizationsState,
    RequestListController, Services, SortOrder,
};
use crate::server::ServerClient;
use crate::tui;
use crate::util;

#[derive(Parser)]
#[command(name = "reqctl")]
#[command(version, about = "reqctl - review pending organization membership requests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the session used for every other command
    Login {
        /// Bearer token issued by the membership service
        #[arg(long)]
        token: String,

        /// Role of the operator (SUPERADMIN, ADMIN, USER)
        #[arg(long)]
        role: Role,

        #[arg(long, default_value = "")]
        first_name: String,

        #[arg(long, default_value = "")]
        last_name: String,

        /// Base URL of the membership service
        #[arg(long)]
        api_url: Option<String>,
    },

    /// Remove the stored session
    Logout,

    /// Show the logged in operator
    Whoami,

    /// List organizations
    Orgs,

    /// Set the default organization
    Use {
        organization_id: String,
    },

    /// List pending membership requests (requires superadmin role)
    Requests {
        #[arg(long)]
        org: Option<String>,

        /// Case-insensitive match on the requester's full name
        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value_t = SortOrder::NewestFirst)]
        sort: SortOrder,
    },

    /// Accept a membership request
    Accept {
        request_id: String,

        #[arg(long)]
        org: Option<String>,
    },

    /// Reject a membership request
    Reject {
        request_id: String,

        #[arg(long)]
        org: Option<String>,
    },

    /// Interactively search, sort and decide on requests
    Review {
        #[arg(long)]
        org: Option<String>,
    },

    /// Show CLI version information
    Version,
}

pub async fn cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;
    util::logging::init_logging(&config.log_level);
    let store = SessionStore::open_default()?;

    match cli.command {
        Commands::Login {
            token,
            role,
            first_name,
            last_name,
            api_url,
        } => {
            if let Some(url) = api_url {
                config.api_url = Some(url);
                config.save()?;
            }
            let session = Session::new(
                token,
                Operator {
                    role,
                    first_name,
                    last_name,
                },
            );
            store.save(&session)?;
            println!(
                "Logged in as {} ({})",
                session.operator.display_name(),
                session.role()
            );
        }

        Commands::Logout => {
            store.clear()?;
            println!("Logged out successfully");
        }

        Commands::Whoami => {
            let session = store.require()?;
            println!("{} ({})", session.operator.display_name(), session.role());
            if let Some(org) = &config.organization_id {
                println!("Default organization: {}", org);
            }
        }

        Commands::Orgs => {
            let session = store.require()?;
            let client = ServerClient::from_config(&config, &session)?;
            show_organizations(&client, config.organization_id.as_deref()).await?;
        }

        Commands::Use { organization_id } => {
            config.organization_id = Some(organization_id.clone());
            config.save()?;
            println!("Default organization set to {}", organization_id);
        }

        Commands::Requests { org, search, sort } => {
            let session = store.require()?;
            let Some(mut controller) = open_controller(&config, &session, org).await? else {
                return Ok(());
            };
            if !settle_requests(&mut controller).await? {
                return Ok(());
            }
            controller.set_sort_order(sort);
            if let Some(search) = search {
                controller.set_search_text(search);
                controller.flush_search();
            }
            tui::requests::print_requests(&controller.snapshot());
            controller.teardown();
        }

        Commands::Accept { request_id, org } => {
            decide(&config, &store, org, &request_id, Decision::Accept).await?;
        }

        Commands::Reject { request_id, org } => {
            decide(&config, &store, org, &request_id, Decision::Reject).await?;
        }

        Commands::Review { org } => {
            let session = store.require()?;
            let Some(controller) = open_controller(&config, &session, org).await? else {
                return Ok(());
            };
            review(controller).await?;
        }

        Commands::Version => {
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!(
                "Platform: {}/{}",
                std::env::consts::OS,
                std::env::consts::ARCH
            );
        }
    }

    Ok(())
}

async fn show_organizations(client: &ServerClient, active: Option<&str>) -> anyhow::Result<()> {
    let orgs = client.fetch_organizations().await?;
    tui::org::print_organizations(&orgs, active);
    Ok(())
}

/// Builds a controller for the session, or shows the organization list when
/// the operator may not review requests.
async fn open_controller(
    config: &Config,
    session: &Session,
    org: Option<String>,
) -> anyhow::Result<Option<RequestListController>> {
    let client = Arc::new(ServerClient::from_config(config, session)?);
    let mut options = ControllerOptions::from(config);
    if org.is_some() {
        options.preferred_organization = org;
    }

    match RequestListController::new(
        &session.operator,
        Services::from_backend(client.clone()),
        options,
    ) {
        Ok(controller) => Ok(Some(controller)),
        Err(denied) => {
            debug!("{}", denied);
            show_organizations(&client, config.organization_id.as_deref()).await?;
            Ok(None)
        }
    }
}

/// Loads organizations and the first request list. Returns false when there
/// is nothing to show beyond what was already printed.
async fn settle_requests(controller: &mut RequestListController) -> anyhow::Result<bool> {
    controller.load_organizations();
    while let Some(event) = controller.next_event().await {
        match event {
            ControllerEvent::OrganizationsLoaded { count: 0 } => {
                tui::requests::print_requests(&controller.snapshot());
                return Ok(false);
            }
            ControllerEvent::OrganizationsFailed { notification } => {
                bail!(notification.message);
            }
            ControllerEvent::RequestsLoaded { .. } => {
                print_active_organization(controller);
                return Ok(true);
            }
            ControllerEvent::RequestsFailed { notification, .. } => {
                bail!(notification.message);
            }
            _ => {}
        }
    }
    Ok(false)
}

fn print_active_organization(controller: &RequestListController) {
    if let (OrganizationsState::Loaded(orgs), Some(active)) =
        (controller.organizations(), controller.active_organization())
    {
        if let Some(org) = orgs.iter().find(|o| o.id == active) {
            tui::org::print_active_organization(org);
        }
    }
}

async fn decide(
    config: &Config,
    store: &SessionStore,
    org: Option<String>,
    request_id: &str,
    decision: Decision,
) -> anyhow::Result<()> {
    let session = store.require()?;
    let Some(mut controller) = open_controller(config, &session, org).await? else {
        return Ok(());
    };
    if !settle_requests(&mut controller).await? {
        return Ok(());
    }

    if !controller.submit_decision(request_id, decision) {
        bail!("Request {} not found in this organization", request_id);
    }

    while let Some(event) = controller.next_event().await {
        match event {
            ControllerEvent::DecisionApplied { .. } => {
                tui::requests::print_event(&event);
                break;
            }
            ControllerEvent::DecisionFailed { error, .. } => {
                controller.teardown();
                return Err(error).context("Decision was not applied");
            }
            _ => {}
        }
    }
    controller.teardown();
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReviewCommand {
    Search(String),
    Sort(SortOrder),
    Decide(String, Decision),
    Organization(String),
    Refresh,
    Show,
    Help,
    Quit,
    Invalid(String),
}

fn parse_review_command(line: &str) -> ReviewCommand {
    let line = line.trim();
    if let Some(text) = line.strip_prefix('/') {
        return ReviewCommand::Search(text.to_string());
    }

    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return ReviewCommand::Show;
    };
    let arg = parts.next();

    match (word.to_lowercase().as_str(), arg) {
        ("sort", Some(order)) => match order.parse() {
            Ok(order) => ReviewCommand::Sort(order),
            Err(e) => ReviewCommand::Invalid(e),
        },
        ("accept", Some(id)) => ReviewCommand::Decide(id.to_string(), Decision::Accept),
        ("reject", Some(id)) => ReviewCommand::Decide(id.to_string(), Decision::Reject),
        ("org", Some(id)) => ReviewCommand::Organization(id.to_string()),
        ("refresh", None) => ReviewCommand::Refresh,
        ("list" | "ls", None) => ReviewCommand::Show,
        ("help" | "?", None) => ReviewCommand::Help,
        ("quit" | "exit" | "q", None) => ReviewCommand::Quit,
        _ => ReviewCommand::Invalid(format!("Unknown command: {line}. Type `help`")),
    }
}

const REVIEW_HELP: &str = "\
  /<text>          search by requester name (`/` clears)
  sort newest|oldest
  accept <id>      accept a request
  reject <id>      reject a request
  org <id>         switch organization
  refresh          reload the current organization
  list             show the list again
  quit";

enum Step {
    Line(Option<String>),
    Event(Option<ControllerEvent>),
}

async fn review(mut controller: RequestListController) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    controller.load_organizations();
    println!("{REVIEW_HELP}");

    loop {
        let step = tokio::select! {
            line = lines.next_line() => Step::Line(line?),
            event = controller.next_event() => Step::Event(event),
        };

        match step {
            Step::Line(None) => break,
            Step::Line(Some(line)) => match parse_review_command(&line) {
                ReviewCommand::Search(text) => {
                    controller.set_search_text(text);
                    tui::requests::print_status_line(&controller.snapshot());
                }
                ReviewCommand::Sort(order) => {
                    controller.set_sort_order(order);
                    render(&controller);
                }
                ReviewCommand::Decide(request_id, decision) => {
                    if controller.submit_decision(&request_id, decision) {
                        render(&controller);
                    } else if controller.is_pending(&request_id) {
                        println!("A decision for {request_id} is already in progress");
                    } else {
                        println!("Request {request_id} not found");
                    }
                }
                ReviewCommand::Organization(organization_id) => {
                    controller.select_organization(&organization_id);
                }
                ReviewCommand::Refresh => controller.refresh(),
                ReviewCommand::Show => render(&controller),
                ReviewCommand::Help => println!("{REVIEW_HELP}"),
                ReviewCommand::Quit => break,
                ReviewCommand::Invalid(message) => println!("{message}"),
            },
            Step::Event(None) => break,
            Step::Event(Some(event)) => {
                tui::requests::print_event(&event);
                match event {
                    ControllerEvent::OrganizationsLoaded { count: 0 }
                    | ControllerEvent::RequestsLoaded { .. }
                    | ControllerEvent::SearchSettled { .. }
                    | ControllerEvent::DecisionApplied { .. } => render(&controller),
                    _ => {}
                }
            }
        }
    }

    controller.teardown();
    info!("review session closed");
    Ok(())
}

fn render(controller: &RequestListController) {
    let model = controller.snapshot();
    print_active_organization(controller);
    tui::requests::print_status_line(&model);
    tui::requests::print_requests(&model);
}
