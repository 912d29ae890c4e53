#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unused_self,
    clippy::cast_precision_loss,
    clippy::unnecessary_cast,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unnecessary_wraps,
    dead_code
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use ticketdesk::agents::create_registry;
use ticketdesk::config::CONFIG_DIR_ENV;
use ticketdesk::gateway::{self, AppState, ServiceRole};
use ticketdesk::orchestrator::{AgentTransport, HttpTransport, LocalTransport, Orchestrator};
use ticketdesk::queue::create_queue;
use ticketdesk::routing::create_router;
use ticketdesk::tickets::{
    agent_queue, Ticket, ACCOUNT_AGENT, ESCALATION_QUEUE, MANAGER_APPROVAL_QUEUE, TECHNICAL_AGENT,
};
use ticketdesk::{Config, QueueCommands};

/// `ticketdesk` - keyword routing for analytics support tickets.
#[derive(Parser, Debug)]
#[command(name = "ticketdesk")]
#[command(version)]
#[command(about = "Route support tickets to technical and account agents.", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway for one role or all of them
    #[command(long_about = "\
Start the gateway for one role or all of them.

The router role serves /route_ticket, the technical and account roles \
serve /handle_ticket, and the all role serves everything plus /process. \
Bind address defaults to gateway.host / gateway.port from the config.

Examples:
  ticketdesk serve                        # all-in-one on the config port
  ticketdesk serve --role router -p 8001
  ticketdesk serve --role technical -p 8002 --host 0.0.0.0")]
    Serve {
        /// Endpoints to expose
        #[arg(long, value_enum, default_value_t = ServiceRole::All)]
        role: ServiceRole,

        /// Host to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (0 picks a random port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Route and answer one ticket, printing the envelope as JSON
    #[command(long_about = "\
Route and answer one ticket, printing the envelope as JSON.

Runs in-process by default. With --remote the ticket goes over HTTP to \
the services listed in the [endpoints] section.

Examples:
  ticketdesk process --department \"Risk Management\" \\
      --subject \"Oracle database timeout\" --description \"connection refused\"
  ticketdesk process --remote --department Trading \\
      --subject \"Add users\" --description \"please add 5 new users\"")]
    Process {
        #[arg(long)]
        department: String,

        #[arg(long)]
        subject: String,

        #[arg(long)]
        description: String,

        /// Submitter address
        #[arg(long, default_value = "user@example.com")]
        email: String,

        /// Ticket id (generated when omitted)
        #[arg(long)]
        ticket_id: Option<String>,

        /// Send the ticket through the configured HTTP endpoints
        #[arg(long)]
        remote: bool,
    },

    /// Show configuration and audit queue depths
    Status,

    /// Inspect audit queue channels
    Queue {
        #[command(subcommand)]
        queue_command: QueueCommands,
    },
}

fn generate_ticket_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("TKT-{}", id[..8].to_ascii_uppercase())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var(CONFIG_DIR_ENV, config_dir);
    }

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let mut config = Config::load_or_init().await?;

    match cli.command {
        Commands::Serve { role, host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            info!(
                role = %role,
                "🚀 Starting ticket desk on {}:{}",
                config.gateway.host,
                config.gateway.port
            );

            let queue = create_queue(&config.queue, &config.config_dir)?;
            let state = AppState::new(&config, queue, role)?;
            gateway::run_gateway(&config, state).await
        }

        Commands::Process {
            department,
            subject,
            description,
            email,
            ticket_id,
            remote,
        } => {
            let ticket = Ticket::new(
                ticket_id.unwrap_or_else(generate_ticket_id),
                email,
                department,
                subject,
                description,
            );
            ticketdesk::tickets::validate(&ticket)?;

            let transport: Arc<dyn AgentTransport> = if remote {
                Arc::new(HttpTransport::new(&config.endpoints, &config.transport)?)
            } else {
                let queue = create_queue(&config.queue, &config.config_dir)?;
                let router = create_router(config.classifier.clone(), Arc::clone(&queue));
                let agents = create_registry(&config, queue);
                Arc::new(LocalTransport::new(router, agents))
            };

            let outcome = Orchestrator::new(transport).process(ticket).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }

        Commands::Status => {
            let queue = create_queue(&config.queue, &config.config_dir)?;
            println!("🎫 Ticket desk status");
            println!();
            println!("Config:      {}", config.config_path.display());
            println!(
                "Gateway:     {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!("Queue:       {} ({})", queue.name(), config.queue.backend);
            println!("Departments: {}", config.accounts.departments.len());
            println!();
            println!("Endpoints:");
            for (name, url) in config.endpoints.table() {
                println!("  {name:<10} {url}");
            }
            println!();
            println!("Queue depths:");
            let channels = [
                agent_queue(TECHNICAL_AGENT),
                agent_queue(ACCOUNT_AGENT),
                ESCALATION_QUEUE.to_string(),
                MANAGER_APPROVAL_QUEUE.to_string(),
            ];
            for channel in &channels {
                let depth = queue.depth(channel).await?;
                println!("  {channel:<24} {depth}");
            }
            Ok(())
        }

        Commands::Queue { queue_command } => {
            let queue = create_queue(&config.queue, &config.config_dir)?;
            match queue_command {
                QueueCommands::Depth { channel } => {
                    let depth = queue.depth(&channel).await?;
                    println!("{channel}: {depth}");
                }
                QueueCommands::Pop { channel } => match queue.pop(&channel).await? {
                    Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
                    None => println!("{channel} is empty"),
                },
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_has_no_flag_conflicts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_defaults_to_all_roles() {
        let cli = Cli::try_parse_from(["ticketdesk", "serve"]).expect("serve should parse");
        match cli.command {
            Commands::Serve { role, host, port } => {
                assert_eq!(role, ServiceRole::All);
                assert!(host.is_none());
                assert!(port.is_none());
            }
            other => panic!("expected serve command, got {other:?}"),
        }
    }

    #[test]
    fn serve_accepts_role_and_port() {
        let cli = Cli::try_parse_from(["ticketdesk", "serve", "--role", "technical", "-p", "8002"])
            .expect("serve should parse");
        match cli.command {
            Commands::Serve { role, port, .. } => {
                assert_eq!(role, ServiceRole::Technical);
                assert_eq!(port, Some(8002));
            }
            other => panic!("expected serve command, got {other:?}"),
        }
    }

    #[test]
    fn serve_rejects_unknown_role() {
        assert!(Cli::try_parse_from(["ticketdesk", "serve", "--role", "billing"]).is_err());
    }

    #[test]
    fn process_requires_ticket_fields() {
        assert!(Cli::try_parse_from(["ticketdesk", "process", "--subject", "x"]).is_err());

        let cli = Cli::try_parse_from([
            "ticketdesk",
            "process",
            "--department",
            "Trading",
            "--subject",
            "Dashboard slow",
            "--description",
            "timeout",
            "--remote",
        ])
        .expect("process should parse");
        match cli.command {
            Commands::Process {
                email,
                ticket_id,
                remote,
                ..
            } => {
                assert_eq!(email, "user@example.com");
                assert!(ticket_id.is_none());
                assert!(remote);
            }
            other => panic!("expected process command, got {other:?}"),
        }
    }

    #[test]
    fn queue_subcommands_parse() {
        let cli = Cli::try_parse_from(["ticketdesk", "queue", "pop", "escalation_queue"])
            .expect("queue pop should parse");
        match cli.command {
            Commands::Queue { queue_command } => assert_eq!(
                queue_command,
                QueueCommands::Pop {
                    channel: "escalation_queue".to_string()
                }
            ),
            other => panic!("expected queue command, got {other:?}"),
        }
    }

    #[test]
    fn config_dir_is_global() {
        let cli = Cli::try_parse_from(["ticketdesk", "status", "--config-dir", "/tmp/desk"])
            .expect("status should parse");
        assert_eq!(cli.config_dir.as_deref(), Some("/tmp/desk"));
    }

    #[test]
    fn generated_ticket_ids_are_prefixed() {
        let id = generate_ticket_id();
        assert!(id.starts_with("TKT-"));
        assert_eq!(id.len(), 12);
    }
}
