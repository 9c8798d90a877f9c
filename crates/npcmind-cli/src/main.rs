//! NPC Mind - operator CLI
//!
//! Runs a single NPC think cycle against a real provider, replays cached
//! responses, and shows the effective configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use npcmind_core::ai::types::ResponseSchema;
use npcmind_core::clock::TimeService;
use npcmind_core::tools::FnTool;
use npcmind_core::{
    paths, AgentClient, ApprovalQueue, CallIdentity, ConversationLog, CredentialStore,
    Json, NpcMindConfig, ProviderAdapter, ResponseCacheStore, ResponsePolicy,
    ThinkCycle, ToolRegistry,
};

mod approval_prompt;

use approval_prompt::StdinApproval;

/// Real seconds between clock updates while a command runs
const CLOCK_TICK: Duration = Duration::from_millis(100);

/// NPC Mind - LLM orchestration for simulated characters
#[derive(Parser)]
#[command(name = "npcmind")]
#[command(about = "Drive NPC model calls from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one think cycle for an NPC
    Think {
        #[arg(long)]
        actor: String,
        #[arg(long, default_value = "planner")]
        agent_type: String,
        /// Simulation run id (defaults to a timestamp)
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        system: Option<String>,
        /// JSON schema file; the reply is decoded as JSON when given
        #[arg(long)]
        schema: Option<PathBuf>,
        /// Ask on stdin before the call goes out
        #[arg(long)]
        approve: bool,
    },

    /// Print cached responses for an NPC
    Replay {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        agent_type: Option<String>,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Log to file so stdout stays readable
    let log_dir = paths::logs_dir();
    std::fs::create_dir_all(&log_dir).ok();

    #[cfg(unix)]
    let null_device = "/dev/null";
    #[cfg(windows)]
    let null_device = "NUL";

    let log_file = std::fs::File::create(log_dir.join("npcmind.log"))
        .or_else(|_| std::fs::File::create(null_device))
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = NpcMindConfig::load()?;

    match cli.command {
        Commands::Think {
            actor,
            agent_type,
            session,
            prompt,
            system,
            schema,
            approve,
        } => {
            let session =
                session.unwrap_or_else(|| session_id(std::time::SystemTime::now()));
            let identity = CallIdentity::new(actor, agent_type, session);
            let schema = schema.map(|path| load_schema(&path)).transpose()?;
            run_think(&config, identity, &prompt, system.as_deref(), schema, approve).await?;
        }
        Commands::Replay { actor, agent_type } => {
            let store = ResponseCacheStore::open_default()?;
            let rows = store.load_for(&actor, agent_type.as_deref())?;
            if rows.is_empty() {
                println!("No cached responses for {}", actor);
            }
            for row in rows {
                println!(
                    "#{} [{}] {} / {} ({})",
                    row.sequence,
                    row.identity.session,
                    row.identity.agent_type,
                    row.provider.map(|p| p.to_string()).unwrap_or_else(|| "?".into()),
                    row.created_at
                );
                println!("{}", serde_json::to_string_pretty(&row.envelope.payload)?);
                for tool in &row.envelope.tools {
                    println!("  tool {} {}", tool.name, tool.args_json);
                }
                println!();
            }
        }
        Commands::Config => {
            println!("# {}", paths::config_file().display());
            println!("{}", toml::to_string_pretty(&config)?);
            let credentials = CredentialStore::load()?;
            let configured: Vec<String> = credentials
                .configured_providers()
                .iter()
                .map(|p| p.to_string())
                .collect();
            println!("# API keys: {}", configured.join(", "));
        }
    }

    Ok(())
}

async fn run_think(
    config: &NpcMindConfig,
    identity: CallIdentity,
    prompt: &str,
    system: Option<&str>,
    schema: Option<ResponseSchema>,
    approve: bool,
) -> Result<()> {
    let credentials = CredentialStore::load()?;
    let backend = Arc::new(config.backend(&credentials)?);

    let clock = config.time_service()?;
    clock.start_time_flow();
    let ticker = spawn_clock(clock.clone());

    let tools = Arc::new(demo_tools(clock.clone()));
    let policy = Arc::new(ResponsePolicy::new(config.retry_policy()));

    let mut client = ProviderAdapter::new(config.client_config(), backend, policy)
        .with_identity(identity)
        .with_executor(tools.clone())
        .with_response_cache(Arc::new(ResponseCacheStore::open_default()?))
        .with_conversation_sink(Arc::new(
            ConversationLog::open_default().with_clock(clock.clone()),
        ));
    client.register_tools(tools.schemas());
    client.set_temperature(config.agent.temperature);
    client.set_response_format(schema.clone());
    if let Some(system) = system {
        client.add_system_message(system);
    }
    client.add_user_message(prompt);

    let mut cycle = ThinkCycle::new(clock.clone()).with_gate_mode(config.clock.think_gate);
    if approve || config.approval.enabled {
        let queue = Arc::new(ApprovalQueue::new(Some(clock.clone())));
        StdinApproval::install(&queue);
        cycle = cycle.with_approval(queue);
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let started = clock.current_time();
    let result = if schema.is_some() {
        cycle
            .try_think::<_, Json<Value>>(&mut client, &cancel)
            .await
            .map(|reply| serde_json::to_string_pretty(&reply.into_inner()))
    } else {
        cycle
            .try_think::<_, String>(&mut client, &cancel)
            .await
            .map(Ok::<_, serde_json::Error>)
    };
    ticker.cancel();

    match result {
        Ok(text) => {
            println!("{}", text?);
            for record in client.executed_tools() {
                eprintln!("tool {} {}", record.name, record.args_json);
            }
            eprintln!("game time {} -> {}", started, clock.current_time());
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("{} ({})", e, e.code())),
    }
}

/// Drive the clock with wall time until the token is cancelled
fn spawn_clock(clock: Arc<TimeService>) -> CancellationToken {
    let token = CancellationToken::new();
    let stop = token.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLOCK_TICK);
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = interval.tick() => clock.update(CLOCK_TICK.as_secs_f64()),
            }
        }
    });
    token
}

/// Tools every NPC gets from the CLI
fn demo_tools(clock: Arc<TimeService>) -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(FnTool::new(
        "current_time",
        "Current simulated date and time (YYYY-MM-DD HH:MM)",
        serde_json::json!({"type": "object", "properties": {}}),
        move |_| Ok(clock.current_time().to_string()),
    )));
    registry
}

fn load_schema(path: &PathBuf) -> Result<ResponseSchema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema {}", path.display()))?;
    let schema: Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON schema {}", path.display()))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "response".to_string());
    Ok(ResponseSchema::new(name, "Structured NPC reply", schema))
}

/// Session id from wall time, e.g. `run-1718000000`
fn session_id(now: std::time::SystemTime) -> String {
    let secs = now
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("run-{}", secs)
}
