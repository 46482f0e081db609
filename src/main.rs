mod cli;
mod config;
mod logging;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::unbounded_channel;

use vibecore_core::{
    build_registry, find_latest_session, Agent, ErrorKind, Event, Orchestrator, PathValidator, SubAgentRunnerAdapter,
    SubAgentSupervisor,
};
use vibecore_llm::{AnthropicAdapter, AuthStore, ModelAdapter, RequestInterceptor, TokenManager};

use crate::cli::Args;
use crate::config::Config;

const SYSTEM_INSTRUCTIONS: &str = "You are Claude Code, Anthropic's official CLI for Claude. \
    Help the user with software engineering tasks in their project directory.";

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::setup_logging(args.verbose);

    match run(args).await {
        Ok(()) => {}
        Err(e) if e.is::<UserVisibleError>() => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            eprintln!("Fatal error: {e}");
            std::process::exit(2);
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct UserVisibleError(String);

async fn run(args: Args) -> anyhow::Result<()> {
    let project_path = args.path.canonicalize()?;
    let config = Config::load(project_path.clone(), args.model.clone())?;

    let session_id = resolve_session_id(&args, &config)?;

    let auth_store = Arc::new(AuthStore::new("vibecore"));
    let token_manager = Arc::new(TokenManager::new(auth_store, "anthropic"));
    let interceptor = Arc::new(RequestInterceptor::new(token_manager));
    let adapter: Arc<dyn ModelAdapter> = Arc::new(AnthropicAdapter::new(interceptor));

    let tools = Arc::new(build_registry());
    let path_validator = Arc::new(PathValidator::new(config.allowed_directories.clone()));
    let supervisor = Arc::new(SubAgentSupervisor::new());

    let mut base_agent = Agent::new("main", SYSTEM_INSTRUCTIONS, config.model.clone());
    base_agent.max_turns = config.max_turns;

    let (sink, mut events) = unbounded_channel();

    let sub_agent_adapter = SubAgentRunnerAdapter {
        adapter: adapter.clone(),
        tools: tools.clone(),
        path_validator: path_validator.clone(),
        supervisor: supervisor.clone(),
        model: config.model.clone(),
        upstream: sink.clone(),
    };
    supervisor.set_executor(Arc::new(sub_agent_adapter));

    let orchestrator = Arc::new(Orchestrator::new(
        session_id,
        config.project_path.clone(),
        config.base_dir.clone(),
        adapter,
        tools,
        path_validator,
        supervisor,
        base_agent,
        sink,
    )?);

    if args.continue_session || args.session.is_some() {
        orchestrator.replay().await?;
    }

    let print_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let cancel_orchestrator = orchestrator.clone();
    let cancel_task = tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            if cancel_orchestrator.cancel_current().await {
                eprintln!("\n[cancelled]");
            }
        }
    });

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        orchestrator.submit_line(line).await;
    }

    cancel_task.abort();
    drop(orchestrator);
    let _ = print_task.await;
    Ok(())
}

fn resolve_session_id(args: &Args, config: &Config) -> anyhow::Result<String> {
    if args.continue_session {
        return find_latest_session(&config.project_path, &config.base_dir)
            .ok_or_else(|| UserVisibleError("no previous session found for this project".to_string()).into());
    }

    if let Some(id) = &args.session {
        let path = vibecore_core::session_file_path(id, &config.project_path, &config.base_dir)?;
        if !path.exists() {
            return Err(UserVisibleError(format!("no session '{id}' found for this project")).into());
        }
        return Ok(id.clone());
    }

    Ok(chrono::Utc::now().timestamp_millis().to_string())
}

fn print_event(event: &Event) {
    match event {
        Event::TextDelta(text) => print!("{text}"),
        Event::ToolCallStarted { tool_name, .. } => println!("\n[tool call: {tool_name}]"),
        Event::ToolCallCompleted { output, .. } => println!("[tool output] {output}"),
        Event::ReasoningStarted => println!("\n[thinking]"),
        Event::ReasoningCompleted { summary } => println!("[/thinking] {summary}"),
        Event::MessageCompleted => println!(),
        Event::AgentHandoff { to } => println!("\n[handoff -> {to}]"),
        Event::SubAgentEvent { parent_call_id, event } => {
            println!("  [sub-agent {parent_call_id}]");
            print_event(event);
        }
        Event::Error { kind, detail } => {
            let label = match kind {
                ErrorKind::Model => "model error",
                ErrorKind::Tool => "tool error",
                ErrorKind::Cancelled => "cancelled",
                ErrorKind::Internal => "internal error",
            };
            eprintln!("\n[{label}] {detail}");
        }
        Event::TurnFinished { .. } => {}
        Event::Replayed(item) => println!("[replay] {item:?}"),
        Event::SystemNotice(detail) => println!("[{detail}]"),
    }

    use std::io::Write;
    let _ = std::io::stdout().flush();
}
