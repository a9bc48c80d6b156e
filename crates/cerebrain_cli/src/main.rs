use cerebrain_core::{
    BrainIdentity, CerebrainConfig, EmotionalSelf, EmotionalState, JsonFileStore, LlmDefaults,
    SessionSnapshot, SessionStore, WorkspaceTexts,
};
use cerebrain_limbic::{InspirationEngine, RandomnessChain};
use cerebrain_memory::{
    HashingEmbedder, InMemoryVectorStore, LongTermMemory, MemoryStore, ShortTermMemory,
};
use cerebrain_reasoning::llm::LlmClient;
use cerebrain_reasoning::providers::{create_client, mock::MockProvider};
use cerebrain_reasoning::{BrainState, TurnOrchestrator};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::ReplCommand;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "cerebrain.toml", env = "CEREBRAIN_CONFIG")]
    config: PathBuf,

    /// Brain workspace directory holding SOUL.md, USER.md and TOOLS.md
    #[arg(short, long, default_value = "brain", env = "CEREBRAIN_WORKSPACE")]
    workspace: PathBuf,

    /// Session snapshot file (defaults to the user data dir)
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Brain name for a fresh session; a resumed session keeps its own
    #[arg(short, long, default_value = "Cerebra")]
    name: String,

    /// Use the offline mock LLM provider
    #[arg(long)]
    mock: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn default_state_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("cerebrain").join("session.json"))
        .unwrap_or_else(|| PathBuf::from("cerebrain_session.json"))
}

fn history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("cerebrain").join("history.txt"))
}

fn long_term() -> LongTermMemory {
    LongTermMemory::new(
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(HashingEmbedder::default()),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.log_json);

    info!("Initializing Cerebrain...");
    let mut config = CerebrainConfig::load_or_default(&args.config);
    if args.mock {
        config.llm.provider = "mock".to_string();
    }

    // 1. Workspace texts
    let texts = WorkspaceTexts::load(&args.workspace).await?;

    // 2. Identity and session state. The identity is fixed at first save.
    let store = JsonFileStore::new(args.state.clone().unwrap_or_else(default_state_path));
    let fresh = || {
        let identity =
            BrainIdentity::new(&args.name, texts.soul.clone(), LlmDefaults::from(&config.llm));
        (identity, fresh_state(&config))
    };
    let (identity, state) = match store.load().await {
        Ok(Some(snapshot)) => {
            info!(
                "Resuming session from {} (turn {})",
                store.path().display(),
                snapshot.emotional.turn()
            );
            resume(&snapshot, &args, &texts)
        }
        Ok(None) => fresh(),
        Err(e) => {
            warn!("Could not load session, starting fresh: {}", e);
            fresh()
        }
    };

    // 3. Collaborators
    let client: Arc<dyn LlmClient> = match create_client(&config.llm) {
        Ok(c) => c,
        Err(e) => {
            warn!("LLM client unavailable ({}), falling back to mock provider", e);
            Arc::new(MockProvider::new(&config.llm.model))
        }
    };
    let randomness = Arc::new(RandomnessChain::from_config(&config.randomness));
    let engine = InspirationEngine::new(randomness, config.inspiration.clone());

    let orchestrator = TurnOrchestrator::new(identity, texts, client, engine, state, &config);
    info!(
        "Brain '{}' online with {} via {}",
        orchestrator.identity().name,
        config.llm.model,
        config.llm.provider
    );

    println!("\n{}: {}\n", orchestrator.identity().name, orchestrator.greet().await);
    println!("Type /help for commands.");

    repl(&orchestrator, &store).await?;

    save(&orchestrator, &store).await;
    info!("Session ended, {} tokens used", orchestrator.tokens_used());
    Ok(())
}

fn resume(
    snapshot: &SessionSnapshot,
    args: &Args,
    texts: &WorkspaceTexts,
) -> (BrainIdentity, BrainState) {
    let identity = snapshot.identity.clone();
    if identity.name != args.name {
        warn!(
            "Ignoring --name '{}': session belongs to '{}'",
            args.name, identity.name
        );
    }
    if !texts.soul.trim().is_empty() && identity.soul != texts.soul {
        warn!("SOUL.md differs from the saved persona; keeping the saved one");
    }
    let state = BrainState {
        memory: MemoryStore::with_short_term(ShortTermMemory::from_snapshot(
            snapshot.short_term.clone(),
        ))
        .with_long_term(long_term()),
        ..BrainState::from_snapshot(snapshot)
    };
    (identity, state)
}

fn fresh_state(config: &CerebrainConfig) -> BrainState {
    let emotional = EmotionalSelf::new(EmotionalState::default(), config.emotion.decay_rate);
    let memory = MemoryStore::new(config.memory.short_term_capacity).with_long_term(long_term());
    BrainState::new(emotional, memory)
}

async fn save(orchestrator: &TurnOrchestrator, store: &JsonFileStore) {
    match store.save(&orchestrator.snapshot().await).await {
        Ok(()) => info!("Session saved to {}", store.path().display()),
        Err(e) => error!("Failed to save session: {}", e),
    }
}

async fn repl(orchestrator: &TurnOrchestrator, store: &JsonFileStore) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        let _ = rl.load_history(path);
    }

    loop {
        let line = match rl.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                error!("Readline error: {}", e);
                break;
            }
        };
        let _ = rl.add_history_entry(line.as_str());

        let command = match commands::parse(&line) {
            Ok(c) => c,
            Err(msg) => {
                println!("{}", msg);
                continue;
            }
        };
        match command {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{}", commands::HELP),
            ReplCommand::State => {
                println!("{}", orchestrator.live_state().await.render());
                println!("tokens used: {}", orchestrator.tokens_used());
            }
            ReplCommand::Skills => {
                for skill in orchestrator.skills().list() {
                    let marker = if skill.side_effecting { " *" } else { "" };
                    println!("- {}{}: {}", skill.signature(), marker, skill.description);
                }
            }
            ReplCommand::Skill { name, args } => {
                match orchestrator.invoke_skill(&name, &args).await {
                    Ok(output) => println!("{}", output.content),
                    Err(e) => println!("[skill error] {}", e),
                }
            }
            ReplCommand::Save => save(orchestrator, store).await,
            ReplCommand::Say(text) => {
                let report = orchestrator.turn(&text).await;
                println!("\n{}: {}\n", orchestrator.identity().name, report.reply);
                if !report.errors.is_empty() {
                    tracing::debug!("Turn errors: {:?}", report.errors);
                }
            }
        }
    }

    if let Some(path) = &history {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Err(e) = rl.save_history(path) {
            warn!("Could not save REPL history: {}", e);
        }
    }
    Ok(())
}
