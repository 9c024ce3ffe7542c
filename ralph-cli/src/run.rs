//! Wires the engine's collaborators together for the `run` and `resume`
//! subcommands: load config, open the two-store
//! persistence layer, build the agent pool, and drive the engine loop to
//! completion.

use std::path::{Path, PathBuf};

use ralph_core::agent::{AgentBinary, AgentPool};
use ralph_core::config::load_config;
use ralph_core::display::spawn_progress_display;
use ralph_core::engine::{CancellationToken, Engine};
use ralph_core::resume::scan_resumable_tickets;
use ralph_core::store::Db;
use ralph_core::workspace::WorkspaceManager;
use ralph_kernel::schema_catalog::SchemaCatalog;

use crate::report;

pub async fn run(config_path: &Path, prompt_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let prompt = std::fs::read_to_string(prompt_path)?;
    let run_id = uuid::Uuid::new_v4().to_string();
    // The prompt/templating layer is an opaque external collaborator
    //; the one thing the core engine itself needs to do with
    // the user's prompt text is make it reachable by the subprocess
    // agents it spawns, which inherit the process environment.
    unsafe {
        std::env::set_var("RALPH_INITIAL_PROMPT", &prompt);
    }
    drive(config_path, &run_id, true).await
}

pub async fn resume(config_path: &Path, run_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    drive(config_path, run_id, false).await
}

async fn drive(config_path: &Path, run_id: &str, fresh: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let db_path = db_path_for(&config.repo_root);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Db::open(&db_path)?;

    if !fresh {
        let resumable = scan_resumable_tickets(&db, run_id)?;
        for ticket in &resumable {
            eprintln!(
                "resuming: ticket {} furthest-advanced at {:?} (from run {})",
                ticket.ticket_id, ticket.furthest_stage, ticket.run_id
            );
        }
    }

    let catalog = std::sync::Arc::new(SchemaCatalog::builtin());
    let binaries = config
        .agents
        .iter()
        .map(|profile| AgentBinary {
            id: profile.id.clone(),
            command: vec![profile.kind.clone()],
        })
        .collect();
    let agents = std::sync::Arc::new(AgentPool::new(binaries));

    let repo_root = PathBuf::from(&config.repo_root);
    let workspaces = WorkspaceManager::new(repo_root.clone(), config.main_branch.clone());
    let _ = workspaces.reap_orphans(&[]);

    let bridge = ralph_core::bridge::Bridge::new(db.clone(), catalog, agents, run_id, repo_root);
    let cancel = CancellationToken::new();
    let mut engine = Engine::new(db.clone(), config, bridge, workspaces, run_id, cancel);

    let (tx, display_handle) = spawn_progress_display(!atty_stderr());
    let result = engine.run(Some(tx)).await;
    drop(engine);
    let _ = display_handle.await;
    result?;

    let report = report::build(&db, run_id)?;
    println!("{report}");
    Ok(())
}

fn db_path_for(repo_root: &str) -> PathBuf {
    Path::new(repo_root).join(".ralph").join("store.db")
}

fn atty_stderr() -> bool {
    use std::io::IsTerminal;
    std::io::stderr().is_terminal()
}
