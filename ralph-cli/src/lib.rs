//! The CLI front end: exactly the two subcommands the execution engine
//! needs to be driven from a shell. Interactive prompt
//! elicitation, shell-completion generation, man-page generation, and
//! workflow-file code generation are out of scope and are not
//! implemented here — this binary only ever consumes an already-written
//! prompt file and an already-written config file.

mod cli;
mod report;
mod run;

pub use cli::{Cli, Command};
pub use report::RunReport;

pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Run { config, prompt } => run::run(&config, &prompt).await,
        Command::Resume { config, run_id } => run::resume(&config, &run_id).await,
    }
}
