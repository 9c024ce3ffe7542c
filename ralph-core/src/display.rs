//! Progress reporting: an mpsc-channel-driven spinner/status line, no
//! external logging crate.

use std::io::stderr;

use colored::*;
use crossterm::{
    cursor::MoveToColumn,
    execute,
    terminal::{Clear, ClearType},
};
use tokio::sync::mpsc::{Receiver, Sender, channel};
use tokio::time::Duration;

/// Everything the engine loop narrates about its own progress.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    FrameStarted { run_id: String, frame: u64 },
    NodeDispatched { node_id: String, agent_id: String },
    NodeFinished { node_id: String },
    NodeFailed { node_id: String, detail: String },
    AgentOutput { source: String, line: String },
    LoopAdvanced { loop_id: String, iteration: u32 },
    TicketLanded { ticket_id: String },
    TicketEvicted { ticket_id: String, reason: String },
    RunFinished { run_id: String },
}

impl ProgressEvent {
    fn render(&self) -> String {
        match self {
            ProgressEvent::FrameStarted { run_id, frame } => {
                format!("[{run_id}] frame {frame}")
            }
            ProgressEvent::NodeDispatched { node_id, agent_id } => {
                format!("dispatch {node_id} -> {agent_id}")
            }
            ProgressEvent::NodeFinished { node_id } => format!("finished {node_id}"),
            ProgressEvent::NodeFailed { node_id, detail } => {
                format!("failed {node_id}: {detail}")
            }
            ProgressEvent::AgentOutput { source, line } => format!("[{source}] {line}"),
            ProgressEvent::LoopAdvanced { loop_id, iteration } => {
                format!("loop {loop_id} advanced to iteration {iteration}")
            }
            ProgressEvent::TicketLanded { ticket_id } => format!("landed {ticket_id}"),
            ProgressEvent::TicketEvicted { ticket_id, reason } => {
                format!("evicted {ticket_id}: {reason}")
            }
            ProgressEvent::RunFinished { run_id } => format!("run {run_id} finished"),
        }
    }
}

pub enum Status {
    Event(ProgressEvent),
    Done,
    Error(String),
}

async fn display_status(mut rx: Receiver<Status>) {
    let spinner = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
    let mut i = 0usize;
    let mut last_message = String::new();

    loop {
        tokio::select! {
            Some(status) = rx.recv() => match status {
                Status::Event(event) => {
                    last_message = event.render();
                    let _ = execute!(stderr(), MoveToColumn(0), Clear(ClearType::CurrentLine));
                    eprint!("{} {}", spinner[i % spinner.len()].blue(), last_message.blue());
                    i = i.wrapping_add(1);
                }
                Status::Done => {
                    let _ = execute!(stderr(), MoveToColumn(0), Clear(ClearType::CurrentLine));
                    break;
                }
                Status::Error(e) => {
                    let _ = execute!(stderr(), MoveToColumn(0), Clear(ClearType::CurrentLine));
                    eprintln!("{}", format!("error: {e}").red());
                    break;
                }
            },
            _ = tokio::time::sleep(Duration::from_millis(80)) => {
                let _ = execute!(stderr(), MoveToColumn(0), Clear(ClearType::CurrentLine));
                eprint!("{} {}", spinner[i % spinner.len()].blue(), last_message.blue());
                i = i.wrapping_add(1);
            }
        }
    }
}

/// Spawns the spinner task and returns a sender for `ProgressEvent`s. When
/// stderr isn't a tty (or progress is disabled), events are still drained
/// but only logged plainly, one per line, so piping output stays readable.
pub fn spawn_progress_display(plain: bool) -> (Sender<ProgressEvent>, tokio::task::JoinHandle<()>) {
    let (tx, rx) = channel(64);
    let handle = if plain {
        tokio::spawn(drain_plain(rx))
    } else {
        let (status_tx, status_rx) = channel(64);
        tokio::spawn(bridge_and_display(rx, status_tx, status_rx))
    };
    (tx, handle)
}

async fn drain_plain(mut rx: Receiver<ProgressEvent>) {
    while let Some(event) = rx.recv().await {
        eprintln!("{}", event.render());
    }
}

async fn bridge_and_display(
    mut events: Receiver<ProgressEvent>,
    status_tx: Sender<Status>,
    status_rx: Receiver<Status>,
) {
    let display_task = tokio::spawn(display_status(status_rx));
    while let Some(event) = events.recv().await {
        if status_tx.send(Status::Event(event)).await.is_err() {
            break;
        }
    }
    let _ = status_tx.send(Status::Done).await;
    let _ = display_task.await;
}
