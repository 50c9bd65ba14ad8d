use anyhow::Context;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::Result;

pub mod service;
pub mod state;

pub use service::{ConversionService, RapidApiClient, ServiceStatus, StatusResponse};
pub use state::{
    ConversionMachine, ConversionState, ConversionView, Converted, Effect, Generation, Msg,
    PollSettings,
};

/// Input of the controller task
enum Command {
    /// Apply a message to the machine.
    Apply(Msg),
    /// Replace the input and submit it, reporting the generation it was given.
    Submit {
        input: String,
        reply: Option<oneshot::Sender<Generation>>,
    },
}

/// Owns the lifecycle of conversion attempts.
///
/// A single task holds the [`ConversionMachine`] and applies messages in arrival
/// order. Status checks and poll delays run as separate tasks that report back
/// through the same channel, tagged with the attempt they belong to. Observers
/// read the current [`ConversionView`] through a watch channel.
pub struct ConversionController {
    tx: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<ConversionView>,
    task: JoinHandle<()>,
}

impl ConversionController {
    /// Start the controller on the current tokio runtime
    pub fn spawn(service: Arc<dyn ConversionService>, settings: PollSettings) -> Self {
        let machine = ConversionMachine::new(settings);
        let (view_tx, view) = watch::channel(machine.view());
        let (tx, rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run_loop(machine, service, rx, tx.clone(), view_tx));

        Self { tx, view, task }
    }

    /// Submit a URL, superseding any attempt still running
    pub fn submit(&self, input: impl Into<String>) {
        self.send(Command::Submit {
            input: input.into(),
            reply: None,
        });
    }

    /// Drop any result or running attempt and clear the input
    pub fn reset(&self) {
        self.send(Command::Apply(Msg::Reset));
    }

    /// Current snapshot
    pub fn view(&self) -> ConversionView {
        self.view.borrow().clone()
    }

    /// Receiver notified on every visible state change
    pub fn subscribe(&self) -> watch::Receiver<ConversionView> {
        self.view.clone()
    }

    /// Submit a URL and wait until that submission is resolved.
    ///
    /// Returns the idle state if a later submit or reset supersedes the
    /// submission before it resolves.
    pub async fn convert(&self, input: impl Into<String>) -> Result<ConversionState> {
        let mut rx = self.subscribe();
        let (reply, generation) = oneshot::channel();

        self.send(Command::Submit {
            input: input.into(),
            reply: Some(reply),
        });
        let mine = generation.await.context("Conversion controller stopped")?;

        let view = rx
            .wait_for(|view| {
                view.generation > mine || (view.generation == mine && view.state.is_terminal())
            })
            .await
            .context("Conversion controller stopped")?;

        if view.generation == mine {
            Ok(view.state.clone())
        } else {
            tracing::debug!(generation = mine, "Conversion superseded before it resolved");
            Ok(ConversionState::Idle)
        }
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::error!("Conversion controller is no longer running");
        }
    }
}

impl Drop for ConversionController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_loop(
    mut machine: ConversionMachine,
    service: Arc<dyn ConversionService>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    tx: mpsc::UnboundedSender<Command>,
    view_tx: watch::Sender<ConversionView>,
) {
    while let Some(command) = rx.recv().await {
        let mut effects = Vec::new();
        let reply = match command {
            Command::Apply(msg) => {
                machine = apply(machine, msg, &mut effects);
                None
            }
            Command::Submit { input, reply } => {
                machine = apply(machine, Msg::InputChanged(input), &mut effects);
                machine = apply(machine, Msg::Submitted, &mut effects);
                reply
            }
        };

        let view = machine.view();
        view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });

        // Published before replying so the caller never observes an older view.
        if let Some(reply) = reply {
            let _ = reply.send(machine.generation());
        }

        for effect in effects {
            run_effect(effect, &service, &tx);
        }
    }
}

fn apply(machine: ConversionMachine, msg: Msg, effects: &mut Vec<Effect>) -> ConversionMachine {
    let (next, mut produced) = state::update(machine, msg);
    effects.append(&mut produced);
    next
}

fn run_effect(
    effect: Effect,
    service: &Arc<dyn ConversionService>,
    tx: &mpsc::UnboundedSender<Command>,
) {
    let tx = tx.clone();
    match effect {
        Effect::CheckStatus {
            generation,
            count,
            video_id,
        } => {
            let service = Arc::clone(service);
            tokio::spawn(async move {
                let outcome = service.check_status(&video_id).await;
                // The controller may be gone; nothing is waiting for this answer then.
                let _ = tx.send(Command::Apply(Msg::StatusReceived {
                    generation,
                    count,
                    outcome,
                }));
            });
        }
        Effect::ScheduleTick {
            generation,
            count,
            delay,
        } => {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(Command::Apply(Msg::TickElapsed { generation, count }));
            });
        }
    }
}
