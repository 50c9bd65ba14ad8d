//! Pure conversion state machine.
//!
//! `update` applies one message and returns the effects the driver must run.
//! Nothing in here touches the network or timers, so every transition can be
//! exercised synchronously.

use serde::Serialize;
use std::time::Duration;

use super::service::{ServiceStatus, StatusResponse};
use crate::extractors::{self, VideoId};
use crate::ConversionError;

/// Identifies one submission. Messages tagged with an older generation are stale.
pub type Generation = u64;

/// Upper bound on poll ticks before an attempt times out
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Delay between two status checks of the same attempt
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polling bounds for an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Successful conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Converted {
    pub video_id: VideoId,
    pub link: String,
    pub title: Option<String>,
}

/// Externally visible state of the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionState {
    Idle,
    Loading { video_id: VideoId, progress: String },
    Failed(ConversionError),
    Succeeded(Converted),
}

impl ConversionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversionState::Failed(_) | ConversionState::Succeeded(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ConversionState::Loading { .. })
    }

    /// Current progress message, empty outside of loading
    pub fn progress(&self) -> &str {
        match self {
            ConversionState::Loading { progress, .. } => progress,
            _ => "",
        }
    }
}

/// Snapshot handed to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionView {
    pub input: String,
    pub generation: Generation,
    pub state: ConversionState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User edited the URL input.
    InputChanged(String),
    /// User submitted the current input.
    Submitted,
    /// A status check finished.
    StatusReceived {
        generation: Generation,
        count: u32,
        outcome: Result<StatusResponse, ConversionError>,
    },
    /// The delay before the next poll elapsed.
    TickElapsed { generation: Generation, count: u32 },
    /// User asked to start over.
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    CheckStatus {
        generation: Generation,
        count: u32,
        video_id: VideoId,
    },
    ScheduleTick {
        generation: Generation,
        count: u32,
        delay: Duration,
    },
}

/// What the active attempt is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Awaiting {
    Response,
    Tick,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Attempt {
    generation: Generation,
    video_id: VideoId,
    count: u32,
    progress: String,
    awaiting: Awaiting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    Polling(Attempt),
    Done(Result<Converted, ConversionError>),
}

/// State of the conversion lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionMachine {
    settings: PollSettings,
    input: String,
    generation: Generation,
    phase: Phase,
}

impl ConversionMachine {
    pub fn new(settings: PollSettings) -> Self {
        Self {
            settings,
            input: String::new(),
            generation: 0,
            phase: Phase::Idle,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn state(&self) -> ConversionState {
        match &self.phase {
            Phase::Idle => ConversionState::Idle,
            Phase::Polling(attempt) => ConversionState::Loading {
                video_id: attempt.video_id.clone(),
                progress: attempt.progress.clone(),
            },
            Phase::Done(Ok(converted)) => ConversionState::Succeeded(converted.clone()),
            Phase::Done(Err(err)) => ConversionState::Failed(err.clone()),
        }
    }

    pub fn view(&self) -> ConversionView {
        ConversionView {
            input: self.input.clone(),
            generation: self.generation,
            state: self.state(),
        }
    }

    /// The attempt a message belongs to, if it is still live and expected
    fn current_attempt(
        &mut self,
        generation: Generation,
        count: u32,
        awaiting: Awaiting,
    ) -> Option<&mut Attempt> {
        match &mut self.phase {
            Phase::Polling(attempt)
                if attempt.generation == generation
                    && attempt.count == count
                    && attempt.awaiting == awaiting =>
            {
                Some(attempt)
            }
            _ => None,
        }
    }

    fn finish(&mut self, outcome: Result<Converted, ConversionError>) {
        match &outcome {
            Ok(converted) => tracing::info!(
                generation = self.generation,
                video_id = %converted.video_id,
                "Conversion succeeded"
            ),
            Err(err) => log_failure(self.generation, err),
        }
        self.phase = Phase::Done(outcome);
    }
}

impl Default for ConversionMachine {
    fn default() -> Self {
        Self::new(PollSettings::default())
    }
}

/// Pure update function: applies a message to the machine and returns any effects.
pub fn update(mut machine: ConversionMachine, msg: Msg) -> (ConversionMachine, Vec<Effect>) {
    let effects = match msg {
        Msg::InputChanged(input) => {
            machine.input = input;
            Vec::new()
        }
        Msg::Submitted => submit(&mut machine),
        Msg::StatusReceived {
            generation,
            count,
            outcome,
        } => on_status(&mut machine, generation, count, outcome),
        Msg::TickElapsed { generation, count } => on_tick(&mut machine, generation, count),
        Msg::Reset => {
            // Bumping the generation turns anything still in flight into a stale message.
            machine.generation += 1;
            machine.input.clear();
            machine.phase = Phase::Idle;
            Vec::new()
        }
    };

    (machine, effects)
}

fn submit(machine: &mut ConversionMachine) -> Vec<Effect> {
    machine.generation += 1;
    let generation = machine.generation;

    let Some(video_id) = extractors::extract_video_id(&machine.input) else {
        tracing::debug!(
            looks_like_youtube = extractors::looks_like_youtube(&machine.input),
            "No video id found in input"
        );
        machine.finish(Err(ConversionError::Validation));
        return Vec::new();
    };

    tracing::info!(generation, video_id = %video_id, "Starting conversion");

    machine.phase = Phase::Polling(Attempt {
        generation,
        video_id: video_id.clone(),
        count: 0,
        progress: String::new(),
        awaiting: Awaiting::Response,
    });

    vec![Effect::CheckStatus {
        generation,
        count: 0,
        video_id,
    }]
}

fn on_status(
    machine: &mut ConversionMachine,
    generation: Generation,
    count: u32,
    outcome: Result<StatusResponse, ConversionError>,
) -> Vec<Effect> {
    let interval = machine.settings.interval;
    let Some(attempt) = machine.current_attempt(generation, count, Awaiting::Response) else {
        tracing::debug!(generation, count, "Ignoring stale status response");
        return Vec::new();
    };

    let response = match outcome {
        Ok(response) => response,
        Err(err) => {
            machine.finish(Err(err));
            return Vec::new();
        }
    };

    match response.status() {
        ServiceStatus::Ok => {
            let finished = match response.link {
                Some(link) if !link.is_empty() => Ok(Converted {
                    video_id: attempt.video_id.clone(),
                    link,
                    title: response.title.filter(|title| !title.is_empty()),
                }),
                _ => {
                    tracing::warn!(generation, "Service reported ok without a download link");
                    Err(ConversionError::ServiceFailure { message: None })
                }
            };
            machine.finish(finished);
            Vec::new()
        }
        ServiceStatus::Processing | ServiceStatus::InQueue => {
            attempt.progress = response
                .msg
                .filter(|msg| !msg.is_empty())
                .unwrap_or_else(|| converting_message(count));
            attempt.count += 1;
            attempt.awaiting = Awaiting::Tick;
            tracing::debug!(generation, count, progress = %attempt.progress, "Conversion in progress");

            vec![Effect::ScheduleTick {
                generation,
                count: attempt.count,
                delay: interval,
            }]
        }
        ServiceStatus::Fail => {
            machine.finish(Err(ConversionError::ServiceFailure {
                message: response.msg.filter(|msg| !msg.is_empty()),
            }));
            Vec::new()
        }
        ServiceStatus::Other(status) => {
            machine.finish(Err(ConversionError::UnknownStatus { status }));
            Vec::new()
        }
    }
}

fn on_tick(machine: &mut ConversionMachine, generation: Generation, count: u32) -> Vec<Effect> {
    let max_attempts = machine.settings.max_attempts;
    let Some(attempt) = machine.current_attempt(generation, count, Awaiting::Tick) else {
        tracing::debug!(generation, count, "Ignoring stale poll tick");
        return Vec::new();
    };

    if count > max_attempts {
        machine.finish(Err(ConversionError::Timeout));
        return Vec::new();
    }

    attempt.awaiting = Awaiting::Response;
    vec![Effect::CheckStatus {
        generation,
        count,
        video_id: attempt.video_id.clone(),
    }]
}

/// Animated placeholder shown while the service has nothing to say
fn converting_message(count: u32) -> String {
    format!("Converting{}", ".".repeat((count % 4) as usize))
}

fn log_failure(generation: Generation, err: &ConversionError) {
    match err {
        ConversionError::Transport { detail } => {
            tracing::warn!(generation, kind = err.kind(), %detail, "Conversion failed")
        }
        ConversionError::UnknownStatus { status } => {
            tracing::warn!(generation, kind = err.kind(), %status, "Conversion failed")
        }
        _ => tracing::warn!(generation, kind = err.kind(), message = %err, "Conversion failed"),
    }
}
