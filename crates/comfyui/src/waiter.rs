//! Completion waiter for a submitted prompt.
//!
//! Reads frames from the job's WebSocket channel, parses them into
//! [`ComfyUIMessage`] variants and stops on the terminal event for the
//! prompt. A periodic history check covers a terminal event that was
//! missed, and an overall deadline bounds the wait.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

use crate::api::ComfyUIApiError;
use crate::history::NodeOutput;
use crate::messages::{parse_message, ComfyUIMessage, ExecutedData};

/// Timing knobs for [`wait_for_completion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitConfig {
    /// Overall budget for one prompt.
    pub timeout: Duration,
    /// Longest single wait for the next frame.
    pub recv_timeout: Duration,
    /// Minimum gap between two history checks.
    pub history_poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            recv_timeout: Duration::from_secs(5),
            history_poll_interval: Duration::from_secs(5),
        }
    }
}

/// What counts as "done" for a prompt.
///
/// Workflows differ: most are done when the engine reports that no node
/// is executing anymore, while some callers only care about one output
/// node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CompletionCriterion {
    /// `executing` with `node == null` for the prompt.
    #[default]
    ExecutionFinished,
    /// `executed` for the given node of the prompt. The
    /// execution-finished event is accepted as well, since nothing else
    /// can arrive after it.
    NodeExecuted(String),
}

/// How the waiter learned that the prompt finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSource {
    TerminalEvent,
    HistoryFallback,
}

/// Result of a successful wait.
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    pub source: CompletionSource,
    /// `executed` frames seen for the prompt, in arrival order.
    pub executed: Vec<ExecutedData>,
}

impl WaitOutcome {
    /// First non-empty text the given node reported in an `executed`
    /// frame, latest frame first.
    pub fn text_output(&self, node_id: &str) -> Option<String> {
        self.executed
            .iter()
            .rev()
            .filter(|data| data.node == node_id)
            .filter_map(|data| serde_json::from_value::<NodeOutput>(data.output.clone()).ok())
            .find_map(|out| out.text.into_iter().find(|t| !t.trim().is_empty()))
    }
}

/// Asks the history endpoint whether a prompt has finished.
#[async_trait]
pub trait HistoryProbe: Send + Sync {
    async fn job_finished(&self, prompt_id: &str) -> Result<bool, ComfyUIApiError>;
}

/// Errors that end a wait.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("Timed out after {elapsed:?} waiting for prompt {prompt_id}")]
    Timeout { prompt_id: String, elapsed: Duration },

    #[error("Workflow error: {message}")]
    RemoteExecution {
        message: String,
        node_id: Option<String>,
    },

    #[error("Channel closed before prompt {prompt_id} finished")]
    ChannelClosed { prompt_id: String },

    #[error("WebSocket receive error: {0}")]
    Channel(String),

    #[error("History check failed: {0}")]
    History(#[from] ComfyUIApiError),
}

/// Classification of a single text frame relative to one prompt.
#[derive(Debug)]
enum Verdict {
    Terminal,
    Executed(ExecutedData),
    Failed {
        message: String,
        node_id: Option<String>,
    },
    Ignored,
}

/// Wait until `prompt_id` finishes, fails, or the deadline passes.
///
/// Loops over frames from `stream`:
///
/// * the terminal event (see [`CompletionCriterion`]) ends the wait;
/// * `execution_error` / `execution_interrupted` for the prompt, or a
///   generic `error` frame, fail with [`WaitError::RemoteExecution`];
/// * frames for other prompts, unparseable frames and binary preview
///   frames are skipped;
/// * every `history_poll_interval` the history endpoint is asked whether
///   the prompt already has outputs;
/// * when the stream ends, one last history check decides between
///   success and [`WaitError::ChannelClosed`].
pub async fn wait_for_completion<S, E, P>(
    stream: &mut S,
    prompt_id: &str,
    criterion: &CompletionCriterion,
    probe: &P,
    config: &WaitConfig,
) -> Result<WaitOutcome, WaitError>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    P: HistoryProbe + ?Sized,
{
    let started = Instant::now();
    let deadline = started + config.timeout;
    let mut last_history_check = started;
    let mut executed = Vec::new();

    loop {
        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(prompt_id, elapsed = ?now - started, "Timed out waiting for prompt");
            return Err(WaitError::Timeout {
                prompt_id: prompt_id.to_string(),
                elapsed: now - started,
            });
        }

        let recv_for = config.recv_timeout.min(deadline - now);
        match tokio::time::timeout(recv_for, stream.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => match classify(&text, prompt_id) {
                Verdict::Terminal => {
                    tracing::info!(prompt_id, "Prompt finished");
                    return Ok(WaitOutcome {
                        source: CompletionSource::TerminalEvent,
                        executed,
                    });
                }
                Verdict::Executed(data) => {
                    let is_target = matches!(
                        criterion,
                        CompletionCriterion::NodeExecuted(node) if *node == data.node
                    );
                    executed.push(data);
                    if is_target {
                        tracing::info!(prompt_id, "Target node executed");
                        return Ok(WaitOutcome {
                            source: CompletionSource::TerminalEvent,
                            executed,
                        });
                    }
                }
                Verdict::Failed { message, node_id } => {
                    tracing::error!(
                        prompt_id,
                        node_id = ?node_id,
                        error_message = %message,
                        "Execution error",
                    );
                    return Err(WaitError::RemoteExecution { message, node_id });
                }
                Verdict::Ignored => {}
            },
            Ok(Some(Ok(Message::Binary(_)))) => {
                tracing::trace!(prompt_id, "Ignoring binary message (preview image)");
            }
            Ok(Some(Ok(Message::Close(frame)))) => {
                tracing::info!(prompt_id, ?frame, "ComfyUI WebSocket closed");
                return finish_after_close(probe, prompt_id, executed, started, deadline).await;
            }
            Ok(Some(Ok(_))) => {
                // Ping/pong are answered by tungstenite.
            }
            Ok(Some(Err(e))) => {
                tracing::error!(prompt_id, error = %e, "WebSocket receive error");
                return Err(WaitError::Channel(e.to_string()));
            }
            Ok(None) => {
                return finish_after_close(probe, prompt_id, executed, started, deadline).await;
            }
            Err(_) => {
                tracing::trace!(prompt_id, "No frame within receive timeout");
            }
        }

        if last_history_check.elapsed() >= config.history_poll_interval {
            last_history_check = Instant::now();
            if check_history(probe, prompt_id, started, deadline).await? {
                tracing::info!(prompt_id, "Prompt finished (history fallback)");
                return Ok(WaitOutcome {
                    source: CompletionSource::HistoryFallback,
                    executed,
                });
            }
        }
    }
}

// ---- private helpers ----

/// One history check, cut off at the overall deadline.
async fn check_history<P: HistoryProbe + ?Sized>(
    probe: &P,
    prompt_id: &str,
    started: Instant,
    deadline: Instant,
) -> Result<bool, WaitError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match tokio::time::timeout(remaining, probe.job_finished(prompt_id)).await {
        Ok(finished) => Ok(finished?),
        Err(_) => {
            tracing::warn!(prompt_id, "History check outlived the wait deadline");
            Err(WaitError::Timeout {
                prompt_id: prompt_id.to_string(),
                elapsed: started.elapsed(),
            })
        }
    }
}

async fn finish_after_close<P: HistoryProbe + ?Sized>(
    probe: &P,
    prompt_id: &str,
    executed: Vec<ExecutedData>,
    started: Instant,
    deadline: Instant,
) -> Result<WaitOutcome, WaitError> {
    if check_history(probe, prompt_id, started, deadline).await? {
        return Ok(WaitOutcome {
            source: CompletionSource::HistoryFallback,
            executed,
        });
    }
    Err(WaitError::ChannelClosed {
        prompt_id: prompt_id.to_string(),
    })
}

fn classify(text: &str, prompt_id: &str) -> Verdict {
    let msg = match parse_message(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(error = %e, raw_message = %text, "Skipping unparsed ComfyUI message");
            return Verdict::Ignored;
        }
    };

    // Frames tagged with another prompt belong to another job on the
    // same engine.
    let ours = msg.prompt_id().map_or(true, |id| id == prompt_id);
    if !ours {
        return Verdict::Ignored;
    }

    match msg {
        ComfyUIMessage::Executing(data) => match data.node {
            None if data.prompt_id.as_deref() == Some(prompt_id) => Verdict::Terminal,
            None => Verdict::Ignored,
            Some(node) => {
                tracing::debug!(prompt_id, node = %node, "Executing node");
                Verdict::Ignored
            }
        },
        ComfyUIMessage::Executed(data) => {
            tracing::debug!(prompt_id, node = %data.node, "Node executed with output");
            Verdict::Executed(data)
        }
        ComfyUIMessage::ExecutionError(data) => Verdict::Failed {
            message: data.exception_message,
            node_id: data.node_id,
        },
        ComfyUIMessage::ExecutionInterrupted(data) => Verdict::Failed {
            message: "Execution interrupted".to_string(),
            node_id: data.node_id,
        },
        ref error @ ComfyUIMessage::Error(_) => Verdict::Failed {
            message: error.error_message().unwrap_or_default(),
            node_id: None,
        },
        ComfyUIMessage::Progress(data) => {
            tracing::trace!(prompt_id, value = data.value, max = data.max, "Generation progress");
            Verdict::Ignored
        }
        ComfyUIMessage::Status(_)
        | ComfyUIMessage::ExecutionStart(_)
        | ComfyUIMessage::ExecutionCached(_) => Verdict::Ignored,
    }
}
