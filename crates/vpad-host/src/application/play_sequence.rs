//! PlaySequenceUseCase: replays a declarative input sequence through the
//! script surface.
//!
//! A sequence is a TOML file with one `[[step]]` table per action.  Steps name
//! controllers by *slot*, a label chosen when the controller is attached:
//!
//! ```toml
//! [[step]]
//! action = "attach"
//! slot = "p1"
//! colors = { body_color = 0xFF0000, buttons_color = 0x00FF00, grip_left_color = 0x0000FF, grip_right_color = 0xFFFFFF }
//!
//! [[step]]
//! action = "press"
//! slot = "p1"
//! button = "a"
//!
//! [[step]]
//! action = "sleep"
//! nanoseconds = 50000000
//!
//! [[step]]
//! action = "set_joystick"
//! slot = "p1"
//! stick = 1
//! x = 100
//! y = -50
//!
//! [[step]]
//! action = "detach"
//! slot = "p1"
//! ```
//!
//! `press` and `release` accept several `|`-joined names (`button = "a | zr"`).
//! A `fatal` step (`code = 0x2A8`) aborts playback with that result code.
//!
//! The first failing step aborts the pass; the error names the 1-based step
//! number.  Controllers stay attached after an aborted pass so the host can
//! detach them during shutdown.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use vpad_core::{ButtonMask, ControllerHandle, ControllerIdentity, ResultCode, UnknownButton};

use super::manage_controllers::ControllerError;
use super::script_api::ScriptApi;

/// Error type for loading and playing sequences.
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("I/O error reading sequence at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sequence TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("step {step}: no controller attached in slot {slot:?}")]
    UnknownSlot { step: usize, slot: String },

    #[error("step {step}: slot {slot:?} already holds a controller")]
    SlotInUse { step: usize, slot: String },

    #[error("step {step}: {source}")]
    Button {
        step: usize,
        #[source]
        source: UnknownButton,
    },

    #[error("step {step}: {source}")]
    Controller {
        step: usize,
        #[source]
        source: ControllerError,
    },

    #[error("step {step}: fatal abort requested: {code}")]
    Fatal { step: usize, code: ResultCode },

    #[error("sequence worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl SequenceError {
    /// The result code behind the failure, if one is known.
    pub fn result_code(&self) -> Option<ResultCode> {
        match self {
            Self::Fatal { code, .. } => Some(*code),
            Self::Controller { source, .. } => source.code(),
            _ => None,
        }
    }
}

// ── Sequence format ───────────────────────────────────────────────────────────

/// One action of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Attaches a controller; `colors` falls back to the configured identity.
    Attach {
        slot: String,
        #[serde(default)]
        colors: Option<ControllerIdentity>,
    },
    Detach {
        slot: String,
    },
    /// Replaces the whole button mask.
    SetButtons {
        slot: String,
        mask: i64,
    },
    /// Sets one named button, keeping the others.
    Press {
        slot: String,
        button: String,
    },
    /// Clears one named button, keeping the others.
    Release {
        slot: String,
        button: String,
    },
    SetJoystick {
        slot: String,
        stick: i64,
        x: i64,
        y: i64,
    },
    Resync {
        slot: String,
    },
    Sleep {
        nanoseconds: i64,
    },
    Log {
        message: String,
    },
    /// Aborts the host with a result code.
    Fatal {
        code: i64,
    },
}

/// An ordered list of steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Sequence {
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

impl Sequence {
    /// # Errors
    ///
    /// Returns [`SequenceError::Parse`] for malformed TOML or unknown actions.
    pub fn from_toml(content: &str) -> Result<Self, SequenceError> {
        Ok(toml::from_str(content)?)
    }

    /// # Errors
    ///
    /// Returns [`SequenceError::Io`] if the file cannot be read, otherwise as
    /// [`Sequence::from_toml`].
    pub fn load(path: &Path) -> Result<Self, SequenceError> {
        let content = std::fs::read_to_string(path).map_err(|source| SequenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }
}

// ── Player ────────────────────────────────────────────────────────────────────

/// Plays sequences and remembers which controller sits in which slot.
pub struct SequencePlayer {
    api: ScriptApi,
    default_identity: ControllerIdentity,
    slots: HashMap<String, ControllerHandle>,
}

impl SequencePlayer {
    pub fn new(api: ScriptApi, default_identity: ControllerIdentity) -> Self {
        Self {
            api,
            default_identity,
            slots: HashMap::new(),
        }
    }

    /// The controller currently attached in `slot`.
    pub fn handle(&self, slot: &str) -> Option<ControllerHandle> {
        self.slots.get(slot).copied()
    }

    /// Plays every step in order, stopping early once `running` is cleared.
    ///
    /// Returns the number of steps executed.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error; later steps are not run.
    pub fn play(&mut self, sequence: &Sequence, running: &AtomicBool) -> Result<usize, SequenceError> {
        let mut executed = 0;
        for (index, step) in sequence.steps.iter().enumerate() {
            if !running.load(Ordering::Relaxed) {
                debug!(executed, "sequence interrupted");
                break;
            }
            self.run_step(index + 1, step)?;
            executed += 1;
        }
        Ok(executed)
    }

    fn slot(&self, step: usize, slot: &str) -> Result<ControllerHandle, SequenceError> {
        self.handle(slot).ok_or_else(|| SequenceError::UnknownSlot {
            step,
            slot: slot.to_string(),
        })
    }

    fn run_step(&mut self, step: usize, action: &Step) -> Result<(), SequenceError> {
        let controller = |source| SequenceError::Controller { step, source };
        let button = |source| SequenceError::Button { step, source };

        match action {
            Step::Attach { slot, colors } => {
                if self.slots.contains_key(slot) {
                    return Err(SequenceError::SlotInUse {
                        step,
                        slot: slot.clone(),
                    });
                }
                let identity = colors.unwrap_or(self.default_identity);
                let result = self.api.attach_controller(
                    i64::from(identity.body_color),
                    i64::from(identity.buttons_color),
                    i64::from(identity.grip_left_color),
                    i64::from(identity.grip_right_color),
                );
                match result {
                    Ok(handle) => {
                        info!(slot = %slot, %handle, "slot attached");
                        self.slots.insert(slot.clone(), handle);
                    }
                    Err(err) => {
                        // A device left registered still belongs to the slot.
                        if let ControllerError::InitialPush {
                            retained: Some(handle),
                            ..
                        } = err
                        {
                            self.slots.insert(slot.clone(), handle);
                        }
                        return Err(controller(err));
                    }
                }
            }
            Step::Detach { slot } => {
                let handle = self.slot(step, slot)?;
                self.api.detach_controller(handle).map_err(controller)?;
                self.slots.remove(slot);
            }
            Step::SetButtons { slot, mask } => {
                let handle = self.slot(step, slot)?;
                self.api.set_buttons(handle, *mask).map_err(controller)?;
            }
            Step::Press { slot, button: name } | Step::Release { slot, button: name } => {
                let handle = self.slot(step, slot)?;
                let bits: ButtonMask = name.parse().map_err(button)?;
                let press = matches!(action, Step::Press { .. });
                self.api
                    .manager()
                    .update_buttons(handle, |current| {
                        if press {
                            current.union(bits)
                        } else {
                            current.difference(bits)
                        }
                    })
                    .map_err(controller)?;
            }
            Step::SetJoystick { slot, stick, x, y } => {
                let handle = self.slot(step, slot)?;
                self.api
                    .set_joystick(handle, *stick, *x, *y)
                    .map_err(controller)?;
            }
            Step::Resync { slot } => {
                let handle = self.slot(step, slot)?;
                self.api.resync_controller(handle).map_err(controller)?;
            }
            Step::Sleep { nanoseconds } => self.api.sleep(*nanoseconds),
            Step::Log { message } => self.api.log(message),
            Step::Fatal { code } => {
                return Err(SequenceError::Fatal {
                    step,
                    code: ResultCode::from_raw(*code as u32),
                });
            }
        }
        Ok(())
    }
}

// ── Host loop ─────────────────────────────────────────────────────────────────

/// How often the host plays the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOptions {
    /// Replay until `running` is cleared instead of playing once.
    pub repeat: bool,
    /// Pause between passes.
    pub interval: Duration,
}

/// Plays `sequence` on a blocking worker thread, once or repeatedly.
///
/// Returns the number of completed passes.
///
/// # Errors
///
/// Returns the first pass error, or [`SequenceError::Worker`] if the worker
/// thread panicked.
pub async fn run_sequence_loop(
    mut player: SequencePlayer,
    sequence: Arc<Sequence>,
    options: LoopOptions,
    running: Arc<AtomicBool>,
) -> Result<u64, SequenceError> {
    let mut passes = 0;
    while running.load(Ordering::Relaxed) {
        let seq = Arc::clone(&sequence);
        let flag = Arc::clone(&running);
        let (returned, result) = tokio::task::spawn_blocking(move || {
            let result = player.play(&seq, &flag);
            (player, result)
        })
        .await?;
        player = returned;
        result?;
        passes += 1;

        if !options.repeat {
            break;
        }
        tokio::time::sleep(options.interval).await;
    }
    Ok(passes)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
