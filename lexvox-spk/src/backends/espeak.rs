//! espeak-ng speech backend
//!
//! Each utterance runs as its own `espeak-ng` process speaking straight to
//! the audio device. A watcher thread per utterance reports the end of
//! playback; cancel kills the process. Pause and resume stop and continue
//! the process on Unix.

use crate::backends::{BackendEvent, SpeechBackend, Utterance, UtteranceId, Voice};
use crate::config::{EspeakConfig, NarrationOptions};
use crate::engine::EventSink;
use crate::error::SpeechError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const MAX_TEXT_LENGTH: usize = 100_000;
const MAX_VOICES: usize = 1000;

/// Speech backend driving the `espeak-ng` executable
pub struct EspeakBackend {
    program: PathBuf,
    base_words_per_minute: u32,
    available: bool,
    playbacks: Arc<Mutex<HashMap<UtteranceId, Playback>>>,
}

struct Playback {
    child: Child,
    events: EventSink,
}

impl EspeakBackend {
    pub fn new(config: &EspeakConfig) -> Self {
        let available = Command::new(&config.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);

        if available {
            info!("espeak-ng backend initialized ({})", config.program.display());
        } else {
            warn!("espeak-ng not found at {}", config.program.display());
        }

        Self {
            program: config.program.clone(),
            base_words_per_minute: config.base_words_per_minute,
            available,
            playbacks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of utterances with a live process
    pub fn active_playbacks(&self) -> usize {
        self.playbacks.lock().len()
    }

    fn signal(&self, id: UtteranceId, signal: Signal) -> Result<EventSink, SpeechError> {
        let playbacks = self.playbacks.lock();
        let playback = playbacks
            .get(&id)
            .ok_or_else(|| SpeechError::Backend(format!("Unknown {}", id)))?;
        send_signal(playback.child.id(), signal)?;
        Ok(playback.events.clone())
    }
}

impl SpeechBackend for EspeakBackend {
    fn name(&self) -> &str {
        "espeak-ng"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn list_voices(&self) -> Result<Vec<Voice>, SpeechError> {
        if !self.available {
            return Ok(Vec::new());
        }

        let output = Command::new(&self.program)
            .arg("--voices")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| SpeechError::Backend(format!("Failed to list voices: {}", e)))?;

        if !output.status.success() {
            return Err(SpeechError::Backend(format!(
                "espeak-ng --voices failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    fn start_utterance(
        &self,
        id: UtteranceId,
        utterance: &Utterance,
        events: EventSink,
    ) -> Result<(), SpeechError> {
        if !self.available {
            return Err(SpeechError::Unsupported("espeak-ng not available".to_string()));
        }

        let text = sanitize_text(&utterance.text);
        if text.trim().is_empty() {
            // Nothing to say; report completion without spawning
            events.emit(BackendEvent::Ended);
            return Ok(());
        }

        let mut child = Command::new(&self.program)
            .args(espeak_args(&utterance.options, self.base_words_per_minute))
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SpeechError::Backend(format!("Failed to run espeak-ng: {}", e)))?;

        let stdin = child.stdin.take();
        let stderr = child.stderr.take();
        debug!(%id, pid = child.id(), "espeak-ng started");

        self.playbacks.lock().insert(
            id,
            Playback {
                child,
                events: events.clone(),
            },
        );
        events.emit(BackendEvent::Started);

        let playbacks = Arc::clone(&self.playbacks);
        let watcher_events = events.clone();
        let spawned = thread::Builder::new()
            .name(format!("espeak-{}", id.0))
            .spawn(move || watch_playback(playbacks, id, text, stdin, stderr, watcher_events));

        if let Err(e) = spawned {
            if let Some(mut playback) = self.playbacks.lock().remove(&id) {
                terminate(&mut playback.child);
            }
            return Err(SpeechError::Io(e));
        }

        Ok(())
    }

    fn pause(&self, id: UtteranceId) -> Result<(), SpeechError> {
        let events = self.signal(id, Signal::Stop)?;
        events.emit(BackendEvent::Paused);
        Ok(())
    }

    fn resume(&self, id: UtteranceId) -> Result<(), SpeechError> {
        let events = self.signal(id, Signal::Continue)?;
        events.emit(BackendEvent::Resumed);
        Ok(())
    }

    fn cancel(&self, id: UtteranceId) -> Result<(), SpeechError> {
        let playback = self.playbacks.lock().remove(&id);
        if let Some(mut playback) = playback {
            debug!(%id, "Killing espeak-ng");
            terminate(&mut playback.child);
        }
        Ok(())
    }
}

impl Drop for EspeakBackend {
    fn drop(&mut self) {
        for (_, mut playback) in self.playbacks.lock().drain() {
            terminate(&mut playback.child);
        }
    }
}

/// Feed the text, then poll until the process exits or is cancelled
fn watch_playback(
    playbacks: Arc<Mutex<HashMap<UtteranceId, Playback>>>,
    id: UtteranceId,
    text: String,
    stdin: Option<ChildStdin>,
    stderr: Option<ChildStderr>,
    events: EventSink,
) {
    if let Some(mut stdin) = stdin {
        // Closing stdin marks the end of input
        if let Err(e) = stdin.write_all(text.as_bytes()) {
            debug!(%id, "Failed to write text to espeak-ng: {}", e);
        }
    }

    let outcome = loop {
        let polled = {
            let mut playbacks = playbacks.lock();
            let Some(playback) = playbacks.get_mut(&id) else {
                // Cancelled; the canceller reaped the process
                return;
            };
            match playback.child.try_wait() {
                Ok(None) => None,
                Ok(Some(status)) => {
                    playbacks.remove(&id);
                    Some(Ok(status))
                }
                Err(e) => {
                    if let Some(mut playback) = playbacks.remove(&id) {
                        terminate(&mut playback.child);
                    }
                    Some(Err(e))
                }
            }
        };
        match polled {
            Some(outcome) => break outcome,
            None => thread::sleep(POLL_INTERVAL),
        }
    };

    events.emit(exit_event(outcome, stderr));
}

fn exit_event(outcome: std::io::Result<ExitStatus>, stderr: Option<ChildStderr>) -> BackendEvent {
    match outcome {
        Ok(status) if status.success() => BackendEvent::Ended,
        Ok(status) => {
            let mut message = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut message);
            }
            let message = message.trim();
            if message.is_empty() {
                BackendEvent::Failed(format!("espeak-ng exited with {}", status))
            } else {
                BackendEvent::Failed(format!("espeak-ng exited with {}: {}", status, message))
            }
        }
        Err(e) => BackendEvent::Failed(format!("Failed to wait for espeak-ng: {}", e)),
    }
}

fn terminate(child: &mut Child) {
    // Already exited is fine
    let _ = child.kill();
    let _ = child.wait();
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Stop,
    Continue,
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) -> Result<(), SpeechError> {
    let flag = match signal {
        Signal::Stop => "-STOP",
        Signal::Continue => "-CONT",
    };
    let status = Command::new("kill")
        .arg(flag)
        .arg(pid.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    if !status.success() {
        return Err(SpeechError::Backend(format!("kill {} {} failed: {}", flag, pid, status)));
    }
    Ok(())
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, signal: Signal) -> Result<(), SpeechError> {
    Err(SpeechError::Unsupported(format!(
        "{:?} is not supported for espeak-ng on this platform",
        signal
    )))
}

/// Command-line flags for rate, volume, pitch and voice
pub fn espeak_args(options: &NarrationOptions, base_words_per_minute: u32) -> Vec<String> {
    // Speed in words per minute; espeak-ng accepts 80-500
    let words_per_minute = (base_words_per_minute as f32 * finite_or(options.rate, 1.0))
        .round()
        .clamp(80.0, 500.0) as u32;

    // Amplitude 0-200, 100 is normal
    let amplitude = (finite_or(options.volume, 1.0) * 100.0).round().clamp(0.0, 200.0) as u32;

    // Pitch 0-99, 50 is normal
    let pitch = (finite_or(options.pitch, 1.0) * 50.0).round().clamp(0.0, 99.0) as u32;

    let voice = options
        .voice
        .as_deref()
        .map(str::to_string)
        .unwrap_or_else(|| options.language.to_lowercase());

    let mut args = vec![
        "-s".to_string(),
        words_per_minute.to_string(),
        "-a".to_string(),
        amplitude.to_string(),
        "-p".to_string(),
        pitch.to_string(),
    ];

    let voice: String = voice.chars().filter(|c| !c.is_control()).take(256).collect();
    if !voice.is_empty() {
        args.push("-v".to_string());
        args.push(voice);
    }

    args
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Replace control characters with spaces and cap the length
fn sanitize_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(MAX_TEXT_LENGTH)
        .collect()
}

/// Parse `espeak-ng --voices` output
///
/// Columns: priority, language, age/gender, voice name, file, other languages.
pub fn parse_voice_list(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter(|line| !line.trim_start().starts_with("Pty"))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _priority = fields.next()?;
            let language = fields.next()?;
            let _age_gender = fields.next()?;
            let name = fields.next()?;

            if language.len() > 32 || name.len() > 256 {
                warn!("Skipping oversized voice entry: {}", line.trim());
                return None;
            }

            Some(Voice::new(language, name.replace('_', " "), canonical_locale(language)))
        })
        .take(MAX_VOICES)
        .collect()
}

/// "pt-br" -> "pt-BR"; subtags other than two-letter regions are kept as-is
pub fn canonical_locale(tag: &str) -> String {
    tag.split('-')
        .enumerate()
        .map(|(index, part)| {
            if index == 0 {
                part.to_ascii_lowercase()
            } else if part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()) {
                part.to_ascii_uppercase()
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
