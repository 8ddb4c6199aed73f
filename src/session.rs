//! Client session controller
//!
//! Owns the camera stream, the speech engine and the stop signal, and drives
//! `Idle -> Streaming -> Capturing -> Streaming` (`Streaming -> Idle` on stop).
//! Everything the user should see is emitted as a [`UiEvent`].

use std::sync::{Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, mpsc, watch};

use crate::capture::{DEFAULT_JPEG_QUALITY, MediaCapture, capture};
use crate::client::RelayClient;
use crate::config::DEFAULT_CAPTURE_PROMPT;
use crate::voice::{SpeechOutput, VoiceHint, VoiceSelector, strip_markup};
use crate::{Error, Result};

/// Default speech locale
pub const DEFAULT_VOICE_LOCALE: &str = "id-ID";

/// Default fallback language family for persona voices
pub const DEFAULT_VOICE_FALLBACK: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No stream bound
    Idle,
    /// Stream bound, ready to capture
    Streaming,
    /// One capture and relay round trip in flight
    Capturing,
}

/// Something to show the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Status(String),
    Response(String),
    Error(String),
}

/// Single owner of all client session state
pub struct SessionController {
    state: Mutex<SessionState>,
    camera: AsyncMutex<Box<dyn MediaCapture>>,
    speech: AsyncMutex<Box<dyn SpeechOutput>>,
    relay: RelayClient,
    selector: VoiceSelector,
    voice_locale: String,
    prompt: String,
    quality: u8,
    /// Bumped on every stop; in-flight work watching it gives up
    stop_epoch: watch::Sender<u64>,
    events: mpsc::UnboundedSender<UiEvent>,
}

impl SessionController {
    #[must_use]
    pub fn new(
        camera: Box<dyn MediaCapture>,
        speech: Box<dyn SpeechOutput>,
        relay: RelayClient,
        events: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        Self {
            state: Mutex::new(SessionState::Idle),
            camera: AsyncMutex::new(camera),
            speech: AsyncMutex::new(speech),
            relay,
            selector: VoiceSelector::for_locale(DEFAULT_VOICE_LOCALE, DEFAULT_VOICE_FALLBACK),
            voice_locale: DEFAULT_VOICE_LOCALE.to_string(),
            prompt: DEFAULT_CAPTURE_PROMPT.to_string(),
            quality: DEFAULT_JPEG_QUALITY,
            stop_epoch: watch::channel(0).0,
            events,
        }
    }

    /// Prompt sent with every captured frame
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// JPEG quality (1-100) for captured frames
    #[must_use]
    pub const fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Target speech locale and fallback language family
    #[must_use]
    pub fn with_voice(mut self, locale: &str, fallback_family: &str) -> Self {
        self.selector = VoiceSelector::for_locale(locale, fallback_family);
        self.voice_locale = locale.to_string();
        self
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.lock_state()
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Acquire the camera stream
    ///
    /// # Errors
    ///
    /// Returns `Error::MediaAccess` if the camera is unavailable; the session
    /// stays `Idle`
    pub async fn start(&self) -> Result<()> {
        if self.state() != SessionState::Idle {
            return Ok(());
        }

        let mut camera = self.camera.lock().await;
        if let Err(e) = camera.start_stream().await {
            tracing::warn!(source = camera.name(), error = %e, "failed to start stream");
            self.emit(UiEvent::Error(format!(
                "Gagal mengakses kamera. Pastikan izin sudah diberikan. ({e})"
            )));
            return Err(e);
        }

        *self.lock_state() = SessionState::Streaming;
        tracing::info!(source = camera.name(), "session started");
        self.emit(UiEvent::Status("Kamera aktif. Ambil gambar untuk berinteraksi.".to_string()));
        Ok(())
    }

    /// Release the stream and cancel any in-flight relay call and speech
    ///
    /// Safe to call in any state.
    pub async fn stop(&self) {
        self.stop_epoch.send_modify(|epoch| *epoch += 1);

        self.speech.lock().await.stop().await;
        self.camera.lock().await.stop_stream().await;

        let previous = std::mem::replace(&mut *self.lock_state(), SessionState::Idle);
        if previous != SessionState::Idle {
            tracing::info!(?previous, "session stopped");
            self.emit(UiEvent::Status("Kamera nonaktif.".to_string()));
        }
    }

    /// Capture a frame, send it to the relay, render and speak the reply
    ///
    /// Always leaves `Capturing` again: back to `Streaming`, or `Idle` if the
    /// session was stopped meanwhile.
    ///
    /// # Errors
    ///
    /// - `Error::NotReady` if no stream is bound
    /// - `Error::Busy` if a capture is already in flight
    /// - `Error::Cancelled` if the session was stopped before the reply arrived
    /// - relay errors from [`RelayClient::send`]
    pub async fn capture_and_describe(&self) -> Result<String> {
        let mut stopped = self.stop_epoch.subscribe();

        if let Err(e) = self.begin_capture() {
            self.report(&e);
            return Err(e);
        }

        let result = self.round_trip(&mut stopped).await;

        {
            let mut state = self.lock_state();
            let was_stopped = stopped.has_changed().unwrap_or(true);
            if *state == SessionState::Capturing && !was_stopped {
                *state = SessionState::Streaming;
            }
        }

        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    fn begin_capture(&self) -> Result<()> {
        let mut state = self.lock_state();
        match *state {
            SessionState::Idle => Err(Error::NotReady("no active camera stream".to_string())),
            SessionState::Capturing => Err(Error::Busy),
            SessionState::Streaming => {
                *state = SessionState::Capturing;
                Ok(())
            }
        }
    }

    async fn round_trip(&self, stopped: &mut watch::Receiver<u64>) -> Result<String> {
        let image = {
            let mut camera = self.camera.lock().await;
            capture(camera.as_mut(), self.quality).await?
        };

        self.emit(UiEvent::Status("Mengirim gambar ke AI... Mohon tunggu.".to_string()));

        let text = tokio::select! {
            result = self.relay.send(&image, &self.prompt) => result?,
            _ = stopped.changed() => return Err(Error::Cancelled),
        };

        // stop may have landed between the reply and here
        if stopped.has_changed().unwrap_or(true) {
            return Err(Error::Cancelled);
        }

        self.emit(UiEvent::Response(text.clone()));
        self.speak(&text, stopped).await;
        Ok(text)
    }

    /// Speak a reply; failures are reported but never fail the round trip
    ///
    /// The stop epoch is checked under the speech lock; `stop` bumps it before
    /// taking that lock.
    async fn speak(&self, text: &str, stopped: &watch::Receiver<u64>) {
        let mut speech = self.speech.lock().await;
        if stopped.has_changed().unwrap_or(true) {
            tracing::debug!("session stopped before speech started");
            return;
        }

        let voice = match speech.voices().await {
            Ok(voices) => self.selector.select(&voices).map(|(rule, voice)| {
                tracing::debug!(rule, voice = %voice.name, lang = %voice.lang, "selected voice");
                voice.clone()
            }),
            Err(e) => {
                tracing::warn!(error = %e, "failed to list voices");
                None
            }
        };

        let hint = VoiceHint {
            voice,
            lang: self.voice_locale.clone(),
        };

        if let Err(e) = speech.speak(&strip_markup(text), &hint).await {
            tracing::warn!(engine = speech.name(), error = %e, "speech failed");
            self.emit(UiEvent::Error(format!("Gagal memutar suara: {e}")));
        }
    }

    fn report(&self, error: &Error) {
        let message = match error {
            Error::Cancelled => {
                tracing::debug!("capture cancelled by stop");
                return;
            }
            Error::NotReady(_) => {
                "Webcam belum aktif. Silakan mulai webcam terlebih dahulu.".to_string()
            }
            Error::Busy => "Masih memproses gambar sebelumnya.".to_string(),
            Error::Relay { status, body } => format!("Kesalahan server: {status} - {body}"),
            Error::MalformedResponse(_) => {
                "Respons AI tidak dalam format yang diharapkan.".to_string()
            }
            other => format!("Terjadi kesalahan: {other}"),
        };

        tracing::warn!(error = %error, "capture failed");
        self.emit(UiEvent::Error(message));
    }

    fn emit(&self, event: UiEvent) {
        // No listener is fine; the session keeps working headless
        let _ = self.events.send(event);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Render `**bold**` markup with ANSI emphasis for a terminal
///
/// An unmatched trailing `**` is kept as-is.
#[must_use]
pub fn render_terminal(text: &str) -> String {
    let pieces: Vec<&str> = text.split("**").collect();
    let balanced = pieces.len() % 2 == 1;
    let mut out = String::with_capacity(text.len());

    for (i, piece) in pieces.iter().enumerate() {
        let bold = i % 2 == 1;
        if bold && !balanced && i == pieces.len() - 1 {
            out.push_str("**");
            out.push_str(piece);
        } else if bold {
            out.push_str("\x1b[1m");
            out.push_str(piece);
            out.push_str("\x1b[0m");
        } else {
            out.push_str(piece);
        }
    }

    out
}
