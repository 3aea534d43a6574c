//! Terminal input bar: fixed key buttons plus per-locale microphone
//! buttons, writing JSON input envelopes to an externally-owned transport.
//!
//! The bar renders nothing while the transport is disconnected, and the
//! microphone buttons disappear entirely when no speech recognizer is
//! available. At most one recognition session is live at a time.

pub mod envelope;
pub mod keymap;
pub mod registry;
pub mod speech;

use crate::log_debug;
use anyhow::{bail, Result};
use envelope::BarMessage;
use keymap::KEY_BUTTONS;
use registry::BarAction;
use speech::{SpeechEvent, SpeechRecognizer, SpeechSession};
use std::sync::mpsc::TryRecvError;

/// Connection seam to the already-established terminal transport.
/// The bar never creates, reconnects, or closes it.
pub trait Transport {
    fn is_connected(&self) -> bool;
    fn send(&mut self, json: &str) -> Result<()>;
}

/// Per-microphone toggle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicState {
    Idle,
    Listening,
}

/// The input bar. One instance per terminal view.
pub struct InputBar<T: Transport> {
    transport: T,
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    locales: Vec<String>,
    /// The listening mic and its session, when one is active.
    active_mic: Option<(usize, SpeechSession)>,
}

impl<T: Transport> InputBar<T> {
    /// Build a bar over an already-connected transport. Passing no
    /// recognizer omits the microphone buttons; the key buttons remain.
    pub fn new(transport: T, recognizer: Option<Box<dyn SpeechRecognizer>>, locales: Vec<String>) -> Self {
        Self {
            transport,
            recognizer,
            locales,
            active_mic: None,
        }
    }

    /// Buttons to draw, in display order. Empty while the transport is
    /// disconnected.
    pub fn visible_buttons(&self) -> Vec<(String, BarAction)> {
        if !self.transport.is_connected() {
            return Vec::new();
        }
        let mut buttons: Vec<(String, BarAction)> = KEY_BUTTONS
            .iter()
            .enumerate()
            .map(|(index, button)| (button.label.to_string(), BarAction::Key(index)))
            .collect();
        if self.recognizer.is_some() {
            for (index, locale) in self.locales.iter().enumerate() {
                let marker = if self.mic_state(index) == MicState::Listening {
                    "*"
                } else {
                    ""
                };
                buttons.push((format!("{marker}Mic {locale}"), BarAction::Mic(index)));
            }
        }
        buttons
    }

    /// Render the bar as one text row of `[label]` cells.
    pub fn render_line(&self) -> String {
        self.visible_buttons()
            .iter()
            .map(|(label, _)| format!("[{label}]"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Send the literal byte sequence for a key button. Exactly one
    /// envelope goes out per press.
    pub fn press_key(&mut self, label: &str) -> Result<()> {
        if !self.transport.is_connected() {
            bail!("transport is not connected");
        }
        let Some(sequence) = keymap::sequence_for(label) else {
            bail!("unknown key button '{label}'");
        };
        self.send_input(sequence)
    }

    /// Toggle the microphone at `index`: idle starts a session, listening
    /// stops it. Starting while another mic listens stops that one first,
    /// so at most one session is ever live.
    pub fn toggle_mic(&mut self, index: usize) -> Result<()> {
        if !self.transport.is_connected() {
            bail!("transport is not connected");
        }
        if index >= self.locales.len() {
            bail!("no microphone button at index {index}");
        }

        if let Some((active, _)) = self.active_mic {
            self.stop_active_session();
            if active == index {
                return Ok(());
            }
        }

        let Some(recognizer) = self.recognizer.as_mut() else {
            bail!("speech recognition is unavailable");
        };
        let locale = &self.locales[index];
        match recognizer.start_session(locale) {
            Ok(session) => {
                log_debug(&format!("Bar: mic listening ({locale})"));
                self.active_mic = Some((index, session));
            }
            Err(err) => {
                // The button simply stays idle; no user-visible error.
                log_debug(&format!("Bar: failed to start mic ({locale}): {err:#}"));
            }
        }
        Ok(())
    }

    /// Drain events from the active session without blocking. A recognized
    /// transcript sends exactly one envelope and returns the mic to idle;
    /// end and error events return it to idle silently.
    pub fn pump(&mut self) -> Result<()> {
        loop {
            let event = match self.active_mic.as_ref() {
                Some((_, session)) => session.receiver.try_recv(),
                None => return Ok(()),
            };
            match event {
                Ok(SpeechEvent::Transcript(text)) => {
                    self.active_mic = None;
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        log_debug("Bar: dropped empty transcript");
                    } else {
                        self.send_input(trimmed)?;
                    }
                }
                Ok(SpeechEvent::End) => {
                    self.active_mic = None;
                }
                Ok(SpeechEvent::Error(message)) => {
                    log_debug(&format!("Bar: speech session failed: {message}"));
                    self.active_mic = None;
                }
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    self.active_mic = None;
                }
            }
        }
    }

    /// Toggle state of the microphone at `index`.
    pub fn mic_state(&self, index: usize) -> MicState {
        match self.active_mic {
            Some((active, _)) if active == index => MicState::Listening,
            _ => MicState::Idle,
        }
    }

    fn stop_active_session(&mut self) {
        if let Some((index, session)) = self.active_mic.take() {
            session.request_stop();
            let locale = self.locales.get(index).map(String::as_str).unwrap_or("?");
            log_debug(&format!("Bar: stopped mic session ({locale})"));
        }
    }

    fn send_input(&mut self, data: &str) -> Result<()> {
        let json = BarMessage::input(data).to_json()?;
        self.transport.send(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    /// Transport that records every send and whose link state tests can flip.
    #[derive(Clone, Default)]
    struct RecordingTransport {
        connected: Arc<AtomicBool>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingTransport {
        fn connected() -> Self {
            let transport = Self::default();
            transport.connected.store(true, Ordering::SeqCst);
            transport
        }

        fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for RecordingTransport {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn send(&mut self, json: &str) -> Result<()> {
            self.sent.lock().unwrap().push(json.to_string());
            Ok(())
        }
    }

    /// Recognizer whose sessions replay a fixed script, or hold the
    /// utterance open until stopped when the script is empty.
    struct ScriptedRecognizer {
        script: Vec<SpeechEvent>,
        fail_to_start: bool,
        starts: Arc<AtomicUsize>,
        locales_seen: Arc<Mutex<Vec<String>>>,
        stop_flags: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
    }

    impl ScriptedRecognizer {
        fn with_script(script: Vec<SpeechEvent>) -> Self {
            Self {
                script,
                fail_to_start: false,
                starts: Arc::new(AtomicUsize::new(0)),
                locales_seen: Arc::new(Mutex::new(Vec::new())),
                stop_flags: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn hold_open() -> Self {
            Self::with_script(Vec::new())
        }
    }

    impl SpeechRecognizer for ScriptedRecognizer {
        fn start_session(&mut self, locale: &str) -> Result<SpeechSession> {
            if self.fail_to_start {
                return Err(anyhow!("recognizer offline"));
            }
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.locales_seen.lock().unwrap().push(locale.to_string());
            let script = self.script.clone();
            let session = speech::spawn_session(move |tx, stop| {
                if script.is_empty() {
                    while !stop.load(Ordering::Relaxed) {
                        thread::sleep(Duration::from_millis(5));
                    }
                    let _ = tx.send(SpeechEvent::End);
                    return;
                }
                for event in script {
                    let _ = tx.send(event);
                }
            });
            self.stop_flags.lock().unwrap().push(session.stop_flag.clone());
            Ok(session)
        }
    }

    fn mic_bar(
        transport: RecordingTransport,
        recognizer: ScriptedRecognizer,
        locales: &[&str],
    ) -> InputBar<RecordingTransport> {
        InputBar::new(
            transport,
            Some(Box::new(recognizer)),
            locales.iter().map(|locale| locale.to_string()).collect(),
        )
    }

    fn pump_until<T: Transport>(bar: &mut InputBar<T>, done: impl Fn(&InputBar<T>) -> bool) {
        for _ in 0..100 {
            bar.pump().unwrap();
            if done(bar) {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not reached while pumping");
    }

    #[test]
    fn renders_nothing_while_disconnected() {
        let transport = RecordingTransport::default();
        let bar = mic_bar(transport, ScriptedRecognizer::hold_open(), &["en-US"]);
        assert!(bar.visible_buttons().is_empty());
        assert_eq!(bar.render_line(), "");
    }

    #[test]
    fn key_buttons_send_their_exact_sequences() {
        let transport = RecordingTransport::connected();
        let mut bar = InputBar::new(transport.clone(), None, Vec::new());

        for button in KEY_BUTTONS {
            bar.press_key(button.label).unwrap();
        }

        let sent = transport.messages();
        assert_eq!(sent.len(), KEY_BUTTONS.len());
        for (json, button) in sent.iter().zip(KEY_BUTTONS) {
            let value: serde_json::Value = serde_json::from_str(json).unwrap();
            assert_eq!(value["type"].as_str(), Some("input"));
            assert_eq!(value["data"].as_str(), Some(button.sequence));
        }
    }

    #[test]
    fn press_key_rejects_unknown_labels() {
        let transport = RecordingTransport::connected();
        let mut bar = InputBar::new(transport.clone(), None, Vec::new());
        assert!(bar.press_key("Enter").is_err());
        assert!(transport.messages().is_empty());
    }

    #[test]
    fn press_key_requires_a_connected_transport() {
        let transport = RecordingTransport::default();
        let mut bar = InputBar::new(transport.clone(), None, Vec::new());
        assert!(bar.press_key("Esc").is_err());
        assert!(transport.messages().is_empty());
    }

    #[test]
    fn mic_buttons_are_omitted_without_a_recognizer() {
        let transport = RecordingTransport::connected();
        let bar: InputBar<RecordingTransport> =
            InputBar::new(transport, None, vec!["en-US".to_string()]);
        let buttons = bar.visible_buttons();
        assert_eq!(buttons.len(), KEY_BUTTONS.len());
        assert!(buttons
            .iter()
            .all(|(_, action)| matches!(action, BarAction::Key(_))));
    }

    #[test]
    fn mic_buttons_render_one_per_locale() {
        let transport = RecordingTransport::connected();
        let bar = mic_bar(
            transport,
            ScriptedRecognizer::hold_open(),
            &["en-US", "nl-NL"],
        );
        let line = bar.render_line();
        assert!(line.contains("[Mic en-US]"));
        assert!(line.contains("[Mic nl-NL]"));
    }

    #[test]
    fn click_starts_one_session_and_click_again_stops_it() {
        let transport = RecordingTransport::connected();
        let recognizer = ScriptedRecognizer::hold_open();
        let starts = recognizer.starts.clone();
        let stop_flags = recognizer.stop_flags.clone();
        let mut bar = mic_bar(transport.clone(), recognizer, &["en-US"]);

        bar.toggle_mic(0).unwrap();
        assert_eq!(bar.mic_state(0), MicState::Listening);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert!(bar.render_line().contains("[*Mic en-US]"));

        bar.toggle_mic(0).unwrap();
        assert_eq!(bar.mic_state(0), MicState::Idle);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert!(stop_flags.lock().unwrap()[0].load(Ordering::Relaxed));
        assert!(transport.messages().is_empty());
    }

    #[test]
    fn transcript_sends_one_envelope_then_returns_to_idle() {
        let transport = RecordingTransport::connected();
        let recognizer = ScriptedRecognizer::with_script(vec![
            SpeechEvent::Transcript("list the files".to_string()),
            SpeechEvent::End,
        ]);
        let mut bar = mic_bar(transport.clone(), recognizer, &["en-US"]);

        bar.toggle_mic(0).unwrap();
        pump_until(&mut bar, |bar| bar.mic_state(0) == MicState::Idle);

        let sent = transport.messages();
        assert_eq!(sent.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(value["data"].as_str(), Some("list the files"));
    }

    #[test]
    fn blank_transcripts_send_nothing() {
        let transport = RecordingTransport::connected();
        let recognizer = ScriptedRecognizer::with_script(vec![
            SpeechEvent::Transcript("   ".to_string()),
            SpeechEvent::End,
        ]);
        let mut bar = mic_bar(transport.clone(), recognizer, &["en-US"]);

        bar.toggle_mic(0).unwrap();
        pump_until(&mut bar, |bar| bar.mic_state(0) == MicState::Idle);
        assert!(transport.messages().is_empty());
    }

    #[test]
    fn speech_errors_reset_the_mic_silently() {
        let transport = RecordingTransport::connected();
        let recognizer =
            ScriptedRecognizer::with_script(vec![SpeechEvent::Error("no audio device".to_string())]);
        let mut bar = mic_bar(transport.clone(), recognizer, &["en-US"]);

        bar.toggle_mic(0).unwrap();
        pump_until(&mut bar, |bar| bar.mic_state(0) == MicState::Idle);
        assert!(transport.messages().is_empty());
    }

    #[test]
    fn start_failure_leaves_the_mic_idle() {
        let transport = RecordingTransport::connected();
        let mut recognizer = ScriptedRecognizer::hold_open();
        recognizer.fail_to_start = true;
        let mut bar = mic_bar(transport.clone(), recognizer, &["en-US"]);

        bar.toggle_mic(0).unwrap();
        assert_eq!(bar.mic_state(0), MicState::Idle);
        assert!(transport.messages().is_empty());
    }

    #[test]
    fn switching_mics_stops_the_first_session() {
        let transport = RecordingTransport::connected();
        let recognizer = ScriptedRecognizer::hold_open();
        let starts = recognizer.starts.clone();
        let locales_seen = recognizer.locales_seen.clone();
        let stop_flags = recognizer.stop_flags.clone();
        let mut bar = mic_bar(transport, recognizer, &["en-US", "nl-NL"]);

        bar.toggle_mic(0).unwrap();
        bar.toggle_mic(1).unwrap();

        assert_eq!(bar.mic_state(0), MicState::Idle);
        assert_eq!(bar.mic_state(1), MicState::Listening);
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert_eq!(
            locales_seen.lock().unwrap().as_slice(),
            ["en-US", "nl-NL"]
        );
        let flags = stop_flags.lock().unwrap();
        assert!(flags[0].load(Ordering::Relaxed));
        assert!(!flags[1].load(Ordering::Relaxed));
    }

    #[test]
    fn toggle_mic_rejects_out_of_range_buttons() {
        let transport = RecordingTransport::connected();
        let mut bar = mic_bar(transport, ScriptedRecognizer::hold_open(), &["en-US"]);
        assert!(bar.toggle_mic(3).is_err());
    }
}
