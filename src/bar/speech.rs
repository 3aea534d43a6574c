//! Speech-capture seam. A recognizer starts single-utterance sessions that
//! report back over a channel, keeping the UI thread free while audio is
//! captured and transcribed.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

/// Events sent from a recognition worker back to the bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Best transcript for the utterance.
    Transcript(String),
    /// The session finished on its own.
    End,
    /// The session failed. The bar resets to idle without surfacing this.
    Error(String),
}

/// Handle the bar uses to poll a recognition worker.
pub struct SpeechSession {
    pub receiver: mpsc::Receiver<SpeechEvent>,
    pub handle: Option<thread::JoinHandle<()>>,
    /// Flag to signal the worker to stop capturing early.
    pub stop_flag: Arc<AtomicBool>,
}

impl SpeechSession {
    /// Signal the worker to stop capturing and finish up.
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

/// Starts recognition sessions. One session captures a single utterance in
/// the given locale and reports no interim results, only the final ones.
pub trait SpeechRecognizer: Send {
    fn start_session(&mut self, locale: &str) -> Result<SpeechSession>;
}

/// Spawn a worker thread for one utterance. The worker sends its events on
/// the channel and is expected to honor the stop flag; once the session is
/// dropped the channel closes and a straggling worker exits on its next send.
pub fn spawn_session<F>(work: F) -> SpeechSession
where
    F: FnOnce(mpsc::SyncSender<SpeechEvent>, Arc<AtomicBool>) + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(2);
    let stop_flag = Arc::new(AtomicBool::new(false));
    let worker_flag = stop_flag.clone();

    let handle = thread::spawn(move || {
        work(tx, worker_flag);
    });

    SpeechSession {
        receiver: rx,
        handle: Some(handle),
        stop_flag,
    }
}
