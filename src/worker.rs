// Runs an encode or decode on its own thread and streams events back over a channel.
// Each run owns its buffers; dropping the handle abandons the run.

use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use crate::codec::{self, DecodeRequest, DecodedPayload, EncodeRequest, EncodedImage};
use crate::error::ErrorReport;

#[derive(Debug)]
pub enum RunEvent {
    /// Fraction complete, strictly below 1.
    Progress(f32),
    Encoded(EncodedImage),
    Decoded(DecodedPayload),
    Failed(ErrorReport),
}

impl RunEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }

    /// Progress value carried by this event; terminal success is always 1.
    pub fn progress(&self) -> Option<f32> {
        match self {
            Self::Progress(p) => Some(*p),
            Self::Encoded(_) | Self::Decoded(_) => Some(1.0),
            Self::Failed(_) => None,
        }
    }
}

pub struct RunHandle {
    events: Receiver<RunEvent>,
    thread: Option<JoinHandle<()>>,
}

impl RunHandle {
    pub fn events(&self) -> &Receiver<RunEvent> {
        &self.events
    }

    /// Blocks until the run ends, passing progress to `on_progress`. Returns `None` only if
    /// the worker died without reporting.
    pub fn wait(mut self, mut on_progress: impl FnMut(f32)) -> Option<RunEvent> {
        let mut terminal = None;
        for event in self.events.iter() {
            match event {
                RunEvent::Progress(p) => on_progress(p),
                other => {
                    terminal = Some(other);
                    break;
                }
            }
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("codec worker panicked");
            }
        }
        terminal
    }
}

pub fn spawn_encode(request: EncodeRequest) -> RunHandle {
    let (tx, rx) = mpsc::channel();
    let thread = thread::spawn(move || {
        let progress_tx = tx.clone();
        let result = codec::encode(request, &mut |p| {
            // A closed channel means the caller walked away; keep going quietly.
            let _ = progress_tx.send(RunEvent::Progress(p));
        });
        let event = match result {
            Ok(image) => RunEvent::Encoded(image),
            Err(e) => RunEvent::Failed(ErrorReport::from(&e)),
        };
        let _ = tx.send(event);
    });
    RunHandle {
        events: rx,
        thread: Some(thread),
    }
}

pub fn spawn_decode(request: DecodeRequest) -> RunHandle {
    let (tx, rx) = mpsc::channel();
    let thread = thread::spawn(move || {
        let progress_tx = tx.clone();
        let result = codec::decode(request, &mut |p| {
            let _ = progress_tx.send(RunEvent::Progress(p));
        });
        let event = match result {
            Ok(payload) => RunEvent::Decoded(payload),
            Err(e) => RunEvent::Failed(ErrorReport::from(&e)),
        };
        let _ = tx.send(event);
    });
    RunHandle {
        events: rx,
        thread: Some(thread),
    }
}
