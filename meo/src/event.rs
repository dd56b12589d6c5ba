//! Event bus for meo.
//!
//! Terminal input, timer ticks and processing-worker messages are normalised
//! into one `AppEvent` stream on a tokio unbounded channel. The main loop is
//! the only receiver.
//!
//! Rendering (33 ms) and logic ticks (250 ms) run on independent intervals.

use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyEvent, KeyEventKind, MouseEvent};
use futures::{FutureExt, StreamExt};
use meo_core::processing::ProcessingEvent;
use tokio::sync::mpsc;
use tokio::time::interval;

#[derive(Debug)]
#[non_exhaustive]
pub enum AppEvent {
    /// Key press (`KeyEventKind::Press` only; release/repeat are dropped).
    Key(KeyEvent),
    Mouse(MouseEvent),
    /// Terminal resized to (columns, rows).
    Resize(u16, u16),
    Tick,
    /// Draw one frame.
    Render,
    /// Progress or completion from the processing thread.
    Processing(ProcessingEvent),
}

pub struct EventHandler {
    pub tx: mpsc::UnboundedSender<AppEvent>,
    pub rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the task that turns terminal input and timers into `AppEvent`s.
///
/// `reader.next().fuse()` keeps `select!` from polling a finished stream.
/// Send errors are ignored: a dropped receiver means the app is shutting down.
pub fn spawn_event_task(tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut tick_interval = interval(Duration::from_millis(250));
        let mut render_interval = interval(Duration::from_millis(33));
        let mut reader = EventStream::new();

        loop {
            let tick_tick = tick_interval.tick();
            let render_tick = render_interval.tick();
            let crossterm_event = reader.next().fuse();

            tokio::select! {
                _ = tick_tick => {
                    let _ = tx.send(AppEvent::Tick);
                }
                _ = render_tick => {
                    let _ = tx.send(AppEvent::Render);
                }
                maybe_event = crossterm_event => {
                    match maybe_event {
                        Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                            let _ = tx.send(AppEvent::Key(key));
                        }
                        Some(Ok(Event::Resize(w, h))) => {
                            let _ = tx.send(AppEvent::Resize(w, h));
                        }
                        Some(Ok(Event::Mouse(mouse))) => {
                            let _ = tx.send(AppEvent::Mouse(mouse));
                        }
                        Some(Err(err)) => {
                            tracing::warn!(error = %err, "terminal event stream error");
                        }
                        _ => {}
                    }
                }
            }
        }
    });
}

/// Relays worker events from the crossbeam channel onto the app channel.
///
/// Runs on a plain thread because the worker side is synchronous. Stops after
/// `Finished`, or when either side hangs up.
pub fn forward_processing(
    rx: crossbeam_channel::Receiver<ProcessingEvent>,
    tx: mpsc::UnboundedSender<AppEvent>,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("meo-progress".to_owned())
        .spawn(move || {
            for event in rx {
                let finished = matches!(event, ProcessingEvent::Finished { .. });
                if tx.send(AppEvent::Processing(event)).is_err() || finished {
                    break;
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meo_core::processing::ChunkStatus;
    use meo_core::types::ChunkId;

    #[test]
    fn forwarder_relays_progress_in_order() {
        let (ctx, crx) = crossbeam_channel::unbounded();
        let (tx, mut rx) = mpsc::unbounded_channel();
        for index in 0..3 {
            ctx.send(ProcessingEvent::Progress {
                index,
                total: 3,
                chunk_id: ChunkId::from_sequence(index as u32 + 1),
                status: ChunkStatus::Started,
            })
            .unwrap();
        }
        drop(ctx);
        forward_processing(crx, tx).unwrap().join().unwrap();

        let mut seen = Vec::new();
        while let Ok(AppEvent::Processing(ProcessingEvent::Progress { index, .. })) = rx.try_recv() {
            seen.push(index);
        }
        assert_eq!(seen, [0, 1, 2]);
    }
}
