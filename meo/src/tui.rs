//! Terminal setup and teardown.
//!
//! The TUI draws to stderr so stdout stays free for the plain listing
//! commands and for shell redirection.

use std::io::{stderr, BufWriter, Stderr};
use std::panic;
use std::sync::{atomic::AtomicBool, Arc};

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use signal_hook::consts::SIGTERM;
use signal_hook::flag::register;

/// Buffered stderr batches escape sequences into fewer writes per frame.
pub type Tui = Terminal<CrosstermBackend<BufWriter<Stderr>>>;

/// Enters raw mode and the alternate screen. Pair with [`restore_tui`].
pub fn init_tui() -> std::io::Result<Tui> {
    let mut out = BufWriter::new(stderr());
    enable_raw_mode()?;
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    Terminal::new(CrosstermBackend::new(out))
}

/// Leaves raw mode and the alternate screen. Idempotent; ratatui does not
/// restore the terminal on drop.
pub fn restore_tui() -> std::io::Result<()> {
    disable_raw_mode()?;
    execute!(stderr(), LeaveAlternateScreen, DisableMouseCapture)?;
    Ok(())
}

/// Restores the terminal before the previous panic hook prints its message.
/// Install before [`init_tui`].
pub fn install_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_tui();
        original_hook(panic_info);
    }));
}

/// Returns a flag that flips to `true` on SIGTERM; the event loop polls it.
///
/// # Panics
///
/// If the OS refuses the handler registration.
pub fn register_sigterm() -> Arc<AtomicBool> {
    let term = Arc::new(AtomicBool::new(false));
    register(SIGTERM, Arc::clone(&term)).expect("failed to register SIGTERM handler");
    term
}
