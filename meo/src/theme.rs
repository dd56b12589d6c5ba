//! Colour themes.
//!
//! `dark` sticks to the 16 ANSI colours and works everywhere;
//! `catppuccin-mocha` is the Mocha palette in truecolor.

use ratatui::style::Color;

use meo_core::processing::ChunkStatus;
use meo_core::types::{Category, Outcome};

#[derive(Debug, Clone)]
pub struct Theme {
    // Panel borders
    pub border_active: Color,
    pub border_inactive: Color,

    // Document view
    /// Background of lines covered by a REPLACE chunk.
    pub chunk_replace: Color,
    /// Background of lines covered by a TWEAK chunk.
    pub chunk_tweak: Color,
    /// Background of lines covered by a LOCK chunk.
    pub chunk_lock: Color,
    /// Background of the pending line selection.
    pub selection: Color,
    pub cursor: Color,
    pub line_number: Color,

    // Outcome badges
    pub outcome_pending: Color,
    pub outcome_generated: Color,
    pub outcome_approved: Color,
    pub outcome_denied: Color,
    pub outcome_failed: Color,

    // Diff view
    pub diff_added: Color,
    pub diff_removed: Color,
    pub diff_context: Color,
    pub diff_hunk_header: Color,

    // Status bar
    pub status_bar_bg: Color,
    pub status_bar_fg: Color,
    pub status_mode: Color,
    pub status_error: Color,
    pub status_warning: Color,

    pub background: Color,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            border_active: Color::Cyan,
            border_inactive: Color::DarkGray,

            chunk_replace: Color::Blue,
            chunk_tweak: Color::Magenta,
            chunk_lock: Color::DarkGray,
            selection: Color::Yellow,
            cursor: Color::Gray,
            line_number: Color::DarkGray,

            outcome_pending: Color::DarkGray,
            outcome_generated: Color::Yellow,
            outcome_approved: Color::Green,
            outcome_denied: Color::Red,
            outcome_failed: Color::LightRed,

            diff_added: Color::Green,
            diff_removed: Color::Red,
            diff_context: Color::Reset,
            diff_hunk_header: Color::Cyan,

            status_bar_bg: Color::DarkGray,
            status_bar_fg: Color::White,
            status_mode: Color::Cyan,
            status_error: Color::LightRed,
            status_warning: Color::Yellow,

            background: Color::Reset,
        }
    }

    /// Palette source: <https://github.com/catppuccin/catppuccin> Mocha.
    pub fn catppuccin_mocha() -> Self {
        let green = Color::Rgb(166, 227, 161); // #a6e3a1
        let red = Color::Rgb(243, 139, 168); // #f38ba8
        let maroon = Color::Rgb(235, 160, 172); // #eba0ac
        let yellow = Color::Rgb(249, 226, 175); // #f9e2af
        let teal = Color::Rgb(148, 226, 213); // #94e2d5
        let lavender = Color::Rgb(180, 190, 254); // #b4befe
        let overlay0 = Color::Rgb(108, 112, 134); // #6c7086
        let overlay1 = Color::Rgb(127, 132, 156); // #7f849c
        let surface0 = Color::Rgb(49, 50, 68); // #313244
        let surface1 = Color::Rgb(69, 71, 90); // #45475a
        let surface2 = Color::Rgb(88, 91, 112); // #585b70
        let base = Color::Rgb(30, 30, 46); // #1e1e2e
        let text = Color::Rgb(205, 214, 244); // #cdd6f4
        let peach = Color::Rgb(250, 179, 135); // #fab387
        // Blue and mauve darkened toward base so text stays readable on them.
        let blue_dim = Color::Rgb(49, 66, 104);
        let mauve_dim = Color::Rgb(78, 58, 104);
        let yellow_dim = Color::Rgb(92, 84, 60);

        Self {
            border_active: lavender,
            border_inactive: overlay1,

            chunk_replace: blue_dim,
            chunk_tweak: mauve_dim,
            chunk_lock: surface1,
            selection: yellow_dim,
            cursor: surface2,
            line_number: overlay0,

            outcome_pending: overlay1,
            outcome_generated: yellow,
            outcome_approved: green,
            outcome_denied: red,
            outcome_failed: maroon,

            diff_added: green,
            diff_removed: red,
            diff_context: text,
            diff_hunk_header: teal,

            status_bar_bg: surface0,
            status_bar_fg: text,
            status_mode: lavender,
            status_error: red,
            status_warning: peach,

            background: base,
        }
    }

    /// Unknown names fall back to `dark` with a warning in the log.
    pub fn from_name(name: &str) -> Self {
        match name {
            "catppuccin-mocha" | "catppuccin_mocha" => Self::catppuccin_mocha(),
            "dark" => Self::dark(),
            other => {
                tracing::warn!(theme = other, "unknown theme, falling back to dark");
                Self::dark()
            }
        }
    }

    pub fn category(&self, category: Category) -> Color {
        match category {
            Category::Replace => self.chunk_replace,
            Category::Tweak => self.chunk_tweak,
            Category::Lock => self.chunk_lock,
        }
    }

    pub fn outcome(&self, outcome: Outcome) -> Color {
        match outcome {
            Outcome::Pending => self.outcome_pending,
            Outcome::Generated => self.outcome_generated,
            Outcome::Approved => self.outcome_approved,
            Outcome::Denied => self.outcome_denied,
            Outcome::Failed => self.outcome_failed,
        }
    }

    pub fn chunk_status(&self, status: &ChunkStatus) -> Color {
        match status {
            ChunkStatus::Started => self.status_mode,
            ChunkStatus::Reused | ChunkStatus::Generated => self.outcome_generated,
            ChunkStatus::Failed(_) => self.outcome_failed,
            ChunkStatus::Malformed(_) | ChunkStatus::AgentFailed(_) => self.status_warning,
        }
    }
}
