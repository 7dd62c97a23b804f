//! Terminal rendering of the countdown state

use crate::countdown::CountdownState;
use crate::delta::RemainingDuration;
use crate::theme::Theme;
use std::io::{self, Stdout, Write};

pub const ENDED_BANNER: &str = "Countdown ended";

/// Pad to two characters with zeros; the sign counts toward the width
pub fn pad2(value: i64) -> String {
    format!("{:02}", value)
}

/// "02 Months  04 Days  22 Hours  00 Minutes  00 Seconds"
pub fn fields_line(remaining: &RemainingDuration) -> String {
    remaining
        .fields()
        .iter()
        .map(|(label, value)| format!("{} {}", pad2(*value), label))
        .collect::<Vec<_>>()
        .join("  ")
}

/// Unstyled frame for the given state
pub fn frame(state: &CountdownState, headline: &str) -> String {
    match state {
        CountdownState::Running(remaining) => {
            format!("{}  |  {}", headline, fields_line(remaining))
        }
        CountdownState::Ended => ENDED_BANNER.to_string(),
    }
}

/// Frame with the theme's ANSI colours applied
pub fn styled_frame(state: &CountdownState, headline: &str, theme: Theme) -> String {
    let palette = theme.palette();
    match state {
        CountdownState::Running(remaining) => {
            let fields = remaining
                .fields()
                .iter()
                .map(|(label, value)| {
                    format!(
                        "{}{}{} {}{}{}",
                        palette.text,
                        pad2(*value),
                        palette.reset,
                        palette.label,
                        label,
                        palette.reset
                    )
                })
                .collect::<Vec<_>>()
                .join("  ");
            format!(
                "{}{}{}  {} {} {}",
                palette.text, headline, palette.reset, palette.card, fields, palette.reset
            )
        }
        CountdownState::Ended => {
            format!("{} {} {}", palette.banner, ENDED_BANNER, palette.reset)
        }
    }
}

/// Draws frames to a terminal, either redrawing one line in place or
/// printing one plain line per update
pub struct TerminalSurface<W: Write = Stdout> {
    out: W,
    plain: bool,
    theme: Theme,
    headline: String,
    last: Option<String>,
}

impl TerminalSurface<Stdout> {
    pub fn stdout(plain: bool, theme: Theme, headline: impl Into<String>) -> Self {
        Self::new(io::stdout(), plain, theme, headline)
    }
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W, plain: bool, theme: Theme, headline: impl Into<String>) -> Self {
        Self {
            out,
            plain,
            theme,
            headline: headline.into(),
            last: None,
        }
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        // Force the next draw even if the state is unchanged
        self.last = None;
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn draw(&mut self, state: &CountdownState) -> io::Result<()> {
        if self.plain {
            let line = frame(state, &self.headline);
            if self.last.as_deref() == Some(line.as_str()) {
                return Ok(());
            }
            writeln!(self.out, "{}", line)?;
            self.last = Some(line);
        } else {
            let line = styled_frame(state, &self.headline, self.theme);
            write!(self.out, "\r\x1b[2K{}", line)?;
            self.last = Some(line);
        }
        self.out.flush()
    }

    /// Leave the cursor on a fresh line
    pub fn finish(&mut self) -> io::Result<()> {
        if !self.plain && self.last.is_some() {
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}
