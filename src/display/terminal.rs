//! Terminal implementation of [`Surface`] using crossterm.
//!
//! Surface units map onto character cells: five units per column and one
//! line height per row, so the origin (10, 10) lands on column 2, row 0 and
//! one indent step is two columns.

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, SetTitle},
    ExecutableCommand,
};
use std::io::{self, Write};
use tracing::debug;

use super::{Rgb, Surface, LINE_HEIGHT};

/// Surface units per character column
pub const UNITS_PER_COLUMN: i32 = 5;

/// One piece of text waiting for the next present
#[derive(Debug, Clone, PartialEq, Eq)]
struct Glyphs {
    column: u16,
    row: u16,
    text: String,
    color: Rgb,
}

/// Map a surface position to a terminal cell
///
/// Negative columns clamp to the left edge; positions above the top edge
/// have no cell.
pub fn cell_for(x: i32, y: i32) -> Option<(u16, u16)> {
    if y < 0 {
        return None;
    }
    let column = (x / UNITS_PER_COLUMN).clamp(0, u16::MAX as i32) as u16;
    let row = (y / LINE_HEIGHT).min(u16::MAX as i32) as u16;
    Some((column, row))
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb {
        r: rgb.0,
        g: rgb.1,
        b: rgb.2,
    }
}

/// Full-screen terminal surface
///
/// Draw calls are buffered and written out in one go on [`Surface::present`].
/// The alternate screen is left again when the surface is dropped.
pub struct TerminalSurface<W: Write> {
    out: W,
    background: Rgb,
    pending: Vec<Glyphs>,
    size: (u16, u16),
    follow_terminal: bool,
}

impl TerminalSurface<io::Stdout> {
    /// Take over the terminal on stdout
    ///
    /// # Errors
    ///
    /// Returns an I/O error if stdout is not a terminal that accepts the
    /// alternate screen.
    pub fn open(title: &str) -> io::Result<Self> {
        let size = terminal::size()?;
        let mut surface = Self::with_writer(io::stdout(), size);
        surface.follow_terminal = true;
        surface.take_over(title)?;
        debug!("Terminal surface opened ({}x{} cells)", size.0, size.1);
        Ok(surface)
    }
}

impl<W: Write> TerminalSurface<W> {
    /// Surface over an arbitrary writer with a fixed size in cells
    pub fn with_writer(out: W, size: (u16, u16)) -> Self {
        Self {
            out,
            background: super::BACKGROUND,
            pending: Vec::new(),
            size,
            follow_terminal: false,
        }
    }

    /// Enter the alternate screen; dropping the surface undoes this even
    /// when a later step fails
    fn take_over(&mut self, title: &str) -> io::Result<()> {
        self.out.execute(EnterAlternateScreen)?;
        self.out.execute(Hide)?;
        self.out.execute(SetTitle(title))?;
        Ok(())
    }

    fn refresh_size(&mut self) {
        if !self.follow_terminal {
            return;
        }
        if let Ok(size) = terminal::size() {
            self.size = size;
        }
    }
}

impl<W: Write> Surface for TerminalSurface<W> {
    fn clear(&mut self, background: Rgb) {
        self.background = background;
        self.pending.clear();
    }

    fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Rgb) {
        if let Some((column, row)) = cell_for(x, y) {
            self.pending.push(Glyphs {
                column,
                row,
                text: text.to_string(),
                color,
            });
        }
    }

    fn present(&mut self) -> io::Result<()> {
        self.refresh_size();
        let (width, height) = self.size;

        queue!(
            self.out,
            SetBackgroundColor(to_color(self.background)),
            Clear(ClearType::All)
        )?;

        for glyphs in self.pending.drain(..) {
            if glyphs.row >= height || glyphs.column >= width {
                continue;
            }
            let room = (width - glyphs.column) as usize;
            let text: String = glyphs.text.chars().take(room).collect();
            queue!(
                self.out,
                MoveTo(glyphs.column, glyphs.row),
                SetForegroundColor(to_color(glyphs.color)),
                Print(text)
            )?;
        }

        self.out.flush()
    }
}

impl<W: Write> Drop for TerminalSurface<W> {
    fn drop(&mut self) {
        let _ = queue!(self.out, ResetColor, Show, LeaveAlternateScreen);
        let _ = self.out.flush();
    }
}
