//! # Display Module
//!
//! Indented line printer over a presentation surface.
//!
//! The writer knows nothing about controllers. It places one line of text
//! per [`DiagnosticsWriter::emit`] call at the cursor, steps the cursor down
//! by a fixed line height and moves it sideways on indent/unindent.
//!
//! ## Layout
//!
//! | Constant | Value |
//! |----------|-------|
//! | Origin | (10, 10) |
//! | Line height | 15 |
//! | Indent step | 10 |

pub mod terminal;

#[cfg(test)]
use mockall::automock;

/// Cursor origin, x and y, at the start of every frame
pub const ORIGIN: (i32, i32) = (10, 10);

/// Vertical advance per emitted line
pub const LINE_HEIGHT: i32 = 15;

/// Horizontal shift per indent level
pub const INDENT_STEP: i32 = 10;

/// An RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Frame background
pub const BACKGROUND: Rgb = Rgb(255, 255, 255);

/// Text colour
pub const FOREGROUND: Rgb = Rgb(0, 0, 0);

/// Drawable surface the diagnostics are printed onto
///
/// Coordinates are in surface units; how they map to pixels or cells is
/// up to the implementation. Negative x is allowed.
#[cfg_attr(test, automock)]
pub trait Surface {
    /// Fill the whole surface with one colour
    fn clear(&mut self, background: Rgb);

    /// Draw one line of monospaced text with its top-left corner at (x, y)
    fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Rgb);

    /// Show the finished frame
    fn present(&mut self) -> std::io::Result<()>;
}

/// Per-frame layout state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsCursor {
    pub x: i32,
    pub y: i32,
    pub line_height: i32,
}

impl Default for DiagnosticsCursor {
    fn default() -> Self {
        Self {
            x: ORIGIN.0,
            y: ORIGIN.1,
            line_height: LINE_HEIGHT,
        }
    }
}

impl DiagnosticsCursor {
    /// Move back to the origin
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Shift right by one step
    pub fn indent(&mut self) {
        self.x += INDENT_STEP;
    }

    /// Shift left by one step. Not bounded; x may go below the origin or zero.
    pub fn unindent(&mut self) {
        self.x -= INDENT_STEP;
    }

    /// Return the current position and move down one line
    fn advance(&mut self) -> (i32, i32) {
        let position = (self.x, self.y);
        self.y += self.line_height;
        position
    }
}

/// Line printer for one frame
///
/// Created at the start of a frame with its cursor at the origin and
/// dropped at the end of it, so no layout state leaks between frames.
pub struct DiagnosticsWriter<'a, S: Surface + ?Sized> {
    surface: &'a mut S,
    cursor: DiagnosticsCursor,
    lines: usize,
}

impl<'a, S: Surface + ?Sized> DiagnosticsWriter<'a, S> {
    pub fn new(surface: &'a mut S) -> Self {
        Self {
            surface,
            cursor: DiagnosticsCursor::default(),
            lines: 0,
        }
    }

    /// Print one line at the cursor and move down
    pub fn emit(&mut self, line: &str) {
        let (x, y) = self.cursor.advance();
        self.surface.draw_text(x, y, line, FOREGROUND);
        self.lines += 1;
    }

    pub fn indent(&mut self) {
        self.cursor.indent();
    }

    pub fn unindent(&mut self) {
        self.cursor.unindent();
    }

    /// Put the cursor back at the origin
    pub fn reset_cursor(&mut self) {
        self.cursor.reset();
    }

    pub fn cursor(&self) -> DiagnosticsCursor {
        self.cursor
    }

    /// Lines emitted since the writer was created
    pub fn lines_emitted(&self) -> usize {
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::*;

    #[test]
    fn test_cursor_starts_at_origin() {
        let cursor = DiagnosticsCursor::default();
        assert_eq!((cursor.x, cursor.y), (10, 10));
        assert_eq!(cursor.line_height, 15);
    }

    #[test]
    fn test_unindent_past_zero_is_allowed() {
        let mut cursor = DiagnosticsCursor::default();
        cursor.unindent();
        cursor.unindent();
        assert_eq!(cursor.x, -10);
    }

    #[test]
    fn test_reset_restores_origin_after_indentation() {
        let mut cursor = DiagnosticsCursor::default();
        cursor.indent();
        cursor.indent();
        cursor.advance();
        cursor.reset();
        assert_eq!(cursor, DiagnosticsCursor::default());
    }

    #[test]
    fn test_emit_places_lines_at_cursor() {
        let mut surface = MockSurface::new();
        let mut seq = mockall::Sequence::new();
        surface
            .expect_draw_text()
            .with(eq(10), eq(10), eq("first"), eq(FOREGROUND))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        surface
            .expect_draw_text()
            .with(eq(20), eq(25), eq("second"), eq(FOREGROUND))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        surface
            .expect_draw_text()
            .with(eq(10), eq(40), eq("third"), eq(FOREGROUND))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let mut writer = DiagnosticsWriter::new(&mut surface);
        writer.emit("first");
        writer.indent();
        writer.emit("second");
        writer.unindent();
        writer.emit("third");

        assert_eq!(writer.lines_emitted(), 3);
    }

    #[test]
    fn test_reset_cursor_moves_back_to_origin() {
        let mut surface = MockSurface::new();
        surface.expect_draw_text().return_const(());

        let mut writer = DiagnosticsWriter::new(&mut surface);
        writer.indent();
        writer.emit("line");
        writer.reset_cursor();

        assert_eq!(writer.cursor(), DiagnosticsCursor::default());
    }
}
