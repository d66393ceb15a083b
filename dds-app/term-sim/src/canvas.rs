//! Terminal canvases for the simulator.

use std::io::{self, Stdout, Write};

use dds_core::utils::render::{Canvas, Point, Viewport};
use smart_leds_trait::RGB8;

const BODY_GLYPH: char = 'o';
const WHEEL_GLYPH: char = '#';
/// Upper bound on points plotted for one shape.
const MAX_SAMPLES: usize = 1 << 16;

#[derive(Clone, Copy)]
struct Cell {
    glyph: char,
    color: Option<RGB8>,
}

const BLANK: Cell = Cell {
    glyph: ' ',
    color: None,
};

/// Character grid redrawn in place with ANSI escapes; wheels in truecolor.
pub struct AsciiCanvas {
    viewport: Viewport,
    cols: usize,
    rows: usize,
    cells: Vec<Cell>,
    out: Stdout,
    cleared_screen: bool,
}

impl AsciiCanvas {
    pub fn new(
        viewport: Viewport,
        cols: usize,
        rows: usize,
    ) -> Self {
        Self {
            viewport,
            cols,
            rows,
            cells: vec![BLANK; cols * rows],
            out: io::stdout(),
            cleared_screen: false,
        }
    }

    /// World distance covered by the smaller side of one cell.
    ///
    /// `None` for a degenerate viewport, where nothing can be plotted.
    fn cell_size(&self) -> Option<f64> {
        let size =
            (self.viewport.width() / self.cols as f64).min(self.viewport.height() / self.rows as f64);
        (size.is_finite() && size > 0.0).then_some(size)
    }

    /// Sample count for a curve `length` world units long, two per cell.
    fn samples(
        &self,
        length: f64,
    ) -> Option<usize> {
        let cell = self.cell_size()?;
        let steps = (length / cell * 2.0).ceil();
        (steps.is_finite() && steps <= MAX_SAMPLES as f64).then_some(steps.max(0.0) as usize)
    }

    fn plot(
        &mut self,
        p: Point,
        cell: Cell,
    ) {
        if let Some((col, row)) = self.viewport.to_cell(p, self.cols, self.rows) {
            self.cells[row * self.cols + col] = cell;
        }
    }
}

impl Canvas for AsciiCanvas {
    type Error = io::Error;

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.cells.fill(BLANK);
        Ok(())
    }

    fn circle(
        &mut self,
        center: Point,
        radius: f64,
        color: RGB8,
    ) -> Result<(), Self::Error> {
        let Some(steps) = self.samples(std::f64::consts::TAU * radius) else {
            return Ok(());
        };
        let steps = steps.max(16);
        for i in 0..steps {
            let a = std::f64::consts::TAU * i as f64 / steps as f64;
            let p = Point::new(center.x + radius * a.cos(), center.y + radius * a.sin());
            self.plot(
                p,
                Cell {
                    glyph: BODY_GLYPH,
                    color: Some(color),
                },
            );
        }
        Ok(())
    }

    fn line(
        &mut self,
        from: Point,
        to: Point,
        color: RGB8,
    ) -> Result<(), Self::Error> {
        let length = (to.x - from.x).hypot(to.y - from.y);
        let Some(steps) = self.samples(length) else {
            return Ok(());
        };
        for i in 0..=steps {
            let t = if steps == 0 { 0.0 } else { i as f64 / steps as f64 };
            let p = Point::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t);
            self.plot(
                p,
                Cell {
                    glyph: WHEEL_GLYPH,
                    color: Some(color),
                },
            );
        }
        Ok(())
    }

    fn present(&mut self) -> Result<(), Self::Error> {
        let mut frame = String::with_capacity(self.cells.len() * 4);
        if !self.cleared_screen {
            frame.push_str("\x1b[2J");
            self.cleared_screen = true;
        }
        frame.push_str("\x1b[H");
        for row in self.cells.chunks(self.cols) {
            for cell in row {
                match cell.color {
                    Some(c) => {
                        frame.push_str(&format!("\x1b[38;2;{};{};{}m{}\x1b[0m", c.r, c.g, c.b, cell.glyph))
                    }
                    None => frame.push(cell.glyph),
                }
            }
            frame.push('\n');
        }
        self.out.write_all(frame.as_bytes())?;
        self.out.flush()
    }
}

/// Canvas that reports each frame through `tracing` instead of drawing it.
#[derive(Default)]
pub struct LogCanvas {
    frame: u64,
}

impl Canvas for LogCanvas {
    type Error = io::Error;

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.frame += 1;
        Ok(())
    }

    fn circle(
        &mut self,
        center: Point,
        radius: f64,
        _color: RGB8,
    ) -> Result<(), Self::Error> {
        tracing::info!(frame = self.frame, x = center.x, y = center.y, radius, "body");
        Ok(())
    }

    fn line(
        &mut self,
        from: Point,
        to: Point,
        color: RGB8,
    ) -> Result<(), Self::Error> {
        tracing::debug!(
            frame = self.frame,
            from = ?(from.x, from.y),
            to = ?(to.x, to.y),
            color = ?color,
            "wheel"
        );
        Ok(())
    }

    fn present(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Canvas picked on the command line.
pub enum TermCanvas {
    Ascii(AsciiCanvas),
    Log(LogCanvas),
}

impl Canvas for TermCanvas {
    type Error = io::Error;

    fn clear(&mut self) -> Result<(), Self::Error> {
        match self {
            TermCanvas::Ascii(c) => c.clear(),
            TermCanvas::Log(c) => c.clear(),
        }
    }

    fn circle(
        &mut self,
        center: Point,
        radius: f64,
        color: RGB8,
    ) -> Result<(), Self::Error> {
        match self {
            TermCanvas::Ascii(c) => c.circle(center, radius, color),
            TermCanvas::Log(c) => c.circle(center, radius, color),
        }
    }

    fn line(
        &mut self,
        from: Point,
        to: Point,
        color: RGB8,
    ) -> Result<(), Self::Error> {
        match self {
            TermCanvas::Ascii(c) => c.line(from, to, color),
            TermCanvas::Log(c) => c.line(from, to, color),
        }
    }

    fn present(&mut self) -> Result<(), Self::Error> {
        match self {
            TermCanvas::Ascii(c) => c.present(),
            TermCanvas::Log(c) => c.present(),
        }
    }
}
