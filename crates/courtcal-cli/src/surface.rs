use anyhow::{Context, Result};
use courtcal_core::Pt2;
use courtcal_pipeline::{Frame, InteractionSurface, Stage};
use std::io::{BufRead, Write};

/// Line-oriented surface: clicks are typed as `x y` in display pixels;
/// `q` or end of input cancels.
pub struct LineSurface<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LineSurface<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn prompt(&mut self, stage: &Stage) -> Result<()> {
        match stage {
            Stage::SelectCamera => write!(self.output, "click a camera tile (x y, q to quit)> ")?,
            Stage::SelectPoint(camera) => {
                write!(self.output, "click a point in camera {camera} (x y, q to quit)> ")?
            }
        }
        self.output.flush()?;
        Ok(())
    }
}

fn parse_click(line: &str) -> Option<Pt2> {
    let mut parts = line.split(|c: char| c.is_whitespace() || c == ',').filter(|s| !s.is_empty());
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    Some(Pt2::new(x, y))
}

impl<R: BufRead, W: Write> InteractionSurface for LineSurface<R, W> {
    fn await_click(&mut self, stage: &Stage) -> Result<Option<Pt2>> {
        loop {
            self.prompt(stage)?;
            let mut line = String::new();
            if self.input.read_line(&mut line).context("reading click")? == 0 {
                return Ok(None);
            }
            let line = line.trim();
            if line.eq_ignore_ascii_case("q") {
                return Ok(None);
            }
            match parse_click(line) {
                Some(p) => return Ok(Some(p)),
                None => writeln!(self.output, "expected two numbers, got {line:?}")?,
            }
        }
    }

    fn render(&mut self, frame: &Frame<'_>) -> Result<()> {
        match frame {
            Frame::Grid => writeln!(self.output, "showing camera grid")?,
            Frame::Camera(camera) => writeln!(self.output, "showing camera {camera}")?,
            Frame::Result { transfer, markers } => {
                writeln!(
                    self.output,
                    "world point ({:.3}, {:.3}) m from camera {}",
                    transfer.world.x, transfer.world.y, transfer.source
                )?;
                for (camera, p) in &transfer.image_points {
                    write!(self.output, "  camera {camera}: ({:.1}, {:.1})", p.x, p.y)?;
                    if let Some(m) = markers.markers.get(camera) {
                        write!(self.output, " display ({:.1}, {:.1})", m.x, m.y)?;
                    }
                    writeln!(self.output)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn parses_clicks_and_skips_garbage() {
        let input = b"hello\n12.5, 40\n" as &[u8];
        let mut out = Vec::new();
        let mut surface = LineSurface::new(input, &mut out);
        assert_eq!(surface.await_click(&Stage::SelectCamera).unwrap(), Some(Pt2::new(12.5, 40.0)));
        assert_eq!(surface.await_click(&Stage::SelectCamera).unwrap(), None);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("expected two numbers"));
    }

    #[test]
    fn q_cancels() {
        let mut surface = LineSurface::new(b"q\n10 10\n" as &[u8], Vec::new());
        assert_eq!(surface.await_click(&Stage::SelectPoint("3".into())).unwrap(), None);
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn output_errors_are_reported() {
        let mut surface = LineSurface::new(b"10 10\n" as &[u8], ClosedPipe);
        assert!(surface.await_click(&Stage::SelectCamera).is_err());
        assert!(surface.render(&Frame::Grid).is_err());
    }
}
