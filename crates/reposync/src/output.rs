use std::io::{self, Write};

use libreposync::Reporter;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing::warn;

/// Indentation level (in spaces) used for nested output sections.
const INDENT: usize = 4;

/// Orange, for assumptions made while simulating.
const ORANGE: Color = Color::Rgb(255, 165, 0);

/// User-facing output for the CLI, on top of the change reports a pass emits.
pub trait Output: Reporter {
    /// Print an informational message.
    fn message(&self, msg: &str) -> io::Result<()>;
    /// Print a success message.
    fn success(&self, msg: &str) -> io::Result<()>;
    /// Print an error/failure message.
    fn fail(&self, msg: &str) -> io::Result<()>;
    /// Flush any buffered output.
    fn finish(&self) -> io::Result<()>;
    /// Create a nested output section that indents subsequent messages.
    fn section(&self, header: &str) -> io::Result<Box<dyn Output>>;
    /// This output as a pass reporter.
    fn reporter(&self) -> &dyn Reporter;
}

/// Output that suppresses everything.
pub struct Quiet;

impl Reporter for Quiet {
    fn would_change(&self, _description: &str) {}

    fn changed(&self, _description: &str) {}

    fn assumed(&self, _narrative: &str) {}
}

impl Output for Quiet {
    fn message(&self, _msg: &str) -> io::Result<()> {
        Ok(())
    }

    fn success(&self, _msg: &str) -> io::Result<()> {
        Ok(())
    }

    fn fail(&self, _msg: &str) -> io::Result<()> {
        Ok(())
    }

    fn finish(&self) -> io::Result<()> {
        Ok(())
    }

    fn section(&self, _header: &str) -> io::Result<Box<dyn Output>> {
        Ok(Box::new(Self))
    }

    fn reporter(&self) -> &dyn Reporter {
        self
    }
}

/// Color-capable terminal renderer.
pub struct Terminal {
    /// Whether to emit ANSI color sequences when writing to stdout.
    color_choice: ColorChoice,
    /// Current indentation depth in spaces.
    indent: usize,
}

impl Terminal {
    /// Create a new terminal output; `color` forces colors on or off.
    pub fn new(color: bool) -> Self {
        let color_choice = if color {
            ColorChoice::Always
        } else {
            ColorChoice::Never
        };
        Self {
            color_choice,
            indent: 0,
        }
    }

    /// Write `msg` using `color` while honoring the current indentation level.
    fn write_colored(&self, msg: &str, color: Option<Color>) -> io::Result<()> {
        let mut stdout = StandardStream::stdout(self.color_choice);
        stdout.set_color(ColorSpec::new().set_fg(color))?;
        writeln!(stdout, "{}{msg}", " ".repeat(self.indent))?;
        stdout.reset()?;
        stdout.flush()
    }

    /// Write a change report, logging rather than failing the pass when stdout is gone.
    fn report(&self, msg: &str, color: Color) {
        if let Err(e) = self.write_colored(msg, Some(color)) {
            warn!(error = %e, "failed to write report");
        }
    }
}

impl Reporter for Terminal {
    fn would_change(&self, description: &str) {
        self.report(&format!("Would {description}"), Color::Cyan);
    }

    fn changed(&self, description: &str) {
        self.report(&format!("- {description}"), Color::Green);
    }

    fn assumed(&self, narrative: &str) {
        self.report(narrative, ORANGE);
    }
}

impl Output for Terminal {
    fn message(&self, msg: &str) -> io::Result<()> {
        self.write_colored(msg, None)
    }

    fn success(&self, msg: &str) -> io::Result<()> {
        self.write_colored(msg, Some(Color::Green))
    }

    fn fail(&self, msg: &str) -> io::Result<()> {
        self.write_colored(msg, Some(Color::Red))
    }

    fn finish(&self) -> io::Result<()> {
        io::stdout().flush()
    }

    fn section(&self, header: &str) -> io::Result<Box<dyn Output>> {
        self.message(header)?;
        Ok(Box::new(Self {
            color_choice: self.color_choice,
            indent: self.indent + INDENT,
        }))
    }

    fn reporter(&self) -> &dyn Reporter {
        self
    }
}
