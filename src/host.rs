use std::io::{self, BufRead, Write};

/// The ambient world the interpreter talks to: reading program/command/
/// INPUT lines, writing characters and formatted values, and polling for a
/// break request. Generalizes the reference interpreter's terminal glue
/// (`basic_fgets_stdin`, `basic_putchar`, `basic_printf`,
/// `basic_callback_check_break_key`) into a trait so tests can swap in an
/// in-memory host instead of a terminal.
pub trait Host {
    /// Read one line (without its trailing newline). `None` signals EOF or
    /// an I/O error, which the interpreter treats as a STOP request.
    fn read_line(&mut self) -> Option<String>;
    fn write_char(&mut self, c: char);
    fn write_str(&mut self, s: &str) {
        for c in s.chars() {
            self.write_char(c);
        }
    }
    /// Emit an already-rendered value - a `%G`-formatted PRINT item or a
    /// `TAB(` cursor-position escape - as a unit distinct from free-form
    /// text, mirroring the reference interpreter's own `basic_printf`
    /// alongside `basic_putchar`. Defaults to `write_str` since every
    /// shipped host treats the two the same way.
    fn write_formatted(&mut self, s: &str) {
        self.write_str(s);
    }
    /// Non-blocking poll for a break key; the stdio host has none wired up
    /// and always returns `false`, matching the reference port's own
    /// "no break key support" comment.
    fn break_pressed(&mut self) -> bool {
        false
    }
}

pub struct StdioHost {
    stdin: io::Stdin,
}

impl StdioHost {
    pub fn new() -> Self {
        StdioHost { stdin: io::stdin() }
    }
}

impl Default for StdioHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for StdioHost {
    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.stdin.lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                Some(line)
            }
            Err(_) => None,
        }
    }

    fn write_char(&mut self, c: char) {
        let mut out = io::stdout();
        let _ = write!(out, "{}", c);
        let _ = out.flush();
    }
}

/// In-memory host for tests: a queue of input lines to hand back one at a
/// time, and a buffer that collects everything written.
#[derive(Default)]
pub struct TestHost {
    pub input: std::collections::VecDeque<String>,
    pub output: String,
}

impl TestHost {
    pub fn with_input<I: IntoIterator<Item = &'static str>>(lines: I) -> Self {
        TestHost {
            input: lines.into_iter().map(String::from).collect(),
            output: String::new(),
        }
    }
}

impl Host for TestHost {
    fn read_line(&mut self) -> Option<String> {
        self.input.pop_front()
    }

    fn write_char(&mut self, c: char) {
        self.output.push(c);
    }
}
