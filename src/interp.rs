use tracing::{debug, trace};

use crate::arena::Arena;
use crate::error::BasicError;
use crate::host::Host;
use crate::parse;
use crate::program;

/// Which text buffer a parse cursor walks: the program store (stored-line
/// execution, and always the DATA cursor) or the freshly typed input line
/// (direct-mode command execution, and the line INPUT/READ prompts for).
/// Readers never slice either buffer into a borrowed `&[u8]` - every read
/// goes through [`Interp::byte_at`], which copies a single byte and
/// returns immediately, so a parser never holds a borrow across a call
/// that also needs to mutate the arena (creating a variable, pushing a
/// stack frame, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Program,
    Input,
}

/// Top-level interpreter state: the memory arena, the host it talks to,
/// and the handful of cursors the reference interpreter keeps in
/// `BASIC_MAIN_STATE`.
pub struct Interp<H: Host> {
    pub arena: Arena,
    pub host: H,
    pub current_line: Option<u32>,
    pub parse_src: Source,
    pub parse_ptr: usize,
    pub data_ptr: usize,
    pub data_line: Option<u32>,
    pub error_in_data: bool,
    pub input_buf: Vec<u8>,
    pub rng_seed: u64,
}

impl<H: Host> Interp<H> {
    pub fn new(arena_size: usize, host: H) -> Self {
        let arena = Arena::new(arena_size);
        let mut interp = Interp {
            arena,
            host,
            current_line: None,
            parse_src: Source::Input,
            parse_ptr: 0,
            data_ptr: 0,
            data_line: None,
            error_in_data: false,
            input_buf: Vec::new(),
            rng_seed: 0x2545_f491_4f6c_dd1d,
        };
        interp.restore_data_pointer();
        interp
    }

    pub fn byte_at(&self, src: Source, pos: usize) -> u8 {
        match src {
            Source::Program => self.arena.buf.get(pos).copied().unwrap_or(0),
            Source::Input => self.input_buf.get(pos).copied().unwrap_or(0),
        }
    }

    /// Reset the DATA cursor to the start of line 0 (or wherever the first
    /// stored line is), as `RESTORE`, `RUN`, `NEW`, and initialization do.
    pub fn restore_data_pointer(&mut self) {
        let fl = program::find_line(&self.arena, 0);
        self.data_ptr = program::line_parse_ptr(fl.idx);
        self.data_line = Some(0);
    }

    fn clear_variables_and_control_stack(&mut self) {
        self.arena.clear_variables();
        self.arena.clear_stack();
    }

    /// Jump execution to `line`, always against `Source::Program`. If
    /// `must_exist` and no such line is stored, reports `NoSuchLine`; RUN
    /// with no starting-line argument passes `must_exist = false`.
    pub fn goto_line(&mut self, line: u32, must_exist: bool) -> Result<(), BasicError> {
        let fl = program::find_line(&self.arena, line);
        if !fl.found && must_exist {
            return Err(BasicError::NoSuchLine);
        }
        self.current_line = Some(line);
        self.parse_src = Source::Program;
        self.parse_ptr = program::line_parse_ptr(fl.idx);
        Ok(())
    }

    /// One line typed at the prompt: either edits the stored program (no
    /// output, returns `false`) or executes immediately (always returns
    /// `true`, even on error, per the reference driver's `process_line`
    /// return contract resolved in `SPEC_FULL.md` 9a).
    pub fn process_line(&mut self, raw: &str) -> bool {
        self.error_in_data = false;
        self.current_line = None;
        let trimmed = raw.trim_start_matches(' ');
        if trimmed.is_empty() {
            return false;
        }
        let tokenized = crate::keywords::tokenize_line(trimmed);
        self.input_buf = tokenized;
        self.parse_src = Source::Input;
        self.parse_ptr = 0;

        let mut pos = self.parse_ptr;
        let outcome = parse::parse_uint16(self, Source::Input, &mut pos);
        match outcome {
            crate::error::ParseOutcome::Found(line) => {
                self.clear_variables_and_control_stack();
                let rest = parse::skip_ws(self, Source::Input, &mut pos);
                let content: Vec<u8> = self.input_buf[rest..].to_vec();
                if let Err(e) = program::store_line(&mut self.arena, line, &content) {
                    self.host.write_str(&e.report(None));
                    self.host.write_char('\n');
                    return false;
                }
                self.restore_data_pointer();
                false
            }
            crate::error::ParseOutcome::Err(_) => {
                self.host.write_str(&BasicError::Syntax.report(None));
                self.host.write_char('\n');
                true
            }
            crate::error::ParseOutcome::NotFound => {
                self.parse_ptr = pos;
                debug!(current_line = ?self.current_line, "exec_line entry");
                let result = crate::dispatch::exec_line(self);
                self.report_if_error(result);
                true
            }
        }
    }

    fn report_if_error(&mut self, result: Result<(), BasicError>) {
        if let Err(e) = result {
            let line = if self.error_in_data {
                self.data_line
            } else {
                self.current_line
            };
            self.host.write_str(&e.report(line));
            self.host.write_char('\n');
        }
    }

    /// Interactive REPL loop: print `OK`, read a line, process it, repeat.
    pub fn interactive_prompt(&mut self) {
        let mut print_ok = true;
        loop {
            if print_ok {
                self.host.write_str("OK\n");
            }
            let line = match self.host.read_line() {
                Some(l) => l,
                None => return,
            };
            trace!(%line, "prompt read line");
            print_ok = self.process_line(&line);
        }
    }
}
