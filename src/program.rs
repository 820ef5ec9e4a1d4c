use tracing::debug;

use crate::arena::Arena;
use crate::error::{BasicError, BasicResult};
use crate::keywords::{keyword_text, RANGE_BEGIN, RANGE_END};

/// Result of a line-number lookup: `idx` is always meaningful (either the
/// matching line's header offset, or the insertion point for a new line
/// with that number), `found` says whether an exact match exists.
pub struct FindLineResult {
    pub idx: usize,
    pub found: bool,
}

/// Program storage occupies `[0, vars_idx)`. Each stored line is a 5-byte
/// header (2-byte next-line offset, 2-byte line number) followed by the
/// tokenized line text and a NUL terminator. A trailing 2-byte all-zero
/// "next" field doubles as the program's end marker and rides along with
/// every insertion, carried forward by the same `copy_within` that makes
/// room for new text.
pub fn find_line(arena: &Arena, line: u32) -> FindLineResult {
    let mut idx = 1usize;
    while arena.buf[idx] != 0 || arena.buf[idx + 1] != 0 {
        let nxt_idx = arena.read_u16(idx) as usize;
        let line_no = arena.read_u16(idx + 2) as u32;
        if line_no >= line {
            return FindLineResult {
                idx,
                found: line_no == line,
            };
        }
        idx = nxt_idx;
    }
    FindLineResult { idx, found: false }
}

/// Back up one byte so the returned pointer looks like it is standing at
/// the end of the *previous* line, which is what [`advance_line`] expects.
pub fn line_parse_ptr(line_idx: usize) -> usize {
    line_idx - 1
}

/// Step from the end of a line to the start of the next line's content.
/// Returns `None` for the line number once the end of the program is
/// reached, leaving `pos` unchanged (mirrors returning `UINT_MAX`).
pub fn advance_line(arena: &Arena, pos: usize) -> (usize, Option<u32>) {
    if arena.buf[pos + 1] != 0 || arena.buf[pos + 2] != 0 {
        let line_no = arena.buf[pos + 3] as u32 | (arena.buf[pos + 4] as u32) << 8;
        (pos + 5, Some(line_no))
    } else {
        (pos, None)
    }
}

fn rebuild_list(arena: &mut Arena) {
    let mut idx = 1usize;
    while arena.buf[idx] != 0 || arena.buf[idx + 1] != 0 {
        let start = idx + 4;
        let len = arena.buf[start..]
            .iter()
            .position(|&b| b == 0)
            .expect("stored line must be NUL-terminated");
        let nxt_idx = start + len + 1;
        arena.write_u16(idx, nxt_idx as u16);
        idx = nxt_idx;
    }
}

/// Insert, replace, or (if `content` is empty) delete the line numbered
/// `line`. Variables must already be cleared by the caller before editing
/// the program, since the memory shift below only relocates program text.
pub fn store_line(arena: &mut Arena, line: u32, content: &[u8]) -> BasicResult<()> {
    debug!(line, len = content.len(), "store_line");
    let fl = find_line(arena, line);
    let idx = fl.idx;
    if fl.found {
        let nxt_idx = arena.read_u16(idx) as usize;
        let removed = nxt_idx - idx;
        arena.buf.copy_within(nxt_idx..arena.vars_idx, idx);
        arena.vars_idx -= removed;
        arena.array_idx -= removed;
        arena.free_idx -= removed;
    }
    if !content.is_empty() {
        let len = content.len();
        arena.require_space(len + 5)?;
        let tail = arena.vars_idx - idx;
        arena.buf.copy_within(idx..idx + tail, idx + len + 5);
        arena.buf[idx] = 0xff;
        arena.write_u16(idx + 2, line as u16);
        arena.buf[idx + 4..idx + 4 + len].copy_from_slice(content);
        arena.buf[idx + 4 + len] = 0;
        arena.vars_idx += len + 5;
        arena.array_idx += len + 5;
        arena.free_idx += len + 5;
    }
    rebuild_list(arena);
    Ok(())
}

fn detokenized_line(arena: &Arena, mut idx: usize, out: &mut String) {
    loop {
        let c = arena.buf[idx];
        if c == 0 {
            break;
        }
        if (RANGE_BEGIN..=RANGE_END).contains(&c) {
            out.push_str(keyword_text(c).unwrap_or(""));
        } else {
            out.push(c as char);
        }
        idx += 1;
    }
}

/// Render the program starting at `first_line`, de-tokenizing each line.
pub fn list(arena: &Arena, first_line: u32) -> String {
    let mut out = String::new();
    let mut idx = find_line(arena, first_line).idx;
    loop {
        let nxt_idx = arena.read_u16(idx) as usize;
        if nxt_idx == 0 {
            break;
        }
        let line_num = arena.read_u16(idx + 2);
        out.push_str(&line_num.to_string());
        out.push(' ');
        detokenized_line(arena, idx + 4, &mut out);
        out.push('\n');
        idx = nxt_idx;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::tokenize_line;

    fn store(arena: &mut Arena, line: u32, text: &str) {
        let tokenized = tokenize_line(text);
        store_line(arena, line, tokenized.as_bytes()).unwrap();
    }

    #[test]
    fn stores_and_lists_lines_in_order() {
        let mut arena = Arena::new(512);
        store(&mut arena, 20, "PRINT \"B\"");
        store(&mut arena, 10, "PRINT \"A\"");
        let listing = list(&arena, 0);
        let a_pos = listing.find("10 ").unwrap();
        let b_pos = listing.find("20 ").unwrap();
        assert!(a_pos < b_pos);
        assert!(listing.contains("PRINT"));
    }

    #[test]
    fn replacing_a_line_keeps_the_single_copy() {
        let mut arena = Arena::new(512);
        store(&mut arena, 10, "PRINT \"A\"");
        store(&mut arena, 10, "PRINT \"C\"");
        let listing = list(&arena, 0);
        assert_eq!(listing.matches("10 ").count(), 1);
        assert!(listing.contains('C'));
    }

    #[test]
    fn empty_content_deletes_a_line() {
        let mut arena = Arena::new(512);
        store(&mut arena, 10, "PRINT \"A\"");
        store_line(&mut arena, 10, &[]).unwrap();
        assert!(!find_line(&arena, 10).found);
    }

    #[test]
    fn out_of_memory_when_line_does_not_fit() {
        let mut arena = Arena::new(16);
        let tokenized = tokenize_line("PRINT \"THIS LINE IS MUCH TOO LONG TO FIT\"");
        assert_eq!(
            store_line(&mut arena, 10, tokenized.as_bytes()),
            Err(BasicError::OutOfMemory)
        );
    }
}
