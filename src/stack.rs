use crate::arena::Arena;
use crate::error::{BasicError, BasicResult};
use crate::variables::VarName;

/// Tag byte distinguishing the two kinds of control frames that share the
/// downward-growing stack with untagged expression frames. Plain integers
/// (not ASCII `F`/`G`) to match the reference interpreter's own tagging;
/// see `SPEC_FULL.md` 4.5/9a.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTag {
    For = 0,
    Gosub = 1,
}

#[derive(Debug, Clone, Copy)]
pub struct GosubFrame {
    pub line: u32,
    pub parse_idx: u32,
}

const GOSUB_FRAME_SIZE: usize = 4; // line: u16 + parse_idx: u16

#[derive(Debug, Clone, Copy)]
pub struct ForFrame {
    pub line: u32,
    pub parse_idx: u32,
    pub to_val: f32,
    pub step: f32,
    pub var: VarName,
}

const FOR_FRAME_SIZE: usize = 2 + 2 + 4 + 4 + 2; // line, parse_idx, to_val, step, var

fn encode_gosub(arena: &mut Arena, idx: usize, f: &GosubFrame) {
    arena.write_u16(idx, f.line as u16);
    arena.write_u16(idx + 2, f.parse_idx as u16);
}

fn decode_gosub(arena: &Arena, idx: usize) -> GosubFrame {
    GosubFrame {
        line: arena.read_u16(idx) as u32,
        parse_idx: arena.read_u16(idx + 2) as u32,
    }
}

fn encode_for(arena: &mut Arena, idx: usize, f: &ForFrame) {
    arena.write_u16(idx, f.line as u16);
    arena.write_u16(idx + 2, f.parse_idx as u16);
    arena.write_f32(idx + 4, f.to_val);
    arena.write_f32(idx + 8, f.step);
    arena.write_u16(idx + 12, f.var.0);
}

fn decode_for(arena: &Arena, idx: usize) -> ForFrame {
    ForFrame {
        line: arena.read_u16(idx) as u32,
        parse_idx: arena.read_u16(idx + 2) as u32,
        to_val: arena.read_f32(idx + 4),
        step: arena.read_f32(idx + 8),
        var: VarName(arena.read_u16(idx + 12)),
    }
}

/// Push `size` bytes of frame locals plus a leading tag byte, checking for
/// both atomically - this is the detail that makes the reference
/// interpreter's "nocheck" expression pushes safe: the preceding tagged
/// push already reserved the byte the untagged pushes that follow need.
fn push_frame(arena: &mut Arena, size: usize, tag: FrameTag) -> BasicResult<usize> {
    arena.require_space(size + 1)?;
    arena.stktop_idx -= size + 1;
    arena.buf[arena.stktop_idx] = tag as u8;
    Ok(arena.stktop_idx + 1)
}

pub fn push_gosub(arena: &mut Arena, frame: &GosubFrame) -> BasicResult<()> {
    let idx = push_frame(arena, GOSUB_FRAME_SIZE, FrameTag::Gosub)?;
    encode_gosub(arena, idx, frame);
    Ok(())
}

pub fn push_for(arena: &mut Arena, frame: &ForFrame) -> BasicResult<()> {
    let idx = push_frame(arena, FOR_FRAME_SIZE, FrameTag::For)?;
    encode_for(arena, idx, frame);
    Ok(())
}

/// Scan downward from the stack top for the nearest GOSUB frame, discarding
/// (breaking) any FOR frames encountered above it - entering a subroutine
/// never leaves a loop suspended across the call boundary once RETURN fires.
pub fn pop_gosub(arena: &mut Arena) -> Option<GosubFrame> {
    let mut idx = arena.stktop_idx;
    loop {
        if idx + 1 + GOSUB_FRAME_SIZE > arena.max_idx {
            return None;
        }
        match arena.buf[idx] {
            t if t == FrameTag::Gosub as u8 => {
                let frame = decode_gosub(arena, idx + 1);
                arena.stktop_idx = idx + 1 + GOSUB_FRAME_SIZE;
                return Some(frame);
            }
            t if t == FrameTag::For as u8 => {
                if idx + 1 + FOR_FRAME_SIZE > arena.max_idx {
                    return None;
                }
                idx += 1 + FOR_FRAME_SIZE;
            }
            _ => return None,
        }
    }
}

/// Scan for a FOR frame belonging to `var`, popping it (and discarding all
/// frames scanned above it) if found. Returns `None` untouched if a GOSUB
/// frame is hit first or the stack runs out - a NEXT can only close loops
/// started in the same (or an outer) call frame.
pub fn lookup_for(arena: &mut Arena, var: VarName) -> Option<ForFrame> {
    let mut idx = arena.stktop_idx;
    loop {
        if idx + 1 + FOR_FRAME_SIZE > arena.max_idx {
            return None;
        }
        if arena.buf[idx] != FrameTag::For as u8 {
            return None;
        }
        let frame = decode_for(arena, idx + 1);
        if frame.var == var {
            arena.stktop_idx = idx + 1 + FOR_FRAME_SIZE;
            return Some(frame);
        }
        idx += 1 + FOR_FRAME_SIZE;
    }
}

/// Untagged expression-evaluator frame push/pop: no tag byte, since the
/// evaluator's own state machine always knows how many bytes to expect.
pub fn push_expr(arena: &mut Arena, bytes: &[u8]) -> BasicResult<()> {
    arena.require_space(bytes.len())?;
    arena.stktop_idx -= bytes.len();
    let start = arena.stktop_idx;
    arena.buf[start..start + bytes.len()].copy_from_slice(bytes);
    Ok(())
}

pub fn push_expr_byte(arena: &mut Arena, b: u8) {
    arena.stktop_idx -= 1;
    arena.buf[arena.stktop_idx] = b;
}

pub fn pop_expr(arena: &mut Arena, len: usize) -> Vec<u8> {
    let out = arena.buf[arena.stktop_idx..arena.stktop_idx + len].to_vec();
    arena.stktop_idx += len;
    out
}

pub fn pop_expr_byte(arena: &mut Arena) -> u8 {
    let b = arena.buf[arena.stktop_idx];
    arena.stktop_idx += 1;
    b
}

pub fn get_top(arena: &Arena) -> usize {
    arena.stktop_idx
}

pub fn set_top(arena: &mut Arena, top: usize) {
    arena.stktop_idx = top;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_without_for_finds_nothing() {
        let mut arena = Arena::new(64);
        assert!(lookup_for(&mut arena, VarName::empty().push_char(b'I')).is_none());
    }

    #[test]
    fn for_frame_round_trips_and_closes_inner_loops() {
        let mut arena = Arena::new(64);
        let i = VarName::empty().push_char(b'I');
        let j = VarName::empty().push_char(b'J');
        push_for(
            &mut arena,
            &ForFrame {
                line: 10,
                parse_idx: 20,
                to_val: 5.0,
                step: 1.0,
                var: i,
            },
        )
        .unwrap();
        push_for(
            &mut arena,
            &ForFrame {
                line: 15,
                parse_idx: 25,
                to_val: 9.0,
                step: 1.0,
                var: j,
            },
        )
        .unwrap();
        // NEXT I should discard the inner J frame along the way.
        let f = lookup_for(&mut arena, i).unwrap();
        assert_eq!(f.line, 10);
        assert!(lookup_for(&mut arena, j).is_none());
    }

    #[test]
    fn return_without_gosub_is_none() {
        let mut arena = Arena::new(64);
        assert!(pop_gosub(&mut arena).is_none());
    }

    #[test]
    fn gosub_frame_round_trips() {
        let mut arena = Arena::new(64);
        push_gosub(
            &mut arena,
            &GosubFrame {
                line: 30,
                parse_idx: 40,
            },
        )
        .unwrap();
        let f = pop_gosub(&mut arena).unwrap();
        assert_eq!((f.line, f.parse_idx), (30, 40));
    }
}
