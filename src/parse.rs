use crate::error::{BasicError, BasicResult, ParseOutcome};
use crate::eval;
use crate::host::Host;
use crate::interp::{Interp, Source};
use crate::keywords::Keyword;
use crate::variables::{self, VarName};

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

/// Skip over spaces, returning the position just past them.
pub fn skip_ws<H: Host>(interp: &Interp<H>, src: Source, pos: &mut usize) -> usize {
    while interp.byte_at(src, *pos) == b' ' {
        *pos += 1;
    }
    *pos
}

/// Skip to the end of the current statement (a `:` separator) or the end
/// of the line, whichever comes first. Does not special-case string
/// literals or REM, matching the reference parser - see `SPEC_FULL.md` 9a.
pub fn skip_to_end_statement<H: Host>(interp: &Interp<H>, src: Source, pos: &mut usize) {
    loop {
        let c = interp.byte_at(src, *pos);
        if c == 0 || c == b':' {
            return;
        }
        *pos += 1;
    }
}

/// Parse an unsigned 16-bit decimal literal, matching the overflow-check
/// algorithm in `basic_parsing_uint16` exactly (rejecting the number the
/// moment either partial product or the final addition would exceed
/// 65535, not after the fact).
pub fn parse_uint16<H: Host>(interp: &Interp<H>, src: Source, pos: &mut usize) -> ParseOutcome<u32> {
    let mut result: u32 = 0;
    let mut any = false;
    loop {
        skip_ws(interp, src, pos);
        let c = interp.byte_at(src, *pos);
        if !is_digit(c) {
            break;
        }
        if result >= 10000 {
            return ParseOutcome::Err(BasicError::Syntax);
        }
        result *= 10;
        let d = (c - b'0') as u32;
        if 65535 - d < result {
            return ParseOutcome::Err(BasicError::Syntax);
        }
        result += d;
        *pos += 1;
        any = true;
    }
    if any {
        ParseOutcome::Found(result)
    } else {
        ParseOutcome::NotFound
    }
}

/// Custom float parser (not `f32::from_str`): BASIC numbers tolerate
/// embedded whitespace between digits, and the tokenizer has already
/// replaced a literal `+`/`-` exponent sign with its token byte. The
/// algorithm (scale as you go, apply `10^scaling` at the end) matches the
/// reference interpreter's own inexact-by-design routine.
pub fn parse_float<H: Host>(interp: &Interp<H>, src: Source, pos: &mut usize) -> BasicResult<f32> {
    let mut val: f32 = 0.0;
    let mut decimal_scaling: i32 = 0;

    let mut c = interp.byte_at(src, *pos);
    while (b'0'..=b'9').contains(&c) {
        val = val * 10.0 + (c - b'0') as f32;
        *pos += 1;
        skip_ws(interp, src, pos);
        c = interp.byte_at(src, *pos);
    }

    if c == b'.' {
        *pos += 1;
        skip_ws(interp, src, pos);
        c = interp.byte_at(src, *pos);
        while (b'0'..=b'9').contains(&c) {
            val = val * 10.0 + (c - b'0') as f32;
            decimal_scaling -= 1;
            *pos += 1;
            skip_ws(interp, src, pos);
            c = interp.byte_at(src, *pos);
        }
    }

    if c == b'e' || c == b'E' {
        *pos += 1;
        skip_ws(interp, src, pos);
        let mut exponent_sign = 1i32;
        c = interp.byte_at(src, *pos);
        if c == Keyword::Plus as u8 {
            *pos += 1;
            skip_ws(interp, src, pos);
        } else if c == Keyword::Minus as u8 {
            exponent_sign = -1;
            *pos += 1;
            skip_ws(interp, src, pos);
        }
        match parse_uint16(interp, src, pos) {
            ParseOutcome::Found(e) => decimal_scaling += exponent_sign * e as i32,
            ParseOutcome::NotFound => {}
            ParseOutcome::Err(e) => return Err(e),
        }
    }

    val *= 10f32.powi(decimal_scaling);
    eval::check_fp(val)
}

/// A variable name: one required letter, one optional trailing digit.
pub fn parse_varname<H: Host>(interp: &Interp<H>, src: Source, pos: &mut usize) -> BasicResult<VarName> {
    let c = interp.byte_at(src, *pos);
    if !is_alpha(c) {
        return Err(BasicError::Syntax);
    }
    let mut vn = VarName::empty().push_char(c);
    *pos += 1;
    skip_ws(interp, src, pos);
    let c = interp.byte_at(src, *pos);
    if is_digit(c) {
        vn = vn.push_char(c);
        *pos += 1;
        skip_ws(interp, src, pos);
    }
    Ok(vn)
}

fn get_variable<H: Host>(
    interp: &mut Interp<H>,
    src: Source,
    pos: &mut usize,
    create: bool,
    dim: bool,
) -> BasicResult<(VarName, Option<usize>, f32)> {
    let vn = parse_varname(interp, src, pos)?;
    let result = if interp.byte_at(src, *pos) == b'(' {
        *pos += 1;
        let subscript = parse_arrayindex_body(interp, src, pos)?;
        let offset = variables::array_element(&mut interp.arena, vn, subscript, dim)?;
        if create {
            (vn, Some(offset), 0.0)
        } else {
            (vn, None, interp.arena.read_f32(offset))
        }
    } else if create {
        let offset = variables::create_scalar(&mut interp.arena, vn)?;
        (vn, Some(offset), 0.0)
    } else {
        (vn, None, variables::read_var(&interp.arena, vn))
    };
    skip_ws(interp, src, pos);
    Ok(result)
}

/// Parse a variable reference in creation mode: returns the arena offset
/// of its 4-byte value slot (allocating the scalar/array element if it
/// does not exist yet). Used by `LET`, `FOR`, `READ`, and `INPUT` targets.
pub fn variable_ref<H: Host>(
    interp: &mut Interp<H>,
    src: Source,
    pos: &mut usize,
) -> BasicResult<(VarName, usize)> {
    let (vn, offset, _) = get_variable(interp, src, pos, true, false)?;
    Ok((vn, offset.expect("create mode always yields an offset")))
}

/// `DIM`: create-mode parse whose resulting offset is discarded - the
/// point is the allocation side effect and the redimension check.
pub fn variable_dim<H: Host>(interp: &mut Interp<H>, src: Source, pos: &mut usize) -> BasicResult<()> {
    get_variable(interp, src, pos, true, true)?;
    Ok(())
}

/// Read-mode variable reference: returns the variable's current value.
pub fn variable_val<H: Host>(
    interp: &mut Interp<H>,
    src: Source,
    pos: &mut usize,
) -> BasicResult<(VarName, f32)> {
    let (vn, _, val) = get_variable(interp, src, pos, false, false)?;
    Ok((vn, val))
}

/// Shared body of array-subscript parsing once the opening delimiter byte
/// (a literal `(` or the single-byte `TAB(` token) has already been
/// consumed by the caller.
fn parse_arrayindex_body<H: Host>(
    interp: &mut Interp<H>,
    src: Source,
    pos: &mut usize,
) -> BasicResult<u32> {
    let val = eval::parse_expression(interp, src, pos)?;
    if !(0.0..=32767.0).contains(&val) {
        return Err(BasicError::Parameter);
    }
    skip_ws(interp, src, pos);
    if interp.byte_at(src, *pos) != b')' {
        return Err(BasicError::Syntax);
    }
    *pos += 1;
    Ok(val.floor() as u32)
}

/// `TAB(expr)` and a bare array subscript both funnel through here: the
/// opening delimiter byte is consumed unconditionally first, since it is
/// either a literal `(` or the single-byte `TAB(` token - the caller
/// doesn't need to tell them apart.
pub fn parse_arrayindex<H: Host>(
    interp: &mut Interp<H>,
    src: Source,
    pos: &mut usize,
) -> BasicResult<u32> {
    *pos += 1;
    parse_arrayindex_body(interp, src, pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::TestHost;

    fn interp_with(text: &str) -> (Interp<TestHost>, usize) {
        let mut interp = Interp::new(512, TestHost::default());
        interp.input_buf = text.as_bytes().to_vec();
        (interp, 0)
    }

    #[test]
    fn parses_uint16_with_overflow_check() {
        let (interp, _) = interp_with("70000");
        let mut pos = 0;
        assert!(matches!(
            parse_uint16(&interp, Source::Input, &mut pos),
            ParseOutcome::Err(BasicError::Syntax)
        ));
    }

    #[test]
    fn parses_plain_uint16() {
        let (interp, _) = interp_with("1234 ");
        let mut pos = 0;
        match parse_uint16(&interp, Source::Input, &mut pos) {
            ParseOutcome::Found(v) => assert_eq!(v, 1234),
            _ => panic!("expected a value"),
        }
    }

    #[test]
    fn parses_simple_float() {
        let (interp, _) = interp_with("3.5");
        let mut pos = 0;
        assert_eq!(parse_float(&interp, Source::Input, &mut pos).unwrap(), 3.5);
    }

    #[test]
    fn variable_name_takes_one_letter_and_one_digit() {
        let (interp, _) = interp_with("A1B");
        let mut pos = 0;
        let vn = parse_varname(&interp, Source::Input, &mut pos).unwrap();
        assert_eq!(vn, VarName::empty().push_char(b'A').push_char(b'1'));
        assert_eq!(pos, 2);
    }
}
