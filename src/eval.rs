use tracing::trace;

use crate::arena::Arena;
use crate::error::{BasicError, BasicResult};
use crate::host::Host;
use crate::interp::{Interp, Source};
use crate::keywords::{
    Keyword, RANGE_BEGIN_FUNCTIONS, RANGE_BEGIN_OPERATORS, RANGE_END_FUNCTIONS,
    RANGE_END_OPERATORS,
};
use crate::parse;
use crate::stack;
use crate::variables::{self, VarName};

/// Where a paused "virtual call" in [`expression_engine`] resumes once the
/// value it is waiting on (`val`) is ready. Mirrors `PARSE_EXPR_STATE`
/// one-for-one, collapsed to the states that actually need their own tag
/// byte on the explicit stack (`Expression`/`Term`/`Expr1`/`ApplyOperator`
/// are pure direct jumps, never resumed from a pop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ret {
    FirstOperator,
    SecondOperator,
    PrecedenceDown,
    SubexprRet,
    FunctionargRet,
    SubscriptRet,
    Exiting,
}

impl Ret {
    fn to_byte(self) -> u8 {
        match self {
            Ret::FirstOperator => 0,
            Ret::SecondOperator => 1,
            Ret::PrecedenceDown => 2,
            Ret::SubexprRet => 3,
            Ret::FunctionargRet => 4,
            Ret::SubscriptRet => 5,
            Ret::Exiting => 6,
        }
    }

    fn from_byte(b: u8) -> BasicResult<Ret> {
        Ok(match b {
            0 => Ret::FirstOperator,
            1 => Ret::SecondOperator,
            2 => Ret::PrecedenceDown,
            3 => Ret::SubexprRet,
            4 => Ret::FunctionargRet,
            5 => Ret::SubscriptRet,
            6 => Ret::Exiting,
            _ => return Err(BasicError::Internal),
        })
    }
}

enum State {
    Expression,
    Term,
    SubexprRet,
    FunctionargRet,
    SubscriptRet,
    FirstOperator,
    Expr1,
    SecondOperator,
    PrecedenceDown,
    ApplyOperator,
    Exiting,
}

fn push_tag(arena: &mut Arena, tag: Ret) -> BasicResult<()> {
    arena.require_space(1)?;
    stack::push_expr_byte(arena, tag.to_byte());
    Ok(())
}

fn pop_tag(arena: &mut Arena) -> BasicResult<Ret> {
    Ret::from_byte(stack::pop_expr_byte(arena))
}

/// `{negate, min_precedence, op, lhs}` - the locals a `TERM` frame needs
/// restored once the nested expression it recursed into (a parenthesized
/// subexpression, a function argument, or an array subscript) completes.
struct TermLocals {
    negate: bool,
    min_precedence: u8,
    op: u8,
    lhs: f32,
}

fn encode_term_locals(l: &TermLocals) -> [u8; 7] {
    let mut buf = [0u8; 7];
    buf[0] = l.negate as u8;
    buf[1] = l.min_precedence;
    buf[2] = l.op;
    buf[3..7].copy_from_slice(&l.lhs.to_le_bytes());
    buf
}

fn decode_term_locals(bytes: &[u8]) -> TermLocals {
    TermLocals {
        negate: bytes[0] != 0,
        min_precedence: bytes[1],
        op: bytes[2],
        lhs: f32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]),
    }
}

fn push_subexpr_ret(arena: &mut Arena, l: &TermLocals) -> BasicResult<()> {
    stack::push_expr(arena, &encode_term_locals(l))?;
    push_tag(arena, Ret::SubexprRet)
}

fn pop_subexpr_locals(arena: &mut Arena) -> TermLocals {
    decode_term_locals(&stack::pop_expr(arena, 7))
}

fn push_functionarg_ret(arena: &mut Arena, fn_kw: u8, l: &TermLocals) -> BasicResult<()> {
    let mut buf = [0u8; 8];
    buf[0] = fn_kw;
    buf[1..8].copy_from_slice(&encode_term_locals(l));
    stack::push_expr(arena, &buf)?;
    push_tag(arena, Ret::FunctionargRet)
}

fn pop_functionarg_locals(arena: &mut Arena) -> (u8, TermLocals) {
    let bytes = stack::pop_expr(arena, 8);
    (bytes[0], decode_term_locals(&bytes[1..8]))
}

fn push_subscript_ret(arena: &mut Arena, vn: VarName, l: &TermLocals) -> BasicResult<()> {
    let mut buf = [0u8; 9];
    buf[0..2].copy_from_slice(&vn.0.to_le_bytes());
    buf[2..9].copy_from_slice(&encode_term_locals(l));
    stack::push_expr(arena, &buf)?;
    push_tag(arena, Ret::SubscriptRet)
}

fn pop_subscript_locals(arena: &mut Arena) -> (VarName, TermLocals) {
    let bytes = stack::pop_expr(arena, 9);
    let vn = VarName(u16::from_le_bytes([bytes[0], bytes[1]]));
    (vn, decode_term_locals(&bytes[2..9]))
}

fn push_precedence_down(arena: &mut Arena, min_precedence: u8, op: u8, lhs: f32) -> BasicResult<()> {
    let mut buf = [0u8; 6];
    buf[0] = min_precedence;
    buf[1] = op;
    buf[2..6].copy_from_slice(&lhs.to_le_bytes());
    stack::push_expr(arena, &buf)?;
    push_tag(arena, Ret::PrecedenceDown)
}

fn pop_precedence_down(arena: &mut Arena) -> (u8, u8, f32) {
    let bytes = stack::pop_expr(arena, 6);
    (
        bytes[0],
        bytes[1],
        f32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
    )
}

fn next_state(arena: &mut Arena) -> BasicResult<State> {
    Ok(match pop_tag(arena)? {
        Ret::FirstOperator => State::FirstOperator,
        Ret::SecondOperator => State::SecondOperator,
        Ret::PrecedenceDown => State::PrecedenceDown,
        Ret::SubexprRet => State::SubexprRet,
        Ret::FunctionargRet => State::FunctionargRet,
        Ret::SubscriptRet => State::SubscriptRet,
        Ret::Exiting => State::Exiting,
    })
}

/// Maps an infinite/NaN result to the reportable error it came from, since
/// Rust has no portable floating-point-exception-flag API to mirror
/// `except_to_basic_error`'s `feclearexcept`/`fetestexcept` pair. Division
/// by zero is pre-checked by its caller rather than routed through here,
/// since IEEE division by zero yields `inf`, which would otherwise be
/// misreported as `Overflow` instead of `DivisionByZero`.
pub fn check_fp(val: f32) -> BasicResult<f32> {
    if val.is_nan() {
        Err(BasicError::Parameter)
    } else if val.is_infinite() {
        Err(BasicError::Overflow)
    } else {
        Ok(val)
    }
}

fn is_operator(c: u8) -> bool {
    (RANGE_BEGIN_OPERATORS..=RANGE_END_OPERATORS).contains(&c)
}

fn precedence(op: u8) -> u8 {
    match crate::keywords::keyword_from_byte(op) {
        Some(Keyword::Plus) | Some(Keyword::Minus) => 1,
        Some(Keyword::Multiply) | Some(Keyword::Divide) => 2,
        _ => 0,
    }
}

fn apply_operator(lhs: f32, rhs: f32, op: u8) -> BasicResult<f32> {
    match crate::keywords::keyword_from_byte(op) {
        Some(Keyword::Plus) => check_fp(lhs + rhs),
        Some(Keyword::Minus) => check_fp(lhs - rhs),
        Some(Keyword::Multiply) => check_fp(lhs * rhs),
        Some(Keyword::Divide) => {
            if rhs == 0.0 {
                // 0/0 is FE_INVALID, not FE_DIVBYZERO - the reference
                // checks FE_DIVBYZERO first, so only a nonzero numerator
                // over zero reports DivisionByZero; 0/0 reports Parameter.
                if lhs == 0.0 {
                    Err(BasicError::Parameter)
                } else {
                    Err(BasicError::DivisionByZero)
                }
            } else {
                check_fp(lhs / rhs)
            }
        }
        _ => Err(BasicError::Internal),
    }
}

fn eval_function(fn_kw: u8, x: f32, rng_seed: &mut u64) -> BasicResult<f32> {
    match crate::keywords::keyword_from_byte(fn_kw) {
        Some(Keyword::Sgn) => Ok(if x > 0.0 {
            1.0
        } else if x < 0.0 {
            -1.0
        } else {
            0.0
        }),
        Some(Keyword::Int) => Ok(x.floor()),
        Some(Keyword::Abs) => Ok(x.abs()),
        Some(Keyword::Usr) => Ok(0.0),
        Some(Keyword::Sqr) => check_fp(x.sqrt()),
        Some(Keyword::Rnd) => Ok(next_random(rng_seed)),
        Some(Keyword::Sin) => check_fp(x.sin()),
        _ => Err(BasicError::Internal),
    }
}

/// Cheap deterministic PRNG standing in for the reference port's unseeded
/// `rand()` call - that port never calls `srand`, so its own sequence is
/// just as deterministic across runs as this one.
pub fn next_random(seed: &mut u64) -> f32 {
    let mut x = *seed;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *seed = x;
    ((x >> 40) as f32) / ((1u64 << 24) as f32)
}

/// Parse and evaluate one expression starting at `*pos`, leaving `*pos`
/// just past it. Saves and restores the expression stack's top around the
/// call so a parse failure partway through never leaks leftover frames,
/// mirroring `basic_parsing_expression`'s own save/restore.
pub fn parse_expression<H: Host>(
    interp: &mut Interp<H>,
    src: Source,
    pos: &mut usize,
) -> BasicResult<f32> {
    let top = stack::get_top(&interp.arena);
    let result = expression_engine(interp, src, pos);
    stack::set_top(&mut interp.arena, top);
    result
}

fn expression_engine<H: Host>(
    interp: &mut Interp<H>,
    src: Source,
    pos: &mut usize,
) -> BasicResult<f32> {
    push_tag(&mut interp.arena, Ret::Exiting)?;

    let mut state = State::Expression;
    let mut min_precedence: u8 = 0;
    let mut op: u8 = 0;
    let mut lhs: f32 = 0.0;
    let mut rhs: f32;
    let mut negate = false;
    let mut val: f32 = 0.0;

    loop {
        trace!(pos = *pos, "expression_engine state transition");
        match state {
            State::Expression => {
                min_precedence = 0;
                push_tag(&mut interp.arena, Ret::FirstOperator)?;
                state = State::Term;
            }

            State::Term => {
                negate = false;
                loop {
                    parse::skip_ws(interp, src, pos);
                    let c = interp.byte_at(src, *pos);
                    if c == Keyword::Plus as u8 {
                        *pos += 1;
                    } else if c == Keyword::Minus as u8 {
                        negate = !negate;
                        *pos += 1;
                    } else {
                        break;
                    }
                }
                parse::skip_ws(interp, src, pos);
                let c = interp.byte_at(src, *pos);
                if c.is_ascii_alphabetic() {
                    let vn = parse::parse_varname(interp, src, pos)?;
                    if interp.byte_at(src, *pos) == b'(' {
                        *pos += 1;
                        push_subscript_ret(
                            &mut interp.arena,
                            vn,
                            &TermLocals { negate, min_precedence, op, lhs },
                        )?;
                        state = State::Expression;
                    } else {
                        val = variables::read_var(&interp.arena, vn);
                        if negate {
                            val = -val;
                        }
                        state = next_state(&mut interp.arena)?;
                    }
                } else if c.is_ascii_digit() || c == b'.' {
                    let mut v = parse::parse_float(interp, src, pos)?;
                    if negate {
                        v = -v;
                    }
                    val = v;
                    state = next_state(&mut interp.arena)?;
                } else if (RANGE_BEGIN_FUNCTIONS..=RANGE_END_FUNCTIONS).contains(&c) {
                    *pos += 1;
                    parse::skip_ws(interp, src, pos);
                    if interp.byte_at(src, *pos) != b'(' {
                        return Err(BasicError::Syntax);
                    }
                    *pos += 1;
                    push_functionarg_ret(
                        &mut interp.arena,
                        c,
                        &TermLocals { negate, min_precedence, op, lhs },
                    )?;
                    state = State::Expression;
                } else if c == b'(' {
                    *pos += 1;
                    push_subexpr_ret(
                        &mut interp.arena,
                        &TermLocals { negate, min_precedence, op, lhs },
                    )?;
                    state = State::Expression;
                } else {
                    return Err(BasicError::Syntax);
                }
            }

            State::SubexprRet => {
                let locals = pop_subexpr_locals(&mut interp.arena);
                parse::skip_ws(interp, src, pos);
                if interp.byte_at(src, *pos) != b')' {
                    return Err(BasicError::Syntax);
                }
                *pos += 1;
                if locals.negate {
                    val = -val;
                }
                negate = locals.negate;
                min_precedence = locals.min_precedence;
                op = locals.op;
                lhs = locals.lhs;
                state = next_state(&mut interp.arena)?;
            }

            State::FunctionargRet => {
                let (fn_kw, locals) = pop_functionarg_locals(&mut interp.arena);
                parse::skip_ws(interp, src, pos);
                if interp.byte_at(src, *pos) != b')' {
                    return Err(BasicError::Syntax);
                }
                *pos += 1;
                val = eval_function(fn_kw, val, &mut interp.rng_seed)?;
                if locals.negate {
                    val = -val;
                }
                negate = locals.negate;
                min_precedence = locals.min_precedence;
                op = locals.op;
                lhs = locals.lhs;
                state = next_state(&mut interp.arena)?;
            }

            State::SubscriptRet => {
                let (vn, locals) = pop_subscript_locals(&mut interp.arena);
                if !(0.0..=32767.0).contains(&val) {
                    return Err(BasicError::Parameter);
                }
                let subscript = val.floor() as u32;
                parse::skip_ws(interp, src, pos);
                if interp.byte_at(src, *pos) != b')' {
                    return Err(BasicError::Syntax);
                }
                *pos += 1;
                let offset = variables::array_element(&mut interp.arena, vn, subscript, false)?;
                val = interp.arena.read_f32(offset);
                if locals.negate {
                    val = -val;
                }
                negate = locals.negate;
                min_precedence = locals.min_precedence;
                op = locals.op;
                lhs = locals.lhs;
                state = next_state(&mut interp.arena)?;
            }

            State::FirstOperator => {
                lhs = val;
                state = State::Expr1;
            }

            State::Expr1 => {
                parse::skip_ws(interp, src, pos);
                let c = interp.byte_at(src, *pos);
                if is_operator(c) && precedence(c) >= min_precedence {
                    op = c;
                    *pos += 1;
                    push_tag(&mut interp.arena, Ret::SecondOperator)?;
                    state = State::Term;
                } else {
                    val = lhs;
                    state = next_state(&mut interp.arena)?;
                }
            }

            State::SecondOperator => {
                rhs = val;
                let c = interp.byte_at(src, *pos);
                if is_operator(c) && precedence(c) > precedence(op) {
                    push_precedence_down(&mut interp.arena, min_precedence, op, lhs)?;
                    lhs = rhs;
                    min_precedence = precedence(op) + 1;
                    state = State::Expr1;
                } else {
                    state = State::ApplyOperator;
                }
            }

            State::PrecedenceDown => {
                rhs = val;
                let (mp, o, l) = pop_precedence_down(&mut interp.arena);
                min_precedence = mp;
                op = o;
                lhs = l;
                val = rhs;
                state = State::ApplyOperator;
            }

            State::ApplyOperator => {
                rhs = val;
                lhs = apply_operator(lhs, rhs, op)?;
                state = State::Expr1;
            }

            State::Exiting => break,
        }
    }

    Ok(val)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::TestHost;

    fn eval(text: &str) -> BasicResult<f32> {
        let mut interp = Interp::new(512, TestHost::default());
        interp.input_buf = crate::keywords::tokenize_line(text);
        let mut pos = 0;
        parse_expression(&mut interp, Source::Input, &mut pos)
    }

    #[test]
    fn evaluates_precedence_correctly() {
        assert_eq!(eval("2+3*4").unwrap(), 14.0);
    }

    #[test]
    fn parens_override_precedence() {
        assert_eq!(eval("(2+3)*4").unwrap(), 20.0);
    }

    #[test]
    fn unary_minus_and_functions_compose() {
        assert_eq!(eval("-SQR(9)").unwrap(), -3.0);
    }

    #[test]
    fn division_by_zero_is_reported() {
        assert_eq!(eval("1/0"), Err(BasicError::DivisionByZero));
    }

    #[test]
    fn zero_divided_by_zero_is_a_parameter_error() {
        assert_eq!(eval("0/0"), Err(BasicError::Parameter));
    }

    /// The deepest concurrent frame nesting `"2+3*4"` reaches is exactly 9
    /// bytes (a `PRECEDENCE_DOWN` frame held open while a second `*`
    /// operand is parsed) - a tight, load-bearing watermark on frame sizes.
    #[test]
    fn expression_arena_tightness_matches_nine_byte_watermark() {
        let mut fits = Interp::new(12, TestHost::default());
        fits.input_buf = crate::keywords::tokenize_line("2+3*4");
        let mut pos = 0;
        assert_eq!(parse_expression(&mut fits, Source::Input, &mut pos).unwrap(), 14.0);

        let mut too_small = Interp::new(11, TestHost::default());
        too_small.input_buf = crate::keywords::tokenize_line("2+3*4");
        let mut pos = 0;
        assert_eq!(
            parse_expression(&mut too_small, Source::Input, &mut pos),
            Err(BasicError::OutOfMemory)
        );
    }

    #[test]
    fn expression_stack_leaves_no_garbage_on_success() {
        let mut interp = Interp::new(512, TestHost::default());
        interp.input_buf = crate::keywords::tokenize_line("(1+2)*(3+4)");
        let top_before = stack::get_top(&interp.arena);
        let mut pos = 0;
        let v = parse_expression(&mut interp, Source::Input, &mut pos).unwrap();
        assert_eq!(v, 21.0);
        assert_eq!(stack::get_top(&interp.arena), top_before);
    }
}
