use tracing::debug;

use crate::error::{BasicError, BasicResult, ParseOutcome};
use crate::eval;
use crate::host::Host;
use crate::interp::{Interp, Source};
use crate::keywords::{self, Keyword, RANGE_BEGIN, RANGE_BEGIN_COMPARISON_OPERATORS, RANGE_END_COMPARISON_OPERATORS, RANGE_END_GENERAL};
use crate::parse;
use crate::program;
use crate::stack::{self, ForFrame, GosubFrame};
use crate::variables::{self, VarName};

fn check_no_trailing<H: Host>(interp: &Interp<H>) -> BasicResult<()> {
    let c = interp.byte_at(interp.parse_src, interp.parse_ptr);
    if c != 0 && c != b':' {
        Err(BasicError::Syntax)
    } else {
        Ok(())
    }
}

fn handler_data<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    let src = interp.parse_src;
    let mut pos = interp.parse_ptr;
    parse::skip_to_end_statement(interp, src, &mut pos);
    interp.parse_ptr = pos;
    Ok(())
}

/// Read one line from the host into `input_buf`. `None` (EOF/I/O error) is
/// treated as a STOP request, same as the reference `input_line`.
fn read_line_into_input_buf<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    match interp.host.read_line() {
        Some(l) => {
            interp.input_buf = l.into_bytes();
            Ok(())
        }
        None => Err(BasicError::Stop),
    }
}

/// Shared by `READ` and `INPUT`: walks a value cursor (program DATA text
/// for `READ`, the freshly typed/re-prompted line for `INPUT`) in lockstep
/// with the variable-list cursor on the statement itself, assigning one
/// value per variable. Preserves the reference interpreter's own
/// documented INPUT re-prompt quirk: the re-prompt path does not reset
/// `first_data`, which only matters when `READ` and `INPUT` somehow share
/// state - kept faithfully even though READ and INPUT never run
/// concurrently, since the original's `bool first_data = !read` line is
/// unconditional regardless of which path's loop body runs.
fn read_input_common<H: Host>(interp: &mut Interp<H>, read: bool) -> BasicResult<()> {
    let var_src = interp.parse_src;
    let mut var_pos = interp.parse_ptr;

    let value_src = if read { Source::Program } else { Source::Input };
    let mut input_pos = if read { interp.data_ptr } else { 0 };

    let mut first_input = true;
    let mut first_data = !read;

    loop {
        loop {
            let c = interp.byte_at(value_src, input_pos);
            let blank = c == 0 || (read && c == b':');
            if !blank {
                break;
            }
            if read {
                if c == 0 {
                    let (new_pos, line) = program::advance_line(&interp.arena, input_pos);
                    input_pos = new_pos;
                    match line {
                        Some(l) => interp.data_line = Some(l),
                        None => return Err(BasicError::OutOfData),
                    }
                } else {
                    input_pos += 1;
                }
                parse::skip_ws(interp, value_src, &mut input_pos);
                if interp.byte_at(value_src, input_pos) == Keyword::Data as u8 {
                    input_pos += 1;
                    parse::skip_ws(interp, value_src, &mut input_pos);
                    first_data = true;
                } else {
                    parse::skip_to_end_statement(interp, value_src, &mut input_pos);
                }
            } else {
                interp.host.write_str("?? ");
                read_line_into_input_buf(interp)?;
                input_pos = 0;
                // We should reset first_data to true here too, but don't -
                // matching the reference interpreter's own compatibility quirk.
            }
        }

        if first_input {
            first_input = false;
        } else {
            if interp.byte_at(var_src, var_pos) != b',' {
                return Err(BasicError::Syntax);
            }
            var_pos += 1;
            parse::skip_ws(interp, var_src, &mut var_pos);
        }

        if first_data {
            first_data = false;
        } else if interp.byte_at(value_src, input_pos) != b',' {
            interp.error_in_data |= read;
            return Err(BasicError::Syntax);
        } else {
            input_pos += 1;
        }

        let val = match eval::parse_expression(interp, value_src, &mut input_pos) {
            Ok(v) => v,
            Err(e) => {
                interp.error_in_data |= read;
                return Err(e);
            }
        };
        parse::skip_ws(interp, value_src, &mut input_pos);

        let (_, offset) = parse::variable_ref(interp, var_src, &mut var_pos)?;
        interp.arena.write_f32(offset, val);

        let c = interp.byte_at(var_src, var_pos);
        if c == 0 || c == b':' {
            break;
        }
    }

    if read {
        interp.data_ptr = input_pos;
    }
    interp.parse_ptr = var_pos;
    Ok(())
}

fn handler_input<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    if interp.current_line.is_none() {
        return Err(BasicError::InProgramOnly);
    }
    interp.host.write_str("? ");
    read_line_into_input_buf(interp)?;
    read_input_common(interp, false)
}

fn handler_read<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    read_input_common(interp, true)
}

fn handler_dim<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    let src = interp.parse_src;
    let mut pos = interp.parse_ptr;
    loop {
        parse::variable_dim(interp, src, &mut pos)?;
        if interp.byte_at(src, pos) == b',' {
            pos += 1;
            parse::skip_ws(interp, src, &mut pos);
        } else {
            interp.parse_ptr = pos;
            return Ok(());
        }
    }
}

/// Shared by `LET` and `FOR`: parse a variable target, require `=`, parse
/// and assign its value. Returns the variable name and its value slot so
/// `FOR` can build a loop frame around the same assignment.
fn let_for_common<H: Host>(interp: &mut Interp<H>) -> BasicResult<(VarName, usize)> {
    let src = interp.parse_src;
    let mut pos = interp.parse_ptr;
    let (vn, offset) = parse::variable_ref(interp, src, &mut pos)?;
    parse::skip_ws(interp, src, &mut pos);
    if interp.byte_at(src, pos) != Keyword::Equals as u8 {
        return Err(BasicError::Syntax);
    }
    pos += 1;
    let val = eval::parse_expression(interp, src, &mut pos)?;
    interp.arena.write_f32(offset, val);
    interp.parse_ptr = pos;
    Ok((vn, offset))
}

fn handler_let<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    let_for_common(interp)?;
    Ok(())
}

fn handler_for<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    let line = match interp.current_line {
        Some(l) => l,
        // Disallowed in direct mode: a loop back-edge into the command
        // buffer could be clobbered by whatever is typed next.
        None => return Err(BasicError::InProgramOnly),
    };
    let (vn, _) = let_for_common(interp)?;
    stack::lookup_for(&mut interp.arena, vn);

    let src = interp.parse_src;
    let mut pos = interp.parse_ptr;
    parse::skip_ws(interp, src, &mut pos);
    if interp.byte_at(src, pos) != Keyword::To as u8 {
        return Err(BasicError::Syntax);
    }
    pos += 1;
    parse::skip_ws(interp, src, &mut pos);
    let to_val = eval::parse_expression(interp, src, &mut pos)?;

    let mut step = 1.0f32;
    if interp.byte_at(src, pos) == Keyword::Step as u8 {
        pos += 1;
        parse::skip_ws(interp, src, &mut pos);
        step = eval::parse_expression(interp, src, &mut pos)?;
    }

    interp.parse_ptr = pos;
    let frame = ForFrame {
        line,
        parse_idx: pos as u32,
        to_val,
        step,
        var: vn,
    };
    stack::push_for(&mut interp.arena, &frame)
}

fn handler_next<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    let src = interp.parse_src;
    let mut pos = interp.parse_ptr;
    let vn = parse::parse_varname(interp, src, &mut pos)?;
    interp.parse_ptr = pos;

    let fe = match stack::lookup_for(&mut interp.arena, vn) {
        Some(f) => f,
        None => return Err(BasicError::NextWithoutFor),
    };

    let offset = variables::create_scalar(&mut interp.arena, fe.var)?;
    let current = interp.arena.read_f32(offset);
    let continuing = (fe.step > 0.0 && current < fe.to_val) || (fe.step < 0.0 && current > fe.to_val);
    if continuing {
        stack::push_for(&mut interp.arena, &fe)?;
        interp.arena.write_f32(offset, current + fe.step);
        interp.current_line = Some(fe.line);
        interp.parse_src = Source::Program;
        interp.parse_ptr = fe.parse_idx as usize;
    }
    Ok(())
}

fn goto_run_common<H: Host>(interp: &mut Interp<H>, line: u32, must_exist: bool) -> BasicResult<()> {
    interp.goto_line(line, must_exist)
}

fn handler_goto<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    let src = interp.parse_src;
    let mut pos = interp.parse_ptr;
    let line = parse::parse_uint16(interp, src, &mut pos).require()?;
    interp.parse_ptr = pos;
    goto_run_common(interp, line, true)
}

fn handler_run<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    let src = interp.parse_src;
    let mut pos = interp.parse_ptr;
    let outcome = parse::parse_uint16(interp, src, &mut pos);
    let (line, must_exist) = match outcome {
        ParseOutcome::Found(l) => (l, true),
        ParseOutcome::NotFound => (0, false),
        ParseOutcome::Err(e) => return Err(e),
    };
    interp.parse_ptr = pos;
    interp.arena.clear_variables();
    interp.arena.clear_stack();
    interp.restore_data_pointer();
    goto_run_common(interp, line, must_exist)
}

fn handler_new<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    check_no_trailing(interp)?;
    interp.arena.clear_program();
    interp.arena.clear_stack();
    interp.restore_data_pointer();
    Ok(())
}

fn handler_rem<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    let src = interp.parse_src;
    let mut pos = interp.parse_ptr;
    parse::skip_to_end_statement(interp, src, &mut pos);
    interp.parse_ptr = pos;
    Ok(())
}

fn handler_if<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    let src = interp.parse_src;
    let mut pos = interp.parse_ptr;

    let lhs = eval::parse_expression(interp, src, &mut pos)?;

    let mut op_bitmap: u8 = 0;
    loop {
        parse::skip_ws(interp, src, &mut pos);
        let c = interp.byte_at(src, pos);
        if (RANGE_BEGIN_COMPARISON_OPERATORS..=RANGE_END_COMPARISON_OPERATORS).contains(&c) {
            op_bitmap |= 1 << (c - RANGE_BEGIN_COMPARISON_OPERATORS);
            pos += 1;
        } else {
            break;
        }
    }
    if op_bitmap == 0 {
        return Err(BasicError::Syntax);
    }

    let rhs = eval::parse_expression(interp, src, &mut pos)?;

    parse::skip_ws(interp, src, &mut pos);
    if interp.byte_at(src, pos) != Keyword::Then as u8 {
        return Err(BasicError::Syntax);
    }
    pos += 1;
    interp.parse_ptr = pos;

    let cmp_bitmap = ((lhs > rhs) as u8) << (Keyword::Greater as u8 - RANGE_BEGIN_COMPARISON_OPERATORS)
        | ((lhs == rhs) as u8) << (Keyword::Equals as u8 - RANGE_BEGIN_COMPARISON_OPERATORS)
        | ((lhs < rhs) as u8) << (Keyword::Less as u8 - RANGE_BEGIN_COMPARISON_OPERATORS);

    if op_bitmap & cmp_bitmap != 0 {
        let mut then_pos = interp.parse_ptr;
        match parse::parse_uint16(interp, src, &mut then_pos) {
            ParseOutcome::Found(line) => {
                interp.parse_ptr = then_pos;
                goto_run_common(interp, line, true)
            }
            // NOT_FOUND *and* a malformed number both fall through to
            // "just continue from here" - matching the reference
            // handler's own unconditional else branch.
            _ => Ok(()),
        }
    } else {
        handler_rem(interp)
    }
}

fn handler_restore<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    // RESTORE never accepted a line-number argument in the reference
    // interpreter either - a dangling TODO there, preserved here.
    interp.restore_data_pointer();
    Ok(())
}

fn handler_gosub<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    let line_no = match interp.current_line {
        Some(l) => l,
        None => return Err(BasicError::InProgramOnly),
    };
    let src = interp.parse_src;
    let mut pos = interp.parse_ptr;
    let line = parse::parse_uint16(interp, src, &mut pos).require()?;
    interp.parse_ptr = pos;
    stack::push_gosub(
        &mut interp.arena,
        &GosubFrame {
            line: line_no,
            parse_idx: pos as u32,
        },
    )?;
    goto_run_common(interp, line, true)
}

fn handler_return<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    check_no_trailing(interp)?;
    match stack::pop_gosub(&mut interp.arena) {
        Some(frame) => {
            interp.current_line = Some(frame.line);
            interp.parse_src = Source::Program;
            interp.parse_ptr = frame.parse_idx as usize;
            Ok(())
        }
        None => Err(BasicError::ReturnWithoutGosub),
    }
}

fn handler_end<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    check_no_trailing(interp)
}

fn handler_stop<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    check_no_trailing(interp)?;
    Err(BasicError::Stop)
}

/// C's `%G`: 6 significant digits, fixed-point when the decimal exponent
/// falls in `-4..6`, scientific (`E±dd`) otherwise, trailing fractional
/// zeros (and a bare trailing `.`) trimmed either way. Values are widened
/// to `f64` first since the reference interpreter's `basic_printf` passes
/// its `float` argument through C's variadic `double` promotion before
/// `%G` ever sees it.
fn format_g(v: f32) -> String {
    if v == 0.0 {
        return if v.is_sign_negative() { "-0".to_string() } else { "0".to_string() };
    }
    let neg = v.is_sign_negative();
    let av = (v as f64).abs();
    let sci = format!("{:.5e}", av);
    let (mantissa, exp_str) = sci.split_once('e').expect("scientific format always has 'e'");
    let exp: i32 = exp_str.parse().expect("exponent is always a valid integer");
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    let mut out = String::new();
    if neg {
        out.push('-');
    }
    if (-4..6).contains(&exp) {
        let point = 1 + exp;
        let fixed = if point <= 0 {
            format!("0.{}{}", "0".repeat((-point) as usize), digits)
        } else if (point as usize) >= digits.len() {
            format!("{}{}", digits, "0".repeat(point as usize - digits.len()))
        } else {
            format!("{}.{}", &digits[..point as usize], &digits[point as usize..])
        };
        out.push_str(trim_trailing_zeros(&fixed));
    } else {
        out.push_str(trim_trailing_zeros(mantissa));
        out.push('E');
        out.push(if exp < 0 { '-' } else { '+' });
        out.push_str(&format!("{:02}", exp.abs()));
    }
    out
}

fn trim_trailing_zeros(s: &str) -> &str {
    if !s.contains('.') {
        return s;
    }
    s.trim_end_matches('0').trim_end_matches('.')
}

fn format_value(v: f32) -> String {
    format!("{} ", format_g(v))
}

fn handler_print<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    let src = interp.parse_src;
    loop {
        let c = interp.byte_at(src, interp.parse_ptr);
        if c == 0 || c == b':' {
            break;
        }
        if c == b'"' {
            interp.parse_ptr += 1;
            loop {
                let c = interp.byte_at(src, interp.parse_ptr);
                if c == 0 || c == b'"' {
                    break;
                }
                interp.host.write_char(c as char);
                interp.parse_ptr += 1;
            }
            if interp.byte_at(src, interp.parse_ptr) == b'"' {
                interp.parse_ptr += 1;
            }
        } else if c == Keyword::Tab as u8 {
            let mut pos = interp.parse_ptr;
            let tab = parse::parse_arrayindex(interp, src, &mut pos)?;
            interp.parse_ptr = pos;
            interp.host.write_formatted(&format!("\u{1b}[{}G", tab + 1));
        } else if c == b',' {
            interp.parse_ptr += 1;
            interp.host.write_char('\t');
        } else if c == b';' {
            interp.parse_ptr += 1;
            let mut pos = interp.parse_ptr;
            parse::skip_ws(interp, src, &mut pos);
            interp.parse_ptr = pos;
            let c = interp.byte_at(src, interp.parse_ptr);
            if c == 0 || c == b':' {
                return Ok(());
            }
        } else {
            let mut pos = interp.parse_ptr;
            let val = eval::parse_expression(interp, src, &mut pos)?;
            interp.host.write_formatted(&format_value(val));
            interp.parse_ptr = pos;
        }
        let mut pos = interp.parse_ptr;
        parse::skip_ws(interp, src, &mut pos);
        interp.parse_ptr = pos;
    }
    interp.host.write_str("\n");
    Ok(())
}

fn handler_list<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    let src = interp.parse_src;
    let mut pos = interp.parse_ptr;
    let outcome = parse::parse_uint16(interp, src, &mut pos);
    let line = match outcome {
        ParseOutcome::Found(l) => l,
        ParseOutcome::NotFound => 0,
        ParseOutcome::Err(e) => return Err(e),
    };
    interp.parse_ptr = pos;
    let listing = program::list(&interp.arena, line);
    interp.host.write_str(&listing);
    Ok(())
}

fn handler_clear<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    check_no_trailing(interp)?;
    interp.arena.clear_variables();
    interp.arena.clear_stack();
    Ok(())
}

fn dispatch_keyword<H: Host>(interp: &mut Interp<H>, keyword: u8) -> BasicResult<()> {
    match keywords::keyword_from_byte(keyword) {
        Some(Keyword::End) => handler_end(interp),
        Some(Keyword::For) => handler_for(interp),
        Some(Keyword::Next) => handler_next(interp),
        Some(Keyword::Data) => handler_data(interp),
        Some(Keyword::Input) => handler_input(interp),
        Some(Keyword::Dim) => handler_dim(interp),
        Some(Keyword::Read) => handler_read(interp),
        Some(Keyword::Let) => handler_let(interp),
        Some(Keyword::Goto) => handler_goto(interp),
        Some(Keyword::Run) => handler_run(interp),
        Some(Keyword::If) => handler_if(interp),
        Some(Keyword::Restore) => handler_restore(interp),
        Some(Keyword::Gosub) => handler_gosub(interp),
        Some(Keyword::Return) => handler_return(interp),
        Some(Keyword::Rem) => handler_rem(interp),
        Some(Keyword::Stop) => handler_stop(interp),
        Some(Keyword::Print) => handler_print(interp),
        Some(Keyword::List) => handler_list(interp),
        Some(Keyword::Clear) => handler_clear(interp),
        Some(Keyword::New) => handler_new(interp),
        _ => Err(BasicError::Internal),
    }
}

/// Runs statements starting at `interp.parse_ptr`, advancing across stored
/// program lines as long as `current_line` stays `Some`. A bare letter
/// beginning a statement is rewritten to `LET` without consuming it; `END`
/// and `NEW` terminate silently even mid-line; the statement separator
/// check is skipped right after `IF` so a true condition flows directly
/// into its consequent.
pub fn exec_line<H: Host>(interp: &mut Interp<H>) -> BasicResult<()> {
    loop {
        loop {
            interp.error_in_data = false;
            if interp.host.break_pressed() {
                return Err(BasicError::Stop);
            }
            let src = interp.parse_src;
            let mut c = interp.byte_at(src, interp.parse_ptr);
            if c == 0 {
                break;
            }
            if c > RANGE_END_GENERAL {
                return Err(BasicError::Syntax);
            }
            let keyword;
            if c >= RANGE_BEGIN {
                interp.parse_ptr += 1;
                keyword = c;
            } else {
                keyword = Keyword::Let as u8;
            }

            let mut pos = interp.parse_ptr;
            parse::skip_ws(interp, src, &mut pos);
            interp.parse_ptr = pos;

            debug!(line = ?interp.current_line, keyword, "exec_line dispatch");
            dispatch_keyword(interp, keyword)?;

            if keyword == Keyword::End as u8 || keyword == Keyword::New as u8 {
                return Ok(());
            }

            let if_executed = keyword == Keyword::If as u8;
            let src = interp.parse_src;
            c = interp.byte_at(src, interp.parse_ptr);
            if c != 0 {
                if !if_executed {
                    if c != b':' {
                        return Err(BasicError::Syntax);
                    }
                    interp.parse_ptr += 1;
                }
                let mut pos = interp.parse_ptr;
                parse::skip_ws(interp, src, &mut pos);
                interp.parse_ptr = pos;
            }
        }

        if interp.current_line.is_some() {
            let (new_pos, line) = program::advance_line(&interp.arena, interp.parse_ptr);
            interp.parse_ptr = new_pos;
            interp.current_line = line;
        }
        if interp.current_line.is_none() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::TestHost;

    fn run_direct<H: Host>(interp: &mut Interp<H>, line: &str) -> bool {
        interp.process_line(line)
    }

    #[test]
    fn let_and_print_round_trip() {
        let mut interp = Interp::new(1024, TestHost::default());
        run_direct(&mut interp, "LET A = 2+3*4");
        run_direct(&mut interp, "PRINT A");
        assert!(interp.host.output.contains("14"));
    }

    #[test]
    fn bare_assignment_is_rewritten_to_let() {
        let mut interp = Interp::new(1024, TestHost::default());
        run_direct(&mut interp, "X = 7");
        run_direct(&mut interp, "PRINT X");
        assert!(interp.host.output.contains('7'));
    }

    #[test]
    fn stored_program_loops_and_prints() {
        let mut interp = Interp::new(2048, TestHost::default());
        run_direct(&mut interp, "10 FOR I = 1 TO 3");
        run_direct(&mut interp, "20 PRINT I");
        run_direct(&mut interp, "30 NEXT I");
        run_direct(&mut interp, "RUN");
        assert_eq!(interp.host.output.matches('\n').count(), 3);
        assert!(interp.host.output.contains('1'));
        assert!(interp.host.output.contains('2'));
        assert!(interp.host.output.contains('3'));
    }

    #[test]
    fn gosub_return_round_trips() {
        let mut interp = Interp::new(2048, TestHost::default());
        run_direct(&mut interp, "10 GOSUB 100");
        run_direct(&mut interp, "20 PRINT 99");
        run_direct(&mut interp, "30 END");
        run_direct(&mut interp, "100 PRINT 1");
        run_direct(&mut interp, "110 RETURN");
        run_direct(&mut interp, "RUN");
        assert!(interp.host.output.contains('1'));
        assert!(interp.host.output.contains("99"));
    }

    #[test]
    fn next_without_for_errors() {
        let mut interp = Interp::new(1024, TestHost::default());
        run_direct(&mut interp, "10 NEXT I");
        run_direct(&mut interp, "RUN");
        assert!(interp.host.output.contains("NEXT without FOR"));
    }

    #[test]
    fn division_by_zero_is_reported_with_line() {
        let mut interp = Interp::new(1024, TestHost::default());
        run_direct(&mut interp, "10 PRINT 1/0");
        run_direct(&mut interp, "RUN");
        assert!(interp.host.output.contains("Division by 0"));
        assert!(interp.host.output.contains("in line 10"));
    }

    #[test]
    fn read_data_assigns_values() {
        let mut interp = Interp::new(1024, TestHost::default());
        run_direct(&mut interp, "10 READ A, B");
        run_direct(&mut interp, "20 PRINT A+B");
        run_direct(&mut interp, "30 DATA 5, 7");
        run_direct(&mut interp, "RUN");
        assert!(interp.host.output.contains("12"));
    }

    #[test]
    fn if_then_goto_skips_when_false() {
        let mut interp = Interp::new(1024, TestHost::default());
        run_direct(&mut interp, "10 IF 1 = 2 THEN 100");
        run_direct(&mut interp, "20 PRINT 1");
        run_direct(&mut interp, "30 END");
        run_direct(&mut interp, "100 PRINT 2");
        run_direct(&mut interp, "RUN");
        assert!(interp.host.output.contains('1'));
        assert!(!interp.host.output.contains('2'));
    }

    #[test]
    fn list_round_trips_out_of_order_entry() {
        let mut interp = Interp::new(1024, TestHost::default());
        run_direct(&mut interp, "  3 0 END");
        run_direct(&mut interp, "1 0FOR I=1 TO 20 STEP 4: PRINT A: NEXT I");
        run_direct(&mut interp, " 20 PRINT E");
        run_direct(&mut interp, "LIST");
        assert_eq!(
            interp.host.output,
            "10 FOR I=1 TO 20 STEP 4: PRINT A: NEXT I\n20 PRINT E\n30 END\n"
        );
    }

    #[test]
    fn a_for_pushed_inside_a_gosub_is_discarded_by_return() {
        let mut interp = Interp::new(2048, TestHost::default());
        run_direct(&mut interp, "10 FOR I = 1 TO 2");
        run_direct(&mut interp, "20 GOSUB 100");
        run_direct(&mut interp, "30 PRINT I");
        run_direct(&mut interp, "40 NEXT I");
        run_direct(&mut interp, "50 END");
        run_direct(&mut interp, "100 FOR J = 1 TO 9");
        run_direct(&mut interp, "110 RETURN");
        run_direct(&mut interp, "RUN");
        // The outer loop over I must still run to completion: the inner,
        // never-NEXTed J frame is silently discarded when RETURN fires.
        assert!(interp.host.output.contains('1'));
        assert!(interp.host.output.contains('2'));
    }

    #[test]
    fn gosub_recursion_without_return_exhausts_the_arena() {
        let mut interp = Interp::new(64, TestHost::default());
        run_direct(&mut interp, "10 GOSUB 10");
        run_direct(&mut interp, "RUN");
        assert!(interp.host.output.contains("Out of memory"));
        assert!(interp.host.output.contains("in line 10"));
    }

    #[test]
    fn fractional_result_prints_with_six_significant_digits() {
        assert_eq!(format_g(1.0_f32 / 3.0_f32), "0.333333");
        assert_eq!(format_g(14.0), "14");
        assert_eq!(format_g(100.5), "100.5");
        assert_eq!(format_g(0.0001234), "0.0001234");
        assert_eq!(format_g(0.00001234), "1.234E-05");
        assert_eq!(format_g(1234567.0), "1.23457E+06");
    }

    #[test]
    fn tab_with_negative_argument_is_a_parameter_error() {
        let mut interp = Interp::new(1024, TestHost::default());
        run_direct(&mut interp, "10 PRINT TAB(-1)\"x\"");
        run_direct(&mut interp, "RUN");
        assert!(interp.host.output.contains("Parameter"));
    }

    #[test]
    fn tab_emits_ansi_cursor_position() {
        let mut interp = Interp::new(1024, TestHost::default());
        run_direct(&mut interp, "10 PRINT TAB(5)\"HI\"");
        run_direct(&mut interp, "RUN");
        assert_eq!(interp.host.output, "\u{1b}[6GHI\n");
    }

    #[test]
    fn huge_literal_overflows_to_a_reported_error() {
        let mut interp = Interp::new(1024, TestHost::default());
        run_direct(&mut interp, "10 PRINT 1e39");
        run_direct(&mut interp, "RUN");
        assert!(interp.host.output.contains("Overflow"));
    }

    #[test]
    fn dim_with_no_room_fails_out_of_memory() {
        let mut interp = Interp::new(32, TestHost::default());
        run_direct(&mut interp, "10 DIM E(32767)");
        run_direct(&mut interp, "RUN");
        assert!(interp.host.output.contains("Out of memory"));
    }
}
