//! A line-numbered BASIC interpreter for memory-constrained hosts: a
//! single contiguous arena, an in-place tokenizer, a recursion-free
//! expression evaluator, and a statement dispatcher covering the classic
//! GOTO/GOSUB/FOR-NEXT/IF-THEN/READ-DATA core.

pub mod arena;
pub mod dispatch;
pub mod error;
pub mod eval;
pub mod host;
pub mod interp;
pub mod keywords;
pub mod parse;
pub mod program;
pub mod stack;
pub mod variables;

pub use error::{BasicError, BasicResult};
pub use host::{Host, StdioHost, TestHost};
pub use interp::Interp;

#[cfg(test)]
mod tests {
    use super::*;

    fn run(lines: &[&str]) -> TestHost {
        let mut interp = Interp::new(4096, TestHost::default());
        for line in lines {
            interp.process_line(line);
        }
        interp.host
    }

    #[test]
    fn error_display_matches_the_bare_variant_text() {
        assert_eq!(BasicError::Syntax.to_string(), "Syntax");
        assert_eq!(BasicError::DivisionByZero.to_string(), "Division by 0");
        assert_eq!(BasicError::Stop.to_string(), "STOP");
    }

    #[test]
    fn error_report_appends_error_and_line_suffix() {
        assert_eq!(BasicError::Syntax.report(Some(10)), "Syntax error in line 10");
        assert_eq!(BasicError::Syntax.report(None), "Syntax error");
        // STOP is the one variant that never gets an "error" suffix.
        assert_eq!(BasicError::Stop.report(Some(30)), "STOP in line 30");
    }

    /// Dispatch output must not depend on whether a `tracing` subscriber is
    /// installed - logging is observational only, never load-bearing.
    #[test]
    fn dispatcher_output_is_identical_with_or_without_a_subscriber() {
        let program = [
            "10 FOR I = 1 TO 3",
            "20 PRINT I",
            "30 NEXT I",
            "40 END",
            "RUN",
        ];
        let without_subscriber = run(&program).output;

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();
        let with_subscriber = tracing::subscriber::with_default(subscriber, || run(&program).output);

        assert_eq!(without_subscriber, with_subscriber);
    }

    #[test]
    fn end_to_end_program_runs_to_completion() {
        let host = run(&[
            "10 LET S = 0",
            "20 FOR I = 1 TO 5",
            "30 LET S = S + I",
            "40 NEXT I",
            "50 PRINT S",
            "RUN",
        ]);
        assert!(host.output.contains("15"));
    }
}
