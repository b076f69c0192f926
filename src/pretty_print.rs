use crate::{LexerError, ParseError};
use ariadne::{Label, Report, ReportKind, Source};
use std::io;

impl LexerError {
    pub fn report(&self, source_name: &str, input: &str) -> io::Result<()> {
        Report::build(ReportKind::Error, (source_name, self.span.to_range()))
            .with_message("Lexer Error")
            .with_label(
                Label::new((source_name, self.span.to_range())).with_message(self.error.to_string()),
            )
            .finish()
            .eprint((source_name, Source::from(input)))
    }
}

impl ParseError {
    /// Prints this diagnostic to stderr, pointing at the offending span of
    /// `input`.
    pub fn report(&self, source_name: &str, input: &str) -> io::Result<()> {
        let span = self.span().to_range();
        let report = match self {
            ParseError::UnexpectedToken { found, expected } => {
                Report::build(ReportKind::Error, (source_name, span.clone()))
                    .with_message(format!("Unexpected token: {}", found.kind.name()))
                    .with_label(
                        Label::new((source_name, span)).with_message(format!("Expected {expected}")),
                    )
            }
            ParseError::NoPrefixRule { found } => {
                Report::build(ReportKind::Error, (source_name, span.clone()))
                    .with_message(self.to_string())
                    .with_label(Label::new((source_name, span)).with_message(format!(
                        "`{}` cannot start an expression",
                        found.kind
                    )))
            }
            ParseError::Lexer(lex_err) => return lex_err.report(source_name, input),
        };
        report.finish().eprint((source_name, Source::from(input)))
    }
}

#[cfg(test)]
mod tests {
    use crate::parse_str;

    #[test]
    fn test_reports_each_diagnostic_kind() {
        for input in ["x = 1 2;", " = 5;", "x = \"open"] {
            let (_, errors) = parse_str(input);
            assert!(!errors.is_empty(), "Input: '{}'", input);
            for error in &errors {
                assert!(error.report("test", input).is_ok());
            }
        }
    }

    #[test]
    fn test_reports_at_end_of_input() {
        let input = "f(1, 2";
        let (_, errors) = parse_str(input);
        assert_eq!(errors[0].span().to_range(), input.len()..input.len());
        assert!(errors[0].report("test", input).is_ok());
    }
}
