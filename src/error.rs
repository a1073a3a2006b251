//! Error types for template compilation

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },
}

impl ParseError {
    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let mut buf = Vec::new();
        match self {
            ParseError::Syntax {
                span,
                message,
                expected,
            } => {
                let expected_str = if expected.is_empty() {
                    String::new()
                } else {
                    format!("\nExpected: {}", expected.join(", "))
                };

                let written = Report::build(ReportKind::Error, filename, span.start)
                    .with_message(message)
                    .with_label(
                        Label::new((filename, span.clone()))
                            .with_message(format!("{}{}", message, expected_str))
                            .with_color(Color::Red),
                    )
                    .finish()
                    .write((filename, Source::from(source)), &mut buf);
                if written.is_err() {
                    return self.to_string();
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// All syntax errors produced by one compilation attempt
#[derive(Error, Debug, Clone, PartialEq)]
#[error("template compilation failed: {}", format_parse_errors(.errors))]
pub struct CompileError {
    pub errors: Vec<ParseError>,
}

impl From<Vec<ParseError>> for CompileError {
    fn from(errors: Vec<ParseError>) -> Self {
        CompileError { errors }
    }
}

impl CompileError {
    /// Format every error with source context
    pub fn format(&self, source: &str, filename: &str) -> String {
        self.errors
            .iter()
            .map(|e| e.format(source, filename))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn format_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl<'a> From<chumsky::error::Rich<'a, crate::parser::lexer::Token>> for ParseError {
    fn from(err: chumsky::error::Rich<'a, crate::parser::lexer::Token>) -> Self {
        use chumsky::error::RichReason;

        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => match found {
                Some(tok) => format!("Unexpected {}", format_token(tok)),
                None => "Unexpected end of input".to_string(),
            },
            RichReason::Custom(msg) => msg.to_string(),
        };

        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                chumsky::error::RichPattern::Token(tok) => Some(format_token(tok)),
                chumsky::error::RichPattern::Label(label) => Some(label.to_string()),
                chumsky::error::RichPattern::EndOfInput => Some("end of input".to_string()),
                chumsky::error::RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
                chumsky::error::RichPattern::Any => Some("any token".to_string()),
                chumsky::error::RichPattern::SomethingElse => None,
            })
            .collect();

        ParseError::Syntax {
            span: err.span().into_range(),
            message,
            expected,
        }
    }
}

/// Format a token for human-readable error messages
fn format_token(tok: &crate::parser::lexer::Token) -> String {
    use crate::parser::lexer::Token;
    match tok {
        Token::SectionOpen(name) => format!("section '{{{{#{}}}}}'", name),
        Token::InvertedOpen(name) => format!("inverted section '{{{{^{}}}}}'", name),
        Token::SectionClose(name) => format!("closing tag '{{{{/{}}}}}'", name),
        Token::Partial(name) => format!("partial '{{{{> {}}}}}'", name),
        Token::Raw(name) => format!("tag '{{{{{{{}}}}}}}'", name),
        Token::Variable(name) => format!("tag '{{{{{}}}}}'", name),
        Token::MalformedTag => "unclosed or malformed tag".to_string(),
        Token::Text(_) => "text".to_string(),
        Token::Comment => "comment".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::Token;

    #[test]
    fn test_format_token_shows_tag() {
        assert_eq!(
            format_token(&Token::SectionClose("items".to_string())),
            "closing tag '{{/items}}'"
        );
        assert_eq!(
            format_token(&Token::Variable("name".to_string())),
            "tag '{{name}}'"
        );
    }

    #[test]
    fn test_format_includes_message() {
        let err = ParseError::Syntax {
            span: 6..8,
            message: "Unexpected unclosed or malformed tag".to_string(),
            expected: vec![],
        };
        let report = err.format("hello {{", "greeting.mustache");
        assert!(report.contains("Unexpected unclosed or malformed tag"));
    }

    #[test]
    fn test_compile_error_display_joins() {
        let err = CompileError::from(vec![
            ParseError::Syntax {
                span: 0..1,
                message: "first".to_string(),
                expected: vec![],
            },
            ParseError::Syntax {
                span: 2..3,
                message: "second".to_string(),
                expected: vec![],
            },
        ]);
        let text = err.to_string();
        assert!(text.starts_with("template compilation failed:"));
        assert!(text.contains("first"));
        assert!(text.contains("second"));
    }
}
