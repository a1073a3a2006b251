//! Lexer for Mustache-style template source using logos
//!
//! Templates are text-significant, so nothing is skipped except comments.
//! Each `{{...}}` tag lexes as a single token carrying its trimmed body.

use logos::{Lexer, Logos};

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token {
    // Tags (the sigil after `{{` decides the kind; whitespace may precede it)
    #[regex(r"\{\{[ \t]*#[^}]*\}\}", sigil_body)]
    SectionOpen(String),
    #[regex(r"\{\{[ \t]*\^[^}]*\}\}", sigil_body)]
    InvertedOpen(String),
    #[regex(r"\{\{[ \t]*/[^}]*\}\}", sigil_body)]
    SectionClose(String),
    #[regex(r"\{\{[ \t]*>[^}]*\}\}", sigil_body)]
    Partial(String),
    #[regex(r"\{\{\{[^}]*\}\}\}|\{\{[ \t]*&[^}]*\}\}", raw_body)]
    Raw(String),
    #[regex(r"\{\{[ \t]*[^}#^/>&!{ \t][^}]*\}\}", |lex| tag_inner(lex).trim().to_string())]
    Variable(String),

    // A `{{` that does not start a well-formed tag; never produced by a
    // valid template, so the parser rejects it
    #[token("{{")]
    MalformedTag,

    // Literal text, including lone braces
    #[regex(r"[^{]+|\{", |lex| lex.slice().to_string())]
    Text(String),

    // Comments (skip)
    #[regex(r"\{\{[ \t]*![^}]*\}\}", logos::skip)]
    Comment,
}

fn tag_inner<'s>(lex: &Lexer<'s, Token>) -> &'s str {
    let s = lex.slice();
    &s[2..s.len() - 2]
}

fn sigil_body(lex: &mut Lexer<Token>) -> String {
    // The sigil is a single ASCII byte
    tag_inner(lex).trim_start()[1..].trim().to_string()
}

fn raw_body(lex: &mut Lexer<Token>) -> String {
    let s = lex.slice();
    if s.starts_with("{{{") {
        s[3..s.len() - 3].trim().to_string()
    } else {
        sigil_body(lex)
    }
}

/// Lex input string into tokens with spans
///
/// Input logos cannot match (an unterminated `{{name` for instance) becomes
/// [`Token::MalformedTag`] so the parser reports it instead of losing text.
pub fn lex(input: &str) -> impl Iterator<Item = (Token, Span)> + '_ {
    Token::lexer(input)
        .spanned()
        .map(|(tok, span)| (tok.unwrap_or(Token::MalformedTag), span))
}
