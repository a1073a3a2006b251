//! Parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::parser::ast::*;
use crate::parser::lexer::Token;

/// Parse template source into a list of nodes
pub fn parse(input: &str) -> Result<Vec<Spanned<Node>>, Vec<crate::ParseError>> {
    let len = input.len();

    // Create a logos lexer and convert to token stream
    let token_iter = crate::parser::lexer::lex(input).map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    template_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn template_parser<'a, I>(
) -> impl Parser<'a, I, Vec<Spanned<Node>>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let node = recursive(|node| {
        let text = select! {
            Token::Text(s) => Node::Text(s),
        };

        let variable = select! {
            Token::Variable(name) => Node::Variable { path: KeyPath::parse(&name), escape: true },
            Token::Raw(name) => Node::Variable { path: KeyPath::parse(&name), escape: false },
        };

        let partial = select! {
            Token::Partial(name) => Node::Partial { name },
        };

        let open = select! {
            Token::SectionOpen(name) => (name, false),
            Token::InvertedOpen(name) => (name, true),
        };

        let close = select! {
            Token::SectionClose(name) => name,
        };

        // Sections nest; the closing tag must name the section it closes
        let section = open
            .then(node.clone().repeated().collect::<Vec<_>>())
            .then(close)
            .try_map(|(((name, inverted), children), closing), span: SimpleSpan| {
                if name == closing {
                    Ok(Node::Section {
                        path: KeyPath::parse(&name),
                        inverted,
                        children,
                    })
                } else {
                    Err(Rich::custom(
                        span,
                        format!("section '{}' closed by '{}'", name, closing),
                    ))
                }
            });

        choice((text, variable, partial, section))
            .map_with(|n, e| Spanned::new(n, span_range(&e.span())))
            .boxed()
    });

    node.repeated().collect().then_ignore(end())
}
