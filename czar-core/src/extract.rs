//! Declaration-shape recognizer for top-level function definitions.
//!
//! Works on tokens rather than lines, so signatures split over several
//! lines are recognized as long as they stay within
//! [`MAX_SIGNATURE_TOKENS`].

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::lexer::{Token, TokenKind, lex};
use crate::unit::Declaration;

/// Longest signature, in tokens, the recognizer will consider.
pub const MAX_SIGNATURE_TOKENS: usize = 64;

const NOT_A_NAME: &[&str] = &[
    "if", "else", "while", "for", "do", "switch", "return", "sizeof", "case",
];

/// Extract every exported function definition from transpiled C text, in
/// source order.
pub fn extract_declarations(source: &str) -> Vec<Declaration> {
    let tokens = lex(source);
    let mut declarations = Vec::new();
    let mut names = HashSet::new();
    let mut depth = 0usize;
    let mut statement_start = 0;

    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LBrace => {
                if depth == 0 {
                    if let Some(decl) = recognize(source, &tokens[statement_start..index]) {
                        if names.insert(decl.name.clone()) {
                            debug!(name = %decl.name, line = decl.line, "found declaration");
                            declarations.push(decl);
                        } else {
                            warn!(name = %decl.name, line = decl.line, "duplicate definition ignored");
                        }
                    }
                }
                depth += 1;
            }
            TokenKind::RBrace => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    statement_start = index + 1;
                }
            }
            TokenKind::Semi if depth == 0 => statement_start = index + 1,
            _ => {}
        }
    }

    declarations
}

/// Match `<type tokens> <name> ( <params> )` immediately ahead of a `{`.
fn recognize(source: &str, signature: &[Token]) -> Option<Declaration> {
    if signature.len() < 4 || signature.len() > MAX_SIGNATURE_TOKENS {
        return None;
    }
    let (last, head) = signature.split_last()?;
    if last.kind != TokenKind::RParen {
        return None;
    }

    let open = matching_open_paren(head)?;
    let (name_token, type_tokens) = head[..open].split_last()?;
    let name = name_token.text(source);
    if name_token.kind != TokenKind::Ident || NOT_A_NAME.contains(&name) {
        return None;
    }
    if type_tokens.is_empty()
        || !type_tokens
            .iter()
            .all(|t| matches!(t.kind, TokenKind::Ident | TokenKind::Star))
    {
        return None;
    }
    if type_tokens
        .iter()
        .any(|t| matches!(t.text(source), "static" | "typedef"))
    {
        return None;
    }

    let params = join_tokens(source, &head[open + 1..]);
    Some(Declaration {
        name: name.to_string(),
        return_type: join_tokens(source, type_tokens),
        params: if params.is_empty() {
            "void".to_string()
        } else {
            params
        },
        line: name_token.line,
    })
}

/// Index of the `(` balancing a `)` that directly follows `tokens`.
fn matching_open_paren(tokens: &[Token]) -> Option<usize> {
    let mut depth = 1usize;
    for (index, token) in tokens.iter().enumerate().rev() {
        match token.kind {
            TokenKind::RParen => depth += 1,
            TokenKind::LParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            TokenKind::LBrace | TokenKind::RBrace | TokenKind::Semi => return None,
            _ => {}
        }
    }
    None
}

/// Rebuild token text with canonical spacing, dropping comments and
/// line breaks.
fn join_tokens(source: &str, tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut previous: Option<TokenKind> = None;
    for token in tokens {
        if let Some(prev) = previous {
            if needs_space(prev, token.kind) {
                out.push(' ');
            }
        }
        out.push_str(token.text(source));
        previous = Some(token.kind);
    }
    out
}

fn needs_space(prev: TokenKind, current: TokenKind) -> bool {
    use TokenKind::*;
    !matches!(prev, Star | LParen | LBracket)
        && !matches!(current, Comma | RParen | RBracket | LBracket)
        && !(prev == RParen && current == LParen)
}
