//! The macro expander: Component D. Walks a token stream left to right,
//! substituting object-like and function-like macro invocations, guarding
//! against self-recursion with a hideset, and pre-expanding function-like
//! macro arguments before substitution.

use std::collections::HashSet;

use log::{trace, warn};

use crate::error::{PreprocessorError, Result};
use crate::symbol_table::{MacroKind, SymbolTable};
use crate::token::{Token, Tokenizer};

/// Default ceiling on recursive macro-expansion depth. Ambient robustness —
/// spec.md does not name a number, only that one must exist (§9 "Recursion").
pub const DEFAULT_MAX_EXPANSION_DEPTH: usize = 200;

/// Fully expands `text` against `symbols`, starting from an empty hideset.
pub fn expand(text: &str, symbols: &SymbolTable, max_depth: usize) -> Result<String> {
    let tokens = Tokenizer::tokenize(text)?;
    let expanded = expand_tokens(&tokens, &HashSet::new(), symbols, 0, max_depth, false)?;
    Ok(tokens_to_text(&expanded))
}

/// Like [`expand`], but the identifier immediately following a `defined`
/// operator is never macro-expanded — used for `#if`/`#elif` conditions and
/// for the driver's `evaluate` operation, both of which feed the expression
/// evaluator afterwards.
pub fn expand_for_condition(text: &str, symbols: &SymbolTable, max_depth: usize) -> Result<String> {
    let tokens = Tokenizer::tokenize(text)?;
    let expanded = expand_tokens(&tokens, &HashSet::new(), symbols, 0, max_depth, true)?;
    Ok(tokens_to_text(&expanded))
}

pub fn tokens_to_text(tokens: &[Token]) -> String {
    tokens.iter().map(Token::text).collect()
}

fn skip_ws(tokens: &[Token], mut i: usize) -> usize {
    while i < tokens.len() && tokens[i].is_whitespace_like() {
        i += 1;
    }
    i
}

/// Expands a token sequence against `symbols`. `hideset` is the set of
/// macro names currently being expanded on this call stack (§3
/// ExpansionContext); an identifier found in it is emitted verbatim rather
/// than re-expanded, which is what makes `#define X X+1` terminate.
pub fn expand_tokens(
    tokens: &[Token],
    hideset: &HashSet<String>,
    symbols: &SymbolTable,
    depth: usize,
    max_depth: usize,
    protect_defined: bool,
) -> Result<Vec<Token>> {
    if depth > max_depth {
        warn!("macro expansion exceeded depth limit of {}", max_depth);
        return Err(PreprocessorError::depth_exceeded(format!(
            "macro expansion exceeded depth limit of {}",
            max_depth
        )));
    }

    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Identifier(name) if protect_defined && name == "defined" => {
                i = copy_defined_operand(tokens, i, &mut out)?;
            }
            Token::Identifier(name) => {
                if hideset.contains(name) {
                    trace!("identifier '{}' suppressed by hideset", name);
                    out.push(Token::Identifier(name.clone()));
                    i += 1;
                    continue;
                }
                match symbols.lookup(name) {
                    None => {
                        trace!("'{}' is not a macro, passing through", name);
                        out.push(Token::Identifier(name.clone()));
                        i += 1;
                    }
                    Some(mac) => match &mac.kind {
                        MacroKind::Object => {
                            trace!("expanding object-like macro '{}'", name);
                            let mut new_hideset = hideset.clone();
                            new_hideset.insert(name.clone());
                            let body_tokens = Tokenizer::tokenize(&mac.body)?;
                            let expanded = expand_tokens(
                                &body_tokens,
                                &new_hideset,
                                symbols,
                                depth + 1,
                                max_depth,
                                protect_defined,
                            )?;
                            out.extend(expanded);
                            i += 1;
                        }
                        MacroKind::Function(params) => {
                            let after_ws = skip_ws(tokens, i + 1);
                            let is_call = matches!(
                                tokens.get(after_ws),
                                Some(Token::Punct(p)) if p == "("
                            );
                            if !is_call {
                                out.push(Token::Identifier(name.clone()));
                                i += 1;
                                continue;
                            }
                            let (args, end_idx) =
                                parse_arguments(tokens, after_ws, params.len())?;
                            trace!(
                                "expanding function-like macro '{}' with {} argument(s)",
                                name,
                                args.len()
                            );
                            let mut expanded_args = Vec::with_capacity(args.len());
                            for arg in &args {
                                let arg_tokens = Tokenizer::tokenize(arg)?;
                                let expanded = expand_tokens(
                                    &arg_tokens,
                                    hideset,
                                    symbols,
                                    depth + 1,
                                    max_depth,
                                    protect_defined,
                                )?;
                                expanded_args.push(tokens_to_text(&expanded));
                            }
                            let substituted =
                                substitute_parameters(&mac.body, params, &expanded_args)?;
                            let mut new_hideset = hideset.clone();
                            new_hideset.insert(name.clone());
                            let body_tokens = Tokenizer::tokenize(&substituted)?;
                            let expanded = expand_tokens(
                                &body_tokens,
                                &new_hideset,
                                symbols,
                                depth + 1,
                                max_depth,
                                protect_defined,
                            )?;
                            out.extend(expanded);
                            i = end_idx + 1;
                        }
                    },
                }
            }
            other => {
                out.push(other.clone());
                i += 1;
            }
        }
    }
    Ok(out)
}

/// Copies `defined` and its operand verbatim (whether written `defined(X)`
/// or `defined X`), never macro-expanding the name. Returns the index just
/// past what was copied.
fn copy_defined_operand(tokens: &[Token], i: usize, out: &mut Vec<Token>) -> Result<usize> {
    out.push(tokens[i].clone());
    let mut j = i + 1;
    while j < tokens.len() && tokens[j].is_whitespace_like() {
        out.push(tokens[j].clone());
        j += 1;
    }
    match tokens.get(j) {
        Some(Token::Punct(p)) if p == "(" => {
            out.push(tokens[j].clone());
            j += 1;
            while j < tokens.len() && tokens[j].is_whitespace_like() {
                out.push(tokens[j].clone());
                j += 1;
            }
            match tokens.get(j) {
                Some(Token::Identifier(_)) => {
                    out.push(tokens[j].clone());
                    j += 1;
                }
                _ => return Err(PreprocessorError::syntax("expected identifier after 'defined('")),
            }
            while j < tokens.len() && tokens[j].is_whitespace_like() {
                out.push(tokens[j].clone());
                j += 1;
            }
            match tokens.get(j) {
                Some(Token::Punct(p)) if p == ")" => {
                    out.push(tokens[j].clone());
                    j += 1;
                }
                _ => return Err(PreprocessorError::syntax("expected ')' after 'defined(X'")),
            }
        }
        Some(Token::Identifier(_)) => {
            out.push(tokens[j].clone());
            j += 1;
        }
        _ => return Err(PreprocessorError::syntax("expected identifier after 'defined'")),
    }
    Ok(j)
}

/// Parses the argument list of a function-like macro call whose opening
/// `(` sits at `tokens[open_idx]`. Arguments are split at depth-zero
/// commas; `(`/`[` increment depth and `)`/`]` decrement it, matching
/// spec's bracket-agnostic depth count. Returns the trimmed argument texts
/// and the index of the closing `)`.
fn parse_arguments(
    tokens: &[Token],
    open_idx: usize,
    expected_params: usize,
) -> Result<(Vec<String>, usize)> {
    debug_assert!(matches!(&tokens[open_idx], Token::Punct(p) if p == "("));

    let mut depth = 1i32;
    let mut i = open_idx + 1;
    let mut current = String::new();
    let mut args = Vec::new();
    let mut close_idx = None;

    while i < tokens.len() {
        match &tokens[i] {
            Token::Punct(p) if p == "(" || p == "[" => {
                depth += 1;
                current.push_str(&tokens[i].text());
            }
            Token::Punct(p) if p == ")" || p == "]" => {
                depth -= 1;
                if depth == 0 && p == ")" {
                    close_idx = Some(i);
                    break;
                }
                current.push_str(&tokens[i].text());
            }
            Token::Punct(p) if p == "," && depth == 1 => {
                args.push(current.trim().to_string());
                current = String::new();
            }
            other => current.push_str(&other.text()),
        }
        i += 1;
    }

    let close_idx = close_idx
        .ok_or_else(|| PreprocessorError::syntax("unclosed macro argument list"))?;
    args.push(current.trim().to_string());

    if expected_params == 0 && args.len() == 1 && args[0].is_empty() {
        args.clear();
    }

    if args.len() != expected_params {
        return Err(PreprocessorError::arity(format!(
            "expected {} argument(s), got {}",
            expected_params,
            args.len()
        )));
    }

    Ok((args, close_idx))
}

/// Substitutes parameter occurrences in `body` with `args` by identifier
/// match only — string-literal contents in the body are copied verbatim,
/// so a parameter name spelled inside a string is never replaced.
fn substitute_parameters(body: &str, params: &[String], args: &[String]) -> Result<String> {
    let tokens = Tokenizer::tokenize(body)?;
    let mut out = String::new();
    for token in &tokens {
        match token {
            Token::Identifier(name) => match params.iter().position(|p| p == name) {
                Some(idx) => out.push_str(&args[idx]),
                None => out.push_str(name),
            },
            other => out.push_str(&other.text()),
        }
    }
    Ok(out)
}
