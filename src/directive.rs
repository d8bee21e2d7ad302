//! Component E: directive line classification and the conditional-inclusion
//! state machine. Parsing here is line-oriented and deliberately knows
//! nothing about the symbol table, the include resolver, or expansion —
//! the driver in `lib.rs` owns wiring those together.

use log::trace;

use crate::error::{PreprocessorError, Result};
use crate::include::IncludeKind;

/// One level of `#if`/`#ifdef`/`#ifndef` bookkeeping (§3 ConditionalFrame).
#[derive(Debug, Clone, Copy)]
pub struct ConditionalFrame {
    pub active: bool,
    pub any_branch_taken: bool,
    pub parent_active: bool,
}

/// The stack of nested conditional frames maintained by the driver as it
/// walks logical lines. Structure is tracked even while inactive, so
/// nesting stays correct inside a suppressed branch.
#[derive(Debug, Default)]
pub struct ConditionalStack {
    frames: Vec<ConditionalFrame>,
}

impl ConditionalStack {
    pub fn new() -> Self {
        ConditionalStack { frames: Vec::new() }
    }

    /// Whether source lines and directives should currently take effect —
    /// false if any enclosing frame (including the top) is inactive.
    pub fn is_active(&self) -> bool {
        self.frames.last().map_or(true, |f| f.active)
    }

    fn parent_active(&self) -> bool {
        self.is_active()
    }

    /// Whether an `#elif` expression at the current nesting level is even
    /// worth evaluating: false once a prior branch in this frame already
    /// fired, or while an enclosing frame is inactive — matching spec.md
    /// §4.E's "if any branch already taken set inactive; else evaluate
    /// expr" (the expression is never reached in the taken-already case).
    pub fn should_evaluate_branch(&self) -> Result<bool> {
        let frame = self
            .frames
            .last()
            .ok_or_else(|| PreprocessorError::conditional("directive without matching #if"))?;
        Ok(!frame.any_branch_taken && frame.parent_active)
    }

    pub fn push_if(&mut self, cond: bool) {
        let parent_active = self.parent_active();
        let active = parent_active && cond;
        trace!("#if: pushing frame (active={})", active);
        self.frames.push(ConditionalFrame {
            active,
            any_branch_taken: active,
            parent_active,
        });
    }

    pub fn elif(&mut self, cond: bool) -> Result<()> {
        let frame = self.top_mut()?;
        if frame.any_branch_taken {
            frame.active = false;
        } else {
            frame.active = frame.parent_active && cond;
            frame.any_branch_taken = frame.active;
        }
        trace!("#elif: frame now active={}", frame.active);
        Ok(())
    }

    pub fn else_branch(&mut self) -> Result<()> {
        let frame = self.top_mut()?;
        if frame.any_branch_taken {
            frame.active = false;
        } else {
            frame.active = frame.parent_active;
            frame.any_branch_taken = frame.active;
        }
        trace!("#else: frame now active={}", frame.active);
        Ok(())
    }

    pub fn endif(&mut self) -> Result<()> {
        if self.frames.pop().is_none() {
            return Err(PreprocessorError::conditional("#endif without matching #if"));
        }
        trace!("#endif: popped frame");
        Ok(())
    }

    /// Called at end-of-input; fails if a frame was left open.
    pub fn finish(&self) -> Result<()> {
        if self.frames.is_empty() {
            Ok(())
        } else {
            Err(PreprocessorError::conditional(
                "unterminated conditional at end of input",
            ))
        }
    }

    fn top_mut(&mut self) -> Result<&mut ConditionalFrame> {
        self.frames
            .last_mut()
            .ok_or_else(|| PreprocessorError::conditional("directive without matching #if"))
    }
}

/// A parsed `#define` target: either object-like (no params) or
/// function-like (possibly empty param list).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineTarget {
    pub name: String,
    pub params: Option<Vec<String>>,
    pub body: String,
}

/// One recognised directive, with its payload already parsed out of the
/// directive line's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Define(DefineTarget),
    Undef(String),
    Include { kind: IncludeKind, path: String },
    If(String),
    Ifdef(String),
    Ifndef(String),
    Elif(String),
    Else,
    Endif,
    /// Recognised keyword but not implemented (e.g. `#pragma`, `#error`) —
    /// spec §4.E mandates permissive ignoring of unknown directives.
    Unknown,
}

/// The result of classifying one logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Directive(Directive),
    Source(String),
}

/// Classifies a logical line (backslash-newline already joined) as a
/// directive or source line, per spec §4.E: first non-whitespace char `#`.
pub fn classify_line(line: &str) -> Result<LineKind> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('#') {
        return Ok(LineKind::Source(line.to_string()));
    }
    let rest = trimmed[1..].trim_start();
    let (keyword, tail) = split_keyword(rest);
    let tail = tail.trim();

    let directive = match keyword {
        "define" => Directive::Define(parse_define(tail)?),
        "undef" => Directive::Undef(require_identifier(tail, "#undef")?),
        "include" => {
            let (kind, path) = parse_include(tail)?;
            Directive::Include { kind, path }
        }
        "if" => Directive::If(tail.to_string()),
        "ifdef" => Directive::Ifdef(require_identifier(tail, "#ifdef")?),
        "ifndef" => Directive::Ifndef(require_identifier(tail, "#ifndef")?),
        "elif" => Directive::Elif(tail.to_string()),
        "else" => Directive::Else,
        "endif" => Directive::Endif,
        _ => Directive::Unknown,
    };
    Ok(LineKind::Directive(directive))
}

fn split_keyword(s: &str) -> (&str, &str) {
    let end = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(s.len());
    (&s[..end], &s[end..])
}

fn require_identifier(tail: &str, directive: &str) -> Result<String> {
    let name = tail.split_whitespace().next().ok_or_else(|| {
        PreprocessorError::syntax(format!("{} requires a name", directive))
    })?;
    Ok(name.to_string())
}

/// Parses the text following `#define`. Function-like form requires `(` to
/// touch the name with no intervening space (spec §4.E).
fn parse_define(tail: &str) -> Result<DefineTarget> {
    let name_end = tail
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(tail.len());
    if name_end == 0 {
        return Err(PreprocessorError::syntax("#define requires a macro name"));
    }
    let name = tail[..name_end].to_string();
    let after_name = &tail[name_end..];

    if let Some(rest) = after_name.strip_prefix('(') {
        let close = rest
            .find(')')
            .ok_or_else(|| PreprocessorError::syntax("unclosed parameter list in #define"))?;
        let param_list = &rest[..close];
        let params = if param_list.trim().is_empty() {
            Vec::new()
        } else {
            param_list
                .split(',')
                .map(|p| p.trim().to_string())
                .collect()
        };
        let body = rest[close + 1..].trim().to_string();
        Ok(DefineTarget {
            name,
            params: Some(params),
            body,
        })
    } else {
        let body = after_name.trim().to_string();
        Ok(DefineTarget {
            name,
            params: None,
            body,
        })
    }
}

/// Parses `"path"` or `<path>` following `#include`.
fn parse_include(tail: &str) -> Result<(IncludeKind, String)> {
    let tail = tail.trim();
    if let Some(rest) = tail.strip_prefix('"') {
        let end = rest
            .find('"')
            .ok_or_else(|| PreprocessorError::syntax("unterminated #include path"))?;
        Ok((IncludeKind::User, rest[..end].to_string()))
    } else if let Some(rest) = tail.strip_prefix('<') {
        let end = rest
            .find('>')
            .ok_or_else(|| PreprocessorError::syntax("unterminated #include path"))?;
        Ok((IncludeKind::System, rest[..end].to_string()))
    } else {
        Err(PreprocessorError::syntax(
            "#include requires \"path\" or <path>",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_line_passes_through() {
        assert_eq!(
            classify_line("int a = 1;").unwrap(),
            LineKind::Source("int a = 1;".to_string())
        );
    }

    #[test]
    fn define_object_like() {
        match classify_line("#define PI 314").unwrap() {
            LineKind::Directive(Directive::Define(d)) => {
                assert_eq!(d.name, "PI");
                assert_eq!(d.params, None);
                assert_eq!(d.body, "314");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn define_function_like() {
        match classify_line("#define ADD(a,b) (a+b)").unwrap() {
            LineKind::Directive(Directive::Define(d)) => {
                assert_eq!(d.name, "ADD");
                assert_eq!(d.params, Some(vec!["a".to_string(), "b".to_string()]));
                assert_eq!(d.body, "(a+b)");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn define_function_like_zero_params() {
        match classify_line("#define CALL() 42").unwrap() {
            LineKind::Directive(Directive::Define(d)) => {
                assert_eq!(d.params, Some(vec![]));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn space_before_paren_is_object_like_with_paren_in_body() {
        // "N (" with a space means the parenthesis is part of the body text,
        // not a parameter list — matches spec.md §4.E's "no intervening space" rule.
        match classify_line("#define N (a+b)").unwrap() {
            LineKind::Directive(Directive::Define(d)) => {
                assert_eq!(d.params, None);
                assert_eq!(d.body, "(a+b)");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn include_quoted_and_angled() {
        assert_eq!(
            classify_line("#include \"foo.h\"").unwrap(),
            LineKind::Directive(Directive::Include {
                kind: IncludeKind::User,
                path: "foo.h".to_string(),
            })
        );
        assert_eq!(
            classify_line("#include <foo.h>").unwrap(),
            LineKind::Directive(Directive::Include {
                kind: IncludeKind::System,
                path: "foo.h".to_string(),
            })
        );
    }

    #[test]
    fn unknown_directive_is_permitted() {
        assert_eq!(
            classify_line("#pragma once").unwrap(),
            LineKind::Directive(Directive::Unknown)
        );
    }

    #[test]
    fn conditional_stack_if_else() {
        let mut stack = ConditionalStack::new();
        stack.push_if(false);
        assert!(!stack.is_active());
        stack.else_branch().unwrap();
        assert!(stack.is_active());
        stack.endif().unwrap();
        assert!(stack.is_active());
    }

    #[test]
    fn conditional_stack_elif_short_circuits_after_taken_branch() {
        let mut stack = ConditionalStack::new();
        stack.push_if(true);
        assert!(stack.is_active());
        stack.elif(true).unwrap();
        assert!(!stack.is_active());
        stack.else_branch().unwrap();
        assert!(!stack.is_active());
    }

    #[test]
    fn endif_without_if_is_error() {
        let mut stack = ConditionalStack::new();
        let err = stack.endif().unwrap_err();
        assert_eq!(err.kind, crate::error::PreprocessorErrorKind::Conditional);
    }

    #[test]
    fn unterminated_conditional_fails_finish() {
        let mut stack = ConditionalStack::new();
        stack.push_if(true);
        assert!(stack.finish().is_err());
    }

    #[test]
    fn nested_frame_inactive_when_parent_inactive() {
        let mut stack = ConditionalStack::new();
        stack.push_if(false);
        stack.push_if(true);
        assert!(!stack.is_active());
    }
}
