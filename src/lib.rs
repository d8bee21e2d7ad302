//! Component G: the driver. Ties the tokenizer, symbol table, macro
//! expander, expression evaluator, directive engine, and include resolver
//! together into the public `Preprocessor` surface.

mod directive;
mod error;
mod eval;
mod expander;
mod include;
mod symbol_table;
mod token;

use log::{debug, warn};

pub use error::{PreprocessorError, PreprocessorErrorKind, Result};
pub use eval::Value;
pub use include::IncludeKind;
pub use token::Token;

use directive::{classify_line, ConditionalStack, Directive, LineKind};
use include::IncludeResolver;
use symbol_table::SymbolTable;

/// The value an `evaluate()` call resolves to: either the constant
/// expression's integer, or — when the expansion reduces to string data —
/// the unquoted string (spec.md §4.C edge case).
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    Int(i64),
    Str(String),
}

impl From<Value> for EvalResult {
    fn from(v: Value) -> Self {
        match v {
            Value::Int(i) => EvalResult::Int(i),
            Value::Str(s) => EvalResult::Str(s),
        }
    }
}

impl EvalResult {
    fn truthy(&self) -> bool {
        match self {
            EvalResult::Int(i) => *i != 0,
            EvalResult::Str(s) => !s.is_empty(),
        }
    }
}

/// A preprocessor core instance. Owns a symbol table, an include resolver,
/// an output source buffer, and the configuration flags from spec.md §4.G.
/// Nothing here is shared across instances — construct one per job.
pub struct Preprocessor {
    symbols: SymbolTable,
    includes: IncludeResolver,
    source: String,
    /// When true, a missing include file is skipped rather than an error.
    pub ignore_missing_includes: bool,
    pub max_expansion_depth: usize,
    pub max_include_depth: usize,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Preprocessor {
            symbols: SymbolTable::new(),
            includes: IncludeResolver::new(),
            source: String::new(),
            ignore_missing_includes: false,
            max_expansion_depth: expander::DEFAULT_MAX_EXPANSION_DEPTH,
            max_include_depth: 200,
        }
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs or replaces a macro. `params = None` makes it object-like;
    /// `Some(params)` (possibly empty) makes it function-like.
    pub fn define(&mut self, name: impl Into<String>, body: impl Into<String>, params: Option<Vec<String>>) {
        let name = name.into();
        debug!("define {}", name);
        self.symbols.define(name, body, params);
    }

    pub fn undefine(&mut self, name: &str) {
        self.symbols.undefine(name);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.symbols.is_defined(name)
    }

    pub fn macros(&self) -> impl Iterator<Item = &str> {
        self.symbols.names()
    }

    pub fn add_include_path(&mut self, dir: impl Into<std::path::PathBuf>) {
        self.includes.add_search_path(dir);
    }

    /// Returns the macro-expanded text of `text`, without touching the
    /// source buffer.
    pub fn expand(&self, text: &str) -> Result<String> {
        expander::expand(text, &self.symbols, self.max_expansion_depth)
    }

    /// Expands `text` then evaluates it as a constant expression, or — if
    /// the expansion is a single bare string literal — returns its unquoted
    /// contents (spec.md §4.C).
    pub fn evaluate(&self, text: &str) -> Result<EvalResult> {
        let expanded = expander::expand_for_condition(text, &self.symbols, self.max_expansion_depth)?;
        let tokens = token::Tokenizer::tokenize(&expanded)?;
        let value = eval::evaluate_tokens(&tokens, &self.symbols)?;
        Ok(value.into())
    }

    /// The accumulated expanded output of every `include()` call so far.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Processes one unit of source. If `text` is `None`, `path` is
    /// resolved via the configured search-path list; if `Some`, `path` is
    /// used only as a label for cycle detection and diagnostics, and `text`
    /// is processed directly. Expanded non-directive lines are appended to
    /// the source buffer.
    pub fn include(&mut self, path: &str, text: Option<&str>) -> Result<()> {
        let resolved = match text {
            Some(t) => Some(t.to_string()),
            None => match self.includes.resolve(path) {
                Some(contents) => Some(contents),
                None => {
                    if self.ignore_missing_includes {
                        warn!("include not found, skipping: {}", path);
                        None
                    } else {
                        return Err(PreprocessorError::include(format!(
                            "include file not found: {}",
                            path
                        )));
                    }
                }
            },
        };
        let contents = match resolved {
            Some(c) => c,
            None => return Ok(()),
        };

        self.includes.enter(path)?;
        let result = self.process_unit(path, &contents);
        self.includes.leave(path);
        result
    }

    /// Splits `contents` into logical lines, classifies each as directive
    /// or source, and interprets directives while appending expanded
    /// source lines to the buffer.
    fn process_unit(&mut self, label: &str, contents: &str) -> Result<()> {
        let joined = splice_backslash_newlines(contents);
        let mut stack = ConditionalStack::new();
        let line_count = joined.lines().count() as u32;

        for (line_no, raw_line) in joined.lines().enumerate() {
            let line_no = line_no as u32 + 1;
            let kind = classify_line(raw_line)
                .map_err(|e| e.with_location(label.to_string(), line_no))?;
            match kind {
                LineKind::Source(text) => {
                    if stack.is_active() {
                        let expanded = self
                            .expand(&text)
                            .map_err(|e| e.with_location(label.to_string(), line_no))?;
                        self.source.push_str(&expanded);
                        self.source.push('\n');
                    }
                }
                LineKind::Directive(directive) => {
                    self.apply_directive(label, line_no, directive, &mut stack)?;
                }
            }
        }

        stack
            .finish()
            .map_err(|e| e.with_location(label.to_string(), line_count))?;
        Ok(())
    }

    fn apply_directive(
        &mut self,
        label: &str,
        line_no: u32,
        directive: Directive,
        stack: &mut ConditionalStack,
    ) -> Result<()> {
        let at = |e: PreprocessorError| e.with_location(label.to_string(), line_no);

        match directive {
            Directive::If(expr) => {
                let cond = stack.is_active() && self.evaluate(&expr).map_err(at)?.truthy();
                stack.push_if(cond);
            }
            Directive::Ifdef(name) => {
                let cond = stack.is_active() && self.symbols.is_defined(&name);
                stack.push_if(cond);
            }
            Directive::Ifndef(name) => {
                let cond = stack.is_active() && !self.symbols.is_defined(&name);
                stack.push_if(cond);
            }
            Directive::Elif(expr) => {
                let cond = stack.should_evaluate_branch().map_err(at)?
                    && self.evaluate(&expr).map_err(at)?.truthy();
                stack.elif(cond).map_err(at)?;
            }
            Directive::Else => {
                stack.else_branch().map_err(at)?;
            }
            Directive::Endif => {
                stack.endif().map_err(at)?;
            }
            Directive::Define(target) if stack.is_active() => {
                self.symbols.define(target.name, target.body, target.params);
            }
            Directive::Undef(name) if stack.is_active() => {
                self.symbols.undefine(&name);
            }
            Directive::Include { path, .. } if stack.is_active() => {
                self.include(&path, None).map_err(at)?;
            }
            Directive::Define(_) | Directive::Undef(_) | Directive::Include { .. } => {
                // Suppressed by an inactive conditional branch.
            }
            Directive::Unknown => {}
        }
        Ok(())
    }
}

/// Joins backslash-newline (and backslash-CRLF) pairs across the whole unit
/// before line splitting, so a directive or expression spanning multiple
/// physical lines is seen as one logical line.
fn splice_backslash_newlines(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' {
            if chars.get(i + 1) == Some(&'\n') {
                i += 2;
                continue;
            }
            if chars.get(i + 1) == Some(&'\r') && chars.get(i + 2) == Some(&'\n') {
                i += 3;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}
