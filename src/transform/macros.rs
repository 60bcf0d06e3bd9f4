// src/transform/macros.rs
//! Macro definition extraction and expansion.
//!
//! Supported declarations: `\newcommand`, `\renewcommand`, `\providecommand`
//! (starred or not), `\DeclareMathOperator` (starred or not), and `\def` /
//! `\gdef` with a plain `#1#2...` parameter text. Anything fancier is left
//! unexpanded.
//!
//! Expansion rescans every substituted body before moving on, so nested
//! invocations in arguments and bodies are fully resolved. A body ending in a
//! macro that takes arguments reads them from the text after the call, and
//! declarations that only appear in substituted text take effect from there
//! on. Two limits keep
//! pathological input bounded: a nesting depth per occurrence and a total
//! number of substitutions per document.

use std::collections::{HashMap, HashSet};

use crate::transform::comments::dead_regions;
use crate::utils::scan::{balanced_group, range_containing, read_control_word, skip_control_symbol, skip_whitespace};
use crate::utils::Warning;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    NewCommand,
    RenewCommand,
    ProvideCommand,
    MathOperator,
    Def,
}

impl DeclarationKind {
    fn from_keyword(name: &str) -> Option<Self> {
        match name {
            "newcommand" => Some(Self::NewCommand),
            "renewcommand" => Some(Self::RenewCommand),
            "providecommand" => Some(Self::ProvideCommand),
            "DeclareMathOperator" => Some(Self::MathOperator),
            "def" | "gdef" => Some(Self::Def),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDefinition {
    pub name: String,
    /// Total argument count, including the optional one.
    pub arity: usize,
    /// Default for the optional leading `[...]` argument, when declared.
    pub default: Option<String>,
    pub body: String,
    pub kind: DeclarationKind,
}

impl MacroDefinition {
    fn mandatory_args(&self) -> usize {
        if self.default.is_some() {
            self.arity.saturating_sub(1)
        } else {
            self.arity
        }
    }
}

/// A declaration found at some offset: where it ends, and what it defines.
struct Declaration {
    end: usize,
    outcome: Result<MacroDefinition, Warning>,
}

fn malformed(name: &str, reason: &str) -> Warning {
    Warning::MalformedMacro {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Parses the declaration whose keyword starts at `at`, if there is one.
fn parse_declaration(text: &str, at: usize) -> Option<Declaration> {
    let (keyword, keyword_end) = read_control_word(text, at)?;
    let kind = DeclarationKind::from_keyword(keyword)?;
    let parsed = match kind {
        DeclarationKind::Def => parse_def(text, keyword_end),
        DeclarationKind::MathOperator => parse_math_operator(text, keyword_end),
        _ => parse_newcommand(text, keyword_end, kind),
    };
    Some(parsed.unwrap_or_else(|warning| Declaration {
        end: keyword_end,
        outcome: Err(warning),
    }))
}

/// Reads `{\name}` or `\name`, returning the name and the offset after it.
fn parse_command_name(text: &str, at: usize) -> Option<(String, usize)> {
    let at = skip_whitespace(text, at);
    match text.as_bytes().get(at) {
        Some(b'{') => {
            let (inner, end) = balanced_group(text, at)?;
            let inner_text = text[inner].trim();
            let (name, name_end) = read_control_word(inner_text, 0)?;
            if name_end != inner_text.len() {
                return None;
            }
            Some((name.to_string(), end))
        }
        Some(b'\\') => {
            let (name, end) = read_control_word(text, at)?;
            Some((name.to_string(), end))
        }
        _ => None,
    }
}

fn check_placeholders(name: &str, body: &str, arity: usize) -> Result<(), Warning> {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'#' {
            let next = bytes[i + 1];
            if next.is_ascii_digit() && (next - b'0') as usize > arity {
                return Err(malformed(name, &format!("body uses #{} but takes {} arguments", next - b'0', arity)));
            }
            i += 2;
            continue;
        }
        i += 1;
    }
    Ok(())
}

fn parse_newcommand(text: &str, at: usize, kind: DeclarationKind) -> Result<Declaration, Warning> {
    let bytes = text.as_bytes();
    let mut i = at;
    if bytes.get(i) == Some(&b'*') {
        i += 1;
    }
    let (name, after_name) = parse_command_name(text, i).ok_or_else(|| malformed("newcommand", "missing command name"))?;
    i = skip_whitespace(text, after_name);

    let mut arity = 0;
    if bytes.get(i) == Some(&b'[') {
        let (inner, end) = balanced_group(text, i).ok_or_else(|| malformed(&name, "unbalanced argument count"))?;
        arity = text[inner]
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n <= 9)
            .ok_or_else(|| malformed(&name, "unparsable argument count"))?;
        i = skip_whitespace(text, end);
    }

    let mut default = None;
    if bytes.get(i) == Some(&b'[') {
        if arity == 0 {
            return Err(malformed(&name, "optional default without arguments"));
        }
        let (inner, end) = balanced_group(text, i).ok_or_else(|| malformed(&name, "unbalanced optional default"))?;
        default = Some(text[inner].to_string());
        i = skip_whitespace(text, end);
    }

    if bytes.get(i) != Some(&b'{') {
        return Err(malformed(&name, "missing body"));
    }
    let (inner, end) = balanced_group(text, i).ok_or_else(|| malformed(&name, "unbalanced body"))?;
    let body = text[inner].to_string();
    check_placeholders(&name, &body, arity)?;

    Ok(Declaration {
        end,
        outcome: Ok(MacroDefinition {
            name,
            arity,
            default,
            body,
            kind,
        }),
    })
}

fn parse_math_operator(text: &str, at: usize) -> Result<Declaration, Warning> {
    let bytes = text.as_bytes();
    let mut i = at;
    let starred = bytes.get(i) == Some(&b'*');
    if starred {
        i += 1;
    }
    let (name, after_name) =
        parse_command_name(text, i).ok_or_else(|| malformed("DeclareMathOperator", "missing command name"))?;
    i = skip_whitespace(text, after_name);
    if bytes.get(i) != Some(&b'{') {
        return Err(malformed(&name, "missing operator text"));
    }
    let (inner, end) = balanced_group(text, i).ok_or_else(|| malformed(&name, "unbalanced operator text"))?;
    let operator = if starred { "\\operatorname*" } else { "\\operatorname" };

    Ok(Declaration {
        end,
        outcome: Ok(MacroDefinition {
            name,
            arity: 0,
            default: None,
            body: format!("{}{{{}}}", operator, &text[inner]),
            kind: DeclarationKind::MathOperator,
        }),
    })
}

/// `\def\name#1#2{body}`. Delimited parameter text is skipped over (so its
/// body is never expanded into) but not installed.
fn parse_def(text: &str, at: usize) -> Result<Declaration, Warning> {
    let start = skip_whitespace(text, at);
    let (name, after_name) = read_control_word(text, start).ok_or_else(|| malformed("def", "missing command name"))?;
    let name = name.to_string();

    let body_open = text[after_name..]
        .find('{')
        .map(|rel| after_name + rel)
        .ok_or_else(|| malformed(&name, "missing body"))?;
    let (inner, end) = balanced_group(text, body_open).ok_or_else(|| malformed(&name, "unbalanced body"))?;

    let params = text[after_name..body_open].trim_start();
    let arity = match plain_parameter_count(params) {
        Some(n) => n,
        None => {
            return Ok(Declaration {
                end,
                outcome: Err(Warning::UnsupportedDefPattern(name)),
            })
        }
    };
    let body = text[inner].to_string();
    check_placeholders(&name, &body, arity)?;

    Ok(Declaration {
        end,
        outcome: Ok(MacroDefinition {
            name,
            arity,
            default: None,
            body,
            kind: DeclarationKind::Def,
        }),
    })
}

/// `""` -> 0, `"#1#2"` -> 2; anything else (delimiters, gaps) -> `None`.
fn plain_parameter_count(params: &str) -> Option<usize> {
    let bytes = params.as_bytes();
    if bytes.len() % 2 != 0 || bytes.len() > 18 {
        return None;
    }
    for (k, pair) in bytes.chunks(2).enumerate() {
        if pair[0] != b'#' || pair[1] != b'1' + k as u8 {
            return None;
        }
    }
    Some(bytes.len() / 2)
}

/// Name -> definition, built once per document and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    definitions: HashMap<String, MacroDefinition>,
}

impl MacroTable {
    /// Collects every live declaration in `text`, in document order.
    pub fn extract(text: &str) -> (Self, Vec<Warning>) {
        let dead = dead_regions(text).ranges();
        let mut table = Self::default();
        let mut warnings = Vec::new();

        let mut i = 0;
        while let Some(rel) = text[i..].find('\\') {
            let at = i + rel;
            if let Some(range) = range_containing(&dead, at) {
                i = range.end;
                continue;
            }
            let Some((_, word_end)) = read_control_word(text, at) else {
                i = skip_control_symbol(text, at);
                continue;
            };
            match parse_declaration(text, at) {
                Some(declaration) => {
                    match declaration.outcome {
                        Ok(definition) => table.install(definition),
                        Err(warning) => {
                            tracing::warn!("{}", warning);
                            warnings.push(warning);
                        }
                    }
                    i = declaration.end;
                }
                None => i = word_end,
            }
        }

        tracing::info!("Extracted {} macro definitions", table.len());
        (table, warnings)
    }

    pub fn install(&mut self, definition: MacroDefinition) {
        match definition.kind {
            DeclarationKind::ProvideCommand if self.definitions.contains_key(&definition.name) => {
                tracing::debug!("\\providecommand{{\\{}}} ignored, already defined", definition.name);
            }
            kind => {
                if kind == DeclarationKind::NewCommand && self.definitions.contains_key(&definition.name) {
                    tracing::debug!("\\newcommand redefines \\{}; last definition wins", definition.name);
                }
                tracing::trace!("Defined \\{} with {} arguments", definition.name, definition.arity);
                self.definitions.insert(definition.name.clone(), definition);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&MacroDefinition> {
        self.definitions.get(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExpansionLimits {
    /// Nested substitutions allowed for one occurrence.
    pub max_depth: usize,
    /// Substitutions allowed for the whole document.
    pub max_expansions: usize,
}

#[derive(Debug, Clone)]
pub struct Expanded {
    pub text: String,
    pub expansions: usize,
    pub warnings: Vec<Warning>,
}

/// Extracts the document's macros and expands every invocation.
pub fn expand_macros(text: &str, limits: ExpansionLimits) -> Expanded {
    let (table, mut warnings) = MacroTable::extract(text);
    if table.is_empty() {
        return Expanded {
            text: text.to_string(),
            expansions: 0,
            warnings,
        };
    }
    let mut expander = MacroExpander::new(&table, limits);
    let expanded = expander.expand(text);
    let expansions = expander.expansions();
    warnings.extend(expander.into_warnings());
    tracing::info!("Performed {} macro expansions", expansions);
    Expanded {
        text: expanded,
        expansions,
        warnings,
    }
}

struct Invocation<'t> {
    args: Vec<&'t str>,
    end: usize,
}

/// Why an invocation could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissingArguments {
    /// The text ended before every argument was read. Inside a substituted
    /// body the rest may follow in the surrounding text.
    Truncated,
    Absent,
}

/// Reads the arguments for `def` starting right after the macro name.
fn parse_invocation<'t>(
    text: &'t str,
    after_name: usize,
    def: &'t MacroDefinition,
) -> Result<Invocation<'t>, MissingArguments> {
    let bytes = text.as_bytes();
    let mut args = Vec::with_capacity(def.arity);
    let mut i = after_name;

    if let Some(default) = &def.default {
        let j = skip_whitespace(text, i);
        match bytes.get(j) {
            Some(b'[') => {
                let (inner, end) = balanced_group(text, j).ok_or(MissingArguments::Absent)?;
                args.push(&text[inner]);
                i = end;
            }
            _ => args.push(default.as_str()),
        }
    }

    for _ in 0..def.mandatory_args() {
        let j = skip_whitespace(text, i);
        match bytes.get(j) {
            Some(b'{') => {
                let (inner, end) = balanced_group(text, j).ok_or(MissingArguments::Absent)?;
                args.push(&text[inner]);
                i = end;
            }
            Some(b'\\') => {
                let end = read_control_word(text, j).map_or_else(|| skip_control_symbol(text, j), |(_, end)| end);
                args.push(&text[j..end]);
                i = end;
            }
            Some(b'}') | Some(b'%') => return Err(MissingArguments::Absent),
            None => return Err(MissingArguments::Truncated),
            Some(_) => {
                let len = text[j..].chars().next().map_or(1, char::len_utf8);
                args.push(&text[j..j + len]);
                i = j + len;
            }
        }
    }

    Ok(Invocation { args, end: i })
}

/// Replaces `#n` with the n-th argument and `##` with `#`.
fn substitute(body: &str, args: &[&str]) -> String {
    let bytes = body.as_bytes();
    let mut out = String::with_capacity(body.len() + args.iter().map(|a| a.len()).sum::<usize>());
    let mut last = 0;
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'#' {
            let next = bytes[i + 1];
            if next == b'#' {
                out.push_str(&body[last..i]);
                out.push('#');
                i += 2;
                last = i;
                continue;
            }
            if (b'1'..=b'9').contains(&next) {
                out.push_str(&body[last..i]);
                out.push_str(args.get((next - b'1') as usize).copied().unwrap_or(""));
                i += 2;
                last = i;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&body[last..]);
    out
}

/// Bytes of following text first offered to an invocation left hanging at the
/// end of a body; doubled until its arguments fit.
const RESUME_WINDOW: usize = 1024;

/// The unexpanded end of a body: a known macro still waiting for arguments.
struct Pending {
    tail: String,
    depth: usize,
}

/// Smallest char boundary of `text` at or after `at`, capped at its length.
fn boundary_after(text: &str, at: usize) -> usize {
    let mut at = at.min(text.len());
    while !text.is_char_boundary(at) {
        at += 1;
    }
    at
}

pub struct MacroExpander<'a> {
    table: &'a MacroTable,
    /// Declarations produced by expansion itself, shadowing `table`.
    local: MacroTable,
    limits: ExpansionLimits,
    expansions: usize,
    warnings: Vec<Warning>,
    depth_reported: HashSet<String>,
    budget_reported: bool,
}

impl<'a> MacroExpander<'a> {
    pub fn new(table: &'a MacroTable, limits: ExpansionLimits) -> Self {
        Self {
            table,
            local: MacroTable::default(),
            limits,
            expansions: 0,
            warnings: Vec::new(),
            depth_reported: HashSet::new(),
            budget_reported: false,
        }
    }

    pub fn expand(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        if let Some(pending) = self.expand_into(text, 0, &mut out) {
            out.push_str(&pending.tail);
        }
        out
    }

    pub fn expansions(&self) -> usize {
        self.expansions
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    fn lookup(&self, name: &str) -> Option<&MacroDefinition> {
        self.local.get(name).or_else(|| self.table.get(name))
    }

    /// Installs a declaration that only exists in substituted text.
    fn register(&mut self, definition: MacroDefinition) {
        if definition.kind == DeclarationKind::ProvideCommand && self.lookup(&definition.name).is_some() {
            return;
        }
        tracing::debug!("Expansion declared \\{}", definition.name);
        self.local.install(definition);
    }

    /// Copies `text` into `out`, substituting invocations left to right and
    /// rescanning each substituted body at `depth + 1`. A body whose last
    /// invocation runs out of text hands it back as `Pending`; the caller
    /// completes it from the text following the body.
    fn expand_into(&mut self, text: &str, depth: usize, out: &mut String) -> Option<Pending> {
        let dead = dead_regions(text).ranges();
        let mut cursor = 0;
        let mut i = 0;

        while let Some(rel) = text[i..].find('\\') {
            let at = i + rel;
            if let Some(range) = range_containing(&dead, at) {
                i = range.end;
                continue;
            }
            let Some((name, name_end)) = read_control_word(text, at) else {
                i = skip_control_symbol(text, at);
                continue;
            };
            // Declarations are copied verbatim, never expanded into.
            if let Some(declaration) = parse_declaration(text, at) {
                if depth > 0 {
                    match declaration.outcome {
                        Ok(definition) => self.register(definition),
                        Err(warning) => tracing::debug!("Ignoring declaration in expanded text: {}", warning),
                    }
                }
                i = declaration.end;
                continue;
            }
            let Some(def) = self.lookup(name).cloned() else {
                i = name_end;
                continue;
            };
            let call = match parse_invocation(text, name_end, &def) {
                Ok(call) => call,
                Err(MissingArguments::Truncated) if depth > 0 => {
                    out.push_str(&text[cursor..at]);
                    return Some(Pending {
                        tail: text[at..].to_string(),
                        depth,
                    });
                }
                Err(_) => {
                    tracing::trace!("\\{} lacks its arguments; left as is", name);
                    i = name_end;
                    continue;
                }
            };

            out.push_str(&text[cursor..at]);
            let mut end = call.end;
            let mut pending = self.apply(&def, &call.args, &text[at..call.end], depth, out);
            while let Some(hanging) = pending.take() {
                match self.resume(hanging, text, end, out) {
                    Ok((next, stop)) => {
                        pending = next;
                        end = stop;
                    }
                    // This text ran out too; let the enclosing one supply the rest.
                    Err(hanging) if depth > 0 => return Some(hanging),
                    Err(hanging) => {
                        out.push_str(&hanging.tail);
                        end = text.len();
                    }
                }
            }
            cursor = end;
            i = end;
        }

        out.push_str(&text[cursor..]);
        None
    }

    /// Substitutes one invocation, or copies `raw` when a limit is hit.
    fn apply(
        &mut self,
        def: &MacroDefinition,
        args: &[&str],
        raw: &str,
        depth: usize,
        out: &mut String,
    ) -> Option<Pending> {
        if depth >= self.limits.max_depth {
            self.report_depth(&def.name);
            out.push_str(raw);
            None
        } else if self.expansions >= self.limits.max_expansions {
            self.report_budget();
            out.push_str(raw);
            None
        } else {
            self.expansions += 1;
            let body = substitute(&def.body, args);
            self.expand_into(&body, depth + 1, out)
        }
    }

    /// Completes a hanging invocation with arguments read from `text` at
    /// `from`. On success returns whatever is left hanging and the offset in
    /// `text` where reading stopped. `Err` carries the invocation, extended by
    /// the rest of `text`, when `text` ends before its arguments do.
    fn resume(
        &mut self,
        pending: Pending,
        text: &str,
        from: usize,
        out: &mut String,
    ) -> Result<(Option<Pending>, usize), Pending> {
        let def = read_control_word(&pending.tail, 0)
            .and_then(|(name, name_end)| self.lookup(name).cloned().map(|def| (def, name_end)));
        let Some((def, name_end)) = def else {
            out.push_str(&pending.tail);
            return Ok((None, from));
        };

        let mut window = RESUME_WINDOW;
        loop {
            let stop = boundary_after(text, from.saturating_add(window));
            let joined = format!("{}{}", pending.tail, &text[from..stop]);
            match parse_invocation(&joined, name_end, &def) {
                Ok(call) => {
                    let end = from + call.end.saturating_sub(pending.tail.len());
                    let next = self.apply(&def, &call.args, &joined[..call.end], pending.depth, out);
                    return Ok((next, end));
                }
                Err(MissingArguments::Truncated) if stop < text.len() => window = window.saturating_mul(2),
                Err(MissingArguments::Truncated) => {
                    return Err(Pending {
                        tail: joined,
                        depth: pending.depth,
                    })
                }
                Err(MissingArguments::Absent) => {
                    tracing::trace!("\\{} lacks its arguments; left as is", def.name);
                    out.push_str(&pending.tail);
                    return Ok((None, from));
                }
            }
        }
    }

    fn report_depth(&mut self, name: &str) {
        if self.depth_reported.insert(name.to_string()) {
            let warning = Warning::ExpansionDepthExceeded {
                name: name.to_string(),
                limit: self.limits.max_depth,
            };
            tracing::warn!("{}", warning);
            self.warnings.push(warning);
        }
    }

    fn report_budget(&mut self) {
        if !self.budget_reported {
            self.budget_reported = true;
            let warning = Warning::ExpansionBudgetExhausted(self.limits.max_expansions);
            tracing::warn!("{}", warning);
            self.warnings.push(warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: ExpansionLimits = ExpansionLimits {
        max_depth: 32,
        max_expansions: 10_000,
    };

    fn expand(text: &str) -> String {
        expand_macros(text, LIMITS).text
    }

    #[test]
    fn test_zero_argument_macro_respects_word_boundary() {
        let text = "\\newcommand{\\X}{hello}\n\\X, \\X world, \\Xylophone.";
        assert_eq!(expand(text), "\\newcommand{\\X}{hello}\nhello, hello world, \\Xylophone.");
    }

    #[test]
    fn test_single_argument_and_nesting() {
        let text = "\\newcommand{\\sq}[1]{#1^2}\n$\\sq{y}$ $\\sq{\\sq{y}}$";
        assert_eq!(expand(text), "\\newcommand{\\sq}[1]{#1^2}\n$y^2$ $y^2^2$");
    }

    #[test]
    fn test_optional_argument_with_default() {
        let text = "\\newcommand{\\norm}[2][2]{\\|#2\\|_{#1}} \\norm{x} \\norm[\\infty]{v}";
        let out = expand(text);
        assert!(out.ends_with(" \\|x\\|_{2} \\|v\\|_{\\infty}"), "{}", out);
    }

    #[test]
    fn test_single_token_arguments() {
        let text = "\\newcommand\\pair[2]{(#1,#2)}\\pair a\\beta";
        assert!(expand(text).ends_with("(a,\\beta)"));
    }

    #[test]
    fn test_renew_overrides_and_provide_only_installs_if_absent() {
        let text = "\\newcommand{\\A}{one}\\renewcommand{\\A}{two}\\providecommand{\\A}{three}\\providecommand{\\B}{bee}";
        let (table, warnings) = MacroTable::extract(text);
        assert!(warnings.is_empty());
        assert_eq!(table.get("A").unwrap().body, "two");
        assert_eq!(table.get("B").unwrap().body, "bee");
    }

    #[test]
    fn test_starred_forms_and_math_operators() {
        let text = "\\newcommand*{\\R}{\\mathbb{R}}\\DeclareMathOperator*{\\argmax}{arg\\,max}\\DeclareMathOperator{\\tr}{tr} $\\R \\argmax \\tr$";
        let out = expand(text);
        assert!(out.ends_with(" $\\mathbb{R} \\operatorname*{arg\\,max} \\operatorname{tr}$"), "{}", out);
    }

    #[test]
    fn test_def_plain_parameters() {
        let text = "\\def\\half#1{#1/2}\\def\\pi{3.14}\\half{\\pi}";
        assert!(expand(text).ends_with("3.14/2"));
    }

    #[test]
    fn test_def_with_delimiters_is_left_unexpanded() {
        let text = "\\def\\pt(#1,#2){[#1;#2]}\\pt(1,2)";
        let result = expand_macros(text, LIMITS);
        assert_eq!(result.text, text);
        assert_eq!(result.warnings, vec![Warning::UnsupportedDefPattern("pt".to_string())]);
    }

    #[test]
    fn test_malformed_declarations_are_skipped_with_warning() {
        let text = "\\newcommand{\\bad}[x]{oops}\\newcommand{\\worse}{unclosed";
        let (table, warnings) = MacroTable::extract(text);
        assert!(table.is_empty());
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| matches!(w, Warning::MalformedMacro { .. })));
    }

    #[test]
    fn test_placeholder_beyond_arity_is_malformed() {
        let (table, warnings) = MacroTable::extract("\\newcommand{\\f}[1]{#1#2}");
        assert!(table.get("f").is_none());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_self_referential_macro_hits_depth_limit() {
        let text = "\\newcommand{\\loop}{x\\loop}\\loop";
        let limits = ExpansionLimits {
            max_depth: 3,
            max_expansions: 100,
        };
        let result = expand_macros(text, limits);
        assert!(result.text.ends_with("xxx\\loop"), "{}", result.text);
        assert_eq!(
            result.warnings,
            vec![Warning::ExpansionDepthExceeded {
                name: "loop".to_string(),
                limit: 3
            }]
        );
    }

    #[test]
    fn test_budget_bounds_exponential_bodies() {
        let text = "\\newcommand{\\a}{\\b\\b}\\newcommand{\\b}{\\c\\c}\\newcommand{\\c}{z}\\a";
        let limits = ExpansionLimits {
            max_depth: 32,
            max_expansions: 3,
        };
        let result = expand_macros(text, limits);
        assert_eq!(result.expansions, 3);
        assert!(result.text.ends_with("z\\c\\b"), "{}", result.text);
        assert_eq!(result.warnings, vec![Warning::ExpansionBudgetExhausted(3)]);
    }

    #[test]
    fn test_unknown_macros_and_comments_untouched() {
        let text = "\\newcommand{\\X}{hello}\n% \\X in a comment\n\\unknown{\\X}";
        assert_eq!(expand(text), "\\newcommand{\\X}{hello}\n% \\X in a comment\n\\unknown{hello}");
    }

    #[test]
    fn test_commented_declarations_are_ignored() {
        let (table, _) = MacroTable::extract("% \\newcommand{\\X}{no}\n\\iffalse\\def\\Y{no}\\fi");
        assert!(table.is_empty());
    }

    #[test]
    fn test_renewcommand_name_is_not_expanded() {
        let text = "\\newcommand{\\X}{a}\\renewcommand{\\X}{b}\\X";
        assert_eq!(expand(text), "\\newcommand{\\X}{a}\\renewcommand{\\X}{b}b");
    }

    #[test]
    fn test_body_ending_in_macro_takes_following_arguments() {
        let text = "\\newcommand{\\sq}[1]{#1^2}\\newcommand{\\wrap}{\\sq}\n\\wrap{y} and \\wrap z";
        assert_eq!(
            expand(text),
            "\\newcommand{\\sq}[1]{#1^2}\\newcommand{\\wrap}{\\sq}\ny^2 and z^2"
        );
    }

    #[test]
    fn test_body_supplies_some_arguments_and_text_the_rest() {
        let text = "\\newcommand{\\pair}[2]{(#1, #2)}\\newcommand{\\half}{\\pair{a}}\\newcommand{\\id}{\\half}\n\\id{b}.";
        assert!(expand(text).ends_with("\n(a, b)."), "{}", expand(text));
    }

    #[test]
    fn test_hanging_macro_without_arguments_is_left_as_is() {
        let text = "\\newcommand{\\sq}[1]{#1^2}\\newcommand{\\wrap}{\\sq}\\wrap";
        assert!(expand(text).ends_with("}\\sq"), "{}", expand(text));
    }

    #[test]
    fn test_hanging_self_feeding_macro_stops_at_depth_limit() {
        let text = "\\newcommand{\\eat}[1]{\\eat}\\eat{a}{b}{c}{d}{e}";
        let limits = ExpansionLimits {
            max_depth: 3,
            max_expansions: 100,
        };
        let result = expand_macros(text, limits);
        assert_eq!(result.expansions, 3);
        assert!(result.text.ends_with("\\eat{d}{e}"), "{}", result.text);
        assert!(matches!(&result.warnings[..], [Warning::ExpansionDepthExceeded { limit: 3, .. }]));
    }

    #[test]
    fn test_declaration_made_by_expansion_is_registered() {
        let text = "\\newcommand{\\setup}{\\newcommand{\\inner}{x}}\n\\setup\n\\inner";
        assert_eq!(
            expand(text),
            "\\newcommand{\\setup}{\\newcommand{\\inner}{x}}\n\\newcommand{\\inner}{x}\nx"
        );
    }

    #[test]
    fn test_provided_in_expansion_does_not_override() {
        let text = "\\newcommand{\\X}{kept}\\newcommand{\\init}{\\providecommand{\\X}{lost}}\\init \\X";
        assert!(expand(text).ends_with("\\providecommand{\\X}{lost} kept"), "{}", expand(text));
    }

    #[test]
    fn test_double_hash_becomes_single() {
        assert_eq!(substitute("#1 and ##1", &["x"]), "x and #1");
    }
}
