//! Word Expansion
//!
//! Drives the full shell word-expansion pipeline over a parsed `WordNode`:
//! brace expansion, tilde expansion, parameter/command/arithmetic expansion,
//! field splitting on IFS, pathname (glob) expansion, and quote removal.
//!
//! Command substitution and the `${var:=default}`/`${var?msg}` operators need
//! to run script fragments and mutate shell state, so callers thread an
//! `ExecScriptFn` callback through rather than this module depending on the
//! execution engine directly (the same pattern `pipeline_execution` and
//! `subshell_group` use for their continuations).

use crate::ast::types::{
    ArrayKeysOp, BraceExpansionPart, BraceItem, BraceRangeValue, CaseModificationOp,
    InnerParameterOperation, LiteralPart, ParameterExpansionPart, ParameterOperation,
    PatternRemovalSide as AstPatternRemovalSide, ScriptNode, TransformOperator,
    VarNamePrefixOp, WordNode, WordPart,
};
use crate::interpreter::errors::{BadSubstitutionError, InterpreterError, NounsetError};
use crate::interpreter::expansion::brace_range::{expand_brace_range, RangeValue};
use crate::interpreter::expansion::pattern::pattern_to_regex;
use crate::interpreter::expansion::pattern_removal::PatternRemovalSide;
use crate::interpreter::expansion::parameter_ops::{
    apply_case_modification, apply_pattern_removal_op, apply_pattern_replacement_op,
    apply_substring_op, apply_transform_op, get_array_keys, get_parameter_length,
    get_var_names_with_prefix_op, should_use_alternative, should_use_default, ParameterOpContext,
};
use crate::interpreter::expansion::variable::get_variable;
use crate::interpreter::helpers::ifs::{get_ifs, split_by_ifs_for_expansion};
use crate::interpreter::helpers::word_parts::{get_literal_value, is_quoted_part};
use crate::interpreter::types::{ExecResult, InterpreterState};

pub use crate::interpreter::expansion::analysis::*;
pub use crate::interpreter::expansion::brace_range::*;
pub use crate::interpreter::expansion::glob_escape::*;
pub use crate::interpreter::expansion::pattern::*;
pub use crate::interpreter::expansion::pattern_removal::*;
pub use crate::interpreter::expansion::quoting::*;
pub use crate::interpreter::expansion::tilde::*;
pub use crate::interpreter::expansion::variable::*;
pub use crate::interpreter::expansion::word_split::*;

/// Callback used to run a command-substitution body (or a subshell spawned by
/// one) and fold its output back into expansion. Implemented by the execution
/// engine; this module only depends on the signature.
pub type ExecScriptFn<'a> = &'a dyn Fn(&mut InterpreterState, &ScriptNode) -> ExecResult;

/// Legacy callback type kept for compatibility with external embedders who
/// only want to intercept raw command text instead of the parsed AST.
pub type CommandSubstitutionFn = Box<dyn Fn(&str, &mut InterpreterState) -> ExecResult + Send + Sync>;

/// Result of word expansion.
#[derive(Debug, Clone, Default)]
pub struct WordExpansionResult {
    /// The expanded string value (fields joined by a space when split).
    pub value: String,
    /// Whether the expansion produced multiple words (from word splitting).
    pub split_words: Option<Vec<String>>,
    /// Any stderr output from command substitutions.
    pub stderr: String,
    /// Exit code from command substitutions (if any).
    pub exit_code: Option<i32>,
    /// Set when `set -u` is active and a plain `$var`/`${var}` referenced an
    /// unset parameter. Callers that execute commands check this and raise
    /// `InterpreterError::Nounset` instead of proceeding.
    pub nounset_error: Option<NounsetError>,
}

impl WordExpansionResult {
    pub fn simple(value: String) -> Self {
        Self { value, split_words: None, stderr: String::new(), exit_code: None, nounset_error: None }
    }

    pub fn with_split(value: String, words: Vec<String>) -> Self {
        Self { value, split_words: Some(words), stderr: String::new(), exit_code: None, nounset_error: None }
    }
}

/// Options for word expansion.
#[derive(Debug, Clone, Default)]
pub struct WordExpansionOptions {
    pub in_double_quotes: bool,
    pub do_word_split: bool,
    pub do_glob: bool,
    pub preserve_empty: bool,
    pub extglob: bool,
}

/// One field produced while walking a word's parts: the literal text plus
/// whether it came from a quoted context (and so must not be split/globbed).
struct Field {
    text: String,
    quoted: bool,
    had_glob_source: bool,
}

/// Expand a single word to one string: no field splitting, no globbing.
/// Used for command names, assignment right-hand sides, and anywhere bash
/// treats the word as a single unit.
pub fn expand_word(
    state: &mut InterpreterState,
    word: &WordNode,
    exec_fn: Option<ExecScriptFn>,
) -> WordExpansionResult {
    let mut stderr = String::new();
    let mut nounset_error = None;
    let fields = expand_parts(state, &word.parts, false, exec_fn, &mut stderr, &mut nounset_error);
    let value: String = fields.iter().map(|f| f.text.as_str()).collect();
    let mut result = WordExpansionResult::simple(value);
    result.stderr = stderr;
    result.nounset_error = nounset_error;
    result
}

/// Expand a word performing field splitting and pathname expansion, as bash
/// does for command arguments and `for`/`case` word lists.
pub fn expand_word_with_glob(
    state: &mut InterpreterState,
    word: &WordNode,
    exec_fn: Option<ExecScriptFn>,
) -> WordExpansionResult {
    let mut stderr = String::new();
    let mut nounset_error = None;
    let mut out_words: Vec<String> = Vec::new();

    for brace_variant in expand_braces(&word.parts) {
        let fields = expand_parts(state, &brace_variant, false, exec_fn, &mut stderr, &mut nounset_error);
        let split = split_fields(state, &fields);
        out_words.extend(split);
    }

    if out_words.is_empty() {
        out_words.push(String::new());
    }

    let value = out_words.join(" ");
    let mut result = WordExpansionResult::with_split(value, out_words);
    result.stderr = stderr;
    result.nounset_error = nounset_error;
    result
}

/// Backwards-compatible alias matching the teacher's original name.
pub fn expand_word_no_glob(
    state: &InterpreterState,
    word: &WordNode,
    options: &WordExpansionOptions,
) -> WordExpansionResult {
    let mut scratch = state.clone();
    let mut stderr = String::new();
    let mut nounset_error = None;
    let fields = expand_parts(&mut scratch, &word.parts, options.in_double_quotes, None, &mut stderr, &mut nounset_error);
    let value: String = fields.iter().map(|f| f.text.as_str()).collect();
    WordExpansionResult::simple(value)
}

/// Expand all `{a,b,c}`/`{1..5}` brace groups in a part list into the
/// cross-product of concrete part lists. Returns `vec![parts.to_vec()]`
/// unchanged when there is no brace expansion present.
fn expand_braces(parts: &[WordPart]) -> Vec<Vec<WordPart>> {
    let pos = parts.iter().position(|p| matches!(p, WordPart::BraceExpansion(_)));
    let Some(pos) = pos else {
        return vec![parts.to_vec()];
    };

    let WordPart::BraceExpansion(brace) = &parts[pos] else { unreachable!() };
    let alternatives = brace_alternatives(brace);

    let mut results = Vec::new();
    for alt in alternatives {
        let mut new_parts = Vec::with_capacity(parts.len());
        new_parts.extend_from_slice(&parts[..pos]);
        new_parts.extend(alt);
        new_parts.extend_from_slice(&parts[pos + 1..]);
        // Recurse to expand any remaining brace groups (nested or sibling).
        results.extend(expand_braces(&new_parts));
    }
    results
}

fn brace_alternatives(brace: &BraceExpansionPart) -> Vec<Vec<WordPart>> {
    let mut alternatives = Vec::new();
    for item in &brace.items {
        match item {
            BraceItem::Word { word } => alternatives.push(word.parts.clone()),
            BraceItem::Range { start, end, step, start_str, end_str } => {
                let start_val = match start {
                    BraceRangeValue::Number(n) => RangeValue::Numeric(*n),
                    BraceRangeValue::Char(c) => RangeValue::Char(*c),
                };
                let end_val = match end {
                    BraceRangeValue::Number(n) => RangeValue::Numeric(*n),
                    BraceRangeValue::Char(c) => RangeValue::Char(*c),
                };
                match expand_brace_range(start_val, end_val, *step, start_str.as_deref(), end_str.as_deref()) {
                    Ok(result) => match result.expanded {
                        Some(values) => {
                            for v in values {
                                alternatives.push(vec![WordPart::Literal(LiteralPart { value: v })]);
                            }
                        }
                        None => alternatives.push(vec![WordPart::Literal(LiteralPart { value: result.literal })]),
                    },
                    Err(_) => {
                        alternatives.push(vec![WordPart::Literal(LiteralPart {
                            value: format!("{{{}..{}}}", start, end),
                        })]);
                    }
                }
            }
        }
    }
    alternatives
}

/// Walk a part list, expanding each part into text. Returns one `Field` per
/// top-level part so the caller can later decide what is eligible for word
/// splitting (only unquoted expansions are).
fn expand_parts(
    state: &mut InterpreterState,
    parts: &[WordPart],
    in_double_quotes: bool,
    exec_fn: Option<ExecScriptFn>,
    stderr: &mut String,
    nounset: &mut Option<NounsetError>,
) -> Vec<Field> {
    let mut fields = Vec::with_capacity(parts.len());
    for part in parts {
        fields.push(expand_part(state, part, in_double_quotes, exec_fn, stderr, nounset));
    }
    fields
}

fn expand_part(
    state: &mut InterpreterState,
    part: &WordPart,
    in_double_quotes: bool,
    exec_fn: Option<ExecScriptFn>,
    stderr: &mut String,
    nounset: &mut Option<NounsetError>,
) -> Field {
    if let Some(literal) = get_literal_value(part) {
        return Field { text: literal.to_string(), quoted: is_quoted_part(part), had_glob_source: false };
    }

    match part {
        WordPart::TildeExpansion(tilde) => {
            if in_double_quotes {
                let text = match &tilde.user {
                    Some(u) => format!("~{}", u),
                    None => "~".to_string(),
                };
                return Field { text, quoted: true, had_glob_source: false };
            }
            let tilde_str = match &tilde.user {
                Some(u) => format!("~{}", u),
                None => "~".to_string(),
            };
            Field { text: apply_tilde_expansion(state, &tilde_str), quoted: false, had_glob_source: false }
        }
        WordPart::ParameterExpansion(param) => {
            let (text, quoted) = expand_parameter(state, param, in_double_quotes, exec_fn, stderr, nounset);
            Field { text, quoted, had_glob_source: false }
        }
        WordPart::DoubleQuoted(dq) => {
            let mut text = String::new();
            for inner in &dq.parts {
                let f = expand_part(state, inner, true, exec_fn, stderr, nounset);
                text.push_str(&f.text);
            }
            Field { text, quoted: true, had_glob_source: false }
        }
        WordPart::CommandSubstitution(cs) => {
            let text = run_command_substitution(state, &cs.body, exec_fn, stderr);
            let trimmed = text.trim_end_matches('\n').to_string();
            Field { text: trimmed, quoted: in_double_quotes, had_glob_source: false }
        }
        WordPart::ProcessSubstitution(_) => {
            // Process substitution needs a real process/fd model; this core
            // has no process table, so it degrades to an empty path.
            Field { text: String::new(), quoted: true, had_glob_source: false }
        }
        WordPart::ArithmeticExpansion(arith) => {
            use crate::interpreter::arithmetic::evaluate_arithmetic;
            use crate::interpreter::types::{ExecutionLimits, InterpreterContext};
            let limits = ExecutionLimits::default();
            let mut ctx = InterpreterContext::new(state, &limits);
            let text = match evaluate_arithmetic(&mut ctx, &arith.expression.expression, false, None) {
                Ok(value) => value.to_string(),
                Err(e) => {
                    stderr.push_str(&format!("bash: {}\n", e));
                    "0".to_string()
                }
            };
            Field { text, quoted: in_double_quotes, had_glob_source: false }
        }
        WordPart::Glob(glob) => {
            Field { text: glob.pattern.clone(), quoted: in_double_quotes, had_glob_source: !in_double_quotes }
        }
        WordPart::BraceExpansion(_) => {
            // Callers expand braces at the word level before reaching here;
            // if one slips through (e.g. nested in a quoted context) treat
            // it as already-literal text.
            Field { text: String::new(), quoted: true, had_glob_source: false }
        }
        WordPart::Literal(_) | WordPart::SingleQuoted(_) | WordPart::Escaped(_) => {
            unreachable!("handled by get_literal_value")
        }
    }
}

fn run_command_substitution(
    state: &mut InterpreterState,
    body: &ScriptNode,
    exec_fn: Option<ExecScriptFn>,
    stderr: &mut String,
) -> String {
    let Some(exec_fn) = exec_fn else {
        return String::new();
    };
    let result = exec_fn(state, body);
    if !result.stderr.is_empty() {
        stderr.push_str(&result.stderr);
    }
    result.stdout
}

/// Dispatch a `${parameter...}` expansion to its operator handler. Returns
/// the expanded text and whether the result should be treated as quoted
/// (exempt from further splitting/globbing).
fn expand_parameter(
    state: &mut InterpreterState,
    param: &ParameterExpansionPart,
    in_double_quotes: bool,
    exec_fn: Option<ExecScriptFn>,
    stderr: &mut String,
    nounset: &mut Option<NounsetError>,
) -> (String, bool) {
    match &param.operation {
        None => {
            if state.options.nounset
                && nounset.is_none()
                && !is_variable_set(state, &param.parameter)
            {
                *nounset = Some(NounsetError::new(param.parameter.clone(), String::new()));
            }
            (get_variable(state, &param.parameter), in_double_quotes)
        }
        Some(ParameterOperation::ArrayKeys(ArrayKeysOp { array, star })) => {
            let keys = get_array_keys(state, array, *star);
            (keys.join(" "), in_double_quotes)
        }
        Some(ParameterOperation::VarNamePrefix(VarNamePrefixOp { prefix, star })) => {
            let names = get_var_names_with_prefix_op(state, prefix, *star);
            (names.join(" "), in_double_quotes)
        }
        Some(ParameterOperation::Indirection(ind)) => {
            let target = get_variable(state, &param.parameter);
            if !is_valid_indirect_target(&target) {
                return (String::new(), in_double_quotes);
            }
            match &ind.inner_op {
                None => (get_variable(state, &target), in_double_quotes),
                Some(inner) => expand_inner_operation(state, &target, inner, in_double_quotes, exec_fn, stderr),
            }
        }
        Some(ParameterOperation::Inner(inner)) => {
            expand_inner_operation(state, &param.parameter, inner, in_double_quotes, exec_fn, stderr)
        }
    }
}

fn is_valid_indirect_target(name: &str) -> bool {
    !name.is_empty()
        && name.chars().next().map(|c| c.is_alphabetic() || c == '_').unwrap_or(false)
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn expand_inner_operation(
    state: &mut InterpreterState,
    parameter: &str,
    op: &InnerParameterOperation,
    in_double_quotes: bool,
    exec_fn: Option<ExecScriptFn>,
    stderr: &mut String,
) -> (String, bool) {
    match op {
        InnerParameterOperation::Length(_) => {
            (get_parameter_length(state, parameter).to_string(), true)
        }
        InnerParameterOperation::LengthSliceError(_) => {
            stderr.push_str(&format!("bash: ${{#{}:...}}: bad substitution\n", parameter));
            (String::new(), true)
        }
        InnerParameterOperation::BadSubstitution(bad) => {
            let err = InterpreterError::BadSubstitution(BadSubstitutionError::new(bad.text.clone()));
            stderr.push_str(&format!("bash: {}\n", err));
            (String::new(), true)
        }
        InnerParameterOperation::DefaultValue(op) => {
            let ctx = ParameterOpContext::new(state, parameter, in_double_quotes);
            if should_use_default(&ctx, op.check_empty) {
                let default = expand_word(state, &op.word, exec_fn);
                (default.value, in_double_quotes)
            } else {
                (ctx.value, in_double_quotes)
            }
        }
        InnerParameterOperation::AssignDefault(op) => {
            let ctx = ParameterOpContext::new(state, parameter, in_double_quotes);
            if should_use_default(&ctx, op.check_empty) {
                let default = expand_word(state, &op.word, exec_fn);
                state.env.insert(parameter.to_string(), default.value.clone());
                (default.value, in_double_quotes)
            } else {
                (ctx.value, in_double_quotes)
            }
        }
        InnerParameterOperation::ErrorIfUnset(op) => {
            let ctx = ParameterOpContext::new(state, parameter, in_double_quotes);
            if should_use_default(&ctx, op.check_empty) {
                let message = match &op.word {
                    Some(w) => expand_word(state, w, exec_fn).value,
                    None => "parameter null or not set".to_string(),
                };
                stderr.push_str(&format!("bash: {}: {}\n", parameter, message));
                (String::new(), true)
            } else {
                (ctx.value, in_double_quotes)
            }
        }
        InnerParameterOperation::UseAlternative(op) => {
            let ctx = ParameterOpContext::new(state, parameter, in_double_quotes);
            if should_use_alternative(&ctx, op.check_empty) {
                let alt = expand_word(state, &op.word, exec_fn);
                (alt.value, in_double_quotes)
            } else {
                (String::new(), in_double_quotes)
            }
        }
        InnerParameterOperation::Substring(op) => {
            let value = get_variable(state, parameter);
            let offset = eval_arith_node(state, &op.offset);
            let length = op.length.as_ref().map(|l| eval_arith_node(state, l));
            match apply_substring_op(&value, offset, length) {
                Ok(s) => (s, in_double_quotes),
                Err(msg) => {
                    stderr.push_str(&format!("bash: {}: {}\n", parameter, msg));
                    (String::new(), true)
                }
            }
        }
        InnerParameterOperation::PatternRemoval(op) => {
            let value = get_variable(state, parameter);
            let pattern_word = expand_word(state, &op.pattern, exec_fn);
            let regex = pattern_to_regex(&pattern_word.value, op.greedy, false);
            let side = match op.side {
                AstPatternRemovalSide::Prefix => PatternRemovalSide::Prefix,
                AstPatternRemovalSide::Suffix => PatternRemovalSide::Suffix,
            };
            (apply_pattern_removal_op(&value, &regex, side, op.greedy), in_double_quotes)
        }
        InnerParameterOperation::PatternReplacement(op) => {
            let value = get_variable(state, parameter);
            let pattern_word = expand_word(state, &op.pattern, exec_fn);
            let replacement = op
                .replacement
                .as_ref()
                .map(|w| expand_word(state, w, exec_fn).value)
                .unwrap_or_default();
            let regex = pattern_to_regex(&pattern_word.value, op.all, false);
            let anchor_start = matches!(op.anchor, Some(crate::ast::types::PatternAnchor::Start));
            let anchor_end = matches!(op.anchor, Some(crate::ast::types::PatternAnchor::End));
            (
                apply_pattern_replacement_op(&value, &regex, &replacement, op.all, anchor_start, anchor_end),
                in_double_quotes,
            )
        }
        InnerParameterOperation::CaseModification(CaseModificationOp { direction, all, pattern }) => {
            let value = get_variable(state, parameter);
            let operator = match (direction, all) {
                (crate::ast::types::CaseDirection::Upper, true) => "U",
                (crate::ast::types::CaseDirection::Upper, false) => "u",
                (crate::ast::types::CaseDirection::Lower, true) => "L",
                (crate::ast::types::CaseDirection::Lower, false) => "l",
            };
            let _ = pattern; // pattern-scoped case modification not modeled; apply to whole value
            (apply_case_modification(&value, operator), in_double_quotes)
        }
        InnerParameterOperation::Transform(t) => {
            let value = get_variable(state, parameter);
            let op_str = match t.operator {
                TransformOperator::Q => "Q",
                TransformOperator::P => "P",
                TransformOperator::A | TransformOperator::LowerA => "a",
                TransformOperator::U => "U",
                TransformOperator::L => "L",
                TransformOperator::LowerU => "u",
                TransformOperator::E | TransformOperator::K | TransformOperator::LowerK => "",
            };
            (apply_transform_op(state, parameter, &value, op_str), true)
        }
    }
}

fn eval_arith_node(state: &mut InterpreterState, node: &crate::ast::types::ArithmeticExpressionNode) -> i64 {
    use crate::interpreter::arithmetic::evaluate_arithmetic;
    use crate::interpreter::types::{ExecutionLimits, InterpreterContext};
    let limits = ExecutionLimits::default();
    let mut ctx = InterpreterContext::new(state, &limits);
    evaluate_arithmetic(&mut ctx, &node.expression, false, None).unwrap_or(0)
}

/// Split the fields of an expanded word on IFS, leaving quoted fields intact.
fn split_fields(state: &InterpreterState, fields: &[Field]) -> Vec<String> {
    let ifs = get_ifs(&state.env).to_string();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_has_content = false;

    for field in fields {
        if field.quoted {
            current.push_str(&field.text);
            current_has_content = true;
            continue;
        }
        let parts = split_by_ifs_for_expansion(&field.text, &ifs);
        if parts.is_empty() {
            continue;
        }
        if parts.len() == 1 {
            current.push_str(&parts[0]);
            current_has_content = true;
            continue;
        }
        // First split piece joins whatever was accumulated; remaining pieces
        // become their own words; the last piece starts the next word.
        current.push_str(&parts[0]);
        words.push(std::mem::take(&mut current));
        for middle in &parts[1..parts.len() - 1] {
            words.push(middle.clone());
        }
        current.push_str(&parts[parts.len() - 1]);
        current_has_content = true;
    }

    if current_has_content || !current.is_empty() || words.is_empty() {
        words.push(current);
    }
    words
}

/// Check if a word is "fully quoted" - meaning glob characters should be
/// treated literally.
pub fn is_word_fully_quoted(word: &WordNode) -> bool {
    if word.parts.is_empty() {
        return true;
    }
    for part in &word.parts {
        if !is_quoted_part(part) {
            return false;
        }
    }
    true
}

/// Check if a word contains any glob patterns.
pub fn word_has_glob_pattern(word: &WordNode, extglob: bool) -> bool {
    for part in &word.parts {
        match part {
            WordPart::Glob(_) => return true,
            WordPart::Literal(lit) => {
                if crate::interpreter::expansion::glob_escape::has_glob_pattern(&lit.value, extglob) {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Check if a word contains command substitution.
pub fn word_has_command_substitution(word: &WordNode) -> bool {
    for part in &word.parts {
        if matches!(part, WordPart::CommandSubstitution(_)) {
            return true;
        }
        if let WordPart::DoubleQuoted(dq) = part {
            for inner in &dq.parts {
                if matches!(inner, WordPart::CommandSubstitution(_)) {
                    return true;
                }
            }
        }
    }
    false
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{CommandSubstitutionPart, GlobPart, SingleQuotedPart};

    fn make_literal_word(s: &str) -> WordNode {
        WordNode { parts: vec![WordPart::Literal(LiteralPart { value: s.to_string() })] }
    }

    fn make_var_word(name: &str) -> WordNode {
        WordNode {
            parts: vec![WordPart::ParameterExpansion(ParameterExpansionPart {
                parameter: name.to_string(),
                operation: None,
            })],
        }
    }

    #[test]
    fn test_expand_word_literal() {
        let mut state = InterpreterState::default();
        let word = make_literal_word("hello");
        let result = expand_word(&mut state, &word, None);
        assert_eq!(result.value, "hello");
    }

    #[test]
    fn test_expand_word_variable() {
        let mut state = InterpreterState::default();
        state.env.insert("FOO".to_string(), "bar".to_string());
        let word = make_var_word("FOO");
        let result = expand_word(&mut state, &word, None);
        assert_eq!(result.value, "bar");
    }

    #[test]
    fn test_expand_word_unset_variable() {
        let mut state = InterpreterState::default();
        let word = make_var_word("UNSET");
        let result = expand_word(&mut state, &word, None);
        assert_eq!(result.value, "");
    }

    #[test]
    fn test_default_value_operator() {
        let mut state = InterpreterState::default();
        let word = WordNode {
            parts: vec![WordPart::ParameterExpansion(ParameterExpansionPart {
                parameter: "UNSET".to_string(),
                operation: Some(ParameterOperation::Inner(InnerParameterOperation::DefaultValue(
                    crate::ast::types::DefaultValueOp {
                        word: make_literal_word("fallback"),
                        check_empty: true,
                    },
                ))),
            })],
        };
        let result = expand_word(&mut state, &word, None);
        assert_eq!(result.value, "fallback");
    }

    #[test]
    fn test_assign_default_mutates_state() {
        let mut state = InterpreterState::default();
        let word = WordNode {
            parts: vec![WordPart::ParameterExpansion(ParameterExpansionPart {
                parameter: "X".to_string(),
                operation: Some(ParameterOperation::Inner(InnerParameterOperation::AssignDefault(
                    crate::ast::types::AssignDefaultOp {
                        word: make_literal_word("assigned"),
                        check_empty: true,
                    },
                ))),
            })],
        };
        let result = expand_word(&mut state, &word, None);
        assert_eq!(result.value, "assigned");
        assert_eq!(state.env.get("X"), Some(&"assigned".to_string()));
    }

    #[test]
    fn test_word_splitting() {
        let mut state = InterpreterState::default();
        state.env.insert("LIST".to_string(), "a b  c".to_string());
        let word = make_var_word("LIST");
        let result = expand_word_with_glob(&mut state, &word, None);
        assert_eq!(result.split_words, Some(vec!["a".to_string(), "b".to_string(), "c".to_string()]));
    }

    #[test]
    fn test_quoted_value_not_split() {
        let mut state = InterpreterState::default();
        state.env.insert("LIST".to_string(), "a b c".to_string());
        let word = WordNode {
            parts: vec![WordPart::DoubleQuoted(crate::ast::types::DoubleQuotedPart {
                parts: vec![WordPart::ParameterExpansion(ParameterExpansionPart {
                    parameter: "LIST".to_string(),
                    operation: None,
                })],
            })],
        };
        let result = expand_word_with_glob(&mut state, &word, None);
        assert_eq!(result.split_words, Some(vec!["a b c".to_string()]));
    }

    #[test]
    fn test_is_word_fully_quoted_empty() {
        let word = WordNode { parts: vec![] };
        assert!(is_word_fully_quoted(&word));
    }

    #[test]
    fn test_is_word_fully_quoted_single_quoted() {
        let word = WordNode { parts: vec![WordPart::SingleQuoted(SingleQuotedPart { value: "hello".to_string() })] };
        assert!(is_word_fully_quoted(&word));
    }

    #[test]
    fn test_is_word_fully_quoted_literal() {
        let word = make_literal_word("hello");
        assert!(!is_word_fully_quoted(&word));
    }

    #[test]
    fn test_word_has_glob_pattern() {
        let word = WordNode { parts: vec![WordPart::Glob(GlobPart { pattern: "*.txt".to_string() })] };
        assert!(word_has_glob_pattern(&word, false));

        let word = make_literal_word("hello");
        assert!(!word_has_glob_pattern(&word, false));
    }

    #[test]
    fn test_word_has_command_substitution() {
        let word = WordNode {
            parts: vec![WordPart::CommandSubstitution(CommandSubstitutionPart {
                body: ScriptNode { statements: vec![] },
                legacy: false,
            })],
        };
        assert!(word_has_command_substitution(&word));

        let word = make_literal_word("hello");
        assert!(!word_has_command_substitution(&word));
    }

    #[test]
    fn test_brace_expansion() {
        let mut state = InterpreterState::default();
        let word = WordNode {
            parts: vec![WordPart::BraceExpansion(BraceExpansionPart {
                items: vec![
                    BraceItem::Word { word: make_literal_word("a") },
                    BraceItem::Word { word: make_literal_word("b") },
                ],
            })],
        };
        let result = expand_word_with_glob(&mut state, &word, None);
        assert_eq!(result.split_words, Some(vec!["a".to_string(), "b".to_string()]));
    }
}
