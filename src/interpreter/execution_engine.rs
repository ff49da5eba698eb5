//! Execution Engine
//!
//! The core execution engine that ties all interpreter components together.
//! Implements the full AST execution chain:
//!
//! execute_script -> execute_statement -> execute_pipeline -> execute_command

use std::collections::{HashMap, HashSet};
use crate::ast::types::{
    CaseTerminator, CommandNode, CompoundCommandNode, PipelineNode, RedirectionTarget, ScriptNode,
    SimpleCommandNode, StatementNode, StatementOperator, WordNode,
};
use crate::interpreter::alias_expansion::{expand_alias, AliasExpansionContext, AliasExpansionResult};
use crate::interpreter::command_resolution::{build_command_path, is_path_command, split_path, DEFAULT_PATH};
use crate::interpreter::conditionals::{evaluate_shell_option, match_pattern};
use crate::interpreter::errors::{InterpreterError, ErrexitError, ExitError, ControlFlowError};
use crate::interpreter::functions::{call_function, get_function};
use crate::interpreter::helpers::loop_helpers::{handle_loop_error, LoopAction};
use crate::interpreter::helpers::file_tests::FileTestOperator;
use crate::interpreter::helpers::numeric_compare::{compare_numeric, NumericOp};
use crate::interpreter::helpers::string_compare::{compare_strings, StringCompareOp};
use crate::interpreter::interpreter::{
    build_exported_env, check_command_limit, should_trigger_errexit, update_exit_code,
    FileSystem as SyncFileSystem,
};
use crate::interpreter::pipeline_execution::{execute_pipeline, PipelineOptions, PipelineState, set_pipestatus};
use crate::interpreter::redirections::{
    apply_redirections, process_fd_variable_redirections, resolve_stdin_redirections,
};
use crate::interpreter::simple_command_assignments::process_assignments;
use crate::interpreter::subshell_group::{execute_group, execute_subshell};
use crate::interpreter::types::{ExecResult, ExecutionLimits, InterpreterState};
use crate::interpreter::word_expansion::{expand_word, expand_word_with_glob, ExecScriptFn};

/// Outcome of running one iteration of a loop body.
enum LoopBodyOutcome {
    /// Stop the loop entirely.
    Break,
    /// Proceed to the next iteration (condition check / update expression).
    Continue,
}

/// Run one pass of `printf`'s FORMAT over `params[cursor..]`, consuming one
/// parameter per conversion specifier (`%s %d %i %o %x %X %c %b %q`, plus
/// `%%` and C-style backslash escapes outside conversions). Returns the
/// rendered chunk, how many params it consumed, and whether it contained at
/// least one conversion (reused to decide whether FORMAT should repeat for
/// any remaining params, matching bash's printf(1) recycling behavior).
fn render_printf_pass(format: &str, params: &[String], cursor: usize) -> (String, usize, bool) {
    let mut out = String::new();
    let mut consumed = 0usize;
    let mut saw_conversion = false;
    let mut next_arg = || {
        let arg = params.get(cursor + consumed).cloned().unwrap_or_default();
        consumed += 1;
        arg
    };

    let chars: Vec<char> = format.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                let (decoded, skip) = decode_backslash_escape(&chars[i + 1..]);
                out.push_str(&decoded);
                i += 1 + skip;
            }
            '%' if i + 1 < chars.len() => {
                let mut j = i + 1;
                while j < chars.len() && matches!(chars[j], '-' | '+' | '0' | ' ' | '#') {
                    j += 1;
                }
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                if j < chars.len() && chars[j] == '.' {
                    j += 1;
                    while j < chars.len() && chars[j].is_ascii_digit() {
                        j += 1;
                    }
                }
                if j >= chars.len() {
                    out.push('%');
                    i += 1;
                    continue;
                }
                let spec: String = chars[i..=j].iter().collect();
                match chars[j] {
                    '%' => out.push('%'),
                    's' => {
                        saw_conversion = true;
                        out.push_str(&next_arg());
                    }
                    'd' | 'i' => {
                        saw_conversion = true;
                        let value: i64 = next_arg().trim().parse().unwrap_or(0);
                        out.push_str(&value.to_string());
                    }
                    'o' => {
                        saw_conversion = true;
                        let value: i64 = next_arg().trim().parse().unwrap_or(0);
                        out.push_str(&format!("{:o}", value));
                    }
                    'x' => {
                        saw_conversion = true;
                        let value: i64 = next_arg().trim().parse().unwrap_or(0);
                        out.push_str(&format!("{:x}", value));
                    }
                    'X' => {
                        saw_conversion = true;
                        let value: i64 = next_arg().trim().parse().unwrap_or(0);
                        out.push_str(&format!("{:X}", value));
                    }
                    'c' => {
                        saw_conversion = true;
                        if let Some(ch) = next_arg().chars().next() {
                            out.push(ch);
                        }
                    }
                    'b' => {
                        saw_conversion = true;
                        let raw = next_arg();
                        let raw_chars: Vec<char> = raw.chars().collect();
                        let mut k = 0;
                        while k < raw_chars.len() {
                            if raw_chars[k] == '\\' && k + 1 < raw_chars.len() {
                                let (decoded, skip) = decode_backslash_escape(&raw_chars[k + 1..]);
                                out.push_str(&decoded);
                                k += 1 + skip;
                            } else {
                                out.push(raw_chars[k]);
                                k += 1;
                            }
                        }
                    }
                    'q' => {
                        saw_conversion = true;
                        let raw = next_arg();
                        out.push('\'');
                        out.push_str(&raw.replace('\'', "'\\''"));
                        out.push('\'');
                    }
                    _ => out.push_str(&spec),
                }
                i = j + 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    (out, consumed, saw_conversion)
}

/// Decode a single backslash escape starting right after the `\`. Returns
/// the decoded text and how many source characters (after the backslash)
/// it consumed.
fn decode_backslash_escape(rest: &[char]) -> (String, usize) {
    match rest.first() {
        Some('n') => ("\n".to_string(), 1),
        Some('t') => ("\t".to_string(), 1),
        Some('r') => ("\r".to_string(), 1),
        Some('\\') => ("\\".to_string(), 1),
        Some('a') => ("\u{07}".to_string(), 1),
        Some('b') => ("\u{08}".to_string(), 1),
        Some('f') => ("\u{0C}".to_string(), 1),
        Some('v') => ("\u{0B}".to_string(), 1),
        Some('0') => {
            let digits: String = rest[1..].iter().take(3).take_while(|c| c.is_digit(8)).collect();
            let n = digits.len();
            let value = u8::from_str_radix(&digits, 8).unwrap_or(0);
            ((value as char).to_string(), 1 + n)
        }
        Some('x') => {
            let digits: String = rest[1..].iter().take(2).take_while(|c| c.is_ascii_hexdigit()).collect();
            let n = digits.len();
            if n == 0 {
                ("\\x".to_string(), 1)
            } else {
                let value = u8::from_str_radix(&digits, 16).unwrap_or(0);
                ((value as char).to_string(), 1 + n)
            }
        }
        Some(other) => (other.to_string(), 1),
        None => (String::new(), 0),
    }
}

/// The execution engine that ties all interpreter components together.
pub struct ExecutionEngine<'a> {
    /// Execution limits (max commands, recursion depth, iterations)
    pub limits: &'a ExecutionLimits,
    /// Sync filesystem interface
    pub fs: &'a dyn SyncFileSystem,
    /// Non-builtin external command registry, consulted after builtins and
    /// shell functions have both missed a name.
    registry: Option<&'a crate::commands::CommandRegistry>,
    /// Async filesystem handle, needed only to build a `CommandContext` for
    /// registry dispatch; bridged back to sync via `block_in_place`.
    async_fs: Option<std::sync::Arc<dyn crate::fs::FileSystem>>,
    /// Tokio handle used to run registry commands (async) from this
    /// otherwise-synchronous engine.
    runtime_handle: Option<tokio::runtime::Handle>,
}

impl<'a> ExecutionEngine<'a> {
    /// Create a new execution engine.
    pub fn new(limits: &'a ExecutionLimits, fs: &'a dyn SyncFileSystem) -> Self {
        Self { limits, fs, registry: None, async_fs: None, runtime_handle: None }
    }

    /// Attach a non-builtin command registry and the async filesystem/
    /// runtime handle needed to dispatch into it. Without this, unresolved
    /// commands simply report "not found" against `PATH`.
    pub fn with_commands(
        mut self,
        registry: &'a crate::commands::CommandRegistry,
        async_fs: std::sync::Arc<dyn crate::fs::FileSystem>,
        runtime_handle: tokio::runtime::Handle,
    ) -> Self {
        self.registry = Some(registry);
        self.async_fs = Some(async_fs);
        self.runtime_handle = Some(runtime_handle);
        self
    }

    /// Build the callback threaded into word expansion for command
    /// substitution and `${var:=default}`/`${var?msg}` side effects.
    /// Any control-flow error raised inside the substituted script (in
    /// particular `exit`) is folded into a normal `ExecResult` rather than
    /// propagated, matching bash running a command substitution in a
    /// conceptual subshell.
    fn exec_script_fn(&self) -> impl Fn(&mut InterpreterState, &ScriptNode) -> ExecResult + '_ {
        move |state, script| match self.execute_script(state, script) {
            Ok(result) => result,
            Err(InterpreterError::Exit(e)) => ExecResult::new(e.stdout, e.stderr, e.exit_code),
            Err(InterpreterError::Errexit(e)) => ExecResult::new(e.stdout, e.stderr, e.exit_code),
            Err(InterpreterError::Nounset(e)) => ExecResult::new(e.stdout, e.stderr, 1),
            Err(e) => ExecResult::new(String::new(), format!("{}\n", e), 1),
        }
    }

    /// Execute a complete script (list of statements).
    pub fn execute_script(
        &self,
        state: &mut InterpreterState,
        ast: &ScriptNode,
    ) -> Result<ExecResult, InterpreterError> {
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;

        for statement in &ast.statements {
            match self.execute_statement(state, statement) {
                Ok(result) => {
                    stdout.push_str(&result.stdout);
                    stderr.push_str(&result.stderr);
                    exit_code = result.exit_code;
                    update_exit_code(state, exit_code);
                }
                Err(InterpreterError::Exit(e)) => {
                    // ExitError propagates up to terminate the script
                    let mut err = e;
                    err.prepend_output(&stdout, &stderr);
                    return Err(InterpreterError::Exit(err));
                }
                Err(InterpreterError::ExecutionLimit(e)) => {
                    // ExecutionLimitError must always propagate
                    return Err(InterpreterError::ExecutionLimit(e));
                }
                Err(InterpreterError::Errexit(e)) => {
                    // Errexit terminates the script
                    stdout.push_str(&e.stdout);
                    stderr.push_str(&e.stderr);
                    exit_code = e.exit_code;
                    return Ok(ExecResult::new(stdout, stderr, exit_code));
                }
                Err(InterpreterError::Break(mut e)) => {
                    // Break/continue outside loops - silently continue
                    e.prepend_output(&stdout, &stderr);
                    stdout = e.stdout.clone();
                    stderr = e.stderr.clone();
                    continue;
                }
                Err(InterpreterError::Continue(mut e)) => {
                    e.prepend_output(&stdout, &stderr);
                    stdout = e.stdout.clone();
                    stderr = e.stderr.clone();
                    continue;
                }
                Err(InterpreterError::Return(mut e)) => {
                    // Return outside function - propagate
                    e.prepend_output(&stdout, &stderr);
                    return Err(InterpreterError::Return(e));
                }
                Err(InterpreterError::Nounset(e)) => {
                    stdout.push_str(&e.stdout);
                    stderr.push_str(&e.stderr);
                    exit_code = 1;
                }
                Err(e) => {
                    // Other errors - convert to result
                    stderr.push_str(&format!("{}\n", e));
                    exit_code = 1;
                }
            }
        }

        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    /// Execute a single statement (list of pipelines with && || operators).
    pub fn execute_statement(
        &self,
        state: &mut InterpreterState,
        stmt: &StatementNode,
    ) -> Result<ExecResult, InterpreterError> {
        // Handle deferred syntax errors
        if let Some(ref err) = stmt.deferred_error {
            return Ok(ExecResult::new(
                String::new(),
                format!("bash: syntax error near unexpected token `{}'\n", err.token),
                2,
            ));
        }

        // noexec mode (set -n): parse but don't execute
        if state.options.noexec {
            return Ok(ExecResult::ok());
        }

        // Reset errexit_safe at start of each statement
        state.errexit_safe = Some(false);

        let mut stdout = String::new();
        let mut stderr = String::new();

        // verbose mode (set -v): print source before execution
        if state.options.verbose {
            if let Some(ref source) = stmt.source_text {
                stderr.push_str(source);
                stderr.push('\n');
            }
        }

        let mut exit_code = 0;
        let mut last_executed_index: i32 = -1;
        let mut last_pipeline_negated = false;

        for (i, pipeline) in stmt.pipelines.iter().enumerate() {
            // Check && / || short-circuit
            if i > 0 {
                let op = &stmt.operators[i - 1];
                match op {
                    StatementOperator::And => {
                        if exit_code != 0 {
                            continue;
                        }
                    }
                    StatementOperator::Or => {
                        if exit_code == 0 {
                            continue;
                        }
                    }
                    StatementOperator::Semi => {
                        // Always execute
                    }
                }
            }

            let result = self.execute_pipeline_node(state, pipeline)?;
            stdout.push_str(&result.stdout);
            stderr.push_str(&result.stderr);
            exit_code = result.exit_code;
            last_executed_index = i as i32;
            last_pipeline_negated = pipeline.negated;

            update_exit_code(state, exit_code);
        }

        // Check errexit
        let was_short_circuited = last_executed_index < (stmt.pipelines.len() as i32 - 1);
        let inner_was_safe = state.errexit_safe.unwrap_or(false);

        if should_trigger_errexit(state, exit_code, was_short_circuited, last_pipeline_negated)
            && !inner_was_safe
        {
            return Err(InterpreterError::Errexit(ErrexitError::new(
                exit_code, stdout, stderr,
            )));
        }

        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    /// Execute a pipeline (list of commands connected by |).
    pub fn execute_pipeline_node(
        &self,
        state: &mut InterpreterState,
        pipeline: &PipelineNode,
    ) -> Result<ExecResult, InterpreterError> {
        let mut pipe_state = PipelineState::new();
        let pipe_stderr = pipeline.pipe_stderr.clone().unwrap_or_default();

        let options = PipelineOptions {
            pipefail: state.options.pipefail,
            lastpipe: state.shopt_options.lastpipe,
            runs_in_subshell: false,
            time_pipeline: pipeline.timed,
            time_posix_format: pipeline.time_posix,
        };

        // We need to pass state through the closure, but execute_pipeline
        // takes ownership of the closure. Use a RefCell pattern.
        use std::cell::RefCell;
        let state_cell = RefCell::new(state);

        let result = execute_pipeline(
            &mut pipe_state,
            &pipeline.commands,
            &pipe_stderr,
            &options,
            |cmd, stdin| {
                let state = &mut *state_cell.borrow_mut();
                self.execute_command(state, cmd, stdin)
            },
        )?;

        // Get state back
        let state = state_cell.into_inner();

        // Set PIPESTATUS
        set_pipestatus(&mut state.env, &result.pipestatus);

        let mut exec_result = result.to_exec_result();

        // Handle negation
        if pipeline.negated {
            exec_result.exit_code = if exec_result.exit_code == 0 { 1 } else { 0 };
        }

        Ok(exec_result)
    }

    /// Execute a single command.
    pub fn execute_command(
        &self,
        state: &mut InterpreterState,
        cmd: &CommandNode,
        stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        // Check command limit
        if let Some(msg) = check_command_limit(state, self.limits) {
            return Err(InterpreterError::ExecutionLimit(
                crate::interpreter::errors::ExecutionLimitError::simple(
                    msg,
                    crate::interpreter::errors::LimitType::Commands,
                ),
            ));
        }

        match cmd {
            CommandNode::Simple(simple) => self.execute_simple_command(state, simple, stdin),
            CommandNode::Compound(compound) => {
                self.execute_compound_command(state, compound, stdin)
            }
            CommandNode::FunctionDef(func_def) => {
                let current_source = state.current_source.clone();
                execute_function_def(state, func_def, current_source.as_deref())
                    .map_err(InterpreterError::Exit)
            }
        }
    }

    /// Execute a simple command (name + args + redirections).
    ///
    /// Ordering mirrors bash: alias expansion, assignment processing,
    /// word expansion of the command name and arguments, builtin dispatch,
    /// function dispatch, external command resolution, then redirections.
    pub fn execute_simple_command(
        &self,
        state: &mut InterpreterState,
        cmd: &SimpleCommandNode,
        stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        if let Some(line) = cmd.line {
            state.current_line = line as u32;
        }

        // Alias expansion only applies to a literal, unquoted command name.
        // Loop to follow chains of aliases (`alias ll='ls -la'; alias ls='ls --color'`);
        // the shared recursion-guard stack stops self-referential aliases.
        let mut alias_stack = HashSet::new();
        let mut owned: Option<SimpleCommandNode> = None;
        loop {
            let current: &SimpleCommandNode = owned.as_ref().unwrap_or(cmd);
            if current.name.is_none() {
                break;
            }
            let ctx = AliasExpansionContext { env: &state.env };
            match expand_alias(&ctx, current, &mut alias_stack) {
                AliasExpansionResult::Expanded(new_node) => {
                    owned = Some(new_node);
                }
                AliasExpansionResult::ComplexAlias(command_str) => {
                    let ast = crate::parser::parse(&command_str).map_err(|e| {
                        InterpreterError::Exit(ExitError::new(
                            2,
                            String::new(),
                            format!("bash: alias: {}\n", e),
                        ))
                    })?;
                    return self.execute_script(state, &ast);
                }
                AliasExpansionResult::ParseError(msg) => {
                    return Ok(ExecResult::new(
                        String::new(),
                        format!("bash: alias: {}\n", msg),
                        2,
                    ));
                }
                AliasExpansionResult::NoExpansion => break,
            }
        }
        let cmd: &SimpleCommandNode = owned.as_ref().unwrap_or(cmd);

        let exec_closure = self.exec_script_fn();
        let expand_word_fn = |state: &mut InterpreterState, word: &WordNode| -> String {
            expand_word(state, word, Some(&exec_closure)).value
        };

        // Process variable assignments (both prefix bindings on a command
        // and assignment-only statements like `FOO=bar`).
        let assignment_result = process_assignments(state, cmd, expand_word_fn);
        if let Some(error) = assignment_result.error {
            return Ok(error);
        }

        let cmd_name = match &cmd.name {
            Some(word) => {
                let expanded = expand_word(state, word, Some(&exec_closure));
                if let Some(err) = expanded.nounset_error {
                    return Err(InterpreterError::Nounset(err));
                }
                expanded.value
            }
            None => {
                // Assignment-only command: prefix bindings are permanent here.
                return Ok(ExecResult::ok());
            }
        };

        let mut args: Vec<String> = Vec::new();
        for arg in &cmd.args {
            let result = expand_word_with_glob(state, arg, Some(&exec_closure));
            if let Some(err) = result.nounset_error {
                return Err(InterpreterError::Nounset(err));
            }
            let words = result.split_words.unwrap_or_else(|| vec![result.value]);
            for word in words {
                args.extend(self.expand_pathname(state, &word));
            }
        }

        let restore_temp_assignments = |state: &mut InterpreterState| {
            for (name, original) in &assignment_result.temp_assignments {
                match original {
                    Some(v) => { state.env.insert(name.clone(), v.clone()); }
                    None => { state.env.remove(name); }
                }
            }
        };

        if let Some(error) = process_fd_variable_redirections(state, &cmd.redirections, expand_word_fn) {
            restore_temp_assignments(state);
            return Ok(error);
        }

        let stdin_redirect = resolve_stdin_redirections(state, self.fs, &cmd.redirections, expand_word_fn);
        if let Some(error) = stdin_redirect.error {
            restore_temp_assignments(state);
            return Ok(error);
        }
        let effective_stdin = stdin_redirect.stdin.unwrap_or_else(|| stdin.to_string());

        let result = self.dispatch_command(state, &cmd_name, &args, &effective_stdin);

        if !assignment_result.temp_assignments.is_empty() {
            restore_temp_assignments(state);
        }

        let result = result?;

        let pre_expanded = crate::interpreter::redirections::pre_expand_redirect_targets(
            state,
            &cmd.redirections,
            |state, word| expand_word_fn(state, word),
        );
        Ok(apply_redirections(
            state,
            self.fs,
            result,
            &cmd.redirections,
            Some(&pre_expanded.targets),
            expand_word_fn,
        ))
    }

    /// Expand a pathname glob pattern against the virtual filesystem. Words
    /// without glob metacharacters (or when `noglob`/`set -f` is active)
    /// pass through unchanged; a pattern with no matches falls back to the
    /// literal pattern unless `nullglob` is set.
    fn expand_pathname(&self, state: &InterpreterState, word: &str) -> Vec<String> {
        if state.options.noglob || !word.chars().any(|c| matches!(c, '*' | '?' | '[')) {
            return vec![word.to_string()];
        }
        match self.fs.glob(word, &state.cwd) {
            Ok(mut matches) if !matches.is_empty() => {
                matches.sort();
                matches
            }
            _ => {
                if state.shopt_options.nullglob {
                    Vec::new()
                } else {
                    vec![word.to_string()]
                }
            }
        }
    }

    /// Run a condition list (the test clause of `if`/`while`/`until`),
    /// toggling `in_condition` so errexit is suppressed the way bash
    /// suppresses it for the condition of a compound command.
    fn run_condition(
        &self,
        state: &mut InterpreterState,
        condition: &[StatementNode],
        stdout: &mut String,
        stderr: &mut String,
    ) -> Result<i32, InterpreterError> {
        let was_in_condition = state.in_condition;
        state.in_condition = true;
        let mut exit_code = 0;
        for stmt in condition {
            match self.execute_statement(state, stmt) {
                Ok(res) => {
                    stdout.push_str(&res.stdout);
                    stderr.push_str(&res.stderr);
                    exit_code = res.exit_code;
                }
                Err(e) => {
                    state.in_condition = was_in_condition;
                    return Err(e);
                }
            }
        }
        state.in_condition = was_in_condition;
        Ok(exit_code)
    }

    /// Run one iteration of a loop body, translating `break`/`continue`
    /// into a `LoopBodyOutcome` via `handle_loop_error` and propagating
    /// everything else (`return`, `errexit`, `exit`, execution limits).
    fn execute_loop_body(
        &self,
        state: &mut InterpreterState,
        body: &[StatementNode],
        stdout: &mut String,
        stderr: &mut String,
        exit_code: &mut i32,
    ) -> Result<LoopBodyOutcome, InterpreterError> {
        state.loop_depth += 1;
        for stmt in body {
            match self.execute_statement(state, stmt) {
                Ok(res) => {
                    stdout.push_str(&res.stdout);
                    stderr.push_str(&res.stderr);
                    *exit_code = res.exit_code;
                }
                Err(e) => {
                    let taken_stdout = std::mem::take(stdout);
                    let taken_stderr = std::mem::take(stderr);
                    let result = handle_loop_error(e, taken_stdout, taken_stderr, state.loop_depth);
                    *stdout = result.stdout;
                    *stderr = result.stderr;
                    state.loop_depth -= 1;
                    return match result.action {
                        LoopAction::Break => Ok(LoopBodyOutcome::Break),
                        LoopAction::Continue => Ok(LoopBodyOutcome::Continue),
                        LoopAction::Error => {
                            *exit_code = result.exit_code.unwrap_or(1);
                            Ok(LoopBodyOutcome::Continue)
                        }
                        LoopAction::Rethrow => Err(result.error.expect("rethrow carries an error")),
                    };
                }
            }
        }
        state.loop_depth -= 1;
        Ok(LoopBodyOutcome::Continue)
    }

    /// Resolve and execute `cmd_name` with `args`/`stdin` as a builtin, a
    /// shell function, or an external command found on `PATH`.
    fn dispatch_command(
        &self,
        state: &mut InterpreterState,
        cmd_name: &str,
        args: &[String],
        stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        use crate::interpreter::builtins as b;

        fn br(r: b::BuiltinResult) -> ExecResult {
            ExecResult::new(r.stdout, r.stderr, r.exit_code)
        }

        match cmd_name {
            "echo" => {
                let output = if args.is_empty() {
                    "\n".to_string()
                } else {
                    format!("{}\n", args.join(" "))
                };
                Ok(ExecResult::new(output, String::new(), 0))
            }
            "true" | ":" => Ok(ExecResult::ok()),
            "false" => Ok(ExecResult::new(String::new(), String::new(), 1)),
            "exit" => {
                let code = args.first()
                    .and_then(|s| s.parse::<i32>().ok())
                    .unwrap_or(state.last_exit_code);
                Err(InterpreterError::Exit(ExitError::new(code, String::new(), String::new())))
            }
            "cd" => Ok(self.builtin_cd(state, args)),
            "pwd" => Ok(ExecResult::new(format!("{}\n", state.cwd), String::new(), 0)),
            "export" => Ok(br(b::handle_export(state, args))),
            "unset" => Ok(b::handle_unset(state, args)),
            "readonly" => Ok(br(b::handle_readonly(state, args))),
            "declare" | "typeset" => Ok(br(b::handle_declare(state, args))),
            "local" => Ok(b::handle_local(state, args)),
            "let" => Ok(br(b::handle_let(state, args))),
            "read" => Ok(br(b::handle_read(state, args, stdin, 0))),
            "mapfile" | "readarray" => Ok(br(b::handle_mapfile(state, args, stdin))),
            "shift" => b::handle_shift(state, args).map(br),
            "set" => b::handle_set(state, args).map(br),
            "break" => b::handle_break(state, args).map(br).map_err(Into::into),
            "continue" => b::handle_continue(state, args).map(br).map_err(Into::into),
            "return" => b::handle_return(state, args).map(br),
            "getopts" => Ok(br(b::handle_getopts(state, args))),
            "hash" => Ok(br(b::handle_hash(state, args))),
            "help" => Ok(br(b::handle_help(args))),
            "dirs" => Ok(br(b::handle_dirs(state, args))),
            "pushd" => Ok(br(b::handle_pushd(state, args))),
            "popd" => Ok(br(b::handle_popd(state, args))),
            "shopt" => Ok(br(b::handle_shopt(state, args))),
            "compgen" => Ok(br(b::handle_compgen(state, args))),
            "complete" => Ok(br(b::handle_complete(state, args))),
            "compopt" => Ok(br(b::handle_compopt(state, args))),
            "eval" => self.builtin_eval(state, args, stdin),
            "source" | "." => self.builtin_source(state, args),
            "test" | "[" => Ok(self.builtin_test(state, cmd_name, args)),
            "printf" => Ok(self.builtin_printf(args)),
            "alias" => Ok(self.builtin_alias(state, args)),
            "unalias" => Ok(self.builtin_unalias(state, args)),
            "trap" => Ok(self.builtin_trap(state, args)),
            "type" => Ok(self.builtin_type(state, args)),
            "command" => self.builtin_command(state, args, stdin),
            "builtin" => {
                if let Some((name, rest)) = args.split_first() {
                    self.dispatch_command(state, name, rest, stdin)
                } else {
                    Ok(ExecResult::ok())
                }
            }
            _ => {
                if let Some(func) = get_function(state, cmd_name).cloned() {
                    return call_function(
                        state,
                        &func,
                        args,
                        stdin,
                        Some(state.current_line),
                        self.limits.max_recursion_depth,
                        |state, stdin| self.execute_compound_command(state, &func.body, stdin),
                    );
                }
                self.execute_external(state, cmd_name, args, stdin)
            }
        }
    }

    fn builtin_cd(&self, state: &mut InterpreterState, args: &[String]) -> ExecResult {
        let positional = args.iter().find(|a| !a.starts_with('-'));
        let target = match positional.map(|s| s.as_str()) {
            Some("-") => {
                if state.previous_dir.is_empty() {
                    return ExecResult::new(String::new(), "bash: cd: OLDPWD not set\n".to_string(), 1);
                }
                state.previous_dir.clone()
            }
            Some(t) if t.starts_with('~') => {
                let home = state.env.get("HOME").cloned().unwrap_or_else(|| "/".to_string());
                format!("{}{}", home, &t[1..])
            }
            Some(t) => t.to_string(),
            None => state.env.get("HOME").cloned().unwrap_or_else(|| "/".to_string()),
        };

        let new_cwd = if target.starts_with('/') {
            target.clone()
        } else {
            self.fs.resolve_path(&state.cwd, &target)
        };

        if !self.fs.exists(&new_cwd) {
            return ExecResult::new(String::new(), format!("bash: cd: {}: No such file or directory\n", target), 1);
        }
        if !self.fs.is_dir(&new_cwd) {
            return ExecResult::new(String::new(), format!("bash: cd: {}: Not a directory\n", target), 1);
        }

        let old_cwd = state.cwd.clone();
        state.previous_dir = old_cwd.clone();
        state.cwd = new_cwd.clone();
        state.env.insert("OLDPWD".to_string(), old_cwd);
        state.env.insert("PWD".to_string(), new_cwd);
        ExecResult::ok()
    }

    /// `eval arg...`: re-parse and execute the joined arguments in the
    /// current shell state (no subshell).
    fn builtin_eval(&self, state: &mut InterpreterState, args: &[String], stdin: &str) -> Result<ExecResult, InterpreterError> {
        use crate::interpreter::builtins::{handle_eval_parse, prepare_eval_stdin, restore_eval_stdin};

        let cmd = match handle_eval_parse(args) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => return Ok(ExecResult::ok()),
            Err((stdout, stderr, exit_code)) => return Ok(ExecResult::new(stdout, stderr, exit_code)),
        };

        let saved_stdin = prepare_eval_stdin(state, cmd.stdin.as_deref().or(Some(stdin)));
        let ast = match crate::parser::parse(&cmd.command) {
            Ok(ast) => ast,
            Err(e) => {
                restore_eval_stdin(state, saved_stdin);
                return Ok(ExecResult::new(String::new(), format!("bash: eval: {}\n", e), 2));
            }
        };
        let result = self.execute_script(state, &ast);
        restore_eval_stdin(state, saved_stdin);
        result
    }

    /// `source file [args...]` / `. file [args...]`.
    fn builtin_source(&self, state: &mut InterpreterState, args: &[String]) -> Result<ExecResult, InterpreterError> {
        use crate::interpreter::builtins::{
            handle_source_parse, prepare_source_state, resolve_source_paths, restore_source_state,
            source_file_not_found,
        };

        let cmd = match handle_source_parse(args) {
            Ok(cmd) => cmd,
            Err((stdout, stderr, exit_code)) => return Ok(ExecResult::new(stdout, stderr, exit_code)),
        };

        let path_env = state.env.get("PATH").cloned();
        let candidates = resolve_source_paths(&state.cwd, &cmd.filename, path_env.as_deref());
        let found = candidates.iter().find(|p| self.fs.is_file(p));
        let Some(path) = found.cloned() else {
            return Ok(source_file_not_found(&cmd.filename));
        };

        let content = match self.fs.read_file(&path) {
            Ok(content) => content,
            Err(e) => return Ok(ExecResult::new(String::new(), format!("bash: source: {}: {}\n", path, e), 1)),
        };

        let ast = match crate::parser::parse(&content) {
            Ok(ast) => ast,
            Err(e) => return Ok(ExecResult::new(String::new(), format!("bash: {}: {}\n", path, e), 2)),
        };

        // prepare_source_state already records the new BASH_SOURCE context.
        let mut cmd = cmd;
        cmd.filename = path;
        let saved = prepare_source_state(state, &cmd);
        let result = self.execute_script(state, &ast);
        restore_source_state(state, saved);
        result
    }

    /// `printf FORMAT [ARG...]` - C-style formatted output, reusing ARGs when
    /// the format string contains more conversions than arguments supplied.
    fn builtin_printf(&self, args: &[String]) -> ExecResult {
        if args.is_empty() {
            return ExecResult::new(String::new(), "bash: printf: usage: printf format [arguments]\n".to_string(), 2);
        }
        let format = &args[0];
        let params = &args[1..];
        let mut out = String::new();
        let mut cursor = 0usize;

        loop {
            let (chunk, consumed, used_any_conversion) = render_printf_pass(format, params, cursor);
            out.push_str(&chunk);
            cursor += consumed;
            if !used_any_conversion || cursor >= params.len() {
                break;
            }
        }

        ExecResult::new(out, String::new(), 0)
    }

    /// `alias [name[=value] ...]` - define or list aliases (non-interactive
    /// scripts never expand them unless `shopt -s expand_aliases` is set).
    fn builtin_alias(&self, state: &mut InterpreterState, args: &[String]) -> ExecResult {
        if args.is_empty() {
            let mut out = String::new();
            if let Some(ref aliases) = state.aliases {
                let mut names: Vec<&String> = aliases.keys().collect();
                names.sort();
                for name in names {
                    out.push_str(&format!("alias {}='{}'\n", name, aliases[name]));
                }
            }
            return ExecResult::new(out, String::new(), 0);
        }

        let mut out = String::new();
        let mut err = String::new();
        let mut exit_code = 0;
        for arg in args {
            if let Some((name, value)) = arg.split_once('=') {
                state.aliases.get_or_insert_with(HashMap::new).insert(name.to_string(), value.to_string());
            } else if let Some(aliases) = &state.aliases {
                if let Some(value) = aliases.get(arg) {
                    out.push_str(&format!("alias {}='{}'\n", arg, value));
                } else {
                    err.push_str(&format!("bash: alias: {}: not found\n", arg));
                    exit_code = 1;
                }
            } else {
                err.push_str(&format!("bash: alias: {}: not found\n", arg));
                exit_code = 1;
            }
        }
        ExecResult::new(out, err, exit_code)
    }

    /// `unalias [-a] name ...` - remove alias definitions.
    fn builtin_unalias(&self, state: &mut InterpreterState, args: &[String]) -> ExecResult {
        if args.iter().any(|a| a == "-a") {
            state.aliases = None;
            return ExecResult::ok();
        }
        let mut err = String::new();
        let mut exit_code = 0;
        for name in args {
            let removed = state.aliases.as_mut().map(|a| a.remove(name).is_some()).unwrap_or(false);
            if !removed {
                err.push_str(&format!("bash: unalias: {}: not found\n", name));
                exit_code = 1;
            }
        }
        ExecResult::new(String::new(), err, exit_code)
    }

    /// `trap [CMD] SIGSPEC...` - store trap bindings. Handlers are accepted
    /// and recorded but never invoked (see DESIGN.md Open Question #2).
    fn builtin_trap(&self, state: &mut InterpreterState, args: &[String]) -> ExecResult {
        if args.is_empty() {
            let mut out = String::new();
            if let Some(ref traps) = state.traps {
                let mut sigs: Vec<&String> = traps.keys().collect();
                sigs.sort();
                for sig in sigs {
                    out.push_str(&format!("trap -- '{}' {}\n", traps[sig], sig));
                }
            }
            return ExecResult::new(out, String::new(), 0);
        }
        if args[0] == "-p" {
            return self.builtin_trap(state, &[]);
        }
        if args.len() >= 2 {
            let cmd = args[0].clone();
            for sig in &args[1..] {
                if cmd == "-" {
                    state.traps.as_mut().map(|t| t.remove(sig));
                } else {
                    state.traps.get_or_insert_with(HashMap::new).insert(sig.clone(), cmd.clone());
                }
            }
        }
        ExecResult::ok()
    }

    /// `type`/`command -v|-V` - name resolution utilities over functions,
    /// aliases, keywords, builtins, and PATH.
    fn builtin_type(&self, state: &InterpreterState, args: &[String]) -> ExecResult {
        use crate::interpreter::type_command::{handle_type, TypeCommandContext};

        let ctx = TypeCommandContext { state };
        let find_first = |name: &str| self.resolve_in_path(state, name);
        let find_all = |name: &str| self.resolve_all_in_path(state, name);
        handle_type(&ctx, args, find_first, find_all)
    }

    fn builtin_command(
        &self,
        state: &mut InterpreterState,
        args: &[String],
        stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        use crate::interpreter::type_command::{handle_command_v, TypeCommandContext};

        if args.iter().any(|a| a == "-v" || a == "-V") {
            let verbose = args.iter().any(|a| a == "-V");
            let show_path = args.iter().any(|a| a == "-p");
            let names: Vec<String> = args.iter().filter(|a| !a.starts_with('-')).cloned().collect();
            let ctx = TypeCommandContext { state };
            return Ok(handle_command_v(&ctx, &names, show_path, verbose));
        }

        // Plain `command [-p] NAME ARGS...` bypasses function lookup and
        // runs the external/builtin command directly.
        let rest: Vec<String> = args.iter().filter(|a| *a != "-p").cloned().collect();
        if let Some((name, rest_args)) = rest.split_first() {
            return self.dispatch_command(state, name, rest_args, stdin);
        }
        Ok(ExecResult::ok())
    }

    fn resolve_in_path(&self, state: &InterpreterState, name: &str) -> Option<String> {
        let path_env = state.env.get("PATH").cloned().unwrap_or_else(|| DEFAULT_PATH.to_string());
        for dir in split_path(&path_env) {
            let candidate = build_command_path(dir, name);
            if self.fs.exists(&candidate) && self.fs.is_file(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn resolve_all_in_path(&self, state: &InterpreterState, name: &str) -> Vec<String> {
        let path_env = state.env.get("PATH").cloned().unwrap_or_else(|| DEFAULT_PATH.to_string());
        split_path(&path_env)
            .into_iter()
            .map(|dir| build_command_path(dir, name))
            .filter(|candidate| self.fs.exists(candidate) && self.fs.is_file(candidate))
            .collect()
    }

    /// `test`/`[` - evaluate the classic single-bracket condition grammar.
    /// Supports unary file/string/numeric tests and the common binary forms;
    /// combinators (`-a`/`-o`) are left-associative as in POSIX test(1).
    fn builtin_test(&self, state: &InterpreterState, invoked_as: &str, args: &[String]) -> ExecResult {
        let mut args = args.to_vec();
        if invoked_as == "[" {
            match args.last() {
                Some(last) if last == "]" => { args.pop(); }
                _ => return ExecResult::new(String::new(), "bash: [: missing `]'\n".to_string(), 2),
            }
        }

        let ok = self.eval_test_args(state, &args);
        ExecResult::new(String::new(), String::new(), if ok { 0 } else { 1 })
    }

    fn eval_test_args(&self, state: &InterpreterState, args: &[String]) -> bool {
        match args.len() {
            0 => false,
            1 => !args[0].is_empty(),
            2 => {
                if args[0] == "!" {
                    !self.eval_test_args(state, &args[1..])
                } else if let Some(op) = FileTestOperator::from_str(&args[0]) {
                    self.eval_file_test(state, op, &args[1])
                } else {
                    !args[1].is_empty()
                }
            }
            3 => self.eval_test_binary(state, &args[0], &args[1], &args[2]),
            _ => {
                // `-a`/`-o` combine two test expressions; only the first
                // (leftmost) combinator in a longer chain is honored.
                if let Some(pos) = args.iter().position(|a| a == "-a" || a == "-o") {
                    let lhs = self.eval_test_args(state, &args[..pos]);
                    let rhs = self.eval_test_args(state, &args[pos + 1..]);
                    if args[pos] == "-a" { lhs && rhs } else { lhs || rhs }
                } else {
                    !args.last().map(|s| s.is_empty()).unwrap_or(true)
                }
            }
        }
    }

    fn eval_test_binary(&self, state: &InterpreterState, lhs: &str, op: &str, rhs: &str) -> bool {
        if let Some(numeric_op) = NumericOp::from_str(op) {
            let l = crate::interpreter::conditionals::parse_numeric(lhs);
            let r = crate::interpreter::conditionals::parse_numeric(rhs);
            return compare_numeric(numeric_op, l, r);
        }
        match op {
            "=" | "==" => compare_strings(StringCompareOp::Eq, lhs, rhs),
            "!=" => compare_strings(StringCompareOp::Ne, lhs, rhs),
            "-nt" => self.file_mtime(state, lhs) > self.file_mtime(state, rhs),
            "-ot" => self.file_mtime(state, lhs) < self.file_mtime(state, rhs),
            "-ef" => {
                let a = self.fs.resolve_path(&state.cwd, lhs);
                let b = self.fs.resolve_path(&state.cwd, rhs);
                a == b
            }
            _ => false,
        }
    }

    fn file_mtime(&self, state: &InterpreterState, path: &str) -> u64 {
        let resolved = self.fs.resolve_path(&state.cwd, path);
        self.fs.stat(&resolved).map(|s| s.mtime).unwrap_or(0)
    }

    fn eval_file_test(&self, state: &InterpreterState, op: FileTestOperator, operand: &str) -> bool {
        let path = self.fs.resolve_path(&state.cwd, operand);
        match op {
            FileTestOperator::Exists | FileTestOperator::ExistsDeprecated => self.fs.exists(&path),
            FileTestOperator::RegularFile => self.fs.is_file(&path),
            FileTestOperator::Directory => self.fs.is_dir(&path),
            FileTestOperator::Readable | FileTestOperator::Writable => self.fs.exists(&path),
            FileTestOperator::Executable => self.fs.stat(&path)
                .map(|s| s.mode & 0o111 != 0)
                .unwrap_or(false),
            FileTestOperator::NonEmpty => self.fs.stat(&path).map(|s| s.size > 0).unwrap_or(false),
            FileTestOperator::SymbolicLink | FileTestOperator::SymbolicLinkH => {
                self.fs.stat(&path).map(|s| s.is_symlink).unwrap_or(false)
            }
            FileTestOperator::Terminal => false,
            _ => self.fs.exists(&path),
        }
    }

    /// Evaluate a `[[ ... ]]` conditional expression tree.
    fn eval_cond_expr(
        &self,
        state: &mut InterpreterState,
        expr: &crate::ast::types::ConditionalExpressionNode,
    ) -> bool {
        use crate::ast::types::{CondBinaryOperator, CondUnaryOperator, ConditionalExpressionNode as Cond};

        let exec_closure = self.exec_script_fn();
        let mut expand = |state: &mut InterpreterState, word: &crate::ast::types::WordNode| {
            expand_word(state, word, Some(&exec_closure)).value
        };

        match expr {
            Cond::Word(w) => !expand(state, &w.word).is_empty(),
            Cond::Group(g) => self.eval_cond_expr(state, &g.expression),
            Cond::Not(n) => !self.eval_cond_expr(state, &n.operand),
            Cond::And(a) => self.eval_cond_expr(state, &a.left) && self.eval_cond_expr(state, &a.right),
            Cond::Or(o) => self.eval_cond_expr(state, &o.left) || self.eval_cond_expr(state, &o.right),
            Cond::Unary(u) => {
                let operand = expand(state, &u.operand);
                match u.operator {
                    CondUnaryOperator::Z => operand.is_empty(),
                    CondUnaryOperator::N => !operand.is_empty(),
                    CondUnaryOperator::A | CondUnaryOperator::E => self.fs.exists(&self.fs.resolve_path(&state.cwd, &operand)),
                    CondUnaryOperator::F => self.fs.is_file(&self.fs.resolve_path(&state.cwd, &operand)),
                    CondUnaryOperator::D => self.fs.is_dir(&self.fs.resolve_path(&state.cwd, &operand)),
                    CondUnaryOperator::R | CondUnaryOperator::W => self.fs.exists(&self.fs.resolve_path(&state.cwd, &operand)),
                    CondUnaryOperator::X => self.fs.stat(&self.fs.resolve_path(&state.cwd, &operand))
                        .map(|s| s.mode & 0o111 != 0).unwrap_or(false),
                    CondUnaryOperator::S => self.fs.stat(&self.fs.resolve_path(&state.cwd, &operand))
                        .map(|s| s.size > 0).unwrap_or(false),
                    CondUnaryOperator::L | CondUnaryOperator::H => self.fs.stat(&self.fs.resolve_path(&state.cwd, &operand))
                        .map(|s| s.is_symlink).unwrap_or(false),
                    CondUnaryOperator::T => false,
                    CondUnaryOperator::V => !operand.is_empty() && state.env.contains_key(&operand),
                    _ => false,
                }
            }
            Cond::Binary(b) => {
                let left = expand(state, &b.left);
                match b.operator {
                    CondBinaryOperator::Eq | CondBinaryOperator::EqEq => {
                        let pattern = expand(state, &b.right);
                        match_pattern(&left, &pattern, state.shopt_options.nocasematch, state.shopt_options.extglob)
                    }
                    CondBinaryOperator::Ne => {
                        let pattern = expand(state, &b.right);
                        !match_pattern(&left, &pattern, state.shopt_options.nocasematch, state.shopt_options.extglob)
                    }
                    CondBinaryOperator::Lt => left < expand(state, &b.right),
                    CondBinaryOperator::Gt => left > expand(state, &b.right),
                    CondBinaryOperator::NumEq | CondBinaryOperator::NumNe | CondBinaryOperator::NumLt
                    | CondBinaryOperator::NumLe | CondBinaryOperator::NumGt | CondBinaryOperator::NumGe => {
                        let right = expand(state, &b.right);
                        let l = crate::interpreter::conditionals::parse_numeric(&left);
                        let r = crate::interpreter::conditionals::parse_numeric(&right);
                        let op = match b.operator {
                            CondBinaryOperator::NumEq => NumericOp::Eq,
                            CondBinaryOperator::NumNe => NumericOp::Ne,
                            CondBinaryOperator::NumLt => NumericOp::Lt,
                            CondBinaryOperator::NumLe => NumericOp::Le,
                            CondBinaryOperator::NumGt => NumericOp::Gt,
                            _ => NumericOp::Ge,
                        };
                        compare_numeric(op, l, r)
                    }
                    CondBinaryOperator::Nt => self.file_mtime(state, &left) > self.file_mtime(state, &expand(state, &b.right)),
                    CondBinaryOperator::Ot => self.file_mtime(state, &left) < self.file_mtime(state, &expand(state, &b.right)),
                    CondBinaryOperator::Ef => {
                        let right = expand(state, &b.right);
                        self.fs.resolve_path(&state.cwd, &left) == self.fs.resolve_path(&state.cwd, &right)
                    }
                    CondBinaryOperator::Match => {
                        let pattern = expand(state, &b.right);
                        let regex_str = crate::interpreter::conditionals::posix_ere_to_regex(&pattern);
                        match regex_lite::Regex::new(&regex_str) {
                            Ok(re) => {
                                if let Some(caps) = re.captures(&left) {
                                    for i in 0..caps.len() {
                                        let value = caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default();
                                        crate::interpreter::helpers::array::set_array_element(
                                            &mut state.env, "BASH_REMATCH", i as i64, value,
                                        );
                                    }
                                    true
                                } else {
                                    false
                                }
                            }
                            Err(_) => false,
                        }
                    }
                }
            }
        }
    }

    /// Resolve `cmd_name` against `PATH` in the virtual filesystem and
    /// return 127 if nothing executable is found. No real external process
    /// execution is possible in this sandboxed interpreter, so a resolved
    /// script just reports that it was located but cannot be run natively.
    fn execute_external(
        &self,
        state: &mut InterpreterState,
        cmd_name: &str,
        args: &[String],
        stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        if let (Some(registry), Some(async_fs), Some(handle)) =
            (self.registry, &self.async_fs, &self.runtime_handle)
        {
            if let Some(command) = registry.get(cmd_name) {
                let ctx = crate::commands::CommandContext::new(
                    args.to_vec(),
                    stdin.to_string(),
                    state.cwd.clone(),
                    build_exported_env(state),
                    async_fs.clone(),
                );
                let result = tokio::task::block_in_place(|| handle.block_on(command.execute(ctx)));
                return Ok(ExecResult::new(result.stdout, result.stderr, result.exit_code));
            }
        }

        if is_path_command(cmd_name) {
            let path = self.fs.resolve_path(&state.cwd, cmd_name);
            if self.fs.exists(&path) && self.fs.is_file(&path) {
                return Ok(ExecResult::new(
                    String::new(),
                    format!("bash: {}: cannot execute binary file\n", cmd_name),
                    126,
                ));
            }
            return Ok(ExecResult::new(
                String::new(),
                format!("bash: {}: No such file or directory\n", cmd_name),
                127,
            ));
        }

        let path_env = state.env.get("PATH").cloned().unwrap_or_else(|| DEFAULT_PATH.to_string());
        for dir in split_path(&path_env) {
            let candidate = build_command_path(dir, cmd_name);
            if self.fs.exists(&candidate) && self.fs.is_file(&candidate) {
                return Ok(ExecResult::new(
                    String::new(),
                    format!("bash: {}: cannot execute binary file\n", cmd_name),
                    126,
                ));
            }
        }

        Ok(ExecResult::new(
            String::new(),
            format!("bash: {}: command not found\n", cmd_name),
            127,
        ))
    }

    /// Execute a compound command (if, for, while, etc.).
    pub fn execute_compound_command(
        &self,
        state: &mut InterpreterState,
        compound: &CompoundCommandNode,
        stdin: &str,
    ) -> Result<ExecResult, InterpreterError> {
        match compound {
            CompoundCommandNode::If(if_node) => {
                let mut stdout = String::new();
                let mut stderr = String::new();

                for clause in &if_node.clauses {
                    let cond_exit = self.run_condition(state, &clause.condition, &mut stdout, &mut stderr)?;
                    if cond_exit == 0 {
                        let mut exit_code = 0;
                        for stmt in &clause.body {
                            let res = self.execute_statement(state, stmt)?;
                            stdout.push_str(&res.stdout);
                            stderr.push_str(&res.stderr);
                            exit_code = res.exit_code;
                        }
                        return Ok(ExecResult::new(stdout, stderr, exit_code));
                    }
                }

                if let Some(else_body) = &if_node.else_body {
                    let mut exit_code = 0;
                    for stmt in else_body {
                        let res = self.execute_statement(state, stmt)?;
                        stdout.push_str(&res.stdout);
                        stderr.push_str(&res.stderr);
                        exit_code = res.exit_code;
                    }
                    return Ok(ExecResult::new(stdout, stderr, exit_code));
                }

                Ok(ExecResult::new(stdout, stderr, 0))
            }

            CompoundCommandNode::For(for_node) => {
                let exec_closure = self.exec_script_fn();
                let mut words: Vec<String> = Vec::new();
                if let Some(ref word_list) = for_node.words {
                    for word in word_list {
                        let result = expand_word_with_glob(state, word, Some(&exec_closure));
                        let split = result.split_words.unwrap_or_else(|| vec![result.value]);
                        for word in split {
                            words.extend(self.expand_pathname(state, &word));
                        }
                    }
                } else {
                    let argc: usize = state.env.get("#")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(0);
                    for i in 1..=argc {
                        if let Some(val) = state.env.get(&i.to_string()) {
                            words.push(val.clone());
                        }
                    }
                }

                let mut stdout = String::new();
                let mut stderr = String::new();
                let mut exit_code = 0;

                for word in &words {
                    if let Some(count) = check_command_limit(state, self.limits) {
                        return Err(InterpreterError::ExecutionLimit(
                            crate::interpreter::errors::ExecutionLimitError::simple(
                                count,
                                crate::interpreter::errors::LimitType::Commands,
                            ),
                        ));
                    }
                    state.env.insert(for_node.variable.clone(), word.clone());
                    match self.execute_loop_body(state, &for_node.body, &mut stdout, &mut stderr, &mut exit_code)? {
                        LoopBodyOutcome::Break => break,
                        LoopBodyOutcome::Continue => {}
                    }
                }

                Ok(ExecResult::new(stdout, stderr, exit_code))
            }

            CompoundCommandNode::While(while_node) => {
                let mut stdout = String::new();
                let mut stderr = String::new();
                let mut exit_code = 0;
                let mut iterations = 0u64;

                loop {
                    let cond_exit = self.run_condition(state, &while_node.condition, &mut stdout, &mut stderr)?;
                    if cond_exit != 0 {
                        break;
                    }

                    iterations += 1;
                    if iterations > self.limits.max_iterations {
                        return Err(InterpreterError::ExecutionLimit(
                            crate::interpreter::errors::ExecutionLimitError::simple(
                                "maximum loop iterations exceeded",
                                crate::interpreter::errors::LimitType::Iterations,
                            ),
                        ));
                    }

                    match self.execute_loop_body(state, &while_node.body, &mut stdout, &mut stderr, &mut exit_code)? {
                        LoopBodyOutcome::Break => break,
                        LoopBodyOutcome::Continue => {}
                    }
                }

                Ok(ExecResult::new(stdout, stderr, exit_code))
            }

            CompoundCommandNode::Until(until_node) => {
                let mut stdout = String::new();
                let mut stderr = String::new();
                let mut exit_code = 0;
                let mut iterations = 0u64;

                loop {
                    let cond_exit = self.run_condition(state, &until_node.condition, &mut stdout, &mut stderr)?;
                    if cond_exit == 0 {
                        break;
                    }

                    iterations += 1;
                    if iterations > self.limits.max_iterations {
                        return Err(InterpreterError::ExecutionLimit(
                            crate::interpreter::errors::ExecutionLimitError::simple(
                                "maximum loop iterations exceeded",
                                crate::interpreter::errors::LimitType::Iterations,
                            ),
                        ));
                    }

                    match self.execute_loop_body(state, &until_node.body, &mut stdout, &mut stderr, &mut exit_code)? {
                        LoopBodyOutcome::Break => break,
                        LoopBodyOutcome::Continue => {}
                    }
                }

                Ok(ExecResult::new(stdout, stderr, exit_code))
            }

            CompoundCommandNode::Case(case_node) => {
                let exec_closure = self.exec_script_fn();
                let word = expand_word(state, &case_node.word, Some(&exec_closure)).value;
                let extglob = state.shopt_options.extglob;
                let nocasematch = state.shopt_options.nocasematch;

                let mut stdout = String::new();
                let mut stderr = String::new();
                let mut exit_code = 0;
                let mut fallthrough = false;

                for item in &case_node.items {
                    let matched = fallthrough || item.patterns.iter().any(|pat| {
                        let pattern = expand_word(state, pat, Some(&exec_closure)).value;
                        match_pattern(&word, &pattern, nocasematch, extglob)
                    });

                    if !matched {
                        continue;
                    }

                    for stmt in &item.body {
                        let res = self.execute_statement(state, stmt)?;
                        stdout.push_str(&res.stdout);
                        stderr.push_str(&res.stderr);
                        exit_code = res.exit_code;
                    }

                    match item.terminator {
                        CaseTerminator::DoubleSemi => break,
                        CaseTerminator::SemiAnd => {
                            fallthrough = true;
                            continue;
                        }
                        CaseTerminator::SemiSemiAnd => {
                            fallthrough = false;
                            continue;
                        }
                    }
                }

                Ok(ExecResult::new(stdout, stderr, exit_code))
            }

            CompoundCommandNode::Subshell(subshell_node) => {
                execute_subshell(
                    state,
                    &subshell_node.body,
                    Some(stdin),
                    |state, stmt| self.execute_statement(state, stmt),
                )
            }

            CompoundCommandNode::Group(group_node) => {
                execute_group(
                    state,
                    &group_node.body,
                    Some(stdin),
                    |state, stmt| self.execute_statement(state, stmt),
                )
            }

            CompoundCommandNode::ArithmeticCommand(arith) => {
                use crate::interpreter::arithmetic::evaluate_arithmetic;
                use crate::interpreter::types::InterpreterContext;

                let mut ctx = InterpreterContext::new(state, self.limits);
                match evaluate_arithmetic(&mut ctx, &arith.expression.expression, false, None) {
                    Ok(value) => {
                        // Arithmetic command: exit 0 if non-zero, exit 1 if zero
                        let exit_code = if value != 0 { 0 } else { 1 };
                        Ok(ExecResult::new(String::new(), String::new(), exit_code))
                    }
                    Err(e) => {
                        Ok(ExecResult::new(
                            String::new(),
                            format!("bash: {}\n", e),
                            1,
                        ))
                    }
                }
            }

            CompoundCommandNode::ConditionalCommand(cond) => {
                Ok(ExecResult::new(
                    String::new(),
                    String::new(),
                    if self.eval_cond_expr(state, &cond.expression) { 0 } else { 1 },
                ))
            }

            CompoundCommandNode::CStyleFor(cfor) => {
                use crate::interpreter::arithmetic::evaluate_arithmetic;
                use crate::interpreter::types::InterpreterContext;

                if let Some(init) = &cfor.init {
                    let mut ctx = InterpreterContext::new(state, self.limits);
                    evaluate_arithmetic(&mut ctx, &init.expression, false, None)
                        .map_err(|e| InterpreterError::Exit(ExitError::new(1, String::new(), format!("bash: {}\n", e))))?;
                }

                let mut stdout = String::new();
                let mut stderr = String::new();
                let mut exit_code = 0;
                let mut iterations = 0u64;

                loop {
                    if let Some(condition) = &cfor.condition {
                        let mut ctx = InterpreterContext::new(state, self.limits);
                        let value = evaluate_arithmetic(&mut ctx, &condition.expression, false, None)
                            .map_err(|e| InterpreterError::Exit(ExitError::new(1, String::new(), format!("bash: {}\n", e))))?;
                        if value == 0 {
                            break;
                        }
                    }

                    iterations += 1;
                    if iterations > self.limits.max_iterations {
                        return Err(InterpreterError::ExecutionLimit(
                            crate::interpreter::errors::ExecutionLimitError::simple(
                                "maximum loop iterations exceeded",
                                crate::interpreter::errors::LimitType::Iterations,
                            ),
                        ));
                    }

                    match self.execute_loop_body(state, &cfor.body, &mut stdout, &mut stderr, &mut exit_code)? {
                        LoopBodyOutcome::Break => break,
                        LoopBodyOutcome::Continue => {}
                    }

                    if let Some(update) = &cfor.update {
                        let mut ctx = InterpreterContext::new(state, self.limits);
                        evaluate_arithmetic(&mut ctx, &update.expression, false, None)
                            .map_err(|e| InterpreterError::Exit(ExitError::new(1, String::new(), format!("bash: {}\n", e))))?;
                    }
                }

                Ok(ExecResult::new(stdout, stderr, exit_code))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{InMemoryFs, FileSystem as AsyncFileSystem};
    use crate::interpreter::sync_fs_adapter::SyncFsAdapter;
    use std::sync::Arc;

    fn make_engine_and_state() -> (ExecutionEngine<'static>, InterpreterState, Arc<InMemoryFs>) {
        let fs = Arc::new(InMemoryFs::new());
        let limits = Box::leak(Box::new(ExecutionLimits::default()));

        // We need a static reference for the test, so we leak the adapter
        let handle = tokio::runtime::Handle::current();
        let adapter = Box::leak(Box::new(SyncFsAdapter::new(fs.clone(), handle)));

        let engine = ExecutionEngine::new(limits, adapter);
        let state = InterpreterState::default();

        (engine, state, fs)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_echo() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("echo hello world").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();

        assert_eq!(result.stdout, "hello world\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_variable_expansion() {
        let (engine, mut state, _fs) = make_engine_and_state();
        state.env.insert("NAME".to_string(), "world".to_string());

        let ast = crate::parser::parse("echo hello $NAME").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();

        assert_eq!(result.stdout, "hello world\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_true_false() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("true").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.exit_code, 0);

        let ast = crate::parser::parse("false").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_and_or() {
        let (engine, mut state, _fs) = make_engine_and_state();

        // true && echo yes
        let ast = crate::parser::parse("true && echo yes").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "yes\n");

        // false && echo no (should not print)
        let ast = crate::parser::parse("false && echo no").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "");

        // false || echo fallback
        let ast = crate::parser::parse("false || echo fallback").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "fallback\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_if() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("if true; then echo yes; fi").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "yes\n");

        let ast = crate::parser::parse("if false; then echo no; else echo else; fi").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "else\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_for() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("for i in a b c; do echo $i; done").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "a\nb\nc\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_while() {
        let (engine, mut state, _fs) = make_engine_and_state();
        state.env.insert("x".to_string(), "3".to_string());

        // Simple while that would loop - but we need arithmetic for decrement
        // For now just test basic structure
        let ast = crate::parser::parse("while false; do echo loop; done").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_subshell() {
        let (engine, mut state, _fs) = make_engine_and_state();
        state.env.insert("X".to_string(), "original".to_string());

        // Subshell should not affect parent
        let ast = crate::parser::parse("(X=modified; echo $X); echo $X").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        // Note: assignment in subshell not fully implemented yet
        // Just verify subshell executes
        assert!(result.stdout.contains("original"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_group() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("{ echo a; echo b; }").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "a\nb\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_pwd_cd() {
        let fs = Arc::new(InMemoryFs::new());
        let limits = Box::leak(Box::new(ExecutionLimits::default()));

        // Create directory structure using async API directly
        fs.mkdir("/home", &crate::fs::MkdirOptions { recursive: false }).await.unwrap();
        fs.mkdir("/home/user", &crate::fs::MkdirOptions { recursive: false }).await.unwrap();

        // Now create the sync adapter
        let handle = tokio::runtime::Handle::current();
        let adapter = Box::leak(Box::new(SyncFsAdapter::new(fs.clone(), handle)));

        let engine = ExecutionEngine::new(limits, adapter);
        let mut state = InterpreterState::default();

        state.cwd = "/".to_string();
        state.env.insert("PWD".to_string(), "/".to_string());

        let ast = crate::parser::parse("pwd").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "/\n");

        let ast = crate::parser::parse("cd /home/user && pwd").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "/home/user\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_case() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("case hello in h*) echo match;; *) echo nomatch;; esac").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "match\n");

        let ast = crate::parser::parse("case zzz in h*) echo match;; *) echo nomatch;; esac").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "nomatch\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_cstyle_for() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("for ((i=0; i<3; i++)); do echo $i; done").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "0\n1\n2\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_conditional_command() {
        let (engine, mut state, _fs) = make_engine_and_state();
        state.env.insert("NAME".to_string(), "world".to_string());

        let ast = crate::parser::parse("[[ $NAME == world ]] && echo yes").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "yes\n");

        let ast = crate::parser::parse("[[ $NAME == nope ]] || echo fallback").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "fallback\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_break_continue_in_for() {
        let (engine, mut state, _fs) = make_engine_and_state();

        let ast = crate::parser::parse("for i in 1 2 3 4; do if [ $i = 3 ]; then break; fi; echo $i; done").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "1\n2\n");

        let ast = crate::parser::parse("for i in 1 2 3; do if [ $i = 2 ]; then continue; fi; echo $i; done").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "1\n3\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_printf() {
        let (engine, mut state, _fs) = make_engine_and_state();
        let ast = crate::parser::parse("printf '%s-%d\\n' hello 42").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "hello-42\n");

        let ast = crate::parser::parse("printf '%s\\n' a b c").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "a\nb\nc\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_alias_unalias() {
        let (engine, mut state, _fs) = make_engine_and_state();
        let result = engine.execute_script(&mut state, &crate::parser::parse("alias ll='ls -l'").unwrap()).unwrap();
        assert_eq!(result.exit_code, 0);

        let result = engine.execute_script(&mut state, &crate::parser::parse("alias ll").unwrap()).unwrap();
        assert_eq!(result.stdout, "alias ll='ls -l'\n");

        let result = engine.execute_script(&mut state, &crate::parser::parse("unalias ll").unwrap()).unwrap();
        assert_eq!(result.exit_code, 0);

        let result = engine.execute_script(&mut state, &crate::parser::parse("alias ll").unwrap()).unwrap();
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_type_builtin() {
        let (engine, mut state, _fs) = make_engine_and_state();
        let ast = crate::parser::parse("type echo").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert!(result.stdout.contains("echo is a shell builtin"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_here_string() {
        let (engine, mut state, _fs) = make_engine_and_state();
        let ast = crate::parser::parse("read line <<< \"hello world\"; echo $line").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "hello world\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_heredoc() {
        let (engine, mut state, _fs) = make_engine_and_state();
        let ast = crate::parser::parse("read -r line <<EOF\nfoo bar\nEOF\necho $line").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "foo bar\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_input_redirection_from_file() {
        let (engine, mut state, fs) = make_engine_and_state();
        fs.write_file("/input.txt", b"line1\nline2\n").await.unwrap();
        let ast = crate::parser::parse("read -r line < /input.txt; echo $line").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "line1\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_input_redirection_missing_file() {
        let (engine, mut state, _fs) = make_engine_and_state();
        let ast = crate::parser::parse("read -r line < /does/not/exist.txt").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_nounset_unbound_variable() {
        let (engine, mut state, _fs) = make_engine_and_state();
        let ast = crate::parser::parse("set -u\necho $missing").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("missing: unbound variable"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_nounset_does_not_trigger_when_set() {
        let (engine, mut state, _fs) = make_engine_and_state();
        let ast = crate::parser::parse("set -u\nfoo=bar\necho $foo").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "bar\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipeline_executes_all_stages() {
        let (engine, mut state, _fs) = make_engine_and_state();
        let ast = crate::parser::parse("echo hello | read -r line; echo $line").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "hello\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipeline_pipestatus() {
        let (engine, mut state, _fs) = make_engine_and_state();
        let ast = crate::parser::parse("false | true; echo ${PIPESTATUS[0]} ${PIPESTATUS[1]}").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "1 0\n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipefail_uses_rightmost_failure() {
        let (engine, mut state, _fs) = make_engine_and_state();
        let ast = crate::parser::parse("set -o pipefail\nfalse | true\necho $?").unwrap();
        let result = engine.execute_script(&mut state, &ast).unwrap();
        assert_eq!(result.stdout, "1\n");
    }
}
