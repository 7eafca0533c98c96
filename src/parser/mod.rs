// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.


use crate::ast::{Ast, AstBuilder, SemanticAction};
use crate::automaton::{Automaton, LRAction, LROpCode, Production};
use crate::errors::{ParseError, ParseErrors};
use crate::lexer::{Lexer, RewindableTokenStream, Token};
use crate::log::Logger;
use crate::symbols::FixedSymTable;
use crate::text::{PosSpan, TextBuffer};
use crate::StateId;

// ---------------------------------------------------------------------------------------------

/// Outcome of a parse: the syntax tree when the text could be (possibly after
/// recoveries) parsed to the end, and every error met along the way.
#[derive(Debug)]
pub struct ParseResult {
    pub tree: Option<Ast>,
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    pub fn is_success(&self) -> bool {
        self.tree.is_some()
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum StepResult {
    Shift,
    Accept,
    Error,
    Overflow,
}

// ---------------------------------------------------------------------------------------------

/// LR(k) parser driver over precompiled tables.
///
/// The parser owns no mutable state across invocations: each [`parse`](LRParser::parse)
/// call builds its own stack, tree builder, and token stream, so a parser (and the
/// automaton behind it) may serve concurrent parses from independent threads.
pub struct LRParser<'a> {
    automaton: &'a Automaton,
    symbol_table: FixedSymTable,
    try_recover: bool,          // tries to recover from lexical and syntactical errors
    max_errors: usize,
    max_stack: usize,
    recovery_distance: usize,
}

impl<'a> LRParser<'a> {
    /// Number of tokens a recovery probe must accept before a repair is committed
    pub const RECOVERY_PROBE_LENGTH: usize = 3;
    /// Default maximum number of reported errors before giving up
    pub const MAX_NBR_ERRORS: usize = 100;
    /// Default capacity of the state stack
    pub const MAX_STACK_SIZE: usize = 1024;
    /// Default Levenshtein budget of the lexer's fuzzy recovery
    pub const RECOVERY_DISTANCE: usize = 1;

    pub fn new(automaton: &'a Automaton, symbol_table: FixedSymTable) -> Self {
        LRParser {
            automaton,
            symbol_table,
            try_recover: true,
            max_errors: Self::MAX_NBR_ERRORS,
            max_stack: Self::MAX_STACK_SIZE,
            recovery_distance: Self::RECOVERY_DISTANCE,
        }
    }

    pub fn get_symbol_table(&self) -> &FixedSymTable {
        &self.symbol_table
    }

    pub fn set_try_recover(&mut self, try_recover: bool) {
        self.try_recover = try_recover;
    }

    pub fn set_max_errors(&mut self, max_errors: usize) {
        self.max_errors = max_errors;
    }

    pub fn set_max_stack(&mut self, max_stack: usize) {
        self.max_stack = max_stack;
    }

    /// Levenshtein budget handed to the lexer; 0 disables fuzzy matching.
    pub fn set_recovery_distance(&mut self, distance: usize) {
        self.recovery_distance = distance;
    }

    /// Parses `text` and returns the tree and the recorded errors. Every error is also
    /// rendered to `log` in detection order.
    pub fn parse<L: Logger>(&self, text: &str, log: &mut L) -> ParseResult {
        self.parse_with_actions(text, &mut [], log)
    }

    /// Same as [`parse`](LRParser::parse), with the host's semantic actions. The slice
    /// is the registry indexed by the production bytecode.
    pub fn parse_with_actions<L: Logger>(&self, text: &str, actions: &mut [SemanticAction],
                                         log: &mut L) -> ParseResult {
        const VERBOSE: bool = false;

        let mut errors = ParseErrors::new();
        let mut logged = 0;
        let lexer = Lexer::new(self.automaton, TextBuffer::new(text), self.recovery_distance);
        let mut input = RewindableTokenStream::new(lexer);
        let mut builder = AstBuilder::new();
        let mut stack: Vec<StateId> = Vec::with_capacity(self.max_stack);
        stack.push(0);
        let mut token = input.next(&mut errors);
        let tree = loop {
            if VERBOSE { println!("- state {} <- {token}", stack.last().unwrap()); }
            match self.parse_on_token(&mut stack, &mut builder, &token, actions) {
                StepResult::Shift => {
                    debug_assert_eq!(builder.depth(), stack.len() - 1, "builder stack out of sync");
                    token = input.next(&mut errors);
                }
                StepResult::Accept => {
                    break Some(builder.into_tree());
                }
                StepResult::Overflow => {
                    log.add_error(format!("parser stack overflow ({} states), giving up", self.max_stack));
                    break None;
                }
                StepResult::Error => {
                    match self.on_unexpected_token(&mut stack, &mut input, &mut errors, &token) {
                        None => {
                            self.flush_log(&errors, log, &mut logged);
                            log.add_note("irrecoverable syntax error, giving up");
                            break None;
                        }
                        Some(_) if errors.len() >= self.max_errors => {
                            self.flush_log(&errors, log, &mut logged);
                            log.add_note(format!("too many errors ({}), giving up", errors.len()));
                            break None;
                        }
                        Some(next) => token = next,
                    }
                }
            }
            self.flush_log(&errors, log, &mut logged);
        };
        self.flush_log(&errors, log, &mut logged);
        ParseResult { tree, errors: errors.into_vec() }
    }

    /// Runs all the actions triggered by `token`: any number of reductions, then one
    /// shift, an accept, or an error.
    fn parse_on_token(&self, stack: &mut Vec<StateId>, builder: &mut AstBuilder, token: &Token,
                      actions: &mut [SemanticAction]) -> StepResult {
        loop {
            let state = *stack.last().unwrap();
            match self.automaton.get_action(state, token.id) {
                LRAction::Shift(next) => {
                    if stack.len() >= self.max_stack {
                        return StepResult::Overflow;
                    }
                    stack.push(next);
                    builder.stack_push(token);
                    return StepResult::Shift;
                }
                LRAction::Reduce(index) => {
                    let production = self.automaton.get_production(index);
                    self.reduce(production, stack, builder, actions);
                    let state = *stack.last().unwrap();
                    match self.automaton.get_goto(state, production.head) {
                        LRAction::Shift(next) => {
                            if stack.len() >= self.max_stack {
                                return StepResult::Overflow;
                            }
                            stack.push(next);
                        }
                        action => panic!("missing goto for variable {} in state {state}: {action}",
                                         production.head),
                    }
                }
                LRAction::Accept => return StepResult::Accept,
                LRAction::Error => return StepResult::Error,
            }
        }
    }

    /// Executes the production's bytecode against the tree builder.
    ///
    /// The bytecode is trusted: opcode sequences come from the generator, and a
    /// malformed table is a generator bug, not an input error.
    fn reduce(&self, production: &Production, stack: &mut Vec<StateId>, builder: &mut AstBuilder,
              actions: &mut [SemanticAction]) {
        stack.truncate(stack.len() - production.reduction_length);
        builder.reduction_prepare(production.reduction_length);
        let mut i = 0;
        while i < production.bytecode.len() {
            match LROpCode::from_word(production.bytecode[i]) {
                LROpCode::PopStack(action) => {
                    builder.reduction_pop(action);
                }
                LROpCode::AddVirtual(action) => {
                    i += 1;
                    builder.reduction_virtual(production.bytecode[i], action);
                }
                LROpCode::SemanticAction => {
                    i += 1;
                    let action = &mut actions[production.bytecode[i] as usize];
                    builder.reduction_semantic(&mut **action, production.head);
                }
            }
            i += 1;
        }
        builder.reduce(production.head, production.head_action);
    }

    /// Records the syntax error and tries, in order: dropping the unexpected token,
    /// dropping it and the next one, then inserting one of the expected terminals.
    /// Each repair is committed only when a simulation accepts the next
    /// [`RECOVERY_PROBE_LENGTH`](LRParser::RECOVERY_PROBE_LENGTH) tokens; the stream is
    /// rewound by exactly what each probe consumed. Returns the token to resume on, or
    /// `None` when no repair works.
    fn on_unexpected_token(&self, stack: &mut Vec<StateId>, input: &mut RewindableTokenStream,
                           errors: &mut ParseErrors, token: &Token) -> Option<Token> {
        let state = *stack.last().unwrap();
        let expected = self.automaton.get_expected(state);
        let pos = token.span.first;
        errors.push(ParseError::UnexpectedToken {
            token: token.clone(),
            expected: expected.clone(),
            pos,
        });
        if !self.try_recover {
            return None;
        }
        let probe_length = Self::RECOVERY_PROBE_LENGTH;
        // drop the unexpected token
        let (ok, used) = LRSimulator::new(stack)
            .test_for_length(self.automaton, probe_length, None, input, errors);
        input.rewind(used);
        if ok {
            return Some(input.next(errors));
        }
        // drop the unexpected token and the one after it
        let _second = input.next(errors);
        let (ok, used) = LRSimulator::new(stack)
            .test_for_length(self.automaton, probe_length, None, input, errors);
        input.rewind(used);
        if ok {
            return Some(input.next(errors));
        }
        input.rewind(1);
        // insert an expected terminal before the unexpected token
        input.rewind(1);
        for &expected_token in &expected {
            if expected_token == self.automaton.eof_token() {
                continue;
            }
            let dummy = Token { id: expected_token, value: String::new(), span: PosSpan::at(pos) };
            let (ok, used) = LRSimulator::new(stack)
                .test_for_length(self.automaton, probe_length, Some(&dummy), input, errors);
            input.rewind(used);
            if ok {
                return Some(dummy);
            }
        }
        None
    }

    fn flush_log<L: Logger>(&self, errors: &ParseErrors, log: &mut L, logged: &mut usize) {
        while *logged < errors.len() {
            log.add_error(errors.get(*logged).to_str(Some(&self.symbol_table)));
            *logged += 1;
        }
    }
}

// ---------------------------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Debug)]
enum SimStep {
    Shift,
    Accept,
    Error,
}

/// Speculative copy of the parser used for recovery lookahead.
///
/// The simulator copies the live stack prefix and shares the automaton and the input
/// stream; it performs shifts and reductions without touching the tree builder, and
/// the caller rewinds the stream by the exact count of tokens the probe consumed, so
/// a probe leaves no trace on the real parser.
pub struct LRSimulator {
    stack: Vec<StateId>,
}

impl LRSimulator {
    pub fn new(stack: &[StateId]) -> Self {
        LRSimulator { stack: stack.to_vec() }
    }

    /// Attempts to shift without error for `length` token steps, optionally starting
    /// with `injected` as the first token (bypassing the input). Reaching the accept
    /// action counts as success. Returns `(ok, tokens_consumed_from_input)`.
    pub fn test_for_length(mut self, automaton: &Automaton, length: usize, injected: Option<&Token>,
                           input: &mut RewindableTokenStream, errors: &mut ParseErrors) -> (bool, usize) {
        let mut used = 0;
        let mut injected = injected.cloned();
        for _ in 0..length {
            let token = match injected.take() {
                Some(token) => token,
                None => {
                    used += 1;
                    input.next(errors)
                }
            };
            match self.step(automaton, &token) {
                SimStep::Shift => {}
                SimStep::Accept => return (true, used),
                SimStep::Error => return (false, used),
            }
        }
        (true, used)
    }

    fn step(&mut self, automaton: &Automaton, token: &Token) -> SimStep {
        loop {
            let state = *self.stack.last().unwrap();
            match automaton.get_action(state, token.id) {
                LRAction::Shift(next) => {
                    self.stack.push(next);
                    return SimStep::Shift;
                }
                LRAction::Reduce(index) => {
                    let production = automaton.get_production(index);
                    self.stack.truncate(self.stack.len() - production.reduction_length);
                    let state = *self.stack.last().unwrap();
                    match automaton.get_goto(state, production.head) {
                        LRAction::Shift(next) => self.stack.push(next),
                        _ => return SimStep::Error,
                    }
                }
                LRAction::Accept => return SimStep::Accept,
                LRAction::Error => return SimStep::Error,
            }
        }
    }
}
