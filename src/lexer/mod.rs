// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

pub mod fuzzy;

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use crate::automaton::Automaton;
use crate::errors::{ParseError, ParseErrors};
use crate::lexer::fuzzy::FuzzyMatcher;
use crate::text::{PosSpan, TextBuffer};
use crate::{StateId, TokenId};

// ---------------------------------------------------------------------------------------------
// Tokens

/// A token produced by the lexer.
///
/// The end of the input is a token too, bearing the automaton's end-of-input id and an
/// empty value. Recovery dummies carry the expected terminal's id and an empty value.
#[derive(Clone, PartialEq, Debug)]
pub struct Token {
    pub id: TokenId,
    pub value: String,
    pub span: PosSpan,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, ":{}({:?})", self.id, self.value)
    }
}

/// Result of a DFA or fuzzy match: the accepting state reached and the number of input
/// values consumed from the match origin.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct TokenMatch {
    pub state: StateId,
    pub length: usize,
}

// ---------------------------------------------------------------------------------------------
// Table-based lexer

/// Tokenizer running a precompiled DFA over a text buffer.
///
/// Tokenization is longest-match; when the automaton gets stuck and a recovery
/// distance is configured, a [`FuzzyMatcher`] pass synthesizes the edits needed to
/// continue, reporting each of them as a lexical error.
pub struct Lexer<'a> {
    automaton: &'a Automaton,
    text: TextBuffer,
    index: usize,
    max_distance: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(automaton: &'a Automaton, text: TextBuffer, max_distance: usize) -> Self {
        Lexer { automaton, text, index: 0, max_distance }
    }

    pub fn text(&self) -> &TextBuffer {
        &self.text
    }

    /// Current read position, in input values.
    pub fn get_index(&self) -> usize {
        self.index
    }

    /// Longest exact match starting at `origin`: the last visited state with a
    /// non-empty terminals list wins.
    fn run_dfa(&self, origin: usize) -> Option<TokenMatch> {
        let mut state: StateId = 0;
        let mut index = origin;
        let mut matched: Option<TokenMatch> = None;
        loop {
            let data = self.automaton.get_state(state);
            if data.is_accepting() && index > origin {
                matched = Some(TokenMatch { state, length: index - origin });
            }
            if self.text.is_end(index) {
                break;
            }
            match data.next_state(self.text.get_value(index)) {
                Some(next) => {
                    state = next;
                    index += 1;
                }
                None => break,
            }
        }
        matched
    }

    /// Gets the next token, reporting lexical errors to `errors`. At the end of the
    /// input, returns the end-of-input token (and keeps returning it).
    ///
    /// Each loop iteration advances the read position by at least one value, so
    /// tokenization always terminates.
    pub fn next_token(&mut self, errors: &mut ParseErrors) -> Token {
        loop {
            if self.text.is_end(self.index) {
                return Token {
                    id: self.automaton.eof_token(),
                    value: String::new(),
                    span: PosSpan::at(self.text.get_position(self.index)),
                };
            }
            let matched = match self.run_dfa(self.index) {
                Some(matched) => Some(matched),
                None if self.max_distance > 0 => {
                    FuzzyMatcher::new(self.automaton, &self.text, self.index, self.max_distance)
                        .handle(errors)
                }
                None => {
                    errors.push(ParseError::UnexpectedChar {
                        chr: Some(self.text.get_value(self.index)),
                        pos: self.text.get_position(self.index),
                    });
                    None
                }
            };
            let Some(matched) = matched else {
                // no way to make a token here, skip one value and retry
                self.index += 1;
                continue;
            };
            if matched.length == 0 {
                // insert-only recovery consumed nothing and would stall the cursor
                self.index += 1;
                continue;
            }
            let id = self.automaton.get_state(matched.state).terminals()[0];
            let value = self.text.get_string(self.index, matched.length);
            let span = PosSpan::new(
                self.text.get_position(self.index),
                self.text.get_position(self.index + matched.length - 1));
            self.index += matched.length;
            if Some(id) == self.automaton.separator() {
                continue;
            }
            return Token { id, value, span };
        }
    }
}

// ---------------------------------------------------------------------------------------------
// Rewindable token stream

/// Number of recent tokens kept for rewinding.
pub const RING_SIZE: usize = 32;

/// Token source with pushback, for speculative parsing.
///
/// The last [`RING_SIZE`] produced tokens are kept in a ring; [`rewind`](Self::rewind)
/// logically returns the last `n` of them so the next calls to
/// [`next`](Self::next) replay them in order. Replayed tokens are not lexed again, so
/// lexical errors are reported exactly once.
pub struct RewindableTokenStream<'a> {
    lexer: Lexer<'a>,
    ring: VecDeque<Token>,
    /// number of ring-tail tokens still to replay
    ahead: usize,
}

impl<'a> RewindableTokenStream<'a> {
    pub fn new(lexer: Lexer<'a>) -> Self {
        RewindableTokenStream { lexer, ring: VecDeque::with_capacity(RING_SIZE), ahead: 0 }
    }

    pub fn lexer(&self) -> &Lexer<'a> {
        &self.lexer
    }

    /// Number of tokens that would be replayed before pulling the lexer again.
    pub fn rewound(&self) -> usize {
        self.ahead
    }

    pub fn next(&mut self, errors: &mut ParseErrors) -> Token {
        if self.ahead > 0 {
            let token = self.ring[self.ring.len() - self.ahead].clone();
            self.ahead -= 1;
            token
        } else {
            let token = self.lexer.next_token(errors);
            self.ring.push_back(token.clone());
            if self.ring.len() > RING_SIZE {
                self.ring.pop_front();
            }
            token
        }
    }

    /// Returns the last `n` consumed tokens to the stream. Rewinds stack up, as long
    /// as the total stays within the ring.
    pub fn rewind(&mut self, n: usize) {
        assert!(self.ahead + n <= self.ring.len(), "can't rewind {n} more tokens");
        self.ahead += n;
    }
}
