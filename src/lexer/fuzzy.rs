// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

use crate::automaton::{Automaton, DEAD_STATE};
use crate::errors::{ParseError, ParseErrors};
use crate::lexer::TokenMatch;
use crate::text::TextBuffer;
use crate::StateId;

// ---------------------------------------------------------------------------------------------

/// A candidate exploration state of the fuzzy search.
///
/// `length` is the number of input values consumed from the origin, `distance` the
/// cumulative edit cost. Heads form a back-linked chain through `prev` (an index into
/// the arena) so the winning path can be walked to replay its errors in input order.
struct FuzzyHead {
    prev: Option<usize>,
    state: StateId,
    length: usize,
    distance: usize,
    error: Option<ParseError>,
}

/// Bounded Levenshtein recovery over the lexer's DFA.
///
/// Finds the match that minimizes the edit distance against the input starting at
/// `origin`, and among minimizers consumes the most input. One matcher is built per
/// lexer error event and discarded after producing its [`TokenMatch`].
pub struct FuzzyMatcher<'a> {
    automaton: &'a Automaton,
    text: &'a TextBuffer,
    origin: usize,
    max_distance: usize,
    /// append-only queue of heads, processed in insertion order
    heads: Vec<FuzzyHead>,
}

impl<'a> FuzzyMatcher<'a> {
    pub fn new(automaton: &'a Automaton, text: &'a TextBuffer, origin: usize, max_distance: usize) -> Self {
        FuzzyMatcher { automaton, text, origin, max_distance, heads: Vec::new() }
    }

    /// Runs the search. On success, reports the synthesized edits to `errors` in input
    /// order and returns the match. On failure, reports a single error at the origin
    /// and returns `None`; the caller skips one value and retries.
    pub fn handle(mut self, errors: &mut ParseErrors) -> Option<TokenMatch> {
        let automaton = self.automaton;
        self.heads.push(FuzzyHead { prev: None, state: 0, length: 0, distance: 0, error: None });
        let mut matching: Option<usize> = None;
        let mut i = 0;
        // BFS-like wavefront: new heads are appended during visitation, the loop ends
        // when the index passes the last appended element
        while i < self.heads.len() {
            let (state_id, length, distance) =
                (self.heads[i].state, self.heads[i].length, self.heads[i].distance);
            let index = self.origin + length;
            let at_end = self.text.is_end(index);
            let cur = if at_end { None } else { Some(self.text.get_value(index)) };
            let state = automaton.get_state(state_id);
            if state.is_accepting() {
                let better = match matching {
                    None => true,
                    Some(best) => distance < self.heads[best].distance
                        || (distance == self.heads[best].distance && length > self.heads[best].length),
                };
                if better {
                    matching = Some(i);
                }
            }
            let may_edit = distance < self.max_distance;
            if let (Some(chr), true) = (cur, may_edit) {
                // drop the next input value; also the only move out of a dead end
                let error = self.error_at(index, Some(chr));
                self.push_head(Some(i), state_id, length + 1, distance + 1, Some(error));
            }
            if state.is_dead_end() {
                i += 1;
                continue;
            }
            let cur_value = cur.map(|c| c as u32);
            for symbol in 0..256_u32 {
                let target = state.cached()[symbol as usize];
                if target == DEAD_STATE {
                    continue;
                }
                self.push_transition(i, target as StateId, symbol == cur_value.unwrap_or(u32::MAX),
                                     length, distance, index, cur, may_edit, at_end);
            }
            for span in state.bulk() {
                let is_match = cur_value.map(|v| span.contains(v)).unwrap_or(false);
                self.push_transition(i, span.target as StateId, is_match,
                                     length, distance, index, cur, may_edit, at_end);
            }
            i += 1;
        }
        match matching {
            Some(best) => {
                let mut collected = Vec::new();
                let mut cursor = Some(best);
                while let Some(head) = cursor {
                    if let Some(error) = &self.heads[head].error {
                        collected.push(error.clone());
                    }
                    cursor = self.heads[head].prev;
                }
                for error in collected.into_iter().rev() {
                    errors.push(error);
                }
                Some(TokenMatch { state: self.heads[best].state, length: self.heads[best].length })
            }
            None => {
                let chr = if self.text.is_end(self.origin) {
                    None
                } else {
                    Some(self.text.get_value(self.origin))
                };
                errors.push(self.error_at(self.origin, chr));
                None
            }
        }
    }

    /// Expands one transition of the current head: exact match, substitution, and
    /// insertion of the expected value. Insertion doesn't advance `length`: it models
    /// inserting an expected value without consuming input, and reports the error at
    /// the current position.
    #[allow(clippy::too_many_arguments)]
    fn push_transition(&mut self, from: usize, target: StateId, is_match: bool,
                       length: usize, distance: usize, index: usize,
                       cur: Option<char>, may_edit: bool, at_end: bool) {
        if is_match {
            self.push_head(Some(from), target, length + 1, distance, None);
        }
        if may_edit && !at_end {
            let error = self.error_at(index, cur);
            self.push_head(Some(from), target, length + 1, distance + 1, Some(error));
        }
        if may_edit {
            let error = self.error_at(index, cur);
            self.push_head(Some(from), target, length, distance + 1, Some(error));
        }
    }

    fn error_at(&self, index: usize, chr: Option<char>) -> ParseError {
        ParseError::UnexpectedChar { chr, pos: self.text.get_position(index) }
    }

    /// Appends a candidate head unless an already-queued head dominates it.
    ///
    /// The reverse scan only compares heads of the same state on `(length, distance)`;
    /// it may keep the occasional dominated duplicate, which the wavefront absorbs.
    fn push_head(&mut self, prev: Option<usize>, state: StateId, length: usize, distance: usize,
                 error: Option<ParseError>) {
        debug_assert!(distance <= self.max_distance);
        for head in self.heads.iter().rev() {
            if head.state != state {
                continue;
            }
            if length < head.length {
                return;
            }
            if length > head.length {
                continue;
            }
            if distance >= head.distance {
                return;
            }
        }
        self.heads.push(FuzzyHead { prev, state, length, distance, error });
    }
}
