// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

use std::fmt::{Display, Formatter};
use crate::{StateId, TokenId, VarId};

// ---------------------------------------------------------------------------------------------
// DFA tables

/// Sentinel state index: no transition.
pub const DEAD_STATE: u32 = 0xffff_ffff;

/// A contiguous range of code points `start..=end` leading to `target`.
///
/// Bulk transitions cover the code points outside the cached low range, or in addition
/// to it; the cache wins when it hits.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CharSpan {
    pub start: u32,
    pub end: u32,
    pub target: u32,
}

impl CharSpan {
    pub fn contains(&self, value: u32) -> bool {
        self.start <= value && value <= self.end
    }
}

impl Display for CharSpan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{:#x} -> {}", self.start, self.target)
        } else {
            write!(f, "{:#x}-{:#x} -> {}", self.start, self.end, self.target)
        }
    }
}

/// One DFA state: the tokens it accepts, a dense 256-entry transition cache for the
/// low code points, and the sorted bulk ranges for the rest.
#[derive(Clone, PartialEq, Debug)]
pub struct DfaStateData {
    terminals: Vec<TokenId>,
    cached: Box<[u32; 256]>,
    bulk: Vec<CharSpan>,
    dead_end: bool,
}

impl DfaStateData {
    pub fn new(terminals: Vec<TokenId>, cached: Box<[u32; 256]>, mut bulk: Vec<CharSpan>) -> Self {
        bulk.sort_by_key(|span| span.start);
        let dead_end = bulk.is_empty() && cached.iter().all(|&target| target == DEAD_STATE);
        DfaStateData { terminals, cached, bulk, dead_end }
    }

    /// Builds a state with no outgoing transition.
    pub fn dead(terminals: Vec<TokenId>) -> Self {
        DfaStateData::new(terminals, Box::new([DEAD_STATE; 256]), Vec::new())
    }

    /// Tokens accepted in this state, in priority order; empty when not accepting.
    #[inline]
    pub fn terminals(&self) -> &[TokenId] {
        &self.terminals
    }

    #[inline]
    pub fn is_accepting(&self) -> bool {
        !self.terminals.is_empty()
    }

    /// A state is dead-end when it has no outgoing transition at all.
    #[inline]
    pub fn is_dead_end(&self) -> bool {
        self.dead_end
    }

    #[inline]
    pub fn cached(&self) -> &[u32; 256] {
        &self.cached
    }

    #[inline]
    pub fn bulk(&self) -> &[CharSpan] {
        &self.bulk
    }

    /// Target state for code point `c`, or `None` when there is no transition.
    pub fn next_state(&self, c: char) -> Option<StateId> {
        let value = c as u32;
        if value < 256 {
            let target = self.cached[value as usize];
            if target != DEAD_STATE {
                return Some(target as StateId);
            }
        }
        let i = self.bulk.partition_point(|span| span.start <= value);
        if i > 0 && self.bulk[i - 1].contains(value) {
            Some(self.bulk[i - 1].target as StateId)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------------------------
// LR tables

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LRAction {
    Shift(StateId),
    Reduce(usize),
    Accept,
    Error,
}

impl LRAction {
    const CODE_ERROR: u16 = 0;
    const CODE_SHIFT: u16 = 1;
    const CODE_REDUCE: u16 = 2;
    const CODE_ACCEPT: u16 = 3;

    pub fn to_cell(self) -> (u16, u16) {
        match self {
            LRAction::Error => (Self::CODE_ERROR, 0),
            LRAction::Shift(state) => (Self::CODE_SHIFT, state as u16),
            LRAction::Reduce(prod) => (Self::CODE_REDUCE, prod as u16),
            LRAction::Accept => (Self::CODE_ACCEPT, 0),
        }
    }

    pub fn from_cell(code: u16, data: u16) -> Result<Self, AutomatonError> {
        match code {
            Self::CODE_ERROR => Ok(LRAction::Error),
            Self::CODE_SHIFT => Ok(LRAction::Shift(data as StateId)),
            Self::CODE_REDUCE => Ok(LRAction::Reduce(data as usize)),
            Self::CODE_ACCEPT => Ok(LRAction::Accept),
            _ => Err(AutomatonError::Corrupt("invalid LR action code")),
        }
    }
}

impl Display for LRAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LRAction::Shift(to) => write!(f, "s{}", to),
            LRAction::Reduce(to) => write!(f, "r{}", to),
            LRAction::Accept => write!(f, "acc"),
            LRAction::Error => write!(f, "err"),
        }
    }
}

/// How the tree builder folds a popped subtree into its parent.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[repr(u8)]
pub enum TreeAction {
    #[default]
    None = 0,
    ReplaceByChildren = 1,
    Drop = 2,
    Promote = 3,
}

impl TreeAction {
    pub fn from_bits(bits: u16) -> Self {
        match bits & 3 {
            0 => TreeAction::None,
            1 => TreeAction::ReplaceByChildren,
            2 => TreeAction::Drop,
            _ => TreeAction::Promote,
        }
    }
}

/// Reduction bytecode instruction.
///
/// Word layout: bits 2.. select the base, bits 0-1 the tree action.
/// `AddVirtual` and `SemanticAction` consume one following operand word
/// (virtual index, action index).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LROpCode {
    PopStack(TreeAction),
    AddVirtual(TreeAction),
    SemanticAction,
}

impl LROpCode {
    const BASE_POP_STACK: u16 = 0;
    const BASE_ADD_VIRTUAL: u16 = 4;
    const BASE_SEMANTIC_ACTION: u16 = 8;

    /// Decode from a bytecode word. An unknown base is a generator bug.
    pub fn from_word(word: u16) -> Self {
        match word & !3 {
            Self::BASE_POP_STACK => LROpCode::PopStack(TreeAction::from_bits(word)),
            Self::BASE_ADD_VIRTUAL => LROpCode::AddVirtual(TreeAction::from_bits(word)),
            Self::BASE_SEMANTIC_ACTION => LROpCode::SemanticAction,
            _ => panic!("illegal reduction opcode {word:#x}"),
        }
    }

    pub fn to_word(self) -> u16 {
        match self {
            LROpCode::PopStack(action) => Self::BASE_POP_STACK | action as u16,
            LROpCode::AddVirtual(action) => Self::BASE_ADD_VIRTUAL | action as u16,
            LROpCode::SemanticAction => Self::BASE_SEMANTIC_ACTION,
        }
    }

    /// Number of operand words following the opcode.
    pub fn operands(self) -> usize {
        match self {
            LROpCode::PopStack(_) => 0,
            LROpCode::AddVirtual(_) | LROpCode::SemanticAction => 1,
        }
    }
}

/// A grammar production with the bytecode driving its reduction.
#[derive(Clone, PartialEq, Debug)]
pub struct Production {
    pub head: VarId,
    pub head_action: TreeAction,
    pub reduction_length: usize,
    pub bytecode: Vec<u16>,
}

impl Production {
    /// The standard bytecode for a production without virtuals, semantic actions,
    /// or per-symbol tree actions: one plain pop per body symbol.
    pub fn plain(head: VarId, length: usize) -> Self {
        Production {
            head,
            head_action: TreeAction::None,
            reduction_length: length,
            bytecode: vec![LROpCode::PopStack(TreeAction::None).to_word(); length],
        }
    }
}

// ---------------------------------------------------------------------------------------------
// Automaton

/// Errors met while loading an automaton blob. These are initialization-time
/// failures and are fatal: a parser is never built over bad tables.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AutomatonError {
    TooShort { offset: usize },
    BadMagic,
    UnsupportedVersion(u32),
    Corrupt(&'static str),
}

impl Display for AutomatonError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AutomatonError::TooShort { offset } => write!(f, "automaton blob truncated at offset {offset}"),
            AutomatonError::BadMagic => write!(f, "not an automaton blob (bad magic)"),
            AutomatonError::UnsupportedVersion(v) => write!(f, "unsupported automaton version {v}"),
            AutomatonError::Corrupt(what) => write!(f, "corrupt automaton blob: {what}"),
        }
    }
}

impl std::error::Error for AutomatonError {}

const MAGIC: [u8; 4] = *b"LRLX";
const VERSION: u32 = 1;
const NO_SEPARATOR: u32 = 0xffff_ffff;

/// The read-only DFA and LR tables a generated recognizer runs on.
///
/// Tables are frozen after construction; the lexer, the fuzzy matcher, and the parser
/// only read them, so an automaton may be shared by concurrent parses.
#[derive(Clone, PartialEq, Debug)]
pub struct Automaton {
    dfa_states: Vec<DfaStateData>,
    num_terminals: usize,
    num_variables: usize,
    num_virtuals: usize,
    separator: Option<TokenId>,
    num_lr_states: usize,
    /// dense rows of `num_terminals + 1 + num_variables` cells: terminal columns first,
    /// then the end-of-input column, then the goto columns
    actions: Vec<LRAction>,
    productions: Vec<Production>,
}

impl Automaton {
    pub fn new(
        dfa_states: Vec<DfaStateData>,
        num_terminals: usize,
        num_variables: usize,
        num_virtuals: usize,
        separator: Option<TokenId>,
        num_lr_states: usize,
        actions: Vec<LRAction>,
        productions: Vec<Production>,
    ) -> Self {
        assert_eq!(actions.len(), num_lr_states * (num_terminals + 1 + num_variables),
                   "action table size doesn't match the declared symbol counts");
        Automaton {
            dfa_states,
            num_terminals,
            num_variables,
            num_virtuals,
            separator,
            num_lr_states,
            actions,
            productions,
        }
    }

    #[inline]
    fn row_width(&self) -> usize {
        self.num_terminals + 1 + self.num_variables
    }

    pub fn num_dfa_states(&self) -> usize {
        self.dfa_states.len()
    }

    pub fn num_lr_states(&self) -> usize {
        self.num_lr_states
    }

    pub fn num_terminals(&self) -> usize {
        self.num_terminals
    }

    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    pub fn num_virtuals(&self) -> usize {
        self.num_virtuals
    }

    pub fn num_productions(&self) -> usize {
        self.productions.len()
    }

    /// ID of the end-of-input terminal: one past the regular terminals.
    #[inline]
    pub fn eof_token(&self) -> TokenId {
        self.num_terminals as TokenId
    }

    /// Terminal discarded by the lexer (typically whitespace), if any.
    #[inline]
    pub fn separator(&self) -> Option<TokenId> {
        self.separator
    }

    #[inline]
    pub fn get_state(&self, state: StateId) -> &DfaStateData {
        &self.dfa_states[state]
    }

    /// Action for `token` (a terminal or the end-of-input id) in LR state `state`.
    #[inline]
    pub fn get_action(&self, state: StateId, token: TokenId) -> LRAction {
        debug_assert!((token as usize) <= self.num_terminals);
        self.actions[state * self.row_width() + token as usize]
    }

    /// Transition for the variable `var` after a reduction.
    #[inline]
    pub fn get_goto(&self, state: StateId, var: VarId) -> LRAction {
        self.actions[state * self.row_width() + self.num_terminals + 1 + var as usize]
    }

    #[inline]
    pub fn get_production(&self, index: usize) -> &Production {
        &self.productions[index]
    }

    /// All the terminals (including the end-of-input id) for which `state` has a
    /// non-error action.
    pub fn get_expected(&self, state: StateId) -> Vec<TokenId> {
        (0..=self.num_terminals as TokenId)
            .filter(|&t| self.get_action(state, t) != LRAction::Error)
            .collect()
    }
}

// ---------------------------------------------------------------------------------------------
// Binary blob format
//
// All values little-endian. Layout:
//   magic [4] "LRLX", version u32
//   num_dfa_states, num_terminals, num_variables, num_virtuals,
//   num_lr_states, num_productions, separator (u32 each, separator = !0 when absent)
//   DFA states:   terminal_count u32, terminals u16 × n,
//                 cached u32 × 256,
//                 bulk_count u32, (start u32, end u32, target u32) × n
//   LR actions:   (code u16, data u16) × num_lr_states × row_width
//   productions:  head u16, head_action u16, reduction_length u16,
//                 bytecode_len u16, bytecode u16 × n

struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, offset: 0 }
    }

    fn read_u16(&mut self) -> Result<u16, AutomatonError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, AutomatonError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], AutomatonError> {
        if self.offset + n > self.bytes.len() {
            return Err(AutomatonError::TooShort { offset: self.offset });
        }
        let slice = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }
}

impl Automaton {
    /// Loads an automaton from the binary blob emitted by the generator.
    pub fn from_bytes(bytes: &[u8]) -> Result<Automaton, AutomatonError> {
        let mut cursor = Cursor::new(bytes);
        if cursor.take(4)? != &MAGIC[..] {
            return Err(AutomatonError::BadMagic);
        }
        let version = cursor.read_u32()?;
        if version != VERSION {
            return Err(AutomatonError::UnsupportedVersion(version));
        }
        let num_dfa_states = cursor.read_u32()? as usize;
        let num_terminals = cursor.read_u32()? as usize;
        let num_variables = cursor.read_u32()? as usize;
        let num_virtuals = cursor.read_u32()? as usize;
        let num_lr_states = cursor.read_u32()? as usize;
        let num_productions = cursor.read_u32()? as usize;
        let separator = match cursor.read_u32()? {
            NO_SEPARATOR => None,
            id if id < num_terminals as u32 => Some(id as TokenId),
            _ => return Err(AutomatonError::Corrupt("separator out of range")),
        };

        let mut dfa_states = Vec::with_capacity(num_dfa_states);
        for _ in 0..num_dfa_states {
            let terminal_count = cursor.read_u32()? as usize;
            let mut terminals = Vec::with_capacity(terminal_count);
            for _ in 0..terminal_count {
                let t = cursor.read_u16()?;
                if t as usize >= num_terminals {
                    return Err(AutomatonError::Corrupt("DFA terminal out of range"));
                }
                terminals.push(t);
            }
            let mut cached = Box::new([DEAD_STATE; 256]);
            for entry in cached.iter_mut() {
                *entry = cursor.read_u32()?;
                if *entry != DEAD_STATE && *entry >= num_dfa_states as u32 {
                    return Err(AutomatonError::Corrupt("cached transition out of range"));
                }
            }
            let bulk_count = cursor.read_u32()? as usize;
            let mut bulk = Vec::with_capacity(bulk_count);
            for _ in 0..bulk_count {
                let span = CharSpan {
                    start: cursor.read_u32()?,
                    end: cursor.read_u32()?,
                    target: cursor.read_u32()?,
                };
                if span.start > span.end || span.target >= num_dfa_states as u32 {
                    return Err(AutomatonError::Corrupt("bulk transition out of range"));
                }
                bulk.push(span);
            }
            dfa_states.push(DfaStateData::new(terminals, cached, bulk));
        }

        let row_width = num_terminals + 1 + num_variables;
        let mut actions = Vec::with_capacity(num_lr_states * row_width);
        for _ in 0..num_lr_states * row_width {
            let code = cursor.read_u16()?;
            let data = cursor.read_u16()?;
            let action = LRAction::from_cell(code, data)?;
            match action {
                LRAction::Shift(state) if state >= num_lr_states =>
                    return Err(AutomatonError::Corrupt("shift target out of range")),
                LRAction::Reduce(prod) if prod >= num_productions =>
                    return Err(AutomatonError::Corrupt("reduced production out of range")),
                _ => {}
            }
            actions.push(action);
        }

        let mut productions = Vec::with_capacity(num_productions);
        for _ in 0..num_productions {
            let head = cursor.read_u16()?;
            if head as usize >= num_variables {
                return Err(AutomatonError::Corrupt("production head out of range"));
            }
            let head_action = TreeAction::from_bits(cursor.read_u16()?);
            let reduction_length = cursor.read_u16()? as usize;
            let bytecode_len = cursor.read_u16()? as usize;
            let mut bytecode = Vec::with_capacity(bytecode_len);
            for _ in 0..bytecode_len {
                bytecode.push(cursor.read_u16()?);
            }
            Self::check_bytecode(&bytecode, num_virtuals)?;
            productions.push(Production { head, head_action, reduction_length, bytecode });
        }

        Ok(Automaton::new(
            dfa_states,
            num_terminals,
            num_variables,
            num_virtuals,
            separator,
            num_lr_states,
            actions,
            productions,
        ))
    }

    fn check_bytecode(bytecode: &[u16], num_virtuals: usize) -> Result<(), AutomatonError> {
        let mut i = 0;
        while i < bytecode.len() {
            let word = bytecode[i];
            if word & !3 > LROpCode::BASE_SEMANTIC_ACTION {
                return Err(AutomatonError::Corrupt("invalid reduction opcode"));
            }
            let op = LROpCode::from_word(word);
            if op.operands() > 0 {
                i += 1;
                if i >= bytecode.len() {
                    return Err(AutomatonError::Corrupt("missing bytecode operand"));
                }
                if matches!(op, LROpCode::AddVirtual(_)) && bytecode[i] as usize >= num_virtuals {
                    return Err(AutomatonError::Corrupt("virtual index out of range"));
                }
            }
            i += 1;
        }
        Ok(())
    }

    /// Writes the automaton back to the blob layout, byte-for-byte what
    /// [`from_bytes`](Automaton::from_bytes) reads.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        for value in [
            VERSION,
            self.dfa_states.len() as u32,
            self.num_terminals as u32,
            self.num_variables as u32,
            self.num_virtuals as u32,
            self.num_lr_states as u32,
            self.productions.len() as u32,
            self.separator.map(|t| t as u32).unwrap_or(NO_SEPARATOR),
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        for state in &self.dfa_states {
            out.extend_from_slice(&(state.terminals.len() as u32).to_le_bytes());
            for &t in &state.terminals {
                out.extend_from_slice(&t.to_le_bytes());
            }
            for &target in state.cached.iter() {
                out.extend_from_slice(&target.to_le_bytes());
            }
            out.extend_from_slice(&(state.bulk.len() as u32).to_le_bytes());
            for span in &state.bulk {
                out.extend_from_slice(&span.start.to_le_bytes());
                out.extend_from_slice(&span.end.to_le_bytes());
                out.extend_from_slice(&span.target.to_le_bytes());
            }
        }
        for &action in &self.actions {
            let (code, data) = action.to_cell();
            out.extend_from_slice(&code.to_le_bytes());
            out.extend_from_slice(&data.to_le_bytes());
        }
        for production in &self.productions {
            out.extend_from_slice(&production.head.to_le_bytes());
            out.extend_from_slice(&(production.head_action as u16).to_le_bytes());
            out.extend_from_slice(&(production.reduction_length as u16).to_le_bytes());
            out.extend_from_slice(&(production.bytecode.len() as u16).to_le_bytes());
            for &word in &production.bytecode {
                out.extend_from_slice(&word.to_le_bytes());
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn cached_with(entries: &[(u8, u32)]) -> Box<[u32; 256]> {
        let mut cached = Box::new([DEAD_STATE; 256]);
        for &(c, target) in entries {
            cached[c as usize] = target;
        }
        cached
    }

    fn sample_automaton() -> Automaton {
        let dfa = vec![
            DfaStateData::new(
                vec![],
                cached_with(&[(b'a', 1)]),
                vec![CharSpan { start: 0x100, end: 0x2ff, target: 1 }]),
            DfaStateData::dead(vec![0]),
        ];
        // one variable, one terminal: S -> 'a'
        let actions = vec![
            // state 0: 'a' => shift 1, eof err, goto S => 2
            LRAction::Shift(1), LRAction::Error, LRAction::Shift(2),
            // state 1: reduce S -> 'a' on eof
            LRAction::Error, LRAction::Reduce(0), LRAction::Error,
            // state 2: accept
            LRAction::Error, LRAction::Accept, LRAction::Error,
        ];
        Automaton::new(dfa, 1, 1, 1, None, 3, actions, vec![Production::plain(0, 1)])
    }

    #[test]
    fn opcode_words() {
        let ops = [
            LROpCode::PopStack(TreeAction::None),
            LROpCode::PopStack(TreeAction::Drop),
            LROpCode::PopStack(TreeAction::Promote),
            LROpCode::PopStack(TreeAction::ReplaceByChildren),
            LROpCode::AddVirtual(TreeAction::None),
            LROpCode::AddVirtual(TreeAction::Drop),
            LROpCode::SemanticAction,
        ];
        for op in ops {
            assert_eq!(LROpCode::from_word(op.to_word()), op, "round-trip of {op:?}");
        }
    }

    #[test]
    fn state_transitions() {
        let automaton = sample_automaton();
        let state = automaton.get_state(0);
        assert!(!state.is_dead_end());
        assert_eq!(state.next_state('a'), Some(1));
        assert_eq!(state.next_state('b'), None);
        assert_eq!(state.next_state('\u{100}'), Some(1));
        assert_eq!(state.next_state('\u{2ff}'), Some(1));
        assert_eq!(state.next_state('\u{300}'), None);
        let end = automaton.get_state(1);
        assert!(end.is_dead_end());
        assert!(end.is_accepting());
    }

    #[test]
    fn expected_sets() {
        let automaton = sample_automaton();
        assert_eq!(automaton.get_expected(0), vec![0]);
        assert_eq!(automaton.get_expected(1), vec![automaton.eof_token()]);
    }

    #[test]
    fn blob_round_trip() {
        let automaton = sample_automaton();
        let bytes = automaton.to_bytes();
        let loaded = Automaton::from_bytes(&bytes).expect("blob should load");
        assert_eq!(loaded, automaton);
        assert_eq!(loaded.to_bytes(), bytes);
    }

    #[test]
    fn blob_errors() {
        let automaton = sample_automaton();
        let bytes = automaton.to_bytes();
        assert_eq!(Automaton::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err(),
                   AutomatonError::TooShort { offset: bytes.len() - 2 });
        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert_eq!(Automaton::from_bytes(&bad_magic).unwrap_err(), AutomatonError::BadMagic);
        let mut bad_version = bytes.clone();
        bad_version[4] = 9;
        assert_eq!(Automaton::from_bytes(&bad_version).unwrap_err(),
                   AutomatonError::UnsupportedVersion(9));
    }
}
