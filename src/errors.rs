// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

use std::fmt::{Display, Formatter};
use crate::CollectJoin;
use crate::lexer::Token;
use crate::symbols::{SymInfoTable, Symbol};
use crate::text::{escape_char, Pos};
use crate::TokenId;

// ---------------------------------------------------------------------------------------------

/// Errors found while lexing and parsing a text.
///
/// Errors are reported, never thrown: the parser records them and keeps going until
/// recovery fails or too many of them have accumulated.
#[derive(Clone, PartialEq, Debug)]
pub enum ParseError {
    /// The lexer met a character (or the end of the input) it couldn't include in any token.
    /// `chr` is `None` when the error points one past the end of the input.
    UnexpectedChar { chr: Option<char>, pos: Pos },
    /// The parser met a token that no action in the current state accepts.
    UnexpectedToken { token: Token, expected: Vec<TokenId>, pos: Pos },
}

impl ParseError {
    pub fn get_pos(&self) -> Pos {
        match self {
            ParseError::UnexpectedChar { pos, .. }
            | ParseError::UnexpectedToken { pos, .. } => *pos,
        }
    }

    pub fn is_lexical(&self) -> bool {
        matches!(self, ParseError::UnexpectedChar { .. })
    }

    pub fn is_syntactic(&self) -> bool {
        matches!(self, ParseError::UnexpectedToken { .. })
    }

    /// Human-readable rendering of the offending value: the character, the token
    /// text, or an empty string for a pure insertion at the end of the input.
    pub fn get_value(&self) -> String {
        match self {
            ParseError::UnexpectedChar { chr: Some(c), .. } => c.to_string(),
            ParseError::UnexpectedChar { chr: None, .. } => String::new(),
            ParseError::UnexpectedToken { token, .. } => token.value.clone(),
        }
    }

    /// Formats the error message, using the symbol table for terminal names if available.
    pub fn to_str<T: SymInfoTable>(&self, symbol_table: Option<&T>) -> String {
        match self {
            ParseError::UnexpectedChar { chr, pos: Pos(line, col) } => {
                let value = chr.map(escape_char).unwrap_or_default();
                format!("lexical error: unexpected character '{value}', line {line}, col {col}")
            }
            ParseError::UnexpectedToken { token, expected, pos: Pos(line, col) } => {
                let expected = expected.iter()
                    .map(|&t| format!("'{}'", Symbol::T(t).to_str(symbol_table)))
                    .join(", ");
                format!("syntax error: found input '{}' instead of {expected}, line {line}, col {col}",
                        Symbol::T(token.id).to_str(symbol_table))
            }
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str::<crate::symbols::FixedSymTable>(None))
    }
}

// ---------------------------------------------------------------------------------------------

/// Error sink shared by the lexer, the fuzzy matcher, and the parser.
///
/// Errors are appended in detection order, which coincides with input order because
/// lexing and parsing are deterministic left-to-right.
#[derive(Default, Debug)]
pub struct ParseErrors {
    errors: Vec<ParseError>,
}

impl ParseErrors {
    pub fn new() -> Self {
        ParseErrors::default()
    }

    pub fn push(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, index: usize) -> &ParseError {
        &self.errors[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParseError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<ParseError> {
        self.errors
    }
}
