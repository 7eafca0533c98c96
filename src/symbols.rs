// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

use std::fmt::{Display, Formatter};
use crate::{TokenId, VarId, VirtId};

// ---------------------------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Debug, Hash)]
pub enum Symbol {
    /// terminal
    T(TokenId),
    /// nonterminal
    NT(VarId),
    /// virtual symbol
    V(VirtId),
    /// end of stream
    End,
}

impl Symbol {
    pub fn is_end(&self) -> bool {
        matches!(self, Symbol::End)
    }

    pub fn is_t(&self) -> bool {
        matches!(self, Symbol::T(_))
    }

    pub fn is_nt(&self) -> bool {
        matches!(self, Symbol::NT(_))
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Symbol::V(_))
    }

    pub fn to_str<T: SymInfoTable>(&self, symbol_table: Option<&T>) -> String {
        symbol_table.map(|t| t.get_str(self)).unwrap_or(self.to_string())
    }

    pub fn to_str_name<T: SymInfoTable>(&self, symbol_table: Option<&T>) -> String {
        symbol_table.map(|t| t.get_name(self)).unwrap_or(self.to_string())
    }

    /// Converts the symbol to string, using the symbol table if available, and
    /// surrounding it with quotes if it's a string literal.
    pub fn to_str_quote<T: SymInfoTable>(&self, symbol_table: Option<&T>) -> String {
        symbol_table.map(|t| t.get_name_quote(self)).unwrap_or(self.to_string())
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::T(id) => write!(f, ":{id}"),
            Symbol::NT(id) => write!(f, "{id}"),
            Symbol::V(id) => write!(f, "^{id}"),
            Symbol::End => write!(f, "$"),
        }
    }
}

// ---------------------------------------------------------------------------------------------

/// Stores the names of the terminal, nonterminal, and virtual symbols used by a parser.
///
/// Terminals are defined in the lexicon. They have two parts to their name:
/// - the identifier in the lexicon
/// - the source string they represent (optional)
///
/// For example, if `Plus` is declared as `Plus: '+';` and `ID` as `ID: [a-z]+;`,
/// ```ignore
/// t[0] = ("Plus".to_string(), Some("+".to_string()));
/// t[1] = ("ID".to_string(), None);
/// ```
///
/// Nonterminals are defined in the grammar. Virtual symbols only exist in the syntax
/// tree: they are injected by reductions and have no source text.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedSymTable {
    t: Vec<(String, Option<String>)>,   // terminal identifiers and optional representation
    nt: Vec<String>,                    // nonterminal identifiers
    virt: Vec<String>,                  // virtual symbol identifiers
}

impl FixedSymTable {
    pub fn new(t: Vec<(String, Option<String>)>, nt: Vec<String>, virt: Vec<String>) -> Self {
        FixedSymTable { t, nt, virt }
    }

    pub fn get_terminals(&self) -> impl Iterator<Item = &(String, Option<String>)> {
        self.t.iter()
    }

    pub fn get_num_t(&self) -> usize {
        self.t.len()
    }

    pub fn get_nonterminals(&self) -> impl Iterator<Item = &String> {
        self.nt.iter()
    }

    pub fn get_num_nt(&self) -> usize {
        self.nt.len()
    }

    pub fn get_virtuals(&self) -> impl Iterator<Item = &String> {
        self.virt.iter()
    }

    pub fn get_num_virt(&self) -> usize {
        self.virt.len()
    }

    pub fn dump(&self, title: &str) -> String {
        use iter_index::IndexerIterator;
        use crate::CollectJoin;
        let mut result = String::new();
        if !title.is_empty() {
            result.push_str(title);
            result.push('\n');
        }
        result.push_str(&format!(
            "- terminals:\n{}\n",
            self.get_terminals().index::<TokenId>()
                .map(|(t, (n, v_maybe))| format!("  - T[{t}]: {n}{}", if let Some(v) = v_maybe { format!(" = {v:?}") } else { String::new() }))
                .join("\n")));
        result.push_str(&format!(
            "- nonterminals:\n{}\n",
            self.get_nonterminals().index::<VarId>().map(|(v, s)| format!("  - NT[{v}]: {s}")).join("\n")));
        if !self.virt.is_empty() {
            result.push_str(&format!(
                "- virtuals:\n{}\n",
                self.get_virtuals().index::<VirtId>().map(|(v, s)| format!("  - V[{v}]: {s}")).join("\n")));
        }
        result
    }
}

pub trait SymInfoTable {
    /// Does `Symbol::T(token)` hold lexer string data?
    ///
    /// Terminals are divided into two categories: fixed and variable content. When the
    /// terminal is defined with choices and ranges of characters, like `ID: [a-z]+`, it
    /// contains variable content: data like the ID specifier.
    fn is_token_data(&self, token: TokenId) -> bool;

    fn get_t_str(&self, token: TokenId) -> String;

    fn get_t_name(&self, token: TokenId) -> String;

    fn get_nt_name(&self, var: VarId) -> String;

    fn get_virt_name(&self, virt: VirtId) -> String;

    /// Gets the symbol's name: the nonterminal identifier, the terminal identifier,
    /// or "$", ...
    fn get_name(&self, symbol: &Symbol) -> String;

    /// Gets the symbol's representation string: the nonterminal identifier, the
    /// terminal string value (if it exists), or "$", ...
    fn get_str(&self, symbol: &Symbol) -> String;

    fn get_name_quote(&self, symbol: &Symbol) -> String;
}

impl SymInfoTable for FixedSymTable {
    fn is_token_data(&self, token: TokenId) -> bool {
        self.t.get(token as usize).map(|t| t.1.is_none()).unwrap_or(false)
    }

    fn get_t_str(&self, token: TokenId) -> String {
        match token as usize {
            i if i < self.t.len() => {
                let (name, literal) = &self.t[i];
                literal.as_ref().unwrap_or(name).clone()
            }
            i if i == self.t.len() => "<EOF>".to_string(),
            _ => format!("T({token}?)")
        }
    }

    fn get_t_name(&self, token: TokenId) -> String {
        match token as usize {
            i if i < self.t.len() => self.t[i].0.clone(),
            i if i == self.t.len() => "<EOF>".to_string(),
            _ => format!("T({token}?)")
        }
    }

    fn get_nt_name(&self, var: VarId) -> String {
        if var as usize >= self.nt.len() { return format!("NT({var}?)") }
        self.nt[var as usize].clone()
    }

    fn get_virt_name(&self, virt: VirtId) -> String {
        if virt as usize >= self.virt.len() { return format!("V({virt}?)") }
        self.virt[virt as usize].clone()
    }

    fn get_name(&self, symbol: &Symbol) -> String {
        match symbol {
            Symbol::End => symbol.to_string(),
            Symbol::T(token) => self.get_t_name(*token),
            Symbol::NT(var) => self.get_nt_name(*var),
            Symbol::V(virt) => self.get_virt_name(*virt),
        }
    }

    fn get_str(&self, symbol: &Symbol) -> String {
        match symbol {
            Symbol::End => symbol.to_string(),
            Symbol::T(token) => self.get_t_str(*token),
            Symbol::NT(var) => self.get_nt_name(*var),
            Symbol::V(virt) => self.get_virt_name(*virt),
        }
    }

    fn get_name_quote(&self, symbol: &Symbol) -> String {
        match symbol {
            Symbol::T(token) if !self.is_token_data(*token) && (*token as usize) < self.t.len() =>
                format!("{:?}", self.get_t_str(*token)),
            _ => self.get_str(symbol),
        }
    }
}
