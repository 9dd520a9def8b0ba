//! Label tokenization.
//!
//! Labels are turned into fixed-width integer token sequences of the form
//! `[GO_ID, symbol indices..., EOS_ID]`. Symbol indices come from a
//! [`Charmap`], whose first [`RESERVED_SLOTS`] indices are never assigned to
//! a symbol so they can serve as padding and sequence markers.

use std::collections::HashMap;

use crate::error::ScanbatchError;

/// A single token in an encoded label.
pub type Token = i32;

/// Padding value used to fill short rows in a batch.
pub const PAD_ID: Token = 0;
/// Marks the start of a token sequence.
pub const GO_ID: Token = 1;
/// Marks the end of a token sequence.
pub const EOS_ID: Token = 2;
/// Number of leading charmap indices that never map to a symbol.
pub const RESERVED_SLOTS: usize = 3;

const ALPHANUMERIC: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

const EXTENDED_SYMBOLS: &[char] = &[
    'ä', 'ü', 'ö', 'Ä', 'Ü', 'ù', 'Ù', 'ú', 'U', 'è', 'È', 'é', 'É', 'á', 'Á', 'à', 'À', 'ó', 'Ó',
    'ò', 'Ò', 'ï', 'Ï', 'ì', 'Ì', 'í', 'Í', 'Ö', 'â', 'Â', 'ê', 'Ê', 'ô', 'Ô', 'û', 'Û', '€', '£',
    'ë', 'ß',
];

// Never seen in the training data so far.
const EXCLUDED_SYMBOLS: &[char] = &[
    '%', '{', '=', '^', '<', '"', '#', '~', '`', '[', '}', ']', '\\', '>', '*', '|', 'ä', 'ü', 'ö',
    'Ä', 'Ü', 'Ö', 'ß', 'ï', 'Ï', 'â', 'Â', 'ê', 'Ê', 'ô', 'Ô', 'û', 'Û', 'ë',
];

/// Ordered symbol table mapping characters to token indices.
///
/// Symbols are numbered in insertion order starting at [`RESERVED_SLOTS`].
/// A symbol listed twice keeps its first index; the later slot stays
/// occupied so the numbering of everything after it is unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Charmap {
    symbols: Vec<char>,
    index: HashMap<char, Token>,
}

impl Charmap {
    /// Builds a charmap from an ordered symbol list.
    pub fn new(symbols: impl IntoIterator<Item = char>) -> Self {
        let symbols: Vec<char> = symbols.into_iter().collect();
        let mut index = HashMap::with_capacity(symbols.len());
        for (i, &symbol) in symbols.iter().enumerate() {
            index
                .entry(symbol)
                .or_insert((i + RESERVED_SLOTS) as Token);
        }
        Self { symbols, index }
    }

    /// Digits and upper-case Latin letters.
    pub fn alphanumeric() -> Self {
        Self::new(ALPHANUMERIC.chars())
    }

    /// Printable ASCII plus common Western European accents and currency
    /// signs, minus the symbols that never occur in the training data.
    pub fn full_ascii() -> Self {
        let mut symbols: Vec<char> = (32u8..127).map(char::from).collect();
        symbols.extend_from_slice(EXTENDED_SYMBOLS);

        // Removes only the first occurrence, so the duplicated 'U' survives.
        for excluded in EXCLUDED_SYMBOLS {
            if let Some(pos) = symbols.iter().position(|c| c == excluded) {
                symbols.remove(pos);
            }
        }

        Self::new(symbols)
    }

    /// Looks up the token index of a symbol.
    pub fn index_of(&self, symbol: char) -> Option<Token> {
        self.index.get(&symbol).copied()
    }

    /// The symbol for a token index, if the index is not reserved.
    pub fn symbol_at(&self, token: Token) -> Option<char> {
        let slot = usize::try_from(token).ok()?.checked_sub(RESERVED_SLOTS)?;
        self.symbols.get(slot).copied()
    }

    /// Ordered symbols, excluding the reserved slots.
    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    /// Total table length including the reserved slots.
    pub fn len(&self) -> usize {
        self.symbols.len() + RESERVED_SLOTS
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Decodes a token sequence back into text, skipping markers and padding.
    pub fn decode(&self, tokens: &[Token]) -> String {
        tokens
            .iter()
            .take_while(|&&t| t != EOS_ID)
            .filter_map(|&t| self.symbol_at(t))
            .collect()
    }
}

impl Default for Charmap {
    fn default() -> Self {
        Self::alphanumeric()
    }
}

/// Converts raw label bytes into a token sequence.
///
/// `max_tokens` is the label-length bound of the largest bucket; the encoded
/// sequence, GO and EOS included, must be strictly shorter than it.
/// `comment` only feeds the error messages.
pub fn encode_label(
    charmap: &Charmap,
    label: &[u8],
    max_tokens: usize,
    comment: &str,
) -> Result<Vec<Token>, ScanbatchError> {
    let text = std::str::from_utf8(label).map_err(|_| ScanbatchError::InvalidLabelEncoding {
        comment: comment.to_string(),
    })?;

    let mut tokens = Vec::with_capacity(text.chars().count() + 2);
    tokens.push(GO_ID);
    for symbol in text.chars() {
        let token = charmap
            .index_of(symbol)
            .ok_or_else(|| ScanbatchError::SymbolNotInCharmap {
                symbol,
                comment: comment.to_string(),
            })?;
        tokens.push(token);
    }
    tokens.push(EOS_ID);

    if tokens.len() >= max_tokens {
        return Err(ScanbatchError::LabelTooLong {
            len: tokens.len(),
            max: max_tokens,
            comment: comment.to_string(),
        });
    }

    Ok(tokens)
}
