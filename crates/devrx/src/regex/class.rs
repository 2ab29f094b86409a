// Character classes for regex programs
// Handles \d, \w, \s and their negations, plus [set] items

/// Builtin shorthand class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharClass {
    Digit, // \d
    Word,  // \w
    Space, // \s
}

impl CharClass {
    /// `ascii` restricts the class to ASCII characters.
    #[inline]
    pub fn matches(&self, c: char, ascii: bool) -> bool {
        match (self, ascii) {
            (CharClass::Digit, true) => c.is_ascii_digit(),
            (CharClass::Digit, false) => c.is_numeric(),
            (CharClass::Word, true) => c.is_ascii_alphanumeric() || c == '_',
            (CharClass::Word, false) => c.is_alphanumeric() || c == '_',
            (CharClass::Space, true) => matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c'),
            (CharClass::Space, false) => c.is_whitespace(),
        }
    }

    pub fn escape_letter(&self) -> char {
        match self {
            CharClass::Digit => 'd',
            CharClass::Word => 'w',
            CharClass::Space => 's',
        }
    }
}

/// An item inside a character set [...]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetItem {
    Char(char),
    Range(char, char),
    Class(CharClass),
    InvertedClass(CharClass),
}

impl SetItem {
    #[inline]
    pub fn matches(&self, c: char, ascii: bool) -> bool {
        match self {
            SetItem::Char(ch) => c == *ch,
            SetItem::Range(start, end) => c >= *start && c <= *end,
            SetItem::Class(class) => class.matches(c, ascii),
            SetItem::InvertedClass(class) => !class.matches(c, ascii),
        }
    }
}

/// A compiled class referenced by `Class`/`NClass` instructions.
/// Always stored positive; negation lives in the opcode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CharSet {
    items: Vec<SetItem>,
    ascii: bool,
}

impl CharSet {
    pub fn new(items: Vec<SetItem>, ascii: bool) -> Self {
        Self { items, ascii }
    }

    pub fn items(&self) -> &[SetItem] {
        &self.items
    }

    pub fn is_ascii(&self) -> bool {
        self.ascii
    }

    pub fn matches(&self, c: char) -> bool {
        self.items.iter().any(|item| item.matches(c, self.ascii))
    }
}

impl std::fmt::Display for CharSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for item in &self.items {
            match item {
                SetItem::Char(c) => write!(f, "{}", c.escape_debug())?,
                SetItem::Range(lo, hi) => write!(f, "{}-{}", lo.escape_debug(), hi.escape_debug())?,
                SetItem::Class(class) => write!(f, "\\{}", class.escape_letter())?,
                SetItem::InvertedClass(class) => {
                    write!(f, "\\{}", class.escape_letter().to_ascii_uppercase())?
                }
            }
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_matches() {
        assert!(CharClass::Digit.matches('5', true));
        assert!(!CharClass::Digit.matches('x', true));
        assert!(CharClass::Digit.matches('٣', false));
        assert!(!CharClass::Digit.matches('٣', true));
        assert!(CharClass::Word.matches('_', true));
        assert!(CharClass::Word.matches('é', false));
        assert!(!CharClass::Word.matches('é', true));
        assert!(CharClass::Space.matches('\t', true));
        assert!(CharClass::Space.matches('\u{3000}', false));
        assert!(!CharClass::Space.matches('a', false));
    }

    #[test]
    fn test_set_matches() {
        let set = CharSet::new(
            vec![SetItem::Range('a', 'f'), SetItem::Char('_'), SetItem::InvertedClass(CharClass::Word)],
            true,
        );
        assert!(set.matches('c'));
        assert!(set.matches('_'));
        assert!(set.matches(' '));
        assert!(!set.matches('z'));
        assert!(!set.matches('7'));
    }

    #[test]
    fn test_set_display() {
        let set = CharSet::new(vec![SetItem::Range('0', '9'), SetItem::Class(CharClass::Space), SetItem::Char('\n')], false);
        assert_eq!(set.to_string(), "[0-9\\s\\n]");
    }
}
