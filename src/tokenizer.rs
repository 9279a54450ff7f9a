use crate::unistring::Unistring;
use std::ops::Range;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, derive_more::Display)]
/// Грубый класс токена.
pub enum TokenType {
    #[display(fmt = "WORD")]
    Word,
    #[display(fmt = "NUMB")]
    Numb,
    #[display(fmt = "PNCT")]
    Pnct,
    #[display(fmt = "SEPR")]
    Sepr,
    #[display(fmt = "OTHER")]
    Other,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Письменность словесного токена. Слова не из кириллицы минуют
/// морфологический анализ.
pub enum Script {
    Cyrillic,
    Latin,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Исходный текст токена, байт в байт.
    pub text: String,
    /// Байтовый диапазон в исходной строке.
    pub span: Range<usize>,
    pub kind: TokenType,
    /// Только для `TokenType::Word`.
    pub script: Option<Script>,
}

impl Token {
    /// Нормализованная форма: канонические буквы в верхнем регистре.
    pub fn normalized(&self) -> Unistring {
        Unistring::from(self.text.as_str()).to_upper_case()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum CharClass {
    Letter,
    Digit,
    Punct,
    Space,
    Other,
}

fn classify(c: char) -> CharClass {
    if c.is_whitespace() {
        CharClass::Space
    } else if c.is_alphabetic() {
        CharClass::Letter
    } else if c.is_numeric() {
        CharClass::Digit
    } else if c.is_ascii_punctuation() || matches!(c, '«' | '»' | '—' | '–' | '…' | '„' | '“' | '”') {
        CharClass::Punct
    } else {
        CharClass::Other
    }
}

fn kind_of(class: CharClass) -> TokenType {
    match class {
        CharClass::Letter => TokenType::Word,
        CharClass::Digit => TokenType::Numb,
        CharClass::Punct => TokenType::Pnct,
        CharClass::Space => TokenType::Sepr,
        CharClass::Other => TokenType::Other,
    }
}

fn script_of(text: &str) -> Script {
    let mut cyr = false;
    let mut lat = false;
    for c in text.chars() {
        match c {
            'А'..='я' | 'ё' | 'Ё' => cyr = true,
            'A'..='Z' | 'a'..='z' => lat = true,
            _ => {
                return Script::Mixed;
            }
        }
    }
    match (cyr, lat) {
        (true, false) => Script::Cyrillic,
        (false, true) => Script::Latin,
        _ => Script::Mixed,
    }
}

/// Детерминированная разбивка текста на токены.
///
/// Токен закрывается при смене класса символа и принудительно на переводе
/// строки. Разделители тоже выходят токенами, поэтому конкатенация текстов
/// всех токенов побайтно восстанавливает вход.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut start = 0usize;
    let mut current: Option<CharClass> = None;

    let flush = |tokens: &mut Vec<Token>, start: usize, end: usize, class: CharClass| {
        if start == end {
            return;
        }
        let piece = &text[start..end];
        let kind = kind_of(class);
        tokens.push(Token {
            text: piece.to_string(),
            span: start..end,
            kind,
            script: (kind == TokenType::Word).then(|| script_of(piece)),
        });
    };

    for (idx, c) in text.char_indices() {
        let class = classify(c);

        let force_break = c == '\n';
        let boundary = match current {
            None => false,
            Some(prev) => prev != class,
        };

        if boundary || force_break {
            if let Some(prev) = current {
                flush(&mut tokens, start, idx, prev);
            }
            start = idx;
            current = Some(class);
            if force_break {
                // Перевод строки выходит отдельным токеном-разделителем.
                flush(&mut tokens, idx, idx + c.len_utf8(), class);
                start = idx + c.len_utf8();
                current = None;
            }
        } else if current.is_none() {
            start = idx;
            current = Some(class);
        }
    }

    if let Some(class) = current {
        flush(&mut tokens, start, text.len(), class);
    }

    tokens
}
