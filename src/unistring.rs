use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::ops::Range;

/// Количество букв, которое вмещает в себя большую часть русских словоформ,
/// чтобы не аллоцировать под короткие слова место на куче.
pub const SMALLWORD: usize = 16;

/// Гласные русского языка. `Ё` не входит, т.к. каноникализация сводит ее к `Е`.
const VOWELS: [char; 9] = ['А', 'Е', 'И', 'О', 'У', 'Ы', 'Э', 'Ю', 'Я'];

/// Диакритики, которые при нормализации склеиваются с предыдущей буквой
/// (ударения в словарных текстах) и отбрасываются.
const COMBINING: Range<char> = '\u{0300}'..'\u{0370}';

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
/// Одна видимая буква в каноничной форме.
///
/// Каноникализация: `ё` сводится к `е`, диакритики отброшены еще при сборке
/// строки. Сравнение и порядок — по кодпоинту каноничной формы.
pub struct Char(char);

impl Char {
    /// `None` для диакритик: они принадлежат предыдущей букве.
    pub fn new(c: char) -> Option<Self> {
        if COMBINING.contains(&c) {
            return None;
        }
        Some(Self(Self::canonical(c)))
    }

    fn canonical(c: char) -> char {
        match c {
            'ё' => 'е',
            'Ё' => 'Е',
            c => c,
        }
    }

    pub fn as_char(&self) -> char {
        self.0
    }

    pub fn to_upper(&self) -> Self {
        // Для кириллицы и латиницы uppercase всегда одна буква.
        Self(self.0.to_uppercase().next().unwrap_or(self.0))
    }

    pub fn to_lower(&self) -> Self {
        Self(self.0.to_lowercase().next().unwrap_or(self.0))
    }

    pub fn is_vowel(&self) -> bool {
        VOWELS.contains(&self.to_upper().0)
    }

    pub fn is_cyrillic(&self) -> bool {
        matches!(self.0, 'А'..='я' | 'ё' | 'Ё')
    }

    pub fn is_alphabetic(&self) -> bool {
        self.0.is_alphabetic()
    }

    pub fn is_numeric(&self) -> bool {
        self.0.is_numeric()
    }
}

impl From<char> for Char {
    fn from(c: char) -> Self {
        Self(Self::canonical(c))
    }
}

impl fmt::Display for Char {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Неизменяемая последовательность букв [`Char`].
///
/// Все словарные ключи и леммы хранятся именно так: индексация и срезы
/// работают по буквам, а не по байтам. Хэш — покомпонентный по порядку.
pub struct Unistring(SmallVec<[Char; SMALLWORD]>);

impl Unistring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<Char> {
        self.0.get(idx).copied()
    }

    pub fn chars(&self) -> impl DoubleEndedIterator<Item = Char> + '_ {
        self.0.iter().copied()
    }

    pub fn push(&mut self, c: Char) {
        self.0.push(c);
    }

    /// Срез по буквам. Выход за границы дает пустую строку.
    pub fn slice(&self, range: Range<usize>) -> Self {
        match self.0.get(range) {
            Some(part) => Self(SmallVec::from_slice(part)),
            None => Self::new(),
        }
    }

    /// Отрезание `n` букв слева.
    pub fn cut_left(&self, n: usize) -> Self {
        self.slice(n.min(self.len())..self.len())
    }

    /// Отрезание `n` букв справа.
    pub fn cut_right(&self, n: usize) -> Self {
        self.slice(0..self.len().saturating_sub(n))
    }

    pub fn concat(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.0.extend(other.chars());
        out
    }

    pub fn split(&self, sep: char) -> Vec<Self> {
        let sep = Char::from(sep);
        let mut parts = vec![Self::new()];

        for c in self.chars() {
            if c == sep {
                parts.push(Self::new());
            } else {
                parts.last_mut().expect("non-empty by construction").push(c);
            }
        }

        parts
    }

    pub fn contains(&self, c: char) -> bool {
        let c = Char::from(c);
        self.chars().any(|x| x == c)
    }

    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.len() >= prefix.len() && self.0[..prefix.len()] == prefix.0[..]
    }

    pub fn ends_with(&self, suffix: &Self) -> bool {
        self.0.len() >= suffix.len() && self.0[self.len() - suffix.len()..] == suffix.0[..]
    }

    pub fn to_upper_case(&self) -> Self {
        self.chars().map(|c| c.to_upper()).collect()
    }

    pub fn to_lower_case(&self) -> Self {
        self.chars().map(|c| c.to_lower()).collect()
    }

    /// Обратный порядок букв. Используется суффиксным словарем.
    pub fn reversed(&self) -> Self {
        self.chars().rev().collect()
    }
}

impl From<&str> for Unistring {
    fn from(s: &str) -> Self {
        // Диакритики отбрасываются: видимая буква остается одна.
        s.chars().filter_map(Char::new).collect()
    }
}

impl FromIterator<Char> for Unistring {
    fn from_iter<T: IntoIterator<Item = Char>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Unistring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.chars() {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}
