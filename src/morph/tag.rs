use crate::morph::grammemes::*;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Маска всех допустимых бит составного тега, включая UNKN.
const VALID_MASK: u64 = (1u64 << (UNKN_BIT + 1)) - 1;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Составной морфологический тег: битсет по граммемам.
///
/// Биты разных категорий (часть речи, падеж, род и т.д.) объединяются
/// через OR. Порядок — числовой по битам, он же канонический порядок
/// тегов при разрешении ничьих.
pub struct MorphTag(u64);

impl MorphTag {
    pub const EMPTY: Self = Self(0);
    /// Тег нераспознанного слова.
    pub const UNKN: Self = Self(1 << UNKN_BIT);

    pub fn with(self, g: impl Into<Grammem>) -> Self {
        match g.into().bit() {
            Some(bit) => Self(self.0 | (1 << bit)),
            None => self,
        }
    }

    pub fn set(&mut self, g: impl Into<Grammem>) {
        *self = self.with(g);
    }

    pub fn contains(&self, g: impl Into<Grammem>) -> bool {
        match g.into().bit() {
            Some(bit) => self.0 & (1 << bit) != 0,
            None => false,
        }
    }

    /// `a.subsumes(b)` — все биты `a` присутствуют в `b`.
    /// Синтез ищет форму, чей тег поглощает запрошенный.
    pub fn subsumes(&self, other: &Self) -> bool {
        self.0 & other.0 == self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 & (1 << UNKN_BIT) != 0
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Восстановление из сырых бит блоба. Лишние биты — признак порчи.
    pub fn from_bits(bits: u64) -> Option<Self> {
        (bits & !VALID_MASK == 0).then_some(Self(bits))
    }

    fn category<T: Copy + Into<Grammem>>(&self, all: &'static [T]) -> Option<T> {
        all.iter().find(|g| self.contains(**g)).copied()
    }

    pub fn pos(&self) -> Option<ParteSpeech> {
        self.category(ParteSpeech::ALL)
    }

    pub fn case(&self) -> Option<Case> {
        self.category(Case::ALL)
    }

    pub fn gender(&self) -> Option<Gender> {
        self.category(Gender::ALL)
    }

    pub fn number(&self) -> Option<Number> {
        self.category(Number::ALL)
    }

    pub fn tense(&self) -> Option<Tense> {
        self.category(Tense::ALL)
    }

    /// Все граммемы тега в порядке бит.
    pub fn grammemes(&self) -> Vec<Grammem> {
        let all = ParteSpeech::ALL
            .iter()
            .map(|g| Grammem::from(*g))
            .chain(Case::ALL.iter().map(|g| Grammem::from(*g)))
            .chain(Gender::ALL.iter().map(|g| Grammem::from(*g)))
            .chain(Number::ALL.iter().map(|g| Grammem::from(*g)))
            .chain(Tense::ALL.iter().map(|g| Grammem::from(*g)))
            .chain(Person::ALL.iter().map(|g| Grammem::from(*g)))
            .chain(Aspect::ALL.iter().map(|g| Grammem::from(*g)))
            .chain(Mood::ALL.iter().map(|g| Grammem::from(*g)))
            .chain(Voice::ALL.iter().map(|g| Grammem::from(*g)))
            .chain(Animacy::ALL.iter().map(|g| Grammem::from(*g)));

        all.filter(|g| self.contains(*g)).collect()
    }
}

impl FromIterator<Grammem> for MorphTag {
    fn from_iter<T: IntoIterator<Item = Grammem>>(iter: T) -> Self {
        iter.into_iter().fold(Self::EMPTY, |tag, g| tag.with(g))
    }
}

impl fmt::Display for MorphTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return write!(f, "UNKN");
        }

        let grams = self.grammemes();
        if grams.is_empty() {
            return write!(f, "-");
        }

        for (i, g) in grams.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{g}")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown grammeme '{0}'")]
pub struct TagParseErr(String);

impl FromStr for MorphTag {
    type Err = TagParseErr;

    /// Разбор тега из строки вида `NOUN,masc,sing,nomn`.
    /// Так теги записаны в словаре выходов модели.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "UNKN" {
            return Ok(Self::UNKN);
        }
        if s == "-" || s.is_empty() {
            return Ok(Self::EMPTY);
        }

        let mut tag = Self::EMPTY;
        for part in s.split(',') {
            let part = part.trim();
            let gram =
                Grammem::from_abbr(part).ok_or_else(|| TagParseErr(part.to_string()))?;
            tag.set(gram);
        }
        Ok(tag)
    }
}

impl Serialize for MorphTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MorphTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag;
    use test_case::test_case;

    #[test]
    fn test_with_contains() {
        let t = tag![ParteSpeech::Noun, Gender::Masculine, Number::Singular];
        assert!(t.contains(ParteSpeech::Noun));
        assert!(t.contains(Number::Singular));
        assert!(!t.contains(Number::Plural));
        assert_eq!(t.pos(), Some(ParteSpeech::Noun));
    }

    #[test]
    fn test_subsumes() {
        let full = tag![
            ParteSpeech::Noun,
            Gender::Masculine,
            Number::Plural,
            Case::Dativus
        ];
        let target = tag![Number::Plural, Case::Dativus];

        assert!(target.subsumes(&full));
        assert!(!full.subsumes(&target));
        assert!(MorphTag::EMPTY.subsumes(&full));
    }

    #[test_case("NOUN,nomn,masc,sing")]
    #[test_case("VERB,plur,past")]
    #[test_case("UNKN")]
    #[test_case("-")]
    fn test_display_parse_roundtrip(s: &str) {
        let tag: MorphTag = s.parse().unwrap();
        assert_eq!(tag.to_string(), s);
        assert_eq!(tag.to_string().parse::<MorphTag>().unwrap(), tag);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("NOUN,bebe".parse::<MorphTag>().is_err());
    }

    #[test]
    fn test_from_bits_masks() {
        assert!(MorphTag::from_bits(1 << 63).is_none());
        assert_eq!(
            MorphTag::from_bits(MorphTag::UNKN.bits()),
            Some(MorphTag::UNKN)
        );
    }
}
