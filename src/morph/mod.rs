/// Типы хранимых граммем слов в виде `unit enum`-ов для упрощения хранения.
pub mod grammemes;
/// Упакованное хранение словоизменительных парадигм.
pub mod paradigm;
/// Составной морфологический тег-битсет.
pub mod tag;

use serde::{Deserialize, Serialize};

/// Сборка составного тега из граммем:
/// `tag![ParteSpeech::Noun, Case::Dativus]`.
#[macro_export]
macro_rules! tag {
    [$($gram:expr),* $(,)?] => {
        $crate::morph::tag::MorphTag::EMPTY$(.with($gram))*
    };
}

#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
/// Морфемная метка одной буквы слова.
pub enum PhemTag {
    #[serde(rename = "PREF")]
    Prefix,
    #[serde(rename = "ROOT")]
    Root,
    #[serde(rename = "SUFF")]
    Suffix,
    #[serde(rename = "END")]
    Ending,
    /// Разметка не удалась: слово помечается целиком.
    #[default]
    #[serde(rename = "UNKN")]
    Unknown,
}

impl PhemTag {
    pub(crate) const ALL: [PhemTag; 5] = [
        PhemTag::Prefix,
        PhemTag::Root,
        PhemTag::Suffix,
        PhemTag::Ending,
        PhemTag::Unknown,
    ];

    pub fn abbr(&self) -> &'static str {
        match self {
            PhemTag::Prefix => "PREF",
            PhemTag::Root => "ROOT",
            PhemTag::Suffix => "SUFF",
            PhemTag::Ending => "END",
            PhemTag::Unknown => "UNKN",
        }
    }

    pub fn from_abbr(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.abbr() == s)
    }
}

impl std::fmt::Display for PhemTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.abbr())
    }
}
