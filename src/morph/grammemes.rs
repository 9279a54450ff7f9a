use serde::{Deserialize, Serialize};

// Каждой граммеме соответствует один бит составного тега.
// Категории лежат в непересекающихся диапазонах бит, см. offsets ниже.

pub(crate) const POS_OFFSET: u8 = 0;
pub(crate) const CASE_OFFSET: u8 = 17;
pub(crate) const GENDER_OFFSET: u8 = 28;
pub(crate) const NUMBER_OFFSET: u8 = 32;
pub(crate) const TENSE_OFFSET: u8 = 36;
pub(crate) const PERSON_OFFSET: u8 = 39;
pub(crate) const ASPECT_OFFSET: u8 = 42;
pub(crate) const MOOD_OFFSET: u8 = 44;
pub(crate) const VOICE_OFFSET: u8 = 46;
pub(crate) const ANIMACY_OFFSET: u8 = 48;
pub(crate) const UNKN_BIT: u8 = 51;

#[rustfmt::skip]
#[derive(Debug, Copy, Clone, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(untagged)]
pub enum Grammem {
    /// Часть речи
    ParteSpeech(ParteSpeech),
    /// Падеж
    Case(Case),
    Gender(Gender),
    /// Число
    Number(Number),
    /// Время
    Tense(Tense),
    /// Категория лица
    Person(Person),
    /// Вид: совершенный, несовершенный
    Aspect(Aspect),
    /// Наклонение: изъявительное, повелительное
    Mood(Mood),
    /// Залог
    Voice(Voice),
    /// Одушевленность
    Animacy(Animacy),
    /// Сток для граммем OpenCorpora, не попадающих в составной тег.
    Other(Other),
}

impl Grammem {
    /// Номер бита в составном теге. `None` для неподдерживаемых граммем.
    pub(crate) fn bit(&self) -> Option<u8> {
        match self {
            Grammem::ParteSpeech(g) => Some(POS_OFFSET + *g as u8),
            Grammem::Case(g) => Some(CASE_OFFSET + *g as u8),
            Grammem::Gender(g) => Some(GENDER_OFFSET + *g as u8),
            Grammem::Number(g) => Some(NUMBER_OFFSET + *g as u8),
            Grammem::Tense(g) => Some(TENSE_OFFSET + *g as u8),
            Grammem::Person(g) => Some(PERSON_OFFSET + *g as u8),
            Grammem::Aspect(g) => Some(ASPECT_OFFSET + *g as u8),
            Grammem::Mood(g) => Some(MOOD_OFFSET + *g as u8),
            Grammem::Voice(g) => Some(VOICE_OFFSET + *g as u8),
            Grammem::Animacy(g) => Some(ANIMACY_OFFSET + *g as u8),
            Grammem::Other(_) => None,
        }
    }

    pub fn abbr(&self) -> &'static str {
        match self {
            Grammem::ParteSpeech(g) => g.abbr(),
            Grammem::Case(g) => g.abbr(),
            Grammem::Gender(g) => g.abbr(),
            Grammem::Number(g) => g.abbr(),
            Grammem::Tense(g) => g.abbr(),
            Grammem::Person(g) => g.abbr(),
            Grammem::Aspect(g) => g.abbr(),
            Grammem::Mood(g) => g.abbr(),
            Grammem::Voice(g) => g.abbr(),
            Grammem::Animacy(g) => g.abbr(),
            Grammem::Other(_) => "",
        }
    }

    /// Обратное к [`Grammem::abbr`]. Аббревиатуры OpenCorpora регистрозависимы.
    pub fn from_abbr(s: &str) -> Option<Self> {
        ParteSpeech::from_abbr(s)
            .map(Grammem::ParteSpeech)
            .or_else(|| Case::from_abbr(s).map(Grammem::Case))
            .or_else(|| Gender::from_abbr(s).map(Grammem::Gender))
            .or_else(|| Number::from_abbr(s).map(Grammem::Number))
            .or_else(|| Tense::from_abbr(s).map(Grammem::Tense))
            .or_else(|| Person::from_abbr(s).map(Grammem::Person))
            .or_else(|| Aspect::from_abbr(s).map(Grammem::Aspect))
            .or_else(|| Mood::from_abbr(s).map(Grammem::Mood))
            .or_else(|| Voice::from_abbr(s).map(Grammem::Voice))
            .or_else(|| Animacy::from_abbr(s).map(Grammem::Animacy))
    }

    pub fn pos(&self) -> Option<ParteSpeech> {
        match self {
            Grammem::ParteSpeech(p) => Some(*p),
            _ => None,
        }
    }
}

impl std::fmt::Display for Grammem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.abbr())
    }
}

/// Таблицы соответствия вариант-аббревиатура задаются одним макросом,
/// чтобы `abbr`/`from_abbr`/`ALL` не расходились между собой.
macro_rules! grammeme_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $abbr:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $abbr)]
                $variant,
            )+
        }

        impl $name {
            pub(crate) const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn abbr(&self) -> &'static str {
                match self {
                    $($name::$variant => $abbr,)+
                }
            }

            pub fn from_abbr(s: &str) -> Option<Self> {
                match s {
                    $($abbr => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl From<$name> for Grammem {
            fn from(g: $name) -> Grammem {
                Grammem::$name(g)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.abbr())
            }
        }
    };
}

grammeme_enum! {
    ParteSpeech {
        Noun => "NOUN",
        /// Имя прилагательное в полной форме
        AdjectiveFull => "ADJF",
        /// Имя прилагательное в краткой форме
        AdjectiveShort => "ADJS",
        /// Компаратив
        Comparative => "COMP",
        /// Глагол, личная форма
        Verb => "VERB",
        /// Глагол, инфинитив
        Infinitive => "INFN",
        /// Причастие полное
        ParticipleFull => "PRTF",
        /// Причастие краткое
        ParticipleShort => "PRTS",
        Gerundive => "GRND",
        Numeral => "NUMR",
        /// Наречие
        Adverb => "ADVB",
        /// Местоимение-существительное
        NounPronoun => "NPRO",
        /// Предикатив
        Predicative => "PRED",
        /// Предлог
        Preposition => "PREP",
        /// Союз
        Conjunction => "CONJ",
        /// Частица
        Particle => "PRCL",
        /// Междометие
        Interjection => "INTJ",
    }
}

grammeme_enum! {
    Case {
        /// Именительный
        Nominativus => "nomn",
        /// Родительный
        Genetivus => "gent",
        /// Дательный
        Dativus => "datv",
        /// Винительный
        Accusativus => "accs",
        /// Творительный
        Ablativus => "ablt",
        /// Предложный
        Locativus => "loct",
        /// Звательный
        Vocativus => "voct",
        Gen2 => "gen2",
        Acc2 => "acc2",
        Loc2 => "loc2",
        /// Неизменяемое
        Fixed => "Fixd",
    }
}

grammeme_enum! {
    Gender {
        Masculine => "masc",
        Feminine => "femn",
        Neutral => "neut",
        /// Общий род (м/ж)
        Common => "ms-f",
    }
}

grammeme_enum! {
    Number {
        Singular => "sing",
        Plural => "plur",
        /// Всегда используется в единственном числе
        SingulariaTantum => "Sgtm",
        /// Всегда используется в множественном числе
        PluraliaTantum => "Pltm",
    }
}

grammeme_enum! {
    Tense {
        Past => "past",
        Present => "pres",
        Future => "futr",
    }
}

grammeme_enum! {
    Person {
        First => "1per",
        Second => "2per",
        Third => "3per",
    }
}

grammeme_enum! {
    Aspect {
        /// Совершенный
        Perfetto => "perf",
        /// Несовершенный
        Imperfetto => "impf",
    }
}

grammeme_enum! {
    Mood {
        Indicativo => "indc",
        Imperativo => "impr",
    }
}

grammeme_enum! {
    Voice {
        Active => "actv",
        Passive => "pssv",
    }
}

grammeme_enum! {
    Animacy {
        Animate => "anim",
        Inanimate => "inan",
        /// Может использоваться как одуш. / неодуш.
        Both => "Inmx",
    }
}

#[rustfmt::skip]
#[derive(Debug, Copy, Clone, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename = "$value")]
/// Граммемы OpenCorpora вне составного тега: переходность, стилистические
/// пометы и прочее. При сборке словаря молча отбрасываются.
pub enum Other {
    /// Переходный
    #[serde(rename = "tran")]
    Transitive,
    /// Непереходный
    #[serde(rename = "intr")]
    Intransitive,
    /// Безличный
    #[serde(rename = "Impe")]
    Impersonal,
    /// Аббревиатура
    #[serde(rename = "Abbr")]
    Abbreviation,
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("NOUN" => Some(Grammem::ParteSpeech(ParteSpeech::Noun)))]
    #[test_case("datv" => Some(Grammem::Case(Case::Dativus)))]
    #[test_case("plur" => Some(Grammem::Number(Number::Plural)))]
    #[test_case("Sgtm" => Some(Grammem::Number(Number::SingulariaTantum)))]
    #[test_case("bebe" => None)]
    fn test_from_abbr(s: &str) -> Option<Grammem> {
        Grammem::from_abbr(s)
    }

    #[test]
    fn test_abbr_roundtrip() {
        for pos in ParteSpeech::ALL {
            assert_eq!(ParteSpeech::from_abbr(pos.abbr()), Some(*pos));
        }
        for case in Case::ALL {
            assert_eq!(Case::from_abbr(case.abbr()), Some(*case));
        }
    }

    #[test]
    /// Диапазоны бит категорий не должны пересекаться.
    fn test_bit_ranges_disjoint() {
        let mut seen = 0u64;
        let all: Vec<Grammem> = ParteSpeech::ALL
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
            .chain(Animacy::ALL.iter().map(|g| Grammem::from(*g)))
            .collect();

        for g in all {
            let bit = g.bit().unwrap();
            assert!(bit < UNKN_BIT, "{g:?}");
            assert_eq!(seen & (1 << bit), 0, "{g:?}");
            seen |= 1 << bit;
        }
    }
}
