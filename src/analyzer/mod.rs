use crate::{
    morph::{
        paradigm::{FormIdx, ParadigmId},
        tag::MorphTag,
        PhemTag,
    },
    tokenizer::{Token, TokenType},
    unistring::Unistring,
};
use serde::{Deserialize, Serialize};

/// Словарь: DAWG-и, парадигмы, частоты лемм.
pub(crate) mod dictionary;
pub use dictionary::Dictionary;

/// Предугадывание несловарных слов по суффиксному словарю.
pub(crate) mod guesser;
/// Генерация словоформы по лемме и целевому тегу.
pub(crate) mod synthesis;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
/// Откуда пришел разбор: из словаря, из предугадывания по суффиксу
/// или слово осталось нераспознанным.
pub enum Source {
    Dictionary,
    Guess {
        /// Длина суффикса, по которому угадано слово.
        suffix_len: u8,
    },
    Unknown,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Dictionary => write!(f, "Dictionary"),
            Source::Guess { suffix_len } => write!(f, "Guess({suffix_len})"),
            Source::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Один кандидат морфологического разбора поверхностной формы.
pub struct MorphInfo {
    pub lemma: Unistring,
    pub tag: MorphTag,
    /// Ссылка в хранилище парадигм. `None` у нераспознанных слов.
    pub paradigm: Option<(ParadigmId, FormIdx)>,
    pub stem_len: u16,
    /// Вероятность кандидата. До дизамбигуации — приор.
    pub probability: f32,
    pub source: Source,
}

impl MorphInfo {
    pub(crate) fn unknown(word: &Unistring) -> Self {
        Self {
            lemma: word.clone(),
            tag: MorphTag::UNKN,
            paradigm: None,
            stem_len: word.len() as u16,
            probability: 1.0,
            source: Source::Unknown,
        }
    }
}

impl std::fmt::Display for MorphInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}' [{}] p={:.3} {}",
            self.lemma, self.tag, self.probability, self.source
        )
    }
}

/// Детерминированный порядок кандидатов: по убыванию вероятности,
/// ничьи — канонический порядок тегов, затем лемма.
pub(crate) fn sort_infos(infos: &mut [MorphInfo]) {
    infos.sort_by(|a, b| {
        b.probability
            .total_cmp(&a.probability)
            .then_with(|| a.tag.cmp(&b.tag))
            .then_with(|| a.lemma.cmp(&b.lemma))
    });
}

/// Дедупликация по (лемма, тег) с сохранением максимальной вероятности.
pub(crate) fn dedup_infos(infos: &mut Vec<MorphInfo>) {
    infos.sort_by(|a, b| {
        a.lemma
            .cmp(&b.lemma)
            .then_with(|| a.tag.cmp(&b.tag))
            .then_with(|| b.probability.total_cmp(&a.probability))
    });
    infos.dedup_by(|b, a| a.lemma == b.lemma && a.tag == b.tag);
}

#[derive(Debug, Clone)]
/// Токен с морфологическим разбором. Заполняется по стадиям:
/// токенизация -> анализ -> дизамбигуация -> морфемная разметка.
pub struct WordForm {
    pub(crate) token: Token,
    pub(crate) normal: Unistring,
    pub(crate) infos: Vec<MorphInfo>,
    pub(crate) chosen: Option<usize>,
    pub(crate) phems: Vec<PhemTag>,
}

impl WordForm {
    pub(crate) fn new(token: Token) -> Self {
        let normal = token.normalized();
        Self {
            token,
            normal,
            infos: Vec::new(),
            chosen: None,
            phems: Vec::new(),
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn text(&self) -> &str {
        &self.token.text
    }

    pub fn kind(&self) -> TokenType {
        self.token.kind
    }

    pub fn normalized(&self) -> &Unistring {
        &self.normal
    }

    /// Все кандидаты разбора в детерминированном порядке.
    pub fn interpretations(&self) -> &[MorphInfo] {
        &self.infos
    }

    /// Выбранный дизамбигуацией разбор; до нее — самый вероятный.
    pub fn best(&self) -> Option<&MorphInfo> {
        match self.chosen {
            Some(i) => self.infos.get(i),
            None => self.infos.first(),
        }
    }

    pub fn lemma(&self) -> Option<&Unistring> {
        self.best().map(|i| &i.lemma)
    }

    pub fn tag(&self) -> Option<MorphTag> {
        self.best().map(|i| i.tag)
    }

    /// Морфемная разметка: по метке на букву нормализованной формы.
    pub fn morphemes(&self) -> &[PhemTag] {
        &self.phems
    }
}

#[derive(Debug, Clone, Default)]
/// Результат обработки одного предложения.
pub struct SentenceResult {
    pub(crate) words: Vec<WordForm>,
}

impl SentenceResult {
    /// Все токены предложения, включая разделители.
    pub fn tokens(&self) -> &[WordForm] {
        &self.words
    }

    /// Только словесные токены.
    pub fn words(&self) -> impl Iterator<Item = &WordForm> {
        self.words.iter().filter(|w| w.kind() == TokenType::Word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morph::grammemes::{Gender, ParteSpeech};
    use crate::tag;

    fn info(lemma: &str, tag: MorphTag, p: f32) -> MorphInfo {
        MorphInfo {
            lemma: Unistring::from(lemma),
            tag,
            paradigm: Some((0, 0)),
            stem_len: 3,
            probability: p,
            source: Source::Dictionary,
        }
    }

    #[test]
    fn test_sort_order() {
        let mut infos = vec![
            info("Б", tag![ParteSpeech::Noun], 0.2),
            info("А", tag![ParteSpeech::Noun], 0.2),
            info("В", tag![ParteSpeech::Verb], 0.7),
        ];
        sort_infos(&mut infos);

        assert_eq!(infos[0].lemma.to_string(), "В");
        assert_eq!(infos[1].lemma.to_string(), "А");
        assert_eq!(infos[2].lemma.to_string(), "Б");
    }

    #[test]
    fn test_dedup_keeps_best() {
        let t = tag![ParteSpeech::Noun, Gender::Masculine];
        let mut infos = vec![info("А", t, 0.1), info("А", t, 0.9)];
        dedup_infos(&mut infos);

        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].probability, 0.9);
    }
}
