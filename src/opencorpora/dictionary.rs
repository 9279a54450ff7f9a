//! Схема XML-словаря OpenCorpora.
//!
//! Интересующая сборщика часть дерева:
//!
//! ```text
//! <dictionary version=".." revision="..">
//!   <lemmata>
//!     <lemma id="..">
//!       <l t="начальная форма"><g v="NOUN"/>..</l>
//!       <f t="словоформа"><g v="sing"/>..</f>
//!       ..
//!     </lemma>
//!   </lemmata>
//! </dictionary>
//! ```
//!
//! `<l>` и `<f>` устроены одинаково (поверхность в атрибуте `t`, граммемы
//! пустыми элементами `<g v=".."/>`), различается только роль: `<l>` несет
//! общелексемные граммемы, `<f>` — граммемы конкретной словоформы.

use crate::morph::{grammemes::Grammem, tag::MorphTag};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
/// Содержимое `<lemmata>`: все лексемы словаря подряд.
pub(crate) struct LemmaBank {
    #[serde(rename = "$value")]
    pub(crate) entries: Vec<Lemma>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
/// Одна лексема `<lemma>`.
pub(crate) struct Lemma {
    #[serde(rename = "@id")]
    pub(crate) id: u64,

    /// Начальная форма `<l>`.
    #[serde(rename = "l")]
    pub(crate) headword: WordEntry,

    /// Словоформы `<f>`. У неизменяемых слов их нет вовсе.
    #[serde(rename = "f")]
    pub(crate) inflections: Option<Vec<WordEntry>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
/// Поверхностная форма с граммемами: общее устройство `<l>` и `<f>`.
pub(crate) struct WordEntry {
    #[serde(rename = "@t")]
    pub(crate) surface: String,

    /// Граммемы формы. Пустой элемент дает `None`.
    #[serde(rename = "$value")]
    pub(crate) grams: Option<Vec<GramRef>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
/// Ссылка на граммему `<g v=".."/>` по ее аббревиатуре.
pub(crate) struct GramRef {
    #[serde(rename = "@v")]
    pub(crate) v: Grammem,
}

impl WordEntry {
    /// Составной тег из граммем элемента. Граммемы вне словарных
    /// категорий молча отбрасываются на уровне битсета.
    fn tag(&self) -> MorphTag {
        self.grams.iter().flatten().map(|g| g.v).collect()
    }
}

impl Lemma {
    /// Общелексемные граммемы: часть речи, одушевленность, вид и т.п.
    pub(crate) fn lexeme_tag(&self) -> MorphTag {
        self.headword.tag()
    }

    /// Разворачивание лексемы в список словоформ с полными тегами.
    ///
    /// Теги начальной формы доливаются в каждую словоформу; начальная
    /// форма идет первой. Неизменяемое слово дает список из себя самого.
    pub(crate) fn collect_forms(&self) -> Vec<(String, MorphTag)> {
        let base = self.lexeme_tag();

        let Some(inflections) = self.inflections.as_ref().filter(|v| !v.is_empty()) else {
            return vec![(self.headword.surface.clone(), base)];
        };

        inflections
            .iter()
            .map(|entry| {
                let mut tag = entry.tag();
                for gram in base.grammemes() {
                    tag.set(gram);
                }
                (entry.surface.clone(), tag)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morph::grammemes::{Case, Gender, Number, ParteSpeech};

    fn entry(surface: &str, grams: &[Grammem]) -> WordEntry {
        WordEntry {
            surface: surface.to_string(),
            grams: (!grams.is_empty())
                .then(|| grams.iter().map(|g| GramRef { v: *g }).collect()),
        }
    }

    #[test]
    fn test_uninflected_lemma_yields_headword() {
        let lemma = Lemma {
            id: 1,
            headword: entry("вдруг", &[Grammem::ParteSpeech(ParteSpeech::Adverb)]),
            inflections: None,
        };

        let forms = lemma.collect_forms();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].0, "вдруг");
        assert_eq!(forms[0].1.pos(), Some(ParteSpeech::Adverb));
    }

    #[test]
    fn test_lexeme_tag_merged_into_every_form() {
        let lemma = Lemma {
            id: 2,
            headword: entry(
                "стол",
                &[
                    Grammem::ParteSpeech(ParteSpeech::Noun),
                    Grammem::Gender(Gender::Masculine),
                ],
            ),
            inflections: Some(vec![
                entry(
                    "стол",
                    &[
                        Grammem::Number(Number::Singular),
                        Grammem::Case(Case::Nominativus),
                    ],
                ),
                entry(
                    "столы",
                    &[
                        Grammem::Number(Number::Plural),
                        Grammem::Case(Case::Nominativus),
                    ],
                ),
            ]),
        };

        let forms = lemma.collect_forms();
        assert_eq!(forms.len(), 2);
        for (_, tag) in &forms {
            assert_eq!(tag.pos(), Some(ParteSpeech::Noun));
            assert!(tag.contains(Gender::Masculine));
        }
        assert!(forms[1].1.contains(Number::Plural));
    }

    #[test]
    /// Словоформа без собственных граммем наследует только лексемные.
    fn test_bare_form_keeps_base_tag() {
        let lemma = Lemma {
            id: 3,
            headword: entry("готовить", &[Grammem::ParteSpeech(ParteSpeech::Infinitive)]),
            inflections: Some(vec![entry("готовить", &[])]),
        };

        let forms = lemma.collect_forms();
        assert_eq!(forms[0].1.pos(), Some(ParteSpeech::Infinitive));
    }
}
