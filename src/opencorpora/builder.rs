use crate::{
    analyzer::dictionary::{encode_entries, encode_suffix_entries},
    dawg::DawgBuilder,
    dictfile::{write_container, ContainerParts, LemmaTable, SMALLLEMMA},
    errors::{DictionaryErr, XmResult},
    morph::{
        grammemes::ParteSpeech,
        paradigm::{FormIdx, ParadigmId, ParadigmInterner},
    },
    opencorpora::DictionaryOpenCorpora,
    unistring::Unistring,
};
use itertools::Itertools;
use smallstr::SmallString;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// Суффиксная статистика не собирается с основ короче трех букв.
const MIN_STEM: usize = 3;
/// Аффиксы длиннее пяти букв считаются непродуктивными.
const MAX_AFFIX: usize = 5;
/// Парадигмы, встреченные реже, не участвуют в предугадывании.
const MIN_POPULARITY: u32 = 3;

/// Части речи, по которым имеет смысл предугадывать несловарные слова.
/// Служебные слова аффиксами не образуются.
const GUESSABLE_POS: [ParteSpeech; 11] = [
    ParteSpeech::Noun,
    ParteSpeech::AdjectiveFull,
    ParteSpeech::AdjectiveShort,
    ParteSpeech::Comparative,
    ParteSpeech::Verb,
    ParteSpeech::Infinitive,
    ParteSpeech::ParticipleFull,
    ParteSpeech::ParticipleShort,
    ParteSpeech::Gerundive,
    ParteSpeech::Numeral,
    ParteSpeech::Adverb,
];

/// Приставки русского языка по статье Википедии «Приставка», по алфавиту;
/// исконные вместе с продуктивными заимствованными (анти-, контр-, суб- и
/// т.п.). Засеивают префиксный DAWG для признаков морфемной разметки.
pub const KNOWN_PREFIX: [&str; 89] = [
    "а", "анти", "архи", "без", "бес", "в", "вз", "взо", "вне", "внутри", "во", "воз", "возо",
    "вос", "вс", "вы", "де", "дез", "дис", "до", "еже", "за", "из", "изо", "интер", "ис", "к",
    "квази", "кое", "контр", "меж", "между", "на", "над", "надо", "наи", "не", "недо", "ни",
    "низ", "низо", "нис", "о", "об", "обез", "обес", "обо", "около", "от", "ото", "па", "пан",
    "пере", "по", "под", "подо", "поза", "после", "пост", "пра", "пре", "пред", "преди",
    "предо", "при", "про", "противо", "псевдо", "раз", "разо", "рас", "ре", "роз", "рос", "с",
    "сверх", "со", "среди", "су", "суб", "супер", "транс", "у", "ультра", "через", "черес",
    "чрез", "чрес", "экс",
];

/// Компиляция словаря OpenCorpora в бинарный контейнер `XMDICT`.
pub fn build<P: AsRef<Path>>(dict: DictionaryOpenCorpora, out: P) -> XmResult<()> {
    info!(
        "Компиляция словаря OpenCorpora v{} rev{}",
        dict.version, dict.revision
    );
    let parts = compile(dict)?;

    if let Some(parent) = out.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|error| DictionaryErr::Outdir {
            outdir: parent.into(),
            error,
        })?;
    }
    write_container(&out, &parts)?;
    info!("Словарь записан в {}", out.as_ref().display());
    Ok(())
}

pub(crate) fn compile(dict: DictionaryOpenCorpora) -> XmResult<ContainerParts> {
    let mut interner = ParadigmInterner::default();

    // Для fst-подобной вставки слова должны идти в словарном порядке.
    let mut words: BTreeMap<Unistring, BTreeSet<(ParadigmId, FormIdx)>> = BTreeMap::new();
    let mut suffix_stats: BTreeMap<Unistring, BTreeMap<(ParadigmId, FormIdx), u32>> =
        BTreeMap::new();
    let mut lemma_freq: BTreeMap<String, u32> = BTreeMap::new();
    let mut popularity: HashMap<ParadigmId, u32> = HashMap::new();

    for lemma in &dict.lemmata.entries {
        let forms: Vec<(Unistring, _)> = lemma
            .collect_forms()
            .into_iter()
            .map(|(text, tag)| (Unistring::from(text.as_str()).to_upper_case(), tag))
            .collect();

        let stem = longest_common_substring(forms.iter().map(|(w, _)| w));
        if stem.is_empty() {
            debug!("Лемма {} без общей основы пропущена", lemma.id);
            continue;
        }

        // Разложение каждой формы вокруг основы.
        let mut split = Vec::with_capacity(forms.len());
        for (surface, tag) in &forms {
            let Some(at) = find_sub(surface, &stem) else {
                debug!("Форма '{surface}' леммы {} потеряла основу", lemma.id);
                continue;
            };
            let prefix = surface.slice(0..at);
            let ending = surface.slice(at + stem.len()..surface.len());
            if prefix.len() > MAX_AFFIX || ending.len() > MAX_AFFIX {
                continue;
            }
            split.push((surface.clone(), *tag, prefix, ending));
        }
        if split.is_empty() {
            continue;
        }

        let records = split
            .iter()
            .map(|(_, tag, prefix, ending)| interner.intern_record(*tag, prefix, ending))
            .collect_vec();
        let pid = interner.intern_paradigm(records);
        *popularity.entry(pid).or_default() += 1;

        let guessable = lemma
            .lexeme_tag()
            .pos()
            .map(|pos| GUESSABLE_POS.contains(&pos))
            .unwrap_or(false);

        for (idx, (surface, _, _, ending)) in split.iter().enumerate() {
            words
                .entry(surface.clone())
                .or_default()
                .insert((pid, idx as FormIdx));

            if guessable && stem.len() >= MIN_STEM {
                for k in ending.len().max(1)..=MAX_AFFIX.min(surface.len().saturating_sub(1)) {
                    let key = surface.slice(surface.len() - k..surface.len()).reversed();
                    *suffix_stats
                        .entry(key)
                        .or_default()
                        .entry((pid, idx as FormIdx))
                        .or_default() += 1;
                }
            }
        }

        let normal = split[0].0.to_string();
        *lemma_freq.entry(normal).or_default() += split.len() as u32;
    }

    let mut main = DawgBuilder::new();
    for (word, entries) in &words {
        let entries = entries.iter().copied().collect_vec();
        main.insert(word, encode_entries(&entries))?;
    }

    let mut suffix = DawgBuilder::new();
    for (key, stats) in &suffix_stats {
        let entries = stats
            .iter()
            .filter(|((pid, _), _)| popularity.get(pid).copied().unwrap_or(0) >= MIN_POPULARITY)
            .map(|((pid, idx), freq)| (*pid, *idx, *freq))
            .collect_vec();
        if entries.is_empty() {
            continue;
        }
        suffix.insert(key, encode_suffix_entries(&entries))?;
    }

    let mut prefix = DawgBuilder::new();
    for p in KNOWN_PREFIX
        .iter()
        .map(|p| Unistring::from(*p).to_upper_case())
        .sorted()
        .dedup()
    {
        prefix.insert(&p, Vec::new())?;
    }

    let lemmas = LemmaTable::new(
        lemma_freq
            .into_iter()
            .map(|(l, f)| (SmallString::<[u8; SMALLLEMMA]>::from_str(&l), f))
            .collect(),
    );

    let store = interner.finish();
    info!(
        "Словарь собран: {} словоформ, {} парадигм, {} суффиксных ключей",
        words.len(),
        store.len(),
        suffix_stats.len()
    );

    Ok(ContainerParts {
        dawg: main.finish(),
        suffix_dawg: suffix.finish(),
        prefix_dawg: prefix.finish(),
        paradigms: store.to_bytes(),
        lemmas: lemmas.to_bytes(),
    })
}

/// Самая длинная общая подстрока набора словоформ. Окна первой формы
/// перебираются от длинных к коротким.
fn longest_common_substring<'a>(words: impl Iterator<Item = &'a Unistring>) -> Unistring {
    let words = words.collect_vec();
    let Some(first) = words.first() else {
        return Unistring::new();
    };

    for len in (1..=first.len()).rev() {
        for start in 0..=first.len() - len {
            let candidate = first.slice(start..start + len);
            if words.iter().all(|w| find_sub(w, &candidate).is_some()) {
                return candidate;
            }
        }
    }
    Unistring::new()
}

/// Первое вхождение подстроки, в буквах.
fn find_sub(word: &Unistring, sub: &Unistring) -> Option<usize> {
    if sub.is_empty() || sub.len() > word.len() {
        return None;
    }
    (0..=word.len() - sub.len()).find(|&at| word.slice(at..at + sub.len()) == *sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analyzer::{Dictionary, Source},
        morph::grammemes::{Case, Number},
        tag,
    };
    use test_case::test_case;

    fn build_small() -> Dictionary {
        let dir = tempfile::tempdir().unwrap();
        let xml = dir.path().join("dict.xml");
        std::fs::write(&xml, crate::opencorpora::test_xml::SMALL_DICT).unwrap();
        let out = dir.path().join("dict.xmd");

        let dict = DictionaryOpenCorpora::init_from_path(&xml).unwrap();
        build(dict, &out).unwrap();
        Dictionary::open(&out).unwrap()
    }

    #[test_case("стол", "СТОЛ")]
    #[test_case("столы", "СТОЛ")]
    #[test_case("готовил", "ГОТОВИТЬ")]
    #[test_case("ежа", "ЕЖ")]
    fn test_built_dict_analyze(word: &str, lemma: &str) {
        let dict = build_small();
        let infos = dict.analyze(&Unistring::from(word)).unwrap();

        assert!(!infos.is_empty());
        assert_eq!(infos[0].source, Source::Dictionary, "{word}");
        assert!(
            infos.iter().any(|i| i.lemma.to_string() == lemma),
            "{word}: {infos:?}"
        );
    }

    #[test]
    fn test_built_dict_synthesize() {
        let dict = build_small();
        let forms = dict
            .synthesize(
                &Unistring::from("стол"),
                tag![Number::Plural, Case::Dativus],
            )
            .unwrap();

        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].to_string(), "СТОЛАМ");
    }

    #[test]
    /// Три глагола на -ить делают парадигму продуктивной:
    /// несловарный глагол предугадывается по суффиксу.
    fn test_built_dict_guesses_oov() {
        let dict = build_small();
        let infos = dict.analyze(&Unistring::from("гуглить")).unwrap();

        assert!(!infos.is_empty());
        assert!(matches!(infos[0].source, Source::Guess { .. }), "{infos:?}");
        assert_eq!(
            infos[0].tag.pos(),
            Some(ParteSpeech::Infinitive),
            "{infos:?}"
        );
        assert_eq!(infos[0].lemma.to_string(), "ГУГЛИТЬ");
    }

    #[test]
    /// Существительное встречается один раз: его парадигма непродуктивна
    /// и в предугадывание не попадает.
    fn test_unpopular_paradigm_not_guessable() {
        let dict = build_small();
        let infos = dict.analyze(&Unistring::from("кефирам")).unwrap();
        assert_eq!(infos[0].source, Source::Unknown, "{infos:?}");
    }

    #[test]
    fn test_yo_folded_lookup() {
        let dict = build_small();
        // В словаре "ёж": ищется и как "еж".
        assert!(dict.is_known(&Unistring::from("еж")));
        assert!(dict.is_known(&Unistring::from("ёж")));
    }

    #[test]
    fn test_prefix_dawg_seeded() {
        let dict = build_small();
        assert!(dict.prefix.contains(&Unistring::from("ПЕРЕ")));
        assert!(dict.prefix.contains(&Unistring::from("НЕДО")));
        assert!(dict.prefix.contains(&Unistring::from("АНТИ")));
        assert!(!dict.prefix.contains(&Unistring::from("ЖЗК")));
    }

    #[test]
    fn test_lcs() {
        let words = vec![
            Unistring::from("ГОТОВИТЬ"),
            Unistring::from("ГОТОВИТ"),
            Unistring::from("ГОТОВИЛ"),
        ];
        assert_eq!(
            longest_common_substring(words.iter()).to_string(),
            "ГОТОВИ"
        );
    }

    #[test]
    fn test_find_sub() {
        let word = Unistring::from("ПЕРЕПОДГОТОВКА");
        assert_eq!(find_sub(&word, &Unistring::from("ГОТОВ")), Some(7));
        assert_eq!(find_sub(&word, &Unistring::from("ЖЗК")), None);
        assert_eq!(find_sub(&word, &Unistring::new()), None);
    }
}
