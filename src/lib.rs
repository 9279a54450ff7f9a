/// Разбор слова: словарь, предугадывание, синтез.
pub mod analyzer;
/// Минимальный ациклический граф слов с нагрузками.
pub mod dawg;
/// Контейнер словаря `XMDICT` и таблица частот лемм.
pub mod dictfile;
pub mod errors;
/// Кодирование признаков для нейронных классификаторов.
pub mod features;
/// Грамматические структуры русского языка, используемые анализатором.
pub mod morph;
/// Нейронная часть: дизамбигуатор и морфемный разметчик.
pub mod nn;
/// Словарь Opencorpora и офлайн-сборка бинарного словаря.
pub mod opencorpora;
/// Разбивка текста на токены.
pub mod tokenizer;
/// Буквенный слой: каноничные буквы и строки из них.
pub mod unistring;

pub(crate) mod varint;

use crate::{
    analyzer::{Dictionary, MorphInfo, SentenceResult, WordForm},
    errors::{XmErr, XmResult},
    features::{Embeddings, FeatureEncoder, HAND_FEATURES},
    morph::{tag::MorphTag, PhemTag},
    nn::{disambiguator::choose_by_prior, Disambiguator, Model, Segmenter},
    tokenizer::{tokenize, Script, Token, TokenType},
    unistring::Unistring,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Имена файлов ресурсов внутри каталога данных.
pub const DICT_FILE: &str = "dict.xmd";
pub const EMBEDDINGS_FILE: &str = "embeddings.xmv";
pub const DISAMB_WEIGHTS_FILE: &str = "disamb.safetensors";
pub const DISAMB_VOCAB_FILE: &str = "disamb.vocab.json";
pub const SEGMENT_WEIGHTS_FILE: &str = "segment.safetensors";
pub const SEGMENT_VOCAB_FILE: &str = "segment.vocab.json";

/// Переменная окружения, перекрывающая каталог данных.
pub const DATA_DIR_ENV: &str = "XMORPHY_DATA_DIR";

#[rustfmt::skip]
#[derive(Debug, Clone, Default, clap::ValueEnum, Serialize, Deserialize)]
/// Имеющиеся словарные языки
pub enum Language {
    #[default]
    Russian,
}

/// Каталог данных: переменная окружения сильнее переданного пути.
pub fn resolve_data_dir(dir: &Path) -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| dir.to_path_buf())
}

#[derive(Debug)]
/// Морфологический движок: словарь и нейронные модели, загруженные один
/// раз и неизменяемые дальше. Ссылку на движок можно свободно раздавать
/// потокам; все данные вызова живут только внутри вызова.
pub struct Engine {
    dictionary: Dictionary,
    embeddings: Option<Embeddings>,
    disambiguator: Option<Disambiguator>,
    segmenter: Option<Segmenter>,
}

impl Engine {
    /// Открытие движка из каталога данных.
    ///
    /// Словарь обязателен. Эмбеддинги и модели подхватываются, если их
    /// файлы лежат рядом; битые файлы — ошибка загрузки, а не молчаливый
    /// пропуск. Без моделей выбор разбора откатывается к приору.
    pub fn open<P: AsRef<Path>>(dir: P) -> XmResult<Self> {
        let dir = resolve_data_dir(dir.as_ref());

        let dictionary = Dictionary::open(dir.join(DICT_FILE))?;

        let embeddings_path = dir.join(EMBEDDINGS_FILE);
        let embeddings = embeddings_path
            .exists()
            .then(|| Embeddings::open(&embeddings_path))
            .transpose()?;

        let token_dim = embeddings.as_ref().map(|e| e.dim()).unwrap_or(0) + HAND_FEATURES;

        let disambiguator = {
            let weights = dir.join(DISAMB_WEIGHTS_FILE);
            let vocab = dir.join(DISAMB_VOCAB_FILE);
            (weights.exists() && vocab.exists())
                .then(|| {
                    let model = Model::<MorphTag>::open(&weights, &vocab)?;
                    Disambiguator::new(model, token_dim)
                })
                .transpose()
                .map_err(XmErr::Model)?
        };

        let segmenter = {
            let weights = dir.join(SEGMENT_WEIGHTS_FILE);
            let vocab = dir.join(SEGMENT_VOCAB_FILE);
            (weights.exists() && vocab.exists())
                .then(|| {
                    let model = Model::<PhemTag>::open(&weights, &vocab)?;
                    Segmenter::new(model)
                })
                .transpose()
                .map_err(XmErr::Model)?
        };

        info!(
            "Engine открыт из {}: дизамбигуатор {}, разметчик {}",
            dir.display(),
            disambiguator.is_some(),
            segmenter.is_some(),
        );

        Ok(Self {
            dictionary,
            embeddings,
            disambiguator,
            segmenter,
        })
    }

    /// Сборка движка из готовых частей.
    pub fn from_parts(
        dictionary: Dictionary,
        embeddings: Option<Embeddings>,
        disambiguator: Option<Disambiguator>,
        segmenter: Option<Segmenter>,
    ) -> Self {
        Self {
            dictionary,
            embeddings,
            disambiguator,
            segmenter,
        }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    fn encoder(&self) -> FeatureEncoder<'_> {
        FeatureEncoder::new(&self.dictionary, self.embeddings.as_ref())
    }

    /// Полный конвейер: токенизация, словарный разбор, дизамбигуация,
    /// морфемная разметка. Порядок токенов в выходе равен входному,
    /// разделители сохраняются.
    pub fn process(&self, text: &str) -> XmResult<Vec<SentenceResult>> {
        let enc = self.encoder();
        let mut results = Vec::new();

        for sentence in split_sentences(tokenize(text)) {
            let mut forms: Vec<WordForm> = sentence.into_iter().map(WordForm::new).collect();

            for form in forms.iter_mut() {
                // Числа и не-кириллица минуют анализатор.
                if form.kind() == TokenType::Word
                    && form.token().script == Some(Script::Cyrillic)
                {
                    form.infos = self.dictionary.analyze(form.normalized())?;
                }
            }

            match &self.disambiguator {
                Some(disamb) => {
                    disamb.disambiguate(&enc, &mut forms, &self.dictionary.lemmas)?
                }
                None => {
                    for form in forms.iter_mut().filter(|f| !f.infos.is_empty()) {
                        choose_by_prior(form, &self.dictionary.lemmas);
                    }
                }
            }

            if let Some(segmenter) = &self.segmenter {
                for form in forms
                    .iter_mut()
                    .filter(|f| f.token().script == Some(Script::Cyrillic))
                {
                    segmenter.segment(&enc, form)?;
                }
            }

            results.push(SentenceResult { words: forms });
        }

        Ok(results)
    }

    /// Все кандидаты разбора одного слова.
    pub fn analyze(&self, word: &str) -> XmResult<Vec<MorphInfo>> {
        Ok(self.dictionary.analyze(&Unistring::from(word))?)
    }

    /// Генерация словоформ леммы по целевому тегу.
    pub fn synthesize(&self, lemma: &str, target: MorphTag) -> XmResult<Vec<Unistring>> {
        Ok(self.dictionary.synthesize(&Unistring::from(lemma), target)?)
    }

    /// Морфемная разметка одного слова. Без загруженного разметчика
    /// слово целиком помечается UNKN.
    pub fn segment(&self, word: &str) -> XmResult<Vec<PhemTag>> {
        let upper = Unistring::from(word).to_upper_case();
        let Some(segmenter) = &self.segmenter else {
            return Ok(vec![PhemTag::Unknown; upper.len()]);
        };

        let Some(token) = tokenize(word)
            .into_iter()
            .find(|t| t.kind == TokenType::Word)
        else {
            return Ok(Vec::new());
        };

        let mut form = WordForm::new(token);
        form.infos = self.dictionary.analyze(form.normalized())?;
        choose_by_prior(&mut form, &self.dictionary.lemmas);

        let enc = self.encoder();
        segmenter.segment(&enc, &mut form)?;
        Ok(form.phems)
    }

    /// Проверка слова на наличие в словаре.
    pub fn is_known(&self, word: &str) -> bool {
        self.dictionary.is_known(&Unistring::from(word))
    }
}

/// Границы предложений: конечная пунктуация или перевод строки.
fn split_sentences(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let mut sentences = Vec::new();
    let mut current: Vec<Token> = Vec::new();

    const TERMINALS: &[char] = &['.', '!', '?', '…'];

    for token in tokens {
        let terminal = match token.kind {
            TokenType::Pnct => token.text.contains(TERMINALS),
            TokenType::Sepr => token.text.contains('\n'),
            _ => false,
        };

        current.push(token);
        if terminal {
            sentences.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analyzer::{dictionary::test::make_dict, Source},
        features::CHAR_FEATURES,
        morph::grammemes::{Case, Number, ParteSpeech},
        nn::test::make_model,
    };
    use crate::tag;
    use itertools::Itertools;

    fn dictionary_engine() -> Engine {
        Engine::from_parts(make_dict(), None, None, None)
    }

    /// Движок с нейронными частями на случайных весах.
    fn full_engine() -> Engine {
        let dict = make_dict();

        let tags: Vec<String> = ["стол", "столы", "столам", "готовит", "гуляет"]
            .iter()
            .flat_map(|w| dict.analyze(&Unistring::from(*w)).unwrap())
            .map(|i| i.tag.to_string())
            .sorted()
            .dedup()
            .collect();
        let tag_refs: Vec<&str> = tags.iter().map(|s| s.as_str()).collect();

        let disamb = Disambiguator::new(
            make_model(3 * HAND_FEATURES, vec![16], &tag_refs),
            HAND_FEATURES,
        )
        .unwrap();
        let segmenter = Segmenter::new(make_model(
            CHAR_FEATURES,
            vec![16],
            &["PREF", "ROOT", "SUFF", "END", "UNKN"],
        ))
        .unwrap();

        Engine::from_parts(dict, None, Some(disamb), Some(segmenter))
    }

    #[test]
    fn test_process_reconstructs_text() {
        let engine = dictionary_engine();
        let text = "Столы стоят.\nГотовит стол, гуляет!";
        let results = engine.process(text).unwrap();

        let rebuilt: String = results
            .iter()
            .flat_map(|s| s.tokens())
            .map(|w| w.text())
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_process_sentence_split() {
        let engine = dictionary_engine();
        let results = engine.process("Стол. Столы\nСтолам").unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_process_known_word_gets_dictionary_parse() {
        let engine = dictionary_engine();
        let results = engine.process("столы").unwrap();
        let word = results[0].words().next().unwrap();

        assert_eq!(word.lemma().unwrap().to_string(), "СТОЛ");
        assert!(word.tag().unwrap().contains(Number::Plural));
        assert_eq!(word.best().unwrap().source, Source::Dictionary);
    }

    #[test]
    fn test_process_numbers_and_latin_bypass() {
        let engine = dictionary_engine();
        let results = engine.process("стол 123 table").unwrap();
        let forms = results[0].tokens();

        let numb = forms.iter().find(|f| f.kind() == TokenType::Numb).unwrap();
        assert!(numb.interpretations().is_empty());

        let latin = forms
            .iter()
            .find(|f| f.token().script == Some(Script::Latin))
            .unwrap();
        assert!(latin.interpretations().is_empty());
    }

    #[test]
    /// Монотонность дизамбигуации на полном конвейере: выбранный тег
    /// из множества кандидатов, разметка легальна или UNKN.
    fn test_full_pipeline_contracts() {
        let engine = full_engine();
        let results = engine.process("Столы готовит, гуляет стол.").unwrap();

        for word in results.iter().flat_map(|s| s.words()) {
            let best = word.best().unwrap();
            assert!(word.interpretations().iter().any(|i| i.tag == best.tag));

            if !word.morphemes().is_empty() {
                assert_eq!(word.morphemes().len(), word.normalized().len());
                assert!(
                    crate::nn::segmenter::is_legal(word.morphemes())
                        || word
                            .morphemes()
                            .iter()
                            .all(|t| *t == PhemTag::Unknown)
                );
            }
        }
    }

    #[test]
    fn test_engine_analyze_and_synthesize() {
        let engine = dictionary_engine();

        let infos = engine.analyze("столы").unwrap();
        assert_eq!(infos[0].lemma.to_string(), "СТОЛ");

        let forms = engine
            .synthesize("стол", tag![ParteSpeech::Noun, Number::Plural, Case::Dativus])
            .unwrap();
        assert_eq!(forms[0].to_string(), "СТОЛАМ");
    }

    #[test]
    fn test_engine_segment_without_model() {
        let engine = dictionary_engine();
        let phems = engine.segment("стол").unwrap();
        assert_eq!(phems, vec![PhemTag::Unknown; 4]);
    }

    #[test]
    fn test_engine_segment_with_model() {
        let engine = full_engine();
        let phems = engine.segment("переподготовка").unwrap();
        assert_eq!(phems.len(), 14);
        assert!(
            crate::nn::segmenter::is_legal(&phems)
                || phems.iter().all(|t| *t == PhemTag::Unknown)
        );
    }

    #[test]
    fn test_unknown_word_single_unkn() {
        let engine = dictionary_engine();
        let results = engine.process("ъъъъ").unwrap();
        let word = results[0].words().next().unwrap();

        assert_eq!(word.interpretations().len(), 1);
        assert!(word.tag().unwrap().is_unknown());
    }

    #[test]
    /// Движок разделяется между потоками без блокировок.
    fn test_engine_shared_across_threads() {
        let engine = std::sync::Arc::new(dictionary_engine());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    let results = engine.process("Столы стоят.").unwrap();
                    let lemma = results[0].words().next().unwrap().lemma().unwrap().to_string();
                    lemma
                })
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap(), "СТОЛ");
        }
    }
}
