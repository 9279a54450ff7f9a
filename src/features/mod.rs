use crate::{
    analyzer::{Dictionary, WordForm},
    tokenizer::TokenType,
    unistring::Char,
};

/// Подсловные эмбеддинги в духе fasttext.
pub mod embeddings;
pub use embeddings::Embeddings;

/// Алфавит признакового кодирования. `Ё` отсутствует: каноникализация
/// сводит ее к `Е` еще на уровне букв.
const ALPHABET: [char; 32] = [
    'А', 'Б', 'В', 'Г', 'Д', 'Е', 'Ж', 'З', 'И', 'Й', 'К', 'Л', 'М', 'Н', 'О', 'П', 'Р', 'С',
    'Т', 'У', 'Ф', 'Х', 'Ц', 'Ч', 'Ш', 'Щ', 'Ъ', 'Ы', 'Ь', 'Э', 'Ю', 'Я',
];

/// Частоты букв русского текста по НКРЯ, `Ё` учтена в `Е`.
const LETTER_FREQ: [(char, f32); 32] = [
    ('О', 0.1097),
    ('Е', 0.0849),
    ('А', 0.0801),
    ('И', 0.0735),
    ('Н', 0.0670),
    ('Т', 0.0626),
    ('С', 0.0547),
    ('Р', 0.0473),
    ('В', 0.0454),
    ('Л', 0.0440),
    ('К', 0.0349),
    ('М', 0.0321),
    ('Д', 0.0298),
    ('П', 0.0281),
    ('У', 0.0262),
    ('Я', 0.0201),
    ('Ы', 0.0190),
    ('Ь', 0.0174),
    ('Г', 0.0170),
    ('З', 0.0165),
    ('Б', 0.0159),
    ('Ч', 0.0144),
    ('Й', 0.0121),
    ('Х', 0.0097),
    ('Ж', 0.0094),
    ('Ш', 0.0073),
    ('Ю', 0.0064),
    ('Ц', 0.0048),
    ('Щ', 0.0036),
    ('Э', 0.0032),
    ('Ф', 0.0026),
    ('Ъ', 0.0004),
];

/// Маркер отсутствующей буквы в контекстном окне.
const EMPTY_MARK: f32 = -1.0;
/// Окно контекста вокруг буквы при морфемной разметке.
const CHAR_WINDOW: usize = 3;
/// Нормировка длины токена.
const MAX_TOKEN_LEN: f32 = 20.0;

/// Количество ручных признаков токена.
pub const HAND_FEATURES: usize = 9;
/// Количество признаков одной буквы.
pub const CHAR_FEATURES: usize = 7 + 2 * CHAR_WINDOW + 5;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Регистровый рисунок токена.
pub enum CapsPattern {
    Lower,
    Title,
    Upper,
    Mixed,
}

impl CapsPattern {
    pub fn of(text: &str) -> Self {
        let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.is_empty() {
            return Self::Lower;
        }

        let upper = letters.iter().filter(|c| c.is_uppercase()).count();
        if upper == 0 {
            Self::Lower
        } else if upper == letters.len() {
            Self::Upper
        } else if upper == 1 && letters[0].is_uppercase() {
            Self::Title
        } else {
            Self::Mixed
        }
    }
}

fn char_id(c: Char) -> f32 {
    match ALPHABET.iter().position(|a| *a == c.to_upper().as_char()) {
        Some(i) => i as f32 / (ALPHABET.len() - 1) as f32,
        None => EMPTY_MARK,
    }
}

fn letter_freq(c: Char) -> f32 {
    let upper = c.to_upper().as_char();
    LETTER_FREQ
        .iter()
        .find(|(l, _)| *l == upper)
        .map(|(_, f)| *f)
        .unwrap_or(0.0)
}

fn log_count(count: u32) -> f32 {
    (1.0 + count as f32).ln() / 16.0
}

#[derive(Debug, Clone, Copy)]
/// Кодировщик признаков поверх неизменяемых ресурсов движка.
pub struct FeatureEncoder<'a> {
    dict: &'a Dictionary,
    embeddings: Option<&'a Embeddings>,
}

impl<'a> FeatureEncoder<'a> {
    pub fn new(dict: &'a Dictionary, embeddings: Option<&'a Embeddings>) -> Self {
        Self { dict, embeddings }
    }

    /// Размерность признаков токена: эмбеддинг + ручные признаки.
    pub fn token_dim(&self) -> usize {
        self.embeddings.map(|e| e.dim()).unwrap_or(0) + HAND_FEATURES
    }

    /// Признаки токена: эмбеддинг поверхностной формы и ручная часть
    /// (длина, регистр, цифры, дефис, класс токена).
    pub fn token_features(&self, form: &WordForm) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.token_dim());

        if let Some(emb) = self.embeddings {
            out.extend(emb.lookup(form.text()));
        }

        let text = form.text();
        out.push((form.normalized().len() as f32 / MAX_TOKEN_LEN).min(1.0));

        let caps = CapsPattern::of(text);
        for pattern in [
            CapsPattern::Lower,
            CapsPattern::Title,
            CapsPattern::Upper,
            CapsPattern::Mixed,
        ] {
            out.push(f32::from(caps == pattern));
        }

        out.push(f32::from(text.chars().any(|c| c.is_numeric())));
        out.push(f32::from(text.contains('-')));
        out.push(f32::from(form.kind() == TokenType::Pnct));
        out.push(f32::from(form.kind() == TokenType::Numb));

        out
    }

    /// Признаки одной буквы слова для морфемной разметки.
    ///
    /// Сама буква, позиция, частотный приор, принадлежность начала слова
    /// префиксному словарю, счетчики словаря для текущего разреза,
    /// контекстное окно и граммемы победившего разбора.
    pub fn char_features(&self, form: &WordForm, i: usize) -> Vec<f32> {
        let word = form.normalized();
        let len = word.len();
        let mut out = Vec::with_capacity(CHAR_FEATURES);

        let c = word.get(i);

        out.push(c.map(char_id).unwrap_or(EMPTY_MARK));
        out.push(c.map(|c| f32::from(c.is_vowel())).unwrap_or(0.0));
        out.push(if len > 1 {
            i as f32 / (len - 1) as f32
        } else {
            0.0
        });
        out.push(c.map(letter_freq).unwrap_or(0.0));

        // Разрез слова на [0..=i] и [i+1..].
        let head = word.slice(0..i + 1);
        let tail = word.slice(i + 1..len);
        out.push(f32::from(self.dict.prefix.contains(&head)));
        out.push(log_count(self.dict.count_prefix(&head)));
        out.push(log_count(self.dict.count_suffix(&tail)));

        for offset in 1..=CHAR_WINDOW {
            let left = i
                .checked_sub(offset)
                .and_then(|j| word.get(j))
                .map(char_id)
                .unwrap_or(EMPTY_MARK);
            out.push(left);
        }
        for offset in 1..=CHAR_WINDOW {
            let right = word.get(i + offset).map(char_id).unwrap_or(EMPTY_MARK);
            out.push(right);
        }

        let best = form.best();
        let category = |idx: Option<usize>, total: usize| -> f32 {
            match idx {
                Some(i) => (i + 1) as f32 / total as f32,
                None => 0.0,
            }
        };
        let tag = best.map(|b| b.tag);
        out.push(category(
            tag.and_then(|t| t.pos()).map(|g| g as usize),
            17,
        ));
        out.push(category(
            tag.and_then(|t| t.case()).map(|g| g as usize),
            11,
        ));
        out.push(category(
            tag.and_then(|t| t.gender()).map(|g| g as usize),
            4,
        ));
        out.push(category(
            tag.and_then(|t| t.number()).map(|g| g as usize),
            4,
        ));
        out.push(category(
            tag.and_then(|t| t.tense()).map(|g| g as usize),
            3,
        ));

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analyzer::dictionary::test::make_dict,
        tokenizer::tokenize,
    };
    use test_case::test_case;

    fn word_form(dict: &Dictionary, text: &str) -> WordForm {
        let token = tokenize(text).remove(0);
        let mut form = WordForm::new(token);
        form.infos = dict.analyze(&form.normal).unwrap();
        form
    }

    #[test_case("стол" => CapsPattern::Lower)]
    #[test_case("Стол" => CapsPattern::Title)]
    #[test_case("СТОЛ" => CapsPattern::Upper)]
    #[test_case("сТоЛ" => CapsPattern::Mixed)]
    #[test_case("123" => CapsPattern::Lower)]
    fn test_caps(text: &str) -> CapsPattern {
        CapsPattern::of(text)
    }

    #[test]
    fn test_token_features_dim() {
        let dict = make_dict();
        let enc = FeatureEncoder::new(&dict, None);
        let form = word_form(&dict, "Столы");

        let feats = enc.token_features(&form);
        assert_eq!(feats.len(), enc.token_dim());
        assert_eq!(feats.len(), HAND_FEATURES);

        // Title-регистр: второй из четырех one-hot признаков.
        assert_eq!(feats[2], 1.0);
    }

    #[test]
    fn test_char_features_dim_and_window() {
        let dict = make_dict();
        let enc = FeatureEncoder::new(&dict, None);
        let form = word_form(&dict, "стол");

        let first = enc.char_features(&form, 0);
        assert_eq!(first.len(), CHAR_FEATURES);
        // Слева от первой буквы — пустые маркеры.
        assert_eq!(first[7], EMPTY_MARK);
        assert_eq!(first[8], EMPTY_MARK);
        assert_eq!(first[9], EMPTY_MARK);

        let last = enc.char_features(&form, 3);
        // Справа от последней буквы — пустые маркеры.
        assert_eq!(last[10], EMPTY_MARK);
    }

    #[test]
    fn test_char_features_vowel_flag() {
        let dict = make_dict();
        let enc = FeatureEncoder::new(&dict, None);
        let form = word_form(&dict, "стол");

        assert_eq!(enc.char_features(&form, 1)[1], 0.0); // Т
        assert_eq!(enc.char_features(&form, 2)[1], 1.0); // О
    }

    #[test]
    fn test_letter_freq_unique_keys() {
        let mut letters: Vec<char> = LETTER_FREQ.iter().map(|(c, _)| *c).collect();
        let before = letters.len();
        letters.sort();
        letters.dedup();
        assert_eq!(letters.len(), before);
    }

    #[test]
    fn test_freq_prior_reasonable() {
        // О — самая частая буква.
        assert!(letter_freq(Char::from('о')) > letter_freq(Char::from('ъ')));
        let total: f32 = LETTER_FREQ.iter().map(|(_, f)| f).sum();
        assert!((total - 1.0).abs() < 0.02);
    }
}
