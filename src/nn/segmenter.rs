use crate::{
    analyzer::WordForm,
    errors::ModelErr,
    features::{FeatureEncoder, CHAR_FEATURES},
    morph::PhemTag,
    nn::Model,
    tokenizer::TokenType,
};
use tracing::debug;

/// Рабочие метки разметчика. UNKN не предсказывается моделью,
/// а выставляется целиком на слово при провале ремонта.
const STAGES: [PhemTag; 4] = [
    PhemTag::Prefix,
    PhemTag::Root,
    PhemTag::Suffix,
    PhemTag::Ending,
];

#[derive(Debug)]
/// Побуквенный морфемный разметчик.
///
/// Модель оценивает метку каждой буквы; сырой argmax прогоняется через
/// проверку легальности `PREFIX* ROOT+ SUFFIX* ENDING*`. Нарушение
/// ремонтируется витерби-проходом по автомату легальности; если ремонт
/// перекрашивает больше половины букв, слово размечается UNKN целиком.
pub struct Segmenter {
    model: Model<PhemTag>,
    /// Позиция каждой рабочей метки в словаре выходов модели.
    stage_cols: [usize; 4],
}

impl Segmenter {
    pub fn new(model: Model<PhemTag>) -> Result<Self, ModelErr> {
        if model.input_dim() != CHAR_FEATURES {
            return Err(ModelErr::VocabMismatch {
                what: "segmenter input",
                expected: CHAR_FEATURES,
                found: model.input_dim(),
            });
        }

        let mut stage_cols = [0usize; 4];
        for (i, stage) in STAGES.iter().enumerate() {
            stage_cols[i] = model
                .labels()
                .iter()
                .position(|l| l == stage)
                .ok_or(ModelErr::VocabMismatch {
                    what: "segmenter labels",
                    expected: STAGES.len(),
                    found: i,
                })?;
        }

        Ok(Self { model, stage_cols })
    }

    /// Разметка слова на месте: `form.phems` получает по метке на букву.
    pub fn segment(
        &self,
        enc: &FeatureEncoder<'_>,
        form: &mut WordForm,
    ) -> Result<(), ModelErr> {
        form.phems.clear();
        if form.kind() != TokenType::Word || form.normal.is_empty() {
            return Ok(());
        }

        let len = form.normal.len();
        let mut rows: Vec<[f32; 4]> = Vec::with_capacity(len);
        for i in 0..len {
            let scores = self.model.scores(&enc.char_features(form, i))?;
            let mut row = [0.0f32; 4];
            for (s, col) in row.iter_mut().zip(self.stage_cols) {
                *s = scores[col];
            }
            rows.push(row);
        }

        let raw: Vec<PhemTag> = rows
            .iter()
            .map(|row| {
                let mut best = 0;
                for s in 1..4 {
                    if row[s] > row[best] {
                        best = s;
                    }
                }
                STAGES[best]
            })
            .collect();

        if is_legal(&raw) {
            form.phems = raw;
            return Ok(());
        }

        let repaired = viterbi(&rows);
        let moved = raw
            .iter()
            .zip(repaired.iter())
            .filter(|(a, b)| a != b)
            .count();

        if moved * 2 > len {
            debug!("'{}': ремонт разметки перекрасил {moved}/{len} букв", form.text());
            form.phems = vec![PhemTag::Unknown; len];
        } else {
            form.phems = repaired;
        }
        Ok(())
    }
}

/// Легальность последовательности: `PREFIX* ROOT+ SUFFIX* ENDING*`.
pub(crate) fn is_legal(seq: &[PhemTag]) -> bool {
    if seq.is_empty() {
        return false;
    }

    let mut stage = 0usize; // 0=PREF, 1=ROOT, 2=SUFF, 3=END
    let mut seen_root = false;
    for tag in seq {
        let next = match tag {
            PhemTag::Prefix => 0,
            PhemTag::Root => 1,
            PhemTag::Suffix => 2,
            PhemTag::Ending => 3,
            PhemTag::Unknown => return false,
        };
        if next < stage {
            return false;
        }
        stage = next;
        seen_root |= *tag == PhemTag::Root;
    }
    seen_root
}

/// Лучшая легальная последовательность по суммарной оценке.
///
/// Состояния — рабочие метки; переходы разрешают только неубывающую
/// стадию, конечное состояние обязано пройти через корень.
fn viterbi(rows: &[[f32; 4]]) -> Vec<PhemTag> {
    const FORBIDDEN: f32 = f32::NEG_INFINITY;
    // Допустимые предыдущие состояния для каждого текущего.
    const PREV: [&[usize]; 4] = [&[0], &[0, 1], &[1, 2], &[1, 2, 3]];

    let n = rows.len();
    let mut dp = vec![[FORBIDDEN; 4]; n];
    let mut back = vec![[0usize; 4]; n];

    // Стартовать можно с префикса или сразу с корня.
    dp[0][0] = rows[0][0];
    dp[0][1] = rows[0][1];

    for i in 1..n {
        for s in 0..4 {
            for &p in PREV[s] {
                let candidate = dp[i - 1][p];
                if candidate == FORBIDDEN {
                    continue;
                }
                let score = candidate + rows[i][s];
                if score > dp[i][s] {
                    dp[i][s] = score;
                    back[i][s] = p;
                }
            }
        }
    }

    // Закончить можно корнем, суффиксом или окончанием: корень гарантирован
    // структурой переходов.
    let mut best = 1;
    for s in [2, 3] {
        if dp[n - 1][s] > dp[n - 1][best] {
            best = s;
        }
    }

    let mut states = vec![0usize; n];
    states[n - 1] = best;
    for i in (1..n).rev() {
        states[i - 1] = back[i][states[i]];
    }

    states.into_iter().map(|s| STAGES[s]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analyzer::dictionary::test::make_dict,
        nn::test::make_model,
        tokenizer::tokenize,
        unistring::Unistring,
    };
    use test_case::test_case;

    #[test_case(&[PhemTag::Root] => true)]
    #[test_case(&[PhemTag::Prefix, PhemTag::Root, PhemTag::Ending] => true)]
    #[test_case(&[PhemTag::Prefix, PhemTag::Prefix, PhemTag::Root, PhemTag::Suffix, PhemTag::Suffix, PhemTag::Ending] => true)]
    #[test_case(&[PhemTag::Prefix, PhemTag::Ending] => false; "no root")]
    #[test_case(&[PhemTag::Ending, PhemTag::Root] => false; "decreasing stage")]
    #[test_case(&[PhemTag::Root, PhemTag::Suffix, PhemTag::Root] => false; "root after suffix")]
    #[test_case(&[] => false; "empty")]
    #[test_case(&[PhemTag::Unknown] => false; "unknown is illegal")]
    fn test_is_legal(seq: &[PhemTag]) -> bool {
        is_legal(seq)
    }

    #[test]
    fn test_viterbi_always_legal() {
        // Оценки, сырой argmax которых нелегален: все голосуют за префикс.
        let rows = vec![[1.0, 0.1, 0.0, 0.0]; 5];
        let seq = viterbi(&rows);
        assert!(is_legal(&seq));
    }

    #[test]
    fn test_viterbi_respects_scores() {
        let rows = vec![
            [5.0, 0.0, 0.0, 0.0],
            [0.0, 5.0, 0.0, 0.0],
            [0.0, 0.0, 5.0, 0.0],
            [0.0, 0.0, 0.0, 5.0],
        ];
        assert_eq!(
            viterbi(&rows),
            vec![PhemTag::Prefix, PhemTag::Root, PhemTag::Suffix, PhemTag::Ending]
        );
    }

    #[test]
    fn test_viterbi_single_char_is_root() {
        let rows = vec![[9.0, 0.0, 0.0, 0.0]];
        assert_eq!(viterbi(&rows), vec![PhemTag::Root]);
    }

    #[test]
    /// Свойство разметчика: выход либо легален, либо целиком UNKN,
    /// и длина равна длине слова в буквах.
    fn test_segment_output_legal_or_unkn() {
        let dict = make_dict();
        let model = make_model(CHAR_FEATURES, vec![12], &["PREF", "ROOT", "SUFF", "END", "UNKN"]);
        let segmenter = Segmenter::new(model).unwrap();
        let enc = FeatureEncoder::new(&dict, None);

        for text in ["переподготовка", "стол", "гуляет", "я"] {
            let mut form = WordForm::new(tokenize(text).remove(0));
            form.infos = dict.analyze(&form.normal).unwrap();
            segmenter.segment(&enc, &mut form).unwrap();

            let expected_len = Unistring::from(text).len();
            assert_eq!(form.phems.len(), expected_len, "{text}");
            assert!(
                is_legal(&form.phems) || form.phems.iter().all(|t| *t == PhemTag::Unknown),
                "{text}: {:?}",
                form.phems
            );
        }
    }

    #[test]
    fn test_segment_skips_non_words() {
        let dict = make_dict();
        let model = make_model(CHAR_FEATURES, vec![], &["PREF", "ROOT", "SUFF", "END"]);
        let segmenter = Segmenter::new(model).unwrap();
        let enc = FeatureEncoder::new(&dict, None);

        let mut form = WordForm::new(tokenize("123").remove(0));
        segmenter.segment(&enc, &mut form).unwrap();
        assert!(form.phems.is_empty());
    }

    #[test]
    fn test_missing_stage_label_rejected() {
        let model = make_model(CHAR_FEATURES, vec![], &["PREF", "ROOT"]);
        assert!(matches!(
            Segmenter::new(model),
            Err(ModelErr::VocabMismatch {
                what: "segmenter labels",
                ..
            })
        ));
    }
}
