use crate::{
    analyzer::{sort_infos, WordForm},
    dictfile::LemmaTable,
    errors::ModelErr,
    features::FeatureEncoder,
    morph::tag::MorphTag,
    nn::Model,
    tokenizer::TokenType,
};
use std::collections::HashMap;
use tracing::debug;

/// Контекстное окно дизамбигуатора: сосед слева, токен, сосед справа.
const WINDOW: usize = 3;

#[derive(Debug)]
/// Нейронный выбор одного разбора на токен.
///
/// Модель оценивает все теги обучающей вселенной; оценки пересекаются
/// с кандидатами словарного анализа, победитель — argmax пересечения.
/// Ничьи рвутся частотой леммы, затем каноническим порядком тега и леммой.
pub struct Disambiguator {
    model: Model<MorphTag>,
    index: HashMap<MorphTag, usize>,
}

impl Disambiguator {
    pub fn new(model: Model<MorphTag>, token_dim: usize) -> Result<Self, ModelErr> {
        let expected = WINDOW * token_dim;
        if model.input_dim() != expected {
            return Err(ModelErr::VocabMismatch {
                what: "disambiguator input",
                expected,
                found: model.input_dim(),
            });
        }

        let index = model
            .labels()
            .iter()
            .enumerate()
            .map(|(i, tag)| (*tag, i))
            .collect();
        Ok(Self { model, index })
    }

    /// Дизамбигуация предложения на месте.
    ///
    /// Каждому словесному токену выставляется выбранный разбор и
    /// перевзвешенные вероятности кандидатов. Выбор всегда делается
    /// среди кандидатов анализатора.
    pub fn disambiguate(
        &self,
        enc: &FeatureEncoder<'_>,
        forms: &mut [WordForm],
        lemmas: &LemmaTable,
    ) -> Result<(), ModelErr> {
        let word_ids: Vec<usize> = forms
            .iter()
            .enumerate()
            .filter(|(_, f)| f.kind() == TokenType::Word && !f.infos.is_empty())
            .map(|(i, _)| i)
            .collect();

        let token_feats: Vec<Vec<f32>> = word_ids
            .iter()
            .map(|&i| enc.token_features(&forms[i]))
            .collect();
        let dim = enc.token_dim();

        for (wi, &fi) in word_ids.iter().enumerate() {
            let mut input = Vec::with_capacity(WINDOW * dim);
            match wi.checked_sub(1).and_then(|j| token_feats.get(j)) {
                Some(prev) => input.extend_from_slice(prev),
                None => input.extend(std::iter::repeat(0.0).take(dim)),
            }
            input.extend_from_slice(&token_feats[wi]);
            match token_feats.get(wi + 1) {
                Some(next) => input.extend_from_slice(next),
                None => input.extend(std::iter::repeat(0.0).take(dim)),
            }

            let scores = self.model.scores(&input)?;
            self.choose(&mut forms[fi], &scores, lemmas);
        }

        Ok(())
    }

    /// Выбор разбора по оценкам модели.
    fn choose(&self, form: &mut WordForm, scores: &[f32], lemmas: &LemmaTable) {
        let scored: Vec<(usize, f32)> = form
            .infos
            .iter()
            .enumerate()
            .filter_map(|(i, info)| self.index.get(&info.tag).map(|&t| (i, scores[t])))
            .collect();

        if scored.is_empty() {
            // Пересечение с вселенной тегов модели пусто:
            // откат к приору, взвешенному частотой леммы.
            debug!("'{}' вне вселенной тегов модели", form.text());
            choose_by_prior(form, lemmas);
            return;
        }

        // Вероятности кандидатов — softmax по пересечению.
        let max = scored
            .iter()
            .map(|(_, s)| *s)
            .fold(f32::NEG_INFINITY, f32::max);
        let denom: f32 = scored.iter().map(|(_, s)| (s - max).exp()).sum();
        for info in form.infos.iter_mut() {
            info.probability = 0.0;
        }
        for (i, s) in &scored {
            form.infos[*i].probability = (s - max).exp() / denom;
        }

        let best = scored
            .iter()
            .max_by(|(ia, sa), (ib, sb)| {
                let a = &form.infos[*ia];
                let b = &form.infos[*ib];
                sa.total_cmp(sb)
                    .then_with(|| lemmas.freq(&a.lemma.to_string()).cmp(&lemmas.freq(&b.lemma.to_string())))
                    .then_with(|| b.tag.cmp(&a.tag))
                    .then_with(|| b.lemma.cmp(&a.lemma))
            })
            .map(|(i, _)| *i)
            .expect("scored is non-empty");

        let key = (form.infos[best].lemma.clone(), form.infos[best].tag);
        sort_infos(&mut form.infos);
        form.chosen = form
            .infos
            .iter()
            .position(|i| i.lemma == key.0 && i.tag == key.1);
    }
}

/// Выбор без модели: argmax приора, взвешенного частотой леммы.
/// Тот же путь используется при пустом пересечении с вселенной тегов.
pub(crate) fn choose_by_prior(form: &mut WordForm, lemmas: &LemmaTable) {
    let best = form
        .infos
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            let wa = a.probability * (1.0 + lemmas.freq(&a.lemma.to_string()) as f32);
            let wb = b.probability * (1.0 + lemmas.freq(&b.lemma.to_string()) as f32);
            wa.total_cmp(&wb)
                .then_with(|| b.tag.cmp(&a.tag))
                .then_with(|| b.lemma.cmp(&a.lemma))
        })
        .map(|(i, _)| i);

    form.chosen = best;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analyzer::dictionary::test::make_dict,
        features::HAND_FEATURES,
        nn::test::make_model,
        tokenizer::tokenize,
    };

    fn make_forms(dict: &crate::analyzer::Dictionary, text: &str) -> Vec<WordForm> {
        tokenize(text)
            .into_iter()
            .map(|t| {
                let mut form = WordForm::new(t);
                if form.kind() == TokenType::Word {
                    form.infos = dict.analyze(&form.normal).unwrap();
                }
                form
            })
            .collect()
    }

    /// Вселенная тегов модели: все теги тестового словаря.
    fn dict_tags(dict: &crate::analyzer::Dictionary, words: &[&str]) -> Vec<String> {
        use itertools::Itertools;
        words
            .iter()
            .flat_map(|w| dict.analyze(&crate::unistring::Unistring::from(*w)).unwrap())
            .map(|i| i.tag.to_string())
            .sorted()
            .dedup()
            .collect()
    }

    #[test]
    /// Монотонность: выбранный тег всегда из множества кандидатов.
    fn test_choice_is_candidate() {
        let dict = make_dict();
        let tags = dict_tags(&dict, &["стол", "столы", "столам", "готовит"]);
        let tag_refs: Vec<&str> = tags.iter().map(|s| s.as_str()).collect();

        let model = make_model(WINDOW * HAND_FEATURES, vec![16], &tag_refs);
        let disamb = Disambiguator::new(model, HAND_FEATURES).unwrap();

        let mut forms = make_forms(&dict, "столы готовит стол");
        let enc = FeatureEncoder::new(&dict, None);
        disamb.disambiguate(&enc, &mut forms, &dict.lemmas).unwrap();

        for form in forms.iter().filter(|f| f.kind() == TokenType::Word) {
            let best = form.best().unwrap();
            assert!(form.infos.iter().any(|i| i.tag == best.tag));
            assert!(form.chosen.is_some());
        }
    }

    #[test]
    fn test_probabilities_renormalized() {
        let dict = make_dict();
        let tags = dict_tags(&dict, &["стола"]);
        let tag_refs: Vec<&str> = tags.iter().map(|s| s.as_str()).collect();

        let model = make_model(WINDOW * HAND_FEATURES, vec![], &tag_refs);
        let disamb = Disambiguator::new(model, HAND_FEATURES).unwrap();

        let mut forms = make_forms(&dict, "стола");
        let enc = FeatureEncoder::new(&dict, None);
        disamb.disambiguate(&enc, &mut forms, &dict.lemmas).unwrap();

        let word = &forms[0];
        let total: f32 = word.infos.iter().map(|i| i.probability).sum();
        assert!((total - 1.0).abs() < 1e-4);

        // Порядок детерминированный: по убыванию вероятности.
        for pair in word.infos.windows(2) {
            assert!(pair[0].probability >= pair[1].probability);
        }
    }

    #[test]
    /// Вселенная тегов модели не пересекается с кандидатами:
    /// выбор откатывается к приору, но остается среди кандидатов.
    fn test_empty_intersection_falls_back() {
        let dict = make_dict();
        let model = make_model(WINDOW * HAND_FEATURES, vec![], &["UNKN"]);
        let disamb = Disambiguator::new(model, HAND_FEATURES).unwrap();

        let mut forms = make_forms(&dict, "столы");
        let enc = FeatureEncoder::new(&dict, None);
        disamb.disambiguate(&enc, &mut forms, &dict.lemmas).unwrap();

        let word = &forms[0];
        assert!(word.chosen.is_some());
        let best = word.best().unwrap();
        assert!(word.infos.iter().any(|i| i.tag == best.tag));
    }

    #[test]
    fn test_input_dim_checked() {
        let model = make_model(5, vec![], &["UNKN"]);
        assert!(matches!(
            Disambiguator::new(model, HAND_FEATURES),
            Err(ModelErr::VocabMismatch { .. })
        ));
    }

    #[test]
    fn test_choose_by_prior_prefers_frequent_lemma() {
        let dict = make_dict();
        let mut forms = make_forms(&dict, "стола");
        choose_by_prior(&mut forms[0], &dict.lemmas);
        assert!(forms[0].chosen.is_some());
    }
}
