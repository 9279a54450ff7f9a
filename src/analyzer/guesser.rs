use crate::{
    analyzer::{dictionary::decode_suffix_entries, Dictionary, MorphInfo, Source},
    errors::ParseErr,
    unistring::Unistring,
};
use tracing::debug;

/// Сколько кандидатов возвращает предугадывание.
const TOP_K: usize = 5;
/// Максимальная длина суффикса, по которому угадываем.
const MAX_SUFFIX: usize = 5;

impl Dictionary {
    /// Предугадывание несловарного слова по суффиксному словарю.
    ///
    /// Перевернутое слово ищется от длинных суффиксов к коротким; первый
    /// найденный уровень и используется. Суффикс в одну букву допускается
    /// только когда длиннее ничего не нашлось. Кандидаты оцениваются по
    /// частоте связки суффикс-парадигма, возвращается топ.
    pub(crate) fn guess(&self, upper: &Unistring) -> Result<Vec<MorphInfo>, ParseErr> {
        if upper.len() < 2 {
            return Ok(Vec::new());
        }

        let rev = upper.reversed();
        let longest = MAX_SUFFIX.min(upper.len() - 1);

        let mut found: Vec<(u32, MorphInfo)> = Vec::new();
        for k in (1..=longest).rev() {
            if k == 1 && !found.is_empty() {
                break;
            }

            let key = rev.slice(0..k);
            let Some(payload) = self.suffix.lookup(&key) else {
                continue;
            };

            for (pid, idx, freq) in decode_suffix_entries(payload)? {
                // Аффиксы формы обязаны сойтись с поверхностью:
                // суффиксная статистика может прийти от чужой парадигмы.
                let lemma = match self.paradigms.lemma_of(pid, idx, upper) {
                    Ok(lemma) => lemma,
                    Err(err) => {
                        debug!("предугадывание отбросило ({pid}, {idx}): {err}");
                        continue;
                    }
                };
                let record = self.paradigms.record(pid, idx)?;
                let stem_len = self.paradigms.stem_len(pid, idx, upper)?;

                found.push((
                    freq,
                    MorphInfo {
                        lemma,
                        tag: record.tag,
                        paradigm: Some((pid, idx)),
                        stem_len,
                        probability: 0.0,
                        source: Source::Guess {
                            suffix_len: k as u8,
                        },
                    },
                ));
            }

            if !found.is_empty() {
                break;
            }
        }

        if found.is_empty() {
            return Ok(Vec::new());
        }

        // Частоты превращаются в вероятности, выдача ограничивается топом.
        found.sort_by(|(fa, a), (fb, b)| {
            fb.cmp(fa)
                .then_with(|| a.tag.cmp(&b.tag))
                .then_with(|| a.lemma.cmp(&b.lemma))
        });
        found.truncate(TOP_K);

        let total: u32 = found.iter().map(|(f, _)| *f).sum();
        let infos = found
            .into_iter()
            .map(|(freq, mut info)| {
                info.probability = freq as f32 / total.max(1) as f32;
                info
            })
            .collect();

        Ok(infos)
    }
}
