use crate::{
    analyzer::{dictionary::decode_entries, Dictionary},
    errors::ParseErr,
    morph::tag::MorphTag,
    unistring::Unistring,
};
use itertools::Itertools;
use tracing::debug;

impl Dictionary {
    /// Генерация словоформ леммы с граммемами целевого тега.
    ///
    /// Лемма ищется в основном DAWG; подходят только те ее вхождения,
    /// где поверхность и есть начальная форма лексемы. Внутри парадигмы
    /// берутся все формы, чей тег поглощает целевой. Неизвестная лемма —
    /// пустой результат, не ошибка.
    pub fn synthesize(
        &self,
        lemma: &Unistring,
        target: MorphTag,
    ) -> Result<Vec<Unistring>, ParseErr> {
        let upper = lemma.to_upper_case();

        let Some(payload) = self.dawg.lookup(&upper) else {
            debug!("'{upper}' нет в словаре, синтез невозможен");
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for (pid, idx) in decode_entries(payload)? {
            // Вхождения, где поверхность — косвенная форма чужой лексемы,
            // леммой не являются и к синтезу не относятся.
            if self.paradigms.lemma_of(pid, idx, &upper)? != upper {
                continue;
            }

            for (form_idx, record) in self.paradigms.paradigm(pid)?.iter().enumerate() {
                if target.subsumes(&record.tag) {
                    out.push(self.paradigms.inflect(pid, form_idx as u16, &upper)?);
                }
            }
        }

        Ok(out.into_iter().sorted().dedup().collect())
    }
}
