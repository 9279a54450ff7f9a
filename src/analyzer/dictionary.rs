use crate::{
    analyzer::{dedup_infos, sort_infos, MorphInfo, Source},
    dawg::Dawg,
    dictfile::{Container, LemmaTable},
    errors::{DictionaryErr, ParseErr, XmResult},
    morph::paradigm::{FormIdx, ParadigmId, ParadigmStore},
    unistring::Unistring,
    varint::{read_varint, write_varint},
};
use allocative::Allocative;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Allocative)]
/// Словарь: три DAWG-а, хранилище парадигм и частоты лемм.
///
/// Собирается один раз офлайн-сборщиком, после открытия неизменяем
/// и свободно разделяется между потоками.
pub struct Dictionary {
    #[allocative(skip)]
    pub(crate) dawg: Dawg,
    #[allocative(skip)]
    pub(crate) suffix: Dawg,
    #[allocative(skip)]
    pub(crate) prefix: Dawg,
    #[allocative(skip)]
    pub(crate) paradigms: ParadigmStore,
    #[allocative(skip)]
    pub(crate) lemmas: LemmaTable,
}

impl Dictionary {
    /// Открытие контейнера `XMDICT`.
    ///
    /// Контейнер отображается в память, DAWG-блобы поднимаются в RAM.
    /// Все структурные проверки, включая перекрестные ссылки нагрузок
    /// на парадигмы, происходят здесь: после успешного открытия разбор
    /// слова не может наткнуться на битую ссылку.
    pub fn open<P: AsRef<Path>>(path: P) -> XmResult<Self> {
        let container = Container::open(&path)?;

        let dawg = Dawg::from_bytes(container.dawg().to_vec())?;
        let suffix = Dawg::from_bytes(container.suffix_dawg().to_vec())?;
        let prefix = Dawg::from_bytes(container.prefix_dawg().to_vec())?;
        let paradigms = ParadigmStore::from_bytes(container.paradigms())?;
        let lemmas = LemmaTable::from_bytes(container.lemmas())?;

        let dictionary = Self {
            dawg,
            suffix,
            prefix,
            paradigms,
            lemmas,
        };
        dictionary.validate()?;
        Ok(dictionary)
    }

    pub(crate) fn from_parts(
        dawg: Dawg,
        suffix: Dawg,
        prefix: Dawg,
        paradigms: ParadigmStore,
        lemmas: LemmaTable,
    ) -> Result<Self, DictionaryErr> {
        let dictionary = Self {
            dawg,
            suffix,
            prefix,
            paradigms,
            lemmas,
        };
        dictionary.validate()?;
        Ok(dictionary)
    }

    /// Инвариант словаря: каждая нагрузка ссылается на существующую
    /// форму существующей парадигмы.
    fn validate(&self) -> Result<(), DictionaryErr> {
        for (key, payload) in self.dawg.iter_with_prefix(&Unistring::new()) {
            let entries = decode_entries(payload)
                .map_err(|_| DictionaryErr::BrokenPayload(key.to_string()))?;
            for (pid, idx) in entries {
                if self.paradigms.record(pid, idx).is_err() {
                    return Err(DictionaryErr::PayloadRef {
                        key: key.to_string(),
                        paradigm: pid,
                        form: idx,
                    });
                }
            }
        }

        for (key, payload) in self.suffix.iter_with_prefix(&Unistring::new()) {
            let entries = decode_suffix_entries(payload)
                .map_err(|_| DictionaryErr::BrokenPayload(key.to_string()))?;
            for (pid, idx, _) in entries {
                if self.paradigms.record(pid, idx).is_err() {
                    return Err(DictionaryErr::PayloadRef {
                        key: key.to_string(),
                        paradigm: pid,
                        form: idx,
                    });
                }
            }
        }

        Ok(())
    }

    /// Проверка слова на наличие в словаре.
    pub fn is_known(&self, word: &Unistring) -> bool {
        self.dawg.contains(&word.to_upper_case())
    }

    /// Количество словарных слов с данным суффиксом.
    pub fn count_suffix(&self, suffix: &Unistring) -> u32 {
        self.suffix.count_prefix(&suffix.reversed())
    }

    /// Количество словарных слов с данным префиксом.
    pub fn count_prefix(&self, prefix: &Unistring) -> u32 {
        self.dawg.count_prefix(prefix)
    }

    pub fn lemma_freq(&self, lemma: &Unistring) -> u32 {
        self.lemmas.freq(&lemma.to_string())
    }

    /// Все кандидаты разбора слова.
    ///
    /// Словарный промах уходит в разбор составных слов через дефис, затем
    /// в суффиксное предугадывание; пустота везде — одиночный UNKN-разбор.
    pub fn analyze(&self, word: &Unistring) -> Result<Vec<MorphInfo>, ParseErr> {
        let upper = word.to_upper_case();

        let mut infos = self.lookup_word(&upper)?;

        if infos.is_empty() && upper.contains('-') {
            debug!("'{upper}' не в словаре, пробуем разбор по дефису");
            infos = self.analyze_compound(&upper)?;
        }

        if infos.is_empty() {
            debug!("'{upper}' не в словаре, пробуем предугадывание");
            infos = self.guess(&upper)?;
        }

        if infos.is_empty() {
            return Ok(vec![MorphInfo::unknown(&upper)]);
        }

        dedup_infos(&mut infos);

        // Словарные кандидаты получают равномерный приор;
        // предугаданные уже оценены по частотам суффиксов.
        if infos.iter().all(|i| i.source == Source::Dictionary) {
            let p = 1.0 / infos.len() as f32;
            for info in infos.iter_mut() {
                info.probability = p;
            }
        }

        sort_infos(&mut infos);
        Ok(infos)
    }

    /// Прямой словарный поиск без предугадывания.
    pub(crate) fn lookup_word(&self, upper: &Unistring) -> Result<Vec<MorphInfo>, ParseErr> {
        let Some(payload) = self.dawg.lookup(upper) else {
            return Ok(Vec::new());
        };

        let mut infos = Vec::new();
        for (pid, idx) in decode_entries(payload)? {
            let lemma = self.paradigms.lemma_of(pid, idx, upper)?;
            let record = self.paradigms.record(pid, idx)?;
            infos.push(MorphInfo {
                lemma,
                tag: record.tag,
                paradigm: Some((pid, idx)),
                stem_len: self.paradigms.stem_len(pid, idx, upper)?,
                probability: 0.0,
                source: Source::Dictionary,
            });
        }
        Ok(infos)
    }

    /// Составные слова через дефис: каждая часть разбирается отдельно,
    /// интерпретации — декартово произведение с фильтром по совместимости
    /// частей речи. Тег и парадигма берутся у последней части.
    fn analyze_compound(&self, upper: &Unistring) -> Result<Vec<MorphInfo>, ParseErr> {
        let parts = upper.split('-');
        if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
            return Ok(Vec::new());
        }

        let mut acc: Option<Vec<MorphInfo>> = None;
        for part in &parts {
            let part_infos = self.lookup_word(part)?;
            if part_infos.is_empty() {
                return Ok(Vec::new());
            }

            acc = Some(match acc {
                None => part_infos,
                Some(left) => {
                    let mut joined = Vec::new();
                    for l in &left {
                        for r in &part_infos {
                            if !pos_compatible(l, r) {
                                continue;
                            }
                            let lemma = l
                                .lemma
                                .concat(&Unistring::from("-"))
                                .concat(&r.lemma);
                            joined.push(MorphInfo {
                                lemma,
                                tag: r.tag,
                                paradigm: r.paradigm,
                                stem_len: r.stem_len,
                                probability: 0.0,
                                source: Source::Dictionary,
                            });
                        }
                    }
                    joined
                }
            });
        }

        Ok(acc.unwrap_or_default())
    }
}

fn pos_compatible(a: &MorphInfo, b: &MorphInfo) -> bool {
    match (a.tag.pos(), b.tag.pos()) {
        (Some(pa), Some(pb)) => pa == pb,
        _ => true,
    }
}

/// Нагрузка основного DAWG: количество и пары (парадигма, форма).
pub(crate) fn encode_entries(entries: &[(ParadigmId, FormIdx)]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_varint(&mut buf, entries.len() as u64);
    for (pid, idx) in entries {
        write_varint(&mut buf, u64::from(*pid));
        write_varint(&mut buf, u64::from(*idx));
    }
    buf
}

pub(crate) fn decode_entries(payload: &[u8]) -> Result<Vec<(ParadigmId, FormIdx)>, ParseErr> {
    let mut pos = 0;
    let n = read_varint(payload, &mut pos).map_err(|_| ParseErr::Payload(pos))? as usize;

    let mut entries = Vec::with_capacity(n);
    for _ in 0..n {
        let pid = read_varint(payload, &mut pos).map_err(|_| ParseErr::Payload(pos))? as ParadigmId;
        let idx = read_varint(payload, &mut pos).map_err(|_| ParseErr::Payload(pos))? as FormIdx;
        entries.push((pid, idx));
    }

    if pos != payload.len() {
        return Err(ParseErr::Payload(pos));
    }
    Ok(entries)
}

/// Нагрузка суффиксного DAWG: тройки (парадигма, форма, частота).
pub(crate) fn encode_suffix_entries(entries: &[(ParadigmId, FormIdx, u32)]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_varint(&mut buf, entries.len() as u64);
    for (pid, idx, freq) in entries {
        write_varint(&mut buf, u64::from(*pid));
        write_varint(&mut buf, u64::from(*idx));
        write_varint(&mut buf, u64::from(*freq));
    }
    buf
}

pub(crate) fn decode_suffix_entries(
    payload: &[u8],
) -> Result<Vec<(ParadigmId, FormIdx, u32)>, ParseErr> {
    let mut pos = 0;
    let n = read_varint(payload, &mut pos).map_err(|_| ParseErr::Payload(pos))? as usize;

    let mut entries = Vec::with_capacity(n);
    for _ in 0..n {
        let pid = read_varint(payload, &mut pos).map_err(|_| ParseErr::Payload(pos))? as ParadigmId;
        let idx = read_varint(payload, &mut pos).map_err(|_| ParseErr::Payload(pos))? as FormIdx;
        let freq = read_varint(payload, &mut pos).map_err(|_| ParseErr::Payload(pos))? as u32;
        entries.push((pid, idx, freq));
    }

    if pos != payload.len() {
        return Err(ParseErr::Payload(pos));
    }
    Ok(entries)
}
