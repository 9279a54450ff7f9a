use crate::{
    errors::{Bound, DictionaryErr, ParseErr},
    morph::tag::MorphTag,
    unistring::Unistring,
    varint::{read_varint, write_varint},
};
use std::collections::HashMap;

pub type ParadigmId = u32;
pub type FormIdx = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Левая часть преобразования: сколько букв срезать и какой префикс
/// приписать. Срез хранится избыточно и сверяется с длиной префикса
/// при открытии блоба.
pub struct Transform {
    pub left_cut: u16,
    pub left_add: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Одна форма парадигмы: тег, левое преобразование, окончание.
pub struct ParadigmRecord {
    pub tag: MorphTag,
    pub transform: u16,
    pub ending: u16,
}

#[derive(Debug, Default)]
/// Упакованное хранилище парадигм.
///
/// Форма `i` словоформы с основой `stem` собирается как
/// `prefix(i) + stem + ending(i)`; запись с индексом 0 — лемма лексемы.
/// Аффиксы интернированы в таблице строк и адресуются по id.
pub struct ParadigmStore {
    strings: Vec<Unistring>,
    transforms: Vec<Transform>,
    paradigms: Vec<Vec<ParadigmRecord>>,
}

impl ParadigmStore {
    pub fn len(&self) -> usize {
        self.paradigms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paradigms.is_empty()
    }

    pub fn paradigm(&self, id: ParadigmId) -> Result<&[ParadigmRecord], ParseErr> {
        self.paradigms
            .get(id as usize)
            .map(|p| p.as_slice())
            .ok_or(ParseErr::OutOfBound {
                idx: u64::from(id),
                vec: Bound::Paradigms,
            })
    }

    pub fn record(&self, id: ParadigmId, idx: FormIdx) -> Result<&ParadigmRecord, ParseErr> {
        self.paradigm(id)?
            .get(idx as usize)
            .ok_or(ParseErr::OutOfBound {
                idx: u64::from(idx),
                vec: Bound::Forms,
            })
    }

    fn string(&self, id: u16) -> Result<&Unistring, ParseErr> {
        self.strings.get(id as usize).ok_or(ParseErr::OutOfBound {
            idx: u64::from(id),
            vec: Bound::Strings,
        })
    }

    fn prefix(&self, record: &ParadigmRecord) -> Result<&Unistring, ParseErr> {
        let t = self
            .transforms
            .get(record.transform as usize)
            .ok_or(ParseErr::OutOfBound {
                idx: u64::from(record.transform),
                vec: Bound::Transforms,
            })?;
        self.string(t.left_add)
    }

    fn ending(&self, record: &ParadigmRecord) -> Result<&Unistring, ParseErr> {
        self.string(record.ending)
    }

    /// Основа: поверхностная форма без аффиксов записи `idx`.
    fn stem(&self, id: ParadigmId, idx: FormIdx, surface: &Unistring) -> Result<Unistring, ParseErr> {
        let record = self.record(id, idx)?;
        let prefix = self.prefix(record)?;
        let ending = self.ending(record)?;

        if !surface.starts_with(prefix) || surface.len() < prefix.len() + ending.len() {
            return Err(ParseErr::AffixMismatch {
                word: surface.to_string(),
                affix: prefix.to_string(),
            });
        }
        let cut = surface.cut_left(prefix.len());
        if !cut.ends_with(ending) {
            return Err(ParseErr::AffixMismatch {
                word: surface.to_string(),
                affix: ending.to_string(),
            });
        }
        Ok(cut.cut_right(ending.len()))
    }

    /// Восстановление леммы по поверхностной форме и ее месту в парадигме.
    pub fn lemma_of(
        &self,
        id: ParadigmId,
        idx: FormIdx,
        surface: &Unistring,
    ) -> Result<Unistring, ParseErr> {
        let stem = self.stem(id, idx, surface)?;
        let base = self.record(id, 0)?;
        let prefix = self.prefix(base)?;
        let ending = self.ending(base)?;
        Ok(prefix.concat(&stem).concat(ending))
    }

    /// Словоизменение: лемма приводится к форме `idx` своей парадигмы.
    pub fn inflect(
        &self,
        id: ParadigmId,
        idx: FormIdx,
        lemma: &Unistring,
    ) -> Result<Unistring, ParseErr> {
        let stem = self.stem(id, 0, lemma)?;
        let record = self.record(id, idx)?;
        let prefix = self.prefix(record)?;
        let ending = self.ending(record)?;
        Ok(prefix.concat(&stem).concat(ending))
    }

    /// Длина основы поверхностной формы.
    pub fn stem_len(
        &self,
        id: ParadigmId,
        idx: FormIdx,
        surface: &Unistring,
    ) -> Result<u16, ParseErr> {
        Ok(self.stem(id, idx, surface)?.len() as u16)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for records in &self.paradigms {
            body.extend_from_slice(&(records.len() as u16).to_le_bytes());
            for r in records {
                body.extend_from_slice(&r.tag.bits().to_le_bytes());
                body.extend_from_slice(&r.transform.to_le_bytes());
                body.extend_from_slice(&r.ending.to_le_bytes());
            }
        }

        body.extend_from_slice(&(self.transforms.len() as u32).to_le_bytes());
        for t in &self.transforms {
            body.extend_from_slice(&t.left_cut.to_le_bytes());
            body.extend_from_slice(&t.left_add.to_le_bytes());
        }

        // strings_offset считается от начала блоба: 8 байт заголовка + тело.
        let strings_offset = (8 + body.len()) as u32;

        let mut blob = Vec::with_capacity(body.len() + 64);
        blob.extend_from_slice(&(self.paradigms.len() as u32).to_le_bytes());
        blob.extend_from_slice(&strings_offset.to_le_bytes());
        blob.extend_from_slice(&body);

        blob.extend_from_slice(&(self.strings.len() as u32).to_le_bytes());
        for s in &self.strings {
            let bytes = s.to_string().into_bytes();
            write_varint(&mut blob, bytes.len() as u64);
            blob.extend_from_slice(&bytes);
        }

        blob
    }

    pub fn from_bytes(blob: &[u8]) -> Result<Self, DictionaryErr> {
        let read_u32 = |pos: &mut usize| -> Result<u32, DictionaryErr> {
            let bytes = blob
                .get(*pos..*pos + 4)
                .ok_or(DictionaryErr::Truncated(*pos))?;
            *pos += 4;
            Ok(u32::from_le_bytes(bytes.try_into().expect("4 bytes")))
        };
        let read_u16 = |pos: &mut usize| -> Result<u16, DictionaryErr> {
            let bytes = blob
                .get(*pos..*pos + 2)
                .ok_or(DictionaryErr::Truncated(*pos))?;
            *pos += 2;
            Ok(u16::from_le_bytes(bytes.try_into().expect("2 bytes")))
        };
        let read_u64 = |pos: &mut usize| -> Result<u64, DictionaryErr> {
            let bytes = blob
                .get(*pos..*pos + 8)
                .ok_or(DictionaryErr::Truncated(*pos))?;
            *pos += 8;
            Ok(u64::from_le_bytes(bytes.try_into().expect("8 bytes")))
        };

        let mut pos = 0;
        let paradigm_count = read_u32(&mut pos)? as usize;
        let strings_offset = read_u32(&mut pos)? as usize;

        let mut paradigms = Vec::with_capacity(paradigm_count);
        for p in 0..paradigm_count {
            let len = read_u16(&mut pos)? as usize;
            let mut records = Vec::with_capacity(len);
            for _ in 0..len {
                let bits = read_u64(&mut pos)?;
                let tag = MorphTag::from_bits(bits).ok_or(DictionaryErr::ParadigmRef {
                    paradigm: p as u32,
                    what: "tag bits",
                    id: (bits >> 52) as u32,
                })?;
                let transform = read_u16(&mut pos)?;
                let ending = read_u16(&mut pos)?;
                records.push(ParadigmRecord {
                    tag,
                    transform,
                    ending,
                });
            }
            paradigms.push(records);
        }

        let transform_count = read_u32(&mut pos)? as usize;
        let mut transforms = Vec::with_capacity(transform_count);
        for _ in 0..transform_count {
            let left_cut = read_u16(&mut pos)?;
            let left_add = read_u16(&mut pos)?;
            transforms.push(Transform { left_cut, left_add });
        }

        if pos != strings_offset {
            return Err(DictionaryErr::Truncated(pos));
        }

        let string_count = read_u32(&mut pos)? as usize;
        let mut strings = Vec::with_capacity(string_count);
        for _ in 0..string_count {
            let len =
                read_varint(blob, &mut pos).map_err(|_| DictionaryErr::Truncated(pos))? as usize;
            let bytes = blob
                .get(pos..pos + len)
                .ok_or(DictionaryErr::Truncated(pos))?;
            pos += len;
            let s =
                std::str::from_utf8(bytes).map_err(|_| DictionaryErr::Truncated(pos))?;
            strings.push(Unistring::from(s));
        }

        let store = Self {
            strings,
            transforms,
            paradigms,
        };
        store.validate()?;
        Ok(store)
    }

    /// Перекрестные проверки ссылок по id и избыточных длин среза.
    fn validate(&self) -> Result<(), DictionaryErr> {
        for (pid, records) in self.paradigms.iter().enumerate() {
            for r in records {
                let t = self.transforms.get(r.transform as usize).ok_or(
                    DictionaryErr::ParadigmRef {
                        paradigm: pid as u32,
                        what: "transform",
                        id: u32::from(r.transform),
                    },
                )?;
                let prefix =
                    self.strings
                        .get(t.left_add as usize)
                        .ok_or(DictionaryErr::ParadigmRef {
                            paradigm: pid as u32,
                            what: "string",
                            id: u32::from(t.left_add),
                        })?;
                if usize::from(t.left_cut) != prefix.len() {
                    return Err(DictionaryErr::ParadigmRef {
                        paradigm: pid as u32,
                        what: "left_cut",
                        id: u32::from(t.left_cut),
                    });
                }
                if self.strings.get(r.ending as usize).is_none() {
                    return Err(DictionaryErr::ParadigmRef {
                        paradigm: pid as u32,
                        what: "ending",
                        id: u32::from(r.ending),
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
/// Интернирование аффиксов и парадигм на стороне сборщика словаря.
pub struct ParadigmInterner {
    store: ParadigmStore,
    string_ids: HashMap<Unistring, u16>,
    transform_ids: HashMap<Transform, u16>,
    paradigm_ids: HashMap<Vec<ParadigmRecord>, ParadigmId>,
}

impl ParadigmInterner {
    pub fn intern_string(&mut self, s: &Unistring) -> u16 {
        if let Some(&id) = self.string_ids.get(s) {
            return id;
        }
        let id = self.store.strings.len() as u16;
        self.store.strings.push(s.clone());
        self.string_ids.insert(s.clone(), id);
        id
    }

    pub fn intern_transform(&mut self, prefix: &Unistring) -> u16 {
        let t = Transform {
            left_cut: prefix.len() as u16,
            left_add: self.intern_string(prefix),
        };
        if let Some(&id) = self.transform_ids.get(&t) {
            return id;
        }
        let id = self.store.transforms.len() as u16;
        self.store.transforms.push(t);
        self.transform_ids.insert(t, id);
        id
    }

    pub fn intern_record(&mut self, tag: MorphTag, prefix: &Unistring, ending: &Unistring) -> ParadigmRecord {
        ParadigmRecord {
            tag,
            transform: self.intern_transform(prefix),
            ending: self.intern_string(ending),
        }
    }

    /// Одинаковые списки форм сливаются в одну парадигму.
    pub fn intern_paradigm(&mut self, records: Vec<ParadigmRecord>) -> ParadigmId {
        if let Some(&id) = self.paradigm_ids.get(&records) {
            return id;
        }
        let id = self.store.paradigms.len() as ParadigmId;
        self.store.paradigms.push(records.clone());
        self.paradigm_ids.insert(records, id);
        id
    }

    pub fn finish(self) -> ParadigmStore {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morph::grammemes::{Case, Number, ParteSpeech};
    use crate::tag;

    /// СТОЛ: СТОЛ / СТОЛЫ / СТОЛАМ с пустым префиксом.
    fn make_store() -> ParadigmStore {
        let mut interner = ParadigmInterner::default();
        let empty = Unistring::new();

        let records = vec![
            interner.intern_record(
                tag![ParteSpeech::Noun, Case::Nominativus, Number::Singular],
                &empty,
                &Unistring::new(),
            ),
            interner.intern_record(
                tag![ParteSpeech::Noun, Case::Nominativus, Number::Plural],
                &empty,
                &Unistring::from("Ы"),
            ),
            interner.intern_record(
                tag![ParteSpeech::Noun, Case::Dativus, Number::Plural],
                &empty,
                &Unistring::from("АМ"),
            ),
        ];
        let id = interner.intern_paradigm(records);
        assert_eq!(id, 0);
        interner.finish()
    }

    #[test]
    fn test_inflect() {
        let store = make_store();
        let lemma = Unistring::from("СТОЛ");

        assert_eq!(store.inflect(0, 1, &lemma).unwrap().to_string(), "СТОЛЫ");
        assert_eq!(store.inflect(0, 2, &lemma).unwrap().to_string(), "СТОЛАМ");
    }

    #[test]
    fn test_lemma_of() {
        let store = make_store();

        assert_eq!(
            store
                .lemma_of(0, 2, &Unistring::from("СТОЛАМ"))
                .unwrap()
                .to_string(),
            "СТОЛ"
        );
        assert_eq!(store.stem_len(0, 2, &Unistring::from("СТОЛАМ")).unwrap(), 4);
    }

    #[test]
    fn test_affix_mismatch() {
        let store = make_store();
        assert!(matches!(
            store.lemma_of(0, 2, &Unistring::from("КОТУ")),
            Err(ParseErr::AffixMismatch { .. })
        ));
    }

    #[test]
    fn test_blob_roundtrip() {
        let store = make_store();
        let blob = store.to_bytes();
        let opened = ParadigmStore::from_bytes(&blob).unwrap();

        assert_eq!(opened.len(), 1);
        assert_eq!(
            opened
                .inflect(0, 1, &Unistring::from("СТОЛ"))
                .unwrap()
                .to_string(),
            "СТОЛЫ"
        );
        assert_eq!(
            opened.record(0, 2).unwrap().tag,
            tag![ParteSpeech::Noun, Case::Dativus, Number::Plural]
        );
    }

    #[test]
    fn test_corrupt_blob() {
        let store = make_store();
        let mut blob = store.to_bytes();
        blob.truncate(blob.len() - 3);
        assert!(ParadigmStore::from_bytes(&blob).is_err());
    }
}
