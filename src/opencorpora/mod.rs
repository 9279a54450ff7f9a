/// Структуры для парсинга словаря Opencorpora из xml.
pub(crate) mod dictionary;

/// Компиляция словаря Opencorpora в бинарный контейнер.
pub(crate) mod builder;
pub use builder::build;

use crate::errors::{XmErr, XmResult};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};
use tracing::debug;

use self::dictionary::LemmaBank;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
/// Словарь OpenCorpora. Секция `<links>` не разбирается: каждая лексема
/// компилируется в самостоятельную парадигму.
pub struct DictionaryOpenCorpora {
    #[serde(rename = "@version")]
    pub(crate) version: String,
    #[serde(rename = "@revision")]
    pub(crate) revision: u64,

    pub(crate) lemmata: LemmaBank,
}

impl DictionaryOpenCorpora {
    /// Инициализация словаря по переданному пути.
    ///
    /// Файл читается в строку. Это быстрее, но требует больше памяти в процессе.
    pub fn init_from_path<P: AsRef<Path>>(path: P) -> XmResult<Self> {
        let buf = std::fs::read_to_string(path).map_err(XmErr::IO)?;
        let dict: DictionaryOpenCorpora = quick_xml::de::from_str(&buf).map_err(XmErr::XMLde)?;
        Ok(dict)
    }

    /// Инициализация словаря по переданному пути с чтением из буфера.
    ///
    /// Чтение из буфера несколько медленнее, чем из строки, но занимает
    /// сильно меньше памяти.
    pub fn init_from_path_with_reader<P: AsRef<Path>>(path: P) -> XmResult<Self> {
        let file = File::open(&path).map_err(|error| XmErr::File {
            file: path.as_ref().into(),
            error,
        })?;
        let mut buf = BufReader::new(file);

        debug!("BufReader: {}", buf.capacity());

        let dict: DictionaryOpenCorpora =
            quick_xml::de::from_reader(&mut buf).map_err(XmErr::XMLde)?;
        Ok(dict)
    }
}

#[cfg(test)]
pub(crate) mod test_xml {
    /// Крошечный словарь в формате OpenCorpora. Три глагола на -ить
    /// делят одну парадигму, чтобы она считалась продуктивной.
    pub(crate) const SMALL_DICT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<dictionary version="0.92" revision="402">
<grammemes>
<grammeme parent="">POST</grammeme>
</grammemes>
<restrictions>
</restrictions>
<lemmata>
<lemma id="1" rev="1"><l t="стол"><g v="NOUN"/><g v="inan"/><g v="masc"/></l><f t="стол"><g v="sing"/><g v="nomn"/></f><f t="стола"><g v="sing"/><g v="gent"/></f><f t="столу"><g v="sing"/><g v="datv"/></f><f t="столы"><g v="plur"/><g v="nomn"/></f><f t="столам"><g v="plur"/><g v="datv"/></f></lemma>
<lemma id="2" rev="1"><l t="готовить"><g v="INFN"/><g v="impf"/><g v="tran"/></l><f t="готовить"></f><f t="готовит"><g v="sing"/><g v="3per"/><g v="pres"/><g v="indc"/></f><f t="готовил"><g v="masc"/><g v="sing"/><g v="past"/><g v="indc"/></f></lemma>
<lemma id="3" rev="1"><l t="варить"><g v="INFN"/><g v="impf"/><g v="tran"/></l><f t="варить"></f><f t="варит"><g v="sing"/><g v="3per"/><g v="pres"/><g v="indc"/></f><f t="варил"><g v="masc"/><g v="sing"/><g v="past"/><g v="indc"/></f></lemma>
<lemma id="4" rev="1"><l t="солить"><g v="INFN"/><g v="impf"/><g v="tran"/></l><f t="солить"></f><f t="солит"><g v="sing"/><g v="3per"/><g v="pres"/><g v="indc"/></f><f t="солил"><g v="masc"/><g v="sing"/><g v="past"/><g v="indc"/></f></lemma>
<lemma id="5" rev="1"><l t="ёж"><g v="NOUN"/><g v="anim"/><g v="masc"/></l><f t="ёж"><g v="sing"/><g v="nomn"/></f><f t="ежа"><g v="sing"/><g v="gent"/></f></lemma>
</lemmata>
<links>
<link id="1" from="2" to="9000" type="3"/>
</links>
</dictionary>
"#;

    #[test]
    /// Данный тест обязан срабатывать: это страховка от разлома
    /// парсинга словаря.
    fn test_init_small_dict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.xml");
        std::fs::write(&path, SMALL_DICT).unwrap();

        let dict = super::DictionaryOpenCorpora::init_from_path(&path).unwrap();
        assert_eq!(dict.lemmata.entries.len(), 5);
        assert_eq!(dict.revision, 402);

        let dict = super::DictionaryOpenCorpora::init_from_path_with_reader(&path).unwrap();
        assert_eq!(dict.lemmata.entries.len(), 5);
    }
}
