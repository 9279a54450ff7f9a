use crate::{
    errors::{DictionaryErr, XmErr, XmResult},
    varint::{read_varint, write_varint},
};
use memmap::Mmap;
use smallstr::SmallString;
use std::{fs::File, io::Write, path::Path};

/// Количество байт, которое вмещает в себя большую часть лемм,
/// чтобы не аллоцировать под небольшой размер данных место на куче.
pub const SMALLLEMMA: usize = 16;

const MAGIC: &[u8; 12] = b"XMDICT\0\0\0\0\0\0";
const VERSION: u32 = 1;
/// Заголовок: магия + версия + 5 пар (offset, size).
const HEADER_LEN: usize = 16 + 5 * 8;

const SECTION_NAMES: [&str; 5] = ["dawg", "suffix dawg", "prefix dawg", "paradigms", "lemmas"];

#[derive(Debug)]
/// Блобы словаря в порядке секций контейнера.
pub struct ContainerParts {
    pub dawg: Vec<u8>,
    pub suffix_dawg: Vec<u8>,
    pub prefix_dawg: Vec<u8>,
    pub paradigms: Vec<u8>,
    pub lemmas: Vec<u8>,
}

impl ContainerParts {
    fn sections(&self) -> [&[u8]; 5] {
        [
            &self.dawg,
            &self.suffix_dawg,
            &self.prefix_dawg,
            &self.paradigms,
            &self.lemmas,
        ]
    }
}

/// Запись контейнера `XMDICT` на диск одним файлом.
pub fn write_container<P: AsRef<Path>>(path: P, parts: &ContainerParts) -> XmResult<()> {
    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(MAGIC);
    header.extend_from_slice(&VERSION.to_le_bytes());

    let mut offset = HEADER_LEN as u32;
    for section in parts.sections() {
        header.extend_from_slice(&offset.to_le_bytes());
        header.extend_from_slice(&(section.len() as u32).to_le_bytes());
        offset += section.len() as u32;
    }

    let mut file = File::create(&path).map_err(|error| XmErr::File {
        file: path.as_ref().into(),
        error,
    })?;
    file.write_all(&header).map_err(XmErr::IO)?;
    for section in parts.sections() {
        file.write_all(section).map_err(XmErr::IO)?;
    }

    Ok(())
}

#[derive(Debug)]
/// Открытый контейнер словаря: файл отображается в память и читается
/// по секциям без копирования заголовка.
pub struct Container {
    mmap: Mmap,
    sections: [(u32, u32); 5],
}

impl Container {
    pub fn open<P: AsRef<Path>>(path: P) -> XmResult<Self> {
        let file = File::open(&path).map_err(|error| XmErr::File {
            file: path.as_ref().into(),
            error,
        })?;
        // Файл словаря после сборки не меняется.
        let mmap = unsafe { Mmap::map(&file).map_err(XmErr::IO)? };

        if mmap.len() < HEADER_LEN || &mmap[..MAGIC.len()] != MAGIC {
            return Err(DictionaryErr::Magic.into());
        }
        let version = u32::from_le_bytes(mmap[12..16].try_into().expect("4 bytes"));
        if version != VERSION {
            return Err(DictionaryErr::Version(version).into());
        }

        let mut sections = [(0u32, 0u32); 5];
        for (i, section) in sections.iter_mut().enumerate() {
            let base = 16 + i * 8;
            let offset = u32::from_le_bytes(mmap[base..base + 4].try_into().expect("4 bytes"));
            let size = u32::from_le_bytes(mmap[base + 4..base + 8].try_into().expect("4 bytes"));
            if (offset as usize).saturating_add(size as usize) > mmap.len() {
                return Err(DictionaryErr::Section(SECTION_NAMES[i]).into());
            }
            *section = (offset, size);
        }

        Ok(Self { mmap, sections })
    }

    fn section(&self, i: usize) -> &[u8] {
        let (offset, size) = self.sections[i];
        &self.mmap[offset as usize..(offset + size) as usize]
    }

    pub fn dawg(&self) -> &[u8] {
        self.section(0)
    }

    pub fn suffix_dawg(&self) -> &[u8] {
        self.section(1)
    }

    pub fn prefix_dawg(&self) -> &[u8] {
        self.section(2)
    }

    pub fn paradigms(&self) -> &[u8] {
        self.section(3)
    }

    pub fn lemmas(&self) -> &[u8] {
        self.section(4)
    }
}

#[derive(Debug, Default)]
/// Частоты лемм по словарю. Используются как униграммный приор
/// при разрешении ничьих дизамбигуации.
pub struct LemmaTable {
    rows: Vec<(SmallString<[u8; SMALLLEMMA]>, u32)>,
}

impl LemmaTable {
    /// `rows` обязаны быть отсортированы по лемме.
    pub fn new(rows: Vec<(SmallString<[u8; SMALLLEMMA]>, u32)>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn freq(&self, lemma: &str) -> u32 {
        self.rows
            .binary_search_by(|(l, _)| l.as_str().cmp(lemma))
            .map(|i| self.rows[i].1)
            .unwrap_or(0)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut blob = Vec::new();
        blob.extend_from_slice(&(self.rows.len() as u32).to_le_bytes());
        for (lemma, freq) in &self.rows {
            write_varint(&mut blob, lemma.len() as u64);
            blob.extend_from_slice(lemma.as_bytes());
            write_varint(&mut blob, u64::from(*freq));
        }
        blob
    }

    pub fn from_bytes(blob: &[u8]) -> Result<Self, DictionaryErr> {
        let bytes = blob.get(..4).ok_or(DictionaryErr::Truncated(0))?;
        let count = u32::from_le_bytes(bytes.try_into().expect("4 bytes")) as usize;
        let mut pos = 4;

        let mut rows = Vec::with_capacity(count);
        for _ in 0..count {
            let len =
                read_varint(blob, &mut pos).map_err(|_| DictionaryErr::Truncated(pos))? as usize;
            let bytes = blob
                .get(pos..pos + len)
                .ok_or(DictionaryErr::Truncated(pos))?;
            pos += len;
            let lemma =
                std::str::from_utf8(bytes).map_err(|_| DictionaryErr::Truncated(pos))?;
            let freq =
                read_varint(blob, &mut pos).map_err(|_| DictionaryErr::Truncated(pos))? as u32;
            rows.push((SmallString::from_str(lemma), freq));
        }

        Ok(Self { rows })
    }
}
