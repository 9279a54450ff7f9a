use std::path::PathBuf;
use thiserror::Error;

pub type XmResult<T, E = XmErr> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum XmErr {
    #[error("Couldn't open file {file}: {error}")]
    File {
        file: PathBuf,
        error: std::io::Error,
    },

    #[error("IO err -> {0}")]
    IO(#[from] std::io::Error),

    #[error("XML deserialize err -> {0}")]
    XMLde(#[from] quick_xml::DeError),

    #[error("Serde err -> {0}")]
    Serde(#[from] serde_json::error::Error),

    #[error("Dawg err -> {0}")]
    Dawg(#[from] DawgErr),

    #[error("Dictionary err -> {0}")]
    Dictionary(#[from] DictionaryErr),

    #[error("Model err -> {0}")]
    Model(#[from] ModelErr),

    #[error("Parse err -> {0}")]
    Parse(#[from] ParseErr),
}

#[derive(Debug, Error)]
/// Структурные ошибки DAWG: при сборке и при открытии сериализованного графа.
/// Любая из них на этапе открытия означает испорченный словарь.
pub enum DawgErr {
    #[error("DAWG magic mismatch")]
    Magic,

    #[error("Unsupported DAWG version {0}")]
    Version(u32),

    #[error("DAWG blob truncated at byte {0}")]
    Truncated(usize),

    #[error("Varint overflow at byte {0}")]
    Varint(usize),

    #[error("State {state} transition to {target} breaks topological order")]
    Topology { state: u32, target: u32 },

    #[error("State {state} refers to unknown char id {char_id}")]
    Alphabet { state: u32, char_id: u32 },

    #[error("Payload offset {0} out of arena")]
    PayloadBounds(u64),

    #[error("Keys must be inserted in sorted order, got '{0}' after '{1}'")]
    UnsortedKeys(String, String),

    #[error("Duplicate key '{0}'")]
    DuplicateKey(String),
}

#[derive(Debug, Error)]
/// Ошибки сборки и открытия словаря: контейнер, парадигмы, таблица лемм.
pub enum DictionaryErr {
    #[error("Couldn't create outdir {outdir}: {error}")]
    Outdir {
        outdir: PathBuf,
        error: std::io::Error,
    },

    #[error("Dictionary magic mismatch")]
    Magic,

    #[error("Unsupported dictionary version {0}")]
    Version(u32),

    #[error("Section {0} is out of container bounds")]
    Section(&'static str),

    #[error("Paradigm blob truncated at byte {0}")]
    Truncated(usize),

    #[error("Paradigm {paradigm} refers to unknown {what} id {id}")]
    ParadigmRef {
        paradigm: u32,
        what: &'static str,
        id: u32,
    },

    #[error("Payload of '{key}' refers to paradigm {paradigm} form {form} which doesn't exist")]
    PayloadRef {
        key: String,
        paradigm: u32,
        form: u16,
    },

    #[error("Broken payload of '{0}'")]
    BrokenPayload(String),

    #[error("No word form in lemma {0}")]
    NoForms(u64),

    #[error("Error strip stem in {0}")]
    Stem(String),
}

#[derive(Debug, derive_more::Display)]
pub enum Bound {
    #[display(fmt = "paradigms")]
    Paradigms,
    #[display(fmt = "transforms")]
    Transforms,
    #[display(fmt = "strings")]
    Strings,
    #[display(fmt = "alphabet")]
    Alphabet,
    #[display(fmt = "forms")]
    Forms,
}

#[derive(Debug, Error)]
/// Ошибки разбора слова. Возникают только при расхождении данных словаря,
/// в штатном потоке наружу не выходят.
pub enum ParseErr {
    #[error("Index of search {idx} more than {vec} len")]
    OutOfBound { idx: u64, vec: Bound },

    #[error("Word '{word}' doesn't carry affix '{affix}'")]
    AffixMismatch { word: String, affix: String },

    #[error("Broken payload at byte {0}")]
    Payload(usize),

    #[error("Word is empty")]
    EmptyWord,
}

#[derive(Debug, Error)]
/// Ошибки нейронной части: веса, словарь признаков и тегов.
pub enum ModelErr {
    #[error("Model runtime err -> {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Couldn't open model vocab {file}: {error}")]
    VocabFile {
        file: PathBuf,
        error: std::io::Error,
    },

    #[error("Vocab deserialize err -> {0}")]
    VocabDe(#[from] serde_json::error::Error),

    #[error("Model vocab {what}: expected {expected}, found {found}")]
    VocabMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Unparsable model label '{0}'")]
    BadLabel(String),
}
