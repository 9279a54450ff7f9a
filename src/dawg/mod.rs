use crate::{
    errors::DawgErr,
    unistring::{Char, Unistring},
    varint::read_varint,
};
use std::collections::HashMap;

/// Пошаговая минимизация при вставке отсортированных ключей.
pub mod builder;
pub use builder::DawgBuilder;

pub(crate) const MAGIC: &[u8; 7] = b"XMDAWG\0";
pub(crate) const VERSION: u32 = 1;

#[derive(Debug, Clone, Copy)]
struct State {
    /// Смещение списка переходов в блобе.
    edges_off: u32,
    n_edges: u32,
    accept: bool,
    /// Смещение в арене полезной нагрузки. `u32::MAX` — нагрузки нет.
    payload_off: u32,
    /// Количество принимаемых ключей в поддереве. Вычисляется при открытии.
    n_words: u32,
}

const NO_PAYLOAD: u32 = u32::MAX;

#[derive(Debug)]
/// Минимальный детерминированный ациклический граф слов.
///
/// Открывается из сериализованного блоба; сам блоб остается единственным
/// хранилищем переходов и нагрузок, поверх него строится только индекс
/// состояний. Все структурные проверки выполняются здесь же: после
/// успешного открытия запросы не могут выйти за границы блоба.
pub struct Dawg {
    blob: Vec<u8>,
    alphabet: Vec<Char>,
    char_ids: HashMap<Char, u32>,
    states: Vec<State>,
    /// Начало арены нагрузок в блобе.
    arena: usize,
    arena_len: usize,
    root: u32,
}

impl Dawg {
    pub fn from_bytes(blob: Vec<u8>) -> Result<Self, DawgErr> {
        if blob.len() < MAGIC.len() + 4 || &blob[..MAGIC.len()] != MAGIC {
            return Err(DawgErr::Magic);
        }

        let mut pos = MAGIC.len();
        let version = u32::from_le_bytes(
            blob[pos..pos + 4]
                .try_into()
                .map_err(|_| DawgErr::Truncated(pos))?,
        );
        if version != VERSION {
            return Err(DawgErr::Version(version));
        }
        pos += 4;

        let alphabet_count = read_varint(&blob, &mut pos)? as usize;
        let mut alphabet = Vec::with_capacity(alphabet_count);
        let mut char_ids = HashMap::with_capacity(alphabet_count);
        for i in 0..alphabet_count {
            let cp = read_varint(&blob, &mut pos)? as u32;
            let c = char::from_u32(cp).ok_or(DawgErr::Alphabet {
                state: 0,
                char_id: i as u32,
            })?;
            let c = Char::from(c);
            alphabet.push(c);
            char_ids.insert(c, i as u32);
        }

        let state_count = read_varint(&blob, &mut pos)? as usize;
        if state_count == 0 {
            return Err(DawgErr::Truncated(pos));
        }

        let mut states = Vec::with_capacity(state_count);
        for idx in 0..state_count {
            let flags = *blob.get(pos).ok_or(DawgErr::Truncated(pos))?;
            pos += 1;
            let accept = flags & 1 != 0;

            let n_edges = read_varint(&blob, &mut pos)? as u32;
            let edges_off = pos as u32;
            for _ in 0..n_edges {
                let char_id = read_varint(&blob, &mut pos)? as u32;
                if char_id as usize >= alphabet.len() {
                    return Err(DawgErr::Alphabet {
                        state: idx as u32,
                        char_id,
                    });
                }
                let target = read_varint(&blob, &mut pos)? as u32;
                if target as usize >= idx {
                    return Err(DawgErr::Topology {
                        state: idx as u32,
                        target,
                    });
                }
            }

            let payload_off = if accept {
                read_varint(&blob, &mut pos)? as u32
            } else {
                NO_PAYLOAD
            };

            states.push(State {
                edges_off,
                n_edges,
                accept,
                payload_off,
                n_words: 0,
            });
        }

        let arena_len = read_varint(&blob, &mut pos)? as usize;
        let arena = pos;
        if arena + arena_len > blob.len() {
            return Err(DawgErr::Truncated(blob.len()));
        }

        let mut dawg = Self {
            blob,
            alphabet,
            char_ids,
            states,
            arena,
            arena_len,
            root: (state_count - 1) as u32,
        };
        dawg.check_payloads()?;
        dawg.count_words();
        Ok(dawg)
    }

    /// Проверка, что каждая нагрузка целиком лежит в арене.
    fn check_payloads(&self) -> Result<(), DawgErr> {
        for s in &self.states {
            if s.accept && s.payload_off != NO_PAYLOAD {
                let mut pos = self
                    .arena
                    .checked_add(s.payload_off as usize)
                    .ok_or(DawgErr::PayloadBounds(s.payload_off as u64))?;
                if pos >= self.arena + self.arena_len {
                    return Err(DawgErr::PayloadBounds(s.payload_off as u64));
                }
                let len = read_varint(&self.blob, &mut pos)? as usize;
                if pos + len > self.arena + self.arena_len {
                    return Err(DawgErr::PayloadBounds(s.payload_off as u64));
                }
            }
        }
        Ok(())
    }

    /// Подсчет ключей в поддереве каждого состояния одним проходом:
    /// топологический порядок гарантирует, что дети уже посчитаны.
    fn count_words(&mut self) {
        for idx in 0..self.states.len() {
            let mut n = u32::from(self.states[idx].accept);
            let mut iter = self.edge_cursor(idx as u32);
            while let Some((_, target)) = iter.next(&self.blob) {
                n = n.saturating_add(self.states[target as usize].n_words);
            }
            self.states[idx].n_words = n;
        }
    }

    fn edge_cursor(&self, state: u32) -> EdgeCursor {
        let s = &self.states[state as usize];
        EdgeCursor {
            pos: s.edges_off as usize,
            left: s.n_edges,
        }
    }

    fn child(&self, state: u32, c: Char) -> Option<u32> {
        let id = *self.char_ids.get(&c)?;
        let mut iter = self.edge_cursor(state);
        while let Some((char_id, target)) = iter.next(&self.blob) {
            if char_id == id {
                return Some(target);
            }
            // Переходы отсортированы по id буквы.
            if char_id > id {
                return None;
            }
        }
        None
    }

    fn walk(&self, key: &Unistring) -> Option<u32> {
        let mut state = self.root;
        for c in key.chars() {
            state = self.child(state, c)?;
        }
        Some(state)
    }

    fn payload_at(&self, state: u32) -> Option<&[u8]> {
        let s = &self.states[state as usize];
        if !s.accept {
            return None;
        }
        if s.payload_off == NO_PAYLOAD {
            return Some(&[]);
        }
        let mut pos = self.arena + s.payload_off as usize;
        // Границы проверены при открытии.
        let len = read_varint(&self.blob, &mut pos).expect("checked at load") as usize;
        Some(&self.blob[pos..pos + len])
    }

    /// Нагрузка принятого ключа. `None` — ключа в графе нет.
    pub fn lookup(&self, key: &Unistring) -> Option<&[u8]> {
        self.payload_at(self.walk(key)?)
    }

    pub fn contains(&self, key: &Unistring) -> bool {
        self.walk(key)
            .map(|s| self.states[s as usize].accept)
            .unwrap_or(false)
    }

    /// Количество хранимых ключей, начинающихся с `prefix`.
    pub fn count_prefix(&self, prefix: &Unistring) -> u32 {
        match self.walk(prefix) {
            Some(state) => self.states[state as usize].n_words,
            None => 0,
        }
    }

    /// Все ключи с данным префиксом в словарном порядке.
    pub fn iter_with_prefix(&self, prefix: &Unistring) -> DawgIter<'_> {
        match self.walk(prefix) {
            Some(state) => DawgIter {
                dawg: self,
                key: prefix.chars().collect(),
                stack: vec![Frame::new(self, state)],
            },
            None => DawgIter {
                dawg: self,
                key: Vec::new(),
                stack: Vec::new(),
            },
        }
    }

    pub fn n_keys(&self) -> u32 {
        self.states[self.root as usize].n_words
    }
}

struct EdgeCursor {
    pos: usize,
    left: u32,
}

impl EdgeCursor {
    fn next(&mut self, blob: &[u8]) -> Option<(u32, u32)> {
        if self.left == 0 {
            return None;
        }
        self.left -= 1;
        // Блоб провалидирован при открытии.
        let char_id = read_varint(blob, &mut self.pos).expect("checked at load") as u32;
        let target = read_varint(blob, &mut self.pos).expect("checked at load") as u32;
        Some((char_id, target))
    }
}

struct Frame {
    state: u32,
    edges: Vec<(Char, u32)>,
    cursor: usize,
    emitted: bool,
}

impl Frame {
    fn new(dawg: &Dawg, state: u32) -> Self {
        let mut edges = Vec::with_capacity(dawg.states[state as usize].n_edges as usize);
        let mut iter = dawg.edge_cursor(state);
        while let Some((char_id, target)) = iter.next(&dawg.blob) {
            edges.push((dawg.alphabet[char_id as usize], target));
        }
        Self {
            state,
            edges,
            cursor: 0,
            emitted: false,
        }
    }
}

/// Обход в глубину: короткие ключи раньше длинных, переходы по алфавиту.
pub struct DawgIter<'a> {
    dawg: &'a Dawg,
    key: Vec<Char>,
    stack: Vec<Frame>,
}

impl<'a> Iterator for DawgIter<'a> {
    type Item = (Unistring, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;

            if !top.emitted {
                top.emitted = true;
                if self.dawg.states[top.state as usize].accept {
                    let key: Unistring = self.key.iter().copied().collect();
                    let payload = self.dawg.payload_at(top.state).expect("accepting state");
                    return Some((key, payload));
                }
            }

            if top.cursor < top.edges.len() {
                let (c, target) = top.edges[top.cursor];
                top.cursor += 1;
                self.key.push(c);
                let frame = Frame::new(self.dawg, target);
                self.stack.push(frame);
            } else {
                self.stack.pop();
                if !self.stack.is_empty() {
                    self.key.pop();
                }
            }
        }
    }
}
