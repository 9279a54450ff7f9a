use crate::{
    dawg::{MAGIC, VERSION},
    errors::DawgErr,
    unistring::{Char, Unistring},
    varint::write_varint,
};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FrozenState {
    accept: bool,
    payload: Vec<u8>,
    edges: Vec<(Char, u32)>,
}

#[derive(Debug)]
struct PathNode {
    /// Буква входящего перехода. `None` только у корня.
    ch: Option<Char>,
    accept: bool,
    payload: Vec<u8>,
    edges: Vec<(Char, u32)>,
}

impl PathNode {
    fn root() -> Self {
        Self {
            ch: None,
            accept: false,
            payload: Vec::new(),
            edges: Vec::new(),
        }
    }

    fn fresh(ch: Char) -> Self {
        Self {
            ch: Some(ch),
            accept: false,
            payload: Vec::new(),
            edges: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
/// Сборка минимального DAWG по отсортированному потоку ключей.
///
/// Держится незамороженный путь последнего ключа; как только следующий ключ
/// расходится с ним, хвост пути канонизируется через реестр эквивалентных
/// состояний. Минимальность получается по построению, без отдельного
/// прохода минимизации.
pub struct DawgBuilder {
    frozen: Vec<FrozenState>,
    registry: HashMap<FrozenState, u32>,
    path: Vec<PathNode>,
    last_key: Vec<Char>,
    n_keys: u64,
}

impl DawgBuilder {
    pub fn new() -> Self {
        Self {
            frozen: Vec::new(),
            registry: HashMap::new(),
            path: vec![PathNode::root()],
            last_key: Vec::new(),
            n_keys: 0,
        }
    }

    /// Вставка очередного ключа. Ключи обязаны идти строго по возрастанию.
    pub fn insert(&mut self, key: &Unistring, payload: Vec<u8>) -> Result<(), DawgErr> {
        let chars: Vec<Char> = key.chars().collect();

        if self.n_keys > 0 {
            if chars == self.last_key {
                return Err(DawgErr::DuplicateKey(key.to_string()));
            }
            if chars < self.last_key {
                let last: Unistring = self.last_key.iter().copied().collect();
                return Err(DawgErr::UnsortedKeys(key.to_string(), last.to_string()));
            }
        }

        let common = chars
            .iter()
            .zip(self.last_key.iter())
            .take_while(|(a, b)| a == b)
            .count();

        self.freeze_tail(common);

        for &c in &chars[common..] {
            self.path.push(PathNode::fresh(c));
        }

        let last = self.path.last_mut().expect("path holds at least root");
        last.accept = true;
        last.payload = payload;

        self.last_key = chars;
        self.n_keys += 1;
        Ok(())
    }

    /// Замораживание хвоста пути глубже `depth` букв.
    fn freeze_tail(&mut self, depth: usize) {
        while self.path.len() > depth + 1 {
            let node = self.path.pop().expect("len checked");
            let ch = node.ch.expect("non-root node carries a char");
            let id = self.intern(FrozenState {
                accept: node.accept,
                payload: node.payload,
                edges: node.edges,
            });
            self.path
                .last_mut()
                .expect("parent exists")
                .edges
                .push((ch, id));
        }
    }

    fn intern(&mut self, state: FrozenState) -> u32 {
        if let Some(&id) = self.registry.get(&state) {
            return id;
        }
        let id = self.frozen.len() as u32;
        self.frozen.push(state.clone());
        self.registry.insert(state, id);
        id
    }

    /// Завершение сборки: заморозка остатка пути и сериализация.
    ///
    /// Состояния идут в топологическом порядке (дети раньше родителей),
    /// корень — последним. Алфавит переиндексируется по возрастанию букв,
    /// чтобы порядок переходов совпадал со словарным порядком ключей.
    pub fn finish(mut self) -> Vec<u8> {
        self.freeze_tail(0);
        let root = self.path.pop().expect("root");
        // Корень всегда сериализуется отдельным последним состоянием.
        self.frozen.push(FrozenState {
            accept: root.accept,
            payload: root.payload,
            edges: root.edges,
        });

        // Алфавит по возрастанию.
        let mut alphabet: Vec<Char> = self
            .frozen
            .iter()
            .flat_map(|s| s.edges.iter().map(|(c, _)| *c))
            .collect();
        alphabet.sort();
        alphabet.dedup();
        let char_ids: HashMap<Char, u32> = alphabet
            .iter()
            .enumerate()
            .map(|(i, c)| (*c, i as u32))
            .collect();

        for state in self.frozen.iter_mut() {
            state.edges.sort_by_key(|(c, _)| char_ids[c]);
        }

        // Интернирование нагрузок: одинаковые байты пишутся в арену один раз.
        let mut arena: Vec<u8> = Vec::new();
        let mut payload_offsets: HashMap<&[u8], u64> = HashMap::new();
        let mut state_payload = Vec::with_capacity(self.frozen.len());
        for state in &self.frozen {
            if !state.accept {
                state_payload.push(0);
                continue;
            }
            let off = *payload_offsets
                .entry(state.payload.as_slice())
                .or_insert_with(|| {
                    let off = arena.len() as u64;
                    write_varint(&mut arena, state.payload.len() as u64);
                    arena.extend_from_slice(&state.payload);
                    off
                });
            state_payload.push(off);
        }

        let mut blob = Vec::new();
        blob.extend_from_slice(MAGIC);
        blob.extend_from_slice(&VERSION.to_le_bytes());

        write_varint(&mut blob, alphabet.len() as u64);
        for c in &alphabet {
            write_varint(&mut blob, c.as_char() as u64);
        }

        write_varint(&mut blob, self.frozen.len() as u64);
        for (idx, state) in self.frozen.iter().enumerate() {
            blob.push(u8::from(state.accept));
            write_varint(&mut blob, state.edges.len() as u64);
            for (c, target) in &state.edges {
                write_varint(&mut blob, u64::from(char_ids[c]));
                write_varint(&mut blob, u64::from(*target));
            }
            if state.accept {
                write_varint(&mut blob, state_payload[idx]);
            }
        }

        write_varint(&mut blob, arena.len() as u64);
        blob.extend_from_slice(&arena);

        blob
    }
}
