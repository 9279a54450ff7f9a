use crate::{
    errors::{DictionaryErr, XmErr, XmResult},
    varint::{read_varint, write_varint},
};
use std::{collections::HashMap, fs::File, io::Write, path::Path};

const MAGIC: &[u8; 8] = b"XMVEC\0\0\0";
const VERSION: u32 = 1;

/// Границы n-грамм подслов, как у fasttext.
const MIN_NGRAM: usize = 3;
const MAX_NGRAM: usize = 6;

#[derive(Debug)]
/// Подсловные эмбеддинги в духе fasttext.
///
/// Словарные слова берутся по точной строке; для остальных вектор — среднее
/// по корзинам хэшированных n-грамм `<слово>` с граничными маркерами.
/// Хэш — FNV-1a, как в оригинальном fasttext, чтобы таблицы, выгруженные
/// из его моделей, совпадали покорзинно.
pub struct Embeddings {
    dim: usize,
    buckets: u32,
    vocab: HashMap<String, u32>,
    /// Сначала строки словаря, затем корзины n-грамм.
    vectors: Vec<f32>,
}

fn fnv1a(bytes: &[u8]) -> u32 {
    let mut h: u32 = 2166136261;
    for b in bytes {
        h ^= u32::from(*b);
        h = h.wrapping_mul(16777619);
    }
    h
}

impl Embeddings {
    pub fn open<P: AsRef<Path>>(path: P) -> XmResult<Self> {
        let bytes = std::fs::read(&path).map_err(|error| XmErr::File {
            file: path.as_ref().into(),
            error,
        })?;
        Ok(Self::from_bytes(&bytes)?)
    }

    pub fn from_bytes(blob: &[u8]) -> Result<Self, DictionaryErr> {
        if blob.len() < MAGIC.len() + 16 || &blob[..MAGIC.len()] != MAGIC {
            return Err(DictionaryErr::Magic);
        }
        let mut pos = MAGIC.len();

        let read_u32 = |pos: &mut usize| -> Result<u32, DictionaryErr> {
            let bytes = blob
                .get(*pos..*pos + 4)
                .ok_or(DictionaryErr::Truncated(*pos))?;
            *pos += 4;
            Ok(u32::from_le_bytes(bytes.try_into().expect("4 bytes")))
        };

        let version = read_u32(&mut pos)?;
        if version != VERSION {
            return Err(DictionaryErr::Version(version));
        }
        let dim = read_u32(&mut pos)? as usize;
        let vocab_count = read_u32(&mut pos)? as usize;
        let buckets = read_u32(&mut pos)?;

        let mut vocab = HashMap::with_capacity(vocab_count);
        for row in 0..vocab_count {
            let len =
                read_varint(blob, &mut pos).map_err(|_| DictionaryErr::Truncated(pos))? as usize;
            let bytes = blob
                .get(pos..pos + len)
                .ok_or(DictionaryErr::Truncated(pos))?;
            pos += len;
            let word =
                std::str::from_utf8(bytes).map_err(|_| DictionaryErr::Truncated(pos))?;
            vocab.insert(word.to_string(), row as u32);
        }

        let rows = vocab_count + buckets as usize;
        let mut vectors = Vec::with_capacity(rows * dim);
        for _ in 0..rows * dim {
            let bytes = blob
                .get(pos..pos + 4)
                .ok_or(DictionaryErr::Truncated(pos))?;
            pos += 4;
            vectors.push(f32::from_le_bytes(bytes.try_into().expect("4 bytes")));
        }

        Ok(Self {
            dim,
            buckets,
            vocab,
            vectors,
        })
    }

    /// Сериализация таблицы. `rows` — словарные строки по порядку,
    /// `bucket_rows` — корзины n-грамм.
    pub fn write<P: AsRef<Path>>(
        path: P,
        dim: usize,
        rows: &[(String, Vec<f32>)],
        bucket_rows: &[Vec<f32>],
    ) -> XmResult<()> {
        let mut blob = Vec::new();
        blob.extend_from_slice(MAGIC);
        blob.extend_from_slice(&VERSION.to_le_bytes());
        blob.extend_from_slice(&(dim as u32).to_le_bytes());
        blob.extend_from_slice(&(rows.len() as u32).to_le_bytes());
        blob.extend_from_slice(&(bucket_rows.len() as u32).to_le_bytes());

        for (word, _) in rows {
            write_varint(&mut blob, word.len() as u64);
            blob.extend_from_slice(word.as_bytes());
        }
        for vector in rows.iter().map(|(_, v)| v).chain(bucket_rows.iter()) {
            for x in vector {
                blob.extend_from_slice(&x.to_le_bytes());
            }
        }

        let mut file = File::create(&path).map_err(|error| XmErr::File {
            file: path.as_ref().into(),
            error,
        })?;
        file.write_all(&blob).map_err(XmErr::IO)?;
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn row(&self, row: usize) -> &[f32] {
        &self.vectors[row * self.dim..(row + 1) * self.dim]
    }

    /// Вектор слова: точное попадание в словарь либо среднее n-грамм.
    pub fn lookup(&self, word: &str) -> Vec<f32> {
        let lower = word.to_lowercase();

        if let Some(&row) = self.vocab.get(&lower) {
            return self.row(row as usize).to_vec();
        }

        let mut acc = vec![0.0f32; self.dim];
        if self.buckets == 0 {
            return acc;
        }

        let marked: Vec<char> = std::iter::once('<')
            .chain(lower.chars())
            .chain(std::iter::once('>'))
            .collect();

        let mut n_grams = 0usize;
        for n in MIN_NGRAM..=MAX_NGRAM {
            if marked.len() < n {
                break;
            }
            for start in 0..=marked.len() - n {
                let gram: String = marked[start..start + n].iter().collect();
                let bucket = fnv1a(gram.as_bytes()) % self.buckets;
                let row = self.row(self.vocab.len() + bucket as usize);
                for (a, x) in acc.iter_mut().zip(row) {
                    *a += x;
                }
                n_grams += 1;
            }
        }

        if n_grams > 0 {
            for a in acc.iter_mut() {
                *a /= n_grams as f32;
            }
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_embeddings() -> Embeddings {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vec.xmv");

        let rows = vec![
            ("стол".to_string(), vec![1.0, 0.0]),
            ("мир".to_string(), vec![0.0, 1.0]),
        ];
        let buckets: Vec<Vec<f32>> = (0..16).map(|i| vec![i as f32, 0.5]).collect();
        Embeddings::write(&path, 2, &rows, &buckets).unwrap();

        Embeddings::open(&path).unwrap()
    }

    #[test]
    fn test_exact_lookup() {
        let emb = make_embeddings();
        assert_eq!(emb.lookup("СТОЛ"), vec![1.0, 0.0]);
        assert_eq!(emb.lookup("мир"), vec![0.0, 1.0]);
    }

    #[test]
    fn test_oov_subword_lookup() {
        let emb = make_embeddings();
        let v = emb.lookup("столик");

        assert_eq!(v.len(), 2);
        // Среднее корзин с константной второй координатой.
        assert!((v[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_oov_deterministic() {
        let emb = make_embeddings();
        assert_eq!(emb.lookup("гуглить"), emb.lookup("ГУГЛИТЬ"));
    }

    #[test]
    fn test_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vec.xmv");
        std::fs::write(&path, b"YYYYYYYYYYYYYYYYYYYYYYYY").unwrap();
        assert!(Embeddings::open(&path).is_err());
    }
}
