//! Troceado recursivo de texto por caracteres con solapamiento.
//!
//! Cada chunk mide como mucho `chunk_size` caracteres y comparte exactamente
//! `overlap` caracteres con el siguiente. El corte se busca primero en un salto
//! de párrafo, luego en un salto de línea, luego en un espacio y, si no hay
//! ninguno, se corta en seco.

use std::ops::Range;

use crate::errors::AppError;

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl TextSplitter {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, AppError> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(AppError::InvalidInput(format!(
                "parámetros de troceado inválidos: tamaño {chunk_size}, solapamiento {overlap}"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Rangos `[start, end)` en caracteres de cada chunk de `text`.
    /// Un texto vacío o sólo con espacios no produce chunks.
    pub fn split_ranges(&self, text: &str) -> Vec<Range<usize>> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let mut ranges = Vec::new();
        let mut start = 0;

        loop {
            if len - start <= self.chunk_size {
                ranges.push(start..len);
                break;
            }
            let end = self.find_cut(&chars, start);
            ranges.push(start..end);
            start = end - self.overlap;
        }

        ranges
    }

    /// Trocea `text` devolviendo cada rango junto a su texto.
    pub fn split(&self, text: &str) -> Vec<(Range<usize>, String)> {
        let chars: Vec<char> = text.chars().collect();
        self.split_ranges(text)
            .into_iter()
            .map(|r| {
                let piece: String = chars[r.clone()].iter().collect();
                (r, piece)
            })
            .collect()
    }

    /// Fin del chunk que empieza en `start`. Siempre en `(start + overlap, start + chunk_size]`
    /// para que el siguiente chunk avance.
    fn find_cut(&self, chars: &[char], start: usize) -> usize {
        let limit = start + self.chunk_size;
        let min_end = start + self.overlap + 1;

        for sep in SEPARATORS {
            let sep: Vec<char> = sep.chars().collect();
            if let Some(end) = last_separator_end(chars, &sep, min_end, limit) {
                return end;
            }
        }
        limit
    }
}

/// Mayor posición `end` en `[min_end, limit]` tal que `chars[end - sep.len()..end] == sep`.
fn last_separator_end(chars: &[char], sep: &[char], min_end: usize, limit: usize) -> Option<usize> {
    let lowest = min_end.max(sep.len());
    (lowest..=limit)
        .rev()
        .find(|&end| chars[end - sep.len()..end] == *sep)
}
