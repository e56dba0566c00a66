//! Document index.
//!
//! Each document is reduced once to its sorted unique tokens and the
//! matching occurrence counts. Updating the cluster statistics and
//! scoring a document then costs O(unique tokens) instead of O(V).

use crate::error::{GsdmmError, Result};
use rayon::prelude::*;

/// A tokenized document with its derived term frequencies.
///
/// `unique` is sorted ascending and `counts[i]` is the number of times
/// `unique[i]` occurs in the original token sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    unique: Vec<usize>,
    counts: Vec<usize>,
    len: usize,
}

impl Document {
    /// Build a document, checking every token against `vocab_size`.
    ///
    /// The error reports document index 0; [`Corpus::new`] fills in the
    /// real index.
    pub fn new(tokens: &[usize], vocab_size: usize) -> Result<Self> {
        if let Some(position) = tokens.iter().position(|&w| w >= vocab_size) {
            return Err(GsdmmError::TokenOutOfRange {
                document: 0,
                position,
                token: tokens[position] as i64,
                vocab_size,
            });
        }
        Ok(Self::from_valid_tokens(tokens))
    }

    fn from_valid_tokens(tokens: &[usize]) -> Self {
        let mut sorted = tokens.to_vec();
        sorted.sort_unstable();

        let mut unique: Vec<usize> = Vec::with_capacity(sorted.len());
        let mut counts: Vec<usize> = Vec::with_capacity(sorted.len());

        for w in sorted {
            match unique.last() {
                Some(&last) if last == w => {
                    if let Some(c) = counts.last_mut() {
                        *c += 1;
                    }
                }
                _ => {
                    unique.push(w);
                    counts.push(1);
                }
            }
        }

        Document {
            unique,
            counts,
            len: tokens.len(),
        }
    }

    /// Number of tokens, counting repetitions.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the document has no tokens.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sorted, deduplicated token ids.
    pub fn unique_tokens(&self) -> &[usize] {
        &self.unique
    }

    /// `(token, count)` pairs in ascending token order.
    pub fn token_counts(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.unique.iter().copied().zip(self.counts.iter().copied())
    }

    /// Occurrences of `token` in this document (0 if absent).
    pub fn count(&self, token: usize) -> usize {
        match self.unique.binary_search(&token) {
            Ok(i) => self.counts[i],
            Err(_) => 0,
        }
    }
}

/// Validated, preprocessed documents sharing one vocabulary.
#[derive(Debug, Clone)]
pub struct Corpus {
    documents: Vec<Document>,
    vocab_size: usize,
    num_tokens: usize,
}

impl Corpus {
    /// Validate all documents, then derive their term frequencies.
    ///
    /// Validation runs over the whole input before any `Document` is
    /// built. The first out-of-range token, in document order, is
    /// reported.
    pub fn new<D>(documents: &[D], vocab_size: usize) -> Result<Self>
    where
        D: AsRef<[usize]> + Sync,
    {
        for (d, tokens) in documents.iter().enumerate() {
            let tokens = tokens.as_ref();
            if let Some(position) = tokens.iter().position(|&w| w >= vocab_size) {
                return Err(GsdmmError::TokenOutOfRange {
                    document: d,
                    position,
                    token: tokens[position] as i64,
                    vocab_size,
                });
            }
        }

        // documents are independent of each other
        let documents: Vec<Document> = documents
            .par_iter()
            .map(|tokens| Document::from_valid_tokens(tokens.as_ref()))
            .collect();

        let num_tokens = documents.iter().map(Document::len).sum();

        Ok(Corpus {
            documents,
            vocab_size,
            num_tokens,
        })
    }

    /// Number of documents `D`.
    pub fn num_documents(&self) -> usize {
        self.documents.len()
    }

    /// Total token occurrences across the corpus.
    pub fn num_tokens(&self) -> usize {
        self.num_tokens
    }

    /// Vocabulary size `V`.
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Document at index `d`.
    pub fn document(&self, d: usize) -> &Document {
        &self.documents[d]
    }

    /// All documents in input order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Total occurrences of each token over the corpus (length `V`).
    pub fn token_frequencies(&self) -> Vec<usize> {
        let mut freq = vec![0; self.vocab_size];
        for doc in &self.documents {
            for (w, c) in doc.token_counts() {
                freq[w] += c;
            }
        }
        freq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_tokens_and_counts() {
        let doc = Document::new(&[3, 1, 3, 0, 3, 1], 4).unwrap();
        assert_eq!(doc.unique_tokens(), &[0, 1, 3]);
        assert_eq!(
            doc.token_counts().collect::<Vec<_>>(),
            vec![(0, 1), (1, 2), (3, 3)]
        );
        assert_eq!(doc.len(), 6);
        assert_eq!(doc.count(3), 3);
        assert_eq!(doc.count(2), 0);
    }

    #[test]
    fn test_empty_document() {
        let doc = Document::new(&[], 5).unwrap();
        assert!(doc.is_empty());
        assert!(doc.unique_tokens().is_empty());
        assert_eq!(doc.token_counts().count(), 0);
    }

    #[test]
    fn test_token_out_of_range() {
        let docs: Vec<Vec<usize>> = vec![vec![0, 1], vec![2, 5, 1]];
        let err = Corpus::new(&docs, 5).unwrap_err();
        assert_eq!(
            err,
            GsdmmError::TokenOutOfRange {
                document: 1,
                position: 1,
                token: 5,
                vocab_size: 5,
            }
        );
    }

    #[test]
    fn test_corpus_preserves_order() {
        let docs: Vec<Vec<usize>> = (0..500).map(|d| vec![d % 7, d % 3, d % 7]).collect();
        let corpus = Corpus::new(&docs, 7).unwrap();

        assert_eq!(corpus.num_documents(), 500);
        assert_eq!(corpus.num_tokens(), 1500);
        for (d, doc) in corpus.documents().iter().enumerate() {
            assert_eq!(doc.count(d % 7), if d % 7 == d % 3 { 3 } else { 2 });
        }
    }

    #[test]
    fn test_token_frequencies() {
        let docs: Vec<Vec<usize>> = vec![vec![0, 1], vec![1, 2], vec![0, 2, 2]];
        let corpus = Corpus::new(&docs, 4).unwrap();
        assert_eq!(corpus.token_frequencies(), vec![2, 2, 3, 0]);
    }
}
