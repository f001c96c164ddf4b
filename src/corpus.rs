/// A document as a sparse bag-of-words: `(term_id, count)` pairs
///
/// Term ids index into the vocabulary supplied at model creation. Counts are
/// non-negative; a term id may appear more than once, in which case the
/// counts are summed when the batch matrix is assembled.
pub type Document = Vec<(usize, f64)>;

/// An owned, restartable collection of documents
///
/// The model iterates the corpus once per pass, in chunks of `chunksize`
/// documents. Vocabulary (id↔token) management is outside this crate; the
/// corpus only carries integer term ids.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<Document>,
}

impl Corpus {
    pub fn new() -> Self {
        Corpus {
            documents: Vec::new(),
        }
    }

    pub fn from_documents(documents: Vec<Document>) -> Self {
        Corpus { documents }
    }

    pub fn add_document(&mut self, document: Document) {
        self.documents.push(document);
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Iterate the corpus in chunks of at most `chunksize` documents
    pub fn chunks(&self, chunksize: usize) -> std::slice::Chunks<'_, Document> {
        self.documents.chunks(chunksize)
    }

    /// Mean count of the first document over the full feature dimension
    ///
    /// Used to scale the random dictionary initialization to the corpus's
    /// typical document intensity.
    pub fn first_document_mean(&self, n_features: usize) -> Option<f64> {
        self.documents
            .first()
            .map(|doc| doc.iter().map(|&(_, count)| count).sum::<f64>() / n_features as f64)
    }
}
