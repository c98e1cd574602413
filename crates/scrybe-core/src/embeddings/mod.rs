//! Semantic Embeddings Module
//!
//! Local text embedding generation via `fastembed` (ONNX-based). No external
//! API calls or network access required once the model is cached.

mod local;

pub use local::{
    cosine_similarity, dot_product, euclidean_distance, Embedder, Embedding, EmbeddingError,
    BATCH_SIZE, EMBEDDING_DIMENSIONS, MAX_TEXT_LENGTH,
};
