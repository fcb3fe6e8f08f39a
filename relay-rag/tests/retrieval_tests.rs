//! Property tests for retrieval size and ordering.

use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;
use relay_rag::{
    Document, EmbeddedDocument, EmbeddingProvider, InMemoryVectorStore, Retriever, VectorStore,
};

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-3 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Returns a fixed vector for every query so the test controls the search.
struct FixedEmbedding(Vec<f32>);

#[async_trait]
impl EmbeddingProvider for FixedEmbedding {
    async fn embed(&self, _text: &str) -> relay_rag::Result<Vec<f32>> {
        Ok(self.0.clone())
    }

    fn dimensions(&self) -> usize {
        self.0.len()
    }
}

/// *For any* index of n documents and any k >= 1, `retrieve` SHALL return
/// exactly min(k, n) results ordered by non-increasing score.
mod prop_retrieve_size_and_order {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn returns_min_k_n_in_descending_order(
            embeddings in proptest::collection::vec(arb_normalized_embedding(DIM), 0..20),
            query in arb_normalized_embedding(DIM),
            k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let n = embeddings.len();
            let results = rt.block_on(async {
                let store = Arc::new(InMemoryVectorStore::new());
                let docs: Vec<EmbeddedDocument> = embeddings
                    .into_iter()
                    .enumerate()
                    .map(|(i, e)| EmbeddedDocument::new(Document::new(format!("doc-{i}")), e))
                    .collect();
                store.add(&docs).await.unwrap();

                let retriever = Retriever::new(Arc::new(FixedEmbedding(query)), store);
                retriever.retrieve("anything", k).await.unwrap()
            });

            prop_assert_eq!(results.len(), k.min(n));
            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }
    }
}
