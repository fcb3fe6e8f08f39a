//! Single-flight loading of the embedding model.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use relay_rag::{
    Embedder, EmbeddingModel, EmbeddingProvider, HashingModel, ModelLoader, ModelState, RagError,
};

struct CountingLoader {
    loads: AtomicUsize,
    fail: bool,
}

impl CountingLoader {
    fn new(fail: bool) -> Self {
        Self { loads: AtomicUsize::new(0), fail }
    }
}

#[async_trait]
impl ModelLoader for CountingLoader {
    fn model_id(&self) -> &str {
        "counting"
    }

    fn dimensions(&self) -> usize {
        32
    }

    async fn load(&self) -> relay_rag::Result<Arc<dyn EmbeddingModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        if self.fail {
            return Err(RagError::EmbeddingUnavailable {
                model: "counting".into(),
                message: "weights missing".into(),
            });
        }
        Ok(Arc::new(HashingModel::new(32)))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_calls_load_once() {
    let loader = Arc::new(CountingLoader::new(false));
    let embedder = Arc::new(Embedder::new(loader.clone()));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let embedder = embedder.clone();
            tokio::spawn(async move { embedder.embed(&format!("burger number {i}")).await })
        })
        .collect();

    for handle in handles {
        let v = handle.await.unwrap().unwrap();
        assert_eq!(v.len(), 32);
    }
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    assert_eq!(embedder.state(), ModelState::Loaded);
}

#[tokio::test]
async fn load_failure_surfaces_as_embedding_unavailable() {
    let loader = Arc::new(CountingLoader::new(true));
    let embedder = Embedder::new(loader.clone());

    assert!(matches!(embedder.embed("fries").await, Err(RagError::EmbeddingUnavailable { .. })));
    assert!(matches!(embedder.embed("fries").await, Err(RagError::EmbeddingUnavailable { .. })));
    // failures are not cached
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    assert_eq!(embedder.state(), ModelState::NotLoaded);
}

#[tokio::test]
async fn warm_up_loads_eagerly() {
    let loader = Arc::new(CountingLoader::new(false));
    let embedder = Embedder::new(loader.clone());
    embedder.warm_up().await.unwrap();
    embedder.embed("shake").await.unwrap();
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
}
