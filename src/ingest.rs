//! Document ingestion: chunk, embed, index.
//!
//! One-shot pipeline from extracted document text to a frozen [`Index`].
//! Child embeddings are generated in batch; the embedding count is
//! validated against the child count at ingest.

use crate::chunking::SemanticChunker;
use crate::core::RequestContext;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::index::Index;

/// Counts reported after an ingestion run.
#[derive(Debug, Clone, Copy)]
pub struct IngestStats {
    /// Parents created.
    pub parents: usize,
    /// Children created and embedded.
    pub children: usize,
}

/// Chunks `text`, embeds every child, and returns the initialised index.
///
/// # Errors
///
/// Propagates chunking failures (including empty documents), embedder
/// failures, and cancellation.
pub async fn ingest_document(
    ctx: &RequestContext,
    file_name: &str,
    text: &str,
    chunker: &SemanticChunker,
    embedder: &dyn Embedder,
) -> Result<(Index, IngestStats)> {
    ctx.ensure_active().map_err(crate::error::Error::from)?;

    let chunked = chunker.chunk(text, embedder).await?;
    let stats = IngestStats {
        parents: chunked.parent_count(),
        children: chunked.child_count(),
    };

    ctx.ensure_active().map_err(crate::error::Error::from)?;
    let child_texts: Vec<String> = chunked.children.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder
        .embed_batch(&child_texts)
        .await
        .map_err(crate::error::Error::from)?;

    let mut index = Index::new();
    index.ingest(file_name, chunked.parents, chunked.children, embeddings)?;

    tracing::info!(
        file = file_name,
        parents = stats.parents,
        children = stats.children,
        "document ingested"
    );
    Ok((index, stats))
}
