//! Concept merge pass
//!
//! Entity extraction produces near-duplicates ("k8s", "Kubernetes") whose
//! normalized names differ, so id-level dedup cannot catch them. This pass
//! embeds every concept, merges pairs whose similarity crosses the merge
//! threshold, and records weaker affinity as weighted `RELATED_TO` edges.
//! Merging is transitive: similarity clusters are closed with union-find,
//! and each cluster keeps its lexicographically smallest concept id so the
//! pass is deterministic.

use atlas_core::{AtlasResult, ConceptNode, EmbeddingProvider, GraphStore, RelationKind};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Pairs at or above `merge_threshold` merge; pairs in
/// `[relate_threshold, merge_threshold)` get a `RELATED_TO` edge.
#[derive(Debug, Clone)]
pub struct MergeThresholds {
    pub merge_threshold: f32,
    pub relate_threshold: f32,
}

impl Default for MergeThresholds {
    fn default() -> Self {
        Self {
            merge_threshold: 0.92,
            relate_threshold: 0.75,
        }
    }
}

/// What one merge pass did.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub examined: usize,
    pub merged: usize,
    pub related_pairs: usize,
    pub skipped: usize,
}

pub struct ConceptMerger {
    graph: Arc<dyn GraphStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    thresholds: MergeThresholds,
}

impl ConceptMerger {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        thresholds: MergeThresholds,
    ) -> Self {
        Self {
            graph,
            embedder,
            thresholds,
        }
    }

    /// Run one merge pass over every concept in the graph.
    pub async fn merge_similar(&self) -> AtlasResult<MergeReport> {
        let concepts = self.graph.list_concepts().await?;
        let mut report = MergeReport {
            examined: concepts.len(),
            ..Default::default()
        };

        // Embed "name: description"; a concept whose embedding fails sits
        // this pass out rather than failing it.
        let mut embedded: Vec<(ConceptNode, Vec<f32>)> = Vec::with_capacity(concepts.len());
        for concept in concepts {
            let text = format!("{}: {}", concept.name, concept.description);
            match self.embedder.embed(&text).await {
                Ok(response) => embedded.push((concept, response.embedding)),
                Err(err) if err.is_unit_scoped() => {
                    warn!(concept = %concept.id, error = %err, "skipping concept in merge pass");
                    report.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        let n = embedded.len();
        let mut union = UnionFind::new(n);
        let mut related: Vec<(usize, usize, f32)> = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                let similarity = cosine(&embedded[i].1, &embedded[j].1);
                if similarity >= self.thresholds.merge_threshold {
                    union.join(i, j);
                } else if similarity >= self.thresholds.relate_threshold {
                    related.push((i, j, similarity));
                }
            }
        }

        // Survivor per cluster: lexicographically smallest concept id.
        let mut survivor_of = vec![usize::MAX; n];
        for i in 0..n {
            let root = union.find(i);
            let current = survivor_of[root];
            if current == usize::MAX || embedded[i].0.id < embedded[current].0.id {
                survivor_of[root] = i;
            }
        }
        let survivor = |i: usize, union: &mut UnionFind| survivor_of[union.find(i)];

        for i in 0..n {
            let keep = survivor(i, &mut union);
            if keep == i {
                continue;
            }
            let dupe = &embedded[i].0;
            let kept = &embedded[keep].0;
            info!(from = %dupe.id, into = %kept.id, "merging concept");
            self.graph.repoint_concept_edges(&dupe.id, &kept.id).await?;
            self.graph.delete_concept(&dupe.id).await?;
            report.merged += 1;
        }

        for (i, j, similarity) in related {
            let a = survivor(i, &mut union);
            let b = survivor(j, &mut union);
            if a == b {
                continue;
            }
            self.graph
                .relate(
                    &embedded[a].0.id,
                    &embedded[b].0.id,
                    RelationKind::RelatedTo,
                    json!({ "weight": similarity }),
                )
                .await?;
            report.related_pairs += 1;
        }

        info!(
            examined = report.examined,
            merged = report.merged,
            related = report.related_pairs,
            "concept merge pass complete"
        );
        Ok(report)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn join(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}
