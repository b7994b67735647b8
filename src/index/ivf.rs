use std::collections::HashSet;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{rank, IndexRecord, Metric, QueryResult, RecordSet, VectorIndex};
use crate::embeddings::{inner_product, l2_normalize};
use crate::error::{RagError, Result};

/// Tuning knobs for the inverted-file index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IvfParams {
    /// Number of k-means clusters. Capped at the record count.
    pub nlist: usize,
    /// Clusters scanned per query. More is slower and more accurate;
    /// `nprobe >= nlist` is exact search.
    pub nprobe: usize,
    pub max_iterations: usize,
    pub seed: u64,
}

impl Default for IvfParams {
    fn default() -> Self {
        Self {
            nlist: 1024,
            nprobe: 64,
            max_iterations: 20,
            seed: 42,
        }
    }
}

impl IvfParams {
    pub fn validate(&self) -> Result<()> {
        if self.nlist == 0 {
            return Err(RagError::Config("nlist must be at least 1".into()));
        }
        if self.nprobe == 0 {
            return Err(RagError::Config("nprobe must be at least 1".into()));
        }
        Ok(())
    }
}

/// Approximate index: records are bucketed under their nearest k-means
/// centroid at load time, and a query scores only the `nprobe` buckets
/// whose centroids are closest to it.
#[derive(Debug)]
pub struct IvfIndex {
    params: IvfParams,
    records: RecordSet,
    centroids: Vec<Vec<f32>>,
    /// Positions into the committed records, one list per centroid.
    lists: Vec<Vec<usize>>,
}

impl IvfIndex {
    pub fn new(params: IvfParams) -> Self {
        Self {
            params,
            records: RecordSet::default(),
            centroids: Vec::new(),
            lists: Vec::new(),
        }
    }

    pub fn with_storage(mut self, path: PathBuf) -> Self {
        self.records = RecordSet::with_storage(path);
        self
    }

    pub fn params(&self) -> IvfParams {
        self.params
    }

    pub fn cluster_count(&self) -> usize {
        self.centroids.len()
    }

    fn train(&mut self) {
        let data = self.records.committed();
        let k = self.params.nlist.min(data.len());
        if k == 0 {
            self.centroids.clear();
            self.lists.clear();
            return;
        }

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut centroids = seed_centroids(data, k, &mut rng);
        let mut assignments = vec![usize::MAX; data.len()];

        for iteration in 0..self.params.max_iterations.max(1) {
            let mut changed = 0usize;
            for (i, record) in data.iter().enumerate() {
                let best = nearest(&centroids, &record.embedding);
                if assignments[i] != best {
                    assignments[i] = best;
                    changed += 1;
                }
            }
            if changed == 0 {
                debug!(iteration, "k-means converged");
                break;
            }

            let dim = centroids[0].len();
            let mut sums = vec![vec![0.0f32; dim]; k];
            let mut counts = vec![0usize; k];
            for (record, &cluster) in data.iter().zip(assignments.iter()) {
                counts[cluster] += 1;
                for (s, x) in sums[cluster].iter_mut().zip(record.embedding.iter()) {
                    *s += x;
                }
            }
            for (cluster, sum) in sums.into_iter().enumerate() {
                // An empty or degenerate cluster keeps its previous centroid
                if counts[cluster] == 0 {
                    continue;
                }
                if let Ok(centroid) = l2_normalize(sum) {
                    centroids[cluster] = centroid;
                }
            }
        }

        let mut lists = vec![Vec::new(); k];
        for (i, record) in data.iter().enumerate() {
            lists[nearest(&centroids, &record.embedding)].push(i);
        }

        info!(
            records = data.len(),
            clusters = k,
            nprobe = self.params.nprobe,
            "IVF index trained"
        );
        self.centroids = centroids;
        self.lists = lists;
    }

    /// Centroid positions ordered by closeness to `query`, closest first.
    fn probe_order(&self, query: &[f32]) -> Vec<usize> {
        let mut scored: Vec<(f32, usize)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (inner_product(query, c), i))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.into_iter().map(|(_, i)| i).collect()
    }
}

fn nearest(centroids: &[Vec<f32>], v: &[f32]) -> usize {
    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let score = inner_product(v, c);
        if score > best_score {
            best = i;
            best_score = score;
        }
    }
    best
}

/// k-means++ seeding: each next centroid is drawn with probability
/// proportional to its squared cosine distance from the chosen ones.
fn seed_centroids(data: &[IndexRecord], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let mut chosen: HashSet<usize> = HashSet::with_capacity(k);
    let first = rng.gen_range(0..data.len());
    chosen.insert(first);
    let mut centroids = vec![data[first].embedding.clone()];

    let mut closest: Vec<f32> = data
        .iter()
        .map(|r| inner_product(&r.embedding, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let weights: Vec<f32> = closest
            .iter()
            .enumerate()
            .map(|(i, &sim)| {
                if chosen.contains(&i) {
                    0.0
                } else {
                    let d = (1.0 - sim).max(0.0);
                    d * d
                }
            })
            .collect();
        let total: f32 = weights.iter().sum();

        let pick = if total > 0.0 {
            let mut target = rng.gen::<f32>() * total;
            let mut pick = None;
            for (i, w) in weights.iter().enumerate() {
                if *w <= 0.0 {
                    continue;
                }
                pick = Some(i);
                if target < *w {
                    break;
                }
                target -= w;
            }
            pick
        } else {
            None
        };
        // Remaining points coincide with chosen centroids; take the next unused one
        let pick = match pick.or_else(|| (0..data.len()).find(|i| !chosen.contains(i))) {
            Some(p) => p,
            None => break,
        };

        chosen.insert(pick);
        let centroid = data[pick].embedding.clone();
        for (sim, record) in closest.iter_mut().zip(data.iter()) {
            *sim = sim.max(inner_product(&record.embedding, &centroid));
        }
        centroids.push(centroid);
    }
    centroids
}

impl VectorIndex for IvfIndex {
    fn create(&mut self, dimension: usize, metric: Metric) -> Result<()> {
        self.params.validate()?;
        self.records.create(dimension, metric)
    }

    fn drop_index(&mut self) {
        self.records.reset();
        self.centroids.clear();
        self.lists.clear();
    }

    fn insert(&mut self, records: Vec<IndexRecord>) -> Result<usize> {
        self.records.insert(records)
    }

    fn flush(&mut self) -> Result<()> {
        self.records.flush()
    }

    fn load(&mut self) -> Result<()> {
        self.records.mark_loaded()?;
        self.train();
        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<QueryResult>> {
        if !self.records.check_query(query, top_k)? {
            return Ok(Vec::new());
        }
        let committed = self.records.committed();
        let candidates = self
            .probe_order(query)
            .into_iter()
            .take(self.params.nprobe)
            .flat_map(|list| self.lists[list].iter().map(|&i| &committed[i]));
        Ok(rank(candidates, query, top_k))
    }

    fn is_ready(&self) -> bool {
        self.records.is_ready()
    }

    fn len(&self) -> usize {
        self.records.committed().len()
    }

    fn dimension(&self) -> Option<usize> {
        self.records.dimension()
    }
}
