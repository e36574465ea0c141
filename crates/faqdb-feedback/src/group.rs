//! Clustering of repeated low-confidence questions into FAQ proposals.

use serde::Serialize;
use tracing::{info, warn};

use faqdb_core::config::FeedbackConfig;
use faqdb_core::math::cosine_similarity;
use faqdb_core::traits::Embedder;

use crate::log::CandidateQuestion;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMember {
    pub question: String,
    pub count: usize,
    /// Cosine similarity to the representative question.
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateGroup {
    pub representative_question: String,
    pub representative_count: usize,
    pub member_questions: Vec<GroupMember>,
    pub total_count: usize,
}

impl CandidateGroup {
    pub fn group_size(&self) -> usize {
        self.member_questions.len() + 1
    }
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// The smaller root wins so that groups are rooted at their earliest member.
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// Single-link grouping of `candidates` (expected most frequent first) at
/// `config.group_similarity`.
///
/// At most `config.max_candidates` questions are considered; questions that
/// fail to embed are skipped. A question with no similar peer only forms a
/// group when it was asked at least `config.min_singleton_count` times.
/// Groups are sorted by total count, largest first.
pub fn group_similar(candidates: &[CandidateQuestion], embedder: &dyn Embedder, config: &FeedbackConfig) -> Vec<CandidateGroup> {
    let considered = &candidates[..candidates.len().min(config.max_candidates)];

    let mut embedded: Vec<(&CandidateQuestion, Vec<f32>)> = Vec::with_capacity(considered.len());
    for candidate in considered {
        match embedder.embed(&candidate.question) {
            Ok(v) => embedded.push((candidate, v)),
            Err(e) => warn!(question = %candidate.question, error = %e, "skipping question that failed to embed"),
        }
    }

    let n = embedded.len();
    let mut sets = DisjointSet::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if cosine_similarity(&embedded[i].1, &embedded[j].1) >= config.group_similarity {
                sets.union(i, j);
            }
        }
    }

    let mut clusters: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        let root = sets.find(i);
        clusters[root].push(i);
    }

    let mut groups: Vec<CandidateGroup> = clusters
        .into_iter()
        .filter(|c| !c.is_empty())
        .filter_map(|members| {
            // Most asked question represents the group; earliest wins ties.
            let rep = members
                .iter()
                .copied()
                .max_by(|&a, &b| embedded[a].0.count.cmp(&embedded[b].0.count).then_with(|| b.cmp(&a)))?;
            let (rep_q, rep_vec) = &embedded[rep];
            if members.len() == 1 && rep_q.count < config.min_singleton_count {
                return None;
            }
            let member_questions: Vec<GroupMember> = members
                .iter()
                .filter(|&&m| m != rep)
                .map(|&m| GroupMember {
                    question: embedded[m].0.question.clone(),
                    count: embedded[m].0.count,
                    similarity: cosine_similarity(rep_vec, &embedded[m].1),
                })
                .collect();
            let total_count = rep_q.count + member_questions.iter().map(|m| m.count).sum::<usize>();
            Some(CandidateGroup {
                representative_question: rep_q.question.clone(),
                representative_count: rep_q.count,
                member_questions,
                total_count,
            })
        })
        .collect();

    groups.sort_by(|a, b| b.total_count.cmp(&a.total_count));
    info!(questions = n, groups = groups.len(), "candidate questions grouped");
    groups
}
