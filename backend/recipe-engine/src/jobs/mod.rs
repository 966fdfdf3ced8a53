// ============================================
// Background Jobs Module
// ============================================
//
// Contains job runners for:
// 1. Corpus warm-up (install fitted models, ingest the recipe corpus)
//
// The binary runs the warm-up once at start-up.

pub mod corpus_warmup;

pub use corpus_warmup::{
    run_corpus_warmup, CorpusSource, CorpusWarmupJob, JsonFileCorpus, WarmupStats,
};
