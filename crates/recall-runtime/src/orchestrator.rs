//! Orchestrator – the single entry point over every memory store.
//!
//! [`Orchestrator`] owns the scratch cache, the memory graph, the thought
//! tracker (with its [`ThinkingSession`]) and the persistence manager.  Each
//! store sits behind its own `tokio::sync` lock so every in-memory mutation
//! completes atomically with respect to the others.
//!
//! # Persistence
//!
//! Successful graph mutations are followed by a save.  A failing save is
//! returned to the caller as [`RecallError::Storage`], but the in-memory
//! mutation stands and the graph stays dirty, so the next save retries it.
//! The auto-save timer armed by [`Orchestrator::open`] covers changes that do
//! not save eagerly, such as access metadata bumped by recalls.
//!
//! # Lock order
//!
//! When two locks are held, `thinking` is taken before `graph`.  The graph
//! lock is never held across file I/O.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), recall_types::RecallError> {
//! use recall_runtime::{Orchestrator, RecallConfig};
//!
//! let recall = Orchestrator::open(&RecallConfig::default()).await?;
//! let a = recall.add_memory("The sky is blue", vec![]).await?;
//! let b = recall.add_memory("Rayleigh scattering", vec![a.clone()]).await?;
//! let hit = recall.get_memory(&b, Some(1)).await?;
//! assert_eq!(hit.associations[0].id, a);
//! recall.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use recall_memory::graph::MemoryGraph;
use recall_memory::persistence::PersistenceManager;
use recall_memory::scratch::ScratchCache;
use recall_memory::thought::{
    BranchOutcome, ChainView, CompletionOutcome, ThinkingProgress, ThinkingSession,
    ThinkingStats, ThoughtTracker,
};
use recall_types::{
    CognitiveMode, MemoryNode, NodeRecall, RecallError, ScratchEntry, SearchHit, ThoughtChain,
    ThoughtNode, ThoughtType,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::config::RecallConfig;

// ─────────────────────────────────────────────────────────────────────────────
// Statistics
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScratchStats {
    pub entries: usize,
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GraphStats {
    pub nodes: usize,
    pub associations: usize,
    /// Associations per node, `0.0` for an empty graph.
    pub average_associations: f64,
    /// Whether there are changes not yet saved.
    pub dirty: bool,
}

/// Aggregates returned by [`Orchestrator::get_memory_stats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MemoryStats {
    pub scratch: ScratchStats,
    pub graph: GraphStats,
    pub thinking: ThinkingStats,
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

struct Thinking {
    tracker: ThoughtTracker,
    session: ThinkingSession,
}

pub struct Orchestrator {
    scratch: Mutex<ScratchCache>,
    graph: RwLock<MemoryGraph>,
    thinking: Mutex<Thinking>,
    persistence: PersistenceManager,
    /// Serialises in-process saves.
    save_gate: Mutex<()>,
}

impl Orchestrator {
    /// Prepare storage, load the persisted graph and arm auto-save.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip(config), fields(storage_dir = %config.storage_dir.display()))]
    pub async fn open(config: &RecallConfig) -> Result<Arc<Self>, RecallError> {
        let persistence = PersistenceManager::new(config.persistence_config());
        persistence.init().await?;
        let snapshot = persistence.load().await?;

        let mut graph = MemoryGraph::new(config.graph_limits());
        graph.load_nodes(snapshot);
        info!(memories = graph.len(), "memory graph ready");

        let orchestrator = Arc::new(Self {
            scratch: Mutex::new(ScratchCache::new(config.scratch_capacity)),
            graph: RwLock::new(graph),
            thinking: Mutex::new(Thinking {
                tracker: ThoughtTracker::new(),
                session: ThinkingSession::default(),
            }),
            persistence,
            save_gate: Mutex::new(()),
        });

        // Weak: the timer task must not keep the orchestrator alive.
        let weak = Arc::downgrade(&orchestrator);
        orchestrator
            .persistence
            .start_auto_save(config.auto_save_interval(), move || {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(orchestrator) => orchestrator.persist().await,
                        None => Ok(()),
                    }
                }
            });

        Ok(orchestrator)
    }

    /// Save the graph if it has unsaved changes.
    ///
    /// The snapshot is taken under the graph lock, which is then released for
    /// the file write.  The dirty flag is cleared only if no mutation landed
    /// while the write was in progress.
    pub async fn persist(&self) -> Result<(), RecallError> {
        let _gate = self.save_gate.lock().await;
        let (snapshot, revision) = {
            let graph = self.graph.read().await;
            if !graph.is_dirty() {
                debug!("memory graph clean; nothing to save");
                return Ok(());
            }
            (graph.get_all_nodes(), graph.revision())
        };

        self.persistence.save(&snapshot).await?;

        let mut graph = self.graph.write().await;
        if graph.revision() == revision {
            graph.mark_clean();
        } else {
            debug!("memory graph changed during save; staying dirty");
        }
        Ok(())
    }

    async fn persist_after_mutation(&self, operation: &str) -> Result<(), RecallError> {
        self.persist().await.inspect_err(|e| {
            warn!(operation, error = %e, "save after mutation failed; change kept in memory");
        })
    }

    // ── Scratch cache ────────────────────────────────────────────────────────

    #[instrument(skip(self, text))]
    pub async fn add_to_scratch(&self, text: &str) -> Result<(), RecallError> {
        self.scratch.lock().await.add(text)
    }

    pub async fn get_scratch(&self) -> Vec<ScratchEntry> {
        self.scratch.lock().await.get_all()
    }

    #[instrument(skip(self))]
    pub async fn clear_scratch(&self) {
        self.scratch.lock().await.clear();
    }

    #[instrument(skip(self))]
    pub async fn set_scratch_capacity(&self, capacity: usize) -> Result<(), RecallError> {
        self.scratch.lock().await.set_capacity(capacity)
    }

    // ── Memory graph ─────────────────────────────────────────────────────────

    #[instrument(skip(self, text))]
    pub async fn add_memory(
        &self,
        text: &str,
        associations: Vec<String>,
    ) -> Result<String, RecallError> {
        let id = self.graph.write().await.add(text, associations)?;
        self.persist_after_mutation("add_memory").await?;
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn get_memory(
        &self,
        id: &str,
        depth: Option<usize>,
    ) -> Result<NodeRecall, RecallError> {
        self.graph.write().await.get(id, depth)
    }

    #[instrument(skip(self))]
    pub async fn search_memories(
        &self,
        keyword: &str,
        limit: Option<usize>,
        case_sensitive: bool,
    ) -> Result<Vec<SearchHit>, RecallError> {
        self.graph.read().await.search(keyword, limit, case_sensitive)
    }

    #[instrument(skip(self, text))]
    pub async fn update_memory(
        &self,
        id: &str,
        text: Option<&str>,
        associations: Option<Vec<String>>,
    ) -> Result<MemoryNode, RecallError> {
        let node = self.graph.write().await.update(id, text, associations)?;
        self.persist_after_mutation("update_memory").await?;
        Ok(node)
    }

    #[instrument(skip(self))]
    pub async fn delete_memory(&self, id: &str) -> Result<(), RecallError> {
        self.graph.write().await.delete(id)?;
        self.persist_after_mutation("delete_memory").await
    }

    pub async fn get_associations(&self, id: &str) -> Result<Vec<String>, RecallError> {
        self.graph.read().await.get_associations(id)
    }

    // ── Thinking ─────────────────────────────────────────────────────────────

    #[instrument(skip(self))]
    pub async fn start_thought_process(
        &self,
        goal: &str,
        context: Option<&str>,
    ) -> Result<String, RecallError> {
        let mut thinking = self.thinking.lock().await;
        let Thinking { tracker, session } = &mut *thinking;
        tracker.start_thought_process(goal, context, session)
    }

    #[instrument(skip(self, text))]
    pub async fn add_thought(
        &self,
        chain_id: &str,
        text: &str,
        thought_type: ThoughtType,
        parent: Option<&str>,
        confidence: Option<f64>,
    ) -> Result<String, RecallError> {
        self.thinking
            .lock()
            .await
            .tracker
            .add_thought(chain_id, text, thought_type, parent, confidence)
    }

    #[instrument(skip(self, text))]
    pub async fn branch_thought(
        &self,
        source_id: &str,
        text: &str,
        thought_type: Option<ThoughtType>,
        confidence: Option<f64>,
    ) -> Result<BranchOutcome, RecallError> {
        let mut thinking = self.thinking.lock().await;
        let Thinking { tracker, session } = &mut *thinking;
        tracker.branch_thought(source_id, text, thought_type, confidence, session)
    }

    #[instrument(skip(self, reasoning))]
    pub async fn evaluate_thought(
        &self,
        thought_id: &str,
        confidence: f64,
        reasoning: &str,
    ) -> Result<ThoughtNode, RecallError> {
        self.thinking
            .lock()
            .await
            .tracker
            .evaluate_thought(thought_id, confidence, reasoning)
    }

    /// Close a chain and save the graph if a summary memory was recorded.
    #[instrument(skip(self, conclusion))]
    pub async fn complete_thought_process(
        &self,
        chain_id: &str,
        conclusion: &str,
    ) -> Result<CompletionOutcome, RecallError> {
        let outcome = {
            let mut thinking = self.thinking.lock().await;
            let mut graph = self.graph.write().await;
            thinking
                .tracker
                .complete_thought_process(chain_id, conclusion, &mut graph)?
        };
        if outcome.summary_memory_id.is_some() {
            self.persist_after_mutation("complete_thought_process").await?;
        }
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn pause_thinking(&self, chain_id: &str, reason: &str) -> Result<(), RecallError> {
        self.thinking.lock().await.tracker.pause_thinking(chain_id, reason)
    }

    #[instrument(skip(self))]
    pub async fn resume_thinking(&self, chain_id: &str) -> Result<(), RecallError> {
        self.thinking.lock().await.tracker.resume_thinking(chain_id)
    }

    #[instrument(skip(self))]
    pub async fn switch_cognitive_mode(
        &self,
        mode: CognitiveMode,
        chain_id: Option<&str>,
    ) -> Result<(), RecallError> {
        let mut thinking = self.thinking.lock().await;
        let Thinking { tracker, session } = &mut *thinking;
        tracker.switch_cognitive_mode(session, mode, chain_id)
    }

    pub fn get_optimal_mode_for_task(task: &str) -> CognitiveMode {
        ThoughtTracker::get_optimal_mode_for_task(task)
    }

    pub async fn current_cognitive_mode(&self) -> CognitiveMode {
        self.thinking.lock().await.session.current_mode
    }

    pub async fn get_thought(&self, thought_id: &str) -> Result<ThoughtNode, RecallError> {
        self.thinking.lock().await.tracker.get_thought(thought_id)
    }

    pub async fn get_current_thought_chain(&self, chain_id: &str) -> Result<ChainView, RecallError> {
        self.thinking
            .lock()
            .await
            .tracker
            .get_current_thought_chain(chain_id)
    }

    pub async fn get_thinking_progress(
        &self,
        chain_id: &str,
    ) -> Result<ThinkingProgress, RecallError> {
        self.thinking.lock().await.tracker.get_thinking_progress(chain_id)
    }

    pub async fn get_active_chains(&self) -> Vec<ThoughtChain> {
        self.thinking.lock().await.tracker.get_active_chains()
    }

    pub async fn get_thinking_stats(&self) -> ThinkingStats {
        let thinking = self.thinking.lock().await;
        thinking.tracker.get_thinking_stats(&thinking.session)
    }

    // ── Aggregates & lifecycle ───────────────────────────────────────────────

    pub async fn get_memory_stats(&self) -> MemoryStats {
        let scratch = {
            let cache = self.scratch.lock().await;
            ScratchStats {
                entries: cache.len(),
                capacity: cache.capacity(),
            }
        };
        let graph = {
            let graph = self.graph.read().await;
            let nodes = graph.len();
            let associations = graph.total_associations();
            GraphStats {
                nodes,
                associations,
                average_associations: if nodes == 0 {
                    0.0
                } else {
                    associations as f64 / nodes as f64
                },
                dirty: graph.is_dirty(),
            }
        };
        MemoryStats {
            scratch,
            graph,
            thinking: self.get_thinking_stats().await,
        }
    }

    /// Final save, then stop the timer and release the lock file.
    ///
    /// Cleanup runs even when the save fails; the save error is returned.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<(), RecallError> {
        let saved = self.persist().await;
        self.persistence.cleanup().await;
        info!(saved = saved.is_ok(), "recall shut down");
        saved
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
