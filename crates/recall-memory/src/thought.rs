//! Thought Tracker.
//!
//! Layers multi-step reasoning sessions on top of the memory graph.  A
//! [`ThoughtChain`] is an ordered list of typed, confidence-scored
//! [`ThoughtNode`]s plus the ids of chains branched off it.
//!
//! ## Chain lifecycle
//!
//! ```text
//! active ──complete──▶ completed
//!   │  ▲
//! pause resume
//!   ▼  │
//!  paused
//! ```
//!
//! Only two transitions are guarded: [`ThoughtTracker::add_thought`] needs an
//! active chain and [`ThoughtTracker::resume_thinking`] needs a paused one.
//! Pausing and completing are unconditional.
//!
//! ## Cognitive mode
//!
//! The current reasoning style lives in a caller-owned [`ThinkingSession`].
//! Chains copy the session mode when they are created; switching the session
//! mode later does not touch existing chains unless one is named explicitly.
//!
//! Thoughts live in the tracker's own map and are never inserted into the
//! [`MemoryGraph`].  The graph is touched only when a chain completes, to
//! record a summary memory.
//!
//! # Example
//!
//! ```rust
//! use recall_memory::graph::MemoryGraph;
//! use recall_memory::thought::{ThinkingSession, ThoughtTracker};
//! use recall_types::{ChainStatus, ThoughtType};
//!
//! let session = ThinkingSession::default();
//! let mut tracker = ThoughtTracker::new();
//! let mut graph = MemoryGraph::default();
//!
//! let chain = tracker
//!     .start_thought_process("pick a database", None, &session)
//!     .unwrap();
//! tracker
//!     .add_thought(&chain, "we need transactions", ThoughtType::Observation, None, None)
//!     .unwrap();
//! tracker
//!     .complete_thought_process(&chain, "use postgres", &mut graph)
//!     .unwrap();
//!
//! assert_eq!(tracker.get_current_thought_chain(&chain).unwrap().chain.status, ChainStatus::Completed);
//! ```

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use recall_types::{
    ChainStatus, CognitiveMode, Complexity, MemoryNode, RecallError, ThoughtChain,
    ThoughtMetadata, ThoughtNode, ThoughtStatus, ThoughtType, new_id,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::graph::MemoryGraph;

/// Confidence assigned by [`ThoughtTracker::add_thought`] when none is given.
pub const DEFAULT_THOUGHT_CONFIDENCE: f64 = 0.7;
/// Confidence assigned by [`ThoughtTracker::branch_thought`] when none is given.
pub const DEFAULT_BRANCH_CONFIDENCE: f64 = 0.6;
/// Characters of the source thought kept in a branch chain's goal.
const BRANCH_GOAL_CHARS: usize = 50;

// ─────────────────────────────────────────────────────────────────────────────
// Session & result types
// ─────────────────────────────────────────────────────────────────────────────

/// Per-caller reasoning context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ThinkingSession {
    pub current_mode: CognitiveMode,
}

/// Ids produced by [`ThoughtTracker::branch_thought`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BranchOutcome {
    pub chain_id: String,
    pub thought_id: String,
}

/// Result of [`ThoughtTracker::complete_thought_process`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CompletionOutcome {
    pub chain_id: String,
    /// Id of the summary memory, when the graph accepted it.
    pub summary_memory_id: Option<String>,
}

/// A chain together with its thoughts, in chain order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChainView {
    pub chain: ThoughtChain,
    pub thoughts: Vec<ThoughtNode>,
}

/// Progress summary for one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ThinkingProgress {
    pub chain_id: String,
    pub goal: String,
    pub status: ChainStatus,
    pub cognitive_mode: CognitiveMode,
    pub thought_count: usize,
    /// Mean confidence of the chain's own thoughts, `0.0` when there are none.
    pub average_confidence: f64,
    pub max_depth: u32,
    pub branch_count: usize,
    /// Milliseconds from creation to completion (or to now).
    pub elapsed_ms: i64,
}

/// Process-wide tallies across every chain and thought.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ThinkingStats {
    pub total_chains: usize,
    pub active_chains: usize,
    pub paused_chains: usize,
    pub completed_chains: usize,
    pub chains_by_mode: BTreeMap<String, usize>,
    pub total_thoughts: usize,
    pub thoughts_by_status: BTreeMap<String, usize>,
    pub current_mode: CognitiveMode,
}

// ─────────────────────────────────────────────────────────────────────────────
// ThoughtTracker
// ─────────────────────────────────────────────────────────────────────────────

/// Owns every reasoning chain and thought of the process.
#[derive(Default)]
pub struct ThoughtTracker {
    chains: HashMap<String, ThoughtChain>,
    /// Chain creation order.
    chain_order: Vec<String>,
    thoughts: HashMap<String, ThoughtNode>,
}

impl ThoughtTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new `active` chain that snapshots the session's mode.
    pub fn start_thought_process(
        &mut self,
        goal: &str,
        context: Option<&str>,
        session: &ThinkingSession,
    ) -> Result<String, RecallError> {
        if goal.trim().is_empty() {
            return Err(RecallError::Validation("goal must not be empty".to_string()));
        }
        let id = self.insert_chain(
            goal.to_string(),
            context.map(str::to_string),
            session.current_mode,
        );
        info!(chain_id = %id, mode = %session.current_mode, "thought process started");
        Ok(id)
    }

    fn insert_chain(&mut self, goal: String, context: Option<String>, mode: CognitiveMode) -> String {
        let chain = ThoughtChain {
            id: new_id(),
            goal,
            context,
            created_at: Utc::now(),
            completed_at: None,
            status: ChainStatus::Active,
            thoughts: Vec::new(),
            branches: Vec::new(),
            cognitive_mode: mode,
        };
        let id = chain.id.clone();
        self.chain_order.push(id.clone());
        self.chains.insert(id.clone(), chain);
        id
    }

    /// Append a thought to an active chain and return its id.
    ///
    /// With a `parent`, the new thought sits one level deeper and is linked
    /// from the parent's `next_thoughts`; without one it is a root at depth 0.
    pub fn add_thought(
        &mut self,
        chain_id: &str,
        text: &str,
        thought_type: ThoughtType,
        parent: Option<&str>,
        confidence: Option<f64>,
    ) -> Result<String, RecallError> {
        let chain = self
            .chains
            .get(chain_id)
            .ok_or_else(|| RecallError::not_found("chain", chain_id))?;
        if chain.status != ChainStatus::Active {
            return Err(RecallError::State(format!(
                "chain {chain_id} is {}, thoughts can only be added to an active chain",
                chain.status
            )));
        }
        validate_thought_text(text)?;
        let confidence = validate_confidence(confidence.unwrap_or(DEFAULT_THOUGHT_CONFIDENCE))?;
        let depth = match parent {
            Some(pid) => {
                self.thoughts
                    .get(pid)
                    .ok_or_else(|| RecallError::not_found("thought", pid))?
                    .reasoning_depth
                    + 1
            }
            None => 0,
        };

        let since = self.last_activity(chain);
        let thinking_time_ms = (Utc::now() - since).num_milliseconds().max(0) as u64;

        let thought = ThoughtNode {
            memory: MemoryNode::new(text.to_string(), Vec::new()),
            thought_type,
            confidence,
            status: ThoughtStatus::Active,
            parent_chain: chain_id.to_string(),
            previous_thought: parent.map(str::to_string),
            next_thoughts: Vec::new(),
            reasoning_depth: depth,
            thought_metadata: ThoughtMetadata {
                thinking_time_ms,
                complexity: Complexity::of(text),
            },
        };
        let id = thought.id().to_string();

        if let Some(pid) = parent
            && let Some(p) = self.thoughts.get_mut(pid)
        {
            p.next_thoughts.push(id.clone());
        }
        if let Some(chain) = self.chains.get_mut(chain_id) {
            chain.thoughts.push(id.clone());
        }
        self.thoughts.insert(id.clone(), thought);
        debug!(chain_id, thought_id = %id, depth, %thought_type, "thought added");
        Ok(id)
    }

    /// Creation time of the chain's latest thought, or of the chain itself.
    fn last_activity(&self, chain: &ThoughtChain) -> DateTime<Utc> {
        chain
            .thoughts
            .last()
            .and_then(|id| self.thoughts.get(id))
            .map(|t| t.memory.metadata.created_at)
            .unwrap_or(chain.created_at)
    }

    /// Fork a new chain off `source_id` and seed it with `text`.
    ///
    /// The new chain is linked from the source chain's `branches` and carries
    /// the source goal as context.  Its first thought is a root (depth 0) with
    /// no back-link to the source thought.
    pub fn branch_thought(
        &mut self,
        source_id: &str,
        text: &str,
        thought_type: Option<ThoughtType>,
        confidence: Option<f64>,
        session: &ThinkingSession,
    ) -> Result<BranchOutcome, RecallError> {
        let source = self
            .thoughts
            .get(source_id)
            .ok_or_else(|| RecallError::not_found("thought", source_id))?;
        let source_chain = self
            .chains
            .get(&source.parent_chain)
            .ok_or_else(|| RecallError::not_found("chain", &source.parent_chain))?;
        validate_thought_text(text)?;
        let confidence = validate_confidence(confidence.unwrap_or(DEFAULT_BRANCH_CONFIDENCE))?;

        let goal = branch_goal(&source.memory.text);
        let context = source_chain.goal.clone();
        let source_chain_id = source_chain.id.clone();

        let chain_id = self.insert_chain(goal, Some(context), session.current_mode);
        if let Some(parent) = self.chains.get_mut(&source_chain_id) {
            parent.branches.push(chain_id.clone());
        }
        let thought_id = self.add_thought(
            &chain_id,
            text,
            thought_type.unwrap_or(ThoughtType::Hypothesis),
            None,
            Some(confidence),
        )?;
        info!(source_thought = source_id, %chain_id, "thought branched");
        Ok(BranchOutcome {
            chain_id,
            thought_id,
        })
    }

    /// Overwrite a thought's confidence and record the reasoning behind it.
    ///
    /// The reasoning is appended to the thought's `associations` as a
    /// `reasoning:<text>` marker.
    pub fn evaluate_thought(
        &mut self,
        thought_id: &str,
        confidence: f64,
        reasoning: &str,
    ) -> Result<ThoughtNode, RecallError> {
        let confidence = validate_confidence(confidence)?;
        let thought = self
            .thoughts
            .get_mut(thought_id)
            .ok_or_else(|| RecallError::not_found("thought", thought_id))?;
        thought.confidence = confidence;
        thought.memory.touch();
        thought
            .memory
            .associations
            .push(format!("reasoning:{reasoning}"));
        debug!(thought_id, confidence, "thought evaluated");
        Ok(thought.clone())
    }

    /// Close a chain and record its conclusion in `graph`.
    ///
    /// Every still-active thought of the chain (branches excluded) becomes
    /// completed.  The summary memory associates `thought:<id>` tags, which
    /// are not graph ids, so the graph rejects it whenever the chain has any
    /// thoughts; that rejection is logged and the completion still succeeds.
    pub fn complete_thought_process(
        &mut self,
        chain_id: &str,
        conclusion: &str,
        graph: &mut MemoryGraph,
    ) -> Result<CompletionOutcome, RecallError> {
        if !self.chains.contains_key(chain_id) {
            return Err(RecallError::not_found("chain", chain_id));
        }
        if conclusion.trim().is_empty() {
            return Err(RecallError::Validation(
                "conclusion must not be empty".to_string(),
            ));
        }
        let chain = self
            .chains
            .get_mut(chain_id)
            .ok_or_else(|| RecallError::not_found("chain", chain_id))?;
        chain.status = ChainStatus::Completed;
        chain.completed_at = Some(Utc::now());
        let goal = chain.goal.clone();
        let thought_ids = chain.thoughts.clone();

        for id in &thought_ids {
            if let Some(t) = self.thoughts.get_mut(id)
                && t.status == ThoughtStatus::Active
            {
                t.status = ThoughtStatus::Completed;
            }
        }

        let summary = format!("Completed thought process: {goal}\nConclusion: {conclusion}");
        let tags = thought_ids.iter().map(|id| format!("thought:{id}")).collect();
        let summary_memory_id = match graph.add(&summary, tags) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(chain_id, error = %e, "conclusion summary was not recorded in memory graph");
                None
            }
        };
        info!(chain_id, thoughts = thought_ids.len(), "thought process completed");
        Ok(CompletionOutcome {
            chain_id: chain_id.to_string(),
            summary_memory_id,
        })
    }

    /// Mark a chain paused and note the reason in its context.
    ///
    /// Applies whatever the current status is; repeated calls keep appending.
    pub fn pause_thinking(&mut self, chain_id: &str, reason: &str) -> Result<(), RecallError> {
        let chain = self
            .chains
            .get_mut(chain_id)
            .ok_or_else(|| RecallError::not_found("chain", chain_id))?;
        chain.status = ChainStatus::Paused;
        let note = format!("[Paused: {reason}]");
        chain.context = Some(match chain.context.take() {
            Some(ctx) if !ctx.is_empty() => format!("{ctx}\n{note}"),
            _ => note,
        });
        info!(chain_id, reason, "thought process paused");
        Ok(())
    }

    pub fn resume_thinking(&mut self, chain_id: &str) -> Result<(), RecallError> {
        let chain = self
            .chains
            .get_mut(chain_id)
            .ok_or_else(|| RecallError::not_found("chain", chain_id))?;
        if chain.status != ChainStatus::Paused {
            return Err(RecallError::State(format!(
                "chain {chain_id} is {}, only a paused chain can resume",
                chain.status
            )));
        }
        chain.status = ChainStatus::Active;
        info!(chain_id, "thought process resumed");
        Ok(())
    }

    /// Set the session mode and, when `chain_id` is given, that chain's mode.
    pub fn switch_cognitive_mode(
        &mut self,
        session: &mut ThinkingSession,
        mode: CognitiveMode,
        chain_id: Option<&str>,
    ) -> Result<(), RecallError> {
        if let Some(id) = chain_id {
            let chain = self
                .chains
                .get_mut(id)
                .ok_or_else(|| RecallError::not_found("chain", id))?;
            chain.cognitive_mode = mode;
        }
        session.current_mode = mode;
        debug!(%mode, chain_id, "cognitive mode switched");
        Ok(())
    }

    /// Suggest a cognitive mode from keywords in a task description.
    ///
    /// Keyword groups are checked in a fixed order (analytical, creative,
    /// critical, intuitive, meta-cognitive); the first group with a hit wins.
    pub fn get_optimal_mode_for_task(task: &str) -> CognitiveMode {
        const RULES: [(CognitiveMode, &[&str]); 5] = [
            (
                CognitiveMode::Analytical,
                &["analy", "calculat", "data", "logic", "measure", "compar", "debug"],
            ),
            (
                CognitiveMode::Creative,
                &["creat", "design", "imagin", "brainstorm", "invent", "innovat", "idea"],
            ),
            (
                CognitiveMode::Critical,
                &["critic", "review", "assess", "risk", "flaw", "verif", "validat", "audit"],
            ),
            (
                CognitiveMode::Intuitive,
                &["intuit", "feel", "gut", "instinct", "hunch", "quick"],
            ),
            (
                CognitiveMode::MetaCognitive,
                &["reflect", "meta", "strateg", "learn", "approach"],
            ),
        ];

        let task = task.to_lowercase();
        RULES
            .iter()
            .find(|(_, words)| words.iter().any(|w| task.contains(w)))
            .map(|(mode, _)| *mode)
            .unwrap_or(CognitiveMode::Analytical)
    }

    // ── Read-only projections ────────────────────────────────────────────────

    pub fn get_thought(&self, thought_id: &str) -> Result<ThoughtNode, RecallError> {
        self.thoughts
            .get(thought_id)
            .cloned()
            .ok_or_else(|| RecallError::not_found("thought", thought_id))
    }

    pub fn get_current_thought_chain(&self, chain_id: &str) -> Result<ChainView, RecallError> {
        let chain = self
            .chains
            .get(chain_id)
            .ok_or_else(|| RecallError::not_found("chain", chain_id))?;
        let thoughts = chain
            .thoughts
            .iter()
            .filter_map(|id| self.thoughts.get(id).cloned())
            .collect();
        Ok(ChainView {
            chain: chain.clone(),
            thoughts,
        })
    }

    pub fn get_thinking_progress(&self, chain_id: &str) -> Result<ThinkingProgress, RecallError> {
        let chain = self
            .chains
            .get(chain_id)
            .ok_or_else(|| RecallError::not_found("chain", chain_id))?;
        let own: Vec<&ThoughtNode> = chain
            .thoughts
            .iter()
            .filter_map(|id| self.thoughts.get(id))
            .collect();
        let average_confidence = if own.is_empty() {
            0.0
        } else {
            own.iter().map(|t| t.confidence).sum::<f64>() / own.len() as f64
        };
        let max_depth = own.iter().map(|t| t.reasoning_depth).max().unwrap_or(0);
        let end = chain.completed_at.unwrap_or_else(Utc::now);

        Ok(ThinkingProgress {
            chain_id: chain.id.clone(),
            goal: chain.goal.clone(),
            status: chain.status,
            cognitive_mode: chain.cognitive_mode,
            thought_count: own.len(),
            average_confidence,
            max_depth,
            branch_count: chain.branches.len(),
            elapsed_ms: (end - chain.created_at).num_milliseconds(),
        })
    }

    /// Every `active` chain, oldest first.
    pub fn get_active_chains(&self) -> Vec<ThoughtChain> {
        self.chain_order
            .iter()
            .filter_map(|id| self.chains.get(id))
            .filter(|c| c.status == ChainStatus::Active)
            .cloned()
            .collect()
    }

    pub fn get_thinking_stats(&self, session: &ThinkingSession) -> ThinkingStats {
        let count = |status: ChainStatus| self.chains.values().filter(|c| c.status == status).count();

        let mut chains_by_mode = BTreeMap::new();
        for chain in self.chains.values() {
            *chains_by_mode
                .entry(chain.cognitive_mode.to_string())
                .or_insert(0) += 1;
        }
        let mut thoughts_by_status = BTreeMap::new();
        for thought in self.thoughts.values() {
            *thoughts_by_status
                .entry(thought.status.to_string())
                .or_insert(0) += 1;
        }

        ThinkingStats {
            total_chains: self.chains.len(),
            active_chains: count(ChainStatus::Active),
            paused_chains: count(ChainStatus::Paused),
            completed_chains: count(ChainStatus::Completed),
            chains_by_mode,
            total_thoughts: self.thoughts.len(),
            thoughts_by_status,
            current_mode: session.current_mode,
        }
    }
}

fn validate_thought_text(text: &str) -> Result<(), RecallError> {
    if text.trim().is_empty() {
        return Err(RecallError::Validation(
            "thought text must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_confidence(confidence: f64) -> Result<f64, RecallError> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(RecallError::Validation(format!(
            "confidence must be within [0, 1], got {confidence}"
        )));
    }
    Ok(confidence)
}

fn branch_goal(source_text: &str) -> String {
    let prefix: String = source_text.chars().take(BRANCH_GOAL_CHARS).collect();
    if source_text.chars().count() > BRANCH_GOAL_CHARS {
        format!("Branch: {prefix}...")
    } else {
        format!("Branch: {prefix}")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
