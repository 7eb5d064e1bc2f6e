use crate::engine::delete::fetch_tasks;
use crate::engine::pool::run_bounded;
use crate::index::IndexScope;
use crate::model::{EvaluationRun, PairwiseTask, TaskPrompt, IDEAL_MODEL_ID, TASK_SCHEMA_VERSION};
use crate::queue::TaskQueue;
use crate::status::{GenerationState, GenerationStatus};
use crate::storage::set_json;
use crate::task_id::{compute_task_id, Side, TaskIdScheme};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct PopulateOptions {
    pub anchor_model_id: String,
}

/// What one `populate` call did.
///
/// `total_tasks_in_queue` is the global index length after the append; the
/// pre-append length is kept in `count_before`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulateOutcome {
    pub tasks_added: usize,
    pub count_before: usize,
    pub count_after: usize,
    pub total_tasks_in_queue: usize,
    pub prompts_skipped: Vec<String>,
}

impl PopulateOutcome {
    fn unchanged(len: usize) -> Self {
        Self {
            count_before: len,
            count_after: len,
            total_tasks_in_queue: len,
            ..Default::default()
        }
    }
}

/// Candidate tasks built from a run, before deduplication.
#[derive(Debug, Default)]
pub struct PairPlan {
    pub config_id: String,
    pub tasks: Vec<PairwiseTask>,
    pub skipped_prompts: Vec<String>,
}

/// Pairs the anchor with every other responding model, prompt by prompt.
///
/// Returns `None` when the run lacks its config, contexts, or responses.
pub fn plan_pairs(run: &EvaluationRun, anchor: &str, scheme: TaskIdScheme) -> Option<PairPlan> {
    let config_id = run.config_id()?;
    let contexts = run.prompt_contexts.as_ref()?;
    let responses = run.all_final_assistant_responses.as_ref()?;

    let system = run.system_prompt_for(anchor);
    let mut plan = PairPlan {
        config_id: config_id.to_string(),
        ..PairPlan::default()
    };

    for prompt_id in run.ordered_prompt_ids() {
        let Some(by_model) = responses.get(&prompt_id) else {
            tracing::warn!(
                event = "pairq.populate.prompt_skipped",
                prompt_id = %prompt_id,
                reason = "no_responses",
                "no responses recorded for prompt; skipping"
            );
            plan.skipped_prompts.push(prompt_id);
            continue;
        };

        // the sentinel never takes part, not even as the anchor
        let anchor_response = if anchor == IDEAL_MODEL_ID {
            None
        } else {
            by_model.get(anchor)
        };
        let Some(anchor_response) = anchor_response else {
            tracing::warn!(
                event = "pairq.populate.prompt_skipped",
                prompt_id = %prompt_id,
                anchor = %anchor,
                reason = "anchor_missing",
                "anchor model has no response for prompt; skipping"
            );
            plan.skipped_prompts.push(prompt_id);
            continue;
        };

        let Some(context) = contexts.get(&prompt_id) else {
            tracing::warn!(
                event = "pairq.populate.prompt_skipped",
                prompt_id = %prompt_id,
                reason = "context_missing",
                "prompt context missing; skipping"
            );
            plan.skipped_prompts.push(prompt_id);
            continue;
        };
        let messages = context.to_messages();

        let others = by_model
            .iter()
            .filter(|(model_id, _)| model_id.as_str() != anchor && model_id.as_str() != IDEAL_MODEL_ID);

        for (model_id, response) in others {
            let task_id = compute_task_id(
                scheme,
                &prompt_id,
                Side {
                    model_id: anchor,
                    response: anchor_response,
                },
                Side {
                    model_id,
                    response,
                },
            );
            plan.tasks.push(PairwiseTask {
                task_id,
                prompt: TaskPrompt {
                    system: system.clone(),
                    messages: messages.clone(),
                },
                response_a: anchor_response.clone(),
                response_b: response.clone(),
                model_id_a: anchor.to_string(),
                model_id_b: model_id.clone(),
                config_id: config_id.to_string(),
                schema_version: TASK_SCHEMA_VERSION,
            });
        }
    }

    Some(plan)
}

impl TaskQueue {
    /// Turns one evaluation run into new comparison tasks.
    ///
    /// Data-shape problems degrade to warnings and a zero-progress outcome;
    /// only store failures are returned as errors. Tasks already written when
    /// a failure happens stay in the store, and re-running is safe.
    pub async fn populate(
        &self,
        run: &EvaluationRun,
        opts: &PopulateOptions,
    ) -> anyhow::Result<PopulateOutcome> {
        let _writer = self.index.write_lock().await?;
        let config_id = run.config_id().map(str::to_string);

        if let Some(cfg_id) = &config_id {
            self.status
                .record(
                    cfg_id,
                    GenerationStatus::new(
                        GenerationState::Generating,
                        format!("Generating pairs against anchor {}", opts.anchor_model_id),
                    ),
                )
                .await;
        }

        match self.populate_locked(run, opts).await {
            Ok(outcome) => {
                if let Some(cfg_id) = &config_id {
                    self.status
                        .record(
                            cfg_id,
                            GenerationStatus::complete(
                                outcome.tasks_added,
                                outcome.total_tasks_in_queue,
                            ),
                        )
                        .await;
                }
                Ok(outcome)
            }
            Err(e) => {
                if let Some(cfg_id) = &config_id {
                    self.status
                        .record(
                            cfg_id,
                            GenerationStatus::failed("Pair generation failed", format!("{:#}", e)),
                        )
                        .await;
                }
                Err(e)
            }
        }
    }

    async fn populate_locked(
        &self,
        run: &EvaluationRun,
        opts: &PopulateOptions,
    ) -> anyhow::Result<PopulateOutcome> {
        let existing = self.index.get(IndexScope::Global).await?;
        let count_before = existing.len();

        let Some(plan) = plan_pairs(run, &opts.anchor_model_id, self.settings.task_id_scheme)
        else {
            tracing::warn!(
                event = "pairq.populate.invalid_run",
                has_config = run.config_id().is_some(),
                has_contexts = run.prompt_contexts.is_some(),
                has_responses = run.all_final_assistant_responses.is_some(),
                "run result is missing config, prompt contexts, or responses; nothing to do"
            );
            return Ok(PopulateOutcome::unchanged(count_before));
        };

        let known: HashSet<String> = existing.into_iter().collect();
        let candidates = plan.tasks.len();

        // Repeated prompt ids yield the same pair more than once.
        let mut planned: HashSet<String> = HashSet::new();
        let mut plan_ids: Vec<String> = Vec::new();
        let mut fresh: Vec<PairwiseTask> = Vec::new();
        for task in plan.tasks {
            if !planned.insert(task.task_id.clone()) {
                continue;
            }
            plan_ids.push(task.task_id.clone());
            if !known.contains(&task.task_id) {
                fresh.push(task);
            }
        }

        let cfg_id = plan.config_id.as_str();
        let scoped: HashSet<String> = self
            .index
            .get(IndexScope::Config(cfg_id))
            .await?
            .into_iter()
            .collect();
        // Ids already global but missing here were lost by an earlier run
        // that failed between the two appends. Only records this config owns
        // are re-added; an identical pair from another config is not.
        let unscoped: Vec<String> = plan_ids
            .iter()
            .filter(|id| known.contains(*id) && !scoped.contains(*id))
            .cloned()
            .collect();
        let owned: HashSet<String> = fetch_tasks(self, &unscoped)
            .await?
            .into_iter()
            .filter_map(|(id, task)| match task {
                Some(t) if t.config_id == cfg_id => Some(id),
                _ => None,
            })
            .collect();
        let repaired: Vec<String> = unscoped
            .into_iter()
            .filter(|id| owned.contains(id))
            .collect();
        let pending = self.index.is_pending(cfg_id).await?;

        tracing::info!(
            event = "pairq.populate.plan",
            candidates,
            fresh = fresh.len(),
            repaired = repaired.len(),
            skipped_prompts = plan.skipped_prompts.len(),
            "planned pairwise tasks"
        );

        if fresh.is_empty() && repaired.is_empty() && !pending {
            let mut outcome = PopulateOutcome::unchanged(count_before);
            outcome.prompts_skipped = plan.skipped_prompts;
            return Ok(outcome);
        }
        if !repaired.is_empty() {
            tracing::warn!(
                event = "pairq.index.repair",
                config_id = %cfg_id,
                missing = repaired.len(),
                "per-config index was missing ids; re-adding them"
            );
        }

        self.index.mark_pending(cfg_id).await?;

        let new_ids: Vec<String> = fresh.iter().map(|t| t.task_id.clone()).collect();
        let store = self.tasks.clone();
        run_bounded("write_task", fresh, self.pool_options(), move |task| {
            let store = store.clone();
            async move { set_json(store.as_ref(), &task.task_id, &task).await }
        })
        .await?;

        // Global first: a per-config id must never be missing from the global index.
        let count_after = self.index.append_unique(IndexScope::Global, &new_ids).await?;
        let mut scoped_ids = new_ids.clone();
        scoped_ids.extend(repaired);
        self.index
            .append_unique(IndexScope::Config(cfg_id), &scoped_ids)
            .await?;
        self.index.clear_pending(cfg_id).await?;

        tracing::info!(
            event = "pairq.populate.done",
            config_id = %cfg_id,
            tasks_added = new_ids.len(),
            count_before,
            count_after
        );

        Ok(PopulateOutcome {
            tasks_added: new_ids.len(),
            count_before,
            count_after,
            total_tasks_in_queue: count_after,
            prompts_skipped: plan.skipped_prompts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PromptContext, RunConfig};
    use std::collections::BTreeMap;

    fn run_with(responses: &[(&str, Vec<(&str, &str)>)]) -> EvaluationRun {
        let mut all = BTreeMap::new();
        let mut contexts = BTreeMap::new();
        for (pid, models) in responses {
            all.insert(
                pid.to_string(),
                models
                    .iter()
                    .map(|(m, r)| (m.to_string(), r.to_string()))
                    .collect(),
            );
            contexts.insert(pid.to_string(), PromptContext::Text(format!("question {}", pid)));
        }
        EvaluationRun {
            config: Some(RunConfig {
                id: "cfg".into(),
                title: None,
            }),
            prompt_ids: responses.iter().map(|(p, _)| p.to_string()).collect(),
            prompt_contexts: Some(contexts),
            all_final_assistant_responses: Some(all),
            model_system_prompts: BTreeMap::from([("A".to_string(), Some("sys-A".to_string()))]),
        }
    }

    #[test]
    fn test_plan_fans_out_from_anchor() {
        let run = run_with(&[("p1", vec![("A", "r1"), ("B", "r2"), ("C", "r3")])]);
        let plan = plan_pairs(&run, "A", TaskIdScheme::Flat).unwrap();
        assert_eq!(plan.tasks.len(), 2);
        for t in &plan.tasks {
            assert_eq!(t.model_id_a, "A");
            assert_eq!(t.response_a, "r1");
            assert_eq!(t.prompt.system.as_deref(), Some("sys-A"));
            assert_eq!(t.prompt.messages.len(), 1);
            assert_eq!(t.config_id, "cfg");
        }
        let others: Vec<_> = plan.tasks.iter().map(|t| t.model_id_b.as_str()).collect();
        assert_eq!(others, vec!["B", "C"]);
    }

    #[test]
    fn test_plan_excludes_ideal_and_skips_missing_anchor() {
        let run = run_with(&[
            ("p1", vec![("A", "r1"), (IDEAL_MODEL_ID, "gold"), ("B", "r2")]),
            ("p2", vec![("B", "x"), ("C", "y")]),
        ]);
        let plan = plan_pairs(&run, "A", TaskIdScheme::Canonical).unwrap();
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].model_id_b, "B");
        assert_eq!(plan.skipped_prompts, vec!["p2".to_string()]);
    }

    #[test]
    fn test_plan_requires_run_shape() {
        let mut run = run_with(&[("p1", vec![("A", "r1"), ("B", "r2")])]);
        run.prompt_contexts = None;
        assert!(plan_pairs(&run, "A", TaskIdScheme::Flat).is_none());

        let mut run = run_with(&[("p1", vec![("A", "r1"), ("B", "r2")])]);
        run.config = None;
        assert!(plan_pairs(&run, "A", TaskIdScheme::Flat).is_none());
    }
}
