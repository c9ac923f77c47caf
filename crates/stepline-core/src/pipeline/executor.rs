//! Local executor: runs a plan's generations in-process.
//!
//! Generations run strictly in order. Within a generation, steps are mutually
//! independent: `run` executes them one after another, `run_concurrent` runs
//! them on the blocking pool through a `tokio::JoinSet` and joins the whole
//! generation before the next one starts.
//!
//! # Execution flow
//!
//! 1. Start with an empty name -> result map.
//! 2. For each generation, resolve every step's arguments from the map
//!    (step references become upstream results, literals pass through).
//! 3. Invoke each step's work item.
//! 4. Record results in the map and in the generation's output list.
//! 5. The first failure stops the run; no later step or generation executes.

use std::collections::HashMap;

use serde_json::Value;
use tokio::task::JoinSet;

use super::error::ExecutionError;
use super::step::{Step, StepArg};

// ---------------------------------------------------------------------------
// LocalRun
// ---------------------------------------------------------------------------

/// Results of a completed local run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalRun {
    /// `(step name, result)` pairs per generation, in generation order.
    pub generations: Vec<Vec<(String, Value)>>,
}

impl LocalRun {
    /// Result of the step called `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.generations
            .iter()
            .flatten()
            .find(|(step, _)| step == name)
            .map(|(_, value)| value)
    }

    /// All results keyed by step name.
    pub fn outputs(&self) -> HashMap<String, Value> {
        self.generations.iter().flatten().cloned().collect()
    }

    pub fn into_generations(self) -> Vec<Vec<(String, Value)>> {
        self.generations
    }
}

// ---------------------------------------------------------------------------
// LocalExecutor
// ---------------------------------------------------------------------------

/// In-process executor for plan generations.
///
/// Stateless: the result map lives for the duration of one call.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    /// Run `generations` sequentially.
    pub fn run(generations: &[Vec<Step>]) -> Result<LocalRun, ExecutionError> {
        let mut results: HashMap<String, Value> = HashMap::new();
        let mut run = LocalRun::default();

        for (index, layer) in generations.iter().enumerate() {
            tracing::debug!(generation = index, steps = layer.len(), "processing generation");

            let mut outputs = Vec::with_capacity(layer.len());
            for step in layer {
                let args = resolve_args(step, &results)?;
                tracing::debug!(step = step.name(), args = args.len(), "invoking step");
                let output = invoke(step, &args)?;
                results.insert(step.name().to_string(), output.clone());
                outputs.push((step.name().to_string(), output));
            }
            run.generations.push(outputs);
        }

        Ok(run)
    }

    /// Run `generations` with every generation's steps executing concurrently.
    ///
    /// Results are identical to [`LocalExecutor::run`]: they are reported in
    /// the generation's order regardless of completion order.
    pub async fn run_concurrent(generations: &[Vec<Step>]) -> Result<LocalRun, ExecutionError> {
        let mut results: HashMap<String, Value> = HashMap::new();
        let mut run = LocalRun::default();

        for (index, layer) in generations.iter().enumerate() {
            tracing::debug!(generation = index, steps = layer.len(), "processing generation");

            // Resolve before spawning so tasks own their inputs and never
            // touch the shared map.
            let mut join_set = JoinSet::new();
            let mut task_names: HashMap<tokio::task::Id, String> = HashMap::new();
            for (position, step) in layer.iter().enumerate() {
                let args = resolve_args(step, &results)?;
                let task_step = step.clone();
                let handle = join_set.spawn_blocking(move || {
                    let output = invoke(&task_step, &args);
                    (position, output)
                });
                task_names.insert(handle.id(), step.name().to_string());
            }

            let mut slots: Vec<Option<(String, Value)>> = vec![None; layer.len()];
            while let Some(joined) = join_set.join_next().await {
                let (position, output) = match joined {
                    Ok(done) => done,
                    Err(join_err) => {
                        join_set.abort_all();
                        return Err(ExecutionError::Join {
                            step: task_names.remove(&join_err.id()).unwrap_or_default(),
                            reason: join_err.to_string(),
                        });
                    }
                };
                match output {
                    Ok(value) => {
                        slots[position] = Some((layer[position].name().to_string(), value));
                    }
                    Err(err) => {
                        join_set.abort_all();
                        return Err(err);
                    }
                }
            }

            // Barrier: the whole generation is joined, publish its results.
            let outputs: Vec<(String, Value)> = slots.into_iter().flatten().collect();
            for (name, value) in &outputs {
                results.insert(name.clone(), value.clone());
            }
            run.generations.push(outputs);
        }

        Ok(run)
    }
}

/// Replace step references with upstream results; literals pass through.
fn resolve_args(
    step: &Step,
    results: &HashMap<String, Value>,
) -> Result<Vec<Value>, ExecutionError> {
    step.args()
        .iter()
        .map(|arg| match arg {
            StepArg::Literal(value) => Ok(value.clone()),
            StepArg::Step(upstream) => results.get(upstream.name()).cloned().ok_or_else(|| {
                ExecutionError::MissingUpstream {
                    step: step.name().to_string(),
                    dependency: upstream.name().to_string(),
                }
            }),
        })
        .collect()
}

fn invoke(step: &Step, args: &[Value]) -> Result<Value, ExecutionError> {
    step.invoke(args).map_err(|err| {
        tracing::warn!(step = step.name(), error = %err, "step failed");
        ExecutionError::StepFailed {
            step: step.name().to_string(),
            source: err.into(),
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::pipeline::dag::{build_graph, compute_generations};

    fn constant(
        value: &'static str,
    ) -> impl Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static {
        move |_args: &[Value]| -> anyhow::Result<Value> { Ok(json!(value)) }
    }

    fn concat(args: &[Value]) -> anyhow::Result<Value> {
        let joined: String = args.iter().filter_map(Value::as_str).collect();
        Ok(json!(joined))
    }

    /// a -> {b, c} -> d, where b and c append to a's output and d joins them.
    fn diamond() -> Vec<Vec<Step>> {
        let a = Step::builder(constant("a")).name("a").build();
        let b = Step::builder(concat).name("b").step_arg(&a).arg("-b").build();
        let c = Step::builder(concat).name("c").step_arg(&a).arg("-c").build();
        let d = Step::builder(concat)
            .name("d")
            .step_arg(&b)
            .arg("|")
            .step_arg(&c)
            .build();
        compute_generations(&build_graph(&[d]).unwrap())
    }

    // -----------------------------------------------------------------------
    // Sequential
    // -----------------------------------------------------------------------

    #[test]
    fn test_diamond_outputs_propagate() {
        let run = LocalExecutor::run(&diamond()).unwrap();
        assert_eq!(
            run.generations,
            vec![
                vec![("a".to_string(), json!("a"))],
                vec![("b".to_string(), json!("a-b")), ("c".to_string(), json!("a-c"))],
                vec![("d".to_string(), json!("a-b|a-c"))],
            ]
        );
        assert_eq!(run.get("d"), Some(&json!("a-b|a-c")));
        assert_eq!(run.outputs().len(), 4);
    }

    #[test]
    fn test_literal_args_untouched() {
        let step = Step::builder(|args: &[Value]| -> anyhow::Result<Value> { Ok(json!(args)) })
            .name("echo")
            .arg(json!({"k": [1, 2]}))
            .arg(3)
            .build();
        let run = LocalExecutor::run(&[vec![step]]).unwrap();
        assert_eq!(run.get("echo"), Some(&json!([{"k": [1, 2]}, 3])));
    }

    #[test]
    fn test_empty_plan_runs_nothing() {
        let run = LocalExecutor::run(&[]).unwrap();
        assert!(run.generations.is_empty());
        assert!(run.into_generations().is_empty());
    }

    #[test]
    fn test_failure_stops_later_generations() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let a = Step::builder(constant("a")).name("a").build();
        let broken = Step::builder(|_args: &[Value]| -> anyhow::Result<Value> {
            anyhow::bail!("disk full")
        })
        .name("broken")
        .step_arg(&a)
        .build();
        let after = Step::builder(move |_args: &[Value]| -> anyhow::Result<Value> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        })
        .name("after")
        .step_arg(&broken)
        .build();

        let generations = compute_generations(&build_graph(&[after]).unwrap());
        let err = LocalExecutor::run(&generations).unwrap_err();
        assert_eq!(err.step(), "broken");
        assert!(err.to_string().contains("disk full"), "got: {err}");
        assert_eq!(calls.load(Ordering::SeqCst), 0, "no later generation runs");
    }

    #[test]
    fn test_missing_upstream_when_generations_out_of_order() {
        let a = Step::builder(constant("a")).name("a").build();
        let b = Step::builder(concat).name("b").step_arg(&a).build();
        let err = LocalExecutor::run(&[vec![b], vec![a]]).unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::MissingUpstream { ref dependency, .. } if dependency == "a"
        ));
    }

    // -----------------------------------------------------------------------
    // Concurrent
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_concurrent_matches_sequential() {
        let generations = diamond();
        let sequential = LocalExecutor::run(&generations).unwrap();
        let concurrent = LocalExecutor::run_concurrent(&generations).await.unwrap();
        assert_eq!(sequential, concurrent);
    }

    #[tokio::test]
    async fn test_concurrent_wide_generation_keeps_order() {
        let root = Step::builder(constant("r")).name("root").build();
        let leaves: Vec<Step> = (0..8)
            .map(|i| {
                Step::builder(move |args: &[Value]| -> anyhow::Result<Value> {
                    // Later leaves finish first.
                    std::thread::sleep(std::time::Duration::from_millis(8 - i));
                    Ok(json!(format!("{}{i}", args[0].as_str().unwrap_or_default())))
                })
                .name(format!("leaf-{i}"))
                .step_arg(&root)
                .build()
            })
            .collect();

        let generations = compute_generations(&build_graph(&leaves).unwrap());
        let run = LocalExecutor::run_concurrent(&generations).await.unwrap();
        assert_eq!(run.generations.len(), 2);
        let names: Vec<&str> = run.generations[1].iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["leaf-0", "leaf-1", "leaf-2", "leaf-3", "leaf-4", "leaf-5", "leaf-6", "leaf-7"]
        );
        assert_eq!(run.get("leaf-5"), Some(&json!("r5")));
    }

    #[tokio::test]
    async fn test_concurrent_failure_attributed_to_step() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let ok = Step::builder(constant("fine")).name("ok").build();
        let broken = Step::builder(|_args: &[Value]| -> anyhow::Result<Value> {
            anyhow::bail!("bad input")
        })
        .name("broken")
        .build();
        let join = Step::builder(move |_args: &[Value]| -> anyhow::Result<Value> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        })
        .name("join")
        .step_arg(&ok)
        .step_arg(&broken)
        .build();

        let generations = compute_generations(&build_graph(&[join]).unwrap());
        let err = LocalExecutor::run_concurrent(&generations).await.unwrap_err();
        assert!(matches!(err, ExecutionError::StepFailed { ref step, .. } if step == "broken"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_panic_surfaces_as_join_error() {
        let boom = Step::builder(|_args: &[Value]| -> anyhow::Result<Value> {
            panic!("work item panicked")
        })
        .name("boom")
        .build();
        let err = LocalExecutor::run_concurrent(&[vec![boom]]).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Join { ref step, .. } if step == "boom"));
    }
}
