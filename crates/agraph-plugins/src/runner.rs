//! Transaction protocol around a transformer run.
//!
//! For each graph: open a transaction, transform, validate, then commit.
//! A transformer error rolls the graph back and returns a copy of the
//! partially mutated state for inspection. Validation errors roll back
//! only when the runner is configured to treat them as fatal.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use agraph_core::config::ValidationConfig;
use agraph_core::graph::Graph;
use agraph_core::validate::{Finding, FindingLevel, ValidationReport, Validator};

use crate::registry::TransformerRegistry;
use crate::spec::ParameterSet;
use crate::transform::{TransformContext, TransformError, Transformer};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unknown transformer: {0}")]
    UnknownTransformer(String),

    /// The graph was rolled back; `partial` is its state at the failure.
    #[error("transformation failed: {transformer} on {graph_id}: {source}")]
    TransformationFailed {
        transformer: String,
        graph_id: String,
        #[source]
        source: TransformError,
        partial: Box<Graph>,
    },

    /// The graph was rolled back.
    #[error("validation failed on {graph_id}: {errors} error(s)")]
    ValidationFailed {
        graph_id: String,
        errors: usize,
        report: ValidationReport,
    },
}

/// Diagnostics of one committed run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub graph_id: String,
    pub transformer: String,
    pub diagnostics: Vec<Finding>,
    pub validation: ValidationReport,
    /// Entries in the change log drained by the commit.
    pub changes: usize,
}

impl RunReport {
    fn push(&mut self, level: FindingLevel, code: &str, message: impl Into<String>) {
        self.diagnostics.push(Finding::new(level, code, message));
    }

    /// Transformer warnings, in the order they were reported.
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.diagnostics
            .iter()
            .filter(|d| d.code == "transform.warning")
            .map(|d| d.message.as_str())
    }

    pub fn has_errors(&self) -> bool {
        self.validation.has_errors()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransformRunner {
    validator: Validator,
    fail_on_validation_errors: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl TransformRunner {
    pub fn new(validation: ValidationConfig) -> Self {
        Self {
            validator: Validator::new(validation),
            ..Self::default()
        }
    }

    /// Roll back instead of committing when validation reports errors.
    pub fn fail_on_validation_errors(mut self, yes: bool) -> Self {
        self.fail_on_validation_errors = yes;
        self
    }

    /// Share a cancellation flag with the transformers this runner calls.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Look up `id` in `registry` and run it on `graph`.
    pub fn run(
        &self,
        registry: &TransformerRegistry,
        id: &str,
        graph: &mut Graph,
        params: &ParameterSet,
    ) -> Result<RunReport, RunError> {
        let registered = registry
            .get(id)
            .ok_or_else(|| RunError::UnknownTransformer(id.to_string()))?;
        self.run_with(registered.transformer.as_ref(), graph, params)
    }

    pub fn run_with(
        &self,
        transformer: &dyn Transformer,
        graph: &mut Graph,
        params: &ParameterSet,
    ) -> Result<RunReport, RunError> {
        let spec = transformer.spec();
        let params = params
            .resolve(&spec)
            .map_err(|e| RunError::InvalidConfiguration(format!("{e:#}")))?;
        let mut ctx = TransformContext::new(&params);
        if let Some(flag) = self.cancel.as_deref() {
            ctx = ctx.with_cancel(flag);
        }

        let mut report = RunReport {
            graph_id: graph.id.clone(),
            transformer: spec.id.as_str().to_string(),
            ..RunReport::default()
        };

        let mut tx = graph.begin_transaction();
        report.push(
            FindingLevel::Info,
            "run.stage.start",
            format!("transform {} on {}", report.transformer, report.graph_id),
        );
        match transformer.transform(&mut tx, &ctx) {
            Ok(warnings) => {
                for w in warnings {
                    report.push(FindingLevel::Warning, "transform.warning", w);
                }
            }
            Err(source) => {
                warn!(graph = %report.graph_id, transformer = %report.transformer, error = %source, "transformation failed; rolling back");
                let partial = Box::new((*tx).clone());
                tx.rollback();
                return Err(RunError::TransformationFailed {
                    transformer: report.transformer,
                    graph_id: report.graph_id,
                    source,
                    partial,
                });
            }
        }
        report.push(FindingLevel::Info, "run.stage.end", "transform complete");

        let validation = self.validator.validate(&tx);
        let errors = validation.errors().count();
        report.push(
            FindingLevel::Info,
            "run.validate",
            format!("{} finding(s), {errors} error(s)", validation.findings.len()),
        );
        if errors > 0 && self.fail_on_validation_errors {
            warn!(graph = %report.graph_id, errors, "validation failed; rolling back");
            tx.rollback();
            return Err(RunError::ValidationFailed {
                graph_id: report.graph_id,
                errors,
                report: validation,
            });
        }
        report.validation = validation;

        report.changes = tx.commit().len();
        report.push(
            FindingLevel::Info,
            "run.commit",
            format!("{} change(s) committed", report.changes),
        );
        debug!(graph = %report.graph_id, transformer = %report.transformer, changes = report.changes, "run complete");
        Ok(report)
    }

    /// Run `id` over independent graphs.
    ///
    /// Every graph gets its own result; a failure never stops the rest.
    #[cfg(not(feature = "parallel"))]
    pub fn run_batch(
        &self,
        registry: &TransformerRegistry,
        id: &str,
        graphs: &mut [Graph],
        params: &ParameterSet,
    ) -> Vec<Result<RunReport, RunError>> {
        graphs
            .iter_mut()
            .map(|g| self.run(registry, id, g, params))
            .collect()
    }

    /// Run `id` over independent graphs on the rayon pool.
    ///
    /// Every graph gets its own result; a failure never stops the rest.
    /// Results keep the input order.
    #[cfg(feature = "parallel")]
    pub fn run_batch(
        &self,
        registry: &TransformerRegistry,
        id: &str,
        graphs: &mut [Graph],
        params: &ParameterSet,
    ) -> Vec<Result<RunReport, RunError>> {
        use rayon::prelude::*;

        graphs
            .par_iter_mut()
            .map(|g| self.run(registry, id, g, params))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agraph_core::model::{Anchor, Annotation, Schema};
    use assert_matches::assert_matches;

    use crate::spec::{ParameterKind, ParameterSpec, PluginSpec};
    use crate::transform::TransformResult;

    /// Relabels every participant, then optionally fails or breaks an anchor.
    struct Relabel;

    impl Transformer for Relabel {
        fn spec(&self) -> PluginSpec {
            PluginSpec::new("test.relabel", "Relabel", "0.1.0")
                .parameter(ParameterSpec::new("label", ParameterKind::String).required())
                .parameter(ParameterSpec::new("fail", ParameterKind::Boolean).default_value(false))
                .parameter(ParameterSpec::new("break", ParameterKind::Boolean).default_value(false))
        }

        fn transform(&self, graph: &mut Graph, ctx: &TransformContext<'_>) -> TransformResult<Vec<String>> {
            let label = ctx.require_str("label")?;
            let ids: Vec<String> = graph.all("participant").iter().map(|a| a.id.clone()).collect();
            for id in &ids {
                graph.set_label(id, label)?;
            }
            if ctx.params.get_bool("break") == Some(true) {
                graph.set_anchor_offset("a0", Some(5.0))?;
            }
            if ctx.params.get_bool("fail") == Some(true) {
                return Err(TransformError::failed("asked to fail"));
            }
            Ok(vec![format!("{} relabelled", ids.len())])
        }
    }

    fn graph() -> Graph {
        let mut g = Graph::new("g", Schema::default_transcript());
        g.add_anchor(Anchor::at("a0", 0.0)).unwrap();
        g.add_anchor(Anchor::at("a1", 1.0)).unwrap();
        g.add_annotation(Annotation::new("p", "participant", "Ann", "a0", "a1"))
            .unwrap();
        g.add_annotation(Annotation::new("t", "turn", "Ann", "a0", "a1").with_parent("p"))
            .unwrap();
        g.commit();
        g
    }

    #[test]
    fn success_commits() {
        let mut g = graph();
        let report = TransformRunner::default()
            .run_with(&Relabel, &mut g, &ParameterSet::new().with("label", "Bob"))
            .unwrap();
        assert_eq!(g.get_annotation("p").unwrap().label, "Bob");
        assert!(!g.has_pending_changes());
        assert_eq!(report.changes, 1);
        assert_eq!(report.warnings().collect::<Vec<_>>(), vec!["1 relabelled"]);
    }

    #[test]
    fn failure_rolls_back_and_keeps_partial_graph() {
        let mut g = graph();
        let params = ParameterSet::new().with("label", "Bob").with("fail", true);
        let err = TransformRunner::default()
            .run_with(&Relabel, &mut g, &params)
            .unwrap_err();
        assert_matches!(&err, RunError::TransformationFailed { partial, .. }
            if partial.get_annotation("p").unwrap().label == "Bob");
        assert_eq!(g.get_annotation("p").unwrap().label, "Ann");
    }

    #[test]
    fn validation_errors_roll_back_only_when_fatal() {
        let params = ParameterSet::new().with("label", "Bob").with("break", true);

        let mut g = graph();
        let report = TransformRunner::default()
            .run_with(&Relabel, &mut g, &params)
            .unwrap();
        assert!(report.has_errors());
        assert_eq!(g.offset_of("a0"), Some(5.0));

        let mut g = graph();
        let err = TransformRunner::default()
            .fail_on_validation_errors(true)
            .run_with(&Relabel, &mut g, &params)
            .unwrap_err();
        assert_matches!(err, RunError::ValidationFailed { errors, .. } if errors > 0);
        assert_eq!(g.offset_of("a0"), Some(0.0));
        assert_eq!(g.get_annotation("p").unwrap().label, "Ann");
    }

    #[test]
    fn bad_parameters_never_touch_the_graph() {
        let mut g = graph();
        let err = TransformRunner::default()
            .run_with(&Relabel, &mut g, &ParameterSet::new())
            .unwrap_err();
        assert_matches!(err, RunError::InvalidConfiguration(_));
    }
}
