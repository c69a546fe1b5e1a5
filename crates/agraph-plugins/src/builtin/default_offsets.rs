//! Built-in `default_offsets` transformer.
//!
//! Wraps `DefaultOffsetGenerator`. Anchors it cannot bound come back as
//! run warnings rather than errors.

use agraph_core::config::{validate_config, CoreConfig, OffsetConfig};
use agraph_core::graph::Graph;
use agraph_core::model::Confidence;
use agraph_core::offsets::DefaultOffsetGenerator;
use agraph_core::AgError;

use crate::spec::{ParameterKind, ParameterSpec, PluginSpec};
use crate::transform::{TransformContext, TransformError, TransformResult, Transformer};

pub const ID: &str = "builtin.default_offsets";

pub struct DefaultOffsets;

impl Transformer for DefaultOffsets {
    fn spec(&self) -> PluginSpec {
        PluginSpec::new(ID, "Default Offset Generator", "0.1.0")
            .description("Interpolate offsets for anchors that have none")
            .parameter(confidence_parameter(
                "bound_confidence",
                "Anchors at or above this confidence are never moved",
            ))
            .parameter(confidence_parameter(
                "generated_confidence",
                "Confidence stamped on interpolated offsets",
            ))
            .meta("category", "alignment")
    }

    fn transform(&self, graph: &mut Graph, ctx: &TransformContext<'_>) -> TransformResult<Vec<String>> {
        let mut config = OffsetConfig::default();
        if let Some(c) = ctx.params.get_str("bound_confidence") {
            config.bound_confidence = parse_confidence(c)?;
        }
        if let Some(c) = ctx.params.get_str("generated_confidence") {
            config.generated_confidence = parse_confidence(c)?;
        }
        validate_config(&CoreConfig {
            offsets: config.clone(),
            ..CoreConfig::default()
        })
        .map_err(|e| match e {
            AgError::InvalidConfiguration(msg) => TransformError::InvalidConfiguration(msg),
            other => other.into(),
        })?;

        ctx.check_cancelled()?;
        let report = DefaultOffsetGenerator::new(config).transform(graph)?;
        tracing::debug!(graph = %graph.id, generated = report.generated, "default offsets");
        Ok(report.warnings)
    }
}

fn confidence_parameter(name: &str, hint: &str) -> ParameterSpec {
    ParameterSpec::new(name, ParameterKind::String)
        .default_value("default")
        .possible("default")
        .possible("automatic")
        .possible("manual")
        .hint(hint)
}

fn parse_confidence(s: &str) -> TransformResult<Confidence> {
    match s {
        "unknown" => Ok(Confidence::Unknown),
        "default" => Ok(Confidence::Default),
        "automatic" => Ok(Confidence::Automatic),
        "manual" => Ok(Confidence::Manual),
        other => Err(TransformError::invalid_configuration(format!(
            "unknown confidence: {other}"
        ))),
    }
}
