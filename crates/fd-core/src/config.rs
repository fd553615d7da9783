use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DiagramLimits, FontMetricsConfig, FontPreset, ParseWarning, Span, WarningCode};

/// Spacing and effort knobs for the layout engines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutSettings {
    /// Gap between neighbouring nodes in one rank.
    pub node_spacing: f32,
    /// Gap between consecutive ranks.
    pub rank_spacing: f32,
    pub cluster_padding: f32,
    /// Margin around the whole diagram.
    pub diagram_padding: f32,
    pub crossing_sweeps: usize,
    pub transpose_passes: usize,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            node_spacing: 48.0,
            rank_spacing: 72.0,
            cluster_padding: 24.0,
            diagram_padding: 16.0,
            crossing_sweeps: 4,
            transpose_passes: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DiagramConfig {
    pub limits: DiagramLimits,
    pub font: FontMetricsConfig,
    pub layout: LayoutSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConfigError {
    pub field: String,
    pub value: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ConfigParse {
    pub config: DiagramConfig,
    pub warnings: Vec<ParseWarning>,
    pub errors: Vec<ConfigError>,
}

/// Reads a host configuration object key by key.
///
/// Invalid values keep their defaults and are reported in `errors`; unknown
/// keys are reported in `warnings`.
#[must_use]
pub fn parse_config_value(value: &Value) -> ConfigParse {
    let mut parsed = ConfigParse::default();
    let Some(root) = value.as_object() else {
        parsed.errors.push(ConfigError {
            field: "$".to_string(),
            value: value.to_string(),
            message: "diagram config root must be a JSON object".to_string(),
        });
        return parsed;
    };

    for (key, raw_value) in root {
        match key.as_str() {
            "limits" => parse_limits(raw_value, &mut parsed),
            "font" => parse_font(raw_value, &mut parsed),
            "layout" => parse_layout(raw_value, &mut parsed),
            other => push_warning(&mut parsed, format!("Unknown config key '{other}' ignored")),
        }
    }

    parsed
}

#[must_use]
pub fn parse_config_json(text: &str) -> ConfigParse {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => parse_config_value(&value),
        Err(error) => ConfigParse {
            errors: vec![ConfigError {
                field: "$".to_string(),
                value: String::new(),
                message: format!("invalid JSON: {error}"),
            }],
            ..ConfigParse::default()
        },
    }
}

fn parse_limits(value: &Value, parsed: &mut ConfigParse) {
    let Some(obj) = value.as_object() else {
        push_type_error(parsed, "limits", value, "must be an object");
        return;
    };

    for (key, raw_value) in obj {
        if !matches!(
            key.as_str(),
            "maxSourceBytes" | "maxNodes" | "maxEdges" | "maxEvents"
        ) {
            push_warning(parsed, format!("Unknown limits key '{key}' ignored"));
            continue;
        }
        let Some(limit) = raw_value.as_u64().and_then(|n| usize::try_from(n).ok()) else {
            push_type_error(
                parsed,
                &format!("limits.{key}"),
                raw_value,
                "must be a non-negative integer",
            );
            continue;
        };
        let limits = &mut parsed.config.limits;
        match key.as_str() {
            "maxSourceBytes" => limits.max_source_bytes = limit,
            "maxNodes" => limits.max_nodes = limit,
            "maxEdges" => limits.max_edges = limit,
            _ => limits.max_events = limit,
        }
    }
}

fn parse_font(value: &Value, parsed: &mut ConfigParse) {
    let Some(obj) = value.as_object() else {
        push_type_error(parsed, "font", value, "must be an object");
        return;
    };

    for (key, raw_value) in obj {
        match key.as_str() {
            "family" => {
                if let Some(family) = raw_value.as_str() {
                    parsed.config.font.preset = FontPreset::from_family(family);
                } else {
                    push_type_error(parsed, "font.family", raw_value, "must be a string");
                }
            }
            "size" => {
                if let Some(size) = positive_f32(raw_value) {
                    parsed.config.font.font_size = size;
                } else {
                    push_type_error(parsed, "font.size", raw_value, "must be a positive number");
                }
            }
            "lineHeight" => {
                if let Some(line_height) = positive_f32(raw_value) {
                    parsed.config.font.line_height = line_height;
                } else {
                    push_type_error(
                        parsed,
                        "font.lineHeight",
                        raw_value,
                        "must be a positive number",
                    );
                }
            }
            other => push_warning(parsed, format!("Unknown font key '{other}' ignored")),
        }
    }
}

fn parse_layout(value: &Value, parsed: &mut ConfigParse) {
    let Some(obj) = value.as_object() else {
        push_type_error(parsed, "layout", value, "must be an object");
        return;
    };

    for (key, raw_value) in obj {
        match key.as_str() {
            "nodeSpacing" | "rankSpacing" | "clusterPadding" | "diagramPadding" => {
                let Some(spacing) = raw_value.as_f64().filter(|n| n.is_finite() && *n >= 0.0)
                else {
                    push_type_error(
                        parsed,
                        &format!("layout.{key}"),
                        raw_value,
                        "must be a non-negative number",
                    );
                    continue;
                };
                let layout = &mut parsed.config.layout;
                let slot = match key.as_str() {
                    "nodeSpacing" => &mut layout.node_spacing,
                    "rankSpacing" => &mut layout.rank_spacing,
                    "clusterPadding" => &mut layout.cluster_padding,
                    _ => &mut layout.diagram_padding,
                };
                *slot = spacing as f32;
            }
            "crossingSweeps" | "transposePasses" => {
                let Some(passes) = raw_value.as_u64().and_then(|n| usize::try_from(n).ok())
                else {
                    push_type_error(
                        parsed,
                        &format!("layout.{key}"),
                        raw_value,
                        "must be a non-negative integer",
                    );
                    continue;
                };
                if key == "crossingSweeps" {
                    parsed.config.layout.crossing_sweeps = passes;
                } else {
                    parsed.config.layout.transpose_passes = passes;
                }
            }
            other => push_warning(parsed, format!("Unknown layout key '{other}' ignored")),
        }
    }
}

fn positive_f32(value: &Value) -> Option<f32> {
    value
        .as_f64()
        .filter(|n| n.is_finite() && *n > 0.0)
        .map(|n| n as f32)
}

fn push_type_error(parsed: &mut ConfigParse, field: &str, value: &Value, message: &str) {
    parsed.errors.push(ConfigError {
        field: field.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    });
}

fn push_warning(parsed: &mut ConfigParse, message: String) {
    parsed.warnings.push(ParseWarning {
        code: WarningCode::Config,
        message,
        span: Span::default(),
    });
}
