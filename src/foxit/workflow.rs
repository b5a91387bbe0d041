//! PDF processing workflow builder.
//!
//! Builds the linear merge → compress → watermark → secure pipeline sent to
//! the PDF services endpoint. Each enabled stage reads the output of the
//! last stage that actually ran; disabled stages are skipped entirely, so
//! the next enabled stage falls back to the prior output (or the original
//! input when nothing has run yet).

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Watermark stage options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatermarkConfig {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<String>,
    pub opacity: Option<f64>,
    pub rotation: Option<f64>,
    pub position: Option<String>,
    pub font_size: Option<u32>,
    pub color: Option<String>,
}

/// Security stage options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    pub password: Option<String>,
    pub permissions: Option<Vec<String>>,
    pub encryption_level: Option<String>,
}

/// Workflow configuration accepted from the API.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    /// Compression is on unless explicitly disabled.
    #[serde(default = "default_compress")]
    pub compress: bool,
    pub compression_level: Option<String>,
    pub image_quality: Option<f64>,
    pub watermark: Option<WatermarkConfig>,
    pub add_security: Option<SecurityConfig>,
}

fn default_compress() -> bool {
    true
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            compress: true,
            compression_level: None,
            image_quality: None,
            watermark: None,
            add_security: None,
        }
    }
}

/// One stage of the workflow payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStage {
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_files: Option<Vec<String>>,
    pub output_file: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub options: serde_json::Value,
}

pub const MERGED_OUTPUT: &str = "merged.pdf";
pub const COMPRESSED_OUTPUT: &str = "compressed.pdf";
pub const WATERMARKED_OUTPUT: &str = "watermarked.pdf";
pub const SECURED_OUTPUT: &str = "secured.pdf";

/// Build the stage list for a workflow run.
///
/// Empty `document_urls` yields no stages; callers validate non-empty input
/// before getting here.
pub fn build_stages(document_urls: &[String], config: &WorkflowConfig) -> Vec<WorkflowStage> {
    let mut stages = Vec::new();
    let Some(first_url) = document_urls.first() else {
        return stages;
    };

    // The file the next enabled stage reads from.
    let mut current_input = first_url.clone();

    if document_urls.len() > 1 {
        stages.push(WorkflowStage {
            action: "merge".to_string(),
            input_file: None,
            input_files: Some(document_urls.to_vec()),
            output_file: MERGED_OUTPUT.to_string(),
            options: serde_json::Value::Null,
        });
        current_input = MERGED_OUTPUT.to_string();
    }

    if config.compress {
        stages.push(WorkflowStage {
            action: "compress".to_string(),
            input_file: Some(current_input.clone()),
            input_files: None,
            output_file: COMPRESSED_OUTPUT.to_string(),
            options: json!({
                "compressionLevel": config.compression_level.as_deref().unwrap_or("high"),
                "imageQuality": config.image_quality.unwrap_or(0.8),
            }),
        });
        current_input = COMPRESSED_OUTPUT.to_string();
    }

    if let Some(watermark) = &config.watermark {
        stages.push(WorkflowStage {
            action: "watermark".to_string(),
            input_file: Some(current_input.clone()),
            input_files: None,
            output_file: WATERMARKED_OUTPUT.to_string(),
            options: json!({
                "type": watermark.kind.as_deref().unwrap_or("text"),
                "text": watermark.text.as_deref().unwrap_or("OnboardIQ"),
                "opacity": watermark.opacity.unwrap_or(0.3),
                "rotation": watermark.rotation.unwrap_or(45.0),
                "position": watermark.position.as_deref().unwrap_or("center"),
                "fontSize": watermark.font_size.unwrap_or(24),
                "color": watermark.color.as_deref().unwrap_or("#000000"),
            }),
        });
        current_input = WATERMARKED_OUTPUT.to_string();
    }

    if let Some(security) = &config.add_security {
        let permissions = security
            .permissions
            .clone()
            .unwrap_or_else(|| vec!["print".to_string(), "copy".to_string()]);
        stages.push(WorkflowStage {
            action: "secure".to_string(),
            input_file: Some(current_input),
            input_files: None,
            output_file: SECURED_OUTPUT.to_string(),
            options: json!({
                "password": security.password,
                "permissions": permissions,
                "encryptionLevel": security.encryption_level.as_deref().unwrap_or("128"),
            }),
        });
    }

    stages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://docs.example.com/{i}.pdf")).collect()
    }

    fn stage_input(stage: &WorkflowStage) -> &str {
        stage.input_file.as_deref().unwrap()
    }

    #[test]
    fn test_full_chain_with_merge() {
        let config = WorkflowConfig {
            compress: true,
            watermark: Some(WatermarkConfig::default()),
            add_security: Some(SecurityConfig::default()),
            ..Default::default()
        };
        let stages = build_stages(&urls(2), &config);

        let actions: Vec<&str> = stages.iter().map(|s| s.action.as_str()).collect();
        assert_eq!(actions, vec!["merge", "compress", "watermark", "secure"]);

        assert_eq!(stage_input(&stages[1]), MERGED_OUTPUT);
        assert_eq!(stage_input(&stages[2]), COMPRESSED_OUTPUT);
        assert_eq!(stage_input(&stages[3]), WATERMARKED_OUTPUT);
        assert_eq!(stages[3].output_file, SECURED_OUTPUT);
    }

    #[test]
    fn test_single_document_skips_merge() {
        let stages = build_stages(&urls(1), &WorkflowConfig::default());
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].action, "compress");
        assert_eq!(stage_input(&stages[0]), "https://docs.example.com/0.pdf");
    }

    #[test]
    fn test_disabled_compress_chains_watermark_to_merge_output() {
        let config = WorkflowConfig {
            compress: false,
            watermark: Some(WatermarkConfig::default()),
            ..Default::default()
        };
        let stages = build_stages(&urls(2), &config);

        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].action, "watermark");
        // Compress never ran, so the watermark reads the merged file.
        assert_eq!(stage_input(&stages[1]), MERGED_OUTPUT);
    }

    #[test]
    fn test_disabled_compress_single_input_chains_to_original() {
        let config = WorkflowConfig {
            compress: false,
            watermark: Some(WatermarkConfig::default()),
            ..Default::default()
        };
        let stages = build_stages(&urls(1), &config);

        assert_eq!(stages.len(), 1);
        assert_eq!(stage_input(&stages[0]), "https://docs.example.com/0.pdf");
    }

    #[test]
    fn test_secure_skips_over_disabled_stages() {
        let config = WorkflowConfig {
            compress: false,
            watermark: None,
            add_security: Some(SecurityConfig::default()),
            ..Default::default()
        };
        let stages = build_stages(&urls(2), &config);

        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].action, "secure");
        assert_eq!(stage_input(&stages[1]), MERGED_OUTPUT);
    }

    #[test]
    fn test_empty_input_builds_nothing() {
        assert!(build_stages(&[], &WorkflowConfig::default()).is_empty());
    }

    #[test]
    fn test_option_defaults() {
        let config = WorkflowConfig {
            watermark: Some(WatermarkConfig::default()),
            add_security: Some(SecurityConfig::default()),
            ..Default::default()
        };
        let stages = build_stages(&urls(1), &config);

        assert_eq!(stages[0].options["compressionLevel"], "high");
        assert_eq!(stages[0].options["imageQuality"], 0.8);
        assert_eq!(stages[1].options["opacity"], 0.3);
        assert_eq!(stages[1].options["rotation"], 45.0);
        assert_eq!(stages[1].options["position"], "center");
        assert_eq!(stages[2].options["encryptionLevel"], "128");
        assert_eq!(stages[2].options["permissions"], json!(["print", "copy"]));
    }

    #[test]
    fn test_stage_serialization_shape() {
        let stages = build_stages(&urls(2), &WorkflowConfig::default());
        let merged = serde_json::to_value(&stages[0]).unwrap();
        assert!(merged.get("inputFiles").is_some());
        assert!(merged.get("inputFile").is_none());
        assert_eq!(merged["outputFile"], MERGED_OUTPUT);
    }
}
