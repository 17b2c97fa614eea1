use super::*;
use anyhow::{Context as _, Result};
use rust_embed::RustEmbed;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tera::{Context, Tera};

#[derive(RustEmbed)]
#[folder = "src/output/templates/"]
#[include = "*.html"]
struct Templates;

#[derive(RustEmbed)]
#[folder = "src/output/assets/"]
#[include = "*.css"]
struct Assets;

const REPORT_TEMPLATE: &str = "report.html";

pub struct HtmlGenerator {
    tera: Tera,
}

impl HtmlGenerator {
    /// Load the embedded templates, replacing the report template with
    /// `template_override` when given.
    pub fn new(template_override: Option<&Path>) -> Result<Self> {
        let mut tera = Tera::default();

        for file in Templates::iter() {
            let template_name = file.as_ref();
            let template_content = Templates::get(template_name)
                .ok_or_else(|| anyhow::anyhow!("Template {} not found", template_name))?;
            let template_str = std::str::from_utf8(&template_content.data)
                .map_err(|e| anyhow::anyhow!("Invalid UTF-8 in template {}: {}", template_name, e))?;

            tera.add_raw_template(template_name, template_str)
                .map_err(|e| anyhow::anyhow!("Failed to add template {}: {}", template_name, e))?;
        }

        if let Some(path) = template_override {
            let template_str = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read template {}", path.display()))?;
            tera.add_raw_template(REPORT_TEMPLATE, &template_str)
                .map_err(|e| anyhow::anyhow!("Failed to add template {}: {}", path.display(), e))?;
        }

        tera.register_filter("hours", Self::hours_filter);
        tera.register_filter("rank_class", Self::rank_class_filter);

        Ok(Self { tera })
    }

    fn load_asset(&self, filename: &str) -> Result<String> {
        let asset = Assets::get(filename)
            .ok_or_else(|| anyhow::anyhow!("Asset {} not found", filename))?;
        let content = std::str::from_utf8(&asset.data)
            .map_err(|e| anyhow::anyhow!("Invalid UTF-8 in asset {}: {}", filename, e))?;
        Ok(content.to_string())
    }

    fn hours_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
        let hours = value.as_f64().unwrap_or(0.0);
        Ok(Value::String(format!("{:.2}", hours)))
    }

    fn rank_class_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
        let class = match value.as_u64().unwrap_or(0) {
            1 => "rank-gold",
            2 => "rank-silver",
            3 => "rank-bronze",
            _ => "rank-other",
        };
        Ok(Value::String(class.to_string()))
    }

    fn prepare_template_context(&self, report: &Report) -> Result<Context> {
        let mut context = Context::new();

        context.insert("css_content", &self.load_asset("styles.css")?);
        context.insert(
            "generated_date",
            &report.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
        context.insert("created_since", &report.since);
        context.insert("days", &report.days);
        context.insert("organization", &report.organization);
        context.insert("metric", &report.metric);
        context.insert("rows", &report.rows);
        context.insert("total_score", &report.rows.iter().map(|r| r.score).sum::<u64>());

        Ok(context)
    }
}

impl OutputGenerator for HtmlGenerator {
    async fn generate(&mut self, report: &Report) -> Result<String> {
        let context = self.prepare_template_context(report)?;
        let html = self.tera.render(REPORT_TEMPLATE, &context)?;
        Ok(html)
    }
}
