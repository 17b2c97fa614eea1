use super::*;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use super::html::HtmlGenerator;

pub struct Reporter {
    output_path: String,
    /// Present for HTML output; JSON is serialized directly.
    html: Option<HtmlGenerator>,
}

impl Reporter {
    /// Validates the destination and template up front so a bad path fails
    /// before any remote work is done.
    pub fn new(format: OutputFormat, output_path: &str, template: Option<&Path>) -> Result<Self> {
        let output_path = super::add_file_extension(output_path, &format);

        if let Some(parent) = Path::new(&output_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("Output directory {} does not exist", parent.display());
            }
        }

        let html = match format {
            OutputFormat::Html => Some(HtmlGenerator::new(template)?),
            OutputFormat::Json => None,
        };

        Ok(Self { output_path, html })
    }

    pub fn output_path(&self) -> &str {
        &self.output_path
    }

    pub async fn generate_report(&mut self, report: &Report) -> Result<()> {
        let content = match self.html.as_mut() {
            Some(generator) => generator.generate(report).await?,
            None => serde_json::to_string_pretty(report)?,
        };

        fs::write(&self.output_path, content)
            .with_context(|| format!("Failed to write report to {}", self.output_path))?;
        info!("Report saved to {}", self.output_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::{sample_metrics, settings, window};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_overwrites_existing_report() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("metrics");
        let target = dir.path().join("metrics.html");
        fs::write(&target, "stale").unwrap();

        let report = Report::build(&sample_metrics(), &settings(), &window());
        let mut reporter = Reporter::new(OutputFormat::Html, base.to_str().unwrap(), None).unwrap();
        assert_eq!(reporter.output_path(), target.to_str().unwrap());
        reporter.generate_report(&report).await.unwrap();

        let written = fs::read_to_string(&target).unwrap();
        assert!(written.starts_with("<!DOCTYPE html>"));
        assert!(!written.contains("stale"));
    }

    #[tokio::test]
    async fn test_json_report() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("team.json");

        let report = Report::build(&sample_metrics(), &settings(), &window());
        let mut reporter = Reporter::new(OutputFormat::Json, base.to_str().unwrap(), None).unwrap();
        reporter.generate_report(&report).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&base).unwrap()).unwrap();
        assert_eq!(json["rows"][0]["user"], "amy");
        assert_eq!(json["rows"][0]["score"], 410);
        assert_eq!(json["metric"], "all");
        assert_eq!(json["organization"], "acme");
    }

    #[test]
    fn test_missing_output_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("missing").join("metrics");
        let err = Reporter::new(OutputFormat::Html, base.to_str().unwrap(), None)
            .err()
            .unwrap();
        assert!(err.to_string().contains("does not exist"));
    }
}
