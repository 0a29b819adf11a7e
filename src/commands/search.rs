//! Search and logo command handlers.

use super::{OutputFormat, open_engine};
use anyhow::Context;
use marksearch::{MarksearchConfig, SearchRequest, TrademarkId, TrademarkSummary};
use std::path::PathBuf;

/// Search command.
///
/// The index lives in memory, so an image search first rebuilds it from the
/// store.
pub async fn cmd_search(
    config: &MarksearchConfig,
    words: Option<String>,
    class_filter: Option<String>,
    image: Option<PathBuf>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let engine = open_engine(config)?;

    let mut request = SearchRequest::new();
    if let Some(words) = words {
        request = request.with_words(words);
    }
    if let Some(class_filter) = class_filter {
        request = request.with_class_filter(class_filter);
    }
    if let Some(path) = image {
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read image {}", path.display()))?;
        request = request.with_image(bytes);
        engine.builder().rebuild_async().await?;
    }

    let results = engine.coordinator().search(request).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Table => print_table(&results),
    }
    Ok(())
}

fn print_table(results: &[TrademarkSummary]) {
    if results.is_empty() {
        println!("No matching trademarks.");
        return;
    }

    println!(
        "{:>6}  {:<14}  {:<10}  {:<10}  {:<24}  DESCRIPTION",
        "ID", "SERIAL", "CLASSES", "REGISTERED", "APPLICANT"
    );
    for row in results {
        let registered = row
            .registration_date
            .map_or_else(|| "-".to_string(), |d| d.to_string());
        println!(
            "{:>6}  {:<14}  {:<10}  {:<10}  {:<24}  {}{}",
            row.id.get(),
            truncate(&row.serial_number, 14),
            truncate(&row.class_indices, 10),
            registered,
            truncate(&row.applicant_name, 24),
            truncate(&row.description, 48),
            if row.has_logo { "  [logo]" } else { "" }
        );
    }
    println!();
    println!("{} result(s)", results.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// Logo command.
pub async fn cmd_logo(config: &MarksearchConfig, id: i64, output: PathBuf) -> anyhow::Result<()> {
    let engine = open_engine(config)?;
    let bytes = engine.coordinator().fetch_logo(TrademarkId::new(id)).await?;
    std::fs::write(&output, &bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "Wrote {} bytes ({}) to {}",
        bytes.len(),
        marksearch::embedding::sniff_mime_type(&bytes).unwrap_or("unknown type"),
        output.display()
    );
    Ok(())
}
