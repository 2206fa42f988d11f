//! Compress command implementation.

use crate::utils::format_seconds;
use lzscope_lzma2::{CompressionReport, Container, ParameterSet, measure};
use serde::Serialize;
use std::path::Path;

/// Options for the compress command.
pub struct CompressOptions<'a> {
    pub params: ParameterSet,
    pub container: Container,
    pub increment: Option<usize>,
    pub output: Option<&'a Path>,
    pub json: bool,
    pub details: bool,
    pub time: bool,
}

#[derive(Debug, Serialize)]
struct SummaryJson {
    original_size: u64,
    compressed_size: u64,
    compression_ratio: f64,
    space_savings: f64,
    container: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<DetailsJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compression_time: Option<f64>,
}

#[derive(Debug, Serialize)]
struct DetailsJson {
    level: u8,
    dict_size_kib: u32,
    lc: u32,
    lp: u32,
    pb: u32,
    mode: &'static str,
    match_finder: &'static str,
    nice_len: u32,
    depth: u32,
    compressed_chunks: u64,
    uncompressed_chunks: u64,
}

pub fn cmd_compress(data: &[u8], options: &CompressOptions) -> Result<(), Box<dyn std::error::Error>> {
    let measurement = measure(options.params, options.container, data, options.increment)?;

    if let Some(path) = options.output {
        std::fs::write(path, &measurement.output)?;
        log::debug!("wrote {} bytes to {}", measurement.output.len(), path.display());
    }

    if options.json {
        let summary = summary_json(&measurement.report, options);
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary_text(&measurement.report, options));
    }

    Ok(())
}

fn summary_json(report: &CompressionReport, options: &CompressOptions) -> SummaryJson {
    let params = &options.params;
    SummaryJson {
        original_size: report.original_size,
        compressed_size: report.compressed_size,
        compression_ratio: report.compression_ratio(),
        space_savings: report.space_savings(),
        container: options.container.name(),
        details: options.details.then(|| DetailsJson {
            level: params.level,
            dict_size_kib: params.dict_size / 1024,
            lc: params.lc,
            lp: params.lp,
            pb: params.pb,
            mode: params.mode.name(),
            match_finder: params.match_finder.name(),
            nice_len: params.nice_len,
            depth: params.effective_depth(),
            compressed_chunks: report.chunks.compressed,
            uncompressed_chunks: report.chunks.uncompressed,
        }),
        compression_time: options.time.then(|| report.elapsed.as_secs_f64()),
    }
}

fn summary_text(report: &CompressionReport, options: &CompressOptions) -> String {
    let params = &options.params;
    let mut text = format!(
        "Original Size: {} bytes\nCompressed Size: {} bytes\nCompression Ratio: {:.2}\n",
        report.original_size,
        report.compressed_size,
        report.compression_ratio()
    );
    if options.details {
        text.push_str(&format!(
            "Dictionary Size: {} KB\n\
             Literal Context Bits (lc): {}\n\
             Literal Position Bits (lp): {}\n\
             Position Bits (pb): {}\n\
             Match Finder: {} ({}, nice {}, depth {})\n\
             Chunks: {} compressed, {} uncompressed\n",
            params.dict_size / 1024,
            params.lc,
            params.lp,
            params.pb,
            params.match_finder,
            params.mode,
            params.nice_len,
            params.effective_depth(),
            report.chunks.compressed,
            report.chunks.uncompressed,
        ));
    }
    if options.time {
        text.push_str(&format!(
            "\nCompression Time: {} seconds\n",
            format_seconds(report.elapsed)
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use lzscope_lzma2::CheckType;

    fn options(details: bool, time: bool) -> CompressOptions<'static> {
        CompressOptions {
            params: ParameterSet::default().dict_size(32 * 1024),
            container: Container::Xz(CheckType::Crc64),
            increment: None,
            output: None,
            json: false,
            details,
            time,
        }
    }

    #[test]
    fn test_summary_text_sections() {
        let data = b"Hello, LZMA! This is a compression test.";
        let opts = options(true, false);
        let report = measure(opts.params, opts.container, data, None).unwrap().report;
        let text = summary_text(&report, &opts);
        assert!(text.starts_with("Original Size: 40 bytes\n"));
        assert!(text.contains("Dictionary Size: 32 KB\n"));
        assert!(text.contains("Literal Context Bits (lc): 3\n"));
        assert!(!text.contains("Compression Time"));

        let opts = options(false, true);
        let text = summary_text(&report, &opts);
        assert!(!text.contains("Dictionary Size"));
        assert!(text.contains("Compression Time: "));
    }

    #[test]
    fn test_summary_json_fields() {
        let data = vec![b'A'; 10_000];
        let opts = options(true, true);
        let report = measure(opts.params, opts.container, &data, None).unwrap().report;
        let value = serde_json::to_value(summary_json(&report, &opts)).unwrap();
        assert_eq!(value["original_size"], 10_000);
        assert_eq!(value["container"], "xz");
        assert_eq!(value["details"]["dict_size_kib"], 32);
        assert!(value["compression_time"].is_number());

        let opts = options(false, false);
        let value = serde_json::to_value(summary_json(&report, &opts)).unwrap();
        assert!(value.get("details").is_none());
        assert!(value.get("compression_time").is_none());
    }
}
