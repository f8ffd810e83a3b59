//! Operator-facing summaries printed on success

use std::fmt::Write;

use veil_node::{HostReport, PublishReceipt, RetrieveReport};

/// Summary of a publish, including the key to hand to the recipient
pub fn publish_summary(receipt: &PublishReceipt) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Published {}", receipt.name);
    let _ = writeln!(out, "  artifact:    {}", receipt.artifact_path.display());
    if let Some(path) = &receipt.descriptor_path {
        let _ = writeln!(out, "  descriptor:  {}", path.display());
    }
    let _ = writeln!(out, "  content id:  {}", receipt.content_id);
    let _ = writeln!(
        out,
        "  pieces:      {} ({} bytes)",
        receipt.piece_count, receipt.total_length
    );
    let _ = writeln!(out, "  recipient:   {}", receipt.recipient_id);
    let _ = writeln!(out, "  key:         {}", receipt.key_hex());
    out
}

pub fn host_summary(report: &HostReport) -> String {
    format!(
        "Stopped hosting {} from {} ({} of {} bytes present)\n",
        report.name,
        report.data_dir.display(),
        report.progress.bytes_transferred,
        report.progress.total_bytes
    )
}

pub fn retrieve_summary(report: &RetrieveReport) -> String {
    format!(
        "Retrieved {} ({} bytes, {} pieces) into {}\n",
        report.descriptor.name,
        report.progress.total_bytes,
        report.descriptor.piece_count(),
        report.content_path.display()
    )
}
