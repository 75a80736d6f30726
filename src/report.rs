use std::fmt::Write;

use crate::model::{LogSegment, VersionResult};

const DIVIDER_WIDTH: usize = 110;
const SEGMENT_FOOTER: &str = "--------------------------------------------";

pub fn info_report(results: &[VersionResult]) -> String {
    let mut out = String::from("*Kubernetes Pod Information*\n```");
    push_row(&mut out, "Pod Name", "Pod IP", "Uptime", "Version");
    out.push_str(&"-".repeat(DIVIDER_WIDTH));
    out.push('\n');

    if results.is_empty() {
        push_row(&mut out, "No pods were found.", "", "N/A", "N/A");
    }
    for result in results {
        let endpoint = &result.endpoint;
        push_row(
            &mut out,
            &endpoint.name,
            &endpoint.ip,
            &endpoint.uptime,
            &result.version.to_string(),
        );
    }

    out.push_str("```");
    out
}

fn push_row(out: &mut String, name: &str, ip: &str, uptime: &str, version: &str) {
    let _ = writeln!(out, "{name:<35} {ip:<16} {uptime:<20} {version:<15}");
}

pub fn log_report(service: &str, segments: &[LogSegment]) -> String {
    let mut out = format!("*Service Logs for {service}. Sensitive data will be censored*\n```");
    for segment in segments {
        let _ = write!(
            out,
            "\n---- Logs from Pod: {} ----\n{}\n{SEGMENT_FOOTER}\n",
            segment.pod_name, segment.text
        );
    }
    out.push_str("```");
    out
}
