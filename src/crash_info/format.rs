// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The three on-disk report encodings. Formatting is pure: everything comes
//! from the [CrashReport] value, nothing from ambient state.

use super::CrashReport;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Fixed human-readable signal-name table.
pub fn signal_name(signal: i32) -> String {
    match signal {
        libc::SIGABRT => "SIGABRT (Abort)".to_string(),
        libc::SIGILL => "SIGILL (Illegal Instruction)".to_string(),
        libc::SIGSEGV => "SIGSEGV (Segmentation Violation)".to_string(),
        libc::SIGFPE => "SIGFPE (Floating Point Exception)".to_string(),
        libc::SIGBUS => "SIGBUS (Bus Error)".to_string(),
        libc::SIGPIPE => "SIGPIPE (Broken Pipe)".to_string(),
        other => format!("Signal {other}"),
    }
}

pub(crate) fn to_plain_text(report: &CrashReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "CRASH REPORT");
    let _ = writeln!(out, "============");
    let _ = writeln!(out, "Date: {}", report.timestamp.format(TIMESTAMP_FORMAT));
    if let Some(signal) = report.signal {
        let _ = writeln!(out, "Signal: {signal} ({})", signal_name(signal));
    }
    if let Some(reason) = &report.reason {
        let _ = writeln!(out, "Reason: {reason}");
    }

    section(&mut out, "APPLICATION INFORMATION");
    let _ = writeln!(out, "Name: {}", report.app_info.name);
    let _ = writeln!(out, "Version: {}", report.app_info.version);
    let _ = writeln!(out, "Path: {}", report.app_info.executable_path);

    section(&mut out, "SYSTEM INFORMATION");
    let _ = writeln!(out, "CPU Architecture: {}", report.system_info.cpu_architecture);
    let _ = writeln!(out, "OS Name: {}", report.system_info.os_name);
    let _ = writeln!(out, "OS Version: {}", report.system_info.os_version);
    let _ = writeln!(out, "Kernel Version: {}", report.system_info.kernel_version);
    for (key, value) in &report.system_info.additional_info {
        let _ = writeln!(out, "{key}: {value}");
    }

    section(&mut out, "THREAD INFORMATION");
    let _ = writeln!(out, "Current Thread ID: {}", report.thread_info.current_thread_id);
    let _ = writeln!(out, "Thread Count: {}", report.thread_info.thread_count);
    if !report.thread_info.details.is_empty() {
        let _ = writeln!(out, "{}", report.thread_info.details.trim_end());
    }

    section(&mut out, "STACK TRACE");
    for (index, frame) in report.stacktrace.frames.iter().enumerate() {
        let symbol = frame.symbol_name.as_deref().unwrap_or("<unknown symbol>");
        let _ = writeln!(out, "[{index}] {symbol} - {}", frame.address);
    }

    out
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "-".repeat(title.len()));
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    timestamp: String,
    signal: Option<i32>,
    signal_name: Option<String>,
    reason: Option<&'a str>,
    application_info: JsonApplicationInfo<'a>,
    system_info: JsonSystemInfo<'a>,
    thread_info: JsonThreadInfo<'a>,
    stack_trace: Vec<JsonFrame<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonApplicationInfo<'a> {
    name: &'a str,
    version: &'a str,
    path: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonSystemInfo<'a> {
    cpu_architecture: &'a str,
    os_name: &'a str,
    os_version: &'a str,
    kernel_version: &'a str,
    additional_info: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonThreadInfo<'a> {
    #[serde(rename = "currentThreadID")]
    current_thread_id: u64,
    thread_count: u32,
    details: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonFrame<'a> {
    index: usize,
    address: &'a str,
    symbol_name: Option<&'a str>,
    offset: Option<u64>,
    file_name: Option<&'a str>,
    line_number: Option<u32>,
}

pub(crate) fn to_json(report: &CrashReport) -> String {
    let view = JsonReport {
        timestamp: report.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        signal: report.signal,
        signal_name: report.signal.map(signal_name),
        reason: report.reason.as_deref(),
        application_info: JsonApplicationInfo {
            name: &report.app_info.name,
            version: &report.app_info.version,
            path: &report.app_info.executable_path,
        },
        system_info: JsonSystemInfo {
            cpu_architecture: &report.system_info.cpu_architecture,
            os_name: &report.system_info.os_name,
            os_version: &report.system_info.os_version,
            kernel_version: &report.system_info.kernel_version,
            additional_info: &report.system_info.additional_info,
        },
        thread_info: JsonThreadInfo {
            current_thread_id: report.thread_info.current_thread_id,
            thread_count: report.thread_info.thread_count,
            details: &report.thread_info.details,
        },
        stack_trace: report
            .stacktrace
            .frames
            .iter()
            .enumerate()
            .map(|(index, frame)| JsonFrame {
                index,
                address: &frame.address,
                symbol_name: frame.symbol_name.as_deref(),
                offset: frame.offset,
                file_name: frame.file_name.as_deref(),
                line_number: frame.line_number,
            })
            .collect(),
    };
    serde_json::to_string_pretty(&view).unwrap_or_default()
}

pub(crate) fn to_xml(report: &CrashReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    let _ = writeln!(out, "<crashReport>");
    element(&mut out, 1, "timestamp", &report.timestamp.format(TIMESTAMP_FORMAT).to_string());
    element(&mut out, 1, "signal", &report.signal.unwrap_or(0).to_string());
    element(
        &mut out,
        1,
        "signalName",
        &report.signal.map(signal_name).unwrap_or_default(),
    );
    element(&mut out, 1, "reason", report.reason.as_deref().unwrap_or(""));

    let _ = writeln!(out, "  <applicationInfo>");
    element(&mut out, 2, "name", &report.app_info.name);
    element(&mut out, 2, "version", &report.app_info.version);
    element(&mut out, 2, "path", &report.app_info.executable_path);
    let _ = writeln!(out, "  </applicationInfo>");

    let _ = writeln!(out, "  <systemInfo>");
    element(&mut out, 2, "cpuArchitecture", &report.system_info.cpu_architecture);
    element(&mut out, 2, "osName", &report.system_info.os_name);
    element(&mut out, 2, "osVersion", &report.system_info.os_version);
    element(&mut out, 2, "kernelVersion", &report.system_info.kernel_version);
    let mut additional = String::new();
    for (key, value) in &report.system_info.additional_info {
        let _ = writeln!(additional, "{key}: {value}");
    }
    cdata_element(&mut out, 2, "additionalInfo", &additional);
    let _ = writeln!(out, "  </systemInfo>");

    let _ = writeln!(out, "  <threadInfo>");
    element(
        &mut out,
        2,
        "currentThreadID",
        &report.thread_info.current_thread_id.to_string(),
    );
    element(&mut out, 2, "threadCount", &report.thread_info.thread_count.to_string());
    cdata_element(&mut out, 2, "details", &report.thread_info.details);
    let _ = writeln!(out, "  </threadInfo>");

    let _ = writeln!(out, "  <stackTrace>");
    for (index, frame) in report.stacktrace.frames.iter().enumerate() {
        let _ = writeln!(out, "    <frame>");
        element(&mut out, 3, "index", &index.to_string());
        element(&mut out, 3, "address", &frame.address);
        element(&mut out, 3, "symbolName", frame.symbol_name.as_deref().unwrap_or(""));
        element(&mut out, 3, "offset", &frame.offset.unwrap_or(0).to_string());
        element(&mut out, 3, "fileName", frame.file_name.as_deref().unwrap_or(""));
        element(&mut out, 3, "lineNumber", &frame.line_number.unwrap_or(0).to_string());
        let _ = writeln!(out, "    </frame>");
    }
    let _ = writeln!(out, "  </stackTrace>");

    let _ = writeln!(out, "</crashReport>");
    out
}

fn element(out: &mut String, depth: usize, tag: &str, value: &str) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(out, "{indent}<{tag}>{}</{tag}>", xml_escape(value));
}

fn cdata_element(out: &mut String, depth: usize, tag: &str, value: &str) {
    let indent = "  ".repeat(depth);
    // A literal "]]>" inside the content would end the section early.
    let safe = value.replace("]]>", "]]]]><![CDATA[>");
    let _ = writeln!(out, "{indent}<{tag}><![CDATA[{safe}]]></{tag}>");
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::super::{ApplicationInfo, StackFrame, StackTrace, SystemInfo, ThreadInfo};
    use super::*;
    use crate::shared::configuration::ReportFormat;
    use chrono::{Local, TimeZone};

    fn sample_report() -> CrashReport {
        let mut system_info = SystemInfo {
            cpu_architecture: "x86_64".to_string(),
            os_name: "Debian GNU/Linux".to_string(),
            os_version: "12".to_string(),
            kernel_version: "6.1.0".to_string(),
            ..Default::default()
        };
        system_info
            .additional_info
            .insert("CPU Cores".to_string(), "8".to_string());
        CrashReport {
            timestamp: Local.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap(),
            signal: Some(11),
            reason: Some("Test reason".to_string()),
            stacktrace: StackTrace::from_frames(vec![StackFrame {
                address: "0x1000".to_string(),
                symbol_name: Some("testFunction".to_string()),
                offset: Some(10),
                file_name: Some("test.swift".to_string()),
                line_number: Some(42),
            }]),
            thread_info: ThreadInfo {
                current_thread_id: 1234,
                thread_count: 2,
                details: "Thread 1: name=main, state=R (running)".to_string(),
            },
            system_info,
            app_info: ApplicationInfo {
                name: "TestApp".to_string(),
                version: "1.0.0".to_string(),
                executable_path: "/opt/testapp".to_string(),
            },
        }
    }

    #[test]
    fn signal_names() {
        assert_eq!(signal_name(libc::SIGSEGV), "SIGSEGV (Segmentation Violation)");
        assert_eq!(signal_name(libc::SIGABRT), "SIGABRT (Abort)");
        assert_eq!(signal_name(libc::SIGPIPE), "SIGPIPE (Broken Pipe)");
        assert_eq!(signal_name(99), "Signal 99");
    }

    #[test]
    fn plain_text_sections() {
        let text = sample_report().format(ReportFormat::PlainText);
        assert!(text.starts_with("CRASH REPORT\n"));
        assert!(text.contains("Date: 2023-11-14 22:13:20.000"));
        assert!(text.contains("Signal: 11 (SIGSEGV (Segmentation Violation))"));
        assert!(text.contains("Reason: Test reason"));
        assert!(text.contains("APPLICATION INFORMATION"));
        assert!(text.contains("Name: TestApp"));
        assert!(text.contains("Version: 1.0.0"));
        assert!(text.contains("SYSTEM INFORMATION"));
        assert!(text.contains("CPU Architecture: x86_64"));
        assert!(text.contains("OS Name: Debian GNU/Linux"));
        assert!(text.contains("THREAD INFORMATION"));
        assert!(text.contains("Current Thread ID: 1234"));
        assert!(text.contains("STACK TRACE"));
        assert!(text.contains("[0] testFunction - 0x1000"));
    }

    #[test]
    fn plain_text_with_empty_trace_keeps_the_header() {
        let mut report = sample_report();
        report.stacktrace = StackTrace::empty();
        let text = report.format(ReportFormat::PlainText);
        assert!(text.contains("STACK TRACE"));
        assert!(!text.contains("[0]"));
    }

    #[test]
    fn plain_text_renders_missing_symbols_as_unknown() {
        let mut report = sample_report();
        report.stacktrace = StackTrace::from_frames(vec![StackFrame {
            address: "0x2000".to_string(),
            ..Default::default()
        }]);
        let text = report.format(ReportFormat::PlainText);
        assert!(text.contains("[0] <unknown symbol> - 0x2000"));
    }

    #[test]
    fn json_keys_and_values() {
        let json = sample_report().format(ReportFormat::Json);
        assert!(json.contains("\"signal\": 11"));
        assert!(json.contains("\"signalName\": \"SIGSEGV (Segmentation Violation)\""));
        assert!(json.contains("\"symbolName\": \"testFunction\""));
        assert!(json.contains("\"currentThreadID\": 1234"));
        assert!(json.contains("\"offset\": 10"));
        assert!(json.contains("\"lineNumber\": 42"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["applicationInfo"]["name"], "TestApp");
        assert_eq!(value["systemInfo"]["cpuArchitecture"], "x86_64");
        assert_eq!(value["stackTrace"][0]["index"], 0);
    }

    #[test]
    fn json_absent_optionals_are_null() {
        let mut report = sample_report();
        report.signal = None;
        report.reason = None;
        let value: serde_json::Value =
            serde_json::from_str(&report.format(ReportFormat::Json)).unwrap();
        assert!(value["signal"].is_null());
        assert!(value["signalName"].is_null());
        assert!(value["reason"].is_null());
    }

    #[test]
    fn json_escapes_strings() {
        let mut report = sample_report();
        report.reason = Some("quote \" and backslash \\".to_string());
        let json = report.format(ReportFormat::Json);
        assert!(json.contains(r#"quote \" and backslash \\"#));
    }

    #[test]
    fn xml_elements() {
        let xml = sample_report().format(ReportFormat::Xml);
        assert!(xml.contains("<crashReport>"));
        assert!(xml.contains("<signal>11</signal>"));
        assert!(xml.contains("<signalName>SIGSEGV (Segmentation Violation)</signalName>"));
        assert!(xml.contains("<symbolName>testFunction</symbolName>"));
        assert!(xml.contains("<cpuArchitecture>x86_64</cpuArchitecture>"));
        assert!(xml.contains("<currentThreadID>1234</currentThreadID>"));
        assert!(xml.contains("<additionalInfo><![CDATA["));
        assert!(xml.contains("</crashReport>"));
    }

    #[test]
    fn xml_absent_optionals_are_empty_or_zero() {
        let mut report = sample_report();
        report.signal = None;
        report.reason = None;
        report.stacktrace = StackTrace::from_frames(vec![StackFrame {
            address: "0x2000".to_string(),
            ..Default::default()
        }]);
        let xml = report.format(ReportFormat::Xml);
        assert!(xml.contains("<signal>0</signal>"));
        assert!(xml.contains("<signalName></signalName>"));
        assert!(xml.contains("<reason></reason>"));
        assert!(xml.contains("<offset>0</offset>"));
        assert!(xml.contains("<lineNumber>0</lineNumber>"));
    }

    #[test]
    fn xml_escapes_content() {
        let mut report = sample_report();
        report.reason = Some("a < b && c".to_string());
        let xml = report.format(ReportFormat::Xml);
        assert!(xml.contains("<reason>a &lt; b &amp;&amp; c</reason>"));
    }

    #[test]
    fn cdata_split_on_terminator() {
        let mut out = String::new();
        cdata_element(&mut out, 0, "details", "evil ]]> payload");
        assert!(out.contains("<![CDATA[evil ]]]]><![CDATA[> payload]]>"));
    }
}
