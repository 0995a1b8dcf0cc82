// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Integration-test harness: configures the reporter, recovers any pending
//! raw log, installs handlers, then hurts the process in the requested way.
//!
//! Usage: crashreporter-test <crash-type> <report-dir>
//!
//! For the crashing keywords the expected outcome is death by the chosen
//! signal (and a pending raw log in the report directory for the next run);
//! `manual` and `raw_report_segfault` exit 0.

#[cfg(not(unix))]
fn main() {}

#[cfg(unix)]
fn main() -> std::process::ExitCode {
    use std::path::Path;
    use std::process::ExitCode;

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let (crash_type, report_dir) = match (args.get(1), args.get(2)) {
        (Some(crash_type), Some(report_dir)) => (crash_type.as_str(), Path::new(report_dir)),
        _ => {
            eprintln!(
                "usage: {} <segfault|abort|fpe|sigill|bus-error|manual|raw_report_segfault> <report-dir>",
                args.first().map(String::as_str).unwrap_or("crashreporter-test")
            );
            return ExitCode::FAILURE;
        }
    };

    datadog_crashreporter::configure(
        "CrashReporterTest",
        env!("CARGO_PKG_VERSION"),
        None,
        Some(report_dir),
    );
    if let Some(recovered) = datadog_crashreporter::process_pending_raw_crash_report() {
        println!("recovered: {}", recovered.display());
    }
    if !datadog_crashreporter::install_handlers() {
        eprintln!("failed to install crash handlers");
        return ExitCode::FAILURE;
    }

    match crash_type {
        "segfault" | "sigsegv" => {
            // SAFETY: deliberately not. The null read is the test.
            let value = unsafe { std::ptr::null::<u32>().read_volatile() };
            println!("unexpectedly survived a null read: {value}");
            ExitCode::FAILURE
        }
        "abort" | "sigabrt" => std::process::abort(),
        "floating-point-exception" | "fpe" | "sigfpe" => raise_and_fail(libc::SIGFPE),
        "illegal-instruction" | "sigill" => raise_and_fail(libc::SIGILL),
        "bus-error" | "sigbus" => raise_and_fail(libc::SIGBUS),
        "manual" => match datadog_crashreporter::write_crash_report(Some("Manual crash report")) {
            Some(path) => {
                println!("report: {}", path.display());
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("failed to write a manual crash report");
                ExitCode::FAILURE
            }
        },
        "raw_report_segfault" => {
            // Fabricate the signal-phase record without dying; the next run
            // of this harness recovers it.
            if datadog_crashreporter::write_raw_crash_record(libc::SIGSEGV) {
                println!("raw record written to {}", report_dir.display());
                ExitCode::SUCCESS
            } else {
                eprintln!("failed to write a raw crash record");
                ExitCode::FAILURE
            }
        }
        other => {
            eprintln!("unknown crash type: {other}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(unix)]
fn raise_and_fail(signal: i32) -> std::process::ExitCode {
    // SAFETY: raise(2) has no preconditions.
    unsafe { libc::raise(signal) };
    eprintln!("unexpectedly survived signal {signal}");
    std::process::ExitCode::FAILURE
}
