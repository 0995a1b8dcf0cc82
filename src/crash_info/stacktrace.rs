// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Stack-trace model and the best-effort symbolicator.
//!
//! Symbolication runs in the recovery phase only. Every failure mode degrades
//! to a frame that still carries its hex address, so the final report never
//! loses information the raw log had.

use crate::collector::stack_capture::collect_live_backtrace;
use crate::shared::constants::{DD_CRASHREPORT_ADDR2LINE_PATH, DD_CRASHREPORT_ADDR2LINE_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::ffi::CStr;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use symbolic_common::Name;
use symbolic_demangle::{Demangle, DemangleOptions};

const NIL_ADDRESS_TEXT: &str = "0x0 (nil address)";
const NIL_SYMBOL: &str = "<nil address pointer>";
const DLADDR_FAILED_SYMBOL: &str = "<dladdr failed>";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackFrame {
    /// `0x`-prefixed hex rendering of the return address.
    pub address: String,
    pub symbol_name: Option<String>,
    /// Distance from the symbol start, when the address follows it.
    pub offset: Option<u64>,
    /// Module path from the dynamic linker, upgraded to a source file when
    /// the external helper resolves one.
    pub file_name: Option<String>,
    pub line_number: Option<u32>,
}

/// Ordered innermost-first, matching the platform backtrace primitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackTrace {
    pub frames: Vec<StackFrame>,
}

impl StackTrace {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_frames(frames: Vec<StackFrame>) -> Self {
        Self { frames }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

/// Symbolicates a raw address sequence recovered from the raw log.
pub(crate) fn symbolicate_addresses(
    addresses: &[usize],
    include_symbolication: bool,
) -> StackTrace {
    StackTrace::from_frames(
        addresses
            .iter()
            .map(|&address| symbolicate_address(address, include_symbolication))
            .collect(),
    )
}

/// Captures and symbolicates the calling thread's own stack (manual and
/// simulated reports).
pub(crate) fn capture_live_trace(include_symbolication: bool) -> StackTrace {
    symbolicate_addresses(&collect_live_backtrace(), include_symbolication)
}

fn symbolicate_address(address: usize, include_symbolication: bool) -> StackFrame {
    if address == 0 {
        return StackFrame {
            address: NIL_ADDRESS_TEXT.to_string(),
            symbol_name: Some(NIL_SYMBOL.to_string()),
            ..Default::default()
        };
    }

    let mut frame = StackFrame {
        address: format!("{address:#x}"),
        ..Default::default()
    };

    let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
    // SAFETY: dladdr only inspects loader metadata for the given address and
    // writes into the out-struct.
    let rc = unsafe { libc::dladdr(address as *const libc::c_void, &mut info) };
    if rc == 0 {
        frame.symbol_name = Some(DLADDR_FAILED_SYMBOL.to_string());
        return frame;
    }

    if !info.dli_sname.is_null() {
        // SAFETY: dladdr returned a NUL-terminated symbol name.
        let raw = unsafe { CStr::from_ptr(info.dli_sname) }
            .to_string_lossy()
            .into_owned();
        frame.symbol_name = Some(demangle_symbol(&raw));
    }
    if !info.dli_saddr.is_null() {
        let symbol_start = info.dli_saddr as usize;
        if address >= symbol_start {
            frame.offset = Some((address - symbol_start) as u64);
        }
    }

    let module = if info.dli_fname.is_null() {
        None
    } else {
        // SAFETY: dladdr returned a NUL-terminated module path.
        Some(
            unsafe { CStr::from_ptr(info.dli_fname) }
                .to_string_lossy()
                .into_owned(),
        )
    };
    frame.file_name = module.clone();

    if include_symbolication {
        if let Some(module) = module {
            if let Some((file, line)) = addr2line_lookup(&module, address) {
                frame.file_name = Some(file);
                frame.line_number = Some(line);
            }
        }
    }

    frame
}

/// Demangles when possible, otherwise preserves the raw mangled name.
fn demangle_symbol(raw: &str) -> String {
    match Name::from(raw).demangle(DemangleOptions::name_only()) {
        Some(demangled) => demangled,
        None => raw.to_string(),
    }
}

/// Opportunistic `addr2line -e <module> <address>` invocation, capped per
/// frame. Any failure or timeout is swallowed.
fn addr2line_lookup(module: &str, address: usize) -> Option<(String, u32)> {
    if !Path::new(DD_CRASHREPORT_ADDR2LINE_PATH).exists() {
        return None;
    }
    let mut child = Command::new(DD_CRASHREPORT_ADDR2LINE_PATH)
        .arg("-e")
        .arg(module)
        .arg(format!("{address:#x}"))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let deadline = Instant::now() + Duration::from_millis(DD_CRASHREPORT_ADDR2LINE_TIMEOUT_MS);
    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => break,
            Ok(Some(_)) => return None,
            Ok(None) if Instant::now() >= deadline => {
                // Enrichment is never worth stalling recovery.
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(10)),
            Err(_) => return None,
        }
    }

    let mut output = String::new();
    child.stdout.take()?.read_to_string(&mut output).ok()?;
    parse_addr2line_output(&output)
}

fn parse_addr2line_output(output: &str) -> Option<(String, u32)> {
    let line = output.lines().next()?;
    let (file, line_number) = line.rsplit_once(':')?;
    if file.is_empty() || file.starts_with("??") {
        return None;
    }
    // The line part may carry a discriminator suffix.
    let line_number = line_number
        .split_whitespace()
        .next()?
        .parse::<u32>()
        .ok()?;
    if line_number == 0 {
        return None;
    }
    Some((file.to_string(), line_number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_addresses_get_placeholder_frames() {
        let trace = symbolicate_addresses(&[0], false);
        assert_eq!(trace.len(), 1);
        assert_eq!(trace.frames[0].address, "0x0 (nil address)");
        assert_eq!(
            trace.frames[0].symbol_name.as_deref(),
            Some("<nil address pointer>")
        );
    }

    #[test]
    fn unmapped_addresses_keep_their_hex_rendering() {
        let trace = symbolicate_addresses(&[0x4005a0], false);
        assert_eq!(trace.frames[0].address, "0x4005a0");
    }

    #[test]
    fn live_trace_is_non_empty() {
        let trace = capture_live_trace(false);
        assert!(!trace.is_empty());
    }

    #[test]
    fn order_is_preserved() {
        let trace = symbolicate_addresses(&[0x1000, 0, 0x2000], false);
        assert_eq!(trace.frames[0].address, "0x1000");
        assert_eq!(trace.frames[1].address, "0x0 (nil address)");
        assert_eq!(trace.frames[2].address, "0x2000");
    }

    #[test]
    fn demangling_falls_back_to_the_raw_name() {
        assert_eq!(demangle_symbol("plain_c_symbol"), "plain_c_symbol");
        assert_eq!(
            demangle_symbol("_ZN9wikipedia7article6formatEv"),
            "wikipedia::article::format"
        );
    }

    #[test]
    fn addr2line_output_parsing() {
        assert_eq!(
            parse_addr2line_output("/src/main.rs:42\n"),
            Some(("/src/main.rs".to_string(), 42))
        );
        assert_eq!(
            parse_addr2line_output("/src/main.rs:42 (discriminator 2)\n"),
            Some(("/src/main.rs".to_string(), 42))
        );
        assert_eq!(parse_addr2line_output("??:0\n"), None);
        assert_eq!(parse_addr2line_output("??:?\n"), None);
        assert_eq!(parse_addr2line_output(""), None);
    }
}
