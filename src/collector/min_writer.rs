// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Async-signal-safe formatting primitives for the signal phase.
//!
//! Every function here formats into a fixed-size stack buffer and issues a
//! single `write(2)`. No heap allocation, no locks, no locale-dependent
//! formatting, and no process-wide mutable state beyond the fd passed in.
//! A short write is accepted as best effort; nothing here retries, since a
//! crashing process cannot usefully do so.

use std::os::unix::io::RawFd;

/// Writes `bytes` to `fd` in one attempt.
pub(crate) fn write_literal(fd: RawFd, bytes: &[u8]) {
    if fd < 0 {
        return;
    }
    // SAFETY: write(2) is async-signal-safe and the buffer is valid for its
    // full length. The result is deliberately ignored.
    unsafe {
        libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len());
    }
}

/// Decimal rendering of an `i32`. `i32::MIN` is clamped to `i32::MIN + 1`;
/// the values written here (signal numbers, frame counts) never reach it.
pub(crate) fn write_i32(fd: RawFd, value: i32) {
    let mut buf = [0u8; 12];
    let clamped = if value == i32::MIN { i32::MIN + 1 } else { value };
    let rendered = render_signed(clamped as i64, &mut buf);
    write_literal(fd, rendered);
}

/// Decimal rendering of an `i64` (raw-log timestamps).
pub(crate) fn write_i64(fd: RawFd, value: i64) {
    let mut buf = [0u8; 21];
    let clamped = if value == i64::MIN { i64::MIN + 1 } else { value };
    let rendered = render_signed(clamped, &mut buf);
    write_literal(fd, rendered);
}

/// Decimal rendering of a `u64` (thread ids).
pub(crate) fn write_u64(fd: RawFd, value: u64) {
    let mut buf = [0u8; 21];
    let mut pos = buf.len();
    let mut v = value;
    loop {
        pos -= 1;
        buf[pos] = b'0' + (v % 10) as u8;
        v /= 10;
        if v == 0 {
            break;
        }
    }
    let rendered = &buf[pos..];
    write_literal(fd, rendered);
}

/// `0x`-prefixed lowercase hex rendering of a pointer-width value, with no
/// leading zeros (`0x0` for null).
pub(crate) fn write_ptr(fd: RawFd, value: usize) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut buf = [0u8; 2 + usize::BITS as usize / 4];
    let mut pos = buf.len();
    let mut v = value;
    loop {
        pos -= 1;
        buf[pos] = HEX[v & 0xf];
        v >>= 4;
        if v == 0 {
            break;
        }
    }
    pos -= 1;
    buf[pos] = b'x';
    pos -= 1;
    buf[pos] = b'0';
    write_literal(fd, &buf[pos..]);
}

pub(crate) fn fsync(fd: RawFd) {
    if fd < 0 {
        return;
    }
    // SAFETY: fsync(2) is async-signal-safe.
    unsafe {
        libc::fsync(fd);
    }
}

// The caller guarantees `value != MIN` for the signed type, so negation
// cannot overflow.
fn render_signed(value: i64, buf: &mut [u8]) -> &[u8] {
    let negative = value < 0;
    let mut v = value.unsigned_abs();
    let mut pos = buf.len();
    loop {
        pos -= 1;
        buf[pos] = b'0' + (v % 10) as u8;
        v /= 10;
        if v == 0 {
            break;
        }
    }
    if negative {
        pos -= 1;
        buf[pos] = b'-';
    }
    &buf[pos..]
}
