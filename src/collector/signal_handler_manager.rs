// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::crash_handler::handle_posix_sigaction;
use crate::shared::configuration::CrashReporterConfiguration;
use libc::{
    mmap, sigaltstack, MAP_ANON, MAP_FAILED, MAP_PRIVATE, PROT_NONE, PROT_READ, PROT_WRITE,
    SIGSTKSZ,
};
use log::warn;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, Signal};
use std::ptr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;

/// The fatal signals the reporter traps.
pub(crate) const FATAL_SIGNALS: [Signal; 6] = [
    Signal::SIGABRT,
    Signal::SIGILL,
    Signal::SIGSEGV,
    Signal::SIGFPE,
    Signal::SIGBUS,
    Signal::SIGPIPE,
];

// Linux seems to have the most, supporting up to 64 inclusive
// https://man7.org/linux/man-pages/man7/signal.7.html
const MAX_SIGNALS: usize = 65;
static mut PREV_HANDLERS: [Option<SigAction>; MAX_SIGNALS] = [None; MAX_SIGNALS];
static INSTALL_STARTED: AtomicBool = AtomicBool::new(false);
static INSTALL_FINISHED: AtomicBool = AtomicBool::new(false);

/// Registers handlers for every signal in [FATAL_SIGNALS], storing each
/// previous disposition for restoration at re-raise or uninstall time.
/// A per-signal registration failure leaves the remaining handlers active.
///
/// PRECONDITIONS:
///     The raw log should be opened before this function, so that a crash
///     occurring immediately after installation has somewhere to go.
/// SAFETY:
///     Crash-handler functions are not reentrant; the facade serializes
///     install/uninstall behind its lock.
/// ATOMICITY:
///     A crash during execution may find a handler registered whose previous
///     disposition is not yet stored; the re-raise path then falls back to
///     SIG_DFL.
pub(crate) fn install(config: &CrashReporterConfiguration) -> anyhow::Result<()> {
    anyhow::ensure!(
        INSTALL_STARTED
            .compare_exchange(false, true, SeqCst, SeqCst)
            .is_ok(),
        "Crash handlers are already installed"
    );

    if config.create_alt_stack {
        // SAFETY: This function has no documented preconditions.
        if let Err(e) = unsafe { create_alt_stack() } {
            warn!("Unable to create an alternate signal stack: {e:#}");
        }
    }

    for signal in FATAL_SIGNALS {
        // SAFETY: Between INSTALL_STARTED and INSTALL_FINISHED only this
        // function touches PREV_HANDLERS, and the facade serializes callers.
        match unsafe { register_signal_handler(signal, config) } {
            Ok(previous) => unsafe {
                (*ptr::addr_of_mut!(PREV_HANDLERS))[signal as usize] = Some(previous);
            },
            Err(e) => warn!("Unable to register a handler for {signal:?}: {e:#}"),
        }
    }
    INSTALL_FINISHED.store(true, SeqCst);
    Ok(())
}

/// Restores every stored previous disposition and clears the table, allowing
/// a later re-install.
pub(crate) fn uninstall() -> anyhow::Result<()> {
    anyhow::ensure!(
        INSTALL_FINISHED.load(SeqCst),
        "Crash handlers are not installed"
    );
    INSTALL_FINISHED.store(false, SeqCst);
    // SAFETY: INSTALL_FINISHED is false, so the re-raise path no longer reads
    // the table; the facade serializes callers of install/uninstall.
    let handlers = unsafe { &mut *ptr::addr_of_mut!(PREV_HANDLERS) };
    for signal in FATAL_SIGNALS {
        if let Some(previous) = handlers[signal as usize].take() {
            // SAFETY: The value restored here was returned by a previous
            // sigaction call at install time.
            if let Err(e) = unsafe { signal::sigaction(signal, &previous) } {
                warn!("Unable to restore the previous handler for {signal:?}: {e}");
            }
        }
    }
    INSTALL_STARTED.store(false, SeqCst);
    Ok(())
}

pub(crate) fn handlers_installed() -> bool {
    INSTALL_FINISHED.load(SeqCst)
}

/// Handler epilogue: put back the previous disposition for `signum`, then
/// `raise` so the signal is redelivered under it. The default disposition
/// terminates the process (and produces a core for the core-dumping signals);
/// a previous user handler receives the signal instead. When nothing was
/// stored, SIG_DFL is forced.
///
/// SAFETY: Must only be called from the signal handler, as its final action.
pub(crate) unsafe fn restore_and_reraise(signum: i32) {
    let previous = if handlers_installed() && (signum as usize) < MAX_SIGNALS {
        (*ptr::addr_of!(PREV_HANDLERS))[signum as usize]
    } else {
        None
    };
    let restored = match Signal::try_from(signum) {
        Ok(signal) => {
            let action = previous.unwrap_or_else(|| {
                SigAction::new(SigHandler::SigDfl, SaFlags::empty(), signal::SigSet::empty())
            });
            signal::sigaction(signal, &action).is_ok()
        }
        Err(_) => false,
    };
    if !restored {
        // Last resort, straight through libc.
        libc::signal(signum, libc::SIG_DFL);
    }
    libc::raise(signum);
}

unsafe fn register_signal_handler(
    signal: Signal,
    config: &CrashReporterConfiguration,
) -> anyhow::Result<SigAction> {
    // If a signal with SA_ONSTACK arrives and no signal stack was set, the
    // normal user stack is used as if the flag had not been set, so setting
    // it is always safe.
    let extra_saflags = if config.use_alt_stack {
        SaFlags::SA_ONSTACK
    } else {
        SaFlags::empty()
    };

    let sig_action = SigAction::new(
        SigHandler::SigAction(handle_posix_sigaction),
        SaFlags::SA_NODEFER | extra_saflags,
        signal::SigSet::empty(),
    );

    let old_handler = signal::sigaction(signal, &sig_action)?;
    Ok(old_handler)
}

/// Allocates a signal altstack, and puts a guard page at the end.
/// Inspired by https://github.com/rust-lang/rust/pull/69969/files
unsafe fn create_alt_stack() -> anyhow::Result<()> {
    // The default SIGSTKSZ is 8KB, which symbolication-free capture still
    // exceeds on some platforms; use at least 16 pages.
    let page_size = page_size::get();
    let sigaltstack_base_size = std::cmp::max(SIGSTKSZ, 16 * page_size);
    let stackp = mmap(
        ptr::null_mut(),
        sigaltstack_base_size + page_size,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANON,
        -1,
        0,
    );
    anyhow::ensure!(
        stackp != MAP_FAILED,
        "failed to allocate an alternative stack"
    );
    let guard_result = libc::mprotect(stackp, page_size, PROT_NONE);
    anyhow::ensure!(
        guard_result == 0,
        "failed to set up alternative stack guard page"
    );
    let stackp = stackp.add(page_size);

    let stack = libc::stack_t {
        ss_sp: stackp,
        ss_flags: 0,
        ss_size: sigaltstack_base_size,
    };
    let rval = sigaltstack(&stack, ptr::null_mut());
    anyhow::ensure!(rval == 0, "sigaltstack failed {rval}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::configuration::CrashReporterConfiguration;

    #[cfg(target_os = "linux")]
    #[test]
    fn table_covers_every_signal() {
        assert!(MAX_SIGNALS as libc::c_int > libc::SIGRTMAX());
    }

    // One test because the handler table is process-global state.
    #[test]
    fn install_uninstall_round_trip() {
        let config = CrashReporterConfiguration::default();
        install(&config).unwrap();
        assert!(handlers_installed());
        assert!(install(&config).is_err());

        uninstall().unwrap();
        assert!(!handlers_installed());
        assert!(uninstall().is_err());

        // The table is reusable after a full round trip.
        install(&config).unwrap();
        uninstall().unwrap();
    }
}
