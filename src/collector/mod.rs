// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod crash_handler;
pub(crate) mod emitters;
mod min_writer;
pub(crate) mod raw_log;
pub(crate) mod signal_handler_manager;
pub(crate) mod stack_capture;

pub use crash_handler::{disable, enable};
