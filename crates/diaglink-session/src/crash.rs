//! Process-wide panic hook forwarding crash reports to the companion.

use std::{
    any::Any,
    backtrace::Backtrace,
    cell::Cell,
    panic::PanicHookInfo,
    sync::{
        Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use diaglink_core::CrashReport;

static HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static REPORTING: Cell<bool> = const { Cell::new(false) };
}

/// Receives crash reports from the panic hook.
///
/// Called on the panicking thread; implementations must bound how long
/// they block.
pub trait CrashReporter: Send + Sync {
    fn report_crash(&self, report: CrashReport);
}

/// Install the crash hook ahead of the current panic hook.
///
/// The previous hook always runs after the report attempt. Panics on
/// different threads report independently; a panic raised while the same
/// thread is reporting is not reported again. Only the first call per
/// process installs anything; returns whether this call did.
pub fn install(reporter: Weak<dyn CrashReporter>) -> bool {
    if HOOK_INSTALLED.swap(true, Ordering::AcqRel) {
        return false;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(reporter) = reporter.upgrade() {
            if !REPORTING.replace(true) {
                reporter.report_crash(crash_report(info));
                REPORTING.set(false);
            }
        }
        previous(info);
    }));
    tracing::debug!("Crash hook installed");
    true
}

/// Build a report from panic hook info.
#[must_use]
pub fn crash_report(info: &PanicHookInfo<'_>) -> CrashReport {
    CrashReport {
        message: panic_message(info.payload()),
        location: info.location().map(ToString::to_string),
        thread: std::thread::current().name().map(str::to_string),
        backtrace: Backtrace::force_capture().to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
