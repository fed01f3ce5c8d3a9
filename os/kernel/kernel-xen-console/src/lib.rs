//! # Xen Console Logging
//!
//! Early-boot and diagnostic output for kernels running as Xen guests. Output
//! goes through the `console_io(CONSOLEIO_write)` hypercall, which the
//! hypervisor forwards to its own serial console (`xl dmesg` / the Xen UART).
//! It needs no driver, no shared ring and no event channel, so it works from
//! the first instruction after the hypercall page is usable.
//!
//! ## Output Mechanism
//! ```text
//! log::warn!(..) / xen_trace!(hv, ..)
//!     ↓
//! ConsoleSink (fmt::Write, fixed stack buffer)
//!     ↓  flush on newline / full buffer
//! Hypervisor::console_write → CONSOLEIO_write
//!     ↓
//! Xen serial console
//! ```
//!
//! ## Components
//!
//! * [`XenConsoleLogger`]: a [`log::Log`] implementation with a level
//!   threshold; records are written as `"[LEVEL] target: message\n"`.
//! * [`xen_trace!`]: formatted output that bypasses the `log` facade.
//! * [`xen_fmt::ConsoleSink`]: the buffering `fmt::Write` adapter both use.
//!
//! ## Feature `enabled` (default)
//!
//! Without it every write is discarded and no hypercall is ever issued.
//!
//! ## Usage
//! ```rust,ignore
//! use kernel_xen::Arm64Hypervisor;
//! use kernel_xen_console::XenConsoleLogger;
//! use log::LevelFilter;
//!
//! static LOGGER: XenConsoleLogger<Arm64Hypervisor> =
//!     XenConsoleLogger::new(Arm64Hypervisor, LevelFilter::Debug);
//!
//! LOGGER.init().expect("logger initialization");
//! log::info!("grant table ready");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod logger;

pub use logger::XenConsoleLogger;

#[doc(hidden)]
pub mod xen_fmt {
    use core::fmt::{self, Write};
    use kernel_xen::Hypervisor;

    /// Bytes buffered before a hypercall is issued.
    pub const CONSOLE_CHUNK: usize = 128;

    /// `fmt::Write` adapter that batches output into [`CONSOLE_CHUNK`]-sized
    /// hypercalls. Dropping the sink flushes whatever is left.
    pub struct ConsoleSink<'h, H: Hypervisor> {
        hv: &'h H,
        buf: [u8; CONSOLE_CHUNK],
        len: usize,
    }

    impl<'h, H: Hypervisor> ConsoleSink<'h, H> {
        pub const fn new(hv: &'h H) -> Self {
            Self {
                hv,
                buf: [0; CONSOLE_CHUNK],
                len: 0,
            }
        }

        /// Hand buffered bytes to the hypervisor.
        pub fn flush(&mut self) {
            if self.len == 0 {
                return;
            }
            if cfg!(feature = "enabled") {
                // Best effort: a console we cannot write to has nowhere to report to.
                let _ = self.hv.console_write(&self.buf[..self.len]);
            }
            self.len = 0;
        }

        fn push(&mut self, b: u8) {
            if self.len == CONSOLE_CHUNK {
                self.flush();
            }
            self.buf[self.len] = b;
            self.len += 1;
            if b == b'\n' {
                self.flush();
            }
        }
    }

    impl<H: Hypervisor> Write for ConsoleSink<'_, H> {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                self.push(b);
            }
            Ok(())
        }
    }

    impl<H: Hypervisor> Drop for ConsoleSink<'_, H> {
        fn drop(&mut self) {
            self.flush();
        }
    }

    #[doc(hidden)]
    #[inline]
    pub fn xen_write<H: Hypervisor>(hv: &H, args: fmt::Arguments) {
        let _ = fmt::write(&mut ConsoleSink::new(hv), args);
    }
}

/// Formatted output straight to the Xen console.
///
/// ```rust,ignore
/// xen_trace!(&Arm64Hypervisor, "gnttab at {:#x}\n", base);
/// ```
#[macro_export]
macro_rules! xen_trace {
    ($hv:expr, $($arg:tt)*) => {{
        $crate::xen_fmt::xen_write($hv, core::format_args!($($arg)*));
    }};
}
