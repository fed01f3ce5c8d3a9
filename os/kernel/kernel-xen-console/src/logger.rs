use crate::xen_fmt::ConsoleSink;
use core::fmt::Write;
use kernel_xen::Hypervisor;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// [`Log`] implementation writing to the Xen emergency console.
pub struct XenConsoleLogger<H> {
    hv: H,
    max_level: LevelFilter,
}

impl<H> XenConsoleLogger<H> {
    #[must_use]
    pub const fn new(hv: H, max_level: LevelFilter) -> Self {
        Self { hv, max_level }
    }

    /// The hypervisor handle records are written through.
    #[must_use]
    pub const fn hypervisor(&self) -> &H {
        &self.hv
    }
}

impl<H: Hypervisor + Send + Sync> XenConsoleLogger<H> {
    /// Install as the global logger. Call once during early init.
    ///
    /// # Errors
    /// Another logger was already installed.
    pub fn init(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }
}

impl<H: Hypervisor + Send + Sync> Log for XenConsoleLogger<H> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut sink = ConsoleSink::new(&self.hv);
        let _ = writeln!(
            sink,
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        // every record is flushed on its trailing newline
    }
}
