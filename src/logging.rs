extern crate alloc;

use {alloc::boxed::Box, core::cell::RefCell};

struct UartLogger<UartType> {
    uart: critical_section::Mutex<RefCell<UartType>>,
    level: log::LevelFilter,
}

impl<UartType> UartLogger<UartType> {
    fn new(uart: UartType, level: log::LevelFilter) -> Self {
        Self {
            uart: critical_section::Mutex::new(RefCell::new(uart)),
            level,
        }
    }
}

impl<UartType: Send + core::fmt::Write> log::Log for UartLogger<UartType> {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        critical_section::with(|cs| {
            writeln!(
                self.uart.borrow(cs).borrow_mut(),
                "{} [{}] {}",
                record.level(),
                record.module_path().unwrap_or("bin"),
                record.args()
            )
            .ok();
        })
    }

    fn flush(&self) {}
}

/// Installs a logger writing to `uart`. Needs the global allocator to be
/// initialised. Later calls are ignored.
pub fn init_logging<UartType: Send + core::fmt::Write + 'static>(
    uart: UartType,
    level: log::LevelFilter,
) {
    log::set_max_level(level);
    log::set_logger(Box::leak(Box::new(UartLogger::new(uart, level)))).ok();
}
