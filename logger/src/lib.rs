//! Tiny timestamped logger shared by the workspace.
//!
//! The sink is chosen once at startup: either stdout or a file in the
//! system temp directory. Every line is prefixed with the time elapsed
//! since `init_logger` was called.

use std::{
    fs::File,
    io::{self, Write},
    sync::Mutex,
    time::Instant,
};

use chrono::Utc;
use once_cell::sync::OnceCell;

static LOGGER: OnceCell<Logger> = OnceCell::new();

/// Where log lines end up.
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum LogKind {
    /// Log to the console.
    Stdout,

    /// Log to /tmp/satsuma-<timestamp>.log
    File,
}

struct Sink {
    out: Box<dyn Write + Send>,
    started: Instant,
}

impl Sink {
    fn new(kind: LogKind) -> Self {
        let started = Instant::now();
        match kind {
            LogKind::Stdout => Self {
                out: Box::new(io::stdout()),
                started,
            },
            LogKind::File => {
                let filename = format!("satsuma-{}.log", Utc::now().timestamp());
                let path = std::env::temp_dir().join(filename);
                Self {
                    out: Box::new(File::create(path).unwrap()),
                    started,
                }
            }
        }
    }

    fn write<T: std::fmt::Display>(&mut self, data: T) {
        let elapsed = self.started.elapsed();
        let secs = elapsed.as_secs();
        let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
        let ms = elapsed.subsec_millis();

        writeln!(self.out, "[{h:02}:{m:02}:{s:02}.{ms:03}] {data}").unwrap();
    }
}

struct Logger {
    sink: Mutex<Sink>,
}

impl Logger {
    fn new(kind: LogKind) -> Self {
        Self {
            sink: Mutex::new(Sink::new(kind)),
        }
    }

    fn log<T: std::fmt::Display>(&self, data: T) {
        if let Ok(ref mut sink) = self.sink.lock() {
            sink.write(data);
        }
    }
}

/// Pick the sink. Calling this twice keeps the first choice.
pub fn init_logger(kind: LogKind) {
    LOGGER.set(Logger::new(kind)).ok();
}

/// Log one line. A no-op until `init_logger` has been called.
pub fn log<T: std::fmt::Display>(data: T) {
    LOGGER.get().map_or((), |logger| logger.log(data));
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::{init_logger, log, LogKind};

    #[test]
    fn file_sink_gets_timestamped_lines() {
        init_logger(LogKind::File);
        log("ok".to_string());

        let dir = std::env::temp_dir();
        for entry in fs::read_dir(dir).unwrap().flatten() {
            let path = entry.path();
            let name = path.to_str().unwrap();
            if path.extension().is_some_and(|e| e == "log") && name.contains("satsuma") {
                let content = fs::read_to_string(&path).unwrap();
                fs::remove_file(&path).unwrap();
                assert_eq!(content, "[00:00:00.000] ok\n");
            }
        }
    }
}
