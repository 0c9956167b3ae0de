use std::io::Write;

use parking_lot::Mutex;

/// Destination for `print`, `println` and `printf`.
pub trait PrintSink: Send + Sync {
    fn emit(&self, text: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl PrintSink for StdoutSink {
    fn emit(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout is not a script error.
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

/// Collects everything printed, for tests and for `--json` reports.
#[derive(Debug, Default)]
pub struct CapturedOutput {
    text: Mutex<String>,
}

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.text.lock().clone()
    }

    pub fn take(&self) -> String {
        std::mem::take(&mut *self.text.lock())
    }
}

impl PrintSink for CapturedOutput {
    fn emit(&self, text: &str) {
        self.text.lock().push_str(text);
    }
}
