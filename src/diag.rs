//! Diagnostic sink for the locator / checksum steps. Advisory output only,
//! never affects control flow.

pub trait Diag {
    fn line(&self, msg: &str);
}

/// Default sink, drops everything.
pub struct Null;

impl Diag for Null {
    fn line(&self, _msg: &str) {}
}

/// Prints diagnostics to stderr, used by the CLI.
pub struct Stderr;

impl Diag for Stderr {
    fn line(&self, msg: &str) {
        eprintln!("[dbg] {}", msg);
    }
}
