// Shell job constants (No magic values)
use std::time::Duration;

/// Synchronous wait before a command is backgrounded (15s)
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// How long a completed read waits for pipes still held open by orphaned
/// descendants before giving up on them (500ms)
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Shell used to interpret command strings
pub const DEFAULT_SHELL: &str = "/bin/sh";
