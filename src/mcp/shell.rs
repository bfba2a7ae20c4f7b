//! Shell quoting and remote command construction.
//!
//! Every user-supplied value that ends up in a remote command line goes
//! through [`quote`]. Values are wrapped in single quotes, inside which a POSIX
//! shell performs no expansion at all; embedded single quotes are emitted as
//! `'\''` (close quote, escaped quote, reopen quote). Quotes, `$()`, backticks,
//! globs and newlines therefore reach the remote command as literal bytes.

/// Quote `value` as a single shell word.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

/// Command that writes `content` verbatim into `path`.
///
/// `printf '%s'` adds no trailing newline and does not interpret escapes in
/// its argument.
pub fn write_file_command(path: &str, content: &str) -> String {
    format!("printf '%s' {} > {}", quote(content), quote(path))
}

/// Directory listing command; without a path the remote working directory is
/// listed. The path follows `--` so a leading dash is never read as an option.
pub fn list_directory_command(path: Option<&str>, detailed: bool) -> String {
    let base = if detailed { "ls -la" } else { "ls" };
    match path {
        Some(path) => format!("{} -- {}", base, quote(path)),
        None => base.to_string(),
    }
}
