//! POSIX shell quoting.
//!
//! [`shell_quote`] has a single job: turn one argument into one shell token
//! that a POSIX shell reads back byte-for-byte. Nothing else in the workspace
//! builds shell text.

/// Quote `arg` as a single POSIX shell token.
///
/// The argument is wrapped in single quotes; each embedded single quote is
/// emitted as `'\''` (close, escaped quote, reopen). Inside single quotes the
/// shell interprets nothing, so `$`, backticks, `;`, `&`, `|`, `"`, `\` and
/// newlines all survive verbatim.
pub fn shell_quote(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('\'');
    for ch in arg.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

/// Join `program` and `args` into one shell command line, quoting every token.
pub fn join_quoted<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(AsRef::as_ref))
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}
