//! Text normalization: rewriting technical substrings into speakable phrases
//!
//! Applied to a finalized utterance just before it is queued for synthesis,
//! never before segmentation (boundary detection needs the raw punctuation).
//! Passes run in a fixed order: URLs, inline code spans, file-like paths,
//! environment variables. Each pass fails open: anything that does not
//! cleanly match is left untouched. Normalization is idempotent.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

/// URLs with an explicit scheme
static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[a-zA-Z][a-zA-Z0-9+.-]*://[^\s]+").expect("valid regex")
});

/// Inline single-backtick code spans
static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"));

/// File-like paths: absolute, home-relative, dot-relative, or a bare
/// multi-component relative path
static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:~|\.{1,2})?/[\w.@+-]+(?:/[\w.@+-]+)*|[\w.@+-]+(?:/[\w.@+-]+)+")
        .expect("valid regex")
});

/// Environment variable references: `$NAME` or `${NAME}`
static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("valid regex"));

/// Command names recognized at the start of an inline code span
const SHELL_COMMANDS: &[&str] = &[
    "ls", "cd", "cp", "mv", "rm", "cat", "grep", "find", "sed", "awk", "echo", "touch", "mkdir",
    "chmod", "chown", "kill", "ps", "tar", "curl", "wget", "ssh", "scp", "git", "cargo", "rustc",
    "npm", "npx", "node", "python", "pip", "make", "cmake", "docker", "kubectl", "brew", "apt",
    "systemctl", "journalctl", "man", "which", "env", "export", "source",
];

/// Command spans at or below this length are read out in full;
/// longer ones are reduced to the command name
const FULL_COMMAND_CHARS: usize = 40;

/// Punctuation a URL match may have picked up from surrounding prose
const TRAILING_PUNCT: &[char] = &['.', ',', '!', '?', ';', ':', ')', ']', '}', '\'', '"'];

/// Rewrite an utterance into a speakable form.
///
/// Pure and idempotent: `normalize(normalize(x)) == normalize(x)`.
#[must_use]
pub fn normalize(text: &str) -> String {
    let text = replace_urls(text);
    let text = replace_inline_code(&text);
    let text = replace_paths(&text);
    let text = replace_env_vars(&text);
    text.into_owned()
}

/// `scheme://host/...` becomes "link to host"
fn replace_urls(text: &str) -> Cow<'_, str> {
    URL_RE.replace_all(text, |caps: &Captures<'_>| {
        let matched = &caps[0];
        let trimmed = matched.trim_end_matches(TRAILING_PUNCT);
        let tail = &matched[trimmed.len()..];

        match Url::parse(trimmed) {
            Ok(url) => match url.host_str() {
                Some(host) => {
                    let domain = host.strip_prefix("www.").unwrap_or(host);
                    format!("link to {domain}{tail}")
                }
                // Scheme-only oddities (mailto:, data:) — leave unchanged
                None => matched.to_string(),
            },
            Err(_) => matched.to_string(),
        }
    })
}

/// `` `content` `` is unwrapped; known commands are announced as commands,
/// everything else is made pronounceable
fn replace_inline_code(text: &str) -> Cow<'_, str> {
    INLINE_CODE_RE.replace_all(text, |caps: &Captures<'_>| {
        let content = caps[1].trim();
        let Some(first) = content.split_whitespace().next() else {
            return caps[0].to_string();
        };

        if SHELL_COMMANDS.contains(&first) {
            if content.len() <= FULL_COMMAND_CHARS {
                format!("command {content}")
            } else {
                format!("command {first}")
            }
        } else {
            pronounceable(content)
        }
    })
}

/// Make an identifier-like span pronounceable
fn pronounceable(content: &str) -> String {
    let spaced = content
        .replace(['_', '-'], " ")
        .replace('@', " at ")
        .replace('/', " slash ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Path-like tokens become "file basename"
fn replace_paths(text: &str) -> Cow<'_, str> {
    PATH_RE.replace_all(text, |caps: &Captures<'_>| {
        let matched = &caps[0];

        // Bare relative matches like "and/or" with a single slash and no
        // extension are more likely prose than paths — leave them alone
        let anchored = matched.starts_with(['/', '~', '.']);
        if !anchored && !matched.contains('.') && matched.matches('/').count() < 2 {
            return matched.to_string();
        }

        match matched.trim_end_matches('/').rsplit('/').next() {
            Some(basename) if !basename.is_empty() => format!("file {basename}"),
            _ => matched.to_string(),
        }
    })
}

/// `$NAME` / `${NAME}` become "variable name"
fn replace_env_vars(text: &str) -> Cow<'_, str> {
    ENV_VAR_RE.replace_all(text, |caps: &Captures<'_>| {
        let name = caps[1].to_lowercase().replace('_', " ");
        format!("variable {name}")
    })
}
