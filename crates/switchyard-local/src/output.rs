//! Parsing of backend stdout/stderr into text and token counts.

/// Generated text plus whatever token counts the backend reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOutput {
    pub text: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// Estimate a token count as `words * 1.3`, rounded.
pub fn estimate_tokens(text: &str) -> u64 {
    let words = text.split_whitespace().count() as f64;
    (words * 1.3).round() as u64
}

const LLAMA_LOG_PREFIXES: &[&str] = &["llama_perf_", "llama_print_timings", "common_perf_"];

/// Parse llama.cpp CLI output.
///
/// The generation is on stdout. Timing banners (usually on stderr) look like:
///
/// ```text
/// llama_perf_context_print: prompt eval time =     101.20 ms /    12 tokens (...)
/// llama_perf_context_print:        eval time =    2203.55 ms /   128 runs   (...)
/// ```
pub fn parse_llama_output(stdout: &str, stderr: &str) -> ParsedOutput {
    let mut input_tokens = None;
    let mut output_tokens = None;

    // Only prefixed log lines count; the generation may quote a banner.
    let banners = stderr
        .lines()
        .chain(stdout.lines())
        .filter(|line| is_llama_log(line));
    for line in banners {
        if line.contains("prompt eval time") {
            input_tokens = input_tokens.or_else(|| count_after_slash(line));
        } else if line.contains("eval time") {
            output_tokens = output_tokens.or_else(|| count_after_slash(line));
        }
    }

    let text = stdout
        .lines()
        .filter(|line| !is_llama_log(line))
        .collect::<Vec<_>>()
        .join("\n")
        .replace("[end of text]", "")
        .trim()
        .to_string();

    ParsedOutput {
        text,
        input_tokens,
        output_tokens,
    }
}

fn is_llama_log(line: &str) -> bool {
    let trimmed = line.trim_start();
    LLAMA_LOG_PREFIXES.iter().any(|p| trimmed.starts_with(p))
}

/// Parse `mlx_lm.generate` output.
///
/// ```text
/// ==========
/// <generation>
/// ==========
/// Prompt: 12 tokens, 88.1 tokens-per-sec
/// Generation: 128 tokens, 31.9 tokens-per-sec
/// ```
pub fn parse_mlx_output(stdout: &str) -> ParsedOutput {
    const FENCE: &str = "==========";

    let text = match stdout.split_once(FENCE) {
        Some((_, rest)) => rest.split_once(FENCE).map(|(body, _)| body).unwrap_or(rest),
        None => stdout,
    }
    .trim()
    .to_string();

    let mut input_tokens = None;
    let mut output_tokens = None;
    for line in stdout.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Prompt:") {
            input_tokens = leading_number(rest);
        } else if let Some(rest) = line.strip_prefix("Generation:") {
            output_tokens = leading_number(rest);
        }
    }

    ParsedOutput {
        text,
        input_tokens,
        output_tokens,
    }
}

/// `... ms /   128 runs (...)` -> 128
fn count_after_slash(line: &str) -> Option<u64> {
    let (_, after) = line.rsplit_once('/')?;
    leading_number(after)
}

fn leading_number(s: &str) -> Option<u64> {
    s.split_whitespace()
        .next()
        .map(|tok| tok.trim_end_matches(','))
        .and_then(|tok| tok.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llama_banner_counts() {
        let stderr = "\
load_tensors: offloaded 49/49 layers to GPU
llama_perf_sampler_print:    sampling time =       9.10 ms /   140 runs   (    0.07 ms per token)
llama_perf_context_print:        load time =    1500.00 ms
llama_perf_context_print: prompt eval time =     101.20 ms /    12 tokens (    8.43 ms per token)
llama_perf_context_print:        eval time =    2203.55 ms /   128 runs   (   17.22 ms per token)
";
        let parsed = parse_llama_output("The answer is 42.\n[end of text]\n", stderr);
        assert_eq!(parsed.text, "The answer is 42.");
        assert_eq!(parsed.input_tokens, Some(12));
        assert_eq!(parsed.output_tokens, Some(128));
    }

    #[test]
    fn test_llama_without_banner_estimates() {
        let parsed = parse_llama_output("one two three four five six seven eight nine ten", "");
        assert_eq!(parsed.input_tokens, None);
        assert_eq!(parsed.output_tokens, None);
        assert_eq!(estimate_tokens(&parsed.text), 13);
    }

    #[test]
    fn test_llama_strips_perf_lines_from_stdout() {
        let stdout = "hello\nllama_perf_context_print: eval time = 1.0 ms / 3 runs\n";
        let parsed = parse_llama_output(stdout, "");
        assert_eq!(parsed.text, "hello");
        assert_eq!(parsed.output_tokens, Some(3));
    }

    #[test]
    fn test_llama_ignores_banner_text_in_generation() {
        let stdout = "Typical output:\nprompt eval time = 5.0 ms / 999 tokens\neval time = 9.0 ms / 777 runs\n";
        let stderr = "llama_perf_context_print:        eval time =    20.00 ms /    40 runs\n";
        let parsed = parse_llama_output(stdout, stderr);
        assert_eq!(parsed.input_tokens, None);
        assert_eq!(parsed.output_tokens, Some(40));
        assert!(parsed.text.contains("999 tokens"));
    }

    #[test]
    fn test_mlx_fenced_output() {
        let stdout = "\
==========
fn main() {}
==========
Prompt: 21 tokens, 120.4 tokens-per-sec
Generation: 7 tokens, 40.0 tokens-per-sec
Peak memory: 17.1 GB
";
        let parsed = parse_mlx_output(stdout);
        assert_eq!(parsed.text, "fn main() {}");
        assert_eq!(parsed.input_tokens, Some(21));
        assert_eq!(parsed.output_tokens, Some(7));
    }

    #[test]
    fn test_estimate_rounds() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a b c"), 4);
    }
}
