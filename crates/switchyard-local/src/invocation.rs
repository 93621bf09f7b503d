//! Command-line construction for local backends.

use switchyard_catalog::SamplingParams;

use crate::quote::join_quoted;
use crate::{DEFAULT_LLAMA_CLI, DEFAULT_MLX_GENERATE};

/// A program and its argument list. Never a shell string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn push(&mut self, flag: &str, value: impl ToString) {
        self.args.push(flag.to_string());
        self.args.push(value.to_string());
    }
}

/// A shell the local command must run under, e.g. `wsl bash -lc`.
///
/// The wrapped command is passed as one argument built by [`join_quoted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellWrapper {
    pub program: String,
    pub prefix_args: Vec<String>,
}

impl ShellWrapper {
    /// Parse a whitespace-separated wrapper such as `wsl bash -lc`.
    pub fn parse(spec: &str) -> Option<Self> {
        let mut parts = spec.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            prefix_args: parts.collect(),
        })
    }

    pub fn wrap(&self, inner: &Invocation) -> Invocation {
        let mut args = self.prefix_args.clone();
        args.push(join_quoted(&inner.program, &inner.args));
        Invocation {
            program: self.program.clone(),
            args,
        }
    }
}

/// Everything a local backend needs for one generation.
#[derive(Debug, Clone)]
pub struct GenerationArgs<'a> {
    pub model_path: &'a str,
    pub prompt: &'a str,
    /// Passed separately only when the model supports a system role.
    pub system_prompt: Option<&'a str>,
    pub params: &'a SamplingParams,
    pub special_flags: &'a [String],
}

/// Binaries and wrapper used for local generations.
#[derive(Debug, Clone)]
pub struct LocalRuntime {
    pub llama_cli: String,
    pub mlx_generate: String,
    pub wrapper: Option<ShellWrapper>,
}

impl Default for LocalRuntime {
    fn default() -> Self {
        Self {
            llama_cli: DEFAULT_LLAMA_CLI.to_string(),
            mlx_generate: DEFAULT_MLX_GENERATE.to_string(),
            wrapper: None,
        }
    }
}

impl LocalRuntime {
    /// llama.cpp CLI invocation for a GGUF model.
    pub fn llama_invocation(&self, gen: &GenerationArgs<'_>) -> Invocation {
        let mut inv = Invocation::new(&self.llama_cli);
        inv.push("-m", gen.model_path);
        inv.push("-p", gen.prompt);
        if let Some(system) = gen.system_prompt {
            inv.push("-sys", system);
        }
        if let Some(max_tokens) = gen.params.max_tokens {
            inv.push("-n", max_tokens);
        }
        if let Some(temperature) = gen.params.temperature {
            inv.push("--temp", temperature);
        }
        if let Some(top_p) = gen.params.top_p {
            inv.push("--top-p", top_p);
        }
        if let Some(top_k) = gen.params.top_k {
            inv.push("--top-k", top_k);
        }
        if let Some(penalty) = gen.params.repetition_penalty {
            inv.push("--repeat-penalty", penalty);
        }
        if let Some(min_p) = gen.params.min_p {
            inv.push("--min-p", min_p);
        }
        inv.args.push("-no-cnv".to_string());
        inv.args.push("--no-display-prompt".to_string());
        inv.args.extend(gen.special_flags.iter().cloned());
        self.wrapped(inv)
    }

    /// `mlx_lm.generate` invocation for an MLX model directory.
    pub fn mlx_invocation(&self, gen: &GenerationArgs<'_>) -> Invocation {
        let mut inv = Invocation::new(&self.mlx_generate);
        inv.push("--model", gen.model_path);
        inv.push("--prompt", gen.prompt);
        if let Some(system) = gen.system_prompt {
            inv.push("--system-prompt", system);
        }
        if let Some(max_tokens) = gen.params.max_tokens {
            inv.push("--max-tokens", max_tokens);
        }
        if let Some(temperature) = gen.params.temperature {
            inv.push("--temp", temperature);
        }
        if let Some(top_p) = gen.params.top_p {
            inv.push("--top-p", top_p);
        }
        if let Some(min_p) = gen.params.min_p {
            inv.push("--min-p", min_p);
        }
        inv.args.extend(gen.special_flags.iter().cloned());
        self.wrapped(inv)
    }

    fn wrapped(&self, inv: Invocation) -> Invocation {
        match &self.wrapper {
            Some(wrapper) => wrapper.wrap(&inv),
            None => inv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SamplingParams {
        SamplingParams {
            temperature: Some(0.7),
            top_p: Some(0.8),
            top_k: Some(20),
            max_tokens: Some(512),
            repetition_penalty: None,
            min_p: None,
        }
    }

    #[test]
    fn test_llama_args_are_a_list() {
        let params = params();
        let flags = vec!["--jinja".to_string()];
        let prompt = "it's $HOME; `id` | cat";
        let inv = LocalRuntime::default().llama_invocation(&GenerationArgs {
            model_path: "/m/q.gguf",
            prompt,
            system_prompt: Some("be terse"),
            params: &params,
            special_flags: &flags,
        });

        assert_eq!(inv.program, "llama-cli");
        let pos = inv.args.iter().position(|a| a == "-p").unwrap();
        assert_eq!(inv.args[pos + 1], prompt);
        assert!(inv.args.contains(&"-sys".to_string()));
        assert!(!inv.args.contains(&"--repeat-penalty".to_string()));
        assert_eq!(inv.args.last().map(String::as_str), Some("--jinja"));
    }

    #[test]
    fn test_mlx_args() {
        let params = params();
        let inv = LocalRuntime::default().mlx_invocation(&GenerationArgs {
            model_path: "/m/mlx/qwen",
            prompt: "hi",
            system_prompt: None,
            params: &params,
            special_flags: &[],
        });
        assert_eq!(inv.program, "mlx_lm.generate");
        assert_eq!(inv.args[..4], ["--model", "/m/mlx/qwen", "--prompt", "hi"]);
        assert!(!inv.args.contains(&"--system-prompt".to_string()));
    }

    #[test]
    fn test_wrapper_builds_single_quoted_argument() {
        let runtime = LocalRuntime {
            wrapper: ShellWrapper::parse("wsl bash -lc"),
            ..LocalRuntime::default()
        };
        let params = SamplingParams::default();
        let inv = runtime.llama_invocation(&GenerationArgs {
            model_path: "/m/q.gguf",
            prompt: "it's",
            system_prompt: None,
            params: &params,
            special_flags: &[],
        });

        assert_eq!(inv.program, "wsl");
        assert_eq!(inv.args.len(), 3);
        assert_eq!(inv.args[..2], ["bash", "-lc"]);
        assert_eq!(
            inv.args[2],
            "'llama-cli' '-m' '/m/q.gguf' '-p' 'it'\\''s' '-no-cnv' '--no-display-prompt'"
        );
    }

    #[test]
    fn test_wrapper_parse_empty() {
        assert!(ShellWrapper::parse("   ").is_none());
    }
}
