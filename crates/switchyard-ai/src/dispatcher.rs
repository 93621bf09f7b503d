//! The dispatcher: one descriptor plus one prompt in, one completion out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use switchyard_catalog::{Backend, ErrorKind, ModelDescriptor};
use switchyard_local::{
    estimate_tokens, parse_llama_output, parse_mlx_output, GenerationArgs, LocalError,
    ParsedOutput,
};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::client::{ClientError, ProviderClient, ProviderReply};
use crate::completion::{Completion, DispatchRequest, Termination};
use crate::config::DispatchConfig;
use crate::prepare::{prepare, PreparedCall};

/// Anything that can turn a descriptor and request into a completion.
///
/// Failures are reported inside the returned [`Completion`], never as a
/// separate error channel.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, model: &ModelDescriptor, request: &DispatchRequest) -> Completion;
}

/// Backend failure before it is folded into a completion.
#[derive(Debug)]
enum CallError {
    Local(LocalError),
    Client(ClientError),
    Timeout(Duration),
    Misconfigured(String),
}

impl CallError {
    fn kind(&self) -> ErrorKind {
        match self {
            CallError::Local(e) => e.kind(),
            CallError::Client(e) => e.kind(),
            CallError::Timeout(_) => ErrorKind::Timeout,
            CallError::Misconfigured(_) => ErrorKind::Backend,
        }
    }

    fn message(&self) -> String {
        match self {
            CallError::Local(e) => e.to_string(),
            CallError::Client(e) => e.to_string(),
            CallError::Timeout(d) => format!("request aborted after {:?}", d),
            CallError::Misconfigured(m) => m.clone(),
        }
    }
}

/// Raw backend result before termination is decided.
struct RawReply {
    text: String,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    truncated: bool,
}

impl From<ParsedOutput> for RawReply {
    fn from(parsed: ParsedOutput) -> Self {
        Self {
            text: parsed.text,
            input_tokens: parsed.input_tokens,
            output_tokens: parsed.output_tokens,
            truncated: false,
        }
    }
}

impl From<ProviderReply> for RawReply {
    fn from(reply: ProviderReply) -> Self {
        Self {
            text: reply.text,
            input_tokens: reply.input_tokens,
            output_tokens: reply.output_tokens,
            truncated: reply.truncated,
        }
    }
}

/// Platform-aware dispatcher over local subprocesses and HTTP providers.
///
/// Reentrant: concurrent calls are allowed and are gated separately for local
/// subprocesses and HTTP requests.
pub struct Dispatcher {
    config: DispatchConfig,
    client: ProviderClient,
    local_gate: Arc<Semaphore>,
    http_gate: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        info!(
            max_local = config.max_local,
            max_http = config.max_http,
            os = %config.platform.os,
            arch = %config.platform.arch,
            "dispatcher ready"
        );
        Self {
            local_gate: Arc::new(Semaphore::new(config.max_local.max(1))),
            http_gate: Arc::new(Semaphore::new(config.max_http.max(1))),
            client: ProviderClient::new(),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(DispatchConfig::from_env())
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    async fn call_local(
        &self,
        model: &ModelDescriptor,
        call: &PreparedCall,
        deadline: Option<Duration>,
    ) -> Result<RawReply, CallError> {
        let path = model.local_path().ok_or_else(|| {
            CallError::Misconfigured(format!("model '{}' has no local path", model.id))
        })?;

        let gen = GenerationArgs {
            model_path: path,
            prompt: &call.user_prompt,
            system_prompt: call.system_prompt.as_deref(),
            params: &call.params,
            special_flags: &model.capabilities.special_flags,
        };

        let runtime = &self.config.runtime;
        match model.backend {
            Backend::LocalGguf => {
                let invocation = runtime.llama_invocation(&gen);
                let output = switchyard_local::run(&invocation, deadline)
                    .await
                    .map_err(CallError::Local)?;
                Ok(parse_llama_output(&output.stdout, &output.stderr).into())
            }
            Backend::LocalMlx => {
                if !self.config.platform.is_apple_silicon() {
                    return Err(CallError::Local(LocalError::UnsupportedPlatform(format!(
                        "MLX models need Apple-silicon macOS, this host is {}-{}",
                        self.config.platform.os, self.config.platform.arch
                    ))));
                }
                let invocation = runtime.mlx_invocation(&gen);
                let output = switchyard_local::run(&invocation, deadline)
                    .await
                    .map_err(CallError::Local)?;
                Ok(parse_mlx_output(&output.stdout).into())
            }
            Backend::HttpApi => Err(CallError::Misconfigured(format!(
                "model '{}' is not a local model",
                model.id
            ))),
        }
    }

    async fn call_http(
        &self,
        model: &ModelDescriptor,
        call: &PreparedCall,
        deadline: Option<Duration>,
    ) -> Result<RawReply, CallError> {
        let location = model.http_location().ok_or_else(|| {
            CallError::Misconfigured(format!("model '{}' has no HTTP endpoint", model.id))
        })?;

        let request = self.client.complete(
            location,
            call.system_prompt.as_deref(),
            &call.user_prompt,
            &call.params,
        );

        let reply = match deadline {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| CallError::Timeout(limit))?,
            None => request.await,
        };

        reply.map(RawReply::from).map_err(CallError::Client)
    }
}

#[async_trait]
impl Dispatch for Dispatcher {
    async fn dispatch(&self, model: &ModelDescriptor, request: &DispatchRequest) -> Completion {
        let call = prepare(model, request);
        let deadline = request.deadline.or(self.config.default_deadline);

        debug!(
            model = %model.id,
            backend = model.backend.as_str(),
            prompt_chars = call.user_prompt.len(),
            "dispatching"
        );

        let gate = if model.backend.is_local() {
            &self.local_gate
        } else {
            &self.http_gate
        };
        // Only closed if the semaphore is dropped, which cannot happen while
        // `self` is borrowed.
        let _permit = match gate.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return Completion::failed(
                    ErrorKind::Internal,
                    "dispatch gate closed",
                    Duration::ZERO,
                )
            }
        };

        let started = Instant::now();
        let result = if model.backend.is_local() {
            self.call_local(model, &call, deadline).await
        } else {
            self.call_http(model, &call, deadline).await
        };
        let elapsed = started.elapsed();

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                warn!(model = %model.id, kind = %e.kind(), "dispatch failed: {}", e.message());
                return Completion::failed(e.kind(), e.message(), elapsed);
            }
        };

        if reply.text.trim().is_empty() {
            warn!(model = %model.id, "backend returned no text");
            return Completion::failed(ErrorKind::Backend, "backend returned empty output", elapsed);
        }

        let input_tokens = reply.input_tokens.unwrap_or_else(|| {
            let system = call.system_prompt.as_deref().unwrap_or_default();
            estimate_tokens(system) + estimate_tokens(&call.user_prompt)
        });
        let output_tokens = reply
            .output_tokens
            .unwrap_or_else(|| estimate_tokens(&reply.text));

        let hit_limit = call
            .params
            .max_tokens
            .is_some_and(|max| output_tokens >= u64::from(max));
        let termination = if reply.truncated || hit_limit {
            Termination::MaxTokens
        } else {
            Termination::Normal
        };

        debug!(
            model = %model.id,
            input_tokens,
            output_tokens,
            duration_ms = elapsed.as_millis() as u64,
            "dispatch finished"
        );

        Completion {
            text: reply.text,
            input_tokens,
            output_tokens,
            duration_ms: elapsed.as_millis() as u64,
            termination,
        }
    }
}
