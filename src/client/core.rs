use crate::batch::{BatchReport, Dispatcher};
use crate::client::builder::LlmClientBuilder;
use crate::client::execution::CallStats;
use crate::types::{
    ChatRequest, Completion, PromptInput, RequestDefaults, SendOptions, SendOutput,
};
use crate::{Error, ErrorContext, Result};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Client for an OpenAI-compatible chat completion endpoint.
///
/// Each prompt becomes one request. Batches run concurrently under a per-call gate and
/// come back in input order, or not at all: the first terminal failure fails the call.
#[derive(Clone)]
pub struct LlmClient {
    model: String,
    dispatcher: Dispatcher,
    defaults: RequestDefaults,
    concurrency: usize,
    timeout: Duration,
}

impl LlmClient {
    pub(crate) fn new(
        model: String,
        dispatcher: Dispatcher,
        defaults: RequestDefaults,
        concurrency: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            model,
            dispatcher,
            defaults,
            concurrency,
            timeout,
        }
    }

    pub fn builder() -> LlmClientBuilder {
        LlmClientBuilder::new()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn request_defaults(&self) -> &RequestDefaults {
        &self.defaults
    }

    /// Request body for one prompt.
    pub fn prep(&self, prompt: &str) -> ChatRequest {
        ChatRequest::from_prompt(&self.model, prompt, &self.defaults)
    }

    pub async fn send(&self, prompt: &str) -> Result<Completion> {
        self.send_with(prompt, SendOptions::default()).await
    }

    pub async fn send_with(&self, prompt: &str, options: SendOptions) -> Result<Completion> {
        let mut out = self
            .dispatch(vec![prompt.to_string()], options, None)
            .await?
            .0;
        out.pop().ok_or_else(|| {
            Error::runtime_with_context(
                "no completion returned",
                ErrorContext::new().with_source("llm_client"),
            )
        })
    }

    /// Send every prompt; completions come back in the same order.
    pub async fn send_batch<S: AsRef<str>>(&self, prompts: &[S]) -> Result<Vec<Completion>> {
        self.send_batch_with(prompts, SendOptions::default()).await
    }

    pub async fn send_batch_with<S: AsRef<str>>(
        &self,
        prompts: &[S],
        options: SendOptions,
    ) -> Result<Vec<Completion>> {
        Ok(self.dispatch(owned(prompts), options, None).await?.0)
    }

    /// Like [`send_batch_with`](Self::send_batch_with), also returning per-request stats.
    pub async fn send_batch_with_stats<S: AsRef<str>>(
        &self,
        prompts: &[S],
        options: SendOptions,
    ) -> Result<(Vec<Completion>, Vec<CallStats>)> {
        self.dispatch(owned(prompts), options, None).await
    }

    /// Send a batch that stops early once `cancel` fires.
    ///
    /// Pending work ends with [`Error::Cancelled`] and the call returns after every task
    /// has settled.
    pub async fn send_batch_with_cancel<S: AsRef<str>>(
        &self,
        prompts: &[S],
        options: SendOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Completion>> {
        Ok(self.dispatch(owned(prompts), options, Some(cancel)).await?.0)
    }

    /// Send a single prompt or a batch; the output mirrors the input's shape.
    pub async fn send_input(&self, input: PromptInput, options: SendOptions) -> Result<SendOutput> {
        match input {
            PromptInput::Single(prompt) => {
                self.send_with(&prompt, options).await.map(SendOutput::Single)
            }
            PromptInput::Batch(prompts) => Ok(SendOutput::Batch(
                self.dispatch(prompts, options, None).await?.0,
            )),
        }
    }

    /// Blocking variant of [`send_input`](Self::send_input) for synchronous callers.
    ///
    /// Runs on a private current-thread runtime that lives only for this call. Calling it
    /// from inside an async runtime is an error.
    pub fn send_blocking(&self, input: PromptInput, options: SendOptions) -> Result<SendOutput> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(Error::runtime_with_context(
                "send_blocking called from within an async runtime",
                ErrorContext::new()
                    .with_source("llm_client")
                    .with_details("use send_input().await instead"),
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.send_input(input, options))
    }

    async fn dispatch(
        &self,
        prompts: Vec<String>,
        options: SendOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<(Vec<Completion>, Vec<CallStats>)> {
        let requests: Vec<ChatRequest> = prompts.iter().map(|p| self.prep(p)).collect();
        let concurrency = options.concurrency.unwrap_or(self.concurrency);
        let timeout = options.timeout.unwrap_or(self.timeout);

        let report: BatchReport<Value> = match cancel {
            Some(token) => {
                self.dispatcher
                    .run_with_cancel(&requests, concurrency, timeout, token)
                    .await?
            }
            None => {
                self.dispatcher
                    .run_with_report(&requests, concurrency, timeout)
                    .await?
            }
        };

        let completions = prompts
            .into_iter()
            .zip(report.responses)
            .map(|(prompt, response)| Completion { prompt, response })
            .collect();
        Ok((completions, report.stats))
    }
}

fn owned<S: AsRef<str>>(prompts: &[S]) -> Vec<String> {
    prompts.iter().map(|p| p.as_ref().to_string()).collect()
}
