//! Test doubles for every collaborator seam of the workers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::time::Instant;

use pipeworker::compiler::Compiler;
use pipeworker::plugin::{Invoker, InvokerFactory, PluginInstall, ProcessHandle, Session};
use pipeworker::project::Project;
use pipeworker::runner::{EltContext, ExtractLoadRunner, RunFuture, TransformRunner};
use pipeworker::workers::available::ProbeFuture;
use pipeworker::workers::{BrowserLauncher, EltRunners, HttpProbe};

/// A compiler that counts calls and fails the first `fail_times` of them.
#[derive(Debug, Default)]
pub struct RecordingCompiler {
    calls: AtomicUsize,
    fail_times: usize,
}

impl RecordingCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(fail_times: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_times,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Poll until at least `n` calls happened or `limit` elapsed.
    pub async fn wait_for_calls(&self, n: usize, limit: Duration) -> bool {
        let deadline = std::time::Instant::now() + limit;
        while std::time::Instant::now() < deadline {
            if self.calls() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.calls() >= n
    }
}

impl Compiler for RecordingCompiler {
    fn compile(&self) -> Result<()> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_times {
            Err(anyhow!("model file is broken (call {})", n + 1))
        } else {
            Ok(())
        }
    }
}

/// Shared record of what a [`FakeInvokerFactory`] was asked to do.
#[derive(Debug, Default)]
pub struct InvocationLog {
    /// `(session label, plugin name)` per `create` call.
    pub created: Vec<(String, String)>,
    /// Commands invoked, in order.
    pub invoked: Vec<String>,
    /// Commands whose process was terminated, in order.
    pub terminated: Vec<String>,
}

/// Invoker factory that hands out [`FakeProcess`]es instead of spawning.
#[derive(Debug, Clone, Default)]
pub struct FakeInvokerFactory {
    log: Arc<Mutex<InvocationLog>>,
    fail_on: Option<String>,
}

impl FakeInvokerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make invoking `command` fail.
    pub fn failing_on(command: &str) -> Self {
        Self {
            log: Arc::default(),
            fail_on: Some(command.to_string()),
        }
    }

    pub fn created(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().created.clone()
    }

    pub fn invoked(&self) -> Vec<String> {
        self.log.lock().unwrap().invoked.clone()
    }

    pub fn terminated(&self) -> Vec<String> {
        self.log.lock().unwrap().terminated.clone()
    }
}

impl InvokerFactory for FakeInvokerFactory {
    fn create(
        &self,
        session: &Session,
        _project: &Project,
        plugin: &PluginInstall,
    ) -> Result<Box<dyn Invoker>> {
        self.log
            .lock()
            .unwrap()
            .created
            .push((session.label().to_string(), plugin.name().to_string()));
        Ok(Box::new(FakeInvoker {
            log: Arc::clone(&self.log),
            fail_on: self.fail_on.clone(),
        }))
    }
}

struct FakeInvoker {
    log: Arc<Mutex<InvocationLog>>,
    fail_on: Option<String>,
}

impl Invoker for FakeInvoker {
    fn invoke(&self, command: &str) -> Result<Box<dyn ProcessHandle>> {
        if self.fail_on.as_deref() == Some(command) {
            return Err(anyhow!("executable for '{command}' not found"));
        }
        self.log.lock().unwrap().invoked.push(command.to_string());
        Ok(Box::new(FakeProcess {
            command: command.to_string(),
            log: Arc::clone(&self.log),
        }))
    }
}

/// Process handle that records terminations.
#[derive(Debug)]
pub struct FakeProcess {
    command: String,
    log: Arc<Mutex<InvocationLog>>,
}

impl ProcessHandle for FakeProcess {
    fn pid(&self) -> Option<u32> {
        None
    }

    fn terminate(&mut self) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .terminated
            .push(self.command.clone());
        Ok(())
    }
}

/// One recorded stage invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerCall {
    ExtractLoad {
        extractor: String,
        loader: String,
    },
    Transform {
        extractor: String,
        loader: String,
        models: String,
    },
}

/// Extract-load and transform runner that records calls instead of running.
#[derive(Debug, Default)]
pub struct RecordingRunners {
    calls: Mutex<Vec<RunnerCall>>,
    contexts: Mutex<Vec<EltContext>>,
    fail_extract_load: bool,
    fail_transform: bool,
}

impl RecordingRunners {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_extract_load() -> Arc<Self> {
        Arc::new(Self {
            fail_extract_load: true,
            ..Self::default()
        })
    }

    pub fn failing_transform() -> Arc<Self> {
        Arc::new(Self {
            fail_transform: true,
            ..Self::default()
        })
    }

    /// Both runner slots backed by `this`.
    pub fn runners(this: &Arc<Self>) -> EltRunners {
        EltRunners::new(this.clone(), this.clone())
    }

    pub fn calls(&self) -> Vec<RunnerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn contexts(&self) -> Vec<EltContext> {
        self.contexts.lock().unwrap().clone()
    }
}

impl ExtractLoadRunner for RecordingRunners {
    fn run<'a>(&'a self, ctx: &'a EltContext, extractor: &'a str, loader: &'a str) -> RunFuture<'a> {
        Box::pin(async move {
            self.contexts.lock().unwrap().push(ctx.clone());
            self.calls.lock().unwrap().push(RunnerCall::ExtractLoad {
                extractor: extractor.to_string(),
                loader: loader.to_string(),
            });
            if self.fail_extract_load {
                return Err(anyhow!("extractor '{extractor}' crashed"));
            }
            Ok(())
        })
    }
}

impl TransformRunner for RecordingRunners {
    fn run<'a>(
        &'a self,
        _ctx: &'a EltContext,
        extractor: &'a str,
        loader: &'a str,
        models: &'a str,
    ) -> RunFuture<'a> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(RunnerCall::Transform {
                extractor: extractor.to_string(),
                loader: loader.to_string(),
                models: models.to_string(),
            });
            if self.fail_transform {
                return Err(anyhow!("model '{models}' failed to build"));
            }
            Ok(())
        })
    }
}

/// HTTP probe replaying a script of responses.
///
/// `Ok(code)` entries are status codes, `Err(msg)` entries are request
/// errors. Once the script runs out, `fallback` is returned forever.
#[derive(Debug)]
pub struct ScriptedProbe {
    script: Mutex<VecDeque<std::result::Result<u16, String>>>,
    fallback: u16,
    requests: Mutex<Vec<Instant>>,
}

impl ScriptedProbe {
    pub fn new(script: Vec<std::result::Result<u16, String>>, fallback: u16) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// `failures` answers of `503`, then `200`.
    pub fn available_after(failures: usize) -> Arc<Self> {
        Self::new(vec![Ok(503); failures], 200)
    }

    /// Never answers `200`.
    pub fn never_available() -> Arc<Self> {
        Self::new(Vec::new(), 503)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Time between consecutive requests.
    pub fn gaps(&self) -> Vec<Duration> {
        let times = self.requests.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

impl HttpProbe for ScriptedProbe {
    fn get_status<'a>(&'a self, _url: &'a str) -> ProbeFuture<'a> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(Instant::now());
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(code)) => Ok(code),
                Some(Err(msg)) => Err(anyhow!(msg)),
                None => Ok(self.fallback),
            }
        })
    }
}

/// Browser launcher that records the URLs it was asked to open.
#[derive(Debug, Default)]
pub struct RecordingBrowser {
    opened: Mutex<Vec<String>>,
}

impl RecordingBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl BrowserLauncher for RecordingBrowser {
    fn open(&self, url: &str) -> Result<()> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}
