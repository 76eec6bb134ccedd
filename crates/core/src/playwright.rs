//! Playwright-backed [`BrowserAutomation`].
//!
//! A long-lived `node` child runs [`BRIDGE_JS`], which keeps Playwright
//! objects in a handle table. Each call is one JSON line on the child's
//! stdin answered by one JSON line on its stdout:
//!
//! ```text
//! → {"id":3,"op":"fill","page":"page-3","selector":"#q","text":"flu jab"}
//! ← {"id":3,"ok":true,"value":null}
//! ```
//!
//! Calls are serialized through a mutex; the bridge handles one request at
//! a time, which matches the sequential run model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::automation::{
    BrowserAutomation, BrowserEngine, BrowserHandle, ContextHandle, PageHandle, WaitOutcome,
};
use crate::config::PlaywrightConfig;
use crate::error::{Error, Result};

/// Node program driving Playwright on behalf of [`PlaywrightDriver`]
pub const BRIDGE_JS: &str = r#"
const readline = require('readline');
const pw = require(process.env.STEPWRIGHT_PLAYWRIGHT_MODULE || 'playwright');

const objects = new Map();
let counter = 0;
const store = (prefix, obj) => {
  const id = `${prefix}-${++counter}`;
  objects.set(id, obj);
  return id;
};
const get = (id) => {
  const obj = objects.get(id);
  if (!obj) throw new Error(`unknown handle ${id}`);
  return obj;
};
const close = async (id) => {
  await get(id).close();
  objects.delete(id);
  return null;
};

const ops = {
  launch: async (r) => store('browser', await pw[r.engine].launch({
    headless: r.headless,
    channel: r.channel || undefined,
  })),
  new_context: async (r) => store('context', await get(r.browser).newContext()),
  new_page: async (r) => store('page', await get(r.context).newPage()),
  navigate: async (r) => { await get(r.page).goto(r.url); return null; },
  fill: async (r) => { await get(r.page).fill(r.selector, r.text); return null; },
  click: async (r) => { await get(r.page).click(r.selector); return null; },
  wait_for_selector: async (r) => {
    try {
      await get(r.page).waitForSelector(r.selector, { timeout: r.timeout_ms });
      return 'found';
    } catch (e) {
      if (e && e.name === 'TimeoutError') return 'timed_out';
      throw e;
    }
  },
  content: async (r) => get(r.page).content(),
  url: async (r) => get(r.page).url(),
  locator_count: async (r) => get(r.page).locator(r.selector).count(),
  close_page: async (r) => close(r.page),
  close_context: async (r) => close(r.context),
  close_browser: async (r) => close(r.browser),
};

const reply = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');

const rl = readline.createInterface({ input: process.stdin });
rl.on('line', async (line) => {
  let req;
  try {
    req = JSON.parse(line);
  } catch (e) {
    return;
  }
  try {
    const op = ops[req.op];
    if (!op) throw new Error(`unknown op ${req.op}`);
    const value = await op(req);
    reply({ id: req.id, ok: true, value: value === undefined ? null : value });
  } catch (e) {
    reply({ id: req.id, ok: false, error: String((e && e.message) || e) });
  }
});
rl.on('close', async () => {
  for (const [id, obj] of objects) {
    if (id.startsWith('browser-')) await obj.close().catch(() => {});
  }
  process.exit(0);
});
"#;

/// One bridge operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request {
    Launch {
        engine: &'static str,
        channel: Option<&'static str>,
        headless: bool,
    },
    NewContext {
        browser: String,
    },
    NewPage {
        context: String,
    },
    Navigate {
        page: String,
        url: String,
    },
    Fill {
        page: String,
        selector: String,
        text: String,
    },
    Click {
        page: String,
        selector: String,
    },
    WaitForSelector {
        page: String,
        selector: String,
        timeout_ms: u64,
    },
    Content {
        page: String,
    },
    Url {
        page: String,
    },
    LocatorCount {
        page: String,
        selector: String,
    },
    ClosePage {
        page: String,
    },
    CloseContext {
        context: String,
    },
    CloseBrowser {
        browser: String,
    },
}

impl Request {
    /// Edge is Chromium with the `msedge` channel
    fn launch(engine: BrowserEngine, headless: bool) -> Self {
        let (engine, channel) = match engine {
            BrowserEngine::Edge => ("chromium", Some("msedge")),
            other => (other.as_str(), None),
        };
        Request::Launch {
            engine,
            channel,
            headless,
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: &'a Request,
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

impl Response {
    fn into_result(self) -> Result<Value> {
        if self.ok {
            Ok(self.value)
        } else {
            Err(Error::Browser(
                self.error.unwrap_or_else(|| "unknown bridge failure".to_string()),
            ))
        }
    }
}

struct Bridge {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

/// Drives a real browser through Playwright
pub struct PlaywrightDriver {
    bridge: Mutex<Bridge>,
}

impl PlaywrightDriver {
    /// Check node is available, then start the bridge process
    pub async fn start(config: &PlaywrightConfig) -> Result<Self> {
        Self::check_node_installed(&config.node_binary).await?;

        info!(node = %config.node_binary, module = %config.module, "Starting Playwright bridge");
        let mut child = Command::new(&config.node_binary)
            .arg("-e")
            .arg(BRIDGE_JS)
            .env("STEPWRIGHT_PLAYWRIGHT_MODULE", &config.module)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Bridge(format!("failed to spawn {}: {}", config.node_binary, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Bridge("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Bridge("bridge stdout unavailable".to_string()))?;

        Ok(Self {
            bridge: Mutex::new(Bridge {
                child,
                stdin,
                lines: BufReader::new(stdout).lines(),
                next_id: 0,
            }),
        })
    }

    async fn check_node_installed(node: &str) -> Result<()> {
        let status = Command::new(node)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(Error::Bridge(format!("{} --version exited with {}", node, status))),
            Err(e) => Err(Error::Bridge(format!("{} not found: {}", node, e))),
        }
    }

    /// Send one request and wait for its response
    async fn call(&self, request: Request) -> Result<Value> {
        let mut bridge = self.bridge.lock().await;
        bridge.next_id += 1;
        let id = bridge.next_id;

        let mut line = serde_json::to_string(&Envelope {
            id,
            request: &request,
        })?;
        trace!(%line, "→ bridge");
        line.push('\n');
        bridge.stdin.write_all(line.as_bytes()).await?;
        bridge.stdin.flush().await?;

        loop {
            let Some(reply) = bridge.lines.next_line().await? else {
                return Err(Error::Bridge("bridge exited unexpectedly".to_string()));
            };
            trace!(%reply, "← bridge");

            match serde_json::from_str::<Response>(&reply) {
                Ok(response) if response.id == id => return response.into_result(),
                Ok(response) => warn!(id = response.id, "Dropping stale bridge response"),
                Err(_) => debug!("bridge: {}", reply),
            }
        }
    }

    async fn call_unit(&self, request: Request) -> Result<()> {
        self.call(request).await.map(|_| ())
    }

    async fn call_string(&self, request: Request) -> Result<String> {
        match self.call(request).await? {
            Value::String(s) => Ok(s),
            other => Err(Error::Bridge(format!("expected string, got {}", other))),
        }
    }

    /// Close stdin so the bridge closes its browsers, then wait for exit
    pub async fn shutdown(&self) -> Result<()> {
        let mut bridge = self.bridge.lock().await;
        bridge.stdin.shutdown().await?;
        let status = bridge.child.wait().await?;
        debug!(%status, "Playwright bridge exited");
        Ok(())
    }
}

#[async_trait]
impl BrowserAutomation for PlaywrightDriver {
    async fn launch(&self, engine: BrowserEngine, headless: bool) -> Result<BrowserHandle> {
        self.call_string(Request::launch(engine, headless))
            .await
            .map(BrowserHandle)
    }

    async fn new_context(&self, browser: &BrowserHandle) -> Result<ContextHandle> {
        self.call_string(Request::NewContext {
            browser: browser.0.clone(),
        })
        .await
        .map(ContextHandle)
    }

    async fn new_page(&self, context: &ContextHandle) -> Result<PageHandle> {
        self.call_string(Request::NewPage {
            context: context.0.clone(),
        })
        .await
        .map(PageHandle)
    }

    async fn navigate(&self, page: &PageHandle, url: &str) -> Result<()> {
        self.call_unit(Request::Navigate {
            page: page.0.clone(),
            url: url.to_string(),
        })
        .await
    }

    async fn fill(&self, page: &PageHandle, selector: &str, text: &str) -> Result<()> {
        self.call_unit(Request::Fill {
            page: page.0.clone(),
            selector: selector.to_string(),
            text: text.to_string(),
        })
        .await
    }

    async fn click(&self, page: &PageHandle, selector: &str) -> Result<()> {
        self.call_unit(Request::Click {
            page: page.0.clone(),
            selector: selector.to_string(),
        })
        .await
    }

    async fn wait_for_selector(
        &self,
        page: &PageHandle,
        selector: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome> {
        let outcome = self
            .call_string(Request::WaitForSelector {
                page: page.0.clone(),
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
            .await?;
        parse_wait_outcome(&outcome)
    }

    async fn content(&self, page: &PageHandle) -> Result<String> {
        self.call_string(Request::Content { page: page.0.clone() }).await
    }

    async fn url(&self, page: &PageHandle) -> Result<String> {
        self.call_string(Request::Url { page: page.0.clone() }).await
    }

    async fn locator_count(&self, page: &PageHandle, selector: &str) -> Result<usize> {
        let value = self
            .call(Request::LocatorCount {
                page: page.0.clone(),
                selector: selector.to_string(),
            })
            .await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| Error::Bridge(format!("expected count, got {}", value)))
    }

    async fn close_page(&self, page: &PageHandle) -> Result<()> {
        self.call_unit(Request::ClosePage { page: page.0.clone() }).await
    }

    async fn close_context(&self, context: &ContextHandle) -> Result<()> {
        self.call_unit(Request::CloseContext {
            context: context.0.clone(),
        })
        .await
    }

    async fn close_browser(&self, browser: &BrowserHandle) -> Result<()> {
        self.call_unit(Request::CloseBrowser {
            browser: browser.0.clone(),
        })
        .await
    }
}

fn parse_wait_outcome(value: &str) -> Result<WaitOutcome> {
    match value {
        "found" => Ok(WaitOutcome::Found),
        "timed_out" => Ok(WaitOutcome::TimedOut),
        other => Err(Error::Bridge(format!("unknown wait outcome '{}'", other))),
    }
}
