//! Disposable QuickJS sandbox for one server-render call.
//!
//! Every render provisions a fresh runtime and context; nothing survives
//! past the call, so a throwing or hung script cannot corrupt later renders.
//! The host bridge exposes exactly four capabilities to the running script:
//! the HTML capture op, a UTF-8 encode op backing a `TextEncoder` shim,
//! a promise-backed `queueMicrotask`, and a minimal `MessageChannel` pair.
//! No filesystem, network, or process access exists inside the boundary.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rquickjs::function::Func;
use rquickjs::{CatchResultExt, Context, Ctx, Runtime};
use thiserror::Error;

/// Host global the bundled server script calls to hand HTML back.
pub const CAPTURE_GLOBAL: &str = "__viewsmith_capture_html";

/// Execution limits for one render.
#[derive(Debug, Clone)]
pub struct EngineLimits {
    /// Wall-clock ceiling enforced through the interpreter interrupt hook.
    pub budget: Duration,
    /// Maximum number of microtasks executed while settling.
    pub job_budget: u64,
    /// Sandbox heap ceiling in bytes.
    pub max_memory_bytes: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(5),
            job_budget: 10_000,
            max_memory_bytes: 128 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("render did not settle within {budget_ms} ms / {job_budget} microtasks")]
    Timeout { budget_ms: u64, job_budget: u64 },

    #[error("server script failed: {message}")]
    Script { message: String },

    #[error("server script settled without capturing any HTML")]
    NoCapture,

    #[error("failed to provision a script engine: {message}")]
    Provision { message: String },
}

fn provision(err: impl std::fmt::Display) -> EngineError {
    EngineError::Provision {
        message: err.to_string(),
    }
}

fn timeout(limits: &EngineLimits) -> EngineError {
    EngineError::Timeout {
        budget_ms: limits.budget.as_millis() as u64,
        job_budget: limits.job_budget,
    }
}

// Pure-JS shims layered over the two host ops. Ports deliver through the
// microtask queue so cross-port messaging settles under the same job budget
// as promise chains.
const BRIDGE_SHIMS: &str = r#""use strict";
globalThis.queueMicrotask = (callback) => {
  if (typeof callback !== "function") {
    throw new TypeError("queueMicrotask expects a function");
  }
  Promise.resolve().then(callback);
};

globalThis.TextEncoder = class TextEncoder {
  get encoding() { return "utf-8"; }
  encode(input) {
    const text = input === undefined ? "" : String(input);
    return new Uint8Array(__viewsmith_encode_utf8(text));
  }
};

class __ViewsmithPort {
  constructor() {
    this.onmessage = null;
    this._peer = null;
    this._closed = false;
  }
  postMessage(data) {
    const peer = this._peer;
    if (!peer || this._closed) return;
    queueMicrotask(() => {
      if (!peer._closed && typeof peer.onmessage === "function") {
        peer.onmessage({ data });
      }
    });
  }
  start() {}
  close() { this._closed = true; }
}

globalThis.MessageChannel = class MessageChannel {
  constructor() {
    this.port1 = new __ViewsmithPort();
    this.port2 = new __ViewsmithPort();
    this.port1._peer = this.port2;
    this.port2._peer = this.port1;
  }
};
"#;

fn caught_message(ctx: &Ctx<'_>) -> String {
    let caught = ctx.catch();
    if let Some(exception) = caught.as_exception() {
        if let Some(message) = exception.message() {
            return message;
        }
    }
    caught
        .get::<String>()
        .unwrap_or_else(|_| "script raised a non-error value".to_string())
}

/// Execute one server-render script to quiescence and return the captured
/// HTML. Blocking; callers go through [`crate::EnginePool`] which moves the
/// work onto a blocking thread.
pub fn render_blocking(code: &str, limits: &EngineLimits) -> Result<String, EngineError> {
    let runtime = Runtime::new().map_err(provision)?;
    runtime.set_memory_limit(limits.max_memory_bytes);

    let timed_out = Arc::new(AtomicBool::new(false));
    let deadline = Instant::now() + limits.budget;
    {
        let timed_out = Arc::clone(&timed_out);
        runtime.set_interrupt_handler(Some(Box::new(move || {
            if Instant::now() >= deadline {
                timed_out.store(true, Ordering::SeqCst);
                true
            } else {
                false
            }
        })));
    }

    let context = Context::full(&runtime).map_err(provision)?;
    let captured: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

    // Bridge installation failure is an engine defect, not a script error.
    context
        .with(|ctx| -> Result<(), rquickjs::Error> {
            let globals = ctx.globals();
            let capture = Rc::clone(&captured);
            globals.set(
                CAPTURE_GLOBAL,
                Func::from(move |html: String| {
                    // Last call wins within one render.
                    *capture.borrow_mut() = Some(html);
                }),
            )?;
            globals.set(
                "__viewsmith_encode_utf8",
                Func::from(|text: String| -> Vec<u8> { text.into_bytes() }),
            )?;
            ctx.eval::<(), _>(BRIDGE_SHIMS)
        })
        .map_err(provision)?;

    let evaluated: Result<(), String> = context.with(|ctx| {
        ctx.eval::<(), _>(code)
            .catch(&ctx)
            .map_err(|err| err.to_string())
    });
    if let Err(message) = evaluated {
        if timed_out.load(Ordering::SeqCst) {
            return Err(timeout(limits));
        }
        return Err(EngineError::Script { message });
    }

    // Drive the pending-work queue to quiescence within the step budget.
    let mut jobs_executed: u64 = 0;
    loop {
        if jobs_executed >= limits.job_budget {
            if runtime.is_job_pending() {
                return Err(timeout(limits));
            }
            break;
        }
        match runtime.execute_pending_job() {
            Ok(true) => jobs_executed += 1,
            Ok(false) => break,
            Err(_) => {
                if timed_out.load(Ordering::SeqCst) {
                    return Err(timeout(limits));
                }
                let message = context.with(|ctx| caught_message(&ctx));
                return Err(EngineError::Script { message });
            }
        }
    }

    let html = captured.borrow_mut().take();
    match html {
        Some(html) => Ok(html),
        None => Err(EngineError::NoCapture),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> EngineLimits {
        EngineLimits {
            budget: Duration::from_millis(500),
            job_budget: 1_000,
            max_memory_bytes: 32 * 1024 * 1024,
        }
    }

    #[test]
    fn captures_html_synchronously() {
        let html = render_blocking(r#"__viewsmith_capture_html("<div>ok</div>");"#, &limits())
            .expect("capture should succeed");
        assert_eq!(html, "<div>ok</div>");
    }

    #[test]
    fn later_capture_calls_win() {
        let html = render_blocking(
            r#"__viewsmith_capture_html("<p>first</p>");
__viewsmith_capture_html("<p>last</p>");"#,
            &limits(),
        )
        .unwrap();
        assert_eq!(html, "<p>last</p>");
    }

    #[test]
    fn promise_deferred_capture_settles() {
        let html = render_blocking(
            r#"Promise.resolve("<main>async</main>").then((markup) => {
  __viewsmith_capture_html(markup);
});"#,
            &limits(),
        )
        .unwrap();
        assert_eq!(html, "<main>async</main>");
    }

    #[test]
    fn queue_microtask_capture_settles() {
        let html = render_blocking(
            r#"queueMicrotask(() => __viewsmith_capture_html("<span>task</span>"));"#,
            &limits(),
        )
        .unwrap();
        assert_eq!(html, "<span>task</span>");
    }

    #[test]
    fn message_channel_delivers_through_microtasks() {
        let html = render_blocking(
            r#"const { port1, port2 } = new MessageChannel();
port2.onmessage = (event) => __viewsmith_capture_html(event.data);
port1.postMessage("<ul>streamed</ul>");"#,
            &limits(),
        )
        .unwrap();
        assert_eq!(html, "<ul>streamed</ul>");
    }

    #[test]
    fn text_encoder_shim_encodes_utf8() {
        let html = render_blocking(
            r#"const bytes = new TextEncoder().encode("héllo");
__viewsmith_capture_html(`<i>${bytes.length}</i>`);"#,
            &limits(),
        )
        .unwrap();
        assert_eq!(html, "<i>6</i>");
    }

    #[test]
    fn throw_before_capture_is_a_script_error_with_message() {
        let err = render_blocking(r#"throw new Error("boom");"#, &limits()).unwrap_err();
        match err {
            EngineError::Script { message } => assert!(message.contains("boom"), "{message}"),
            other => panic!("expected Script error, got {other:?}"),
        }
    }

    #[test]
    fn rejection_in_microtask_is_a_script_error() {
        let err = render_blocking(
            r#"Promise.resolve().then(() => { throw new Error("late boom"); });"#,
            &limits(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Script { .. }));
    }

    #[test]
    fn quiescence_without_capture_is_distinct_from_timeout() {
        let err = render_blocking("1 + 1;", &limits()).unwrap_err();
        assert!(matches!(err, EngineError::NoCapture));
    }

    #[test]
    fn runaway_synchronous_loop_hits_wall_clock_budget() {
        let tight = EngineLimits {
            budget: Duration::from_millis(50),
            ..limits()
        };
        let err = render_blocking("for (;;) {}", &tight).unwrap_err();
        assert!(matches!(err, EngineError::Timeout { .. }));
    }

    #[test]
    fn self_requeueing_microtask_hits_job_budget() {
        let tight = EngineLimits {
            job_budget: 64,
            ..limits()
        };
        let err = render_blocking(
            r#"function spin() { queueMicrotask(spin); }
spin();
__viewsmith_capture_html("<div>never settles</div>");"#,
            &tight,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Timeout { .. }));
    }

    #[test]
    fn state_does_not_leak_between_renders() {
        render_blocking(
            r#"globalThis.counter = 41; __viewsmith_capture_html("<b>first</b>");"#,
            &limits(),
        )
        .unwrap();
        let err = render_blocking(
            r#"__viewsmith_capture_html(`<b>${counter}</b>`);"#,
            &limits(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Script { .. }));
    }

    #[test]
    fn unicode_markup_round_trips() {
        let html = render_blocking(
            r#"__viewsmith_capture_html("<p>café 👋</p>");"#,
            &limits(),
        )
        .unwrap();
        assert_eq!(html, "<p>café 👋</p>");
    }
}
