//! Rewriting of standalone Puppeteer recordings into BackstopJS
//! `onBefore` scripts.
//!
//! A Chrome DevTools recording exported as a Puppeteer script launches its
//! own browser inside a self-invoking async block. BackstopJS instead calls
//! an exported `(page, scenario, vp)` function with a page it already owns,
//! so the launch/newPage/timeout preamble, the `browser.close()` call and
//! the trailing `.catch` handler are removed.

use std::sync::LazyLock;

use regex::Regex;

/// Timeout used when the recording does not declare one.
pub const DEFAULT_RECORDING_TIMEOUT: &str = "5000";

/// Header of every generated adapter function.
pub const ADAPTER_SIGNATURE: &str = "module.exports = async (page, scenario, vp) => {";

static GOTO_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\.goto\(['"]([^'"]+)['"]"#).unwrap());

static TIMEOUT_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"const\s+timeout\s*=\s*(\d+);").unwrap());

/// Result of adapting a recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptedRecording {
    /// Adapter source exporting `(page, scenario, vp)`.
    pub source: String,
    /// True when the script could not be rewritten and only the initial
    /// navigation was kept.
    pub fallback: bool,
}

/// Rewrite `script` into an adapter callable by BackstopJS.
///
/// Scripts without a self-invoking async block get a fallback adapter that
/// only navigates to the first URL passed to `.goto(...)`.
pub fn adapt(script: &str) -> AdaptedRecording {
    match rewrite(script) {
        Some(source) => AdaptedRecording {
            source,
            fallback: false,
        },
        None => AdaptedRecording {
            source: fallback_adapter(first_goto_url(script).as_deref()),
            fallback: true,
        },
    }
}

/// First literal URL passed to a `.goto(...)` call.
pub fn first_goto_url(script: &str) -> Option<String> {
    GOTO_URL
        .captures(script)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn declared_timeout(script: &str) -> &str {
    TIMEOUT_DECL
        .captures(script)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(DEFAULT_RECORDING_TIMEOUT)
}

fn rewrite(script: &str) -> Option<String> {
    let timeout = declared_timeout(script);
    let lines: Vec<&str> = script.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 2);
    let mut exported = false;
    let mut awaiting_timeout = false;

    for (i, line) in lines.iter().enumerate() {
        if line.contains("require('puppeteer')") || line.contains("require(\"puppeteer\")") {
            out.push("const puppeteer = require('puppeteer');".to_string());
            continue;
        }

        if !exported && line.contains("(async () => {") {
            out.push(ADAPTER_SIGNATURE.to_string());
            out.push(format!("    const timeout = {};", timeout));
            exported = true;
            awaiting_timeout = true;
            continue;
        }

        if line.contains("puppeteer.launch(")
            || line.contains("browser.newPage()")
            || (line.contains("const browser") && line.contains("await"))
        {
            continue;
        }

        if awaiting_timeout && line.contains("const timeout") {
            awaiting_timeout = false;
            continue;
        }

        if line.contains("setDefaultTimeout") || line.contains("browser.close()") {
            continue;
        }

        if line.contains("})().catch") || (line.contains("catch") && i + 5 > lines.len()) {
            break;
        }

        out.push(line.to_string());
    }

    if !exported {
        return None;
    }

    let ends_closed = out
        .iter()
        .rev()
        .find(|l| !l.trim().is_empty())
        .is_some_and(|l| l.trim().ends_with("};"));
    if !ends_closed {
        out.push("};".to_string());
    }

    let mut source = out.join("\n");
    source.push('\n');
    Some(source)
}

/// Adapter that only replays the initial navigation.
///
/// Every other recorded action is lost; the original script is kept next to
/// the adapter so it can be ported by hand.
pub fn fallback_adapter(url: Option<&str>) -> String {
    let navigation = match url {
        Some(url) => format!(
            "  await page.goto({}, {{ waitUntil: 'networkidle0' }});\n",
            js_string(url)
        ),
        None => "  // No navigation found in the original recording.\n".to_string(),
    };
    format!("{}\n{}}};\n", ADAPTER_SIGNATURE, navigation)
}

fn js_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}
