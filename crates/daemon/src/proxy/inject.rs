// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instrumentation injection for proxied HTML responses.
//!
//! The injected payload is the browser-side diagnostics agent. Its only
//! contract with the daemon is the WebSocket endpoint path and the JSON
//! frame shapes; everything else about it is opaque to the proxy.

/// WebSocket endpoint served by every proxy.
pub const METRICS_PATH: &str = "/__devtool_metrics";

/// Bootstrap script inserted into proxied HTML. Uses relative URLs
/// (`window.location.host`) so it works through any tunnel.
pub const AGENT_SCRIPT: &str = r#"<script>(function(){
var proto=location.protocol==="https:"?"wss://":"ws://";
var ws;function connect(){ws=new WebSocket(proto+location.host+"/__devtool_metrics");
ws.onclose=function(){setTimeout(connect,2000)};
ws.onmessage=function(ev){var m;try{m=JSON.parse(ev.data)}catch(e){return}
if(m.type==="execute"){var t0=performance.now(),out;
try{out={id:m.data.id,result:String(eval(m.data.code))}}
catch(err){out={id:m.data.id,error:String(err)}}
out.duration_ms=Math.round(performance.now()-t0);
send("execution",out)}};}
function send(type,data){if(ws&&ws.readyState===1)ws.send(JSON.stringify({type:type,data:data,url:location.href}))}
window.addEventListener("error",function(ev){send("error",{message:ev.message,source:ev.filename||"",line:ev.lineno||0,column:ev.colno||0,stack:ev.error&&ev.error.stack})});
window.addEventListener("load",function(){setTimeout(function(){var t=performance.timing;
send("performance",{dom_content_loaded_ms:t.domContentLoadedEventEnd-t.navigationStart,load_ms:t.loadEventEnd-t.navigationStart,resource_count:performance.getEntriesByType("resource").length})},0)});
connect();})();</script>"#;

/// Find the end of an opening tag like `<head ...>` starting at a
/// lowercase match of `<name`. Returns the byte offset just past `>`.
///
/// Guards against prefix collisions (`<header>` is not `<head>`).
fn opening_tag_end(lower: &str, name: &str, from: usize) -> Option<usize> {
    let needle = format!("<{name}");
    let mut search = from;
    while let Some(rel) = lower[search..].find(&needle) {
        let start = search + rel;
        let after = start + needle.len();
        match lower.as_bytes().get(after) {
            Some(b'>') => return Some(after + 1),
            Some(c) if c.is_ascii_whitespace() => {
                return lower[after..].find('>').map(|i| after + i + 1);
            }
            _ => search = after,
        }
    }
    None
}

/// Inject the agent script into an HTML document.
///
/// Insertion order: before `</head>`, after `<head…>`, after `<body…>`,
/// after `<html…>`, else prepended. Always succeeds; the caller only
/// needs the rewritten document.
pub fn inject_into_html(html: &str) -> String {
    let lower = html.to_ascii_lowercase();

    let insert_at = lower
        .find("</head>")
        .or_else(|| opening_tag_end(&lower, "head", 0))
        .or_else(|| opening_tag_end(&lower, "body", 0))
        .or_else(|| opening_tag_end(&lower, "html", 0))
        .unwrap_or(0);

    let mut out = String::with_capacity(html.len() + AGENT_SCRIPT.len());
    out.push_str(&html[..insert_at]);
    out.push_str(AGENT_SCRIPT);
    out.push_str(&html[insert_at..]);
    out
}

/// Whether a Content-Type header names an HTML body.
pub fn is_html_content_type(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    lowered.starts_with("text/html") || lowered.starts_with("application/xhtml+xml")
}

#[cfg(test)]
#[path = "inject_tests.rs"]
mod tests;
