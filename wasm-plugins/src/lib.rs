//! Sample external plugin: answers every request of a route with a fixed
//! maintenance page, except for an optional list of source addresses.
//!
//! Exports the plugin ABI expected by the host: `memory`, `alloc`, `kind`,
//! `configure` and `process`. Payloads are JSON in linear memory; `process`
//! returns its reply as `(ptr << 32) | len`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

const KIND_ROUTE: i32 = 1;
const DEFAULT_MESSAGE: &str = "Service under maintenance";
const DEFAULT_STATUS: u16 = 503;

#[derive(Debug, Clone, PartialEq)]
struct Settings {
    enabled: bool,
    message: String,
    status_code: u16,
    allowed_ips: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            message: DEFAULT_MESSAGE.to_string(),
            status_code: DEFAULT_STATUS,
            allowed_ips: Vec::new(),
        }
    }
}

impl Settings {
    fn from_map(map: &BTreeMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            enabled: map
                .get("enabled")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(defaults.enabled),
            message: map
                .get("message")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.message),
            status_code: map
                .get("status_code")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.status_code),
            allowed_ips: map
                .get("allowed_ips")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

static SETTINGS: Mutex<Option<Settings>> = Mutex::new(None);

#[derive(Deserialize)]
struct ContextDto {
    domain: Option<String>,
}

#[derive(Serialize, Default)]
struct ResultDto {
    haproxy_config: String,
    metadata: BTreeMap<String, serde_json::Value>,
}

fn snippet(settings: &Settings) -> String {
    let message = settings.message.replace('"', "\\\"");
    let mut lines = vec!["# Maintenance - Serve a static page".to_string()];

    let condition = if settings.allowed_ips.is_empty() {
        String::new()
    } else {
        lines.push(format!("acl maintenance_bypass src {}", settings.allowed_ips.join(" ")));
        " if !maintenance_bypass".to_string()
    };
    lines.push(format!(
        "http-request return status {} content-type text/plain string \"{message}\"{condition}",
        settings.status_code
    ));

    lines.join("\n    ")
}

fn handle(ctx: &ContextDto, settings: &Settings) -> ResultDto {
    if !settings.enabled {
        return ResultDto::default();
    }

    let mut metadata = BTreeMap::new();
    if let Some(domain) = &ctx.domain {
        metadata.insert("domain".to_string(), domain.clone().into());
    }
    metadata.insert("status_code".to_string(), settings.status_code.into());

    ResultDto {
        haproxy_config: snippet(settings),
        metadata,
    }
}

/// SAFETY: the host writes exactly `len` bytes at `ptr`, obtained from `alloc`.
unsafe fn input<'a>(ptr: i32, len: i32) -> &'a [u8] {
    unsafe { core::slice::from_raw_parts(ptr as usize as *const u8, len as usize) }
}

/// Leaks `bytes` and packs their location for the host.
fn output(bytes: Vec<u8>) -> i64 {
    let bytes = bytes.into_boxed_slice();
    let len = bytes.len() as u64;
    let ptr = Box::leak(bytes).as_ptr() as usize as u64;
    ((ptr << 32) | len) as i64
}

#[unsafe(no_mangle)]
pub extern "C" fn alloc(len: i32) -> i32 {
    let mut buf = Vec::<u8>::with_capacity(len.max(0) as usize);
    let ptr = buf.as_mut_ptr();
    core::mem::forget(buf);
    ptr as usize as i32
}

#[unsafe(no_mangle)]
pub extern "C" fn kind() -> i32 {
    KIND_ROUTE
}

#[unsafe(no_mangle)]
pub extern "C" fn configure(ptr: i32, len: i32) {
    // SAFETY: see `input`.
    let raw = unsafe { input(ptr, len) };
    let map: BTreeMap<String, String> = serde_json::from_slice(raw).unwrap_or_default();

    if let Ok(mut slot) = SETTINGS.lock() {
        *slot = Some(Settings::from_map(&map));
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn process(ptr: i32, len: i32) -> i64 {
    // SAFETY: see `input`.
    let raw = unsafe { input(ptr, len) };
    let ctx = serde_json::from_slice(raw).unwrap_or(ContextDto { domain: None });
    let settings = SETTINGS
        .lock()
        .ok()
        .and_then(|s| s.clone())
        .unwrap_or_default();

    let result = handle(&ctx, &settings);
    output(serde_json::to_vec(&result).unwrap_or_else(|_| b"{}".to_vec()))
}
