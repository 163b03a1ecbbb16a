//! CLI handlers for `base`, `send` and `upload`.

use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;

use super::split_assignment;
use crate::error::GatewayError;
use crate::gateway::{FormData, Gateway, RequestBody, RequestOptions, UploadOptions};
use crate::http::parse_json_lenient;

/// Handle `authgate base [url]`.
pub fn handle_base(gateway: &Gateway, url: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    match url {
        Some(url) => {
            reqwest::Url::parse(url).map_err(|e| format!("Invalid base URL {url:?}: {e}"))?;
            gateway.set_api_base(url)?;
            println!("✅ API base set to {url}");
        }
        None => println!("{}", gateway.api_base()),
    }
    Ok(())
}

/// Handle `authgate send <path>`.
pub async fn handle_send(
    gateway: &Gateway,
    path: &str,
    method: &str,
    headers: &[String],
    data: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = build_options(method, headers, data)?;
    let response = match gateway.send(path, options).await {
        Ok(response) => response,
        Err(GatewayError::SessionExpired) => {
            return Err("Session expired; log in again with `authgate auth login`".into());
        }
        Err(e) => return Err(e.into()),
    };

    let status = response.status();
    let bytes = response.bytes().await?;
    eprintln!("HTTP {status}");
    let body = parse_json_lenient(&bytes);
    if body.as_object().is_some_and(|o| o.is_empty()) && !bytes.is_empty() {
        // Not JSON; show it raw.
        println!("{}", String::from_utf8_lossy(&bytes));
    } else {
        println!("{}", serde_json::to_string_pretty(&body)?);
    }
    if !status.is_success() {
        std::process::exit(2);
    }
    Ok(())
}

/// Handle `authgate upload <path>`.
pub async fn handle_upload(
    gateway: &Gateway,
    path: &str,
    fields: &[String],
    files: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut form = FormData::new();
    for raw in fields {
        let (name, value) =
            split_assignment(raw).ok_or_else(|| format!("Expected name=value, got {raw:?}"))?;
        form = form.text(name, value);
    }
    for raw in files {
        let (name, value) =
            split_assignment(raw).ok_or_else(|| format!("Expected name=@path, got {raw:?}"))?;
        let file_path = value.strip_prefix('@').unwrap_or(value);
        form = form.file_from_path(name, file_path).await?;
    }
    if form.is_empty() {
        return Err("Nothing to upload; pass at least one -F or -f".into());
    }

    let last = Arc::new(AtomicU8::new(0));
    let progress = last.clone();
    let options = UploadOptions::new().on_progress(move |percent| {
        progress.store(percent, Ordering::Relaxed);
        eprint!("\r⏫ {percent:>3}%");
        let _ = std::io::stderr().flush();
    });

    let result = gateway.upload(path, form, options).await;
    if last.load(Ordering::Relaxed) > 0 {
        eprintln!();
    }
    eprintln!("HTTP {}", result.status);
    println!("{}", serde_json::to_string_pretty(&result.body)?);
    if !result.ok {
        std::process::exit(2);
    }
    Ok(())
}

fn build_options(
    method: &str,
    headers: &[String],
    data: Option<&str>,
) -> Result<RequestOptions, Box<dyn std::error::Error>> {
    let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("Invalid method {method:?}"))?;
    let mut options = RequestOptions {
        method,
        ..RequestOptions::default()
    };
    for raw in headers {
        let (name, value) = raw
            .split_once(':')
            .ok_or_else(|| format!("Expected `Name: value`, got {raw:?}"))?;
        options = options.with_header(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    if let Some(data) = data {
        let value: serde_json::Value =
            serde_json::from_str(data).map_err(|e| format!("--data is not valid JSON: {e}"))?;
        options.body = Some(RequestBody::Json(value));
    }
    Ok(options)
}
