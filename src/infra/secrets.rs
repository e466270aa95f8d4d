use std::panic;

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_MARKERS: [&str; 6] = [
    "bearer",
    "secret",
    "token",
    "password",
    "assertion",
    "sig=",
];

const SENSITIVE_FIELDS: [&str; 6] = [
    "access_token",
    "accessToken",
    "refresh_token",
    "id_token",
    "client_secret",
    "token",
];

const MAX_BODY_LOG_LEN: usize = 500;

pub fn redact_text(input: &str) -> String {
    let mut previous_was_bearer = false;
    input
        .split_whitespace()
        .map(|chunk| {
            let hide = previous_was_bearer || is_sensitive_chunk(chunk);
            previous_was_bearer = chunk.eq_ignore_ascii_case("bearer");
            if hide {
                REDACTED.to_owned()
            } else {
                chunk.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncates a response body and blanks token fields so it is safe to log.
pub fn sanitize_response_body(body: &str) -> String {
    if let Ok(mut json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(object) = json.as_object_mut() {
            for field in SENSITIVE_FIELDS {
                if let Some(value) = object.get_mut(field) {
                    *value = serde_json::Value::String(REDACTED.to_owned());
                }
            }
        }
        return truncate(&json.to_string());
    }

    truncate(&redact_text(body))
}

pub fn install_panic_redaction_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic payload omitted".to_owned());

        let scrubbed = redact_text(&payload);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "armdeploy panic: {} at {}:{}:{}",
                scrubbed,
                location.file(),
                location.line(),
                location.column()
            );
        } else {
            eprintln!("armdeploy panic: {}", scrubbed);
        }
    }));
}

fn is_sensitive_chunk(chunk: &str) -> bool {
    let lowered = chunk.to_ascii_lowercase();
    SENSITIVE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
        || looks_like_jwt(chunk)
}

fn looks_like_jwt(value: &str) -> bool {
    let cleaned = value.trim_matches(|ch: char| !ch.is_ascii_alphanumeric());
    cleaned.starts_with("eyJ") && cleaned.matches('.').count() >= 2
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_BODY_LOG_LEN {
        return text.to_owned();
    }

    let mut end = MAX_BODY_LOG_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated, {} total bytes]", &text[..end], text.len())
}
