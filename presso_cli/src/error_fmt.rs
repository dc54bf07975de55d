//! Human-readable error descriptions and structured JSON error formatting.

use presso_core::error::{DispatchError, ProfileError, StoreError};

/// Stable name for a dispatch outcome, used in JSON output.
pub fn dispatch_reason_name(e: &DispatchError) -> &'static str {
    match e {
        DispatchError::Unauthorized => "Unauthorized",
        DispatchError::EmptyProfile => "EmptyProfile",
        DispatchError::PayloadTooLarge { .. } => "PayloadTooLarge",
        DispatchError::Transport(_) => "Transport",
        DispatchError::AckTimeout { .. } => "AckTimeout",
        DispatchError::Busy => "Busy",
        DispatchError::Cancelled => "Cancelled",
        DispatchError::Encode(_) => "Encode",
    }
}

fn humanize_dispatch(de: &DispatchError) -> String {
    match de {
        DispatchError::Unauthorized => "What happened: The dispatch credential was rejected.\nLikely causes: Wrong --credential, PRESSO_CREDENTIAL not set, or auth.secret changed.\nHow to fix: Pass the operator credential with --credential or export PRESSO_CREDENTIAL.".to_string(),
        DispatchError::EmptyProfile => "What happened: The profile compiled to no motion commands, so nothing was sent.\nLikely causes: Fewer than two points, or every segment is shorter than one second.\nHow to fix: Add points at least one whole second apart (`presso save NAME --point 0:9 --point 5:6`).".to_string(),
        DispatchError::PayloadTooLarge { size, limit } => format!(
            "What happened: The compiled profile is {size} bytes, over the {limit} byte limit.\nLikely causes: Too many segments for the machine's receive buffer.\nHow to fix: Merge short segments or raise dispatch.max_payload_bytes if the firmware allows it."
        ),
        DispatchError::Transport(msg) => format!(
            "What happened: Talking to the broker failed ({msg}).\nLikely causes: Wrong broker host/port, TLS or credentials rejected, or the network is down.\nHow to fix: Check [broker] in the config and that the broker is reachable."
        ),
        DispatchError::AckTimeout { waited_ms } => format!(
            "What happened: The profile was sent but the machine did not acknowledge within {waited_ms} ms.\nLikely causes: Machine offline, not subscribed to the command topic, or acknowledging on another topic.\nHow to fix: Check the machine is powered and connected, verify [topics], or raise --ack-timeout-ms."
        ),
        DispatchError::Busy => "What happened: Another dispatch to this machine is still in flight.\nLikely causes: A previous send has not been acknowledged yet.\nHow to fix: Wait for it to finish, then retry.".to_string(),
        DispatchError::Cancelled => "What happened: The dispatch was cancelled while waiting for the acknowledgment.\nLikely causes: Ctrl-C was pressed.\nHow to fix: Re-run the dispatch; the machine may or may not have received the profile.".to_string(),
        DispatchError::Encode(msg) => format!(
            "What happened: The command sequence could not be encoded ({msg}).\nLikely causes: Internal error.\nHow to fix: Re-run with --log-level=debug and report the output."
        ),
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(de) = err.downcast_ref::<DispatchError>() {
        return humanize_dispatch(de);
    }

    if let Some(se) = err.downcast_ref::<StoreError>() {
        return match se {
            StoreError::InvalidName(name) => format!(
                "What happened: {name:?} is not a valid profile name.\nLikely causes: Spaces, slashes or other punctuation in the name.\nHow to fix: Use letters, digits, '-' and '_' only (at most 64 characters)."
            ),
            StoreError::NotFound(name) => format!(
                "What happened: No profile named {name:?} exists.\nLikely causes: Typo, or profiles.dir points somewhere else.\nHow to fix: Run `presso list` to see stored profiles."
            ),
            StoreError::Profile { name, source } => format!(
                "What happened: Stored profile {name:?} is invalid ({source}).\nLikely causes: The CSV was edited by hand.\nHow to fix: Fix the file or save the profile again with `presso save`."
            ),
            StoreError::Backend(msg) => format!(
                "What happened: Profile storage failed ({msg}).\nLikely causes: Missing permissions or a malformed CSV.\nHow to fix: Check profiles.dir and the file contents."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<ProfileError>() {
        return format!(
            "What happened: The profile is invalid ({pe}).\nLikely causes: Pressure outside the machine's range, or repeated times.\nHow to fix: Keep pressures within {}-{} bar and give each point a distinct time.",
            presso_core::PRESSURE_MIN_BAR,
            presso_core::PRESSURE_MAX_BAR,
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("auth secret is not configured") {
        return "What happened: No dispatch secret is configured.\nLikely causes: [auth] has neither secret nor secret_env, or the named variable is unset.\nHow to fix: Set auth.secret_env in the config and export that variable.".to_string();
    }

    if lower.contains("profile csv must have headers") {
        return "Invalid headers in profile CSV. Expected 'time,pressure'.".to_string();
    }

    if lower.contains("invalid configuration") || lower.contains("parse config") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: Missing [broker] section, or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Details: {msg}"
    )
}

/// Stable exit codes per dispatch outcome; everything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<DispatchError>() {
        Some(DispatchError::Unauthorized) => 2,
        Some(DispatchError::EmptyProfile) => 3,
        Some(DispatchError::PayloadTooLarge { .. }) => 4,
        Some(DispatchError::Transport(_)) => 5,
        Some(DispatchError::AckTimeout { .. }) => 6,
        Some(DispatchError::Busy) => 7,
        Some(DispatchError::Cancelled) => 8,
        Some(DispatchError::Encode(_)) | None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = if let Some(de) = err.downcast_ref::<DispatchError>() {
        dispatch_reason_name(de)
    } else if err.downcast_ref::<StoreError>().is_some() {
        "Store"
    } else if err.downcast_ref::<ProfileError>().is_some() {
        "InvalidProfile"
    } else {
        "Error"
    };
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_dispatch_outcome() {
        let cases = [
            (DispatchError::Unauthorized, 2),
            (DispatchError::EmptyProfile, 3),
            (DispatchError::PayloadTooLarge { size: 600, limit: 500 }, 4),
            (DispatchError::Transport("x".into()), 5),
            (DispatchError::AckTimeout { waited_ms: 5000 }, 6),
            (DispatchError::Busy, 7),
            (DispatchError::Cancelled, 8),
        ];
        for (e, code) in cases {
            assert_eq!(exit_code_for_error(&eyre::Report::new(e)), code);
        }
        assert_eq!(exit_code_for_error(&eyre::eyre!("boom")), 1);
    }

    #[test]
    fn timeout_message_mentions_wait() {
        let msg = humanize(&eyre::Report::new(DispatchError::AckTimeout { waited_ms: 250 }));
        assert!(msg.starts_with("What happened:"));
        assert!(msg.contains("250 ms"));
    }

    #[test]
    fn json_error_has_reason_and_message() {
        let s = format_error_json(&eyre::Report::new(DispatchError::Unauthorized));
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["reason"], "Unauthorized");
        assert!(v["message"].as_str().unwrap().contains("credential"));
    }
}
