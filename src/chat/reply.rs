//! Validation of the backend's reply payload.
//!
//! The backend contract is `{ "reply"?: string, "session_id"?: string }`, but
//! any JSON is tolerated: a body that does not carry a usable reply is
//! classified, never rejected. Workflow engines occasionally echo an
//! unresolved expression (for example `={{$json.output}}`) instead of the
//! evaluated text; such replies are flagged so they never reach the user.

use serde_json::Value;

/// Default template-leak markers: unresolved n8n expressions.
pub const DEFAULT_LEAK_MARKERS: [&str; 2] = ["{{$json", "{{ $json"];

/// What the reply field amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Usable reply text, kept verbatim.
    Reply(String),
    /// Missing, not a string, or blank.
    Missing,
    /// Contains raw templating syntax.
    TemplateLeak,
}

/// Result of classifying one response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub verdict: Verdict,
    /// Non-blank session identifier returned by the backend, if any.
    pub session_id: Option<String>,
}

/// Rules applied to every backend response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPolicy {
    leak_markers: Vec<String>,
}

impl Default for ReplyPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LEAK_MARKERS.iter().map(ToString::to_string))
    }
}

impl ReplyPolicy {
    /// Build a policy from a list of markers. Empty markers are ignored,
    /// they would match every reply.
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let leak_markers = markers
            .into_iter()
            .map(Into::into)
            .filter(|m: &String| !m.is_empty())
            .collect();
        Self { leak_markers }
    }

    #[must_use]
    pub fn leak_markers(&self) -> &[String] {
        &self.leak_markers
    }

    /// Whether `text` carries any template-leak marker.
    #[must_use]
    pub fn is_leak(&self, text: &str) -> bool {
        self.leak_markers.iter().any(|m| text.contains(m.as_str()))
    }

    #[must_use]
    pub fn classify(&self, body: &Value) -> Classified {
        let verdict = match body.get("reply").and_then(Value::as_str) {
            Some(text) if text.trim().is_empty() => Verdict::Missing,
            Some(text) if self.is_leak(text) => Verdict::TemplateLeak,
            Some(text) => Verdict::Reply(text.to_string()),
            None => Verdict::Missing,
        };

        let session_id = body
            .get("session_id")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(ToString::to_string);

        Classified {
            verdict,
            session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_reply() {
        let out = ReplyPolicy::default().classify(&json!({ "reply": "Hello" }));
        assert_eq!(out.verdict, Verdict::Reply("Hello".to_string()));
        assert_eq!(out.session_id, None);
    }

    #[test]
    fn test_reply_is_kept_verbatim() {
        let out = ReplyPolicy::default().classify(&json!({ "reply": "  line one\nline two " }));
        assert_eq!(
            out.verdict,
            Verdict::Reply("  line one\nline two ".to_string())
        );
    }

    #[test]
    fn test_missing_or_blank_reply() {
        let policy = ReplyPolicy::default();
        for body in [
            json!({}),
            json!({ "reply": "" }),
            json!({ "reply": "   \n" }),
            json!({ "reply": null }),
            json!({ "reply": 42 }),
            json!({ "reply": ["a"] }),
            json!("just a string"),
            json!([1, 2, 3]),
        ] {
            assert_eq!(policy.classify(&body).verdict, Verdict::Missing, "{body}");
        }
    }

    #[test]
    fn test_template_leak() {
        let policy = ReplyPolicy::default();
        for reply in ["={{$json.data}}", "Answer: {{$json.output}}", "{{ $json.text }}"] {
            let out = policy.classify(&json!({ "reply": reply }));
            assert_eq!(out.verdict, Verdict::TemplateLeak, "{reply}");
        }
    }

    #[test]
    fn test_ordinary_braces_are_not_a_leak() {
        let out = ReplyPolicy::default().classify(&json!({ "reply": "use {{name}} here" }));
        assert!(matches!(out.verdict, Verdict::Reply(_)));
    }

    #[test]
    fn test_session_id_extraction() {
        let policy = ReplyPolicy::default();

        let out = policy.classify(&json!({ "reply": "Hi", "session_id": "S-2" }));
        assert_eq!(out.session_id.as_deref(), Some("S-2"));

        let out = policy.classify(&json!({ "reply": "Hi", "session_id": "  " }));
        assert_eq!(out.session_id, None);

        let out = policy.classify(&json!({ "session_id": 7 }));
        assert_eq!(out.session_id, None);

        // Session affinity is honoured even when the reply itself is unusable.
        let out = policy.classify(&json!({ "session_id": "S-3" }));
        assert_eq!(out.verdict, Verdict::Missing);
        assert_eq!(out.session_id.as_deref(), Some("S-3"));
    }

    #[test]
    fn test_custom_markers_skip_empty() {
        let policy = ReplyPolicy::new(["", "<%="]);
        assert_eq!(policy.leak_markers(), ["<%=".to_string()]);
        assert!(policy.is_leak("x <%= y %>"));
        assert!(!policy.is_leak("{{$json.a}}"));
    }
}
