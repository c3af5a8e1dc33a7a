//! Robust 3-stage JSON parse for judge replies (spec §4.4): (1) parse the whole
//! body as JSON; (2) regex-extract the first `{...}` block; (3) conservative
//! fallback `{matches:false, confidence:0}`.

use regex::Regex;
use verity_core::traits::JudgeVerdict;

pub fn parse_judge_reply(body: &str) -> JudgeVerdict {
    if let Ok(v) = serde_json::from_str::<JudgeVerdict>(body) {
        return v;
    }

    if let Ok(re) = Regex::new(r"\{[\s\S]*\}") {
        if let Some(m) = re.find(body) {
            if let Ok(v) = serde_json::from_str::<JudgeVerdict>(m.as_str()) {
                return v;
            }
        }
    }

    tracing::warn!(body, "judge reply could not be parsed; defaulting to no-match");
    JudgeVerdict {
        matches: false,
        confidence: 0.0,
        reasoning: None,
        relevant_but_not_violation: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json() {
        let v = parse_judge_reply(r#"{"matches": true, "confidence": 0.9}"#);
        assert!(v.matches);
        assert!((v.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn extracts_json_embedded_in_prose() {
        let v = parse_judge_reply("Sure, here you go:\n{\"matches\": false, \"confidence\": 0.1}\nHope that helps!");
        assert!(!v.matches);
    }

    #[test]
    fn falls_back_conservatively_on_garbage() {
        let v = parse_judge_reply("not json at all");
        assert!(!v.matches);
        assert_eq!(v.confidence, 0.0);
    }
}
