//! LLM judge prompt templates (spec §4.4/§6.3). Three templates — one per
//! condition kind — all impose the same four-rule discipline verbatim:
//! ENTITY, PROOF, DIRECTIONAL PRECISION, THRESHOLD. This discipline must never be
//! paraphrased away; it is the contract the judge is graded against.

use verity_core::traits::ConditionKind;

const RULES: &str = r#"Apply these four rules strictly:
1. ENTITY: the candidate text must be about the SAME subject/entity as the condition. Do not match on topical similarity alone.
2. PROOF: the candidate must state evidence that something happened, not a hypothetical risk, possibility, or forecast.
3. DIRECTIONAL PRECISION: parse the condition's wording exactly — "above" is not "at or above"; "terminated" is not "at risk of termination".
4. THRESHOLD: when the condition names a specific numeric threshold, the candidate must state a value that actually crosses it — do not infer a crossing from adjacent numbers."#;

const SCHEMA: &str = r#"Respond with a single JSON object and nothing else, matching exactly:
{"matches": boolean, "confidence": number between 0 and 1, "reasoning": string (optional), "relevantButNotViolation": boolean (optional)}"#;

pub fn build_prompt(kind: ConditionKind, condition: &str, candidate_content: &str) -> String {
    let verb = match kind {
        ConditionKind::InvalidatesIf => "invalidates",
        ConditionKind::ConfirmsIf => "confirms",
        ConditionKind::Assumes => "undermines the assumption behind",
    };
    format!(
        "You are judging whether a piece of evidence {verb} a belief condition.\n\n\
         Condition: \"{condition}\"\n\
         Candidate evidence: \"{candidate_content}\"\n\n\
         {RULES}\n\n\
         {SCHEMA}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_all_four_rules() {
        let p = build_prompt(ConditionKind::InvalidatesIf, "AAPL above 200", "AAPL closed at 205");
        assert!(p.contains("ENTITY"));
        assert!(p.contains("PROOF"));
        assert!(p.contains("DIRECTIONAL PRECISION"));
        assert!(p.contains("THRESHOLD"));
    }
}
