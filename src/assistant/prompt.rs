use crate::context::ContextDigest;

const PERSONA: &str = r#"You are WheelieMap Safety Assistant.

Your job is to help a student move more safely and confidently across campus,
especially at night, in bad weather, or in areas that feel empty or sketchy.

You have recent crowdsourced safety reports from students. Each report can include:
- "Slippery": icy / wet / uneven / wheelchair-hostile surface
- "Low Lighting": poor lighting, dim areas, burned-out lamps
- "Isolated": very empty, quiet, feels unsafe or hard to call for help

Use those real reports to answer questions.
You should:
- Be calm, direct, supportive.
- Suggest staying in well-lit / higher-traffic areas.
- Suggest alternate main paths instead of cutting through isolated shortcuts.
- If risk seems high, gently suggest walking with a friend or using a campus escort.
- If risk seems low, you can say it's mostly fine, but still encourage awareness.

NEVER invent crimes or emergencies that aren't in the data.
You MAY infer general risk patterns ("several low-light reports near that area tonight").

Keep answers to 3-5 sentences.
End with 1 actionable safety tip."#;

/// Persona and rules followed by the recent report context.
pub fn build_policy_prompt(digest: &ContextDigest) -> String {
    format!(
        "{PERSONA}\n\nRecent campus context:\n{}",
        digest.render_context_block()
    )
}

/// The single prompt sent to the backend.
pub fn build_full_prompt(policy_prompt: &str, user_message: &str) -> String {
    format!("{policy_prompt}\n\nUser question:\n{}", user_message.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{summarize, ContextConfig};

    #[test]
    fn prompt_carries_context_and_trimmed_question() {
        let digest = summarize(&[], &ContextConfig::default());
        let policy = build_policy_prompt(&digest);
        assert!(policy.starts_with("You are WheelieMap Safety Assistant."));
        assert!(policy.contains("Recent campus context:\nRecent safety reports (most recent first):"));
        assert!(policy.ends_with("- Isolated: 0"));

        let full = build_full_prompt(&policy, "   is the quad safe?\n");
        assert!(full.ends_with("\n\nUser question:\nis the quad safe?"));
    }
}
