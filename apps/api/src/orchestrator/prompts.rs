// Prompt templates for the synthesis chains.
// Placeholders are `{name}` and are filled with `str::replace` before sending.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Shared situation block. Replace: {company}, {position}, {days}, {connection}, {contact}, {culture}
pub const SITUATION_TEMPLATE: &str = "CURRENT SITUATION:
- Company: {company}
- Position: {position}
- Applied {days} days ago
- Connection: {connection}
- Following up with: {contact}
- Company culture: {culture}";

/// Replace: {wait_days}, {act_now}, {timing_confidence}, {q_value}, {style}, {style_confidence}
pub const DECISION_TEMPLATE: &str = "POLICY RECOMMENDATION (learned from simulated and real follow-up outcomes):
- Wait {wait_days} days before following up ({act_now})
- Timing confidence: {timing_confidence}% (expected value {q_value})
- Message style: {style}
- Expected response rate for this style: {style_confidence}%";

/// Replace: {situation}, {decision}, {context}
pub const TIMING_ADVISOR_TEMPLATE: &str = r#"You are helping a job seeker decide when to follow up on an application.

{situation}

{decision}

{context}

YOUR TASK:
Combine the policy recommendation with the guidance into one clear recommendation. Cover:
1. When to follow up (a specific day)
2. Why this timing works for this kind of company
3. What to do if they have already waited longer than recommended

Be concise (150-200 words), confident and practical. Use "you should" language."#;

/// Replace: {situation}, {decision}, {draft}, {context}, {json_only}
pub const MESSAGE_COACH_TEMPLATE: &str = r#"You are reviewing a follow-up message a job seeker is about to send.

{situation}

{decision}

DRAFT MESSAGE:
"""
{draft}
"""

{context}

Score the draft from 1 to 10, list concrete improvements, and rewrite it in the recommended style.
Return a JSON object with this EXACT schema (no extra fields):
{
  "score": 6,
  "feedback": ["Open with the role you applied for", "Ask one specific question"],
  "improved_message": "Hi Dana, ..."
}

{json_only}"#;

/// Replace: {situation}, {decision}, {contacts}, {context}
pub const STRATEGY_TEMPLATE: &str = r#"You are building a complete follow-up strategy for a job application.

{situation}

{decision}

{contacts}

{context}

YOUR TASK:
Write a step-by-step plan with these sections:
1. Timing: when to send the first follow-up and when to send a second one
2. Message: what to say and in which tone, given the recommended style
3. Research: what to learn about the company before writing
4. Outreach: who to contact and in what order

Keep it under 350 words. Be specific to this company type and culture."#;

/// Replace: {question}, {context}
pub const CAREER_QA_TEMPLATE: &str = r#"Answer the job seeker's question about following up on applications.

QUESTION:
{question}

{context}

Be specific and actionable. Keep the answer under 200 words."#;

/// Replace: {company_type}, {wait_days}, {timing_confidence}, {q_value}
pub const EXPLAIN_TIMING_TEMPLATE: &str = r#"Explain a follow-up timing recommendation to a non-technical job seeker.

- Recommended wait: {wait_days} days
- Confidence: {timing_confidence}%
- Expected value score: {q_value}
- Company type: {company_type}

In 2-3 sentences explain why this timing makes sense and how confident we are, WITHOUT jargon such as "Q-value" or "reinforcement learning"."#;

/// Replace: {company_type}, {culture}, {style}, {style_confidence}, {observations}
pub const EXPLAIN_STYLE_TEMPLATE: &str = r#"Explain a follow-up message style recommendation to a non-technical job seeker.

- Recommended style: {style}
- Expected response rate: {style_confidence}%
- Outcomes observed for this kind of contact: {observations}
- Company type: {company_type}, culture: {culture}

In 2-3 sentences explain why this style tends to get answers here and how confident we are, WITHOUT jargon such as "Thompson Sampling" or "posterior"."#;
