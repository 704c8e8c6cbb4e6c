// Shared prompt constants.
// Chain-specific templates live in orchestrator/prompts.rs; this file holds
// the system prompt and the fragments shared across chains.

/// System prompt sent with every generation call.
pub const ADVISOR_SYSTEM: &str = "You are an experienced career coach who helps job \
    applicants follow up on submitted applications. You are concise, concrete and \
    professional. You never fabricate facts about companies or people.";

/// Appended to prompts whose output is parsed as JSON.
pub const JSON_ONLY_INSTRUCTION: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to prompts that carry retrieved guidance.
pub const GROUNDING_INSTRUCTION: &str = "\
    Base your advice on the numbered guidance excerpts above and cite them inline \
    as [1], [2], ... Do NOT invent statistics that the excerpts do not contain.";

/// Appended to the generic-context variant when retrieval returned nothing usable.
pub const GENERIC_CONTEXT_INSTRUCTION: &str = "\
    No curated guidance is available for this question. Answer from general, \
    widely accepted job-search practice and say so briefly. Do NOT cite sources.";
