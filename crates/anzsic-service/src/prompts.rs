//! Prompt templates for Stage 2.
//!
//! Centralized so prompt changes diff cleanly and never touch service logic.
//! The system prompt must keep the literal token "JSON": some providers
//! require the word in system instructions before honoring structured-output
//! mode.

use anzsic_domain::Candidate;

const RERANK_SYSTEM_BASE: &str = "\
You are an expert ANZSIC (Australian and New Zealand Standard Industrial \
Classification) coder.
Your job is to match a poorly-worded occupation or business description \
provided by a non-expert to the correct ANZSIC codes.

You will be given:
1. The user's raw input description
2. A numbered list of candidate ANZSIC codes retrieved by a search system \
(each with its description, class, group, division, and a \"Not included\" \
exclusion note where one exists)

Your task:
- Carefully read each candidate.
- Use the \"Not included\" exclusion text to ELIMINATE candidates that are \
explicitly ruled out.
- Select the best-matching codes, ranked from most to least likely, returning \
at most the number requested in the user message.
- For each selected code provide a short plain-English reason (1-2 sentences) \
explaining WHY it matches.
- If fewer candidates genuinely match, return fewer. Do not pad with poor \
matches.

Respond ONLY with a JSON array of objects in this exact schema \
(no markdown fences):
[
  {
    \"rank\": 1,
    \"code\": \"X1234_56\",
    \"reason\": \"...\"
  },
  ...
]
";

const REFERENCE_HEADER: &str = "\
FULL ANZSIC REFERENCE - the candidate list above may be insufficient.
Every catalogue code is listed below as:  CODE: description
Use this reference to find a better match if none of the candidates fit.
";

/// Assembles the system prompt, optionally appending the full catalogue
/// reference for the fallback attempt.
pub fn build_system_prompt(reference: Option<&str>) -> String {
	let Some(reference) = reference.filter(|reference| !reference.is_empty()) else {
		return RERANK_SYSTEM_BASE.to_string();
	};
	let divider = "-".repeat(77);

	format!("{RERANK_SYSTEM_BASE}\n{divider}\n{REFERENCE_HEADER}{divider}\n{reference}")
}

/// Assembles the user-turn message: verbatim query plus the numbered
/// candidate block.
pub fn build_user_message(query: &str, candidates: &[Candidate], top_k: u32) -> String {
	format!(
		"User input: \"{query}\"\n\nCandidates ({total} total):\n{block}\nReturn the top {top_k} matches as a JSON array.",
		total = candidates.len(),
		block = build_candidate_block(candidates),
	)
}

fn build_candidate_block(candidates: &[Candidate]) -> String {
	let mut out = String::new();

	for (i, candidate) in candidates.iter().enumerate() {
		out.push_str(&format!(
			"[{idx}] Code: {code}\n    Occupation: {description}\n    Class: {class}\n    Group: {group}\n    Division: {division}\n",
			idx = i + 1,
			code = candidate.code,
			description = candidate.description,
			class = candidate.class_desc,
			group = candidate.group_desc,
			division = candidate.division_desc,
		));

		if !candidate.class_exclusions.is_empty() {
			out.push_str(&format!("    Not included: {}\n", candidate.class_exclusions));
		}

		out.push('\n');
	}

	out
}
