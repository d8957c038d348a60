// All LLM prompt templates for the Refinement module.

/// Sampling temperature for bullet generation and chat refinement.
pub const REFINEMENT_TEMPERATURE: f32 = 0.7;
/// Output cap for bullet generation and chat refinement.
pub const REFINEMENT_MAX_TOKENS: u32 = 1500;

/// First-pass refinement prompt. Replace `{job_description}` and `{resume_bullets}`.
pub const REFINEMENT_PROMPT_TEMPLATE: &str = r#"Optimize these resume bullets for the job description. Use strong action verbs, quantify achievements, and match JD requirements.

Job Description:
{job_description}

Current Bullets:
{resume_bullets}

Return ONLY optimized bullets in markdown format (one per line, starting with "- ").
- Return exactly the same number of bullets as input (one optimized bullet per input bullet)
- Do NOT repeat bullets
- Do NOT add explanations or reasoning
- Return only the bullet points, nothing else"#;

/// System message for chat refinement. Replace `{job_description}` and `{current_bullets}`.
/// The model must answer in the tagged format parsed by `refinement::tagged`.
pub const CHAT_SYSTEM_TEMPLATE: &str = r#"You are an expert resume writer helping to refine resume bullet points.

**Context:**
- Original Job Description: {job_description}
- Current Optimized Bullet Points:
{current_bullets}

**Your Task:**
The user will provide refinement requests (e.g., "Make the first bullet more sales-focused", "Add a bullet about project management", "Make it more technical").

You should:
1. Understand the user's request
2. Modify the resume bullet points accordingly
3. Return BOTH:
   - The updated bullet points (formatted as markdown with "- " for each bullet)
   - A brief response explaining what you changed

**Output Format:**
Your response should be in this format:
<BULLETS>
[Updated bullet points in markdown format]
</BULLETS>

<RESPONSE>
[Brief explanation of changes made]
</RESPONSE>"#;

const JOB_DESCRIPTION_MISSING: &str = "Not provided";

pub fn build_refinement_prompt(job_description: &str, bullets: &str) -> String {
    fill_template(
        REFINEMENT_PROMPT_TEMPLATE,
        &[
            ("{job_description}", job_description),
            ("{resume_bullets}", bullets),
        ],
    )
}

/// Builds the system message that grounds every chat turn in the job and current bullets.
pub fn build_chat_system_message(job_description: &str, current_bullets: &str) -> String {
    let job_description = if job_description.trim().is_empty() {
        JOB_DESCRIPTION_MISSING
    } else {
        job_description
    };
    fill_template(
        CHAT_SYSTEM_TEMPLATE,
        &[
            ("{job_description}", job_description),
            ("{current_bullets}", current_bullets),
        ],
    )
}

/// Substitutes placeholders in one left-to-right pass over the template.
/// Inserted values are never scanned again.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let extra: usize = values.iter().map(|(_, value)| value.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    loop {
        let next = values
            .iter()
            .filter_map(|(key, value)| rest.find(key).map(|pos| (pos, *key, *value)))
            .min_by_key(|(pos, _, _)| *pos);

        match next {
            Some((pos, key, value)) => {
                out.push_str(&rest[..pos]);
                out.push_str(value);
                rest = &rest[pos + key.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}
