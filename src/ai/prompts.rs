use super::client::GenerationRequest;

pub const SUMMARY_THINKING_BUDGET: u32 = 0;
pub const HOT_TOPICS_THINKING_BUDGET: u32 = 512;

const SUMMARY_SYSTEM: &str = "\
You are a trend analyst and podcast scriptwriter for an AI-powered news product. Your audience \
expects concise, insightful and engaging audio summaries about specific global or niche trends: \
tech, politics, culture, finance, science.

Produce podcast-ready structured summaries for any trend keyword or phrase. Output ONLY a JSON \
object following the schema provided. Keep your voice clear, confident and human-friendly. Do not \
speculate unless clearly necessary. Never include code, markdown or surrounding text.";

const SUMMARY_EXAMPLE: &str = r#"{
  "headline": "A short, compelling headline that captures the essence of the trend.",
  "summary": "A podcast-style spoken summary of 10-15 sentences. Start with a hook, give background and current context, highlight major points and conclude smoothly.",
  "key_points": [
    "Bullet-point list of 4-6 key facts, developments, stats or takeaways related to the trend."
  ],
  "call_to_action": "A short, friendly wrap-up that invites the listener to stay informed or check back later.",
  "references": [
    {
      "title": "Title of a real news article about the trend",
      "url": "https://www.reuters.com/...",
      "source": "Reuters",
      "date": "2025-01-31"
    }
  ]
}"#;

const HOT_TOPICS_SYSTEM: &str = "\
You are a trend analyst specializing in artificial intelligence developments. Identify and \
summarize the most current and relevant AI trends from the last 3-6 months.

Always return a valid JSON array only. Never include markdown, explanations or any text outside \
the JSON structure. Keep titles concise, descriptions brief and queries comprehensive.";

const HOT_TOPICS_PROMPT: &str = r#"You are an AI trend analyst for TrendBits, a platform that tracks the latest developments in artificial intelligence.

Generate 6 hot AI topics that are currently trending or recently announced. Each topic is a JSON object:

{
  "icon": "Brain" | "TrendingUp" | "Zap" | "Cpu" | "Globe" | "Rocket",
  "title": "Concise, catchy title (max 4 words)",
  "description": "Brief description of the trend (max 60 characters)",
  "query": "Detailed search query to find more information about this topic"
}

Focus on model releases, funding rounds and acquisitions, new industry applications, AI hardware, policy and regulation, and research breakthroughs.

Return ONLY a JSON array of 6 objects."#;

pub fn summary_prompt(topic: &str) -> String {
    format!(
        "You are an AI assistant for a trend analysis platform called TrendBits.\n\n\
         Summarize the trend below in a narrative, engaging format suitable for a 1-3 minute \
         podcast segment. Your output must strictly follow this JSON example; every field except \
         \"references\" is required, and references must only cite well-known news outlets:\n\n\
         {SUMMARY_EXAMPLE}\n\n\
         Include relevant dates, names, events and background explaining what is happening, why \
         it matters and what comes next. Do not add disclaimers. Do not wrap the JSON in markdown.\n\n\
         Trend to summarize:\n{topic}"
    )
}

pub fn summary_request(prompt: &str) -> GenerationRequest<'_> {
    GenerationRequest {
        system_instruction: SUMMARY_SYSTEM,
        prompt,
        thinking_budget: SUMMARY_THINKING_BUDGET,
    }
}

pub fn hot_topics_request() -> GenerationRequest<'static> {
    GenerationRequest {
        system_instruction: HOT_TOPICS_SYSTEM,
        prompt: HOT_TOPICS_PROMPT,
        thinking_budget: HOT_TOPICS_THINKING_BUDGET,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_prompt_embeds_topic_and_schema() {
        let p = summary_prompt("solid-state batteries");
        assert!(p.ends_with("solid-state batteries"));
        assert!(p.contains("\"call_to_action\""));
        assert_eq!(summary_request(&p).thinking_budget, 0);
    }

    #[test]
    fn example_is_valid_json() {
        let v: serde_json::Value = serde_json::from_str(SUMMARY_EXAMPLE).unwrap();
        assert!(v["key_points"].is_array());
    }
}
