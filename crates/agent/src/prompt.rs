//! Prompt templates and localized phrases.
//!
//! The ReAct protocol labels (`Thought:`, `Action:` ...) stay English in
//! both templates; only the surrounding instructions and the messages the
//! engine itself writes into the transcript are localized.

use reagent_core::tool::ToolDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Language of prompts and engine-written messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Cs,
}

impl Language {
    /// Parse a language code (`en`, `cs`). Unknown codes fall back to English.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "cs" | "cz" | "czech" => Self::Cs,
            _ => Self::En,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Cs => "cs",
        }
    }

    pub fn phrases(&self) -> &'static Phrases {
        match self {
            Self::En => &ENGLISH,
            Self::Cs => &CZECH,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Every message the engine writes on its own behalf.
///
/// Placeholders in braces are substituted with [`fill`].
#[derive(Debug)]
pub struct Phrases {
    pub next_step: &'static str,
    pub parameters: &'static str,
    pub no_tools: &'static str,
    pub truncated: &'static str,
    pub empty_result: &'static str,
    pub unknown_error: &'static str,
    pub tool_failed: &'static str,
    pub error: &'static str,
    pub execution_time: &'static str,
    pub low_relevance: &'static str,
    /// `{name}`, `{reason}`
    pub cannot_execute: &'static str,
    /// `{name}`
    pub no_tool_specified: &'static str,
    /// `{name}`
    pub not_registered: &'static str,
    /// `{name}`
    pub disabled: &'static str,
    /// `{name}`, `{secs}`
    pub hard_timeout: &'static str,
    /// `{name}`
    pub timeout: &'static str,
    /// `{name}`
    pub unauthorized: &'static str,
    /// `{name}`, `{reason}`
    pub invalid_parameters: &'static str,
    /// `{param}`, `{name}`
    pub missing_parameter: &'static str,
    /// `{name}`, `{reason}`
    pub execution_error: &'static str,
    /// `{name}`
    pub tool_cancelled: &'static str,
    /// `{input}`
    pub fallback_thought: &'static str,
    pub no_answer: &'static str,
    pub cancelled: &'static str,
    /// `{input}`, `{observations}`
    pub summary_prompt: &'static str,
    /// `{observations}`
    pub summary_fallback: &'static str,
    /// `{thought}`, `{hint}`
    pub refine_prompt: &'static str,
    /// `{original}`
    pub refined_reasoning: &'static str,
}

pub static ENGLISH: Phrases = Phrases {
    next_step: "What is the next step?",
    parameters: "Parameters",
    no_tools: "No tools are available.",
    truncated: "... (truncated)",
    empty_result: "Tool ran successfully but returned no content.",
    unknown_error: "Unknown error",
    tool_failed: "Tool failed",
    error: "Error",
    execution_time: "execution time",
    low_relevance: "low relevance",
    cannot_execute: "Cannot execute action {name}: {reason}",
    no_tool_specified: "no tool specified",
    not_registered: "tool {name} is not registered",
    disabled: "tool {name} is disabled",
    hard_timeout: "Tool {name} timed out ({secs} seconds).",
    timeout: "Tool {name} timed out. Try again or use a different tool.",
    unauthorized: "You are not authorized to use tool {name}.",
    invalid_parameters: "Invalid parameters for tool {name}: {reason}",
    missing_parameter: "Required parameter '{param}' is missing for tool {name}",
    execution_error: "Tool {name} failed: {reason}",
    tool_cancelled: "Execution of tool {name} was cancelled.",
    fallback_thought: "I need to analyze the request: {input}",
    no_answer: "I could not find an answer to your question.",
    cancelled: "Processing was cancelled.",
    summary_prompt: "Based on the following information answer the original question:\n\n\
                     Original question: {input}\n\n\
                     Available information:\n{observations}\n\n\
                     Provide a concise and useful answer:",
    summary_fallback: "Based on the available information: {observations}",
    refine_prompt: "Original thought: {thought}\n\n\
                    Problem or hint: {hint}\n\n\
                    Revise and improve the original thought. Keep the ReAct format \
                    (Thought/Action/Action Input or Final Answer).\n\
                    Improved thought:",
    refined_reasoning: "Refined version of an earlier thought. Original: {original}",
};

pub static CZECH: Phrases = Phrases {
    next_step: "Co je další krok?",
    parameters: "Parametry",
    no_tools: "Nástroje nejsou dostupné.",
    truncated: "... (zkráceno)",
    empty_result: "Nástroj byl úspěšně spuštěn, ale nevrátil žádný obsah.",
    unknown_error: "Neznámá chyba",
    tool_failed: "Nástroj selhal",
    error: "Chyba",
    execution_time: "čas vykonání",
    low_relevance: "nízká relevance",
    cannot_execute: "Nelze provést akci {name}: {reason}",
    no_tool_specified: "není zadán žádný nástroj",
    not_registered: "nástroj {name} není registrován",
    disabled: "nástroj {name} je vypnutý",
    hard_timeout: "Nástroj {name} vypršel časový limit ({secs} sekund).",
    timeout: "Nástroj {name} vypršel časový limit. Zkuste to znovu nebo použijte jiný nástroj.",
    unauthorized: "Nemáte oprávnění používat nástroj {name}.",
    invalid_parameters: "Neplatné parametry pro nástroj {name}: {reason}",
    missing_parameter: "Povinný parametr '{param}' chybí pro nástroj {name}",
    execution_error: "Nástroj {name} selhal: {reason}",
    tool_cancelled: "Provádění nástroje {name} bylo zrušeno.",
    fallback_thought: "Potřebuji analyzovat požadavek: {input}",
    no_answer: "Nepodařilo se najít odpověď na vaši otázku.",
    cancelled: "Zpracování bylo zrušeno.",
    summary_prompt: "Na základě následujících informací odpověz na původní otázku:\n\n\
                     Původní otázka: {input}\n\n\
                     Dostupné informace:\n{observations}\n\n\
                     Poskytni stručnou a užitečnou odpověď:",
    summary_fallback: "Na základě dostupných informací: {observations}",
    refine_prompt: "Původní myšlenka: {thought}\n\n\
                    Problém nebo nápověda: {hint}\n\n\
                    Uprav a vylepši původní myšlenku. Zachovej ReAct formát \
                    (Thought/Action/Action Input nebo Final Answer).\n\
                    Vylepšená myšlenka:",
    refined_reasoning: "Vylepšená verze původní myšlenky. Původní: {original}",
};

/// Substitute `{key}` placeholders in a phrase.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

/// Instructions and user-turn layout for one language.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub language: Language,
    pub system_prompt: String,
    /// Contains `{input}` and `{tools}`.
    pub user_prompt: String,
    pub few_shot_examples: Vec<String>,
    /// Prepend the few-shot examples to every thought prompt.
    pub include_examples: bool,
}

impl PromptTemplate {
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::En => Self::english(),
            Language::Cs => Self::czech(),
        }
    }

    pub fn english() -> Self {
        Self {
            language: Language::En,
            system_prompt: "You are an intelligent assistant that can use various tools to answer questions.
Follow the ReAct pattern: Thought → Action → Observation.

Response format:
Thought: Write your thinking about what you need to do
Action: tool_name
Action Input: {\"parameter\": \"value\"}
Observation: Result from using the tool

Repeat this cycle until you have enough information for a final answer.
When you have all necessary information, finish with:
Thought: I have all the necessary information
Final Answer: Write your final answer here"
                .into(),
            user_prompt: "Question: {input}\n\nAvailable tools:\n{tools}\n\nBegin your analysis:".into(),
            few_shot_examples: vec!["Question: What is the weather in Prague?

Thought: I need to find the current weather in Prague. I'll use the search tool.
Action: web_search
Action Input: {\"query\": \"weather Prague current\"}
Observation: Prague currently has 18°C, partly cloudy, humidity 65%

Thought: I have current weather information for Prague.
Final Answer: Prague currently has 18°C with partly cloudy skies and 65% humidity."
                .into()],
            include_examples: false,
        }
    }

    pub fn czech() -> Self {
        Self {
            language: Language::Cs,
            system_prompt: "Jsi inteligentní asistent, který může používat různé nástroje k zodpovězení otázek.
Postupuj podle ReAct patternu: Thought (myšlenka) → Action (akce) → Observation (pozorování).

Formát odpovědi:
Thought: Zde napiš svou myšlenku o tom, co potřebuješ udělat
Action: název_nástroje
Action Input: {\"parametr\": \"hodnota\"}
Observation: Výsledek použití nástroje

Opakuj tento cyklus dokud nemáš dostatek informací pro finální odpověď.
Když máš všechny potřebné informace, ukonči pomocí:
Thought: Mám všechny potřebné informace
Final Answer: Zde napiš svou finální odpověď"
                .into(),
            user_prompt: "Otázka: {input}\n\nDostupné nástroje:\n{tools}\n\nZačni svojí analýzou:".into(),
            few_shot_examples: vec!["Otázka: Jaké je počasí v Praze?

Thought: Potřebuji zjistit aktuální počasí v Praze. Použiju vyhledávací nástroj.
Action: web_search
Action Input: {\"query\": \"počasí Praha aktuální\"}
Observation: V Praze je aktuálně 18°C, polojasno, vlhkost 65%

Thought: Mám aktuální informace o počasí v Praze.
Final Answer: V Praze je aktuálně 18°C s polojasnem a vlhkostí 65%."
                .into()],
            include_examples: false,
        }
    }

    pub fn with_examples(mut self, include: bool) -> Self {
        self.include_examples = include;
        self
    }

    pub fn phrases(&self) -> &'static Phrases {
        self.language.phrases()
    }

    /// Render the user turn. A non-empty transcript is appended after it.
    pub fn build_prompt(&self, input: &str, tools: &str, transcript: &str) -> String {
        let mut prompt = fill(&self.user_prompt, &[("input", input), ("tools", tools)]);
        if !transcript.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(transcript);
            prompt.push('\n');
        }
        prompt
    }

    /// Full prompt for the next thought.
    ///
    /// The first step gets the bare question; later steps append the
    /// transcript so far and ask for the next step.
    pub fn thought_prompt(&self, input: &str, tools: &str, transcript: &str, step: u32) -> String {
        let mut prompt = self.system_prompt.clone();
        prompt.push_str("\n\n");

        if self.include_examples {
            for example in &self.few_shot_examples {
                prompt.push_str(example);
                prompt.push_str("\n\n");
            }
        }

        if step == 0 {
            prompt.push_str(&self.build_prompt(input, tools, ""));
        } else {
            prompt.push_str(&self.build_prompt(input, tools, transcript));
            prompt.push_str("\n\n");
            prompt.push_str(self.phrases().next_step);
        }
        prompt
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::english()
    }
}

/// Catalog lines shown to the model: `- name: description | Parameters: q(string)*`.
pub fn format_tool_catalog(tools: &[ToolDescriptor], phrases: &Phrases) -> String {
    if tools.is_empty() {
        return phrases.no_tools.to_string();
    }

    tools
        .iter()
        .map(|tool| {
            let params = tool
                .parameters
                .iter()
                .map(|p| format!("{}({}){}", p.name, p.param_type, if p.required { "*" } else { "" }))
                .collect::<Vec<_>>()
                .join(", ");
            format!("- {}: {} | {}: {}", tool.name, tool.description, phrases.parameters, params)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reagent_core::tool::ToolParameter;

    fn search_tool() -> ToolDescriptor {
        ToolDescriptor {
            id: "web_search".into(),
            name: "Web Search".into(),
            description: "Search the web".into(),
            category: "search".into(),
            parameters: vec![
                ToolParameter::required("query", "string", "Search query"),
                ToolParameter::optional("num_results", "integer", "Result count"),
            ],
        }
    }

    #[test]
    fn language_codes() {
        assert_eq!(Language::from_code("cs"), Language::Cs);
        assert_eq!(Language::from_code(" EN "), Language::En);
        assert_eq!(Language::from_code("de"), Language::En);
        assert_eq!(Language::Cs.to_string(), "cs");
    }

    #[test]
    fn fill_replaces_all_placeholders() {
        let s = fill(ENGLISH.execution_error, &[("name", "calc"), ("reason", "boom")]);
        assert_eq!(s, "Tool calc failed: boom");
        assert_eq!(fill("{a}{a}", &[("a", "x")]), "xx");
    }

    #[test]
    fn catalog_marks_required_parameters() {
        let catalog = format_tool_catalog(&[search_tool()], &ENGLISH);
        assert_eq!(
            catalog,
            "- Web Search: Search the web | Parameters: query(string)*, num_results(integer)"
        );
        let cs = format_tool_catalog(&[search_tool()], &CZECH);
        assert!(cs.contains("| Parametry: "));
    }

    #[test]
    fn empty_catalog_says_so() {
        assert_eq!(format_tool_catalog(&[], &ENGLISH), ENGLISH.no_tools);
    }

    #[test]
    fn first_step_prompt_has_no_transcript() {
        let t = PromptTemplate::english();
        let prompt = t.thought_prompt("2+2?", "- calc", "Thought: old", 0);
        assert!(prompt.starts_with("You are an intelligent assistant"));
        assert!(prompt.contains("Question: 2+2?\n\nAvailable tools:\n- calc\n\nBegin your analysis:"));
        assert!(!prompt.contains("Thought: old"));
        assert!(!prompt.contains("What is the next step?"));
    }

    #[test]
    fn later_steps_append_transcript_and_next_step() {
        let t = PromptTemplate::czech();
        let prompt = t.thought_prompt("otázka", "- calc", "Thought: x\nObservation: y", 2);
        assert!(prompt.contains("Otázka: otázka"));
        assert!(prompt.contains("Thought: x\nObservation: y\n"));
        assert!(prompt.ends_with("Co je další krok?"));
    }

    #[test]
    fn examples_only_when_enabled() {
        let plain = PromptTemplate::english().thought_prompt("q", "t", "", 0);
        assert!(!plain.contains("weather in Prague"));
        let with = PromptTemplate::english()
            .with_examples(true)
            .thought_prompt("q", "t", "", 0);
        assert!(with.contains("weather in Prague"));
    }
}
