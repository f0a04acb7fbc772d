//! Provider registry — static endpoint configurations for the
//! OpenAI-compatible providers the agent knows about. The unified
//! client only needs a base URL and a name; auth is always bearer.

/// Endpoint configuration for one OpenAI-compatible provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderSpec {
    pub name: &'static str,
    pub base_url: &'static str,
    pub chat_path: &'static str,
}

static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "groq",
        base_url: "https://api.groq.com/openai/v1",
        chat_path: "/chat/completions",
    },
    ProviderSpec {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        chat_path: "/chat/completions",
    },
];

/// Look up a provider spec by name.
pub fn get_provider_spec(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|p| p.name == name)
}

/// All OpenAI-compatible provider names (excludes `dry_run`).
pub fn all_provider_names() -> Vec<&'static str> {
    PROVIDERS.iter().map(|p| p.name).collect()
}
