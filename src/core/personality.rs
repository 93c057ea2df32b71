use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Conversational persona for the assistant. Each personality selects a
/// welcome-message template and, for the non-default ones, a system
/// instruction sent with every request. Switching personality switches to a
/// separate conversation; it never touches another personality's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(try_from = "String", into = "String")]
pub enum Personality {
    Default,
    Technical,
    Creative,
    Sarcastic,
}

impl Personality {
    pub fn as_str(self) -> &'static str {
        match self {
            Personality::Default => "default",
            Personality::Technical => "technical",
            Personality::Creative => "creative",
            Personality::Sarcastic => "sarcastic",
        }
    }

    pub fn all() -> [Personality; 4] {
        [
            Personality::Default,
            Personality::Technical,
            Personality::Creative,
            Personality::Sarcastic,
        ]
    }

    /// Greeting shown when a conversation has no stored history.
    pub fn welcome_text(self, username: &str) -> String {
        match self {
            Personality::Default => format!(
                "Welcome, {username}! I'm Lorz, your assistant. How can I help you today?"
            ),
            Personality::Technical => format!(
                "System online. I'm Lorz, the technical expert. State your query, {username}."
            ),
            Personality::Creative => format!(
                "Welcome to the realm of imagination, {username}! I'm Lorz, your creative \
                 companion. What shall we write today?"
            ),
            Personality::Sarcastic => format!(
                "Oh joy, another user. {username}, is it? Fine, I'm Lorz. What do you want? \
                 I'm terribly busy, you know."
            ),
        }
    }

    /// Provider-side instruction shaping the assistant's voice, if any.
    pub fn system_instruction(self) -> Option<&'static str> {
        match self {
            Personality::Default => None,
            Personality::Technical => Some(
                "You are Lorz, a precise technical expert. Answer with exact, \
                 well-structured technical detail and cite concrete mechanisms.",
            ),
            Personality::Creative => Some(
                "You are Lorz, an imaginative creative companion. Answer with vivid, \
                 evocative language and offer inventive directions.",
            ),
            Personality::Sarcastic => Some(
                "You are Lorz, a reluctant and sarcastic assistant. Answer correctly, \
                 but with dry wit and mild exasperation.",
            ),
        }
    }
}

impl TryFrom<&str> for Personality {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "default" => Ok(Personality::Default),
            "technical" => Ok(Personality::Technical),
            "creative" => Ok(Personality::Creative),
            "sarcastic" => Ok(Personality::Sarcastic),
            _ => Err(format!("invalid personality: {value}")),
        }
    }
}

impl TryFrom<String> for Personality {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Personality> for String {
    fn from(value: Personality) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for Personality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_forms_round_trip() {
        for personality in Personality::all() {
            let round_tripped = Personality::try_from(personality.as_str()).unwrap();
            assert_eq!(round_tripped, personality);
        }
        assert!(Personality::try_from("grumpy").is_err());
    }

    #[test]
    fn welcome_text_mentions_the_user() {
        for personality in Personality::all() {
            assert!(personality.welcome_text("ada").contains("ada"));
        }
    }

    #[test]
    fn only_default_omits_the_system_instruction() {
        assert!(Personality::Default.system_instruction().is_none());
        assert!(Personality::Technical.system_instruction().is_some());
        assert!(Personality::Creative.system_instruction().is_some());
        assert!(Personality::Sarcastic.system_instruction().is_some());
    }
}
