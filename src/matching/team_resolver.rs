use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Resolves team names between sportsbook and exchange catalogs
#[derive(Debug, Clone)]
pub struct TeamResolver {
    /// Map of normalized alias -> normalized canonical name
    aliases: HashMap<String, String>,
}

/// Team alias configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamAliases {
    pub teams: Vec<TeamAliasEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamAliasEntry {
    /// Canonical team name
    pub canonical: String,
    /// List of aliases (variations, abbreviations, etc.)
    pub aliases: Vec<String>,
}

/// Lower-case, turn punctuation into spaces, collapse whitespace.
///
/// "Man. United" -> "man united", "Brighton & Hove Albion" -> "brighton hove albion"
pub fn normalize_text(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl TeamResolver {
    /// Create a new resolver with no aliases
    pub fn new() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Build a resolver from an alias configuration
    pub fn from_aliases(config: TeamAliases) -> Self {
        let mut resolver = Self::new();

        for entry in config.teams {
            let canonical = normalize_text(&entry.canonical);

            // Map canonical name to itself
            resolver
                .aliases
                .insert(canonical.clone(), canonical.clone());

            for alias in entry.aliases {
                resolver.aliases.insert(normalize_text(&alias), canonical.clone());
            }
        }

        resolver
    }

    /// Load aliases from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).context("Failed to read team aliases file")?;

        let aliases_config: TeamAliases =
            serde_json::from_str(&content).context("Failed to parse team aliases JSON")?;

        let resolver = Self::from_aliases(aliases_config);
        info!("Loaded {} team alias mappings", resolver.len());

        Ok(resolver)
    }

    /// Load aliases from `path` if it exists, otherwise start empty
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            info!(
                "No team aliases file at {}, using default resolver",
                path.display()
            );
            Ok(Self::new())
        }
    }

    /// Normalize a team name to its canonical form
    pub fn normalize(&self, name: &str) -> String {
        let normalized = normalize_text(name);

        self.aliases
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    /// Add a new alias mapping
    pub fn add_alias(&mut self, alias: &str, canonical: &str) {
        self.aliases
            .insert(normalize_text(alias), normalize_text(canonical));
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl Default for TeamResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("Man. United"), "man united");
        assert_eq!(normalize_text("  Brighton & Hove   Albion "), "brighton hove albion");
        assert_eq!(normalize_text("St. Louis Cardinals"), "st louis cardinals");
        assert_eq!(normalize_text("PSG"), "psg");
    }

    #[test]
    fn test_normalize() {
        let mut resolver = TeamResolver::new();
        resolver.add_alias("Man Utd", "Manchester United");
        resolver.add_alias("Man. United", "Manchester United");

        assert_eq!(resolver.normalize("Manchester United"), "manchester united");
        assert_eq!(resolver.normalize("MAN UTD"), "manchester united");
        assert_eq!(resolver.normalize("man united"), "manchester united");
        assert_eq!(resolver.normalize("Chelsea FC"), "chelsea fc"); // Unknown team stays as-is
    }

    #[test]
    fn test_added_alias_shares_canonical_form() {
        let mut resolver = TeamResolver::new();
        resolver.add_alias("Spurs", "Tottenham Hotspur");

        assert_eq!(resolver.normalize("spurs"), resolver.normalize("Tottenham Hotspur"));
        assert_eq!(resolver.normalize("Tottenham-Hotspur"), "tottenham hotspur");
        assert_ne!(resolver.normalize("Arsenal"), resolver.normalize("Spurs"));
    }

    #[test]
    fn test_from_aliases_maps_canonical_to_itself() {
        let resolver = TeamResolver::from_aliases(TeamAliases {
            teams: vec![TeamAliasEntry {
                canonical: "Wolverhampton Wanderers".to_string(),
                aliases: vec!["Wolves".to_string(), "WOL".to_string()],
            }],
        });

        assert_eq!(resolver.len(), 3);
        assert_eq!(resolver.normalize("wolves"), "wolverhampton wanderers");
        assert_eq!(resolver.normalize("WOL"), "wolverhampton wanderers");
        assert_eq!(
            resolver.normalize("Wolverhampton Wanderers"),
            "wolverhampton wanderers"
        );
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let resolver =
            TeamResolver::load_or_default(Path::new("does/not/exist/aliases.json")).unwrap();
        assert!(resolver.is_empty());
    }
}
