//! Keyword extraction for chunk metadata
//!
//! Chunk text is matched case-insensitively against two fixed vocabularies.
//! Racing jargon is checked before named entities, and the result keeps the
//! vocabulary order of first match.

/// Maximum keywords stored per chunk
pub const MAX_KEYWORDS: usize = 10;

/// Racing and strategy terminology
pub const JARGON: &[&str] = &[
    "undercut",
    "overcut",
    "pit stop",
    "pit window",
    "safety car",
    "virtual safety car",
    "red flag",
    "drs",
    "tire",
    "tyre",
    "compound",
    "degradation",
    "graining",
    "blistering",
    "strategy",
    "stint",
    "qualifying",
    "pole position",
    "fastest lap",
    "downforce",
    "drag",
    "slipstream",
    "dirty air",
    "ground effect",
    "porpoising",
    "chicane",
    "hairpin",
    "apex",
    "grid penalty",
    "parc ferme",
    "sprint",
    "power unit",
    "cost cap",
    "track limits",
];

/// Drivers, teams and circuits
pub const ENTITIES: &[&str] = &[
    "verstappen",
    "hamilton",
    "leclerc",
    "norris",
    "piastri",
    "russell",
    "sainz",
    "alonso",
    "perez",
    "schumacher",
    "senna",
    "red bull",
    "ferrari",
    "mercedes",
    "mclaren",
    "aston martin",
    "alpine",
    "williams",
    "haas",
    "sauber",
    "monaco",
    "monza",
    "silverstone",
    "spa-francorchamps",
    "suzuka",
    "interlagos",
    "bahrain",
    "jeddah",
    "singapore",
    "las vegas",
    "abu dhabi",
    "zandvoort",
    "imola",
    "fia",
];

/// Extract up to [`MAX_KEYWORDS`] vocabulary terms contained in `text`
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();

    JARGON
        .iter()
        .chain(ENTITIES.iter())
        .filter(|term| lower.contains(**term))
        .take(MAX_KEYWORDS)
        .map(|term| term.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_match() {
        let keywords = extract_keywords("The UNDERCUT worked for Leclerc at Monaco.");
        assert_eq!(keywords, vec!["undercut", "leclerc", "monaco"]);
    }

    #[test]
    fn test_jargon_before_entities() {
        let keywords = extract_keywords("Ferrari chose a one-stop strategy.");
        assert_eq!(keywords, vec!["strategy", "ferrari"]);
    }

    #[test]
    fn test_capped_at_ten() {
        let text = "undercut overcut pit stop safety car tire compound degradation \
                    strategy stint qualifying downforce Verstappen Monaco";
        let keywords = extract_keywords(text);
        assert_eq!(keywords.len(), MAX_KEYWORDS);
        assert!(!keywords.contains(&"verstappen".to_string()));
    }

    #[test]
    fn test_no_matches() {
        assert!(extract_keywords("A quiet afternoon.").is_empty());
    }
}
