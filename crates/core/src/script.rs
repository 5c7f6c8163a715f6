//! Script helpers: title extraction and scene splitting.
//!
//! Scripts arrive as free text. An optional title line (`Title: ...`,
//! `TITLE: ...` or a Markdown `# ...` heading) may open the script; the rest
//! is split into scenes at screenplay sluglines (`INT.`, `EXT.`,
//! `SCENE 3`, ...) or, failing those, at blank lines.

use std::sync::OnceLock;

use regex::Regex;

/// Longest title kept; longer candidates are truncated.
pub const MAX_TITLE_CHARS: usize = 120;

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:(?i:title)\s*:\s*|#\s+)(?P<title>\S.*?)\s*$")
            .expect("title regex is valid")
    })
}

fn slugline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?i:(?:INT\.|EXT\.|INT/EXT\.|I/E\.)|SCENE\s+\d+\b)")
            .expect("slugline regex is valid")
    })
}

fn shot_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(extreme close[- ]up|close[- ]up|medium shot|wide shot|establishing shot|over[- ]the[- ]shoulder|tracking shot|pov)\b")
            .expect("shot regex is valid")
    })
}

fn dialogue_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]+)""#).expect("dialogue regex is valid"))
}

/// The script's title, if its first non-empty line is a title line.
pub fn extract_title(script: &str) -> Option<String> {
    let first = script.lines().find(|l| !l.trim().is_empty())?;
    let caps = title_re().captures(first)?;
    let title: String = caps["title"].chars().take(MAX_TITLE_CHARS).collect();
    Some(title)
}

/// The script without its title line (if it had one).
pub fn strip_title(script: &str) -> String {
    let mut lines = script.lines().skip_while(|l| l.trim().is_empty()).peekable();
    if lines.peek().is_some_and(|l| title_re().is_match(l)) {
        lines.next();
    }
    lines.collect::<Vec<_>>().join("\n").trim().to_string()
}

/// One scene as parsed from script text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneDraft {
    /// Slugline or first line, used as the card title.
    pub heading: String,
    /// Full scene text.
    pub description: String,
    pub shot_type: Option<String>,
    pub dialogue: Option<String>,
}

/// Split a (title-stripped) script body into scenes.
pub fn split_scenes(body: &str) -> Vec<SceneDraft> {
    let has_sluglines = body.lines().any(|l| slugline_re().is_match(l));

    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in body.lines() {
        let boundary = if has_sluglines {
            slugline_re().is_match(line)
        } else {
            line.trim().is_empty()
        };
        if boundary && !current.is_empty() {
            blocks.push(std::mem::take(&mut current));
        }
        if !line.trim().is_empty() {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks.into_iter().map(|lines| scene_from_lines(&lines)).collect()
}

fn scene_from_lines(lines: &[&str]) -> SceneDraft {
    let heading = lines.first().copied().unwrap_or_default().to_string();
    let description = lines.join(" ");
    let shot_type = shot_re()
        .captures(&description)
        .map(|c| c[1].to_lowercase());
    let dialogue: Vec<&str> = dialogue_re()
        .captures_iter(&description)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let dialogue = (!dialogue.is_empty()).then(|| dialogue.join(" "));
    SceneDraft {
        heading,
        description,
        shot_type,
        dialogue,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- extract_title / strip_title -----------------------------------------

    #[test]
    fn extracts_title_prefix() {
        assert_eq!(
            extract_title("Title: The Last Train\n\nINT. STATION - NIGHT").as_deref(),
            Some("The Last Train")
        );
        assert_eq!(extract_title("\n  TITLE:  Dawn  \nbody").as_deref(), Some("Dawn"));
    }

    #[test]
    fn extracts_markdown_heading() {
        assert_eq!(extract_title("# Harbor Lights\ntext").as_deref(), Some("Harbor Lights"));
    }

    #[test]
    fn no_title_line_yields_none() {
        assert_eq!(extract_title("INT. KITCHEN - DAY\nShe waits."), None);
        assert_eq!(extract_title(""), None);
    }

    #[test]
    fn strip_title_removes_only_title_line() {
        let body = strip_title("Title: Dawn\n\nINT. KITCHEN - DAY\nShe waits.");
        assert_eq!(body, "INT. KITCHEN - DAY\nShe waits.");
    }

    #[test]
    fn strip_title_without_title_is_identity_modulo_trim() {
        assert_eq!(strip_title("  \nA field.\n"), "A field.");
    }

    // -- split_scenes --------------------------------------------------------

    #[test]
    fn splits_on_sluglines() {
        let scenes = split_scenes(
            "INT. COFFEE SHOP - DAY\nClose-up of a steaming cup.\n\"Morning,\" says Ana.\n\
             EXT. STREET - NIGHT\nRain on neon.",
        );
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].heading, "INT. COFFEE SHOP - DAY");
        assert_eq!(scenes[0].shot_type.as_deref(), Some("close-up"));
        assert_eq!(scenes[0].dialogue.as_deref(), Some("Morning,"));
        assert_eq!(scenes[1].description, "EXT. STREET - NIGHT Rain on neon.");
        assert_eq!(scenes[1].dialogue, None);
    }

    #[test]
    fn falls_back_to_paragraphs() {
        let scenes = split_scenes("A cozy coffee shop.\n\n\nA busy street.\nCars pass.");
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[1].description, "A busy street. Cars pass.");
    }

    #[test]
    fn empty_body_has_no_scenes() {
        assert!(split_scenes("   \n\n").is_empty());
    }
}
