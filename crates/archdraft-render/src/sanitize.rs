//! Renderer-input sanitizer
//!
//! Strips or rejects unsafe tokens before any text reaches a renderer
//! process: file includes, remote URLs, init blocks, HTML in labels. Every
//! removal is recorded; too many removals rejects the whole input.

use archdraft_core::{DiagramFormat, Error, Result};
use regex::Regex;

#[derive(Clone, Debug, Default)]
pub struct SanitizeOutcome {
    pub sanitized_text: String,
    pub warnings: Vec<String>,
    pub blocked_tokens: Vec<String>,
}

/// Tokens that are never allowed to reach a PlantUML process.
const PLANTUML_BLOCKED: &[&str] = &["!include", "!import", "!pragma"];

/// Restricted skinparam subset permitted in whitelist mode.
const SKINPARAM_ALLOWED: &[&str] = &["monochrome", "shadowing", "linetype", "componentStyle"];

pub struct Sanitizer {
    /// Fraction of non-empty lines that may be blocked before the input is
    /// rejected outright with UNSAFE_INPUT.
    block_threshold: f64,
    url_re: Regex,
    html_re: Regex,
    init_re: Regex,
}

impl Sanitizer {
    pub fn new(block_threshold: f64) -> Self {
        Self {
            block_threshold,
            url_re: Regex::new(r"url\s*\(").unwrap(),
            html_re: Regex::new(r"</?[a-zA-Z][^>]*>").unwrap(),
            init_re: Regex::new(r"%%\{\s*init").unwrap(),
        }
    }

    /// Blocklist pass: remove known-dangerous tokens, keep everything else.
    pub fn sanitize(&self, text: &str, format: DiagramFormat) -> Result<SanitizeOutcome> {
        let mut out = SanitizeOutcome::default();
        let mut kept_lines: Vec<String> = Vec::new();
        let total_lines = text.lines().filter(|l| !l.trim().is_empty()).count().max(1);
        let mut blocked_lines = 0usize;

        for line in text.lines() {
            match self.screen_line(line, format) {
                LineVerdict::Keep => kept_lines.push(line.to_string()),
                LineVerdict::Drop(token) => {
                    blocked_lines += 1;
                    out.warnings
                        .push(format!("removed line containing '{}'", token));
                    out.blocked_tokens.push(token);
                }
                LineVerdict::Rewrite(clean, token) => {
                    blocked_lines += 1;
                    out.warnings
                        .push(format!("stripped '{}' from line", token));
                    out.blocked_tokens.push(token);
                    kept_lines.push(clean);
                }
            }
        }

        let blocked_fraction = blocked_lines as f64 / total_lines as f64;
        if !out.blocked_tokens.is_empty() && blocked_fraction > self.block_threshold {
            return Err(Error::unsafe_input(out.blocked_tokens));
        }

        out.sanitized_text = kept_lines.join("\n");
        Ok(out)
    }

    fn screen_line(&self, line: &str, format: DiagramFormat) -> LineVerdict {
        match format {
            DiagramFormat::Plantuml => {
                for token in PLANTUML_BLOCKED {
                    if line.contains(token) {
                        return LineVerdict::Drop(token.to_string());
                    }
                }
                if line.contains("skinparam") && line.contains("backgroundImage") {
                    return LineVerdict::Drop("skinparam backgroundImage".to_string());
                }
                if self.url_re.is_match(line) {
                    return LineVerdict::Drop("url(".to_string());
                }
                LineVerdict::Keep
            }
            DiagramFormat::Mermaid => {
                if self.init_re.is_match(line) {
                    return LineVerdict::Drop("%%{init".to_string());
                }
                if self.url_re.is_match(line) {
                    return LineVerdict::Drop("url(".to_string());
                }
                if self.html_re.is_match(line) {
                    let clean = self.html_re.replace_all(line, "").to_string();
                    return LineVerdict::Rewrite(clean, "html_label".to_string());
                }
                LineVerdict::Keep
            }
            // Structurizr DSL is produced only by our own translator and
            // never accepted from an LLM, but screen it like PlantUML.
            DiagramFormat::Structurizr => {
                if self.url_re.is_match(line) {
                    return LineVerdict::Drop("url(".to_string());
                }
                LineVerdict::Keep
            }
        }
    }

    /// Whitelist pass for PlantUML: only the small safe grammar survives.
    /// Component/package/actor/database declarations, relationships, notes,
    /// and a restricted skinparam subset.
    pub fn sanitize_whitelist(&self, text: &str) -> Result<SanitizeOutcome> {
        let decl =
            Regex::new(r#"^\s*(component|package|actor|database|interface|node)\s+"#).unwrap();
        let rel = Regex::new(r"^\s*\S+\s*(-+>|\.+>|<-+|<\.+|--)\s*\S+").unwrap();
        let note = Regex::new(r"^\s*(note|end note)").unwrap();

        let mut out = SanitizeOutcome::default();
        let mut kept_lines: Vec<String> = Vec::new();
        let total_lines = text.lines().filter(|l| !l.trim().is_empty()).count().max(1);
        let mut blocked_lines = 0usize;

        for line in text.lines() {
            let trimmed = line.trim();
            let allowed = trimmed.is_empty()
                || trimmed == "@startuml"
                || trimmed == "@enduml"
                || trimmed == "}"
                || decl.is_match(line)
                || rel.is_match(line)
                || note.is_match(line)
                || is_allowed_skinparam(trimmed);
            if allowed {
                kept_lines.push(line.to_string());
            } else {
                blocked_lines += 1;
                let token = trimmed
                    .split_whitespace()
                    .next()
                    .unwrap_or("line")
                    .to_string();
                out.warnings
                    .push(format!("line not in whitelist grammar: '{}'", token));
                out.blocked_tokens.push(token);
            }
        }

        let blocked_fraction = blocked_lines as f64 / total_lines as f64;
        if !out.blocked_tokens.is_empty() && blocked_fraction > self.block_threshold {
            return Err(Error::unsafe_input(out.blocked_tokens));
        }

        out.sanitized_text = kept_lines.join("\n");
        Ok(out)
    }
}

fn is_allowed_skinparam(line: &str) -> bool {
    if let Some(rest) = line.strip_prefix("skinparam ") {
        let key = rest.split_whitespace().next().unwrap_or("");
        return SKINPARAM_ALLOWED.iter().any(|a| key.starts_with(a));
    }
    false
}

enum LineVerdict {
    Keep,
    Drop(String),
    Rewrite(String, String),
}
