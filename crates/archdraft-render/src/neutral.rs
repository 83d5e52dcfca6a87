//! Neutral-SVG validator
//!
//! Rendered SVG must carry no theme: no inline non-default fill/stroke, no
//! theme-level <style> rules. Stripping is attempted first; the SVG is
//! rejected only when stripping would also remove structural markup.

use archdraft_core::{Error, Result};
use regex::Regex;

#[derive(Clone, Debug)]
pub struct NeutralOutcome {
    pub svg: String,
    pub stripped: Vec<String>,
    pub was_modified: bool,
}

/// Colors that count as "no theme".
const NEUTRAL_COLORS: &[&str] = &[
    "none",
    "black",
    "white",
    "#000",
    "#000000",
    "#fff",
    "#ffffff",
    "currentcolor",
    "transparent",
    "inherit",
];

fn is_neutral_color(value: &str) -> bool {
    NEUTRAL_COLORS.contains(&value.trim().to_ascii_lowercase().as_str())
}

pub fn neutralize(svg: &str) -> Result<NeutralOutcome> {
    let attr_re = Regex::new(r#"\s(fill|stroke)="([^"]*)""#).unwrap();
    let style_attr_re = Regex::new(r#"\sstyle="([^"]*)""#).unwrap();
    let style_block_re = Regex::new(r"(?s)<style[^>]*>(.*?)</style>").unwrap();
    let open_style_re = Regex::new(r"<style[^>]*>").unwrap();
    let tag_re = Regex::new(r"</?[a-zA-Z]").unwrap();

    let mut stripped: Vec<String> = Vec::new();

    // Unclosed <style> means the block regex cannot bound what it removes;
    // stripping could eat structural tags, so reject.
    if open_style_re.find_iter(svg).count() != style_block_re.find_iter(svg).count() {
        return Err(Error::validation(vec![
            "unterminated <style> block; stripping would remove structural markup".to_string(),
        ]));
    }

    // <style> blocks are theme-level by definition here: every one is
    // stripped and recorded, unless a block wraps markup (structural tags
    // inside), which makes stripping unsafe.
    for cap in style_block_re.captures_iter(svg) {
        let body = &cap[1];
        if tag_re.is_match(body) {
            return Err(Error::validation(vec![
                "<style> block wraps structural markup".to_string(),
            ]));
        }
        stripped.push("style_block".to_string());
    }
    let mut out = style_block_re.replace_all(svg, "").to_string();

    // Inline fill/stroke attributes declaring non-default colors.
    let before = out.clone();
    out = attr_re
        .replace_all(&before, |caps: &regex::Captures| {
            let value = &caps[2];
            if is_neutral_color(value) {
                caps[0].to_string()
            } else {
                stripped.push(format!("{}={}", &caps[1], value));
                String::new()
            }
        })
        .to_string();

    // Inline style attributes: drop fill/stroke/color declarations, keep
    // the rest of the declaration list.
    let with_styles = out.clone();
    out = style_attr_re
        .replace_all(&with_styles, |caps: &regex::Captures| {
            let decls: Vec<&str> = caps[1]
                .split(';')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .collect();
            let kept: Vec<&str> = decls
                .iter()
                .copied()
                .filter(|d| {
                    let themed = d.starts_with("fill")
                        || d.starts_with("stroke")
                        || d.starts_with("color");
                    if themed {
                        stripped.push(format!("style:{}", d));
                    }
                    !themed
                })
                .collect();
            if kept.is_empty() {
                String::new()
            } else {
                format!(" style=\"{}\"", kept.join(";"))
            }
        })
        .to_string();

    if !out.contains("<svg") {
        return Err(Error::validation(vec![
            "stripping removed the svg root".to_string(),
        ]));
    }

    let was_modified = !stripped.is_empty();
    Ok(NeutralOutcome {
        svg: out,
        stripped,
        was_modified,
    })
}

/// True when the SVG already carries no theme styling.
pub fn is_neutral(svg: &str) -> bool {
    matches!(neutralize(svg), Ok(outcome) if !outcome.was_modified)
}
