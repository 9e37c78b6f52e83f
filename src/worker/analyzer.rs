//! Default analyzer: cheapest meta-tag and hex-color heuristics.

use super::{BrandAnalyzer, BrandProfile, ColorData, LogoData, RawContent};
use crate::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

// og:image and twitter:image meta tags, either attribute order.
static META_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<meta[^>]+(?:property|name)\s*=\s*["'](?:og:image|twitter:image)["'][^>]+content\s*=\s*["']([^"']+)["']"#,
    )
    .expect("meta image pattern")
});

static META_IMAGE_REVERSED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<meta[^>]+content\s*=\s*["']([^"']+)["'][^>]+(?:property|name)\s*=\s*["'](?:og:image|twitter:image)["']"#,
    )
    .expect("reversed meta image pattern")
});

static LINK_ICON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<link[^>]+rel\s*=\s*["'][^"']*icon[^"']*["'][^>]+href\s*=\s*["']([^"']+)["']"#,
    )
    .expect("link icon pattern")
});

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#([0-9a-fA-F]{6}|[0-9a-fA-F]{3})\b").expect("hex color pattern"));

/// Meta-tag logo lookup plus a hex-color sweep over stylesheets and inline
/// styles. This is the cheapest strategy tier; rendering and vision-based
/// detection stay behind the [`BrandAnalyzer`] trait.
pub struct BasicAnalyzer {
    max_colors: usize,
}

impl BasicAnalyzer {
    pub fn new() -> Self {
        Self { max_colors: 6 }
    }

    pub fn with_max_colors(mut self, max_colors: usize) -> Self {
        self.max_colors = max_colors.max(1);
        self
    }

    fn find_logo(&self, html: &str, base: &str) -> Option<LogoData> {
        let (href, source) = META_IMAGE
            .captures(html)
            .or_else(|| META_IMAGE_REVERSED.captures(html))
            .map(|c| (c[1].to_string(), "meta-tag"))
            .or_else(|| {
                LINK_ICON
                    .captures(html)
                    .map(|c| (c[1].to_string(), "link-icon"))
            })?;

        Some(LogoData {
            url: Some(resolve_href(base, &href)),
            image: None,
            width: None,
            height: None,
            source: source.to_string(),
        })
    }

    fn find_colors(&self, html: &str) -> Vec<ColorData> {
        // Count occurrences so the dominant palette surfaces first;
        // near-white/near-black noise is dropped.
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for captures in HEX_COLOR.captures_iter(html) {
            let hex = expand_hex(&captures[1]);
            if let Some(rgb) = parse_rgb(&hex) {
                if is_noise(rgb) {
                    continue;
                }
                *counts.entry(hex).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, u32)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
            .into_iter()
            .take(self.max_colors)
            .filter_map(|(hex, _)| {
                parse_rgb(&hex).map(|rgb| ColorData {
                    hex,
                    rgb,
                    source: "stylesheet".to_string(),
                })
            })
            .collect()
    }
}

impl Default for BasicAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrandAnalyzer for BasicAnalyzer {
    async fn analyze(&self, url: &str, content: &RawContent) -> Result<BrandProfile> {
        let logo = self.find_logo(&content.html, &content.resolved_url);
        let colors = self.find_colors(&content.html);

        let complete = logo.is_some() && !colors.is_empty();
        let note = match (logo.is_some(), colors.is_empty()) {
            (false, true) => Some("no logo or colors detected".to_string()),
            (false, false) => Some("no logo detected".to_string()),
            (true, true) => Some("no colors detected".to_string()),
            (true, false) => None,
        };

        Ok(BrandProfile {
            url: url.to_string(),
            logo,
            colors,
            complete,
            note,
        })
    }
}

fn expand_hex(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.len() == 3 {
        let doubled: String = lower.chars().flat_map(|c| [c, c]).collect();
        format!("#{}", doubled)
    } else {
        format!("#{}", lower)
    }
}

fn parse_rgb(hex: &str) -> Option<[u8; 3]> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
    let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
    let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
    Some([r, g, b])
}

fn is_noise(rgb: [u8; 3]) -> bool {
    let brightness: u32 = rgb.iter().map(|&c| c as u32).sum();
    brightness > 720 || brightness < 45
}

fn resolve_href(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match url::Url::parse(base).and_then(|b| b.join(href)) {
        Ok(joined) => joined.to_string(),
        Err(_) => href.to_string(),
    }
}
