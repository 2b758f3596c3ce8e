//! SSML removal for text messages

use once_cell::sync::Lazy;
use regex::Regex;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&(lt|gt|amp|quot|apos);").unwrap());

/// Remove SSML/XML tags and decode the predefined XML entities
pub fn strip_markup(text: &str) -> String {
    let without_tags = TAG.replace_all(text, "");
    ENTITY
        .replace_all(&without_tags, |caps: &regex::Captures<'_>| match &caps[1] {
            "lt" => "<",
            "gt" => ">",
            "amp" => "&",
            "quot" => "\"",
            _ => "'",
        })
        .into_owned()
}
