//! Single-pass template substitution
//!
//! Templates are plain text with `{{NAME}}` placeholders and
//! `{{#FLAG}}...{{/FLAG}}` conditional blocks. Substitution is one pass
//! over the text; templates never include other templates, and blocks do
//! not nest.

use std::collections::BTreeMap;

/// The values and flags driving one substitution
#[derive(Debug, Default, Clone)]
pub struct Substitutions {
    values: BTreeMap<String, String>,
    flags: BTreeMap<String, bool>,
}

impl Substitutions {
    pub fn new() -> Self {
        Substitutions::default()
    }

    /// Sets a `{{NAME}}` replacement value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Sets a `{{#FLAG}}` conditional
    pub fn flag(&mut self, name: impl Into<String>, enabled: bool) -> &mut Self {
        self.flags.insert(name.into(), enabled);
        self
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    fn enabled(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }
}

/// Renders a template with the given substitutions
///
/// Unknown placeholders are left verbatim so template errors surface in
/// the generated text instead of silently vanishing.
pub fn substitute(template: &str, subs: &Substitutions) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        let tail = &after[close + 2..];

        if let Some(flag) = name.strip_prefix('#') {
            let end_marker = format!("{{{{/{}}}}}", flag);
            match tail.find(&end_marker) {
                Some(block_end) => {
                    let inner = &tail[..block_end];
                    if subs.enabled(flag) {
                        out.push_str(&substitute(inner, subs));
                    }
                    rest = &tail[block_end + end_marker.len()..];
                }
                None => {
                    // unterminated block: keep the text verbatim
                    out.push_str(&rest[open..open + 2 + close + 2]);
                    rest = tail;
                }
            }
        } else {
            match subs.value(name) {
                Some(value) => out.push_str(value),
                None => {
                    out.push_str("{{");
                    out.push_str(name);
                    out.push_str("}}");
                }
            }
            rest = tail;
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_placeholders_are_replaced() {
        let mut subs = Substitutions::new();
        subs.set("T", "int").set("SUFFIX", "vec_int");
        assert_eq!(
            substitute("{{SUFFIX}}_push({{T}} value)", &subs),
            "vec_int_push(int value)"
        );
    }

    #[test]
    fn enabled_blocks_are_rendered_with_inner_placeholders() {
        let mut subs = Substitutions::new();
        subs.set("T_DROP_FN", "free").flag("T_NEEDS_DROP", true);
        assert_eq!(
            substitute("{{#T_NEEDS_DROP}}{{T_DROP_FN}}(x);{{/T_NEEDS_DROP}}", &subs),
            "free(x);"
        );
    }

    #[test]
    fn disabled_blocks_disappear() {
        let mut subs = Substitutions::new();
        subs.flag("T_NEEDS_DROP", false);
        assert_eq!(
            substitute("a{{#T_NEEDS_DROP}}drop{{/T_NEEDS_DROP}}b", &subs),
            "ab"
        );
    }

    #[test]
    fn unknown_placeholders_stay_verbatim() {
        let subs = Substitutions::new();
        assert_eq!(substitute("x = {{MYSTERY}};", &subs), "x = {{MYSTERY}};");
    }

    #[test]
    fn substitution_is_deterministic() {
        let mut subs = Substitutions::new();
        subs.set("T", "double").flag("T_NEEDS_DROP", false);
        let template = "{{T}} {{#T_NEEDS_DROP}}owned{{/T_NEEDS_DROP}}{{T}}";
        assert_eq!(substitute(template, &subs), substitute(template, &subs));
    }
}
